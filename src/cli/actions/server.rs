use crate::cli::actions::Action;
use crate::server;
use anyhow::Result;

/// Handle the server action
pub async fn handle(action: Action) -> Result<()> {
    match action {
        Action::Server { port, key_dir } => server::new(port, key_dir).await,
    }
}
