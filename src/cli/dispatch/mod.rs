use crate::cli::actions::Action;
use anyhow::{Context, Result};
use std::path::PathBuf;

/// # Errors
/// Returns an error if required arguments are missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    Ok(Action::Server {
        port: matches.get_one::<u16>("port").copied().unwrap_or(8800),
        key_dir: matches
            .get_one::<String>("key-dir")
            .map(PathBuf::from)
            .context("missing required argument: --key-dir")?,
    })
}
