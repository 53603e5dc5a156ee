use crate::store::KeyStore;
use anyhow::Result;
use axum::{
    http::{HeaderName, HeaderValue},
    routing::get,
    Extension, Router,
};
use std::{path::PathBuf, sync::Arc};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::info;

mod handlers;

/// Build the service router on top of a key store.
#[must_use]
pub fn router(store: Arc<KeyStore>) -> Router {
    Router::new()
        .route(
            "/verify",
            get(handlers::verify).post(handlers::verify),
        )
        .route("/new", get(handlers::new_key).post(handlers::new_key))
        .route("/health", get(handlers::health))
        .layer(
            ServiceBuilder::new()
                .layer(Extension(store))
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| {
                        HeaderValue::from_str(uuid::Uuid::new_v4().to_string().as_str()).ok()
                    },
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http()),
        )
}

/// Serve the verifier until ctrl-c.
///
/// # Errors
/// Returns an error if the listener cannot bind or the server fails.
pub async fn new(port: u16, key_dir: PathBuf) -> Result<()> {
    let store = Arc::new(KeyStore::new(key_dir));
    let app = router(store);

    let listener = TcpListener::bind(format!("[::]:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;

    Ok(())
}
