use crate::{server::handlers::reply, store::KeyStore, store::StoreError};
use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, instrument};

// axum handler for /new: allocate the next key id and hand the caller the
// one copy of the record it will ever see in clear.
#[instrument(skip_all)]
pub async fn new_key(Extension(store): Extension<Arc<KeyStore>>) -> impl IntoResponse {
    match store.new_key().await {
        Ok(key) => {
            info!(name = %key.name, "key allocated");
            (
                StatusCode::OK,
                Json(json!({
                    "message": "KEY_OK",
                    "key-name": key.name,
                    "key-data": STANDARD.encode(key.record.as_bytes()),
                })),
            )
        }
        Err(err) => {
            error!("key allocation failed: {err}");
            reply(StatusCode::INTERNAL_SERVER_ERROR, failure(&err), None)
        }
    }
}

fn failure(err: &StoreError) -> &'static str {
    match err {
        StoreError::NoKeyNum => "NO_KEY_NUM_FILE",
        StoreError::OpenKeyNum(_) => "BAD_KEY_NUM_FILE 1",
        StoreError::ReadKeyNum(_) => "BAD_KEY_NUM_FILE 2",
        StoreError::ParseKeyNum(_) => "BAD_KEY_NUM_FILE 3",
        StoreError::WriteKeyNum(_) => "KEY_NUM_WRITE_ERROR",
        _ => "CANNOT_CREATE_KEY_FILE",
    }
}
