use crate::{
    server::handlers::reply,
    store::{KeyStore, StoreError},
};
use axum::{
    extract::{Extension, Form, Query},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

#[derive(Debug, Deserialize)]
pub struct TokenParams {
    token: Option<String>,
}

// axum handler for /verify; the token is taken from the form body when
// present, the query string otherwise.
#[instrument(skip_all)]
pub async fn verify(
    Extension(store): Extension<Arc<KeyStore>>,
    Query(query): Query<TokenParams>,
    form: Option<Form<TokenParams>>,
) -> impl IntoResponse {
    let token = form.and_then(|Form(params)| params.token).or(query.token);
    let Some(token) = token else {
        return reply(StatusCode::BAD_REQUEST, "BAD_TOKEN_FORMAT", None);
    };

    match store.verify(&token).await {
        Ok(counter) => {
            info!(counter, "token verified");
            reply(StatusCode::OK, "VERIFIED_OK", None)
        }
        Err(err) => {
            let (status, message, detail) = failure(&err);
            if status.is_server_error() {
                error!("verification failed: {err}");
            } else {
                debug!("token rejected: {err}");
            }
            reply(status, message, detail)
        }
    }
}

fn failure(err: &StoreError) -> (StatusCode, &'static str, Option<String>) {
    match err {
        StoreError::BadTokenFormat => (StatusCode::BAD_REQUEST, "BAD_TOKEN_FORMAT", None),
        StoreError::NoKey => (StatusCode::NOT_FOUND, "NO_KEY", None),
        StoreError::Verify(detail) => (
            StatusCode::UNAUTHORIZED,
            "VERIFICATION_ERROR",
            Some(detail.to_string()),
        ),
        StoreError::ReadKey(_) => (StatusCode::INTERNAL_SERVER_ERROR, "FILE_ERROR_1", None),
        StoreError::ParseKey(_) => (StatusCode::INTERNAL_SERVER_ERROR, "FILE_ERROR_2", None),
        StoreError::WriteKey(_) => (StatusCode::INTERNAL_SERVER_ERROR, "FILE_ERROR_3", None),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "WIERD_SHIT", None),
    }
}
