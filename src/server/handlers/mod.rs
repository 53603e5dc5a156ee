mod health;
mod new_key;
mod verify;

pub use health::health;
pub use new_key::new_key;
pub use verify::verify;

use axum::{http::StatusCode, response::Json};
use serde_json::{json, Value};

// Every response body is {"message": ...} with an optional detail, matching
// the wire contract clients already parse.
fn reply(status: StatusCode, message: &str, detail: Option<String>) -> (StatusCode, Json<Value>) {
    let mut body = json!({ "message": message });
    if let Some(detail) = detail {
        body["detail"] = Value::String(detail);
    }
    (status, Json(body))
}
