//! Vendor response envelope.
//!
//! Most endpoints wrap their payload in `{success, message, data}`, some
//! (notably `oauth/token`) return the payload bare, and OAuth errors come as
//! `{error, error_description}`. Everything is reduced to one status label,
//! `"OK"` meaning success.

use reqwest::StatusCode;
use serde_json::Value;

pub(crate) const STATUS_OK: &str = "OK";

/// Classify an HTTP status and parsed body into the vendor's status label.
pub(crate) fn status_label(status: StatusCode, body: &Value) -> String {
    if status == StatusCode::OK {
        match (body.get("success").and_then(Value::as_bool), body.get("message")) {
            (Some(true), Some(_)) => STATUS_OK.to_owned(),
            (Some(false), Some(message)) => {
                message.as_str().map_or_else(|| message.to_string(), str::to_owned)
            }
            // Endpoints without the explicit envelope.
            _ => STATUS_OK.to_owned(),
        }
    } else if let Some(description) = body.get("error_description").and_then(Value::as_str) {
        description.to_owned()
    } else if let Some(error) = body.get("error").and_then(Value::as_str) {
        error.to_owned()
    } else {
        "Unknown error".to_owned()
    }
}
