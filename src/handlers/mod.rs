use axum::Json;
use serde_json::{Value, json};

pub mod activists;
pub mod chapters;
pub mod discord;
pub mod events;
pub mod groups;
pub mod pages;
pub mod public;
pub mod session;
pub mod users;

/// `{"status": "success"}`, the reply of handlers with nothing else to return.
pub(crate) fn success() -> Json<Value> {
    Json(json!({ "status": "success" }))
}
