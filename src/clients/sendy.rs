use std::sync::Arc;

use async_trait::async_trait;

use crate::config::SendyConfig;
use crate::sync::SyncError;

/// SendyClient
///
/// Subscribes one address to one Sendy list.
#[async_trait]
pub trait SendyClient: Send + Sync {
    async fn subscribe(&self, list_id: &str, name: &str, email: &str) -> Result<(), SyncError>;
}

pub type SendyState = Arc<dyn SendyClient>;

/// interpret_subscribe_response
///
/// Sendy answers 200 with a plain-text body. Only the exact bodies `1` and
/// `Already subscribed.` mean the address is on the list.
pub fn interpret_subscribe_response(status: u16, body: &str) -> Result<(), SyncError> {
    if status != 200 {
        return Err(SyncError::Status {
            status,
            body: body.to_string(),
        });
    }
    match body {
        "1" | "Already subscribed." => Ok(()),
        other => Err(SyncError::Rejected(other.to_string())),
    }
}

/// HttpSendyClient
///
/// Form-encoded POST to `{url}/subscribe`.
#[derive(Clone)]
pub struct HttpSendyClient {
    http: reqwest::Client,
    subscribe_url: String,
    api_key: String,
}

impl HttpSendyClient {
    pub fn new(config: &SendyConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            subscribe_url: format!("{}/subscribe", config.url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
        }
    }
}

#[async_trait]
impl SendyClient for HttpSendyClient {
    async fn subscribe(&self, list_id: &str, name: &str, email: &str) -> Result<(), SyncError> {
        let form = [
            ("api_key", self.api_key.as_str()),
            ("name", name),
            ("email", email),
            ("list", list_id),
            ("boolean", "true"),
        ];

        let response = self.http.post(&self.subscribe_url).form(&form).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        interpret_subscribe_response(status, &body)
    }
}
