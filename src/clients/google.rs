use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::AppResult;

const TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";
const GOOGLE_ISSUERS: &[&str] = &["accounts.google.com", "https://accounts.google.com"];

/// Claims returned by Google's token-info endpoint. Only the fields we check.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct TokenInfo {
    #[serde(default)]
    pub aud: String,
    #[serde(default)]
    pub iss: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub email_verified: String,
}

impl TokenInfo {
    /// The verified email, when the token was minted for `client_id` by Google.
    pub fn verified_email(&self, client_id: &str) -> Option<String> {
        if self.aud != client_id || !GOOGLE_ISSUERS.contains(&self.iss.as_str()) {
            return None;
        }
        if self.email_verified != "true" || self.email.is_empty() {
            return None;
        }
        Some(self.email.clone())
    }
}

/// IdTokenVerifier
///
/// Turns a Google sign-in ID token into a verified email address. `Ok(None)` means the
/// token was rejected; `Err` means Google could not be reached.
#[async_trait]
pub trait IdTokenVerifier: Send + Sync {
    async fn verify(&self, id_token: &str) -> AppResult<Option<String>>;
}

pub type VerifierState = Arc<dyn IdTokenVerifier>;

#[derive(Clone)]
pub struct GoogleTokenVerifier {
    http: reqwest::Client,
    client_id: String,
}

impl GoogleTokenVerifier {
    pub fn new(client_id: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            client_id: client_id.to_string(),
        }
    }
}

#[async_trait]
impl IdTokenVerifier for GoogleTokenVerifier {
    async fn verify(&self, id_token: &str) -> AppResult<Option<String>> {
        if id_token.trim().is_empty() {
            return Ok(None);
        }

        let response = self
            .http
            .get(TOKENINFO_URL)
            .query(&[("id_token", id_token)])
            .send()
            .await?;

        // tokeninfo answers 400 for invalid or expired tokens.
        if !response.status().is_success() {
            tracing::info!(status = %response.status(), "google rejected id token");
            return Ok(None);
        }

        let info: TokenInfo = response.json().await?;
        Ok(info.verified_email(&self.client_id))
    }
}
