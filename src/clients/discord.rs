use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::sync::SyncError;

const DISCORD_API: &str = "https://discord.com/api/v10";

/// DiscordApi
///
/// The guild operations used when a member confirms their email.
#[async_trait]
pub trait DiscordApi: Send + Sync {
    async fn set_nickname(&self, user_id: i64, nickname: &str) -> Result<(), SyncError>;
    async fn add_role(&self, user_id: i64, role_name: &str) -> Result<(), SyncError>;
    async fn send_message(&self, user_id: i64, content: &str) -> Result<(), SyncError>;
}

pub type DiscordState = Arc<dyn DiscordApi>;

#[derive(Debug, Deserialize)]
struct GuildRole {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct DmChannel {
    id: String,
}

/// HttpDiscordClient
///
/// Discord REST client authenticated as the bot.
#[derive(Clone)]
pub struct HttpDiscordClient {
    http: reqwest::Client,
    base_url: String,
    bot_token: String,
    guild_id: String,
}

impl HttpDiscordClient {
    pub fn new(bot_token: &str, guild_id: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: DISCORD_API.to_string(),
            bot_token: bot_token.to_string(),
            guild_id: guild_id.to_string(),
        }
    }

    fn authorization(&self) -> String {
        format!("Bot {}", self.bot_token)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, SyncError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(SyncError::Status {
            status: status.as_u16(),
            body,
        })
    }

    async fn role_id(&self, role_name: &str) -> Result<String, SyncError> {
        let response = self
            .http
            .get(format!("{}/guilds/{}/roles", self.base_url, self.guild_id))
            .header(reqwest::header::AUTHORIZATION, self.authorization())
            .send()
            .await?;
        let roles: Vec<GuildRole> = Self::check(response).await?.json().await?;

        roles
            .into_iter()
            .find(|role| role.name == role_name)
            .map(|role| role.id)
            .ok_or_else(|| {
                SyncError::InvalidResponse(format!("guild has no role named {}", role_name))
            })
    }
}

#[async_trait]
impl DiscordApi for HttpDiscordClient {
    async fn set_nickname(&self, user_id: i64, nickname: &str) -> Result<(), SyncError> {
        let response = self
            .http
            .patch(format!(
                "{}/guilds/{}/members/{}",
                self.base_url, self.guild_id, user_id
            ))
            .header(reqwest::header::AUTHORIZATION, self.authorization())
            .json(&json!({ "nick": nickname }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn add_role(&self, user_id: i64, role_name: &str) -> Result<(), SyncError> {
        let role_id = self.role_id(role_name).await?;
        let response = self
            .http
            .put(format!(
                "{}/guilds/{}/members/{}/roles/{}",
                self.base_url, self.guild_id, user_id, role_id
            ))
            .header(reqwest::header::AUTHORIZATION, self.authorization())
            .header(reqwest::header::CONTENT_LENGTH, "0")
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn send_message(&self, user_id: i64, content: &str) -> Result<(), SyncError> {
        let response = self
            .http
            .post(format!("{}/users/@me/channels", self.base_url))
            .header(reqwest::header::AUTHORIZATION, self.authorization())
            .json(&json!({ "recipient_id": user_id.to_string() }))
            .send()
            .await?;
        let channel: DmChannel = Self::check(response).await?.json().await?;

        let response = self
            .http
            .post(format!("{}/channels/{}/messages", self.base_url, channel.id))
            .header(reqwest::header::AUTHORIZATION, self.authorization())
            .json(&json!({ "content": content }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}
