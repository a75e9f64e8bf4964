use crate::{AppState, handlers::discord};
use axum::{
    Router,
    routing::{get, post},
};

/// Discord Router Module
///
/// The bot endpoints are guarded by the `BotRequest` extractor, which checks the
/// shared secret in the posted form. The confirm link is opened by the member from
/// their inbox and carries its own one-time token.
pub fn discord_routes() -> Router<AppState> {
    Router::new()
        .route("/discord/status", post(discord::discord_status))
        .route("/discord/generate", post(discord::discord_generate))
        .route("/discord/confirm/{id}/{token}", get(discord::discord_confirm))
}
