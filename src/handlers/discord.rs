use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    AppState,
    auth::BotRequest,
    clients::OutgoingEmail,
    error::{AppError, AppResult},
    models::{Activist, DiscordStatus, DiscordUser},
    pages::{PageData, render_page},
};

pub const VERIFIED_ROLE: &str = "Verified";
const BAY_AREA_ROLE: &str = "SF Bay Area, USA";
const ORGANIZER_ROLE: &str = "Organizer";

/// Guild roles granted on top of `Verified` for an activist level, and the welcome
/// message sent with them.
pub fn level_roles(activist_level: &str, support_email: &str) -> (Vec<&'static str>, String) {
    match activist_level {
        "Chapter Member" => (
            vec![BAY_AREA_ROLE],
            "Your email has been confirmed. I've added you to the Chapter Member channels. Welcome!"
                .to_string(),
        ),
        "Organizer" => (
            vec![BAY_AREA_ROLE, ORGANIZER_ROLE],
            "Your email has been confirmed. I've added you to the Chapter Member and Organizer channels. Welcome!"
                .to_string(),
        ),
        _ => (
            Vec::new(),
            format!(
                "Based on my records, it appears that you are not a DxE SF Bay chapter member. If this isn't right, please email {} for help.",
                support_email
            ),
        ),
    }
}

/// 64 hex characters of randomness for the confirmation link.
pub fn generate_token() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

fn parse_discord_id(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok().filter(|id| *id > 0)
}

/// discord_status
///
/// [Discord Bot Route] Whether a Discord account has a pending or confirmed link.
#[utoipa::path(
    post,
    path = "/discord/status",
    responses(
        (status = 200, description = "{status: \"not found\" | \"pending\" | \"confirmed\"}"),
        (status = 401, description = "Bad bot secret")
    )
)]
pub async fn discord_status(
    State(state): State<AppState>,
    BotRequest(form): BotRequest,
) -> AppResult<Response> {
    let Some(discord_id) = parse_discord_id(&form.id) else {
        return Ok(StatusCode::BAD_REQUEST.into_response());
    };
    let status = state.repo.discord_status(discord_id).await?;
    tracing::debug!(discord_id, ?status, "discord status lookup");
    Ok(Json(json!({ "status": status })).into_response())
}

fn confirmation_email(from: &str, to: &str, link: &str) -> OutgoingEmail {
    OutgoingEmail {
        from: from.to_string(),
        to: to.to_string(),
        subject: "Please verify your email".to_string(),
        body_text: format!(
            "Hello, Please click this link to verify your email address: {} Cheers, The DxE Discord Bot",
            link
        ),
        body_html: Some(format!(
            "<p>Hello,</p><p>Please click the link below to verify your email address.</p><p><a href=\"{}\">CONFIRM</a></p><p>Cheers,<br />The DxE Discord Bot</p><br /><br /><br /><p><em>This email was sent to you by DxE to verify your email address for Discord. If you did not request this verification, please do not click the above link.</em></p>",
            link
        )),
    }
}

/// discord_generate
///
/// [Discord Bot Route] Starts linking a Discord account to the activist with the given
/// email. Requires exactly one such activist and an account that is not confirmed yet.
/// A fresh token replaces any pending one and the confirmation link is emailed.
#[utoipa::path(
    post,
    path = "/discord/generate",
    responses(
        (status = 200, description = "{status: \"success\" | \"invalid email\" | \"too many activists\" | \"already confirmed\"}"),
        (status = 401, description = "Bad bot secret")
    )
)]
pub async fn discord_generate(
    State(state): State<AppState>,
    BotRequest(form): BotRequest,
) -> AppResult<Response> {
    let Some(discord_id) = parse_discord_id(&form.id) else {
        return Ok(StatusCode::BAD_REQUEST.into_response());
    };
    let email = form.email.trim().to_string();
    let reply = |status: &str| -> AppResult<Response> {
        Ok(Json(json!({ "status": status })).into_response())
    };

    if email.is_empty() {
        return reply("invalid email");
    }
    match state.repo.find_activists_by_email(&email).await?.len() {
        0 => return reply("invalid email"),
        1 => {}
        _ => return reply("too many activists"),
    }
    if state.repo.discord_status(discord_id).await? == DiscordStatus::Confirmed {
        return reply("already confirmed");
    }

    let user = DiscordUser {
        id: discord_id,
        email,
        token: generate_token(),
    };
    state.repo.upsert_discord_user(&user).await?;

    match (state.mailer.as_ref(), state.config.discord.from_email.as_deref()) {
        (Some(mailer), Some(from)) => {
            let link = format!(
                "{}/discord/confirm/{}/{}",
                state.config.adb_url.trim_end_matches('/'),
                user.id,
                user.token
            );
            mailer
                .send(&confirmation_email(from, &user.email, &link))
                .await
                .map_err(|e| AppError::Upstream(e.to_string()))?;
            tracing::info!(discord_id, "discord confirmation email sent");
        }
        _ => tracing::warn!(
            email = %user.email,
            "discord confirmation email not sent: SES or sender address not configured"
        ),
    }

    reply("success")
}

fn discord_page(state: &AppState, page_name: &str, message: String) -> Html<String> {
    render_page(
        &state.config,
        PageData::new("discord", page_name).with_data(json!({ "message": message })),
    )
}

fn confirm_error(state: &AppState, message: String) -> Html<String> {
    discord_page(state, "Error", message)
}

fn support_error(state: &AppState) -> String {
    format!(
        "There was a problem verifying your email. Please try again or contact {}.",
        state.config.support_email
    )
}

/// Applies the confirmed link on Discord. Failures are logged and skipped.
async fn update_discord_member(state: &AppState, discord_id: i64, activist: &Activist) {
    let Some(discord) = state.discord.as_ref() else {
        tracing::warn!(discord_id, "discord bot not configured; skipping member update");
        return;
    };

    if let Err(e) = discord.set_nickname(discord_id, &activist.name).await {
        tracing::warn!(discord_id, error = %e, "could not set discord nickname");
    }

    let (extra_roles, welcome) = level_roles(&activist.activist_level, &state.config.support_email);
    for role in std::iter::once(VERIFIED_ROLE).chain(extra_roles) {
        if let Err(e) = discord.add_role(discord_id, role).await {
            tracing::warn!(discord_id, role, error = %e, "could not add discord role");
        }
    }

    if let Err(e) = discord.send_message(discord_id, &welcome).await {
        tracing::warn!(discord_id, error = %e, "could not send discord welcome message");
    }
}

/// discord_confirm
///
/// [Public Route] Target of the emailed link. Once exactly one activist matches the
/// email, confirms the pending record, stores the Discord id on the activist and
/// updates the guild member. Without a single match the record stays pending. Always renders the
/// `discord` page with a success or error message.
pub async fn discord_confirm(
    State(state): State<AppState>,
    Path((id, token)): Path<(String, String)>,
) -> AppResult<Html<String>> {
    let valid_token = !token.is_empty() && token.chars().all(|c| c.is_ascii_alphanumeric());
    let Some(discord_id) = parse_discord_id(&id).filter(|_| valid_token) else {
        return Ok(confirm_error(&state, support_error(&state)));
    };

    let Some(email) = state.repo.pending_discord_email(discord_id, &token).await? else {
        tracing::info!(discord_id, "discord confirmation rejected");
        return Ok(confirm_error(&state, support_error(&state)));
    };

    let mut activists = state.repo.find_activists_by_email(&email).await?;
    if activists.len() != 1 {
        let message = if activists.is_empty() {
            "Your email address is not associated with any activist."
        } else {
            "There are multiple activists associated with your email address."
        };
        return Ok(confirm_error(
            &state,
            format!(
                "{} Please reach out to {} for assistance.",
                message, state.config.support_email
            ),
        ));
    }
    let activist = activists.remove(0);

    if !state
        .repo
        .confirm_discord_user(discord_id, &token, activist.id)
        .await?
    {
        tracing::info!(discord_id, "discord confirmation already used");
        return Ok(confirm_error(&state, support_error(&state)));
    }
    tracing::info!(discord_id, activist_id = activist.id, "discord account linked");

    update_discord_member(&state, discord_id, &activist).await;

    Ok(discord_page(
        &state,
        "Success",
        "Your email has been confirmed.".to_string(),
    ))
}
