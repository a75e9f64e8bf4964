use axum::{
    Form, Json,
    extract::{State, rejection::FormRejection},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    AppState,
    config::AppConfig,
    error::AppResult,
    pages::{PageData, render_page},
    session,
};

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct TokenSignInForm {
    #[serde(default)]
    pub idtoken: String,
}

fn rejected() -> Response {
    Json(json!({ "redirect": false, "message": "Email is not valid" })).into_response()
}

/// token_sign_in
///
/// [Public Route] Exchanges a Google ID token for a session cookie. Only enabled
/// users known to the database may sign in.
#[utoipa::path(
    post,
    path = "/tokensignin",
    request_body(content = TokenSignInForm, content_type = "application/x-www-form-urlencoded"),
    responses((status = 200, description = "{redirect: bool, message?: string}"))
)]
pub async fn token_sign_in(
    State(state): State<AppState>,
    form: Result<Form<TokenSignInForm>, FormRejection>,
) -> AppResult<Response> {
    let Form(form) = form?;

    let Some(email) = state.verifier.verify(&form.idtoken).await? else {
        return Ok(rejected());
    };

    let user = match state.repo.get_user_by_email(&email).await? {
        Some(user) if !user.disabled => user,
        _ => {
            tracing::info!(%email, "sign-in refused for unknown or disabled user");
            return Ok(rejected());
        }
    };

    let cookie = session::session_cookie(&state.config.cookie_secret, user.id)?;
    tracing::info!(user_id = user.id, "user signed in");
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(json!({ "redirect": true })),
    )
        .into_response())
}

pub async fn login(State(config): State<AppConfig>) -> Html<String> {
    render_page(&config, PageData::new("login", "Login"))
}

pub async fn logout(State(config): State<AppConfig>) -> Response {
    (
        [(header::SET_COOKIE, session::clear_session_cookie())],
        render_page(&config, PageData::new("logout", "Logout")),
    )
        .into_response()
}

pub async fn forbidden(State(config): State<AppConfig>) -> Response {
    (
        StatusCode::FORBIDDEN,
        render_page(&config, PageData::new("403", "403 - Forbidden")),
    )
        .into_response()
}
