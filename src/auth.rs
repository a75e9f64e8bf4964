use axum::{
    extract::{Form, FromRef, FromRequest, FromRequestParts, Request, State},
    http::{HeaderMap, HeaderValue, StatusCode, header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use subtle::ConstantTimeEq;

use crate::{
    config::{AppConfig, Env},
    error::AppResult,
    models::{AdbUser, DiscordBotForm, Role},
    repository::RepositoryState,
    session,
};

/// RoleTier
///
/// The three access levels a route can require. Each tier lists every role that may
/// pass it; a user passes when any one of their roles is in the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleTier {
    Attendance,
    Organizer,
    Admin,
}

impl RoleTier {
    pub fn allowed_roles(&self) -> &'static [Role] {
        match self {
            RoleTier::Attendance => &[Role::Admin, Role::Organizer, Role::Attendance],
            RoleTier::Organizer => &[Role::Admin, Role::Organizer],
            RoleTier::Admin => &[Role::Admin],
        }
    }
}

/// True when the user holds at least one of `allowed`. A user without roles never passes.
pub fn user_is_allowed(allowed: &[Role], user: &AdbUser) -> bool {
    user.roles.iter().any(|role| allowed.contains(role))
}

/// main_role
///
/// The highest-privilege role held (admin > organizer > attendance), or `""` for
/// a user with no roles. Shown in the page header.
pub fn main_role(user: &AdbUser) -> &'static str {
    [Role::Admin, Role::Organizer, Role::Attendance]
        .into_iter()
        .find(|role| user.roles.contains(role))
        .map(|role| role.as_str())
        .unwrap_or("")
}

/// AuthUser
///
/// The resolved, enabled user behind a request. Inserted into the request extensions
/// by the role guards, and extractable in any handler.
#[derive(Debug, Clone)]
pub struct AuthUser(pub AdbUser);

/// resolve_user
///
/// Finds the user a request acts as, or `None` when it is unauthenticated.
///
/// 1. Local bypass: with `Env::Local`, an `x-user-id` header naming an existing user.
/// 2. Session: a valid `auth-session` cookie.
///
/// Both paths load the user from the repository, so a deleted or disabled user is
/// treated as unauthenticated no matter what the cookie says.
pub async fn resolve_user(
    repo: &RepositoryState,
    config: &AppConfig,
    headers: &HeaderMap,
) -> AppResult<Option<AdbUser>> {
    if config.env == Env::Local {
        let bypass_id = headers
            .get("x-user-id")
            .and_then(|value| value.to_str().ok())
            .and_then(|raw| raw.trim().parse::<i32>().ok());
        if let Some(user_id) = bypass_id {
            if let Some(user) = repo.get_user(user_id).await? {
                return Ok(enabled(user));
            }
        }
    }

    let Some(token) = session::session_token(headers) else {
        return Ok(None);
    };
    let Some(user_id) = session::verify_session(&config.cookie_secret, token) else {
        tracing::debug!("rejected invalid session cookie");
        return Ok(None);
    };

    Ok(repo.get_user(user_id).await?.and_then(enabled))
}

fn enabled(user: AdbUser) -> Option<AdbUser> {
    if user.disabled {
        tracing::info!(user_id = user.id, "disabled user presented a session");
        return None;
    }
    Some(user)
}

/// Handlers behind a guard read the user from the request extensions. Outside a guard
/// the extractor resolves the user itself and rejects unauthenticated requests with 400.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        match resolve_user(&repo, &config, &parts.headers).await {
            Ok(Some(user)) => Ok(AuthUser(user)),
            Ok(None) => Err(StatusCode::BAD_REQUEST),
            Err(e) => {
                tracing::error!(error = %e, "failed to resolve user");
                Err(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}

// --- Role guards ---

fn redirect(location: &'static str) -> Response {
    (
        StatusCode::FOUND,
        [(header::LOCATION, HeaderValue::from_static(location))],
    )
        .into_response()
}

fn redirect_to_login() -> Response {
    (
        StatusCode::FOUND,
        [
            (header::LOCATION, HeaderValue::from_static("/login")),
            (header::SET_COOKIE, session::clear_session_cookie()),
        ],
    )
        .into_response()
}

/// page_guard
///
/// Guard for HTML routes. Unauthenticated requests are sent to `/login` with the
/// session cookie cleared; authenticated users without a role of the tier go to `/403`.
pub async fn page_guard(
    repo: &RepositoryState,
    config: &AppConfig,
    tier: RoleTier,
    mut request: Request,
    next: Next,
) -> Response {
    match resolve_user(repo, config, request.headers()).await {
        Err(e) => e.into_response(),
        Ok(None) => redirect_to_login(),
        Ok(Some(user)) if !user_is_allowed(tier.allowed_roles(), &user) => {
            tracing::info!(user_id = user.id, ?tier, "page access denied");
            redirect("/403")
        }
        Ok(Some(user)) => {
            request.extensions_mut().insert(AuthUser(user));
            next.run(request).await
        }
    }
}

/// api_guard
///
/// Guard for JSON routes: 400 when unauthenticated, 403 for the wrong role, no body.
pub async fn api_guard(
    repo: &RepositoryState,
    config: &AppConfig,
    tier: RoleTier,
    mut request: Request,
    next: Next,
) -> Response {
    match resolve_user(repo, config, request.headers()).await {
        Err(e) => e.into_response(),
        Ok(None) => StatusCode::BAD_REQUEST.into_response(),
        Ok(Some(user)) if !user_is_allowed(tier.allowed_roles(), &user) => {
            tracing::info!(user_id = user.id, ?tier, "api access denied");
            StatusCode::FORBIDDEN.into_response()
        }
        Ok(Some(user)) => {
            request.extensions_mut().insert(AuthUser(user));
            next.run(request).await
        }
    }
}

pub async fn attendance_page(
    State(repo): State<RepositoryState>,
    State(config): State<AppConfig>,
    request: Request,
    next: Next,
) -> Response {
    page_guard(&repo, &config, RoleTier::Attendance, request, next).await
}

pub async fn organizer_page(
    State(repo): State<RepositoryState>,
    State(config): State<AppConfig>,
    request: Request,
    next: Next,
) -> Response {
    page_guard(&repo, &config, RoleTier::Organizer, request, next).await
}

pub async fn admin_page(
    State(repo): State<RepositoryState>,
    State(config): State<AppConfig>,
    request: Request,
    next: Next,
) -> Response {
    page_guard(&repo, &config, RoleTier::Admin, request, next).await
}

pub async fn attendance_api(
    State(repo): State<RepositoryState>,
    State(config): State<AppConfig>,
    request: Request,
    next: Next,
) -> Response {
    api_guard(&repo, &config, RoleTier::Attendance, request, next).await
}

pub async fn organizer_api(
    State(repo): State<RepositoryState>,
    State(config): State<AppConfig>,
    request: Request,
    next: Next,
) -> Response {
    api_guard(&repo, &config, RoleTier::Organizer, request, next).await
}

pub async fn admin_api(
    State(repo): State<RepositoryState>,
    State(config): State<AppConfig>,
    request: Request,
    next: Next,
) -> Response {
    api_guard(&repo, &config, RoleTier::Admin, request, next).await
}

// --- Discord bot guard ---

/// Constant-time comparison against the configured secret. An unset secret rejects
/// every request.
pub fn bot_secret_matches(expected: Option<&str>, provided: &str) -> bool {
    match expected {
        Some(secret) if !secret.is_empty() => {
            secret.as_bytes().ct_eq(provided.as_bytes()).into()
        }
        _ => false,
    }
}

/// BotRequest
///
/// Form posted by the Discord bot, accepted only when its `auth` field matches the
/// configured bot secret. An unreadable form is rejected with 400, a wrong secret
/// with 401.
#[derive(Debug, Clone)]
pub struct BotRequest(pub DiscordBotForm);

impl<S> FromRequest<S> for BotRequest
where
    S: Send + Sync,
    AppConfig: FromRef<S>,
{
    type Rejection = StatusCode;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let config = AppConfig::from_ref(state);
        let Form(form) = Form::<DiscordBotForm>::from_request(request, state)
            .await
            .map_err(|_| StatusCode::BAD_REQUEST)?;

        if !bot_secret_matches(config.discord.secret.as_deref(), &form.auth) {
            tracing::warn!("discord bot request with invalid secret");
            return Err(StatusCode::UNAUTHORIZED);
        }
        Ok(BotRequest(form))
    }
}
