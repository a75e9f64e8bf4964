use crate::{
    AppState,
    handlers::{public, session},
};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a session: the sign-in flow, the error page, and the
/// chapter directory read by the public website. Nothing here exposes a page token.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for the load balancer.
        .route("/health", get(public::health))
        // --- Session ---
        .route("/login", get(session::login))
        // Clears the session cookie and renders the logout page.
        .route("/logout", get(session::logout))
        .route("/403", get(session::forbidden))
        // POST /tokensignin
        // Exchanges a Google ID token for the `auth-session` cookie.
        .route("/tokensignin", post(session::token_sign_in))
        // --- Chapter directory ---
        // GET /fb_events/{page_id}?start_time=&end_time=
        // Falls back to online events when the page has none in the window.
        .route("/fb_events/{page_id}", get(public::list_fb_events))
        // GET /fb_page/{lat},{lng}
        // Path params are whole segments in axum, so the pair is parsed by the handler.
        .route("/fb_page/{coords}", get(public::find_nearest_chapters))
        .route("/fb_pages", get(public::list_fb_pages))
        .route("/chapters", get(public::list_chapters))
}
