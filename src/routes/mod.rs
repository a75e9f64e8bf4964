/// Router Module Index
///
/// Routes are grouped by the guard that protects them. Each tier module returns
/// unguarded routers; `create_router` attaches the matching role guard with
/// `route_layer`, so a route can only be reached through the guard of its group.

/// Unauthenticated pages and JSON endpoints (sign-in, chapter directory, health).
pub mod public;

/// HTML pages. Failed checks redirect to `/login` or `/403`.
pub mod pages;

/// JSON API. Failed checks answer 400 or 403 with no body.
pub mod api;

/// Discord bot endpoints (shared-secret form guard) and the public confirm link.
pub mod discord;
