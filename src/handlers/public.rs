use std::collections::BTreeMap;
use std::net::{IpAddr, SocketAddr};

use axum::{
    Json,
    extract::{ConnectInfo, Path, Query, State, rejection::QueryRejection},
    http::{Extensions, HeaderMap},
};
use chrono::{NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{
    AppState,
    error::{AppError, AppResult},
    models::ChapterPublic,
    repository::RepositoryState,
};

/// How many chapters `/fb_page` returns.
pub const NEAREST_CHAPTERS: usize = 3;

const EARTH_RADIUS_MILES: f64 = 3958.8;

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct FbEventsQuery {
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

/// Accepts `YYYY-MM-DD` (midnight) or `YYYY-MM-DDTHH:MM`.
pub fn parse_event_time(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.len() == 10 {
        return NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0));
    }
    if raw.len() == 16 {
        return NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M").ok();
    }
    None
}

fn format_error(field: &str) -> Json<Value> {
    Json(json!({ "error": format!("{} format incorrect", field) }))
}

/// list_fb_events
///
/// [Public Route] Upcoming events of one chapter page. When the page has none in the
/// window, online events from every page are returned instead and
/// `local_events_found` is false.
#[utoipa::path(
    get,
    path = "/fb_events/{page_id}",
    params(("page_id" = i64, Path, description = "Facebook page id"), FbEventsQuery),
    responses((status = 200, description = "{local_events_found, events}"))
)]
pub async fn list_fb_events(
    State(repo): State<RepositoryState>,
    Path(page_id): Path<i64>,
    query: Result<Query<FbEventsQuery>, QueryRejection>,
) -> AppResult<Json<Value>> {
    let Query(query) = query?;

    let start = match query.start_time.as_deref() {
        None => Utc::now().naive_utc(),
        Some(raw) => match parse_event_time(raw) {
            Some(start) => start,
            None => return Ok(format_error("start_time")),
        },
    };
    let end = match query.end_time.as_deref() {
        None => None,
        Some(raw) => match parse_event_time(raw) {
            Some(end) => Some(end),
            None => return Ok(format_error("end_time")),
        },
    };

    let mut events = repo.fb_events_for_page(page_id, start, end).await?;
    let local_events_found = !events.is_empty();
    if !local_events_found {
        events = repo.online_fb_events(start, end).await?;
    }

    Ok(Json(json!({
        "local_events_found": local_events_found,
        "events": events,
    })))
}

/// Great-circle distance in miles.
pub fn haversine_miles(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lng2 - lng1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_MILES * a.sqrt().asin()
}

/// The `limit` chapters closest to the point, nearest first, each with `distance` set.
pub fn nearest_chapters(
    chapters: Vec<ChapterPublic>,
    lat: f64,
    lng: f64,
    limit: usize,
) -> Vec<ChapterPublic> {
    let mut chapters: Vec<ChapterPublic> = chapters
        .into_iter()
        .map(|mut c| {
            c.distance = Some(haversine_miles(lat, lng, c.lat, c.lng));
            c
        })
        .collect();
    chapters.sort_by(|a, b| {
        let far = |c: &ChapterPublic| c.distance.unwrap_or(f64::MAX);
        far(a).total_cmp(&far(b))
    });
    chapters.truncate(limit);
    chapters
}

/// Parses the `{lat},{lng}` path segment.
pub fn parse_coordinates(raw: &str) -> Option<(f64, f64)> {
    let (lat, lng) = raw.split_once(',')?;
    let lat = lat.trim().parse::<f64>().ok()?;
    let lng = lng.trim().parse::<f64>().ok()?;
    (lat.is_finite() && lng.is_finite()).then_some((lat, lng))
}

fn strip_port(raw: &str) -> String {
    let raw = raw.trim();
    if let Ok(addr) = raw.parse::<SocketAddr>() {
        return addr.ip().to_string();
    }
    if let Ok(ip) = raw.parse::<IpAddr>() {
        return ip.to_string();
    }
    raw.split(':').next().unwrap_or(raw).to_string()
}

/// The caller's IP: first `X-Forwarded-For` entry, else the peer address.
pub fn client_ip(headers: &HeaderMap, extensions: &Extensions) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(strip_port)
        .filter(|ip| !ip.is_empty());
    if forwarded.is_some() {
        return forwarded;
    }
    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
}

/// find_nearest_chapters
///
/// [Public Route] The chapters nearest to `{lat},{lng}`. `0,0` means "near me": the
/// caller's IP is geolocated, which needs an ipgeolocation key.
#[utoipa::path(
    get,
    path = "/fb_page/{coords}",
    params(("coords" = String, Path, description = "Latitude and longitude, e.g. 37.77,-122.42")),
    responses((status = 200, description = "Nearest chapters", body = Vec<ChapterPublic>))
)]
pub async fn find_nearest_chapters(
    State(state): State<AppState>,
    Path(coords): Path<String>,
    headers: HeaderMap,
    extensions: Extensions,
) -> AppResult<Json<Value>> {
    let (mut lat, mut lng) = parse_coordinates(&coords)
        .ok_or_else(|| AppError::validation(format!("Invalid coordinates: {:?}", coords)))?;

    if lat == 0.0 && lng == 0.0 {
        let Some(geolocator) = state.geolocator.as_ref() else {
            return Ok(Json(json!({
                "status": "error",
                "message": "Geolocation API key not configured",
            })));
        };
        let ip = client_ip(&headers, &extensions)
            .ok_or_else(|| AppError::validation("Could not determine client address"))?;
        (lat, lng) = geolocator.locate(&ip).await?;
        tracing::debug!(%ip, lat, lng, "geolocated caller");
    }

    let chapters = state.repo.list_public_chapters().await?;
    let nearest = nearest_chapters(chapters, lat, lng, NEAREST_CHAPTERS);
    Ok(Json(json!(nearest)))
}

/// list_fb_pages
///
/// [Public Route] Every chapter, without tokens, grouped by region.
#[utoipa::path(
    get,
    path = "/fb_pages",
    responses((status = 200, description = "Object of region -> chapters"))
)]
pub async fn list_fb_pages(
    State(repo): State<RepositoryState>,
) -> AppResult<Json<BTreeMap<String, Vec<ChapterPublic>>>> {
    let mut regions: BTreeMap<String, Vec<ChapterPublic>> = BTreeMap::new();
    for chapter in repo.list_public_chapters().await? {
        regions.entry(chapter.region.clone()).or_default().push(chapter);
    }
    Ok(Json(regions))
}

#[utoipa::path(
    get,
    path = "/chapters",
    responses(
        (status = 200, description = "Every chapter without its page token", body = Vec<ChapterPublic>)
    )
)]
pub async fn list_chapters(
    State(repo): State<RepositoryState>,
) -> AppResult<Json<Vec<ChapterPublic>>> {
    Ok(Json(repo.list_public_chapters().await?))
}

pub async fn health() -> &'static str {
    "ok"
}
