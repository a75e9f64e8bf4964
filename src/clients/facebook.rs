use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;

use crate::models::{FacebookEvent, FacebookPage};
use crate::sync::SyncError;

const GRAPH_API: &str = "https://graph.facebook.com";
const EVENT_FIELDS: &str =
    "id,name,description,start_time,end_time,attending_count,interested_count,is_canceled,place,cover";
// Graph API timestamps, e.g. 2024-03-02T18:00:00-0800.
const GRAPH_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

#[derive(Debug, Deserialize, Default)]
pub struct GraphEventsResponse {
    #[serde(default)]
    pub data: Vec<GraphEvent>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct GraphEvent {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub start_time: String,
    #[serde(default)]
    pub end_time: String,
    #[serde(default)]
    pub attending_count: i32,
    #[serde(default)]
    pub interested_count: i32,
    #[serde(default)]
    pub is_canceled: bool,
    #[serde(default)]
    pub place: GraphPlace,
    #[serde(default)]
    pub cover: GraphCover,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct GraphPlace {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub location: GraphLocation,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct GraphLocation {
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub zip: String,
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct GraphCover {
    #[serde(default)]
    pub source: String,
}

/// Parses a Graph API timestamp, keeping the event's local wall-clock time.
pub fn parse_graph_time(raw: &str) -> Result<NaiveDateTime, SyncError> {
    DateTime::parse_from_str(raw, GRAPH_TIME_FORMAT)
        .map(|t| t.naive_local())
        .map_err(|_| SyncError::InvalidResponse(format!("bad event time {:?}", raw)))
}

impl GraphEvent {
    /// Flattens the Graph payload into an `fb_events` row for `page_id`.
    pub fn into_event(self, page_id: i64) -> Result<FacebookEvent, SyncError> {
        let id = self
            .id
            .parse::<i64>()
            .map_err(|_| SyncError::InvalidResponse(format!("bad event id {:?}", self.id)))?;
        let start_time = parse_graph_time(&self.start_time)?;
        let end_time = match self.end_time.trim() {
            "" => None,
            raw => Some(parse_graph_time(raw)?),
        };

        Ok(FacebookEvent {
            id,
            page_id,
            name: self.name,
            description: self.description,
            start_time,
            end_time,
            location_name: self.place.name,
            location_city: self.place.location.city,
            location_country: self.place.location.country,
            location_state: self.place.location.state,
            location_address: self.place.location.street,
            location_zip: self.place.location.zip,
            lat: self.place.location.latitude,
            lng: self.place.location.longitude,
            cover: self.cover.source,
            attending_count: self.attending_count,
            interested_count: self.interested_count,
            is_canceled: self.is_canceled,
            last_update: Utc::now(),
        })
    }
}

/// FacebookApi
///
/// Reads upcoming events of a page with the page's own access token.
#[async_trait]
pub trait FacebookApi: Send + Sync {
    async fn upcoming_events(&self, page: &FacebookPage) -> Result<Vec<GraphEvent>, SyncError>;
}

pub type FacebookState = Arc<dyn FacebookApi>;

#[derive(Clone)]
pub struct GraphClient {
    http: reqwest::Client,
    api_version: String,
}

impl GraphClient {
    pub fn new(api_version: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_version: api_version.to_string(),
        }
    }
}

#[async_trait]
impl FacebookApi for GraphClient {
    async fn upcoming_events(&self, page: &FacebookPage) -> Result<Vec<GraphEvent>, SyncError> {
        let response = self
            .http
            .get(format!("{}/{}/{}/events", GRAPH_API, self.api_version, page.id))
            .query(&[
                ("time_filter", "upcoming"),
                ("fields", EVENT_FIELDS),
                ("access_token", page.token.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let payload: GraphEventsResponse = response.json().await?;
        Ok(payload.data)
    }
}
