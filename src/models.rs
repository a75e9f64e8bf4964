use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;

// --- Users & Roles ---

/// Role
///
/// The closed set of staff roles. Any other value found in `users_roles` is ignored
/// when a user is loaded, so it can never grant access to anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    Admin,
    Organizer,
    Attendance,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Organizer => "organizer",
            Role::Attendance => "attendance",
        }
    }

    pub fn parse(raw: &str) -> Option<Role> {
        match raw.trim() {
            "admin" => Some(Role::Admin),
            "organizer" => Some(Role::Organizer),
            "attendance" => Some(Role::Attendance),
            _ => None,
        }
    }
}

/// AdbUser
///
/// A staff account allowed to sign in. Roles are loaded from `users_roles`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct AdbUser {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub disabled: bool,
    pub roles: Vec<Role>,
}

/// Payload for POST /user/save and /user/delete. `id == 0` creates a new user.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UserInput {
    #[serde(default)]
    pub id: i32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub disabled: bool,
}

impl UserInput {
    pub fn cleaned(self) -> Self {
        Self {
            id: self.id,
            name: self.name.trim().to_string(),
            email: self.email.trim().to_lowercase(),
            disabled: self.disabled,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UserRoleRequest {
    pub user_id: i32,
    pub role: String,
}

// --- Activists ---

/// Activist
///
/// Canonical activist record from the `activists` table.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Activist {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub location: String,
    pub facebook: String,
    pub activist_level: String,
    pub source: String,
    pub hidden: bool,
    pub discord_id: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// ActivistListItem
///
/// Row of the activist list views, enriched with attendance aggregates.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct ActivistListItem {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub location: String,
    pub facebook: String,
    pub activist_level: String,
    pub source: String,
    pub hidden: bool,
    pub discord_id: Option<String>,
    #[ts(type = "string | null")]
    pub first_event: Option<NaiveDate>,
    #[ts(type = "string | null")]
    pub last_event: Option<NaiveDate>,
    pub total_events: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct ActivistBasic {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub phone: String,
}

/// Payload for POST /activist/save. `id == 0` creates a new activist.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ActivistInput {
    #[serde(default)]
    pub id: i32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub facebook: String,
    #[serde(default)]
    pub activist_level: String,
    #[serde(default)]
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discord_id: Option<String>,
}

impl ActivistInput {
    /// Trims every field and rejects a missing name.
    pub fn cleaned(self) -> Result<Self, String> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err("Activist name cannot be empty".to_string());
        }
        let activist_level = match self.activist_level.trim() {
            "" => "Supporter".to_string(),
            level => level.to_string(),
        };
        Ok(Self {
            id: self.id,
            name,
            email: self.email.trim().to_string(),
            phone: self.phone.trim().to_string(),
            location: self.location.trim().to_string(),
            facebook: self.facebook.trim().to_string(),
            activist_level,
            source: self.source.trim().to_string(),
            discord_id: self
                .discord_id
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
        })
    }
}

impl From<Activist> for ActivistInput {
    fn from(a: Activist) -> Self {
        Self {
            id: a.id,
            name: a.name,
            email: a.email,
            phone: a.phone,
            location: a.location,
            facebook: a.facebook,
            activist_level: a.activist_level,
            source: a.source,
            discord_id: a.discord_id,
        }
    }
}

/// Filters accepted by POST /activist/list. All fields are optional.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ActivistFilter {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub activist_levels: Vec<String>,
    #[serde(default)]
    #[ts(type = "string | null")]
    pub last_event_from: Option<NaiveDate>,
    #[serde(default)]
    #[ts(type = "string | null")]
    pub last_event_to: Option<NaiveDate>,
    #[serde(default)]
    pub include_hidden: bool,
}

/// Keyset pagination request for POST /activist/list_range, ordered by name.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ActivistRange {
    #[serde(default)]
    pub after_name: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub descending: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct HideActivistRequest {
    pub id: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MergeActivistRequest {
    pub current_activist_id: i32,
    pub target_activist_name: String,
}

/// Contact details used by the mailers and list syncs.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Default, PartialEq)]
pub struct ActivistContact {
    pub id: i32,
    pub name: String,
    pub email: String,
}

// --- Events & Attendance ---

/// Event
///
/// An event with its attendee names. Connections are events of type `Connection`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Event {
    #[serde(rename = "event_id")]
    pub id: i32,
    #[serde(rename = "event_name")]
    pub name: String,
    #[serde(rename = "event_date")]
    #[ts(type = "string")]
    pub date: NaiveDate,
    pub event_type: String,
    pub attendees: Vec<String>,
}

/// Raw payload of POST /event/save and /connection/save.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct EventInput {
    #[serde(default)]
    pub event_id: i32,
    #[serde(default)]
    pub event_name: String,
    #[serde(default)]
    pub event_date: String,
    #[serde(default)]
    pub event_type: String,
    #[serde(default)]
    pub added_attendees: Vec<String>,
    #[serde(default)]
    pub deleted_attendees: Vec<String>,
}

/// EventDraft
///
/// A validated `EventInput`, ready to be written. Attendee names are trimmed,
/// non-empty and unique.
#[derive(Debug, Clone, PartialEq)]
pub struct EventDraft {
    pub id: i32,
    pub name: String,
    pub date: NaiveDate,
    pub event_type: String,
    pub added_attendees: Vec<String>,
    pub deleted_attendees: Vec<String>,
}

fn clean_names(names: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        let name = name.trim();
        if !name.is_empty() && !out.iter().any(|n| n == name) {
            out.push(name.to_string());
        }
    }
    out
}

impl EventInput {
    pub fn validate(self) -> Result<EventDraft, String> {
        let name = self.event_name.trim().to_string();
        if name.is_empty() {
            return Err("Event name cannot be empty".to_string());
        }
        let date = NaiveDate::parse_from_str(self.event_date.trim(), "%Y-%m-%d")
            .map_err(|_| format!("Invalid event date: {:?}", self.event_date))?;
        let event_type = self.event_type.trim().to_string();
        if event_type.is_empty() {
            return Err("Event type cannot be empty".to_string());
        }
        Ok(EventDraft {
            id: self.event_id,
            name,
            date,
            event_type,
            added_attendees: clean_names(self.added_attendees),
            deleted_attendees: clean_names(self.deleted_attendees),
        })
    }
}

/// Form fields of POST /event/list.
#[derive(Debug, Clone, Deserialize, Default, ToSchema, utoipa::IntoParams)]
pub struct EventListForm {
    #[serde(default)]
    pub event_name: String,
    #[serde(default)]
    pub event_activist: String,
    #[serde(default)]
    pub event_date_start: String,
    #[serde(default)]
    pub event_date_end: String,
    #[serde(default)]
    pub event_type: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventFilter {
    pub name: Option<String>,
    pub activist: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub event_type: Option<String>,
}

fn non_empty(raw: &str) -> Option<String> {
    let raw = raw.trim();
    (!raw.is_empty()).then(|| raw.to_string())
}

fn parse_optional_date(raw: &str, field: &str) -> Result<Option<NaiveDate>, String> {
    match non_empty(raw) {
        None => Ok(None),
        Some(d) => NaiveDate::parse_from_str(&d, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| format!("Invalid {}: {:?}", field, d)),
    }
}

impl EventListForm {
    pub fn into_filter(self) -> Result<EventFilter, String> {
        Ok(EventFilter {
            name: non_empty(&self.event_name),
            activist: non_empty(&self.event_activist),
            date_from: parse_optional_date(&self.event_date_start, "event_date_start")?,
            date_to: parse_optional_date(&self.event_date_end, "event_date_end")?,
            event_type: non_empty(&self.event_type),
        })
    }
}

#[derive(Debug, Clone, Deserialize, Default, ToSchema)]
pub struct EventDeleteForm {
    #[serde(default)]
    pub event_id: String,
}

// --- Working Groups & Circles ---

/// Which group table a request targets. Working groups and circles share one shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GroupKind {
    WorkingGroup,
    Circle,
}

impl GroupKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupKind::WorkingGroup => "working_group",
            GroupKind::Circle => "circle",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct GroupMember {
    pub name: String,
    #[serde(default)]
    pub point_person: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct Group {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub description: String,
    pub visible: bool,
    pub members: Vec<GroupMember>,
}

/// Payload of POST /working_group/save and /circle/save. `id == 0` creates.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct GroupInput {
    #[serde(default)]
    pub id: i32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default)]
    pub members: Vec<GroupMember>,
}

fn default_visible() -> bool {
    true
}

impl GroupInput {
    pub fn cleaned(self) -> Result<Self, String> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err("Name cannot be empty".to_string());
        }
        let mut members: Vec<GroupMember> = Vec::with_capacity(self.members.len());
        for member in self.members {
            let member_name = member.name.trim().to_string();
            if member_name.is_empty() {
                continue;
            }
            if members.iter().any(|m| m.name == member_name) {
                return Err(format!("{} is listed more than once", member_name));
            }
            members.push(GroupMember {
                name: member_name,
                point_person: member.point_person,
            });
        }
        Ok(Self {
            id: self.id,
            name,
            email: self.email.trim().to_string(),
            description: self.description.trim().to_string(),
            visible: self.visible,
            members,
        })
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct WorkingGroupDeleteRequest {
    pub working_group_id: i32,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CircleDeleteRequest {
    pub circle_id: i32,
}

// --- Chapters & Facebook ---

/// Chapter
///
/// A chapter and its Facebook page. `token` is the page access token used by the
/// Facebook sync and must never leave the admin views.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Chapter {
    pub chapter_id: i32,
    // Facebook page id.
    pub id: i64,
    pub name: String,
    pub flag: String,
    pub fb_url: String,
    pub twitter_url: String,
    pub insta_url: String,
    pub email: String,
    pub region: String,
    pub lat: f64,
    pub lng: f64,
    pub token: String,
}

/// Chapter without its page token, for the unauthenticated endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct ChapterPublic {
    pub chapter_id: i32,
    pub id: i64,
    pub name: String,
    pub flag: String,
    pub fb_url: String,
    pub twitter_url: String,
    pub insta_url: String,
    pub email: String,
    pub region: String,
    pub lat: f64,
    pub lng: f64,
    #[sqlx(skip)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
}

/// Form posted by the admin chapter editor (/chapter/insert, /chapter/update).
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ChapterForm {
    #[serde(rename = "facebook-id", default)]
    pub facebook_id: String,
    #[serde(rename = "chapter-id", default)]
    pub chapter_id: String,
    #[serde(default)]
    pub lat: String,
    #[serde(default)]
    pub lng: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub flag: String,
    #[serde(default)]
    pub facebook: String,
    #[serde(default)]
    pub twitter: String,
    #[serde(default)]
    pub instagram: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub token: String,
}

impl ChapterForm {
    /// Parses the numeric fields. `chapter-id` may be blank for inserts.
    pub fn into_chapter(self) -> Result<Chapter, String> {
        let id = self
            .facebook_id
            .trim()
            .parse::<i64>()
            .map_err(|_| format!("Invalid Facebook page id: {:?}", self.facebook_id))?;
        let chapter_id = match self.chapter_id.trim() {
            "" => 0,
            raw => raw
                .parse::<i32>()
                .map_err(|_| format!("Invalid chapter id: {:?}", raw))?,
        };
        let lat = self
            .lat
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("Invalid latitude: {:?}", self.lat))?;
        let lng = self
            .lng
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("Invalid longitude: {:?}", self.lng))?;
        Ok(Chapter {
            chapter_id,
            id,
            name: self.name.trim().to_string(),
            flag: self.flag.trim().to_string(),
            fb_url: self.facebook.trim().to_string(),
            twitter_url: self.twitter.trim().to_string(),
            insta_url: self.instagram.trim().to_string(),
            email: self.email.trim().to_string(),
            region: self.region.trim().to_string(),
            lat,
            lng,
            token: self.token.trim().to_string(),
        })
    }
}

/// A Facebook event mirrored into `fb_events` by the sync job.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct FacebookEvent {
    pub id: i64,
    pub page_id: i64,
    pub name: String,
    pub description: String,
    #[ts(type = "string")]
    pub start_time: NaiveDateTime,
    #[ts(type = "string | null")]
    pub end_time: Option<NaiveDateTime>,
    pub location_name: String,
    pub location_city: String,
    pub location_country: String,
    pub location_state: String,
    pub location_address: String,
    pub location_zip: String,
    pub lat: f64,
    pub lng: f64,
    pub cover: String,
    pub attending_count: i32,
    pub interested_count: i32,
    pub is_canceled: bool,
    #[ts(type = "string")]
    pub last_update: DateTime<Utc>,
}

/// A chapter page the Facebook sync can read events from.
#[derive(Debug, Clone, FromRow, Default, PartialEq)]
pub struct FacebookPage {
    pub id: i64,
    pub name: String,
    pub token: String,
}

// --- Discord ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub enum DiscordStatus {
    #[serde(rename = "not found")]
    NotFound,
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "confirmed")]
    Confirmed,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiscordUser {
    pub id: i64,
    pub email: String,
    pub token: String,
}

/// Form fields posted by the Discord bot. `auth` carries the shared secret.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct DiscordBotForm {
    #[serde(default)]
    pub auth: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub email: String,
}

// --- Supporters ---

/// The subset of a supporter the Sendy sync needs.
#[derive(Debug, Clone, FromRow, Default, PartialEq)]
pub struct SupporterBasic {
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl SupporterBasic {
    /// Trimmed first and last name joined by a space, skipping empty parts.
    pub fn display_name(&self) -> String {
        let first = self.first_name.trim();
        let last = self.last_name.trim();
        match (first.is_empty(), last.is_empty()) {
            (false, false) => format!("{} {}", first, last),
            (false, true) => first.to_string(),
            (true, false) => last.to_string(),
            (true, true) => String::new(),
        }
    }
}

/// An event the survey mailer has not yet handled.
#[derive(Debug, Clone, FromRow, Default, PartialEq)]
pub struct SurveyEvent {
    pub id: i32,
    pub name: String,
    pub date: NaiveDate,
    pub event_type: String,
}
