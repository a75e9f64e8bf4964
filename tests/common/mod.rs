#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use adb::{
    AppConfig, AppState, AppError, AppResult,
    clients::{
        DiscordApi, DiscordState, Geolocator, GeolocatorState, IdTokenVerifier, MailerState,
        MockMailer, SendyClient, VerifierState,
    },
    models::{
        Activist, ActivistBasic, ActivistFilter, ActivistInput, ActivistListItem, ActivistRange,
        AdbUser, Chapter, ChapterPublic, DiscordStatus, DiscordUser, Event, EventDraft,
        EventFilter, FacebookEvent, Group, GroupInput, GroupKind, Role, UserInput,
    },
    repository::{Repository, RepositoryState},
    session,
    sync::SyncError,
};
use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, Response, header},
};
use chrono::NaiveDateTime;
use serde_json::Value;

// --- Fixtures ---

pub fn user(id: i32, email: &str, roles: &[Role]) -> AdbUser {
    AdbUser {
        id,
        name: format!("User {}", id),
        email: email.to_string(),
        disabled: false,
        roles: roles.to_vec(),
    }
}

pub fn activist(id: i32, name: &str, email: &str, level: &str) -> Activist {
    Activist {
        id,
        name: name.to_string(),
        email: email.to_string(),
        activist_level: level.to_string(),
        ..Activist::default()
    }
}

pub fn chapter(chapter_id: i32, name: &str, region: &str, lat: f64, lng: f64) -> Chapter {
    Chapter {
        chapter_id,
        id: 1000 + chapter_id as i64,
        name: name.to_string(),
        region: region.to_string(),
        lat,
        lng,
        token: format!("secret-token-{}", chapter_id),
        ..Chapter::default()
    }
}

/// The users most guard tests need: one per role, a disabled admin and a user
/// without roles.
pub fn staff() -> Vec<AdbUser> {
    let mut disabled = user(4, "disabled@example.org", &[Role::Admin]);
    disabled.disabled = true;
    vec![
        user(1, "admin@example.org", &[Role::Admin]),
        user(2, "organizer@example.org", &[Role::Organizer]),
        user(3, "attendance@example.org", &[Role::Attendance]),
        disabled,
        user(5, "nobody@example.org", &[]),
    ]
}

// --- Mock Repository ---

#[derive(Default)]
pub struct MockData {
    pub users: Vec<AdbUser>,
    pub activists: Vec<Activist>,
    pub events: Vec<Event>,
    pub groups: Vec<(GroupKind, Group)>,
    pub chapters: Vec<Chapter>,
    pub fb_events: Vec<FacebookEvent>,
    pub discord_users: Vec<(DiscordUser, bool)>,
    pub merges: Vec<(i32, String)>,
}

/// MockRepo
///
/// In-memory `Repository` with just enough behaviour for handler and guard tests.
#[derive(Default)]
pub struct MockRepo {
    pub data: Mutex<MockData>,
}

impl MockRepo {
    pub fn with_users(users: Vec<AdbUser>) -> Self {
        let repo = Self::default();
        repo.data.lock().unwrap().users = users;
        repo
    }

    pub fn with<F: FnOnce(&mut MockData)>(self, setup: F) -> Self {
        setup(&mut self.data.lock().unwrap());
        self
    }
}

fn next_id<T>(items: &[T], id: impl Fn(&T) -> i32) -> i32 {
    items.iter().map(id).max().unwrap_or(0) + 1
}

fn public(chapter: &Chapter) -> ChapterPublic {
    ChapterPublic {
        chapter_id: chapter.chapter_id,
        id: chapter.id,
        name: chapter.name.clone(),
        flag: chapter.flag.clone(),
        fb_url: chapter.fb_url.clone(),
        twitter_url: chapter.twitter_url.clone(),
        insta_url: chapter.insta_url.clone(),
        email: chapter.email.clone(),
        region: chapter.region.clone(),
        lat: chapter.lat,
        lng: chapter.lng,
        distance: None,
    }
}

fn list_item(a: &Activist) -> ActivistListItem {
    ActivistListItem {
        id: a.id,
        name: a.name.clone(),
        email: a.email.clone(),
        activist_level: a.activist_level.clone(),
        hidden: a.hidden,
        discord_id: a.discord_id.clone(),
        ..ActivistListItem::default()
    }
}

fn in_window(event: &FacebookEvent, start: NaiveDateTime, end: Option<NaiveDateTime>) -> bool {
    event.start_time >= start && end.is_none_or(|end| event.start_time <= end) && !event.is_canceled
}

#[async_trait]
impl Repository for MockRepo {
    async fn get_user(&self, id: i32) -> AppResult<Option<AdbUser>> {
        let data = self.data.lock().unwrap();
        Ok(data.users.iter().find(|u| u.id == id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> AppResult<Option<AdbUser>> {
        let data = self.data.lock().unwrap();
        Ok(data
            .users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn list_users(&self) -> AppResult<Vec<AdbUser>> {
        Ok(self.data.lock().unwrap().users.clone())
    }

    async fn save_user(&self, input: UserInput) -> AppResult<AdbUser> {
        let mut data = self.data.lock().unwrap();
        if data
            .users
            .iter()
            .any(|u| u.email == input.email && u.id != input.id)
        {
            return Err(AppError::validation("A user with that email already exists"));
        }
        if input.id == 0 {
            let saved = AdbUser {
                id: next_id(&data.users, |u| u.id),
                name: input.name,
                email: input.email,
                disabled: input.disabled,
                roles: Vec::new(),
            };
            data.users.push(saved.clone());
            return Ok(saved);
        }
        let existing = data
            .users
            .iter_mut()
            .find(|u| u.id == input.id)
            .ok_or_else(|| AppError::not_found("User not found"))?;
        existing.name = input.name;
        existing.email = input.email;
        existing.disabled = input.disabled;
        Ok(existing.clone())
    }

    async fn delete_user(&self, id: i32) -> AppResult<()> {
        let mut data = self.data.lock().unwrap();
        let before = data.users.len();
        data.users.retain(|u| u.id != id);
        if data.users.len() == before {
            return Err(AppError::not_found("User not found"));
        }
        Ok(())
    }

    async fn add_user_role(&self, user_id: i32, role: Role) -> AppResult<()> {
        let mut data = self.data.lock().unwrap();
        let user = data
            .users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or_else(|| AppError::not_found("User not found"))?;
        if !user.roles.contains(&role) {
            user.roles.push(role);
        }
        Ok(())
    }

    async fn remove_user_role(&self, user_id: i32, role: Role) -> AppResult<()> {
        let mut data = self.data.lock().unwrap();
        if let Some(user) = data.users.iter_mut().find(|u| u.id == user_id) {
            user.roles.retain(|r| *r != role);
        }
        Ok(())
    }

    async fn activist_names(&self) -> AppResult<Vec<String>> {
        let data = self.data.lock().unwrap();
        let mut names: Vec<String> = data
            .activists
            .iter()
            .filter(|a| !a.hidden)
            .map(|a| a.name.clone())
            .collect();
        names.sort();
        Ok(names)
    }

    async fn organizer_names(&self) -> AppResult<Vec<String>> {
        let data = self.data.lock().unwrap();
        let mut names: Vec<String> = data
            .activists
            .iter()
            .filter(|a| !a.hidden && a.activist_level == "Organizer")
            .map(|a| a.name.clone())
            .collect();
        names.sort();
        Ok(names)
    }

    async fn list_activists(&self, filter: &ActivistFilter) -> AppResult<Vec<ActivistListItem>> {
        let data = self.data.lock().unwrap();
        Ok(data
            .activists
            .iter()
            .filter(|a| filter.include_hidden || !a.hidden)
            .filter(|a| filter.name.as_deref().is_none_or(|n| a.name.contains(n)))
            .filter(|a| {
                let levels = &filter.activist_levels;
                levels.is_empty() || levels.contains(&a.activist_level)
            })
            .map(list_item)
            .collect())
    }

    async fn list_activists_basic(&self) -> AppResult<Vec<ActivistBasic>> {
        let data = self.data.lock().unwrap();
        Ok(data
            .activists
            .iter()
            .filter(|a| !a.hidden)
            .map(|a| ActivistBasic {
                id: a.id,
                name: a.name.clone(),
                email: a.email.clone(),
                phone: a.phone.clone(),
            })
            .collect())
    }

    async fn list_activist_range(&self, range: &ActivistRange) -> AppResult<Vec<ActivistListItem>> {
        let data = self.data.lock().unwrap();
        let mut items: Vec<ActivistListItem> = data
            .activists
            .iter()
            .filter(|a| !a.hidden)
            .filter(|a| match range.after_name.as_deref() {
                None => true,
                Some(after) if range.descending => a.name.as_str() < after,
                Some(after) => a.name.as_str() > after,
            })
            .map(list_item)
            .collect();
        items.sort_by(|a, b| a.name.cmp(&b.name));
        if range.descending {
            items.reverse();
        }
        items.truncate(range.limit.unwrap_or(40).max(0) as usize);
        Ok(items)
    }

    async fn get_activist(&self, id: i32) -> AppResult<Option<Activist>> {
        let data = self.data.lock().unwrap();
        Ok(data.activists.iter().find(|a| a.id == id).cloned())
    }

    async fn find_activists_by_email(&self, email: &str) -> AppResult<Vec<Activist>> {
        let data = self.data.lock().unwrap();
        Ok(data
            .activists
            .iter()
            .filter(|a| !a.hidden && a.email.eq_ignore_ascii_case(email))
            .cloned()
            .collect())
    }

    async fn save_activist(&self, input: ActivistInput) -> AppResult<Activist> {
        let mut data = self.data.lock().unwrap();
        if data
            .activists
            .iter()
            .any(|a| a.name == input.name && a.id != input.id)
        {
            return Err(AppError::validation("An activist with that name already exists"));
        }
        if input.id == 0 {
            let saved = Activist {
                id: next_id(&data.activists, |a| a.id),
                name: input.name,
                email: input.email,
                phone: input.phone,
                location: input.location,
                facebook: input.facebook,
                activist_level: input.activist_level,
                source: input.source,
                discord_id: input.discord_id,
                ..Activist::default()
            };
            data.activists.push(saved.clone());
            return Ok(saved);
        }
        let existing = data
            .activists
            .iter_mut()
            .find(|a| a.id == input.id)
            .ok_or_else(|| AppError::not_found("Activist not found"))?;
        existing.name = input.name;
        existing.email = input.email;
        existing.phone = input.phone;
        existing.location = input.location;
        existing.facebook = input.facebook;
        existing.activist_level = input.activist_level;
        existing.source = input.source;
        existing.discord_id = input.discord_id;
        Ok(existing.clone())
    }

    async fn hide_activist(&self, id: i32) -> AppResult<()> {
        let mut data = self.data.lock().unwrap();
        let activist = data
            .activists
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| AppError::not_found("Activist not found"))?;
        activist.hidden = true;
        Ok(())
    }

    async fn merge_activist(&self, current_id: i32, target_name: &str) -> AppResult<()> {
        let mut data = self.data.lock().unwrap();
        let target_id = data
            .activists
            .iter()
            .find(|a| a.name == target_name)
            .map(|a| a.id)
            .ok_or_else(|| AppError::not_found("Target activist not found"))?;
        if target_id == current_id {
            return Err(AppError::validation("Cannot merge an activist into itself"));
        }
        data.activists.retain(|a| a.id != current_id);
        data.merges.push((current_id, target_name.to_string()));
        Ok(())
    }

    async fn get_event(&self, id: i32) -> AppResult<Option<Event>> {
        let data = self.data.lock().unwrap();
        Ok(data.events.iter().find(|e| e.id == id).cloned())
    }

    async fn list_events(&self, filter: &EventFilter) -> AppResult<Vec<Event>> {
        let data = self.data.lock().unwrap();
        let mut events: Vec<Event> = data
            .events
            .iter()
            .filter(|e| match filter.event_type.as_deref() {
                None => true,
                Some("noConnections") => e.event_type != "Connection",
                Some(t) => e.event_type == t,
            })
            .filter(|e| filter.name.as_deref().is_none_or(|n| e.name.contains(n)))
            .filter(|e| filter.date_from.is_none_or(|d| e.date >= d))
            .filter(|e| filter.date_to.is_none_or(|d| e.date <= d))
            .cloned()
            .collect();
        events.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));
        Ok(events)
    }

    async fn save_event(&self, draft: EventDraft) -> AppResult<Event> {
        let mut data = self.data.lock().unwrap();
        let id = if draft.id == 0 {
            next_id(&data.events, |e| e.id)
        } else {
            draft.id
        };
        let mut attendees = match data.events.iter().find(|e| e.id == id) {
            Some(existing) => existing.attendees.clone(),
            None if draft.id != 0 => return Err(AppError::not_found("Event not found")),
            None => Vec::new(),
        };
        attendees.retain(|n| !draft.deleted_attendees.contains(n));
        for name in draft.added_attendees {
            if !attendees.contains(&name) {
                attendees.push(name);
            }
        }
        attendees.sort();

        let event = Event {
            id,
            name: draft.name,
            date: draft.date,
            event_type: draft.event_type,
            attendees,
        };
        data.events.retain(|e| e.id != id);
        data.events.push(event.clone());
        Ok(event)
    }

    async fn delete_event(&self, id: i32) -> AppResult<()> {
        let mut data = self.data.lock().unwrap();
        let before = data.events.len();
        data.events.retain(|e| e.id != id);
        if data.events.len() == before {
            return Err(AppError::not_found("Event not found"));
        }
        Ok(())
    }

    async fn list_groups(&self, kind: GroupKind) -> AppResult<Vec<Group>> {
        let data = self.data.lock().unwrap();
        Ok(data
            .groups
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, g)| g.clone())
            .collect())
    }

    async fn save_group(&self, kind: GroupKind, input: GroupInput) -> AppResult<Group> {
        let mut data = self.data.lock().unwrap();
        let id = if input.id == 0 {
            next_id(&data.groups, |(_, g)| g.id)
        } else {
            input.id
        };
        let group = Group {
            id,
            name: input.name,
            email: input.email,
            description: input.description,
            visible: input.visible,
            members: input.members,
        };
        data.groups.retain(|(k, g)| !(*k == kind && g.id == id));
        data.groups.push((kind, group.clone()));
        Ok(group)
    }

    async fn delete_group(&self, kind: GroupKind, id: i32) -> AppResult<()> {
        let mut data = self.data.lock().unwrap();
        let before = data.groups.len();
        data.groups.retain(|(k, g)| !(*k == kind && g.id == id));
        if data.groups.len() == before {
            return Err(AppError::not_found("Group not found"));
        }
        Ok(())
    }

    async fn list_chapters(&self) -> AppResult<Vec<Chapter>> {
        Ok(self.data.lock().unwrap().chapters.clone())
    }

    async fn list_public_chapters(&self) -> AppResult<Vec<ChapterPublic>> {
        Ok(self.data.lock().unwrap().chapters.iter().map(public).collect())
    }

    async fn get_chapter(&self, chapter_id: i32) -> AppResult<Option<Chapter>> {
        let data = self.data.lock().unwrap();
        Ok(data
            .chapters
            .iter()
            .find(|c| c.chapter_id == chapter_id)
            .cloned())
    }

    async fn insert_chapter(&self, chapter: &Chapter) -> AppResult<i32> {
        let mut data = self.data.lock().unwrap();
        let chapter_id = next_id(&data.chapters, |c| c.chapter_id);
        data.chapters.push(Chapter {
            chapter_id,
            ..chapter.clone()
        });
        Ok(chapter_id)
    }

    async fn update_chapter(&self, chapter: &Chapter) -> AppResult<()> {
        let mut data = self.data.lock().unwrap();
        let existing = data
            .chapters
            .iter_mut()
            .find(|c| c.chapter_id == chapter.chapter_id)
            .ok_or_else(|| AppError::not_found("Chapter not found"))?;
        *existing = chapter.clone();
        Ok(())
    }

    async fn delete_chapter(&self, chapter_id: i32) -> AppResult<()> {
        let mut data = self.data.lock().unwrap();
        data.chapters.retain(|c| c.chapter_id != chapter_id);
        Ok(())
    }

    async fn fb_events_for_page(
        &self,
        page_id: i64,
        start: NaiveDateTime,
        end: Option<NaiveDateTime>,
    ) -> AppResult<Vec<FacebookEvent>> {
        let data = self.data.lock().unwrap();
        Ok(data
            .fb_events
            .iter()
            .filter(|e| e.page_id == page_id && in_window(e, start, end))
            .cloned()
            .collect())
    }

    async fn online_fb_events(
        &self,
        start: NaiveDateTime,
        end: Option<NaiveDateTime>,
    ) -> AppResult<Vec<FacebookEvent>> {
        let data = self.data.lock().unwrap();
        Ok(data
            .fb_events
            .iter()
            .filter(|e| e.location_name.to_lowercase().starts_with("online"))
            .filter(|e| in_window(e, start, end))
            .cloned()
            .collect())
    }

    async fn discord_status(&self, discord_id: i64) -> AppResult<DiscordStatus> {
        let data = self.data.lock().unwrap();
        Ok(
            match data.discord_users.iter().find(|(u, _)| u.id == discord_id) {
                None => DiscordStatus::NotFound,
                Some((_, false)) => DiscordStatus::Pending,
                Some((_, true)) => DiscordStatus::Confirmed,
            },
        )
    }

    async fn upsert_discord_user(&self, user: &DiscordUser) -> AppResult<()> {
        let mut data = self.data.lock().unwrap();
        match data.discord_users.iter_mut().find(|(u, _)| u.id == user.id) {
            Some((_, true)) => {}
            Some((existing, false)) => *existing = user.clone(),
            None => data.discord_users.push((user.clone(), false)),
        }
        Ok(())
    }

    async fn pending_discord_email(
        &self,
        discord_id: i64,
        token: &str,
    ) -> AppResult<Option<String>> {
        let data = self.data.lock().unwrap();
        Ok(data
            .discord_users
            .iter()
            .find(|(u, confirmed)| u.id == discord_id && u.token == token && !*confirmed)
            .map(|(u, _)| u.email.clone()))
    }

    async fn confirm_discord_user(
        &self,
        discord_id: i64,
        token: &str,
        activist_id: i32,
    ) -> AppResult<bool> {
        let mut data = self.data.lock().unwrap();
        let Some(pending) = data
            .discord_users
            .iter()
            .position(|(u, confirmed)| u.id == discord_id && u.token == token && !*confirmed)
        else {
            return Ok(false);
        };
        let activist = data
            .activists
            .iter_mut()
            .find(|a| a.id == activist_id)
            .ok_or_else(|| AppError::not_found("Activist not found"))?;
        activist.discord_id = Some(discord_id.to_string());
        data.discord_users[pending].1 = true;
        Ok(true)
    }
}

// --- Mock clients ---

/// Accepts `valid:<email>` tokens and rejects everything else.
pub struct MockVerifier;

#[async_trait]
impl IdTokenVerifier for MockVerifier {
    async fn verify(&self, id_token: &str) -> AppResult<Option<String>> {
        Ok(id_token.strip_prefix("valid:").map(str::to_string))
    }
}

pub struct FixedGeolocator(pub f64, pub f64);

#[async_trait]
impl Geolocator for FixedGeolocator {
    async fn locate(&self, _ip: &str) -> AppResult<(f64, f64)> {
        Ok((self.0, self.1))
    }
}

/// Records every call made to the guild.
#[derive(Default)]
pub struct RecordingDiscord {
    pub calls: Mutex<Vec<String>>,
}

impl RecordingDiscord {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DiscordApi for RecordingDiscord {
    async fn set_nickname(&self, user_id: i64, nickname: &str) -> Result<(), SyncError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("nick {} {}", user_id, nickname));
        Ok(())
    }

    async fn add_role(&self, user_id: i64, role_name: &str) -> Result<(), SyncError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("role {} {}", user_id, role_name));
        Ok(())
    }

    async fn send_message(&self, user_id: i64, _content: &str) -> Result<(), SyncError> {
        self.calls.lock().unwrap().push(format!("message {}", user_id));
        Ok(())
    }
}

/// Sendy stand-in. Addresses listed in `failing` are rejected.
#[derive(Default)]
pub struct MockSendy {
    pub failing: Vec<String>,
    pub subscribed: Mutex<Vec<(String, String, String)>>,
}

impl MockSendy {
    pub fn failing(emails: &[&str]) -> Self {
        Self {
            failing: emails.iter().map(|e| e.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn subscribed(&self) -> Vec<(String, String, String)> {
        self.subscribed.lock().unwrap().clone()
    }
}

#[async_trait]
impl SendyClient for MockSendy {
    async fn subscribe(&self, list_id: &str, name: &str, email: &str) -> Result<(), SyncError> {
        if self.failing.iter().any(|f| f == email) {
            return Err(SyncError::Rejected("Invalid email address.".to_string()));
        }
        self.subscribed.lock().unwrap().push((
            list_id.to_string(),
            name.to_string(),
            email.to_string(),
        ));
        Ok(())
    }
}

// --- App wiring ---

pub fn app_state(repo: MockRepo, config: AppConfig) -> AppState {
    shared_state(Arc::new(repo), config)
}

/// Like `app_state`, keeping a handle on the repo so tests can inspect it afterwards.
pub fn shared_state(repo: Arc<MockRepo>, config: AppConfig) -> AppState {
    AppState {
        repo: repo as RepositoryState,
        config,
        verifier: Arc::new(MockVerifier) as VerifierState,
        mailer: None,
        discord: None,
        geolocator: None,
    }
}

pub fn with_mailer(mut state: AppState, mailer: MockMailer) -> AppState {
    state.mailer = Some(Arc::new(mailer) as MailerState);
    state
}

pub fn with_discord(mut state: AppState, discord: Arc<RecordingDiscord>) -> AppState {
    state.discord = Some(discord as DiscordState);
    state
}

pub fn with_geolocator(mut state: AppState, lat: f64, lng: f64) -> AppState {
    state.geolocator = Some(Arc::new(FixedGeolocator(lat, lng)) as GeolocatorState);
    state
}

pub fn production_config() -> AppConfig {
    AppConfig {
        env: adb::config::Env::Production,
        cookie_secret: "production-test-secret".to_string(),
        ..AppConfig::default()
    }
}

/// A `Cookie` header value carrying a valid session for `user_id`.
pub fn session_for(config: &AppConfig, user_id: i32) -> String {
    let token = session::sign_session(&config.cookie_secret, user_id).unwrap();
    format!("{}={}", session::SESSION_COOKIE, token)
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn get_as(uri: &str, cookie: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap()
}

pub fn post_json(uri: &str, cookie: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::COOKIE, cookie)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn post_form(uri: &str, cookie: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub fn router(state: AppState) -> Router {
    adb::create_router(state)
}
