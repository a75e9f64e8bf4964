use axum::{
    extract::{Path, Query, State},
    http::Uri,
    response::Html,
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    AppState,
    auth::AuthUser,
    config::AppConfig,
    error::{AppError, AppResult},
    pages::{PageData, render_page},
};

/// ActivistView
///
/// One of the filtered activist list pages. They all mount the same frontend view;
/// `view` selects the filter preset.
#[derive(Debug, Clone, Copy)]
pub struct ActivistView {
    pub path: &'static str,
    pub page_name: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub view: &'static str,
}

pub const ACTIVIST_VIEWS: &[ActivistView] = &[
    ActivistView {
        path: "/list_activists",
        page_name: "ActivistList",
        title: "All Activists",
        description: "Everyone who has attended an event within the filtered range",
        view: "all_activists",
    },
    ActivistView {
        path: "/community_prospects",
        page_name: "CommunityProspects",
        title: "Community Prospects",
        description: "Everyone whose Level is Supporter or Circle Member, whose Source is a Form (other than the Circle Interest Form), Application, Fur Ban, or Petition that was submitted within the last 3 months",
        view: "community_prospects",
    },
    ActivistView {
        path: "/activist_pool",
        page_name: "ActivistPool",
        title: "Recruitment Connections",
        description: "Inactive page",
        view: "activist_pool",
    },
    ActivistView {
        path: "/activist_recruitment",
        page_name: "ActivistRecruitment",
        title: "Activist Recruitment",
        description: "Inactive page",
        view: "activist_recruitment",
    },
    ActivistView {
        path: "/activist_actionteam",
        page_name: "ActivistActionTeam",
        title: "Action Team",
        description: "Inactive page",
        view: "action_team",
    },
    ActivistView {
        path: "/activist_development",
        page_name: "OrganizerDevelopment",
        title: "Organizer Development",
        description: "Everyone who is an Organizer",
        view: "development",
    },
    ActivistView {
        path: "/organizer_prospects",
        page_name: "OrganizerProspects",
        title: "Organizer Prospects",
        description: "Everyone who is a Prospective Organizer who is not an Organizer",
        view: "organizer_prospects",
    },
    ActivistView {
        path: "/chapter_member_prospects",
        page_name: "ChapterMemberProspects",
        title: "Chapter Member Prospects",
        description: "Everyone who is a Chapter Member Prospect who is not a Chapter Member or Organizer",
        view: "chapter_member_prospects",
    },
    ActivistView {
        path: "/chapter_member_development",
        page_name: "ChapterMemberDevelopment",
        title: "Chapter Members",
        description: "Everyone who is a Chapter Member (including Organizers)",
        view: "chapter_member_development",
    },
    ActivistView {
        path: "/circle_member_prospects",
        page_name: "CircleMemberProspects",
        title: "Circle Member Prospects",
        description: "Everyone interested in joining a circle",
        view: "circle_member_prospects",
    },
    ActivistView {
        path: "/leaderboard",
        page_name: "Leaderboard",
        title: "Leaderboard",
        description: "Everyone who has attended an event in the last 30 days",
        view: "leaderboard",
    },
];

pub fn activist_view(path: &str) -> Option<&'static ActivistView> {
    ACTIVIST_VIEWS.iter().find(|v| v.path == path)
}

fn user_page(config: &AppConfig, user: &AuthUser, page: PageData) -> Html<String> {
    render_page(config, page.for_user(&user.0))
}

// --- Events & connections ---

pub async fn new_event(State(config): State<AppConfig>, user: AuthUser) -> Html<String> {
    user_page(
        &config,
        &user,
        PageData::new("event_new", "NewEvent").with_data(json!({ "event_id": 0 })),
    )
}

pub async fn update_event(
    State(config): State<AppConfig>,
    user: AuthUser,
    Path(event_id): Path<i32>,
) -> Html<String> {
    user_page(
        &config,
        &user,
        PageData::new("event_new", "NewEvent").with_data(json!({ "event_id": event_id })),
    )
}

pub async fn list_events(State(config): State<AppConfig>, user: AuthUser) -> Html<String> {
    user_page(&config, &user, PageData::new("event_list", "EventList"))
}

pub async fn new_connection(State(config): State<AppConfig>, user: AuthUser) -> Html<String> {
    user_page(
        &config,
        &user,
        PageData::new("connection_new", "NewConnection").with_data(json!({ "event_id": 0 })),
    )
}

pub async fn update_connection(
    State(config): State<AppConfig>,
    user: AuthUser,
    Path(event_id): Path<i32>,
) -> Html<String> {
    user_page(
        &config,
        &user,
        PageData::new("connection_new", "NewConnection").with_data(json!({ "event_id": event_id })),
    )
}

pub async fn list_connections(State(config): State<AppConfig>, user: AuthUser) -> Html<String> {
    user_page(&config, &user, PageData::new("connection_list", "ConnectionsList"))
}

// --- Activists ---

/// activist_list
///
/// Serves every filtered activist list page; the request path picks the preset.
pub async fn activist_list(
    State(config): State<AppConfig>,
    user: AuthUser,
    uri: Uri,
) -> AppResult<Html<String>> {
    let view = activist_view(uri.path())
        .ok_or_else(|| AppError::not_found(format!("No activist list at {}", uri.path())))?;

    Ok(user_page(
        &config,
        &user,
        PageData::new("activist_list", view.page_name).with_data(json!({
            "title": view.title,
            "description": view.description,
            "view": view.view,
        })),
    ))
}

// --- Groups ---

pub async fn list_working_groups(State(config): State<AppConfig>, user: AuthUser) -> Html<String> {
    user_page(&config, &user, PageData::new("working_group_list", "WorkingGroupList"))
}

pub async fn list_circles(State(config): State<AppConfig>, user: AuthUser) -> Html<String> {
    user_page(&config, &user, PageData::new("circles_list", "CirclesList"))
}

// --- Admin ---

pub async fn list_users(State(config): State<AppConfig>, user: AuthUser) -> Html<String> {
    user_page(&config, &user, PageData::new("user_list", "UserList"))
}

pub async fn list_chapters(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Html<String>> {
    let chapters = state.repo.list_chapters().await?;
    Ok(user_page(
        &state.config,
        &user,
        PageData::new("chapters_list", "ChaptersList").with_data(json!({ "chapters": chapters })),
    ))
}

#[derive(Debug, Deserialize)]
pub struct ChapterQuery {
    pub id: i32,
}

pub async fn edit_chapter(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ChapterQuery>,
) -> AppResult<Html<String>> {
    let chapter = state
        .repo
        .get_chapter(query.id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Chapter {} not found", query.id)))?;

    Ok(user_page(
        &state.config,
        &user,
        PageData::new("chapter_edit", "ChaptersList").with_data(json!({ "chapter": chapter })),
    ))
}

pub async fn new_chapter(State(config): State<AppConfig>, user: AuthUser) -> Html<String> {
    user_page(&config, &user, PageData::new("chapter_new", "ChaptersList"))
}
