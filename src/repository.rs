use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::{FromRow, PgPool, Postgres, Transaction, query_builder::QueryBuilder};

use crate::error::{AppError, AppResult};
use crate::models::{
    Activist, ActivistBasic, ActivistFilter, ActivistInput, ActivistListItem,
    ActivistRange, AdbUser, Chapter, ChapterPublic, DiscordStatus, DiscordUser, Event,
    EventDraft, EventFilter, FacebookEvent, Group, GroupInput, GroupKind, GroupMember, Role,
    UserInput,
};

/// Repository Trait
///
/// The persistence contract used by the request handlers and the auth guards.
/// Background jobs use the narrower `SyncStore` trait instead.
///
/// Lookups return `Ok(None)` for a missing row; mutations of a missing row return
/// `AppError::NotFound`.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users & Roles ---
    async fn get_user(&self, id: i32) -> AppResult<Option<AdbUser>>;
    async fn get_user_by_email(&self, email: &str) -> AppResult<Option<AdbUser>>;
    async fn list_users(&self) -> AppResult<Vec<AdbUser>>;
    // Creates when `id == 0`.
    async fn save_user(&self, user: UserInput) -> AppResult<AdbUser>;
    async fn delete_user(&self, id: i32) -> AppResult<()>;
    async fn add_user_role(&self, user_id: i32, role: Role) -> AppResult<()>;
    async fn remove_user_role(&self, user_id: i32, role: Role) -> AppResult<()>;

    // --- Activists ---
    async fn activist_names(&self) -> AppResult<Vec<String>>;
    async fn organizer_names(&self) -> AppResult<Vec<String>>;
    async fn list_activists(&self, filter: &ActivistFilter) -> AppResult<Vec<ActivistListItem>>;
    async fn list_activists_basic(&self) -> AppResult<Vec<ActivistBasic>>;
    async fn list_activist_range(&self, range: &ActivistRange) -> AppResult<Vec<ActivistListItem>>;
    async fn get_activist(&self, id: i32) -> AppResult<Option<Activist>>;
    async fn find_activists_by_email(&self, email: &str) -> AppResult<Vec<Activist>>;
    // Creates when `id == 0`.
    async fn save_activist(&self, activist: ActivistInput) -> AppResult<Activist>;
    async fn hide_activist(&self, id: i32) -> AppResult<()>;
    // Moves attendance and memberships onto the target, then deletes the current activist.
    async fn merge_activist(&self, current_id: i32, target_name: &str) -> AppResult<()>;

    // --- Events ---
    async fn get_event(&self, id: i32) -> AppResult<Option<Event>>;
    async fn list_events(&self, filter: &EventFilter) -> AppResult<Vec<Event>>;
    async fn save_event(&self, event: EventDraft) -> AppResult<Event>;
    async fn delete_event(&self, id: i32) -> AppResult<()>;

    // --- Working groups & circles ---
    async fn list_groups(&self, kind: GroupKind) -> AppResult<Vec<Group>>;
    async fn save_group(&self, kind: GroupKind, group: GroupInput) -> AppResult<Group>;
    async fn delete_group(&self, kind: GroupKind, id: i32) -> AppResult<()>;

    // --- Chapters ---
    async fn list_chapters(&self) -> AppResult<Vec<Chapter>>;
    async fn list_public_chapters(&self) -> AppResult<Vec<ChapterPublic>>;
    async fn get_chapter(&self, chapter_id: i32) -> AppResult<Option<Chapter>>;
    async fn insert_chapter(&self, chapter: &Chapter) -> AppResult<i32>;
    async fn update_chapter(&self, chapter: &Chapter) -> AppResult<()>;
    async fn delete_chapter(&self, chapter_id: i32) -> AppResult<()>;

    // --- Facebook events ---
    async fn fb_events_for_page(
        &self,
        page_id: i64,
        start: NaiveDateTime,
        end: Option<NaiveDateTime>,
    ) -> AppResult<Vec<FacebookEvent>>;
    async fn online_fb_events(
        &self,
        start: NaiveDateTime,
        end: Option<NaiveDateTime>,
    ) -> AppResult<Vec<FacebookEvent>>;

    // --- Discord ---
    async fn discord_status(&self, discord_id: i64) -> AppResult<DiscordStatus>;
    async fn upsert_discord_user(&self, user: &DiscordUser) -> AppResult<()>;
    // Email of the pending record when the token matches. Changes nothing.
    async fn pending_discord_email(&self, discord_id: i64, token: &str) -> AppResult<Option<String>>;
    // Marks the pending record confirmed and stores the Discord id on the activist, in
    // one transaction. False when the record is gone or already confirmed.
    async fn confirm_discord_user(
        &self,
        discord_id: i64,
        token: &str,
        activist_id: i32,
    ) -> AppResult<bool>;
}

/// RepositoryState
///
/// The shared handle stored in `AppState`.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// `Repository` and `SyncStore` backed by PostgreSQL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

// --- Row types ---

#[derive(FromRow)]
struct UserRow {
    id: i32,
    name: String,
    email: String,
    disabled: bool,
    roles: Vec<String>,
}

impl From<UserRow> for AdbUser {
    fn from(row: UserRow) -> Self {
        AdbUser {
            id: row.id,
            name: row.name,
            email: row.email,
            disabled: row.disabled,
            // Unknown role strings are dropped here.
            roles: row.roles.iter().filter_map(|r| Role::parse(r)).collect(),
        }
    }
}

#[derive(FromRow)]
struct GroupRow {
    id: i32,
    name: String,
    email: String,
    description: String,
    visible: bool,
}

#[derive(FromRow)]
struct MemberRow {
    group_id: i32,
    name: String,
    point_person: bool,
}

const USER_SELECT: &str = r#"
    SELECT u.id, u.name, u.email, u.disabled,
           COALESCE(ARRAY_AGG(r.role ORDER BY r.role) FILTER (WHERE r.role IS NOT NULL), '{}'::TEXT[]) AS roles
    FROM adb_users u
    LEFT JOIN users_roles r ON r.user_id = u.id
"#;

const ACTIVIST_COLUMNS: &str = "id, name, email, phone, location, facebook, activist_level, source, hidden, discord_id, created_at";

const ACTIVIST_LIST_SELECT: &str = r#"
    SELECT a.id, a.name, a.email, a.phone, a.location, a.facebook, a.activist_level,
           a.source, a.hidden, a.discord_id,
           stats.first_event, stats.last_event, COALESCE(stats.total_events, 0) AS total_events
    FROM activists a
    LEFT JOIN (
        SELECT ea.activist_id, MIN(e.date) AS first_event, MAX(e.date) AS last_event, COUNT(*) AS total_events
        FROM event_attendance ea
        JOIN events e ON e.id = ea.event_id
        GROUP BY ea.activist_id
    ) stats ON stats.activist_id = a.id
"#;

const EVENT_SELECT: &str = r#"
    SELECT e.id, e.name, e.date, e.event_type,
           COALESCE(ARRAY_AGG(a.name ORDER BY a.name) FILTER (WHERE a.name IS NOT NULL), '{}'::TEXT[]) AS attendees
    FROM events e
    LEFT JOIN event_attendance ea ON ea.event_id = e.id
    LEFT JOIN activists a ON a.id = ea.activist_id
"#;

const CHAPTER_PUBLIC_COLUMNS: &str =
    "chapter_id, id, name, flag, fb_url, twitter_url, insta_url, email, region, lat, lng";

const FB_EVENT_COLUMNS: &str = r#"
    id, page_id, name, description, start_time, end_time, location_name, location_city,
    location_country, location_state, location_address, location_zip, lat, lng, cover,
    attending_count, interested_count, is_canceled, last_update
"#;

/// Maps a unique-constraint violation to a user-facing message; everything else stays
/// a database error.
fn unique_violation(err: sqlx::Error, message: &str) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => AppError::validation(message),
        _ => AppError::Database(err),
    }
}

fn not_found_unless_affected(rows: u64, message: impl Into<String>) -> AppResult<()> {
    if rows == 0 {
        return Err(AppError::not_found(message));
    }
    Ok(())
}

impl PostgresRepository {
    async fn fetch_group(&self, kind: GroupKind, id: i32) -> AppResult<Option<Group>> {
        let row = sqlx::query_as::<_, GroupRow>(
            "SELECT id, name, email, description, visible FROM groups WHERE id = $1 AND kind = $2",
        )
        .bind(id)
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else { return Ok(None) };

        let members = sqlx::query_as::<_, GroupMember>(
            r#"SELECT a.name, gm.point_person
               FROM group_members gm
               JOIN activists a ON a.id = gm.activist_id
               WHERE gm.group_id = $1
               ORDER BY a.name"#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(Group {
            id: row.id,
            name: row.name,
            email: row.email,
            description: row.description,
            visible: row.visible,
            members,
        }))
    }

    /// Finds an activist by exact name, creating a bare record when none exists.
    async fn get_or_create_activist(
        tx: &mut Transaction<'_, Postgres>,
        name: &str,
    ) -> AppResult<i32> {
        let id = sqlx::query_scalar::<_, i32>(
            r#"INSERT INTO activists (name) VALUES ($1)
               ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
               RETURNING id"#,
        )
        .bind(name)
        .fetch_one(&mut **tx)
        .await?;
        Ok(id)
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    // --- Users & Roles ---

    async fn get_user(&self, id: i32) -> AppResult<Option<AdbUser>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "{} WHERE u.id = $1 GROUP BY u.id",
            USER_SELECT
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(AdbUser::from))
    }

    async fn get_user_by_email(&self, email: &str) -> AppResult<Option<AdbUser>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "{} WHERE LOWER(u.email) = LOWER($1) GROUP BY u.id",
            USER_SELECT
        ))
        .bind(email.trim())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(AdbUser::from))
    }

    async fn list_users(&self) -> AppResult<Vec<AdbUser>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "{} GROUP BY u.id ORDER BY u.name",
            USER_SELECT
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(AdbUser::from).collect())
    }

    async fn save_user(&self, user: UserInput) -> AppResult<AdbUser> {
        let id = if user.id == 0 {
            sqlx::query_scalar::<_, i32>(
                "INSERT INTO adb_users (name, email, disabled) VALUES ($1, $2, $3) RETURNING id",
            )
            .bind(&user.name)
            .bind(&user.email)
            .bind(user.disabled)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| unique_violation(e, "A user with this email already exists"))?
        } else {
            let result = sqlx::query(
                "UPDATE adb_users SET name = $2, email = $3, disabled = $4 WHERE id = $1",
            )
            .bind(user.id)
            .bind(&user.name)
            .bind(&user.email)
            .bind(user.disabled)
            .execute(&self.pool)
            .await
            .map_err(|e| unique_violation(e, "A user with this email already exists"))?;
            not_found_unless_affected(result.rows_affected(), "User not found")?;
            user.id
        };

        self.get_user(id)
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))
    }

    async fn delete_user(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM adb_users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        not_found_unless_affected(result.rows_affected(), "User not found")
    }

    async fn add_user_role(&self, user_id: i32, role: Role) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO users_roles (user_id, role) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(role.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                AppError::not_found("User not found")
            }
            _ => AppError::Database(e),
        })?;
        Ok(())
    }

    async fn remove_user_role(&self, user_id: i32, role: Role) -> AppResult<()> {
        sqlx::query("DELETE FROM users_roles WHERE user_id = $1 AND role = $2")
            .bind(user_id)
            .bind(role.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // --- Activists ---

    async fn activist_names(&self) -> AppResult<Vec<String>> {
        let names = sqlx::query_scalar::<_, String>(
            "SELECT name FROM activists WHERE NOT hidden ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(names)
    }

    async fn organizer_names(&self) -> AppResult<Vec<String>> {
        let names = sqlx::query_scalar::<_, String>(
            "SELECT name FROM activists WHERE NOT hidden AND activist_level = 'Organizer' ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(names)
    }

    /// list_activists
    ///
    /// Filtered activist list with attendance aggregates, built with `QueryBuilder`
    /// so every filter value is bound rather than interpolated.
    async fn list_activists(&self, filter: &ActivistFilter) -> AppResult<Vec<ActivistListItem>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(ACTIVIST_LIST_SELECT);
        builder.push(" WHERE TRUE");

        if !filter.include_hidden {
            builder.push(" AND NOT a.hidden");
        }
        if let Some(name) = filter.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            builder.push(" AND a.name ILIKE ");
            builder.push_bind(format!("%{}%", name));
        }
        if !filter.activist_levels.is_empty() {
            builder.push(" AND a.activist_level = ANY(");
            builder.push_bind(filter.activist_levels.clone());
            builder.push(")");
        }
        if let Some(from) = filter.last_event_from {
            builder.push(" AND stats.last_event >= ");
            builder.push_bind(from);
        }
        if let Some(to) = filter.last_event_to {
            builder.push(" AND stats.last_event <= ");
            builder.push_bind(to);
        }
        builder.push(" ORDER BY a.name");

        let rows = builder
            .build_query_as::<ActivistListItem>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn list_activists_basic(&self) -> AppResult<Vec<ActivistBasic>> {
        let rows = sqlx::query_as::<_, ActivistBasic>(
            "SELECT id, name, email, phone FROM activists WHERE NOT hidden ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// list_activist_range
    ///
    /// Keyset pagination on `name`: the page starts strictly after `after_name`.
    async fn list_activist_range(&self, range: &ActivistRange) -> AppResult<Vec<ActivistListItem>> {
        let limit = range.limit.unwrap_or(40).clamp(1, 1000);

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(ACTIVIST_LIST_SELECT);
        builder.push(" WHERE NOT a.hidden");
        if let Some(after) = range.after_name.as_deref().filter(|n| !n.is_empty()) {
            builder.push(if range.descending {
                " AND a.name < "
            } else {
                " AND a.name > "
            });
            builder.push_bind(after.to_string());
        }
        builder.push(if range.descending {
            " ORDER BY a.name DESC"
        } else {
            " ORDER BY a.name ASC"
        });
        builder.push(" LIMIT ");
        builder.push_bind(limit);

        let rows = builder
            .build_query_as::<ActivistListItem>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn get_activist(&self, id: i32) -> AppResult<Option<Activist>> {
        let row = sqlx::query_as::<_, Activist>(&format!(
            "SELECT {} FROM activists WHERE id = $1",
            ACTIVIST_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn find_activists_by_email(&self, email: &str) -> AppResult<Vec<Activist>> {
        let rows = sqlx::query_as::<_, Activist>(&format!(
            "SELECT {} FROM activists WHERE LOWER(email) = LOWER($1) AND NOT hidden",
            ACTIVIST_COLUMNS
        ))
        .bind(email.trim())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn save_activist(&self, activist: ActivistInput) -> AppResult<Activist> {
        const DUPLICATE: &str = "An activist with that name already exists";

        if activist.id == 0 {
            let row = sqlx::query_as::<_, Activist>(&format!(
                r#"INSERT INTO activists
                       (name, email, phone, location, facebook, activist_level, source, discord_id)
                   VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                   RETURNING {}"#,
                ACTIVIST_COLUMNS
            ))
            .bind(&activist.name)
            .bind(&activist.email)
            .bind(&activist.phone)
            .bind(&activist.location)
            .bind(&activist.facebook)
            .bind(&activist.activist_level)
            .bind(&activist.source)
            .bind(&activist.discord_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| unique_violation(e, DUPLICATE))?;
            return Ok(row);
        }

        sqlx::query_as::<_, Activist>(&format!(
            r#"UPDATE activists
               SET name = $2, email = $3, phone = $4, location = $5, facebook = $6,
                   activist_level = $7, source = $8, discord_id = $9
               WHERE id = $1
               RETURNING {}"#,
            ACTIVIST_COLUMNS
        ))
        .bind(activist.id)
        .bind(&activist.name)
        .bind(&activist.email)
        .bind(&activist.phone)
        .bind(&activist.location)
        .bind(&activist.facebook)
        .bind(&activist.activist_level)
        .bind(&activist.source)
        .bind(&activist.discord_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| unique_violation(e, DUPLICATE))?
        .ok_or_else(|| AppError::not_found("Activist not found"))
    }

    async fn hide_activist(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("UPDATE activists SET hidden = TRUE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        not_found_unless_affected(result.rows_affected(), "Activist not found")
    }

    async fn merge_activist(&self, current_id: i32, target_name: &str) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let target_id = sqlx::query_scalar::<_, i32>("SELECT id FROM activists WHERE name = $1")
            .bind(target_name.trim())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| {
                AppError::not_found(format!("Could not find activist: {}", target_name))
            })?;

        if target_id == current_id {
            return Err(AppError::validation("Cannot merge an activist into itself"));
        }

        sqlx::query(
            r#"INSERT INTO event_attendance (activist_id, event_id)
               SELECT $2, event_id FROM event_attendance WHERE activist_id = $1
               ON CONFLICT DO NOTHING"#,
        )
        .bind(current_id)
        .bind(target_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"INSERT INTO group_members (group_id, activist_id, point_person)
               SELECT group_id, $2, point_person FROM group_members WHERE activist_id = $1
               ON CONFLICT DO NOTHING"#,
        )
        .bind(current_id)
        .bind(target_id)
        .execute(&mut *tx)
        .await?;

        let result = sqlx::query("DELETE FROM activists WHERE id = $1")
            .bind(current_id)
            .execute(&mut *tx)
            .await?;
        not_found_unless_affected(result.rows_affected(), "Activist not found")?;

        tx.commit().await?;
        Ok(())
    }

    // --- Events ---

    async fn get_event(&self, id: i32) -> AppResult<Option<Event>> {
        let event = sqlx::query_as::<_, Event>(&format!(
            "{} WHERE e.id = $1 GROUP BY e.id",
            EVENT_SELECT
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(event)
    }

    async fn list_events(&self, filter: &EventFilter) -> AppResult<Vec<Event>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(EVENT_SELECT);
        builder.push(" WHERE TRUE");

        if let Some(name) = &filter.name {
            builder.push(" AND e.name ILIKE ");
            builder.push_bind(format!("%{}%", name));
        }
        if let Some(activist) = &filter.activist {
            builder.push(
                r#" AND e.id IN (
                    SELECT ea2.event_id FROM event_attendance ea2
                    JOIN activists a2 ON a2.id = ea2.activist_id
                    WHERE a2.name = "#,
            );
            builder.push_bind(activist.clone());
            builder.push(")");
        }
        if let Some(from) = filter.date_from {
            builder.push(" AND e.date >= ");
            builder.push_bind(from);
        }
        if let Some(to) = filter.date_to {
            builder.push(" AND e.date <= ");
            builder.push_bind(to);
        }
        match filter.event_type.as_deref() {
            None => {}
            Some("noConnections") => {
                builder.push(" AND e.event_type <> 'Connection'");
            }
            Some(event_type) => {
                builder.push(" AND e.event_type = ");
                builder.push_bind(event_type.to_string());
            }
        }
        builder.push(" GROUP BY e.id ORDER BY e.date DESC, e.id DESC");

        let events = builder
            .build_query_as::<Event>()
            .fetch_all(&self.pool)
            .await?;
        Ok(events)
    }

    /// save_event
    ///
    /// Upserts the event and applies the attendance diff in one transaction. Added
    /// attendees that are not yet activists are created.
    async fn save_event(&self, event: EventDraft) -> AppResult<Event> {
        let mut tx = self.pool.begin().await?;

        let event_id = if event.id == 0 {
            sqlx::query_scalar::<_, i32>(
                "INSERT INTO events (name, date, event_type) VALUES ($1, $2, $3) RETURNING id",
            )
            .bind(&event.name)
            .bind(event.date)
            .bind(&event.event_type)
            .fetch_one(&mut *tx)
            .await?
        } else {
            let result = sqlx::query(
                "UPDATE events SET name = $2, date = $3, event_type = $4 WHERE id = $1",
            )
            .bind(event.id)
            .bind(&event.name)
            .bind(event.date)
            .bind(&event.event_type)
            .execute(&mut *tx)
            .await?;
            not_found_unless_affected(result.rows_affected(), "Event not found")?;
            event.id
        };

        for name in &event.added_attendees {
            let activist_id = Self::get_or_create_activist(&mut tx, name).await?;
            sqlx::query(
                "INSERT INTO event_attendance (activist_id, event_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(activist_id)
            .bind(event_id)
            .execute(&mut *tx)
            .await?;
        }

        for name in &event.deleted_attendees {
            sqlx::query(
                r#"DELETE FROM event_attendance
                   WHERE event_id = $1
                     AND activist_id = (SELECT id FROM activists WHERE name = $2)"#,
            )
            .bind(event_id)
            .bind(name)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        self.get_event(event_id)
            .await?
            .ok_or_else(|| AppError::not_found("Event not found"))
    }

    async fn delete_event(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        not_found_unless_affected(result.rows_affected(), "Event not found")
    }

    // --- Working groups & circles ---

    async fn list_groups(&self, kind: GroupKind) -> AppResult<Vec<Group>> {
        let rows = sqlx::query_as::<_, GroupRow>(
            "SELECT id, name, email, description, visible FROM groups WHERE kind = $1 ORDER BY name",
        )
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await?;

        let members = sqlx::query_as::<_, MemberRow>(
            r#"SELECT gm.group_id, a.name, gm.point_person
               FROM group_members gm
               JOIN activists a ON a.id = gm.activist_id
               JOIN groups g ON g.id = gm.group_id
               WHERE g.kind = $1
               ORDER BY a.name"#,
        )
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| Group {
                members: members
                    .iter()
                    .filter(|m| m.group_id == row.id)
                    .map(|m| GroupMember {
                        name: m.name.clone(),
                        point_person: m.point_person,
                    })
                    .collect(),
                id: row.id,
                name: row.name,
                email: row.email,
                description: row.description,
                visible: row.visible,
            })
            .collect())
    }

    /// save_group
    ///
    /// Upserts the group and replaces its member list. Every member must name an
    /// existing activist.
    async fn save_group(&self, kind: GroupKind, group: GroupInput) -> AppResult<Group> {
        const DUPLICATE: &str = "A group with that name already exists";
        let mut tx = self.pool.begin().await?;

        let group_id = if group.id == 0 {
            sqlx::query_scalar::<_, i32>(
                r#"INSERT INTO groups (kind, name, email, description, visible)
                   VALUES ($1, $2, $3, $4, $5) RETURNING id"#,
            )
            .bind(kind.as_str())
            .bind(&group.name)
            .bind(&group.email)
            .bind(&group.description)
            .bind(group.visible)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| unique_violation(e, DUPLICATE))?
        } else {
            let result = sqlx::query(
                r#"UPDATE groups SET name = $3, email = $4, description = $5, visible = $6
                   WHERE id = $1 AND kind = $2"#,
            )
            .bind(group.id)
            .bind(kind.as_str())
            .bind(&group.name)
            .bind(&group.email)
            .bind(&group.description)
            .bind(group.visible)
            .execute(&mut *tx)
            .await
            .map_err(|e| unique_violation(e, DUPLICATE))?;
            not_found_unless_affected(result.rows_affected(), "Group not found")?;
            group.id
        };

        sqlx::query("DELETE FROM group_members WHERE group_id = $1")
            .bind(group_id)
            .execute(&mut *tx)
            .await?;

        for member in &group.members {
            let activist_id =
                sqlx::query_scalar::<_, i32>("SELECT id FROM activists WHERE name = $1")
                    .bind(&member.name)
                    .fetch_optional(&mut *tx)
                    .await?
                    .ok_or_else(|| {
                        AppError::not_found(format!("Activist not found: {}", member.name))
                    })?;

            sqlx::query(
                "INSERT INTO group_members (group_id, activist_id, point_person) VALUES ($1, $2, $3)",
            )
            .bind(group_id)
            .bind(activist_id)
            .bind(member.point_person)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        self.fetch_group(kind, group_id)
            .await?
            .ok_or_else(|| AppError::not_found("Group not found"))
    }

    async fn delete_group(&self, kind: GroupKind, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM groups WHERE id = $1 AND kind = $2")
            .bind(id)
            .bind(kind.as_str())
            .execute(&self.pool)
            .await?;
        not_found_unless_affected(result.rows_affected(), "Group not found")
    }

    // --- Chapters ---

    async fn list_chapters(&self) -> AppResult<Vec<Chapter>> {
        let rows = sqlx::query_as::<_, Chapter>(&format!(
            "SELECT {}, token FROM fb_pages ORDER BY name",
            CHAPTER_PUBLIC_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn list_public_chapters(&self) -> AppResult<Vec<ChapterPublic>> {
        let rows = sqlx::query_as::<_, ChapterPublic>(&format!(
            "SELECT {} FROM fb_pages ORDER BY name",
            CHAPTER_PUBLIC_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn get_chapter(&self, chapter_id: i32) -> AppResult<Option<Chapter>> {
        let row = sqlx::query_as::<_, Chapter>(&format!(
            "SELECT {}, token FROM fb_pages WHERE chapter_id = $1",
            CHAPTER_PUBLIC_COLUMNS
        ))
        .bind(chapter_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn insert_chapter(&self, chapter: &Chapter) -> AppResult<i32> {
        let id = sqlx::query_scalar::<_, i32>(
            r#"INSERT INTO fb_pages
                   (id, name, flag, fb_url, twitter_url, insta_url, email, region, lat, lng, token)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
               RETURNING chapter_id"#,
        )
        .bind(chapter.id)
        .bind(&chapter.name)
        .bind(&chapter.flag)
        .bind(&chapter.fb_url)
        .bind(&chapter.twitter_url)
        .bind(&chapter.insta_url)
        .bind(&chapter.email)
        .bind(&chapter.region)
        .bind(chapter.lat)
        .bind(chapter.lng)
        .bind(&chapter.token)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn update_chapter(&self, chapter: &Chapter) -> AppResult<()> {
        let result = sqlx::query(
            r#"UPDATE fb_pages
               SET id = $2, name = $3, flag = $4, fb_url = $5, twitter_url = $6, insta_url = $7,
                   email = $8, region = $9, lat = $10, lng = $11, token = $12
               WHERE chapter_id = $1"#,
        )
        .bind(chapter.chapter_id)
        .bind(chapter.id)
        .bind(&chapter.name)
        .bind(&chapter.flag)
        .bind(&chapter.fb_url)
        .bind(&chapter.twitter_url)
        .bind(&chapter.insta_url)
        .bind(&chapter.email)
        .bind(&chapter.region)
        .bind(chapter.lat)
        .bind(chapter.lng)
        .bind(&chapter.token)
        .execute(&self.pool)
        .await?;
        not_found_unless_affected(result.rows_affected(), "Chapter not found")
    }

    async fn delete_chapter(&self, chapter_id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM fb_pages WHERE chapter_id = $1")
            .bind(chapter_id)
            .execute(&self.pool)
            .await?;
        not_found_unless_affected(result.rows_affected(), "Chapter not found")
    }

    // --- Facebook events ---

    async fn fb_events_for_page(
        &self,
        page_id: i64,
        start: NaiveDateTime,
        end: Option<NaiveDateTime>,
    ) -> AppResult<Vec<FacebookEvent>> {
        let rows = sqlx::query_as::<_, FacebookEvent>(&format!(
            r#"SELECT {} FROM fb_events
               WHERE page_id = $1 AND start_time >= $2
                 AND ($3::TIMESTAMP IS NULL OR start_time <= $3)
                 AND NOT is_canceled
               ORDER BY start_time"#,
            FB_EVENT_COLUMNS
        ))
        .bind(page_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn online_fb_events(
        &self,
        start: NaiveDateTime,
        end: Option<NaiveDateTime>,
    ) -> AppResult<Vec<FacebookEvent>> {
        let rows = sqlx::query_as::<_, FacebookEvent>(&format!(
            r#"SELECT {} FROM fb_events
               WHERE location_name ILIKE 'online%' AND start_time >= $1
                 AND ($2::TIMESTAMP IS NULL OR start_time <= $2)
                 AND NOT is_canceled
               ORDER BY start_time"#,
            FB_EVENT_COLUMNS
        ))
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    // --- Discord ---

    async fn discord_status(&self, discord_id: i64) -> AppResult<DiscordStatus> {
        let confirmed =
            sqlx::query_scalar::<_, bool>("SELECT confirmed FROM discord_users WHERE id = $1")
                .bind(discord_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(match confirmed {
            None => DiscordStatus::NotFound,
            Some(false) => DiscordStatus::Pending,
            Some(true) => DiscordStatus::Confirmed,
        })
    }

    async fn upsert_discord_user(&self, user: &DiscordUser) -> AppResult<()> {
        sqlx::query(
            r#"INSERT INTO discord_users (id, email, token, confirmed)
               VALUES ($1, $2, $3, FALSE)
               ON CONFLICT (id) DO UPDATE SET email = EXCLUDED.email, token = EXCLUDED.token
               WHERE NOT discord_users.confirmed"#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.token)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn pending_discord_email(
        &self,
        discord_id: i64,
        token: &str,
    ) -> AppResult<Option<String>> {
        let email = sqlx::query_scalar::<_, String>(
            "SELECT email FROM discord_users WHERE id = $1 AND token = $2 AND NOT confirmed",
        )
        .bind(discord_id)
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(email)
    }

    async fn confirm_discord_user(
        &self,
        discord_id: i64,
        token: &str,
        activist_id: i32,
    ) -> AppResult<bool> {
        let mut tx = self.pool.begin().await?;

        let confirmed = sqlx::query(
            r#"UPDATE discord_users SET confirmed = TRUE
               WHERE id = $1 AND token = $2 AND NOT confirmed"#,
        )
        .bind(discord_id)
        .bind(token)
        .execute(&mut *tx)
        .await?;
        if confirmed.rows_affected() == 0 {
            return Ok(false);
        }

        let linked = sqlx::query("UPDATE activists SET discord_id = $2 WHERE id = $1")
            .bind(activist_id)
            .bind(discord_id.to_string())
            .execute(&mut *tx)
            .await?;
        not_found_unless_affected(linked.rows_affected(), "Activist not found")?;

        tx.commit().await?;
        Ok(true)
    }
}

