use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;

use super::{SyncError, SyncStatus};
use crate::models::{ActivistContact, FacebookEvent, FacebookPage, SupporterBasic, SurveyEvent};
use crate::repository::PostgresRepository;

/// SyncStore
///
/// Data access for the background jobs. Every `pending_*` query excludes entities that
/// already have a `Synced` record for the same target; rows whose last attempt failed
/// stay eligible and are retried on a later pass. Batches list never-attempted rows
/// first, then the least recently attempted, so failures cannot crowd out new rows.
/// Sync records are append-only.
#[async_trait]
pub trait SyncStore: Send + Sync {
    /// Supporters with an email not yet synced to `list_id`. `issues` is the exact issue
    /// bitmask a supporter must have (public health = 1, climate = 2, housing or
    /// homelessness = 4); `None` selects every supporter.
    async fn pending_supporters(
        &self,
        list_id: &str,
        issues: Option<u8>,
        limit: i64,
    ) -> Result<Vec<SupporterBasic>, SyncError>;
    async fn record_supporter_sync(
        &self,
        supporter_id: i32,
        list_id: &str,
        status: SyncStatus,
    ) -> Result<(), SyncError>;

    /// Visible activists with an email whose level is one of `levels`.
    async fn pending_list_members(
        &self,
        list_id: &str,
        levels: &[String],
        limit: i64,
    ) -> Result<Vec<ActivistContact>, SyncError>;
    async fn record_list_member_sync(
        &self,
        activist_id: i32,
        list_id: &str,
        status: SyncStatus,
    ) -> Result<(), SyncError>;

    /// Events of `event_types` dated in `[from, until)` not yet fully surveyed.
    async fn pending_survey_events(
        &self,
        event_types: &[String],
        from: NaiveDate,
        until: NaiveDate,
        limit: i64,
    ) -> Result<Vec<SurveyEvent>, SyncError>;
    /// Attendees of the event who have not been handled yet: no survey delivered, or
    /// for attendees without an email, not yet reported to the missing-email address.
    async fn pending_survey_recipients(
        &self,
        event_id: i32,
    ) -> Result<Vec<ActivistContact>, SyncError>;
    async fn record_survey_recipient(
        &self,
        event_id: i32,
        activist_id: i32,
        status: SyncStatus,
    ) -> Result<(), SyncError>;
    async fn record_survey_sync(&self, event_id: i32, status: SyncStatus) -> Result<(), SyncError>;

    async fn facebook_pages(&self) -> Result<Vec<FacebookPage>, SyncError>;
    async fn upsert_facebook_event(&self, event: &FacebookEvent) -> Result<(), SyncError>;
    async fn record_facebook_sync(&self, page_id: i64, status: SyncStatus) -> Result<(), SyncError>;
}

pub type SyncStoreState = Arc<dyn SyncStore>;

#[async_trait]
impl SyncStore for PostgresRepository {
    async fn pending_supporters(
        &self,
        list_id: &str,
        issues: Option<u8>,
        limit: i64,
    ) -> Result<Vec<SupporterBasic>, SyncError> {
        let rows = sqlx::query_as::<_, SupporterBasic>(
            r#"
            SELECT s.id, s.first_name, s.last_name, s.email
            FROM supporters s
            WHERE s.email <> ''
              AND NOT EXISTS (
                  SELECT 1 FROM supporters_sendy_sync ss
                  WHERE ss.supporter_id = s.id AND ss.list_id = $1 AND ss.status = 1
              )
              AND (
                  $2::SMALLINT IS NULL
                  OR (CASE WHEN s.issue_public_health THEN 1 ELSE 0 END)
                   + (CASE WHEN s.issue_climate THEN 2 ELSE 0 END)
                   + (CASE WHEN s.issue_housing OR s.issue_homelessness THEN 4 ELSE 0 END) = $2
              )
            ORDER BY (
                SELECT MAX(ss.synced_at) FROM supporters_sendy_sync ss
                WHERE ss.supporter_id = s.id AND ss.list_id = $1
            ) ASC NULLS FIRST, s.id
            LIMIT $3
            "#,
        )
        .bind(list_id)
        .bind(issues.map(i16::from))
        .bind(limit)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    async fn record_supporter_sync(
        &self,
        supporter_id: i32,
        list_id: &str,
        status: SyncStatus,
    ) -> Result<(), SyncError> {
        sqlx::query(
            "INSERT INTO supporters_sendy_sync (supporter_id, list_id, status, synced_at) VALUES ($1, $2, $3, NOW())",
        )
        .bind(supporter_id)
        .bind(list_id)
        .bind(status.as_i16())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn pending_list_members(
        &self,
        list_id: &str,
        levels: &[String],
        limit: i64,
    ) -> Result<Vec<ActivistContact>, SyncError> {
        let rows = sqlx::query_as::<_, ActivistContact>(
            r#"
            SELECT a.id, a.name, a.email
            FROM activists a
            WHERE NOT a.hidden
              AND a.email <> ''
              AND a.activist_level = ANY($2)
              AND NOT EXISTS (
                  SELECT 1 FROM activists_mailing_list_sync m
                  WHERE m.activist_id = a.id AND m.list_id = $1 AND m.status = 1
              )
            ORDER BY (
                SELECT MAX(m.synced_at) FROM activists_mailing_list_sync m
                WHERE m.activist_id = a.id AND m.list_id = $1
            ) ASC NULLS FIRST, a.id
            LIMIT $3
            "#,
        )
        .bind(list_id)
        .bind(levels)
        .bind(limit)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    async fn record_list_member_sync(
        &self,
        activist_id: i32,
        list_id: &str,
        status: SyncStatus,
    ) -> Result<(), SyncError> {
        sqlx::query(
            "INSERT INTO activists_mailing_list_sync (activist_id, list_id, status, synced_at) VALUES ($1, $2, $3, NOW())",
        )
        .bind(activist_id)
        .bind(list_id)
        .bind(status.as_i16())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn pending_survey_events(
        &self,
        event_types: &[String],
        from: NaiveDate,
        until: NaiveDate,
        limit: i64,
    ) -> Result<Vec<SurveyEvent>, SyncError> {
        let rows = sqlx::query_as::<_, SurveyEvent>(
            r#"
            SELECT e.id, e.name, e.date, e.event_type
            FROM events e
            WHERE e.event_type = ANY($1)
              AND e.date >= $2
              AND e.date < $3
              AND NOT EXISTS (
                  SELECT 1 FROM events_survey_sync s
                  WHERE s.event_id = e.id AND s.status = 1
              )
            ORDER BY e.date, e.id
            LIMIT $4
            "#,
        )
        .bind(event_types)
        .bind(from)
        .bind(until)
        .bind(limit)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    async fn pending_survey_recipients(
        &self,
        event_id: i32,
    ) -> Result<Vec<ActivistContact>, SyncError> {
        let rows = sqlx::query_as::<_, ActivistContact>(
            r#"
            SELECT a.id, a.name, a.email
            FROM event_attendance ea
            JOIN activists a ON a.id = ea.activist_id
            WHERE ea.event_id = $1
              AND NOT EXISTS (
                  SELECT 1 FROM events_survey_recipient_sync r
                  WHERE r.event_id = ea.event_id AND r.activist_id = a.id AND r.status = 1
              )
            ORDER BY a.name
            "#,
        )
        .bind(event_id)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    async fn record_survey_recipient(
        &self,
        event_id: i32,
        activist_id: i32,
        status: SyncStatus,
    ) -> Result<(), SyncError> {
        sqlx::query(
            r#"
            INSERT INTO events_survey_recipient_sync (event_id, activist_id, status, synced_at)
            VALUES ($1, $2, $3, NOW())
            "#,
        )
        .bind(event_id)
        .bind(activist_id)
        .bind(status.as_i16())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn record_survey_sync(
        &self,
        event_id: i32,
        status: SyncStatus,
    ) -> Result<(), SyncError> {
        sqlx::query(
            "INSERT INTO events_survey_sync (event_id, status, synced_at) VALUES ($1, $2, NOW())",
        )
        .bind(event_id)
        .bind(status.as_i16())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn facebook_pages(&self) -> Result<Vec<FacebookPage>, SyncError> {
        let rows = sqlx::query_as::<_, FacebookPage>(
            "SELECT id, name, token FROM fb_pages WHERE token <> '' ORDER BY id",
        )
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    async fn upsert_facebook_event(&self, event: &FacebookEvent) -> Result<(), SyncError> {
        sqlx::query(
            r#"
            INSERT INTO fb_events (
                id, page_id, name, description, start_time, end_time, location_name,
                location_city, location_country, location_state, location_address, location_zip,
                lat, lng, cover, attending_count, interested_count, is_canceled, last_update
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, NOW())
            ON CONFLICT (id) DO UPDATE SET
                page_id = EXCLUDED.page_id,
                name = EXCLUDED.name,
                description = EXCLUDED.description,
                start_time = EXCLUDED.start_time,
                end_time = EXCLUDED.end_time,
                location_name = EXCLUDED.location_name,
                location_city = EXCLUDED.location_city,
                location_country = EXCLUDED.location_country,
                location_state = EXCLUDED.location_state,
                location_address = EXCLUDED.location_address,
                location_zip = EXCLUDED.location_zip,
                lat = EXCLUDED.lat,
                lng = EXCLUDED.lng,
                cover = EXCLUDED.cover,
                attending_count = EXCLUDED.attending_count,
                interested_count = EXCLUDED.interested_count,
                is_canceled = EXCLUDED.is_canceled,
                last_update = NOW()
            "#,
        )
        .bind(event.id)
        .bind(event.page_id)
        .bind(&event.name)
        .bind(&event.description)
        .bind(event.start_time)
        .bind(event.end_time)
        .bind(&event.location_name)
        .bind(&event.location_city)
        .bind(&event.location_country)
        .bind(&event.location_state)
        .bind(&event.location_address)
        .bind(&event.location_zip)
        .bind(event.lat)
        .bind(event.lng)
        .bind(&event.cover)
        .bind(event.attending_count)
        .bind(event.interested_count)
        .bind(event.is_canceled)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn record_facebook_sync(
        &self,
        page_id: i64,
        status: SyncStatus,
    ) -> Result<(), SyncError> {
        sqlx::query(
            "INSERT INTO facebook_page_sync (page_id, status, synced_at) VALUES ($1, $2, NOW())",
        )
        .bind(page_id)
        .bind(status.as_i16())
        .execute(self.pool())
        .await?;
        Ok(())
    }
}
