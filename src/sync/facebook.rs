use std::time::Duration;

use async_trait::async_trait;

use super::{SyncJob, SyncReport, SyncStatus, SyncStoreState};
use crate::clients::FacebookState;
use crate::models::FacebookPage;

/// FacebookEventSync
///
/// Hourly mirror of every chapter page's upcoming events into `fb_events`.
pub struct FacebookEventSync {
    store: SyncStoreState,
    api: FacebookState,
}

impl FacebookEventSync {
    pub fn new(store: SyncStoreState, api: FacebookState) -> Self {
        Self { store, api }
    }

    async fn sync_page(&self, page: &FacebookPage) -> SyncStatus {
        let events = match self.api.upcoming_events(page).await {
            Ok(events) => events,
            Err(e) => {
                tracing::warn!(
                    page_id = page.id,
                    page = %page.name,
                    error = %e,
                    "could not fetch facebook events"
                );
                return SyncStatus::Error;
            }
        };

        let mut status = SyncStatus::Synced;
        for raw in events {
            let event_id = raw.id.clone();
            let result = match raw.into_event(page.id) {
                Ok(event) => self.store.upsert_facebook_event(&event).await,
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                tracing::warn!(
                    page_id = page.id,
                    event_id = %event_id,
                    error = %e,
                    "could not store facebook event"
                );
                status = SyncStatus::Error;
            }
        }
        status
    }
}

#[async_trait]
impl SyncJob for FacebookEventSync {
    fn name(&self) -> &'static str {
        "facebook_events"
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(60 * 60)
    }

    async fn run_pass(&self) -> SyncReport {
        let mut report = SyncReport::default();

        let pages = match self.store.facebook_pages().await {
            Ok(pages) => pages,
            Err(e) => {
                tracing::error!(error = %e, "could not list facebook pages");
                return report;
            }
        };

        for page in pages {
            let status = self.sync_page(&page).await;
            if let Err(e) = self.store.record_facebook_sync(page.id, status).await {
                tracing::error!(page_id = page.id, error = %e, "could not record facebook sync");
            }
            report.record(status);
        }
        report
    }
}
