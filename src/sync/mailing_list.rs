use std::{path::Path, time::Duration};

use async_trait::async_trait;
use serde::Deserialize;

use super::{BATCH_LIMIT, SyncError, SyncJob, SyncReport, SyncStatus, SyncStoreState};
use crate::clients::SendyState;

/// MailingList
///
/// One entry of the mailing list config file: a Sendy list and the activist levels
/// whose members belong on it.
///
/// ```json
/// [{ "list_id": "abc123", "activist_levels": ["Organizer", "Chapter Member"] }]
/// ```
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct MailingList {
    pub list_id: String,
    #[serde(default)]
    pub activist_levels: Vec<String>,
}

/// Parses the config file contents, dropping entries without a list id or levels.
pub fn parse_mailing_lists(raw: &str) -> Result<Vec<MailingList>, SyncError> {
    let lists: Vec<MailingList> = serde_json::from_str(raw)
        .map_err(|e| SyncError::Config(format!("invalid mailing list config: {}", e)))?;

    Ok(lists
        .into_iter()
        .filter(|list| {
            let usable = !list.list_id.trim().is_empty() && !list.activist_levels.is_empty();
            if !usable {
                tracing::warn!(list = %list.list_id, "ignoring incomplete mailing list entry");
            }
            usable
        })
        .collect())
}

pub fn load_mailing_lists(path: impl AsRef<Path>) -> Result<Vec<MailingList>, SyncError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|e| {
        SyncError::Config(format!("cannot read {}: {}", path.display(), e))
    })?;
    parse_mailing_lists(&raw)
}

/// MailingListSync
///
/// Hourly subscription of activists to the lists matching their level.
pub struct MailingListSync {
    store: SyncStoreState,
    client: SendyState,
    lists: Vec<MailingList>,
}

impl MailingListSync {
    pub fn new(store: SyncStoreState, client: SendyState, lists: Vec<MailingList>) -> Self {
        Self {
            store,
            client,
            lists,
        }
    }

    async fn sync_list(&self, list: &MailingList) -> SyncReport {
        let mut report = SyncReport::default();

        let members = match self
            .store
            .pending_list_members(&list.list_id, &list.activist_levels, BATCH_LIMIT)
            .await
        {
            Ok(members) => members,
            Err(e) => {
                tracing::error!(list = %list.list_id, error = %e, "could not select list members");
                return report;
            }
        };

        for member in members {
            let result = self
                .client
                .subscribe(&list.list_id, member.name.trim(), &member.email)
                .await;
            if let Err(e) = &result {
                tracing::warn!(
                    activist_id = member.id,
                    list = %list.list_id,
                    error = %e,
                    "mailing list subscribe failed"
                );
            }

            let status = SyncStatus::from_result(&result);
            if let Err(e) = self
                .store
                .record_list_member_sync(member.id, &list.list_id, status)
                .await
            {
                tracing::error!(
                    activist_id = member.id,
                    error = %e,
                    "could not record mailing list sync"
                );
            }
            report.record(status);
        }
        report
    }
}

#[async_trait]
impl SyncJob for MailingListSync {
    fn name(&self) -> &'static str {
        "mailing_lists"
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(60 * 60)
    }

    async fn run_pass(&self) -> SyncReport {
        let mut report = SyncReport::default();
        for list in &self.lists {
            report.merge(self.sync_list(list).await);
        }
        report
    }
}
