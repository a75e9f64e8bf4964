use std::time::Duration;

use async_trait::async_trait;

use super::{BATCH_LIMIT, SyncJob, SyncReport, SyncStatus, SyncStoreState};
use crate::clients::SendyState;
use crate::config::SendyLists;

pub const PUBLIC_HEALTH: u8 = 1;
pub const CLIMATE: u8 = 1 << 1;
// Set when a supporter cares about housing, homelessness, or both.
pub const HOUSING_HOMELESSNESS: u8 = 1 << 2;

/// One Sendy list and the supporters it receives. `issues == None` is the list of
/// every supporter; otherwise supporters whose issue bitmask equals `issues` exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendyTarget {
    pub list_id: String,
    pub issues: Option<u8>,
}

/// sendy_targets
///
/// The all-supporters list followed by one list per non-empty issue subset, in
/// bitmask order. Lists without an id are skipped.
pub fn sendy_targets(lists: &SendyLists) -> Vec<SendyTarget> {
    let subsets: [(u8, &str); 7] = [
        (PUBLIC_HEALTH, &lists.public_health_only),
        (CLIMATE, &lists.climate_only),
        (PUBLIC_HEALTH | CLIMATE, &lists.public_health_climate),
        (HOUSING_HOMELESSNESS, &lists.housing_homelessness_only),
        (
            PUBLIC_HEALTH | HOUSING_HOMELESSNESS,
            &lists.public_health_housing_homelessness,
        ),
        (
            CLIMATE | HOUSING_HOMELESSNESS,
            &lists.climate_housing_homelessness,
        ),
        (
            PUBLIC_HEALTH | CLIMATE | HOUSING_HOMELESSNESS,
            &lists.public_health_climate_housing_homelessness,
        ),
    ];

    let mut targets = Vec::with_capacity(subsets.len() + 1);
    if lists.all_adb.is_empty() {
        tracing::info!("no all-supporters sendy list configured");
    } else {
        targets.push(SendyTarget {
            list_id: lists.all_adb.clone(),
            issues: None,
        });
    }

    for (mask, list_id) in subsets {
        if list_id.is_empty() {
            tracing::info!(issues = mask, "no sendy list configured for issue subset");
            continue;
        }
        targets.push(SendyTarget {
            list_id: list_id.to_string(),
            issues: Some(mask),
        });
    }
    targets
}

/// SendySupporterSync
///
/// Subscribes supporters to their Sendy lists every six minutes.
pub struct SendySupporterSync {
    store: SyncStoreState,
    client: SendyState,
    targets: Vec<SendyTarget>,
    batch_limit: i64,
}

impl SendySupporterSync {
    pub fn new(store: SyncStoreState, client: SendyState, lists: &SendyLists) -> Self {
        Self {
            store,
            client,
            targets: sendy_targets(lists),
            batch_limit: BATCH_LIMIT,
        }
    }

    /// Caps how many supporters one pass selects per list.
    pub fn with_batch_limit(mut self, limit: i64) -> Self {
        self.batch_limit = limit;
        self
    }

    pub fn targets(&self) -> &[SendyTarget] {
        &self.targets
    }

    async fn sync_target(&self, target: &SendyTarget) -> SyncReport {
        let mut report = SyncReport::default();

        let supporters = match self
            .store
            .pending_supporters(&target.list_id, target.issues, self.batch_limit)
            .await
        {
            Ok(supporters) => supporters,
            Err(e) => {
                tracing::error!(list = %target.list_id, error = %e, "could not select supporters");
                return report;
            }
        };

        for supporter in supporters {
            let result = self
                .client
                .subscribe(&target.list_id, &supporter.display_name(), &supporter.email)
                .await;
            if let Err(e) = &result {
                tracing::warn!(
                    supporter_id = supporter.id,
                    list = %target.list_id,
                    error = %e,
                    "sendy subscribe failed"
                );
            }

            let status = SyncStatus::from_result(&result);
            if let Err(e) = self
                .store
                .record_supporter_sync(supporter.id, &target.list_id, status)
                .await
            {
                tracing::error!(
                    supporter_id = supporter.id,
                    error = %e,
                    "could not record sendy sync"
                );
            }
            report.record(status);
        }
        report
    }
}

#[async_trait]
impl SyncJob for SendySupporterSync {
    fn name(&self) -> &'static str {
        "sendy_supporters"
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(6 * 60)
    }

    async fn run_pass(&self) -> SyncReport {
        let mut report = SyncReport::default();
        for target in &self.targets {
            report.merge(self.sync_target(target).await);
        }
        report
    }
}
