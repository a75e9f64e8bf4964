use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use thiserror::Error;
use tokio::{task::JoinHandle, time::MissedTickBehavior};

pub mod facebook;
pub mod mailing_list;
pub mod sendy;
pub mod store;
pub mod survey;

pub use store::{SyncStore, SyncStoreState};

/// Upper bound on the rows a single pass selects per target.
pub const BATCH_LIMIT: i64 = 1000;

/// SyncStatus
///
/// Outcome recorded for an entity/target pair. Stored as a SMALLINT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Synced = 1,
    Error = 2,
}

impl SyncStatus {
    pub fn as_i16(self) -> i16 {
        self as i16
    }

    pub fn from_result<T, E>(result: &Result<T, E>) -> Self {
        match result {
            Ok(_) => SyncStatus::Synced,
            Err(_) => SyncStatus::Error,
        }
    }
}

/// SyncError
///
/// Failures of a single external call made by a job. They are logged and recorded as
/// `SyncStatus::Error`; none of them stop the pass.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("network error: {0}")]
    Network(String),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("rejected by remote service: {0}")]
    Rejected(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        SyncError::Network(err.to_string())
    }
}

/// Tally of one pass, logged when the pass ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub attempted: usize,
    pub synced: usize,
    pub failed: usize,
}

impl SyncReport {
    pub fn record(&mut self, status: SyncStatus) {
        self.attempted += 1;
        match status {
            SyncStatus::Synced => self.synced += 1,
            SyncStatus::Error => self.failed += 1,
        }
    }

    pub fn merge(&mut self, other: SyncReport) {
        self.attempted += other.attempted;
        self.synced += other.synced;
        self.failed += other.failed;
    }
}

/// SyncJob
///
/// A periodic background job. `run_pass` selects a bounded batch of pending work,
/// pushes it to the remote service and records the outcome per item. It must not
/// panic; per-item failures are logged and counted in the report.
#[async_trait]
pub trait SyncJob: Send + Sync {
    fn name(&self) -> &'static str;
    fn interval(&self) -> Duration;
    async fn run_pass(&self) -> SyncReport;
}

/// Runs `job` forever on its own task, one pass per interval tick. Each pass runs on
/// a task of its own; a pass that panics is logged and the job carries on at the
/// next tick.
pub fn spawn_job(job: Arc<dyn SyncJob>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let name = job.name();
        let mut ticker = tokio::time::interval(job.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(
            job = name,
            interval_secs = job.interval().as_secs(),
            "sync job started"
        );
        loop {
            ticker.tick().await;
            tracing::info!(job = name, "sync pass starting");

            let pass = tokio::spawn({
                let job = job.clone();
                async move { job.run_pass().await }
            });
            match pass.await {
                Ok(report) => tracing::info!(
                    job = name,
                    attempted = report.attempted,
                    synced = report.synced,
                    failed = report.failed,
                    "sync pass finished"
                ),
                Err(e) => tracing::error!(job = name, error = %e, "sync pass aborted"),
            }
        }
    })
}
