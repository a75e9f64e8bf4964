use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};

use super::{BATCH_LIMIT, SyncJob, SyncReport, SyncStatus, SyncStoreState};
use crate::clients::{MailerState, OutgoingEmail};
use crate::config::SurveyConfig;
use crate::models::{ActivistContact, SurveyEvent};

/// How far back the mailer looks for events.
pub const SURVEY_WINDOW_DAYS: i64 = 7;

/// SurveyMailer
///
/// Hourly job that emails a feedback survey to everyone who attended a recent event
/// of a survey type. Attendees without an email are reported to the configured
/// address in one message per event.
pub struct SurveyMailer {
    store: SyncStoreState,
    mailer: MailerState,
    config: SurveyConfig,
}

fn first_name(name: &str) -> &str {
    name.split_whitespace().next().unwrap_or("")
}

impl SurveyMailer {
    pub fn new(store: SyncStoreState, mailer: MailerState, config: SurveyConfig) -> Self {
        Self {
            store,
            mailer,
            config,
        }
    }

    pub fn survey_email(&self, event: &SurveyEvent, attendee: &ActivistContact) -> OutgoingEmail {
        let greeting = match first_name(&attendee.name) {
            "" => "Hi,".to_string(),
            first => format!("Hi {},", first),
        };
        let date = event.date.format("%B %-d");

        OutgoingEmail {
            from: self.config.from_email.clone(),
            to: attendee.email.clone(),
            subject: format!("How was {}?", event.name),
            body_text: format!(
                "{} Thank you for joining us at {} on {}. Please take a minute to tell us how it went: {}",
                greeting, event.name, date, self.config.link
            ),
            body_html: Some(format!(
                "<p>{}</p><p>Thank you for joining us at {} on {}.</p><p>Please take a minute to tell us how it went: <a href=\"{}\">{}</a></p>",
                greeting, event.name, date, self.config.link, self.config.link
            )),
        }
    }

    pub fn missing_email_notice(&self, event: &SurveyEvent, names: &[String]) -> OutgoingEmail {
        OutgoingEmail {
            from: self.config.from_email.clone(),
            to: self.config.missing_email.clone(),
            subject: format!("Survey not sent: missing emails for {}", event.name),
            body_text: format!(
                "The following attendees of {} ({}) have no email address, so no survey was sent to them:\n{}",
                event.name,
                event.date,
                names.join("\n")
            ),
            body_html: None,
        }
    }

    /// Sends the messages still owed for one event and records each attendee's
    /// outcome. Attendees handled on an earlier pass are not selected again. Synced
    /// once nobody is left pending.
    async fn mail_event(&self, event: &SurveyEvent) -> SyncStatus {
        let pending = match self.store.pending_survey_recipients(event.id).await {
            Ok(pending) => pending,
            Err(e) => {
                tracing::error!(event_id = event.id, error = %e, "could not load attendees");
                return SyncStatus::Error;
            }
        };

        let (with_email, without_email): (Vec<_>, Vec<_>) = pending
            .into_iter()
            .partition(|a| !a.email.trim().is_empty());

        let mut status = SyncStatus::Synced;

        for attendee in &with_email {
            let result = self.mailer.send(&self.survey_email(event, attendee)).await;
            if let Err(e) = &result {
                tracing::warn!(
                    event_id = event.id,
                    activist_id = attendee.id,
                    error = %e,
                    "survey email failed"
                );
            }
            let outcome = SyncStatus::from_result(&result);
            self.record_recipient(event.id, attendee.id, outcome).await;
            if outcome == SyncStatus::Error {
                status = SyncStatus::Error;
            }
        }

        if !without_email.is_empty() {
            let names: Vec<String> = without_email.iter().map(|a| a.name.clone()).collect();
            let result = self
                .mailer
                .send(&self.missing_email_notice(event, &names))
                .await;
            if let Err(e) = &result {
                tracing::warn!(event_id = event.id, error = %e, "missing-email notice failed");
            }
            let outcome = SyncStatus::from_result(&result);
            for attendee in &without_email {
                self.record_recipient(event.id, attendee.id, outcome).await;
            }
            if outcome == SyncStatus::Error {
                status = SyncStatus::Error;
            }
        }

        status
    }

    async fn record_recipient(&self, event_id: i32, activist_id: i32, status: SyncStatus) {
        if let Err(e) = self
            .store
            .record_survey_recipient(event_id, activist_id, status)
            .await
        {
            tracing::error!(event_id, activist_id, error = %e, "could not record survey recipient");
        }
    }

    /// One pass as of `today`: events dated in the seven days before it.
    pub async fn run_pass_on(&self, today: NaiveDate) -> SyncReport {
        let mut report = SyncReport::default();
        let from = today - chrono::Duration::days(SURVEY_WINDOW_DAYS);

        let events = match self
            .store
            .pending_survey_events(&self.config.event_types, from, today, BATCH_LIMIT)
            .await
        {
            Ok(events) => events,
            Err(e) => {
                tracing::error!(error = %e, "could not select survey events");
                return report;
            }
        };

        for event in events {
            let status = self.mail_event(&event).await;
            if let Err(e) = self.store.record_survey_sync(event.id, status).await {
                tracing::error!(event_id = event.id, error = %e, "could not record survey sync");
            }
            report.record(status);
        }
        report
    }
}

#[async_trait]
impl SyncJob for SurveyMailer {
    fn name(&self) -> &'static str {
        "survey_mailer"
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(60 * 60)
    }

    async fn run_pass(&self) -> SyncReport {
        self.run_pass_on(Utc::now().date_naive()).await
    }
}
