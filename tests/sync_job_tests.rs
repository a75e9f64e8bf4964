mod common;

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use adb::{
    clients::{
        FacebookApi, MockMailer, SendyState,
        facebook::{GraphEvent, GraphLocation, GraphPlace, parse_graph_time},
        sendy::interpret_subscribe_response,
    },
    config::{SendyLists, SurveyConfig},
    models::{ActivistContact, FacebookEvent, FacebookPage, SupporterBasic, SurveyEvent},
    sync::{
        SyncError, SyncJob, SyncReport, SyncStatus, SyncStore, SyncStoreState, spawn_job,
        facebook::FacebookEventSync,
        mailing_list::{MailingList, MailingListSync, parse_mailing_lists},
        sendy::{
            CLIMATE, HOUSING_HOMELESSNESS, PUBLIC_HEALTH, SendySupporterSync, SendyTarget,
            sendy_targets,
        },
        survey::SurveyMailer,
    },
};
use async_trait::async_trait;
use chrono::NaiveDate;
use common::MockSendy;

// --- Mock SyncStore ---

#[derive(Default)]
struct StoreData {
    supporters: Vec<(SupporterBasic, u8)>,
    supporter_syncs: Vec<(i32, String, SyncStatus)>,
    activists: Vec<(ActivistContact, String)>,
    list_syncs: Vec<(i32, String, SyncStatus)>,
    events: Vec<SurveyEvent>,
    attendance: Vec<(i32, ActivistContact)>,
    survey_syncs: Vec<(i32, SyncStatus)>,
    recipient_syncs: Vec<(i32, i32, SyncStatus)>,
    pages: Vec<FacebookPage>,
    fb_events: Vec<FacebookEvent>,
    page_syncs: Vec<(i64, SyncStatus)>,
}

/// In-memory `SyncStore` following the same selection rule as Postgres: anything
/// without a `Synced` record for the target is pending.
#[derive(Default)]
struct MockSyncStore {
    data: Mutex<StoreData>,
}

impl MockSyncStore {
    fn with<F: FnOnce(&mut StoreData)>(self, setup: F) -> Self {
        setup(&mut self.data.lock().unwrap());
        self
    }
}

fn synced<K: PartialEq>(records: &[(i32, K, SyncStatus)], id: i32, key: &K) -> bool {
    records
        .iter()
        .any(|(rid, rkey, status)| *rid == id && rkey == key && *status == SyncStatus::Synced)
}

/// Position of the latest attempt for `(id, key)`; records are appended in time order.
fn last_attempt<K: PartialEq>(
    records: &[(i32, K, SyncStatus)],
    id: i32,
    key: &K,
) -> Option<usize> {
    records
        .iter()
        .rposition(|(rid, rkey, _)| *rid == id && rkey == key)
}

#[async_trait]
impl SyncStore for MockSyncStore {
    async fn pending_supporters(
        &self,
        list_id: &str,
        issues: Option<u8>,
        limit: i64,
    ) -> Result<Vec<SupporterBasic>, SyncError> {
        let data = self.data.lock().unwrap();
        let list_id = list_id.to_string();
        let mut pending: Vec<SupporterBasic> = data
            .supporters
            .iter()
            .filter(|(s, mask)| !s.email.is_empty() && issues.is_none_or(|i| i == *mask))
            .filter(|(s, _)| !synced(&data.supporter_syncs, s.id, &list_id))
            .map(|(s, _)| s.clone())
            .collect();
        // Never attempted first (None sorts first), then the least recently attempted.
        pending.sort_by_key(|s| (last_attempt(&data.supporter_syncs, s.id, &list_id), s.id));
        pending.truncate(limit as usize);
        Ok(pending)
    }

    async fn record_supporter_sync(
        &self,
        supporter_id: i32,
        list_id: &str,
        status: SyncStatus,
    ) -> Result<(), SyncError> {
        let mut data = self.data.lock().unwrap();
        data.supporter_syncs
            .push((supporter_id, list_id.to_string(), status));
        Ok(())
    }

    async fn pending_list_members(
        &self,
        list_id: &str,
        levels: &[String],
        limit: i64,
    ) -> Result<Vec<ActivistContact>, SyncError> {
        let data = self.data.lock().unwrap();
        let list_id = list_id.to_string();
        let mut pending: Vec<ActivistContact> = data
            .activists
            .iter()
            .filter(|(a, level)| !a.email.is_empty() && levels.contains(level))
            .filter(|(a, _)| !synced(&data.list_syncs, a.id, &list_id))
            .map(|(a, _)| a.clone())
            .collect();
        pending.sort_by_key(|a| (last_attempt(&data.list_syncs, a.id, &list_id), a.id));
        pending.truncate(limit as usize);
        Ok(pending)
    }

    async fn record_list_member_sync(
        &self,
        activist_id: i32,
        list_id: &str,
        status: SyncStatus,
    ) -> Result<(), SyncError> {
        let mut data = self.data.lock().unwrap();
        data.list_syncs.push((activist_id, list_id.to_string(), status));
        Ok(())
    }

    async fn pending_survey_events(
        &self,
        event_types: &[String],
        from: NaiveDate,
        until: NaiveDate,
        limit: i64,
    ) -> Result<Vec<SurveyEvent>, SyncError> {
        let data = self.data.lock().unwrap();
        Ok(data
            .events
            .iter()
            .filter(|e| event_types.contains(&e.event_type) && e.date >= from && e.date < until)
            .filter(|e| {
                !data
                    .survey_syncs
                    .iter()
                    .any(|(id, status)| *id == e.id && *status == SyncStatus::Synced)
            })
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn pending_survey_recipients(
        &self,
        event_id: i32,
    ) -> Result<Vec<ActivistContact>, SyncError> {
        let data = self.data.lock().unwrap();
        Ok(data
            .attendance
            .iter()
            .filter(|(id, _)| *id == event_id)
            .filter(|(_, a)| !synced(&data.recipient_syncs, event_id, &a.id))
            .map(|(_, a)| a.clone())
            .collect())
    }

    async fn record_survey_recipient(
        &self,
        event_id: i32,
        activist_id: i32,
        status: SyncStatus,
    ) -> Result<(), SyncError> {
        let mut data = self.data.lock().unwrap();
        data.recipient_syncs.push((event_id, activist_id, status));
        Ok(())
    }

    async fn record_survey_sync(&self, event_id: i32, status: SyncStatus) -> Result<(), SyncError> {
        self.data.lock().unwrap().survey_syncs.push((event_id, status));
        Ok(())
    }

    async fn facebook_pages(&self) -> Result<Vec<FacebookPage>, SyncError> {
        Ok(self.data.lock().unwrap().pages.clone())
    }

    async fn upsert_facebook_event(&self, event: &FacebookEvent) -> Result<(), SyncError> {
        let mut data = self.data.lock().unwrap();
        data.fb_events.retain(|e| e.id != event.id);
        data.fb_events.push(event.clone());
        Ok(())
    }

    async fn record_facebook_sync(
        &self,
        page_id: i64,
        status: SyncStatus,
    ) -> Result<(), SyncError> {
        self.data.lock().unwrap().page_syncs.push((page_id, status));
        Ok(())
    }
}

fn supporter(id: i32, email: &str) -> SupporterBasic {
    SupporterBasic {
        id,
        first_name: format!("First{}", id),
        last_name: "Last".to_string(),
        email: email.to_string(),
    }
}

fn contact(id: i32, name: &str, email: &str) -> ActivistContact {
    ActivistContact {
        id,
        name: name.to_string(),
        email: email.to_string(),
    }
}

// --- Sendy response handling ---

#[test]
fn test_interpret_subscribe_response() {
    assert!(interpret_subscribe_response(200, "1").is_ok());
    assert!(interpret_subscribe_response(200, "Already subscribed.").is_ok());
    assert!(matches!(
        interpret_subscribe_response(200, "Invalid email address."),
        Err(SyncError::Rejected(_))
    ));
    assert!(matches!(
        interpret_subscribe_response(200, "1\n"),
        Err(SyncError::Rejected(_))
    ));
    assert!(matches!(
        interpret_subscribe_response(500, "1"),
        Err(SyncError::Status { status: 500, .. })
    ));
}

#[test]
fn test_sendy_targets_skip_empty_ids() {
    let lists = SendyLists {
        all_adb: "all".to_string(),
        climate_only: "climate".to_string(),
        public_health_climate_housing_homelessness: "everything".to_string(),
        ..SendyLists::default()
    };

    let targets = sendy_targets(&lists);

    assert_eq!(
        targets,
        vec![
            SendyTarget { list_id: "all".to_string(), issues: None },
            SendyTarget { list_id: "climate".to_string(), issues: Some(CLIMATE) },
            SendyTarget {
                list_id: "everything".to_string(),
                issues: Some(PUBLIC_HEALTH | CLIMATE | HOUSING_HOMELESSNESS),
            },
        ]
    );
    assert!(sendy_targets(&SendyLists::default()).is_empty());
}

// --- Sendy supporter sync ---

#[tokio::test]
async fn test_sendy_sync_never_resubmits_synced_supporters() {
    let store = Arc::new(MockSyncStore::default().with(|data| {
        data.supporters.push((supporter(1, "one@example.org"), CLIMATE));
        data.supporters.push((supporter(2, "two@example.org"), PUBLIC_HEALTH));
        data.supporters.push((supporter(3, ""), CLIMATE));
    }));
    let sendy = Arc::new(MockSendy::default());
    let lists = SendyLists {
        all_adb: "all".to_string(),
        climate_only: "climate".to_string(),
        ..SendyLists::default()
    };
    let job = SendySupporterSync::new(
        store.clone() as SyncStoreState,
        sendy.clone() as SendyState,
        &lists,
    );

    let first = job.run_pass().await;
    assert_eq!(first, SyncReport { attempted: 3, synced: 3, failed: 0 });

    let subscribed = sendy.subscribed();
    let entry = |list: &str, name: &str, email: &str| -> (String, String, String) {
        (list.into(), name.into(), email.into())
    };
    assert!(subscribed.contains(&entry("all", "First1 Last", "one@example.org")));
    assert!(subscribed.contains(&entry("climate", "First1 Last", "one@example.org")));
    assert!(
        !subscribed
            .iter()
            .any(|(list, _, email)| list == "climate" && email == "two@example.org")
    );

    let second = job.run_pass().await;
    assert_eq!(second, SyncReport::default());
    assert_eq!(sendy.subscribed().len(), 3);
}

#[tokio::test]
async fn test_sendy_sync_retries_failed_supporters() {
    let store = Arc::new(MockSyncStore::default().with(|data| {
        data.supporters.push((supporter(1, "ok@example.org"), 0));
        data.supporters.push((supporter(2, "bad@example.org"), 0));
    }));
    let sendy = Arc::new(MockSendy::failing(&["bad@example.org"]));
    let lists = SendyLists {
        all_adb: "all".to_string(),
        ..SendyLists::default()
    };
    let job = SendySupporterSync::new(store.clone(), sendy.clone(), &lists);

    let first = job.run_pass().await;
    assert_eq!(first, SyncReport { attempted: 2, synced: 1, failed: 1 });

    // The failed supporter stays pending and is attempted again.
    let second = job.run_pass().await;
    assert_eq!(second, SyncReport { attempted: 1, synced: 0, failed: 1 });

    let data = store.data.lock().unwrap();
    let errors = data
        .supporter_syncs
        .iter()
        .filter(|(id, _, status)| *id == 2 && *status == SyncStatus::Error)
        .count();
    assert_eq!(errors, 2);
}

#[tokio::test]
async fn test_sendy_failures_do_not_starve_new_supporters() {
    let bad: Vec<String> = (1..=3).map(|id| format!("bad{}@example.org", id)).collect();
    let store = Arc::new(MockSyncStore::default().with(|data| {
        for (id, email) in (1..).zip(&bad) {
            data.supporters.push((supporter(id, email), 0));
        }
    }));
    let failing: Vec<&str> = bad.iter().map(String::as_str).collect();
    let sendy = Arc::new(MockSendy::failing(&failing));
    let lists = SendyLists {
        all_adb: "all".to_string(),
        ..SendyLists::default()
    };
    let job = SendySupporterSync::new(store.clone(), sendy.clone(), &lists).with_batch_limit(2);

    // Supporters 1 and 2 fail; 3 has not been tried yet.
    assert_eq!(job.run_pass().await.failed, 2);

    // A newcomer arrives after the failures.
    store
        .data
        .lock()
        .unwrap()
        .supporters
        .push((supporter(10, "new@example.org"), 0));

    let report = job.run_pass().await;
    assert_eq!(report, SyncReport { attempted: 2, synced: 1, failed: 1 });
    assert!(sendy.subscribed().iter().any(|(_, _, email)| email == "new@example.org"));

    let data = store.data.lock().unwrap();
    let attempted_third = data.supporter_syncs.iter().any(|(id, _, _)| *id == 3);
    assert!(attempted_third, "untried supporters come before repeat failures");
}

// --- Mailing lists ---

#[test]
fn test_parse_mailing_lists() {
    let lists = parse_mailing_lists(
        r#"[
            {"list_id": "orgs", "activist_levels": ["Organizer"]},
            {"list_id": "", "activist_levels": ["Organizer"]},
            {"list_id": "empty"}
        ]"#,
    )
    .unwrap();

    assert_eq!(
        lists,
        vec![MailingList {
            list_id: "orgs".to_string(),
            activist_levels: vec!["Organizer".to_string()],
        }]
    );
    assert!(matches!(parse_mailing_lists("{not json"), Err(SyncError::Config(_))));
}

#[tokio::test]
async fn test_mailing_list_sync_by_level() {
    let store = Arc::new(MockSyncStore::default().with(|data| {
        data.activists.push((contact(1, " Ana ", "ana@example.org"), "Organizer".to_string()));
        data.activists.push((contact(2, "Bo", "bo@example.org"), "Supporter".to_string()));
        data.activists.push((contact(3, "Cy", "cy@example.org"), "Chapter Member".to_string()));
    }));
    let sendy = Arc::new(MockSendy::default());
    let job = MailingListSync::new(
        store.clone(),
        sendy.clone(),
        vec![MailingList {
            list_id: "members".to_string(),
            activist_levels: vec!["Organizer".to_string(), "Chapter Member".to_string()],
        }],
    );

    let report = job.run_pass().await;
    assert_eq!(report.synced, 2);

    let subscribed = sendy.subscribed();
    assert!(subscribed.contains(&("members".into(), "Ana".into(), "ana@example.org".into())));
    assert!(!subscribed.iter().any(|(_, _, email)| email == "bo@example.org"));

    assert_eq!(job.run_pass().await, SyncReport::default());
}

// --- Survey mailer ---

fn survey_config() -> SurveyConfig {
    SurveyConfig {
        missing_email: "missing@example.org".to_string(),
        from_email: "survey@example.org".to_string(),
        link: "https://example.org/survey".to_string(),
        event_types: vec!["Action".to_string(), "Outreach".to_string()],
    }
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn survey_store() -> MockSyncStore {
    MockSyncStore::default().with(|data| {
        data.events.push(SurveyEvent {
            id: 1,
            name: "Sit-in".to_string(),
            date: day(2024, 3, 8),
            event_type: "Action".to_string(),
        });
        // Wrong type.
        data.events.push(SurveyEvent {
            id: 2,
            name: "Meeting".to_string(),
            date: day(2024, 3, 8),
            event_type: "Meeting".to_string(),
        });
        // Outside the seven-day window.
        data.events.push(SurveyEvent {
            id: 3,
            name: "Old march".to_string(),
            date: day(2024, 2, 1),
            event_type: "Action".to_string(),
        });
        data.attendance.push((1, contact(10, "Ana Lee", "ana@example.org")));
        data.attendance.push((1, contact(11, "Bo", "")));
    })
}

#[tokio::test]
async fn test_survey_mailer_sends_once_and_reports_missing_emails() {
    let store = Arc::new(survey_store());
    let mailer = MockMailer::new();
    let job = SurveyMailer::new(store.clone(), Arc::new(mailer.clone()), survey_config());

    let report = job.run_pass_on(day(2024, 3, 10)).await;
    assert_eq!(report, SyncReport { attempted: 1, synced: 1, failed: 0 });

    let sent = mailer.sent();
    assert_eq!(sent.len(), 2);
    let survey = sent.iter().find(|m| m.to == "ana@example.org").unwrap();
    assert!(survey.subject.contains("Sit-in"));
    assert!(survey.body_text.starts_with("Hi Ana,"));
    assert!(survey.body_text.contains("https://example.org/survey"));
    let notice = sent.iter().find(|m| m.to == "missing@example.org").unwrap();
    assert!(notice.body_text.contains("Bo"));

    let again = job.run_pass_on(day(2024, 3, 10)).await;
    assert_eq!(again, SyncReport::default());
    assert_eq!(mailer.sent().len(), 2);
}

#[tokio::test]
async fn test_survey_mailer_retries_after_send_failure() {
    let store = Arc::new(survey_store());
    let mailer = Arc::new(MockMailer::new_failing());
    let job = SurveyMailer::new(store.clone(), mailer, survey_config());

    let report = job.run_pass_on(day(2024, 3, 10)).await;
    assert_eq!(report.failed, 1);

    let report = job.run_pass_on(day(2024, 3, 10)).await;
    assert_eq!(report.attempted, 1, "failed events stay pending");
    assert_eq!(
        store.data.lock().unwrap().survey_syncs,
        vec![(1, SyncStatus::Error), (1, SyncStatus::Error)]
    );
}

#[tokio::test]
async fn test_survey_retry_only_mails_attendees_still_pending() {
    let store = Arc::new(MockSyncStore::default().with(|data| {
        data.events.push(SurveyEvent {
            id: 1,
            name: "Sit-in".to_string(),
            date: day(2024, 3, 8),
            event_type: "Action".to_string(),
        });
        data.attendance.push((1, contact(10, "Ana", "ana@example.org")));
        data.attendance.push((1, contact(11, "Bad", "bad@example.org")));
        data.attendance.push((1, contact(12, "Bo", "")));
    }));
    let mailer = MockMailer {
        failing_recipients: vec!["bad@example.org".to_string()],
        ..MockMailer::new()
    };
    let job = SurveyMailer::new(store.clone(), Arc::new(mailer.clone()), survey_config());

    for _ in 0..3 {
        let report = job.run_pass_on(day(2024, 3, 10)).await;
        assert_eq!(report, SyncReport { attempted: 1, synced: 0, failed: 1 });
    }

    let delivered_to = |to: &str| mailer.sent().iter().filter(|m| m.to == to).count();
    assert_eq!(delivered_to("ana@example.org"), 1);
    assert_eq!(delivered_to("missing@example.org"), 1);

    let data = store.data.lock().unwrap();
    let bad_attempts = data
        .recipient_syncs
        .iter()
        .filter(|(event, activist, status)| {
            *event == 1 && *activist == 11 && *status == SyncStatus::Error
        })
        .count();
    assert_eq!(bad_attempts, 3);
    drop(data);

    // Once the last attendee gets through, the event is done.
    let recovered = SurveyMailer::new(store.clone(), Arc::new(MockMailer::new()), survey_config());
    let report = recovered.run_pass_on(day(2024, 3, 10)).await;
    assert_eq!(report, SyncReport { attempted: 1, synced: 1, failed: 0 });
    assert_eq!(recovered.run_pass_on(day(2024, 3, 10)).await, SyncReport::default());
}

// --- Facebook events ---

struct FakeGraph;

#[async_trait]
impl FacebookApi for FakeGraph {
    async fn upcoming_events(&self, page: &FacebookPage) -> Result<Vec<GraphEvent>, SyncError> {
        if page.token.is_empty() {
            return Err(SyncError::Status {
                status: 400,
                body: "invalid token".to_string(),
            });
        }
        Ok(vec![GraphEvent {
            id: format!("{}01", page.id),
            name: "Vigil".to_string(),
            start_time: "2024-03-02T18:00:00-0800".to_string(),
            place: GraphPlace {
                name: "City Hall".to_string(),
                location: GraphLocation {
                    city: "San Francisco".to_string(),
                    latitude: 37.77,
                    longitude: -122.42,
                    ..GraphLocation::default()
                },
            },
            ..GraphEvent::default()
        }])
    }
}

#[tokio::test]
async fn test_facebook_sync_records_each_page() {
    let store = Arc::new(MockSyncStore::default().with(|data| {
        data.pages.push(FacebookPage {
            id: 11,
            name: "SF".to_string(),
            token: "token".to_string(),
        });
        data.pages.push(FacebookPage {
            id: 22,
            name: "Broken".to_string(),
            token: String::new(),
        });
    }));
    let job = FacebookEventSync::new(store.clone(), Arc::new(FakeGraph));

    let report = job.run_pass().await;
    assert_eq!(report, SyncReport { attempted: 2, synced: 1, failed: 1 });

    let data = store.data.lock().unwrap();
    assert_eq!(data.page_syncs, vec![(11, SyncStatus::Synced), (22, SyncStatus::Error)]);
    assert_eq!(data.fb_events.len(), 1);
    let event = &data.fb_events[0];
    assert_eq!(event.id, 1101);
    assert_eq!(event.page_id, 11);
    assert_eq!(event.location_city, "San Francisco");
    // Wall-clock time of the event's own zone.
    assert_eq!(event.start_time, day(2024, 3, 2).and_hms_opt(18, 0, 0).unwrap());
}

#[test]
fn test_parse_graph_time() {
    assert!(parse_graph_time("2024-03-02T18:00:00+0000").is_ok());
    assert!(parse_graph_time("2024-03-02").is_err());
}

#[test]
fn test_sync_status_codes() {
    assert_eq!(SyncStatus::Synced.as_i16(), 1);
    assert_eq!(SyncStatus::Error.as_i16(), 2);
    assert_eq!(SyncStatus::from_result::<(), ()>(&Ok(())), SyncStatus::Synced);
    assert_eq!(SyncStatus::from_result::<(), ()>(&Err(())), SyncStatus::Error);
}

// --- Job runner ---

/// Panics on its first pass, then succeeds.
#[derive(Default)]
struct FlakyJob {
    passes: AtomicUsize,
}

#[async_trait]
impl SyncJob for FlakyJob {
    fn name(&self) -> &'static str {
        "flaky"
    }

    fn interval(&self) -> Duration {
        Duration::from_millis(10)
    }

    async fn run_pass(&self) -> SyncReport {
        if self.passes.fetch_add(1, Ordering::SeqCst) == 0 {
            panic!("first pass blows up");
        }
        SyncReport::default()
    }
}

#[tokio::test]
async fn test_spawned_job_survives_a_panicking_pass() {
    let job = Arc::new(FlakyJob::default());
    let handle = spawn_job(job.clone());

    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(!handle.is_finished(), "the job loop keeps running");
    assert!(job.passes.load(Ordering::SeqCst) >= 2);
    handle.abort();
}
