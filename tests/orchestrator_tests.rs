//! Orchestration tests: the balance floor fail-safe, the discovery trigger
//! end-to-end (discover → select → schedule → notify), and the placement
//! trigger's terminal states — each run ending with exactly one
//! notification.

mod support;

use chrono::{Duration, FixedOffset, TimeZone, Utc};
use rust_decimal_macros::dec;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use betpilot::engine::orchestrator::{Orchestrator, RunReport};
use betpilot::external::notify::{SUBJECT_ERROR, SUBJECT_INFO};
use betpilot::session::Session;
use betpilot::types::{InvocationPayload, Trigger};
use support::{test_config, test_job, FakeUi, RecordingNotifier, RecordingScheduler};

fn site_tz() -> FixedOffset {
    FixedOffset::east_opt(2 * 3600).unwrap()
}

fn local_millis(days_ahead: i64, hour: u32) -> i64 {
    let date = (Utc::now().with_timezone(&site_tz()) + Duration::days(days_ahead)).date_naive();
    site_tz()
        .from_local_datetime(&date.and_hms_opt(hour, 0, 0).unwrap())
        .unwrap()
        .timestamp_millis()
}

async fn mount_balance(server: &MockServer, balance: f64) {
    Mock::given(method("GET"))
        .and(path("/api/balance"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "LOGGED_IN",
            "userInfo": { "account": { "balance": balance } }
        })))
        .mount(server)
        .await;
}

/// Mount a catalogue with one league and two selectable fixtures at 12:00
/// and 16:00 tomorrow.
async fn mount_two_match_catalogue(server: &MockServer, odds: f64) {
    Mock::given(method("GET"))
        .and(path("/api/categories"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "C1", "seoName": "fotbal" }
        ])))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/leagues"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tournaments": [{
                "id": "L1", "name": "Liga 1", "seoName": "liga-1",
                "categoryId": "C1",
                "features": ["MATCHES"], "filters": ["tomorrow"]
            }]
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/leagues/L1/fixtures"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "fixtures": [
                { "id": "fx-1", "name": "FC A - FC B", "seoName": "fc-a-fc-b",
                  "startDatetime": local_millis(1, 12) },
                { "id": "fx-2", "name": "FC C - FC D", "seoName": "fc-c-fc-d",
                  "startDatetime": local_millis(1, 16) }
            ]
        })))
        .mount(server)
        .await;
    for fixture_id in ["fx-1", "fx-2"] {
        Mock::given(method("GET"))
            .and(path(format!("/api/fixtures/{fixture_id}/markets")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "marketTypeId": "mt-1",
                "marketTypeName": "Match result",
                "outcomes": [{ "id": "1", "odds": odds }]
            }])))
            .mount(server)
            .await;
    }
}

async fn bound_session(server: &MockServer) -> Session {
    let config = test_config(&server.uri());
    Session::bind(&FakeUi::logged_in(), &config, None)
        .await
        .unwrap()
}

// ---------------------------------------------------------------------------
// Balance floor
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_balance_floor_purges_every_pending_schedule() {
    let server = MockServer::start().await;
    mount_balance(&server, 1.00).await;

    let config = test_config(&server.uri());
    let session = bound_session(&server).await;
    let scheduler =
        RecordingScheduler::preloaded(&["match-schedule-old-1", "match-schedule-old-2"]);
    let notifier = RecordingNotifier::new();

    let orchestrator = Orchestrator::new(&config, &session, &scheduler, &notifier);
    let report = orchestrator.run_discovery().await.unwrap();

    assert_eq!(
        report,
        RunReport::BalanceExhausted {
            balance: dec!(1.00)
        }
    );
    // Zero schedules remain, regardless of how many were pending.
    assert_eq!(scheduler.pending(), 0);
    assert_eq!(scheduler.purge_count(), 1);

    assert_eq!(notifier.count(), 1);
    let notification = notifier.last().unwrap();
    assert_eq!(notification.subject, SUBJECT_ERROR);
    assert!(notification.body.contains("No balance left"));
}

#[tokio::test]
async fn test_balance_floor_applies_to_placement_too() {
    let server = MockServer::start().await;
    mount_balance(&server, 0.50).await;

    let config = test_config(&server.uri());
    let session = bound_session(&server).await;
    let scheduler = RecordingScheduler::preloaded(&["match-schedule-fx-1"]);
    let notifier = RecordingNotifier::new();
    let job = test_job();
    let driver = FakeUi::new().with_placement_page(&job, "1.85");

    let orchestrator = Orchestrator::new(&config, &session, &scheduler, &notifier);
    let report = orchestrator.run_placement(&driver, &job).await.unwrap();

    assert!(matches!(report, RunReport::BalanceExhausted { .. }));
    assert_eq!(scheduler.pending(), 0);
    // The bet flow never started.
    assert!(driver.navigations().is_empty());
    assert_eq!(notifier.count(), 1);
}

// ---------------------------------------------------------------------------
// Discovery trigger
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_discovery_schedules_selected_matches_and_notifies() {
    let server = MockServer::start().await;
    mount_balance(&server, 25.0).await;
    mount_two_match_catalogue(&server, 1.85).await;

    let config = test_config(&server.uri());
    let session = bound_session(&server).await;
    let scheduler = RecordingScheduler::new();
    let notifier = RecordingNotifier::new();

    let orchestrator = Orchestrator::new(&config, &session, &scheduler, &notifier);
    let report = orchestrator.run_discovery().await.unwrap();

    assert_eq!(report, RunReport::MatchesScheduled { count: 2 });
    assert_eq!(scheduler.pending(), 2);

    let created = scheduler.created();
    assert_eq!(created[0].0, "match-schedule-fx-1");
    assert_eq!(created[1].0, "match-schedule-fx-2");

    // Fire time is kick-off minus the configured lead.
    let tomorrow = (Utc::now().with_timezone(&site_tz()) + Duration::days(1)).date_naive();
    let noon = site_tz()
        .from_local_datetime(&tomorrow.and_hms_opt(12, 0, 0).unwrap())
        .unwrap();
    assert_eq!(created[0].1, noon - Duration::minutes(15));

    // The stored payload round-trips into a placement job.
    let payload = scheduler.payload_of("match-schedule-fx-1").unwrap();
    let parsed: InvocationPayload =
        serde_json::from_value(serde_json::Value::Object(payload)).unwrap();
    match parsed.into_trigger().unwrap() {
        Trigger::Placement(job) => {
            assert_eq!(job.match_name, "FC A - FC B");
            assert_eq!(job.odd_value, dec!(1.85));
            assert!(job.match_url.ends_with("/sports/fotbal/liga-1/fc-a-fc-b"));
        }
        Trigger::Discovery => panic!("expected placement payload"),
    }

    assert_eq!(notifier.count(), 1);
    let notification = notifier.last().unwrap();
    assert_eq!(notification.subject, SUBJECT_INFO);
    assert!(notification.body.contains("Scheduled 2 match(es)"));
    assert_eq!(notification.events.len(), 2);
}

#[tokio::test]
async fn test_discovery_with_no_qualifying_matches_notifies_once() {
    let server = MockServer::start().await;
    mount_balance(&server, 25.0).await;
    // Odds above the 2.0 ceiling: both fixtures are skipped.
    mount_two_match_catalogue(&server, 2.10).await;

    let config = test_config(&server.uri());
    let session = bound_session(&server).await;
    let scheduler = RecordingScheduler::new();
    let notifier = RecordingNotifier::new();

    let orchestrator = Orchestrator::new(&config, &session, &scheduler, &notifier);
    let report = orchestrator.run_discovery().await.unwrap();

    assert_eq!(report, RunReport::MatchesScheduled { count: 0 });
    assert_eq!(scheduler.pending(), 0);
    assert_eq!(notifier.count(), 1);
    assert!(notifier.last().unwrap().body.contains("No suitable matches"));
}

// ---------------------------------------------------------------------------
// Placement trigger
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_placement_success_stakes_balance_and_notifies() {
    let server = MockServer::start().await;
    mount_balance(&server, 25.50).await;

    let config = test_config(&server.uri());
    let session = bound_session(&server).await;
    let scheduler = RecordingScheduler::new();
    let notifier = RecordingNotifier::new();
    let job = test_job();
    let driver = FakeUi::new().with_placement_page(&job, "1.85");

    let orchestrator = Orchestrator::new(&config, &session, &scheduler, &notifier);
    let report = orchestrator.run_placement(&driver, &job).await.unwrap();

    assert_eq!(
        report,
        RunReport::BetPlaced {
            live_odd: dec!(1.85)
        }
    );
    // The whole available balance is staked.
    assert_eq!(driver.typed()[0].1, "25.5");

    assert_eq!(notifier.count(), 1);
    let notification = notifier.last().unwrap();
    assert_eq!(notification.subject, SUBJECT_INFO);
    assert!(notification.body.contains("Placed bet on match FC A - FC B"));
    assert_eq!(notification.events.len(), 1);
}

#[tokio::test]
async fn test_placement_odds_drift_notifies_with_both_values() {
    // Scheduled at 1.90, live at 2.05, ceiling 2.00.
    let server = MockServer::start().await;
    mount_balance(&server, 25.0).await;

    let config = test_config(&server.uri());
    let session = bound_session(&server).await;
    let scheduler = RecordingScheduler::new();
    let notifier = RecordingNotifier::new();
    let job = test_job();
    let driver = FakeUi::new().with_placement_page(&job, "2.05");

    let orchestrator = Orchestrator::new(&config, &session, &scheduler, &notifier);
    let report = orchestrator.run_placement(&driver, &job).await.unwrap();

    assert_eq!(
        report,
        RunReport::OddsChanged {
            scheduled: dec!(1.90),
            live: dec!(2.05)
        }
    );
    assert_eq!(notifier.count(), 1);
    let body = notifier.last().unwrap().body;
    assert!(body.contains("Initial odd: 1.90"));
    assert!(body.contains("actual odd: 2.05"));
}

#[tokio::test]
async fn test_placement_hard_failure_propagates_without_notifying() {
    // A dead page (no elements at all) is an uncaught failure: the caller
    // owns the failure notification, so none is sent here.
    let server = MockServer::start().await;
    mount_balance(&server, 25.0).await;

    let config = test_config(&server.uri());
    let session = bound_session(&server).await;
    let scheduler = RecordingScheduler::new();
    let notifier = RecordingNotifier::new();
    let job = test_job();
    let driver = FakeUi::new();

    let orchestrator = Orchestrator::new(&config, &session, &scheduler, &notifier);
    let result = orchestrator.run_placement(&driver, &job).await;

    assert!(result.is_err());
    assert_eq!(notifier.count(), 0);
}
