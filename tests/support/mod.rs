//! Shared test harness: an in-memory UI driver, recording collaborator
//! fakes, and configuration builders. All state is controllable and
//! observable from test code with no external dependencies.

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use rust_decimal_macros::dec;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use betpilot::browser::{BrowserCookie, Element, Selector, UiDriver, UiError};
use betpilot::config::{
    AgentConfig, AppConfig, DriverConfig, NotificationsConfig, SchedulerConfig, SelectionConfig,
    SessionConfig, WebsiteConfig,
};
use betpilot::external::{Notification, Notifier, Scheduler};
use betpilot::types::PlacementJob;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// A full configuration pointing every endpoint at `api_base` (usually a
/// wiremock server), with all pacing delays zeroed so tests run fast.
pub fn test_config(api_base: &str) -> AppConfig {
    AppConfig {
        agent: AgentConfig {
            name: "BETPILOT-TEST".to_string(),
            secret_id: "test-secrets".to_string(),
            minimum_balance: dec!(2.0),
            diagnostics_dir: std::env::temp_dir().display().to_string(),
        },
        website: WebsiteConfig {
            start_url: format!("{api_base}/"),
            origin: api_base.to_string(),
            balance_endpoint: format!("{api_base}/api/balance"),
            categories_endpoint: format!("{api_base}/api/categories"),
            leagues_endpoint: format!("{api_base}/api/leagues"),
            fixtures_endpoint: format!("{api_base}/api/leagues/{{league_id}}/fixtures"),
            markets_endpoint: format!("{api_base}/api/fixtures/{{fixture_id}}/markets"),
            match_base_url: format!("{api_base}/sports/{{category}}/{{league}}/{{match}}"),
            user_agent: "betpilot-test".to_string(),
            accept_language: "en".to_string(),
            utc_offset_hours: 2,
        },
        selection: SelectionConfig {
            target_market_name: "Match result".to_string(),
            maximum_bet_odd: dec!(2.0),
            minimum_hours_between_matches: 4.0,
            max_bets_per_day: 2,
            minimum_start_hour: 11,
        },
        session: SessionConfig {
            mandatory_cookies: vec!["SESSION".to_string()],
            bind_attempts: 5,
            bind_retry_delay_ms: 0,
            request_timeout_secs: 5,
        },
        driver: DriverConfig {
            webdriver_url: "http://127.0.0.1:9515".to_string(),
            headless: true,
            wait_timeout_secs: 1,
            poll_interval_ms: 10,
            settle_delay_min_secs: 0,
            settle_delay_max_secs: 0,
            click_jitter_max_ms: 0,
        },
        scheduler: SchedulerConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            lead_minutes: 15,
        },
        notifications: NotificationsConfig {
            webhook_url: "http://127.0.0.1:1/send".to_string(),
            from_address: "agent@test.invalid".to_string(),
            to_address: "owner@test.invalid".to_string(),
        },
    }
}

/// A placement job matching the page that [`FakeUi::with_placement_page`]
/// seeds.
pub fn test_job() -> PlacementJob {
    PlacementJob {
        match_url: "http://127.0.0.1:1/sports/fotbal/liga-1/fc-a-fc-b".to_string(),
        market_type_id: "mt-1".to_string(),
        market_type_name: "Match result".to_string(),
        bet_option_id: "opt-2".to_string(),
        match_name: "FC A - FC B".to_string(),
        start_time: "2026-08-08T16:00:00+02:00".to_string(),
        odd_value: dec!(1.90),
        schedule_name: "match-schedule-fx-1".to_string(),
    }
}

pub fn session_cookie() -> BrowserCookie {
    BrowserCookie {
        name: "SESSION".to_string(),
        value: "test-session-token".to_string(),
        domain: None,
    }
}

// ---------------------------------------------------------------------------
// Fake UI driver
// ---------------------------------------------------------------------------

/// Deterministic in-memory `UiDriver`.
///
/// Elements are keyed by their selector's string form; interactions are
/// recorded for assertions. Click interception and staged cookie reads are
/// scriptable per test.
#[derive(Default)]
pub struct FakeUi {
    elements: Mutex<HashMap<String, String>>,
    clicks: Mutex<Vec<String>>,
    typed: Mutex<Vec<(String, String)>>,
    navigations: Mutex<Vec<String>>,
    reloads: AtomicUsize,
    intercepts: Mutex<HashMap<String, usize>>,
    cookie_batches: Mutex<VecDeque<Vec<BrowserCookie>>>,
    quits: AtomicUsize,
}

impl FakeUi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a browser that already holds a valid session cookie.
    pub fn logged_in() -> Self {
        let ui = Self::new();
        ui.push_cookie_batch(vec![session_cookie()]);
        ui
    }

    pub fn set_element(&self, selector: &Selector, text: &str) {
        self.elements
            .lock()
            .unwrap()
            .insert(selector.to_string(), text.to_string());
    }

    pub fn remove_element(&self, selector: &Selector) {
        self.elements.lock().unwrap().remove(&selector.to_string());
    }

    /// Make the next `times` clicks on `selector` fail as intercepted.
    pub fn intercept_clicks(&self, selector: &Selector, times: usize) {
        self.intercepts
            .lock()
            .unwrap()
            .insert(selector.to_string(), times);
    }

    /// Queue a cookie read result. With several batches queued, each
    /// `cookies()` call consumes one; the last batch then repeats.
    pub fn push_cookie_batch(&self, cookies: Vec<BrowserCookie>) {
        self.cookie_batches.lock().unwrap().push_back(cookies);
    }

    /// Seed the full match-detail page the placement flow expects:
    /// an expanded market container, the outcome button rendering
    /// `label\nodd`, the stake input, and the placement button.
    pub fn with_placement_page(self, job: &PlacementJob, displayed_odd: &str) -> Self {
        use betpilot::browser::selectors;
        self.set_element(
            &selectors::bet_container(&job.market_type_id),
            "Match result\n1 X 2",
        );
        self.set_element(
            &selectors::bet_option(&job.bet_option_id),
            &format!("X\n{displayed_odd}"),
        );
        self.set_element(&selectors::stake_input(), "");
        self.set_element(&selectors::placement_button(), "Place bet");
        self
    }

    pub fn clicks(&self) -> Vec<String> {
        self.clicks.lock().unwrap().clone()
    }

    pub fn typed(&self) -> Vec<(String, String)> {
        self.typed.lock().unwrap().clone()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.navigations.lock().unwrap().clone()
    }

    pub fn reload_count(&self) -> usize {
        self.reloads.load(Ordering::SeqCst)
    }

    pub fn quit_count(&self) -> usize {
        self.quits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UiDriver for FakeUi {
    async fn navigate(&self, url: &str) -> Result<(), UiError> {
        self.navigations.lock().unwrap().push(url.to_string());
        Ok(())
    }

    async fn reload(&self) -> Result<(), UiError> {
        self.reloads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn locate(&self, selector: &Selector) -> Result<Option<Element>, UiError> {
        let key = selector.to_string();
        Ok(self
            .elements
            .lock()
            .unwrap()
            .contains_key(&key)
            .then_some(Element(key)))
    }

    async fn wait_visible(&self, selector: &Selector) -> Result<Element, UiError> {
        self.locate(selector).await?.ok_or(UiError::WaitTimeout {
            selector: selector.to_string(),
            waited: Duration::ZERO,
        })
    }

    async fn click(&self, element: &Element) -> Result<(), UiError> {
        {
            let mut intercepts = self.intercepts.lock().unwrap();
            if let Some(remaining) = intercepts.get_mut(&element.0) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(UiError::ClickIntercepted(element.0.clone()));
                }
            }
        }
        self.clicks.lock().unwrap().push(element.0.clone());
        Ok(())
    }

    async fn text(&self, element: &Element) -> Result<String, UiError> {
        self.elements
            .lock()
            .unwrap()
            .get(&element.0)
            .cloned()
            .ok_or_else(|| UiError::Driver(format!("stale element: {}", element.0)))
    }

    async fn type_into(&self, element: &Element, value: &str) -> Result<(), UiError> {
        self.typed
            .lock()
            .unwrap()
            .push((element.0.clone(), value.to_string()));
        Ok(())
    }

    async fn cookies(&self) -> Result<Vec<BrowserCookie>, UiError> {
        let mut batches = self.cookie_batches.lock().unwrap();
        Ok(match batches.len() {
            0 => Vec::new(),
            1 => batches.front().cloned().unwrap_or_default(),
            _ => batches.pop_front().unwrap_or_default(),
        })
    }

    async fn quit(&self) -> Result<(), UiError> {
        self.quits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Recording collaborators
// ---------------------------------------------------------------------------

/// In-memory scheduler that models the external store: one entry per
/// schedule name, observable from tests.
#[derive(Default)]
pub struct RecordingScheduler {
    store: Mutex<BTreeMap<String, serde_json::Map<String, serde_json::Value>>>,
    created: Mutex<Vec<(String, DateTime<FixedOffset>)>>,
    deleted: Mutex<Vec<String>>,
    purges: AtomicUsize,
}

impl RecordingScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-load pending entries, as if earlier discovery runs created them.
    pub fn preloaded(names: &[&str]) -> Self {
        let scheduler = Self::new();
        {
            let mut store = scheduler.store.lock().unwrap();
            for name in names {
                store.insert(name.to_string(), serde_json::Map::new());
            }
        }
        scheduler
    }

    pub fn pending(&self) -> usize {
        self.store.lock().unwrap().len()
    }

    pub fn created(&self) -> Vec<(String, DateTime<FixedOffset>)> {
        self.created.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn purge_count(&self) -> usize {
        self.purges.load(Ordering::SeqCst)
    }

    pub fn payload_of(&self, name: &str) -> Option<serde_json::Map<String, serde_json::Value>> {
        self.store.lock().unwrap().get(name).cloned()
    }
}

#[async_trait]
impl Scheduler for RecordingScheduler {
    async fn create(
        &self,
        name: &str,
        fire_time: DateTime<FixedOffset>,
        payload: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<()> {
        self.store
            .lock()
            .unwrap()
            .insert(name.to_string(), payload.clone());
        self.created
            .lock()
            .unwrap()
            .push((name.to_string(), fire_time));
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<()> {
        self.store.lock().unwrap().remove(name);
        self.deleted.lock().unwrap().push(name.to_string());
        Ok(())
    }

    async fn delete_all(&self) -> Result<()> {
        self.store.lock().unwrap().clear();
        self.purges.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Thread-safe notification collector for per-run assertions.
#[derive(Default)]
pub struct RecordingNotifier {
    notifications: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.notifications.lock().unwrap().len()
    }

    pub fn all(&self) -> Vec<Notification> {
        self.notifications.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<Notification> {
        self.notifications.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        self.notifications
            .lock()
            .unwrap()
            .push(notification.clone());
        Ok(())
    }
}
