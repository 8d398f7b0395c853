//! Configuration loading from TOML.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! The result is a single immutable value loaded once in `main` and passed
//! explicitly into each component. Secrets are never stored here — they are
//! resolved from the environment by the secrets provider.

use anyhow::{Context, Result};
use chrono::FixedOffset;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fs;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub agent: AgentConfig,
    pub website: WebsiteConfig,
    pub selection: SelectionConfig,
    pub session: SessionConfig,
    pub driver: DriverConfig,
    pub scheduler: SchedulerConfig,
    pub notifications: NotificationsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AgentConfig {
    pub name: String,
    /// Secret bundle id; `EnvSecrets` derives the env-var prefix from it.
    pub secret_id: String,
    /// Balance floor: below this, the run is skipped and every pending
    /// schedule is purged.
    pub minimum_balance: Decimal,
    #[serde(default = "default_diagnostics_dir")]
    pub diagnostics_dir: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WebsiteConfig {
    pub start_url: String,
    pub origin: String,
    pub balance_endpoint: String,
    pub categories_endpoint: String,
    pub leagues_endpoint: String,
    /// Template with a `{league_id}` placeholder.
    pub fixtures_endpoint: String,
    /// Template with a `{fixture_id}` placeholder.
    pub markets_endpoint: String,
    /// Template with `{category}`, `{league}` and `{match}` placeholders.
    pub match_base_url: String,
    pub user_agent: String,
    pub accept_language: String,
    /// Site-local clock as a fixed UTC offset, in hours.
    pub utc_offset_hours: i32,
}

impl WebsiteConfig {
    /// The site-local timezone. The offset is validated in
    /// [`AppConfig::load`].
    pub fn site_tz(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_hours * 3600)
            .expect("utc_offset_hours validated at config load")
    }

    pub fn fixtures_url(&self, league_id: &str) -> String {
        self.fixtures_endpoint.replace("{league_id}", league_id)
    }

    pub fn markets_url(&self, fixture_id: &str) -> String {
        self.markets_endpoint.replace("{fixture_id}", fixture_id)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SelectionConfig {
    /// Exact market-type name to wager on.
    pub target_market_name: String,
    /// Odds ceiling: outcomes above this are never selected, and the live
    /// odd is re-checked against it right before placement.
    pub maximum_bet_odd: Decimal,
    pub minimum_hours_between_matches: f64,
    pub max_bets_per_day: usize,
    /// Fixtures starting before this site-local hour are dropped.
    pub minimum_start_hour: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    /// Cookies that must be present in the browser before the HTTP session
    /// is worth probing.
    pub mandatory_cookies: Vec<String>,
    #[serde(default = "default_bind_attempts")]
    pub bind_attempts: u32,
    #[serde(default = "default_bind_retry_delay_ms")]
    pub bind_retry_delay_ms: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DriverConfig {
    /// Address of the WebDriver endpoint (chromedriver).
    pub webdriver_url: String,
    #[serde(default = "default_headless")]
    pub headless: bool,
    #[serde(default = "default_wait_timeout_secs")]
    pub wait_timeout_secs: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Uniform settle delay applied after navigating to the match page.
    #[serde(default = "default_settle_delay_min_secs")]
    pub settle_delay_min_secs: u64,
    #[serde(default = "default_settle_delay_max_secs")]
    pub settle_delay_max_secs: u64,
    /// Upper bound of the random pause after each click.
    #[serde(default = "default_click_jitter_max_ms")]
    pub click_jitter_max_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SchedulerConfig {
    pub base_url: String,
    #[serde(default = "default_lead_minutes")]
    pub lead_minutes: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotificationsConfig {
    pub webhook_url: String,
    pub from_address: String,
    pub to_address: String,
}

fn default_diagnostics_dir() -> String {
    "/tmp".to_string()
}

fn default_bind_attempts() -> u32 {
    5
}

fn default_bind_retry_delay_ms() -> u64 {
    5000
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_headless() -> bool {
    true
}

fn default_wait_timeout_secs() -> u64 {
    10
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_settle_delay_min_secs() -> u64 {
    15
}

fn default_settle_delay_max_secs() -> u64 {
    30
}

fn default_click_jitter_max_ms() -> u64 {
    1000
}

fn default_lead_minutes() -> i64 {
    15
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if FixedOffset::east_opt(self.website.utc_offset_hours * 3600).is_none() {
            anyhow::bail!(
                "website.utc_offset_hours out of range: {}",
                self.website.utc_offset_hours
            );
        }
        if self.driver.settle_delay_max_secs < self.driver.settle_delay_min_secs {
            anyhow::bail!("driver.settle_delay_max_secs below settle_delay_min_secs");
        }
        if self.selection.max_bets_per_day == 0 {
            anyhow::bail!("selection.max_bets_per_day must be at least 1");
        }
        Ok(())
    }
}
