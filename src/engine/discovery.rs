//! Market discovery pipeline.
//!
//! Walks the bookmaker catalogue — categories → leagues → fixtures — for
//! "tomorrow" in the site-local timezone and normalizes the result into a
//! time-sorted fixture list. Performs no selection; per-item upstream
//! inconsistencies are logged and skipped so one broken league never sinks
//! a run.

use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, TimeZone, Timelike, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::selection::MarketSource;
use crate::config::AppConfig;
use crate::session::Session;
use crate::types::{BotError, Category, Fixture, League, MarketQuote, Outcome};

// ---------------------------------------------------------------------------
// Wire types (upstream JSON → Rust)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct LeaguesResponse {
    #[serde(default)]
    tournaments: Vec<TournamentRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TournamentRecord {
    id: String,
    name: String,
    seo_name: String,
    category_id: String,
    /// The feed occasionally sends `null` instead of a list.
    #[serde(default)]
    features: Option<Vec<String>>,
    #[serde(default)]
    filters: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct FixturesResponse {
    #[serde(default)]
    fixtures: Vec<FixtureRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FixtureRecord {
    id: String,
    name: String,
    seo_name: String,
    /// Epoch milliseconds, UTC.
    start_datetime: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MarketRecord {
    market_type_id: String,
    market_type_name: String,
    #[serde(default)]
    outcomes: Vec<OutcomeRecord>,
}

#[derive(Debug, Deserialize)]
struct OutcomeRecord {
    id: String,
    odds: Decimal,
}

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

/// Keep only leagues that expose match betting and carry next-day fixtures.
fn eligible_league(record: TournamentRecord) -> Option<League> {
    let features = record.features.unwrap_or_default();
    let filters = record.filters.unwrap_or_default();
    if features.iter().any(|f| f == "MATCHES") && filters.iter().any(|f| f == "tomorrow") {
        Some(League {
            id: record.id,
            name: record.name,
            seo_name: record.seo_name,
            category_id: record.category_id,
        })
    } else {
        None
    }
}

/// Whether a fixture's local start time falls in tomorrow's betting window.
///
/// The upstream "tomorrow" feed is not exact — it leaks fixtures from
/// adjacent days, especially South American leagues — so the local calendar
/// date is re-checked here.
fn in_betting_window(
    start_local: &DateTime<FixedOffset>,
    tomorrow: NaiveDate,
    minimum_start_hour: u32,
) -> bool {
    start_local.hour() >= minimum_start_hour && start_local.date_naive() == tomorrow
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Catalogue walker bound to one authenticated session.
pub struct MarketDiscovery<'a> {
    session: &'a Session,
    config: &'a AppConfig,
}

impl<'a> MarketDiscovery<'a> {
    pub fn new(session: &'a Session, config: &'a AppConfig) -> Self {
        Self { session, config }
    }

    /// Discover tomorrow's fixtures across all eligible leagues, sorted by
    /// start time ascending. The sort is stable, so ties keep discovery
    /// order.
    pub async fn discover(&self) -> Result<Vec<Fixture>, BotError> {
        let categories: Vec<Category> = self
            .session
            .get_json(&self.config.website.categories_endpoint)
            .await?;
        let leagues = self.fetch_leagues().await?;
        info!(
            categories = categories.len(),
            leagues = leagues.len(),
            "Catalogue fetched"
        );

        let tz = self.config.website.site_tz();
        let tomorrow = (Utc::now().with_timezone(&tz) + Duration::days(1)).date_naive();

        let mut all_fixtures = Vec::new();
        for league in &leagues {
            let Some(category) = categories.iter().find(|c| c.id == league.category_id) else {
                warn!(
                    league = %league.name,
                    category_id = %league.category_id,
                    "League references unknown category, skipping"
                );
                continue;
            };
            let fixtures = self
                .fetch_league_fixtures(league, &category.seo_name, tomorrow)
                .await?;
            debug!(league = %league.name, count = fixtures.len(), "League fixtures kept");
            all_fixtures.extend(fixtures);
        }

        all_fixtures.sort_by_key(|f| f.start_time);
        info!(total = all_fixtures.len(), "Discovery complete");
        Ok(all_fixtures)
    }

    async fn fetch_leagues(&self) -> Result<Vec<League>, BotError> {
        let resp: LeaguesResponse = self
            .session
            .get_json(&self.config.website.leagues_endpoint)
            .await?;
        Ok(resp
            .tournaments
            .into_iter()
            .filter_map(eligible_league)
            .collect())
    }

    async fn fetch_league_fixtures(
        &self,
        league: &League,
        category_seo_name: &str,
        tomorrow: NaiveDate,
    ) -> Result<Vec<Fixture>, BotError> {
        let url = self.config.website.fixtures_url(&league.id);
        let resp: FixturesResponse = self.session.get_json(&url).await?;

        let tz = self.config.website.site_tz();
        let minimum_start_hour = self.config.selection.minimum_start_hour;

        let mut fixtures = Vec::new();
        for record in resp.fixtures {
            let Some(start_utc) = Utc.timestamp_millis_opt(record.start_datetime).single() else {
                warn!(fixture = %record.id, "Unrepresentable start timestamp, skipping");
                continue;
            };
            let start_local = start_utc.with_timezone(&tz);
            if !in_betting_window(&start_local, tomorrow, minimum_start_hour) {
                continue;
            }
            fixtures.push(Fixture {
                id: record.id,
                name: record.name,
                start_time: start_local,
                category_seo_name: category_seo_name.to_string(),
                league_seo_name: league.seo_name.clone(),
                match_seo_name: record.seo_name,
            });
        }
        Ok(fixtures)
    }
}

#[async_trait]
impl MarketSource for MarketDiscovery<'_> {
    async fn markets_for(&self, fixture: &Fixture) -> Result<Vec<MarketQuote>, BotError> {
        let url = self.config.website.markets_url(&fixture.id);
        let records: Vec<MarketRecord> = self.session.get_json(&url).await?;
        Ok(records
            .into_iter()
            .map(|r| MarketQuote {
                market_type_id: r.market_type_id,
                market_type_name: r.market_type_name,
                outcomes: r
                    .outcomes
                    .into_iter()
                    .map(|o| Outcome {
                        id: o.id,
                        odds: o.odds,
                    })
                    .collect(),
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
