//! Shared types for the BETPILOT agent.
//!
//! These types form the data model used across all modules.
//! They are designed to be stable so that session, discovery,
//! placement, and orchestration modules can depend on them
//! without circular references.

use chrono::{DateTime, Duration, FixedOffset};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Upstream catalogue
// ---------------------------------------------------------------------------

/// A top-level sport category as reported by the bookmaker feed.
/// Fetched fresh on every discovery run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    #[serde(rename = "seoName")]
    pub seo_name: String,
}

/// A league carrying next-day fixtures.
///
/// Only leagues whose feature set contains `MATCHES` and whose filter set
/// contains `tomorrow` survive discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct League {
    pub id: String,
    pub name: String,
    pub seo_name: String,
    pub category_id: String,
}

/// A single scheduled sporting match, normalized to the site-local clock.
///
/// Created during discovery, discarded after selection — never persisted
/// beyond the current run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fixture {
    pub id: String,
    pub name: String,
    pub start_time: DateTime<FixedOffset>,
    pub category_seo_name: String,
    pub league_seo_name: String,
    pub match_seo_name: String,
}

impl fmt::Display for Fixture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}", self.name, self.start_time.format("%Y-%m-%d %H:%M"))
    }
}

/// One wagerable option within a market, with its decimal odd.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub id: String,
    pub odds: Decimal,
}

/// A named betting market on a fixture, e.g. the match result.
///
/// One fixture may expose many markets; only the configured target
/// market type is relevant for selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketQuote {
    pub market_type_id: String,
    pub market_type_name: String,
    pub outcomes: Vec<Outcome>,
}

// ---------------------------------------------------------------------------
// Selection output
// ---------------------------------------------------------------------------

/// A fixture paired with the outcome chosen for wagering.
///
/// Invariant: `odd_value` was at or below the configured odds ceiling at
/// selection time. The ceiling is re-validated against the live page
/// immediately before money is committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateMatch {
    pub fixture: Fixture,
    pub market_type_id: String,
    pub market_type_name: String,
    pub bet_option_id: String,
    pub odd_value: Decimal,
}

impl fmt::Display for CandidateMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | {} option {} @ {}",
            self.fixture, self.market_type_name, self.bet_option_id, self.odd_value,
        )
    }
}

// ---------------------------------------------------------------------------
// Scheduled bet
// ---------------------------------------------------------------------------

/// A candidate match bound to an external schedule entry.
///
/// Created by the discovery run, consumed exclusively by the placement run
/// at fire time. The candidate itself no longer exists at that point — only
/// the serialized payload survives via the external scheduler.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledBet {
    pub candidate: CandidateMatch,
    pub match_url: String,
    pub schedule_name: String,
    pub fire_time: DateTime<FixedOffset>,
}

impl ScheduledBet {
    /// Derive the schedule entry for a selected match.
    ///
    /// `match_base_url` is a template with `{category}`, `{league}` and
    /// `{match}` placeholders; segments are URL-encoded. The placement run
    /// fires `lead` ahead of kick-off.
    pub fn from_candidate(candidate: CandidateMatch, match_base_url: &str, lead: Duration) -> Self {
        let match_url = match_base_url
            .replace(
                "{category}",
                &urlencoding::encode(&candidate.fixture.category_seo_name),
            )
            .replace(
                "{league}",
                &urlencoding::encode(&candidate.fixture.league_seo_name),
            )
            .replace(
                "{match}",
                &urlencoding::encode(&candidate.fixture.match_seo_name),
            );

        let schedule_name = schedule_name_for(&candidate.fixture.id);
        let fire_time = candidate.fixture.start_time - lead;

        Self {
            candidate,
            match_url,
            schedule_name,
            fire_time,
        }
    }

    /// The flat string/number mapping handed to the external scheduler.
    ///
    /// The orchestration layer is the only writer and reader of this shape;
    /// it round-trips through [`InvocationPayload`].
    pub fn payload(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut map = serde_json::Map::new();
        map.insert("match_url".into(), self.match_url.clone().into());
        map.insert(
            "market_type_id".into(),
            self.candidate.market_type_id.clone().into(),
        );
        map.insert(
            "market_type_name".into(),
            self.candidate.market_type_name.clone().into(),
        );
        map.insert(
            "bet_option_id".into(),
            self.candidate.bet_option_id.clone().into(),
        );
        map.insert("match_name".into(), self.candidate.fixture.name.clone().into());
        map.insert(
            "start_time".into(),
            self.candidate.fixture.start_time.to_rfc3339().into(),
        );
        map.insert(
            "odd_value".into(),
            serde_json::to_value(self.candidate.odd_value)
                .unwrap_or(serde_json::Value::Null),
        );
        // Back-reference so the fired run can delete its own schedule entry.
        map.insert("schedule_name".into(), self.schedule_name.clone().into());
        map
    }
}

/// Schedule names must be unique per fixture and safe for the scheduler
/// service; upstream fixture ids may contain `:`.
pub fn schedule_name_for(fixture_id: &str) -> String {
    format!("match-schedule-{fixture_id}").replace(':', "-")
}

// ---------------------------------------------------------------------------
// Invocation contract
// ---------------------------------------------------------------------------

/// The inbound invocation document.
///
/// A payload without `schedule_name` is a discovery-trigger invocation;
/// one with it carries a full placement job. That presence check is the
/// distinguishing contract — there is no separate trigger flag.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvocationPayload {
    #[serde(default)]
    pub schedule_name: Option<String>,
    #[serde(default)]
    pub match_url: Option<String>,
    #[serde(default)]
    pub market_type_id: Option<String>,
    #[serde(default)]
    pub market_type_name: Option<String>,
    #[serde(default)]
    pub bet_option_id: Option<String>,
    #[serde(default)]
    pub match_name: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub odd_value: Option<Decimal>,
}

impl InvocationPayload {
    /// Resolve the payload into a trigger, validating the placement fields
    /// when a schedule name is present.
    pub fn into_trigger(self) -> anyhow::Result<Trigger> {
        let Some(schedule_name) = self.schedule_name else {
            return Ok(Trigger::Discovery);
        };

        let require = |field: Option<String>, name: &str| {
            field.ok_or_else(|| {
                anyhow::anyhow!("placement payload {schedule_name} missing field {name}")
            })
        };

        Ok(Trigger::Placement(PlacementJob {
            match_url: require(self.match_url, "match_url")?,
            market_type_id: require(self.market_type_id, "market_type_id")?,
            market_type_name: require(self.market_type_name, "market_type_name")?,
            bet_option_id: require(self.bet_option_id, "bet_option_id")?,
            match_name: require(self.match_name, "match_name")?,
            start_time: require(self.start_time, "start_time")?,
            odd_value: self.odd_value.ok_or_else(|| {
                anyhow::anyhow!("placement payload {schedule_name} missing field odd_value")
            })?,
            schedule_name,
        }))
    }
}

/// The two mutually exclusive entry points of a run.
#[derive(Debug, Clone, PartialEq)]
pub enum Trigger {
    Discovery,
    Placement(PlacementJob),
}

/// Everything the placement run needs, reconstructed from the fired
/// schedule's payload.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacementJob {
    pub match_url: String,
    pub market_type_id: String,
    pub market_type_name: String,
    pub bet_option_id: String,
    pub match_name: String,
    pub start_time: String,
    pub odd_value: Decimal,
    pub schedule_name: String,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error taxonomy for BETPILOT.
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    /// Fatal to the run: no partial operation continues without a valid
    /// session.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Wraps any transport-level fault of the HTTP session; no raw
    /// transport errors escape the session layer.
    #[error("session request failed: {method} {url}")]
    SessionRequest {
        method: String,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Programming-contract violation: the session only speaks GET/POST.
    #[error("invalid HTTP method for session request: {0}")]
    InvalidMethod(String),

    /// Expected business outcome: the live odd drifted past the ceiling
    /// between scheduling and placement. Carries both values so the
    /// notification can show the drift.
    #[error("odds changed: scheduled {scheduled}, live {live}")]
    OddsChanged { scheduled: Decimal, live: Decimal },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
