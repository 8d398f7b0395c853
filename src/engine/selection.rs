//! Match selection algorithm.
//!
//! A single left-to-right pass over the time-sorted fixture sequence that
//! accepts at most the configured daily cap of matches, spaced at least the
//! configured number of hours apart, each carrying an outcome at or below
//! the odds ceiling. Deterministic for identical inputs; rejected fixtures
//! are never revisited.

use async_trait::async_trait;
use tracing::{debug, info};

use crate::config::SelectionConfig;
use crate::types::{BotError, CandidateMatch, Fixture, MarketQuote, Outcome};

/// Lazy per-fixture market lookup.
///
/// Markets are only fetched for fixtures that survive the cap and spacing
/// gates, so upstream traffic stays proportional to accepted work.
#[async_trait]
pub trait MarketSource: Send + Sync {
    async fn markets_for(&self, fixture: &Fixture) -> Result<Vec<MarketQuote>, BotError>;
}

/// Select the matches to wager on from a time-sorted fixture sequence.
///
/// Output ordering equals acceptance order equals time order.
pub async fn select_matches(
    fixtures: &[Fixture],
    markets: &dyn MarketSource,
    config: &SelectionConfig,
) -> Result<Vec<CandidateMatch>, BotError> {
    let mut accepted: Vec<CandidateMatch> = Vec::new();

    for fixture in fixtures {
        if accepted.len() >= config.max_bets_per_day {
            break;
        }

        if let Some(last) = accepted.last() {
            let gap_hours =
                (fixture.start_time - last.fixture.start_time).num_seconds() as f64 / 3600.0;
            if gap_hours < config.minimum_hours_between_matches {
                debug!(fixture = %fixture, gap_hours, "Rejected: too close to last accepted match");
                continue;
            }
        }

        let quotes = markets.markets_for(fixture).await?;
        let Some(target) = quotes
            .iter()
            .find(|m| m.market_type_name == config.target_market_name)
        else {
            debug!(fixture = %fixture, "Target market not offered, skipping");
            continue;
        };

        // The scan overwrites on every qualifying outcome, so the last one
        // in feed order wins — long-standing behavior, kept as-is rather
        // than switching to a best-odds pick.
        let mut suitable: Option<&Outcome> = None;
        for outcome in &target.outcomes {
            if outcome.odds <= config.maximum_bet_odd {
                suitable = Some(outcome);
            }
        }

        let Some(outcome) = suitable else {
            debug!(
                fixture = %fixture,
                ceiling = %config.maximum_bet_odd,
                "No outcome under the odds ceiling, skipping"
            );
            continue;
        };

        info!(fixture = %fixture, odd = %outcome.odds, option = %outcome.id, "Match accepted");
        accepted.push(CandidateMatch {
            fixture: fixture.clone(),
            market_type_id: target.market_type_id.clone(),
            market_type_name: target.market_type_name.clone(),
            bet_option_id: outcome.id.clone(),
            odd_value: outcome.odds,
        });
    }

    Ok(accepted)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
