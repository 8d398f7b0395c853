//! Run orchestration.
//!
//! Binds the engine components into the two external triggers. A balance
//! floor check precedes both: once funds are insufficient, every pending
//! schedule is purged rather than silently retried later. Each successful
//! terminal state sends exactly one notification here; failure
//! notifications belong to the binary's cleanup path so no run ever sends
//! two.

use anyhow::Result;
use rust_decimal::Decimal;
use tracing::{info, warn};

use super::discovery::MarketDiscovery;
use super::placement::BetPlacer;
use super::selection::select_matches;
use crate::browser::UiDriver;
use crate::config::AppConfig;
use crate::external::notify::{
    body_changed_odd, body_matches_scheduled, body_no_balance, body_no_matches, body_placed_bet,
    SUBJECT_ERROR, SUBJECT_INFO,
};
use crate::external::{EventRow, Notification, Notifier, Scheduler};
use crate::session::Session;
use crate::types::{BotError, PlacementJob, ScheduledBet};

/// Terminal outcome of a run, for logging and exit reporting.
#[derive(Debug, Clone, PartialEq)]
pub enum RunReport {
    BalanceExhausted { balance: Decimal },
    MatchesScheduled { count: usize },
    BetPlaced { live_odd: Decimal },
    OddsChanged { scheduled: Decimal, live: Decimal },
}

enum Gate {
    Proceed(Decimal),
    Exhausted(Decimal),
}

pub struct Orchestrator<'a> {
    config: &'a AppConfig,
    session: &'a Session,
    scheduler: &'a dyn Scheduler,
    notifier: &'a dyn Notifier,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        config: &'a AppConfig,
        session: &'a Session,
        scheduler: &'a dyn Scheduler,
        notifier: &'a dyn Notifier,
    ) -> Self {
        Self {
            config,
            session,
            scheduler,
            notifier,
        }
    }

    /// Discovery trigger: discover → select → register one schedule per
    /// selected match.
    pub async fn run_discovery(&self) -> Result<RunReport> {
        let _balance = match self.balance_gate().await? {
            Gate::Proceed(balance) => balance,
            Gate::Exhausted(balance) => return Ok(RunReport::BalanceExhausted { balance }),
        };

        let discovery = MarketDiscovery::new(self.session, self.config);
        let fixtures = discovery.discover().await?;
        let matches = select_matches(&fixtures, &discovery, &self.config.selection).await?;

        if matches.is_empty() {
            info!("No suitable matches for tomorrow");
            self.notifier
                .notify(&Notification::new(SUBJECT_INFO, body_no_matches()))
                .await?;
            return Ok(RunReport::MatchesScheduled { count: 0 });
        }

        let lead = chrono::Duration::minutes(self.config.scheduler.lead_minutes);
        let mut events: Vec<EventRow> = Vec::new();
        for candidate in matches {
            let bet =
                ScheduledBet::from_candidate(candidate, &self.config.website.match_base_url, lead);
            self.scheduler
                .create(&bet.schedule_name, bet.fire_time, &bet.payload())
                .await?;
            info!(
                schedule = %bet.schedule_name,
                fire_at = %bet.fire_time,
                odd = %bet.candidate.odd_value,
                "Placement scheduled"
            );
            events.push(vec![
                ("name".to_string(), bet.candidate.fixture.name.clone()),
                ("bet_type".to_string(), bet.candidate.market_type_name.clone()),
                ("odd".to_string(), bet.candidate.odd_value.to_string()),
                (
                    "start_time".to_string(),
                    bet.candidate.fixture.start_time.to_rfc3339(),
                ),
                ("match_url".to_string(), bet.match_url.clone()),
            ]);
        }

        let count = events.len();
        self.notifier
            .notify(
                &Notification::new(SUBJECT_INFO, body_matches_scheduled(count))
                    .with_events(events),
            )
            .await?;
        Ok(RunReport::MatchesScheduled { count })
    }

    /// Placement trigger: re-validate and place the single match embedded
    /// in the fired payload. The whole available balance is staked.
    pub async fn run_placement(
        &self,
        driver: &dyn UiDriver,
        job: &PlacementJob,
    ) -> Result<RunReport> {
        let stake = match self.balance_gate().await? {
            Gate::Proceed(balance) => balance,
            Gate::Exhausted(balance) => return Ok(RunReport::BalanceExhausted { balance }),
        };

        info!(match_name = %job.match_name, %stake, "Placing bet");
        let mut placer = BetPlacer::new(driver, job, stake, self.config);
        match placer.run().await {
            Ok(live_odd) => {
                self.notifier
                    .notify(
                        &Notification::new(SUBJECT_INFO, body_placed_bet(&job.match_name))
                            .with_events(vec![vec![
                                ("name".to_string(), job.match_name.clone()),
                                ("bet_type".to_string(), job.market_type_name.clone()),
                                ("odd".to_string(), live_odd.to_string()),
                                ("start_time".to_string(), job.start_time.clone()),
                                ("match_url".to_string(), job.match_url.clone()),
                            ]]),
                    )
                    .await?;
                Ok(RunReport::BetPlaced { live_odd })
            }
            Err(error) => match error.downcast_ref::<BotError>() {
                Some(BotError::OddsChanged { scheduled, live }) => {
                    let (scheduled, live) = (*scheduled, *live);
                    warn!(%scheduled, %live, "Odds drifted past the ceiling, bet not placed");
                    self.notifier
                        .notify(&Notification::new(
                            SUBJECT_INFO,
                            body_changed_odd(
                                &job.match_name,
                                &job.market_type_name,
                                scheduled,
                                live,
                            ),
                        ))
                        .await?;
                    Ok(RunReport::OddsChanged { scheduled, live })
                }
                _ => Err(error),
            },
        }
    }

    /// Check the balance floor shared by both triggers. Below the floor the
    /// run is abandoned and every pending schedule purged; a purge failure
    /// is logged rather than escalated so the run still ends with exactly
    /// one notification.
    async fn balance_gate(&self) -> Result<Gate> {
        let balance = self.session.balance().await?;
        info!(%balance, "Available balance");

        if balance >= self.config.agent.minimum_balance {
            return Ok(Gate::Proceed(balance));
        }

        warn!(
            %balance,
            floor = %self.config.agent.minimum_balance,
            "Balance below floor: abandoning run and purging all schedules"
        );
        if let Err(e) = self.scheduler.delete_all().await {
            warn!(error = %e, "Failed to purge schedules after balance exhaustion");
        }
        self.notifier
            .notify(&Notification::new(SUBJECT_ERROR, body_no_balance(balance)))
            .await?;
        Ok(Gate::Exhausted(balance))
    }
}
