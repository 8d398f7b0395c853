//! Bet placement state machine.
//!
//! Drives the match page through
//! `Navigated → OddsChecked → ContainerExpanded → OptionSelected →
//! StakeEntered → Submitted`. The displayed odd is re-validated against the
//! ceiling before any money is committed; drift past it aborts with
//! [`BotError::OddsChanged`] so the caller can notify without a full error
//! escalation. Only the click sub-operation retries (once, via page
//! reload); every other failure propagates to the caller, which owns
//! cleanup.

use anyhow::{Context, Result};
use rand::Rng;
use rust_decimal::Decimal;
use std::time::Duration;
use tracing::{debug, info};

use crate::browser::{click_with_retry, selectors, UiDriver};
use crate::config::AppConfig;
use crate::types::{BotError, PlacementJob};

/// The placement sequence. `Submitted` is the sole terminal success state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementState {
    Navigated,
    OddsChecked,
    ContainerExpanded,
    OptionSelected,
    StakeEntered,
    Submitted,
}

pub struct BetPlacer<'a> {
    driver: &'a dyn UiDriver,
    job: &'a PlacementJob,
    stake: Decimal,
    config: &'a AppConfig,
    live_odd: Option<Decimal>,
}

impl<'a> BetPlacer<'a> {
    pub fn new(
        driver: &'a dyn UiDriver,
        job: &'a PlacementJob,
        stake: Decimal,
        config: &'a AppConfig,
    ) -> Self {
        Self {
            driver,
            job,
            stake,
            config,
            live_odd: None,
        }
    }

    /// Run the full placement sequence. Returns the live odd the bet was
    /// placed at.
    pub async fn run(&mut self) -> Result<Decimal> {
        self.navigate().await?;
        let mut state = PlacementState::Navigated;
        while state != PlacementState::Submitted {
            state = self.advance(state).await?;
            debug!(state = ?state, "Placement state reached");
        }
        info!(match_name = %self.job.match_name, stake = %self.stake, "Bet submitted");
        self.live_odd
            .context("placement finished without a recorded live odd")
    }

    async fn advance(&mut self, state: PlacementState) -> Result<PlacementState> {
        match state {
            PlacementState::Navigated => {
                self.check_odds().await?;
                Ok(PlacementState::OddsChecked)
            }
            PlacementState::OddsChecked => {
                self.expand_container().await?;
                Ok(PlacementState::ContainerExpanded)
            }
            PlacementState::ContainerExpanded => {
                self.select_option().await?;
                Ok(PlacementState::OptionSelected)
            }
            PlacementState::OptionSelected => {
                self.enter_stake().await?;
                Ok(PlacementState::StakeEntered)
            }
            PlacementState::StakeEntered => {
                self.submit().await?;
                Ok(PlacementState::Submitted)
            }
            PlacementState::Submitted => Ok(PlacementState::Submitted),
        }
    }

    // -- Transitions -------------------------------------------------------

    /// Load the match page, then idle for a human-paced interval while the
    /// page finishes loading dynamic content.
    async fn navigate(&self) -> Result<()> {
        self.driver
            .navigate(&self.job.match_url)
            .await
            .with_context(|| format!("failed to open match page {}", self.job.match_url))?;
        self.settle_delay().await;
        Ok(())
    }

    /// Read the displayed odd for the target outcome and re-validate it
    /// against the ceiling. The outcome button renders as `label\nodd`; a
    /// missing odd line parses as empty and fails loudly.
    async fn check_odds(&mut self) -> Result<()> {
        let option_selector = selectors::bet_option(&self.job.bet_option_id);
        let option = self
            .driver
            .wait_visible(&option_selector)
            .await
            .with_context(|| format!("bet option {} not visible", self.job.bet_option_id))?;
        let text = self
            .driver
            .text(&option)
            .await
            .context("failed to read bet option text")?;

        let raw = text.split('\n').nth(1).unwrap_or_default().trim().to_string();
        let live: Decimal = raw.parse().with_context(|| {
            format!(
                "unreadable displayed odd {:?} on option {}",
                raw, self.job.bet_option_id
            )
        })?;
        self.live_odd = Some(live);

        let ceiling = self.config.selection.maximum_bet_odd;
        if live > ceiling {
            return Err(BotError::OddsChanged {
                scheduled: self.job.odd_value,
                live,
            }
            .into());
        }
        debug!(%live, %ceiling, "Displayed odd within ceiling");
        Ok(())
    }

    /// Expand the market container if it renders collapsed. A collapsed
    /// card shows its title only — no embedded newline. Idempotent.
    async fn expand_container(&self) -> Result<()> {
        let container_selector = selectors::bet_container(&self.job.market_type_id);
        let container = self
            .driver
            .wait_visible(&container_selector)
            .await
            .with_context(|| format!("market container {} not visible", self.job.market_type_id))?;
        let text = self
            .driver
            .text(&container)
            .await
            .context("failed to read market container text")?;

        if !text.contains('\n') {
            info!("Expanding bet container");
            click_with_retry(self.driver, &container_selector, &self.config.driver)
                .await
                .context("failed to expand market container")?;
        } else {
            debug!("Bet container already expanded");
        }
        Ok(())
    }

    async fn select_option(&self) -> Result<()> {
        click_with_retry(
            self.driver,
            &selectors::bet_option(&self.job.bet_option_id),
            &self.config.driver,
        )
        .await
        .with_context(|| format!("failed to select bet option {}", self.job.bet_option_id))
    }

    /// Write the stake through script-driven value assignment so the page's
    /// reactive form state observes it.
    async fn enter_stake(&self) -> Result<()> {
        let input = self
            .driver
            .wait_visible(&selectors::stake_input())
            .await
            .context("stake input not visible")?;
        self.driver
            .type_into(&input, &self.stake.to_string())
            .await
            .context("failed to enter stake")
    }

    async fn submit(&self) -> Result<()> {
        click_with_retry(self.driver, &selectors::placement_button(), &self.config.driver)
            .await
            .context("failed to click placement button")
    }

    /// Uniform random pause after navigation. Pacing, not correctness.
    async fn settle_delay(&self) {
        let min = self.config.driver.settle_delay_min_secs;
        let max = self.config.driver.settle_delay_max_secs;
        if max == 0 {
            return;
        }
        let secs = if max > min {
            rand::thread_rng().gen_range(min..=max)
        } else {
            min
        };
        debug!(secs, "Settling after navigation");
        tokio::time::sleep(Duration::from_secs(secs)).await;
    }
}
