//! Site login flow.
//!
//! Drives the bookmaker's login dialog through the `UiDriver` capability
//! trait. On success the browser holds an authenticated session whose
//! cookies the session bridge copies out.

use anyhow::{Context, Result};
use secrecy::ExposeSecret;
use tracing::{debug, info};

use super::{click_with_retry, selectors, UiDriver};
use crate::config::AppConfig;
use crate::external::secrets::Secrets;

/// Log in to the website with the configured credentials.
pub async fn login(driver: &dyn UiDriver, config: &AppConfig, secrets: &Secrets) -> Result<()> {
    info!(url = %config.website.start_url, "Logging in to the website");

    driver
        .navigate(&config.website.start_url)
        .await
        .context("failed to open start page")?;

    // The consent banner only shows on a fresh profile.
    if driver
        .locate(&selectors::cookies_accept_button())
        .await
        .context("failed to probe cookie banner")?
        .is_some()
    {
        debug!("Accepting cookie banner");
        click_with_retry(driver, &selectors::cookies_accept_button(), &config.driver)
            .await
            .context("failed to accept cookie banner")?;
    }

    click_with_retry(driver, &selectors::login_button(), &config.driver)
        .await
        .context("failed to open login dialog")?;

    let username_input = driver
        .wait_visible(&selectors::login_username_input())
        .await
        .context("login username input not visible")?;
    driver
        .type_into(&username_input, &secrets.site_username)
        .await
        .context("failed to enter username")?;

    let password_input = driver
        .wait_visible(&selectors::login_password_input())
        .await
        .context("login password input not visible")?;
    driver
        .type_into(&password_input, secrets.site_password.expose_secret())
        .await
        .context("failed to enter password")?;

    click_with_retry(driver, &selectors::login_confirm_button(), &config.driver)
        .await
        .context("failed to confirm login")?;

    info!("Login dialog submitted");
    Ok(())
}
