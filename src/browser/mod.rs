//! Browser interaction layer.
//!
//! Defines the `UiDriver` capability trait the placement state machine and
//! login flow are written against, with one implementation backed by a real
//! WebDriver endpoint and (in tests) an in-memory fake. Keeping the trait
//! surface small decouples transition policy from UI mechanics.

pub mod login;
pub mod selectors;
pub mod webdriver;

use async_trait::async_trait;
use rand::Rng;
use std::fmt;
use std::time::Duration;
use tracing::warn;

use crate::config::DriverConfig;

// ---------------------------------------------------------------------------
// Locators
// ---------------------------------------------------------------------------

/// An element locator on the target page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    Css(String),
    XPath(String),
    Id(String),
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Css(s) => write!(f, "css:{s}"),
            Selector::XPath(s) => write!(f, "xpath:{s}"),
            Selector::Id(s) => write!(f, "id:{s}"),
        }
    }
}

/// Opaque handle to a located element, valid until the page reloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element(pub String);

/// A cookie read back from the authenticated browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserCookie {
    pub name: String,
    pub value: String,
    pub domain: Option<String>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum UiError {
    /// A click landed on an element obscured by another; recoverable once
    /// via page reload.
    #[error("click intercepted on {0}")]
    ClickIntercepted(String),

    /// A mandatory element never became visible within the bounded wait.
    #[error("element {selector} not visible after {waited:?}")]
    WaitTimeout { selector: String, waited: Duration },

    /// Anything the WebDriver endpoint reports that we don't model.
    #[error("webdriver error: {0}")]
    Driver(String),
}

// ---------------------------------------------------------------------------
// Capability trait
// ---------------------------------------------------------------------------

/// Abstraction over browser UI mechanics.
///
/// Implementors provide navigation, element location and interaction.
/// `type_into` must make the value observable by the page's own reactive
/// state management, not merely present in the DOM.
#[async_trait]
pub trait UiDriver: Send + Sync {
    /// Load a URL in the browser.
    async fn navigate(&self, url: &str) -> Result<(), UiError>;

    /// Reload the current page.
    async fn reload(&self) -> Result<(), UiError>;

    /// Find an element. `None` means not present — a soft outcome, not an
    /// error.
    async fn locate(&self, selector: &Selector) -> Result<Option<Element>, UiError>;

    /// Wait until an element is present and displayed, up to the configured
    /// timeout. Timing out is a hard failure.
    async fn wait_visible(&self, selector: &Selector) -> Result<Element, UiError>;

    /// Click an element. Interception surfaces as
    /// [`UiError::ClickIntercepted`].
    async fn click(&self, element: &Element) -> Result<(), UiError>;

    /// Read the rendered text of an element.
    async fn text(&self, element: &Element) -> Result<String, UiError>;

    /// Set an input's value and notify the page (input/change events).
    async fn type_into(&self, element: &Element, value: &str) -> Result<(), UiError>;

    /// Cookies of the authenticated browser session.
    async fn cookies(&self) -> Result<Vec<BrowserCookie>, UiError>;

    /// Tear down the browser session. Must be idempotent; callers invoke it
    /// best-effort from cleanup paths.
    async fn quit(&self) -> Result<(), UiError>;
}

// ---------------------------------------------------------------------------
// Click retry contract
// ---------------------------------------------------------------------------

/// Wait for `selector`, click it, and pause briefly.
///
/// On an intercepted click the page is reloaded and the click retried
/// exactly once — a bounded loop, never open recursion, so a persistently
/// blocked element fails instead of reloading forever.
pub async fn click_with_retry(
    driver: &dyn UiDriver,
    selector: &Selector,
    config: &DriverConfig,
) -> Result<(), UiError> {
    match try_click(driver, selector, config).await {
        Err(UiError::ClickIntercepted(_)) => {
            warn!(selector = %selector, "click intercepted, reloading page and retrying once");
            driver.reload().await?;
            try_click(driver, selector, config).await
        }
        other => other,
    }
}

async fn try_click(
    driver: &dyn UiDriver,
    selector: &Selector,
    config: &DriverConfig,
) -> Result<(), UiError> {
    let element = driver.wait_visible(selector).await?;
    driver.click(&element).await?;
    click_jitter(config).await;
    Ok(())
}

/// Short random pause after a click to avoid machine-gun interaction
/// patterns. Not a correctness wait.
async fn click_jitter(config: &DriverConfig) {
    if config.click_jitter_max_ms == 0 {
        return;
    }
    let pause = rand::thread_rng().gen_range(0..=config.click_jitter_max_ms);
    tokio::time::sleep(Duration::from_millis(pause)).await;
}
