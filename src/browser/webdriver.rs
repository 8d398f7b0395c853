//! WebDriver-backed implementation of the `UiDriver` capability trait.
//!
//! Talks the W3C WebDriver wire protocol (JSON over REST) to a chromedriver
//! endpoint. Only the handful of commands the agent needs are modeled.
//!
//! Protocol reference: https://www.w3.org/TR/webdriver/

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::{BrowserCookie, Element, Selector, UiDriver, UiError};
use crate::config::DriverConfig;
use crate::external::secrets::ProxyCredentials;

/// W3C element identifier key in wire payloads.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Script used to set an input's value so the page's reactive form state
/// observes it; simulated keystrokes do not reliably trigger it.
const SET_VALUE_SCRIPT: &str = "\
arguments[0].value = arguments[1];\n\
arguments[0].dispatchEvent(new Event('input', { bubbles: true }));\n\
arguments[0].dispatchEvent(new Event('change', { bubbles: true }));";

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// A browser session on a remote WebDriver endpoint.
pub struct WebDriverUi {
    http: Client,
    base: String,
    session_id: String,
    wait_timeout: Duration,
    poll_interval: Duration,
    closed: AtomicBool,
}

impl WebDriverUi {
    /// Open a new browser session against the configured WebDriver endpoint.
    ///
    /// Proxy host/port (when present) are applied to the browser's own
    /// traffic; proxy credentials are only usable on the plain HTTP session.
    pub async fn connect(config: &DriverConfig, proxy: Option<&ProxyCredentials>) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("Failed to build HTTP client for WebDriver")?;

        let mut chrome_args = vec![
            "--no-sandbox".to_string(),
            "--disable-dev-shm-usage".to_string(),
            "--disable-gpu".to_string(),
            "--disable-extensions".to_string(),
        ];
        if config.headless {
            chrome_args.push("--headless=new".to_string());
        }

        let mut always_match = json!({
            "browserName": "chrome",
            "goog:chromeOptions": { "args": chrome_args },
        });
        if let Some(proxy) = proxy {
            let address = format!("{}:{}", proxy.host, proxy.port);
            always_match["proxy"] = json!({
                "proxyType": "manual",
                "httpProxy": address,
                "sslProxy": address,
            });
        }

        let base = config.webdriver_url.trim_end_matches('/').to_string();
        let resp = http
            .post(format!("{base}/session"))
            .json(&json!({ "capabilities": { "alwaysMatch": always_match } }))
            .send()
            .await
            .context("WebDriver session request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("WebDriver session creation failed {status}: {body}");
        }

        let payload: Value = resp
            .json()
            .await
            .context("Failed to parse WebDriver session response")?;
        let session_id = payload["value"]["sessionId"]
            .as_str()
            .context("WebDriver session response missing sessionId")?
            .to_string();

        info!(session_id = %session_id, "WebDriver session created");

        Ok(Self {
            http,
            base,
            session_id,
            wait_timeout: Duration::from_secs(config.wait_timeout_secs),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            closed: AtomicBool::new(false),
        })
    }

    // -- Wire helpers ------------------------------------------------------

    /// Issue one WebDriver command and unwrap its `value` envelope.
    async fn command(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, UiError> {
        let url = format!("{}/session/{}{}", self.base, self.session_id, path);
        debug!(%url, "WebDriver command");

        let mut request = self.http.request(method.clone(), &url);
        if method == Method::POST {
            // chromedriver rejects POSTs without a JSON body.
            request = request.json(&body.unwrap_or_else(|| json!({})));
        }

        let resp = request
            .send()
            .await
            .map_err(|e| UiError::Driver(format!("transport failure on {path}: {e}")))?;

        let status = resp.status();
        let payload: Value = resp
            .json()
            .await
            .map_err(|e| UiError::Driver(format!("malformed response on {path}: {e}")))?;

        if status.is_success() {
            return Ok(payload["value"].clone());
        }

        let code = payload["value"]["error"].as_str().unwrap_or("unknown error");
        let message = payload["value"]["message"]
            .as_str()
            .unwrap_or("")
            .lines()
            .next()
            .unwrap_or("")
            .to_string();

        Err(match code {
            "element click intercepted" => UiError::ClickIntercepted(message),
            _ => UiError::Driver(format!("{code} ({status}): {message}")),
        })
    }

    fn locator_strategy(selector: &Selector) -> (&'static str, String) {
        match selector {
            Selector::Css(css) => ("css selector", css.clone()),
            Selector::XPath(xpath) => ("xpath", xpath.clone()),
            Selector::Id(id) => ("css selector", format!("#{id}")),
        }
    }

    fn element_ref(element: &Element) -> Value {
        json!({ ELEMENT_KEY: element.0 })
    }

    async fn displayed(&self, element: &Element) -> Result<bool, UiError> {
        let value = self
            .command(
                Method::GET,
                &format!("/element/{}/displayed", element.0),
                None,
            )
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }
}

#[async_trait]
impl UiDriver for WebDriverUi {
    async fn navigate(&self, url: &str) -> Result<(), UiError> {
        self.command(Method::POST, "/url", Some(json!({ "url": url })))
            .await
            .map(|_| ())
    }

    async fn reload(&self) -> Result<(), UiError> {
        self.command(Method::POST, "/refresh", None).await.map(|_| ())
    }

    async fn locate(&self, selector: &Selector) -> Result<Option<Element>, UiError> {
        let (using, value) = Self::locator_strategy(selector);
        let result = self
            .command(
                Method::POST,
                "/element",
                Some(json!({ "using": using, "value": value })),
            )
            .await;

        match result {
            Ok(payload) => {
                let id = payload[ELEMENT_KEY]
                    .as_str()
                    .ok_or_else(|| {
                        UiError::Driver(format!("element response missing id for {selector}"))
                    })?
                    .to_string();
                Ok(Some(Element(id)))
            }
            Err(UiError::Driver(message)) if message.starts_with("no such element") => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn wait_visible(&self, selector: &Selector) -> Result<Element, UiError> {
        let started = Instant::now();
        loop {
            if let Some(element) = self.locate(selector).await? {
                // A stale handle between locate and the displayed check just
                // means the page moved; keep polling.
                if self.displayed(&element).await.unwrap_or(false) {
                    return Ok(element);
                }
            }
            if started.elapsed() >= self.wait_timeout {
                return Err(UiError::WaitTimeout {
                    selector: selector.to_string(),
                    waited: started.elapsed(),
                });
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn click(&self, element: &Element) -> Result<(), UiError> {
        self.command(Method::POST, &format!("/element/{}/click", element.0), None)
            .await
            .map(|_| ())
    }

    async fn text(&self, element: &Element) -> Result<String, UiError> {
        let value = self
            .command(Method::GET, &format!("/element/{}/text", element.0), None)
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn type_into(&self, element: &Element, value: &str) -> Result<(), UiError> {
        self.command(
            Method::POST,
            "/execute/sync",
            Some(json!({
                "script": SET_VALUE_SCRIPT,
                "args": [Self::element_ref(element), value],
            })),
        )
        .await
        .map(|_| ())
    }

    async fn cookies(&self) -> Result<Vec<BrowserCookie>, UiError> {
        let value = self.command(Method::GET, "/cookie", None).await?;
        let raw = value.as_array().cloned().unwrap_or_default();
        Ok(raw
            .iter()
            .filter_map(|c| {
                Some(BrowserCookie {
                    name: c["name"].as_str()?.to_string(),
                    value: c["value"].as_str()?.to_string(),
                    domain: c["domain"].as_str().map(String::from),
                })
            })
            .collect())
    }

    async fn quit(&self) -> Result<(), UiError> {
        // Idempotent: a second quit (or quit after a dead session) is a no-op.
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let url = format!("{}/session/{}", self.base, self.session_id);
        let resp = self
            .http
            .request(Method::DELETE, &url)
            .send()
            .await
            .map_err(|e| UiError::Driver(format!("quit transport failure: {e}")))?;
        if !resp.status().is_success() {
            return Err(UiError::Driver(format!("quit failed: {}", resp.status())));
        }
        info!(session_id = %self.session_id, "WebDriver session closed");
        Ok(())
    }
}
