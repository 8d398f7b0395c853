//! Session bridge.
//!
//! Converts a browser-authenticated session into a reusable plain-HTTP
//! session: copies the browser's cookies into a cookie jar, then proves the
//! pair works by probing the authenticated balance endpoint. Cookies can
//! materialize asynchronously after the login UI settles, so every bind
//! attempt re-reads them from the browser instead of merely retrying the
//! probe.

use anyhow::{Context, Result};
use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, ORIGIN, REFERER, USER_AGENT};
use reqwest::{Client, Response, Url};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::browser::{BrowserCookie, UiDriver};
use crate::config::AppConfig;
use crate::external::secrets::ProxyCredentials;
use crate::types::BotError;

/// Balance-endpoint status value proving the cookies carry a login.
const LOGGED_IN: &str = "LOGGED_IN";

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct BalancePayload {
    #[serde(default)]
    status: String,
    #[serde(rename = "userInfo", default)]
    user_info: Option<UserInfo>,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    account: Account,
}

#[derive(Debug, Deserialize)]
struct Account {
    balance: Decimal,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// An authenticated HTTP session against the bookmaker API.
#[derive(Debug)]
pub struct Session {
    http: Client,
    config: AppConfig,
}

impl Session {
    /// Bind the browser's authentication into an HTTP session.
    ///
    /// Each attempt re-reads cookies from the browser, rebuilds the client,
    /// and probes the balance endpoint; only HTTP 200 with status
    /// `LOGGED_IN` is accepted. Exhausting the attempts is fatal to the run
    /// and surfaces as [`BotError::Authentication`].
    pub async fn bind(
        driver: &dyn UiDriver,
        config: &AppConfig,
        proxy: Option<&ProxyCredentials>,
    ) -> Result<Self> {
        let attempts = config.session.bind_attempts;
        let delay = Duration::from_millis(config.session.bind_retry_delay_ms);

        for attempt in 1..=attempts {
            match Self::try_bind(driver, config, proxy).await {
                Ok(Some(session)) => {
                    info!(attempt, "HTTP session bound and validated");
                    return Ok(session);
                }
                Ok(None) => {
                    debug!(attempt, "Session validation not yet accepted");
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Session bind attempt failed");
                }
            }
            if attempt < attempts {
                tokio::time::sleep(delay).await;
            }
        }

        Err(BotError::Authentication(format!(
            "session validation failed after {attempts} attempts"
        ))
        .into())
    }

    /// One bind attempt: read cookies, assemble a client, probe.
    /// `Ok(None)` means "not accepted yet, retry".
    async fn try_bind(
        driver: &dyn UiDriver,
        config: &AppConfig,
        proxy: Option<&ProxyCredentials>,
    ) -> Result<Option<Self>> {
        let cookies = driver
            .cookies()
            .await
            .map_err(|e| anyhow::anyhow!("failed to read browser cookies: {e}"))?;

        let missing: Vec<&String> = config
            .session
            .mandatory_cookies
            .iter()
            .filter(|name| !cookies.iter().any(|c| &&c.name == name))
            .collect();
        if !missing.is_empty() {
            debug!(?missing, "Mandatory cookies not present yet");
            return Ok(None);
        }

        let session = Self::assemble(&cookies, config, proxy)?;
        if session.validate().await? {
            Ok(Some(session))
        } else {
            Ok(None)
        }
    }

    /// Build the reqwest client: cookie jar seeded from the browser,
    /// browser-equivalent headers, optional authenticated proxy.
    fn assemble(
        cookies: &[BrowserCookie],
        config: &AppConfig,
        proxy: Option<&ProxyCredentials>,
    ) -> Result<Self> {
        let origin: Url = config
            .website
            .origin
            .parse()
            .context("website.origin is not a valid URL")?;

        let jar = Arc::new(Jar::default());
        for cookie in cookies {
            let cookie_str = match &cookie.domain {
                Some(domain) => {
                    format!("{}={}; Domain={}; Path=/", cookie.name, cookie.value, domain)
                }
                None => format!("{}={}; Path=/", cookie.name, cookie.value),
            };
            jar.add_cookie_str(&cookie_str, &origin);
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/plain, */*"));
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_str(&config.website.accept_language)
                .context("invalid accept_language header value")?,
        );
        headers.insert(
            ORIGIN,
            HeaderValue::from_str(&config.website.origin).context("invalid origin header value")?,
        );
        headers.insert(
            REFERER,
            HeaderValue::from_str(&config.website.start_url)
                .context("invalid referer header value")?,
        );
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.website.user_agent)
                .context("invalid user_agent header value")?,
        );

        let mut builder = Client::builder()
            .timeout(Duration::from_secs(config.session.request_timeout_secs))
            .default_headers(headers)
            .cookie_provider(jar);
        if let Some(proxy) = proxy {
            builder = builder.proxy(
                reqwest::Proxy::all(proxy.url()).context("invalid proxy configuration")?,
            );
        }

        Ok(Self {
            http: builder.build().context("Failed to build session HTTP client")?,
            config: config.clone(),
        })
    }

    /// Probe the authenticated balance endpoint.
    async fn validate(&self) -> Result<bool> {
        let resp = self
            .http
            .get(&self.config.website.balance_endpoint)
            .send()
            .await
            .context("balance probe failed")?;

        if resp.status() != reqwest::StatusCode::OK {
            debug!(status = %resp.status(), "Balance probe not OK");
            return Ok(false);
        }

        let payload: BalancePayload = resp.json().await.context("balance probe unparseable")?;
        Ok(payload.status == LOGGED_IN)
    }

    // -- Requests ----------------------------------------------------------

    /// Issue a request through the authenticated session.
    ///
    /// Only GET and POST are part of the contract; anything else is a
    /// programming error. All transport faults — including non-2xx
    /// statuses — are wrapped into [`BotError::SessionRequest`].
    pub async fn request(&self, method: &str, url: &str) -> Result<Response, BotError> {
        let verb = match method.to_ascii_uppercase().as_str() {
            "GET" => reqwest::Method::GET,
            "POST" => reqwest::Method::POST,
            other => return Err(BotError::InvalidMethod(other.to_string())),
        };

        let wrap = |source: reqwest::Error| BotError::SessionRequest {
            method: method.to_ascii_uppercase(),
            url: url.to_string(),
            source,
        };

        let resp = self
            .http
            .request(verb, url)
            .send()
            .await
            .map_err(&wrap)?
            .error_for_status()
            .map_err(&wrap)?;
        Ok(resp)
    }

    /// GET a JSON document through the session.
    pub async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, BotError> {
        let resp = self.request("GET", url).await?;
        resp.json().await.map_err(|source| BotError::SessionRequest {
            method: "GET".to_string(),
            url: url.to_string(),
            source,
        })
    }

    /// Available account balance.
    pub async fn balance(&self) -> Result<Decimal> {
        let payload: BalancePayload = self
            .get_json(&self.config.website.balance_endpoint)
            .await?;
        let balance = payload
            .user_info
            .context("balance payload missing userInfo")?
            .account
            .balance;
        Ok(balance)
    }
}
