//! REST scheduler service client.
//!
//! Thin wrapper over the external scheduler's HTTP API. The service stores
//! one entry per schedule name and re-invokes the agent with the stored
//! payload at fire time.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

use super::Scheduler;
use crate::config::SchedulerConfig;

pub struct HttpScheduler {
    http: Client,
    base_url: String,
    token: Option<SecretString>,
}

impl HttpScheduler {
    pub fn new(config: &SchedulerConfig, token: Option<SecretString>) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client for scheduler")?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token.expose_secret()),
            None => builder,
        }
    }
}

#[async_trait]
impl Scheduler for HttpScheduler {
    async fn create(
        &self,
        name: &str,
        fire_time: DateTime<FixedOffset>,
        payload: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<()> {
        let body = json!({
            "name": name,
            "fire_at": fire_time.to_rfc3339(),
            "payload": payload,
        });
        let resp = self
            .request(self.http.post(format!("{}/schedules", self.base_url)))
            .json(&body)
            .send()
            .await
            .with_context(|| format!("schedule create request failed for {name}"))?;
        resp.error_for_status()
            .with_context(|| format!("schedule create rejected for {name}"))?;
        info!(schedule = name, fire_at = %fire_time, "Schedule created");
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let resp = self
            .request(
                self.http
                    .delete(format!("{}/schedules/{}", self.base_url, name)),
            )
            .send()
            .await
            .with_context(|| format!("schedule delete request failed for {name}"))?;
        // An already-gone entry is fine: the fired schedule may have removed
        // itself.
        if resp.status() != StatusCode::NOT_FOUND {
            resp.error_for_status()
                .with_context(|| format!("schedule delete rejected for {name}"))?;
        }
        debug!(schedule = name, "Schedule deleted");
        Ok(())
    }

    async fn delete_all(&self) -> Result<()> {
        let resp = self
            .request(self.http.delete(format!("{}/schedules", self.base_url)))
            .send()
            .await
            .context("schedule purge request failed")?;
        resp.error_for_status().context("schedule purge rejected")?;
        info!("All pending schedules purged");
        Ok(())
    }
}
