//! Mail-gateway notification client.
//!
//! Posts the notification as JSON to a webhook that renders and delivers
//! the actual email. Subjects and body templates mirror the operator-facing
//! wording the agent has always used.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use std::time::Duration;
use tracing::info;

use super::{Notification, Notifier};
use crate::config::NotificationsConfig;

pub const SUBJECT_INFO: &str = "Bet Agent - Info";
pub const SUBJECT_ERROR: &str = "Bet Agent - Error";

pub fn body_not_logged_in() -> String {
    "Bot was unable to log in.".to_string()
}

pub fn body_no_balance(balance: Decimal) -> String {
    format!(
        "No balance left in account. Available balance - {balance}. \
         All schedules have been deleted."
    )
}

pub fn body_no_matches() -> String {
    "No suitable matches found for the next day.".to_string()
}

pub fn body_matches_scheduled(count: usize) -> String {
    format!("Scheduled {count} match(es) for next day.")
}

pub fn body_placed_bet(match_name: &str) -> String {
    format!("Placed bet on match {match_name}.")
}

pub fn body_changed_odd(
    match_name: &str,
    market_type_name: &str,
    scheduled: Decimal,
    live: Decimal,
) -> String {
    format!(
        "Odds have changed for match {match_name} - {market_type_name}. Bet not placed. \
         Initial odd: {scheduled}, actual odd: {live}."
    )
}

pub fn body_uncaught_exception() -> String {
    "An uncaught error occurred. See attached log file for details.".to_string()
}

// ---------------------------------------------------------------------------
// Webhook client
// ---------------------------------------------------------------------------

pub struct WebhookNotifier {
    http: Client,
    url: String,
    from_address: String,
    to_address: String,
    token: Option<SecretString>,
}

impl WebhookNotifier {
    pub fn new(config: &NotificationsConfig, token: Option<SecretString>) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client for notifier")?;
        Ok(Self {
            http,
            url: config.webhook_url.clone(),
            from_address: config.from_address.clone(),
            to_address: config.to_address.clone(),
            token,
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        let events: Vec<serde_json::Value> = notification
            .events
            .iter()
            .map(|row| {
                let mut object = serde_json::Map::new();
                for (key, value) in row {
                    object.insert(key.clone(), value.clone().into());
                }
                serde_json::Value::Object(object)
            })
            .collect();

        let mut body = json!({
            "from": self.from_address,
            "to": self.to_address,
            "subject": notification.subject,
            "body": notification.body,
            "events": events,
        });
        if let Some(attachment) = &notification.attachment {
            body["attachment"] = json!({
                "filename": attachment.filename,
                "contents": attachment.contents,
            });
        }

        let mut request = self.http.post(&self.url).json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }
        let resp = request.send().await.context("notification request failed")?;
        resp.error_for_status().context("notification rejected")?;

        info!(subject = %notification.subject, "Notification sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_changed_odd_body_shows_drift() {
        let body = body_changed_odd("FC Alpha - FC Beta", "Match result", dec!(1.90), dec!(2.05));
        assert!(body.contains("Initial odd: 1.90"));
        assert!(body.contains("actual odd: 2.05"));
        assert!(body.contains("FC Alpha - FC Beta"));
    }

    #[test]
    fn test_scheduled_body_counts() {
        assert!(body_matches_scheduled(2).contains("2 match(es)"));
    }
}
