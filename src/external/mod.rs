//! External collaborators.
//!
//! Defines the trait seams for the services the agent depends on but does
//! not own — the time-triggered scheduler, the secrets store, and the
//! notification channel — plus one thin HTTP/env-backed implementation of
//! each. Orchestration code is written against the traits so the fakes in
//! the test suite can stand in.

pub mod notify;
pub mod scheduler;
pub mod secrets;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Time-triggered invocation registry.
///
/// The scheduler re-invokes the agent with the stored payload at fire time;
/// it also enforces at-most-one placement per match via distinct schedule
/// names.
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Register a future invocation carrying a flat string/number payload.
    async fn create(
        &self,
        name: &str,
        fire_time: DateTime<FixedOffset>,
        payload: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<()>;

    /// Remove one schedule entry. Deleting a missing entry is not an error.
    async fn delete(&self, name: &str) -> Result<()>;

    /// Purge every pending schedule. Only used once funds are exhausted and
    /// human intervention is required.
    async fn delete_all(&self) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Notifier
// ---------------------------------------------------------------------------

/// One row of the tabular summary attached to a notification.
pub type EventRow = Vec<(String, String)>;

/// A diagnostic file attached to a failure notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub contents: String,
}

/// An outbound message. Every terminal state of a run produces exactly one.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub subject: String,
    pub body: String,
    pub attachment: Option<Attachment>,
    pub events: Vec<EventRow>,
}

impl Notification {
    pub fn new(subject: &str, body: String) -> Self {
        Self {
            subject: subject.to_string(),
            body,
            attachment: None,
            events: Vec::new(),
        }
    }

    pub fn with_events(mut self, events: Vec<EventRow>) -> Self {
        self.events = events;
        self
    }

    pub fn with_attachment(mut self, filename: &str, contents: String) -> Self {
        self.attachment = Some(Attachment {
            filename: filename.to_string(),
            contents,
        });
        self
    }
}

/// Outbound notification channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Secrets
// ---------------------------------------------------------------------------

/// Credential store, consumed once at process start.
pub trait SecretsProvider {
    fn get(&self, secret_id: &str) -> Result<secrets::Secrets>;
}
