//! Notices - transient, auto-dismissing outcome messages

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeTone {
    Success,
    Error,
}

/// A one-shot message about the outcome of a remote operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub tone: NoticeTone,
    pub message: String,
    pub issued_at: DateTime<Utc>,
    /// How long the notice stays visible
    pub ttl: Duration,
}

impl Notice {
    pub fn new(tone: NoticeTone, message: impl Into<String>, ttl: Duration) -> Self {
        Self {
            tone,
            message: message.into(),
            issued_at: Utc::now(),
            ttl,
        }
    }

    pub fn success(message: impl Into<String>, ttl: Duration) -> Self {
        Self::new(NoticeTone::Success, message, ttl)
    }

    pub fn error(message: impl Into<String>, ttl: Duration) -> Self {
        Self::new(NoticeTone::Error, message, ttl)
    }

    pub fn is_error(&self) -> bool {
        self.tone == NoticeTone::Error
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.issued_at + chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::zero())
    }

    /// Whether the notice should already be dismissed at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at()
    }
}

/// Take every notice currently buffered on `rx`
///
/// A lagged receiver skips the overwritten notices and keeps draining.
pub fn drain_notices(rx: &mut broadcast::Receiver<Notice>) -> Vec<Notice> {
    let mut drained = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(notice) => drained.push(notice),
            Err(TryRecvError::Lagged(skipped)) => warn!(skipped, "Notice receiver lagged"),
            Err(TryRecvError::Empty | TryRecvError::Closed) => return drained,
        }
    }
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}
