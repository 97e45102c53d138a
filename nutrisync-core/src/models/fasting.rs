use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Provenance tag used when a session does not say where it came from.
pub const DEFAULT_FASTING_SOURCE: &str = "manual";

/// A fasting window. Sessions without an `end` are still running.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FastingSession {
    pub id: String,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub source: String,
}

impl FastingSession {
    pub fn start(start: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            start,
            end: None,
            source: DEFAULT_FASTING_SOURCE.to_string(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_end(mut self, end: DateTime<Utc>) -> Self {
        self.end = Some(end);
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn is_running(&self) -> bool {
        self.end.is_none()
    }

    /// Elapsed hours, measured up to `now` for running sessions.
    pub fn hours(&self, now: DateTime<Utc>) -> f64 {
        let end = self.end.unwrap_or(now);
        (end - self.start).num_minutes().max(0) as f64 / 60.0
    }
}
