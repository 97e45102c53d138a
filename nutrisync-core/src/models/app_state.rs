use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::day_log::DayLog;
use super::fasting::FastingSession;
use super::profile::{Goals, Profile};
use crate::sanitize::CURRENT_SCHEMA_VERSION;

/// The single root document holding one user's settings and full history.
///
/// This is what the local store keeps under the app-state key and what the
/// remote store carries, serialized, in its `appState` field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    pub schema_version: u32,
    pub profile: Profile,
    pub goals: Goals,
    pub log: BTreeMap<NaiveDate, DayLog>,
    pub fasting_sessions: Vec<FastingSession>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            profile: Profile::default(),
            goals: Goals::default(),
            log: BTreeMap::new(),
            fasting_sessions: Vec::new(),
        }
    }
}

impl AppState {
    pub fn day(&self, date: NaiveDate) -> Option<&DayLog> {
        self.log.get(&date)
    }

    /// Returns the day for `date`, creating an empty one if needed.
    pub fn day_mut(&mut self, date: NaiveDate) -> &mut DayLog {
        self.log.entry(date).or_default()
    }

    /// Total food entries across every logged day.
    pub fn entry_count(&self) -> usize {
        self.log.values().map(DayLog::completeness).sum()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
