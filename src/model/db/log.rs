use std::ops::Deref;

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{common::action::Action, mongodb::Id};

/// Core audit log data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntryCore {
    pub admin_id: Id,
    pub admin_name: String,
    pub action: Action,
    pub details: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub timestamp: DateTime<Utc>,
}

impl LogEntryCore {
    /// A log entry stamped with the current time.
    pub fn new(admin_id: Id, admin_name: String, action: Action, details: String) -> Self {
        Self {
            admin_id,
            admin_name,
            action,
            details,
            timestamp: Utc::now(),
        }
    }
}

/// A log entry without an ID.
pub type NewLogEntry = LogEntryCore;

/// A log entry from the database. Entries are never modified once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub entry: LogEntryCore,
}

impl Deref for LogEntry {
    type Target = LogEntryCore;

    fn deref(&self) -> &Self::Target {
        &self.entry
    }
}
