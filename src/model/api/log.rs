use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{common::action::Action, db::log::LogEntry};

use super::id::ApiId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntryDescription {
    pub id: ApiId,
    pub admin_id: ApiId,
    pub admin_name: String,
    pub action: Action,
    pub details: String,
    pub timestamp: DateTime<Utc>,
}

impl From<LogEntry> for LogEntryDescription {
    fn from(log: LogEntry) -> Self {
        Self {
            id: log.id.into(),
            admin_id: log.admin_id.into(),
            admin_name: log.entry.admin_name,
            action: log.entry.action,
            details: log.entry.details,
            timestamp: log.entry.timestamp,
        }
    }
}
