use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::{doc, serde_helpers::chrono_datetime_as_bson_datetime, Bson, Document};
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Core election data, as stored in the database.
///
/// Candidates live in their own collection and reference the election by ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionCore {
    pub title: String,
    pub description: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub start_date: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub end_date: DateTime<Utc>,
    pub is_active: bool,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl ElectionCore {
    /// Is voting permitted at the given instant?
    /// Requires the active flag and `start_date <= now <= end_date`.
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.start_date <= now && now <= self.end_date
    }
}

/// An election without an ID.
pub type NewElection = ElectionCore;

/// An election from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Election {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub election: ElectionCore,
}

impl Deref for Election {
    type Target = ElectionCore;

    fn deref(&self) -> &Self::Target {
        &self.election
    }
}

impl DerefMut for Election {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.election
    }
}

/// A partial update of an election. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElectionUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
}

impl ElectionUpdate {
    /// An update that only flips the active flag on.
    pub fn reactivate() -> Self {
        Self {
            is_active: Some(true),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply this update to an in-memory election.
    pub fn apply(&self, election: &mut ElectionCore) {
        if let Some(ref title) = self.title {
            election.title = title.clone();
        }
        if let Some(ref description) = self.description {
            election.description = description.clone();
        }
        if let Some(start_date) = self.start_date {
            election.start_date = start_date;
        }
        if let Some(end_date) = self.end_date {
            election.end_date = end_date;
        }
        if let Some(is_active) = self.is_active {
            election.is_active = is_active;
        }
    }

    /// Does the election still start before it ends once this update is applied?
    pub fn keeps_window(&self, election: &ElectionCore) -> bool {
        self.start_date.unwrap_or(election.start_date) < self.end_date.unwrap_or(election.end_date)
    }

    /// A filter clause matching only the elections for which
    /// [`Self::keeps_window`] holds, or `None` if the dates are untouched.
    pub fn window_filter(&self) -> Option<Document> {
        fn date_or_field(date: Option<DateTime<Utc>>, field: &str) -> Bson {
            match date {
                Some(date) => Bson::DateTime(date.into()),
                None => Bson::String(format!("${field}")),
            }
        }

        if self.start_date.is_none() && self.end_date.is_none() {
            return None;
        }
        let start = date_or_field(self.start_date, "start_date");
        let end = date_or_field(self.end_date, "end_date");
        Some(doc! { "$expr": { "$lt": [start, end] } })
    }

    /// The `$set` document performing this update.
    pub fn as_set_doc(&self) -> Document {
        let mut set = Document::new();
        if let Some(ref title) = self.title {
            set.insert("title", title.clone());
        }
        if let Some(ref description) = self.description {
            set.insert("description", description.clone());
        }
        if let Some(start_date) = self.start_date {
            set.insert("start_date", Bson::DateTime(start_date.into()));
        }
        if let Some(end_date) = self.end_date {
            set.insert("end_date", Bson::DateTime(end_date.into()));
        }
        if let Some(is_active) = self.is_active {
            set.insert("is_active", is_active);
        }
        doc! { "$set": set }
    }
}
