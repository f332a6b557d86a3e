use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::{doc, serde_helpers::chrono_datetime_as_bson_datetime, Document};
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Core candidate data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateCore {
    pub election_id: Id,
    pub name: String,
    pub party: Option<String>,
    pub biography: Option<String>,
    pub photo_url: Option<String>,
    /// Only ever incremented, and only by vote casting.
    pub vote_count: u64,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl CandidateCore {
    /// A candidate with no votes yet.
    pub fn new(
        election_id: Id,
        name: String,
        party: Option<String>,
        biography: Option<String>,
        photo_url: Option<String>,
    ) -> Self {
        Self {
            election_id,
            name,
            party,
            biography,
            photo_url,
            vote_count: 0,
            created_at: Utc::now(),
        }
    }
}

/// A candidate without an ID.
pub type NewCandidate = CandidateCore;

/// A candidate from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub candidate: CandidateCore,
}

impl Deref for Candidate {
    type Target = CandidateCore;

    fn deref(&self) -> &Self::Target {
        &self.candidate
    }
}

impl DerefMut for Candidate {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.candidate
    }
}

/// A partial update of a candidate's descriptive fields.
/// The vote count is deliberately absent.
///
/// For the optional fields, `Some(None)` clears the value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateUpdate {
    pub name: Option<String>,
    pub party: Option<Option<String>>,
    pub biography: Option<Option<String>>,
    pub photo_url: Option<Option<String>>,
}

impl CandidateUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply this update to an in-memory candidate.
    pub fn apply(&self, candidate: &mut CandidateCore) {
        if let Some(ref name) = self.name {
            candidate.name = name.clone();
        }
        if let Some(ref party) = self.party {
            candidate.party = party.clone();
        }
        if let Some(ref biography) = self.biography {
            candidate.biography = biography.clone();
        }
        if let Some(ref photo_url) = self.photo_url {
            candidate.photo_url = photo_url.clone();
        }
    }

    /// The `$set`/`$unset` document performing this update.
    pub fn as_update_doc(&self) -> Document {
        let mut set = Document::new();
        let mut unset = Document::new();
        if let Some(ref name) = self.name {
            set.insert("name", name.clone());
        }
        let optional = [
            ("party", &self.party),
            ("biography", &self.biography),
            ("photo_url", &self.photo_url),
        ];
        for (key, value) in optional {
            match value {
                Some(Some(value)) => {
                    set.insert(key, value.clone());
                }
                Some(None) => {
                    unset.insert(key, "");
                }
                None => {}
            }
        }

        let mut update = Document::new();
        if !set.is_empty() {
            update.insert("$set", set);
        }
        if !unset.is_empty() {
            update.insert("$unset", unset);
        }
        update
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl CandidateCore {
        pub fn example1(election_id: Id) -> Self {
            Self::new(
                election_id,
                "Ada Lovelace".to_string(),
                Some("Analytical Party".to_string()),
                Some("Wrote the first program.".to_string()),
                None,
            )
        }

        pub fn example2(election_id: Id) -> Self {
            Self::new(
                election_id,
                "Grace Hopper".to_string(),
                None,
                None,
                Some("https://example.com/hopper.png".to_string()),
            )
        }
    }
}
