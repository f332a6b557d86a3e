use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{common::code::OneTimeCode, mongodb::Id};

/// Core voter data, as stored in the database.
///
/// A voter is a single-use credential for one election, not a person:
/// nothing identifying is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterCore {
    pub election_id: Id,
    /// The redemption secret.
    pub one_time_code: OneTimeCode,
    /// One-way latch, set when a vote is cast.
    pub has_voted: bool,
    /// Informational: the code was handed out over a shared channel.
    pub shared: bool,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl VoterCore {
    /// Create a fresh, unused voter for the given election with a random code.
    pub fn new(election_id: Id) -> Self {
        Self::with_code(election_id, OneTimeCode::random())
    }

    pub fn with_code(election_id: Id, one_time_code: OneTimeCode) -> Self {
        Self {
            election_id,
            one_time_code,
            has_voted: false,
            shared: false,
            created_at: Utc::now(),
        }
    }
}

/// A voter without an ID.
pub type NewVoter = VoterCore;

/// A voter from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voter {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub voter: VoterCore,
}

impl Deref for Voter {
    type Target = VoterCore;

    fn deref(&self) -> &Self::Target {
        &self.voter
    }
}

impl DerefMut for Voter {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.voter
    }
}
