use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::db::voter::Voter;

use super::id::ApiId;

/// A voter as listed for administrators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterDescription {
    pub id: ApiId,
    pub election_id: ApiId,
    pub one_time_code: String,
    pub has_voted: bool,
    pub shared: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Voter> for VoterDescription {
    fn from(voter: Voter) -> Self {
        Self {
            id: voter.id.into(),
            election_id: voter.election_id.into(),
            one_time_code: voter.voter.one_time_code.into(),
            has_voted: voter.voter.has_voted,
            shared: voter.voter.shared,
            created_at: voter.voter.created_at,
        }
    }
}

/// How many fresh voters to create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedRequest {
    pub shared: bool,
}

/// One row of a code export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedCode {
    pub one_time_code: String,
    pub has_voted: bool,
    pub shared: bool,
}

/// Every code of an election, for distribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterExport {
    pub election_id: ApiId,
    pub election_title: String,
    pub exported_at: DateTime<Utc>,
    pub codes: Vec<ExportedCode>,
}

impl From<Voter> for ExportedCode {
    fn from(voter: Voter) -> Self {
        Self {
            one_time_code: voter.voter.one_time_code.into(),
            has_voted: voter.voter.has_voted,
            shared: voter.voter.shared,
        }
    }
}

/// The body of `POST /voter/vote`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CastRequest {
    pub candidate_id: ApiId,
}

/// Proof returned to a voter after a successful cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteReceipt {
    pub election_id: ApiId,
    pub candidate_id: ApiId,
    pub cast_at: DateTime<Utc>,
}
