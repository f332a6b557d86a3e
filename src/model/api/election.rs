use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    db::{
        candidate::{Candidate, CandidateUpdate, NewCandidate},
        election::{Election, ElectionUpdate, NewElection},
    },
    mongodb::Id,
};

use super::id::ApiId;

fn default_true() -> bool {
    true
}

/// A new election, as submitted by an administrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionSpec {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// Candidates to create together with the election.
    #[serde(default)]
    pub candidates: Vec<CandidateSpec>,
}

impl ElectionSpec {
    /// Check the request and split it into the election row and its candidates'
    /// specs.
    pub fn validate(self) -> Result<(NewElection, Vec<CandidateSpec>)> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(Error::bad_request("Election title must not be empty"));
        }
        check_dates(self.start_date, self.end_date)?;
        for candidate in &self.candidates {
            candidate.validate()?;
        }
        let election = NewElection {
            title: title.to_string(),
            description: self.description,
            start_date: self.start_date,
            end_date: self.end_date,
            is_active: self.is_active,
            created_at: Utc::now(),
        };
        Ok((election, self.candidates))
    }
}

/// Elections must start strictly before they end.
pub fn check_dates(start_date: DateTime<Utc>, end_date: DateTime<Utc>) -> Result<()> {
    if start_date < end_date {
        Ok(())
    } else {
        Err(Error::bad_request("Election must start before it ends"))
    }
}

/// A new candidate, as submitted by an administrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateSpec {
    pub name: String,
    #[serde(default)]
    pub party: Option<String>,
    #[serde(default)]
    pub biography: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
}

impl CandidateSpec {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::bad_request("Candidate name must not be empty"));
        }
        Ok(())
    }

    /// The candidate row for the given election, with no votes.
    pub fn into_candidate(self, election_id: Id) -> NewCandidate {
        NewCandidate::new(
            election_id,
            self.name.trim().to_string(),
            self.party,
            self.biography,
            self.photo_url,
        )
    }
}

/// A partial election update. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ElectionPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
}

impl ElectionPatch {
    /// Check the patch against the election's current state, so the
    /// resulting election is still well-formed.
    pub fn validate(self, current: &Election) -> Result<ElectionUpdate> {
        let title = match self.title {
            Some(title) if title.trim().is_empty() => {
                return Err(Error::bad_request("Election title must not be empty"))
            }
            Some(title) => Some(title.trim().to_string()),
            None => None,
        };
        check_dates(
            self.start_date.unwrap_or(current.start_date),
            self.end_date.unwrap_or(current.end_date),
        )?;
        Ok(ElectionUpdate {
            title,
            description: self.description,
            start_date: self.start_date,
            end_date: self.end_date,
            is_active: self.is_active,
        })
    }
}

/// Deserialise a present field as `Some`, so an explicit `null` becomes
/// `Some(None)` while an absent field stays `None`.
fn present<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// A partial candidate update. The vote count cannot be written.
///
/// Absent fields are left unchanged; the optional fields are cleared by an
/// explicit `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CandidatePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub party: Option<Option<String>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub biography: Option<Option<String>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<Option<String>>,
}

impl CandidatePatch {
    pub fn validate(self) -> Result<CandidateUpdate> {
        let name = match self.name {
            Some(name) if name.trim().is_empty() => {
                return Err(Error::bad_request("Candidate name must not be empty"))
            }
            Some(name) => Some(name.trim().to_string()),
            None => None,
        };
        Ok(CandidateUpdate {
            name,
            party: self.party,
            biography: self.biography,
            photo_url: self.photo_url,
        })
    }
}

/// A candidate as shown to administrators, tally included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateDescription {
    pub id: ApiId,
    pub election_id: ApiId,
    pub name: String,
    pub party: Option<String>,
    pub biography: Option<String>,
    pub photo_url: Option<String>,
    pub vote_count: u64,
}

impl From<Candidate> for CandidateDescription {
    fn from(candidate: Candidate) -> Self {
        Self {
            id: candidate.id.into(),
            election_id: candidate.election_id.into(),
            name: candidate.candidate.name,
            party: candidate.candidate.party,
            biography: candidate.candidate.biography,
            photo_url: candidate.candidate.photo_url,
            vote_count: candidate.candidate.vote_count,
        }
    }
}

/// An election with its candidates, as shown to administrators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionDescription {
    pub id: ApiId,
    pub title: String,
    pub description: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub is_active: bool,
    /// Whether voting is permitted right now.
    pub is_open: bool,
    pub created_at: DateTime<Utc>,
    pub candidates: Vec<CandidateDescription>,
}

impl ElectionDescription {
    pub fn new(election: Election, candidates: Vec<Candidate>, now: DateTime<Utc>) -> Self {
        Self {
            id: election.id.into(),
            is_open: election.is_open_at(now),
            title: election.election.title,
            description: election.election.description,
            start_date: election.election.start_date,
            end_date: election.election.end_date,
            is_active: election.election.is_active,
            created_at: election.election.created_at,
            candidates: candidates.into_iter().map(Into::into).collect(),
        }
    }
}

/// A candidate as shown in the voting booth: no tally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoothCandidate {
    pub id: ApiId,
    pub name: String,
    pub party: Option<String>,
    pub biography: Option<String>,
    pub photo_url: Option<String>,
}

impl From<Candidate> for BoothCandidate {
    fn from(candidate: Candidate) -> Self {
        Self {
            id: candidate.id.into(),
            name: candidate.candidate.name,
            party: candidate.candidate.party,
            biography: candidate.candidate.biography,
            photo_url: candidate.candidate.photo_url,
        }
    }
}

/// The election a voter is about to vote in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoothElection {
    pub id: ApiId,
    pub title: String,
    pub description: String,
    pub end_date: DateTime<Utc>,
    pub candidates: Vec<BoothCandidate>,
}

impl BoothElection {
    pub fn new(election: Election, candidates: Vec<Candidate>) -> Self {
        Self {
            id: election.id.into(),
            title: election.election.title,
            description: election.election.description,
            end_date: election.election.end_date,
            candidates: candidates.into_iter().map(Into::into).collect(),
        }
    }
}

/// Tallies of an election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionResults {
    pub election_id: ApiId,
    pub title: String,
    /// Sorted by descending vote count.
    pub candidates: Vec<CandidateDescription>,
    pub total_votes: u64,
    pub voters_issued: u64,
    pub voters_voted: u64,
}

impl ElectionResults {
    pub fn new(
        election: Election,
        candidates: Vec<Candidate>,
        voters_issued: u64,
        voters_voted: u64,
    ) -> Self {
        let mut candidates: Vec<CandidateDescription> =
            candidates.into_iter().map(Into::into).collect();
        candidates.sort_by(|a, b| b.vote_count.cmp(&a.vote_count));
        Self {
            election_id: election.id.into(),
            title: election.election.title,
            total_votes: candidates.iter().map(|c| c.vote_count).sum(),
            candidates,
            voters_issued,
            voters_voted,
        }
    }
}

/// Headline numbers for the admin dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub elections: u64,
    pub open_elections: u64,
    pub voters: u64,
    pub voters_voted: u64,
}
