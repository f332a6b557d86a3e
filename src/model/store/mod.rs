//! The persistence seam: every row-level operation the service performs,
//! plus the single atomic vote-recording operation.
//!
//! Production uses [`MongoStore`]. Tests use an in-memory implementation.

use std::sync::Arc;

use rocket::{
    http::Status,
    request::{FromRequest, Outcome},
    Request,
};

use crate::error::{Error, Result};
use crate::model::{
    common::{
        code::OneTimeCode,
        role::{Permissions, Role},
    },
    db::{
        admin::{Admin, NewAdmin},
        candidate::{Candidate, CandidateUpdate, NewCandidate},
        election::{Election, ElectionUpdate, NewElection},
        log::{LogEntry, NewLogEntry},
        voter::{NewVoter, Voter},
    },
    mongodb::Id,
};

#[cfg(test)]
mod memory;
mod mongo;

#[cfg(test)]
pub use memory::MemoryStore;
pub use mongo::MongoStore;

/// The store handle kept in Rocket's managed state.
pub type DynStore = Arc<dyn Store>;

/// Borrow the managed store for the duration of a request.
#[rocket::async_trait]
impl<'r> FromRequest<'r> for &'r dyn Store {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match req.rocket().state::<DynStore>() {
            Some(store) => Outcome::Success(store.as_ref()),
            None => {
                error!("No store in managed state");
                Outcome::Failure((Status::InternalServerError, ()))
            }
        }
    }
}

/// One voter's choice of one candidate in one election.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ballot {
    pub election_id: Id,
    pub candidate_id: Id,
    pub voter_id: Id,
}

/// The result of attempting to record a ballot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    /// The voter is now spent and the candidate's tally went up by one.
    Recorded,
    /// There is no unspent voter with that ID in that election. Nothing changed.
    AlreadyVoted,
    /// The candidate does not belong to the election. Nothing changed.
    UnknownCandidate,
}

#[rocket::async_trait]
pub trait Store: Send + Sync {
    // Elections.

    /// All elections, newest first.
    async fn elections(&self) -> Result<Vec<Election>>;
    async fn election(&self, id: Id) -> Result<Option<Election>>;
    /// Insert an election together with its initial candidates. Either every
    /// row is written or none is.
    async fn create_election(
        &self,
        election: Election,
        candidates: Vec<NewCandidate>,
    ) -> Result<(Election, Vec<Candidate>)>;
    async fn insert_election(&self, election: NewElection) -> Result<Election> {
        let election = Election {
            id: Id::new(),
            election,
        };
        let (election, _) = self.create_election(election, Vec::new()).await?;
        Ok(election)
    }
    /// Apply a partial update. The update only happens if the resulting
    /// window still starts before it ends; otherwise it fails with `409`.
    async fn update_election(&self, id: Id, update: &ElectionUpdate) -> Result<Option<Election>>;
    /// Delete an election together with its candidates and voters.
    /// Returns false if there was no such election.
    async fn delete_election(&self, id: Id) -> Result<bool>;

    // Candidates.

    /// The candidates of an election, in insertion order.
    async fn candidates(&self, election_id: Id) -> Result<Vec<Candidate>>;
    async fn insert_candidate(&self, candidate: NewCandidate) -> Result<Candidate>;
    async fn update_candidate(
        &self,
        election_id: Id,
        id: Id,
        update: &CandidateUpdate,
    ) -> Result<Option<Candidate>>;
    async fn delete_candidate(&self, election_id: Id, id: Id) -> Result<bool>;

    // Voters.

    /// One page of an election's voters, in insertion order.
    async fn voters(&self, election_id: Id, skip: u64, limit: u64) -> Result<Vec<Voter>>;
    /// Count voters, optionally restricted to one election and/or one latch state.
    async fn count_voters(&self, election_id: Option<Id>, has_voted: Option<bool>) -> Result<u64>;
    async fn voter(&self, id: Id) -> Result<Option<Voter>>;
    /// The voter holding this code, provided it has not voted yet.
    async fn unused_voter_by_code(&self, code: &OneTimeCode) -> Result<Option<Voter>>;
    /// Insert a batch of voters. Either every voter is written or none is.
    /// Fails with [`crate::error::Error::Duplicate`] if any code is taken,
    /// including by another voter of the same batch.
    async fn insert_voters(&self, voters: Vec<NewVoter>) -> Result<Vec<Voter>>;
    /// Fails with [`crate::error::Error::Duplicate`] if the code is taken.
    async fn insert_voter(&self, voter: NewVoter) -> Result<Voter> {
        self.insert_voters(vec![voter])
            .await?
            .pop()
            .ok_or_else(|| {
                Error::Status(Status::InternalServerError, "No voter inserted".to_string())
            })
    }
    /// Give an unspent voter a new code and clear its shared flag.
    /// Returns `None` if the voter is missing or has already voted.
    async fn replace_voter_code(&self, id: Id, code: OneTimeCode) -> Result<Option<Voter>>;
    async fn set_voter_shared(&self, id: Id, shared: bool) -> Result<Option<Voter>>;
    async fn delete_voter(&self, id: Id) -> Result<bool>;

    // Votes.

    /// Atomically spend the voter and increment the candidate's tally.
    /// Either both writes happen or neither does.
    async fn record_vote(&self, ballot: &Ballot) -> Result<VoteOutcome>;

    // Audit log.

    async fn append_log(&self, entry: NewLogEntry) -> Result<()>;
    /// One page of the log, newest first.
    async fn logs(&self, skip: u64, limit: u64) -> Result<Vec<LogEntry>>;
    async fn count_logs(&self) -> Result<u64>;

    // Admins.

    async fn admins(&self) -> Result<Vec<Admin>>;
    async fn count_admins(&self) -> Result<u64>;
    async fn admin(&self, id: Id) -> Result<Option<Admin>>;
    async fn admin_by_email(&self, email: &str) -> Result<Option<Admin>>;
    /// Fails with [`crate::error::Error::Duplicate`] if the email is taken.
    async fn insert_admin(&self, admin: NewAdmin) -> Result<Admin>;
    async fn update_admin(
        &self,
        id: Id,
        role: Option<Role>,
        permissions: Option<Permissions>,
    ) -> Result<Option<Admin>>;
    async fn set_admin_password(&self, id: Id, password_hash: String) -> Result<bool>;
}
