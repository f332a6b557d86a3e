//! The voter-facing flows: redeeming a one-time code, viewing the booth and
//! casting a ballot.

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::model::{
    api::{
        auth::AuthToken,
        election::BoothElection,
        voter::VoteReceipt,
    },
    common::code::OneTimeCode,
    db::{election::Election, voter::Voter},
    mongodb::Id,
    store::{Ballot, Store, VoteOutcome},
};

/// Find the unused voter holding the given code.
///
/// Malformed, unknown and spent codes all fail with the same error. The
/// voter row is not touched.
pub async fn redeem(store: &dyn Store, code: &str) -> Result<Voter> {
    let code: OneTimeCode = code.parse().map_err(|_| Error::invalid_code())?;
    store
        .unused_voter_by_code(&code)
        .await?
        .ok_or_else(Error::invalid_code)
}

/// The election a voter session is bound to, provided voting is open.
async fn open_election(
    store: &dyn Store,
    voter: &AuthToken<Voter>,
    now: DateTime<Utc>,
) -> Result<Election> {
    let election_id = voter
        .election_id
        .ok_or_else(|| Error::forbidden("Session is not bound to an election"))?;
    let election = store
        .election(election_id)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election {election_id}")))?;
    if !election.is_open_at(now) {
        return Err(Error::forbidden("Election is not open for voting"));
    }
    Ok(election)
}

/// The session's election and its candidates, without tallies.
///
/// Once the voter has cast its ballot the session is spent and only gets `409`.
pub async fn booth(
    store: &dyn Store,
    voter: &AuthToken<Voter>,
    now: DateTime<Utc>,
) -> Result<BoothElection> {
    let spent = store
        .voter(voter.id)
        .await?
        .ok_or_else(|| Error::not_found(format!("Voter {}", voter.id)))?
        .has_voted;
    if spent {
        return Err(already_voted());
    }
    let election = open_election(store, voter, now).await?;
    let candidates = store.candidates(election.id).await?;
    Ok(BoothElection::new(election, candidates))
}

fn already_voted() -> Error {
    Error::conflict("This code has already been used to vote")
}

/// Record the session voter's ballot for the given candidate.
///
/// The store spends the voter and counts the vote in one atomic step, so a
/// voter is counted at most once no matter how many casts race.
pub async fn cast(
    store: &dyn Store,
    voter: &AuthToken<Voter>,
    candidate_id: Id,
    now: DateTime<Utc>,
) -> Result<VoteReceipt> {
    let election = open_election(store, voter, now).await?;
    let ballot = Ballot {
        election_id: election.id,
        candidate_id,
        voter_id: voter.id,
    };

    match store.record_vote(&ballot).await? {
        VoteOutcome::Recorded => {
            info!("Recorded vote in election {}", election.id);
            Ok(VoteReceipt {
                election_id: election.id.into(),
                candidate_id: candidate_id.into(),
                cast_at: now,
            })
        }
        VoteOutcome::AlreadyVoted => Err(already_voted()),
        VoteOutcome::UnknownCandidate => Err(Error::not_found(format!(
            "Candidate {candidate_id} in election {}",
            election.id
        ))),
    }
}
