use std::collections::HashSet;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, MutexGuard,
};

use rocket::http::Status;

use crate::error::{Error, Result};
use crate::model::{
    common::{
        code::OneTimeCode,
        role::{Permissions, Role},
    },
    db::{
        admin::{Admin, NewAdmin},
        candidate::{Candidate, CandidateUpdate, NewCandidate},
        election::{Election, ElectionUpdate},
        log::{LogEntry, NewLogEntry},
        voter::{NewVoter, Voter},
    },
    mongodb::Id,
};

use super::{Ballot, Store, VoteOutcome};

#[derive(Default)]
struct Tables {
    elections: Vec<Election>,
    candidates: Vec<Candidate>,
    voters: Vec<Voter>,
    logs: Vec<LogEntry>,
    admins: Vec<Admin>,
}

/// A [`Store`] kept in memory, for tests. Clones share the same tables.
///
/// Every operation holds one lock for its whole duration, which gives the
/// same atomicity as the MongoDB transactions.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    fail_log_writes: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent audit log write fail.
    pub fn fail_log_writes(&self) {
        self.fail_log_writes.store(true, Ordering::SeqCst);
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap()
    }
}

fn page<T: Clone>(rows: impl Iterator<Item = T>, skip: u64, limit: u64) -> Vec<T> {
    let skip = usize::try_from(skip).unwrap_or(usize::MAX);
    let limit = usize::try_from(limit).unwrap_or(usize::MAX);
    rows.skip(skip).take(limit).collect()
}

#[rocket::async_trait]
impl Store for MemoryStore {
    async fn elections(&self) -> Result<Vec<Election>> {
        Ok(self.tables().elections.iter().rev().cloned().collect())
    }

    async fn election(&self, id: Id) -> Result<Option<Election>> {
        Ok(self.tables().elections.iter().find(|e| e.id == id).cloned())
    }

    async fn create_election(
        &self,
        election: Election,
        candidates: Vec<NewCandidate>,
    ) -> Result<(Election, Vec<Candidate>)> {
        let mut tables = self.tables();
        let candidates: Vec<_> = candidates
            .into_iter()
            .map(|candidate| Candidate {
                id: Id::new(),
                candidate,
            })
            .collect();
        tables.elections.push(election.clone());
        tables.candidates.extend(candidates.iter().cloned());
        Ok((election, candidates))
    }

    async fn update_election(&self, id: Id, update: &ElectionUpdate) -> Result<Option<Election>> {
        let mut tables = self.tables();
        let Some(election) = tables.elections.iter_mut().find(|e| e.id == id) else {
            return Ok(None);
        };
        if !update.keeps_window(election) {
            return Err(Error::conflict("Election must start before it ends"));
        }
        update.apply(election);
        Ok(Some(election.clone()))
    }

    async fn delete_election(&self, id: Id) -> Result<bool> {
        let mut tables = self.tables();
        let before = tables.elections.len();
        tables.elections.retain(|e| e.id != id);
        if tables.elections.len() == before {
            return Ok(false);
        }
        tables.candidates.retain(|c| c.election_id != id);
        tables.voters.retain(|v| v.election_id != id);
        Ok(true)
    }

    async fn candidates(&self, election_id: Id) -> Result<Vec<Candidate>> {
        Ok(self
            .tables()
            .candidates
            .iter()
            .filter(|c| c.election_id == election_id)
            .cloned()
            .collect())
    }

    async fn insert_candidate(&self, candidate: NewCandidate) -> Result<Candidate> {
        let candidate = Candidate {
            id: Id::new(),
            candidate,
        };
        self.tables().candidates.push(candidate.clone());
        Ok(candidate)
    }

    async fn update_candidate(
        &self,
        election_id: Id,
        id: Id,
        update: &CandidateUpdate,
    ) -> Result<Option<Candidate>> {
        let mut tables = self.tables();
        Ok(tables
            .candidates
            .iter_mut()
            .find(|c| c.id == id && c.election_id == election_id)
            .map(|candidate| {
                update.apply(candidate);
                candidate.clone()
            }))
    }

    async fn delete_candidate(&self, election_id: Id, id: Id) -> Result<bool> {
        let mut tables = self.tables();
        let before = tables.candidates.len();
        tables
            .candidates
            .retain(|c| !(c.id == id && c.election_id == election_id));
        Ok(tables.candidates.len() != before)
    }

    async fn voters(&self, election_id: Id, skip: u64, limit: u64) -> Result<Vec<Voter>> {
        let tables = self.tables();
        let rows = tables
            .voters
            .iter()
            .filter(|v| v.election_id == election_id)
            .cloned();
        Ok(page(rows, skip, limit))
    }

    async fn count_voters(&self, election_id: Option<Id>, has_voted: Option<bool>) -> Result<u64> {
        let count = self
            .tables()
            .voters
            .iter()
            .filter(|v| election_id.map_or(true, |id| v.election_id == id))
            .filter(|v| has_voted.map_or(true, |voted| v.has_voted == voted))
            .count();
        Ok(count as u64)
    }

    async fn voter(&self, id: Id) -> Result<Option<Voter>> {
        Ok(self.tables().voters.iter().find(|v| v.id == id).cloned())
    }

    async fn unused_voter_by_code(&self, code: &OneTimeCode) -> Result<Option<Voter>> {
        Ok(self
            .tables()
            .voters
            .iter()
            .find(|v| v.one_time_code == *code && !v.has_voted)
            .cloned())
    }

    async fn insert_voters(&self, voters: Vec<NewVoter>) -> Result<Vec<Voter>> {
        let mut tables = self.tables();
        let mut taken: HashSet<_> = tables
            .voters
            .iter()
            .map(|v| v.one_time_code.clone())
            .collect();
        if !voters.iter().all(|v| taken.insert(v.one_time_code.clone())) {
            return Err(Error::Duplicate("one-time code".to_string()));
        }
        let voters: Vec<_> = voters
            .into_iter()
            .map(|voter| Voter {
                id: Id::new(),
                voter,
            })
            .collect();
        tables.voters.extend(voters.iter().cloned());
        Ok(voters)
    }

    async fn replace_voter_code(&self, id: Id, code: OneTimeCode) -> Result<Option<Voter>> {
        let mut tables = self.tables();
        if tables
            .voters
            .iter()
            .any(|v| v.one_time_code == code && v.id != id)
        {
            return Err(Error::Duplicate("one-time code".to_string()));
        }
        Ok(tables
            .voters
            .iter_mut()
            .find(|v| v.id == id && !v.has_voted)
            .map(|voter| {
                voter.one_time_code = code;
                voter.shared = false;
                voter.clone()
            }))
    }

    async fn set_voter_shared(&self, id: Id, shared: bool) -> Result<Option<Voter>> {
        let mut tables = self.tables();
        Ok(tables.voters.iter_mut().find(|v| v.id == id).map(|voter| {
            voter.shared = shared;
            voter.clone()
        }))
    }

    async fn delete_voter(&self, id: Id) -> Result<bool> {
        let mut tables = self.tables();
        let before = tables.voters.len();
        tables.voters.retain(|v| v.id != id);
        Ok(tables.voters.len() != before)
    }

    async fn record_vote(&self, ballot: &Ballot) -> Result<VoteOutcome> {
        let mut tables = self.tables();
        let Tables {
            voters, candidates, ..
        } = &mut *tables;

        let Some(voter) = voters.iter_mut().find(|v| {
            v.id == ballot.voter_id && v.election_id == ballot.election_id && !v.has_voted
        }) else {
            return Ok(VoteOutcome::AlreadyVoted);
        };
        let Some(candidate) = candidates
            .iter_mut()
            .find(|c| c.id == ballot.candidate_id && c.election_id == ballot.election_id)
        else {
            return Ok(VoteOutcome::UnknownCandidate);
        };

        voter.has_voted = true;
        candidate.vote_count += 1;
        Ok(VoteOutcome::Recorded)
    }

    async fn append_log(&self, entry: NewLogEntry) -> Result<()> {
        if self.fail_log_writes.load(Ordering::SeqCst) {
            return Err(Error::Status(
                Status::ServiceUnavailable,
                "Log writes disabled".to_string(),
            ));
        }
        self.tables().logs.push(LogEntry {
            id: Id::new(),
            entry,
        });
        Ok(())
    }

    async fn logs(&self, skip: u64, limit: u64) -> Result<Vec<LogEntry>> {
        let tables = self.tables();
        Ok(page(tables.logs.iter().rev().cloned(), skip, limit))
    }

    async fn count_logs(&self) -> Result<u64> {
        Ok(self.tables().logs.len() as u64)
    }

    async fn admins(&self) -> Result<Vec<Admin>> {
        Ok(self.tables().admins.clone())
    }

    async fn count_admins(&self) -> Result<u64> {
        Ok(self.tables().admins.len() as u64)
    }

    async fn admin(&self, id: Id) -> Result<Option<Admin>> {
        Ok(self.tables().admins.iter().find(|a| a.id == id).cloned())
    }

    async fn admin_by_email(&self, email: &str) -> Result<Option<Admin>> {
        Ok(self
            .tables()
            .admins
            .iter()
            .find(|a| a.email == email)
            .cloned())
    }

    async fn insert_admin(&self, admin: NewAdmin) -> Result<Admin> {
        let mut tables = self.tables();
        if tables.admins.iter().any(|a| a.email == admin.email) {
            return Err(Error::Duplicate("admin email".to_string()));
        }
        let admin = Admin {
            id: Id::new(),
            admin,
        };
        tables.admins.push(admin.clone());
        Ok(admin)
    }

    async fn update_admin(
        &self,
        id: Id,
        role: Option<Role>,
        permissions: Option<Permissions>,
    ) -> Result<Option<Admin>> {
        let mut tables = self.tables();
        Ok(tables.admins.iter_mut().find(|a| a.id == id).map(|admin| {
            if let Some(role) = role {
                admin.role = role;
            }
            if let Some(permissions) = permissions {
                admin.permissions = permissions;
            }
            admin.clone()
        }))
    }

    async fn set_admin_password(&self, id: Id, password_hash: String) -> Result<bool> {
        let mut tables = self.tables();
        match tables.admins.iter_mut().find(|a| a.id == id) {
            Some(admin) => {
                admin.password_hash = password_hash;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::model::db::election::ElectionCore;

    struct Fixture {
        store: MemoryStore,
        election: Election,
        other_election: Election,
        candidate: Candidate,
        foreign_candidate: Candidate,
    }

    async fn fixture() -> Fixture {
        let store = MemoryStore::new();
        let election = store
            .insert_election(ElectionCore::current_example())
            .await
            .unwrap();
        let other_election = store
            .insert_election(ElectionCore::inactive_example())
            .await
            .unwrap();
        let candidate = store
            .insert_candidate(NewCandidate::example1(election.id))
            .await
            .unwrap();
        let foreign_candidate = store
            .insert_candidate(NewCandidate::example2(other_election.id))
            .await
            .unwrap();
        Fixture {
            store,
            election,
            other_election,
            candidate,
            foreign_candidate,
        }
    }

    async fn tally(store: &MemoryStore, election_id: Id, candidate_id: Id) -> u64 {
        store
            .candidates(election_id)
            .await
            .unwrap()
            .into_iter()
            .find(|c| c.id == candidate_id)
            .unwrap()
            .vote_count
    }

    #[rocket::async_test]
    async fn second_vote_is_rejected() {
        let f = fixture().await;
        let voter = f
            .store
            .insert_voter(NewVoter::new(f.election.id))
            .await
            .unwrap();
        let ballot = Ballot {
            election_id: f.election.id,
            candidate_id: f.candidate.id,
            voter_id: voter.id,
        };

        assert_eq!(
            f.store.record_vote(&ballot).await.unwrap(),
            VoteOutcome::Recorded
        );
        assert_eq!(
            f.store.record_vote(&ballot).await.unwrap(),
            VoteOutcome::AlreadyVoted
        );
        assert_eq!(tally(&f.store, f.election.id, f.candidate.id).await, 1);
        assert!(f.store.voter(voter.id).await.unwrap().unwrap().has_voted);
    }

    #[rocket::async_test]
    async fn foreign_candidate_changes_nothing() {
        let f = fixture().await;
        let voter = f
            .store
            .insert_voter(NewVoter::new(f.election.id))
            .await
            .unwrap();
        let ballot = Ballot {
            election_id: f.election.id,
            candidate_id: f.foreign_candidate.id,
            voter_id: voter.id,
        };

        assert_eq!(
            f.store.record_vote(&ballot).await.unwrap(),
            VoteOutcome::UnknownCandidate
        );
        assert!(!f.store.voter(voter.id).await.unwrap().unwrap().has_voted);
        assert_eq!(
            tally(&f.store, f.other_election.id, f.foreign_candidate.id).await,
            0
        );
    }

    #[rocket::async_test]
    async fn distinct_voters_each_count_once() {
        let f = fixture().await;
        for _ in 0..5 {
            let voter = f
                .store
                .insert_voter(NewVoter::new(f.election.id))
                .await
                .unwrap();
            let ballot = Ballot {
                election_id: f.election.id,
                candidate_id: f.candidate.id,
                voter_id: voter.id,
            };
            assert_eq!(
                f.store.record_vote(&ballot).await.unwrap(),
                VoteOutcome::Recorded
            );
        }
        assert_eq!(tally(&f.store, f.election.id, f.candidate.id).await, 5);
        assert_eq!(
            f.store.count_voters(Some(f.election.id), Some(true)).await.unwrap(),
            5
        );
    }

    #[rocket::async_test]
    async fn duplicate_codes_are_refused() {
        let f = fixture().await;
        let code = OneTimeCode::example();
        f.store
            .insert_voter(NewVoter::with_code(f.election.id, code.clone()))
            .await
            .unwrap();
        let result = f
            .store
            .insert_voter(NewVoter::with_code(f.other_election.id, code))
            .await;
        assert!(matches!(result, Err(Error::Duplicate(_))));
    }

    #[rocket::async_test]
    async fn voter_batches_are_all_or_nothing() {
        let f = fixture().await;
        f.store
            .insert_voter(NewVoter::with_code(f.election.id, OneTimeCode::example()))
            .await
            .unwrap();

        let clashing = vec![
            NewVoter::new(f.election.id),
            NewVoter::with_code(f.election.id, OneTimeCode::example()),
        ];
        let result = f.store.insert_voters(clashing).await;
        assert!(matches!(result, Err(Error::Duplicate(_))));

        let repeated = vec![
            NewVoter::with_code(f.election.id, OneTimeCode::example2()),
            NewVoter::with_code(f.election.id, OneTimeCode::example2()),
        ];
        let result = f.store.insert_voters(repeated).await;
        assert!(matches!(result, Err(Error::Duplicate(_))));
        assert_eq!(f.store.count_voters(None, None).await.unwrap(), 1);
    }

    #[rocket::async_test]
    async fn election_created_with_candidates() {
        let store = MemoryStore::new();
        let id = Id::new();
        let election = Election {
            id,
            election: ElectionCore::current_example(),
        };
        let (created, candidates) = store
            .create_election(
                election.clone(),
                vec![NewCandidate::example1(id), NewCandidate::example2(id)],
            )
            .await
            .unwrap();
        assert_eq!(created, election);
        assert_eq!(store.candidates(id).await.unwrap(), candidates);
    }

    #[rocket::async_test]
    async fn update_keeps_window_ordered() {
        let f = fixture().await;
        let update = ElectionUpdate {
            start_date: Some(f.election.end_date),
            ..ElectionUpdate::default()
        };
        let err = f
            .store
            .update_election(f.election.id, &update)
            .await
            .unwrap_err();
        assert_eq!(err.status(), Status::Conflict);
        assert_eq!(
            f.store.election(f.election.id).await.unwrap().unwrap(),
            f.election
        );
        assert!(f
            .store
            .update_election(Id::new(), &update)
            .await
            .unwrap()
            .is_none());
    }
}
