use mongodb::{
    bson::{doc, to_bson, Bson, Document},
    options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument},
    results::InsertManyResult,
    Client, Database,
};
use rocket::{futures::TryStreamExt, http::Status};

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
    mongodb::{is_duplicate_key_error, Coll, Id, MongoCollection},
};

use super::{Ballot, Store, VoteOutcome};

/// A [`Store`] backed by MongoDB.
///
/// Multi-document operations (election deletion, vote recording) run in
/// transactions, so the database must be a replica set.
#[derive(Clone)]
pub struct MongoStore {
    client: Client,
    db: Database,
}

impl MongoStore {
    pub fn new(client: Client, db: Database) -> Self {
        Self { client, db }
    }

    fn coll<T: MongoCollection>(&self) -> Coll<T> {
        Coll::from_db(&self.db)
    }
}

/// Extract the ID the database assigned to an inserted document.
fn inserted_id(id: &Bson) -> Result<Id> {
    id.as_object_id().map(Id::from).ok_or_else(|| {
        Error::Status(
            Status::InternalServerError,
            format!("Database returned a non-ObjectId ID: {id}"),
        )
    })
}

/// Pair each inserted document with the ID the database assigned it.
fn with_inserted_ids<T>(
    docs: Vec<T>,
    result: InsertManyResult,
) -> Result<impl Iterator<Item = (Id, T)>> {
    let ids = (0..docs.len())
        .map(|i| match result.inserted_ids.get(&i) {
            Some(id) => inserted_id(id),
            None => Err(Error::Status(
                Status::InternalServerError,
                format!("Database returned no ID for document {i}"),
            )),
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(ids.into_iter().zip(docs))
}

/// Map a duplicate key failure to [`Error::Duplicate`].
fn on_duplicate(what: &str) -> impl FnOnce(mongodb::error::Error) -> Error + '_ {
    move |err| {
        if is_duplicate_key_error(&err) {
            Error::Duplicate(what.to_string())
        } else {
            err.into()
        }
    }
}

fn return_updated() -> FindOneAndUpdateOptions {
    FindOneAndUpdateOptions::builder()
        .return_document(ReturnDocument::After)
        .build()
}

fn page(sort: Document, skip: u64, limit: u64) -> FindOptions {
    FindOptions::builder()
        .sort(sort)
        .skip(skip)
        .limit(i64::try_from(limit).unwrap_or(i64::MAX))
        .build()
}

fn sorted(sort: Document) -> FindOptions {
    FindOptions::builder().sort(sort).build()
}

#[rocket::async_trait]
impl Store for MongoStore {
    async fn elections(&self) -> Result<Vec<Election>> {
        let elections = self
            .coll::<Election>()
            .find(None, sorted(doc! { "created_at": -1 }))
            .await?
            .try_collect()
            .await?;
        Ok(elections)
    }

    async fn election(&self, id: Id) -> Result<Option<Election>> {
        Ok(self.coll::<Election>().find_one(id.as_doc(), None).await?)
    }

    async fn create_election(
        &self,
        election: Election,
        candidates: Vec<NewCandidate>,
    ) -> Result<(Election, Vec<Candidate>)> {
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;

        self.coll::<Election>()
            .insert_one_with_session(&election, None, &mut session)
            .await?;
        let candidates = if candidates.is_empty() {
            Vec::new()
        } else {
            let result = self
                .coll::<NewCandidate>()
                .insert_many_with_session(&candidates, None, &mut session)
                .await?;
            with_inserted_ids(candidates, result)?
                .map(|(id, candidate)| Candidate { id, candidate })
                .collect()
        };

        session.commit_transaction().await?;
        Ok((election, candidates))
    }

    async fn update_election(&self, id: Id, update: &ElectionUpdate) -> Result<Option<Election>> {
        if update.is_empty() {
            return self.election(id).await;
        }
        let mut filter = id.as_doc();
        if let Some(window) = update.window_filter() {
            filter.extend(window);
        }
        let updated = self
            .coll::<Election>()
            .find_one_and_update(filter, update.as_set_doc(), return_updated())
            .await?;
        // No match means either missing, or the dates would end up out of order.
        if updated.is_none() && self.election(id).await?.is_some() {
            return Err(Error::conflict("Election must start before it ends"));
        }
        Ok(updated)
    }

    async fn delete_election(&self, id: Id) -> Result<bool> {
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;

        let result = self
            .coll::<Election>()
            .delete_one_with_session(id.as_doc(), None, &mut session)
            .await?;
        if result.deleted_count == 0 {
            session.abort_transaction().await?;
            return Ok(false);
        }

        // Remove everything that belongs to the election.
        let filter = doc! { "election_id": id };
        self.coll::<Candidate>()
            .delete_many_with_session(filter.clone(), None, &mut session)
            .await?;
        self.coll::<Voter>()
            .delete_many_with_session(filter, None, &mut session)
            .await?;

        session.commit_transaction().await?;
        Ok(true)
    }

    async fn candidates(&self, election_id: Id) -> Result<Vec<Candidate>> {
        let candidates = self
            .coll::<Candidate>()
            .find(
                doc! { "election_id": election_id },
                sorted(doc! { "created_at": 1, "_id": 1 }),
            )
            .await?
            .try_collect()
            .await?;
        Ok(candidates)
    }

    async fn insert_candidate(&self, candidate: NewCandidate) -> Result<Candidate> {
        let result = self
            .coll::<NewCandidate>()
            .insert_one(&candidate, None)
            .await?;
        Ok(Candidate {
            id: inserted_id(&result.inserted_id)?,
            candidate,
        })
    }

    async fn update_candidate(
        &self,
        election_id: Id,
        id: Id,
        update: &CandidateUpdate,
    ) -> Result<Option<Candidate>> {
        let filter = doc! { "_id": id, "election_id": election_id };
        if update.is_empty() {
            return Ok(self.coll::<Candidate>().find_one(filter, None).await?);
        }
        Ok(self
            .coll::<Candidate>()
            .find_one_and_update(filter, update.as_update_doc(), return_updated())
            .await?)
    }

    async fn delete_candidate(&self, election_id: Id, id: Id) -> Result<bool> {
        let filter = doc! { "_id": id, "election_id": election_id };
        let result = self.coll::<Candidate>().delete_one(filter, None).await?;
        Ok(result.deleted_count == 1)
    }

    async fn voters(&self, election_id: Id, skip: u64, limit: u64) -> Result<Vec<Voter>> {
        let voters = self
            .coll::<Voter>()
            .find(
                doc! { "election_id": election_id },
                page(doc! { "created_at": 1, "_id": 1 }, skip, limit),
            )
            .await?
            .try_collect()
            .await?;
        Ok(voters)
    }

    async fn count_voters(&self, election_id: Option<Id>, has_voted: Option<bool>) -> Result<u64> {
        let mut filter = Document::new();
        if let Some(election_id) = election_id {
            filter.insert("election_id", election_id);
        }
        if let Some(has_voted) = has_voted {
            filter.insert("has_voted", has_voted);
        }
        Ok(self.coll::<Voter>().count_documents(filter, None).await?)
    }

    async fn voter(&self, id: Id) -> Result<Option<Voter>> {
        Ok(self.coll::<Voter>().find_one(id.as_doc(), None).await?)
    }

    async fn unused_voter_by_code(&self, code: &OneTimeCode) -> Result<Option<Voter>> {
        let filter = doc! {
            "one_time_code": code.as_str(),
            "has_voted": false,
        };
        Ok(self.coll::<Voter>().find_one(filter, None).await?)
    }

    async fn insert_voters(&self, voters: Vec<NewVoter>) -> Result<Vec<Voter>> {
        if voters.is_empty() {
            return Ok(Vec::new());
        }
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;

        let result = match self
            .coll::<NewVoter>()
            .insert_many_with_session(&voters, None, &mut session)
            .await
        {
            Ok(result) => result,
            Err(err) => {
                if let Err(e) = session.abort_transaction().await {
                    debug!("Abort after failed voter insert: {e}");
                }
                return Err(on_duplicate("one-time code")(err));
            }
        };

        session.commit_transaction().await?;
        Ok(with_inserted_ids(voters, result)?
            .map(|(id, voter)| Voter { id, voter })
            .collect())
    }

    async fn replace_voter_code(&self, id: Id, code: OneTimeCode) -> Result<Option<Voter>> {
        let filter = doc! { "_id": id, "has_voted": false };
        let update = doc! {
            "$set": {
                "one_time_code": code.as_str(),
                "shared": false,
            }
        };
        Ok(self
            .coll::<Voter>()
            .find_one_and_update(filter, update, return_updated())
            .await
            .map_err(on_duplicate("one-time code"))?)
    }

    async fn set_voter_shared(&self, id: Id, shared: bool) -> Result<Option<Voter>> {
        let update = doc! { "$set": { "shared": shared } };
        Ok(self
            .coll::<Voter>()
            .find_one_and_update(id.as_doc(), update, return_updated())
            .await?)
    }

    async fn delete_voter(&self, id: Id) -> Result<bool> {
        let result = self.coll::<Voter>().delete_one(id.as_doc(), None).await?;
        Ok(result.deleted_count == 1)
    }

    async fn record_vote(&self, ballot: &Ballot) -> Result<VoteOutcome> {
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;

        // Claim the voter first: losing a race here must never touch a tally.
        let claim = doc! {
            "_id": ballot.voter_id,
            "election_id": ballot.election_id,
            "has_voted": false,
        };
        let latch = doc! { "$set": { "has_voted": true } };
        let claimed = self
            .coll::<Voter>()
            .update_one_with_session(claim, latch, None, &mut session)
            .await?;
        if claimed.modified_count != 1 {
            session.abort_transaction().await?;
            return Ok(VoteOutcome::AlreadyVoted);
        }

        // The election filter is what stops cross-election ballots.
        let candidate = doc! {
            "_id": ballot.candidate_id,
            "election_id": ballot.election_id,
        };
        let increment = doc! { "$inc": { "vote_count": 1_i64 } };
        let counted = self
            .coll::<Candidate>()
            .update_one_with_session(candidate, increment, None, &mut session)
            .await?;
        if counted.matched_count != 1 {
            session.abort_transaction().await?;
            return Ok(VoteOutcome::UnknownCandidate);
        }

        session.commit_transaction().await?;
        Ok(VoteOutcome::Recorded)
    }

    async fn append_log(&self, entry: NewLogEntry) -> Result<()> {
        self.coll::<NewLogEntry>().insert_one(entry, None).await?;
        Ok(())
    }

    async fn logs(&self, skip: u64, limit: u64) -> Result<Vec<LogEntry>> {
        let logs = self
            .coll::<LogEntry>()
            .find(None, page(doc! { "timestamp": -1, "_id": -1 }, skip, limit))
            .await?
            .try_collect()
            .await?;
        Ok(logs)
    }

    async fn count_logs(&self) -> Result<u64> {
        Ok(self.coll::<LogEntry>().count_documents(None, None).await?)
    }

    async fn admins(&self) -> Result<Vec<Admin>> {
        let admins = self
            .coll::<Admin>()
            .find(None, sorted(doc! { "created_at": 1, "_id": 1 }))
            .await?
            .try_collect()
            .await?;
        Ok(admins)
    }

    async fn count_admins(&self) -> Result<u64> {
        Ok(self.coll::<Admin>().count_documents(None, None).await?)
    }

    async fn admin(&self, id: Id) -> Result<Option<Admin>> {
        Ok(self.coll::<Admin>().find_one(id.as_doc(), None).await?)
    }

    async fn admin_by_email(&self, email: &str) -> Result<Option<Admin>> {
        Ok(self
            .coll::<Admin>()
            .find_one(doc! { "email": email }, None)
            .await?)
    }

    async fn insert_admin(&self, admin: NewAdmin) -> Result<Admin> {
        let result = self
            .coll::<NewAdmin>()
            .insert_one(&admin, None)
            .await
            .map_err(on_duplicate("admin email"))?;
        Ok(Admin {
            id: inserted_id(&result.inserted_id)?,
            admin,
        })
    }

    async fn update_admin(
        &self,
        id: Id,
        role: Option<Role>,
        permissions: Option<Permissions>,
    ) -> Result<Option<Admin>> {
        let mut set = Document::new();
        if let Some(role) = role {
            set.insert("role", to_bson(&role)?);
        }
        if let Some(permissions) = permissions {
            set.insert("permissions", to_bson(&permissions)?);
        }
        if set.is_empty() {
            return self.admin(id).await;
        }
        Ok(self
            .coll::<Admin>()
            .find_one_and_update(id.as_doc(), doc! { "$set": set }, return_updated())
            .await?)
    }

    async fn set_admin_password(&self, id: Id, password_hash: String) -> Result<bool> {
        let update = doc! { "$set": { "password_hash": password_hash } };
        let result = self
            .coll::<Admin>()
            .update_one(id.as_doc(), update, None)
            .await?;
        Ok(result.matched_count == 1)
    }
}

/// These run against a real database: a fresh, uniquely named one per test,
/// on the replica set `db_uri` in `Rocket.toml` points at. Run them with
/// `cargo test -- --ignored`.
#[cfg(test)]
mod tests {
    use std::{future::Future, panic::AssertUnwindSafe};

    use rocket::futures::FutureExt;

    use super::*;

    use crate::model::{db::election::NewElection, mongodb::ensure_indexes_exist};

    async fn fresh_store() -> (MongoStore, Database) {
        let db_uri = rocket::Config::figment()
            .extract_inner::<String>("db_uri")
            .expect("`db_uri` not set");
        let client = Client::with_uri_str(&db_uri).await.unwrap();
        let db = client.database(&format!("votecode_test_{}", Id::new()));
        // Collections cannot be created inside a transaction on older servers.
        db.create_collection("elections", None).await.unwrap();
        ensure_indexes_exist(&db).await.unwrap();
        (MongoStore::new(client, db.clone()), db)
    }

    /// Run a test on a fresh database, dropping it afterwards even if the
    /// test panics.
    async fn with_store<F, Fut>(test: F)
    where
        F: FnOnce(MongoStore) -> Fut,
        Fut: Future<Output = ()>,
    {
        let (store, db) = fresh_store().await;
        let result = AssertUnwindSafe(test(store)).catch_unwind().await;
        db.drop(None).await.unwrap();
        if let Err(cause) = result {
            std::panic::resume_unwind(cause);
        }
    }

    async fn election_with_candidate(store: &MongoStore) -> (Election, Candidate) {
        let id = Id::new();
        let election = Election {
            id,
            election: NewElection::current_example(),
        };
        let (election, mut candidates) = store
            .create_election(election, vec![NewCandidate::example1(id)])
            .await
            .unwrap();
        (election, candidates.remove(0))
    }

    async fn tally(store: &MongoStore, election_id: Id) -> u64 {
        store.candidates(election_id).await.unwrap()[0].vote_count
    }

    #[rocket::async_test]
    #[ignore = "needs a MongoDB replica set"]
    async fn vote_outcomes() {
        with_store(|store| async move {
            let (election, candidate) = election_with_candidate(&store).await;
            let (other, foreign) = election_with_candidate(&store).await;
            let voter = store.insert_voter(NewVoter::new(election.id)).await.unwrap();

            let mut ballot = Ballot {
                election_id: election.id,
                candidate_id: foreign.id,
                voter_id: voter.id,
            };
            assert_eq!(
                store.record_vote(&ballot).await.unwrap(),
                VoteOutcome::UnknownCandidate
            );
            assert!(!store.voter(voter.id).await.unwrap().unwrap().has_voted);
            assert_eq!(tally(&store, other.id).await, 0);

            ballot.candidate_id = candidate.id;
            assert_eq!(
                store.record_vote(&ballot).await.unwrap(),
                VoteOutcome::Recorded
            );
            assert!(store.voter(voter.id).await.unwrap().unwrap().has_voted);
            assert_eq!(tally(&store, election.id).await, 1);

            assert_eq!(
                store.record_vote(&ballot).await.unwrap(),
                VoteOutcome::AlreadyVoted
            );
            assert_eq!(tally(&store, election.id).await, 1);
            assert!(store
                .unused_voter_by_code(&voter.one_time_code)
                .await
                .unwrap()
                .is_none());
        })
        .await;
    }

    #[rocket::async_test]
    #[ignore = "needs a MongoDB replica set"]
    async fn codes_are_unique() {
        with_store(|store| async move {
            let (election, _) = election_with_candidate(&store).await;
            let code = OneTimeCode::example();
            let first = store
                .insert_voter(NewVoter::with_code(election.id, code.clone()))
                .await
                .unwrap();

            let batch = vec![
                NewVoter::new(election.id),
                NewVoter::with_code(election.id, code.clone()),
            ];
            let result = store.insert_voters(batch).await;
            assert!(matches!(result, Err(Error::Duplicate(_))));
            assert_eq!(store.count_voters(None, None).await.unwrap(), 1);

            let second = store.insert_voter(NewVoter::new(election.id)).await.unwrap();
            let result = store.replace_voter_code(second.id, code).await;
            assert!(matches!(result, Err(Error::Duplicate(_))));

            let replaced = store
                .replace_voter_code(first.id, OneTimeCode::example2())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(replaced.one_time_code, OneTimeCode::example2());
        })
        .await;
    }

    #[rocket::async_test]
    #[ignore = "needs a MongoDB replica set"]
    async fn delete_cascades() {
        with_store(|store| async move {
            let (election, _) = election_with_candidate(&store).await;
            let (other, _) = election_with_candidate(&store).await;
            let batch = (0..3).map(|_| NewVoter::new(election.id)).collect();
            assert_eq!(store.insert_voters(batch).await.unwrap().len(), 3);
            store.insert_voter(NewVoter::new(other.id)).await.unwrap();

            assert!(store.delete_election(election.id).await.unwrap());
            assert!(store.election(election.id).await.unwrap().is_none());
            assert!(store.candidates(election.id).await.unwrap().is_empty());
            assert_eq!(store.count_voters(Some(election.id), None).await.unwrap(), 0);

            assert_eq!(store.candidates(other.id).await.unwrap().len(), 1);
            assert_eq!(store.count_voters(Some(other.id), None).await.unwrap(), 1);
            assert!(!store.delete_election(election.id).await.unwrap());
        })
        .await;
    }

    #[rocket::async_test]
    #[ignore = "needs a MongoDB replica set"]
    async fn election_update_keeps_window() {
        with_store(|store| async move {
            let (election, _) = election_with_candidate(&store).await;
            let backwards = ElectionUpdate {
                end_date: Some(election.start_date - chrono::Duration::hours(1)),
                ..ElectionUpdate::default()
            };
            let err = store
                .update_election(election.id, &backwards)
                .await
                .unwrap_err();
            assert_eq!(err.status(), Status::Conflict);
            let stored = store.election(election.id).await.unwrap().unwrap();
            assert_eq!(stored.end_date.timestamp(), election.end_date.timestamp());

            assert!(store
                .update_election(Id::new(), &backwards)
                .await
                .unwrap()
                .is_none());

            let renamed = ElectionUpdate {
                title: Some("Renamed".to_string()),
                is_active: Some(false),
                ..ElectionUpdate::default()
            };
            let updated = store
                .update_election(election.id, &renamed)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(updated.title, "Renamed");
            assert!(!updated.is_active);
        })
        .await;
    }

    #[rocket::async_test]
    #[ignore = "needs a MongoDB replica set"]
    async fn candidate_fields_can_be_cleared() {
        with_store(|store| async move {
            let (election, candidate) = election_with_candidate(&store).await;
            let update = CandidateUpdate {
                party: Some(None),
                ..CandidateUpdate::default()
            };
            let updated = store
                .update_candidate(election.id, candidate.id, &update)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(updated.party, None);
            assert_eq!(updated.biography, candidate.biography);

            // Scoped to the election.
            assert!(store
                .update_candidate(Id::new(), candidate.id, &update)
                .await
                .unwrap()
                .is_none());
        })
        .await;
    }

    #[rocket::async_test]
    #[ignore = "needs a MongoDB replica set"]
    async fn admin_emails_are_unique() {
        with_store(|store| async move {
            let admin = store.insert_admin(NewAdmin::example()).await.unwrap();
            let result = store.insert_admin(NewAdmin::example()).await;
            assert!(matches!(result, Err(Error::Duplicate(_))));

            let promoted = store
                .update_admin(admin.id, Some(Role::SuperAdmin), None)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(promoted.role, Role::SuperAdmin);
            assert_eq!(promoted.permissions, admin.permissions);
        })
        .await;
    }
}
