use chrono::Utc;
use rocket::{serde::json::Json, Route};

use crate::{
    audit,
    error::{Error, Result},
    model::{
        api::{
            auth::AuthToken,
            election::{ElectionDescription, ElectionPatch, ElectionResults, ElectionSpec},
        },
        common::{action::Action, role::Permission},
        db::{
            admin::Admin,
            election::{Election, ElectionUpdate},
        },
        mongodb::Id,
        store::Store,
    },
};

pub fn routes() -> Vec<Route> {
    routes![
        get_elections,
        get_election,
        create_election,
        update_election,
        reactivate_election,
        delete_election,
        get_results,
    ]
}

/// Load an election or fail with `404`.
pub(super) async fn find_election(store: &dyn Store, id: Id) -> Result<Election> {
    store
        .election(id)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election {id}")))
}

async fn describe(store: &dyn Store, election: Election) -> Result<ElectionDescription> {
    let candidates = store.candidates(election.id).await?;
    Ok(ElectionDescription::new(election, candidates, Utc::now()))
}

#[get("/elections")]
async fn get_elections(
    _token: AuthToken<Admin>,
    store: &dyn Store,
) -> Result<Json<Vec<ElectionDescription>>> {
    let mut descriptions = Vec::new();
    for election in store.elections().await? {
        descriptions.push(describe(store, election).await?);
    }
    Ok(Json(descriptions))
}

#[get("/elections/<id>")]
async fn get_election(
    _token: AuthToken<Admin>,
    id: Id,
    store: &dyn Store,
) -> Result<Json<ElectionDescription>> {
    let election = find_election(store, id).await?;
    Ok(Json(describe(store, election).await?))
}

#[post("/elections", data = "<spec>", format = "json")]
async fn create_election(
    token: AuthToken<Admin>,
    spec: Json<ElectionSpec>,
    store: &dyn Store,
) -> Result<Json<ElectionDescription>> {
    token.require(Permission::CreateElections)?;
    let (election, candidate_specs) = spec.into_inner().validate()?;

    let election = Election {
        id: Id::new(),
        election,
    };
    let candidates = candidate_specs
        .into_iter()
        .map(|candidate| candidate.into_candidate(election.id))
        .collect();
    let (election, candidates) = store.create_election(election, candidates).await?;

    audit::record(
        store,
        &token,
        Action::CreateElection,
        format!(
            "Created election '{}' ({}) with {} candidates",
            election.title,
            election.id,
            candidates.len()
        ),
    )
    .await;
    Ok(Json(ElectionDescription::new(election, candidates, Utc::now())))
}

#[put("/elections/<id>", data = "<patch>", format = "json")]
async fn update_election(
    token: AuthToken<Admin>,
    id: Id,
    patch: Json<ElectionPatch>,
    store: &dyn Store,
) -> Result<Json<ElectionDescription>> {
    token.require(Permission::EditElections)?;
    let current = find_election(store, id).await?;
    let update = patch.into_inner().validate(&current)?;

    let election = store
        .update_election(id, &update)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election {id}")))?;

    audit::record(
        store,
        &token,
        Action::UpdateElection,
        format!("Updated election '{}' ({id})", election.title),
    )
    .await;
    Ok(Json(describe(store, election).await?))
}

#[post("/elections/<id>/reactivate")]
async fn reactivate_election(
    token: AuthToken<Admin>,
    id: Id,
    store: &dyn Store,
) -> Result<Json<ElectionDescription>> {
    token.require(Permission::EditElections)?;
    let election = store
        .update_election(id, &ElectionUpdate::reactivate())
        .await?
        .ok_or_else(|| Error::not_found(format!("Election {id}")))?;

    audit::record(
        store,
        &token,
        Action::ReactivateElection,
        format!("Reactivated election '{}' ({id})", election.title),
    )
    .await;
    Ok(Json(describe(store, election).await?))
}

#[delete("/elections/<id>")]
async fn delete_election(token: AuthToken<Admin>, id: Id, store: &dyn Store) -> Result<()> {
    token.require(Permission::DeleteElections)?;
    let election = find_election(store, id).await?;

    if !store.delete_election(id).await? {
        return Err(Error::not_found(format!("Election {id}")));
    }

    audit::record(
        store,
        &token,
        Action::DeleteElection,
        format!("Deleted election '{}' ({id})", election.title),
    )
    .await;
    Ok(())
}

#[get("/elections/<id>/results")]
async fn get_results(
    _token: AuthToken<Admin>,
    id: Id,
    store: &dyn Store,
) -> Result<Json<ElectionResults>> {
    let election = find_election(store, id).await?;
    let candidates = store.candidates(id).await?;
    let issued = store.count_voters(Some(id), None).await?;
    let voted = store.count_voters(Some(id), Some(true)).await?;
    Ok(Json(ElectionResults::new(election, candidates, issued, voted)))
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::Client,
        serde::json::serde_json::json,
    };

    use crate::model::{
        db::{
            candidate::NewCandidate,
            election::NewElection,
            voter::NewVoter,
        },
        store::{Ballot, MemoryStore},
    };

    use super::*;

    #[backend_test(admin)]
    async fn create_and_get(client: Client, store: MemoryStore) {
        let response = client
            .post(uri!(create_election))
            .header(ContentType::JSON)
            .body(json!(ElectionSpec::example()).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let created = response.into_json::<ElectionDescription>().await.unwrap();
        assert_eq!(created.title, "Student Council 2026");
        assert!(created.is_open);
        assert_eq!(created.candidates.len(), 2);
        assert!(created.candidates.iter().all(|c| c.vote_count == 0));

        let response = client
            .get(uri!(get_election(*created.id)))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        assert_eq!(
            response.into_json::<ElectionDescription>().await.unwrap(),
            created
        );

        let response = client.get(uri!(get_elections)).dispatch().await;
        let all = response.into_json::<Vec<ElectionDescription>>().await.unwrap();
        assert_eq!(all, vec![created]);

        let logs = store.logs(0, 1).await.unwrap();
        assert_eq!(logs[0].action, Action::CreateElection);
    }

    #[backend_test(admin)]
    async fn create_rejects_backwards_dates(client: Client, store: MemoryStore) {
        let spec = ElectionSpec::example();
        let response = client
            .post(uri!(create_election))
            .header(ContentType::JSON)
            .body(
                json!(ElectionSpec {
                    start_date: spec.end_date,
                    end_date: spec.start_date,
                    ..spec
                })
                .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());
        assert!(store.elections().await.unwrap().is_empty());
    }

    #[backend_test(admin)]
    async fn update_and_reactivate(client: Client, store: MemoryStore) {
        let election = store
            .insert_election(NewElection::inactive_example())
            .await
            .unwrap();

        let response = client
            .put(uri!(update_election(election.id)))
            .header(ContentType::JSON)
            .body(json!({ "title": "Budget Referendum (revised)" }).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let updated = response.into_json::<ElectionDescription>().await.unwrap();
        assert_eq!(updated.title, "Budget Referendum (revised)");
        assert!(!updated.is_active);

        let response = client
            .post(uri!(reactivate_election(election.id)))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let reactivated = response.into_json::<ElectionDescription>().await.unwrap();
        assert!(reactivated.is_active);
        assert!(reactivated.is_open);

        let response = client
            .put(uri!(update_election(election.id)))
            .header(ContentType::JSON)
            .body(json!({ "end_date": election.start_date }).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());

        let actions: Vec<_> = store
            .logs(0, 10)
            .await
            .unwrap()
            .into_iter()
            .map(|log| log.action)
            .collect();
        assert_eq!(
            actions,
            [
                Action::ReactivateElection,
                Action::UpdateElection,
                Action::Login
            ]
        );
    }

    #[backend_test(admin)]
    async fn plain_admin_cannot_delete(client: Client, store: MemoryStore) {
        let election = store
            .insert_election(NewElection::current_example())
            .await
            .unwrap();

        let response = client
            .delete(uri!(delete_election(election.id)))
            .dispatch()
            .await;
        assert_eq!(Status::Forbidden, response.status());
        assert!(store.election(election.id).await.unwrap().is_some());
    }

    #[backend_test(super_admin)]
    async fn delete_cascades(client: Client, store: MemoryStore) {
        let election = store
            .insert_election(NewElection::current_example())
            .await
            .unwrap();
        store
            .insert_candidate(NewCandidate::example1(election.id))
            .await
            .unwrap();
        store.insert_voter(NewVoter::new(election.id)).await.unwrap();

        let response = client
            .delete(uri!(delete_election(election.id)))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        assert!(store.election(election.id).await.unwrap().is_none());
        assert!(store.candidates(election.id).await.unwrap().is_empty());
        assert_eq!(store.count_voters(Some(election.id), None).await.unwrap(), 0);

        let response = client
            .delete(uri!(delete_election(election.id)))
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());
    }

    #[backend_test(admin)]
    async fn results_count_votes(client: Client, store: MemoryStore) {
        let election = store
            .insert_election(NewElection::current_example())
            .await
            .unwrap();
        let c1 = store
            .insert_candidate(NewCandidate::example1(election.id))
            .await
            .unwrap();
        let c2 = store
            .insert_candidate(NewCandidate::example2(election.id))
            .await
            .unwrap();
        for candidate in [c2.id, c2.id, c1.id] {
            let voter = store.insert_voter(NewVoter::new(election.id)).await.unwrap();
            store
                .record_vote(&Ballot {
                    election_id: election.id,
                    candidate_id: candidate,
                    voter_id: voter.id,
                })
                .await
                .unwrap();
        }
        store.insert_voter(NewVoter::new(election.id)).await.unwrap();

        let response = client.get(uri!(get_results(election.id))).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let results = response.into_json::<ElectionResults>().await.unwrap();
        assert_eq!(results.total_votes, 3);
        assert_eq!(results.voters_issued, 4);
        assert_eq!(results.voters_voted, 3);
        assert_eq!(*results.candidates[0].id, c2.id);
        assert_eq!(results.candidates[0].vote_count, 2);
    }

    #[backend_test]
    async fn requires_admin_session(client: Client) {
        let response = client.get(uri!(get_elections)).dispatch().await;
        assert_eq!(Status::Unauthorized, response.status());
    }
}
