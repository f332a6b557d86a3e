use rocket::{serde::json::Json, Route};

use crate::{
    audit,
    error::{Error, Result},
    model::{
        api::{
            auth::AuthToken,
            election::{CandidateDescription, CandidatePatch, CandidateSpec},
        },
        common::{action::Action, role::Permission},
        db::admin::Admin,
        mongodb::Id,
        store::Store,
    },
};

use super::elections::find_election;

pub fn routes() -> Vec<Route> {
    routes![add_candidate, update_candidate, delete_candidate]
}

fn candidate_not_found(election_id: Id, id: Id) -> Error {
    Error::not_found(format!("Candidate {id} in election {election_id}"))
}

#[post("/elections/<election_id>/candidates", data = "<spec>", format = "json")]
async fn add_candidate(
    token: AuthToken<Admin>,
    election_id: Id,
    spec: Json<CandidateSpec>,
    store: &dyn Store,
) -> Result<Json<CandidateDescription>> {
    token.require(Permission::EditElections)?;
    spec.validate()?;
    let election = find_election(store, election_id).await?;

    let candidate = store
        .insert_candidate(spec.into_inner().into_candidate(election_id))
        .await?;

    audit::record(
        store,
        &token,
        Action::AddCandidate,
        format!(
            "Added candidate '{}' to election '{}'",
            candidate.name, election.title
        ),
    )
    .await;
    Ok(Json(candidate.into()))
}

#[put(
    "/elections/<election_id>/candidates/<id>",
    data = "<patch>",
    format = "json"
)]
async fn update_candidate(
    token: AuthToken<Admin>,
    election_id: Id,
    id: Id,
    patch: Json<CandidatePatch>,
    store: &dyn Store,
) -> Result<Json<CandidateDescription>> {
    token.require(Permission::EditElections)?;
    let update = patch.into_inner().validate()?;

    let candidate = store
        .update_candidate(election_id, id, &update)
        .await?
        .ok_or_else(|| candidate_not_found(election_id, id))?;

    audit::record(
        store,
        &token,
        Action::UpdateCandidate,
        format!("Updated candidate '{}' ({id})", candidate.name),
    )
    .await;
    Ok(Json(candidate.into()))
}

#[delete("/elections/<election_id>/candidates/<id>")]
async fn delete_candidate(
    token: AuthToken<Admin>,
    election_id: Id,
    id: Id,
    store: &dyn Store,
) -> Result<()> {
    token.require(Permission::EditElections)?;
    if !store.delete_candidate(election_id, id).await? {
        return Err(candidate_not_found(election_id, id));
    }

    audit::record(
        store,
        &token,
        Action::DeleteCandidate,
        format!("Deleted candidate {id} from election {election_id}"),
    )
    .await;
    Ok(())
}
