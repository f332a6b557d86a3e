use std::collections::HashSet;

use chrono::Utc;
use rocket::{serde::json::Json, Route, State};

use crate::{
    audit,
    error::{Error, Result},
    model::{
        api::{
            auth::AuthToken,
            pagination::{Paginated, Pagination},
            voter::{GenerateRequest, SharedRequest, VoterDescription, VoterExport},
        },
        common::{action::Action, code::OneTimeCode, role::Permission},
        db::{
            admin::Admin,
            voter::{NewVoter, Voter},
        },
        mongodb::Id,
        store::Store,
    },
    Config,
};

use super::elections::find_election;

/// How many times to draw fresh codes before giving up.
const CODE_ATTEMPTS: usize = 10;

pub fn routes() -> Vec<Route> {
    routes![
        get_voters,
        generate_voters,
        regenerate_code,
        set_shared,
        delete_voter,
        export_voters,
    ]
}

async fn find_voter(store: &dyn Store, id: Id) -> Result<Voter> {
    store
        .voter(id)
        .await?
        .ok_or_else(|| Error::not_found(format!("Voter {id}")))
}

/// Insert `count` fresh voters in one batch, drawing a new set of codes
/// whenever one collides.
async fn insert_with_fresh_codes(
    store: &dyn Store,
    election_id: Id,
    count: u32,
) -> Result<Vec<Voter>> {
    for _ in 0..CODE_ATTEMPTS {
        let mut codes = HashSet::new();
        while codes.len() < count as usize {
            codes.insert(OneTimeCode::random());
        }
        let voters = codes
            .into_iter()
            .map(|code| NewVoter::with_code(election_id, code))
            .collect();
        match store.insert_voters(voters).await {
            Err(Error::Duplicate(_)) => debug!("Code collision, retrying batch"),
            result => return result,
        }
    }
    Err(Error::conflict("Could not find enough unused codes"))
}

#[get("/elections/<election_id>/voters?<pagination..>")]
async fn get_voters(
    token: AuthToken<Admin>,
    election_id: Id,
    pagination: Pagination,
    store: &dyn Store,
) -> Result<Json<Paginated<VoterDescription>>> {
    token.require(Permission::ManageVoters)?;
    find_election(store, election_id).await?;

    let voters = store
        .voters(election_id, pagination.skip(), pagination.page_size())
        .await?;
    let total = store.count_voters(Some(election_id), None).await?;
    let voters = voters.into_iter().map(Into::into).collect();
    Ok(Json(pagination.paginate(voters, total)))
}

#[post("/elections/<election_id>/voters", data = "<request>", format = "json")]
async fn generate_voters(
    token: AuthToken<Admin>,
    election_id: Id,
    request: Json<GenerateRequest>,
    store: &dyn Store,
    config: &State<Config>,
) -> Result<Json<Vec<VoterDescription>>> {
    token.require(Permission::ManageVoters)?;
    let limit = config.voter_batch_limit();
    if request.count == 0 || request.count > limit {
        return Err(Error::bad_request(format!(
            "Can generate between 1 and {limit} voters at once"
        )));
    }
    let election = find_election(store, election_id).await?;

    let voters = insert_with_fresh_codes(store, election_id, request.count)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

    audit::record(
        store,
        &token,
        Action::GenerateCodes,
        format!(
            "Generated {} codes for election '{}'",
            request.count, election.title
        ),
    )
    .await;
    Ok(Json(voters))
}

#[post("/voters/<id>/code")]
async fn regenerate_code(
    token: AuthToken<Admin>,
    id: Id,
    store: &dyn Store,
) -> Result<Json<VoterDescription>> {
    token.require(Permission::ManageVoters)?;
    let voter = find_voter(store, id).await?;
    if voter.has_voted {
        return Err(Error::conflict("Cannot replace the code of a voter who has voted"));
    }

    let mut replaced = None;
    for _ in 0..CODE_ATTEMPTS {
        match store.replace_voter_code(id, OneTimeCode::random()).await {
            Err(Error::Duplicate(_)) => debug!("Code collision, retrying"),
            result => {
                replaced = Some(result?);
                break;
            }
        }
    }
    let voter = match replaced {
        Some(Some(voter)) => voter,
        // Voted or deleted since we looked.
        Some(None) => return Err(Error::conflict("Voter can no longer be changed")),
        None => return Err(Error::conflict("Could not find an unused code")),
    };

    audit::record(
        store,
        &token,
        Action::RegenerateCode,
        format!("Regenerated code for voter {id}"),
    )
    .await;
    Ok(Json(voter.into()))
}

#[put("/voters/<id>/shared", data = "<request>", format = "json")]
async fn set_shared(
    token: AuthToken<Admin>,
    id: Id,
    request: Json<SharedRequest>,
    store: &dyn Store,
) -> Result<Json<VoterDescription>> {
    token.require(Permission::ManageVoters)?;
    let voter = store
        .set_voter_shared(id, request.shared)
        .await?
        .ok_or_else(|| Error::not_found(format!("Voter {id}")))?;

    audit::record(
        store,
        &token,
        Action::ToggleShared,
        format!("Marked voter {id} as shared: {}", request.shared),
    )
    .await;
    Ok(Json(voter.into()))
}

#[delete("/voters/<id>")]
async fn delete_voter(token: AuthToken<Admin>, id: Id, store: &dyn Store) -> Result<()> {
    token.require(Permission::ManageVoters)?;
    if !store.delete_voter(id).await? {
        return Err(Error::not_found(format!("Voter {id}")));
    }

    audit::record(
        store,
        &token,
        Action::DeleteVoter,
        format!("Deleted voter {id}"),
    )
    .await;
    Ok(())
}

#[get("/elections/<election_id>/voters/export")]
async fn export_voters(
    token: AuthToken<Admin>,
    election_id: Id,
    store: &dyn Store,
) -> Result<Json<VoterExport>> {
    token.require(Permission::ManageVoters)?;
    let election = find_election(store, election_id).await?;
    let voters = store.voters(election_id, 0, u64::MAX).await?;

    audit::record(
        store,
        &token,
        Action::ExportVoters,
        format!(
            "Exported {} codes for election '{}'",
            voters.len(),
            election.title
        ),
    )
    .await;
    Ok(Json(VoterExport {
        election_id: election.id.into(),
        election_title: election.election.title,
        exported_at: Utc::now(),
        codes: voters.into_iter().map(Into::into).collect(),
    }))
}
