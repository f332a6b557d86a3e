use chrono::Utc;
use rocket::{serde::json::Json, Route};

use crate::{
    error::Result,
    model::{
        api::{
            auth::AuthToken,
            election::BoothElection,
            voter::{CastRequest, VoteReceipt},
        },
        db::voter::Voter,
        store::Store,
    },
    voting,
};

pub fn routes() -> Vec<Route> {
    routes![booth, vote]
}

#[get("/voter/election")]
async fn booth(voter: AuthToken<Voter>, store: &dyn Store) -> Result<Json<BoothElection>> {
    Ok(Json(voting::booth(store, &voter, Utc::now()).await?))
}

#[post("/voter/vote", data = "<ballot>", format = "json")]
async fn vote(
    voter: AuthToken<Voter>,
    ballot: Json<CastRequest>,
    store: &dyn Store,
) -> Result<Json<VoteReceipt>> {
    let receipt = voting::cast(store, &voter, *ballot.candidate_id, Utc::now()).await?;
    Ok(Json(receipt))
}
