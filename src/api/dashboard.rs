use chrono::Utc;
use rocket::{serde::json::Json, Route};

use crate::{
    error::Result,
    model::{
        api::{auth::AuthToken, election::DashboardSummary},
        db::admin::Admin,
        store::Store,
    },
};

pub fn routes() -> Vec<Route> {
    routes![get_dashboard]
}

#[get("/dashboard")]
async fn get_dashboard(
    _token: AuthToken<Admin>,
    store: &dyn Store,
) -> Result<Json<DashboardSummary>> {
    let now = Utc::now();
    let elections = store.elections().await?;
    let open_elections = elections.iter().filter(|e| e.is_open_at(now)).count() as u64;

    Ok(Json(DashboardSummary {
        elections: elections.len() as u64,
        open_elections,
        voters: store.count_voters(None, None).await?,
        voters_voted: store.count_voters(None, Some(true)).await?,
    }))
}
