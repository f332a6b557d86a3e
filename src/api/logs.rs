use rocket::{serde::json::Json, Route};

use crate::{
    error::Result,
    model::{
        api::{
            auth::AuthToken,
            log::LogEntryDescription,
            pagination::{Paginated, Pagination},
        },
        common::role::Permission,
        db::admin::Admin,
        store::Store,
    },
};

pub fn routes() -> Vec<Route> {
    routes![get_logs]
}

/// The audit log, newest first.
#[get("/logs?<pagination..>")]
async fn get_logs(
    token: AuthToken<Admin>,
    pagination: Pagination,
    store: &dyn Store,
) -> Result<Json<Paginated<LogEntryDescription>>> {
    token.require(Permission::ViewLogs)?;
    let logs = store
        .logs(pagination.skip(), pagination.page_size())
        .await?;
    let total = store.count_logs().await?;
    let logs = logs.into_iter().map(Into::into).collect();
    Ok(Json(pagination.paginate(logs, total)))
}
