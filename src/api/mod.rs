use rocket::{
    http::Status,
    response::status,
    serde::json::{serde_json::json, Json, Value},
    Catcher, Request, Route,
};

mod admins;
mod auth;
mod candidates;
mod dashboard;
mod elections;
mod logs;
mod voter;
mod voters;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(auth::routes());
    routes.extend(voter::routes());
    routes.extend(elections::routes());
    routes.extend(candidates::routes());
    routes.extend(voters::routes());
    routes.extend(logs::routes());
    routes.extend(admins::routes());
    routes.extend(dashboard::routes());
    routes
}

pub fn catchers() -> Vec<Catcher> {
    catchers![default_catcher]
}

/// Errors raised outside a handler (failed guards, unmatched routes) get
/// the same JSON shape as handler errors.
#[catch(default)]
fn default_catcher(status: Status, _req: &Request) -> status::Custom<Json<Value>> {
    let message = status.reason().unwrap_or("Unknown error");
    status::Custom(status, Json(json!({ "message": message })))
}
