use rocket::{
    http::{Cookie, CookieJar, Status},
    serde::json::Json,
    Route, State,
};

use crate::{
    audit,
    error::{Error, Result},
    model::{
        api::auth::{AuthToken, LoginRequest, SessionView, AUTH_TOKEN_COOKIE},
        common::action::Action,
        db::{admin::Admin, voter::Voter},
        store::Store,
    },
    voting, Config,
};

pub fn routes() -> Vec<Route> {
    routes![login, logout, session]
}

#[post("/auth/login", data = "<request>", format = "json")]
async fn login(
    request: Json<LoginRequest>,
    cookies: &CookieJar<'_>,
    store: &dyn Store,
    config: &State<Config>,
) -> Result<Json<SessionView>> {
    match request.into_inner() {
        LoginRequest::VoterCode { code } => {
            let voter = voting::redeem(store, &code).await?;
            let token = AuthToken::new(&voter);
            let view = SessionView::from(&token);
            cookies.add(token.into_cookie(config)?);
            info!("Voter {} redeemed a code for election {}", voter.id, voter.election_id);
            Ok(Json(view))
        }
        LoginRequest::AdminCredentials { email, password } => {
            let email = email.trim().to_lowercase();
            let admin = store
                .admin_by_email(&email)
                .await?
                .filter(|admin| admin.verify_password(&password))
                .ok_or_else(Error::invalid_credentials)?;

            let token = AuthToken::new(&admin);
            audit::record(store, &token, Action::Login, "Logged in").await;
            let view = SessionView::from(&token);
            cookies.add(token.into_cookie(config)?);
            Ok(Json(view))
        }
    }
}

#[delete("/auth/logout")]
async fn logout(
    admin: Option<AuthToken<Admin>>,
    cookies: &CookieJar<'_>,
    store: &dyn Store,
) -> Status {
    if let Some(admin) = admin {
        audit::record(store, &admin, Action::Logout, "Logged out").await;
    }
    cookies.remove(Cookie::named(AUTH_TOKEN_COOKIE));
    Status::Ok
}

#[get("/auth/session")]
fn session(
    admin: Option<AuthToken<Admin>>,
    voter: Option<AuthToken<Voter>>,
) -> Result<Json<SessionView>> {
    admin
        .as_ref()
        .map(SessionView::from)
        .or_else(|| voter.as_ref().map(SessionView::from))
        .map(Json)
        .ok_or_else(|| Error::Status(Status::Unauthorized, "Not logged in".to_string()))
}
