use std::marker::PhantomData;

use chrono::{serde::ts_seconds, DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, TokenData, Validation};
use rocket::{
    http::{Cookie, SameSite, Status},
    outcome::try_outcome,
    request::{FromRequest, Outcome},
    time::Duration,
    Request, State,
};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{
    common::role::{Permission, Permissions, Role},
    db::{admin::Admin, voter::Voter},
    mongodb::Id,
    store::Store,
};

use super::id::ApiId;

pub const AUTH_TOKEN_COOKIE: &str = "auth_token";

/// The body of `POST /auth/login`. Each kind of login is explicit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LoginRequest {
    /// Redeem a voter's one-time code.
    VoterCode { code: String },
    AdminCredentials { email: String, password: String },
}

#[cfg(test)]
impl LoginRequest {
    pub fn voter(code: &crate::model::common::code::OneTimeCode) -> Self {
        Self::VoterCode {
            code: code.to_string(),
        }
    }

    pub fn admin(email: &str, password: &str) -> Self {
        Self::AdminCredentials {
            email: email.to_string(),
            password: password.to_string(),
        }
    }
}

/// A user of our application that can hold a session.
#[rocket::async_trait]
pub trait User: Sized + Send {
    /// May a session with the given role act as this user type?
    fn accepts(role: Role) -> bool;

    /// Load the user behind a session, if it still exists.
    async fn load(store: &dyn Store, id: Id) -> Result<Option<Self>>;

    fn id(&self) -> Id;
    fn role(&self) -> Role;
    fn name(&self) -> String;
    fn permissions(&self) -> Permissions;

    /// The election a session is bound to, if any.
    fn election_id(&self) -> Option<Id> {
        None
    }
}

#[rocket::async_trait]
impl User for Voter {
    fn accepts(role: Role) -> bool {
        role == Role::Voter
    }

    async fn load(store: &dyn Store, id: Id) -> Result<Option<Self>> {
        store.voter(id).await
    }

    fn id(&self) -> Id {
        self.id
    }

    fn role(&self) -> Role {
        Role::Voter
    }

    fn name(&self) -> String {
        String::new()
    }

    fn permissions(&self) -> Permissions {
        Permissions::for_role(Role::Voter)
    }

    fn election_id(&self) -> Option<Id> {
        Some(self.election_id)
    }
}

#[rocket::async_trait]
impl User for Admin {
    fn accepts(role: Role) -> bool {
        role.is_admin()
    }

    async fn load(store: &dyn Store, id: Id) -> Result<Option<Self>> {
        store.admin(id).await
    }

    fn id(&self) -> Id {
        self.id
    }

    fn role(&self) -> Role {
        self.role
    }

    fn name(&self) -> String {
        self.admin.name.clone()
    }

    fn permissions(&self) -> Permissions {
        self.admin.permissions
    }
}

/// An authentication token representing a specific user with a specific role.
///
/// Only the identifying fields travel in the cookie. The name and
/// permissions are re-read from the store whenever the token is used as a
/// request guard, so revoked permissions take effect immediately.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthToken<U> {
    pub id: Id,
    #[serde(rename = "rol")]
    pub role: Role,
    #[serde(rename = "eid", default, skip_serializing_if = "Option::is_none")]
    pub election_id: Option<Id>,
    #[serde(skip)]
    pub name: String,
    #[serde(skip)]
    pub permissions: Permissions,
    #[serde(skip)]
    phantom: PhantomData<U>,
}

impl<U> AuthToken<U> {
    /// Fail with `403` unless this session holds the given permission.
    pub fn require(&self, permission: Permission) -> Result<()> {
        if self.permissions.allows(permission) {
            Ok(())
        } else {
            Err(Error::forbidden(format!("Missing permission {permission}")))
        }
    }
}

impl<U> AuthToken<U>
where
    U: User,
{
    /// Create a new [`AuthToken`] describing the given user as it is now.
    pub fn new(user: &U) -> Self {
        Self {
            id: user.id(),
            role: user.role(),
            election_id: user.election_id(),
            name: user.name(),
            permissions: user.permissions(),
            phantom: PhantomData,
        }
    }

    /// Serialize this token into a cookie.
    pub fn into_cookie(self, config: &Config) -> Result<Cookie<'static>> {
        let claims = Claims {
            token: self,
            expire_at: Utc::now() + config.auth_ttl(),
        };

        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret()),
        )?;

        Ok(Cookie::build(AUTH_TOKEN_COOKIE, token)
            .max_age(Duration::seconds(config.auth_ttl().num_seconds()))
            .http_only(true)
            .same_site(SameSite::Strict)
            .finish())
    }

    /// Deserialize a token from a cookie. Expired tokens are rejected.
    pub fn from_cookie(cookie: &Cookie<'static>, config: &Config) -> Result<Self> {
        let token = jsonwebtoken::decode(
            cookie.value(),
            &DecodingKey::from_secret(config.jwt_secret()),
            &Validation::default(),
        )
        .map(|claims: TokenData<Claims<U>>| claims.claims.token)?;
        Ok(token)
    }
}

/// Cookie claims: the token itself plus an expiry datetime.
#[derive(Serialize, Deserialize)]
struct Claims<U> {
    #[serde(flatten, bound = "")]
    token: AuthToken<U>,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

fn unauthorized<T>(message: &str) -> Outcome<T, Error> {
    Outcome::Failure((
        Status::Unauthorized,
        Error::Status(Status::Unauthorized, message.to_string()),
    ))
}

#[rocket::async_trait]
impl<'r, U> FromRequest<'r> for AuthToken<U>
where
    U: User,
{
    type Error = Error;

    /// Get an [`AuthToken`] from the cookie, check that its role fits this
    /// user type, and refresh it from the user's current row.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let config = try_outcome!(req.guard::<&State<Config>>().await.map_failure(|(s, _)| {
            (s, Error::Status(s, "Application config is not loaded".to_string()))
        }));
        let store = try_outcome!(req.guard::<&dyn Store>().await.map_failure(|(s, _)| {
            (s, Error::Status(s, "Store is not connected".to_string()))
        }));

        let Some(cookie) = req.cookies().get(AUTH_TOKEN_COOKIE) else {
            return unauthorized("Not logged in");
        };
        let token = match Self::from_cookie(cookie, config) {
            Ok(token) => token,
            Err(e) => {
                debug!("Rejected auth token: {e}");
                return unauthorized("Session is invalid or has expired");
            }
        };

        if !U::accepts(token.role) {
            return Outcome::Failure((
                Status::Forbidden,
                Error::forbidden(format!("Not available to role {}", token.role)),
            ));
        }

        match U::load(store, token.id).await {
            Ok(Some(user)) if U::accepts(user.role()) => Outcome::Success(Self::new(&user)),
            Ok(Some(_)) => Outcome::Failure((
                Status::Forbidden,
                Error::forbidden("Role has changed since login"),
            )),
            Ok(None) => unauthorized("Session user no longer exists"),
            Err(e) => Outcome::Failure((e.status(), e)),
        }
    }
}

/// A description of the current session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionView {
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voter_id: Option<ApiId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub election_id: Option<ApiId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_id: Option<ApiId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Permissions>,
}

impl<U> From<&AuthToken<U>> for SessionView {
    fn from(token: &AuthToken<U>) -> Self {
        if token.role.is_admin() {
            Self {
                role: token.role,
                voter_id: None,
                election_id: None,
                admin_id: Some(token.id.into()),
                name: Some(token.name.clone()),
                permissions: Some(token.permissions),
            }
        } else {
            Self {
                role: token.role,
                voter_id: Some(token.id.into()),
                election_id: token.election_id.map(ApiId::from),
                admin_id: None,
                name: None,
                permissions: None,
            }
        }
    }
}
