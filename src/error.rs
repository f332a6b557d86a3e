use argon2::Error as Argon2Error;
use jsonwebtoken::errors::Error as JwtError;
use mongodb::{bson::ser::Error as BsonSerError, error::Error as DbError};
use rocket::{
    http::Status,
    response::{self, status, Responder},
    serde::json::{serde_json::json, Json},
    Request,
};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    BsonSer(#[from] BsonSerError),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error(transparent)]
    Argon2(#[from] Argon2Error),
    /// A uniqueness constraint was violated on insert or update.
    #[error("Duplicate {0}")]
    Duplicate(String),
    #[error("{1}")]
    Status(Status, String),
}

impl Error {
    pub fn not_found(what: String) -> Self {
        Self::Status(Status::NotFound, format!("{what} not found"))
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::Status(Status::BadRequest, message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Status(Status::Forbidden, message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Status(Status::Conflict, message.into())
    }

    /// The single failure reported for every unusable one-time code, so the
    /// response never reveals whether a code exists or was already spent.
    pub fn invalid_code() -> Self {
        Self::Status(
            Status::Unauthorized,
            "Invalid or already used code".to_string(),
        )
    }

    pub fn invalid_credentials() -> Self {
        Self::Status(Status::Unauthorized, "Invalid email or password".to_string())
    }

    pub fn status(&self) -> Status {
        match self {
            Self::Db(_) | Self::BsonSer(_) | Self::Jwt(_) | Self::Argon2(_) => {
                Status::InternalServerError
            }
            Self::Duplicate(_) => Status::Conflict,
            Self::Status(status, _) => *status,
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let status = self.status();
        let message = if status.code >= 500 {
            // Internal details stay in the log.
            error!("{self}");
            "Internal server error".to_string()
        } else {
            debug!("{status}: {self}");
            self.to_string()
        };
        status::Custom(status, Json(json!({ "message": message }))).respond_to(req)
    }
}
