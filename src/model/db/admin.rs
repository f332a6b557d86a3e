use std::ops::{Deref, DerefMut};

use argon2::{Config as Argon2Config, Error as Argon2Error};
use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
    config::Config,
    error::Result,
    model::{
        common::role::{Permissions, Role},
        mongodb::Id,
        store::Store,
    },
};

/// Core admin user data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminCore {
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub role: Role,
    pub permissions: Permissions,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl AdminCore {
    /// Create a new admin, hashing the given plaintext password.
    /// Permissions start at the defaults for the role.
    pub fn new(email: String, name: String, password: &str, role: Role) -> Result<Self> {
        Ok(Self {
            email,
            name,
            password_hash: hash_password(password)?,
            role,
            permissions: Permissions::for_role(role),
            created_at: Utc::now(),
        })
    }

    /// Check whether the given password is correct.
    /// A malformed stored hash never verifies.
    pub fn verify_password<T: AsRef<[u8]>>(&self, password: T) -> bool {
        argon2::verify_encoded(&self.password_hash, password.as_ref()).unwrap_or(false)
    }
}

/// Hash a plaintext password with a fresh random salt.
pub fn hash_password(password: &str) -> std::result::Result<String, Argon2Error> {
    // 16 bytes is recommended for password hashing:
    //  https://en.wikipedia.org/wiki/Argon2
    let mut salt = [0_u8; 16];
    rand::thread_rng().fill(&mut salt);
    argon2::hash_encoded(password.as_bytes(), &salt, &Argon2Config::default())
}

/// An admin without an ID.
pub type NewAdmin = AdminCore;

/// An admin user from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Admin {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub admin: AdminCore,
}

impl Deref for Admin {
    type Target = AdminCore;

    fn deref(&self) -> &Self::Target {
        &self.admin
    }
}

impl DerefMut for Admin {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.admin
    }
}

/// Create the configured default super admin if there are no admins at all,
/// so a fresh deployment can be logged into.
pub async fn ensure_admin_exists(store: &dyn Store, config: &Config) -> Result<()> {
    if store.count_admins().await? > 0 {
        return Ok(());
    }
    // Logins look emails up in lowercase.
    let email = config.default_admin_email().trim().to_lowercase();
    warn!("No admins found, creating default super admin '{email}'; change its password!");
    let admin = NewAdmin::new(
        email,
        config.default_admin_name().to_string(),
        config.default_admin_password(),
        Role::SuperAdmin,
    )?;
    store.insert_admin(admin).await?;
    Ok(())
}


#[cfg(test)]
pub use examples::EXAMPLE_PASSWORD;
