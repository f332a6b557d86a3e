use chrono::Duration;
use mongodb::Client as MongoClient;
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::model::{
    db::admin::ensure_admin_exists,
    mongodb::ensure_indexes_exist,
    store::{DynStore, MongoStore},
};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // non-secrets
    auth_ttl: u32,
    voter_batch_limit: u32,
    default_admin_email: String,
    default_admin_name: String,
    // secrets
    jwt_secret: String,
    default_admin_password: String,
}

impl Config {
    /// Valid lifetime of auth token cookies in seconds.
    pub fn auth_ttl(&self) -> Duration {
        Duration::seconds(self.auth_ttl.into())
    }

    /// The most voters a single generation request may create.
    pub fn voter_batch_limit(&self) -> u32 {
        self.voter_batch_limit
    }

    /// Secret key used to encrypt JWTs.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }

    /// Email of the super admin created on first launch.
    pub fn default_admin_email(&self) -> &str {
        &self.default_admin_email
    }

    pub fn default_admin_name(&self) -> &str {
        &self.default_admin_name
    }

    /// Initial password of the super admin created on first launch.
    pub fn default_admin_password(&self) -> &str {
        &self.default_admin_password
    }
}

#[cfg(test)]
impl Config {
    pub fn example() -> Self {
        Self {
            auth_ttl: 3600,
            voter_batch_limit: 100,
            default_admin_email: "root@example.com".to_string(),
            default_admin_name: "Root".to_string(),
            jwt_secret: "test-secret-that-is-long-enough".to_string(),
            default_admin_password: "change me please".to_string(),
        }
    }

    pub fn with_jwt_secret(secret: &str) -> Self {
        Self {
            jwt_secret: secret.to_string(),
            ..Self::example()
        }
    }

    pub fn with_default_admin_email(email: &str) -> Self {
        Self {
            default_admin_email: email.to_string(),
            ..Self::example()
        }
    }
}

/// A fairing that loads the application config and puts it in managed state.
/// This could easily be achieved using `AdHoc::config`, but is written out
/// explicitly for symmetry with the other fairings and control over error
/// messages.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// Configuration for the database.
#[derive(Deserialize)]
struct DbConfig {
    db_name: Option<String>,
    // secrets
    db_uri: String,
}

const DEFAULT_DB_NAME: &str = "votecode";

/// A fairing that loads the MongoDB config, connects to the database,
/// performs any setup necessary, and places a [`DynStore`] into managed
/// state.
///
/// Must be attached after [`ConfigFairing`].
pub struct DatabaseFairing;

#[rocket::async_trait]
impl Fairing for DatabaseFairing {
    fn info(&self) -> Info {
        Info {
            name: "MongoDB",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let db_config = match rocket.figment().extract::<DbConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load database config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        info!("Loaded database config, connecting...");
        let client = match MongoClient::with_uri_str(&db_config.db_uri).await {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to connect to database: {e}");
                return Err(rocket);
            }
        };
        let db_name = db_config.db_name.as_deref().unwrap_or(DEFAULT_DB_NAME);
        let db = client.database(db_name);

        if let Err(e) = ensure_indexes_exist(&db).await {
            error!("Failed to create database indexes: {e}");
            return Err(rocket);
        }

        let store = MongoStore::new(client, db);

        // Ensure there is at least one admin user.
        let Some(config) = rocket.state::<Config>() else {
            error!("Application config must be loaded before the database");
            return Err(rocket);
        };
        let seeded = ensure_admin_exists(&store, config).await;
        if let Err(e) = seeded {
            error!("Failed to create default admin: {e}");
            return Err(rocket);
        }
        info!("...database connection online, using '{db_name}'");

        let store: DynStore = std::sync::Arc::new(store);
        rocket = rocket.manage(store);
        Ok(rocket)
    }
}
