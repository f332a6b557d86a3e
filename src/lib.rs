#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

pub mod api;
pub mod audit;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod voting;

pub use config::Config;

use config::{ConfigFairing, DatabaseFairing};
use logging::LoggerFairing;

/// Build the server: load config, connect to MongoDB and mount the API.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .attach(DatabaseFairing)
        .mount("/", api::routes())
        .register("/", api::catchers())
}

/// Build a server over the given store and config, skipping the config and
/// database fairings.
#[cfg(test)]
pub(crate) fn rocket_for_store(store: model::store::DynStore, config: Config) -> Rocket<Build> {
    rocket::build()
        .attach(LoggerFairing)
        .manage(store)
        .manage(config)
        .mount("/", api::routes())
        .register("/", api::catchers())
}
