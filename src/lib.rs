#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod scheduled_task;

use config::{ConfigFairing, DatabaseFairing};
use logging::LoggerFairing;
use model::db::poll::PollCloserFairing;

/// Build the server from `Rocket.toml` and `ROCKET_*` environment variables.
pub fn build() -> Rocket<Build> {
    assemble(rocket::build())
}

/// Mount the routes and attach the fairings.
/// Poll closers need the database, so their fairing comes last.
fn assemble(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket
        .mount("/", api::routes())
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .attach(DatabaseFairing)
        .attach(PollCloserFairing)
}

/// A client for the test database server named by `db_uri`.
#[cfg(test)]
async fn db_client() -> mongodb::Client {
    let db_uri = rocket::Config::figment()
        .extract_inner::<String>("db_uri")
        .expect("`db_uri` not set");
    mongodb::Client::with_uri_str(&db_uri)
        .await
        .expect("Could not connect to test database")
}

/// A fresh database name, so tests can run in parallel.
#[cfg(test)]
fn database() -> String {
    format!("test{}", rand::random::<u32>())
}

/// A server using the given database.
#[cfg(test)]
fn rocket_for_db(db_name: &str) -> Rocket<Build> {
    let figment = rocket::Config::figment().merge(("db_name", db_name));
    assemble(rocket::custom(figment))
}
