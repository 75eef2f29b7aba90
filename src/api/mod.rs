use rocket::Route;

mod admin;
pub mod auth;
mod common;
mod leaders;
mod notifications;
mod polls;
mod profile;
mod tickets;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(admin::routes());
    routes.extend(auth::routes());
    routes.extend(profile::routes());
    routes.extend(leaders::routes());
    routes.extend(polls::routes());
    routes.extend(notifications::routes());
    routes.extend(tickets::routes());
    routes
}
