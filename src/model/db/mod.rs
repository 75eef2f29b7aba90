//! DB-compatible (e.g. de/serialisable) types.
//!
//! The types in this module are serialised in an DB-friendly way, e.g.:
//!
//! - IDs and datetimes are serialised in MongoDB's own format.

pub mod admin;
pub mod leader;
pub mod notification;
pub mod poll;
pub mod rating;
pub mod response;
pub mod ticket;
pub mod user;
