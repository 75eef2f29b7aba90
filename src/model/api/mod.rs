//! API-compatible types.
//!
//! The types in this module are serialised in an API-friendly way, e.g.:
//!
//! - IDs are serialised as hex strings.
//! - Datetimes are serialised as RFC 3339 strings.
//!
//! Request types validate themselves on conversion into their DB counterparts.

pub mod admin;
pub mod auth;
pub mod id;
pub mod leader;
pub mod notification;
pub mod pagination;
pub mod poll;
pub mod target;
pub mod ticket;
pub mod user;
