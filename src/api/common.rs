use chrono::{DateTime, Utc};
use mongodb::{
    bson::{doc, DateTime as BsonDateTime, Document},
    results::InsertOneResult,
};
use rocket::http::Status;

use crate::error::{Error, Result};
use crate::model::{
    api::auth::AuthToken,
    db::{poll::Poll, user::User},
    mongodb::{Coll, Id},
};

/// The ID MongoDB assigned to a freshly inserted document.
pub fn inserted_id(result: InsertOneResult) -> Result<Id> {
    result.inserted_id.as_object_id().map(Id::from).ok_or_else(|| {
        Error::Status(
            Status::InternalServerError,
            format!("Unexpected inserted ID {}", result.inserted_id),
        )
    })
}

/// Return the citizen the token belongs to.
pub async fn citizen_by_token(token: &AuthToken<User>, users: &Coll<User>) -> Result<User> {
    users
        .find_one(token.id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::Status(Status::Unauthorized, format!("No citizen with ID {}", token.id)))
}

/// Return the poll with the given ID, active or not.
pub async fn poll_by_id(poll_id: Id, polls: &Coll<Poll>) -> Result<Poll> {
    polls
        .find_one(poll_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Poll {poll_id}")))
}

/// Filter matching documents that are active and inside their time window at `now`.
pub fn live_at(now: DateTime<Utc>) -> Document {
    let now = BsonDateTime::from_chrono(now);
    doc! {
        "is_active": true,
        "start_time": { "$lte": now },
        "$or": [
            { "end_time": null },
            { "end_time": { "$gt": now } },
        ],
    }
}
