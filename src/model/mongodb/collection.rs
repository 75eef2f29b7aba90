use std::ops::Deref;

use log::debug;
use mongodb::{
    bson::doc, error::Error as DbError, options::IndexOptions, Collection, Database, IndexModel,
};
use rocket::{
    request::{self, FromRequest, Request},
    State,
};

use crate::model::db::{
    admin::{Admin, NewAdmin},
    leader::{Leader, NewLeader},
    notification::{NewNotification, Notification},
    poll::{NewPoll, Poll},
    rating::{NewRating, Rating},
    response::{NewPollResponse, PollResponse},
    ticket::{NewTicket, Ticket},
    user::{NewUser, User},
};

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[rocket::async_trait]
impl<'r, T> FromRequest<'r> for Coll<T>
where
    T: MongoCollection,
{
    type Error = ();

    /// Get the database connection from the managed state and wrap it in a collection.
    ///
    /// Panics iff the [`Database`] is not managed by [`rocket::Rocket`].
    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let db = req.guard::<&State<Database>>().await.unwrap();
        request::Outcome::Success(Coll::from_db(db))
    }
}

/// Implement [`MongoCollection`] for a stored type and its ID-less insertion form.
macro_rules! collection {
    ($name:ident = $value:literal: $($ty:ty),+) => {
        const $name: &str = $value;
        $(
            impl MongoCollection for $ty {
                const NAME: &'static str = $name;
            }
        )+
    };
}

collection!(ADMINS = "admins": Admin, NewAdmin);
collection!(USERS = "users": User, NewUser);
collection!(LEADERS = "leaders": Leader, NewLeader);
collection!(RATINGS = "ratings": Rating, NewRating);
collection!(POLLS = "polls": Poll, NewPoll);
collection!(POLL_RESPONSES = "poll_responses": PollResponse, NewPollResponse);
collection!(NOTIFICATIONS = "notifications": Notification, NewNotification);
collection!(TICKETS = "tickets": Ticket, NewTicket);

/// Ensure that all the required indexes exist on the given database.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let unique = IndexOptions::builder().unique(true).build();

    // Admin collection.
    let admin_index = IndexModel::builder()
        .keys(doc! {"username": 1})
        .options(unique.clone())
        .build();
    Coll::<Admin>::from_db(db)
        .create_index(admin_index, None)
        .await?;

    // User collection.
    let user_index = IndexModel::builder()
        .keys(doc! {"email": 1})
        .options(unique.clone())
        .build();
    Coll::<User>::from_db(db)
        .create_index(user_index, None)
        .await?;

    // Rating collection: one rating per user per leader.
    let rating_index = IndexModel::builder()
        .keys(doc! {"leader_id": 1, "user_id": 1})
        .options(unique.clone())
        .build();
    Coll::<Rating>::from_db(db)
        .create_index(rating_index, None)
        .await?;

    // Poll response collection: one answer per user per question.
    let response_index = IndexModel::builder()
        .keys(doc! {"poll_id": 1, "user_id": 1, "question_id": 1})
        .options(unique)
        .build();
    Coll::<PollResponse>::from_db(db)
        .create_index(response_index, None)
        .await?;

    // Ticket collection, listed per user.
    let ticket_index = IndexModel::builder()
        .keys(doc! {"user_id": 1, "created_at": -1})
        .build();
    Coll::<Ticket>::from_db(db)
        .create_index(ticket_index, None)
        .await?;

    Ok(())
}
