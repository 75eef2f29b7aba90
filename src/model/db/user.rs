use std::ops::{Deref, DerefMut};

use chrono::{DateTime, NaiveDate, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{
    common::{audience::Viewer, password},
    mongodb::Id,
};

/// Core citizen account data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCore {
    /// Login email, always lowercase.
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub state: Option<String>,
    pub constituency: Option<String>,
    pub gender: Option<String>,
    pub birth_date: Option<NaiveDate>,
    /// Deactivated users cannot log in.
    pub is_active: bool,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl UserCore {
    /// Check whether the given password is correct.
    pub fn verify_password<T: AsRef<[u8]>>(&self, password: T) -> bool {
        password::verify_password(&self.password_hash, password)
    }

    /// The demographic attributes used for audience targeting.
    pub fn viewer(&self) -> Viewer {
        Viewer {
            state: self.state.clone(),
            constituency: self.constituency.clone(),
            gender: self.gender.clone(),
            birth_date: self.birth_date,
        }
    }
}

/// A user without an ID.
pub type NewUser = UserCore;

/// A citizen user from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub user: UserCore,
}

impl Deref for User {
    type Target = UserCore;

    fn deref(&self) -> &Self::Target {
        &self.user
    }
}

impl DerefMut for User {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.user
    }
}
