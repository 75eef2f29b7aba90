use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// One citizen's answer to one poll question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollResponseCore {
    pub poll_id: Id,
    pub user_id: Id,
    pub question_id: Id,
    pub option_id: Id,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

/// A poll response without an ID.
pub type NewPollResponse = PollResponseCore;

/// A poll response from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollResponse {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub response: PollResponseCore,
}

impl Deref for PollResponse {
    type Target = PollResponseCore;

    fn deref(&self) -> &Self::Target {
        &self.response
    }
}

impl DerefMut for PollResponse {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.response
    }
}
