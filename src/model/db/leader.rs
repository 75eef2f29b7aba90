use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Core leader data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderCore {
    pub name: String,
    pub party: String,
    /// Office held, e.g. "Member of Parliament".
    pub position: String,
    pub state: Option<String>,
    pub constituency: Option<String>,
    pub bio: Option<String>,
    pub image_url: Option<String>,
    /// Inactive leaders are hidden from citizens and cannot be rated.
    pub is_active: bool,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

/// A leader without an ID.
pub type NewLeader = LeaderCore;

/// A leader from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Leader {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub leader: LeaderCore,
}

impl Deref for Leader {
    type Target = LeaderCore;

    fn deref(&self) -> &Self::Target {
        &self.leader
    }
}

impl DerefMut for Leader {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.leader
    }
}
