mod closer;

pub use closer::{PollCloserFairing, PollClosers};

use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{
    common::audience::{matches, TargetFilter, Viewer},
    mongodb::{optional_datetime, Id},
};

/// A possible answer to a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOption {
    pub id: Id,
    pub text: String,
}

/// A single poll question with its options, in display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: Id,
    pub text: String,
    pub options: Vec<PollOption>,
}

impl Question {
    /// Look up one of this question's options.
    pub fn option(&self, option_id: Id) -> Option<&PollOption> {
        self.options.iter().find(|option| option.id == option_id)
    }
}

/// Core poll data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollCore {
    pub title: String,
    pub description: Option<String>,
    pub questions: Vec<Question>,
    /// Who may see and answer the poll; `None` means everyone.
    pub target: Option<TargetFilter>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub start_time: DateTime<Utc>,
    #[serde(default, with = "optional_datetime")]
    pub end_time: Option<DateTime<Utc>>,
    /// Cleared when the poll ends or is withdrawn.
    pub is_active: bool,
    /// The admin who created the poll.
    pub created_by: Id,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl PollCore {
    /// Look up a question by ID.
    pub fn question(&self, question_id: Id) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == question_id)
    }

    /// Is the poll accepting answers at the given instant, ignoring targeting?
    pub fn is_running_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.start_time <= now && self.end_time.map_or(true, |end| end > now)
    }

    /// Can the viewer see and answer this poll at the given instant?
    pub fn is_open_to(&self, viewer: &Viewer, now: DateTime<Utc>) -> bool {
        self.is_running_at(now) && matches(viewer, self.target.as_ref(), now.date_naive())
    }
}

/// A poll without an ID.
pub type NewPoll = PollCore;

/// A poll from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Poll {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub poll: PollCore,
}

impl Deref for Poll {
    type Target = PollCore;

    fn deref(&self) -> &Self::Target {
        &self.poll
    }
}

impl DerefMut for Poll {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.poll
    }
}
