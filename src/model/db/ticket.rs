use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{common::ticket::TicketStatus, mongodb::Id};

/// A support request raised by a citizen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketCore {
    pub user_id: Id,
    pub subject: String,
    pub message: String,
    pub status: TicketStatus,
    pub admin_response: Option<String>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

/// A ticket without an ID.
pub type NewTicket = TicketCore;

/// A ticket from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub ticket: TicketCore,
}

impl Deref for Ticket {
    type Target = TicketCore;

    fn deref(&self) -> &Self::Target {
        &self.ticket
    }
}

impl DerefMut for Ticket {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.ticket
    }
}
