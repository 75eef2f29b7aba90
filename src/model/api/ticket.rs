use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    api::id::ApiId,
    common::ticket::TicketStatus,
    db::ticket::{NewTicket, Ticket},
    mongodb::Id,
};

/// A support request, as submitted by a citizen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketSpec {
    pub subject: String,
    pub message: String,
}

impl TicketSpec {
    /// Validate this spec and convert it into an open ticket.
    pub fn into_ticket(self, user_id: Id, now: DateTime<Utc>) -> Result<NewTicket> {
        if self.subject.trim().is_empty() || self.message.trim().is_empty() {
            return Err(Error::bad_request("Ticket subject and message must not be blank"));
        }
        Ok(NewTicket {
            user_id,
            subject: self.subject.trim().to_string(),
            message: self.message.trim().to_string(),
            status: TicketStatus::Open,
            admin_response: None,
            created_at: now,
            updated_at: now,
        })
    }
}

/// An admin's change to a ticket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketUpdate {
    pub status: TicketStatus,
    #[serde(default)]
    pub admin_response: Option<String>,
}

/// An API-friendly ticket description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketDescription {
    pub id: ApiId,
    pub user_id: ApiId,
    pub subject: String,
    pub message: String,
    pub status: TicketStatus,
    pub admin_response: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Ticket> for TicketDescription {
    fn from(ticket: Ticket) -> Self {
        Self {
            id: ticket.id.into(),
            user_id: ticket.user_id.into(),
            subject: ticket.ticket.subject,
            message: ticket.ticket.message,
            status: ticket.ticket.status,
            admin_response: ticket.ticket.admin_response,
            created_at: ticket.ticket.created_at,
            updated_at: ticket.ticket.updated_at,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_tickets_are_open() {
        let ticket = TicketSpec::example().into_ticket(Id::new(), Utc::now()).unwrap();
        assert_eq!(ticket.status, TicketStatus::Open);
        assert_eq!(ticket.admin_response, None);

        let blank = TicketSpec {
            subject: "".into(),
            message: "help".into(),
        };
        assert!(blank.into_ticket(Id::new(), Utc::now()).is_err());
    }
}
