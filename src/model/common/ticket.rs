use mongodb::bson::{to_bson, Bson};
use rocket::FromFormField;
use serde::{Deserialize, Serialize};

/// States in the support ticket lifecycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize, FromFormField)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    /// Raised by a citizen, not yet looked at.
    #[default]
    Open,
    /// An admin is dealing with it.
    #[field(value = "in_progress")]
    InProgress,
    /// An admin has responded.
    Resolved,
    /// No further action will be taken.
    Closed,
}

impl From<TicketStatus> for Bson {
    fn from(status: TicketStatus) -> Self {
        to_bson(&status).expect("Serialisation is infallible")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialises_as_snake_case() {
        assert_eq!(Bson::from(TicketStatus::InProgress), Bson::String("in_progress".to_string()));
        assert_eq!(Bson::from(TicketStatus::Open), Bson::String("open".to_string()));
    }
}
