use mongodb::bson::{to_bson, Bson};
use serde::{Deserialize, Serialize};

/// How a notification is presented to citizens.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// General information.
    #[default]
    Info,
    /// Something needing urgent attention.
    Alert,
    /// News about a leader, poll or the service itself.
    Update,
    /// An upcoming event, e.g. a public meeting.
    Event,
}

impl From<NotificationKind> for Bson {
    fn from(kind: NotificationKind) -> Self {
        to_bson(&kind).expect("Serialisation is infallible")
    }
}
