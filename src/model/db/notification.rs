use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{
    common::{
        audience::{matches, TargetFilter, Viewer},
        notification::NotificationKind,
    },
    mongodb::{optional_datetime, Id},
};

/// Core notification data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationCore {
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    /// Who should see the notification; `None` means everyone.
    pub target: Option<TargetFilter>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub start_time: DateTime<Utc>,
    #[serde(default, with = "optional_datetime")]
    pub end_time: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_by: Id,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl NotificationCore {
    /// Should the viewer see this notification at the given instant?
    pub fn is_visible_to(&self, viewer: &Viewer, now: DateTime<Utc>) -> bool {
        self.is_active
            && self.start_time <= now
            && self.end_time.map_or(true, |end| end > now)
            && matches(viewer, self.target.as_ref(), now.date_naive())
    }
}

/// A notification without an ID.
pub type NewNotification = NotificationCore;

/// A notification from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub notification: NotificationCore,
}

impl Deref for Notification {
    type Target = NotificationCore;

    fn deref(&self) -> &Self::Target {
        &self.notification
    }
}

impl DerefMut for Notification {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.notification
    }
}
