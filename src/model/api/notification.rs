use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    api::{
        id::ApiId,
        target::{normalise_target, validate_target},
    },
    common::{audience::TargetFilter, notification::NotificationKind},
    db::notification::{NewNotification, Notification},
    mongodb::Id,
};

/// A notification specification, as submitted by an admin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationSpec {
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub kind: NotificationKind,
    #[serde(default)]
    pub target: Option<TargetFilter>,
    /// Defaults to the moment of creation.
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
}

impl NotificationSpec {
    /// Validate this spec and convert it into an active notification.
    pub fn into_notification(self, created_by: Id, now: DateTime<Utc>) -> Result<NewNotification> {
        if self.title.trim().is_empty() || self.message.trim().is_empty() {
            return Err(Error::bad_request("Notification title and message must not be blank"));
        }
        if let Some(ref target) = self.target {
            validate_target(target)?;
        }
        let start_time = self.start_time.unwrap_or(now);
        if matches!(self.end_time, Some(end_time) if end_time <= start_time) {
            return Err(Error::bad_request("Notification must end after it starts"));
        }
        Ok(NewNotification {
            title: self.title.trim().to_string(),
            message: self.message.trim().to_string(),
            kind: self.kind,
            target: normalise_target(self.target),
            start_time,
            end_time: self.end_time,
            is_active: true,
            created_by,
            created_at: now,
        })
    }
}

/// An API-friendly notification description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationDescription {
    pub id: ApiId,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub target: Option<TargetFilter>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Notification> for NotificationDescription {
    fn from(notification: Notification) -> Self {
        Self {
            id: notification.id.into(),
            title: notification.notification.title,
            message: notification.notification.message,
            kind: notification.notification.kind,
            target: notification.notification.target,
            start_time: notification.notification.start_time,
            end_time: notification.notification.end_time,
            is_active: notification.notification.is_active,
            created_at: notification.notification.created_at,
        }
    }
}
