use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    common::password::{hash_password, MIN_PASSWORD_LENGTH},
    db::admin::{Admin, NewAdmin},
};

use super::id::ApiId;

/// Raw admin credentials, received from a user. These are never stored directly,
/// since the password is in plaintext.
#[derive(Clone, Deserialize, Serialize)]
pub struct AdminCredentials {
    pub username: String,
    pub password: String,
}

impl TryFrom<AdminCredentials> for NewAdmin {
    type Error = Error;

    /// Convert [`AdminCredentials`] to a new [`NewAdmin`] by hashing the password.
    /// This enforces that the username is non-empty, and the password meets minimum length.
    fn try_from(cred: AdminCredentials) -> Result<Self> {
        let too_short = cred.password.chars().count() < MIN_PASSWORD_LENGTH;
        if cred.username.trim().is_empty() || too_short {
            return Err(Error::bad_request("Illegal admin credentials"));
        }
        Ok(Self {
            username: cred.username,
            password_hash: hash_password(&cred.password)?,
        })
    }
}

/// An admin as listed to other admins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminDescription {
    pub id: ApiId,
    pub username: String,
}

impl From<Admin> for AdminDescription {
    fn from(admin: Admin) -> Self {
        Self {
            id: admin.id.into(),
            username: admin.admin.username,
        }
    }
}

/// Counts shown on the admin dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DashboardStats {
    pub users: u64,
    pub active_users: u64,
    pub leaders: u64,
    pub ratings: u64,
    pub active_polls: u64,
    pub poll_responses: u64,
    pub active_notifications: u64,
    pub open_tickets: u64,
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_are_hashed() {
        let admin: NewAdmin = AdminCredentials::example().try_into().unwrap();
        assert_eq!(admin.username, "coordinator");
        assert_ne!(admin.password_hash, AdminCredentials::example().password);
        assert!(admin.verify_password("rate-my-leader"));
        assert!(!admin.verify_password("rate-my-leader!"));
    }

    #[test]
    fn weak_credentials_are_rejected() {
        assert!(NewAdmin::try_from(AdminCredentials::empty()).is_err());
        let short = AdminCredentials {
            username: "someone".into(),
            password: "1234567".into(),
        };
        assert!(NewAdmin::try_from(short).is_err());

        // Length is in characters: four two-byte characters are still four.
        let accented = AdminCredentials {
            username: "someone".into(),
            password: "éééé".into(),
        };
        assert!(NewAdmin::try_from(accented).is_err());
        let accented = AdminCredentials {
            username: "someone".into(),
            password: "éééééééé".into(),
        };
        assert!(NewAdmin::try_from(accented).is_ok());
    }
}
