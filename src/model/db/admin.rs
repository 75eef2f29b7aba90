use std::ops::{Deref, DerefMut};

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{
    api::admin::AdminCredentials,
    common::password,
    mongodb::{Coll, Id},
};

/// Username of the admin created when none exist.
pub const DEFAULT_ADMIN_USERNAME: &str = "admin";
/// Password of the admin created when none exist. Change it immediately.
pub const DEFAULT_ADMIN_PASSWORD: &str = "politirate";

/// Core admin user data.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminCore {
    pub username: String,
    pub password_hash: String,
}

impl AdminCore {
    /// Check whether the given password is correct.
    pub fn verify_password<T: AsRef<[u8]>>(&self, password: T) -> bool {
        password::verify_password(&self.password_hash, password)
    }
}

/// An admin without an ID.
pub type NewAdmin = AdminCore;

/// An admin user from the database, with its unique ID.
#[derive(Debug, Serialize, Deserialize)]
pub struct Admin {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub admin: AdminCore,
}

impl Deref for Admin {
    type Target = AdminCore;

    fn deref(&self) -> &Self::Target {
        &self.admin
    }
}

impl DerefMut for Admin {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.admin
    }
}

/// Create the default admin if there are no admins at all, so that a fresh
/// deployment can be logged into.
pub async fn ensure_admin_exists(admins: &Coll<NewAdmin>) -> Result<()> {
    let count = admins.count_documents(None, None).await?;
    if count == 0 {
        let credentials = AdminCredentials {
            username: DEFAULT_ADMIN_USERNAME.to_string(),
            password: DEFAULT_ADMIN_PASSWORD.to_string(),
        };
        let admin: NewAdmin = credentials.try_into()?;
        admins.insert_one(admin, None).await?;
        warn!("No admins found, created default admin '{DEFAULT_ADMIN_USERNAME}'; change its password");
    }
    Ok(())
}
