use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    api::id::ApiId,
    common::password::{hash_password, MIN_PASSWORD_LENGTH},
    db::user::{NewUser, User, UserCore},
};

/// A citizen signing up. The password is in plaintext and never stored.
#[derive(Clone, Deserialize, Serialize)]
pub struct UserRegistration {
    pub email: String,
    pub password: String,
    pub full_name: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub constituency: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
}

impl TryFrom<UserRegistration> for NewUser {
    type Error = Error;

    /// Validate a registration and hash its password.
    /// The email is lowercased so that logins are case-insensitive.
    fn try_from(registration: UserRegistration) -> Result<Self> {
        let email = registration.email.trim().to_lowercase();
        if !is_plausible_email(&email) {
            return Err(Error::bad_request(format!("Invalid email address: {email}")));
        }
        if registration.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(Error::bad_request(format!(
                "Password must be at least {MIN_PASSWORD_LENGTH} characters"
            )));
        }
        let now = Utc::now();
        let mut user = Self {
            email,
            password_hash: hash_password(&registration.password)?,
            full_name: String::new(),
            state: None,
            constituency: None,
            gender: None,
            birth_date: None,
            is_active: true,
            created_at: now,
        };
        ProfileUpdate {
            full_name: registration.full_name,
            state: registration.state,
            constituency: registration.constituency,
            gender: registration.gender,
            birth_date: registration.birth_date,
        }
        .apply_to(&mut user, now.date_naive())?;
        Ok(user)
    }
}

/// A local part, an `@`, and a domain.
fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && !domain.is_empty() && !email.contains(char::is_whitespace)
        }
        None => false,
    }
}

/// A citizen's login attempt.
#[derive(Clone, Deserialize, Serialize)]
pub struct UserCredentials {
    pub email: String,
    pub password: String,
}

/// The editable parts of a citizen's profile.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProfileUpdate {
    pub full_name: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub constituency: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
}

impl ProfileUpdate {
    /// Validate this update and write it into `user`.
    /// Blank demographic fields are stored as absent.
    pub fn apply_to(self, user: &mut UserCore, today: NaiveDate) -> Result<()> {
        let full_name = self.full_name.trim();
        if full_name.is_empty() {
            return Err(Error::bad_request("Full name must not be blank"));
        }
        if matches!(self.birth_date, Some(birth_date) if birth_date > today) {
            return Err(Error::bad_request("Birth date is in the future"));
        }
        user.full_name = full_name.to_string();
        user.state = non_blank(self.state);
        user.constituency = non_blank(self.constituency);
        user.gender = non_blank(self.gender);
        user.birth_date = self.birth_date;
        Ok(())
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// A citizen account as shown to the citizen themself and to admins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDescription {
    pub id: ApiId,
    pub email: String,
    pub full_name: String,
    pub state: Option<String>,
    pub constituency: Option<String>,
    pub gender: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserDescription {
    fn from(user: User) -> Self {
        Self {
            id: user.id.into(),
            email: user.user.email,
            full_name: user.user.full_name,
            state: user.user.state,
            constituency: user.user.constituency,
            gender: user.user.gender,
            birth_date: user.user.birth_date,
            is_active: user.user.is_active,
            created_at: user.user.created_at,
        }
    }
}

/// Body of the admin request to (de)activate an account.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct ActiveFlag {
    pub is_active: bool,
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl UserRegistration {
        pub fn example() -> Self {
            Self {
                email: "Asha.Nair@Example.com".into(),
                password: "citizen-password".into(),
                full_name: "Asha Nair".into(),
                state: Some("Kerala".into()),
                constituency: Some("Thiruvananthapuram".into()),
                gender: Some("Female".into()),
                birth_date: NaiveDate::from_ymd_opt(1995, 6, 15),
            }
        }

        pub fn example2() -> Self {
            Self {
                email: "ravi@example.com".into(),
                password: "another-password".into(),
                full_name: "Ravi Kumar".into(),
                state: Some("Goa".into()),
                constituency: Some("Panaji".into()),
                gender: Some("Male".into()),
                birth_date: NaiveDate::from_ymd_opt(1960, 1, 20),
            }
        }
    }

    impl UserCredentials {
        pub fn example() -> Self {
            let registration = UserRegistration::example();
            Self {
                email: registration.email,
                password: registration.password,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_normalises_and_hashes() {
        let user: NewUser = UserRegistration::example().try_into().unwrap();
        assert_eq!(user.email, "asha.nair@example.com");
        assert!(user.verify_password("citizen-password"));
        assert!(user.is_active);
        assert_eq!(user.viewer().state.as_deref(), Some("Kerala"));
    }

    #[test]
    fn bad_registrations_are_rejected() {
        let mut registration = UserRegistration::example();
        registration.email = "no-at-sign".into();
        assert!(NewUser::try_from(registration).is_err());

        let mut registration = UserRegistration::example();
        registration.password = "short".into();
        assert!(NewUser::try_from(registration).is_err());

        // Twelve bytes, but only four characters.
        let mut registration = UserRegistration::example();
        registration.password = "ஆஆ".repeat(2);
        assert_eq!(registration.password.chars().count(), 4);
        assert!(NewUser::try_from(registration).is_err());

        let mut registration = UserRegistration::example();
        registration.full_name = "   ".into();
        assert!(NewUser::try_from(registration).is_err());

        let mut registration = UserRegistration::example();
        registration.birth_date = Some(Utc::now().date_naive() + chrono::Duration::days(1));
        assert!(NewUser::try_from(registration).is_err());
    }

    #[test]
    fn blank_demographics_become_absent() {
        let mut user: NewUser = UserRegistration::example().try_into().unwrap();
        let update = ProfileUpdate {
            full_name: " Asha N ".into(),
            state: Some(" ".into()),
            constituency: None,
            gender: Some("Female".into()),
            birth_date: None,
        };
        update.apply_to(&mut user, Utc::now().date_naive()).unwrap();
        assert_eq!(user.full_name, "Asha N");
        assert_eq!(user.state, None);
        assert_eq!(user.gender.as_deref(), Some("Female"));
    }
}
