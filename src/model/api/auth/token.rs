use std::marker::PhantomData;

use chrono::{serde::ts_seconds, DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, TokenData, Validation};
use mongodb::bson::doc;
use rocket::{
    http::{Cookie, SameSite, Status},
    outcome::{try_outcome, IntoOutcome},
    request::{FromRequest, Outcome},
    time::Duration,
    Request, State,
};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{
    db::{admin::Admin, user::User as Citizen},
    mongodb::{Coll, Id},
};

use super::user::{Rights, User};

pub const AUTH_TOKEN_COOKIE: &str = "auth_token";

/// An authentication token representing a specific user with specific rights.
#[derive(Serialize, Deserialize)]
pub struct AuthToken<U> {
    pub id: Id,
    #[serde(rename = "rgt")]
    pub rights: Rights,
    #[serde(skip)]
    phantom: PhantomData<U>,
}

impl<U> AuthToken<U> {
    /// Does this token permit the given rights?
    pub fn permits(&self, target: Rights) -> bool {
        self.rights == target
    }
}

impl<U> AuthToken<U>
where
    U: User,
{
    /// Create a new [`AuthToken`] for the given user, with the correct rights for that user type.
    pub fn new(user: &U) -> Self {
        Self {
            id: user.id(),
            rights: U::RIGHTS,
            phantom: PhantomData,
        }
    }

    /// Serialize this token into a signed cookie.
    pub fn into_cookie(self, config: &Config) -> Result<Cookie<'static>> {
        let claims = Claims {
            token: self,
            expire_at: Utc::now() + config.auth_ttl(),
        };

        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret()),
        )?;

        Ok(Cookie::build(AUTH_TOKEN_COOKIE, token)
            .path("/")
            .max_age(Duration::seconds(config.auth_ttl().num_seconds()))
            .http_only(true)
            .same_site(SameSite::Strict)
            .finish())
    }

    /// Deserialize a token from a cookie.
    pub fn from_cookie(cookie: &Cookie<'static>, config: &Config) -> Result<Self> {
        let token = jsonwebtoken::decode(
            cookie.value(),
            &DecodingKey::from_secret(config.jwt_secret()),
            &Validation::default(),
        )
        .map(|claims: TokenData<Claims<U>>| claims.claims.token)?;
        Ok(token)
    }
}

/// Cookie claims: the token itself plus an expiry datetime.
#[derive(Serialize, Deserialize)]
struct Claims<U> {
    #[serde(flatten, bound = "")]
    token: AuthToken<U>,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

#[rocket::async_trait]
impl<'r, U> FromRequest<'r> for AuthToken<U>
where
    U: User + Send,
{
    type Error = Error;

    /// Get an [`AuthToken`] from the cookie and verify that it has the correct rights for this user
    /// type, and that the user it names still exists and may log in.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let config = try_outcome!(req
            .guard::<&State<Config>>()
            .await
            .map_failure(|(status, ())| (status, Error::Status(status, "No config".into()))));

        // Forward to any routes that do not require an authentication token.
        let cookie = try_outcome!(req.cookies().get(AUTH_TOKEN_COOKIE).or_forward(()));

        // Decode the token.
        let token: Self = try_outcome!(Self::from_cookie(cookie, config).or_forward(()));

        // Check it represents the correct rights.
        if !token.permits(U::RIGHTS) {
            return Outcome::Forward(());
        }

        // Check the user actually exists, and for citizens, is still active.
        let db = try_outcome!(req
            .guard::<&State<mongodb::Database>>()
            .await
            .map_failure(|(status, ())| (status, Error::Status(status, "No database".into()))));
        let found = match token.rights {
            Rights::Citizen => Coll::<Citizen>::from_db(db)
                .count_documents(doc! { "_id": token.id, "is_active": true }, None)
                .await
                .map(|count| count > 0),
            Rights::Admin => Coll::<Admin>::from_db(db)
                .find_one(token.id.as_doc(), None)
                .await
                .map(|admin| admin.is_some()),
        };
        match found {
            Ok(true) => Outcome::Success(token),
            Ok(false) => Outcome::Forward(()),
            Err(e) => Outcome::Failure((Status::InternalServerError, e.into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config::new(300, "test secret")
    }

    #[test]
    fn cookie_roundtrip_keeps_identity_and_rights() {
        let token = AuthToken::<Citizen> {
            id: Id::new(),
            rights: Rights::Citizen,
            phantom: PhantomData,
        };
        let id = token.id;
        let cookie = token.into_cookie(&config()).unwrap();
        assert_eq!(cookie.name(), AUTH_TOKEN_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));

        let decoded = AuthToken::<Citizen>::from_cookie(&cookie, &config()).unwrap();
        assert_eq!(decoded.id, id);
        assert!(decoded.permits(Rights::Citizen));
        assert!(!decoded.permits(Rights::Admin));
    }

    #[test]
    fn cookie_signed_with_another_secret_is_rejected() {
        let token = AuthToken::<Admin> {
            id: Id::new(),
            rights: Rights::Admin,
            phantom: PhantomData,
        };
        let cookie = token.into_cookie(&config()).unwrap();
        let other = Config::new(300, "another secret");
        assert!(AuthToken::<Admin>::from_cookie(&cookie, &other).is_err());
    }
}
