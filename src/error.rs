use argon2::Error as Argon2Error;
use jsonwebtoken::errors::{Error as JwtError, ErrorKind as JwtErrorKind};
use log::{debug, error};
use mongodb::error::Error as DbError;
use rocket::{
    http::{Status, StatusClass},
    response::{self, Responder, Response},
    Request,
};
use thiserror::Error;

use crate::model::mongodb::is_duplicate_key_error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error(transparent)]
    Argon2(#[from] Argon2Error),
    #[error("{1}")]
    Status(Status, String),
}

impl Error {
    /// A 404 for the described resource.
    pub fn not_found(what: impl AsRef<str>) -> Self {
        Self::Status(Status::NotFound, format!("Not found: {}", what.as_ref()))
    }

    /// A 400 with the given explanation.
    pub fn bad_request(why: impl Into<String>) -> Self {
        Self::Status(Status::BadRequest, why.into())
    }

    /// A 409 with the given explanation.
    pub fn conflict(why: impl Into<String>) -> Self {
        Self::Status(Status::Conflict, why.into())
    }

    /// The HTTP status this error is reported with.
    pub fn status(&self) -> Status {
        match self {
            Self::Db(err) if is_duplicate_key_error(err) => Status::Conflict,
            Self::Db(_) => Status::InternalServerError,
            Self::Jwt(err) => match err.kind() {
                JwtErrorKind::ExpiredSignature | JwtErrorKind::ImmatureSignature => {
                    Status::Unauthorized
                }
                _ => Status::BadRequest,
            },
            Self::Argon2(_) => Status::InternalServerError,
            Self::Status(status, _) => *status,
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let status = self.status();
        if status.class() == StatusClass::ServerError {
            error!("{} {}: {self}", req.method(), req.uri());
        } else {
            debug!("{} {}: {self}", req.method(), req.uri());
        }
        // Don't leak database internals to clients.
        let body = match status.class() {
            StatusClass::ServerError => status.reason_lossy().to_string(),
            _ => self.to_string(),
        };
        Response::build_from(body.respond_to(req)?)
            .status(status)
            .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_errors_keep_their_status() {
        assert_eq!(Error::not_found("Poll 1").status(), Status::NotFound);
        assert_eq!(Error::bad_request("nope").status(), Status::BadRequest);
        assert_eq!(Error::conflict("again").status(), Status::Conflict);
        assert_eq!(Error::not_found("Poll 1").to_string(), "Not found: Poll 1");
    }

    #[test]
    fn expired_tokens_are_unauthorized() {
        let err: Error = JwtError::from(JwtErrorKind::ExpiredSignature).into();
        assert_eq!(err.status(), Status::Unauthorized);
        let err: Error = JwtError::from(JwtErrorKind::InvalidToken).into();
        assert_eq!(err.status(), Status::BadRequest);
    }
}
