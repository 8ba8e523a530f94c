/*!
Errors surfaced by request handling.

Everything but `Error::Db` is a "domain" error: an expected outcome of bad
input or a forbidden action that gets reported back to the user. `Error::Db`
means something went wrong on our end.
*/
use axum::http::StatusCode;
use thiserror::Error;

use crate::store::DbError;
use crate::user::Role;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Please fill in all required fields.")]
    MissingFields,

    #[error("Invalid credentials.")]
    InvalidCredentials,

    #[error("Username already exists.")]
    DuplicateUsername,

    #[error("Email already exists.")]
    DuplicateEmail,

    #[error("Access denied. {0} account required.")]
    AccessDenied(Role),

    #[error("Course not found.")]
    CourseNotFound,

    #[error("You cannot enroll in more than {} courses.", crate::MAX_ENROLLMENTS)]
    EnrollmentLimitExceeded,

    #[error("Invalid value for {field}: {value:?}")]
    InvalidFieldValue {
        field: &'static str,
        value: String,
    },

    #[error(transparent)]
    Db(#[from] DbError),
}

impl From<tokio_postgres::Error> for Error {
    fn from(e: tokio_postgres::Error) -> Error {
        Error::Db(DbError::from(e))
    }
}

impl Error {
    pub fn is_domain(&self) -> bool {
        !matches!(self, Error::Db(_))
    }

    /// Status to use when the error is answered with a rendered page
    /// instead of a redirect.
    pub fn status(&self) -> StatusCode {
        match self {
            Error::MissingFields => StatusCode::BAD_REQUEST,
            Error::InvalidFieldValue { .. } => StatusCode::BAD_REQUEST,
            Error::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Error::DuplicateUsername => StatusCode::CONFLICT,
            Error::DuplicateEmail => StatusCode::CONFLICT,
            Error::AccessDenied(_) => StatusCode::FORBIDDEN,
            Error::CourseNotFound => StatusCode::NOT_FOUND,
            Error::EnrollmentLimitExceeded => StatusCode::CONFLICT,
            Error::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_facing_messages() {
        assert_eq!(
            Error::AccessDenied(Role::Student).to_string(),
            "Access denied. Student account required."
        );
        assert_eq!(
            Error::AccessDenied(Role::Faculty).to_string(),
            "Access denied. Faculty account required."
        );
        assert_eq!(
            Error::EnrollmentLimitExceeded.to_string(),
            "You cannot enroll in more than 2 courses."
        );
        assert_eq!(
            Error::InvalidFieldValue { field: "credits", value: "three".to_owned() }
                .to_string(),
            "Invalid value for credits: \"three\""
        );
    }

    #[test]
    fn domain_versus_infrastructure() {
        assert!(Error::CourseNotFound.is_domain());
        assert!(Error::MissingFields.is_domain());

        let e = Error::from(DbError::from("connection refused".to_owned()));
        assert!(!e.is_domain());
        assert_eq!(e.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
