//!
//! # Custom Error Handling
//!
//! This module defines the custom error type `AppError` used throughout the application.
//! Every domain failure (duplicate credentials, bad tokens, missing resources,
//! authorization failures) is a variant here, and each variant knows its HTTP status.
//!
//! `AppError` implements `actix_web::error::ResponseError` so handlers can return
//! `Result<_, AppError>` and have failures rendered as `{"error", "detail"}` JSON bodies.
//! Internal failures are logged with full context and answered with a generic message.
//! `From` implementations for `sqlx::Error`, `validator::ValidationErrors`,
//! `jsonwebtoken::errors::Error`, and `bcrypt::BcryptError` allow the `?` operator.

use actix_web::{error::ResponseError, http::header, http::StatusCode, HttpResponse};
use serde_json::json;
use std::fmt;
use validator::ValidationErrors;

/// Detail returned for every 5xx response; the real cause only goes to the log.
const INTERNAL_DETAIL: &str = "An unexpected error occurred. Please try again later.";

/// A credential attribute that must be unique across all users.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialField {
    Email,
    Name,
}

impl CredentialField {
    fn describe(self) -> &'static str {
        match self {
            CredentialField::Email => "a user with this email address has already been registered",
            CredentialField::Name => "the username is already taken",
        }
    }
}

/// Represents all possible errors that can occur within the application.
#[derive(Debug)]
pub enum AppError {
    /// Generic authentication failure (HTTP 401).
    Unauthorized(String),
    /// Malformed or invalid request (HTTP 400).
    BadRequest(String),
    /// The caller is authenticated but not allowed to do this (HTTP 403).
    Forbidden(String),
    /// Requested resource does not exist or is not visible to the caller (HTTP 404).
    NotFound(String),
    /// Registration or profile update collided with existing users (HTTP 400).
    /// Lists exactly the fields that collided; empty when the collision could not be
    /// attributed (e.g. the conflicting row vanished before the follow-up read).
    DuplicateCredential(Vec<CredentialField>),
    /// Unknown user or wrong password, deliberately indistinguishable (HTTP 401).
    InvalidCredentials,
    /// The refresh cookie was not sent (HTTP 400).
    MissingToken,
    /// Expired, malformed, forged, wrong-audience or wrong-type token (HTTP 401).
    /// The reason is kept for logging only.
    InvalidToken(String),
    /// Unexpected server-side error (HTTP 500).
    InternalServerError(String),
    /// Error originating from database operations (HTTP 500).
    DatabaseError(String),
    /// Input validation failed (HTTP 422).
    ValidationError(String),
}

impl AppError {
    fn duplicate_detail(fields: &[CredentialField]) -> String {
        if fields.is_empty() {
            return "these credentials are already registered".to_string();
        }
        fields
            .iter()
            .map(|field| field.describe())
            .collect::<Vec<_>>()
            .join(" and ")
    }

    /// The message exposed to clients.
    fn detail(&self) -> String {
        match self {
            AppError::Unauthorized(msg)
            | AppError::BadRequest(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::ValidationError(msg) => msg.clone(),
            AppError::DuplicateCredential(fields) => Self::duplicate_detail(fields),
            AppError::InvalidCredentials => "Invalid username or password".to_string(),
            AppError::MissingToken => "Refresh token is missing".to_string(),
            AppError::InvalidToken(_) => "Invalid or malformed token".to_string(),
            AppError::InternalServerError(_) | AppError::DatabaseError(_) => {
                INTERNAL_DETAIL.to_string()
            }
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            AppError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            AppError::DuplicateCredential(fields) => {
                write!(f, "Duplicate Credential: {}", Self::duplicate_detail(fields))
            }
            AppError::InvalidCredentials => write!(f, "Invalid Credentials"),
            AppError::MissingToken => write!(f, "Missing Token"),
            AppError::InvalidToken(reason) => write!(f, "Invalid Token: {}", reason),
            AppError::InternalServerError(msg) => write!(f, "Internal Server Error: {}", msg),
            AppError::DatabaseError(msg) => write!(f, "Database Error: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation Error: {}", msg),
        }
    }
}

/// Converts `AppError` variants into `HttpResponse` objects.
impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) | AppError::DuplicateCredential(_) | AppError::MissingToken => {
                StatusCode::BAD_REQUEST
            }
            AppError::Unauthorized(_) | AppError::InvalidCredentials | AppError::InvalidToken(_) => {
                StatusCode::UNAUTHORIZED
            }
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::InternalServerError(_) | AppError::DatabaseError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        match self {
            AppError::InternalServerError(_) | AppError::DatabaseError(_) => {
                log::error!("{}", self);
            }
            AppError::InvalidToken(reason) => log::debug!("Rejected token: {}", reason),
            _ => log::warn!("{}", self),
        }

        let mut response = HttpResponse::build(status);
        if status == StatusCode::UNAUTHORIZED {
            response.insert_header((header::WWW_AUTHENTICATE, "Bearer"));
        }
        response.json(json!({
            "error": status.canonical_reason().unwrap_or("Error"),
            "detail": self.detail(),
        }))
    }
}

/// Converts `sqlx::Error` into `AppError`.
///
/// `RowNotFound` maps to `NotFound` and unique-constraint violations to `BadRequest`.
/// Callers that need to tell *which* credential collided inspect the raw error
/// before conversion (see `db::is_unique_violation`).
impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> AppError {
        match error {
            sqlx::Error::RowNotFound => AppError::NotFound("Record not found".into()),
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::BadRequest("Resource already exists".into())
            }
            _ => AppError::DatabaseError(error.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(error: sqlx::migrate::MigrateError) -> AppError {
        AppError::DatabaseError(format!("Migration failed: {}", error))
    }
}

/// Converts `validator::ValidationErrors` into `AppError::ValidationError`.
impl From<ValidationErrors> for AppError {
    fn from(error: ValidationErrors) -> AppError {
        AppError::ValidationError(error.to_string())
    }
}

/// Converts `jsonwebtoken::errors::Error` into `AppError::InvalidToken`.
///
/// Only decoding paths rely on this; encoding failures are mapped explicitly.
impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(error: jsonwebtoken::errors::Error) -> AppError {
        AppError::InvalidToken(error.to_string())
    }
}

/// Converts `bcrypt::BcryptError` into `AppError::InternalServerError`.
impl From<bcrypt::BcryptError> for AppError {
    fn from(error: bcrypt::BcryptError) -> AppError {
        AppError::InternalServerError(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[test]
    fn test_error_responses() {
        let error = AppError::Unauthorized("Invalid token".into());
        let response = error.error_response();
        assert_eq!(response.status(), 401);

        let error = AppError::BadRequest("Invalid input".into());
        assert_eq!(error.error_response().status(), 400);

        let error = AppError::Forbidden("Admins only".into());
        assert_eq!(error.error_response().status(), 403);

        let error = AppError::NotFound("Resource not found".into());
        assert_eq!(error.error_response().status(), 404);

        assert_eq!(AppError::MissingToken.error_response().status(), 400);
        assert_eq!(AppError::InvalidCredentials.error_response().status(), 401);
        assert_eq!(
            AppError::InvalidToken("expired".into()).error_response().status(),
            401
        );
        assert_eq!(
            AppError::ValidationError("bad".into()).error_response().status(),
            422
        );

        let error = AppError::InternalServerError("Server error".into());
        assert_eq!(error.error_response().status(), 500);
    }

    #[test]
    fn test_unauthorized_sets_www_authenticate() {
        let response = AppError::InvalidCredentials.error_response();
        assert_eq!(
            response
                .headers()
                .get(header::WWW_AUTHENTICATE)
                .and_then(|v| v.to_str().ok()),
            Some("Bearer")
        );

        let response = AppError::NotFound("x".into()).error_response();
        assert!(response.headers().get(header::WWW_AUTHENTICATE).is_none());
    }

    #[actix_rt::test]
    async fn test_internal_errors_do_not_leak() {
        let response =
            AppError::DatabaseError("relation \"users\" does not exist".into()).error_response();
        let body = to_bytes(response.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["detail"], INTERNAL_DETAIL);
        assert_eq!(json["error"], "Internal Server Error");
    }

    #[actix_rt::test]
    async fn test_invalid_token_hides_reason() {
        let response = AppError::InvalidToken("ExpiredSignature".into()).error_response();
        let body = to_bytes(response.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["detail"], "Invalid or malformed token");
    }

    #[test]
    fn test_duplicate_credential_detail() {
        assert_eq!(
            AppError::DuplicateCredential(vec![CredentialField::Email]).detail(),
            "a user with this email address has already been registered"
        );
        assert_eq!(
            AppError::DuplicateCredential(vec![CredentialField::Email, CredentialField::Name])
                .detail(),
            "a user with this email address has already been registered and the username is already taken"
        );
        assert_eq!(
            AppError::DuplicateCredential(vec![]).detail(),
            "these credentials are already registered"
        );
    }
}
