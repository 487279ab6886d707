use actix_web::dev::Payload;
use actix_web::http::header::{HeaderMap, AUTHORIZATION};
use actix_web::{web, Error as ActixError, FromRequest, HttpMessage, HttpRequest};
use std::future::{ready, Ready};
use uuid::Uuid;

use super::service::AuthService;
use super::token::Claims;
use crate::error::AppError;

/// Pulls the token out of an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
        Some(token)
    } else {
        None
    }
}

/// The verified access-token claims of the caller.
///
/// Normally filled in by `AuthMiddleware`. On routes outside the middleware the bearer
/// header is verified here instead, using the `AuthService` from app data.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub Claims);

impl AuthenticatedUser {
    pub fn id(&self) -> Uuid {
        self.0.sub
    }

    pub fn claims(&self) -> &Claims {
        &self.0
    }
}

fn authenticate(req: &HttpRequest) -> Result<AuthenticatedUser, AppError> {
    if let Some(claims) = req.extensions().get::<Claims>().cloned() {
        return Ok(AuthenticatedUser(claims));
    }

    let token = bearer_token(req.headers())
        .ok_or_else(|| AppError::Unauthorized("Missing bearer token".into()))?;
    let auth = req
        .app_data::<web::Data<AuthService>>()
        .ok_or_else(|| AppError::InternalServerError("AuthService missing from app data".into()))?;
    auth.verify_access(token).map(AuthenticatedUser)
}

impl FromRequest for AuthenticatedUser {
    type Error = ActixError; // AppError will be converted into ActixError via ResponseError
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(authenticate(req).map_err(ActixError::from))
    }
}
