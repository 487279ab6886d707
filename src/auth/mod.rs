pub mod extractors;
pub mod middleware;
pub mod password;
pub mod service;
pub mod token;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use validator::Validate;

// Re-export necessary items
pub use extractors::AuthenticatedUser;
pub use middleware::AuthMiddleware;
pub use password::{validate_password_bytes, PasswordHasher, MAX_PASSWORD_BYTES};
pub use service::{AuthService, TokenLifetimes, TokenPair};
pub use token::{Claims, TokenCodec, TokenSubject, TokenType};

/// Name of the cookie carrying the refresh token.
pub const REFRESH_COOKIE: &str = "refresh-token";

lazy_static! {
    // Regex for username validation: alphanumeric, underscores, hyphens
    pub static ref USERNAME_REGEX: regex::Regex = regex::Regex::new(r"^[a-zA-Z0-9_-]+$").unwrap();
}

/// Represents the payload for a new user registration request.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    /// Desired username for the new account.
    /// Must be between 3 and 50 characters, alphanumeric, and can include underscores or hyphens.
    #[validate(
        length(min = 3, max = 50),
        regex(
            path = "USERNAME_REGEX",
            message = "Username must be alphanumeric, underscores, or hyphens"
        )
    )]
    pub name: String,
    /// Email address for the new account.
    #[validate(email, length(max = 100))]
    pub email: String,
    /// Password for the new account.
    /// At least 6 characters and at most 72 bytes.
    #[validate(length(min = 6), custom = "validate_password_bytes")]
    pub password: String,
}

/// Form body of the token endpoint (OAuth2 password flow).
#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub username: String,
    pub password: String,
    /// Accepted for OAuth2 client compatibility; only `password` is meaningful.
    #[serde(default)]
    pub grant_type: Option<String>,
}

/// Response of the token and refresh endpoints.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenInfo {
    pub access_token: String,
    pub token_type: String,
}

impl TokenInfo {
    pub fn bearer(access_token: String) -> Self {
        Self {
            access_token,
            token_type: "Bearer".to_string(),
        }
    }
}
