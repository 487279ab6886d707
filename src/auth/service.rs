//! Registration, login, refresh and token verification in one place.
//!
//! Every auth route goes through [`AuthService`]; its collaborators (credential store,
//! password hasher, token codec) are injected so tests can swap them.

use std::sync::Arc;

use log::{debug, info};
use uuid::Uuid;
use validator::Validate;

use super::password::PasswordHasher;
use super::token::{Claims, TokenCodec, TokenSubject, TokenType};
use super::RegisterRequest;
use crate::error::AppError;
use crate::models::{NewUser, User};
use crate::store::CredentialStore;

/// Verified against when the login name is unknown, so both failure paths cost one
/// bcrypt verification.
const TIMING_DUMMY_PASSWORD: &str = "timing-equalizer";

#[derive(Debug, Clone, Copy)]
pub struct TokenLifetimes {
    pub access: chrono::Duration,
    pub refresh: chrono::Duration,
}

impl Default for TokenLifetimes {
    fn default() -> Self {
        Self {
            access: chrono::Duration::minutes(15),
            refresh: chrono::Duration::days(7),
        }
    }
}

/// What a successful login hands back.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    hasher: PasswordHasher,
    tokens: TokenCodec,
    lifetimes: TokenLifetimes,
    dummy_hash: String,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        hasher: PasswordHasher,
        tokens: TokenCodec,
        lifetimes: TokenLifetimes,
    ) -> Result<Self, AppError> {
        let dummy_hash = hasher.hash(TIMING_DUMMY_PASSWORD)?;
        Ok(Self {
            store,
            hasher,
            tokens,
            lifetimes,
            dummy_hash,
        })
    }

    pub fn lifetimes(&self) -> TokenLifetimes {
        self.lifetimes
    }

    /// Hashes a password off the async executor.
    pub async fn hash_password(&self, password: &str) -> Result<String, AppError> {
        let hasher = self.hasher;
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AppError::InternalServerError(format!("Hashing task failed: {}", e)))?
    }

    async fn password_matches(&self, password: &str, digest: &str) -> Result<bool, AppError> {
        let hasher = self.hasher;
        let password = password.to_string();
        let digest = digest.to_string();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &digest))
            .await
            .map_err(|e| AppError::InternalServerError(format!("Verification task failed: {}", e)))
    }

    /// Creates an account.
    ///
    /// Uniqueness is left to the store's constraint rather than checked beforehand, so
    /// concurrent registrations cannot both slip through.
    pub async fn register(&self, request: RegisterRequest) -> Result<User, AppError> {
        request.validate()?;

        let password_hash = self.hash_password(&request.password).await?;
        let user = self
            .store
            .insert(NewUser {
                name: request.name,
                email: request.email,
                password_hash,
            })
            .await?;

        info!("Registered user {} ({})", user.name, user.id);
        Ok(user)
    }

    /// Checks credentials and issues an access/refresh pair.
    ///
    /// Unknown names and wrong passwords both yield `InvalidCredentials`.
    pub async fn login(&self, name: &str, password: &str) -> Result<TokenPair, AppError> {
        let user = match self.store.find_by_name(name).await? {
            Some(user) => user,
            None => {
                self.password_matches(password, &self.dummy_hash).await?;
                debug!("Login rejected: unknown user {:?}", name);
                return Err(AppError::InvalidCredentials);
            }
        };

        if !self.password_matches(password, &user.password_hash).await? {
            debug!("Login rejected: wrong password for user {}", user.id);
            return Err(AppError::InvalidCredentials);
        }

        let pair = TokenPair {
            access_token: self.issue_access(&user)?,
            refresh_token: self.issue_refresh(user.id)?,
        };
        info!("User {} logged in", user.id);
        Ok(pair)
    }

    /// Exchanges a refresh token for a new access token. The refresh token itself is
    /// not rotated.
    pub async fn refresh(&self, refresh_token: Option<&str>) -> Result<String, AppError> {
        let token = refresh_token
            .filter(|token| !token.is_empty())
            .ok_or(AppError::MissingToken)?;
        let claims = self.verify_refresh(token)?;

        let user = self
            .store
            .find_by_id(claims.sub)
            .await?
            .ok_or_else(|| AppError::InvalidToken(format!("subject {} no longer exists", claims.sub)))?;

        debug!("Refreshed access token for user {}", user.id);
        self.issue_access(&user)
    }

    pub fn verify_access(&self, token: &str) -> Result<Claims, AppError> {
        self.tokens.verify(token, TokenType::Access)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<Claims, AppError> {
        self.tokens.verify(token, TokenType::Refresh)
    }

    /// Loads the user an access token was issued to.
    pub async fn current_user(&self, claims: &Claims) -> Result<User, AppError> {
        self.store
            .find_by_id(claims.sub)
            .await?
            .ok_or_else(|| AppError::InvalidToken(format!("subject {} no longer exists", claims.sub)))
    }

    fn issue_access(&self, user: &User) -> Result<String, AppError> {
        let subject = TokenSubject {
            sub: user.id,
            token_type: TokenType::Access,
            username: Some(user.name.clone()),
            email: Some(user.email.clone()),
        };
        self.tokens.issue(&subject, self.lifetimes.access)
    }

    fn issue_refresh(&self, user_id: Uuid) -> Result<String, AppError> {
        let subject = TokenSubject {
            sub: user_id,
            token_type: TokenType::Refresh,
            username: None,
            email: None,
        };
        self.tokens.issue(&subject, self.lifetimes.refresh)
    }
}
