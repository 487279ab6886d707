//! Credential store: where user identities live.
//!
//! The auth service only talks to the [`CredentialStore`] trait. [`PgCredentialStore`]
//! is the production backend; [`InMemoryCredentialStore`] keeps users in a map and is
//! used by the test suites and for running the auth endpoints without PostgreSQL.

mod memory;
mod postgres;

pub use memory::InMemoryCredentialStore;
pub use postgres::PgCredentialStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{NewUser, User};

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Persists a new user.
    ///
    /// Uniqueness of name and email is enforced by the store itself, atomically with the
    /// insert. On a collision nothing is written and the error is
    /// `AppError::DuplicateCredential` naming the fields that collided.
    async fn insert(&self, user: NewUser) -> Result<User, AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError>;

    async fn find_by_name(&self, name: &str) -> Result<Option<User>, AppError>;
}
