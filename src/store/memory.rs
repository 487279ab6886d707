use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::CredentialStore;
use crate::error::{AppError, CredentialField};
use crate::models::{NewUser, User};

/// Keeps users in a process-local map.
///
/// Both uniqueness checks and the insert happen under one lock, which gives the same
/// guarantee as the database constraints: of two racing registrations with the same
/// email, exactly one wins.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    users: Mutex<HashMap<Uuid, User>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().map(|users| users.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops a user, as an account deletion would.
    pub fn remove(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.lock()?.remove(&id))
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<Uuid, User>>, AppError> {
        self.users
            .lock()
            .map_err(|_| AppError::InternalServerError("credential store lock poisoned".into()))
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn insert(&self, user: NewUser) -> Result<User, AppError> {
        let mut users = self.lock()?;

        let mut taken = Vec::new();
        if users.values().any(|existing| existing.email == user.email) {
            taken.push(CredentialField::Email);
        }
        if users.values().any(|existing| existing.name == user.name) {
            taken.push(CredentialField::Name);
        }
        if !taken.is_empty() {
            return Err(AppError::DuplicateCredential(taken));
        }

        let now = Utc::now();
        let stored = User {
            id: Uuid::new_v4(),
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            created_at: now,
            updated_at: now,
        };
        users.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.lock()?.get(&id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<User>, AppError> {
        Ok(self
            .lock()?
            .values()
            .find(|user| user.name == name)
            .cloned())
    }
}
