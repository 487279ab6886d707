use async_trait::async_trait;
use log::debug;
use uuid::Uuid;

use super::CredentialStore;
use crate::db::{self, Database};
use crate::error::AppError;
use crate::models::{NewUser, User};

/// Credential store backed by the `users` table.
#[derive(Clone, Debug)]
pub struct PgCredentialStore {
    db: Database,
}

impl PgCredentialStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn insert(&self, user: NewUser) -> Result<User, AppError> {
        let name = user.name.clone();
        let email = user.email.clone();

        let inserted = self
            .db
            .scope(move |session| Box::pin(async move { db::users::insert(session, &user).await }))
            .await;

        match inserted {
            // The failed insert has been rolled back; find out what it collided with.
            Err(AppError::DuplicateCredential(_)) => {
                debug!("Registration for {:?} hit a unique constraint", name);
                let taken = self
                    .db
                    .scope(move |session| {
                        Box::pin(async move {
                            db::users::taken_fields(
                                session,
                                Some(name.as_str()),
                                Some(email.as_str()),
                                None,
                            )
                            .await
                        })
                    })
                    .await?;
                Err(AppError::DuplicateCredential(taken))
            }
            other => other,
        }
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        self.db
            .scope(move |session| Box::pin(async move { db::users::find_by_id(session, id).await }))
            .await
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<User>, AppError> {
        let name = name.to_string();
        self.db
            .scope(move |session| {
                Box::pin(async move { db::users::find_by_name(session, &name).await })
            })
            .await
    }
}
