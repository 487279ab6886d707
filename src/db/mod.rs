//! Database access: the connection pool and the transactional session scope.
//!
//! Every unit of work runs through [`Database::scope`], which hands the caller one
//! transaction on one pooled connection and guarantees that it ends in exactly one of
//! commit or rollback. The data-access functions in the submodules take
//! `&mut PgConnection`, so several of them can be composed inside a single scope and
//! share its transaction.

pub mod boards;
pub mod tasks;
pub mod users;

use futures::future::BoxFuture;
use log::{debug, error, info};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};

use crate::config::DatabaseConfig;
use crate::error::AppError;

/// One open transaction, exclusively owned by the scope that created it.
pub type Session = Transaction<'static, Postgres>;

/// Handle to the shared connection pool. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.url)
            .await?;
        info!(
            "Database pool ready (max_connections={}, acquire_timeout={:?})",
            config.max_connections, config.acquire_timeout
        );
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Applies the embedded migrations under `migrations/`.
    pub async fn migrate(&self) -> Result<(), AppError> {
        sqlx::migrate!().run(&self.pool).await?;
        info!("Database migrations applied");
        Ok(())
    }

    /// Runs `work` inside a transaction.
    ///
    /// Commits when `work` returns `Ok`, rolls back and returns the error unchanged when
    /// it returns `Err`. If the returned future is dropped before completion the
    /// transaction is rolled back when the session is dropped.
    ///
    /// The session is only reachable through the closure argument. Values the closure
    /// needs must be moved in, since the future may only borrow the session.
    pub async fn scope<T, F>(&self, work: F) -> Result<T, AppError>
    where
        T: Send,
        F: for<'s> FnOnce(&'s mut Session) -> BoxFuture<'s, Result<T, AppError>> + Send,
    {
        let mut session = self.pool.begin().await?;
        debug!("Session scope started");

        let outcome = work(&mut session).await;
        match outcome {
            Ok(value) => {
                session.commit().await?;
                debug!("Session scope committed");
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = session.rollback().await {
                    error!("Session rollback failed: {}", rollback_err);
                }
                debug!("Session scope rolled back: {}", err);
                Err(err)
            }
        }
    }

    pub async fn close(&self) {
        self.pool.close().await;
        info!("Database pool closed");
    }
}

/// True when `err` is a unique-constraint violation reported by the database.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}
