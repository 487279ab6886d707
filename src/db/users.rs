use sqlx::PgConnection;
use uuid::Uuid;

use super::is_unique_violation;
use crate::error::{AppError, CredentialField};
use crate::models::{NewUser, User};

const USER_COLUMNS: &str = "id, name, email, password_hash, created_at, updated_at";

/// Inserts a user. A name or email collision surfaces as an unattributed
/// `DuplicateCredential`; the transaction is unusable afterwards, so callers resolve
/// the colliding fields in a fresh scope with [`taken_fields`].
pub async fn insert(conn: &mut PgConnection, user: &NewUser) -> Result<User, AppError> {
    sqlx::query_as::<_, User>(&format!(
        "INSERT INTO users (id, name, email, password_hash) VALUES ($1, $2, $3, $4) \
         RETURNING {USER_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(&user.name)
    .bind(&user.email)
    .bind(&user.password_hash)
    .fetch_one(&mut *conn)
    .await
    .map_err(duplicate_or_db_error)
}

pub async fn find_by_id(conn: &mut PgConnection, id: Uuid) -> Result<Option<User>, AppError> {
    let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(user)
}

pub async fn find_by_name(conn: &mut PgConnection, name: &str) -> Result<Option<User>, AppError> {
    let user =
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE name = $1"))
            .bind(name)
            .fetch_optional(&mut *conn)
            .await?;
    Ok(user)
}

/// Reports which of `email` and `name` already belong to a user other than `except`.
pub async fn taken_fields(
    conn: &mut PgConnection,
    name: Option<&str>,
    email: Option<&str>,
    except: Option<Uuid>,
) -> Result<Vec<CredentialField>, AppError> {
    let mut taken = Vec::new();

    if let Some(email) = email {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM users WHERE email = $1 AND id IS DISTINCT FROM $2)",
        )
        .bind(email)
        .bind(except)
        .fetch_one(&mut *conn)
        .await?;
        if exists {
            taken.push(CredentialField::Email);
        }
    }

    if let Some(name) = name {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM users WHERE name = $1 AND id IS DISTINCT FROM $2)",
        )
        .bind(name)
        .bind(except)
        .fetch_one(&mut *conn)
        .await?;
        if exists {
            taken.push(CredentialField::Name);
        }
    }

    Ok(taken)
}

pub async fn list(conn: &mut PgConnection, limit: i64, offset: i64) -> Result<Vec<User>, AppError> {
    let users = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users ORDER BY created_at, id LIMIT $1 OFFSET $2"
    ))
    .bind(limit)
    .bind(offset)
    .fetch_all(&mut *conn)
    .await?;
    Ok(users)
}

/// Applies the given changes; `None` leaves a column as it is.
pub async fn update(
    conn: &mut PgConnection,
    id: Uuid,
    name: Option<&str>,
    email: Option<&str>,
    password_hash: Option<&str>,
) -> Result<Option<User>, AppError> {
    sqlx::query_as::<_, User>(&format!(
        "UPDATE users SET name = COALESCE($2, name), email = COALESCE($3, email), \
         password_hash = COALESCE($4, password_hash), updated_at = NOW() \
         WHERE id = $1 RETURNING {USER_COLUMNS}"
    ))
    .bind(id)
    .bind(name)
    .bind(email)
    .bind(password_hash)
    .fetch_optional(&mut *conn)
    .await
    .map_err(duplicate_or_db_error)
}

pub async fn delete(conn: &mut PgConnection, id: Uuid) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

fn duplicate_or_db_error(err: sqlx::Error) -> AppError {
    if is_unique_violation(&err) {
        AppError::DuplicateCredential(Vec::new())
    } else {
        err.into()
    }
}
