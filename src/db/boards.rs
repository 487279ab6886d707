use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Board, BoardInput, Member, Role};

const BOARD_COLUMNS: &str = "id, title, description, created_by_id, created_at, updated_at";

/// Creates a board and makes `creator` its admin.
pub async fn create(
    conn: &mut PgConnection,
    input: &BoardInput,
    creator: Uuid,
) -> Result<Board, AppError> {
    let board = sqlx::query_as::<_, Board>(&format!(
        "INSERT INTO boards (id, title, description, created_by_id) VALUES ($1, $2, $3, $4) \
         RETURNING {BOARD_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(&input.title)
    .bind(&input.description)
    .bind(creator)
    .fetch_one(&mut *conn)
    .await?;

    sqlx::query("INSERT INTO board_memberships (user_id, board_id, role) VALUES ($1, $2, $3)")
        .bind(creator)
        .bind(board.id)
        .bind(Role::Admin)
        .execute(&mut *conn)
        .await?;

    Ok(board)
}

/// Boards on which `user_id` holds any role, newest first.
pub async fn list_for_member(conn: &mut PgConnection, user_id: Uuid) -> Result<Vec<Board>, AppError> {
    let boards = sqlx::query_as::<_, Board>(
        "SELECT b.id, b.title, b.description, b.created_by_id, b.created_at, b.updated_at \
         FROM boards b JOIN board_memberships m ON m.board_id = b.id \
         WHERE m.user_id = $1 ORDER BY b.created_at DESC",
    )
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(boards)
}

pub async fn find(conn: &mut PgConnection, id: Uuid) -> Result<Option<Board>, AppError> {
    let board =
        sqlx::query_as::<_, Board>(&format!("SELECT {BOARD_COLUMNS} FROM boards WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
    Ok(board)
}

pub async fn role_of(
    conn: &mut PgConnection,
    board_id: Uuid,
    user_id: Uuid,
) -> Result<Option<Role>, AppError> {
    let role = sqlx::query_scalar::<_, Role>(
        "SELECT role FROM board_memberships WHERE board_id = $1 AND user_id = $2",
    )
    .bind(board_id)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(role)
}

/// Resolves the caller's role on a board. Non-members get `NotFound` so that the
/// existence of other people's boards is not revealed.
pub async fn require_member(
    conn: &mut PgConnection,
    board_id: Uuid,
    user_id: Uuid,
) -> Result<Role, AppError> {
    role_of(conn, board_id, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Board not found".into()))
}

/// Like [`require_member`], but members without the admin role get `Forbidden`.
pub async fn require_admin(
    conn: &mut PgConnection,
    board_id: Uuid,
    user_id: Uuid,
) -> Result<(), AppError> {
    match require_member(conn, board_id, user_id).await? {
        Role::Admin => Ok(()),
        Role::User => Err(AppError::Forbidden(
            "Only board admins can perform this action".into(),
        )),
    }
}

pub async fn update(
    conn: &mut PgConnection,
    id: Uuid,
    input: &BoardInput,
) -> Result<Board, AppError> {
    let board = sqlx::query_as::<_, Board>(&format!(
        "UPDATE boards SET title = $2, description = $3, updated_at = NOW() WHERE id = $1 \
         RETURNING {BOARD_COLUMNS}"
    ))
    .bind(id)
    .bind(&input.title)
    .bind(&input.description)
    .fetch_one(&mut *conn)
    .await?;
    Ok(board)
}

pub async fn delete(conn: &mut PgConnection, id: Uuid) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM boards WHERE id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn members(conn: &mut PgConnection, board_id: Uuid) -> Result<Vec<Member>, AppError> {
    let members = sqlx::query_as::<_, Member>(
        "SELECT m.user_id, u.name, m.role, m.created_at \
         FROM board_memberships m JOIN users u ON u.id = m.user_id \
         WHERE m.board_id = $1 ORDER BY m.created_at",
    )
    .bind(board_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(members)
}

/// Adds a member or changes the role of an existing one.
pub async fn upsert_member(
    conn: &mut PgConnection,
    board_id: Uuid,
    user_id: Uuid,
    role: Role,
) -> Result<Member, AppError> {
    sqlx::query(
        "INSERT INTO board_memberships (user_id, board_id, role) VALUES ($1, $2, $3) \
         ON CONFLICT (user_id, board_id) DO UPDATE SET role = EXCLUDED.role, updated_at = NOW()",
    )
    .bind(user_id)
    .bind(board_id)
    .bind(role)
    .execute(&mut *conn)
    .await?;

    let member = sqlx::query_as::<_, Member>(
        "SELECT m.user_id, u.name, m.role, m.created_at \
         FROM board_memberships m JOIN users u ON u.id = m.user_id \
         WHERE m.board_id = $1 AND m.user_id = $2",
    )
    .bind(board_id)
    .bind(user_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(member)
}

/// Removes a membership. Tasks on the board assigned to the leaving user become unassigned.
pub async fn remove_member(
    conn: &mut PgConnection,
    board_id: Uuid,
    user_id: Uuid,
) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM board_memberships WHERE board_id = $1 AND user_id = $2")
        .bind(board_id)
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() == 0 {
        return Ok(false);
    }

    sqlx::query(
        "UPDATE tasks SET assigned_to_id = NULL, updated_at = NOW() \
         WHERE board_id = $1 AND assigned_to_id = $2",
    )
    .bind(board_id)
    .bind(user_id)
    .execute(&mut *conn)
    .await?;
    Ok(true)
}

/// Takes a row lock on the board until the surrounding transaction ends. Membership
/// changes that check the admin count must hold it.
pub async fn lock(conn: &mut PgConnection, board_id: Uuid) -> Result<bool, AppError> {
    let locked = sqlx::query_scalar::<_, Uuid>("SELECT id FROM boards WHERE id = $1 FOR UPDATE")
        .bind(board_id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(locked.is_some())
}

/// Locks every board `user_id` administers, in id order, and returns those on which they
/// are the only admin. Boards they created are left out since deleting the user deletes them.
pub async fn sole_admin_boards(
    conn: &mut PgConnection,
    user_id: Uuid,
) -> Result<Vec<Uuid>, AppError> {
    sqlx::query_scalar::<_, Uuid>(
        "SELECT b.id FROM boards b JOIN board_memberships m ON m.board_id = b.id \
         WHERE m.user_id = $1 AND m.role = 'admin' ORDER BY b.id FOR UPDATE OF b",
    )
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;

    let boards = sqlx::query_scalar::<_, Uuid>(
        "SELECT b.id FROM boards b JOIN board_memberships m ON m.board_id = b.id \
         WHERE m.user_id = $1 AND m.role = 'admin' AND b.created_by_id <> $1 \
         AND NOT EXISTS (SELECT 1 FROM board_memberships o \
                         WHERE o.board_id = b.id AND o.role = 'admin' AND o.user_id <> $1) \
         ORDER BY b.id",
    )
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(boards)
}

pub async fn admin_count(conn: &mut PgConnection, board_id: Uuid) -> Result<i64, AppError> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM board_memberships WHERE board_id = $1 AND role = 'admin'",
    )
    .bind(board_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(count)
}
