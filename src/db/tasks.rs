use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Task, TaskInput, TaskQuery};

const TASK_COLUMNS: &str = "id, title, description, deadline, priority, status, board_id, \
                            created_by_id, assigned_to_id, created_at, updated_at";

pub async fn insert(conn: &mut PgConnection, task: &Task) -> Result<Task, AppError> {
    let task = sqlx::query_as::<_, Task>(&format!(
        "INSERT INTO tasks (id, title, description, deadline, priority, status, board_id, \
         created_by_id, assigned_to_id) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
         RETURNING {TASK_COLUMNS}"
    ))
    .bind(task.id)
    .bind(&task.title)
    .bind(&task.description)
    .bind(task.deadline)
    .bind(task.priority)
    .bind(task.status)
    .bind(task.board_id)
    .bind(task.created_by_id)
    .bind(task.assigned_to_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(task)
}

/// Tasks of one board matching every filter present in `query`, newest first.
pub async fn list(
    conn: &mut PgConnection,
    board_id: Uuid,
    query: &TaskQuery,
) -> Result<Vec<Task>, AppError> {
    let mut sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE board_id = $1");
    let mut param_count = 2;

    if query.status.is_some() {
        sql.push_str(&format!(" AND status = ${}", param_count));
        param_count += 1;
    }
    if query.priority.is_some() {
        sql.push_str(&format!(" AND priority = ${}", param_count));
        param_count += 1;
    }
    if query.assigned_to.is_some() {
        sql.push_str(&format!(" AND assigned_to_id = ${}", param_count));
        param_count += 1;
    }
    if query.search.is_some() {
        sql.push_str(&format!(
            " AND (title ILIKE ${0} OR description ILIKE ${0})",
            param_count
        ));
    }
    sql.push_str(" ORDER BY created_at DESC");

    let mut query_builder = sqlx::query_as::<_, Task>(&sql).bind(board_id);
    if let Some(status) = query.status {
        query_builder = query_builder.bind(status);
    }
    if let Some(priority) = query.priority {
        query_builder = query_builder.bind(priority);
    }
    if let Some(assigned_to) = query.assigned_to {
        query_builder = query_builder.bind(assigned_to);
    }
    if let Some(search) = &query.search {
        query_builder = query_builder.bind(format!("%{}%", escape_like(search)));
    }

    let tasks = query_builder.fetch_all(&mut *conn).await?;
    Ok(tasks)
}

pub async fn find(conn: &mut PgConnection, id: Uuid) -> Result<Option<Task>, AppError> {
    let task = sqlx::query_as::<_, Task>(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(task)
}

pub async fn update(conn: &mut PgConnection, id: Uuid, input: &TaskInput) -> Result<Task, AppError> {
    let task = sqlx::query_as::<_, Task>(&format!(
        "UPDATE tasks SET title = $2, description = $3, deadline = $4, priority = $5, \
         status = $6, assigned_to_id = $7, updated_at = NOW() \
         WHERE id = $1 RETURNING {TASK_COLUMNS}"
    ))
    .bind(id)
    .bind(&input.title)
    .bind(&input.description)
    .bind(input.deadline)
    .bind(input.priority)
    .bind(input.status)
    .bind(input.assigned_to_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(task)
}

pub async fn delete(conn: &mut PgConnection, id: Uuid) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Escapes `%`, `_` and `\` so user input matches literally inside ILIKE.
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
