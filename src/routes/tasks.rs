use crate::{
    auth::AuthenticatedUser,
    db::{boards, tasks, Database, Session},
    error::AppError,
    models::{Task, TaskInput, TaskQuery},
};
use actix_web::{delete, get, post, put, web, HttpResponse, Responder};
use log::info;
use uuid::Uuid;
use validator::Validate;

async fn ensure_assignable(
    session: &mut Session,
    board_id: Uuid,
    assignee: Option<Uuid>,
) -> Result<(), AppError> {
    if let Some(assignee) = assignee {
        if boards::role_of(session, board_id, assignee).await?.is_none() {
            return Err(AppError::BadRequest(
                "Tasks can only be assigned to members of the board".into(),
            ));
        }
    }
    Ok(())
}

/// Loads a task the caller may see. Tasks on boards the caller is not a member of
/// are reported as missing.
async fn visible_task(
    session: &mut Session,
    task_id: Uuid,
    user_id: Uuid,
) -> Result<Task, AppError> {
    let not_found = || AppError::NotFound("Task not found".into());
    let task = tasks::find(session, task_id).await?.ok_or_else(not_found)?;
    boards::role_of(session, task.board_id, user_id)
        .await?
        .ok_or_else(not_found)?;
    Ok(task)
}

/// Lists the tasks of a board.
///
/// ## Query Parameters:
/// - `status` (optional): `todo`, `in_progress` or `done`.
/// - `priority` (optional): `low`, `medium` or `high`.
/// - `assigned_to` (optional): id of the assignee.
/// - `search` (optional): case-insensitive match on title or description.
///
/// ## Responses:
/// - `200 OK`: JSON array of tasks, newest first.
/// - `404 Not Found`: the board does not exist or the caller is not a member.
#[get("/{id}/tasks")]
pub async fn list_board_tasks(
    db: web::Data<Database>,
    board_id: web::Path<Uuid>,
    query_params: web::Query<TaskQuery>,
    user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let (board_id, user_id) = (board_id.into_inner(), user.id());
    let query = query_params.into_inner();

    let found = db
        .scope(move |session| {
            Box::pin(async move {
                boards::require_member(session, board_id, user_id).await?;
                tasks::list(session, board_id, &query).await
            })
        })
        .await?;
    Ok(HttpResponse::Ok().json(found))
}

/// Creates a task on a board. Any member may create tasks.
///
/// ## Responses:
/// - `201 Created`: the new task.
/// - `400 Bad Request`: the assignee is not a member of the board.
/// - `404 Not Found`: the board does not exist or the caller is not a member.
/// - `422 Unprocessable Entity`: field validation failed.
#[post("/{id}/tasks")]
pub async fn create_task(
    db: web::Data<Database>,
    board_id: web::Path<Uuid>,
    task_data: web::Json<TaskInput>,
    user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    task_data.validate()?;
    let (board_id, user_id) = (board_id.into_inner(), user.id());
    let task = Task::new(task_data.into_inner(), board_id, user_id);

    let task = db
        .scope(move |session| {
            Box::pin(async move {
                boards::require_member(session, board_id, user_id).await?;
                ensure_assignable(session, board_id, task.assigned_to_id).await?;
                tasks::insert(session, &task).await
            })
        })
        .await?;

    info!("Task {} created on board {}", task.id, board_id);
    Ok(HttpResponse::Created().json(task))
}

#[get("/{id}")]
pub async fn get_task(
    db: web::Data<Database>,
    task_id: web::Path<Uuid>,
    user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let (task_id, user_id) = (task_id.into_inner(), user.id());
    let task = db
        .scope(move |session| Box::pin(async move { visible_task(session, task_id, user_id).await }))
        .await?;
    Ok(HttpResponse::Ok().json(task))
}

/// Replaces a task's fields. Any member of the task's board may update it.
#[put("/{id}")]
pub async fn update_task(
    db: web::Data<Database>,
    task_id: web::Path<Uuid>,
    task_data: web::Json<TaskInput>,
    user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    task_data.validate()?;
    let (task_id, user_id) = (task_id.into_inner(), user.id());
    let input = task_data.into_inner();

    let task = db
        .scope(move |session| {
            Box::pin(async move {
                let existing = visible_task(session, task_id, user_id).await?;
                ensure_assignable(session, existing.board_id, input.assigned_to_id).await?;
                tasks::update(session, task_id, &input).await
            })
        })
        .await?;
    Ok(HttpResponse::Ok().json(task))
}

#[delete("/{id}")]
pub async fn delete_task(
    db: web::Data<Database>,
    task_id: web::Path<Uuid>,
    user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let (task_id, user_id) = (task_id.into_inner(), user.id());
    db.scope(move |session| {
        Box::pin(async move {
            visible_task(session, task_id, user_id).await?;
            tasks::delete(session, task_id).await
        })
    })
    .await?;

    info!("Task {} deleted by {}", task_id, user_id);
    Ok(HttpResponse::NoContent().finish())
}
