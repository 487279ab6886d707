use crate::{
    auth::AuthenticatedUser,
    db::{boards, users, Database, Session},
    error::AppError,
    models::{BoardInput, MemberInput, Role},
};
use actix_web::{delete, get, post, put, web, HttpResponse, Responder};
use log::info;
use uuid::Uuid;
use validator::Validate;

/// Fails when `user_id` is the only admin of the board and is about to lose that role.
/// Locks the board first, so concurrent demotions on one board run one after another.
async fn ensure_other_admin(
    session: &mut Session,
    board_id: Uuid,
    user_id: Uuid,
) -> Result<(), AppError> {
    if !boards::lock(session, board_id).await? {
        return Err(AppError::NotFound("Board not found".into()));
    }
    let is_admin = boards::role_of(session, board_id, user_id).await? == Some(Role::Admin);
    if is_admin && boards::admin_count(session, board_id).await? <= 1 {
        return Err(AppError::BadRequest(
            "A board must keep at least one admin".into(),
        ));
    }
    Ok(())
}

/// Creates a board; the caller becomes its admin.
#[post("")]
pub async fn create_board(
    db: web::Data<Database>,
    board_data: web::Json<BoardInput>,
    user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    board_data.validate()?;
    let input = board_data.into_inner();
    let creator = user.id();

    let board = db
        .scope(move |session| Box::pin(async move { boards::create(session, &input, creator).await }))
        .await?;

    info!("Board {} created by {}", board.id, creator);
    Ok(HttpResponse::Created().json(board))
}

/// Boards the caller is a member of.
#[get("")]
pub async fn list_boards(
    db: web::Data<Database>,
    user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let user_id = user.id();
    let found = db
        .scope(move |session| {
            Box::pin(async move { boards::list_for_member(session, user_id).await })
        })
        .await?;
    Ok(HttpResponse::Ok().json(found))
}

/// ## Responses:
/// - `200 OK`: the board.
/// - `404 Not Found`: the board does not exist or the caller is not a member.
#[get("/{id}")]
pub async fn get_board(
    db: web::Data<Database>,
    board_id: web::Path<Uuid>,
    user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let (board_id, user_id) = (board_id.into_inner(), user.id());
    let board = db
        .scope(move |session| {
            Box::pin(async move {
                boards::require_member(session, board_id, user_id).await?;
                boards::find(session, board_id).await
            })
        })
        .await?
        .ok_or_else(|| AppError::NotFound("Board not found".into()))?;
    Ok(HttpResponse::Ok().json(board))
}

#[put("/{id}")]
pub async fn update_board(
    db: web::Data<Database>,
    board_id: web::Path<Uuid>,
    board_data: web::Json<BoardInput>,
    user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    board_data.validate()?;
    let (board_id, user_id) = (board_id.into_inner(), user.id());
    let input = board_data.into_inner();

    let board = db
        .scope(move |session| {
            Box::pin(async move {
                boards::require_admin(session, board_id, user_id).await?;
                boards::update(session, board_id, &input).await
            })
        })
        .await?;
    Ok(HttpResponse::Ok().json(board))
}

/// Deletes a board with all of its tasks and memberships. Admins only.
#[delete("/{id}")]
pub async fn delete_board(
    db: web::Data<Database>,
    board_id: web::Path<Uuid>,
    user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let (board_id, user_id) = (board_id.into_inner(), user.id());
    db.scope(move |session| {
        Box::pin(async move {
            boards::require_admin(session, board_id, user_id).await?;
            boards::delete(session, board_id).await
        })
    })
    .await?;

    info!("Board {} deleted by {}", board_id, user_id);
    Ok(HttpResponse::NoContent().finish())
}

#[get("/{id}/members")]
pub async fn list_members(
    db: web::Data<Database>,
    board_id: web::Path<Uuid>,
    user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let (board_id, user_id) = (board_id.into_inner(), user.id());
    let members = db
        .scope(move |session| {
            Box::pin(async move {
                boards::require_member(session, board_id, user_id).await?;
                boards::members(session, board_id).await
            })
        })
        .await?;
    Ok(HttpResponse::Ok().json(members))
}

/// Adds a member, or changes the role of an existing one. Admins only.
///
/// ## Responses:
/// - `200 OK`: the membership as stored.
/// - `400 Bad Request`: the change would leave the board without an admin.
/// - `403 Forbidden`: the caller is not an admin of the board.
/// - `404 Not Found`: unknown board or user.
#[post("/{id}/members")]
pub async fn add_member(
    db: web::Data<Database>,
    board_id: web::Path<Uuid>,
    member_data: web::Json<MemberInput>,
    user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let (board_id, user_id) = (board_id.into_inner(), user.id());
    let MemberInput {
        user_id: member_id,
        role,
    } = member_data.into_inner();

    let member = db
        .scope(move |session| {
            Box::pin(async move {
                boards::require_admin(session, board_id, user_id).await?;
                if users::find_by_id(session, member_id).await?.is_none() {
                    return Err(AppError::NotFound("User not found".into()));
                }
                if role != Role::Admin {
                    ensure_other_admin(session, board_id, member_id).await?;
                }
                boards::upsert_member(session, board_id, member_id, role).await
            })
        })
        .await?;

    info!("User {} is now {:?} on board {}", member_id, role, board_id);
    Ok(HttpResponse::Ok().json(member))
}

/// Removes a member. Admins may remove anyone; other members may only leave.
#[delete("/{id}/members/{user_id}")]
pub async fn remove_member(
    db: web::Data<Database>,
    path: web::Path<(Uuid, Uuid)>,
    user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let (board_id, member_id) = path.into_inner();
    let user_id = user.id();

    db.scope(move |session| {
        Box::pin(async move {
            if member_id != user_id {
                boards::require_admin(session, board_id, user_id).await?;
            } else {
                boards::require_member(session, board_id, user_id).await?;
            }
            ensure_other_admin(session, board_id, member_id).await?;
            if boards::remove_member(session, board_id, member_id).await? {
                Ok(())
            } else {
                Err(AppError::NotFound("Member not found".into()))
            }
        })
    })
    .await?;

    info!("User {} removed from board {}", member_id, board_id);
    Ok(HttpResponse::NoContent().finish())
}
