use crate::{
    auth::{AuthService, AuthenticatedUser},
    db::{boards, users, Database},
    error::AppError,
    models::{UserListQuery, UserProfile, UserUpdate},
};
use actix_web::{delete, get, put, web, HttpResponse, Responder};
use log::info;
use uuid::Uuid;
use validator::Validate;

const MAX_PAGE_SIZE: i64 = 100;

fn ensure_self(user: &AuthenticatedUser, target: Uuid) -> Result<(), AppError> {
    if user.id() == target {
        Ok(())
    } else {
        Err(AppError::Forbidden("You can only modify your own account".into()))
    }
}

/// Lists users, oldest first.
///
/// ## Query Parameters:
/// - `limit` (optional, default 100, at most 100)
/// - `offset` (optional, default 0)
#[get("")]
pub async fn list_users(
    db: web::Data<Database>,
    query: web::Query<UserListQuery>,
    _user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let limit = query.limit.clamp(1, MAX_PAGE_SIZE);
    let offset = query.offset.max(0);

    let found = db
        .scope(move |session| Box::pin(async move { users::list(session, limit, offset).await }))
        .await?;
    let profiles: Vec<UserProfile> = found.into_iter().map(UserProfile::from).collect();
    Ok(HttpResponse::Ok().json(profiles))
}

#[get("/{id}")]
pub async fn get_user(
    db: web::Data<Database>,
    user_id: web::Path<Uuid>,
    _user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let id = user_id.into_inner();
    let found = db
        .scope(move |session| Box::pin(async move { users::find_by_id(session, id).await }))
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    Ok(HttpResponse::Ok().json(UserProfile::from(found)))
}

/// Updates the caller's own name, email or password.
///
/// ## Responses:
/// - `200 OK`: the updated profile.
/// - `400 Bad Request`: empty update, or the new name/email belongs to someone else.
/// - `403 Forbidden`: the id is not the caller's.
/// - `422 Unprocessable Entity`: field validation failed.
#[put("/{id}")]
pub async fn update_user(
    db: web::Data<Database>,
    auth: web::Data<AuthService>,
    user_id: web::Path<Uuid>,
    update: web::Json<UserUpdate>,
    user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let id = user_id.into_inner();
    ensure_self(&user, id)?;
    update.validate()?;
    if update.is_empty() {
        return Err(AppError::BadRequest("Nothing to update".into()));
    }

    let UserUpdate {
        name,
        email,
        password,
    } = update.into_inner();
    let password_hash = match password {
        Some(password) => Some(auth.hash_password(&password).await?),
        None => None,
    };

    let (new_name, new_email) = (name.clone(), email.clone());
    let updated = db
        .scope(move |session| {
            Box::pin(async move {
                users::update(
                    session,
                    id,
                    new_name.as_deref(),
                    new_email.as_deref(),
                    password_hash.as_deref(),
                )
                .await
            })
        })
        .await;

    let updated = match updated {
        Err(AppError::DuplicateCredential(_)) => {
            let taken = db
                .scope(move |session| {
                    Box::pin(async move {
                        users::taken_fields(session, name.as_deref(), email.as_deref(), Some(id))
                            .await
                    })
                })
                .await?;
            return Err(AppError::DuplicateCredential(taken));
        }
        other => other?.ok_or_else(|| AppError::NotFound("User not found".into()))?,
    };

    info!("User {} updated their profile", id);
    Ok(HttpResponse::Ok().json(UserProfile::from(updated)))
}

/// Deletes the caller's own account together with their memberships and tasks.
///
/// ## Responses:
/// - `204 No Content`: the account is gone.
/// - `400 Bad Request`: the caller is the only admin of a board someone else created.
/// - `403 Forbidden`: the id is not the caller's.
#[delete("/{id}")]
pub async fn delete_user(
    db: web::Data<Database>,
    user_id: web::Path<Uuid>,
    user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let id = user_id.into_inner();
    ensure_self(&user, id)?;

    let deleted = db
        .scope(move |session| {
            Box::pin(async move {
                let stranded = boards::sole_admin_boards(session, id).await?;
                if !stranded.is_empty() {
                    return Err(AppError::BadRequest(format!(
                        "Hand over admin rights on {} board(s) before deleting this account",
                        stranded.len()
                    )));
                }
                users::delete(session, id).await
            })
        })
        .await?;
    if !deleted {
        return Err(AppError::NotFound("User not found".into()));
    }

    info!("User {} deleted their account", id);
    Ok(HttpResponse::NoContent().finish())
}
