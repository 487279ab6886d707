use crate::{
    auth::{AuthService, AuthenticatedUser, RegisterRequest, TokenInfo, TokenRequest, REFRESH_COOKIE},
    error::AppError,
    models::UserProfile,
};
use actix_web::cookie::{time::Duration as CookieDuration, Cookie, SameSite};
use actix_web::{get, post, web, HttpRequest, HttpResponse, Responder};

fn refresh_cookie(value: String, lifetime: chrono::Duration) -> Cookie<'static> {
    Cookie::build(REFRESH_COOKIE, value)
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Strict)
        .path("/")
        .max_age(CookieDuration::seconds(lifetime.num_seconds()))
        .finish()
}

/// Register a new user
///
/// ## Responses:
/// - `201 Created`: the new user's public profile.
/// - `400 Bad Request`: malformed body, or the name/email is already registered; the
///   detail names which of the two collided.
/// - `422 Unprocessable Entity`: field validation failed.
#[post("/register")]
pub async fn register(
    auth: web::Data<AuthService>,
    register_data: web::Json<RegisterRequest>,
) -> Result<impl Responder, AppError> {
    let user = auth.register(register_data.into_inner()).await?;
    Ok(HttpResponse::Created().json(UserProfile::from(user)))
}

/// Issue tokens (OAuth2 password flow)
///
/// Takes a form-encoded `username` and `password`. Returns the access token in the body
/// and sets the refresh token as an `HttpOnly` cookie.
///
/// ## Responses:
/// - `200 OK`: `{access_token, token_type: "Bearer"}`.
/// - `401 Unauthorized`: unknown user or wrong password.
#[post("/token")]
pub async fn token(
    auth: web::Data<AuthService>,
    form: web::Form<TokenRequest>,
) -> Result<impl Responder, AppError> {
    let pair = auth.login(&form.username, &form.password).await?;
    let cookie = refresh_cookie(pair.refresh_token, auth.lifetimes().refresh);

    Ok(HttpResponse::Ok()
        .cookie(cookie)
        .json(TokenInfo::bearer(pair.access_token)))
}

/// Refresh the access token
///
/// ## Responses:
/// - `200 OK`: a fresh access token.
/// - `400 Bad Request`: no `refresh-token` cookie.
/// - `401 Unauthorized`: the refresh token is invalid or expired.
#[post("/refresh")]
pub async fn refresh(
    auth: web::Data<AuthService>,
    req: HttpRequest,
) -> Result<impl Responder, AppError> {
    let cookie = req.cookie(REFRESH_COOKIE);
    let access_token = auth.refresh(cookie.as_ref().map(|c| c.value())).await?;
    Ok(HttpResponse::Ok().json(TokenInfo::bearer(access_token)))
}

/// The caller's own profile.
#[get("/me")]
pub async fn me(
    auth: web::Data<AuthService>,
    user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let user = auth.current_user(user.claims()).await?;
    Ok(HttpResponse::Ok().json(UserProfile::from(user)))
}
