use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    web, Error, HttpMessage, ResponseError,
};
use futures::future::{ready, LocalBoxFuture, Ready};

use super::extractors::bearer_token;
use super::service::AuthService;
use crate::error::AppError;

/// Paths reachable without an access token.
const PUBLIC_PATHS: [&str; 4] = [
    "/health",
    "/api/v1/auth/register",
    "/api/v1/auth/token",
    "/api/v1/auth/refresh",
];

fn is_public(path: &str) -> bool {
    PUBLIC_PATHS
        .iter()
        .any(|public| path == *public || path.strip_prefix(public) == Some("/"))
}

/// Rejects requests without a valid access token and stores the verified [`Claims`]
/// in the request extensions for [`AuthenticatedUser`].
///
/// Requires `web::Data<AuthService>` in the app data.
///
/// [`Claims`]: super::token::Claims
/// [`AuthenticatedUser`]: super::extractors::AuthenticatedUser
pub struct AuthMiddleware;

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = AuthMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService { service }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if is_public(req.path()) {
            return self.forward(req);
        }

        let auth = match req.app_data::<web::Data<AuthService>>() {
            Some(auth) => auth.clone(),
            None => {
                let app_err =
                    AppError::InternalServerError("AuthService missing from app data".into());
                return reject(req, app_err);
            }
        };

        let verified = bearer_token(req.headers()).map(|token| auth.verify_access(token));
        match verified {
            Some(Ok(claims)) => {
                req.extensions_mut().insert(claims);
                self.forward(req)
            }
            Some(Err(app_err)) => reject(req, app_err),
            None => reject(req, AppError::Unauthorized("Missing bearer token".into())),
        }
    }
}

impl<S, B> AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    fn forward(
        &self,
        req: ServiceRequest,
    ) -> LocalBoxFuture<'static, Result<ServiceResponse<EitherBody<B>>, Error>> {
        let fut = self.service.call(req);
        Box::pin(async move { fut.await.map(ServiceResponse::map_into_left_body) })
    }
}

/// Answers the request with the error response instead of calling the inner service.
fn reject<B: 'static>(
    req: ServiceRequest,
    app_err: AppError,
) -> LocalBoxFuture<'static, Result<ServiceResponse<EitherBody<B>>, Error>> {
    let response = req
        .into_response(app_err.error_response())
        .map_into_right_body();
    Box::pin(async move { Ok(response) })
}
