#![allow(dead_code)]

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::body::MessageBody;
use actix_web::dev::{Service, ServiceResponse};
use actix_web::middleware::Logger;
use actix_web::{test, web, App};
use jsonwebtoken::Algorithm;

use boardforge::auth::{AuthMiddleware, AuthService, PasswordHasher, TokenCodec, TokenLifetimes};
use boardforge::db::Database;
use boardforge::routes::{self, health};
use boardforge::store::{CredentialStore, InMemoryCredentialStore, PgCredentialStore};

pub const PRIVATE_KEY: &[u8] = include_bytes!("../fixtures/jwt-private.pem");
pub const PUBLIC_KEY: &[u8] = include_bytes!("../fixtures/jwt-public.pem");
pub const ISSUER: &str = "boardforge-test";
pub const AUDIENCE: &str = "boardforge-test-api";

pub fn codec() -> TokenCodec {
    TokenCodec::new(Algorithm::RS256, PRIVATE_KEY, PUBLIC_KEY, ISSUER, AUDIENCE)
        .expect("fixture keys must load")
}

pub fn auth_service(store: Arc<dyn CredentialStore>) -> web::Data<AuthService> {
    let service = AuthService::new(
        store,
        PasswordHasher::new(4),
        codec(),
        TokenLifetimes::default(),
    )
    .expect("auth service must build");
    web::Data::new(service)
}

/// Auth service over a fresh in-memory store.
pub fn memory_auth() -> web::Data<AuthService> {
    auth_service(Arc::new(InMemoryCredentialStore::new()))
}

/// Connects to `DATABASE_URL` and applies migrations. Only used by `#[ignore]` tests.
pub async fn database() -> Database {
    dotenv::dotenv().ok();
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for database tests");
    let pool = sqlx::PgPool::connect(&url)
        .await
        .expect("Failed to connect to test DB");
    let db = Database::from_pool(pool);
    db.migrate().await.expect("migrations must apply");
    db
}

pub fn pg_auth(db: &Database) -> web::Data<AuthService> {
    auth_service(Arc::new(PgCredentialStore::new(db.clone())))
}

/// The application as `main` assembles it, minus compression.
pub async fn init_app(
    auth: web::Data<AuthService>,
    db: Option<Database>,
) -> impl Service<actix_http::Request, Response = ServiceResponse<impl MessageBody>, Error = actix_web::Error>
{
    let mut app = App::new().app_data(auth);
    if let Some(db) = db {
        app = app.app_data(web::Data::new(db));
    }
    test::init_service(
        app.wrap(
            Cors::default()
                .allow_any_origin()
                .allow_any_method()
                .allow_any_header()
                .max_age(3600),
        )
        .wrap(Logger::default())
        .service(health::health)
        .service(
            web::scope("/api")
                .wrap(AuthMiddleware)
                .configure(routes::config),
        ),
    )
    .await
}

/// Name that fits the username rules and is unique per call.
pub fn unique_name(prefix: &str) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}_{}", prefix, &suffix[..12])
}
