use std::io;
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::middleware::{Compress, Logger};
use actix_web::{web, App, HttpServer};
use log::info;

use boardforge::auth::{AuthMiddleware, AuthService, PasswordHasher, TokenCodec, TokenLifetimes};
use boardforge::config::Config;
use boardforge::db::Database;
use boardforge::routes::{self, health};
use boardforge::store::PgCredentialStore;

fn startup_error(err: impl std::fmt::Display) -> io::Error {
    io::Error::new(io::ErrorKind::Other, err.to_string())
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env().map_err(startup_error)?;

    let db = Database::connect(&config.database)
        .await
        .map_err(startup_error)?;
    db.migrate().await.map_err(startup_error)?;

    let tokens = TokenCodec::from_config(&config.jwt).map_err(startup_error)?;
    let auth = AuthService::new(
        Arc::new(PgCredentialStore::new(db.clone())),
        PasswordHasher::new(config.bcrypt_cost),
        tokens,
        TokenLifetimes {
            access: config.jwt.access_token_lifetime,
            refresh: config.jwt.refresh_token_lifetime,
        },
    )
    .map_err(startup_error)?;

    let auth = web::Data::new(auth);
    let db_data = web::Data::new(db.clone());

    info!("Starting BoardForge server at {}", config.server_url());
    HttpServer::new(move || {
        App::new()
            .app_data(auth.clone())
            .app_data(db_data.clone())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
                    .max_age(3600),
            )
            .wrap(Compress::default())
            .wrap(Logger::default())
            .service(health::health)
            .service(
                web::scope("/api")
                    .wrap(AuthMiddleware)
                    .configure(routes::config),
            )
    })
    .workers(config.server_workers)
    .bind((config.server_host.as_str(), config.server_port))?
    .run()
    .await?;

    db.close().await;
    Ok(())
}
