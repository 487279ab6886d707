use actix_web::{get, web, HttpResponse, Responder};
use chrono::Utc;
use serde_json::json;

use crate::db::Database;

/// Health check endpoint
///
/// Reports `ok`, or `degraded` when a database is configured but does not answer.
#[get("/health")]
pub async fn health(db: Option<web::Data<Database>>) -> impl Responder {
    let database = match db {
        Some(db) => match sqlx::query("SELECT 1").execute(db.pool()).await {
            Ok(_) => "ok",
            Err(e) => {
                log::warn!("Health check could not reach the database: {}", e);
                "unavailable"
            }
        },
        None => "not_configured",
    };
    let status = if database == "unavailable" { "degraded" } else { "ok" };

    HttpResponse::Ok().json(json!({
        "status": status,
        "database": database,
        "timestamp": Utc::now()
    }))
}
