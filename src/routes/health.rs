use actix_web::{get, HttpResponse};
use chrono::Utc;
use serde_json::json;

#[get("/")]
pub async fn index() -> HttpResponse {
    HttpResponse::Ok().body("API is running...")
}

#[get("/health")]
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "API is healthy",
        "timestamp": Utc::now(),
    }))
}
