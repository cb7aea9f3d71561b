use actix_web::{get, post, web, HttpResponse};
use bson::oid::ObjectId;
use chrono::Utc;
use serde_json::json;

use crate::auth::{Authenticator, Caller};
use crate::dto::{LoginBody, RegisterBody, UserView};
use crate::error::{ApiError, ApiResult};
use crate::schemas::User;
use crate::store::Store;

fn session_response(
    mut response: actix_web::HttpResponseBuilder,
    auth: &Authenticator,
    user: &User,
) -> ApiResult<HttpResponse> {
    let token = auth.issue_token(&user.id)?;
    Ok(response
        .cookie(auth.session_cookie(token.clone()))
        .json(json!({
            "success": true,
            "token": token,
            "user": UserView::summary(user),
        })))
}

#[post("/register")]
pub async fn register(
    store: web::Data<dyn Store>,
    auth: web::Data<Authenticator>,
    body: web::Json<RegisterBody>,
) -> ApiResult<HttpResponse> {
    let body = body.into_inner();
    let fields = (
        body.username.map(|u| u.trim().to_string()),
        body.email.map(|e| e.trim().to_lowercase()),
        body.password,
    );
    let (Some(username), Some(email), Some(password)) = fields else {
        return Err(ApiError::bad_request("All fields required"));
    };
    if username.is_empty() || email.is_empty() || password.is_empty() {
        return Err(ApiError::bad_request("All fields required"));
    }

    if store.find_user_by_email(&email).await?.is_some() {
        return Err(ApiError::Conflict("Email already exists".to_string()));
    }
    if store.find_user_by_username(&username).await?.is_some() {
        return Err(ApiError::Conflict("Username already exists".to_string()));
    }

    let user = User {
        id: ObjectId::new(),
        username,
        email,
        password_hash: auth.hash_password(&password).await?,
        created_at: Utc::now(),
    };
    store.insert_user(&user).await?;
    tracing::info!(user = %user.id, "registered user");

    session_response(HttpResponse::Created(), &auth, &user)
}

#[post("/login")]
pub async fn login(
    store: web::Data<dyn Store>,
    auth: web::Data<Authenticator>,
    body: web::Json<LoginBody>,
) -> ApiResult<HttpResponse> {
    let body = body.into_inner();
    let email = body.email.map(|e| e.trim().to_lowercase()).filter(|e| !e.is_empty());
    let password = body.password.filter(|p| !p.is_empty());
    let (Some(email), Some(password)) = (email, password) else {
        return Err(ApiError::bad_request("Missing credentials"));
    };

    let invalid = || ApiError::unauthorized("Invalid credentials");
    let user = store
        .find_user_by_email(&email)
        .await?
        .ok_or_else(invalid)?;
    if !auth.verify_password(&password, &user.password_hash).await? {
        return Err(invalid());
    }

    session_response(HttpResponse::Ok(), &auth, &user)
}

#[post("/logout")]
pub async fn logout(auth: web::Data<Authenticator>) -> HttpResponse {
    HttpResponse::Ok()
        .cookie(auth.expired_cookie())
        .json(json!({ "success": true, "message": "Logged out" }))
}

#[get("/me")]
pub async fn me(caller: Caller) -> HttpResponse {
    HttpResponse::Ok().json(json!({ "success": true, "user": UserView::profile(&caller.user) }))
}
