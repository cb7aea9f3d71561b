use actix_web::{http::StatusCode, web, HttpResponse};
use bson::oid::ObjectId;
use serde::Serialize;
use serde_json::json;

use crate::error::{ApiError, ApiResult};

mod expenses;
mod groups;
mod health;
mod users;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .service(health::index)
        .service(health::health)
        .service(
            web::scope("/api/users")
                .service(users::register)
                .service(users::login)
                .service(users::logout)
                .service(users::me),
        )
        .service(
            web::scope("/api/personal-expenses")
                .service(expenses::add_expense)
                .service(expenses::list_expenses)
                .service(expenses::list_all_expenses)
                .service(expenses::get_expense)
                .service(expenses::update_expense)
                .service(expenses::delete_expense),
        )
        .service(
            web::scope("/api/groups")
                .service(groups::create_group)
                .service(groups::list_groups)
                .service(groups::get_group)
                .service(groups::update_group)
                .service(groups::delete_group)
                .service(groups::add_group_expense)
                .service(groups::list_group_expenses)
                .service(groups::group_split),
        );
}

fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _| {
        ApiError::bad_request(format!("Invalid request body: {err}")).into()
    })
}

fn respond<T: Serialize>(status: StatusCode, data: T) -> HttpResponse {
    HttpResponse::build(status).json(json!({ "success": true, "data": data }))
}

fn ok<T: Serialize>(data: T) -> HttpResponse {
    respond(StatusCode::OK, data)
}

fn created<T: Serialize>(data: T) -> HttpResponse {
    respond(StatusCode::CREATED, data)
}

fn message(text: &str) -> HttpResponse {
    HttpResponse::Ok().json(json!({ "success": true, "message": text }))
}

/// Ids that are not even well formed can't name an existing record.
fn parse_id(raw: &str, missing: &str) -> ApiResult<ObjectId> {
    ObjectId::parse_str(raw).map_err(|_| ApiError::not_found(missing))
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use actix_web::{
        body::MessageBody,
        dev::{ServiceFactory, ServiceRequest, ServiceResponse},
        http::header::AUTHORIZATION,
        test::TestRequest,
        web, App, Error,
    };
    use bson::oid::ObjectId;
    use chrono::Utc;

    use crate::auth::Authenticator;
    use crate::schemas::User;
    use crate::store::{MemoryStore, Store};

    const SECRET: &str = "route-test-secret";

    pub fn authenticator() -> Authenticator {
        authenticator_with_lifetime(3600)
    }

    pub fn authenticator_with_lifetime(lifetime_secs: i64) -> Authenticator {
        Authenticator::new(SECRET, lifetime_secs, false).with_bcrypt_cost(4)
    }

    pub fn app(
        store: Arc<MemoryStore>,
    ) -> App<
        impl ServiceFactory<
            ServiceRequest,
            Response = ServiceResponse<impl MessageBody>,
            Config = (),
            InitError = (),
            Error = Error,
        >,
    > {
        let store: Arc<dyn Store> = store;
        App::new()
            .app_data(web::Data::from(store))
            .app_data(web::Data::new(authenticator()))
            .configure(super::configure)
    }

    /// Stores a user with password `password` and returns it with a session token.
    pub async fn seed_user(store: &MemoryStore, username: &str) -> (User, String) {
        let user = User {
            id: ObjectId::new(),
            username: username.to_string(),
            email: format!("{username}@example.com"),
            password_hash: bcrypt::hash("password", 4).unwrap(),
            created_at: Utc::now(),
        };
        store.insert_user(&user).await.unwrap();
        let token = authenticator().issue_token(&user.id).unwrap();
        (user, token)
    }

    pub fn bearer(request: TestRequest, token: &str) -> TestRequest {
        request.insert_header((AUTHORIZATION, format!("Bearer {token}")))
    }
}
