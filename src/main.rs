use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{http::header, middleware::Logger, web, App, HttpServer};

mod auth;
mod config;
mod dto;
mod error;
mod resolve;
mod routes;
mod schemas;
mod split;
mod store;
mod telemetry;

use crate::auth::Authenticator;
use crate::config::Config;
use crate::store::{MongoStore, Store};

fn cors(client_url: Option<&str>) -> Cors {
    match client_url {
        Some(origin) => Cors::default()
            .allowed_origin(origin)
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE"])
            .allowed_headers(vec![header::AUTHORIZATION, header::CONTENT_TYPE])
            .supports_credentials()
            .max_age(3600),
        None => Cors::default(),
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    telemetry::init();

    let config = Config::from_env().map_err(|err| {
        tracing::error!(error = %err, "invalid configuration");
        std::io::Error::new(std::io::ErrorKind::InvalidInput, err.to_string())
    })?;

    let store = MongoStore::connect(&config.mongodb_uri, &config.database_name)
        .await
        .map_err(|err| {
            tracing::error!(error = %err, "failed to connect to MongoDB");
            std::io::Error::new(std::io::ErrorKind::ConnectionRefused, err.to_string())
        })?;
    tracing::info!(database = %config.database_name, "connected to MongoDB");

    let store: web::Data<dyn Store> = web::Data::from(Arc::new(store) as Arc<dyn Store>);
    let authenticator = web::Data::new(Authenticator::new(
        &config.jwt_secret,
        config.jwt_lifetime_secs,
        config.cookie_secure,
    ));

    tracing::info!(host = %config.host, port = config.port, "server running");
    let client_url = config.client_url.clone();
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(cors(client_url.as_deref()))
            .app_data(store.clone())
            .app_data(authenticator.clone())
            .configure(routes::configure)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
