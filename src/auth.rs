use actix_web::{
    cookie::{time::Duration, Cookie, SameSite},
    dev::Payload,
    http::header::{HeaderValue, AUTHORIZATION},
    web, FromRequest, HttpRequest,
};
use chrono::Utc;
use futures::future::LocalBoxFuture;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::schemas::{User, UserId};
use crate::store::Store;

pub const SESSION_COOKIE: &str = "jwt";

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Not authorized - No token")]
    MissingToken,

    #[error("Session expired. Please log in again.")]
    Expired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("User not found")]
    UnknownUser,

    #[error("failed to sign token: {0}")]
    Signing(jsonwebtoken::errors::Error),

    #[error("failed to hash password: {0}")]
    Hashing(#[from] bcrypt::BcryptError),
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingToken
            | AuthError::Expired
            | AuthError::InvalidToken
            | AuthError::UnknownUser => ApiError::unauthorized(err.to_string()),
            AuthError::Signing(_) | AuthError::Hashing(_) => ApiError::Internal(err.to_string()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: i64,
    exp: i64,
}

/// Signs and checks session tokens and password hashes.
pub struct Authenticator {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    lifetime_secs: i64,
    bcrypt_cost: u32,
    cookie_secure: bool,
}

impl Authenticator {
    pub fn new(secret: &str, lifetime_secs: i64, cookie_secure: bool) -> Self {
        Authenticator {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            lifetime_secs,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            cookie_secure,
        }
    }

    #[cfg(test)]
    pub fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost;
        self
    }

    pub fn issue_token(&self, user: &UserId) -> Result<String, AuthError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user.to_hex(),
            iat: now,
            exp: now + self.lifetime_secs,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(AuthError::Signing)
    }

    pub fn verify_token(&self, token: &str) -> Result<UserId, AuthError> {
        let data = decode::<Claims>(token, &self.decoding_key, &Validation::new(Algorithm::HS256))
            .map_err(|err| match err.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::InvalidToken,
            })?;
        UserId::parse_str(&data.claims.sub).map_err(|_| AuthError::InvalidToken)
    }

    // bcrypt is deliberately slow, keep it off the async workers.
    pub async fn hash_password(&self, password: &str) -> Result<String, ApiError> {
        let password = password.to_string();
        let cost = self.bcrypt_cost;
        web::block(move || bcrypt::hash(password, cost))
            .await
            .map_err(|err| ApiError::Internal(err.to_string()))?
            .map_err(|err| AuthError::Hashing(err).into())
    }

    pub async fn verify_password(&self, password: &str, hash: &str) -> Result<bool, ApiError> {
        let (password, hash) = (password.to_string(), hash.to_string());
        web::block(move || bcrypt::verify(password, &hash))
            .await
            .map_err(|err| ApiError::Internal(err.to_string()))?
            .map_err(|err| AuthError::Hashing(err).into())
    }

    pub fn session_cookie(&self, token: String) -> Cookie<'static> {
        Cookie::build(SESSION_COOKIE, token)
            .path("/")
            .http_only(true)
            .secure(self.cookie_secure)
            .same_site(SameSite::Lax)
            .max_age(Duration::seconds(self.lifetime_secs))
            .finish()
    }

    pub fn expired_cookie(&self) -> Cookie<'static> {
        let mut cookie = Cookie::build(SESSION_COOKIE, "")
            .path("/")
            .http_only(true)
            .secure(self.cookie_secure)
            .finish();
        cookie.make_removal();
        cookie
    }
}

fn token_from_request(request: &HttpRequest) -> Option<String> {
    if let Some(cookie) = request.cookie(SESSION_COOKIE) {
        if !cookie.value().is_empty() {
            return Some(cookie.value().to_string());
        }
    }
    let authorization = request
        .headers()
        .get(AUTHORIZATION)
        .map(HeaderValue::to_str)?
        .ok()?;
    authorization
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

/// The authenticated user behind a request.
///
/// Taking a `Caller` argument makes a handler require a valid session.
#[derive(Clone, Debug, PartialEq)]
pub struct Caller {
    pub id: UserId,
    pub user: User,
}

async fn authenticate(request: HttpRequest) -> Result<Caller, ApiError> {
    let authenticator = request
        .app_data::<web::Data<Authenticator>>()
        .ok_or_else(|| ApiError::Internal("authenticator not configured".to_string()))?;
    let store = request
        .app_data::<web::Data<dyn Store>>()
        .ok_or_else(|| ApiError::Internal("store not configured".to_string()))?;

    let token = token_from_request(&request).ok_or(AuthError::MissingToken)?;
    let user_id = authenticator.verify_token(&token).map_err(|err| {
        tracing::debug!(error = %err, "rejected session token");
        err
    })?;
    let user = store
        .find_user_by_id(&user_id)
        .await?
        .ok_or(AuthError::UnknownUser)?;

    let caller = Caller { id: user.id, user };
    tracing::trace!(user = %caller.id, "authenticated request");
    Ok(caller)
}

impl FromRequest for Caller {
    type Error = ApiError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(request: &HttpRequest, _: &mut Payload) -> Self::Future {
        let request = request.clone();
        Box::pin(authenticate(request))
    }
}
