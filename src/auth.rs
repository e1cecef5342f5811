use std::future::{ready, Ready};

use actix_web::{web, FromRequest, HttpRequest};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

/// JWT claims issued by the identity provider. Only the subject (user id)
/// and expiry matter to this service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub exp: i64,
}

pub fn verify_jwt(token: &str, secret: &str) -> Result<Claims, AppError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| {
        tracing::debug!(error = %e, "JWT validation failed");
        AppError::Unauthorized
    })
}

/// Mint a token for a user. Used by tests and local tooling; production
/// tokens come from the identity provider.
pub fn issue_jwt(user_id: Uuid, secret: &str, ttl_secs: i64) -> Result<String, AppError> {
    let claims = Claims {
        sub: user_id,
        exp: chrono::Utc::now().timestamp() + ttl_secs,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| AppError::Internal)
}

fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get(actix_web::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
}

/// Authenticated caller extracted from the bearer token.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser {
    pub id: Uuid,
}

impl FromRequest for AuthenticatedUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
        let result = (|| {
            let state = req
                .app_data::<web::Data<AppState>>()
                .ok_or(AppError::Internal)?;
            let token = bearer_token(req).ok_or(AppError::Unauthorized)?;
            let claims = verify_jwt(token, &state.config.auth.jwt_secret)?;
            Ok(AuthenticatedUser { id: claims.sub })
        })();
        ready(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_verifies() {
        let user = Uuid::new_v4();
        let token = issue_jwt(user, "secret", 60).unwrap();
        let claims = verify_jwt(&token, "secret").unwrap();
        assert_eq!(claims.sub, user);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = issue_jwt(Uuid::new_v4(), "secret", 60).unwrap();
        assert!(matches!(
            verify_jwt(&token, "other"),
            Err(AppError::Unauthorized)
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = issue_jwt(Uuid::new_v4(), "secret", -60).unwrap();
        assert!(verify_jwt(&token, "secret").is_err());
    }
}
