//! Bearer-token authentication.
//!
//! Tokens are HS256 JWTs whose `sub` is the username. Validation checks the
//! signature and expiry only; there is no revocation.

use std::time::Duration;

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use jsonwebtoken::{decode, encode, get_current_timestamp, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::config::Settings;
use crate::error::GatewayError;
use crate::state::AppState;

const INVALID_CREDENTIALS: &str = "Could not validate credentials";

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: u64,
}

/// Sign a token for `subject` expiring `ttl` from now.
pub fn issue_token(secret: &str, subject: &str, ttl: Duration) -> Result<String, GatewayError> {
    let claims = Claims {
        sub: subject.to_string(),
        exp: get_current_timestamp() + ttl.as_secs(),
    };
    sign(secret, &claims)
}

pub fn sign(secret: &str, claims: &Claims) -> Result<String, GatewayError> {
    encode(&Header::new(Algorithm::HS256), claims, &EncodingKey::from_secret(secret.as_bytes()))
        .map_err(|e| GatewayError::Internal(format!("token signing failed: {e}")))
}

/// Validate signature and expiry, returning the subject.
pub fn decode_token(secret: &str, token: &str) -> Result<String, GatewayError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    let data = decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation).map_err(|e| {
        tracing::debug!(error = %e, "token rejected");
        GatewayError::Unauthorized(INVALID_CREDENTIALS.to_string())
    })?;
    if data.claims.sub.is_empty() {
        return Err(GatewayError::Unauthorized("Invalid token payload".to_string()));
    }
    Ok(data.claims.sub)
}

/// Compare against the configured demo account.
pub fn verify_credentials(settings: &Settings, username: &str, password: &str) -> bool {
    let user_ok = username.as_bytes().ct_eq(settings.demo_username.as_bytes());
    let pass_ok = password.as_bytes().ct_eq(settings.demo_password.as_bytes());
    bool::from(user_ok & pass_ok)
}

/// The authenticated username, extracted from `Authorization: Bearer`.
#[derive(Debug, Clone)]
pub struct AuthUser(pub String);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| GatewayError::Unauthorized("Not authenticated".to_string()))?;
        let token = header
            .split_once(' ')
            .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
            .map(|(_, token)| token.trim())
            .ok_or_else(|| GatewayError::Unauthorized("Not authenticated".to_string()))?;
        let username = decode_token(&state.settings.secret_key, token)?;
        Ok(AuthUser(username))
    }
}
