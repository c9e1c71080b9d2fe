use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use bazaar_core::User;

use crate::error::AppError;
use crate::state::{AppState, AuthConfig};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: Uuid,
    pub phone: String,
    pub exp: usize,
}

pub fn issue_token(auth: &AuthConfig, user: &User) -> Result<String, AppError> {
    let claims = Claims {
        sub: user.id,
        phone: user.phone.clone(),
        exp: (Utc::now() + Duration::seconds(auth.expiration as i64)).timestamp() as usize,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(auth.secret.as_bytes()))
        .map_err(|e| AppError::Internal(format!("Token encoding failed: {}", e)))
}

fn bearer_claims(auth: &AuthConfig, headers: &HeaderMap) -> Result<Claims, AppError> {
    let bearer = headers
        .typed_get::<Authorization<Bearer>>()
        .ok_or_else(|| AppError::Authentication("Missing bearer token".into()))?;
    let data = decode::<Claims>(
        bearer.token(),
        &DecodingKey::from_secret(auth.secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(data.claims)
}

/// Any signed-in user. Handlers read the `Claims` extension.
pub async fn require_user(State(state): State<AppState>, mut req: Request, next: Next) -> Result<Response, AppError> {
    let claims = bearer_claims(&state.auth, req.headers())?;
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Signed-in users whose account carries the admin flag. The flag is read
/// from storage on every call so revocation applies immediately.
pub async fn require_admin(State(state): State<AppState>, mut req: Request, next: Next) -> Result<Response, AppError> {
    let claims = bearer_claims(&state.auth, req.headers())?;
    let user = state
        .accounts
        .get_user(claims.sub)
        .await?
        .ok_or_else(|| AppError::Authentication("Account no longer exists".into()))?;
    if !user.is_admin {
        return Err(AppError::Authorization("Admin access required".into()));
    }
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
