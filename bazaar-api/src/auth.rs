use axum::{
    extract::State,
    middleware,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use bazaar_core::otp::OtpChallenge;
use bazaar_core::{NewUser, User};
use bazaar_travel::TravelRoles;

use crate::error::{ApiResult, AppError};
use crate::middleware::auth::{issue_token, require_user, Claims};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct OtpRequest {
    phone: String,
}

#[derive(Debug, Serialize)]
struct OtpIssued {
    phone: String,
    expires_at: chrono::DateTime<Utc>,
}

/// First-time logins carry the profile fields needed to register.
#[derive(Debug, Deserialize)]
struct VerifyRequest {
    phone: String,
    code: String,
    name: Option<String>,
    email: Option<String>,
    country_code: Option<String>,
    country: Option<String>,
}

#[derive(Debug, Serialize)]
struct AuthResponse {
    token: String,
    user: User,
    is_new: bool,
}

#[derive(Debug, Serialize)]
struct Profile {
    #[serde(flatten)]
    user: User,
    travel_role: &'static str,
    travel: TravelRoles,
}

#[derive(Debug, Deserialize)]
struct ProfileUpdate {
    name: Option<String>,
    email: Option<String>,
}

pub fn routes(state: AppState) -> Router<AppState> {
    let me = Router::new()
        .route("/v1/me", get(me).put(update_me))
        .route_layer(middleware::from_fn_with_state(state, require_user));

    Router::new()
        .route("/v1/auth/otp/request", post(request_otp))
        .route("/v1/auth/otp/verify", post(verify_otp))
        .merge(me)
}

async fn request_otp(State(state): State<AppState>, Json(req): Json<OtpRequest>) -> ApiResult<Json<OtpIssued>> {
    let phone = req.phone.trim();
    if phone.is_empty() {
        return Err(AppError::Validation("The phone field must be set".into()));
    }
    let challenge = OtpChallenge::issue(phone, Utc::now());
    state.accounts.save_otp(&challenge).await?;
    state.otp_sender.send(&challenge).await?;

    Ok(Json(OtpIssued { phone: challenge.phone, expires_at: challenge.expires_at }))
}

async fn verify_otp(State(state): State<AppState>, Json(req): Json<VerifyRequest>) -> ApiResult<Json<AuthResponse>> {
    let phone = req.phone.trim().to_string();
    let existing = state.accounts.find_user_by_phone(&phone).await?;

    // Registration input is checked before the code is consumed so a
    // missing name does not burn the challenge.
    let registration = match (&existing, req.name) {
        (Some(_), _) => None,
        (None, Some(name)) => Some(User::register(NewUser {
            phone: phone.clone(),
            name,
            email: req.email,
            country_code: req.country_code.unwrap_or_else(|| "+91".to_string()),
            country: req.country,
        })?),
        (None, None) => return Err(AppError::Validation("Name is required to register a new account".into())),
    };

    let challenge = state
        .accounts
        .take_otp(&phone)
        .await?
        .ok_or_else(|| AppError::Authentication("No code was requested for this phone".into()))?;
    if !challenge.verify(&req.code, Utc::now()) {
        return Err(AppError::Authentication("Invalid or expired code".into()));
    }

    let (user, is_new) = match (existing, registration) {
        (Some(user), _) => (user, false),
        (None, Some(user)) => {
            state.accounts.create_user(&user).await?;
            tracing::info!(user_id = %user.id, "User registered");
            (user, true)
        }
        (None, None) => return Err(AppError::Internal("Registration state lost".into())),
    };

    let token = issue_token(&state.auth, &user)?;
    Ok(Json(AuthResponse { token, user, is_new }))
}

async fn me(State(state): State<AppState>, Extension(claims): Extension<Claims>) -> ApiResult<Json<Profile>> {
    let user = state
        .accounts
        .get_user(claims.sub)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    let travel = state.travel.roles(user.id).await?;
    Ok(Json(Profile { travel_role: travel.role_name(), travel, user }))
}

async fn update_me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(patch): Json<ProfileUpdate>,
) -> ApiResult<Json<User>> {
    let mut user = state
        .accounts
        .get_user(claims.sub)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    if let Some(name) = patch.name {
        user.name = name.trim().to_string();
    }
    if let Some(email) = patch.email {
        user.email = Some(email.trim().to_lowercase()).filter(|e| !e.is_empty());
    }
    user.validate()?;
    state.accounts.update_user(&user).await?;
    Ok(Json(user))
}
