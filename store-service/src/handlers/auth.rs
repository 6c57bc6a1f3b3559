use crate::dtos::user::{
    LoginRequest, LoginResponse, RegisterRequest, SendVerificationRequest, UserDto,
    VerifyCodeRequest,
};
use crate::models::User;
use crate::startup::AppState;
use crate::utils::password::{generate_verification_code, Password, PASSWORD_POLICY_MESSAGE};
use crate::utils::validation::invalid;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::{Duration, Utc};
use serde_json::json;
use service_core::error::AppError;
use validator::Validate;

/// How long a mailed reset code stays usable.
pub const VERIFICATION_TTL_MINUTES: i64 = 30;

const VERIFICATION_CODE_LEN: usize = 6;

fn check_password_policy(password: &Password) -> Result<(), AppError> {
    if password.meets_policy() {
        Ok(())
    } else {
        Err(invalid("password", PASSWORD_POLICY_MESSAGE))
    }
}

/// Uniqueness, password policy, then field rules; shared by self-registration
/// and admin user creation.
pub(crate) async fn create_account(state: &AppState, req: RegisterRequest) -> Result<User, AppError> {
    if state.users.find_by_email(&req.email).await?.is_some() {
        return Err(AppError::Conflict(anyhow::anyhow!("Email Already Exists")));
    }
    if state.users.find_by_phone(&req.phone_number).await?.is_some() {
        return Err(AppError::Conflict(anyhow::anyhow!("Phone Number Already Exists")));
    }

    let password = Password::new(req.password.clone());
    check_password_policy(&password)?;
    req.validate()?;

    let hash = password.hash()?;
    let user = req.into_user(hash.into_string());
    state.users.create(&user).await?;

    tracing::info!(user_id = %user.id, "User account created");
    Ok(user)
}

#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let rejected = || AppError::Unauthorized(anyhow::anyhow!("The Credentials Dont Match Any User"));

    let user = state.users.find_by_email(&req.email).await?.ok_or_else(rejected)?;
    if !Password::new(req.password).matches(&user.password) {
        tracing::warn!(user_id = %user.id, "Login rejected: password mismatch");
        return Err(rejected());
    }

    let token = state.jwt.issue(&user.id.to_hex())?;
    let roles = state.access.roles_by_ids(&user.roles).await?;
    let roles = state.access.populate(roles).await?;

    tracing::info!(user_id = %user.id, "User logged in");
    Ok(Json(LoginResponse {
        token,
        user: UserDto::new(&user, &roles),
    }))
}

#[axum::debug_handler]
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = create_account(&state, req).await?;
    Ok((StatusCode::CREATED, Json(UserDto::new(&user, &[]))))
}

pub async fn send_verification(
    State(state): State<AppState>,
    Json(req): Json<SendVerificationRequest>,
) -> Result<impl IntoResponse, AppError> {
    if state.users.find_by_email(&req.email).await?.is_some() {
        let code = generate_verification_code(VERIFICATION_CODE_LEN);
        state.users.upsert_verification(&req.email, &code).await?;

        if let Err(e) = state.email.send_verification_code(&req.email, &code).await {
            tracing::error!(error = %e, "Failed to send verification code");
        }
    } else {
        tracing::debug!("Verification requested for unknown email");
    }

    Ok(Json(json!({ "message": "Code Sent Successfully" })))
}

pub async fn verify_code(
    State(state): State<AppState>,
    Json(req): Json<VerifyCodeRequest>,
) -> Result<impl IntoResponse, AppError> {
    // 1. Code must be unused and recent
    let issued_after = Utc::now() - Duration::minutes(VERIFICATION_TTL_MINUTES);
    let verification = state
        .users
        .find_valid_verification(&req.email, &req.code, issued_after)
        .await?
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Invalid or expired verification code")))?;

    // 2. New password must satisfy the policy
    let password = Password::new(req.new_password);
    check_password_policy(&password)?;

    // 3. Swap the hash and burn the code
    let user = state
        .users
        .find_by_email(&req.email)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("No user Found")))?;
    let hash = password.hash()?;
    state.users.update_password(user.id, hash.as_str()).await?;
    state.users.mark_verification_used(verification.id).await?;

    tracing::info!(user_id = %user.id, "Password reset via verification code");
    Ok(Json(json!({ "message": "Password reset Successfully" })))
}
