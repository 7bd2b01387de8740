use axum::{
    extract::State,
    http::StatusCode,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::auth::extractor::AuthUser;
use crate::auth::password::{check_password_strength, hash_password, verify_password};
use crate::auth::token::IssuedToken;
use crate::errors::AppError;
use crate::extract::{Json, Path, Query};
use crate::models::user::{NewUser, ProfileUpdate, UserPublic, UserResponse, UserRole};
use crate::models::Page;
use crate::state::AppState;

const MAX_USERNAME_LEN: usize = 50;
const LOGIN_FAILED: &str = "Incorrect username or password";

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: Option<UserRole>,
    pub full_name: Option<String>,
    pub research_specialization: Option<String>,
    pub organization_id: Option<String>,
    pub bio: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordChangeRequest {
    pub old_password: String,
    pub new_password: String,
}

pub fn validate_username(username: &str) -> Result<(), AppError> {
    if username.is_empty() || !username.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(AppError::Validation("Username must be alphanumeric".into()));
    }
    if username.len() > MAX_USERNAME_LEN {
        return Err(AppError::Validation(format!(
            "Username must be at most {MAX_USERNAME_LEN} characters"
        )));
    }
    Ok(())
}

/// Accepts `local@domain.tld`-shaped addresses; deliverability is not checked.
pub fn validate_email(email: &str) -> Result<(), AppError> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(AppError::Validation("Invalid email address".into()))
    }
}

/// POST /api/v1/auth/register
pub async fn handle_register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    let username = req.username.trim().to_string();
    let email = req.email.trim().to_lowercase();
    validate_username(&username)?;
    validate_email(&email)?;
    check_password_strength(&req.password)?;

    if let Some(role) = req.role {
        if role != UserRole::Researcher {
            return Err(AppError::Forbidden(
                "Self-registration can only create researcher accounts".into(),
            ));
        }
    }

    if state.store.user_by_username(&username).await?.is_some() {
        return Err(AppError::Conflict("Username already registered".into()));
    }
    if state.store.user_by_email(&email).await?.is_some() {
        return Err(AppError::Conflict("Email already registered".into()));
    }

    // The unique constraints still catch a concurrent registration.
    let password_hash = hash_password(req.password).await?;
    let user = state
        .store
        .insert_user(NewUser {
            username,
            email,
            password_hash,
            role: UserRole::Researcher,
            full_name: req.full_name,
            research_specialization: req.research_specialization,
            organization_id: req.organization_id,
            bio: req.bio,
        })
        .await?;

    info!("Registered researcher '{}' ({})", user.username, user.id);
    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

/// POST /api/v1/auth/login
pub async fn handle_login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<IssuedToken>, AppError> {
    let user = state
        .store
        .user_by_username(req.username.trim())
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| AppError::Unauthorized(LOGIN_FAILED.into()))?;

    if !verify_password(req.password, user.password_hash.clone()).await? {
        return Err(AppError::Unauthorized(LOGIN_FAILED.into()));
    }

    state.store.record_login(user.id, Utc::now()).await?;
    let issued = state.tokens.issue(user.id, &user.username, user.role())?;
    info!("User '{}' logged in", user.username);
    Ok(Json(issued))
}

/// GET /api/v1/auth/me
pub async fn handle_me(AuthUser(user): AuthUser) -> Json<UserResponse> {
    Json(UserResponse::from(user))
}

/// PUT /api/v1/auth/me
pub async fn handle_update_me(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<UserResponse>, AppError> {
    let user = state
        .store
        .update_profile(auth.id(), update)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    Ok(Json(UserResponse::from(user)))
}

/// POST /api/v1/auth/me/change-password
pub async fn handle_change_password(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(req): Json<PasswordChangeRequest>,
) -> Result<Json<Value>, AppError> {
    check_password_strength(&req.new_password)?;
    if !verify_password(req.old_password, user.password_hash.clone()).await? {
        return Err(AppError::Validation("Incorrect old password".into()));
    }
    let new_hash = hash_password(req.new_password).await?;
    state.store.set_password_hash(user.id, &new_hash).await?;
    info!("User '{}' changed their password", user.username);
    Ok(Json(json!({ "message": "Password changed successfully" })))
}

/// DELETE /api/v1/auth/me
pub async fn handle_delete_me(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Value>, AppError> {
    state.store.deactivate_user(auth.id()).await?;
    info!("Deactivated account {}", auth.id());
    Ok(Json(json!({ "message": "Account deleted successfully" })))
}

/// GET /api/v1/auth/users
pub async fn handle_list_users(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(page): Query<Page>,
) -> Result<Json<Vec<UserPublic>>, AppError> {
    let users = state.store.list_active_users(page.normalized()).await?;
    Ok(Json(users.into_iter().map(UserPublic::from).collect()))
}

/// GET /api/v1/auth/users/:id
pub async fn handle_get_user(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<UserPublic>, AppError> {
    let user = state
        .store
        .user_by_id(id)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    Ok(Json(UserPublic::from(user)))
}
