use actix_web::{web, HttpResponse};
use chrono::Utc;
use sea_orm::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::handlers::claims_user_id;
use crate::middleware::auth::Claims;
use crate::models::user::{self, UserRole};
use crate::utils::auth::{create_jwt, hash_password, verify_password};
use crate::utils::config::Config;
use crate::utils::errors::ApiError;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub is_active: bool,
    pub upload_count: i32,
    pub chart_count: i32,
    pub last_login: Option<String>,
    pub created_at: String,
}

impl From<user::Model> for UserResponse {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id.to_string(),
            name: model.name,
            email: model.email,
            role: model.role,
            is_active: model.is_active,
            upload_count: model.upload_count,
            chart_count: model.chart_count,
            last_login: model.last_login.map(|t| t.to_rfc3339()),
            created_at: model.created_at.to_rfc3339(),
        }
    }
}

pub async fn register(
    db: web::Data<DatabaseConnection>,
    config: web::Data<Config>,
    req: web::Json<RegisterRequest>,
) -> Result<HttpResponse, ApiError> {
    log::info!("Registration attempt for email: {}", req.email);

    if !config.allow_registration {
        return Err(ApiError::Forbidden(
            "Registration is currently disabled".to_string(),
        ));
    }

    let name = req.name.trim();
    let email = req.email.trim().to_lowercase();

    if name.is_empty() || email.is_empty() || req.password.is_empty() {
        return Err(ApiError::Validation(
            "Name, email and password are required".to_string(),
        ));
    }
    if !email.contains('@') {
        return Err(ApiError::Validation("Invalid email address".to_string()));
    }
    if req.password.len() < 6 {
        return Err(ApiError::Validation(
            "Password must be at least 6 characters".to_string(),
        ));
    }

    let existing = user::Entity::find()
        .filter(user::Column::Email.eq(&email))
        .one(db.get_ref())
        .await?;
    if existing.is_some() {
        return Err(ApiError::Validation(
            "A user already exists with this email".to_string(),
        ));
    }

    let password_hash = hash_password(&req.password)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("Failed to hash password: {}", e)))?;

    let now = Utc::now();
    let account = user::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        email: Set(email),
        password_hash: Set(password_hash),
        role: Set(UserRole::User),
        is_active: Set(true),
        upload_count: Set(0),
        chart_count: Set(0),
        last_login: Set(Some(now)),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db.get_ref())
    .await?;

    log::info!("User '{}' created (ID: {})", account.email, account.id);

    let token = create_jwt(account.id, &config.jwt_secret, config.jwt_expiration_hours)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("Failed to generate token: {}", e)))?;

    Ok(HttpResponse::Created().json(serde_json::json!({
        "success": true,
        "message": "User registered successfully",
        "token": token,
        "user": UserResponse::from(account),
    })))
}

pub async fn login(
    db: web::Data<DatabaseConnection>,
    config: web::Data<Config>,
    req: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    log::info!("Login attempt for email: {}", req.email);

    let account = user::Entity::find()
        .filter(user::Column::Email.eq(req.email.trim().to_lowercase()))
        .one(db.get_ref())
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Invalid credentials".to_string()))?;

    if !account.is_active {
        return Err(ApiError::Unauthorized(
            "User account is deactivated".to_string(),
        ));
    }

    let valid = verify_password(&req.password, &account.password_hash)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("Failed to verify password: {}", e)))?;
    if !valid {
        log::warn!("Invalid password for '{}'", account.email);
        return Err(ApiError::Unauthorized("Invalid credentials".to_string()));
    }

    let mut active: user::ActiveModel = account.into();
    active.last_login = Set(Some(Utc::now()));
    active.updated_at = Set(Utc::now());
    let account = active.update(db.get_ref()).await?;

    let token = create_jwt(account.id, &config.jwt_secret, config.jwt_expiration_hours)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("Failed to generate token: {}", e)))?;

    log::info!("JWT token generated for '{}'", account.email);

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "token": token,
        "user": UserResponse::from(account),
    })))
}

/// GET /api/auth/me
pub async fn me(
    db: web::Data<DatabaseConnection>,
    user_claims: web::ReqData<Claims>,
) -> Result<HttpResponse, ApiError> {
    let user_id = claims_user_id(&user_claims)?;

    let account = user::Entity::find_by_id(user_id)
        .one(db.get_ref())
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User not found".to_string()))?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "user": UserResponse::from(account),
    })))
}
