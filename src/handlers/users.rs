use actix_web::{web, HttpResponse};
use chrono::{Duration, Utc};
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::sea_query::Expr;
use sea_orm::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::handlers::auth::UserResponse;
use crate::handlers::{claims_user_id, page_params, Pagination};
use crate::middleware::auth::Claims;
use crate::models::chart::{self, ChartType};
use crate::models::upload::{self, UploadStatus};
use crate::models::user::{self, UserRole};
use crate::services::storage;
use crate::utils::errors::ApiError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsersQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub search: Option<String>,
    pub role: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    pub is_active: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: String,
}

/// All /api/users endpoints are admin-only.
async fn require_admin(db: &DatabaseConnection, user_id: Uuid) -> Result<user::Model, ApiError> {
    let account = user::Entity::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User not found".to_string()))?;

    if account.role != UserRole::Admin {
        return Err(ApiError::Forbidden("Admin access required".to_string()));
    }

    Ok(account)
}

fn parse_role(value: &str) -> Result<UserRole, ApiError> {
    match value {
        "user" => Ok(UserRole::User),
        "admin" => Ok(UserRole::Admin),
        _ => Err(ApiError::Validation(
            "Invalid role. Must be either \"user\" or \"admin\"".to_string(),
        )),
    }
}

/// GET /api/users
pub async fn list_users(
    db: web::Data<DatabaseConnection>,
    user_claims: web::ReqData<Claims>,
    query: web::Query<UsersQuery>,
) -> Result<HttpResponse, ApiError> {
    let admin_id = claims_user_id(&user_claims)?;
    require_admin(db.get_ref(), admin_id).await?;

    let (page, limit, offset) = page_params(query.page, query.limit);

    let mut base = user::Entity::find();

    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        base = base.filter(
            Condition::any()
                .add(Expr::col(user::Column::Name).ilike(pattern.clone()))
                .add(Expr::col(user::Column::Email).ilike(pattern)),
        );
    }
    if let Some(role) = &query.role {
        base = base.filter(user::Column::Role.eq(parse_role(role)?));
    }
    if let Some(is_active) = query.is_active {
        base = base.filter(user::Column::IsActive.eq(is_active));
    }

    let total = base.clone().count(db.get_ref()).await?;
    let users = base
        .order_by_desc(user::Column::CreatedAt)
        .limit(limit)
        .offset(offset)
        .all(db.get_ref())
        .await?;

    let users: Vec<UserResponse> = users.into_iter().map(Into::into).collect();

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "users": users,
        "pagination": Pagination::new(page, limit, total),
    })))
}

#[derive(Debug, FromQueryResult)]
struct ChartTypeCount {
    chart_type: ChartType,
    count: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TopUserResponse {
    name: String,
    email: String,
    upload_count: i32,
    chart_count: i32,
    last_login: Option<String>,
}

/// GET /api/users/stats
/// Platform-wide statistics for the admin dashboard.
pub async fn get_user_stats(
    db: web::Data<DatabaseConnection>,
    user_claims: web::ReqData<Claims>,
) -> Result<HttpResponse, ApiError> {
    let admin_id = claims_user_id(&user_claims)?;
    require_admin(db.get_ref(), admin_id).await?;

    let total_users = user::Entity::find().count(db.get_ref()).await?;
    let active_users = user::Entity::find()
        .filter(user::Column::IsActive.eq(true))
        .count(db.get_ref())
        .await?;
    let admin_users = user::Entity::find()
        .filter(user::Column::Role.eq(UserRole::Admin))
        .count(db.get_ref())
        .await?;
    let total_uploads = upload::Entity::find().count(db.get_ref()).await?;
    let successful_uploads = upload::Entity::find()
        .filter(upload::Column::Status.eq(UploadStatus::Completed))
        .count(db.get_ref())
        .await?;
    let total_charts = chart::Entity::find().count(db.get_ref()).await?;

    let thirty_days_ago = Utc::now() - Duration::days(30);
    let new_users = user::Entity::find()
        .filter(user::Column::CreatedAt.gte(thirty_days_ago))
        .count(db.get_ref())
        .await?;
    let new_uploads = upload::Entity::find()
        .filter(upload::Column::CreatedAt.gte(thirty_days_ago))
        .count(db.get_ref())
        .await?;
    let new_charts = chart::Entity::find()
        .filter(chart::Column::CreatedAt.gte(thirty_days_ago))
        .count(db.get_ref())
        .await?;

    let chart_types = chart::Entity::find()
        .select_only()
        .column(chart::Column::ChartType)
        .column_as(chart::Column::Id.count(), "count")
        .group_by(chart::Column::ChartType)
        .order_by_desc(Expr::cust("count"))
        .into_model::<ChartTypeCount>()
        .all(db.get_ref())
        .await?;
    let chart_types: Vec<Value> = chart_types
        .iter()
        .map(|row| serde_json::json!({"type": row.chart_type, "count": row.count}))
        .collect();

    let top_users = user::Entity::find()
        .filter(user::Column::IsActive.eq(true))
        .order_by_desc(user::Column::UploadCount)
        .order_by_desc(user::Column::ChartCount)
        .limit(5)
        .all(db.get_ref())
        .await?;
    let top_users: Vec<TopUserResponse> = top_users
        .into_iter()
        .map(|account| TopUserResponse {
            name: account.name,
            email: account.email,
            upload_count: account.upload_count,
            chart_count: account.chart_count,
            last_login: account.last_login.map(|t| t.to_rfc3339()),
        })
        .collect();

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "stats": {
            "overview": {
                "totalUsers": total_users,
                "activeUsers": active_users,
                "adminUsers": admin_users,
                "totalUploads": total_uploads,
                "successfulUploads": successful_uploads,
                "totalCharts": total_charts,
            },
            "recent": {
                "newUsers": new_users,
                "newUploads": new_uploads,
                "newCharts": new_charts,
            },
            "chartTypes": chart_types,
            "topUsers": top_users,
        },
    })))
}

/// GET /api/users/{id}
pub async fn get_user(
    db: web::Data<DatabaseConnection>,
    user_claims: web::ReqData<Claims>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let admin_id = claims_user_id(&user_claims)?;
    require_admin(db.get_ref(), admin_id).await?;

    let target_id = path.into_inner();
    let target = user::Entity::find_by_id(target_id)
        .one(db.get_ref())
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    let recent_uploads = upload::Entity::find()
        .filter(upload::Column::UserId.eq(target_id))
        .order_by_desc(upload::Column::CreatedAt)
        .limit(5)
        .all(db.get_ref())
        .await?;
    let recent_uploads: Vec<Value> = recent_uploads
        .iter()
        .map(|record| {
            serde_json::json!({
                "id": record.id.to_string(),
                "originalName": record.original_name,
                "status": record.status,
                "createdAt": record.created_at.to_rfc3339(),
            })
        })
        .collect();

    let recent_charts = chart::Entity::find()
        .filter(chart::Column::UserId.eq(target_id))
        .order_by_desc(chart::Column::CreatedAt)
        .limit(5)
        .all(db.get_ref())
        .await?;
    let recent_charts: Vec<Value> = recent_charts
        .iter()
        .map(|record| {
            serde_json::json!({
                "id": record.id.to_string(),
                "title": record.title,
                "type": record.chart_type,
                "createdAt": record.created_at.to_rfc3339(),
            })
        })
        .collect();

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "user": UserResponse::from(target),
        "recentActivity": {
            "uploads": recent_uploads,
            "charts": recent_charts,
        },
    })))
}

/// PUT /api/users/{id}/status
pub async fn update_user_status(
    db: web::Data<DatabaseConnection>,
    user_claims: web::ReqData<Claims>,
    path: web::Path<Uuid>,
    req: web::Json<UpdateStatusRequest>,
) -> Result<HttpResponse, ApiError> {
    let admin_id = claims_user_id(&user_claims)?;
    let admin = require_admin(db.get_ref(), admin_id).await?;

    let target_id = path.into_inner();
    let target = user::Entity::find_by_id(target_id)
        .one(db.get_ref())
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    if admin.id == target_id && !req.is_active {
        return Err(ApiError::Validation(
            "You cannot deactivate your own account".to_string(),
        ));
    }

    let mut active: user::ActiveModel = target.into();
    active.is_active = Set(req.is_active);
    active.updated_at = Set(Utc::now());
    let updated = active.update(db.get_ref()).await?;

    let action = if updated.is_active {
        "activated"
    } else {
        "deactivated"
    };

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": format!("User {} successfully", action),
        "user": {
            "id": updated.id.to_string(),
            "name": updated.name,
            "email": updated.email,
            "isActive": updated.is_active,
        },
    })))
}

/// PUT /api/users/{id}/role
pub async fn update_user_role(
    db: web::Data<DatabaseConnection>,
    user_claims: web::ReqData<Claims>,
    path: web::Path<Uuid>,
    req: web::Json<UpdateRoleRequest>,
) -> Result<HttpResponse, ApiError> {
    let admin_id = claims_user_id(&user_claims)?;
    let admin = require_admin(db.get_ref(), admin_id).await?;

    let role = parse_role(&req.role)?;

    let target_id = path.into_inner();
    let target = user::Entity::find_by_id(target_id)
        .one(db.get_ref())
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    if admin.id == target_id && role == UserRole::User {
        return Err(ApiError::Validation(
            "You cannot change your own role to user".to_string(),
        ));
    }

    let mut active: user::ActiveModel = target.into();
    active.role = Set(role);
    active.updated_at = Set(Utc::now());
    let updated = active.update(db.get_ref()).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": format!("User role updated to {} successfully", req.role),
        "user": {
            "id": updated.id.to_string(),
            "name": updated.name,
            "email": updated.email,
            "role": updated.role,
        },
    })))
}

/// DELETE /api/users/{id}
/// Removes the user with their uploads (including stored files) and charts.
pub async fn delete_user(
    db: web::Data<DatabaseConnection>,
    user_claims: web::ReqData<Claims>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let admin_id = claims_user_id(&user_claims)?;
    let admin = require_admin(db.get_ref(), admin_id).await?;

    let target_id = path.into_inner();
    let target = user::Entity::find_by_id(target_id)
        .one(db.get_ref())
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    if admin.id == target.id {
        return Err(ApiError::Validation(
            "You cannot delete your own account".to_string(),
        ));
    }

    let uploads = upload::Entity::find()
        .filter(upload::Column::UserId.eq(target_id))
        .all(db.get_ref())
        .await?;
    for record in &uploads {
        if let Err(e) = storage::remove_upload_file(&record.file_path) {
            log::warn!("Failed to remove {}: {}", record.file_path, e);
        }
    }

    chart::Entity::delete_many()
        .filter(chart::Column::UserId.eq(target_id))
        .exec(db.get_ref())
        .await?;
    upload::Entity::delete_many()
        .filter(upload::Column::UserId.eq(target_id))
        .exec(db.get_ref())
        .await?;
    user::Entity::delete_by_id(target_id)
        .exec(db.get_ref())
        .await?;

    log::info!("User {} deleted with {} uploads", target_id, uploads.len());

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "User and all associated data deleted successfully",
    })))
}
