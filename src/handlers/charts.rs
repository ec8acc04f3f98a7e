use actix_web::{web, HttpResponse};
use chrono::Utc;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::sea_query::Expr;
use sea_orm::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::handlers::{claims_user_id, page_params, Pagination};
use crate::middleware::auth::Claims;
use crate::models::chart::{self, ChartType};
use crate::models::upload::{self, UploadStatus};
use crate::models::user;
use crate::services::chart_data;
use crate::utils::errors::ApiError;

// ============ Request/Response DTOs ============

#[derive(Debug, Deserialize)]
pub struct AxisSelection {
    pub label: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateChartRequest {
    pub upload_id: String,
    pub title: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub chart_type: String,
    pub x_axis: AxisSelection,
    pub y_axis: AxisSelection,
    pub configuration: Option<Value>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateChartRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub chart_type: Option<String>,
    pub configuration: Option<Value>,
    pub tags: Option<Vec<String>>,
    pub is_public: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ChartsQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    #[serde(rename = "type")]
    pub chart_type: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AxisResponse {
    pub label: String,
    pub data: Value,
}

#[derive(Debug, Serialize)]
pub struct AxisLabelResponse {
    pub label: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartResponse {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub chart_type: ChartType,
    pub x_axis: AxisResponse,
    pub y_axis: AxisResponse,
    pub configuration: Value,
    pub is_public: bool,
    pub tags: Vec<String>,
    pub download_count: i32,
    pub upload_id: String,
    pub created_at: String,
}

impl From<chart::Model> for ChartResponse {
    fn from(model: chart::Model) -> Self {
        Self {
            id: model.id.to_string(),
            title: model.title,
            description: model.description,
            chart_type: model.chart_type,
            x_axis: AxisResponse {
                label: model.x_axis_label,
                data: model.x_axis_data,
            },
            y_axis: AxisResponse {
                label: model.y_axis_label,
                data: model.y_axis_data,
            },
            configuration: model.configuration,
            is_public: model.is_public,
            tags: model.tags,
            download_count: model.download_count,
            upload_id: model.upload_id.to_string(),
            created_at: model.created_at.to_rfc3339(),
        }
    }
}

/// Chart without the axis data arrays, used for list responses.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSummaryResponse {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub chart_type: ChartType,
    pub x_axis: AxisLabelResponse,
    pub y_axis: AxisLabelResponse,
    pub configuration: Value,
    pub is_public: bool,
    pub tags: Vec<String>,
    pub download_count: i32,
    pub upload_id: String,
    pub created_at: String,
}

impl From<chart::Model> for ChartSummaryResponse {
    fn from(model: chart::Model) -> Self {
        Self {
            id: model.id.to_string(),
            title: model.title,
            description: model.description,
            chart_type: model.chart_type,
            x_axis: AxisLabelResponse {
                label: model.x_axis_label,
            },
            y_axis: AxisLabelResponse {
                label: model.y_axis_label,
            },
            configuration: model.configuration,
            is_public: model.is_public,
            tags: model.tags,
            download_count: model.download_count,
            upload_id: model.upload_id.to_string(),
            created_at: model.created_at.to_rfc3339(),
        }
    }
}

fn parse_chart_type(value: &str) -> Result<ChartType, ApiError> {
    let chart_type = match value {
        "bar" => ChartType::Bar,
        "line" => ChartType::Line,
        "pie" => ChartType::Pie,
        "scatter" => ChartType::Scatter,
        "bar3d" => ChartType::Bar3d,
        "line3d" => ChartType::Line3d,
        "scatter3d" => ChartType::Scatter3d,
        _ => return Err(ApiError::Validation("Invalid chart type".to_string())),
    };
    Ok(chart_type)
}

fn validate_title(title: &str) -> Result<String, ApiError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ApiError::Validation("Chart title is required".to_string()));
    }
    if title.chars().count() > 100 {
        return Err(ApiError::Validation(
            "Title cannot be more than 100 characters".to_string(),
        ));
    }
    Ok(title.to_string())
}

fn validate_description(description: &str) -> Result<String, ApiError> {
    if description.chars().count() > 500 {
        return Err(ApiError::Validation(
            "Description cannot be more than 500 characters".to_string(),
        ));
    }
    Ok(description.to_string())
}

/// POST /api/charts
/// Resolve the source upload, extract the axis data, persist the chart.
pub async fn create_chart(
    db: web::Data<DatabaseConnection>,
    user_claims: web::ReqData<Claims>,
    req: web::Json<CreateChartRequest>,
) -> Result<HttpResponse, ApiError> {
    let user_id = claims_user_id(&user_claims)?;

    let title = validate_title(&req.title)?;
    let chart_type = parse_chart_type(&req.chart_type)?;
    let description = match &req.description {
        Some(description) => Some(validate_description(description)?),
        None => None,
    };
    if req.x_axis.label.is_empty() || req.y_axis.label.is_empty() {
        return Err(ApiError::Validation(
            "X-axis and Y-axis labels are required".to_string(),
        ));
    }
    let upload_id = Uuid::parse_str(&req.upload_id)
        .map_err(|_| ApiError::Validation("Invalid upload ID".to_string()))?;

    let source = upload::Entity::find_by_id(upload_id)
        .filter(upload::Column::UserId.eq(user_id))
        .filter(upload::Column::Status.eq(UploadStatus::Completed))
        .one(db.get_ref())
        .await?
        .ok_or_else(|| ApiError::NotFound("Upload not found or not accessible".to_string()))?;

    let rows = chart_data::rows_from_payload(source.data.as_ref());
    let (x_values, y_values) =
        chart_data::extract_axes(&source.headers, &rows, &req.x_axis.label, &req.y_axis.label)
            .map_err(|e| ApiError::Validation(e.to_string()))?;

    let now = Utc::now();
    let record = chart::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        upload_id: Set(source.id),
        title: Set(title),
        description: Set(description),
        chart_type: Set(chart_type),
        x_axis_label: Set(req.x_axis.label.clone()),
        x_axis_data: Set(Value::Array(x_values)),
        y_axis_label: Set(req.y_axis.label.clone()),
        y_axis_data: Set(Value::Array(y_values)),
        configuration: Set(req
            .configuration
            .clone()
            .unwrap_or_else(|| serde_json::json!({}))),
        is_public: Set(false),
        tags: Set(req.tags.clone().unwrap_or_default()),
        download_count: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db.get_ref())
    .await?;

    user::Entity::update_many()
        .col_expr(
            user::Column::ChartCount,
            Expr::col(user::Column::ChartCount).add(1),
        )
        .filter(user::Column::Id.eq(user_id))
        .exec(db.get_ref())
        .await?;

    log::info!("Chart {} created from upload {}", record.id, record.upload_id);

    Ok(HttpResponse::Created().json(serde_json::json!({
        "success": true,
        "message": "Chart created successfully",
        "chart": ChartResponse::from(record),
    })))
}

/// GET /api/charts
/// The caller's charts with optional type filter and case-insensitive
/// search over title or tags. Axis data is left out of the payload.
pub async fn list_charts(
    db: web::Data<DatabaseConnection>,
    user_claims: web::ReqData<Claims>,
    query: web::Query<ChartsQuery>,
) -> Result<HttpResponse, ApiError> {
    let user_id = claims_user_id(&user_claims)?;
    let (page, limit, offset) = page_params(query.page, query.limit);

    let mut base = chart::Entity::find().filter(chart::Column::UserId.eq(user_id));

    if let Some(type_filter) = &query.chart_type {
        base = base.filter(chart::Column::ChartType.eq(parse_chart_type(type_filter)?));
    }

    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        base = base.filter(
            Condition::any()
                .add(Expr::col(chart::Column::Title).ilike(pattern.clone()))
                .add(Expr::cust_with_values(
                    "EXISTS (SELECT 1 FROM unnest(tags) AS tag WHERE tag ILIKE ?)",
                    [pattern],
                )),
        );
    }

    let total = base.clone().count(db.get_ref()).await?;
    let charts = base
        .order_by_desc(chart::Column::CreatedAt)
        .limit(limit)
        .offset(offset)
        .all(db.get_ref())
        .await?;

    let charts: Vec<ChartSummaryResponse> = charts.into_iter().map(Into::into).collect();

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "charts": charts,
        "pagination": Pagination::new(page, limit, total),
    })))
}

/// GET /api/charts/{id}
pub async fn get_chart(
    db: web::Data<DatabaseConnection>,
    user_claims: web::ReqData<Claims>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let user_id = claims_user_id(&user_claims)?;

    let record = chart::Entity::find_by_id(path.into_inner())
        .filter(chart::Column::UserId.eq(user_id))
        .one(db.get_ref())
        .await?
        .ok_or_else(|| ApiError::NotFound("Chart not found".to_string()))?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "chart": ChartResponse::from(record),
    })))
}

/// PUT /api/charts/{id}
/// Partial update; `configuration` is merged key-by-key, not replaced.
pub async fn update_chart(
    db: web::Data<DatabaseConnection>,
    user_claims: web::ReqData<Claims>,
    path: web::Path<Uuid>,
    req: web::Json<UpdateChartRequest>,
) -> Result<HttpResponse, ApiError> {
    let user_id = claims_user_id(&user_claims)?;

    let record = chart::Entity::find_by_id(path.into_inner())
        .filter(chart::Column::UserId.eq(user_id))
        .one(db.get_ref())
        .await?
        .ok_or_else(|| ApiError::NotFound("Chart not found".to_string()))?;

    let existing_configuration = record.configuration.clone();
    let mut active: chart::ActiveModel = record.into();

    if let Some(title) = &req.title {
        active.title = Set(validate_title(title)?);
    }
    if let Some(description) = &req.description {
        active.description = Set(Some(validate_description(description)?));
    }
    if let Some(type_value) = &req.chart_type {
        active.chart_type = Set(parse_chart_type(type_value)?);
    }
    if let Some(patch) = &req.configuration {
        active.configuration = Set(chart_data::merge_configuration(
            existing_configuration,
            patch.clone(),
        ));
    }
    if let Some(tags) = &req.tags {
        active.tags = Set(tags.clone());
    }
    if let Some(is_public) = req.is_public {
        active.is_public = Set(is_public);
    }
    active.updated_at = Set(Utc::now());

    let record = active.update(db.get_ref()).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "Chart updated successfully",
        "chart": ChartResponse::from(record),
    })))
}

/// DELETE /api/charts/{id}
pub async fn delete_chart(
    db: web::Data<DatabaseConnection>,
    user_claims: web::ReqData<Claims>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let user_id = claims_user_id(&user_claims)?;

    let record = chart::Entity::find_by_id(path.into_inner())
        .filter(chart::Column::UserId.eq(user_id))
        .one(db.get_ref())
        .await?
        .ok_or_else(|| ApiError::NotFound("Chart not found".to_string()))?;

    chart::Entity::delete_by_id(record.id)
        .exec(db.get_ref())
        .await?;

    user::Entity::update_many()
        .col_expr(
            user::Column::ChartCount,
            Expr::col(user::Column::ChartCount).sub(1),
        )
        .filter(user::Column::Id.eq(user_id))
        .exec(db.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "Chart deleted successfully",
    })))
}

/// POST /api/charts/{id}/download
/// The increment happens in a single UPDATE so concurrent downloads never
/// lose a count.
pub async fn record_download(
    db: web::Data<DatabaseConnection>,
    user_claims: web::ReqData<Claims>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let user_id = claims_user_id(&user_claims)?;
    let chart_id = path.into_inner();

    let result = chart::Entity::update_many()
        .col_expr(
            chart::Column::DownloadCount,
            Expr::col(chart::Column::DownloadCount).add(1),
        )
        .col_expr(chart::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(chart::Column::Id.eq(chart_id))
        .filter(chart::Column::UserId.eq(user_id))
        .exec(db.get_ref())
        .await?;

    if result.rows_affected == 0 {
        return Err(ApiError::NotFound("Chart not found".to_string()));
    }

    let record = chart::Entity::find_by_id(chart_id)
        .one(db.get_ref())
        .await?
        .ok_or_else(|| ApiError::NotFound("Chart not found".to_string()))?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "Download recorded successfully",
        "downloadCount": record.download_count,
    })))
}

#[derive(Debug, FromQueryResult)]
struct TypeSummaryRow {
    chart_type: ChartType,
    count: i64,
    total_downloads: Option<i64>,
}

/// GET /api/charts/types/summary
/// Per-type chart counts and download totals for the caller.
pub async fn get_types_summary(
    db: web::Data<DatabaseConnection>,
    user_claims: web::ReqData<Claims>,
) -> Result<HttpResponse, ApiError> {
    let user_id = claims_user_id(&user_claims)?;

    let rows = chart::Entity::find()
        .select_only()
        .column(chart::Column::ChartType)
        .column_as(chart::Column::Id.count(), "count")
        .column_as(chart::Column::DownloadCount.sum(), "total_downloads")
        .filter(chart::Column::UserId.eq(user_id))
        .group_by(chart::Column::ChartType)
        .order_by_desc(Expr::cust("count"))
        .into_model::<TypeSummaryRow>()
        .all(db.get_ref())
        .await?;

    let account = user::Entity::find_by_id(user_id).one(db.get_ref()).await?;

    let total_charts: i64 = rows.iter().map(|row| row.count).sum();
    let total_downloads: i64 = rows
        .iter()
        .map(|row| row.total_downloads.unwrap_or(0))
        .sum();
    let charts_by_type: Vec<Value> = rows
        .iter()
        .map(|row| {
            serde_json::json!({
                "type": row.chart_type,
                "count": row.count,
                "totalDownloads": row.total_downloads.unwrap_or(0),
            })
        })
        .collect();

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "totalUploads": account.map(|a| a.upload_count).unwrap_or(0),
        "totalCharts": total_charts,
        "totalDownloads": total_downloads,
        "chartsByType": charts_by_type,
    })))
}
