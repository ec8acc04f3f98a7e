use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use chrono::Utc;
use futures_util::StreamExt;
use sea_orm::sea_query::Expr;
use sea_orm::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::handlers::{claims_user_id, page_params, Pagination};
use crate::middleware::auth::Claims;
use crate::models::upload::{self, UploadStatus};
use crate::models::user;
use crate::services::excel_parser::{self, ParsedSheet};
use crate::services::storage;
use crate::utils::config::Config;
use crate::utils::errors::ApiError;

const MAX_FILE_SIZE: usize = 10 * 1024 * 1024; // 10MB

const ALLOWED_MIME_TYPES: [&str; 2] = [
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet", // .xlsx
    "application/vnd.ms-excel",                                          // .xls
];

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

/// Upload record without the table payload, used for list responses.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSummaryResponse {
    pub id: String,
    pub file_name: String,
    pub original_name: String,
    pub file_size: i64,
    pub mime_type: String,
    pub headers: Vec<String>,
    pub row_count: i32,
    pub column_count: i32,
    pub status: UploadStatus,
    pub error_message: Option<String>,
    pub uploaded_at: String,
}

impl From<upload::Model> for UploadSummaryResponse {
    fn from(model: upload::Model) -> Self {
        Self {
            id: model.id.to_string(),
            file_name: model.file_name,
            original_name: model.original_name,
            file_size: model.file_size,
            mime_type: model.mime_type,
            headers: model.headers,
            row_count: model.row_count,
            column_count: model.column_count,
            status: model.status,
            error_message: model.error_message,
            uploaded_at: model.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadDetailResponse {
    pub id: String,
    pub file_name: String,
    pub original_name: String,
    pub file_size: i64,
    pub mime_type: String,
    pub headers: Vec<String>,
    pub row_count: i32,
    pub column_count: i32,
    pub status: UploadStatus,
    pub error_message: Option<String>,
    pub data: Option<Value>,
    pub uploaded_at: String,
}

impl From<upload::Model> for UploadDetailResponse {
    fn from(model: upload::Model) -> Self {
        Self {
            id: model.id.to_string(),
            file_name: model.file_name,
            original_name: model.original_name,
            file_size: model.file_size,
            mime_type: model.mime_type,
            headers: model.headers,
            row_count: model.row_count,
            column_count: model.column_count,
            status: model.status,
            error_message: model.error_message,
            data: model.data,
            uploaded_at: model.created_at.to_rfc3339(),
        }
    }
}

struct IncomingFile {
    original_name: String,
    mime_type: String,
    bytes: Vec<u8>,
}

async fn read_excel_field(payload: &mut Multipart) -> Result<Option<IncomingFile>, ApiError> {
    while let Some(item) = payload.next().await {
        let mut field = item
            .map_err(|e| ApiError::Validation(format!("Invalid multipart payload: {}", e)))?;

        let name = field
            .content_disposition()
            .and_then(|cd| cd.get_name().map(|n| n.to_string()))
            .unwrap_or_default();
        if name != "excelFile" {
            continue;
        }

        let original_name = field
            .content_disposition()
            .and_then(|cd| cd.get_filename().map(|f| f.to_string()))
            .unwrap_or_else(|| "upload".to_string());
        let mime_type = field
            .content_type()
            .map(|mime| mime.essence_str().to_string())
            .unwrap_or_default();

        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk =
                chunk.map_err(|e| ApiError::Validation(format!("Failed to read upload: {}", e)))?;
            if bytes.len() + chunk.len() > MAX_FILE_SIZE {
                return Err(ApiError::Validation(
                    "File too large. Maximum size is 10MB.".to_string(),
                ));
            }
            bytes.extend_from_slice(&chunk);
        }

        return Ok(Some(IncomingFile {
            original_name,
            mime_type,
            bytes,
        }));
    }

    Ok(None)
}

fn is_excel_file(file: &IncomingFile) -> bool {
    let name = file.original_name.to_lowercase();
    ALLOWED_MIME_TYPES.contains(&file.mime_type.as_str())
        || name.ends_with(".xlsx")
        || name.ends_with(".xls")
}

/// POST /api/upload
/// Store the workbook, parse it, and persist the tabular data.
pub async fn upload_file(
    db: web::Data<DatabaseConnection>,
    config: web::Data<Config>,
    user_claims: web::ReqData<Claims>,
    mut payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let user_id = claims_user_id(&user_claims)?;

    let file = read_excel_field(&mut payload)
        .await?
        .ok_or_else(|| ApiError::Validation("No file uploaded".to_string()))?;

    if !is_excel_file(&file) {
        return Err(ApiError::FileType(
            "Only Excel files (.xlsx, .xls) are allowed!".to_string(),
        ));
    }

    storage::ensure_upload_dir(&config.upload_dir)?;
    let (file_name, path) =
        storage::store_upload_file(&config.upload_dir, &file.original_name, &file.bytes)?;

    log::info!(
        "Stored upload '{}' as {} ({} bytes)",
        file.original_name,
        file_name,
        file.bytes.len()
    );

    let now = Utc::now();
    let record = upload::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        file_name: Set(file_name),
        original_name: Set(file.original_name.clone()),
        file_path: Set(path.to_string_lossy().into_owned()),
        file_size: Set(file.bytes.len() as i64),
        mime_type: Set(file.mime_type.clone()),
        headers: Set(Vec::new()),
        row_count: Set(0),
        column_count: Set(0),
        status: Set(UploadStatus::Processing),
        error_message: Set(None),
        data: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db.get_ref())
    .await?;

    match excel_parser::parse_workbook(&file.bytes) {
        Ok(sheet) => {
            let ParsedSheet { headers, rows } = sheet;
            let preview: Vec<Value> = rows.iter().take(5).cloned().map(Value::Object).collect();
            let row_count = rows.len() as i32;
            let column_count = headers.len() as i32;
            let data: Vec<Value> = rows.into_iter().map(Value::Object).collect();

            let mut active: upload::ActiveModel = record.into();
            active.headers = Set(headers);
            active.row_count = Set(row_count);
            active.column_count = Set(column_count);
            active.data = Set(Some(Value::Array(data)));
            active.status = Set(UploadStatus::Completed);
            active.updated_at = Set(Utc::now());
            let record = active.update(db.get_ref()).await?;

            // The counter tracks completed uploads, so it moves only now.
            user::Entity::update_many()
                .col_expr(
                    user::Column::UploadCount,
                    Expr::col(user::Column::UploadCount).add(1),
                )
                .filter(user::Column::Id.eq(user_id))
                .exec(db.get_ref())
                .await?;

            log::info!(
                "Upload {} completed: {} rows x {} columns",
                record.id,
                record.row_count,
                record.column_count
            );

            Ok(HttpResponse::Ok().json(serde_json::json!({
                "success": true,
                "message": "File uploaded and parsed successfully",
                "upload": {
                    "id": record.id.to_string(),
                    "fileName": record.original_name,
                    "headers": record.headers,
                    "rowCount": record.row_count,
                    "columnCount": record.column_count,
                    "uploadedAt": record.created_at.to_rfc3339(),
                },
                "preview": preview,
            })))
        }
        Err(parse_error) => {
            log::warn!("Failed to parse upload {}: {}", record.id, parse_error);

            let file_path = record.file_path.clone();
            let mut active: upload::ActiveModel = record.into();
            active.status = Set(UploadStatus::Failed);
            active.error_message = Set(Some(parse_error.to_string()));
            active.updated_at = Set(Utc::now());
            active.update(db.get_ref()).await?;

            // Parsing failed, so the stored file has no further use.
            if let Err(e) = storage::remove_upload_file(&file_path) {
                log::warn!("Failed to remove {}: {}", file_path, e);
            }

            Ok(HttpResponse::BadRequest().json(serde_json::json!({
                "success": false,
                "message": "Failed to parse Excel file",
                "error": parse_error.to_string(),
            })))
        }
    }
}

/// GET /api/upload/history
/// The caller's uploads, newest first, without the table payloads.
pub async fn get_history(
    db: web::Data<DatabaseConnection>,
    user_claims: web::ReqData<Claims>,
    query: web::Query<HistoryQuery>,
) -> Result<HttpResponse, ApiError> {
    let user_id = claims_user_id(&user_claims)?;
    let (page, limit, offset) = page_params(query.page, query.limit);

    let base = upload::Entity::find().filter(upload::Column::UserId.eq(user_id));

    let total = base.clone().count(db.get_ref()).await?;
    let uploads = base
        .order_by_desc(upload::Column::CreatedAt)
        .limit(limit)
        .offset(offset)
        .all(db.get_ref())
        .await?;

    let uploads: Vec<UploadSummaryResponse> = uploads.into_iter().map(Into::into).collect();

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "uploads": uploads,
        "pagination": Pagination::new(page, limit, total),
    })))
}

/// GET /api/upload/{id}
pub async fn get_upload(
    db: web::Data<DatabaseConnection>,
    user_claims: web::ReqData<Claims>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let user_id = claims_user_id(&user_claims)?;

    let record = upload::Entity::find_by_id(path.into_inner())
        .filter(upload::Column::UserId.eq(user_id))
        .one(db.get_ref())
        .await?
        .ok_or_else(|| ApiError::NotFound("Upload not found".to_string()))?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "upload": UploadDetailResponse::from(record),
    })))
}

/// DELETE /api/upload/{id}
/// Removes the stored file (tolerating it already being gone) and the
/// record, then adjusts the owner's completed-upload counter.
pub async fn delete_upload(
    db: web::Data<DatabaseConnection>,
    user_claims: web::ReqData<Claims>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let user_id = claims_user_id(&user_claims)?;

    let record = upload::Entity::find_by_id(path.into_inner())
        .filter(upload::Column::UserId.eq(user_id))
        .one(db.get_ref())
        .await?
        .ok_or_else(|| ApiError::NotFound("Upload not found".to_string()))?;

    if let Err(e) = storage::remove_upload_file(&record.file_path) {
        log::warn!("Failed to remove {}: {}", record.file_path, e);
    }

    let was_completed = record.status == UploadStatus::Completed;
    upload::Entity::delete_by_id(record.id)
        .exec(db.get_ref())
        .await?;

    // Failed uploads were never counted, so only completed ones decrement.
    if was_completed {
        user::Entity::update_many()
            .col_expr(
                user::Column::UploadCount,
                Expr::col(user::Column::UploadCount).sub(1),
            )
            .filter(user::Column::Id.eq(user_id))
            .exec(db.get_ref())
            .await?;
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "Upload deleted successfully",
    })))
}
