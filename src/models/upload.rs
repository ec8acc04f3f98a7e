use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "upload_status")]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    #[sea_orm(string_value = "processing")]
    Processing,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "failed")]
    Failed,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "uploads")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    /// Storage-assigned name under the upload directory.
    pub file_name: String,
    /// Name the file was uploaded with.
    pub original_name: String,
    pub file_path: String,
    pub file_size: i64,
    pub mime_type: String,
    /// Header names in worksheet order; `headers.len() == column_count`.
    pub headers: Vec<String>,
    pub row_count: i32,
    pub column_count: i32,
    pub status: UploadStatus,
    pub error_message: Option<String>,
    /// Parsed table payload: a JSON array of row objects mapping header
    /// name to a scalar cell value. `None` until parsing completes and
    /// always `None` for failed uploads.
    pub data: Option<Json>,
    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
    #[sea_orm(has_many = "super::chart::Entity")]
    Charts,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::chart::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Charts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
