use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "chart_type")]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    #[sea_orm(string_value = "bar")]
    Bar,
    #[sea_orm(string_value = "line")]
    Line,
    #[sea_orm(string_value = "pie")]
    Pie,
    #[sea_orm(string_value = "scatter")]
    Scatter,
    #[sea_orm(string_value = "bar3d")]
    Bar3d,
    #[sea_orm(string_value = "line3d")]
    Line3d,
    #[sea_orm(string_value = "scatter3d")]
    Scatter3d,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "charts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub upload_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub chart_type: ChartType,
    /// Axis labels must match a header of the source upload at creation
    /// time. The data arrays are filtered independently, so their lengths
    /// may differ.
    pub x_axis_label: String,
    pub x_axis_data: Json,
    pub y_axis_label: String,
    pub y_axis_data: Json,
    /// Free-form styling (colors, theme, flags). Updated by shallow merge.
    pub configuration: Json,
    pub is_public: bool,
    pub tags: Vec<String>,
    pub download_count: i32,
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
    #[sea_orm(
        belongs_to = "super::upload::Entity",
        from = "Column::UploadId",
        to = "super::upload::Column::Id"
    )]
    Upload,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::upload::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Upload.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
