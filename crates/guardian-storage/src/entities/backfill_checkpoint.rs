use sea_orm::entity::prelude::*;

/// Per-account backfill progress. `status` is one of `pending`,
/// `running`, `success`, `error`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, serde::Serialize)]
#[sea_orm(table_name = "backfill_checkpoints")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub account_id: String,
    pub status: String,
    /// Cursor of the last fully processed provider page.
    pub last_event_id: Option<String>,
    pub processed_count: i32,
    pub last_error: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
