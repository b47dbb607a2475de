use sea_orm::entity::prelude::*;

/// Terminal failures parked for operator inspection. `kind` names the
/// producing stage, e.g. `notification` or `pipeline`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, serde::Serialize)]
#[sea_orm(table_name = "dead_letters")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub kind: String,
    pub source_id: String,
    pub account_id: Option<String>,
    pub payload: Option<String>,
    pub last_error: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
