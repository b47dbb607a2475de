use sea_orm::entity::prelude::*;

/// Materialized fraud alert, unique per `(source_event_id, alert_type)`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, serde::Serialize)]
#[sea_orm(table_name = "alerts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub account_id: String,
    pub alert_type: String,
    pub severity: String,
    pub message: String,
    pub payout_id: Option<String>,
    pub source_event_id: String,
    /// 0..=100, fixed at creation time.
    pub risk_score: i32,
    pub auto_pause: bool,
    pub resolved: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
