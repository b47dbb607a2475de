use sea_orm::entity::prelude::*;

/// Immutable ledger of accepted provider events, unique per
/// `(account_id, event_id)`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "events")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub account_id: String,
    pub event_id: String,
    pub event_type: String,
    pub occurred_at: DateTimeUtc,
    /// The event's `data` document, serialized JSON.
    pub payload: String,
    pub source: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
