use sea_orm::entity::prelude::*;

/// Per-account settings: rule-set link, notification destinations and
/// the auto-pause bookkeeping flag. Destinations left NULL fall back to
/// the platform defaults from server config.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "connected_accounts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub account_id: String,
    pub rule_set_name: Option<String>,
    pub email_to: Option<String>,
    pub email_enabled: bool,
    pub slack_webhook_url: Option<String>,
    pub slack_enabled: bool,
    pub payouts_paused: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
