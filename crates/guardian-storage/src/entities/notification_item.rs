use sea_orm::entity::prelude::*;

/// One queued delivery attempt stream for one alert on one channel.
/// `status` is one of `pending`, `sending`, `sent`, `dead`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "notification_queue")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub alert_id: String,
    pub account_id: String,
    pub channel: String,
    pub destination: String,
    pub attempt: i32,
    pub max_attempts: i32,
    pub status: String,
    pub next_attempt_at: DateTimeUtc,
    /// Set while a dispatcher holds the item; stale claims are
    /// reclaimed after the lease expires.
    pub claimed_at: Option<DateTimeUtc>,
    pub last_error: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
