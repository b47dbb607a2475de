use anyhow::Context;
use chrono::Utc;
use guardian_common::types::FiredRule;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set};

use super::GuardianStore;
use crate::entities::alert;

/// Input for materializing one fired rule into an alert row.
pub struct AlertInsert<'a> {
    pub account_id: &'a str,
    pub source_event_id: &'a str,
    pub fired: &'a FiredRule,
    pub risk_score: u8,
}

/// Whether the insert created a new alert or hit the
/// `(source_event_id, alert_type)` uniqueness guard.
pub enum InsertOutcome {
    Created(alert::Model),
    Duplicate,
}

impl GuardianStore {
    pub async fn insert_alert(&self, insert: AlertInsert<'_>) -> anyhow::Result<InsertOutcome> {
        let now = Utc::now();
        let id = guardian_common::id::next_id();
        let row = alert::ActiveModel {
            id: Set(id.clone()),
            account_id: Set(insert.account_id.to_string()),
            alert_type: Set(insert.fired.alert_type.to_string()),
            severity: Set(insert.fired.severity.to_string()),
            message: Set(insert.fired.message.clone()),
            payout_id: Set(insert.fired.payout_id.clone()),
            source_event_id: Set(insert.source_event_id.to_string()),
            risk_score: Set(insert.risk_score as i32),
            auto_pause: Set(insert.fired.auto_pause),
            resolved: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let inserted = alert::Entity::insert(row)
            .on_conflict(
                OnConflict::columns([alert::Column::SourceEventId, alert::Column::AlertType])
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .context("insert alert")?;
        if inserted == 0 {
            return Ok(InsertOutcome::Duplicate);
        }
        let model = alert::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .context("load inserted alert")?
            .context("inserted alert missing")?;
        Ok(InsertOutcome::Created(model))
    }

    pub async fn get_alert(&self, id: &str) -> anyhow::Result<Option<alert::Model>> {
        alert::Entity::find_by_id(id.to_string())
            .one(&self.db)
            .await
            .context("load alert")
    }

    pub async fn list_alerts(
        &self,
        account_id: Option<&str>,
        include_resolved: bool,
        limit: u64,
    ) -> anyhow::Result<Vec<alert::Model>> {
        let mut query = alert::Entity::find();
        if let Some(account_id) = account_id {
            query = query.filter(alert::Column::AccountId.eq(account_id));
        }
        if !include_resolved {
            query = query.filter(alert::Column::Resolved.eq(false));
        }
        query
            .order_by_desc(alert::Column::CreatedAt)
            .limit(limit)
            .all(&self.db)
            .await
            .context("list alerts")
    }

    /// Marks the alert resolved. Returns `false` when no such alert
    /// exists.
    pub async fn resolve_alert(&self, id: &str) -> anyhow::Result<bool> {
        let res = alert::Entity::update_many()
            .col_expr(alert::Column::Resolved, Expr::value(true))
            .col_expr(alert::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(alert::Column::Id.eq(id))
            .exec(&self.db)
            .await
            .context("resolve alert")?;
        Ok(res.rows_affected == 1)
    }
}
