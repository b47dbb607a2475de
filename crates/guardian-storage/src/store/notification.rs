use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};

use super::GuardianStore;
use crate::entities::notification_item;

impl GuardianStore {
    /// Queues one delivery for an alert on a channel. The item becomes
    /// due immediately.
    pub async fn enqueue_notification(
        &self,
        alert_id: &str,
        account_id: &str,
        channel: &str,
        destination: &str,
        max_attempts: u32,
    ) -> anyhow::Result<String> {
        let now = Utc::now();
        let id = guardian_common::id::next_id();
        let row = notification_item::ActiveModel {
            id: Set(id.clone()),
            alert_id: Set(alert_id.to_string()),
            account_id: Set(account_id.to_string()),
            channel: Set(channel.to_string()),
            destination: Set(destination.to_string()),
            attempt: Set(0),
            max_attempts: Set(max_attempts as i32),
            status: Set("pending".to_string()),
            next_attempt_at: Set(now),
            claimed_at: Set(None),
            last_error: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        notification_item::Entity::insert(row)
            .exec_without_returning(&self.db)
            .await
            .context("enqueue notification")?;
        Ok(id)
    }

    /// Claims the next due pending item, transitioning it to `sending`.
    /// The conditional update makes the claim exclusive across
    /// dispatchers; items stuck in `sending` longer than `lease` are
    /// first returned to `pending`.
    pub async fn claim_due_notification(
        &self,
        now: DateTime<Utc>,
        lease: Duration,
    ) -> anyhow::Result<Option<notification_item::Model>> {
        notification_item::Entity::update_many()
            .col_expr(notification_item::Column::Status, Expr::value("pending"))
            .col_expr(
                notification_item::Column::ClaimedAt,
                Expr::value(Option::<DateTime<Utc>>::None),
            )
            .col_expr(notification_item::Column::UpdatedAt, Expr::value(now))
            .filter(notification_item::Column::Status.eq("sending"))
            .filter(notification_item::Column::ClaimedAt.lt(now - lease))
            .exec(&self.db)
            .await
            .context("reclaim stale notifications")?;

        let candidate = notification_item::Entity::find()
            .filter(notification_item::Column::Status.eq("pending"))
            .filter(notification_item::Column::NextAttemptAt.lte(now))
            .order_by_asc(notification_item::Column::NextAttemptAt)
            .one(&self.db)
            .await
            .context("find due notification")?;
        let Some(item) = candidate else {
            return Ok(None);
        };

        let claimed = notification_item::Entity::update_many()
            .col_expr(notification_item::Column::Status, Expr::value("sending"))
            .col_expr(notification_item::Column::ClaimedAt, Expr::value(Some(now)))
            .col_expr(notification_item::Column::UpdatedAt, Expr::value(now))
            .filter(notification_item::Column::Id.eq(item.id.clone()))
            .filter(notification_item::Column::Status.eq("pending"))
            .exec(&self.db)
            .await
            .context("claim notification")?;
        if claimed.rows_affected != 1 {
            // Another dispatcher won the race; the caller polls again.
            return Ok(None);
        }
        Ok(Some(notification_item::Model {
            status: "sending".to_string(),
            claimed_at: Some(now),
            updated_at: now,
            ..item
        }))
    }

    pub async fn mark_notification_sent(&self, id: &str) -> anyhow::Result<()> {
        notification_item::Entity::update_many()
            .col_expr(notification_item::Column::Status, Expr::value("sent"))
            .col_expr(notification_item::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(notification_item::Column::Id.eq(id))
            .exec(&self.db)
            .await
            .context("mark notification sent")?;
        Ok(())
    }

    /// Returns a failed item to the queue with its next due time and
    /// the recorded error.
    pub async fn retry_notification(
        &self,
        id: &str,
        attempt: i32,
        next_attempt_at: DateTime<Utc>,
        error: &str,
    ) -> anyhow::Result<()> {
        notification_item::Entity::update_many()
            .col_expr(notification_item::Column::Status, Expr::value("pending"))
            .col_expr(notification_item::Column::Attempt, Expr::value(attempt))
            .col_expr(
                notification_item::Column::NextAttemptAt,
                Expr::value(next_attempt_at),
            )
            .col_expr(
                notification_item::Column::ClaimedAt,
                Expr::value(Option::<DateTime<Utc>>::None),
            )
            .col_expr(
                notification_item::Column::LastError,
                Expr::value(Some(error.to_string())),
            )
            .col_expr(notification_item::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(notification_item::Column::Id.eq(id))
            .exec(&self.db)
            .await
            .context("schedule notification retry")?;
        Ok(())
    }

    /// Moves an exhausted item to `dead` and parks it in the
    /// dead-letter table. The conditional update guarantees the
    /// dead-letter row is written at most once per item.
    pub async fn mark_notification_dead(
        &self,
        item: &notification_item::Model,
        error: &str,
    ) -> anyhow::Result<bool> {
        let res = notification_item::Entity::update_many()
            .col_expr(notification_item::Column::Status, Expr::value("dead"))
            .col_expr(
                notification_item::Column::LastError,
                Expr::value(Some(error.to_string())),
            )
            .col_expr(notification_item::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(notification_item::Column::Id.eq(item.id.clone()))
            .filter(notification_item::Column::Status.eq("sending"))
            .exec(&self.db)
            .await
            .context("mark notification dead")?;
        if res.rows_affected != 1 {
            return Ok(false);
        }
        let payload = serde_json::json!({
            "alert_id": item.alert_id,
            "channel": item.channel,
            "destination": item.destination,
            "attempts": item.attempt + 1,
        });
        self.insert_dead_letter(
            "notification",
            &item.id,
            Some(&item.account_id),
            Some(payload.to_string()),
            error,
        )
        .await?;
        Ok(true)
    }

    pub async fn get_notification(
        &self,
        id: &str,
    ) -> anyhow::Result<Option<notification_item::Model>> {
        notification_item::Entity::find_by_id(id.to_string())
            .one(&self.db)
            .await
            .context("load notification")
    }
}
