use anyhow::Context;
use chrono::{DateTime, Utc};
use guardian_common::types::{EventSource, RawEvent};
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set};

use super::GuardianStore;
use crate::entities::event;

/// Upper bound on the history window handed to the rule engine.
const HISTORY_LIMIT: u64 = 1000;

impl GuardianStore {
    /// Inserts the event unless `(account_id, event_id)` was seen
    /// before. Returns `true` when the event was newly accepted; a
    /// `false` means the caller must treat the delivery as a duplicate
    /// and skip the pipeline entirely.
    pub async fn accept_event(&self, evt: &RawEvent, source: EventSource) -> anyhow::Result<bool> {
        let row = event::ActiveModel {
            id: Set(guardian_common::id::next_id()),
            account_id: Set(evt.account_id.clone()),
            event_id: Set(evt.event_id.clone()),
            event_type: Set(evt.event_type.clone()),
            occurred_at: Set(evt.occurred_at),
            payload: Set(serde_json::to_string(&evt.payload).context("serialize payload")?),
            source: Set(source.as_str().to_string()),
            created_at: Set(Utc::now()),
        };
        let inserted = event::Entity::insert(row)
            .on_conflict(
                OnConflict::columns([event::Column::AccountId, event::Column::EventId])
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .context("insert event")?;
        Ok(inserted == 1)
    }

    /// The account's events in `[since, until]`, newest first,
    /// excluding the event named by `exclude_event_id`. The upper bound
    /// is the trigger's own timestamp, so out-of-order deliveries and
    /// newest-first backfill pages never leak later events into a
    /// trailing window.
    pub async fn recent_events(
        &self,
        account_id: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        exclude_event_id: &str,
    ) -> anyhow::Result<Vec<RawEvent>> {
        let rows = event::Entity::find()
            .filter(event::Column::AccountId.eq(account_id))
            .filter(event::Column::OccurredAt.gte(since))
            .filter(event::Column::OccurredAt.lte(until))
            .filter(event::Column::EventId.ne(exclude_event_id))
            .order_by_desc(event::Column::OccurredAt)
            .limit(HISTORY_LIMIT)
            .all(&self.db)
            .await
            .context("load recent events")?;
        rows.into_iter().map(raw_event_from_row).collect()
    }

    pub async fn event_count(&self, account_id: &str) -> anyhow::Result<u64> {
        use sea_orm::PaginatorTrait;
        event::Entity::find()
            .filter(event::Column::AccountId.eq(account_id))
            .count(&self.db)
            .await
            .context("count events")
    }
}

fn raw_event_from_row(row: event::Model) -> anyhow::Result<RawEvent> {
    let payload = serde_json::from_str(&row.payload)
        .with_context(|| format!("corrupt payload for event {}", row.event_id))?;
    Ok(RawEvent {
        event_id: row.event_id,
        account_id: row.account_id,
        event_type: row.event_type,
        occurred_at: row.occurred_at,
        payload,
    })
}
