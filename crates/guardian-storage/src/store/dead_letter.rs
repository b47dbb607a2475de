use anyhow::Context;
use chrono::Utc;
use sea_orm::{EntityTrait, QueryOrder, QuerySelect, Set};

use super::GuardianStore;
use crate::entities::dead_letter;

impl GuardianStore {
    pub async fn insert_dead_letter(
        &self,
        kind: &str,
        source_id: &str,
        account_id: Option<&str>,
        payload: Option<String>,
        error: &str,
    ) -> anyhow::Result<String> {
        let id = guardian_common::id::next_id();
        let row = dead_letter::ActiveModel {
            id: Set(id.clone()),
            kind: Set(kind.to_string()),
            source_id: Set(source_id.to_string()),
            account_id: Set(account_id.map(|s| s.to_string())),
            payload: Set(payload),
            last_error: Set(error.to_string()),
            created_at: Set(Utc::now()),
        };
        dead_letter::Entity::insert(row)
            .exec_without_returning(&self.db)
            .await
            .context("insert dead letter")?;
        tracing::warn!(kind, source_id, "Dead-lettered");
        Ok(id)
    }

    pub async fn list_dead_letters(&self, limit: u64) -> anyhow::Result<Vec<dead_letter::Model>> {
        dead_letter::Entity::find()
            .order_by_desc(dead_letter::Column::CreatedAt)
            .limit(limit)
            .all(&self.db)
            .await
            .context("list dead letters")
    }
}
