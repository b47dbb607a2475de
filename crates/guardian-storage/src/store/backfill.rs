use anyhow::Context;
use chrono::Utc;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, Set};

use super::GuardianStore;
use crate::entities::backfill_checkpoint;

impl GuardianStore {
    /// Claims the single-flight backfill slot for an account. Returns
    /// `false` when a run is already in progress. A prior checkpoint is
    /// kept, so a resumed run continues from `last_event_id`.
    pub async fn try_start_backfill(&self, account_id: &str) -> anyhow::Result<bool> {
        let now = Utc::now();
        let row = backfill_checkpoint::ActiveModel {
            account_id: Set(account_id.to_string()),
            status: Set("running".to_string()),
            last_event_id: Set(None),
            processed_count: Set(0),
            last_error: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let inserted = backfill_checkpoint::Entity::insert(row)
            .on_conflict(
                OnConflict::column(backfill_checkpoint::Column::AccountId)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .context("insert backfill checkpoint")?;
        if inserted == 1 {
            return Ok(true);
        }
        let res = backfill_checkpoint::Entity::update_many()
            .col_expr(backfill_checkpoint::Column::Status, Expr::value("running"))
            .col_expr(
                backfill_checkpoint::Column::LastError,
                Expr::value(Option::<String>::None),
            )
            .col_expr(backfill_checkpoint::Column::UpdatedAt, Expr::value(now))
            .filter(backfill_checkpoint::Column::AccountId.eq(account_id))
            .filter(backfill_checkpoint::Column::Status.ne("running"))
            .exec(&self.db)
            .await
            .context("restart backfill checkpoint")?;
        Ok(res.rows_affected == 1)
    }

    /// Advances the cursor after a fully processed page.
    pub async fn save_backfill_progress(
        &self,
        account_id: &str,
        last_event_id: &str,
        processed_delta: u32,
    ) -> anyhow::Result<()> {
        backfill_checkpoint::Entity::update_many()
            .col_expr(
                backfill_checkpoint::Column::LastEventId,
                Expr::value(Some(last_event_id.to_string())),
            )
            .col_expr(
                backfill_checkpoint::Column::ProcessedCount,
                Expr::col(backfill_checkpoint::Column::ProcessedCount)
                    .add(processed_delta as i32),
            )
            .col_expr(
                backfill_checkpoint::Column::UpdatedAt,
                Expr::value(Utc::now()),
            )
            .filter(backfill_checkpoint::Column::AccountId.eq(account_id))
            .exec(&self.db)
            .await
            .context("save backfill progress")?;
        Ok(())
    }

    /// Terminates the run: `success`, `error`, or back to `pending`
    /// after a cooperative stop.
    pub async fn finish_backfill(
        &self,
        account_id: &str,
        status: &str,
        error: Option<&str>,
    ) -> anyhow::Result<()> {
        backfill_checkpoint::Entity::update_many()
            .col_expr(backfill_checkpoint::Column::Status, Expr::value(status))
            .col_expr(
                backfill_checkpoint::Column::LastError,
                Expr::value(error.map(|e| e.to_string())),
            )
            .col_expr(
                backfill_checkpoint::Column::UpdatedAt,
                Expr::value(Utc::now()),
            )
            .filter(backfill_checkpoint::Column::AccountId.eq(account_id))
            .exec(&self.db)
            .await
            .context("finish backfill")?;
        Ok(())
    }

    /// Flips checkpoints stranded at `running` by a killed process to
    /// `error`, keeping their cursors. Runs once at startup; without it
    /// the single-flight guard would wedge those accounts forever.
    pub async fn recover_interrupted_backfills(&self) -> anyhow::Result<u64> {
        let res = backfill_checkpoint::Entity::update_many()
            .col_expr(backfill_checkpoint::Column::Status, Expr::value("error"))
            .col_expr(
                backfill_checkpoint::Column::LastError,
                Expr::value(Some("interrupted by restart".to_string())),
            )
            .col_expr(
                backfill_checkpoint::Column::UpdatedAt,
                Expr::value(Utc::now()),
            )
            .filter(backfill_checkpoint::Column::Status.eq("running"))
            .exec(&self.db)
            .await
            .context("recover interrupted backfills")?;
        Ok(res.rows_affected)
    }

    pub async fn backfill_status(
        &self,
        account_id: &str,
    ) -> anyhow::Result<Option<backfill_checkpoint::Model>> {
        backfill_checkpoint::Entity::find_by_id(account_id.to_string())
            .one(&self.db)
            .await
            .context("load backfill checkpoint")
    }
}
