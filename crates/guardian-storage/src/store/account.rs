use anyhow::Context;
use chrono::Utc;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, Set};

use super::GuardianStore;
use crate::entities::connected_account;

impl GuardianStore {
    /// Creates the account row with defaults if it does not exist yet.
    pub async fn ensure_account(&self, account_id: &str) -> anyhow::Result<()> {
        let now = Utc::now();
        let row = connected_account::ActiveModel {
            account_id: Set(account_id.to_string()),
            rule_set_name: Set(None),
            email_to: Set(None),
            email_enabled: Set(true),
            slack_webhook_url: Set(None),
            slack_enabled: Set(true),
            payouts_paused: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
        };
        connected_account::Entity::insert(row)
            .on_conflict(
                OnConflict::column(connected_account::Column::AccountId)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .context("ensure account")?;
        Ok(())
    }

    pub async fn get_account(
        &self,
        account_id: &str,
    ) -> anyhow::Result<Option<connected_account::Model>> {
        connected_account::Entity::find_by_id(account_id.to_string())
            .one(&self.db)
            .await
            .context("load account")
    }

    /// Bookkeeping flag mirrored from the provider after a pause or an
    /// operator un-pause.
    pub async fn set_payouts_paused(&self, account_id: &str, paused: bool) -> anyhow::Result<()> {
        self.ensure_account(account_id).await?;
        connected_account::Entity::update_many()
            .col_expr(
                connected_account::Column::PayoutsPaused,
                Expr::value(paused),
            )
            .col_expr(connected_account::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(connected_account::Column::AccountId.eq(account_id))
            .exec(&self.db)
            .await
            .context("set payouts paused")?;
        Ok(())
    }
}
