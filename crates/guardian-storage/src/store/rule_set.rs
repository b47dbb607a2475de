use anyhow::Context;
use chrono::Utc;
use guardian_rules::config::RuleConfig;
use sea_orm::sea_query::OnConflict;
use sea_orm::{EntityTrait, Set};

use super::GuardianStore;
use crate::entities::{connected_account, rule_set};

pub const DEFAULT_RULE_SET: &str = "default";

impl GuardianStore {
    /// Creates or replaces a named rule set. The config must parse as a
    /// [`RuleConfig`] so a broken set never reaches the pipeline.
    pub async fn upsert_rule_set(&self, name: &str, config: &RuleConfig) -> anyhow::Result<()> {
        let now = Utc::now();
        let row = rule_set::ActiveModel {
            name: Set(name.to_string()),
            config_json: Set(serde_json::to_string(config).context("serialize rule config")?),
            created_at: Set(now),
            updated_at: Set(now),
        };
        rule_set::Entity::insert(row)
            .on_conflict(
                OnConflict::column(rule_set::Column::Name)
                    .update_columns([rule_set::Column::ConfigJson, rule_set::Column::UpdatedAt])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .context("upsert rule set")?;
        Ok(())
    }

    /// Writes the built-in default rule set unless one already exists,
    /// so operator edits to `default` survive restarts.
    pub async fn seed_default_rule_set(&self) -> anyhow::Result<()> {
        let now = Utc::now();
        let row = rule_set::ActiveModel {
            name: Set(DEFAULT_RULE_SET.to_string()),
            config_json: Set(serde_json::to_string(&RuleConfig::default())
                .context("serialize default rule config")?),
            created_at: Set(now),
            updated_at: Set(now),
        };
        rule_set::Entity::insert(row)
            .on_conflict(
                OnConflict::column(rule_set::Column::Name)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .context("seed default rule set")?;
        Ok(())
    }

    pub async fn get_rule_set(&self, name: &str) -> anyhow::Result<Option<rule_set::Model>> {
        rule_set::Entity::find_by_id(name.to_string())
            .one(&self.db)
            .await
            .context("load rule set")
    }

    /// Resolves the effective rule config for an account: the account's
    /// linked set, else the `default` set, else built-in defaults. A
    /// set that fails to parse is skipped with a warning rather than
    /// stalling ingestion.
    pub async fn resolve_rule_config(&self, account_id: &str) -> anyhow::Result<RuleConfig> {
        let linked = connected_account::Entity::find_by_id(account_id.to_string())
            .one(&self.db)
            .await
            .context("load account")?
            .and_then(|a| a.rule_set_name);

        for name in [linked.as_deref(), Some(DEFAULT_RULE_SET)].into_iter().flatten() {
            if let Some(row) = self.get_rule_set(name).await? {
                match serde_json::from_str(&row.config_json) {
                    Ok(config) => return Ok(config),
                    Err(err) => {
                        tracing::warn!(rule_set = name, error = %err, "Unparseable rule set, skipping");
                    }
                }
            }
        }
        Ok(RuleConfig::default())
    }
}
