use anyhow::Context;
use chrono::Utc;
use guardian_common::types::{AlertType, Verdict};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, Set};

use super::GuardianStore;
use crate::entities::{alert, alert_feedback};

impl GuardianStore {
    /// Records a verdict on an alert. The account id and alert type are
    /// denormalized from the alert row so the rate queries stay flat.
    pub async fn insert_feedback(
        &self,
        alert: &alert::Model,
        user_id: &str,
        verdict: Verdict,
        comment: Option<String>,
    ) -> anyhow::Result<String> {
        let id = guardian_common::id::next_id();
        let row = alert_feedback::ActiveModel {
            id: Set(id.clone()),
            alert_id: Set(alert.id.clone()),
            account_id: Set(alert.account_id.clone()),
            alert_type: Set(alert.alert_type.clone()),
            user_id: Set(user_id.to_string()),
            verdict: Set(verdict.to_string()),
            comment: Set(comment),
            created_at: Set(Utc::now()),
        };
        alert_feedback::Entity::insert(row)
            .exec_without_returning(&self.db)
            .await
            .context("insert feedback")?;
        Ok(id)
    }

    /// Fraction of this account's feedback on the given alert class
    /// that judged it a false positive. No feedback means 0.
    pub async fn account_fp_rate(
        &self,
        account_id: &str,
        alert_type: AlertType,
    ) -> anyhow::Result<f64> {
        let base = alert_feedback::Entity::find()
            .filter(alert_feedback::Column::AccountId.eq(account_id))
            .filter(alert_feedback::Column::AlertType.eq(alert_type.to_string()));
        fp_fraction(&self.db, base).await
    }

    /// Fleet-wide false-positive fraction for the alert class.
    pub async fn global_fp_rate(&self, alert_type: AlertType) -> anyhow::Result<f64> {
        let base = alert_feedback::Entity::find()
            .filter(alert_feedback::Column::AlertType.eq(alert_type.to_string()));
        fp_fraction(&self.db, base).await
    }
}

async fn fp_fraction(
    db: &sea_orm::DatabaseConnection,
    base: sea_orm::Select<alert_feedback::Entity>,
) -> anyhow::Result<f64> {
    let total = base.clone().count(db).await.context("count feedback")?;
    if total == 0 {
        return Ok(0.0);
    }
    let false_positives = base
        .filter(alert_feedback::Column::Verdict.eq(Verdict::FalsePositive.to_string()))
        .count(db)
        .await
        .context("count false positives")?;
    Ok(false_positives as f64 / total as f64)
}
