mod account;
mod alert;
mod backfill;
mod dead_letter;
mod event;
mod feedback;
mod notification;
mod rule_set;

pub use alert::{AlertInsert, InsertOutcome};
pub use rule_set::DEFAULT_RULE_SET;

use anyhow::Context;
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection};

/// Facade over the database. All persistence goes through here; the
/// submodules group the queries by table.
pub struct GuardianStore {
    db: DatabaseConnection,
}

impl GuardianStore {
    /// Connects and brings the schema up to date.
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let db = Database::connect(database_url)
            .await
            .with_context(|| format!("failed to connect to {database_url}"))?;
        if database_url.starts_with("sqlite:") {
            db.execute_unprepared("PRAGMA journal_mode=WAL;")
                .await
                .context("failed to enable WAL")?;
        }
        Migrator::up(&db, None).await.context("migration failed")?;
        let store = Self { db };
        let recovered = store.recover_interrupted_backfills().await?;
        if recovered > 0 {
            tracing::warn!(recovered, "Reset backfills left running by a previous process");
        }
        tracing::info!("Database ready");
        Ok(store)
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}
