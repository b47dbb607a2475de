use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m001_initial_schema"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.get_connection().execute_unprepared(UP_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(DOWN_SQL)
            .await?;
        Ok(())
    }
}

const UP_SQL: &str = "
CREATE TABLE IF NOT EXISTS events (
    id TEXT PRIMARY KEY NOT NULL,
    account_id TEXT NOT NULL,
    event_id TEXT NOT NULL,
    event_type TEXT NOT NULL,
    occurred_at TEXT NOT NULL,
    payload TEXT NOT NULL,
    source TEXT NOT NULL DEFAULT 'live',
    created_at TEXT NOT NULL,
    UNIQUE(account_id, event_id)
);
CREATE INDEX IF NOT EXISTS idx_events_account_type_time
    ON events(account_id, event_type, occurred_at DESC);

CREATE TABLE IF NOT EXISTS alerts (
    id TEXT PRIMARY KEY NOT NULL,
    account_id TEXT NOT NULL,
    alert_type TEXT NOT NULL,
    severity TEXT NOT NULL,
    message TEXT NOT NULL,
    payout_id TEXT,
    source_event_id TEXT NOT NULL,
    risk_score INTEGER NOT NULL DEFAULT 0,
    auto_pause INTEGER NOT NULL DEFAULT 0,
    resolved INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE(source_event_id, alert_type)
);
CREATE INDEX IF NOT EXISTS idx_alerts_account_created
    ON alerts(account_id, created_at DESC);

CREATE TABLE IF NOT EXISTS alert_feedback (
    id TEXT PRIMARY KEY NOT NULL,
    alert_id TEXT NOT NULL,
    account_id TEXT NOT NULL,
    alert_type TEXT NOT NULL,
    user_id TEXT NOT NULL,
    verdict TEXT NOT NULL,
    comment TEXT,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_feedback_account_type
    ON alert_feedback(account_id, alert_type);
CREATE INDEX IF NOT EXISTS idx_feedback_type
    ON alert_feedback(alert_type);

CREATE TABLE IF NOT EXISTS notification_queue (
    id TEXT PRIMARY KEY NOT NULL,
    alert_id TEXT NOT NULL,
    account_id TEXT NOT NULL,
    channel TEXT NOT NULL,
    destination TEXT NOT NULL,
    attempt INTEGER NOT NULL DEFAULT 0,
    max_attempts INTEGER NOT NULL DEFAULT 5,
    status TEXT NOT NULL DEFAULT 'pending',
    next_attempt_at TEXT NOT NULL,
    claimed_at TEXT,
    last_error TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_queue_status_due
    ON notification_queue(status, next_attempt_at);

CREATE TABLE IF NOT EXISTS backfill_checkpoints (
    account_id TEXT PRIMARY KEY NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    last_event_id TEXT,
    processed_count INTEGER NOT NULL DEFAULT 0,
    last_error TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS rule_sets (
    name TEXT PRIMARY KEY NOT NULL,
    config_json TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS connected_accounts (
    account_id TEXT PRIMARY KEY NOT NULL,
    rule_set_name TEXT,
    email_to TEXT,
    email_enabled INTEGER NOT NULL DEFAULT 1,
    slack_webhook_url TEXT,
    slack_enabled INTEGER NOT NULL DEFAULT 1,
    payouts_paused INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS dead_letters (
    id TEXT PRIMARY KEY NOT NULL,
    kind TEXT NOT NULL,
    source_id TEXT NOT NULL,
    account_id TEXT,
    payload TEXT,
    last_error TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_dead_letters_created
    ON dead_letters(created_at DESC);
";

const DOWN_SQL: &str = "
DROP TABLE IF EXISTS dead_letters;
DROP TABLE IF EXISTS connected_accounts;
DROP TABLE IF EXISTS rule_sets;
DROP TABLE IF EXISTS backfill_checkpoints;
DROP TABLE IF EXISTS notification_queue;
DROP TABLE IF EXISTS alert_feedback;
DROP TABLE IF EXISTS alerts;
DROP TABLE IF EXISTS events;
";
