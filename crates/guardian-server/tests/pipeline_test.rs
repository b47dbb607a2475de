use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use guardian_common::types::{EventSource, RawEvent};
use guardian_server::config_cache::RuleConfigCache;
use guardian_server::pipeline::{IngestOutcome, NotifyTargets, Pipeline};
use guardian_storage::GuardianStore;
use serde_json::json;
use tempfile::TempDir;

async fn test_store() -> (TempDir, Arc<GuardianStore>) {
    let dir = TempDir::new().unwrap();
    let url = format!("sqlite://{}/guardian.db?mode=rwc", dir.path().display());
    let store = Arc::new(GuardianStore::new(&url).await.unwrap());
    (dir, store)
}

fn pipeline_with(store: Arc<GuardianStore>) -> Arc<Pipeline> {
    let cache = Arc::new(RuleConfigCache::new(
        store.clone(),
        std::time::Duration::from_secs(600),
    ));
    let targets = NotifyTargets {
        max_attempts: 3,
        email_enabled: false,
        default_email: None,
        slack_enabled: true,
        default_slack_webhook: Some("https://hooks.example/T/B/X".to_string()),
    };
    Arc::new(Pipeline::new(store, cache, targets))
}

fn payout_event(event_id: &str, occurred_at: DateTime<Utc>, amount_cents: i64) -> RawEvent {
    RawEvent {
        event_id: event_id.to_string(),
        account_id: "acct_pipeline".to_string(),
        event_type: "payout.created".to_string(),
        occurred_at,
        payload: json!({"object": {"id": format!("po_{event_id}"), "amount": amount_cents,
               "currency": "usd"}}),
    }
}

#[tokio::test]
async fn fourth_payout_in_window_creates_one_velocity_alert() {
    let (_dir, store) = test_store().await;
    let pipeline = pipeline_with(store.clone());
    let base = Utc::now() - Duration::minutes(40);

    for i in 0..3 {
        let event = payout_event(&format!("evt_{i}"), base + Duration::minutes(i * 10), 5000);
        let outcome = pipeline.process(&event, EventSource::Live).await.unwrap();
        assert_eq!(outcome, IngestOutcome::Processed { alerts_created: 0 });
    }

    let trigger = payout_event("evt_3", base + Duration::minutes(35), 5000);
    let outcome = pipeline.process(&trigger, EventSource::Live).await.unwrap();
    assert_eq!(outcome, IngestOutcome::Processed { alerts_created: 1 });

    let alerts = store
        .list_alerts(Some("acct_pipeline"), true, 10)
        .await
        .unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].alert_type, "velocity");
    assert_eq!(alerts[0].source_event_id, "evt_3");
    // Fresh account, no feedback: 30 * 2.
    assert_eq!(alerts[0].risk_score, 60);
    assert!(alerts[0].auto_pause);
}

#[tokio::test]
async fn duplicate_delivery_never_doubles_alerts() {
    let (_dir, store) = test_store().await;
    let pipeline = pipeline_with(store.clone());
    let base = Utc::now() - Duration::minutes(40);

    for i in 0..4 {
        let event = payout_event(&format!("evt_{i}"), base + Duration::minutes(i * 10), 5000);
        pipeline.process(&event, EventSource::Live).await.unwrap();
    }
    let alerts = store
        .list_alerts(Some("acct_pipeline"), true, 10)
        .await
        .unwrap();
    assert_eq!(alerts.len(), 1);

    // Stripe redelivers the triggering event.
    let replay = payout_event("evt_3", base + Duration::minutes(30), 5000);
    let outcome = pipeline.process(&replay, EventSource::Live).await.unwrap();
    assert_eq!(outcome, IngestOutcome::Duplicate);

    let alerts = store
        .list_alerts(Some("acct_pipeline"), true, 10)
        .await
        .unwrap();
    assert_eq!(alerts.len(), 1);
}

#[tokio::test]
async fn alert_enqueues_notification_for_configured_channel() {
    let (_dir, store) = test_store().await;
    let pipeline = pipeline_with(store.clone());
    let base = Utc::now() - Duration::minutes(40);

    for i in 0..4 {
        let event = payout_event(&format!("evt_{i}"), base + Duration::minutes(i * 10), 5000);
        pipeline.process(&event, EventSource::Live).await.unwrap();
    }

    let item = store
        .claim_due_notification(Utc::now(), chrono::Duration::minutes(5))
        .await
        .unwrap()
        .expect("a notification should be queued");
    assert_eq!(item.channel, "slack");
    assert_eq!(item.destination, "https://hooks.example/T/B/X");
    assert_eq!(item.max_attempts, 3);
}

#[tokio::test]
async fn feedback_discounts_future_alerts_only() {
    let (_dir, store) = test_store().await;
    let pipeline = pipeline_with(store.clone());
    let base = Utc::now() - Duration::minutes(50);

    for i in 0..4 {
        let event = payout_event(&format!("evt_{i}"), base + Duration::minutes(i * 10), 5000);
        pipeline.process(&event, EventSource::Live).await.unwrap();
    }
    let first = store
        .list_alerts(Some("acct_pipeline"), true, 10)
        .await
        .unwrap()
        .remove(0);
    assert_eq!(first.risk_score, 60);

    store
        .insert_feedback(
            &first,
            "ops",
            guardian_common::types::Verdict::FalsePositive,
            None,
        )
        .await
        .unwrap();

    // The next velocity alert is discounted; the first keeps its score.
    let event = payout_event("evt_4", base + Duration::minutes(45), 5000);
    pipeline.process(&event, EventSource::Live).await.unwrap();

    let alerts = store
        .list_alerts(Some("acct_pipeline"), true, 10)
        .await
        .unwrap();
    assert_eq!(alerts.len(), 2);
    let newest = alerts
        .iter()
        .find(|a| a.source_event_id == "evt_4")
        .unwrap();
    let oldest = alerts
        .iter()
        .find(|a| a.source_event_id == "evt_3")
        .unwrap();
    assert_eq!(oldest.risk_score, 60);
    // 30 * (1 - 1.0) * ... = 0: every prior verdict was false positive.
    assert_eq!(newest.risk_score, 0);
}
