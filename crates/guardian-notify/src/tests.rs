use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use guardian_common::types::{AlertType, FiredRule, Severity};
use guardian_storage::{AlertInsert, GuardianStore, InsertOutcome};
use tempfile::TempDir;

use crate::channels::{AlertMessage, NotificationChannel};
use crate::dispatcher::{DispatchOutcome, Dispatcher, DispatcherSettings};
use crate::error::NotifyError;
use crate::pause::PayoutPauser;

async fn test_store() -> (TempDir, Arc<GuardianStore>) {
    let dir = TempDir::new().unwrap();
    let url = format!("sqlite://{}/guardian.db?mode=rwc", dir.path().display());
    let store = GuardianStore::new(&url).await.unwrap();
    (dir, Arc::new(store))
}

fn test_settings() -> DispatcherSettings {
    DispatcherSettings {
        poll_interval: std::time::Duration::from_millis(10),
        lease: chrono::Duration::minutes(5),
        // Immediate retries keep the tests clock-free.
        base_backoff_secs: 0.0,
    }
}

async fn pausing_alert(store: &GuardianStore, account_id: &str, event_id: &str) -> String {
    let fired = FiredRule {
        alert_type: AlertType::Velocity,
        severity: Severity::High,
        message: "payout velocity breach".to_string(),
        payout_id: Some("po_1".to_string()),
        auto_pause: true,
    };
    let outcome = store
        .insert_alert(AlertInsert {
            account_id,
            source_event_id: event_id,
            fired: &fired,
            risk_score: 60,
        })
        .await
        .unwrap();
    match outcome {
        InsertOutcome::Created(alert) => alert.id,
        InsertOutcome::Duplicate => panic!("alert already present"),
    }
}

/// Fails the first `failures_before_success` sends, then succeeds.
struct MockChannel {
    failures_before_success: usize,
    calls: AtomicUsize,
}

impl MockChannel {
    fn new(failures_before_success: usize) -> Arc<Self> {
        Arc::new(Self {
            failures_before_success,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NotificationChannel for MockChannel {
    fn channel_type(&self) -> &str {
        "mock"
    }

    async fn send(&self, _destination: &str, _message: &AlertMessage) -> Result<(), NotifyError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.failures_before_success {
            return Err(NotifyError::Delivery {
                channel: "mock".to_string(),
                reason: "simulated outage".to_string(),
            });
        }
        Ok(())
    }
}

struct MockPauser {
    calls: AtomicUsize,
    fail: bool,
}

impl MockPauser {
    fn new(fail: bool) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PayoutPauser for MockPauser {
    async fn pause_payouts(&self, _account_id: &str) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            anyhow::bail!("stripe unavailable");
        }
        Ok(())
    }
}

#[tokio::test]
async fn successful_delivery_marks_sent() {
    let (_dir, store) = test_store().await;
    let channel = MockChannel::new(0);
    let mut dispatcher = Dispatcher::new(store.clone(), None, test_settings());
    dispatcher.register_channel(channel.clone());

    let id = store
        .enqueue_notification("alert_1", "acct_1", "mock", "dest", 5)
        .await
        .unwrap();

    assert_eq!(
        dispatcher.dispatch_next().await.unwrap(),
        DispatchOutcome::Sent
    );
    assert_eq!(
        dispatcher.dispatch_next().await.unwrap(),
        DispatchOutcome::Idle
    );
    assert_eq!(channel.calls(), 1);

    let item = store.get_notification(&id).await.unwrap().unwrap();
    assert_eq!(item.status, "sent");
}

#[tokio::test]
async fn transient_failures_retry_until_success() {
    let (_dir, store) = test_store().await;
    let channel = MockChannel::new(2);
    let mut dispatcher = Dispatcher::new(store.clone(), None, test_settings());
    dispatcher.register_channel(channel.clone());

    let id = store
        .enqueue_notification("alert_1", "acct_1", "mock", "dest", 5)
        .await
        .unwrap();

    assert_eq!(
        dispatcher.dispatch_next().await.unwrap(),
        DispatchOutcome::Retried
    );
    assert_eq!(
        dispatcher.dispatch_next().await.unwrap(),
        DispatchOutcome::Retried
    );
    assert_eq!(
        dispatcher.dispatch_next().await.unwrap(),
        DispatchOutcome::Sent
    );
    assert_eq!(channel.calls(), 3);

    let item = store.get_notification(&id).await.unwrap().unwrap();
    assert_eq!(item.status, "sent");
    assert_eq!(
        item.last_error.as_deref(),
        Some("channel mock rejected the message: simulated outage")
    );
}

#[tokio::test]
async fn exhausted_item_is_dead_lettered_once() {
    let (_dir, store) = test_store().await;
    let channel = MockChannel::new(usize::MAX);
    let mut dispatcher = Dispatcher::new(store.clone(), None, test_settings());
    dispatcher.register_channel(channel.clone());

    let id = store
        .enqueue_notification("alert_1", "acct_1", "mock", "dest", 2)
        .await
        .unwrap();

    assert_eq!(
        dispatcher.dispatch_next().await.unwrap(),
        DispatchOutcome::Retried
    );
    assert_eq!(
        dispatcher.dispatch_next().await.unwrap(),
        DispatchOutcome::Dead
    );
    // The dead item never comes back.
    assert_eq!(
        dispatcher.dispatch_next().await.unwrap(),
        DispatchOutcome::Idle
    );
    assert_eq!(channel.calls(), 2);

    let item = store.get_notification(&id).await.unwrap().unwrap();
    assert_eq!(item.status, "dead");

    let dead = store.list_dead_letters(10).await.unwrap();
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].source_id, id);
    assert_eq!(dead[0].account_id.as_deref(), Some("acct_1"));
}

#[tokio::test]
async fn unregistered_channel_exhausts_like_any_failure() {
    let (_dir, store) = test_store().await;
    let dispatcher = Dispatcher::new(store.clone(), None, test_settings());

    store
        .enqueue_notification("alert_1", "acct_1", "carrier-pigeon", "dest", 1)
        .await
        .unwrap();

    assert_eq!(
        dispatcher.dispatch_next().await.unwrap(),
        DispatchOutcome::Dead
    );
    let dead = store.list_dead_letters(10).await.unwrap();
    assert_eq!(dead.len(), 1);
    assert!(dead[0].last_error.contains("carrier-pigeon"));
}

#[tokio::test]
async fn one_failure_does_not_block_other_items() {
    let (_dir, store) = test_store().await;
    let failing = MockChannel::new(usize::MAX);
    let mut dispatcher = Dispatcher::new(store.clone(), None, test_settings());
    dispatcher.register_channel(failing);

    store
        .enqueue_notification("alert_1", "acct_1", "mock", "dest_a", 1)
        .await
        .unwrap();
    let ok_id = store
        .enqueue_notification("alert_2", "acct_1", "mock", "dest_b", 5)
        .await
        .unwrap();

    // Drain: the first dies, but the second still gets attempts.
    let mut outcomes = Vec::new();
    loop {
        match dispatcher.dispatch_next().await.unwrap() {
            DispatchOutcome::Idle => break,
            outcome => outcomes.push(outcome),
        }
        if outcomes.len() > 20 {
            break;
        }
    }
    assert!(outcomes.contains(&DispatchOutcome::Dead));
    let item = store.get_notification(&ok_id).await.unwrap().unwrap();
    // Always-failing mock: the second item also runs out of attempts
    // eventually, but only after its own five tries.
    assert!(item.attempt >= 1);
}

#[tokio::test]
async fn auto_pause_alert_pauses_account_once() {
    let (_dir, store) = test_store().await;
    let channel = MockChannel::new(0);
    let pauser = MockPauser::new(false);
    let mut dispatcher = Dispatcher::new(store.clone(), Some(pauser.clone()), test_settings());
    dispatcher.register_channel(channel.clone());

    let alert_id = pausing_alert(&store, "acct_pause", "evt_1").await;
    store
        .enqueue_notification(&alert_id, "acct_pause", "mock", "dest_a", 5)
        .await
        .unwrap();
    store
        .enqueue_notification(&alert_id, "acct_pause", "mock", "dest_b", 5)
        .await
        .unwrap();

    assert_eq!(
        dispatcher.dispatch_next().await.unwrap(),
        DispatchOutcome::Sent
    );
    assert_eq!(
        dispatcher.dispatch_next().await.unwrap(),
        DispatchOutcome::Sent
    );
    // Two queue items for the same alert, one pause.
    assert_eq!(pauser.calls(), 1);

    let account = store.get_account("acct_pause").await.unwrap().unwrap();
    assert!(account.payouts_paused);
    let alert = store.get_alert(&alert_id).await.unwrap().unwrap();
    assert!(alert.resolved);
}

#[tokio::test]
async fn pause_failure_does_not_affect_delivery() {
    let (_dir, store) = test_store().await;
    let channel = MockChannel::new(0);
    let pauser = MockPauser::new(true);
    let mut dispatcher = Dispatcher::new(store.clone(), Some(pauser.clone()), test_settings());
    dispatcher.register_channel(channel.clone());

    let alert_id = pausing_alert(&store, "acct_pause", "evt_1").await;
    let item_id = store
        .enqueue_notification(&alert_id, "acct_pause", "mock", "dest", 5)
        .await
        .unwrap();

    assert_eq!(
        dispatcher.dispatch_next().await.unwrap(),
        DispatchOutcome::Sent
    );
    assert_eq!(pauser.calls(), 1);

    let item = store.get_notification(&item_id).await.unwrap().unwrap();
    assert_eq!(item.status, "sent");
    // The failed pause leaves the alert open for the next attempt.
    let alert = store.get_alert(&alert_id).await.unwrap().unwrap();
    assert!(!alert.resolved);
    let account = store.get_account("acct_pause").await.unwrap();
    assert!(!account.map(|a| a.payouts_paused).unwrap_or(false));
}

#[tokio::test]
async fn already_paused_account_is_not_paused_again() {
    let (_dir, store) = test_store().await;
    let channel = MockChannel::new(0);
    let pauser = MockPauser::new(false);
    let mut dispatcher = Dispatcher::new(store.clone(), Some(pauser.clone()), test_settings());
    dispatcher.register_channel(channel.clone());

    store.set_payouts_paused("acct_pause", true).await.unwrap();
    let alert_id = pausing_alert(&store, "acct_pause", "evt_1").await;
    store
        .enqueue_notification(&alert_id, "acct_pause", "mock", "dest", 5)
        .await
        .unwrap();

    assert_eq!(
        dispatcher.dispatch_next().await.unwrap(),
        DispatchOutcome::Sent
    );
    assert_eq!(pauser.calls(), 0);
}
