use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use guardian_common::types::RawEvent;
use guardian_server::backfill::{BackfillOrchestrator, BackfillOutcome, EventPage, EventProvider};
use guardian_server::config_cache::RuleConfigCache;
use guardian_server::pipeline::{NotifyTargets, Pipeline};
use guardian_storage::GuardianStore;
use serde_json::json;
use tempfile::TempDir;
use tokio::sync::watch;

const ACCOUNT: &str = "acct_backfill";

async fn test_store() -> (TempDir, Arc<GuardianStore>) {
    let dir = TempDir::new().unwrap();
    let url = format!("sqlite://{}/guardian.db?mode=rwc", dir.path().display());
    let store = Arc::new(GuardianStore::new(&url).await.unwrap());
    (dir, store)
}

fn test_pipeline(store: Arc<GuardianStore>) -> Arc<Pipeline> {
    let cache = Arc::new(RuleConfigCache::new(
        store.clone(),
        std::time::Duration::from_secs(600),
    ));
    Arc::new(Pipeline::new(store, cache, NotifyTargets::default()))
}

fn payout_event(event_id: &str, minutes_ago: i64) -> RawEvent {
    RawEvent {
        event_id: event_id.to_string(),
        account_id: ACCOUNT.to_string(),
        event_type: "payout.created".to_string(),
        occurred_at: Utc::now() - Duration::minutes(minutes_ago),
        payload: json!({"object": {"id": format!("po_{event_id}"), "amount": 5000,
               "currency": "usd"}}),
    }
}

/// Serves fixed pages; optionally errors the first time a given page
/// index is requested, simulating a provider outage mid-run.
struct MockProvider {
    pages: Vec<Vec<RawEvent>>,
    fail_once_on_page: Option<usize>,
    failed: AtomicBool,
}

impl MockProvider {
    fn new(pages: Vec<Vec<RawEvent>>, fail_once_on_page: Option<usize>) -> Arc<Self> {
        Arc::new(Self {
            pages,
            fail_once_on_page,
            failed: AtomicBool::new(false),
        })
    }

    fn page_index_for(&self, cursor: Option<&str>) -> usize {
        let Some(cursor) = cursor else { return 0 };
        self.pages
            .iter()
            .position(|page| page.last().map(|e| e.event_id.as_str()) == Some(cursor))
            .map(|i| i + 1)
            .unwrap_or(0)
    }
}

#[async_trait]
impl EventProvider for MockProvider {
    async fn fetch_page(
        &self,
        _account_id: &str,
        _created_after: i64,
        cursor: Option<&str>,
        _page_size: u32,
    ) -> anyhow::Result<EventPage> {
        let index = self.page_index_for(cursor);
        if Some(index) == self.fail_once_on_page && !self.failed.swap(true, Ordering::SeqCst) {
            anyhow::bail!("simulated listing outage");
        }
        let events = self.pages.get(index).cloned().unwrap_or_default();
        let next_cursor = if index + 1 < self.pages.len() {
            events.last().map(|e| e.event_id.clone())
        } else {
            None
        };
        Ok(EventPage {
            events,
            next_cursor,
        })
    }
}

fn orchestrator(
    store: Arc<GuardianStore>,
    pipeline: Arc<Pipeline>,
    provider: Arc<MockProvider>,
    shutdown: watch::Receiver<bool>,
) -> BackfillOrchestrator {
    BackfillOrchestrator::new(store, pipeline, provider, 90, 100, shutdown)
}

fn two_pages() -> Vec<Vec<RawEvent>> {
    vec![
        vec![
            payout_event("evt_0", 50),
            payout_event("evt_1", 40),
            payout_event("evt_2", 30),
        ],
        vec![payout_event("evt_3", 20)],
    ]
}

#[tokio::test]
async fn full_run_processes_everything_and_completes() {
    let (_dir, store) = test_store().await;
    let pipeline = test_pipeline(store.clone());
    let provider = MockProvider::new(two_pages(), None);
    let (_tx, rx) = watch::channel(false);
    let runner = orchestrator(store.clone(), pipeline, provider, rx);

    assert!(runner.try_start(ACCOUNT).await.unwrap());
    assert_eq!(runner.run(ACCOUNT).await.unwrap(), BackfillOutcome::Completed);

    let checkpoint = store.backfill_status(ACCOUNT).await.unwrap().unwrap();
    assert_eq!(checkpoint.status, "success");
    assert_eq!(checkpoint.processed_count, 4);
    assert_eq!(store.event_count(ACCOUNT).await.unwrap(), 4);

    // The fourth payout tripped the velocity rule during backfill.
    let alerts = store.list_alerts(Some(ACCOUNT), true, 10).await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].alert_type, "velocity");
}

#[tokio::test]
async fn newest_first_pages_do_not_fire_rules_backwards() {
    let (_dir, store) = test_store().await;
    let pipeline = test_pipeline(store.clone());
    // Stripe lists events newest first. The oldest payout of the burst
    // is processed last; the newer payouts already stored must not
    // count toward its trailing window.
    let pages = vec![
        vec![
            payout_event("evt_3", 20),
            payout_event("evt_2", 30),
            payout_event("evt_1", 40),
        ],
        vec![payout_event("evt_0", 50)],
    ];
    let provider = MockProvider::new(pages, None);
    let (_tx, rx) = watch::channel(false);
    let runner = orchestrator(store.clone(), pipeline, provider, rx);

    assert!(runner.try_start(ACCOUNT).await.unwrap());
    assert_eq!(runner.run(ACCOUNT).await.unwrap(), BackfillOutcome::Completed);

    assert_eq!(store.event_count(ACCOUNT).await.unwrap(), 4);
    let alerts = store.list_alerts(Some(ACCOUNT), true, 10).await.unwrap();
    assert!(alerts.is_empty());
}

#[tokio::test]
async fn start_is_rejected_while_running() {
    let (_dir, store) = test_store().await;
    let pipeline = test_pipeline(store.clone());
    let provider = MockProvider::new(two_pages(), None);
    let (_tx, rx) = watch::channel(false);
    let runner = orchestrator(store.clone(), pipeline, provider, rx);

    assert!(runner.try_start(ACCOUNT).await.unwrap());
    assert!(!runner.try_start(ACCOUNT).await.unwrap());
}

#[tokio::test]
async fn failed_run_resumes_from_cursor_without_duplicate_alerts() {
    let (_dir, store) = test_store().await;
    let pipeline = test_pipeline(store.clone());
    // Page 1 errors once: the first run checkpoints page 0 and fails.
    let provider = MockProvider::new(two_pages(), Some(1));
    let (_tx, rx) = watch::channel(false);
    let runner = orchestrator(store.clone(), pipeline, provider, rx);

    assert!(runner.try_start(ACCOUNT).await.unwrap());
    assert_eq!(runner.run(ACCOUNT).await.unwrap(), BackfillOutcome::Failed);

    let checkpoint = store.backfill_status(ACCOUNT).await.unwrap().unwrap();
    assert_eq!(checkpoint.status, "error");
    assert_eq!(checkpoint.last_event_id.as_deref(), Some("evt_2"));
    assert_eq!(checkpoint.processed_count, 3);
    assert!(checkpoint.last_error.is_some());

    // Second run resumes at the cursor and finishes the job.
    assert!(runner.try_start(ACCOUNT).await.unwrap());
    assert_eq!(runner.run(ACCOUNT).await.unwrap(), BackfillOutcome::Completed);

    let checkpoint = store.backfill_status(ACCOUNT).await.unwrap().unwrap();
    assert_eq!(checkpoint.status, "success");
    assert_eq!(checkpoint.processed_count, 4);
    assert_eq!(store.event_count(ACCOUNT).await.unwrap(), 4);
    let alerts = store.list_alerts(Some(ACCOUNT), true, 10).await.unwrap();
    assert_eq!(alerts.len(), 1);
}

#[tokio::test]
async fn shutdown_stops_between_pages_and_leaves_run_resumable() {
    let (_dir, store) = test_store().await;
    let pipeline = test_pipeline(store.clone());
    let provider = MockProvider::new(two_pages(), None);
    let (tx, rx) = watch::channel(true);
    let runner = orchestrator(store.clone(), pipeline.clone(), provider, rx);

    assert!(runner.try_start(ACCOUNT).await.unwrap());
    assert_eq!(runner.run(ACCOUNT).await.unwrap(), BackfillOutcome::Stopped);

    let checkpoint = store.backfill_status(ACCOUNT).await.unwrap().unwrap();
    assert_eq!(checkpoint.status, "pending");
    assert_eq!(store.event_count(ACCOUNT).await.unwrap(), 0);

    // After a restart the run goes to completion.
    tx.send(false).unwrap();
    let provider = MockProvider::new(two_pages(), None);
    let (_tx2, rx2) = watch::channel(false);
    let runner = orchestrator(store.clone(), pipeline, provider, rx2);
    assert!(runner.try_start(ACCOUNT).await.unwrap());
    assert_eq!(runner.run(ACCOUNT).await.unwrap(), BackfillOutcome::Completed);
    assert_eq!(store.event_count(ACCOUNT).await.unwrap(), 4);
}
