//! Historical event backfill. Pages events from the provider and runs
//! each through the same pipeline as live deliveries; dedup makes the
//! overlap between a resumed run and its predecessor harmless.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use guardian_common::types::{EventSource, RawEvent};
use guardian_storage::GuardianStore;
use serde::Deserialize;
use tokio::sync::watch;

use crate::pipeline::Pipeline;

pub struct EventPage {
    pub events: Vec<RawEvent>,
    /// Cursor for the next page; `None` means the listing is done.
    pub next_cursor: Option<String>,
}

/// Source of historical events, pluggable for tests.
#[async_trait]
pub trait EventProvider: Send + Sync {
    async fn fetch_page(
        &self,
        account_id: &str,
        created_after: i64,
        cursor: Option<&str>,
        page_size: u32,
    ) -> anyhow::Result<EventPage>;
}

/// How a backfill run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackfillOutcome {
    Completed,
    /// Cooperative stop; the checkpoint returns to `pending` and a
    /// later run resumes from the saved cursor.
    Stopped,
    Failed,
}

pub struct BackfillOrchestrator {
    store: Arc<GuardianStore>,
    pipeline: Arc<Pipeline>,
    provider: Arc<dyn EventProvider>,
    lookback_days: i64,
    page_size: u32,
    shutdown: watch::Receiver<bool>,
}

impl BackfillOrchestrator {
    pub fn new(
        store: Arc<GuardianStore>,
        pipeline: Arc<Pipeline>,
        provider: Arc<dyn EventProvider>,
        lookback_days: i64,
        page_size: u32,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            store,
            pipeline,
            provider,
            lookback_days,
            page_size,
            shutdown,
        }
    }

    /// Tries to claim the account's single-flight slot. `false` means
    /// a run is already in progress.
    pub async fn try_start(&self, account_id: &str) -> anyhow::Result<bool> {
        self.store.try_start_backfill(account_id).await
    }

    /// Drives a claimed run to a terminal state. The caller must have
    /// won `try_start` first. The shutdown flag is checked between
    /// pages only, so a page is never half-checkpointed. Any error,
    /// provider or store, lands the checkpoint at `error` with the last
    /// good cursor kept, so the account can be claimed again.
    pub async fn run(&self, account_id: &str) -> anyhow::Result<BackfillOutcome> {
        match self.run_pages(account_id).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                tracing::error!(account_id, error = %err, "Backfill run failed");
                self.store
                    .finish_backfill(account_id, "error", Some(&format!("{err:#}")))
                    .await?;
                Ok(BackfillOutcome::Failed)
            }
        }
    }

    async fn run_pages(&self, account_id: &str) -> anyhow::Result<BackfillOutcome> {
        let created_after = (Utc::now() - Duration::days(self.lookback_days)).timestamp();
        let mut cursor = self
            .store
            .backfill_status(account_id)
            .await?
            .and_then(|c| c.last_event_id);
        if cursor.is_some() {
            tracing::info!(account_id, cursor = ?cursor, "Resuming backfill");
        } else {
            tracing::info!(account_id, lookback_days = self.lookback_days, "Starting backfill");
        }

        loop {
            if *self.shutdown.borrow() {
                self.store
                    .finish_backfill(account_id, "pending", None)
                    .await?;
                tracing::info!(account_id, "Backfill stopped, will resume");
                return Ok(BackfillOutcome::Stopped);
            }

            let page = self
                .provider
                .fetch_page(account_id, created_after, cursor.as_deref(), self.page_size)
                .await
                .context("fetch event page")?;

            let mut processed = 0u32;
            for event in &page.events {
                if !is_supported_event(&event.event_type) {
                    continue;
                }
                self.pipeline.process(event, EventSource::Backfill).await?;
                processed += 1;
            }
            if let Some(last) = page.events.last() {
                self.store
                    .save_backfill_progress(account_id, &last.event_id, processed)
                    .await?;
            }

            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => {
                    self.store
                        .finish_backfill(account_id, "success", None)
                        .await?;
                    tracing::info!(account_id, "Backfill completed");
                    return Ok(BackfillOutcome::Completed);
                }
            }
        }
    }
}

/// Event families the rules care about; everything else in the
/// provider stream is skipped without touching the pipeline.
fn is_supported_event(event_type: &str) -> bool {
    event_type.starts_with("payout.")
        || event_type.starts_with("charge.")
        || event_type == "account.updated"
        || event_type == "external_account.created"
        || event_type.starts_with("review.")
}

/// Pages `/v1/events` on behalf of a connected account.
pub struct StripeEventProvider {
    client: reqwest::Client,
    api_base: String,
    secret_key: String,
}

#[derive(Deserialize)]
struct EventList {
    data: Vec<StripeEvent>,
    #[serde(default)]
    has_more: bool,
}

#[derive(Deserialize)]
struct StripeEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    created: i64,
    #[serde(default)]
    data: serde_json::Value,
}

impl StripeEventProvider {
    pub fn new(api_base: &str, secret_key: &str) -> anyhow::Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()?,
            api_base: api_base.trim_end_matches('/').to_string(),
            secret_key: secret_key.to_string(),
        })
    }
}

#[async_trait]
impl EventProvider for StripeEventProvider {
    async fn fetch_page(
        &self,
        account_id: &str,
        created_after: i64,
        cursor: Option<&str>,
        page_size: u32,
    ) -> anyhow::Result<EventPage> {
        let mut query: Vec<(&str, String)> = vec![
            ("limit", page_size.to_string()),
            ("created[gte]", created_after.to_string()),
        ];
        if let Some(cursor) = cursor {
            query.push(("starting_after", cursor.to_string()));
        }
        let response = self
            .client
            .get(format!("{}/v1/events", self.api_base))
            .bearer_auth(&self.secret_key)
            .header("Stripe-Account", account_id)
            .query(&query)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("event listing failed: {status} {body}");
        }
        let list: EventList = response.json().await?;

        let next_cursor = if list.has_more {
            list.data.last().map(|e| e.id.clone())
        } else {
            None
        };
        let events = list
            .data
            .into_iter()
            .map(|e| RawEvent {
                occurred_at: timestamp_to_utc(e.created),
                event_id: e.id,
                account_id: account_id.to_string(),
                event_type: e.event_type,
                payload: e.data,
            })
            .collect();
        Ok(EventPage {
            events,
            next_cursor,
        })
    }
}

fn timestamp_to_utc(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or_else(Utc::now)
}
