//! HTTP surface: webhook ingestion plus the operator API.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{TimeZone, Utc};
use guardian_common::types::{EventSource, RawEvent, Verdict};
use guardian_storage::GuardianStore;
use serde::Deserialize;
use serde_json::json;

use crate::backfill::BackfillOrchestrator;
use crate::pipeline::{IngestOutcome, Pipeline};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<GuardianStore>,
    pub pipeline: Arc<Pipeline>,
    pub backfill: Arc<BackfillOrchestrator>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/stripe/webhook", post(receive_webhook))
        .route(
            "/api/accounts/:account_id/backfill",
            post(start_backfill).get(backfill_status),
        )
        .route("/api/alerts", get(list_alerts))
        .route("/api/alerts/:alert_id/resolve", post(resolve_alert))
        .route("/api/alerts/:alert_id/feedback", post(submit_feedback))
        .route("/api/dead-letters", get(list_dead_letters))
        .with_state(state)
}

/// Internal failures become a 500 with the message in the body.
struct ApiError(anyhow::Error);

impl<E: Into<anyhow::Error>> From<E> for ApiError {
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self.0, "Request failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": self.0.to_string()})),
        )
            .into_response()
    }
}

async fn healthz() -> &'static str {
    "ok"
}

/// Stripe event envelope, as delivered to the webhook endpoint.
#[derive(Debug, Deserialize)]
struct WebhookEvent {
    id: String,
    /// Connected account; absent on platform-level events.
    account: Option<String>,
    #[serde(rename = "type")]
    event_type: String,
    created: i64,
    #[serde(default)]
    data: serde_json::Value,
}

async fn receive_webhook(
    State(state): State<AppState>,
    Json(event): Json<WebhookEvent>,
) -> Result<Response, ApiError> {
    let Some(account_id) = event.account else {
        // Platform events carry no connected account; ack and move on.
        return Ok(Json(json!({"received": true, "ignored": true})).into_response());
    };
    let raw = RawEvent {
        event_id: event.id,
        account_id,
        event_type: event.event_type,
        occurred_at: Utc
            .timestamp_opt(event.created, 0)
            .single()
            .unwrap_or_else(Utc::now),
        payload: event.data,
    };
    let outcome = state.pipeline.process(&raw, EventSource::Live).await?;
    let body = match outcome {
        IngestOutcome::Duplicate => json!({"received": true, "duplicate": true}),
        IngestOutcome::Processed { alerts_created } => {
            json!({"received": true, "duplicate": false, "alerts_created": alerts_created})
        }
    };
    Ok(Json(body).into_response())
}

async fn start_backfill(
    State(state): State<AppState>,
    Path(account_id): Path<String>,
) -> Result<Response, ApiError> {
    if !state.backfill.try_start(&account_id).await? {
        return Ok((
            StatusCode::CONFLICT,
            Json(json!({"error": "backfill already running"})),
        )
            .into_response());
    }
    let orchestrator = state.backfill.clone();
    let account = account_id.clone();
    tokio::spawn(async move {
        if let Err(err) = orchestrator.run(&account).await {
            tracing::error!(account_id = %account, error = %err, "Backfill task failed");
        }
    });
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({"account_id": account_id, "started": true})),
    )
        .into_response())
}

async fn backfill_status(
    State(state): State<AppState>,
    Path(account_id): Path<String>,
) -> Result<Response, ApiError> {
    match state.store.backfill_status(&account_id).await? {
        Some(checkpoint) => Ok(Json(checkpoint).into_response()),
        None => Ok((
            StatusCode::NOT_FOUND,
            Json(json!({"error": "no backfill for this account"})),
        )
            .into_response()),
    }
}

#[derive(Debug, Deserialize)]
struct AlertsQuery {
    account_id: Option<String>,
    #[serde(default)]
    include_resolved: bool,
    #[serde(default = "default_limit")]
    limit: u64,
}

fn default_limit() -> u64 {
    50
}

async fn list_alerts(
    State(state): State<AppState>,
    Query(query): Query<AlertsQuery>,
) -> Result<Response, ApiError> {
    let alerts = state
        .store
        .list_alerts(
            query.account_id.as_deref(),
            query.include_resolved,
            query.limit,
        )
        .await?;
    Ok(Json(alerts).into_response())
}

async fn resolve_alert(
    State(state): State<AppState>,
    Path(alert_id): Path<String>,
) -> Result<Response, ApiError> {
    if !state.store.resolve_alert(&alert_id).await? {
        return Ok((
            StatusCode::NOT_FOUND,
            Json(json!({"error": "alert not found"})),
        )
            .into_response());
    }
    Ok(Json(json!({"resolved": true})).into_response())
}

#[derive(Debug, Deserialize)]
struct FeedbackBody {
    user_id: String,
    verdict: String,
    comment: Option<String>,
}

async fn submit_feedback(
    State(state): State<AppState>,
    Path(alert_id): Path<String>,
    Json(body): Json<FeedbackBody>,
) -> Result<Response, ApiError> {
    let verdict: Verdict = match body.verdict.parse() {
        Ok(verdict) => verdict,
        Err(err) => {
            return Ok((StatusCode::BAD_REQUEST, Json(json!({"error": err}))).into_response())
        }
    };
    let Some(alert) = state.store.get_alert(&alert_id).await? else {
        return Ok((
            StatusCode::NOT_FOUND,
            Json(json!({"error": "alert not found"})),
        )
            .into_response());
    };
    let feedback_id = state
        .store
        .insert_feedback(&alert, &body.user_id, verdict, body.comment)
        .await?;
    Ok(Json(json!({"feedback_id": feedback_id})).into_response())
}

#[derive(Debug, Deserialize)]
struct DeadLetterQuery {
    #[serde(default = "default_limit")]
    limit: u64,
}

async fn list_dead_letters(
    State(state): State<AppState>,
    Query(query): Query<DeadLetterQuery>,
) -> Result<Response, ApiError> {
    let letters = state.store.list_dead_letters(query.limit).await?;
    Ok(Json(letters).into_response())
}
