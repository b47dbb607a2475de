//! Guardian server: webhook ingestion, the fraud pipeline, backfill
//! orchestration and the operator API, wired together over the shared
//! store.

pub mod api;
pub mod backfill;
pub mod config;
pub mod config_cache;
pub mod pipeline;
