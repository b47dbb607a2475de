//! Per-account TTL cache in front of rule-config resolution, so hot
//! accounts do not hit the database on every event.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use guardian_rules::config::RuleConfig;
use guardian_storage::GuardianStore;
use tokio::sync::RwLock;

struct CachedConfig {
    config: RuleConfig,
    fetched_at: Instant,
}

pub struct RuleConfigCache {
    store: Arc<GuardianStore>,
    ttl: Duration,
    entries: RwLock<HashMap<String, CachedConfig>>,
}

impl RuleConfigCache {
    pub fn new(store: Arc<GuardianStore>, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// The effective rule config for an account. On a resolution
    /// failure a stale entry is preferred, so a database hiccup does
    /// not flip thresholds mid-stream; with nothing cached the failure
    /// propagates and the event is dead-lettered by the pipeline.
    pub async fn get(&self, account_id: &str) -> anyhow::Result<RuleConfig> {
        {
            let entries = self.entries.read().await;
            if let Some(entry) = entries.get(account_id) {
                if entry.fetched_at.elapsed() < self.ttl {
                    return Ok(entry.config.clone());
                }
            }
        }
        match self.store.resolve_rule_config(account_id).await {
            Ok(config) => {
                let mut entries = self.entries.write().await;
                entries.insert(
                    account_id.to_string(),
                    CachedConfig {
                        config: config.clone(),
                        fetched_at: Instant::now(),
                    },
                );
                Ok(config)
            }
            Err(err) => {
                tracing::warn!(account_id, error = %err, "Rule config resolution failed");
                let entries = self.entries.read().await;
                match entries.get(account_id) {
                    Some(entry) => Ok(entry.config.clone()),
                    None => Err(err).context("no rule config resolvable"),
                }
            }
        }
    }

    /// Drops the cached entry so the next lookup re-resolves, e.g.
    /// after a rule-set edit.
    pub async fn invalidate(&self, account_id: &str) {
        self.entries.write().await.remove(account_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn cache_with_store(ttl: Duration) -> (TempDir, Arc<GuardianStore>, RuleConfigCache) {
        let dir = TempDir::new().unwrap();
        let url = format!("sqlite://{}/guardian.db?mode=rwc", dir.path().display());
        let store = Arc::new(GuardianStore::new(&url).await.unwrap());
        let cache = RuleConfigCache::new(store.clone(), ttl);
        (dir, store, cache)
    }

    #[tokio::test]
    async fn serves_cached_value_within_ttl() {
        let (_dir, store, cache) = cache_with_store(Duration::from_secs(600)).await;
        let first = cache.get("acct_1").await.unwrap();
        assert_eq!(first.velocity.max_payouts, 3);

        // A change behind the cache is invisible until invalidation.
        let mut strict = RuleConfig::default();
        strict.velocity.max_payouts = 1;
        store.upsert_rule_set("default", &strict).await.unwrap();

        assert_eq!(cache.get("acct_1").await.unwrap().velocity.max_payouts, 3);
        cache.invalidate("acct_1").await;
        assert_eq!(cache.get("acct_1").await.unwrap().velocity.max_payouts, 1);
    }

    #[tokio::test]
    async fn zero_ttl_always_refetches() {
        let (_dir, store, cache) = cache_with_store(Duration::ZERO).await;
        assert_eq!(cache.get("acct_1").await.unwrap().velocity.max_payouts, 3);

        let mut strict = RuleConfig::default();
        strict.velocity.max_payouts = 2;
        store.upsert_rule_set("default", &strict).await.unwrap();
        assert_eq!(cache.get("acct_1").await.unwrap().velocity.max_payouts, 2);
    }
}
