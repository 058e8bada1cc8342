use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::GatewayError;

use super::store::CredentialStore;

const SWEEP_INTERVAL: Duration = Duration::from_secs(30 * 60);
const SKIP_UNUSED_FOR: chrono::Duration = chrono::Duration::minutes(30);
const FORCE_CHECK_AFTER: chrono::Duration = chrono::Duration::hours(5);
const DISABLE_THRESHOLD: f64 = 0.05;

/// Per-credential snapshot of upstream quota, keyed the same way the
/// credential itself is identified for bookkeeping purposes (see
/// `quota_key`).
#[derive(Debug, Clone, Default)]
pub struct QuotaCacheEntry {
    pub models: HashMap<String, f64>,
    pub last_check: Option<DateTime<Utc>>,
    pub last_used: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct FetchAvailableModelsResponse {
    #[serde(default)]
    models: Vec<ModelQuota>,
}

#[derive(Debug, Deserialize)]
struct ModelQuota {
    name: String,
    remaining: f64,
}

/// Polls upstream quota on a fixed cadence and keeps `disabledModels`
/// in sync across the credential store.
///
/// The quota-cache key is the credential's `projectId` once known, falling
/// back to its `refreshToken` before that; `migrate_key` moves an entry
/// across that boundary the first time a project id becomes available so
/// bookkeeping isn't orphaned under the old key.
pub struct QuotaMonitor {
    store: Arc<CredentialStore>,
    http: reqwest::Client,
    api_models_url: String,
    cache: RwLock<HashMap<String, QuotaCacheEntry>>,
    is_checking: Arc<AtomicBool>,
}

impl QuotaMonitor {
    pub fn new(store: Arc<CredentialStore>, http: reqwest::Client, api_models_url: String) -> Arc<Self> {
        Arc::new(Self {
            store,
            http,
            api_models_url,
            cache: RwLock::new(HashMap::new()),
            is_checking: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Spawns the background sweep loop. Ticks that land while a previous
    /// sweep is still running are skipped with a warning rather than
    /// queued, since a stuck sweep should not pile up work.
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if this.is_checking.swap(true, Ordering::SeqCst) {
                    warn!("quota sweep skipped: previous sweep still running");
                    continue;
                }
                if let Err(e) = this.sweep_once().await {
                    warn!(error = %e, "quota sweep failed");
                }
                this.is_checking.store(false, Ordering::SeqCst);
            }
        })
    }

    /// Bumps `lastUsed` for the credential identified by `key`. Called by
    /// the selector on every successful selection.
    pub async fn mark_used(&self, key: &str) {
        let mut guard = self.cache.write().await;
        guard.entry(key.to_string()).or_default().last_used = Some(Utc::now());
    }

    /// Moves a cache entry from its old key to its newly-learned `projectId`
    /// key, the first time a credential's project id becomes known, so the
    /// quota bookkeeping accumulated under the refresh-token key isn't
    /// orphaned once `quota_key` starts preferring the project id.
    pub async fn migrate_key(&self, old_key: &str, new_key: &str) {
        if old_key == new_key {
            return;
        }
        let mut guard = self.cache.write().await;
        if let Some(entry) = guard.remove(old_key) {
            guard.insert(new_key.to_string(), entry);
        }
    }

    pub async fn group_average_remaining(&self, key: &str, group: &[&str]) -> Option<f64> {
        let guard = self.cache.read().await;
        let entry = guard.get(key)?;
        if group.is_empty() {
            return None;
        }
        let sum: f64 = group.iter().map(|m| *entry.models.get(*m).unwrap_or(&0.0)).sum();
        Some(sum / group.len() as f64)
    }

    async fn sweep_once(&self) -> Result<(), GatewayError> {
        let credentials = self.store.snapshot().await;
        let now = Utc::now();

        for cred in credentials.iter().filter(|c| c.enabled) {
            let key = quota_key(cred);

            let should_skip = {
                let guard = self.cache.read().await;
                match guard.get(&key) {
                    Some(entry) => {
                        let recently_used = entry
                            .last_used
                            .map(|t| now - t < SKIP_UNUSED_FOR)
                            .unwrap_or(false);
                        let recently_checked = entry
                            .last_check
                            .map(|t| now - t < FORCE_CHECK_AFTER)
                            .unwrap_or(false);
                        !recently_used && recently_checked
                    }
                    None => false,
                }
            };
            if should_skip {
                continue;
            }

            let access_token = match &cred.access_token {
                Some(t) => t.clone(),
                None => continue,
            };

            let models = match self.fetch_quota(&access_token).await {
                Ok(models) => models,
                Err(e) => {
                    warn!(credential = %key, error = %e, "quota check failed, skipping this credential");
                    continue;
                }
            };

            {
                let mut guard = self.cache.write().await;
                let entry = guard.entry(key.clone()).or_default();
                entry.models = models.clone();
                entry.last_check = Some(now);
            }

            for (model, remaining) in &models {
                let currently_disabled = cred.disabled_models.contains(model);
                if *remaining <= DISABLE_THRESHOLD && !currently_disabled {
                    self.store
                        .set_disabled_models(&cred.refresh_token, model, true)
                        .await;
                    info!(model = %model, credential = %key, remaining, "model disabled: quota below threshold");
                } else if *remaining > DISABLE_THRESHOLD && currently_disabled {
                    self.store
                        .set_disabled_models(&cred.refresh_token, model, false)
                        .await;
                    info!(model = %model, credential = %key, remaining, "model re-enabled: quota recovered");
                }
            }
            self.store.persist().await?;
        }
        Ok(())
    }

    async fn fetch_quota(&self, access_token: &str) -> Result<HashMap<String, f64>, GatewayError> {
        let resp = self
            .http
            .post(&self.api_models_url)
            .bearer_auth(access_token)
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| GatewayError::Transient(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(GatewayError::Transient(format!(
                "fetchAvailableModels returned {}",
                resp.status()
            )));
        }

        let body: FetchAvailableModelsResponse = resp
            .json()
            .await
            .map_err(|e| GatewayError::Transient(e.to_string()))?;
        debug!(count = body.models.len(), "quota fetched");
        Ok(body.models.into_iter().map(|m| (m.name, m.remaining)).collect())
    }
}

/// Prefers `projectId` once known, falls back to `refreshToken` before that.
pub fn quota_key(cred: &super::types::Credential) -> String {
    cred.project_id
        .clone()
        .unwrap_or_else(|| cred.refresh_token.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::store::CredentialStore;

    fn monitor() -> Arc<QuotaMonitor> {
        let store = Arc::new(CredentialStore::new(
            std::path::Path::new("/tmp/unused-credentials.json"),
            reqwest::Client::new(),
        ));
        QuotaMonitor::new(store, reqwest::Client::new(), "http://unused".into())
    }

    #[tokio::test]
    async fn migrate_key_moves_entry_to_new_key() {
        let monitor = monitor();
        monitor.mark_used("refresh-token-1").await;
        {
            let mut guard = monitor.cache.write().await;
            guard.get_mut("refresh-token-1").unwrap().models.insert("gemini-2.5-pro".into(), 0.5);
        }

        monitor.migrate_key("refresh-token-1", "proj-123").await;

        let guard = monitor.cache.read().await;
        assert!(!guard.contains_key("refresh-token-1"));
        let entry = guard.get("proj-123").expect("entry migrated to new key");
        assert_eq!(entry.models.get("gemini-2.5-pro"), Some(&0.5));
    }

    #[tokio::test]
    async fn migrate_key_is_noop_when_old_key_has_no_entry() {
        let monitor = monitor();
        monitor.migrate_key("refresh-token-1", "proj-123").await;
        let guard = monitor.cache.read().await;
        assert!(guard.is_empty());
    }

    #[tokio::test]
    async fn migrate_key_is_noop_when_keys_are_equal() {
        let monitor = monitor();
        monitor.mark_used("proj-123").await;
        monitor.migrate_key("proj-123", "proj-123").await;
        let guard = monitor.cache.read().await;
        assert!(guard.contains_key("proj-123"));
    }
}
