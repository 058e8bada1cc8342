use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::model_group_of;
use crate::error::GatewayError;
use crate::tokens::UsageLedger;

use super::cooldown::{CooldownReason, CooldownRegistry};
use super::quota::{quota_key, QuotaMonitor};
use super::store::CredentialStore;
use super::types::Credential;

/// Round-robin selection of a usable credential for a requested model.
///
/// Holds a shared `current_index` across calls so repeated selections walk
/// the pool in a stable order. The selector depends on the store, the
/// cooldown registry, the quota monitor (for `markUsed` and group-average
/// lookups) and the usage ledger for the hourly cap.
pub struct CredentialSelector {
    store: Arc<CredentialStore>,
    cooldowns: Arc<CooldownRegistry>,
    quota: Arc<QuotaMonitor>,
    usage: Arc<UsageLedger>,
    current_index: AtomicUsize,
    hourly_limit: u32,
    synthesize_project_id: bool,
    api_url: String,
}

impl CredentialSelector {
    pub fn new(
        store: Arc<CredentialStore>,
        cooldowns: Arc<CooldownRegistry>,
        quota: Arc<QuotaMonitor>,
        usage: Arc<UsageLedger>,
        hourly_limit: u32,
        synthesize_project_id: bool,
        api_url: String,
    ) -> Self {
        Self {
            store,
            cooldowns,
            quota,
            usage,
            current_index: AtomicUsize::new(0),
            hourly_limit,
            synthesize_project_id,
            api_url,
        }
    }

    /// Walks the pool starting from `current_index`, advancing past
    /// credentials that are disabled for this model, expired-and-dead,
    /// cooling down, or already over the hourly cap. Returns the first
    /// usable credential, bumping its usage ledger entry before returning.
    pub async fn select(&self, model: Option<&str>) -> Result<Credential, GatewayError> {
        let pool = self.store.snapshot().await;
        let n = pool.len();
        if n == 0 {
            return Err(GatewayError::PoolExhausted);
        }

        for _ in 0..n {
            let idx = self.current_index.fetch_add(1, Ordering::SeqCst) % n;
            let mut cred = pool[idx].clone();

            if let Some(model) = model {
                if cred.disabled_models.contains(model) {
                    continue;
                }
            }

            if cred.needs_refresh() {
                match self.store.refresh(&cred.refresh_token).await {
                    Ok(()) => {
                        cred = match self.store.get(&cred.refresh_token).await {
                            Some(refreshed) => refreshed,
                            None => continue,
                        };
                    }
                    Err(GatewayError::AuthDead(reason)) => {
                        warn!(credential = %cred.refresh_token, reason, "disabling credential: auth dead");
                        let _ = self.store.disable(&cred.refresh_token).await;
                        continue;
                    }
                    Err(_transient) => continue,
                }
            }

            if cred.project_id.is_none() {
                match self.ensure_project_id(&cred).await {
                    Ok(refreshed) => cred = refreshed,
                    Err(GatewayError::AuthDead(reason)) => {
                        warn!(credential = %cred.refresh_token, reason, "disabling credential: no project id");
                        let _ = self.store.disable(&cred.refresh_token).await;
                        continue;
                    }
                    Err(_transient) => continue,
                }
            }

            let project_id = match &cred.project_id {
                Some(p) => p.clone(),
                None => continue,
            };

            if let Some(model) = model {
                if self.cooldowns.is_on(&project_id, model).await {
                    continue;
                }
            }

            if self.usage.count_last_hour(&project_id) >= self.hourly_limit as usize {
                continue;
            }

            self.usage.mark_used(&project_id);
            self.quota.mark_used(&quota_key(&cred)).await;
            debug!(credential = %project_id, model, "credential selected");
            return Ok(cred);
        }

        Err(GatewayError::PoolExhausted)
    }

    /// Direct lookup for callers continuing a session against a specific
    /// credential (e.g. a retried request that must stick to the same
    /// identity for thought-signature continuity).
    pub async fn by_project_id(&self, project_id: &str) -> Option<Credential> {
        self.store
            .snapshot()
            .await
            .into_iter()
            .find(|c| c.project_id.as_deref() == Some(project_id))
    }

    /// Installs a cooldown for `(project_id, model)`, consulting the live
    /// group-average quota so a single rate-limited model doesn't take its
    /// whole quota-sharing group down with it.
    pub async fn install_cooldown(
        &self,
        project_id: &str,
        model: &str,
        reset_at: chrono::DateTime<chrono::Utc>,
        reason: CooldownReason,
    ) -> Result<(), GatewayError> {
        let group = model_group_of(model);
        let average = if group.len() > 1 {
            self.quota.group_average_remaining(project_id, &group).await
        } else {
            None
        };
        self.cooldowns
            .put(project_id, model, reset_at, reason, average)
            .await
    }

    async fn ensure_project_id(&self, cred: &Credential) -> Result<Credential, GatewayError> {
        let old_key = quota_key(cred);
        match self.store.fetch_project_id(&cred.refresh_token, &self.api_url).await {
            Ok(()) => {
                let refreshed = self.store.get(&cred.refresh_token).await.unwrap_or_else(|| cred.clone());
                self.quota.migrate_key(&old_key, &quota_key(&refreshed)).await;
                Ok(refreshed)
            }
            Err(GatewayError::AuthDead(reason)) if self.synthesize_project_id => {
                debug!(credential = %cred.refresh_token, reason, "synthesizing placeholder project id");
                let placeholder = format!("placeholder-{}", uuid::Uuid::new_v4());
                self.store.set_project_id(&cred.refresh_token, &placeholder).await;
                let refreshed = self
                    .store
                    .get(&cred.refresh_token)
                    .await
                    .ok_or_else(|| GatewayError::Unexpected("credential vanished".into()))?;
                self.quota.migrate_key(&old_key, &quota_key(&refreshed)).await;
                Ok(refreshed)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::PersistedCredential;
    use std::collections::HashSet;
    use tempfile::NamedTempFile;

    async fn make_store(creds: Vec<PersistedCredential>) -> (Arc<CredentialStore>, NamedTempFile) {
        let file = NamedTempFile::new().unwrap();
        tokio::fs::write(file.path(), serde_json::to_vec(&creds).unwrap())
            .await
            .unwrap();
        let store = Arc::new(CredentialStore::new(file.path(), reqwest::Client::new()));
        store.load().await.unwrap();
        (store, file)
    }

    fn healthy_credential(refresh_token: &str, project_id: &str) -> PersistedCredential {
        PersistedCredential {
            refresh_token: refresh_token.to_string(),
            access_token: Some("tok".to_string()),
            expires_in: Some(3600),
            timestamp: Some(chrono::Utc::now()),
            project_id: Some(project_id.to_string()),
            enable: true,
            disabled_models: HashSet::new(),
        }
    }

    #[tokio::test]
    async fn empty_pool_returns_pool_exhausted() {
        let (store, _f) = make_store(vec![]).await;
        let cooldowns = CooldownRegistry::new(tempfile::NamedTempFile::new().unwrap().path());
        let quota = QuotaMonitor::new(store.clone(), reqwest::Client::new(), "http://unused".into());
        let usage = Arc::new(UsageLedger::new());
        let selector = CredentialSelector::new(store, cooldowns, quota, usage, 20, false, "http://x".into());

        let err = selector.select(Some("gemini-2.5-pro")).await.unwrap_err();
        assert!(matches!(err, GatewayError::PoolExhausted));
    }

    #[tokio::test]
    async fn hourly_cap_routes_around_capped_credential() {
        let (store, _f) = make_store(vec![
            healthy_credential("A", "proj-a"),
            healthy_credential("B", "proj-b"),
        ])
        .await;
        let cooldowns = CooldownRegistry::new(tempfile::NamedTempFile::new().unwrap().path());
        let quota = QuotaMonitor::new(store.clone(), reqwest::Client::new(), "http://unused".into());
        let usage = Arc::new(UsageLedger::new());
        for _ in 0..2 {
            usage.mark_used("proj-a");
        }
        let selector = CredentialSelector::new(store, cooldowns, quota, usage, 2, false, "http://x".into());

        let first = selector.select(Some("gemini-2.5-pro")).await.unwrap();
        let second = selector.select(Some("gemini-2.5-pro")).await.unwrap();
        assert_eq!(first.project_id.as_deref(), Some("proj-b"));
        assert_eq!(second.project_id.as_deref(), Some("proj-b"));
    }

    #[tokio::test]
    async fn round_robin_fairness_over_many_requests() {
        let (store, _f) = make_store(vec![
            healthy_credential("A", "proj-a"),
            healthy_credential("B", "proj-b"),
        ])
        .await;
        let cooldowns = CooldownRegistry::new(tempfile::NamedTempFile::new().unwrap().path());
        let quota = QuotaMonitor::new(store.clone(), reqwest::Client::new(), "http://unused".into());
        let usage = Arc::new(UsageLedger::new());
        let selector = CredentialSelector::new(store, cooldowns, quota, usage, 1_000, false, "http://x".into());

        let mut counts = std::collections::HashMap::new();
        for _ in 0..20 {
            let cred = selector.select(Some("gemini-2.5-pro")).await.unwrap();
            *counts.entry(cred.project_id.unwrap()).or_insert(0) += 1;
        }
        let values: Vec<i32> = counts.values().copied().collect();
        assert!((values[0] - values[1]).abs() <= 1);
    }
}
