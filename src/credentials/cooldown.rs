use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::model_group_of;
use crate::error::GatewayError;
use crate::utils::atomic_write_json;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CooldownReason {
    ResourceExhausted,
    Other,
}

/// A forbidden `(project_id, model)` pair, live until `reset_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CooldownRecord {
    #[serde(rename = "projectId")]
    pub project_id: String,
    pub model: String,
    #[serde(rename = "resetTimestamp")]
    pub reset_at: DateTime<Utc>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    pub reason: CooldownReason,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CooldownDocument {
    cooldowns: Vec<CooldownRecord>,
}

fn key(project_id: &str, model: &str) -> String {
    format!("{project_id}:{model}")
}

/// The set of credential/model pairs temporarily removed from
/// selection. Each live record also owns a background timer that fires at
/// `reset_at` to evict it proactively and log the re-enablement; timers are
/// aborted on `Drop` so they never keep the process alive past shutdown.
pub struct CooldownRegistry {
    path: PathBuf,
    records: RwLock<HashMap<String, CooldownRecord>>,
    timers: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl CooldownRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Arc<Self> {
        Arc::new(Self {
            path: path.into(),
            records: RwLock::new(HashMap::new()),
            timers: Mutex::new(HashMap::new()),
        })
    }

    /// Reads `{cooldowns: [...]}` from disk, discards already-expired
    /// records, schedules a timer for each survivor, and performs a single
    /// compacting rewrite.
    pub async fn load(self: &Arc<Self>) -> Result<(), GatewayError> {
        let doc = read_document(&self.path).await?;
        let now = Utc::now();
        let mut live = HashMap::new();
        for record in doc.cooldowns {
            if record.reset_at > now {
                live.insert(key(&record.project_id, &record.model), record);
            }
        }
        info!(count = live.len(), "cooldown registry loaded");
        *self.records.write().await = live;

        let entries: Vec<CooldownRecord> = self.records.read().await.values().cloned().collect();
        for record in &entries {
            self.schedule_eviction(record.clone()).await;
        }
        self.persist().await
    }

    /// Installs a cooldown on `(project_id, model)`. When the model belongs
    /// to a quota-sharing group, the whole group is put on cooldown together
    /// unless the group's average remaining quota is above 1% (a transient
    /// per-model rate limit, not true exhaustion).
    pub async fn put(
        self: &Arc<Self>,
        project_id: &str,
        model: &str,
        reset_at: DateTime<Utc>,
        reason: CooldownReason,
        group_average_remaining: Option<f64>,
    ) -> Result<(), GatewayError> {
        let group = model_group_of(model);
        let targets: Vec<String> = if group.len() > 1 && group_average_remaining.unwrap_or(0.0) <= 0.01
        {
            group.iter().map(|s| s.to_string()).collect()
        } else {
            vec![model.to_string()]
        };

        let now = Utc::now();
        for target in &targets {
            let record = CooldownRecord {
                project_id: project_id.to_string(),
                model: target.clone(),
                reset_at,
                created_at: now,
                reason,
            };
            self.records
                .write()
                .await
                .insert(key(project_id, target), record.clone());
            self.schedule_eviction(record).await;
        }
        self.persist().await
    }

    /// True iff a live (unexpired) record exists for this pair. Expired
    /// records are evicted lazily here even if the timer hasn't fired yet.
    pub async fn is_on(&self, project_id: &str, model: &str) -> bool {
        let k = key(project_id, model);
        let expired = {
            let guard = self.records.read().await;
            match guard.get(&k) {
                Some(record) => record.reset_at <= Utc::now(),
                None => return false,
            }
        };
        if expired {
            self.records.write().await.remove(&k);
            false
        } else {
            true
        }
    }

    pub async fn list(&self) -> Vec<CooldownRecord> {
        self.records.read().await.values().cloned().collect()
    }

    pub async fn list_for_project(&self, project_id: &str) -> Vec<CooldownRecord> {
        self.records
            .read()
            .await
            .values()
            .filter(|r| r.project_id == project_id)
            .cloned()
            .collect()
    }

    pub async fn remove(self: &Arc<Self>, project_id: &str, model: &str) -> Result<(), GatewayError> {
        let k = key(project_id, model);
        self.records.write().await.remove(&k);
        if let Some(handle) = self.timers.lock().await.remove(&k) {
            handle.abort();
        }
        self.persist().await
    }

    pub async fn clear_all(self: &Arc<Self>) -> Result<(), GatewayError> {
        self.records.write().await.clear();
        let mut timers = self.timers.lock().await;
        for (_, handle) in timers.drain() {
            handle.abort();
        }
        drop(timers);
        self.persist().await
    }

    async fn schedule_eviction(self: &Arc<Self>, record: CooldownRecord) {
        let k = key(&record.project_id, &record.model);
        let this = Arc::clone(self);
        let reset_at = record.reset_at;
        let handle = tokio::spawn(async move {
            let now = Utc::now();
            if reset_at > now {
                let wait = (reset_at - now)
                    .to_std()
                    .unwrap_or(std::time::Duration::from_secs(0));
                tokio::time::sleep(wait).await;
            }
            let removed = this.records.write().await.remove(&k).is_some();
            if removed {
                info!(key = %k, "cooldown expired, credential re-enabled");
                if let Err(e) = this.persist().await {
                    warn!(error = %e, "failed to persist cooldown registry after eviction");
                }
            }
        });

        let mut timers = self.timers.lock().await;
        if let Some(old) = timers.insert(k, handle) {
            old.abort();
        }
    }

    async fn persist(&self) -> Result<(), GatewayError> {
        let cooldowns: Vec<CooldownRecord> = self.records.read().await.values().cloned().collect();
        atomic_write_json(&self.path, &CooldownDocument { cooldowns }).await
    }
}

async fn read_document(path: &std::path::Path) -> Result<CooldownDocument, GatewayError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(CooldownDocument::default()),
        Err(e) => Err(e.into()),
    }
}
