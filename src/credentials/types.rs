use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A long-lived identity usable to call the upstream service.
///
/// `refresh_token` is the primary key; `session_id` is generated fresh each
/// process start and is never part of the persisted form (see
/// `PersistedCredential`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub refresh_token: String,
    pub access_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub project_id: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub disabled_models: HashSet<String>,

    #[serde(skip, default = "Uuid::new_v4")]
    pub session_id: Uuid,
}

fn default_enabled() -> bool {
    true
}

impl Credential {
    pub fn new(refresh_token: impl Into<String>) -> Self {
        Self {
            refresh_token: refresh_token.into(),
            access_token: None,
            expires_at: None,
            project_id: None,
            enabled: true,
            disabled_models: HashSet::new(),
            session_id: Uuid::new_v4(),
        }
    }

    /// True when the access token is missing or within 5 minutes of expiry,
    /// matching the store's early-refresh buffer.
    pub fn needs_refresh(&self) -> bool {
        match (&self.access_token, self.expires_at) {
            (Some(_), Some(expiry)) => Utc::now() + Duration::minutes(5) >= expiry,
            _ => true,
        }
    }

    pub fn is_usable_for(&self, model: &str) -> bool {
        self.enabled && !self.disabled_models.contains(model)
    }
}

/// On-disk representation: the array of these is the full credentials.json
/// payload. `session_id` is deliberately absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedCredential {
    pub refresh_token: String,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, rename = "projectId")]
    pub project_id: Option<String>,
    #[serde(default = "default_enabled")]
    pub enable: bool,
    #[serde(default, rename = "disabledModels")]
    pub disabled_models: HashSet<String>,
}

impl From<&Credential> for PersistedCredential {
    fn from(cred: &Credential) -> Self {
        let (expires_in, timestamp) = match cred.expires_at {
            Some(expiry) => (
                Some((expiry - Utc::now()).num_seconds().max(0)),
                Some(Utc::now()),
            ),
            None => (None, None),
        };
        Self {
            refresh_token: cred.refresh_token.clone(),
            access_token: cred.access_token.clone(),
            expires_in,
            timestamp,
            project_id: cred.project_id.clone(),
            enable: cred.enabled,
            disabled_models: cred.disabled_models.clone(),
        }
    }
}

impl From<PersistedCredential> for Credential {
    fn from(p: PersistedCredential) -> Self {
        let expires_at = match (p.expires_in, p.timestamp) {
            (Some(secs), Some(ts)) => Some(ts + Duration::seconds(secs)),
            _ => None,
        };
        Self {
            refresh_token: p.refresh_token,
            access_token: p.access_token,
            expires_at,
            project_id: p.project_id,
            enabled: p.enable,
            disabled_models: p.disabled_models,
            session_id: Uuid::new_v4(),
        }
    }
}
