use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{Duration, Utc};
use oauth2::basic::{
    BasicClient, BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
    BasicTokenResponse,
};
use oauth2::{
    ClientId, ClientSecret, EndpointNotSet, EndpointSet, RefreshToken, RequestTokenError,
    StandardRevocableToken, TokenResponse, TokenUrl,
};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::{GCLI_CLIENT_ID, GCLI_CLIENT_SECRET, GOOGLE_TOKEN_URL};
use crate::error::GatewayError;
use crate::utils::atomic_write_json;

use super::types::{Credential, PersistedCredential};

/// A [`BasicClient`] with only the token endpoint fixed; this gateway never
/// drives the authorize-url/PKCE leg, only `refresh_token` exchanges.
type RefreshOnlyClient = oauth2::Client<
    BasicErrorResponse,
    BasicTokenResponse,
    BasicTokenIntrospectionResponse,
    StandardRevocableToken,
    BasicRevocationErrorResponse,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointSet,
>;

/// Builds a fresh oauth2 client per refresh call from the fixed upstream
/// installed-app client id/secret.
fn build_oauth2_client() -> Result<RefreshOnlyClient, GatewayError> {
    let token_uri = TokenUrl::new(GOOGLE_TOKEN_URL.as_str().to_string())
        .map_err(|e| GatewayError::Unexpected(format!("invalid oauth token url: {e}")))?;
    Ok(BasicClient::new(ClientId::new(GCLI_CLIENT_ID.to_string()))
        .set_client_secret(ClientSecret::new(GCLI_CLIENT_SECRET.to_string()))
        .set_token_uri(token_uri))
}

/// Google's token endpoint reports a dead refresh token as `invalid_grant`
/// (or a revoked client as `invalid_client`); every other failure — network
/// errors, 5xx, rate limiting — is treated as transient and retried on the
/// next selection attempt.
fn classify_token_error<RE, T>(err: RequestTokenError<RE, T>) -> GatewayError
where
    RE: std::error::Error + 'static,
    T: oauth2::ErrorResponse + 'static,
{
    let message = err.to_string();
    if message.contains("invalid_grant") || message.contains("invalid_client") {
        GatewayError::AuthDead(format!("oauth refresh rejected: {message}"))
    } else {
        GatewayError::Transient(format!("oauth refresh failed: {message}"))
    }
}

#[derive(Debug, Deserialize)]
struct LoadCodeAssistResponse {
    #[serde(rename = "cloudaicompanionProject")]
    cloudaicompanion_project: Option<String>,
}

/// Owns the credential pool's canonical copy and its persisted form.
///
/// Persistence is merge-style: the on-disk array is re-read immediately
/// before every write so admin-side additions made while the process is
/// running are not clobbered.
pub struct CredentialStore {
    path: PathBuf,
    http: reqwest::Client,
    credentials: RwLock<Vec<Credential>>,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>, http: reqwest::Client) -> Self {
        Self {
            path: path.into(),
            http,
            credentials: RwLock::new(Vec::new()),
        }
    }

    /// Reads the array from disk, keeps only `enable != false`, assigns each
    /// a fresh session id, and primes an empty `disabled_models` when
    /// missing. A missing file is treated as an empty pool.
    pub async fn load(&self) -> Result<(), GatewayError> {
        let persisted = read_persisted(&self.path).await?;
        let loaded: Vec<Credential> = persisted
            .into_iter()
            .filter(|p| p.enable)
            .map(Credential::from)
            .collect();
        info!(count = loaded.len(), "credential store loaded");
        *self.credentials.write().await = loaded;
        Ok(())
    }

    pub async fn snapshot(&self) -> Vec<Credential> {
        self.credentials.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.credentials.read().await.len()
    }

    pub async fn get(&self, refresh_token: &str) -> Option<Credential> {
        self.credentials
            .read()
            .await
            .iter()
            .find(|c| c.refresh_token == refresh_token)
            .cloned()
    }

    /// Refreshes the access token for the credential identified by
    /// `refresh_token`, mutating the in-memory copy and persisting on
    /// success. HTTP 400/403 from the token endpoint is unrecoverable
    /// (`AuthDead`); anything else is `Transient`.
    pub async fn refresh(&self, refresh_token: &str) -> Result<(), GatewayError> {
        let client = build_oauth2_client()?;
        let token = client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(&self.http)
            .await
            .map_err(classify_token_error)?;

        let expires_in = token
            .expires_in()
            .map(|d| d.as_secs() as i64)
            .unwrap_or(3600);

        let mut guard = self.credentials.write().await;
        let cred = guard
            .iter_mut()
            .find(|c| c.refresh_token == refresh_token)
            .ok_or_else(|| GatewayError::Unexpected("credential vanished during refresh".into()))?;
        cred.access_token = Some(token.access_token().secret().clone());
        cred.expires_at = Some(Utc::now() + Duration::seconds(expires_in));
        drop(guard);

        self.persist().await
    }

    /// Discovers `project_id` for the credential, via the upstream
    /// project-discovery endpoint. A response without a project field makes
    /// the credential ineligible (`AuthDead`).
    pub async fn fetch_project_id(&self, refresh_token: &str, api_url: &str) -> Result<(), GatewayError> {
        let access_token = {
            let guard = self.credentials.read().await;
            guard
                .iter()
                .find(|c| c.refresh_token == refresh_token)
                .and_then(|c| c.access_token.clone())
                .ok_or_else(|| GatewayError::Unexpected("missing access token for project discovery".into()))?
        };

        let url = format!("{}/v1internal:loadCodeAssist", api_url.trim_end_matches('/'));
        let resp = self
            .http
            .post(url)
            .bearer_auth(&access_token)
            .json(&json!({ "metadata": { "ideType": "ANTIGRAVITY" } }))
            .send()
            .await
            .map_err(|e| GatewayError::Transient(e.to_string()))?;

        let status = resp.status();
        if status == StatusCode::BAD_REQUEST || status == StatusCode::FORBIDDEN {
            return Err(GatewayError::AuthDead(format!(
                "project discovery rejected with {status}"
            )));
        }
        if !status.is_success() {
            return Err(GatewayError::Transient(format!(
                "project discovery returned {status}"
            )));
        }

        let body: LoadCodeAssistResponse = resp
            .json()
            .await
            .map_err(|e| GatewayError::Transient(e.to_string()))?;
        let project_id = body
            .cloudaicompanion_project
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| GatewayError::AuthDead("no project returned by upstream".into()))?;

        let mut guard = self.credentials.write().await;
        if let Some(cred) = guard.iter_mut().find(|c| c.refresh_token == refresh_token) {
            cred.project_id = Some(project_id);
        }
        drop(guard);

        self.persist().await
    }

    /// Administratively kills a credential: marks it disabled, persists (the
    /// disabled record stays on disk), and removes it from the in-memory
    /// working set.
    pub async fn disable(&self, refresh_token: &str) -> Result<(), GatewayError> {
        {
            let mut guard = self.credentials.write().await;
            if let Some(pos) = guard.iter().position(|c| c.refresh_token == refresh_token) {
                guard[pos].enabled = false;
            }
        }
        self.persist_including_disabled(refresh_token).await?;

        let mut guard = self.credentials.write().await;
        guard.retain(|c| c.refresh_token != refresh_token);
        Ok(())
    }

    /// Substitutes a synthesized placeholder project id when the policy
    /// flag disables real project discovery; persisted like any other
    /// project-id fill-in.
    pub async fn set_project_id(&self, refresh_token: &str, project_id: &str) {
        {
            let mut guard = self.credentials.write().await;
            if let Some(cred) = guard.iter_mut().find(|c| c.refresh_token == refresh_token) {
                cred.project_id = Some(project_id.to_string());
            }
        }
        if let Err(e) = self.persist().await {
            warn!(error = %e, "failed to persist synthesized project id");
        }
    }

    pub async fn set_disabled_models(&self, refresh_token: &str, model: &str, disabled: bool) {
        let mut guard = self.credentials.write().await;
        if let Some(cred) = guard.iter_mut().find(|c| c.refresh_token == refresh_token) {
            if disabled {
                cred.disabled_models.insert(model.to_string());
            } else {
                cred.disabled_models.remove(model);
            }
        }
    }

    /// Writes the full array back to disk, merged with whatever is
    /// currently there so concurrent admin edits aren't lost, and strips
    /// ephemeral fields (`session_id`).
    pub async fn persist(&self) -> Result<(), GatewayError> {
        let in_memory = self.credentials.read().await.clone();
        self.merge_and_write(in_memory).await
    }

    /// Same as `persist`, but also writes back a credential that was just
    /// disabled and already evicted from the in-memory set.
    async fn persist_including_disabled(&self, refresh_token: &str) -> Result<(), GatewayError> {
        let mut in_memory = self.credentials.read().await.clone();
        if let Some(cred) = in_memory.iter_mut().find(|c| c.refresh_token == refresh_token) {
            cred.enabled = false;
        }
        self.merge_and_write(in_memory).await
    }

    async fn merge_and_write(&self, ours: Vec<Credential>) -> Result<(), GatewayError> {
        let on_disk = read_persisted(&self.path).await.unwrap_or_default();
        let mut by_token: HashMap<String, PersistedCredential> = on_disk
            .into_iter()
            .map(|p| (p.refresh_token.clone(), p))
            .collect();

        for cred in &ours {
            by_token.insert(cred.refresh_token.clone(), PersistedCredential::from(cred));
        }

        let merged: Vec<PersistedCredential> = by_token.into_values().collect();
        atomic_write_json(&self.path, &merged).await?;
        debug!(count = merged.len(), "credential store persisted");
        Ok(())
    }
}

async fn read_persisted(path: &Path) -> Result<Vec<PersistedCredential>, GatewayError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "credentials file not found, starting with empty pool");
            Ok(Vec::new())
        }
        Err(e) => Err(e.into()),
    }
}
