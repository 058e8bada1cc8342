use std::sync::Arc;
use std::time::Duration;

use protogate_thoughtsig::ThoughtSignatureCache;
use reqwest::header::{HeaderMap, HeaderValue, CONNECTION};

use crate::config::Config;
use crate::credentials::{CooldownRegistry, CredentialSelector, CredentialStore, QuotaMonitor};
use crate::tokens::UsageLedger;

/// Everything a request handler needs, shared across the process: one
/// `reqwest::Client` reused for every upstream call, plus the services that
/// make up the credential pool and the inbound bearer key.
#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<Config>,
    pub http: reqwest::Client,
    pub store: Arc<CredentialStore>,
    pub cooldowns: Arc<CooldownRegistry>,
    pub quota: Arc<QuotaMonitor>,
    pub selector: Arc<CredentialSelector>,
    pub thoughtsig: Arc<ThoughtSignatureCache>,
    pub api_key: Arc<str>,
}

impl GatewayState {
    /// Builds the full service graph in dependency order: store, then the
    /// services that read it (cooldowns, quota, usage ledger), then the
    /// selector that ties them together.
    pub async fn build(config: Arc<Config>, credentials_path: impl Into<std::path::PathBuf>) -> Self {
        let http = build_client(
            &config.basic.api_user_agent,
            config.basic.proxy.clone(),
            config.basic.timeout_secs,
        );
        let credentials_path = credentials_path.into();
        let cooldowns_path = credentials_path
            .parent()
            .unwrap_or_else(|| std::path::Path::new("."))
            .join("cooldowns.json");

        let store = Arc::new(CredentialStore::new(credentials_path, http.clone()));
        store.load().await.expect("failed to load credential store");

        let cooldowns = CooldownRegistry::new(cooldowns_path);
        cooldowns.load().await.expect("failed to load cooldown registry");

        let quota = QuotaMonitor::new(
            store.clone(),
            http.clone(),
            config.basic.api_models_url.to_string(),
        );
        quota.spawn();

        let usage = Arc::new(UsageLedger::new());

        let selector = Arc::new(CredentialSelector::new(
            store.clone(),
            cooldowns.clone(),
            quota.clone(),
            usage,
            config.basic.credential_max_usage_per_hour,
            false,
            config.basic.api_url.to_string(),
        ));

        Self {
            config: config.clone(),
            http,
            store,
            cooldowns,
            quota,
            selector,
            thoughtsig: Arc::new(ThoughtSignatureCache::new()),
            api_key: Arc::from(config.basic.api_key.as_str()),
        }
    }
}

/// Every upstream call shares this client, so the configured `TIMEOUT`
/// (default 180s, per-request rather than per-connection) and the `gzip`
/// crate feature's automatic `Accept-Encoding: gzip` apply uniformly. A
/// timed-out request surfaces as a `reqwest::Error::is_timeout()`, which the
/// call sites classify as `GatewayError::Transient`.
fn build_client(user_agent: &str, proxy: Option<url::Url>, timeout_secs: u64) -> reqwest::Client {
    let mut headers = HeaderMap::new();
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));

    let mut builder = reqwest::Client::builder()
        .user_agent(user_agent)
        .redirect(reqwest::redirect::Policy::none())
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(timeout_secs))
        .default_headers(headers);

    if let Some(proxy_url) = proxy {
        let proxy = reqwest::Proxy::all(proxy_url.as_str()).expect("invalid proxy url");
        builder = builder.proxy(proxy);
    }

    builder.build().expect("failed to build reqwest client")
}
