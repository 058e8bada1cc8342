use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::net::{IpAddr, Ipv4Addr};
use url::Url;

/// Flat configuration table. Field names map to the UPPER_SNAKE_CASE env
/// vars and `config.toml` keys operators are documented to set.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BasicConfig {
    /// TOML/env: `PORT`. Default: `8188`.
    #[serde(default = "default_port")]
    pub port: u16,

    /// TOML/env: `HOST`. Default: `0.0.0.0`.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Base URL for the streaming generate endpoint.
    /// TOML/env: `API_URL`.
    #[serde(default = "default_api_url")]
    pub api_url: Url,

    /// Base URL for the model/quota listing endpoint.
    /// TOML/env: `API_MODELS_URL`.
    #[serde(default = "default_api_models_url")]
    pub api_models_url: Url,

    /// Base URL for the non-streaming generate endpoint.
    /// TOML/env: `API_NO_STREAM_URL`.
    #[serde(default = "default_api_no_stream_url")]
    pub api_no_stream_url: Url,

    /// `Host` header value sent on upstream calls.
    /// TOML/env: `API_HOST`.
    #[serde(default = "default_api_host")]
    pub api_host: String,

    /// `User-Agent` header value sent on upstream calls.
    /// TOML/env: `API_USER_AGENT`.
    #[serde(default = "default_user_agent")]
    pub api_user_agent: String,

    /// TOML/env: `DEFAULT_TEMPERATURE`.
    #[serde(default = "default_temperature")]
    pub default_temperature: f64,

    /// TOML/env: `DEFAULT_TOP_P`.
    #[serde(default = "default_top_p")]
    pub default_top_p: f64,

    /// TOML/env: `DEFAULT_TOP_K`.
    #[serde(default = "default_top_k")]
    pub default_top_k: f64,

    /// TOML/env: `DEFAULT_MAX_TOKENS`.
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Maximum accepted request body size, in bytes.
    /// TOML/env: `MAX_REQUEST_SIZE`.
    #[serde(default = "default_max_request_size")]
    pub max_request_size: usize,

    /// Upstream call timeout, in seconds.
    /// TOML/env: `TIMEOUT`.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum inline images accepted per request.
    /// TOML/env: `MAX_IMAGES`.
    #[serde(default = "default_max_images")]
    pub max_images: usize,

    /// Base URL prepended to `image` source references that aren't already
    /// absolute. TOML/env: `IMAGE_BASE_URL`.
    #[serde(default)]
    pub image_base_url: Option<Url>,

    /// Successful selections a single credential may receive within any
    /// rolling 60-minute window. TOML/env: `CREDENTIAL_MAX_USAGE_PER_HOUR`.
    #[serde(default = "default_credential_max_usage_per_hour")]
    pub credential_max_usage_per_hour: u32,

    /// HTTP status codes from the upstream that are retried against the
    /// next credential rather than surfaced immediately.
    /// TOML/env: `RETRY_STATUS_CODES`.
    #[serde(default = "default_retry_status_codes")]
    pub retry_status_codes: Vec<u16>,

    /// Maximum credentials tried per request before surfacing `PoolExhausted`.
    /// TOML/env: `RETRY_MAX_ATTEMPTS`.
    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: usize,

    /// System instruction text injected ahead of the client-supplied system
    /// prompt, used to satisfy upstream strict-match validation.
    /// TOML/env: `SYSTEM_INSTRUCTION`.
    #[serde(default)]
    pub system_instruction: String,

    /// Optional upstream HTTP proxy. TOML/env: `PROXY`.
    #[serde(default)]
    pub proxy: Option<Url>,

    /// Basic-auth username for the admin panel (secret; env only).
    /// Env: `PANEL_USER`.
    #[serde(default)]
    pub panel_user: String,

    /// Basic-auth password for the admin panel (secret; env only).
    /// Env: `PANEL_PASSWORD`.
    #[serde(default)]
    pub panel_password: String,

    /// Bearer key inbound requests must present (secret; env only, required).
    /// Env: `API_KEY`.
    #[serde(default)]
    #[serde(deserialize_with = "deserialize_string_lax")]
    pub api_key: String,
}

impl Default for BasicConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            api_url: default_api_url(),
            api_models_url: default_api_models_url(),
            api_no_stream_url: default_api_no_stream_url(),
            api_host: default_api_host(),
            api_user_agent: default_user_agent(),
            default_temperature: default_temperature(),
            default_top_p: default_top_p(),
            default_top_k: default_top_k(),
            default_max_tokens: default_max_tokens(),
            max_request_size: default_max_request_size(),
            timeout_secs: default_timeout_secs(),
            max_images: default_max_images(),
            image_base_url: None,
            credential_max_usage_per_hour: default_credential_max_usage_per_hour(),
            retry_status_codes: default_retry_status_codes(),
            retry_max_attempts: default_retry_max_attempts(),
            system_instruction: String::new(),
            proxy: None,
            panel_user: String::new(),
            panel_password: String::new(),
            // No insecure default; `Config::load()` enforces non-empty.
            api_key: String::new(),
        }
    }
}

fn deserialize_string_lax<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(deserializer)?;
    match v {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(serde::de::Error::custom(
            "expected a string or a number for API_KEY",
        )),
    }
}

fn default_port() -> u16 {
    8188
}

fn default_host() -> IpAddr {
    Ipv4Addr::new(0, 0, 0, 0).into()
}

fn default_api_url() -> Url {
    Url::parse("https://daily-cloudcode-pa.googleapis.com/v1internal:streamGenerateContent")
        .expect("valid default API_URL")
}

fn default_api_models_url() -> Url {
    Url::parse("https://daily-cloudcode-pa.googleapis.com/v1internal:fetchAvailableModels")
        .expect("valid default API_MODELS_URL")
}

fn default_api_no_stream_url() -> Url {
    Url::parse("https://daily-cloudcode-pa.googleapis.com/v1internal:generateContent")
        .expect("valid default API_NO_STREAM_URL")
}

fn default_api_host() -> String {
    "daily-cloudcode-pa.googleapis.com".to_string()
}

fn default_user_agent() -> String {
    "antigravity/0.16.0 (Linux; x64)".to_string()
}

fn default_temperature() -> f64 {
    1.0
}

fn default_top_p() -> f64 {
    0.95
}

fn default_top_k() -> f64 {
    64.0
}

fn default_max_tokens() -> u32 {
    64000
}

fn default_max_request_size() -> usize {
    20 * 1024 * 1024
}

fn default_timeout_secs() -> u64 {
    180
}

fn default_max_images() -> usize {
    16
}

fn default_credential_max_usage_per_hour() -> u32 {
    20
}

fn default_retry_status_codes() -> Vec<u16> {
    vec![408, 429, 500, 502, 503, 504]
}

fn default_retry_max_attempts() -> usize {
    5
}
