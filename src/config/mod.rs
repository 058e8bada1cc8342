mod basic;
mod model_groups;
mod oauth;

pub use basic::BasicConfig;
pub use model_groups::{model_group_of, MODEL_GROUPS};
pub use oauth::{GCLI_CLIENT_ID, GCLI_CLIENT_SECRET, GOOGLE_TOKEN_URL};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Application configuration, layered defaults < `config.toml` < environment,
/// matching the flat key list the gateway's operators are documented to set.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(flatten)]
    pub basic: BasicConfig,
}

impl Config {
    /// Builds a Figment merging defaults, an optional `config.toml`, and
    /// environment variables (which always win, for container deployments
    /// that inject secrets that way).
    pub fn figment() -> Figment {
        let figment = Figment::new().merge(Serialized::defaults(Config::default()));
        let figment = if std::path::Path::new(DEFAULT_CONFIG_FILE).is_file() {
            figment.merge(Toml::file(DEFAULT_CONFIG_FILE))
        } else {
            figment
        };
        figment.merge(Env::raw())
    }

    /// Loads configuration, panicking with a descriptive message if required
    /// secrets (`API_KEY`) are missing. Called once at process start.
    pub fn load() -> Self {
        let cfg: Self = Self::figment()
            .extract()
            .unwrap_or_else(|err| panic!("failed to extract configuration: {err}"));
        if cfg.basic.api_key.trim().is_empty() {
            panic!("API_KEY must be set and non-empty");
        }
        cfg
    }
}
