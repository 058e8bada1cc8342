use url::Url;

/// OAuth endpoints and client credentials are fixed to the upstream's
/// published installed-app client; these are not configurable via
/// `config.toml`.
pub static GOOGLE_TOKEN_URL: std::sync::LazyLock<Url> = std::sync::LazyLock::new(|| {
    Url::parse("https://oauth2.googleapis.com/token").expect("valid Google OAuth token URL")
});

pub const GCLI_CLIENT_ID: &str =
    "1071006060591-tmhssin2h21lcre235vtolojh4g403ep.apps.googleusercontent.com";
pub const GCLI_CLIENT_SECRET: &str = "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";
