//! Application configuration. Paths, timeouts, identity service credentials.

use serde::Deserialize;

/// Pending requests expire after a week unless configured otherwise.
pub const DEFAULT_REQUEST_TTL_HOURS: u64 = 24 * 7;

/// Upper bound on a single store or identity call.
pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 5_000;

/// How many notifications a user's feed returns.
pub const DEFAULT_NOTIFICATION_LIMIT: u32 = 10;

#[derive(Debug, Deserialize, Default, Clone)]
pub struct AppConfig {
    /// Directory holding tutoring.db. Read from TUTORING_DATA_DIR.
    #[serde(default)]
    pub data_dir: Option<String>,

    /// Hours until a pending request expires. Read from TUTORING_REQUEST_TTL_HOURS.
    #[serde(default)]
    pub request_ttl_hours: Option<u64>,

    /// Per-call timeout for store and identity calls. Read from TUTORING_STORE_TIMEOUT_MS.
    #[serde(default)]
    pub store_timeout_ms: Option<u64>,

    /// Listen address for `serve`. Read from TUTORING_HTTP_BIND.
    #[serde(default)]
    pub http_bind: Option<String>,

    /// Max notifications per feed. Read from TUTORING_NOTIFICATION_LIMIT.
    #[serde(default)]
    pub notification_limit: Option<u32>,

    // ─────────────────────────────────────────────────────────────────────────
    // Identity service
    // ─────────────────────────────────────────────────────────────────────────
    /// Base URL of the hosted auth API (e.g. https://xyz.supabase.co). Read from TUTORING_IDENTITY_URL.
    #[serde(default)]
    pub identity_url: Option<String>,

    /// Public API key sent as `apikey`. Read from TUTORING_IDENTITY_API_KEY.
    #[serde(default)]
    pub identity_api_key: Option<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenv::dotenv().ok();
        let mut c = config::Config::builder();
        c = c.add_source(config::Environment::with_prefix("TUTORING"));
        if let Ok(path) = std::env::var("TUTORING_CONFIG") {
            c = c.add_source(config::File::with_name(&path));
        }
        c.build()?.try_deserialize()
    }

    pub fn data_dir_or_default(&self) -> String {
        self.data_dir.clone().unwrap_or_else(|| "./data".to_string())
    }

    pub fn request_ttl_hours_or_default(&self) -> u64 {
        self.request_ttl_hours.unwrap_or(DEFAULT_REQUEST_TTL_HOURS)
    }

    pub fn store_timeout_ms_or_default(&self) -> u64 {
        self.store_timeout_ms.unwrap_or(DEFAULT_STORE_TIMEOUT_MS)
    }

    pub fn http_bind_or_default(&self) -> String {
        self.http_bind
            .clone()
            .unwrap_or_else(|| "127.0.0.1:8080".to_string())
    }

    pub fn notification_limit_or_default(&self) -> u32 {
        self.notification_limit.unwrap_or(DEFAULT_NOTIFICATION_LIMIT)
    }

    /// True when a hosted identity service is configured (URL and key present).
    pub fn is_identity_configured(&self) -> bool {
        self.identity_url.as_deref().is_some_and(|u| !u.is_empty())
            && self.identity_api_key.as_deref().is_some_and(|k| !k.is_empty())
    }
}
