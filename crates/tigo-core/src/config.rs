use crate::error::{Result, TigoError};
use reqwest::Url;
use serde::Deserialize;
use std::fmt;
use std::path::Path;

/// Production endpoint of the Tigo Energy v3 API.
pub const DEFAULT_BASE_URL: &str = "https://api2.tigoenergy.com/api/v3";

pub const ENV_USERNAME: &str = "TIGO_USERNAME";
pub const ENV_PASSWORD: &str = "TIGO_PASSWORD";
pub const ENV_API_URL: &str = "TIGO_API_URL";
pub const ENV_TIMEOUT_SECS: &str = "TIGO_TIMEOUT_SECS";
pub const ENV_MAX_RETRIES: &str = "TIGO_MAX_RETRIES";

/// Root configuration for a Tigo API client.
///
/// Every field has a default, so an empty JSON object is a valid
/// configuration.
///
/// # Examples
///
/// ```
/// use tigo_core::config::TigoConfig;
///
/// let json = r#"{
///     "timeout_secs": 60,
///     "cache": { "ttl_secs": 120 }
/// }"#;
///
/// let config = TigoConfig::from_json_str(json).unwrap();
/// assert_eq!(config.timeout_secs, 60);
/// assert_eq!(config.cache.ttl_secs, 120);
/// assert!(config.cache.enabled);
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct TigoConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Extra attempts after the first one for retryable failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base delay for exponential backoff between retries
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    /// Number of chunked data requests kept in flight at once
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub limits: RangeLimits,
}

impl Default for TigoConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            fetch_concurrency: default_fetch_concurrency(),
            cache: CacheConfig::default(),
            limits: RangeLimits::default(),
        }
    }
}

/// Response cache settings.
///
/// # Defaults
///
/// - `enabled`: `true`
/// - `ttl_secs`: `60`
/// - `max_entries`: `512`
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// How long a response is served without asking the API again
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_cache_max_entries")]
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: default_cache_ttl_secs(),
            max_entries: default_cache_max_entries(),
        }
    }
}

/// Longest time span, in days, a single data request may cover per resolution.
///
/// Longer ranges are split into consecutive chunks by the client.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct RangeLimits {
    #[serde(default = "default_minute_days")]
    pub minute_days: u32,
    #[serde(default = "default_hour_days")]
    pub hour_days: u32,
    #[serde(default = "default_day_days")]
    pub day_days: u32,
}

impl Default for RangeLimits {
    fn default() -> Self {
        Self {
            minute_days: default_minute_days(),
            hour_days: default_hour_days(),
            day_days: default_day_days(),
        }
    }
}

impl TigoConfig {
    /// Builds a configuration from defaults and `TIGO_*` environment variables.
    ///
    /// Recognized variables: `TIGO_API_URL`, `TIGO_TIMEOUT_SECS`,
    /// `TIGO_MAX_RETRIES`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`TigoConfig::from_env`] with an injectable variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        config.apply_overrides(lookup)?;
        Ok(config)
    }

    /// Applies `TIGO_*` overrides on top of an existing configuration.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = non_empty(lookup(ENV_API_URL)) {
            self.base_url = url;
        }
        if let Some(raw) = non_empty(lookup(ENV_TIMEOUT_SECS)) {
            self.timeout_secs = parse_number(ENV_TIMEOUT_SECS, &raw)?;
        }
        if let Some(raw) = non_empty(lookup(ENV_MAX_RETRIES)) {
            self.max_retries = parse_number(ENV_MAX_RETRIES, &raw)?;
        }
        self.validate()
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| TigoError::InvalidConfig(format!("config JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    /// Checks invariants that serde cannot express.
    ///
    /// The base URL must use HTTPS unless it points at a loopback host,
    /// which keeps local mock servers usable.
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.base_url).map_err(|e| {
            TigoError::InvalidConfig(format!("base_url '{}': {}", self.base_url, e))
        })?;

        let loopback = matches!(
            url.host_str(),
            Some("localhost" | "127.0.0.1" | "[::1]" | "::1")
        );
        if url.scheme() != "https" && !(url.scheme() == "http" && loopback) {
            return Err(TigoError::InvalidConfig(format!(
                "base_url must use HTTPS: {}",
                self.base_url
            )));
        }

        if self.timeout_secs == 0 || self.connect_timeout_secs == 0 {
            return Err(TigoError::InvalidConfig(
                "timeouts must be greater than zero".into(),
            ));
        }
        if self.fetch_concurrency == 0 {
            return Err(TigoError::InvalidConfig(
                "fetch_concurrency must be at least 1".into(),
            ));
        }
        if self.limits.minute_days == 0 || self.limits.hour_days == 0 || self.limits.day_days == 0
        {
            return Err(TigoError::InvalidConfig(
                "range limits must be at least one day".into(),
            ));
        }
        Ok(())
    }

    /// Base URL without a trailing slash.
    pub fn api_root(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Returns a copy pointing at another API root (used for mock servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Account credentials for `/users/login`.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Reads `TIGO_USERNAME` and `TIGO_PASSWORD`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        // Passwords are sent byte for byte; only the username is trimmed.
        let password = lookup(ENV_PASSWORD).filter(|v| !v.trim().is_empty());
        match (non_empty(lookup(ENV_USERNAME)), password) {
            (Some(username), Some(password)) => Ok(Self { username, password }),
            _ => Err(TigoError::MissingCredentials),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.parse()
        .map_err(|_| TigoError::InvalidConfig(format!("{} is not a valid number: '{}'", key, raw)))
}

fn default_true() -> bool {
    true
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_user_agent() -> String {
    format!("tigo-rs/{}", env!("CARGO_PKG_VERSION"))
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_fetch_concurrency() -> usize {
    2
}

fn default_cache_ttl_secs() -> u64 {
    60
}

fn default_cache_max_entries() -> usize {
    512
}

fn default_minute_days() -> u32 {
    1
}

fn default_hour_days() -> u32 {
    31
}

fn default_day_days() -> u32 {
    366
}
