// src/config.rs

//! Application configuration structures.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP and rendering transport settings
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Retry policy settings
    #[serde(default)]
    pub retry: RetryConfig,

    /// Circuit breaker settings per transport
    #[serde(default)]
    pub breaker: BreakerConfig,

    /// Persistent store settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Batch upsert settings
    #[serde(default)]
    pub upsert: UpsertConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,

    /// VC sites to scrape
    #[serde(default)]
    pub sites: Vec<SiteConfig>,

    /// Deal news source
    #[serde(default)]
    pub deals: DealSourceConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.fetch.user_agent.trim().is_empty() {
            return Err(AppError::validation("fetch.user_agent is empty"));
        }
        if self.fetch.timeout_secs == 0 {
            return Err(AppError::validation("fetch.timeout_secs must be > 0"));
        }
        if self.fetch.browser_timeout_secs == 0 {
            return Err(AppError::validation(
                "fetch.browser_timeout_secs must be > 0",
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(AppError::validation("retry.max_attempts must be > 0"));
        }
        if self.retry.backoff_factor < 1.0 {
            return Err(AppError::validation("retry.backoff_factor must be >= 1.0"));
        }
        if self.breaker.http_failure_threshold == 0 || self.breaker.browser_failure_threshold == 0
        {
            return Err(AppError::validation("breaker thresholds must be > 0"));
        }
        if self.upsert.batch_size == 0 {
            return Err(AppError::validation("upsert.batch_size must be > 0"));
        }
        if self.upsert.max_concurrent == 0 {
            return Err(AppError::validation("upsert.max_concurrent must be > 0"));
        }
        if self.sites.is_empty() && self.deals.index_url.is_empty() {
            return Err(AppError::validation(
                "No sites defined and no deal source configured",
            ));
        }
        Ok(())
    }

    /// Sites enabled for scraping.
    pub fn active_sites(&self) -> impl Iterator<Item = &SiteConfig> {
        self.sites.iter().filter(|s| s.active)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fetch: FetchConfig::default(),
            retry: RetryConfig::default(),
            breaker: BreakerConfig::default(),
            store: StoreConfig::default(),
            upsert: UpsertConfig::default(),
            logging: LoggingConfig::default(),
            sites: Vec::new(),
            deals: DealSourceConfig::default(),
        }
    }
}

/// Transport and rate-limiting settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds (lightweight transport)
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Navigation timeout in seconds (rendering transport)
    #[serde(default = "defaults::browser_timeout")]
    pub browser_timeout_secs: u64,

    /// Best-effort readiness wait for a selector, in seconds
    #[serde(default = "defaults::selector_wait")]
    pub selector_wait_secs: u64,

    /// Base delay between requests in milliseconds (jittered ±50%)
    #[serde(default = "defaults::request_delay")]
    pub request_delay_ms: u64,

    /// Request rate above which the adaptive penalty kicks in
    #[serde(default = "defaults::max_rate_per_sec")]
    pub max_rate_per_sec: f64,

    /// Penalty sleep in milliseconds while the rate is above the threshold
    #[serde(default = "defaults::penalty")]
    pub penalty_ms: u64,

    /// Hosts that need JavaScript rendering (substring match on the host)
    #[serde(default = "defaults::rendered_hosts")]
    pub rendered_hosts: Vec<String>,

    /// Explicit browser binary path; autodetected when absent
    #[serde(default)]
    pub browser_executable: Option<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            browser_timeout_secs: defaults::browser_timeout(),
            selector_wait_secs: defaults::selector_wait(),
            request_delay_ms: defaults::request_delay(),
            max_rate_per_sec: defaults::max_rate_per_sec(),
            penalty_ms: defaults::penalty(),
            rendered_hosts: defaults::rendered_hosts(),
            browser_executable: None,
        }
    }
}

/// Retry policy settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per operation
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,

    /// Initial backoff delay in milliseconds
    #[serde(default = "defaults::initial_delay")]
    pub initial_delay_ms: u64,

    /// Multiplier applied to the delay after each attempt
    #[serde(default = "defaults::backoff_factor")]
    pub backoff_factor: f64,

    /// Upper bound on any single backoff delay, in seconds
    #[serde(default = "defaults::max_delay")]
    pub max_delay_secs: u64,

    /// Randomize delays to avoid synchronized retry storms
    #[serde(default = "defaults::jitter")]
    pub jitter: bool,

    /// Backoff in seconds for HTTP 429 without a Retry-After header
    #[serde(default = "defaults::rate_limit_backoff")]
    pub rate_limit_backoff_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: defaults::max_attempts(),
            initial_delay_ms: defaults::initial_delay(),
            backoff_factor: defaults::backoff_factor(),
            max_delay_secs: defaults::max_delay(),
            jitter: defaults::jitter(),
            rate_limit_backoff_secs: defaults::rate_limit_backoff(),
        }
    }
}

/// Circuit breaker settings, one failure domain per transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerConfig {
    /// Consecutive failures before the lightweight transport opens
    #[serde(default = "defaults::http_failure_threshold")]
    pub http_failure_threshold: u32,

    /// Cooldown in seconds before the lightweight transport is probed
    #[serde(default = "defaults::http_cooldown")]
    pub http_cooldown_secs: u64,

    /// Consecutive failures before the rendering transport opens
    #[serde(default = "defaults::browser_failure_threshold")]
    pub browser_failure_threshold: u32,

    /// Cooldown in seconds before the rendering transport is probed
    #[serde(default = "defaults::browser_cooldown")]
    pub browser_cooldown_secs: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            http_failure_threshold: defaults::http_failure_threshold(),
            http_cooldown_secs: defaults::http_cooldown(),
            browser_failure_threshold: defaults::browser_failure_threshold(),
            browser_cooldown_secs: defaults::browser_cooldown(),
        }
    }
}

/// Persistent store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite database file path
    #[serde(default = "defaults::database_path")]
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: defaults::database_path(),
        }
    }
}

/// Batch upsert settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertConfig {
    /// Records per batch
    #[serde(default = "defaults::batch_size")]
    pub batch_size: usize,

    /// Concurrent upserts within a batch
    #[serde(default = "defaults::upsert_concurrent")]
    pub max_concurrent: usize,
}

impl Default for UpsertConfig {
    fn default() -> Self {
        Self {
            batch_size: defaults::batch_size(),
            max_concurrent: defaults::upsert_concurrent(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: debug, info, warn, error
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

/// A VC site to scrape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Display name, also the site's natural key in the store
    pub name: String,

    /// Site root URL
    pub url: String,

    /// Portfolio listing page
    pub portfolio_url: String,

    /// Team listing page, when the site has one
    #[serde(default)]
    pub team_url: Option<String>,

    /// Whether the site participates in scrape runs
    #[serde(default = "defaults::active")]
    pub active: bool,
}

/// Deal news source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DealSourceConfig {
    /// Article index page listing recent deal roundups
    #[serde(default)]
    pub index_url: String,

    /// Maximum articles fetched per run
    #[serde(default = "defaults::max_articles")]
    pub max_articles: usize,
}

impl Default for DealSourceConfig {
    fn default() -> Self {
        Self {
            index_url: String::new(),
            max_articles: defaults::max_articles(),
        }
    }
}

mod defaults {
    // Fetch defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; vcwatch/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn browser_timeout() -> u64 {
        60
    }
    pub fn selector_wait() -> u64 {
        10
    }
    pub fn request_delay() -> u64 {
        1000
    }
    pub fn max_rate_per_sec() -> f64 {
        10.0
    }
    pub fn penalty() -> u64 {
        500
    }
    pub fn rendered_hosts() -> Vec<String> {
        vec![
            "google.".into(),
            "facebook.".into(),
            "linkedin.".into(),
            "github.".into(),
        ]
    }

    // Retry defaults
    pub fn max_attempts() -> u32 {
        3
    }
    pub fn initial_delay() -> u64 {
        1000
    }
    pub fn backoff_factor() -> f64 {
        2.0
    }
    pub fn max_delay() -> u64 {
        60
    }
    pub fn jitter() -> bool {
        true
    }
    pub fn rate_limit_backoff() -> u64 {
        60
    }

    // Breaker defaults
    pub fn http_failure_threshold() -> u32 {
        5
    }
    pub fn http_cooldown() -> u64 {
        300
    }
    pub fn browser_failure_threshold() -> u32 {
        3
    }
    pub fn browser_cooldown() -> u64 {
        600
    }

    // Store defaults
    pub fn database_path() -> String {
        "data/vcwatch.db".into()
    }

    // Upsert defaults
    pub fn batch_size() -> usize {
        50
    }
    pub fn upsert_concurrent() -> usize {
        5
    }

    // Logging defaults
    pub fn log_level() -> String {
        "info".into()
    }

    // Site defaults
    pub fn active() -> bool {
        true
    }

    // Deal defaults
    pub fn max_articles() -> usize {
        5
    }
}
