//! Configuration for comparison data operations

use crate::error::{Result, StockError};
use crate::model::DAILY_INTERVAL;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Environment variable holding the backend base URL
pub const ENV_API_URL: &str = "TRADEMASTER_API_URL";
/// Environment variable holding the backend bearer token
pub const ENV_API_TOKEN: &str = "TRADEMASTER_API_TOKEN";
/// Environment variable selecting the history provider
pub const ENV_HISTORY_PROVIDER: &str = "TRADEMASTER_HISTORY_PROVIDER";

/// Where price history is read from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HistoryProvider {
    /// TradeMaster backend (default)
    #[default]
    Backend,
    /// Yahoo Finance directly, no backend round trip
    Yahoo,
}

impl FromStr for HistoryProvider {
    type Err = StockError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "backend" => Ok(Self::Backend),
            "yahoo" => Ok(Self::Yahoo),
            other => Err(StockError::ConfigError(format!(
                "unknown history provider: {other}"
            ))),
        }
    }
}

/// Configuration for the comparison clients and caches
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockConfig {
    /// Base URL of the TradeMaster REST backend
    pub api_base_url: String,

    /// Bearer token sent to the backend (optional)
    pub api_token: Option<String>,

    /// Provider used for price history
    pub history_provider: HistoryProvider,

    /// Bar interval requested for history
    pub history_interval: String,

    /// Cache TTL for analysis snapshots
    pub cache_ttl_analysis: Duration,

    /// Cache TTL for price history
    pub cache_ttl_history: Duration,

    /// Cache TTL for the instrument universe
    pub cache_ttl_universe: Duration,

    /// Maximum number of attempts for API calls
    pub max_retries: u32,

    /// Initial backoff duration for retries
    pub retry_backoff_base: Duration,

    /// Request timeout duration
    pub request_timeout: Duration,

    /// Client-side request budget per minute
    pub requests_per_minute: u32,
}

impl Default for StockConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000".to_string(),
            api_token: None,
            history_provider: HistoryProvider::Backend,
            history_interval: DAILY_INTERVAL.to_string(),
            cache_ttl_analysis: Duration::from_secs(300),    // 5 minutes
            cache_ttl_history: Duration::from_secs(86_400),  // 1 day
            cache_ttl_universe: Duration::from_secs(3600),   // 1 hour
            max_retries: 3,
            retry_backoff_base: Duration::from_millis(500),
            request_timeout: Duration::from_secs(30),
            requests_per_minute: 120,
        }
    }
}

impl StockConfig {
    /// Create a new configuration builder
    pub fn builder() -> StockConfigBuilder {
        StockConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.api_base_url)?;

        if self.max_retries == 0 {
            return Err(StockError::ConfigError(
                "max_retries must be greater than 0".to_string(),
            ));
        }

        if self.requests_per_minute == 0 {
            return Err(StockError::ConfigError(
                "requests_per_minute must be greater than 0".to_string(),
            ));
        }

        if self.history_interval.trim().is_empty() {
            return Err(StockError::ConfigError(
                "history_interval must not be empty".to_string(),
            ));
        }

        if self.history_provider == HistoryProvider::Yahoo
            && self.history_interval != DAILY_INTERVAL
        {
            return Err(StockError::ConfigError(format!(
                "Yahoo history only supports the {DAILY_INTERVAL} interval"
            )));
        }

        Ok(())
    }
}

/// Builder for StockConfig
#[derive(Debug, Default)]
pub struct StockConfigBuilder {
    api_base_url: Option<String>,
    api_token: Option<String>,
    history_provider: Option<HistoryProvider>,
    history_interval: Option<String>,
    cache_ttl_analysis: Option<Duration>,
    cache_ttl_history: Option<Duration>,
    cache_ttl_universe: Option<Duration>,
    max_retries: Option<u32>,
    retry_backoff_base: Option<Duration>,
    request_timeout: Option<Duration>,
    requests_per_minute: Option<u32>,
}

impl StockConfigBuilder {
    /// Set the backend base URL
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into());
        self
    }

    /// Set the backend bearer token
    pub fn api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    /// Set the history provider
    pub fn history_provider(mut self, provider: HistoryProvider) -> Self {
        self.history_provider = Some(provider);
        self
    }

    /// Set the history bar interval
    pub fn history_interval(mut self, interval: impl Into<String>) -> Self {
        self.history_interval = Some(interval.into());
        self
    }

    /// Set cache TTL for analysis snapshots
    pub fn cache_ttl_analysis(mut self, duration: Duration) -> Self {
        self.cache_ttl_analysis = Some(duration);
        self
    }

    /// Set cache TTL for price history
    pub fn cache_ttl_history(mut self, duration: Duration) -> Self {
        self.cache_ttl_history = Some(duration);
        self
    }

    /// Set cache TTL for the instrument universe
    pub fn cache_ttl_universe(mut self, duration: Duration) -> Self {
        self.cache_ttl_universe = Some(duration);
        self
    }

    /// Set maximum retries
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    /// Set retry backoff base duration
    pub fn retry_backoff_base(mut self, duration: Duration) -> Self {
        self.retry_backoff_base = Some(duration);
        self
    }

    /// Set request timeout
    pub fn request_timeout(mut self, duration: Duration) -> Self {
        self.request_timeout = Some(duration);
        self
    }

    /// Set the client-side request budget
    pub fn requests_per_minute(mut self, rate: u32) -> Self {
        self.requests_per_minute = Some(rate);
        self
    }

    /// Fill unset values from `TRADEMASTER_*` environment variables
    pub fn with_env(self) -> Result<Self> {
        self.with_lookup(|key| std::env::var(key).ok())
    }

    /// Fill unset values from an arbitrary key lookup
    pub fn with_lookup<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.api_base_url.is_none() {
            self.api_base_url = lookup(ENV_API_URL);
        }
        if self.api_token.is_none() {
            self.api_token = lookup(ENV_API_TOKEN).filter(|t| !t.is_empty());
        }
        if self.history_provider.is_none() {
            if let Some(provider) = lookup(ENV_HISTORY_PROVIDER) {
                self.history_provider = Some(provider.parse()?);
            }
        }
        Ok(self)
    }

    /// Build the configuration
    pub fn build(self) -> Result<StockConfig> {
        let defaults = StockConfig::default();

        let config = StockConfig {
            api_base_url: self.api_base_url.unwrap_or(defaults.api_base_url),
            api_token: self.api_token,
            history_provider: self.history_provider.unwrap_or(defaults.history_provider),
            history_interval: self.history_interval.unwrap_or(defaults.history_interval),
            cache_ttl_analysis: self.cache_ttl_analysis.unwrap_or(defaults.cache_ttl_analysis),
            cache_ttl_history: self.cache_ttl_history.unwrap_or(defaults.cache_ttl_history),
            cache_ttl_universe: self.cache_ttl_universe.unwrap_or(defaults.cache_ttl_universe),
            max_retries: self.max_retries.unwrap_or(defaults.max_retries),
            retry_backoff_base: self.retry_backoff_base.unwrap_or(defaults.retry_backoff_base),
            request_timeout: self.request_timeout.unwrap_or(defaults.request_timeout),
            requests_per_minute: self.requests_per_minute.unwrap_or(defaults.requests_per_minute),
        };

        config.validate()?;
        Ok(config)
    }
}
