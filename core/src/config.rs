//! Run and controller configuration types

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::channel::ChannelConfig;
use crate::error::{EngineError, EngineResult};
use crate::state::Budget;
use crate::traits::ProbeRequest;

/// Default per-attempt timeout in seconds
pub const DEFAULT_TIMEOUT_SEC: u64 = 10;

/// Parameters of a single run
///
/// Validated once by the controller before the run starts and never mutated
/// afterwards. Field names follow the control API (`userAgent`, `delayMs`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunConfig {
    /// Target URL
    pub url: String,

    /// HTTP method (verb)
    #[serde(default = "default_method")]
    pub method: String,

    /// User-Agent header sent with each probe
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Number of concurrent workers
    #[serde(default = "default_threads")]
    pub threads: usize,

    /// Total request budget; 0 means unbounded
    #[serde(default)]
    pub requests: u64,

    /// Pause after each attempt, per worker
    #[serde(default)]
    pub delay_ms: u64,

    /// Per-attempt deadline; 0 disables the deadline
    #[serde(default = "default_timeout_sec")]
    pub timeout_sec: u64,

    /// Optional pool-wide cap in requests per second
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<f64>,
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_user_agent() -> String {
    format!("stress-bench/{}", env!("CARGO_PKG_VERSION"))
}

fn default_threads() -> usize {
    1
}

fn default_timeout_sec() -> u64 {
    DEFAULT_TIMEOUT_SEC
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            method: default_method(),
            user_agent: default_user_agent(),
            threads: default_threads(),
            requests: 0,
            delay_ms: 0,
            timeout_sec: default_timeout_sec(),
            rate_limit: None,
        }
    }
}

impl RunConfig {
    /// Create a config targeting `url` with defaults for everything else
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Set the HTTP method
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    /// Set the User-Agent string
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the worker count
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Set the request budget (0 = unbounded)
    pub fn with_requests(mut self, requests: u64) -> Self {
        self.requests = requests;
        self
    }

    /// Set the inter-attempt delay
    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    /// Set the per-attempt timeout
    pub fn with_timeout_sec(mut self, timeout_sec: u64) -> Self {
        self.timeout_sec = timeout_sec;
        self
    }

    /// Set the pool-wide rate limit
    pub fn with_rate_limit(mut self, rps: f64) -> Self {
        self.rate_limit = Some(rps);
        self
    }

    /// Request budget as a [`Budget`]
    pub fn budget(&self) -> Budget {
        Budget::from_requests(self.requests)
    }

    /// Inter-attempt delay
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Per-attempt deadline, `None` when disabled
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_sec > 0).then(|| Duration::from_secs(self.timeout_sec))
    }

    /// The probe every worker of this run will issue
    pub fn probe_request(&self) -> ProbeRequest {
        ProbeRequest {
            target: self.url.clone(),
            method: self.method.clone(),
            user_agent: self.user_agent.clone(),
            timeout: self.timeout(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.trim().is_empty() {
            return Err(ConfigError::EmptyUrl);
        }

        if self.method.is_empty() {
            return Err(ConfigError::EmptyMethod);
        }

        if !self.method.bytes().all(is_token_byte) {
            return Err(ConfigError::InvalidMethod(self.method.clone()));
        }

        if self.threads == 0 {
            return Err(ConfigError::InvalidThreads);
        }

        if let Some(rps) = self.rate_limit {
            if !rps.is_finite() || rps <= 0.0 {
                return Err(ConfigError::InvalidRateLimit(rps));
            }
        }

        Ok(())
    }

    /// Load a config from a `.json` or `.toml` file
    pub fn from_path(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let display = path.display().to_string();

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => toml::from_str(&raw).map_err(|e| EngineError::parse(display, e)),
            _ => serde_json::from_str(&raw).map_err(|e| EngineError::parse(display, e)),
        }
    }
}

// RFC 9110 token characters
fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// Target url is empty
    #[error("url must not be empty")]
    EmptyUrl,

    /// Method is empty
    #[error("method must not be empty")]
    EmptyMethod,

    /// Method contains characters that are not valid in an HTTP token
    #[error("invalid HTTP method: {0:?}")]
    InvalidMethod(String),

    /// Worker count is zero
    #[error("threads must be at least 1")]
    InvalidThreads,

    /// Rate limit is zero, negative or not finite
    #[error("rate limit must be positive, got {0}")]
    InvalidRateLimit(f64),
}

/// Engine tunables that are not part of a run
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Interval between periodic status snapshots
    pub status_interval: Duration,

    /// Job and result queue sizing
    pub channels: ChannelConfig,

    /// Each worker logs one in every `failure_log_every` failures
    pub failure_log_every: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            status_interval: Duration::from_millis(500),
            channels: ChannelConfig::default(),
            failure_log_every: 10,
        }
    }
}

impl ControllerConfig {
    /// Set the status snapshot interval
    pub fn with_status_interval(mut self, interval: Duration) -> Self {
        self.status_interval = interval;
        self
    }

    /// Set the channel configuration
    pub fn with_channels(mut self, channels: ChannelConfig) -> Self {
        self.channels = channels;
        self
    }

    /// Set the failure log threshold
    pub fn with_failure_log_every(mut self, every: u64) -> Self {
        self.failure_log_every = every;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> RunConfig {
        RunConfig::new("http://x")
            .with_threads(3)
            .with_requests(10)
            .with_timeout_sec(5)
    }

    #[test]
    fn test_default_config() {
        let config = RunConfig::default();
        assert_eq!(config.method, "GET");
        assert_eq!(config.threads, 1);
        assert_eq!(config.requests, 0);
        assert_eq!(config.timeout_sec, DEFAULT_TIMEOUT_SEC);
        assert!(config.user_agent.starts_with("stress-bench/"));
        assert!(config.rate_limit.is_none());
    }

    #[test]
    fn test_config_validation_valid() {
        assert!(valid().validate().is_ok());
        assert!(valid().with_method("PURGE").validate().is_ok());
        assert!(valid().with_rate_limit(50.0).validate().is_ok());
    }

    #[test]
    fn test_config_validation_empty_url() {
        let config = RunConfig::new("   ");
        assert_eq!(config.validate(), Err(ConfigError::EmptyUrl));
    }

    #[test]
    fn test_config_validation_method() {
        assert_eq!(
            valid().with_method("").validate(),
            Err(ConfigError::EmptyMethod)
        );
        assert_eq!(
            valid().with_method("GE T").validate(),
            Err(ConfigError::InvalidMethod("GE T".into()))
        );
    }

    #[test]
    fn test_config_validation_zero_threads() {
        assert_eq!(
            valid().with_threads(0).validate(),
            Err(ConfigError::InvalidThreads)
        );
    }

    #[test]
    fn test_config_validation_rate_limit() {
        assert!(valid().with_rate_limit(0.0).validate().is_err());
        assert!(valid().with_rate_limit(-1.0).validate().is_err());
        assert!(valid().with_rate_limit(f64::NAN).validate().is_err());
    }

    #[test]
    fn test_budget_and_durations() {
        let config = valid().with_delay_ms(250);
        assert_eq!(config.budget(), Budget::Bounded(10));
        assert_eq!(config.delay(), Duration::from_millis(250));
        assert_eq!(config.timeout(), Some(Duration::from_secs(5)));

        let config = config.with_requests(0).with_timeout_sec(0);
        assert_eq!(config.budget(), Budget::Unbounded);
        assert_eq!(config.timeout(), None);
    }

    #[test]
    fn test_probe_request_mirrors_config() {
        let request = valid().with_method("HEAD").with_user_agent("ua").probe_request();
        assert_eq!(request.target, "http://x");
        assert_eq!(request.method, "HEAD");
        assert_eq!(request.user_agent, "ua");
        assert_eq!(request.timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_config_camel_case_fields() {
        let json = r#"{
            "url": "http://x",
            "method": "POST",
            "userAgent": "curl/8",
            "threads": 4,
            "requests": 100,
            "delayMs": 20,
            "timeoutSec": 3
        }"#;
        let config: RunConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.user_agent, "curl/8");
        assert_eq!(config.delay_ms, 20);
        assert_eq!(config.timeout_sec, 3);

        let out = serde_json::to_string(&config).unwrap();
        assert!(out.contains("\"userAgent\":\"curl/8\""));
        assert!(!out.contains("rateLimit"));
    }

    #[test]
    fn test_config_missing_fields_use_defaults() {
        let config: RunConfig = serde_json::from_str(r#"{"url": "http://x"}"#).unwrap();
        assert_eq!(config.method, "GET");
        assert_eq!(config.threads, 1);
        assert_eq!(config.requests, 0);
    }

    #[test]
    fn test_config_from_toml_file() {
        let path = std::env::temp_dir().join(format!("stress-bench-{}.toml", std::process::id()));
        std::fs::write(
            &path,
            "url = \"http://x\"\nmethod = \"GET\"\nthreads = 2\nrequests = 5\nrateLimit = 20.0\n",
        )
        .unwrap();

        let config = RunConfig::from_path(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.threads, 2);
        assert_eq!(config.requests, 5);
        assert_eq!(config.rate_limit, Some(20.0));
    }

    #[test]
    fn test_config_from_bad_json_file() {
        let path = std::env::temp_dir().join(format!("stress-bench-{}.json", std::process::id()));
        std::fs::write(&path, "{ not json").unwrap();

        let err = RunConfig::from_path(&path).unwrap_err();
        std::fs::remove_file(&path).ok();

        assert!(matches!(err, EngineError::Parse { .. }));
    }

    #[test]
    fn test_controller_config_defaults() {
        let config = ControllerConfig::default();
        assert_eq!(config.status_interval, Duration::from_millis(500));
        assert_eq!(config.failure_log_every, 10);

        let config = config
            .with_status_interval(Duration::from_millis(50))
            .with_failure_log_every(3);
        assert_eq!(config.status_interval, Duration::from_millis(50));
        assert_eq!(config.failure_log_every, 3);
    }
}
