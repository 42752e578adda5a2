use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use crate::scoring::ai::RetryPolicy;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub llm: LlmConfig,
    pub email: EmailConfig,
    pub history: HistoryConfig,
    pub scoring: ScoringConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let defaults = LlmConfig::default();
        let llm = LlmConfig {
            api_key: env::var("LLM_API_KEY")
                .or_else(|_| env::var("OPENAI_API_KEY"))
                .ok(),
            base_url: env::var("LLM_BASE_URL").unwrap_or(defaults.base_url),
            model: env::var("LLM_MODEL").unwrap_or(defaults.model),
            timeout_seconds: numeric_var("LLM_TIMEOUT_SECONDS", defaults.timeout_seconds)?,
            max_attempts: numeric_var("LLM_MAX_ATTEMPTS", defaults.max_attempts)?,
            retry_base_ms: numeric_var("LLM_RETRY_BASE_MS", defaults.retry_base_ms)?,
            retry_factor: numeric_var("LLM_RETRY_FACTOR", defaults.retry_factor)?,
            fallback_enabled: flag_var("LLM_FALLBACK_ENABLED", defaults.fallback_enabled),
            fallback_api_key: env::var("LLM_FALLBACK_API_KEY").ok(),
            fallback_base_url: env::var("LLM_FALLBACK_BASE_URL").ok(),
            fallback_model: env::var("LLM_FALLBACK_MODEL").ok(),
        };
        if llm.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                var: "LLM_MAX_ATTEMPTS",
                reason: "must allow at least one attempt",
            });
        }

        let email = EmailConfig {
            max_per_hour: numeric_var("EMAIL_MAX_PER_HOUR", EmailConfig::default().max_per_hour)?,
            window_seconds: numeric_var(
                "EMAIL_WINDOW_SECONDS",
                EmailConfig::default().window_seconds,
            )?,
        };

        let history = HistoryConfig {
            default_limit: numeric_var(
                "HISTORY_DEFAULT_LIMIT",
                HistoryConfig::default().default_limit,
            )?,
            max_limit: numeric_var("HISTORY_MAX_LIMIT", HistoryConfig::default().max_limit)?,
        };
        if history.default_limit == 0 || history.default_limit > history.max_limit {
            return Err(ConfigError::InvalidValue {
                var: "HISTORY_DEFAULT_LIMIT",
                reason: "must be between 1 and HISTORY_MAX_LIMIT",
            });
        }

        let scoring = ScoringConfig {
            timeout_seconds: numeric_var(
                "SCORING_TIMEOUT_SECONDS",
                ScoringConfig::default().timeout_seconds,
            )?,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            llm,
            email,
            history,
            scoring,
        })
    }
}

fn numeric_var<T: FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(var) {
        Ok(raw) if !raw.trim().is_empty() => {
            raw.trim()
                .parse::<T>()
                .map_err(|_| ConfigError::InvalidNumber {
                    var,
                    value: raw.clone(),
                })
        }
        _ => Ok(default),
    }
}

fn flag_var(var: &str, default: bool) -> bool {
    match env::var(var) {
        Ok(raw) if !raw.trim().is_empty() => {
            matches!(raw.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes")
        }
        _ => default,
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Completion provider credentials and retry budget.
#[derive(Clone)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout_seconds: u64,
    pub max_attempts: u32,
    pub retry_base_ms: u64,
    pub retry_factor: u32,
    /// Secondary provider tried when the primary fails a request. Its base
    /// URL and model default to the primary's.
    pub fallback_enabled: bool,
    pub fallback_api_key: Option<String>,
    pub fallback_base_url: Option<String>,
    pub fallback_model: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            timeout_seconds: 60,
            max_attempts: 3,
            retry_base_ms: 600,
            retry_factor: 2,
            fallback_enabled: true,
            fallback_api_key: None,
            fallback_base_url: None,
            fallback_model: None,
        }
    }
}

impl LlmConfig {
    /// Usable key, ignoring blanks and `your_...` placeholders.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty() && !key.starts_with("your_"))
    }

    pub fn is_configured(&self) -> bool {
        self.api_key().is_some()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.retry_base_ms),
            factor: self.retry_factor,
            max_delay: Duration::from_secs(self.timeout_seconds.max(1)),
        }
    }

    /// Settings for the secondary provider, present only when it is enabled
    /// and has a usable key of its own.
    pub fn fallback(&self) -> Option<LlmConfig> {
        if !self.fallback_enabled {
            return None;
        }
        let config = LlmConfig {
            api_key: self.fallback_api_key.clone(),
            base_url: self
                .fallback_base_url
                .clone()
                .unwrap_or_else(|| self.base_url.clone()),
            model: self
                .fallback_model
                .clone()
                .unwrap_or_else(|| self.model.clone()),
            fallback_enabled: false,
            fallback_api_key: None,
            fallback_base_url: None,
            fallback_model: None,
            ..self.clone()
        };
        config.is_configured().then_some(config)
    }
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout_seconds", &self.timeout_seconds)
            .field("max_attempts", &self.max_attempts)
            .field("retry_base_ms", &self.retry_base_ms)
            .field("retry_factor", &self.retry_factor)
            .field("fallback_enabled", &self.fallback_enabled)
            .field(
                "fallback_api_key",
                &self.fallback_api_key.as_ref().map(|_| "<redacted>"),
            )
            .field("fallback_base_url", &self.fallback_base_url)
            .field("fallback_model", &self.fallback_model)
            .finish()
    }
}

/// Report e-mail quota.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub max_per_hour: usize,
    pub window_seconds: u64,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            max_per_hour: 5,
            window_seconds: 3600,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HistoryConfig {
    pub default_limit: usize,
    pub max_limit: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            default_limit: 20,
            max_limit: 100,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScoringConfig {
    pub timeout_seconds: u64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 120,
        }
    }
}

impl ScoringConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { var: &'static str, value: String },
    InvalidValue { var: &'static str, reason: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { var, value } => {
                write!(f, "{var} must be a non-negative integer, got '{value}'")
            }
            ConfigError::InvalidValue { var, reason } => write!(f, "{var} {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidNumber { .. }
            | ConfigError::InvalidValue { .. } => None,
        }
    }
}
