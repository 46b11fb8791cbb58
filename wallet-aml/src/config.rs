use crate::errors::{AmlError, AmlResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::time::Duration;

const KEY_LOG_LEVEL: &str = "LOG_LEVEL";
const KEY_CACHE_BACKEND: &str = "CACHE_BACKEND";
const KEY_CACHE_TTL_SECS: &str = "CACHE_TTL_SECS";
const KEY_STORE_HOST: &str = "STORE_HOST";
const KEY_STORE_PORT: &str = "STORE_PORT";
const KEY_STORE_DB: &str = "STORE_DB";
const KEY_STORE_KEY_PREFIX: &str = "STORE_KEY_PREFIX";
const KEY_STORE_TTL_SECS: &str = "STORE_TTL_SECS";
const KEY_PROVIDER: &str = "PROVIDER";
const KEY_PROVIDER_NAME: &str = "PROVIDER_NAME";
const KEY_PROVIDER_BASE_URL: &str = "PROVIDER_BASE_URL";
const KEY_PROVIDER_API_KEY: &str = "PROVIDER_API_KEY";
const KEY_PROVIDER_RATE_LIMIT: &str = "PROVIDER_RATE_LIMIT";
const KEY_API_TIMEOUT_MS: &str = "API_TIMEOUT_MS";
const KEY_MAX_RETRIES: &str = "MAX_RETRIES";
const KEY_MOCK_LATENCY_MIN_MS: &str = "MOCK_LATENCY_MIN_MS";
const KEY_MOCK_LATENCY_MAX_MS: &str = "MOCK_LATENCY_MAX_MS";

/// Deployment environments with distinct defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
    Test,
}

impl Environment {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            "staging" | "stage" => Environment::Staging,
            "test" | "testing" => Environment::Test,
            _ => Environment::Development,
        }
    }
}

/// Where screening results are cached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheBackend {
    Memory,
    Store,
}

/// Which risk provider answers cache misses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderKind {
    Mock,
    Http,
}

/// Connection settings for the external key-value store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSettings {
    pub host: String,
    pub port: u16,
    pub db: u32,
    pub key_prefix: String,
    pub ttl: Duration,
}

/// Typed view of a [`ScreeningConfig`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreeningSettings {
    pub environment: Environment,
    pub log_level: String,
    pub cache_backend: CacheBackend,
    pub cache_ttl: Duration,
    pub store: StoreSettings,
    pub provider: ProviderKind,
    pub provider_name: String,
    pub provider_base_url: Option<String>,
    pub provider_api_key: Option<String>,
    pub provider_rate_limit: u32,
    pub api_timeout: Duration,
    pub max_retries: u32,
    pub mock_latency_ms: RangeInclusive<u32>,
}

/// Screening configuration: per-environment defaults plus `AML_*` overrides
#[derive(Debug, Clone)]
pub struct ScreeningConfig {
    environment: Environment,
    config_map: HashMap<String, String>,
}

impl ScreeningConfig {
    pub fn new(environment: Environment) -> Self {
        let mut config = ScreeningConfig {
            environment,
            config_map: HashMap::new(),
        };

        config.load_defaults();
        config
    }

    /// Load configuration from environment variables
    pub fn from_env() -> AmlResult<Self> {
        let env_str = std::env::var("AML_ENVIRONMENT").unwrap_or_else(|_| "development".to_string());
        Self::from_environment(Environment::parse(&env_str))
    }

    /// Construct a configuration for the provided environment and apply overrides.
    pub fn from_environment(environment: Environment) -> AmlResult<Self> {
        let mut config = Self::new(environment);
        config.load_from_env_vars();
        config.validate_required_configs()?;
        Ok(config)
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn get(&self, key: &str) -> Option<&String> {
        self.config_map.get(key)
    }

    pub fn get_or_default(&self, key: &str, default: &str) -> String {
        self.config_map
            .get(key)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }

    pub fn get_required(&self, key: &str) -> AmlResult<&String> {
        self.config_map.get(key).ok_or_else(|| {
            AmlError::ValidationError(format!("Required config key '{}' not found", key))
        })
    }

    pub fn get_u64_with_default(&self, key: &str, default: u64) -> AmlResult<u64> {
        match self.config_map.get(key) {
            Some(value) => parse_number(value, key),
            None => Ok(default),
        }
    }

    pub fn get_u32_with_default(&self, key: &str, default: u32) -> AmlResult<u32> {
        let value = self.get_u64_with_default(key, u64::from(default))?;
        u32::try_from(value).map_err(|_| {
            AmlError::ValidationError(format!("Value {} for key '{}' is too large", value, key))
        })
    }

    /// Set a configuration value (for testing purposes)
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.config_map.insert(key.into(), value.into());
    }

    pub fn validate_required_configs(&self) -> AmlResult<()> {
        let mut required_keys = vec![
            KEY_LOG_LEVEL,
            KEY_CACHE_BACKEND,
            KEY_CACHE_TTL_SECS,
            KEY_STORE_KEY_PREFIX,
            KEY_STORE_TTL_SECS,
            KEY_PROVIDER,
            KEY_API_TIMEOUT_MS,
        ];

        if self.get(KEY_PROVIDER).map(|p| p.as_str()) == Some("http") {
            required_keys.push(KEY_PROVIDER_BASE_URL);
            required_keys.push(KEY_PROVIDER_API_KEY);
        }

        for key in required_keys {
            if !self.config_map.contains_key(key) {
                return Err(AmlError::ValidationError(format!(
                    "Required configuration key '{}' is missing for {} environment",
                    key,
                    format!("{:?}", self.environment).to_lowercase()
                )));
            }
        }

        Ok(())
    }

    /// Resolve the typed settings used to wire the service.
    pub fn settings(&self) -> AmlResult<ScreeningSettings> {
        let cache_backend = match self.get_or_default(KEY_CACHE_BACKEND, "memory").to_lowercase().as_str() {
            "memory" => CacheBackend::Memory,
            "store" | "redis" => CacheBackend::Store,
            other => {
                return Err(AmlError::ValidationError(format!(
                    "Unknown cache backend '{}'",
                    other
                )))
            }
        };

        let provider = match self.get_or_default(KEY_PROVIDER, "mock").to_lowercase().as_str() {
            "mock" => ProviderKind::Mock,
            "http" => ProviderKind::Http,
            other => {
                return Err(AmlError::ValidationError(format!(
                    "Unknown provider '{}'",
                    other
                )))
            }
        };

        let latency_min = self.get_u32_with_default(KEY_MOCK_LATENCY_MIN_MS, 1000)?;
        let latency_max = self.get_u32_with_default(KEY_MOCK_LATENCY_MAX_MS, 3000)?;
        if latency_min > latency_max {
            return Err(AmlError::ValidationError(format!(
                "Mock latency minimum {} exceeds maximum {}",
                latency_min, latency_max
            )));
        }

        let port = self.get_u32_with_default(KEY_STORE_PORT, 6379)?;
        let port = u16::try_from(port)
            .map_err(|_| AmlError::ValidationError(format!("Invalid store port {}", port)))?;

        Ok(ScreeningSettings {
            environment: self.environment,
            log_level: self.get_or_default(KEY_LOG_LEVEL, "INFO"),
            cache_backend,
            cache_ttl: Duration::from_secs(self.get_u64_with_default(KEY_CACHE_TTL_SECS, 21_600)?),
            store: StoreSettings {
                host: self.get_or_default(KEY_STORE_HOST, "localhost"),
                port,
                db: self.get_u32_with_default(KEY_STORE_DB, 0)?,
                key_prefix: self.get_or_default(KEY_STORE_KEY_PREFIX, "aml:"),
                ttl: Duration::from_secs(self.get_u64_with_default(KEY_STORE_TTL_SECS, 21_600)?),
            },
            provider,
            provider_name: self.get_or_default(KEY_PROVIDER_NAME, "Remote AML Provider"),
            provider_base_url: self.get(KEY_PROVIDER_BASE_URL).cloned(),
            provider_api_key: self.get(KEY_PROVIDER_API_KEY).cloned(),
            provider_rate_limit: self.get_u32_with_default(KEY_PROVIDER_RATE_LIMIT, 60)?,
            api_timeout: Duration::from_millis(self.get_u64_with_default(KEY_API_TIMEOUT_MS, 10_000)?),
            max_retries: self.get_u32_with_default(KEY_MAX_RETRIES, 3)?,
            mock_latency_ms: latency_min..=latency_max,
        })
    }

    fn insert_default(&mut self, key: &str, value: &str) {
        self.config_map.insert(key.to_string(), value.to_string());
    }

    fn load_defaults(&mut self) {
        // Defaults shared across environments
        self.insert_default(KEY_CACHE_BACKEND, "memory");
        self.insert_default(KEY_CACHE_TTL_SECS, "21600");
        self.insert_default(KEY_STORE_HOST, "localhost");
        self.insert_default(KEY_STORE_PORT, "6379");
        self.insert_default(KEY_PROVIDER, "mock");
        self.insert_default(KEY_API_TIMEOUT_MS, "10000");
        self.insert_default(KEY_MAX_RETRIES, "3");
        self.insert_default(KEY_PROVIDER_RATE_LIMIT, "60");
        self.insert_default(KEY_MOCK_LATENCY_MIN_MS, "1000");
        self.insert_default(KEY_MOCK_LATENCY_MAX_MS, "3000");

        match self.environment {
            Environment::Development => {
                self.insert_default(KEY_LOG_LEVEL, "DEBUG");
                self.insert_default(KEY_STORE_DB, "0");
                self.insert_default(KEY_STORE_KEY_PREFIX, "dev:aml:");
                self.insert_default(KEY_STORE_TTL_SECS, "3600");
            }
            Environment::Staging => {
                self.insert_default(KEY_LOG_LEVEL, "INFO");
                self.insert_default(KEY_STORE_DB, "1");
                self.insert_default(KEY_STORE_KEY_PREFIX, "staging:aml:");
                self.insert_default(KEY_STORE_TTL_SECS, "10800");
            }
            Environment::Production => {
                self.insert_default(KEY_LOG_LEVEL, "INFO");
                self.insert_default(KEY_STORE_DB, "2");
                self.insert_default(KEY_STORE_KEY_PREFIX, "prod:aml:");
                self.insert_default(KEY_STORE_TTL_SECS, "21600");
            }
            Environment::Test => {
                self.insert_default(KEY_LOG_LEVEL, "WARN");
                self.insert_default(KEY_STORE_DB, "0");
                self.insert_default(KEY_STORE_KEY_PREFIX, "test:aml:");
                self.insert_default(KEY_STORE_TTL_SECS, "21600");
                self.insert_default(KEY_MOCK_LATENCY_MIN_MS, "0");
                self.insert_default(KEY_MOCK_LATENCY_MAX_MS, "0");
            }
        }
    }

    fn load_from_env_vars(&mut self) {
        let env_mappings = [
            ("AML_LOG_LEVEL", KEY_LOG_LEVEL),
            ("AML_CACHE_BACKEND", KEY_CACHE_BACKEND),
            ("AML_CACHE_TTL_SECS", KEY_CACHE_TTL_SECS),
            ("AML_STORE_HOST", KEY_STORE_HOST),
            ("AML_STORE_PORT", KEY_STORE_PORT),
            ("AML_STORE_DB", KEY_STORE_DB),
            ("AML_STORE_KEY_PREFIX", KEY_STORE_KEY_PREFIX),
            ("AML_STORE_TTL_SECS", KEY_STORE_TTL_SECS),
            ("AML_PROVIDER", KEY_PROVIDER),
            ("AML_PROVIDER_NAME", KEY_PROVIDER_NAME),
            ("AML_PROVIDER_BASE_URL", KEY_PROVIDER_BASE_URL),
            ("AML_PROVIDER_API_KEY", KEY_PROVIDER_API_KEY),
            ("AML_PROVIDER_RATE_LIMIT", KEY_PROVIDER_RATE_LIMIT),
            ("AML_API_TIMEOUT_MS", KEY_API_TIMEOUT_MS),
            ("AML_MAX_RETRIES", KEY_MAX_RETRIES),
            ("AML_MOCK_LATENCY_MIN_MS", KEY_MOCK_LATENCY_MIN_MS),
            ("AML_MOCK_LATENCY_MAX_MS", KEY_MOCK_LATENCY_MAX_MS),
        ];

        for (env_var, config_key) in &env_mappings {
            if let Ok(value) = std::env::var(env_var) {
                if value.trim().is_empty() {
                    log::warn!("Environment variable {} is empty", env_var);
                    continue;
                }

                if value.chars().any(|c| c.is_control()) {
                    log::warn!(
                        "Environment variable {} contains control characters, ignoring",
                        env_var
                    );
                    continue;
                }

                self.config_map.insert(config_key.to_string(), value);
                log::debug!(
                    "Loaded configuration {} from environment variable {}",
                    config_key,
                    env_var
                );
            }
        }
    }
}

impl Default for ScreeningConfig {
    fn default() -> Self {
        Self::new(Environment::Development)
    }
}

fn parse_number(value: &str, key: &str) -> AmlResult<u64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AmlError::ValidationError(format!(
            "Configuration key '{}' cannot be empty",
            key
        )));
    }

    trimmed.parse::<u64>().map_err(|_| {
        AmlError::ValidationError(format!(
            "Invalid numeric value '{}' for key '{}'",
            value, key
        ))
    })
}
