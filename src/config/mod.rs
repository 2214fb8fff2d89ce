//! Configuration module for the callbridge server
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//!
//! # Example
//! ```rust,no_run
//! use callbridge::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::core::realtime::{
    DEFAULT_API_KEY_CONFIG_KEY, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_REALTIME_MODEL, DEFAULT_SETTLE_DELAY_MS,
    DEFAULT_TEMPERATURE, REALTIME_URL, RealtimeSettings, RealtimeVoice,
};

mod env;
mod merge;
mod validation;
mod yaml;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse YAML config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// TLS configuration for HTTPS and WSS
#[derive(Debug, Clone, PartialEq)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// Where call, agent, and config records live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    /// In-process maps, optionally seeded from a YAML file
    #[default]
    Memory,
    /// REST backend at `store_url`
    Http,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "http" => Ok(Self::Http),
            other => Err(format!("unknown store backend '{other}' (expected memory or http)")),
        }
    }
}

/// Server configuration
///
/// Contains all configuration needed to run the server:
/// - Server settings (host, port, TLS)
/// - Realtime endpoint settings and credential
/// - Telephony webhook settings
/// - Collaborator store settings
/// - Security settings (CORS, connection limits)
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // TLS configuration (optional)
    pub tls: Option<TlsConfig>,

    // Realtime endpoint
    pub realtime_url: String,
    pub realtime_model: String,
    pub realtime_voice: String,
    pub realtime_temperature: f32,
    pub realtime_settle_delay_ms: u64,
    pub realtime_connect_timeout_seconds: u64,
    /// Config-store key holding the realtime credential
    pub realtime_api_key_config_key: String,
    /// Used when the config store has no credential
    pub openai_api_key: Option<String>,

    // Telephony
    /// Public host name the telephony provider dials back to; the request's
    /// Host header is used when unset
    pub public_host: Option<String>,

    // Collaborator stores
    pub store_backend: StoreBackend,
    pub store_url: Option<String>,
    pub store_seed_path: Option<PathBuf>,
    pub store_timeout_seconds: u64,

    // Security settings
    /// CORS allowed origins (comma-separated, or "*" for all)
    pub cors_allowed_origins: Option<String>,
    /// Maximum concurrent relay connections (None = unlimited)
    pub max_relay_connections: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            tls: None,
            realtime_url: REALTIME_URL.to_string(),
            realtime_model: DEFAULT_REALTIME_MODEL.to_string(),
            realtime_voice: RealtimeVoice::default().as_str().to_string(),
            realtime_temperature: DEFAULT_TEMPERATURE,
            realtime_settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            realtime_connect_timeout_seconds: DEFAULT_CONNECT_TIMEOUT_SECS,
            realtime_api_key_config_key: DEFAULT_API_KEY_CONFIG_KEY.to_string(),
            openai_api_key: None,
            public_host: None,
            store_backend: StoreBackend::default(),
            store_url: None,
            store_seed_path: None,
            store_timeout_seconds: 10,
            cors_allowed_origins: None,
            max_relay_connections: None,
        }
    }
}

/// Implement Drop to zeroize secret fields when ServerConfig is dropped.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut key) = self.openai_api_key {
            key.zeroize();
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// Reads every setting from the process environment (which includes values
    /// loaded from `.env` in `main`), falling back to defaults, then validates.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = merge::merge_config(None)?;
        validation::validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &PathBuf) -> Result<Self, ConfigError> {
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        validation::validate_config(&config)?;
        Ok(config)
    }

    /// Get the server address as a string
    ///
    /// Returns the address in the format "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if TLS is enabled
    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    /// Realtime endpoint settings for relay sessions.
    pub fn realtime_settings(&self) -> RealtimeSettings {
        RealtimeSettings {
            url: self.realtime_url.clone(),
            model: self.realtime_model.clone(),
            voice: RealtimeVoice::parse(&self.realtime_voice).unwrap_or_default(),
            temperature: self.realtime_temperature,
            settle_delay: Duration::from_millis(self.realtime_settle_delay_ms),
            connect_timeout: Duration::from_secs(self.realtime_connect_timeout_seconds),
            api_key_config_key: self.realtime_api_key_config_key.clone(),
        }
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use std::fs;
    use tempfile::TempDir;

    const ENV_VARS: &[&str] = &[
        "HOST",
        "PORT",
        "TLS_CERT_PATH",
        "TLS_KEY_PATH",
        "OPENAI_API_KEY",
        "REALTIME_URL",
        "REALTIME_MODEL",
        "REALTIME_VOICE",
        "REALTIME_TEMPERATURE",
        "REALTIME_SETTLE_DELAY_MS",
        "REALTIME_API_KEY_CONFIG_KEY",
        "PUBLIC_HOST",
        "STORE_BACKEND",
        "STORE_URL",
        "STORE_SEED_PATH",
        "STORE_TIMEOUT_SECONDS",
        "CORS_ALLOWED_ORIGINS",
        "MAX_RELAY_CONNECTIONS",
    ];

    fn cleanup_env_vars() {
        for name in ENV_VARS {
            unsafe {
                env::remove_var(name);
            }
        }
    }

    #[test]
    fn test_address_and_tls() {
        let mut config = ServerConfig::default();
        config.host = "127.0.0.1".to_string();
        config.port = 8080;
        assert_eq!(config.address(), "127.0.0.1:8080");
        assert!(!config.is_tls_enabled());

        config.tls = Some(TlsConfig {
            cert_path: PathBuf::from("/certs/cert.pem"),
            key_path: PathBuf::from("/certs/key.pem"),
        });
        assert!(config.is_tls_enabled());
    }

    #[test]
    fn test_realtime_settings_from_config() {
        let mut config = ServerConfig::default();
        config.realtime_voice = "shimmer".to_string();
        config.realtime_settle_delay_ms = 50;

        let settings = config.realtime_settings();
        assert_eq!(settings.voice, RealtimeVoice::Shimmer);
        assert_eq!(settings.settle_delay, Duration::from_millis(50));
        assert_eq!(settings.api_key_config_key, "openai_api_key");
    }

    #[test]
    fn test_store_backend_from_str() {
        assert_eq!("memory".parse::<StoreBackend>(), Ok(StoreBackend::Memory));
        assert_eq!(" HTTP ".parse::<StoreBackend>(), Ok(StoreBackend::Http));
        assert!("postgres".parse::<StoreBackend>().is_err());
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        cleanup_env_vars();

        let config = ServerConfig::from_env().unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3001);
        assert_eq!(config.realtime_model, DEFAULT_REALTIME_MODEL);
        assert_eq!(config.realtime_settle_delay_ms, 250);
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert!(config.openai_api_key.is_none());
        assert!(config.max_relay_connections.is_none());
    }

    #[test]
    #[serial]
    fn test_from_env_values() {
        cleanup_env_vars();
        unsafe {
            env::set_var("PORT", "4000");
            env::set_var("OPENAI_API_KEY", "sk-env");
            env::set_var("REALTIME_VOICE", "echo");
            env::set_var("REALTIME_SETTLE_DELAY_MS", "0");
            env::set_var("STORE_BACKEND", "http");
            env::set_var("STORE_URL", "http://crm.internal/api");
            env::set_var("MAX_RELAY_CONNECTIONS", "25");
        }

        let config = ServerConfig::from_env().unwrap();
        assert_eq!(config.port, 4000);
        assert_eq!(config.openai_api_key.as_deref(), Some("sk-env"));
        assert_eq!(config.realtime_voice, "echo");
        assert_eq!(config.realtime_settle_delay_ms, 0);
        assert_eq!(config.store_backend, StoreBackend::Http);
        assert_eq!(config.store_url.as_deref(), Some("http://crm.internal/api"));
        assert_eq!(config.max_relay_connections, Some(25));

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_env_invalid_port() {
        cleanup_env_vars();
        unsafe {
            env::set_var("PORT", "not-a-port");
        }

        let err = ServerConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("PORT"));

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_overrides_env() {
        cleanup_env_vars();
        unsafe {
            env::set_var("PORT", "4000");
            env::set_var("OPENAI_API_KEY", "sk-env");
            env::set_var("PUBLIC_HOST", "env.example.com");
        }

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(
            &config_path,
            r#"
server:
  port: 5000
realtime:
  voice: "sage"
  temperature: 0.7
telephony:
  public_host: "yaml.example.com"
security:
  max_relay_connections: 10
"#,
        )
        .unwrap();

        let config = ServerConfig::from_file(&config_path).unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.openai_api_key.as_deref(), Some("sk-env"));
        assert_eq!(config.realtime_voice, "sage");
        assert!((config.realtime_temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(config.public_host.as_deref(), Some("yaml.example.com"));
        assert_eq!(config.max_relay_connections, Some(10));

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_validation_failure() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(
            &config_path,
            r#"
store:
  backend: "http"
"#,
        )
        .unwrap();

        let err = ServerConfig::from_file(&config_path).unwrap_err();
        assert!(err.to_string().contains("store"));
    }
}
