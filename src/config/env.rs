use std::path::PathBuf;
use std::str::FromStr;

use super::{ConfigError, ServerConfig};

/// Read a variable, treating empty values as unset.
pub(super) fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Read and parse a variable.
pub(super) fn parse_env<T>(name: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_var(name)
        .map(|raw| {
            raw.parse::<T>().map_err(|e| ConfigError::InvalidValue {
                name: name.to_string(),
                message: format!("'{raw}': {e}"),
            })
        })
        .transpose()
}

/// Values taken from the environment on top of the defaults.
///
/// TLS paths are kept separate so the merge step can validate them together
/// with any YAML overrides.
pub(super) struct EnvConfig {
    pub config: ServerConfig,
    pub tls_cert_path: Option<String>,
    pub tls_key_path: Option<String>,
}

pub(super) fn load_env() -> Result<EnvConfig, ConfigError> {
    let mut config = ServerConfig::default();

    if let Some(host) = env_var("HOST") {
        config.host = host;
    }
    if let Some(port) = parse_env::<u16>("PORT")? {
        config.port = port;
    }

    if let Some(url) = env_var("REALTIME_URL") {
        config.realtime_url = url;
    }
    if let Some(model) = env_var("REALTIME_MODEL") {
        config.realtime_model = model;
    }
    if let Some(voice) = env_var("REALTIME_VOICE") {
        config.realtime_voice = voice;
    }
    if let Some(temperature) = parse_env::<f32>("REALTIME_TEMPERATURE")? {
        config.realtime_temperature = temperature;
    }
    if let Some(delay) = parse_env::<u64>("REALTIME_SETTLE_DELAY_MS")? {
        config.realtime_settle_delay_ms = delay;
    }
    if let Some(timeout) = parse_env::<u64>("REALTIME_CONNECT_TIMEOUT_SECONDS")? {
        config.realtime_connect_timeout_seconds = timeout;
    }
    if let Some(key) = env_var("REALTIME_API_KEY_CONFIG_KEY") {
        config.realtime_api_key_config_key = key;
    }
    config.openai_api_key = env_var("OPENAI_API_KEY");

    config.public_host = env_var("PUBLIC_HOST");

    if let Some(backend) = parse_env("STORE_BACKEND")? {
        config.store_backend = backend;
    }
    config.store_url = env_var("STORE_URL");
    config.store_seed_path = env_var("STORE_SEED_PATH").map(PathBuf::from);
    if let Some(timeout) = parse_env::<u64>("STORE_TIMEOUT_SECONDS")? {
        config.store_timeout_seconds = timeout;
    }

    config.cors_allowed_origins = env_var("CORS_ALLOWED_ORIGINS");
    config.max_relay_connections = parse_env::<usize>("MAX_RELAY_CONNECTIONS")?;

    Ok(EnvConfig {
        config,
        tls_cert_path: env_var("TLS_CERT_PATH"),
        tls_key_path: env_var("TLS_KEY_PATH"),
    })
}
