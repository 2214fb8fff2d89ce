use std::path::PathBuf;

use url::Url;

use super::{ConfigError, ServerConfig, StoreBackend, TlsConfig};
use crate::core::realtime::RealtimeVoice;

/// Temperature range accepted by the realtime endpoint.
const TEMPERATURE_RANGE: std::ops::RangeInclusive<f32> = 0.6..=1.2;

/// TLS requires both paths or neither.
pub(super) fn resolve_tls(
    cert_path: Option<String>,
    key_path: Option<String>,
) -> Result<Option<TlsConfig>, ConfigError> {
    match (cert_path, key_path) {
        (Some(cert), Some(key)) => Ok(Some(TlsConfig {
            cert_path: PathBuf::from(cert),
            key_path: PathBuf::from(key),
        })),
        (None, None) => Ok(None),
        (Some(_), None) => Err(ConfigError::Invalid(
            "TLS certificate path is set but the key path is missing".to_string(),
        )),
        (None, Some(_)) => Err(ConfigError::Invalid(
            "TLS key path is set but the certificate path is missing".to_string(),
        )),
    }
}

pub(super) fn validate_config(config: &ServerConfig) -> Result<(), ConfigError> {
    validate_realtime(config)?;
    validate_store(config)?;
    validate_connection_limit(config.max_relay_connections)?;
    Ok(())
}

fn validate_realtime(config: &ServerConfig) -> Result<(), ConfigError> {
    if RealtimeVoice::parse(&config.realtime_voice).is_none() {
        let known: Vec<&str> = RealtimeVoice::all().iter().map(|v| v.as_str()).collect();
        return Err(ConfigError::InvalidValue {
            name: "realtime.voice".to_string(),
            message: format!(
                "unknown voice '{}' (expected one of {})",
                config.realtime_voice,
                known.join(", ")
            ),
        });
    }

    if !TEMPERATURE_RANGE.contains(&config.realtime_temperature) {
        return Err(ConfigError::InvalidValue {
            name: "realtime.temperature".to_string(),
            message: format!(
                "{} is outside {}..={}",
                config.realtime_temperature,
                TEMPERATURE_RANGE.start(),
                TEMPERATURE_RANGE.end()
            ),
        });
    }

    let url = Url::parse(&config.realtime_url).map_err(|e| ConfigError::InvalidValue {
        name: "realtime.url".to_string(),
        message: e.to_string(),
    })?;
    if url.scheme() != "ws" && url.scheme() != "wss" {
        return Err(ConfigError::InvalidValue {
            name: "realtime.url".to_string(),
            message: format!("expected a ws:// or wss:// URL, got '{}'", config.realtime_url),
        });
    }

    if config.realtime_connect_timeout_seconds == 0 {
        return Err(ConfigError::InvalidValue {
            name: "realtime.connect_timeout_seconds".to_string(),
            message: "must be greater than zero".to_string(),
        });
    }

    if config.realtime_model.trim().is_empty() {
        return Err(ConfigError::InvalidValue {
            name: "realtime.model".to_string(),
            message: "must not be empty".to_string(),
        });
    }

    Ok(())
}

fn validate_store(config: &ServerConfig) -> Result<(), ConfigError> {
    match config.store_backend {
        StoreBackend::Memory => Ok(()),
        StoreBackend::Http => {
            let Some(ref raw) = config.store_url else {
                return Err(ConfigError::Invalid(
                    "store backend 'http' requires a store url".to_string(),
                ));
            };
            let url = Url::parse(raw).map_err(|e| ConfigError::InvalidValue {
                name: "store.url".to_string(),
                message: e.to_string(),
            })?;
            if url.scheme() != "http" && url.scheme() != "https" {
                return Err(ConfigError::InvalidValue {
                    name: "store.url".to_string(),
                    message: format!("expected an http:// or https:// URL, got '{raw}'"),
                });
            }
            Ok(())
        }
    }
}

fn validate_connection_limit(limit: Option<usize>) -> Result<(), ConfigError> {
    if limit == Some(0) {
        return Err(ConfigError::InvalidValue {
            name: "security.max_relay_connections".to_string(),
            message: "must be greater than zero".to_string(),
        });
    }
    Ok(())
}
