use std::path::PathBuf;

use super::env::load_env;
use super::validation::resolve_tls;
use super::yaml::YamlConfig;
use super::{ConfigError, ServerConfig, StoreBackend};

/// Build the final configuration: environment (over defaults), then YAML
/// overrides when a file was given.
pub(super) fn merge_config(yaml: Option<YamlConfig>) -> Result<ServerConfig, ConfigError> {
    let env = load_env()?;
    let mut config = env.config;
    let mut tls_cert_path = env.tls_cert_path;
    let mut tls_key_path = env.tls_key_path;
    let mut tls_enabled = None;

    if let Some(yaml) = yaml {
        if let Some(server) = yaml.server {
            if let Some(host) = server.host {
                config.host = host;
            }
            if let Some(port) = server.port {
                config.port = port;
            }
            if let Some(tls) = server.tls {
                tls_enabled = tls.enabled;
                if tls.cert_path.is_some() {
                    tls_cert_path = tls.cert_path;
                }
                if tls.key_path.is_some() {
                    tls_key_path = tls.key_path;
                }
            }
        }

        if let Some(realtime) = yaml.realtime {
            if let Some(url) = realtime.url {
                config.realtime_url = url;
            }
            if let Some(model) = realtime.model {
                config.realtime_model = model;
            }
            if let Some(voice) = realtime.voice {
                config.realtime_voice = voice;
            }
            if let Some(temperature) = realtime.temperature {
                config.realtime_temperature = temperature;
            }
            if let Some(delay) = realtime.settle_delay_ms {
                config.realtime_settle_delay_ms = delay;
            }
            if let Some(timeout) = realtime.connect_timeout_seconds {
                config.realtime_connect_timeout_seconds = timeout;
            }
            if let Some(key) = realtime.api_key_config_key {
                config.realtime_api_key_config_key = key;
            }
            if realtime.api_key.is_some() {
                config.openai_api_key = realtime.api_key;
            }
        }

        if let Some(telephony) = yaml.telephony
            && telephony.public_host.is_some()
        {
            config.public_host = telephony.public_host;
        }

        if let Some(store) = yaml.store {
            if let Some(backend) = store.backend {
                config.store_backend =
                    backend
                        .parse::<StoreBackend>()
                        .map_err(|message| ConfigError::InvalidValue {
                            name: "store.backend".to_string(),
                            message,
                        })?;
            }
            if store.url.is_some() {
                config.store_url = store.url;
            }
            if let Some(seed_path) = store.seed_path {
                config.store_seed_path = Some(PathBuf::from(seed_path));
            }
            if let Some(timeout) = store.timeout_seconds {
                config.store_timeout_seconds = timeout;
            }
        }

        if let Some(security) = yaml.security {
            if security.cors_allowed_origins.is_some() {
                config.cors_allowed_origins = security.cors_allowed_origins;
            }
            if security.max_relay_connections.is_some() {
                config.max_relay_connections = security.max_relay_connections;
            }
        }
    }

    config.tls = if tls_enabled == Some(false) {
        None
    } else {
        resolve_tls(tls_cert_path, tls_key_path)?
    };

    Ok(config)
}
