use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use thiserror::Error;

use crate::config::{ServerConfig, StoreBackend};
use crate::core::session::{RelayContext, SessionRegistry};
use crate::store::{HttpStore, MemoryStore, StoreError, Stores};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConnectionLimitError {
    #[error("Relay connection limit reached")]
    GlobalLimitReached,
}

/// A held relay connection slot. Released when the last clone drops.
#[derive(Debug, Clone)]
pub struct RelaySlot {
    _guard: Arc<SlotGuard>,
}

#[derive(Debug)]
struct SlotGuard {
    active: Arc<AtomicUsize>,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Application state shared by all handlers.
pub struct AppState {
    pub config: ServerConfig,
    pub sessions: SessionRegistry,
    pub relay: RelayContext,
    active_relays: Arc<AtomicUsize>,
}

impl AppState {
    /// Build state with the collaborator stores selected by `config`.
    pub fn new(config: ServerConfig) -> Result<Arc<Self>, StoreError> {
        let stores = build_stores(&config)?;
        Ok(Self::with_stores(config, stores))
    }

    /// Build state around caller-supplied stores.
    pub fn with_stores(config: ServerConfig, stores: Stores) -> Arc<Self> {
        let relay = RelayContext::new(
            stores,
            config.realtime_settings(),
            config.openai_api_key.clone(),
        );

        Arc::new(Self {
            config,
            sessions: SessionRegistry::new(),
            relay,
            active_relays: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Reserve a relay connection slot, honouring `max_relay_connections`.
    pub fn try_acquire_relay_slot(&self) -> Result<RelaySlot, ConnectionLimitError> {
        let limit = self.config.max_relay_connections.unwrap_or(usize::MAX);

        self.active_relays
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                (current < limit).then_some(current + 1)
            })
            .map_err(|_| ConnectionLimitError::GlobalLimitReached)?;

        Ok(RelaySlot {
            _guard: Arc::new(SlotGuard {
                active: self.active_relays.clone(),
            }),
        })
    }

    pub fn active_relay_connections(&self) -> usize {
        self.active_relays.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("sessions", &self.sessions.len())
            .field("active_relays", &self.active_relay_connections())
            .finish_non_exhaustive()
    }
}

fn build_stores(config: &ServerConfig) -> Result<Stores, StoreError> {
    match config.store_backend {
        StoreBackend::Memory => {
            let store = match config.store_seed_path {
                Some(ref path) => MemoryStore::from_seed_file(path)?,
                None => {
                    tracing::warn!("No store seed configured, starting with an empty memory store");
                    MemoryStore::new()
                }
            };
            Ok(Stores::from_backend(Arc::new(store)))
        }
        StoreBackend::Http => {
            let url = config.store_url.as_deref().ok_or_else(|| {
                StoreError::InvalidConfiguration("store url is required for http backend".into())
            })?;
            tracing::info!("Using HTTP store at {}", url);
            let store = HttpStore::new(url, config.store_timeout())?;
            Ok(Stores::from_backend(Arc::new(store)))
        }
    }
}
