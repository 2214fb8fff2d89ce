//! Collaborator stores for call records, agents, and system configuration.
//!
//! The relay never owns persistence. It reads and updates records through the
//! traits defined here, which keeps the session lifecycle independent of where
//! call data actually lives.
//!
//! # Implementations
//!
//! - [`MemoryStore`] - in-process maps, optionally seeded from a YAML fixture
//! - [`HttpStore`] - a REST client for a CRUD backend
//!
//! # Example
//!
//! ```rust,ignore
//! use callbridge::store::{CallRecordStore, MemoryStore};
//!
//! let store = MemoryStore::from_seed_file(&path)?;
//! let records = store.find_by_call_sid("CA123").await?;
//! ```

mod http;
mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use http::HttpStore;
pub use memory::{MemoryStore, StoreSeed};

/// Errors returned by collaborator stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested record does not exist
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Transport-level failure talking to the backend
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// The backend answered with an unexpected status
    #[error("Unexpected status {status} from {endpoint}")]
    UnexpectedStatus { status: u16, endpoint: String },

    /// The backend answered with a payload we could not decode
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Seed or configuration problem
    #[error("Invalid store configuration: {0}")]
    InvalidConfiguration(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Progress of an outbound call as recorded on the call record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallStatus {
    /// Imported, not dialled yet
    Pending,
    /// The relay has configured the conversation for this call
    Called,
    /// Any status this crate does not know about
    #[serde(other)]
    Other,
}

/// A persisted call target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRecord {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub number: Option<String>,
    /// Agent whose prompt drives the conversation
    #[serde(default)]
    pub agent: Option<i64>,
    #[serde(default)]
    pub status: Option<CallStatus>,
    /// External call identifier assigned by the telephony provider
    #[serde(default)]
    pub call_sid: Option<String>,
    /// Last persisted transcript text
    #[serde(default)]
    pub records: Option<String>,
}

/// Partial update applied to a call record. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallRecordUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<CallStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records: Option<String>,
}

impl CallRecordUpdate {
    pub fn status(status: CallStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn records(text: impl Into<String>) -> Self {
        Self {
            records: Some(text.into()),
            ..Default::default()
        }
    }

    pub(crate) fn apply(&self, record: &mut CallRecord) {
        if let Some(status) = self.status {
            record.status = Some(status);
        }
        if let Some(ref records) = self.records {
            record.records = Some(records.clone());
        }
    }
}

/// A conversation agent and its script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: i64,
    pub prompt: String,
}

/// Lookup and update operations on persisted call records.
#[async_trait]
pub trait CallRecordStore: Send + Sync {
    /// All records whose external call identifier equals `call_sid`.
    async fn find_by_call_sid(&self, call_sid: &str) -> StoreResult<Vec<CallRecord>>;

    /// Update a record by its persisted id.
    async fn update(&self, id: i64, update: CallRecordUpdate) -> StoreResult<CallRecord>;

    /// Update the record correlated with an external call identifier.
    async fn update_by_call_sid(
        &self,
        call_sid: &str,
        update: CallRecordUpdate,
    ) -> StoreResult<CallRecord>;
}

/// Agent script lookup.
#[async_trait]
pub trait AgentStore: Send + Sync {
    async fn find_one(&self, id: i64) -> StoreResult<Option<Agent>>;
}

/// Key/value system configuration lookup.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn get_config_by_key(&self, key: &str) -> StoreResult<Option<String>>;
}

/// The set of collaborators a relay session talks to.
#[derive(Clone)]
pub struct Stores {
    pub calls: Arc<dyn CallRecordStore>,
    pub agents: Arc<dyn AgentStore>,
    pub settings: Arc<dyn ConfigStore>,
}

impl Stores {
    /// Use one backend for all three collaborator roles.
    pub fn from_backend<S>(backend: Arc<S>) -> Self
    where
        S: CallRecordStore + AgentStore + ConfigStore + 'static,
    {
        Self {
            calls: backend.clone(),
            agents: backend.clone(),
            settings: backend,
        }
    }
}

impl std::fmt::Debug for Stores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stores").finish_non_exhaustive()
    }
}
