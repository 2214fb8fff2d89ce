use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Deserialize;

use super::{
    Agent, AgentStore, CallRecord, CallRecordStore, CallRecordUpdate, ConfigStore, StoreError,
    StoreResult,
};

/// Seed data for [`MemoryStore`].
///
/// # Example YAML
/// ```yaml
/// config:
///   openai_api_key: "sk-..."
/// agents:
///   - id: 1
///     prompt: "Be polite."
/// calls:
///   - id: 7
///     name: "Jane"
///     number: "+15550100"
///     agent: 1
///     call_sid: "CA1"
///     status: "pending"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreSeed {
    pub config: HashMap<String, String>,
    pub agents: Vec<Agent>,
    pub calls: Vec<CallRecord>,
}

/// In-process store backing all three collaborator roles.
///
/// Suitable for development and tests. Nothing is persisted across restarts.
#[derive(Debug, Default)]
pub struct MemoryStore {
    calls: RwLock<HashMap<i64, CallRecord>>,
    agents: RwLock<HashMap<i64, Agent>>,
    config: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_seed(seed: StoreSeed) -> Self {
        Self {
            calls: RwLock::new(seed.calls.into_iter().map(|c| (c.id, c)).collect()),
            agents: RwLock::new(seed.agents.into_iter().map(|a| (a.id, a)).collect()),
            config: RwLock::new(seed.config),
        }
    }

    /// Load seed data from a YAML file.
    pub fn from_seed_file(path: &Path) -> StoreResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            StoreError::InvalidConfiguration(format!(
                "Failed to read seed file {}: {e}",
                path.display()
            ))
        })?;

        let seed: StoreSeed = serde_yaml::from_str(&contents).map_err(|e| {
            StoreError::InvalidConfiguration(format!("Failed to parse seed YAML: {e}"))
        })?;

        tracing::info!(
            calls = seed.calls.len(),
            agents = seed.agents.len(),
            "Loaded store seed from {}",
            path.display()
        );

        Ok(Self::from_seed(seed))
    }

    pub fn insert_call(&self, record: CallRecord) {
        self.calls.write().insert(record.id, record);
    }

    pub fn insert_agent(&self, agent: Agent) {
        self.agents.write().insert(agent.id, agent);
    }

    pub fn set_config(&self, key: impl Into<String>, value: impl Into<String>) {
        self.config.write().insert(key.into(), value.into());
    }

    /// Current copy of a call record.
    pub fn call(&self, id: i64) -> Option<CallRecord> {
        self.calls.read().get(&id).cloned()
    }
}

#[async_trait]
impl CallRecordStore for MemoryStore {
    async fn find_by_call_sid(&self, call_sid: &str) -> StoreResult<Vec<CallRecord>> {
        let mut matches: Vec<CallRecord> = self
            .calls
            .read()
            .values()
            .filter(|c| c.call_sid.as_deref() == Some(call_sid))
            .cloned()
            .collect();
        matches.sort_by_key(|c| c.id);
        Ok(matches)
    }

    async fn update(&self, id: i64, update: CallRecordUpdate) -> StoreResult<CallRecord> {
        let mut calls = self.calls.write();
        let record = calls
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("call record {id}")))?;
        update.apply(record);
        Ok(record.clone())
    }

    async fn update_by_call_sid(
        &self,
        call_sid: &str,
        update: CallRecordUpdate,
    ) -> StoreResult<CallRecord> {
        let mut calls = self.calls.write();
        let record = calls
            .values_mut()
            .filter(|c| c.call_sid.as_deref() == Some(call_sid))
            .min_by_key(|c| c.id)
            .ok_or_else(|| StoreError::NotFound(format!("call record with call_sid {call_sid}")))?;
        update.apply(record);
        Ok(record.clone())
    }
}

#[async_trait]
impl AgentStore for MemoryStore {
    async fn find_one(&self, id: i64) -> StoreResult<Option<Agent>> {
        Ok(self.agents.read().get(&id).cloned())
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn get_config_by_key(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.config.read().get(key).cloned())
    }
}
