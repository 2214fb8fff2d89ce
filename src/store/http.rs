//! REST client for a CRUD backend that owns call, agent, and config records.
//!
//! # Endpoints
//!
//! - `GET   {base}/call-log?call_sid={sid}` - records for an external call id
//! - `PATCH {base}/call-log/{id}` - update by persisted id
//! - `PATCH {base}/call-log/call-sid/{sid}` - update by external call id
//! - `GET   {base}/agent/{id}` - agent script (404 means not found)
//! - `GET   {base}/system-config/{key}` - `{key, value}` (404 means not found)

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::{
    Agent, AgentStore, CallRecord, CallRecordStore, CallRecordUpdate, ConfigStore, StoreError,
    StoreResult,
};

#[derive(Debug, Deserialize)]
struct ConfigEntry {
    value: String,
}

/// Store backed by a REST API.
#[derive(Debug, Clone)]
pub struct HttpStore {
    client: Client,
    base_url: Url,
}

impl HttpStore {
    pub fn new(base_url: &str, timeout: Duration) -> StoreResult<Self> {
        let base_url = Url::parse(base_url).map_err(|e| {
            StoreError::InvalidConfiguration(format!("Invalid store URL '{base_url}': {e}"))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(StoreError::InvalidConfiguration(format!(
                "Store URL '{base_url}' cannot be used as a base"
            )));
        }

        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| {
                StoreError::InvalidConfiguration(format!("Failed to create HTTP client: {e}"))
            })?;

        Ok(Self { client, base_url })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> StoreResult<T> {
        let endpoint = response.url().path().to_string();
        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::UnexpectedStatus {
                status: status.as_u16(),
                endpoint,
            });
        }
        response
            .json::<T>()
            .await
            .map_err(|e| StoreError::InvalidResponse(format!("{endpoint}: {e}")))
    }

    async fn get_optional<T: DeserializeOwned>(&self, url: Url) -> StoreResult<Option<T>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| StoreError::RequestFailed(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Self::decode(response).await.map(Some)
    }

    async fn patch(&self, url: Url, update: &CallRecordUpdate) -> StoreResult<CallRecord> {
        let response = self
            .client
            .patch(url)
            .json(update)
            .send()
            .await
            .map_err(|e| StoreError::RequestFailed(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(response.url().path().to_string()));
        }
        Self::decode(response).await
    }
}

#[async_trait]
impl CallRecordStore for HttpStore {
    async fn find_by_call_sid(&self, call_sid: &str) -> StoreResult<Vec<CallRecord>> {
        let mut url = self.endpoint(&["call-log"]);
        url.query_pairs_mut().append_pair("call_sid", call_sid);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| StoreError::RequestFailed(e.to_string()))?;
        Self::decode(response).await
    }

    async fn update(&self, id: i64, update: CallRecordUpdate) -> StoreResult<CallRecord> {
        let id = id.to_string();
        self.patch(self.endpoint(&["call-log", &id]), &update).await
    }

    async fn update_by_call_sid(
        &self,
        call_sid: &str,
        update: CallRecordUpdate,
    ) -> StoreResult<CallRecord> {
        self.patch(self.endpoint(&["call-log", "call-sid", call_sid]), &update)
            .await
    }
}

#[async_trait]
impl AgentStore for HttpStore {
    async fn find_one(&self, id: i64) -> StoreResult<Option<Agent>> {
        let id = id.to_string();
        self.get_optional(self.endpoint(&["agent", &id])).await
    }
}

#[async_trait]
impl ConfigStore for HttpStore {
    async fn get_config_by_key(&self, key: &str) -> StoreResult<Option<String>> {
        let entry: Option<ConfigEntry> = self
            .get_optional(self.endpoint(&["system-config", key]))
            .await?;
        Ok(entry.map(|e| e.value))
    }
}
