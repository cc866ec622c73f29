//! Clip registry REST client.
//!
//! Speaks the registry's PostgREST-style HTTP API. Every mutation after
//! insert is a single-row conditional update filtered on the expected
//! prior status, so concurrent callers serialize on the registry rather
//! than on any in-process lock. `Prefer: return=representation` makes the
//! affected rows visible to the caller; an empty representation on a
//! conditional update means the filter matched nothing.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use metrics::counter;
use reqwest::{Client, Response};
use serde_json::json;
use tracing::{debug, info};

use clipflow_models::{ClipId, ClipRecord, ClipStatus, NewClip};

use crate::error::{RegistryError, RegistryResult};

/// Registry client configuration.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Registry base URL (without the `/rest/v1` suffix)
    pub url: String,
    /// Service role key, sent as both `apikey` and bearer token
    pub service_key: String,
    /// Table holding clip rows
    pub table: String,
    /// Request timeout
    pub timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
}

impl RegistryConfig {
    /// Create config from environment variables.
    ///
    /// `REGISTRY_URL` and `REGISTRY_SERVICE_KEY` are required; the table
    /// name defaults to `clips`.
    pub fn from_env() -> RegistryResult<Self> {
        let url = std::env::var("REGISTRY_URL")
            .map_err(|_| RegistryError::config_error("REGISTRY_URL not set"))?;
        let service_key = std::env::var("REGISTRY_SERVICE_KEY")
            .map_err(|_| RegistryError::config_error("REGISTRY_SERVICE_KEY not set"))?;

        if service_key.is_empty() {
            return Err(RegistryError::config_error(
                "REGISTRY_SERVICE_KEY cannot be empty",
            ));
        }

        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
            service_key,
            table: std::env::var("REGISTRY_TABLE").unwrap_or_else(|_| "clips".to_string()),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
        })
    }
}

/// The registry capability used by the gateway and the orchestrator.
///
/// `claim` is the serialization point of the whole pipeline: it performs
/// the atomic `PENDING -> PROCESSING` compare-and-set and reports whether
/// this caller won it.
#[async_trait]
pub trait ClipRegistry: Send + Sync {
    /// Insert a freshly ingested clip in `PENDING` state.
    async fn insert_pending(&self, new: NewClip) -> RegistryResult<ClipRecord>;

    /// Atomically transition `id` from `PENDING` to `PROCESSING`.
    ///
    /// Returns the claimed record, or `None` if another instance already
    /// claimed it (or it no longer exists). A miss is not an error.
    async fn claim(&self, id: &ClipId) -> RegistryResult<Option<ClipRecord>>;

    /// Finalize a claimed clip as `READY`, setting the processed locator.
    ///
    /// Conditional on the row still being `PROCESSING`; affecting zero
    /// rows is a precondition failure.
    async fn mark_ready(&self, id: &ClipId, processed_url: &str) -> RegistryResult<()>;

    /// Finalize a claimed clip as `FAILED`.
    async fn mark_failed(&self, id: &ClipId) -> RegistryResult<()>;

    /// Read a clip by id.
    async fn fetch(&self, id: &ClipId) -> RegistryResult<Option<ClipRecord>>;

    /// Reset `PROCESSING` rows not updated for `older_than` back to
    /// `PENDING`, returning the ids that were reset.
    async fn reset_stale(&self, older_than: Duration) -> RegistryResult<Vec<ClipId>>;
}

/// Production registry client over the REST API.
#[derive(Clone)]
pub struct RestRegistry {
    http: Client,
    config: RegistryConfig,
    rows_url: String,
}

impl RestRegistry {
    /// Create a new registry client.
    pub fn new(config: RegistryConfig) -> RegistryResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .user_agent(concat!("clipflow-registry/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let rows_url = format!("{}/rest/v1/{}", config.url, config.table);

        Ok(Self {
            http,
            config,
            rows_url,
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> RegistryResult<Self> {
        Self::new(RegistryConfig::from_env()?)
    }

    /// Table this client operates on.
    pub fn table(&self) -> &str {
        &self.config.table
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("apikey", &self.config.service_key)
            .bearer_auth(&self.config.service_key)
    }

    async fn read_rows(&self, response: Response) -> RegistryResult<Vec<ClipRecord>> {
        let status = response.status();
        if status.is_success() {
            Ok(response.json().await?)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(RegistryError::from_http_status(status.as_u16(), body))
        }
    }

    /// Single-row conditional update: patch `fields` into the row with
    /// `id`, only if its current status equals `expected`. Returns the
    /// affected rows (empty when the condition did not hold).
    async fn conditional_update(
        &self,
        id: &ClipId,
        expected: ClipStatus,
        fields: serde_json::Value,
    ) -> RegistryResult<Vec<ClipRecord>> {
        let url = format!(
            "{}?id=eq.{}&status=eq.{}",
            self.rows_url,
            urlencoding::encode(id.as_str()),
            expected.as_str()
        );

        let response = self
            .authed(self.http.patch(&url))
            .header("Prefer", "return=representation")
            .json(&fields)
            .send()
            .await?;

        self.read_rows(response).await
    }
}

#[async_trait]
impl ClipRegistry for RestRegistry {
    async fn insert_pending(&self, new: NewClip) -> RegistryResult<ClipRecord> {
        let response = self
            .authed(self.http.post(&self.rows_url))
            .header("Prefer", "return=representation")
            .json(&[&new])
            .send()
            .await?;

        let mut rows = self.read_rows(response).await?;
        let record = rows.pop().ok_or_else(|| {
            RegistryError::Http {
                status: 200,
                body: "insert returned no representation".to_string(),
            }
        })?;

        counter!("registry_clips_inserted_total").increment(1);
        info!(clip_id = %record.id, filename = %record.filename, "Registered clip as PENDING");
        Ok(record)
    }

    async fn claim(&self, id: &ClipId) -> RegistryResult<Option<ClipRecord>> {
        let mut rows = self
            .conditional_update(
                id,
                ClipStatus::Pending,
                json!({
                    "status": ClipStatus::Processing,
                    "updated_at": Utc::now(),
                }),
            )
            .await?;

        match rows.pop() {
            Some(record) => {
                counter!("registry_claims_won_total").increment(1);
                debug!(clip_id = %id, "Claimed clip for processing");
                Ok(Some(record))
            }
            None => {
                counter!("registry_claims_missed_total").increment(1);
                debug!(clip_id = %id, "Claim miss: clip no longer PENDING");
                Ok(None)
            }
        }
    }

    async fn mark_ready(&self, id: &ClipId, processed_url: &str) -> RegistryResult<()> {
        let rows = self
            .conditional_update(
                id,
                ClipStatus::Processing,
                json!({
                    "status": ClipStatus::Ready,
                    "processed_clip_url": processed_url,
                    "updated_at": Utc::now(),
                }),
            )
            .await?;

        if rows.is_empty() {
            return Err(RegistryError::precondition_failed(format!(
                "clip {} was not PROCESSING when finalizing READY",
                id
            )));
        }

        counter!("registry_clips_ready_total").increment(1);
        info!(clip_id = %id, "Clip finalized as READY");
        Ok(())
    }

    async fn mark_failed(&self, id: &ClipId) -> RegistryResult<()> {
        let rows = self
            .conditional_update(
                id,
                ClipStatus::Processing,
                json!({
                    "status": ClipStatus::Failed,
                    "updated_at": Utc::now(),
                }),
            )
            .await?;

        if rows.is_empty() {
            return Err(RegistryError::precondition_failed(format!(
                "clip {} was not PROCESSING when finalizing FAILED",
                id
            )));
        }

        counter!("registry_clips_failed_total").increment(1);
        info!(clip_id = %id, "Clip finalized as FAILED");
        Ok(())
    }

    async fn fetch(&self, id: &ClipId) -> RegistryResult<Option<ClipRecord>> {
        let url = format!(
            "{}?id=eq.{}&limit=1",
            self.rows_url,
            urlencoding::encode(id.as_str())
        );

        let response = self.authed(self.http.get(&url)).send().await?;
        let mut rows = self.read_rows(response).await?;
        Ok(rows.pop())
    }

    async fn reset_stale(&self, older_than: Duration) -> RegistryResult<Vec<ClipId>> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(older_than)
                .map_err(|e| RegistryError::config_error(format!("bad stale window: {}", e)))?;

        let url = format!(
            "{}?status=eq.{}&updated_at=lt.{}",
            self.rows_url,
            ClipStatus::Processing.as_str(),
            urlencoding::encode(&cutoff.to_rfc3339())
        );

        let response = self
            .authed(self.http.patch(&url))
            .header("Prefer", "return=representation")
            .json(&json!({
                "status": ClipStatus::Pending,
                "updated_at": Utc::now(),
            }))
            .send()
            .await?;

        let rows = self.read_rows(response).await?;
        let ids: Vec<ClipId> = rows.into_iter().map(|r| r.id).collect();

        if !ids.is_empty() {
            counter!("registry_stale_resets_total").increment(ids.len() as u64);
            info!(count = ids.len(), "Reset stale PROCESSING clips to PENDING");
        }
        Ok(ids)
    }
}
