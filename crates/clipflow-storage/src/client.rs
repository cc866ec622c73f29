//! S3-compatible object store client.

use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use async_trait::async_trait;
use tracing::debug;

use crate::error::{StorageError, StorageResult};
use crate::sink::MultipartSink;
use crate::store::{ObjectSink, ObjectStore};

/// Configuration for the object store client.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// S3 API endpoint URL
    pub endpoint_url: String,
    /// Access key ID
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Region (usually "auto" for S3-compatible stores)
    pub region: String,
    /// Base URL under which committed objects are publicly retrievable,
    /// joined as `{base}/{bucket}/{key}`
    pub public_url_base: String,
}

impl StorageConfig {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        let endpoint_url = std::env::var("STORAGE_ENDPOINT_URL")
            .map_err(|_| StorageError::config_error("STORAGE_ENDPOINT_URL not set"))?;

        Ok(Self {
            access_key_id: std::env::var("STORAGE_ACCESS_KEY_ID")
                .map_err(|_| StorageError::config_error("STORAGE_ACCESS_KEY_ID not set"))?,
            secret_access_key: std::env::var("STORAGE_SECRET_ACCESS_KEY")
                .map_err(|_| StorageError::config_error("STORAGE_SECRET_ACCESS_KEY not set"))?,
            region: std::env::var("STORAGE_REGION").unwrap_or_else(|_| "auto".to_string()),
            public_url_base: std::env::var("STORAGE_PUBLIC_URL_BASE")
                .unwrap_or_else(|_| endpoint_url.clone())
                .trim_end_matches('/')
                .to_string(),
            endpoint_url,
        })
    }
}

/// Object store client over any S3-compatible endpoint.
#[derive(Clone)]
pub struct S3Store {
    client: Client,
    public_url_base: String,
}

impl S3Store {
    /// Create a new store client from configuration.
    pub fn new(config: StorageConfig) -> Self {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "clipflow",
        );

        let sdk_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint_url)
            .region(Region::new(config.region))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(sdk_config),
            public_url_base: config.public_url_base,
        }
    }

    /// Create from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self::new(StorageConfig::from_env()?))
    }

    pub(crate) fn inner(&self) -> &Client {
        &self.client
    }

    /// Single-request put, used by sinks whose content fit in one part.
    pub(crate) async fn upload_single(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<()> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn open_sink(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
    ) -> StorageResult<Box<dyn ObjectSink>> {
        debug!(bucket, key, "Opening streaming sink");
        Ok(Box::new(MultipartSink::new(
            self.clone(),
            bucket,
            key,
            content_type,
            self.public_url(bucket, key),
        )))
    }

    async fn upload_bytes(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<String> {
        debug!(bucket, key, bytes = data.len(), "Uploading object");

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        Ok(self.public_url(bucket, key))
    }

    async fn download_bytes(&self, bucket: &str, key: &str) -> StorageResult<Vec<u8>> {
        debug!(bucket, key, "Downloading object");

        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.to_string().contains("NoSuchKey") {
                    StorageError::not_found(key)
                } else {
                    StorageError::download_failed(e.to_string())
                }
            })?;

        let bytes = response
            .body
            .collect()
            .await
            .map_err(|e| StorageError::download_failed(e.to_string()))?
            .into_bytes()
            .to_vec();

        Ok(bytes)
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        format!("{}/{}/{}", self.public_url_base, bucket, key)
    }
}
