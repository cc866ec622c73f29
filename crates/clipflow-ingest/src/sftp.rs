//! SFTP server fronting the ingestion gateway.
//!
//! One configured username/password pair is accepted; the username doubles
//! as the uploader id. Each session is an upload-only SFTP endpoint: opens
//! with write intent become [`ClipUpload`]s, reads and directory listings
//! are refused. A dropped connection aborts every upload still open on it.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use russh::server::{Auth, Msg, Server, Session};
use russh::{Channel, ChannelId};
use russh_keys::key::KeyPair;
use russh_sftp::protocol::{
    File, FileAttributes, Handle, Name, OpenFlags, Status, StatusCode, Version,
};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use clipflow_registry::ClipRegistry;
use clipflow_storage::ObjectStore;

use crate::config::IngestConfig;
use crate::error::{IngestError, IngestResult};
use crate::upload::ClipUpload;

/// Shared dependencies handed to every session.
pub struct GatewayContext {
    pub config: IngestConfig,
    pub store: Arc<dyn ObjectStore>,
    pub registry: Arc<dyn ClipRegistry>,
}

/// The SFTP ingestion gateway.
pub struct SftpGateway {
    ctx: Arc<GatewayContext>,
}

impl SftpGateway {
    pub fn new(
        config: IngestConfig,
        store: Arc<dyn ObjectStore>,
        registry: Arc<dyn ClipRegistry>,
    ) -> Self {
        Self {
            ctx: Arc::new(GatewayContext {
                config,
                store,
                registry,
            }),
        }
    }

    fn host_key(&self) -> IngestResult<KeyPair> {
        match &self.ctx.config.host_key_path {
            Some(path) => {
                info!(path = %path.display(), "Loading SFTP host key");
                Ok(russh_keys::load_secret_key(path, None)?)
            }
            None => {
                warn!("SFTP_HOST_KEY_PATH not set; generating ephemeral host key");
                KeyPair::generate_ed25519()
                    .ok_or_else(|| IngestError::config_error("failed to generate host key"))
            }
        }
    }

    /// Bind and serve until the process is stopped.
    pub async fn run(mut self) -> IngestResult<()> {
        let key = self.host_key()?;

        let config = russh::server::Config {
            keys: vec![key],
            auth_rejection_time: Duration::from_secs(3),
            auth_rejection_time_initial: Some(Duration::ZERO),
            inactivity_timeout: Some(Duration::from_secs(3600)),
            ..Default::default()
        };

        let addr = format!("{}:{}", self.ctx.config.host, self.ctx.config.port);
        info!(
            addr = %addr,
            username = %self.ctx.config.username,
            bucket = %self.ctx.config.raw_bucket,
            "SFTP ingestion gateway listening"
        );

        self.run_on_address(Arc::new(config), addr).await?;
        Ok(())
    }
}

impl Server for SftpGateway {
    type Handler = SshSession;

    fn new_client(&mut self, peer: Option<SocketAddr>) -> SshSession {
        debug!(?peer, "New SSH connection");
        SshSession {
            ctx: Arc::clone(&self.ctx),
            channel: None,
            authenticated: false,
        }
    }
}

/// One SSH connection, before and after authentication.
pub struct SshSession {
    ctx: Arc<GatewayContext>,
    channel: Option<Channel<Msg>>,
    authenticated: bool,
}

#[async_trait]
impl russh::server::Handler for SshSession {
    type Error = IngestError;

    async fn auth_password(&mut self, user: &str, password: &str) -> Result<Auth, Self::Error> {
        let config = &self.ctx.config;
        if user == config.username && password == config.password {
            self.authenticated = true;
            info!(uploader_id = %user, "SFTP session authenticated");
            Ok(Auth::Accept)
        } else {
            counter!("ingest_auth_failures_total").increment(1);
            warn!(username = %user, "SFTP authentication rejected");
            Ok(Auth::Reject {
                proceed_with_methods: None,
            })
        }
    }

    async fn channel_open_session(
        &mut self,
        channel: Channel<Msg>,
        _session: &mut Session,
    ) -> Result<bool, Self::Error> {
        self.channel = Some(channel);
        Ok(true)
    }

    async fn subsystem_request(
        &mut self,
        channel_id: ChannelId,
        name: &str,
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        if name != "sftp" || !self.authenticated {
            warn!(subsystem = name, "Rejecting subsystem request");
            session.channel_failure(channel_id);
            return Ok(());
        }

        let channel = match self.channel.take() {
            Some(channel) => channel,
            None => {
                session.channel_failure(channel_id);
                return Ok(());
            }
        };

        let uploads: Arc<Mutex<HashMap<String, ClipUpload>>> = Arc::default();
        let handler = SftpSession {
            ctx: Arc::clone(&self.ctx),
            uploader_id: self.ctx.config.username.clone(),
            uploads: Arc::clone(&uploads),
            version: None,
            next_handle: 0,
        };
        session.channel_success(channel_id);

        tokio::spawn(async move {
            russh_sftp::server::run(channel.into_stream(), handler).await;

            // The connection is gone. Abort anything still open so a
            // half-transferred file never becomes a visible object, and
            // therefore never a registry entry.
            let mut remaining = uploads.lock().await;
            for (_, upload) in remaining.drain() {
                if let Err(e) = upload.abort().await {
                    warn!(error = %e, "Failed to abort upload on disconnect");
                }
            }
        });

        Ok(())
    }
}

fn ok_status(id: u32) -> Status {
    Status {
        id,
        status_code: StatusCode::Ok,
        error_message: "Ok".to_string(),
        language_tag: "en-US".to_string(),
    }
}

/// SFTP protocol handler for one authenticated session.
pub struct SftpSession {
    ctx: Arc<GatewayContext>,
    uploader_id: String,
    uploads: Arc<Mutex<HashMap<String, ClipUpload>>>,
    version: Option<u32>,
    next_handle: u64,
}

impl russh_sftp::server::Handler for SftpSession {
    type Error = StatusCode;

    fn unimplemented(&self) -> Self::Error {
        StatusCode::OpUnsupported
    }

    async fn init(
        &mut self,
        version: u32,
        extensions: HashMap<String, String>,
    ) -> Result<Version, Self::Error> {
        if self.version.is_some() {
            return Err(StatusCode::ConnectionLost);
        }
        self.version = Some(version);
        debug!(version, ?extensions, "SFTP subsystem initialized");
        Ok(Version::new())
    }

    async fn open(
        &mut self,
        id: u32,
        filename: String,
        pflags: OpenFlags,
        _attrs: FileAttributes,
    ) -> Result<Handle, Self::Error> {
        // Upload-only endpoint: no reads, no listings.
        if !pflags.contains(OpenFlags::WRITE) {
            return Err(StatusCode::PermissionDenied);
        }

        let upload = ClipUpload::begin(
            self.ctx.store.as_ref(),
            &self.ctx.config.raw_bucket,
            &self.uploader_id,
            &filename,
        )
        .await
        .map_err(|e| {
            error!(filename = %filename, error = %e, "Failed to open upload sink");
            StatusCode::Failure
        })?;

        self.next_handle += 1;
        let handle = format!("upload-{}", self.next_handle);
        self.uploads.lock().await.insert(handle.clone(), upload);

        Ok(Handle { id, handle })
    }

    async fn write(
        &mut self,
        id: u32,
        handle: String,
        offset: u64,
        data: Vec<u8>,
    ) -> Result<Status, Self::Error> {
        // Take the upload out of the map so no lock is held across the
        // store write.
        let mut upload = self
            .uploads
            .lock()
            .await
            .remove(&handle)
            .ok_or(StatusCode::Failure)?;

        // Awaiting the store write here is the backpressure point: the
        // client is not acknowledged faster than the store absorbs data.
        let written = upload.write(offset, &data).await;

        // A failed write leaves the upload in the map poisoned, so a
        // subsequent close aborts instead of committing.
        self.uploads.lock().await.insert(handle.clone(), upload);

        written.map_err(|e| {
            warn!(handle = %handle, error = %e, "Upload write failed");
            StatusCode::Failure
        })?;

        Ok(ok_status(id))
    }

    async fn close(&mut self, id: u32, handle: String) -> Result<Status, Self::Error> {
        let upload = self
            .uploads
            .lock()
            .await
            .remove(&handle)
            .ok_or(StatusCode::Failure)?;

        // Commit-then-insert; any failure is reported to the client as a
        // failed transfer. Details are logged inside `finish`.
        upload
            .finish(self.ctx.registry.as_ref())
            .await
            .map_err(|_| StatusCode::Failure)?;

        Ok(ok_status(id))
    }

    async fn realpath(&mut self, id: u32, path: String) -> Result<Name, Self::Error> {
        // Clients canonicalize the destination before a put; any path maps
        // into the uploader namespace at open time, so echoing it back is
        // enough.
        Ok(Name {
            id,
            files: vec![File::dummy(&path)],
        })
    }
}
