//! The opaque transformation step.
//!
//! The pipeline only needs "bytes in, bytes or error out"; what happens in
//! between is deliberately pluggable. [`PassthroughTransformer`] is the
//! default, [`CommandTransformer`] pipes the clip through an external
//! program (an ffmpeg remux, typically) when `TRANSFORM_COMMAND` is set.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::error::{ProcessError, ProcessResult};

/// Transforms a raw clip into its processed form.
#[async_trait]
pub trait ClipTransformer: Send + Sync {
    async fn transform(&self, raw: Vec<u8>) -> ProcessResult<Vec<u8>>;
}

/// Identity transformation.
pub struct PassthroughTransformer;

#[async_trait]
impl ClipTransformer for PassthroughTransformer {
    async fn transform(&self, raw: Vec<u8>) -> ProcessResult<Vec<u8>> {
        Ok(raw)
    }
}

/// Pipes the raw clip through an external command via stdin/stdout.
#[derive(Debug)]
pub struct CommandTransformer {
    program: String,
    args: Vec<String>,
}

impl CommandTransformer {
    /// Parse a whitespace-separated command line.
    pub fn new(command_line: &str) -> ProcessResult<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| ProcessError::config_error("TRANSFORM_COMMAND is empty"))?;

        Ok(Self {
            program,
            args: parts.collect(),
        })
    }
}

#[async_trait]
impl ClipTransformer for CommandTransformer {
    async fn transform(&self, raw: Vec<u8>) -> ProcessResult<Vec<u8>> {
        debug!(program = %self.program, bytes_in = raw.len(), "Running transform command");

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ProcessError::transform(format!("spawn {}: {}", self.program, e)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| ProcessError::transform("child stdin unavailable"))?;

        // Feed stdin from a separate task so a command that writes output
        // before draining its input cannot deadlock against us.
        let writer = tokio::spawn(async move {
            stdin.write_all(&raw).await?;
            stdin.shutdown().await
        });

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| ProcessError::transform(format!("wait for {}: {}", self.program, e)))?;

        match writer.await {
            Ok(Ok(())) => {}
            // A command may legitimately close stdin early once it has
            // read enough; only report it if the command itself failed.
            Ok(Err(e)) if output.status.success() => {
                debug!(error = %e, "Transform command closed stdin early");
            }
            Ok(Err(e)) => {
                return Err(ProcessError::transform(format!("write to command: {}", e)));
            }
            Err(e) => return Err(ProcessError::transform(format!("stdin writer: {}", e))),
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProcessError::transform(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        debug!(bytes_out = output.stdout.len(), "Transform command finished");
        Ok(output.stdout)
    }
}
