//! SFTP ingestion gateway.
//!
//! Terminates authenticated file-transfer sessions and turns each completed
//! upload into one committed object in the raw bucket plus one `PENDING`
//! clip record, in that order. A failed or interrupted transfer leaves
//! neither behind.

pub mod config;
pub mod error;
pub mod sftp;
pub mod upload;

pub use config::IngestConfig;
pub use error::{IngestError, IngestResult};
pub use sftp::SftpGateway;
pub use upload::ClipUpload;
