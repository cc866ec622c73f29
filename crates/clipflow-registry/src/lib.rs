//! Clip registry client.
//!
//! A REST client for the relational clip registry, built around single-row
//! conditional updates. The [`ClipRegistry`] trait is the seam the gateway
//! and orchestrator depend on; [`RestRegistry`] is the production
//! implementation.

pub mod client;
pub mod error;


pub use client::{ClipRegistry, RegistryConfig, RestRegistry};
pub use error::{RegistryError, RegistryResult};
