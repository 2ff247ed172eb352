//! # Cache Node
//!
//! Runtime wiring for the packet cache. The binary in `main.rs` is a thin
//! shell around [`CacheNode`]; everything here is exposed for tests and for
//! embedding the cache in another process.
//!
//! ## Startup Sequence
//!
//! 1. Install telemetry (`cache-telemetry`)
//! 2. Load [`NodeConfig`] from `UMPS_CACHE_CONFIG` and the environment
//! 3. Build the service, handler, frame bus and reply endpoint
//! 4. Start the service and spawn the ingest and reply loops
//! 5. Wait for Ctrl+C, then shut down gracefully

pub mod client;
pub mod config;
pub mod runtime;

pub use client::{CacheClient, ClientError};
pub use config::{BusConfig, NodeConfig, NodeConfigError, SecurityConfig};
pub use runtime::{CacheNode, NodeError};
