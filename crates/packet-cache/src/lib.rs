//! # Packet Cache
//!
//! Bounded, per-channel, time-ordered in-memory cache of seismic data packets,
//! fed by an ingest stream and queried with request/response messages.
//!
//! ## Architecture
//!
//! This crate follows Hexagonal Architecture (Ports & Adapters):
//!
//! - **Domain Layer** (`domain/`): Pure cache logic, no I/O
//!   - `DataPacket`: One contiguous run of samples for one channel
//!   - `CircularBuffer`: Fixed-capacity, time-ordered store for one channel
//!   - `CappedCollection`: Channel-keyed registry of buffers with LRU eviction
//!   - `CacheConfig`: Configuration with validation
//!
//! - **Events Layer** (`events/`): Request/response messages and the
//!   binary (bincode) and text (JSON) codecs
//!
//! - **Ports Layer** (`ports/`): Trait definitions
//!   - `PacketCacheApi`: Driving port (inbound API)
//!   - `PeerAuthorizer`: Driven port (authorization policy)
//!
//! - **Service Layer** (`service/`): Lifecycle and dispatch
//!   - `PacketCacheService`: Implements `PacketCacheApi`
//!
//! - **Handler Layer** (`handler/`): Authorization in front of the service
//!
//! ## Invariants
//!
//! - A channel's buffer never holds more than `max_packets_per_channel`
//!   packets, sorted strictly by start time
//! - The collection never holds more than `max_channels` channels
//! - Callers only ever receive copies of packets
//! - A bulk response has one sub-response per sub-request, in order
//!
//! ## Usage Example
//!
//! ```ignore
//! use packet_cache::{CacheConfig, ChannelKey, DataPacket, PacketCacheApi, PacketCacheService};
//! use packet_cache::events::{CacheRequest, SensorRequest};
//!
//! let service = PacketCacheService::without_metrics(CacheConfig::default())?;
//! service.start()?;
//!
//! let key: ChannelKey = "UU.FORK.HHZ.01".parse()?;
//! service.ingest(DataPacket::new(key.clone(), 0, 100.0, vec![0.0; 100])?)?;
//!
//! let response = service.handle_request(CacheRequest::Sensor(SensorRequest::new(1, key, 0, 500_000)));
//! ```

pub mod domain;
pub mod error;
pub mod events;
pub mod handler;
pub mod metrics;
pub mod ports;
pub mod service;

// Re-exports for convenience
pub use domain::{
    CacheConfig, CacheConfigBuilder, CappedCollection, ChannelKey, ChannelKeyRules,
    CircularBuffer, DataPacket, InsertOutcome, ServiceState, TooOldPolicy,
};
pub use error::{BufferError, CacheError, ChannelError, CodecError, ConfigError, PacketError};
pub use events::{CacheRequest, CacheResponse, Encoding, ReturnCode, WireMessage};
pub use handler::PacketCacheHandler;
pub use metrics::{Metrics, MetricsRecorder, MetricsSnapshot, NoOpMetrics};
pub use ports::{
    AllowAll, AllowList, CacheStats, DenyList, IngestOutcome, IngestReport, PacketCacheApi,
    PeerAuthorizer, PeerIdentity,
};
pub use service::PacketCacheService;
