//! Domain layer: pure cache logic, no I/O

pub mod capped_collection;
pub mod channel;
pub mod circular_buffer;
pub mod config;
pub mod packet;
pub mod state;

pub use capped_collection::{AddOutcome, CappedCollection};
pub use channel::{ChannelKey, ChannelKeyRules};
pub use circular_buffer::{CircularBuffer, InsertOutcome};
pub use config::{CacheConfig, CacheConfigBuilder, TooOldPolicy};
pub use packet::{micros_to_seconds, seconds_to_micros, DataPacket};
pub use state::ServiceState;
