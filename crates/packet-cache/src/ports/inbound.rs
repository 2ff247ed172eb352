//! Inbound Ports (Driving Ports)
//!
//! The API that transports and the node runtime use to drive the cache.

use crate::domain::{ChannelKey, DataPacket, ServiceState};
use crate::error::CacheError;
use crate::events::{CacheRequest, CacheResponse, Encoding, ReturnCode};

/// What ingest did with a packet
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Stored as a new entry
    Stored,
    /// Replaced the entry with the same start time
    Replaced,
    /// Stored after the channel's oldest packet was evicted
    StoredWithEviction { evicted_start_time: i64 },
    /// Discarded: the channel's buffer is full and the packet is older
    /// than everything retained
    DroppedTooOld,
}

/// Result of a successful ingest
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IngestReport {
    pub outcome: IngestOutcome,
    /// Unrelated channel evicted to make room for this packet's channel
    pub evicted_channel: Option<ChannelKey>,
}

/// Point-in-time view of the cache
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheStats {
    pub state: ServiceState,
    pub channels: usize,
    pub total_packets: usize,
    pub max_channels: usize,
    pub max_packets_per_channel: usize,
}

/// Primary packet cache API (Driving Port)
pub trait PacketCacheApi: Send + Sync {
    /// `Stopped -> Starting -> Running`
    fn start(&self) -> Result<(), CacheError>;

    /// `Running -> Stopping -> Stopped`, discarding all cached packets
    fn stop(&self) -> Result<(), CacheError>;

    fn state(&self) -> ServiceState;

    /// Validate a packet's channel and route it to the cache
    ///
    /// May evict an unrelated channel; that is reported in the
    /// [`IngestReport`] and metrics, never as an error.
    fn ingest(&self, packet: DataPacket) -> Result<IngestReport, CacheError>;

    /// Decode a packet from the wire and ingest it
    fn ingest_bytes(&self, bytes: &[u8], encoding: Encoding) -> Result<IngestReport, CacheError>;

    /// Dispatch a typed request; failures come back as return codes
    fn handle_request(&self, request: CacheRequest) -> CacheResponse;

    /// Decode, dispatch and encode in one step
    fn handle_message(&self, bytes: &[u8], encoding: Encoding) -> Vec<u8>;

    /// Encode a failure decided before dispatch, such as an unauthorized
    /// peer, and count it with the other failed requests
    fn refuse(
        &self,
        identifier: u64,
        code: ReturnCode,
        reason: &str,
        encoding: Encoding,
    ) -> Vec<u8>;

    fn stats(&self) -> CacheStats;
}
