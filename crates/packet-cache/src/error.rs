//! Error types for the packet cache

use crate::domain::{ChannelKey, ServiceState};
use thiserror::Error;

/// Errors surfaced by the cache service
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Service is not running (state: {state})")]
    NotRunning { state: ServiceState },

    #[error("Invalid time range: start {start_time} > end {end_time}")]
    InvalidRange { start_time: i64, end_time: i64 },

    #[error("Invalid channel: {0}")]
    InvalidChannel(#[from] ChannelError),

    #[error("Invalid packet: {0}")]
    InvalidPacket(#[from] PacketError),

    #[error("Packet for {channel} at {start_time} predates retained window starting at {oldest_retained}")]
    PacketTooOld {
        channel: ChannelKey,
        start_time: i64,
        oldest_retained: i64,
    },

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition { from: ServiceState, to: ServiceState },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Channel key validation failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChannelError {
    #[error("{field} code is empty")]
    Empty { field: &'static str },

    #[error("{field} code exceeds {max} characters: {len}")]
    TooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("{field} code contains illegal character {found:?}")]
    IllegalCharacter { field: &'static str, found: char },

    #[error("Malformed channel name {0:?} (expected NET.STA.CHA.LOC)")]
    MalformedName(String),
}

/// Data packet construction failures
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PacketError {
    #[error("Packet has no samples")]
    NoSamples,

    #[error("Sampling rate must be finite and positive: {0}")]
    InvalidSamplingRate(f64),

    #[error("Sample {index} is not finite")]
    NonFiniteSample { index: usize },

    #[error("Packet end time overflows the timestamp range")]
    TimeOverflow,
}

/// Raised when a packet is routed to a buffer that owns a different channel
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BufferError {
    #[error("Packet for {found} routed to buffer for {expected}")]
    ChannelMismatch {
        expected: ChannelKey,
        found: ChannelKey,
    },
}

/// Wire encoding failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("Empty message")]
    EmptyMessage,

    #[error("Message truncated before protocol header")]
    Truncated,

    #[error("Unsupported protocol version {found} (expected {expected})")]
    UnsupportedVersion { found: u16, expected: u16 },

    #[error("Binary codec error: {0}")]
    Binary(String),

    #[error("Text codec error: {0}")]
    Text(String),
}

/// Cache configuration failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("max_packets_per_channel must be at least 1")]
    ZeroPacketCapacity,

    #[error("max_channels must be at least 1")]
    ZeroChannelCapacity,

    #[error("Invalid channel rules: {0}")]
    InvalidRules(String),
}

impl From<bincode::Error> for CodecError {
    fn from(e: bincode::Error) -> Self {
        CodecError::Binary(e.to_string())
    }
}

impl From<serde_json::Error> for CodecError {
    fn from(e: serde_json::Error) -> Self {
        CodecError::Text(e.to_string())
    }
}
