//! # Frames
//!
//! The unit the bus carries: an opaque, already-encoded payload tagged with
//! a topic and the encoding a consumer should decode it with.

use std::sync::Arc;

use packet_cache::Encoding;
use uuid::Uuid;

/// Topic the ingest side publishes data packets on.
pub const DATA_PACKET_TOPIC: &str = "broadcast.data_packets";

/// One published message.
#[derive(Clone, Debug)]
pub struct Frame {
    /// Unique id, for tracing a frame through logs.
    pub id: Uuid,
    /// Topic the frame was published on.
    pub topic: String,
    /// How the payload is encoded.
    pub encoding: Encoding,
    /// Encoded message body, shared between subscribers.
    pub payload: Arc<[u8]>,
}

impl Frame {
    /// Create a frame with a fresh id.
    #[must_use]
    pub fn new(topic: impl Into<String>, encoding: Encoding, payload: impl Into<Arc<[u8]>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            topic: topic.into(),
            encoding,
            payload: payload.into(),
        }
    }

    /// A data packet frame on [`DATA_PACKET_TOPIC`].
    #[must_use]
    pub fn data_packet(encoding: Encoding, payload: impl Into<Arc<[u8]>>) -> Self {
        Self::new(DATA_PACKET_TOPIC, encoding, payload)
    }
}

/// Filter for subscribing to frames.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameFilter {
    /// Topics to include. Empty means all topics.
    pub topics: Vec<String>,
}

impl FrameFilter {
    /// Accept every frame.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Accept frames on the given topics.
    #[must_use]
    pub fn topics<I, S>(topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            topics: topics.into_iter().map(Into::into).collect(),
        }
    }

    /// Check if a frame matches this filter.
    #[must_use]
    pub fn matches(&self, frame: &Frame) -> bool {
        self.topics.is_empty() || self.topics.iter().any(|t| *t == frame.topic)
    }
}
