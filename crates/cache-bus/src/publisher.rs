//! # Frame Publisher
//!
//! Defines the publishing side of the frame bus.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::frames::{Frame, FrameFilter};
use crate::subscriber::Subscription;
use crate::DEFAULT_CHANNEL_CAPACITY;

/// Trait for publishing frames to the bus.
#[async_trait]
pub trait FramePublisher: Send + Sync {
    /// Publish a frame.
    ///
    /// # Returns
    ///
    /// The number of active subscribers that received the frame.
    async fn publish(&self, frame: Frame) -> usize;

    /// Get the total number of frames published.
    fn frames_published(&self) -> u64;
}

/// In-memory frame bus.
///
/// Uses `tokio::sync::broadcast` for multi-producer, multi-consumer
/// semantics. Stands in for a pub-sub socket in single-process deployments
/// and tests.
pub struct InMemoryFrameBus {
    /// Broadcast sender for frames.
    sender: broadcast::Sender<Frame>,

    /// Active subscription count by topic set.
    subscriptions: Arc<RwLock<HashMap<String, usize>>>,

    /// Total frames published.
    frames_published: AtomicU64,

    /// Channel capacity.
    capacity: usize,
}

impl InMemoryFrameBus {
    /// Create a bus with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a bus that buffers up to `capacity` frames per subscriber.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            subscriptions: Arc::new(RwLock::new(HashMap::new())),
            frames_published: AtomicU64::new(0),
            capacity,
        }
    }

    /// Subscribe to frames matching a filter.
    #[must_use]
    pub fn subscribe(&self, filter: FrameFilter) -> Subscription {
        let receiver = self.sender.subscribe();
        let topic_key = filter.topics.join(",");

        *self
            .subscriptions
            .write()
            .entry(topic_key.clone())
            .or_insert(0) += 1;

        debug!(topics = ?filter.topics, "New subscription created");

        Subscription::new(receiver, filter, Arc::clone(&self.subscriptions), topic_key)
    }

    /// Get the number of active receivers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Get the number of tracked subscriptions for a topic set.
    #[must_use]
    pub fn subscriptions_for(&self, filter: &FrameFilter) -> usize {
        self.subscriptions
            .read()
            .get(&filter.topics.join(","))
            .copied()
            .unwrap_or(0)
    }

    /// Get the channel capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for InMemoryFrameBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FramePublisher for InMemoryFrameBus {
    async fn publish(&self, frame: Frame) -> usize {
        let id = frame.id;
        let topic = frame.topic.clone();

        self.frames_published.fetch_add(1, Ordering::Relaxed);

        match self.sender.send(frame) {
            Ok(receivers) => {
                debug!(%id, topic = %topic, receivers, "Frame published");
                receivers
            }
            Err(_) => {
                warn!(%id, topic = %topic, "Frame dropped (no receivers)");
                0
            }
        }
    }

    fn frames_published(&self) -> u64 {
        self.frames_published.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use packet_cache::Encoding;

    fn frame() -> Frame {
        Frame::data_packet(Encoding::Binary, vec![1u8, 0, 42])
    }

    #[tokio::test]
    async fn test_publish_no_subscribers() {
        let bus = InMemoryFrameBus::new();
        assert_eq!(bus.publish(frame()).await, 0);
        assert_eq!(bus.frames_published(), 1);
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let bus = InMemoryFrameBus::new();
        let _a = bus.subscribe(FrameFilter::all());
        let _b = bus.subscribe(FrameFilter::all());
        let _c = bus.subscribe(FrameFilter::topics(["heartbeat"]));

        assert_eq!(bus.publish(frame()).await, 3);
        assert_eq!(bus.subscriber_count(), 3);
        assert_eq!(bus.subscriptions_for(&FrameFilter::all()), 2);
    }

    #[test]
    fn test_default_bus() {
        let bus = InMemoryFrameBus::default();
        assert_eq!(bus.capacity(), DEFAULT_CHANNEL_CAPACITY);
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(bus.frames_published(), 0);
    }
}
