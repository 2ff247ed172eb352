//! # Frame Subscriber
//!
//! Defines the subscription side of the frame bus.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::debug;

use crate::frames::{Frame, FrameFilter};

/// Errors from subscription operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The bus was dropped.
    #[error("Frame bus closed")]
    Closed,
}

/// A subscription handle for receiving frames.
///
/// When dropped, the subscription is removed from the bus's tracking.
pub struct Subscription {
    receiver: broadcast::Receiver<Frame>,
    filter: FrameFilter,
    subscriptions: Arc<RwLock<HashMap<String, usize>>>,
    topic_key: String,
}

impl Subscription {
    pub(crate) fn new(
        receiver: broadcast::Receiver<Frame>,
        filter: FrameFilter,
        subscriptions: Arc<RwLock<HashMap<String, usize>>>,
        topic_key: String,
    ) -> Self {
        Self {
            receiver,
            filter,
            subscriptions,
            topic_key,
        }
    }

    /// Receive the next frame that matches the filter.
    ///
    /// Returns `None` once the bus is dropped. Frames lost to lag are
    /// skipped.
    pub async fn recv(&mut self) -> Option<Frame> {
        loop {
            let frame = match self.receiver.recv().await {
                Ok(f) => f,
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    debug!(lagged = count, "Subscriber lagged, some frames dropped");
                    continue;
                }
            };

            if self.filter.matches(&frame) {
                return Some(frame);
            }
        }
    }

    /// Receive the next matching frame without waiting.
    ///
    /// `Ok(None)` means nothing is queued.
    pub fn try_recv(&mut self) -> Result<Option<Frame>, SubscriptionError> {
        loop {
            let frame = match self.receiver.try_recv() {
                Ok(f) => f,
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(SubscriptionError::Closed)
                }
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            };

            if self.filter.matches(&frame) {
                return Ok(Some(frame));
            }
        }
    }

    #[must_use]
    pub fn filter(&self) -> &FrameFilter {
        &self.filter
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let mut subs = self.subscriptions.write();
        if let Some(count) = subs.get_mut(&self.topic_key) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                subs.remove(&self.topic_key);
            }
        }
        debug!(topic = %self.topic_key, "Subscription dropped");
    }
}
