//! # Request/Reply
//!
//! A router-style endpoint pair: any number of cloned [`Requestor`]s send
//! encoded requests, one [`ReplyEndpoint`] receives them and answers each
//! through its own reply slot. Timeouts are enforced on the requesting side.

use std::time::Duration;

use packet_cache::{Encoding, PeerIdentity};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// Errors from request/reply operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    /// The reply endpoint was dropped.
    #[error("Reply endpoint closed")]
    Closed,

    /// No reply arrived in time.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The endpoint dropped the request without replying.
    #[error("Request dropped without a reply")]
    NoReply,
}

/// A request waiting for an answer.
#[derive(Debug)]
pub struct PendingRequest {
    /// Identity of the sender, as established by the transport.
    pub peer: PeerIdentity,
    /// How `payload` is encoded; the reply uses the same encoding.
    pub encoding: Encoding,
    /// Encoded request.
    pub payload: Vec<u8>,
    reply: oneshot::Sender<Vec<u8>>,
}

impl PendingRequest {
    /// Send the encoded reply back to the requestor.
    ///
    /// Fails with [`BusError::Closed`] if the requestor gave up waiting.
    pub fn respond(self, bytes: Vec<u8>) -> Result<(), BusError> {
        self.reply.send(bytes).map_err(|_| BusError::Closed)
    }
}

/// Sending half; cheap to clone.
#[derive(Clone, Debug)]
pub struct Requestor {
    sender: mpsc::Sender<PendingRequest>,
}

impl Requestor {
    /// Send a request and wait for its reply.
    ///
    /// The timeout covers both queueing and the reply.
    pub async fn request(
        &self,
        peer: PeerIdentity,
        encoding: Encoding,
        payload: Vec<u8>,
        timeout: Duration,
    ) -> Result<Vec<u8>, BusError> {
        let (reply, rx) = oneshot::channel();
        let pending = PendingRequest {
            peer,
            encoding,
            payload,
            reply,
        };

        let exchange = async {
            self.sender
                .send(pending)
                .await
                .map_err(|_| BusError::Closed)?;
            rx.await.map_err(|_| BusError::NoReply)
        };

        match tokio::time::timeout(timeout, exchange).await {
            Ok(result) => result,
            Err(_) => {
                debug!(?timeout, "Request timed out");
                Err(BusError::Timeout(timeout))
            }
        }
    }
}

/// Receiving half.
#[derive(Debug)]
pub struct ReplyEndpoint {
    receiver: mpsc::Receiver<PendingRequest>,
}

impl ReplyEndpoint {
    /// Wait for the next request; `None` once every requestor is dropped.
    pub async fn next(&mut self) -> Option<PendingRequest> {
        self.receiver.recv().await
    }

    /// Stop accepting new requests; queued ones can still be drained.
    pub fn close(&mut self) {
        self.receiver.close();
    }
}

/// Create a connected requestor/endpoint pair with `depth` queued requests.
#[must_use]
pub fn reply_channel(depth: usize) -> (Requestor, ReplyEndpoint) {
    let (sender, receiver) = mpsc::channel(depth.max(1));
    (Requestor { sender }, ReplyEndpoint { receiver })
}
