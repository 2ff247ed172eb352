//! In-process client for a running [`CacheNode`](crate::CacheNode).
//!
//! Encodes with the node's configured encoding, publishes packets on the
//! frame bus and sends requests through the reply endpoint.

use std::sync::Arc;
use std::time::Duration;

use cache_bus::{BusError, Frame, FramePublisher, InMemoryFrameBus, Requestor};
use packet_cache::{CacheRequest, CacheResponse, CodecError, DataPacket, Encoding, PeerIdentity, WireMessage};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Bus(#[from] BusError),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

#[derive(Clone)]
pub struct CacheClient {
    peer: PeerIdentity,
    encoding: Encoding,
    timeout: Duration,
    requestor: Requestor,
    bus: Arc<InMemoryFrameBus>,
}

impl CacheClient {
    pub(crate) fn new(
        peer: PeerIdentity,
        encoding: Encoding,
        timeout: Duration,
        requestor: Requestor,
        bus: Arc<InMemoryFrameBus>,
    ) -> Self {
        Self {
            peer,
            encoding,
            timeout,
            requestor,
            bus,
        }
    }

    pub fn peer(&self) -> &PeerIdentity {
        &self.peer
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Broadcast a packet; returns how many subscribers received it.
    pub async fn publish(&self, packet: &DataPacket) -> Result<usize, ClientError> {
        let payload = packet.encode(self.encoding)?;
        Ok(self
            .bus
            .publish(Frame::data_packet(self.encoding, payload))
            .await)
    }

    /// Send a request and decode the reply.
    pub async fn request(
        &self,
        request: impl Into<CacheRequest>,
    ) -> Result<CacheResponse, ClientError> {
        let payload = request.into().encode(self.encoding)?;
        let reply = self.request_raw(payload).await?;
        Ok(CacheResponse::decode(self.encoding, &reply)?)
    }

    /// Send pre-encoded bytes and return the encoded reply.
    pub async fn request_raw(&self, payload: Vec<u8>) -> Result<Vec<u8>, ClientError> {
        Ok(self
            .requestor
            .request(self.peer.clone(), self.encoding, payload, self.timeout)
            .await?)
    }
}
