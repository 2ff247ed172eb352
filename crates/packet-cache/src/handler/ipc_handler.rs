//! Request handler for the reply side of the transport
//!
//! Applies the injected authorization policy before a request reaches the
//! service. Unauthorized peers receive an `Unauthorized` failure carrying
//! their request identifier, and the cache itself is never queried.

use std::sync::Arc;

use tracing::warn;

use crate::events::{CacheRequest, Encoding, ReturnCode, WireMessage};
use crate::ports::{AllowAll, PacketCacheApi, PeerAuthorizer, PeerIdentity};

pub struct PacketCacheHandler {
    service: Arc<dyn PacketCacheApi>,
    authorizer: Arc<dyn PeerAuthorizer>,
}

impl PacketCacheHandler {
    pub fn new(service: Arc<dyn PacketCacheApi>, authorizer: Arc<dyn PeerAuthorizer>) -> Self {
        Self {
            service,
            authorizer,
        }
    }

    /// Handler that admits every peer
    pub fn open(service: Arc<dyn PacketCacheApi>) -> Self {
        Self::new(service, Arc::new(AllowAll))
    }

    pub fn service(&self) -> &Arc<dyn PacketCacheApi> {
        &self.service
    }

    /// Answer one serialized request from `peer` in the same encoding
    pub fn handle(&self, peer: &PeerIdentity, bytes: &[u8], encoding: Encoding) -> Vec<u8> {
        if !self.authorizer.is_authorized(peer) {
            // Echo the identifier when the bytes decode; 0 otherwise
            let identifier = CacheRequest::decode(encoding, bytes).map_or(0, |r| r.identifier());
            warn!(peer = %peer, identifier, "Rejected request from unauthorized peer");
            return self.service.refuse(
                identifier,
                ReturnCode::Unauthorized,
                "peer is not authorized",
                encoding,
            );
        }
        self.service.handle_message(bytes, encoding)
    }
}
