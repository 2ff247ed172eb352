//! Outbound Ports (Driven Ports)
//!
//! Policies the handler consults before a request reaches the service.
//! The transport authenticates peers; these only decide whether an
//! authenticated identity may use the cache.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of the peer that sent a request, as established by the transport
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerIdentity(String);

impl PeerIdentity {
    pub fn new(identity: impl Into<String>) -> Self {
        Self(identity.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerIdentity {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Authorization policy (Driven Port)
pub trait PeerAuthorizer: Send + Sync {
    fn is_authorized(&self, peer: &PeerIdentity) -> bool;
}

/// Accepts every peer
#[derive(Clone, Copy, Debug, Default)]
pub struct AllowAll;

impl PeerAuthorizer for AllowAll {
    fn is_authorized(&self, _peer: &PeerIdentity) -> bool {
        true
    }
}

/// Accepts only the listed peers
#[derive(Clone, Debug, Default)]
pub struct AllowList {
    peers: HashSet<PeerIdentity>,
}

impl AllowList {
    pub fn new<I, P>(peers: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PeerIdentity>,
    {
        Self {
            peers: peers.into_iter().map(Into::into).collect(),
        }
    }
}

impl PeerAuthorizer for AllowList {
    fn is_authorized(&self, peer: &PeerIdentity) -> bool {
        self.peers.contains(peer)
    }
}

/// Accepts everyone except the listed peers
#[derive(Clone, Debug, Default)]
pub struct DenyList {
    peers: HashSet<PeerIdentity>,
}

impl DenyList {
    pub fn new<I, P>(peers: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PeerIdentity>,
    {
        Self {
            peers: peers.into_iter().map(Into::into).collect(),
        }
    }
}

impl PeerAuthorizer for DenyList {
    fn is_authorized(&self, peer: &PeerIdentity) -> bool {
        !self.peers.contains(peer)
    }
}

impl From<String> for PeerIdentity {
    fn from(s: String) -> Self {
        Self(s)
    }
}
