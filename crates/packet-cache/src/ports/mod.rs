//! Ports layer: traits at the service boundary

pub mod inbound;
pub mod outbound;

pub use inbound::{CacheStats, IngestOutcome, IngestReport, PacketCacheApi};
pub use outbound::{AllowAll, AllowList, DenyList, PeerAuthorizer, PeerIdentity};
