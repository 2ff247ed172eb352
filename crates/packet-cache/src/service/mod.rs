//! Service layer: lifecycle and request orchestration

mod packet_cache_service;

pub use packet_cache_service::PacketCacheService;
