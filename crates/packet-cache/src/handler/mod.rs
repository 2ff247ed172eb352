//! Handler layer: authorization in front of the service

mod ipc_handler;

pub use ipc_handler::PacketCacheHandler;
