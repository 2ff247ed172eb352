//! # Cache Bus - Transport Plumbing for the Packet Cache
//!
//! Two messaging patterns sit in front of the cache:
//!
//! - **Broadcast:** data packets arrive as [`Frame`]s on a pub-sub bus. The
//!   cache is one subscriber among many (pickers, archivers) and never
//!   replies.
//! - **Request/Reply:** clients send encoded requests through a
//!   [`Requestor`]; the cache drains a [`ReplyEndpoint`] and answers each
//!   request on its own reply slot.
//!
//! ```text
//!  producers ──publish()──▶ ┌──────────────┐ ──subscribe()──▶ cache ingest
//!                           │ Frame Bus    │ ──subscribe()──▶ other consumers
//!                           └──────────────┘
//!
//!  clients ──request()──▶ ┌──────────────┐ ──next()──▶ cache handler
//!          ◀──reply──────  │ Reply Endpt  │ ◀─respond()─
//!                          └──────────────┘
//! ```
//!
//! Payloads are opaque here; decoding belongs to `packet-cache`.

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod frames;
pub mod publisher;
pub mod reply;
pub mod subscriber;

pub use frames::{Frame, FrameFilter, DATA_PACKET_TOPIC};
pub use publisher::{FramePublisher, InMemoryFrameBus};
pub use reply::{reply_channel, BusError, PendingRequest, ReplyEndpoint, Requestor};
pub use subscriber::{Subscription, SubscriptionError};

/// Current protocol version for bus frames.
pub const PROTOCOL_VERSION: u16 = 1;

/// Maximum frames to buffer per subscriber before it starts lagging.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

/// Maximum queued requests before requestors wait.
pub const DEFAULT_REQUEST_QUEUE_DEPTH: usize = 256;
