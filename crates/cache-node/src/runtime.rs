//! # Cache Node Runtime
//!
//! Owns the service, the handler and both transport endpoints, and runs
//! the two loops that connect them:
//!
//! ```text
//! InMemoryFrameBus ──Subscription──▶ ingest loop ──ingest_bytes()──▶ PacketCacheService
//! Requestor ──▶ ReplyEndpoint ──▶ reply loop ──handle()──▶ PacketCacheHandler ──▶ respond()
//! ```
//!
//! ## Shutdown Sequence
//!
//! 1. Signal both loops through the watch channel
//! 2. Await the loop tasks
//! 3. Stop the service, which waits for in-flight operations and clears it

use std::sync::Arc;

use cache_bus::{
    reply_channel, FrameFilter, InMemoryFrameBus, ReplyEndpoint, Requestor, Subscription,
    DATA_PACKET_TOPIC,
};
use packet_cache::{
    CacheError, CacheStats, Metrics, MetricsSnapshot, PacketCacheApi, PacketCacheHandler,
    PacketCacheService, PeerIdentity,
};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::client::CacheClient;
use crate::config::NodeConfig;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("Node already started")]
    AlreadyStarted,

    #[error("Node task failed: {0}")]
    Task(String),
}

/// A packet cache wired to its transports.
pub struct CacheNode {
    config: NodeConfig,
    service: Arc<PacketCacheService<Metrics>>,
    handler: Arc<PacketCacheHandler>,
    bus: Arc<InMemoryFrameBus>,
    requestor: Requestor,
    /// Taken by `start`; the reply loop owns it afterwards.
    endpoint: Mutex<Option<ReplyEndpoint>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl CacheNode {
    /// Build a stopped node from configuration.
    pub fn new(config: NodeConfig) -> Result<Self, NodeError> {
        info!("Creating packet cache node");

        let metrics = Arc::new(Metrics::new());
        let service = Arc::new(PacketCacheService::new(config.cache.clone(), metrics)?);
        let handler = Arc::new(PacketCacheHandler::new(
            Arc::clone(&service) as Arc<dyn PacketCacheApi>,
            config.security.authorizer(),
        ));
        let bus = Arc::new(InMemoryFrameBus::with_capacity(config.bus.channel_capacity));
        let (requestor, endpoint) = reply_channel(config.bus.request_queue_depth);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            config,
            service,
            handler,
            bus,
            requestor,
            endpoint: Mutex::new(Some(endpoint)),
            tasks: Mutex::new(Vec::new()),
            shutdown_tx,
            shutdown_rx,
        })
    }

    /// Start the service and spawn the ingest and reply loops.
    ///
    /// Must be called from within a Tokio runtime. Frames published after
    /// this returns are seen by the ingest loop. A node runs once; after
    /// `shutdown` build a new one.
    pub fn start(&self) -> Result<(), NodeError> {
        let mut slot = self.endpoint.lock();
        let endpoint = slot.take().ok_or(NodeError::AlreadyStarted)?;
        if let Err(e) = self.service.start() {
            *slot = Some(endpoint);
            return Err(e.into());
        }
        drop(slot);

        let subscription = self.bus.subscribe(FrameFilter::topics([DATA_PACKET_TOPIC]));
        let ingest = tokio::spawn(run_ingest_loop(
            subscription,
            Arc::clone(&self.service),
            self.shutdown_rx.clone(),
        ));
        let reply = tokio::spawn(run_reply_loop(
            endpoint,
            Arc::clone(&self.handler),
            self.shutdown_rx.clone(),
        ));
        self.tasks.lock().extend([ingest, reply]);

        info!(
            max_channels = self.config.cache.max_channels,
            max_packets_per_channel = self.config.cache.max_packets_per_channel,
            encoding = %self.config.encoding,
            "Packet cache node running"
        );
        Ok(())
    }

    /// Signal the loops, wait for them, then stop the service.
    pub async fn shutdown(&self) -> Result<(), NodeError> {
        info!("Initiating graceful shutdown...");
        self.shutdown_tx.send_replace(true);

        let tasks = std::mem::take(&mut *self.tasks.lock());
        let mut failure = None;
        for task in tasks {
            if let Err(e) = task.await {
                error!(error = %e, "Node task ended abnormally");
                failure = Some(NodeError::Task(e.to_string()));
            }
        }

        if self.service.state().is_running() {
            self.service.stop()?;
        }

        let metrics = self.metrics();
        info!(
            packets_ingested = metrics.packets_ingested,
            queries_served = metrics.queries_served,
            requests_failed = metrics.requests_failed,
            "Shutdown complete"
        );

        failure.map_or(Ok(()), Err)
    }

    /// A client speaking for `peer` with the configured encoding and timeout.
    pub fn client(&self, peer: impl Into<PeerIdentity>) -> CacheClient {
        CacheClient::new(
            peer.into(),
            self.config.encoding,
            self.config.bus.request_timeout,
            self.requestor.clone(),
            Arc::clone(&self.bus),
        )
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn service(&self) -> Arc<PacketCacheService<Metrics>> {
        Arc::clone(&self.service)
    }

    pub fn bus(&self) -> Arc<InMemoryFrameBus> {
        Arc::clone(&self.bus)
    }

    pub fn stats(&self) -> CacheStats {
        self.service.stats()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.service.metrics().snapshot()
    }
}

async fn run_ingest_loop(
    mut subscription: Subscription,
    service: Arc<PacketCacheService<Metrics>>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => {
                info!("Ingest loop received shutdown signal");
                break;
            }
            frame = subscription.recv() => {
                let Some(frame) = frame else {
                    warn!("Frame bus closed, ingest loop exiting");
                    break;
                };
                match service.ingest_bytes(&frame.payload, frame.encoding) {
                    Ok(report) => {
                        if let Some(evicted) = report.evicted_channel {
                            debug!(frame = %frame.id, %evicted, "Ingest evicted a channel");
                        }
                    }
                    Err(e) => debug!(frame = %frame.id, error = %e, "Frame not ingested"),
                }
            }
        }
    }
}

async fn run_reply_loop(
    mut endpoint: ReplyEndpoint,
    handler: Arc<PacketCacheHandler>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => {
                info!("Reply loop received shutdown signal");
                endpoint.close();
                break;
            }
            request = endpoint.next() => {
                let Some(request) = request else {
                    info!("All requestors gone, reply loop exiting");
                    break;
                };
                let reply = handler.handle(&request.peer, &request.payload, request.encoding);
                if request.respond(reply).is_err() {
                    debug!("Requestor stopped waiting before the reply was sent");
                }
            }
        }
    }
}
