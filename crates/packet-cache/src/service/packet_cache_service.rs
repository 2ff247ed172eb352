//! Packet Cache Service
//!
//! Binds the capped collection to the ingest and query streams and guards
//! both with the service lifecycle.
//!
//! Every operation holds the state read lock for its whole duration, so
//! `stop` (which takes the write lock) waits for in-flight work to finish
//! before discarding the cache. Wire decoding and encoding happen outside
//! that lock.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use tracing::{debug, error, info, warn};

use crate::domain::{
    CacheConfig, CappedCollection, ChannelKey, DataPacket, InsertOutcome, ServiceState,
    TooOldPolicy,
};
use crate::error::CacheError;
use crate::events::{
    BulkDataRequest, BulkDataResponse, CacheRequest, CacheResponse, ChannelListResponse,
    DataRequest, DataResponse, Encoding, ReturnCode, SensorRequest, SensorResponse, WireMessage,
};
use crate::metrics::{MetricsRecorder, NoOpMetrics};
use crate::ports::{CacheStats, IngestOutcome, IngestReport, PacketCacheApi};

/// Packet Cache Service implementation
///
/// Implements the `PacketCacheApi` port over one `CappedCollection`.
pub struct PacketCacheService<M: MetricsRecorder = NoOpMetrics> {
    config: CacheConfig,
    collection: CappedCollection,
    state: RwLock<ServiceState>,
    metrics: Arc<M>,
}

impl PacketCacheService<NoOpMetrics> {
    /// Create a service that records no metrics
    pub fn without_metrics(config: CacheConfig) -> Result<Self, CacheError> {
        Self::new(config, Arc::new(NoOpMetrics))
    }
}

impl<M: MetricsRecorder> PacketCacheService<M> {
    /// Create a stopped service; the configuration is validated here
    pub fn new(config: CacheConfig, metrics: Arc<M>) -> Result<Self, CacheError> {
        config.validate()?;
        Ok(Self {
            collection: CappedCollection::from_config(&config),
            config,
            state: RwLock::new(ServiceState::Stopped),
            metrics,
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<M> {
        &self.metrics
    }

    fn transition(&self, from: ServiceState, to: ServiceState) -> Result<(), CacheError> {
        let mut state = self.state.write();
        if *state != from || !from.can_transition_to(to) {
            return Err(CacheError::InvalidTransition { from: *state, to });
        }
        *state = to;
        info!(from = %from, to = %to, "Packet cache state changed");
        Ok(())
    }

    fn store(&self, packet: DataPacket) -> Result<IngestReport, CacheError> {
        if let Err(e) = self.config.channel_rules.validate(packet.channel()) {
            self.metrics.record_packet_rejected();
            warn!(channel = %packet.channel(), error = %e, "Rejected packet with invalid channel");
            return Err(e.into());
        }

        let channel = packet.channel().clone();
        let start_time = packet.start_time();
        let added = self
            .collection
            .add_packet(packet)
            .map_err(|e| CacheError::Internal(e.to_string()))?;

        if added.created_channel {
            self.metrics.record_channel_created();
        }
        if let Some(evicted) = &added.evicted_channel {
            self.metrics.record_channel_evicted();
            info!(channel = %channel, evicted = %evicted, "Channel bound reached, evicted channel");
        }

        let outcome = match added.insert {
            InsertOutcome::Inserted => {
                self.metrics.record_packet_stored(false);
                IngestOutcome::Stored
            }
            InsertOutcome::Replaced => {
                self.metrics.record_packet_replaced();
                debug!(channel = %channel, start_time, "Replaced packet");
                IngestOutcome::Replaced
            }
            InsertOutcome::InsertedWithEviction { evicted_start_time } => {
                self.metrics.record_packet_stored(true);
                IngestOutcome::StoredWithEviction { evicted_start_time }
            }
            InsertOutcome::TooOld { oldest_retained } => {
                self.metrics.record_packet_too_old();
                debug!(
                    channel = %channel,
                    start_time,
                    oldest_retained,
                    "Dropped packet older than retained window"
                );
                if self.config.too_old_policy == TooOldPolicy::Reject {
                    return Err(CacheError::PacketTooOld {
                        channel,
                        start_time,
                        oldest_retained,
                    });
                }
                IngestOutcome::DroppedTooOld
            }
        };

        Ok(IngestReport {
            outcome,
            evicted_channel: added.evicted_channel,
        })
    }

    /// Packets for a validated key and range, with the resulting code
    fn lookup(&self, key: &ChannelKey, start_time: i64, end_time: i64) -> (Vec<DataPacket>, ReturnCode) {
        let started = Instant::now();
        let found = self.collection.query(key, start_time, end_time);
        let known = found.is_some();
        let packets = found.unwrap_or_default();
        self.metrics
            .record_query(started.elapsed(), known, packets.len());

        let code = if known {
            ReturnCode::Success
        } else {
            ReturnCode::UnknownChannel
        };
        (packets, code)
    }

    fn serve_sensor(&self, request: SensorRequest) -> SensorResponse {
        let SensorRequest {
            identifier,
            channel,
            start_time,
            end_time,
        } = request;

        if start_time > end_time {
            return SensorResponse::with_code(identifier, channel, ReturnCode::InvalidRange);
        }
        let (packets, return_code) = self.lookup(&channel, start_time, end_time);
        SensorResponse {
            identifier,
            channel,
            packets,
            return_code,
        }
    }

    fn serve_data(&self, request: DataRequest) -> DataResponse {
        let DataRequest {
            identifier,
            name,
            start_time,
            end_time,
        } = request;

        if start_time > end_time {
            return DataResponse::with_code(identifier, name, ReturnCode::InvalidRange);
        }
        let Some(key) = ChannelKey::split_dotted(&name) else {
            debug!(name = %name, "Data request name is not NET.STA.CHA.LOC");
            return DataResponse::with_code(identifier, name, ReturnCode::InvalidMessage);
        };

        let (packets, return_code) = self.lookup(&key, start_time, end_time);
        DataResponse {
            identifier,
            name,
            packets,
            return_code,
        }
    }

    fn serve_bulk(&self, request: BulkDataRequest) -> BulkDataResponse {
        let responses = request
            .requests
            .into_iter()
            .map(|r| self.serve_sensor(r))
            .collect();
        BulkDataResponse {
            identifier: request.identifier,
            responses,
            return_code: ReturnCode::Success,
        }
    }

    fn encode_response(&self, response: &CacheResponse, encoding: Encoding) -> Vec<u8> {
        match response.encode(encoding) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(error = %e, identifier = response.identifier(), "Failed to encode response");
                self.metrics.record_request_failed(ReturnCode::InternalError);
                CacheResponse::failure(
                    response.identifier(),
                    ReturnCode::InternalError,
                    e.to_string(),
                )
                .encode(encoding)
                .unwrap_or_default()
            }
        }
    }
}

impl<M: MetricsRecorder> PacketCacheApi for PacketCacheService<M> {
    fn start(&self) -> Result<(), CacheError> {
        self.transition(ServiceState::Stopped, ServiceState::Starting)?;
        self.transition(ServiceState::Starting, ServiceState::Running)?;
        info!(
            max_channels = self.config.max_channels,
            max_packets_per_channel = self.config.max_packets_per_channel,
            "Packet cache running"
        );
        Ok(())
    }

    fn stop(&self) -> Result<(), CacheError> {
        // Waits for in-flight operations holding the read lock
        self.transition(ServiceState::Running, ServiceState::Stopping)?;
        let channels = self.collection.len();
        self.collection.clear();
        self.transition(ServiceState::Stopping, ServiceState::Stopped)?;
        info!(channels, "Packet cache stopped and cleared");
        Ok(())
    }

    fn state(&self) -> ServiceState {
        *self.state.read()
    }

    fn ingest(&self, packet: DataPacket) -> Result<IngestReport, CacheError> {
        let state = self.state.read();
        if !state.is_running() {
            return Err(CacheError::NotRunning { state: *state });
        }
        self.store(packet)
    }

    fn ingest_bytes(&self, bytes: &[u8], encoding: Encoding) -> Result<IngestReport, CacheError> {
        let state = self.state();
        if !state.is_running() {
            return Err(CacheError::NotRunning { state });
        }
        let packet = DataPacket::decode(encoding, bytes).map_err(|e| {
            self.metrics.record_packet_rejected();
            warn!(error = %e, %encoding, "Discarding undecodable packet");
            e
        })?;
        self.ingest(packet)
    }

    fn handle_request(&self, request: CacheRequest) -> CacheResponse {
        let identifier = request.identifier();
        let kind = request.kind();

        let response = {
            let state = self.state.read();
            if !state.is_running() {
                CacheResponse::failure(
                    identifier,
                    ReturnCode::NotRunning,
                    format!("service is {}", *state),
                )
            } else {
                match request {
                    CacheRequest::Sensor(r) => CacheResponse::Sensor(self.serve_sensor(r)),
                    CacheRequest::Data(r) => CacheResponse::Data(self.serve_data(r)),
                    CacheRequest::Bulk(r) => CacheResponse::Bulk(self.serve_bulk(r)),
                    CacheRequest::ChannelList(r) => {
                        CacheResponse::ChannelList(ChannelListResponse {
                            identifier: r.identifier,
                            channels: self.collection.channels(),
                            return_code: ReturnCode::Success,
                        })
                    }
                }
            }
        };

        let code = response.return_code();
        if code.is_failure() {
            self.metrics.record_request_failed(code);
            debug!(identifier, kind, code = %code, "Request failed");
        }
        response
    }

    fn handle_message(&self, bytes: &[u8], encoding: Encoding) -> Vec<u8> {
        let response = match CacheRequest::decode(encoding, bytes) {
            Ok(request) => self.handle_request(request),
            Err(e) => {
                warn!(error = %e, %encoding, "Undecodable request");
                self.metrics.record_request_failed(ReturnCode::InvalidMessage);
                // The identifier is unknowable without a decoded request
                CacheResponse::failure(0, ReturnCode::InvalidMessage, e.to_string())
            }
        };
        self.encode_response(&response, encoding)
    }

    fn refuse(
        &self,
        identifier: u64,
        code: ReturnCode,
        reason: &str,
        encoding: Encoding,
    ) -> Vec<u8> {
        self.metrics.record_request_failed(code);
        debug!(identifier, code = %code, reason, "Request refused before dispatch");
        self.encode_response(&CacheResponse::failure(identifier, code, reason), encoding)
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            state: self.state(),
            channels: self.collection.len(),
            total_packets: self.collection.total_packets(),
            max_channels: self.collection.max_channels(),
            max_packets_per_channel: self.collection.max_packets_per_channel(),
        }
    }
}
