//! # Concurrency Tests
//!
//! Many producers and readers hammer one service at once. Checks that
//! bounds hold, that readers only ever see sorted, whole packets, and that
//! channel eviction under contention never tears a buffer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use packet_cache::events::{BulkDataRequest, SensorRequest};
use packet_cache::{
    CacheConfigBuilder, CacheRequest, CacheResponse, ChannelKey, DataPacket, Encoding,
    PacketCacheApi, PacketCacheService, ReturnCode, WireMessage,
};

// =============================================================================
// TEST FIXTURES
// =============================================================================

const SAMPLES: usize = 8;

fn key(station: usize) -> ChannelKey {
    ChannelKey::new("UU", format!("S{station}"), "HHZ", "01").unwrap()
}

/// Samples carry the start time so readers can detect torn packets
fn packet(station: usize, start: i64) -> DataPacket {
    DataPacket::new(key(station), start, 1_000_000.0, vec![start as f64; SAMPLES]).unwrap()
}

fn assert_well_formed(packets: &[DataPacket]) {
    assert!(packets.windows(2).all(|w| w[0].start_time() < w[1].start_time()));
    for p in packets {
        assert_eq!(p.sample_count(), SAMPLES);
        assert!(p.samples().iter().all(|s| *s == p.start_time() as f64));
    }
}

fn service(channels: usize, packets: usize) -> Arc<PacketCacheService> {
    let config = CacheConfigBuilder::new()
        .max_channels(channels)
        .max_packets_per_channel(packets)
        .build()
        .unwrap();
    let service = PacketCacheService::without_metrics(config).unwrap();
    service.start().unwrap();
    Arc::new(service)
}

// =============================================================================
// TESTS
// =============================================================================

#[test]
fn test_parallel_producers_and_readers() {
    let channels = 8;
    let capacity = 16;
    let service = service(channels, capacity);
    let done = AtomicBool::new(false);

    thread::scope(|scope| {
        let mut producers = Vec::new();
        for station in 0..channels {
            let service = &service;
            producers.push(scope.spawn(move || {
                for i in 0..500i64 {
                    service.ingest(packet(station, i * 10)).unwrap();
                }
            }));
        }

        for _ in 0..4 {
            let service = &service;
            let done = &done;
            scope.spawn(move || {
                while !done.load(Ordering::Relaxed) {
                    for station in 0..channels {
                        let request = SensorRequest::new(1, key(station), 0, i64::MAX);
                        let CacheResponse::Sensor(response) = service.handle_request(request.into())
                        else {
                            panic!("expected sensor response");
                        };
                        assert!(response.packets.len() <= capacity);
                        assert_well_formed(&response.packets);
                    }
                }
            });
        }

        for producer in producers {
            producer.join().unwrap();
        }
        done.store(true, Ordering::Relaxed);
    });

    let stats = service.stats();
    assert_eq!(stats.channels, channels);
    assert_eq!(stats.total_packets, channels * capacity);

    // Each channel keeps its newest window
    let request = SensorRequest::new(1, key(0), 0, i64::MAX);
    let CacheResponse::Sensor(response) = service.handle_request(request.into()) else {
        panic!("expected sensor response");
    };
    assert_eq!(response.packets.first().map(DataPacket::start_time), Some(4840));
    assert_eq!(response.packets.last().map(DataPacket::start_time), Some(4990));
}

#[test]
fn test_channel_churn_respects_bound() {
    let max_channels = 4;
    let service = service(max_channels, 8);

    thread::scope(|scope| {
        for worker in 0..8usize {
            let service = &service;
            scope.spawn(move || {
                for i in 0..300usize {
                    let station = (worker * 7 + i) % 32;
                    service.ingest(packet(station, i as i64)).unwrap();

                    let request = SensorRequest::new(2, key((station + 1) % 32), 0, i64::MAX);
                    let response = service.handle_request(request.into());
                    assert!(!response.return_code().is_failure());
                    if let CacheResponse::Sensor(r) = response {
                        assert_well_formed(&r.packets);
                    }

                    assert!(service.stats().channels <= max_channels);
                }
            });
        }
    });

    assert!(service.stats().channels <= max_channels);
}

#[test]
fn test_bulk_requests_under_load() {
    let service = service(16, 32);
    for station in 0..8 {
        service.ingest(packet(station, 0)).unwrap();
    }

    thread::scope(|scope| {
        let service = &service;
        scope.spawn(move || {
            for i in 1..200i64 {
                service.ingest(packet(i as usize % 8, i * 100)).unwrap();
            }
        });

        for _ in 0..4 {
            scope.spawn(move || {
                for _ in 0..100 {
                    let request = (0..12).fold(BulkDataRequest::new(9), |bulk, station| {
                        bulk.with_request(SensorRequest::new(station as u64, key(station), 0, i64::MAX))
                    });
                    let bytes = CacheRequest::Bulk(request).to_binary().unwrap();
                    let reply = service.handle_message(&bytes, Encoding::Binary);
                    let CacheResponse::Bulk(bulk) = CacheResponse::from_binary(&reply).unwrap()
                    else {
                        panic!("expected bulk response");
                    };

                    assert_eq!(bulk.responses.len(), 12);
                    for (i, sub) in bulk.responses.iter().enumerate() {
                        assert_eq!(sub.identifier, i as u64);
                        let expected = if i < 8 {
                            ReturnCode::Success
                        } else {
                            ReturnCode::UnknownChannel
                        };
                        assert_eq!(sub.return_code, expected);
                        assert_well_formed(&sub.packets);
                    }
                }
            });
        }
    });
}

#[test]
fn test_stop_waits_for_in_flight_work() {
    let service = service(8, 8);

    thread::scope(|scope| {
        for station in 0..4 {
            let service = &service;
            scope.spawn(move || {
                for i in 0..1000i64 {
                    // Fails fast with NotRunning once stop wins
                    if service.ingest(packet(station, i)).is_err() {
                        break;
                    }
                }
            });
        }
        service.stop().unwrap();
    });

    let stats = service.stats();
    assert_eq!(stats.channels, 0);
    assert_eq!(stats.total_packets, 0);
}
