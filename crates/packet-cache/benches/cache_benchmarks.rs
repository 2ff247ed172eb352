//! # Packet Cache Benchmarks
//!
//! Run with:
//! ```bash
//! cargo bench --package packet-cache --bench cache_benchmarks
//! ```
//!
//! Covers in-order and shuffled buffer inserts, range queries on a full
//! buffer, ingest across many channels and bulk request handling through
//! the binary codec.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use packet_cache::events::{BulkDataRequest, SensorRequest};
use packet_cache::{
    CacheConfigBuilder, CacheRequest, ChannelKey, CircularBuffer, DataPacket, Encoding,
    PacketCacheApi, PacketCacheService, WireMessage,
};
use rand::seq::SliceRandom;

fn key(station: usize) -> ChannelKey {
    ChannelKey::new("UU", format!("S{station}"), "HHZ", "01").unwrap()
}

fn packet(station: usize, start: i64) -> DataPacket {
    DataPacket::new(key(station), start * 1_000_000, 100.0, vec![0.0; 100]).unwrap()
}

fn bench_buffer_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("circular_buffer/insert");

    for capacity in [100usize, 300, 1000] {
        let in_order: Vec<DataPacket> = (0..capacity as i64 * 2).map(|t| packet(0, t)).collect();
        let mut shuffled = in_order.clone();
        shuffled.shuffle(&mut rand::thread_rng());

        group.throughput(Throughput::Elements(in_order.len() as u64));
        group.bench_with_input(BenchmarkId::new("in_order", capacity), &in_order, |b, packets| {
            b.iter(|| {
                let mut buffer = CircularBuffer::new(key(0), capacity);
                for p in packets {
                    black_box(buffer.insert(p.clone()).unwrap());
                }
            })
        });
        group.bench_with_input(BenchmarkId::new("shuffled", capacity), &shuffled, |b, packets| {
            b.iter(|| {
                let mut buffer = CircularBuffer::new(key(0), capacity);
                for p in packets {
                    black_box(buffer.insert(p.clone()).unwrap());
                }
            })
        });
    }
    group.finish();
}

fn bench_buffer_query(c: &mut Criterion) {
    let mut buffer = CircularBuffer::new(key(0), 300);
    for t in 0..300 {
        buffer.insert(packet(0, t)).unwrap();
    }

    let mut group = c.benchmark_group("circular_buffer/query");
    for window in [1i64, 10, 100] {
        group.bench_with_input(BenchmarkId::from_parameter(window), &window, |b, &window| {
            b.iter(|| black_box(buffer.query(150 * 1_000_000, (150 + window) * 1_000_000)))
        });
    }
    group.finish();
}

fn bench_service(c: &mut Criterion) {
    let config = CacheConfigBuilder::new()
        .max_channels(1000)
        .max_packets_per_channel(300)
        .build()
        .unwrap();
    let service = PacketCacheService::without_metrics(config).unwrap();
    service.start().unwrap();
    for station in 0..1000 {
        for t in 0..30 {
            service.ingest(packet(station, t)).unwrap();
        }
    }

    let mut next = 30i64;
    c.bench_function("service/ingest_round_robin", |b| {
        b.iter(|| {
            next += 1;
            black_box(service.ingest(packet(next as usize % 1000, next)).unwrap());
        })
    });

    let bulk = (0..50).fold(BulkDataRequest::new(1), |bulk, station| {
        bulk.with_request(SensorRequest::new(station as u64, key(station), 0, 10 * 1_000_000))
    });
    let bytes = CacheRequest::Bulk(bulk).to_binary().unwrap();
    c.bench_function("service/bulk_50_binary", |b| {
        b.iter(|| black_box(service.handle_message(&bytes, Encoding::Binary)))
    });
}

criterion_group!(
    name = cache_benches;
    config = Criterion::default().sample_size(50);
    targets = bench_buffer_insert, bench_buffer_query, bench_service
);
criterion_main!(cache_benches);
