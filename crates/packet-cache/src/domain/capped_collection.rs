//! Bounded registry of per-channel circular buffers
//!
//! ## Locking
//!
//! The key map sits behind a structural `RwLock` that is write-locked only
//! to create or evict a channel. Each channel has its own `Mutex`, so inserts
//! and queries on different channels run in parallel.
//!
//! Lock order is always map then slot. The normal path clones the slot's
//! `Arc` under the map read lock and releases the map before locking the
//! slot. Eviction holds the map write lock while it takes the victim's slot
//! lock, so it waits for any in-flight operation on that channel and then
//! marks the slot retired. An operation that finds its slot retired after
//! locking treats the channel as gone.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use super::{CacheConfig, ChannelKey, CircularBuffer, DataPacket, InsertOutcome};
use crate::error::BufferError;

/// Result of [`CappedCollection::add_packet`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddOutcome {
    /// What the channel's buffer did with the packet
    pub insert: InsertOutcome,
    /// Whether a new buffer was created for the packet's channel
    pub created_channel: bool,
    /// Channel evicted to make room for the new one
    pub evicted_channel: Option<ChannelKey>,
}

struct ChannelSlot {
    buffer: Mutex<CircularBuffer>,
    last_touched: AtomicU64,
    created_seq: u64,
    retired: AtomicBool,
}

impl ChannelSlot {
    fn new(buffer: CircularBuffer, seq: u64) -> Self {
        Self {
            buffer: Mutex::new(buffer),
            last_touched: AtomicU64::new(seq),
            created_seq: seq,
            retired: AtomicBool::new(false),
        }
    }

    fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }

    fn recency(&self) -> (u64, u64) {
        (self.last_touched.load(Ordering::Relaxed), self.created_seq)
    }
}

pub struct CappedCollection {
    channels: RwLock<HashMap<ChannelKey, Arc<ChannelSlot>>>,
    max_channels: usize,
    max_packets_per_channel: usize,
    clock: AtomicU64,
}

impl CappedCollection {
    /// Create an empty collection; zero bounds are raised to one
    pub fn new(max_channels: usize, max_packets_per_channel: usize) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            max_channels: max_channels.max(1),
            max_packets_per_channel: max_packets_per_channel.max(1),
            clock: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.max_channels, config.max_packets_per_channel)
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn touch(&self, slot: &ChannelSlot) {
        slot.last_touched.store(self.tick(), Ordering::Relaxed);
    }

    fn lookup(&self, key: &ChannelKey) -> Option<Arc<ChannelSlot>> {
        self.channels.read().get(key).cloned()
    }

    /// Route a packet to its channel's buffer, creating the buffer if needed
    ///
    /// Creating a buffer while at the channel bound evicts the least
    /// recently touched channel first.
    pub fn add_packet(&self, packet: DataPacket) -> Result<AddOutcome, BufferError> {
        let mut created_channel = false;
        let mut evicted_channel = None;

        loop {
            let slot = match self.lookup(packet.channel()) {
                Some(slot) => slot,
                None => {
                    let (slot, created, evicted) = self.get_or_create(packet.channel());
                    created_channel |= created;
                    if evicted.is_some() {
                        evicted_channel = evicted;
                    }
                    slot
                }
            };

            let mut buffer = slot.buffer.lock();
            if slot.is_retired() {
                // Evicted between lookup and lock
                continue;
            }
            self.touch(&slot);
            let insert = buffer.insert(packet)?;

            return Ok(AddOutcome {
                insert,
                created_channel,
                evicted_channel,
            });
        }
    }

    fn get_or_create(&self, key: &ChannelKey) -> (Arc<ChannelSlot>, bool, Option<ChannelKey>) {
        let mut channels = self.channels.write();
        if let Some(slot) = channels.get(key) {
            return (Arc::clone(slot), false, None);
        }

        let evicted = if channels.len() >= self.max_channels {
            Self::evict_least_recent(&mut channels)
        } else {
            None
        };

        let buffer = CircularBuffer::new(key.clone(), self.max_packets_per_channel);
        let slot = Arc::new(ChannelSlot::new(buffer, self.tick()));
        channels.insert(key.clone(), Arc::clone(&slot));
        debug!(channel = %key, channels = channels.len(), "Created channel buffer");

        (slot, true, evicted)
    }

    fn evict_least_recent(channels: &mut HashMap<ChannelKey, Arc<ChannelSlot>>) -> Option<ChannelKey> {
        let victim = channels
            .iter()
            .min_by_key(|(_, slot)| slot.recency())
            .map(|(key, _)| key.clone())?;
        let slot = channels.remove(&victim)?;

        // Waits for any in-flight operation on the victim
        let mut buffer = slot.buffer.lock();
        slot.retired.store(true, Ordering::Release);
        let dropped = buffer.len();
        buffer.clear();

        info!(channel = %victim, packets = dropped, "Evicted least recently used channel");
        Some(victim)
    }

    /// Copies of the packets overlapping `[t0, t1]`; empty for unknown channels
    pub fn get_packets(&self, key: &ChannelKey, t0: i64, t1: i64) -> Vec<DataPacket> {
        self.query(key, t0, t1).unwrap_or_default()
    }

    /// Like [`get_packets`](Self::get_packets) but `None` for unknown channels
    pub fn query(&self, key: &ChannelKey, t0: i64, t1: i64) -> Option<Vec<DataPacket>> {
        self.with_buffer(key, |buffer| buffer.query(t0, t1))
    }

    /// Copies of the packets ending at or after `t0`
    pub fn get_packets_since(&self, key: &ChannelKey, t0: i64) -> Vec<DataPacket> {
        self.with_buffer(key, |buffer| buffer.packets_since(t0))
            .unwrap_or_default()
    }

    /// Run `f` against a live channel's buffer, refreshing its recency
    fn with_buffer<T>(&self, key: &ChannelKey, f: impl FnOnce(&CircularBuffer) -> T) -> Option<T> {
        let slot = self.lookup(key)?;
        let buffer = slot.buffer.lock();
        if slot.is_retired() {
            return None;
        }
        self.touch(&slot);
        Some(f(&*buffer))
    }

    /// Whether the channel is cached; does not refresh recency
    pub fn have_channel(&self, key: &ChannelKey) -> bool {
        self.channels.read().contains_key(key)
    }

    /// Number of live channels
    pub fn len(&self) -> usize {
        self.channels.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.read().is_empty()
    }

    /// Live channel keys, sorted
    pub fn channels(&self) -> Vec<ChannelKey> {
        let mut keys: Vec<ChannelKey> = self.channels.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Packets held across all channels
    pub fn total_packets(&self) -> usize {
        self.snapshot_slots()
            .iter()
            .map(|slot| slot.buffer.lock().len())
            .sum()
    }

    /// Start time of the oldest packet retained for a channel
    pub fn earliest_start_time(&self, key: &ChannelKey) -> Option<i64> {
        let slot = self.lookup(key)?;
        let buffer = slot.buffer.lock();
        if slot.is_retired() {
            return None;
        }
        buffer.earliest_start_time()
    }

    pub fn max_channels(&self) -> usize {
        self.max_channels
    }

    pub fn max_packets_per_channel(&self) -> usize {
        self.max_packets_per_channel
    }

    /// Drop every channel and its packets
    pub fn clear(&self) {
        let mut channels = self.channels.write();
        for slot in channels.values() {
            let mut buffer = slot.buffer.lock();
            slot.retired.store(true, Ordering::Release);
            buffer.clear();
        }
        channels.clear();
    }

    fn snapshot_slots(&self) -> Vec<Arc<ChannelSlot>> {
        self.channels.read().values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(station: &str) -> ChannelKey {
        ChannelKey::new("UU", station, "HHZ", "01").unwrap()
    }

    fn packet(station: &str, start: i64) -> DataPacket {
        DataPacket::new(key(station), start, 1_000_000.0, vec![0.0; 5]).unwrap()
    }

    #[test]
    fn test_lru_eviction_scenario() {
        let collection = CappedCollection::new(2, 10);
        collection.add_packet(packet("A", 0)).unwrap();
        collection.add_packet(packet("B", 0)).unwrap();
        let outcome = collection.add_packet(packet("C", 0)).unwrap();

        assert_eq!(outcome.evicted_channel, Some(key("A")));
        assert!(outcome.created_channel);
        assert_eq!(collection.len(), 2);
        assert!(!collection.have_channel(&key("A")));
        assert!(collection.have_channel(&key("B")));
        assert!(collection.have_channel(&key("C")));
    }

    #[test]
    fn test_query_refreshes_recency() {
        let collection = CappedCollection::new(2, 10);
        collection.add_packet(packet("A", 0)).unwrap();
        collection.add_packet(packet("B", 0)).unwrap();

        // A becomes most recent, so B goes next
        assert_eq!(collection.get_packets(&key("A"), 0, 10).len(), 1);
        let outcome = collection.add_packet(packet("C", 0)).unwrap();

        assert_eq!(outcome.evicted_channel, Some(key("B")));
        assert_eq!(collection.channels(), vec![key("A"), key("C")]);
    }

    #[test]
    fn test_have_channel_does_not_refresh() {
        let collection = CappedCollection::new(2, 10);
        collection.add_packet(packet("A", 0)).unwrap();
        collection.add_packet(packet("B", 0)).unwrap();

        assert!(collection.have_channel(&key("A")));
        let outcome = collection.add_packet(packet("C", 0)).unwrap();
        assert_eq!(outcome.evicted_channel, Some(key("A")));
    }

    #[test]
    fn test_k_plus_one_channels() {
        let k = 5;
        let collection = CappedCollection::new(k, 4);
        for i in 0..=k {
            collection.add_packet(packet(&format!("S{i}"), 0)).unwrap();
        }
        assert_eq!(collection.len(), k);
        assert!(!collection.have_channel(&key("S0")));
        assert_eq!(collection.total_packets(), k);
    }

    #[test]
    fn test_unknown_channel() {
        let collection = CappedCollection::new(2, 10);
        assert!(collection.get_packets(&key("X"), 0, 100).is_empty());
        assert_eq!(collection.query(&key("X"), 0, 100), None);
        assert_eq!(collection.earliest_start_time(&key("X")), None);
        assert!(!collection.have_channel(&key("X")));
    }

    #[test]
    fn test_existing_channel_not_created_again() {
        let collection = CappedCollection::new(2, 10);
        let first = collection.add_packet(packet("A", 0)).unwrap();
        let second = collection.add_packet(packet("A", 10)).unwrap();

        assert!(first.created_channel);
        assert!(!second.created_channel);
        assert_eq!(second.insert, InsertOutcome::Inserted);
        assert_eq!(collection.total_packets(), 2);
        assert_eq!(collection.earliest_start_time(&key("A")), Some(0));
    }

    #[test]
    fn test_per_channel_capacity() {
        let collection = CappedCollection::new(2, 3);
        for t in 0..5 {
            collection.add_packet(packet("A", t * 10)).unwrap();
        }
        let starts: Vec<i64> = collection
            .get_packets(&key("A"), i64::MIN, i64::MAX)
            .iter()
            .map(DataPacket::start_time)
            .collect();
        assert_eq!(starts, vec![20, 30, 40]);
        assert_eq!(collection.get_packets_since(&key("A"), 35).len(), 1);
    }

    #[test]
    fn test_clear() {
        let collection = CappedCollection::new(4, 4);
        collection.add_packet(packet("A", 0)).unwrap();
        collection.add_packet(packet("B", 0)).unwrap();
        collection.clear();

        assert!(collection.is_empty());
        assert_eq!(collection.total_packets(), 0);
        assert!(collection.channels().is_empty());
    }

    #[test]
    fn test_zero_bounds_raised() {
        let collection = CappedCollection::new(0, 0);
        assert_eq!(collection.max_channels(), 1);
        assert_eq!(collection.max_packets_per_channel(), 1);
    }
}
