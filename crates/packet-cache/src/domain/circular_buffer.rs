//! Fixed-capacity, time-ordered packet store for a single channel
//!
//! Packets are kept sorted by start time with at most one packet per start
//! time. When full, only the oldest packet may be evicted, so a packet that
//! would sort before everything retained is dropped instead.

use std::collections::VecDeque;

use super::{ChannelKey, DataPacket};
use crate::error::BufferError;

/// What happened to a packet handed to [`CircularBuffer::insert`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Stored as a new entry
    Inserted,
    /// Replaced the entry with the same start time
    Replaced,
    /// Stored after evicting the oldest entry
    InsertedWithEviction { evicted_start_time: i64 },
    /// Buffer is full and the packet predates everything retained
    TooOld { oldest_retained: i64 },
}

impl InsertOutcome {
    pub fn is_stored(&self) -> bool {
        !matches!(self, InsertOutcome::TooOld { .. })
    }

    pub fn evicted(&self) -> bool {
        matches!(self, InsertOutcome::InsertedWithEviction { .. })
    }
}

#[derive(Clone, Debug)]
pub struct CircularBuffer {
    channel: ChannelKey,
    capacity: usize,
    packets: VecDeque<DataPacket>,
}

impl CircularBuffer {
    /// Create an empty buffer; a capacity of zero is raised to one
    pub fn new(channel: ChannelKey, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            channel,
            capacity,
            packets: VecDeque::with_capacity(capacity),
        }
    }

    pub fn channel(&self) -> &ChannelKey {
        &self.channel
    }

    /// Insert or replace a packet, keeping start-time order
    pub fn insert(&mut self, packet: DataPacket) -> Result<InsertOutcome, BufferError> {
        if packet.channel() != &self.channel {
            return Err(BufferError::ChannelMismatch {
                expected: self.channel.clone(),
                found: packet.channel().clone(),
            });
        }

        let start = packet.start_time();

        // Fast path: in-order arrival
        let newest = self.packets.back().map(DataPacket::start_time);
        if newest.map_or(true, |t| start > t) && self.packets.len() < self.capacity {
            self.packets.push_back(packet);
            return Ok(InsertOutcome::Inserted);
        }

        let mut idx = self.packets.partition_point(|p| p.start_time() < start);

        if let Some(existing) = self.packets.get_mut(idx) {
            if existing.start_time() == start {
                *existing = packet;
                return Ok(InsertOutcome::Replaced);
            }
        }

        if self.packets.len() < self.capacity {
            self.packets.insert(idx, packet);
            return Ok(InsertOutcome::Inserted);
        }

        if idx == 0 {
            return Ok(InsertOutcome::TooOld {
                oldest_retained: self.packets.front().map_or(start, DataPacket::start_time),
            });
        }

        let evicted_start_time = match self.packets.pop_front() {
            Some(evicted) => evicted.start_time(),
            None => start,
        };
        idx -= 1;
        self.packets.insert(idx, packet);

        Ok(InsertOutcome::InsertedWithEviction { evicted_start_time })
    }

    /// Copies of all packets overlapping `[t0, t1]`, in time order
    ///
    /// An inverted range yields nothing.
    pub fn query(&self, t0: i64, t1: i64) -> Vec<DataPacket> {
        if t0 > t1 {
            return Vec::new();
        }
        let hi = self.packets.partition_point(|p| p.start_time() <= t1);
        self.packets
            .range(..hi)
            .filter(|p| p.end_time() >= t0)
            .cloned()
            .collect()
    }

    /// Copies of all packets ending at or after `t0`
    pub fn packets_since(&self, t0: i64) -> Vec<DataPacket> {
        self.packets
            .iter()
            .filter(|p| p.end_time() >= t0)
            .cloned()
            .collect()
    }

    /// Copies of every retained packet
    pub fn packets(&self) -> Vec<DataPacket> {
        self.packets.iter().cloned().collect()
    }

    pub fn earliest_start_time(&self) -> Option<i64> {
        self.packets.front().map(DataPacket::start_time)
    }

    pub fn latest_start_time(&self) -> Option<i64> {
        self.packets.back().map(DataPacket::start_time)
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.packets.len() == self.capacity
    }

    pub fn clear(&mut self) {
        self.packets.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::seq::SliceRandom;

    fn key() -> ChannelKey {
        ChannelKey::new("UU", "FORK", "HHZ", "01").unwrap()
    }

    /// One sample per µs, so a packet of `n` samples spans `n - 1` µs
    fn packet(start: i64, n: usize) -> DataPacket {
        DataPacket::new(key(), start, 1_000_000.0, vec![start as f64; n]).unwrap()
    }

    fn starts(buffer: &CircularBuffer) -> Vec<i64> {
        buffer.packets().iter().map(DataPacket::start_time).collect()
    }

    #[test]
    fn test_too_old_then_evict_oldest() {
        let mut buffer = CircularBuffer::new(key(), 3);
        for t in [10, 20, 30] {
            assert_eq!(buffer.insert(packet(t, 1)).unwrap(), InsertOutcome::Inserted);
        }

        assert_eq!(
            buffer.insert(packet(5, 1)).unwrap(),
            InsertOutcome::TooOld { oldest_retained: 10 }
        );
        assert_eq!(starts(&buffer), vec![10, 20, 30]);

        assert_eq!(
            buffer.insert(packet(40, 1)).unwrap(),
            InsertOutcome::InsertedWithEviction {
                evicted_start_time: 10
            }
        );
        assert_eq!(starts(&buffer), vec![20, 30, 40]);
    }

    #[test]
    fn test_out_of_order_insert_when_full() {
        let mut buffer = CircularBuffer::new(key(), 3);
        for t in [10, 20, 30] {
            buffer.insert(packet(t, 1)).unwrap();
        }

        let outcome = buffer.insert(packet(25, 1)).unwrap();
        assert_eq!(
            outcome,
            InsertOutcome::InsertedWithEviction {
                evicted_start_time: 10
            }
        );
        assert_eq!(starts(&buffer), vec![20, 25, 30]);
    }

    #[test]
    fn test_replace_same_start_time() {
        let mut buffer = CircularBuffer::new(key(), 3);
        buffer.insert(packet(10, 1)).unwrap();
        buffer.insert(packet(20, 1)).unwrap();

        let outcome = buffer.insert(packet(10, 5)).unwrap();
        assert_eq!(outcome, InsertOutcome::Replaced);
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.packets()[0].sample_count(), 5);
    }

    #[test]
    fn test_replace_oldest_when_full() {
        let mut buffer = CircularBuffer::new(key(), 2);
        buffer.insert(packet(10, 1)).unwrap();
        buffer.insert(packet(20, 1)).unwrap();

        assert_eq!(buffer.insert(packet(10, 3)).unwrap(), InsertOutcome::Replaced);
        assert_eq!(starts(&buffer), vec![10, 20]);
    }

    #[test]
    fn test_insert_wrong_channel() {
        let mut buffer = CircularBuffer::new(key(), 2);
        let other = ChannelKey::new("UU", "FORK", "HHN", "01").unwrap();
        let packet = DataPacket::new(other, 0, 1.0, vec![0.0]).unwrap();
        assert!(matches!(
            buffer.insert(packet),
            Err(BufferError::ChannelMismatch { .. })
        ));
    }

    #[test]
    fn test_query_overlap() {
        let mut buffer = CircularBuffer::new(key(), 10);
        // [0,9] [10,19] [20,29] [30,39]
        for t in [0, 10, 20, 30] {
            buffer.insert(packet(t, 10)).unwrap();
        }

        let hits: Vec<i64> = buffer.query(15, 25).iter().map(DataPacket::start_time).collect();
        assert_eq!(hits, vec![10, 20]);

        let hits: Vec<i64> = buffer.query(9, 9).iter().map(DataPacket::start_time).collect();
        assert_eq!(hits, vec![0]);

        assert!(buffer.query(40, 100).is_empty());
        assert!(buffer.query(25, 15).is_empty());
        assert_eq!(buffer.query(i64::MIN, i64::MAX).len(), 4);
    }

    #[test]
    fn test_query_returns_copies() {
        let mut buffer = CircularBuffer::new(key(), 1);
        buffer.insert(packet(10, 1)).unwrap();
        let copies = buffer.query(0, 100);
        buffer.clear();
        assert_eq!(copies.len(), 1);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_introspection() {
        let mut buffer = CircularBuffer::new(key(), 2);
        assert!(buffer.is_empty());
        assert_eq!(buffer.capacity(), 2);
        assert_eq!(buffer.earliest_start_time(), None);

        buffer.insert(packet(20, 1)).unwrap();
        buffer.insert(packet(10, 1)).unwrap();
        assert!(buffer.is_full());
        assert_eq!(buffer.earliest_start_time(), Some(10));
        assert_eq!(buffer.latest_start_time(), Some(20));
        assert_eq!(buffer.packets_since(15).len(), 1);
    }

    #[test]
    fn test_zero_capacity_is_raised() {
        let buffer = CircularBuffer::new(key(), 0);
        assert_eq!(buffer.capacity(), 1);
    }

    #[test]
    fn test_random_order_keeps_newest() {
        let mut times: Vec<i64> = (0..50).map(|t| t * 10).collect();
        times.shuffle(&mut rand::thread_rng());

        let mut buffer = CircularBuffer::new(key(), 50);
        for t in &times {
            buffer.insert(packet(*t, 1)).unwrap();
        }
        let expected: Vec<i64> = (0..50).map(|t| t * 10).collect();
        assert_eq!(starts(&buffer), expected);
    }

    proptest! {
        #[test]
        fn prop_bounded_and_strictly_ordered(
            capacity in 1usize..16,
            inserts in proptest::collection::vec((0i64..200, 1usize..20), 0..200),
        ) {
            let mut buffer = CircularBuffer::new(key(), capacity);
            for (start, n) in inserts {
                let before = buffer.len();
                let had_start = buffer.packets().iter().any(|p| p.start_time() == start);
                let outcome = buffer.insert(packet(start, n)).unwrap();

                prop_assert!(buffer.len() <= capacity);
                let s = starts(&buffer);
                prop_assert!(s.windows(2).all(|w| w[0] < w[1]));

                match outcome {
                    InsertOutcome::Replaced => {
                        prop_assert!(had_start);
                        prop_assert_eq!(buffer.len(), before);
                    }
                    InsertOutcome::Inserted => prop_assert_eq!(buffer.len(), before + 1),
                    InsertOutcome::InsertedWithEviction { .. } => {
                        prop_assert_eq!(before, capacity);
                        prop_assert_eq!(buffer.len(), capacity);
                    }
                    InsertOutcome::TooOld { .. } => {
                        prop_assert_eq!(buffer.len(), before);
                        prop_assert!(s[0] > start);
                    }
                }
            }
        }

        #[test]
        fn prop_query_matches_overlap_filter(
            inserts in proptest::collection::vec((0i64..500, 1usize..30), 1..40),
            t0 in 0i64..600,
            t1 in 0i64..600,
        ) {
            let mut buffer = CircularBuffer::new(key(), 64);
            for (start, n) in inserts {
                buffer.insert(packet(start, n)).unwrap();
            }

            let expected: Vec<DataPacket> = buffer
                .packets()
                .into_iter()
                .filter(|p| t0 <= t1 && p.overlaps(t0, t1))
                .collect();
            prop_assert_eq!(buffer.query(t0, t1), expected);
        }
    }
}
