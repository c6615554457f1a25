//! Store-and-forward queues keyed by next hop.
//!
//! Children can only receive data in the response to their own uplink, so
//! anything travelling down the tree waits here until the next hop makes
//! contact.
//!
//! ```text
//!   root queues "BC=config" under B
//!   B contacts root   -> response "BC=config"
//!   B strips itself   -> queues "C=config" under C
//!   C contacts B      -> response "C=config"
//! ```
//!
//! # Overflow
//!
//! Each queue holds at most `capacity` packets. When a branch stays silent
//! long enough to fill its queue, the oldest packet is dropped to make room.
//! Operator commands are idempotent requests (send config, reboot, ...),
//! so the newest ones are the ones worth keeping.

use std::collections::{HashMap, VecDeque};

use odonet_proto::{NodeId, Packet};
use parking_lot::Mutex;
use tracing::warn;

/// Per-next-hop FIFO queues shared by the tick loop and connection handlers.
///
/// # Invariants
///
/// - Packets are queued under the *immediate next hop*, never the final
///   destination.
/// - Per-key FIFO: packets for one key come out in the order they went in.
/// - At most `capacity` packets per key.
#[derive(Debug)]
pub struct RoutingDirectory {
    queues: Mutex<HashMap<NodeId, VecDeque<Packet>>>,
    capacity: usize,
}

impl RoutingDirectory {
    /// Queue depth per next hop when none is configured
    pub const DEFAULT_CAPACITY: usize = 64;

    /// Directory with [`RoutingDirectory::DEFAULT_CAPACITY`] per key
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// Directory holding at most `capacity` packets per key (minimum 1)
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self { queues: Mutex::new(HashMap::new()), capacity: capacity.max(1) }
    }

    /// Queue `packet` for delivery to `next_hop`.
    ///
    /// Returns the packet that was dropped to make room, if the queue was
    /// full.
    pub fn enqueue(&self, next_hop: NodeId, packet: Packet) -> Option<Packet> {
        let mut queues = self.queues.lock();
        let queue = queues.entry(next_hop).or_default();

        let dropped = if queue.len() >= self.capacity { queue.pop_front() } else { None };
        if dropped.is_some() {
            warn!(next_hop = %next_hop, capacity = self.capacity, "Queue full, dropping oldest packet");
        }

        queue.push_back(packet);
        dropped
    }

    /// Take the oldest packet queued for `next_hop`, if any.
    pub fn dequeue_if_any(&self, next_hop: NodeId) -> Option<Packet> {
        let mut queues = self.queues.lock();
        let queue = queues.get_mut(&next_hop)?;
        let packet = queue.pop_front();
        if queue.is_empty() {
            queues.remove(&next_hop);
        }
        packet
    }

    /// Number of packets waiting for `next_hop`
    pub fn pending(&self, next_hop: NodeId) -> usize {
        self.queues.lock().get(&next_hop).map_or(0, VecDeque::len)
    }

    /// Number of packets waiting across all keys
    pub fn total_pending(&self) -> usize {
        self.queues.lock().values().map(VecDeque::len).sum()
    }

    /// Drop everything queued for `next_hop`
    pub fn clear(&self, next_hop: NodeId) {
        self.queues.lock().remove(&next_hop);
    }
}

impl Default for RoutingDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread};

    use odonet_proto::{Address, PacketKind};
    use proptest::prelude::*;

    use super::*;

    fn id(c: char) -> NodeId {
        NodeId::new(c).unwrap()
    }

    fn packet(n: u32) -> Packet {
        Packet::new("BC".parse().unwrap(), PacketKind::Text, n.to_string().into_bytes())
    }

    #[test]
    fn fifo_per_key() {
        let directory = RoutingDirectory::new();
        directory.enqueue(id('B'), packet(1));
        directory.enqueue(id('B'), packet(2));

        assert_eq!(directory.dequeue_if_any(id('B')), Some(packet(1)));
        assert_eq!(directory.dequeue_if_any(id('B')), Some(packet(2)));
        assert_eq!(directory.dequeue_if_any(id('B')), None);
    }

    #[test]
    fn empty_key_yields_nothing() {
        let directory = RoutingDirectory::new();
        directory.enqueue(id('B'), packet(1));

        assert_eq!(directory.dequeue_if_any(id('X')), None);
        assert_eq!(directory.pending(id('B')), 1);
    }

    #[test]
    fn overflow_drops_oldest() {
        let directory = RoutingDirectory::with_capacity(2);
        assert_eq!(directory.enqueue(id('B'), packet(1)), None);
        assert_eq!(directory.enqueue(id('B'), packet(2)), None);
        assert_eq!(directory.enqueue(id('B'), packet(3)), Some(packet(1)));

        assert_eq!(directory.dequeue_if_any(id('B')), Some(packet(2)));
        assert_eq!(directory.dequeue_if_any(id('B')), Some(packet(3)));
    }

    #[test]
    fn keys_are_independent() {
        let directory = RoutingDirectory::new();
        directory.enqueue(id('B'), packet(1));
        directory.enqueue(id('D'), Packet::new(Address::empty(), PacketKind::Text, &b"x"[..]));

        directory.clear(id('D'));
        assert_eq!(directory.pending(id('D')), 0);
        assert_eq!(directory.total_pending(), 1);
    }

    #[test]
    fn concurrent_producers_keep_per_producer_order() {
        let directory = Arc::new(RoutingDirectory::with_capacity(10_000));

        let handles: Vec<_> = ['B', 'C', 'D']
            .into_iter()
            .map(|key| {
                let directory = Arc::clone(&directory);
                thread::spawn(move || {
                    for n in 0..500 {
                        directory.enqueue(id(key), packet(n));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        for key in ['B', 'C', 'D'] {
            for n in 0..500 {
                assert_eq!(directory.dequeue_if_any(id(key)), Some(packet(n)));
            }
        }
        assert_eq!(directory.total_pending(), 0);
    }

    proptest! {
        #[test]
        fn dequeue_order_matches_enqueue_order(values in prop::collection::vec(any::<u32>(), 0..50)) {
            let directory = RoutingDirectory::with_capacity(64);
            for v in &values {
                directory.enqueue(id('B'), packet(*v));
            }

            let drained: Vec<Packet> = std::iter::from_fn(|| directory.dequeue_if_any(id('B'))).collect();
            let expected: Vec<Packet> = values.iter().map(|v| packet(*v)).collect();
            prop_assert_eq!(drained, expected);
        }
    }
}
