//! Arbitrary parent responses through a relay's router.
//!
//! Whatever the parent sends, interpreting it must not panic, and a queued
//! packet must be waiting under the hop it was reported for.

#![no_main]

use std::sync::Arc;

use libfuzzer_sys::fuzz_target;
use odonet_core::{RelayRouter, ResponseOutcome, RoutingDirectory};
use odonet_proto::{NodeId, Packet};

fuzz_target!(|data: &[u8]| {
    let Ok(packet) = Packet::decode(data) else {
        return;
    };

    let Ok(id) = NodeId::new('B') else {
        return;
    };
    let directory = Arc::new(RoutingDirectory::new());
    let router = RelayRouter::new(id, Arc::clone(&directory));

    if let Ok(ResponseOutcome::Queued { next_hop }) = router.interpret_response(Some(packet)) {
        assert_eq!(directory.pending(next_hop), 1);
    }
});
