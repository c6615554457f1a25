//! Random bytes into the packet and payload decoders.
//!
//! Decoding must never panic, and anything that decodes must re-encode to
//! the bytes it was decoded from.

#![no_main]

use libfuzzer_sys::fuzz_target;
use odonet_proto::{Packet, Payload, packet::Scan};

fuzz_target!(|data: &[u8]| {
    // The scanner must agree with the full decoder on complete input.
    let scanned = match Packet::scan(data) {
        Ok(Scan::Complete(layout)) => Some(layout.total_len()),
        Ok(Scan::Incomplete { .. }) | Err(_) => None,
    };

    let Ok(packet) = Packet::decode(data) else {
        return;
    };
    assert_eq!(scanned, Some(packet.encoded_len()));

    let encoded = packet.to_bytes().expect("decoded packet re-encodes");
    assert_eq!(&encoded[..], &data[..packet.encoded_len()]);

    // Payload decoding may fail (bad UTF-8, bad JSON, bad CBOR) but must not
    // panic.
    let _ = Payload::from_packet(&packet);

    // Hop manipulation stays within the address limit.
    if let Some((_, inner)) = packet.strip_hop() {
        assert_eq!(inner.payload(), packet.payload());
    }
});
