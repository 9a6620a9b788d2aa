// # BTH Header Example
//
// This example demonstrates how to use the `bth_roce` crate to build, inspect, and mutate a
// RoCEv2 Base Transport Header. It showcases how to:
//
// - Build a canonical header from field values.
// - Put the header in front of a payload and parse the whole buffer back, zero-copy.
// - Read and mutate individual fields in place, including the narrow bit fields.
// - Delineate the bytes that belong to the next layer.
//
// In a decoding pipeline, a UDP layer would first check the destination port with
// `is_infiniband_port` before handing its payload to this codec.
//
// ## Run
//
// ```
// cargo run --example bth_header
// ```

use bth_roce::{is_infiniband_port, Bth};

fn main() {
    // A UDP layer saw destination port 4791, so its payload is a BTH.
    assert!(is_infiniband_port(4791));

    // Build a fresh header: RC SEND Only opcode, solicited, no padding, default partition,
    // queue pair 0x000012, first packet of the stream.
    let bth = Bth::new(0x04, true, false, 0, 0xFFFF, 0x000012, false, 1);

    // Put the header in front of a payload, as it would appear on the wire.
    let mut wire = bth.as_bytes().to_vec();
    wire.extend_from_slice(b"rdma payload");

    // Parse the received buffer. No bytes are copied; the view borrows the buffer.
    let mut parsed = Bth::from_bytes(&mut wire[..]).expect("buffer holds a whole header");
    assert_eq!(parsed.opcode(), 0x04);
    assert_eq!(parsed.queue_pair_number(), 0x000012);
    println!("{}", parsed);

    // Mutations land directly in the backing buffer.
    parsed.set_packet_sequence_number(2);
    parsed.set_ack_request(true);

    // Everything past the 12 header bytes belongs to the next layer.
    let payload = parsed.parse_payload().expect("trailing bytes present");
    println!("{}", payload);
    assert_eq!(payload.data(), b"rdma payload");
}
