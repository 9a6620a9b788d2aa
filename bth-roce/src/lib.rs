//! # RoCEv2 Base Transport Header
//!
//! `bth_roce` provides a bit-exact codec for the Base Transport Header (BTH) that RoCEv2 packets
//! carry as the first bytes of their UDP payload.
//!
//! ## Wire Format
//!
//! The BTH is a fixed 12 byte structure in network byte order. Several fields are narrower than a
//! byte and two of them share a 32 bit word with a flag bit and a reserved run:
//!
//! | Byte offset | Bits (MSB..LSB) | Field | Width |
//! |-------------|-----------------|-------|-------|
//! | `0` | `7..0` | `OpCode` | 8 |
//! | `1` | `7` | `SolicitedEvent` | 1 |
//! | `1` | `6` | `MigrationState` | 1 |
//! | `1` | `5..4` | `PadCount` | 2 |
//! | `1` | `3..0` | `TransportHeaderVersion` | 4 |
//! | `2..3` | — | `PartitionKey` | 16 |
//! | `4..7` | `31` | `FECN` | 1 |
//! | `4..7` | `30` | `BECN` | 1 |
//! | `4..7` | `29..24` | reserved | 6 |
//! | `4..7` | `23..0` | `QueuePairNumber` | 24 |
//! | `8..11` | `31` | `AckRequest` | 1 |
//! | `8..11` | `30..24` | reserved | 7 |
//! | `8..11` | `23..0` | `PacketSequenceNumber` | 24 |
//!
//! ## Usage
//!
//! [`header::Bth`] is a view over a caller-owned byte buffer. It reads and mutates the header in
//! place; nothing is copied. A header can be parsed from received bytes with
//! [`header::Bth::from_bytes`] or built from field values with [`header::Bth::new`]. The bytes
//! past the header belong to the next protocol layer and are handed over through
//! [`header::Bth::parse_next_layer`].
//!
//! The BTH has no magic number and no checksum. The only signal that a UDP payload is a BTH at
//! all is the destination port, checked with [`layer::is_infiniband_port`], and the only
//! structural requirement on the bytes themselves is that 12 of them are present, checked with
//! [`header::is_data_valid`].

#![no_std]

extern crate alloc;

/// BTH wire codec
pub mod header;

/// BTH framing errors
pub mod error;

/// Layer classification and next-layer delineation
pub mod layer;

pub use error::Error;
pub use header::{is_data_valid, Bth};
pub use layer::{is_infiniband_port, OsiLayer, PayloadLayer};
