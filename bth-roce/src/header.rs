//! # BTH Header
//!
//! In-place view over the 12 byte Base Transport Header at the start of a RoCEv2 UDP payload.
//!
//! [`Bth`] is generic over its backing buffer, so the same type serves both directions: wrapping
//! bytes received from a previous layer (`Bth<&mut [u8]>`, no allocation) and building a fresh
//! canonical header (`Bth<Vec<u8>>`, one 12 byte allocation). Every accessor converts between
//! network byte order on the wire and host order at the API; callers never see swapped values.
//!
//! Setters are read-modify-write over the containing byte or word: bits outside the target field,
//! including the reserved runs and any flag cohabiting the same word, are left untouched. A value
//! wider than its field is silently truncated to the field's bit width, mirroring raw bit-masking
//! semantics on the wire.

use crate::Error;
use alloc::{vec, vec::Vec};
use const_roce::{
    BTH_FLAGS_OFFSET, BTH_HEADER_SIZE, BTH_PKEY_OFFSET, BTH_PSN_WORD_OFFSET, BTH_QPN_WORD_OFFSET,
};
use core::fmt;

// Byte 1 packs four fields, MSB first.
const SOLICITED_EVENT_MASK: u8 = 0b1000_0000;
const MIGRATION_STATE_MASK: u8 = 0b0100_0000;
const PAD_COUNT_MASK: u8 = 0b0011_0000;
const PAD_COUNT_SHIFT: u8 = 4;
const TVER_MASK: u8 = 0b0000_1111;

// Sub-fields of the big-endian word at offset 4.
const FECN_MASK: u32 = 1 << 31;
const BECN_MASK: u32 = 1 << 30;
const RESV6A_MASK: u32 = 0x3F00_0000;
const QPN_MASK: u32 = 0x00FF_FFFF;

// Sub-fields of the big-endian word at offset 8.
const ACK_REQUEST_MASK: u32 = 1 << 31;
const RESV7_MASK: u32 = 0x7F00_0000;
const PSN_MASK: u32 = 0x00FF_FFFF;

/// Checks whether `data` can hold a Base Transport Header.
///
/// The BTH carries no magic number and no checksum, so validity is purely a size guarantee.
/// Telling a BTH apart from arbitrary bytes is the transport context's job (see
/// [`crate::layer::is_infiniband_port`]); inventing a stronger check here would diverge from the
/// wire protocol.
pub const fn is_data_valid(data: &[u8]) -> bool {
    data.len() >= BTH_HEADER_SIZE
}

/// View over a Base Transport Header inside a caller-owned buffer.
///
/// The first [`Bth::SIZE`] bytes of the buffer are the header window; anything past it belongs to
/// the next layer (see [`Bth::payload`]). Mutation happens in place, so it is visible to every
/// other reference into the same buffer once this view is released.
#[derive(Debug, Clone)]
pub struct Bth<B> {
    inner: B,
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> Bth<B> {
    /// Size of the BTH on the wire. The header never grows or shrinks.
    pub const SIZE: usize = BTH_HEADER_SIZE;

    /// Wraps existing raw bytes, first checking that a whole header fits.
    ///
    /// On failure returns [`Error::UnexpectedHeaderLength`] with the number of missing bytes.
    /// The bytes are not otherwise inspected.
    #[inline]
    pub fn from_bytes(inner: B) -> Result<Self, Error> {
        let len = inner.as_ref().len();
        if len < Self::SIZE {
            return Err(Error::UnexpectedHeaderLength((Self::SIZE - len) as isize));
        }
        Ok(Self::from_bytes_unchecked(inner))
    }

    /// Wraps existing raw bytes without any length check.
    ///
    /// The caller is supposed to already know that at least [`Bth::SIZE`] bytes are present,
    /// e.g. via [`is_data_valid`]; field access on a shorter buffer panics.
    #[inline]
    pub fn from_bytes_unchecked(inner: B) -> Self {
        Self { inner }
    }

    /// Consumes the view and returns the backing buffer.
    pub fn into_inner(self) -> B {
        self.inner
    }

    /// The raw bytes backing this view, header first.
    pub fn as_bytes(&self) -> &[u8] {
        self.inner.as_ref()
    }

    /// Size of the header window, always [`Bth::SIZE`].
    #[inline]
    pub fn header_len(&self) -> usize {
        Self::SIZE
    }

    /// The bytes past the header, owned by the next layer.
    pub fn payload(&mut self) -> &mut [u8] {
        &mut self.inner.as_mut()[Self::SIZE..]
    }

    /// The BTH carries no checksum or length field, so there is nothing to recompute.
    pub fn compute_calculated_fields(&mut self) {}

    /// Operation code, defining the interpretation of the remaining header and payload bytes.
    #[inline]
    pub fn opcode(&self) -> u8 {
        self.inner.as_ref()[0]
    }

    #[inline]
    pub fn set_opcode(&mut self, opcode: u8) {
        self.inner.as_mut()[0] = opcode;
    }

    /// Solicited event: the responder shall invoke the CQ event handler.
    pub fn solicited_event(&self) -> bool {
        self.flags() & SOLICITED_EVENT_MASK != 0
    }

    pub fn set_solicited_event(&mut self, se: bool) {
        self.update_flags(SOLICITED_EVENT_MASK, se);
    }

    /// MigReq bit. Set when the connection or EE context has been migrated, unset when there is
    /// no change in the current migration state.
    pub fn migration_state(&self) -> bool {
        self.flags() & MIGRATION_STATE_MASK != 0
    }

    pub fn set_migration_state(&mut self, mig: bool) {
        self.update_flags(MIGRATION_STATE_MASK, mig);
    }

    /// Number of pad bytes (0 to 3) appended to the payload to stretch it to a multiple of 4
    /// bytes.
    pub fn pad_count(&self) -> u8 {
        (self.flags() & PAD_COUNT_MASK) >> PAD_COUNT_SHIFT
    }

    /// Only the low 2 bits of `pad` are kept.
    pub fn set_pad_count(&mut self, pad: u8) {
        let flags = self.flags();
        self.set_flags((flags & !PAD_COUNT_MASK) | ((pad << PAD_COUNT_SHIFT) & PAD_COUNT_MASK));
    }

    /// Version of the IBA transport used for this packet.
    pub fn transport_header_version(&self) -> u8 {
        self.flags() & TVER_MASK
    }

    /// Only the low 4 bits of `tver` are kept.
    pub fn set_transport_header_version(&mut self, tver: u8) {
        let flags = self.flags();
        self.set_flags((flags & !TVER_MASK) | (tver & TVER_MASK));
    }

    /// Key identifying the partition the destination QP or EE context is a member of.
    pub fn partition_key(&self) -> u16 {
        let data = self.inner.as_ref();
        u16::from_be_bytes([data[BTH_PKEY_OFFSET], data[BTH_PKEY_OFFSET + 1]])
    }

    pub fn set_partition_key(&mut self, pkey: u16) {
        self.inner.as_mut()[BTH_PKEY_OFFSET..BTH_PKEY_OFFSET + 2]
            .copy_from_slice(&pkey.to_be_bytes());
    }

    /// FECN bit: the packet went through a point of congestion.
    pub fn fecn(&self) -> bool {
        self.word(BTH_QPN_WORD_OFFSET) & FECN_MASK != 0
    }

    pub fn set_fecn(&mut self, fecn: bool) {
        self.update_word(BTH_QPN_WORD_OFFSET, FECN_MASK, if fecn { FECN_MASK } else { 0 });
    }

    /// BECN bit: the packet indicated by this header was subject to forward congestion. Set in an
    /// ACK or CN BTH.
    pub fn becn(&self) -> bool {
        self.word(BTH_QPN_WORD_OFFSET) & BECN_MASK != 0
    }

    pub fn set_becn(&mut self, becn: bool) {
        self.update_word(BTH_QPN_WORD_OFFSET, BECN_MASK, if becn { BECN_MASK } else { 0 });
    }

    /// Destination queue pair identifier, 24 bits.
    pub fn queue_pair_number(&self) -> u32 {
        self.word(BTH_QPN_WORD_OFFSET) & QPN_MASK
    }

    /// Only the low 24 bits of `qpn` are kept. FECN, BECN and the reserved run sharing the word
    /// are left untouched.
    pub fn set_queue_pair_number(&mut self, qpn: u32) {
        self.update_word(BTH_QPN_WORD_OFFSET, QPN_MASK, qpn);
    }

    /// AckReq bit: requests the responder to schedule an acknowledgment on the associated QP.
    pub fn ack_request(&self) -> bool {
        self.word(BTH_PSN_WORD_OFFSET) & ACK_REQUEST_MASK != 0
    }

    pub fn set_ack_request(&mut self, ack: bool) {
        self.update_word(
            BTH_PSN_WORD_OFFSET,
            ACK_REQUEST_MASK,
            if ack { ACK_REQUEST_MASK } else { 0 },
        );
    }

    /// Position of this packet within the ordered stream of its queue pair, 24 bits.
    pub fn packet_sequence_number(&self) -> u32 {
        self.word(BTH_PSN_WORD_OFFSET) & PSN_MASK
    }

    /// Only the low 24 bits of `psn` are kept. AckReq and the reserved run sharing the word are
    /// left untouched.
    pub fn set_packet_sequence_number(&mut self, psn: u32) {
        self.update_word(BTH_PSN_WORD_OFFSET, PSN_MASK, psn);
    }

    /// Forces both reserved runs (6 bits beside the queue pair number, 7 bits beside the packet
    /// sequence number) to zero. The cohabiting flag bits and 24 bit fields are left untouched.
    /// Idempotent.
    pub fn clear_reserved(&mut self) {
        self.update_word(BTH_QPN_WORD_OFFSET, RESV6A_MASK, 0);
        self.update_word(BTH_PSN_WORD_OFFSET, RESV7_MASK, 0);
    }

    #[inline]
    fn flags(&self) -> u8 {
        self.inner.as_ref()[BTH_FLAGS_OFFSET]
    }

    #[inline]
    fn set_flags(&mut self, flags: u8) {
        self.inner.as_mut()[BTH_FLAGS_OFFSET] = flags;
    }

    #[inline]
    fn update_flags(&mut self, mask: u8, on: bool) {
        let flags = self.flags();
        self.set_flags(if on { flags | mask } else { flags & !mask });
    }

    #[inline]
    fn word(&self, offset: usize) -> u32 {
        let data = self.inner.as_ref();
        u32::from_be_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]])
    }

    // All word-level setters funnel through here so a sub-field write can only ever change the
    // bits selected by its mask.
    #[inline]
    fn update_word(&mut self, offset: usize, mask: u32, bits: u32) {
        let word = (self.word(offset) & !mask) | (bits & mask);
        self.inner.as_mut()[offset..offset + 4].copy_from_slice(&word.to_be_bytes());
    }
}

impl Bth<Vec<u8>> {
    /// Builds a fresh canonical header from field values.
    ///
    /// Allocates the 12 byte buffer zero-initialized and writes every field through the ordinary
    /// setters, so the result is bit-identical to sequential sets on a zeroed buffer. The
    /// transport header version, FECN, BECN and both reserved runs default to zero.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        opcode: u8,
        solicited_event: bool,
        migration_state: bool,
        pad_count: u8,
        partition_key: u16,
        queue_pair_number: u32,
        ack_request: bool,
        packet_sequence_number: u32,
    ) -> Self {
        let mut bth = Self::from_bytes_unchecked(vec![0; BTH_HEADER_SIZE]);
        bth.set_opcode(opcode);
        bth.set_solicited_event(solicited_event);
        bth.set_migration_state(migration_state);
        bth.set_pad_count(pad_count);
        bth.set_partition_key(partition_key);
        bth.set_queue_pair_number(queue_pair_number);
        bth.set_ack_request(ack_request);
        bth.set_packet_sequence_number(packet_sequence_number);
        bth
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> fmt::Display for Bth<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BTH, OpCode: {}, QPN: 0x{:06x}, PSN: {}",
            self.opcode(),
            self.queue_pair_number(),
            self.packet_sequence_number()
        )
    }
}

#[cfg(test)]
fn bth_from_seed(seed: &[u8]) -> Bth<Vec<u8>> {
    let mut bytes = vec![0; BTH_HEADER_SIZE];
    for (dst, src) in bytes.iter_mut().zip(seed) {
        *dst = *src;
    }
    Bth::from_bytes(bytes).unwrap()
}

#[cfg(test)]
#[quickcheck_macros::quickcheck]
fn queue_pair_number_roundtrips_without_touching_neighbors(seed: Vec<u8>, qpn: u32) -> bool {
    let mut bth = bth_from_seed(&seed);
    let before = bth.as_bytes().to_vec();
    bth.set_queue_pair_number(qpn);
    let after = bth.as_bytes();
    bth.queue_pair_number() == (qpn & QPN_MASK)
        && after[..BTH_QPN_WORD_OFFSET] == before[..BTH_QPN_WORD_OFFSET]
        && after[BTH_QPN_WORD_OFFSET] == before[BTH_QPN_WORD_OFFSET]
        && after[BTH_PSN_WORD_OFFSET..] == before[BTH_PSN_WORD_OFFSET..]
}

#[cfg(test)]
#[quickcheck_macros::quickcheck]
fn packet_sequence_number_roundtrips_without_touching_neighbors(seed: Vec<u8>, psn: u32) -> bool {
    let mut bth = bth_from_seed(&seed);
    let before = bth.as_bytes().to_vec();
    bth.set_packet_sequence_number(psn);
    let after = bth.as_bytes();
    bth.packet_sequence_number() == (psn & PSN_MASK)
        && after[..BTH_PSN_WORD_OFFSET] == before[..BTH_PSN_WORD_OFFSET]
        && after[BTH_PSN_WORD_OFFSET] == before[BTH_PSN_WORD_OFFSET]
}

#[cfg(test)]
#[quickcheck_macros::quickcheck]
fn flag_byte_fields_roundtrip_independently(seed: Vec<u8>, pad: u8, tver: u8) -> bool {
    let mut bth = bth_from_seed(&seed);
    let se = bth.solicited_event();
    let mig = bth.migration_state();
    bth.set_pad_count(pad);
    bth.set_transport_header_version(tver);
    let before = bth.as_bytes().to_vec();
    bth.set_solicited_event(!se);
    bth.set_migration_state(!mig);
    bth.pad_count() == (pad & 0b11)
        && bth.transport_header_version() == (tver & 0b1111)
        && bth.solicited_event() == !se
        && bth.migration_state() == !mig
        && bth.as_bytes()[0] == before[0]
        && bth.as_bytes()[BTH_PKEY_OFFSET..] == before[BTH_PKEY_OFFSET..]
}

#[cfg(test)]
#[quickcheck_macros::quickcheck]
fn partition_key_roundtrips(seed: Vec<u8>, pkey: u16) -> bool {
    let mut bth = bth_from_seed(&seed);
    let before = bth.as_bytes().to_vec();
    bth.set_partition_key(pkey);
    let after = bth.as_bytes();
    bth.partition_key() == pkey
        && after[..BTH_PKEY_OFFSET] == before[..BTH_PKEY_OFFSET]
        && after[BTH_QPN_WORD_OFFSET..] == before[BTH_QPN_WORD_OFFSET..]
}

#[cfg(test)]
#[quickcheck_macros::quickcheck]
fn clear_reserved_is_idempotent_and_isolated(seed: Vec<u8>) -> bool {
    let mut bth = bth_from_seed(&seed);
    let fecn = bth.fecn();
    let becn = bth.becn();
    let qpn = bth.queue_pair_number();
    let ack = bth.ack_request();
    let psn = bth.packet_sequence_number();
    bth.clear_reserved();
    let once = bth.as_bytes().to_vec();
    bth.clear_reserved();
    once == bth.as_bytes()
        && bth.fecn() == fecn
        && bth.becn() == becn
        && bth.queue_pair_number() == qpn
        && bth.ack_request() == ack
        && bth.packet_sequence_number() == psn
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::format;

    #[test]
    fn too_short_buffer_is_rejected() {
        let mut short = [0u8; 11];
        assert_eq!(
            Bth::from_bytes(&mut short[..]).unwrap_err(),
            Error::UnexpectedHeaderLength(1)
        );
        assert!(!is_data_valid(&short));
        assert!(is_data_valid(&[0u8; 12]));
        assert!(is_data_valid(&vec![0u8; 4791]));
    }

    #[test]
    fn known_vector_decodes() {
        // SE=1 M=0 Pad=2 TVer=1, FECN set over QPN 0x123456, AckReq set over PSN 0xFF.
        let mut wire = [
            0x0A, 0xA1, 0xFF, 0xFF, 0x80, 0x12, 0x34, 0x56, 0x80, 0x00, 0x00, 0xFF,
        ];
        let bth = Bth::from_bytes(&mut wire[..]).unwrap();
        assert_eq!(bth.opcode(), 0x0A);
        assert!(bth.solicited_event());
        assert!(!bth.migration_state());
        assert_eq!(bth.pad_count(), 2);
        assert_eq!(bth.transport_header_version(), 1);
        assert_eq!(bth.partition_key(), 0xFFFF);
        assert!(bth.fecn());
        assert!(!bth.becn());
        assert_eq!(bth.queue_pair_number(), 0x123456);
        assert!(bth.ack_request());
        assert_eq!(bth.packet_sequence_number(), 0xFF);
    }

    #[test]
    fn construction_equivalence() {
        let built = Bth::new(0x0A, true, false, 2, 0xFFFF, 0x123456, true, 0x0000FF);

        let mut bytes = [0u8; 12];
        let mut set = Bth::from_bytes(&mut bytes[..]).unwrap();
        set.set_opcode(0x0A);
        set.set_solicited_event(true);
        set.set_migration_state(false);
        set.set_pad_count(2);
        set.set_partition_key(0xFFFF);
        set.set_queue_pair_number(0x123456);
        set.set_ack_request(true);
        set.set_packet_sequence_number(0x0000FF);

        assert_eq!(built.as_bytes(), set.as_bytes());
        assert_eq!(
            built.as_bytes(),
            [0x0A, 0xA0, 0xFF, 0xFF, 0x00, 0x12, 0x34, 0x56, 0x80, 0x00, 0x00, 0xFF]
        );
    }

    #[test]
    fn pad_count_truncates_silently() {
        let mut bytes = [0u8; 12];
        let mut bth = Bth::from_bytes(&mut bytes[..]).unwrap();
        bth.set_pad_count(7);
        assert_eq!(bth.pad_count(), 3);
        // Nothing outside the two pad bits moved.
        assert_eq!(bth.as_bytes()[BTH_FLAGS_OFFSET], 0b0011_0000);
    }

    #[test]
    fn congestion_bits_do_not_bleed() {
        let mut bytes = [0xFFu8; 12];
        let mut bth = Bth::from_bytes(&mut bytes[..]).unwrap();

        bth.set_fecn(false);
        assert!(!bth.fecn());
        assert!(bth.becn());
        assert_eq!(bth.queue_pair_number(), 0xFFFFFF);
        assert_eq!(bth.as_bytes()[BTH_QPN_WORD_OFFSET], 0x7F);

        bth.set_becn(false);
        assert!(!bth.becn());
        assert_eq!(bth.as_bytes()[BTH_QPN_WORD_OFFSET], 0x3F);

        bth.set_ack_request(false);
        assert!(!bth.ack_request());
        assert_eq!(bth.packet_sequence_number(), 0xFFFFFF);
        assert_eq!(bth.as_bytes()[BTH_PSN_WORD_OFFSET], 0x7F);
    }

    #[test]
    fn oversized_24_bit_values_truncate() {
        let mut bytes = [0u8; 12];
        let mut bth = Bth::from_bytes(&mut bytes[..]).unwrap();
        bth.set_queue_pair_number(0xAB12_3456);
        bth.set_packet_sequence_number(0xCD00_00FF);
        assert_eq!(bth.queue_pair_number(), 0x12_3456);
        assert_eq!(bth.packet_sequence_number(), 0xFF);
        // The high byte of each word stays clear.
        assert_eq!(bth.as_bytes()[BTH_QPN_WORD_OFFSET], 0);
        assert_eq!(bth.as_bytes()[BTH_PSN_WORD_OFFSET], 0);
    }

    #[test]
    fn display_renders_summary() {
        let bth = Bth::new(10, false, false, 0, 0, 0x123456, false, 255);
        assert_eq!(format!("{}", bth), "BTH, OpCode: 10, QPN: 0x123456, PSN: 255");
    }
}
