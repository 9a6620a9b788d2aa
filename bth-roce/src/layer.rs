//! # Layer Delineation
//!
//! Where the BTH ends, the next protocol layer begins. This module carries the small seam the
//! codec needs to take part in a layered decoding pipeline: the OSI classification reported by
//! each decoded layer, the opaque [`PayloadLayer`] that follows a BTH, and the port predicate a
//! UDP layer uses to decide that its payload is a BTH at all.
//!
//! The codec does not know the full layer stack. [`Bth::parse_next_layer`] instead takes a
//! factory for the next layer from the caller, so the stack wiring stays outside this crate.

use crate::header::Bth;
use const_roce::ROCEV2_UDP_PORT;
use core::fmt;

/// OSI model classification of a decoded layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsiLayer {
    Physical,
    DataLink,
    Network,
    Transport,
    Session,
    Presentation,
    Application,
}

/// Whether `port` is the IANA registered RoCEv2 UDP destination port.
///
/// This predicate is the only signal a previous layer has for deciding to hand its payload to
/// this codec; the codec itself performs no sniffing.
pub const fn is_infiniband_port(port: u16) -> bool {
    port == ROCEV2_UDP_PORT
}

/// Opaque bytes following a header, not interpreted further.
#[derive(Debug)]
pub struct PayloadLayer<B> {
    inner: B,
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> PayloadLayer<B> {
    pub fn from_bytes(inner: B) -> Self {
        Self { inner }
    }

    pub fn data(&self) -> &[u8] {
        self.inner.as_ref()
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        self.inner.as_mut()
    }

    pub fn len(&self) -> usize {
        self.inner.as_ref().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.as_ref().is_empty()
    }

    pub fn osi_layer(&self) -> OsiLayer {
        OsiLayer::Application
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> fmt::Display for PayloadLayer<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Payload, {} bytes", self.len())
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> Bth<B> {
    /// OSI classification of the BTH, for layering and filtering.
    pub fn osi_layer(&self) -> OsiLayer {
        OsiLayer::Transport
    }

    /// Hands the bytes past the header to `factory` and returns its product.
    ///
    /// Returns [`None`] when no bytes remain beyond the header, in which case `factory` is never
    /// called. The factory receives exactly the trailing bytes; mutation through them lands in
    /// the backing buffer.
    pub fn parse_next_layer<'a, L, F>(&'a mut self, factory: F) -> Option<L>
    where
        F: FnOnce(&'a mut [u8]) -> L,
    {
        let rest = self.payload();
        if rest.is_empty() {
            return None;
        }
        Some(factory(rest))
    }

    /// Default delineation: the next layer is an opaque [`PayloadLayer`].
    pub fn parse_payload(&mut self) -> Option<PayloadLayer<&mut [u8]>> {
        self.parse_next_layer(PayloadLayer::from_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::format;

    #[test]
    fn infiniband_port_predicate() {
        assert!(is_infiniband_port(4791));
        assert!(!is_infiniband_port(4790));
    }

    #[test]
    fn bth_classifies_as_transport() {
        let mut bytes = [0u8; 12];
        let bth = Bth::from_bytes(&mut bytes[..]).unwrap();
        assert_eq!(bth.osi_layer(), OsiLayer::Transport);
    }

    #[test]
    fn no_trailing_bytes_no_next_layer() {
        let mut bytes = [0u8; 12];
        let mut bth = Bth::from_bytes(&mut bytes[..]).unwrap();
        assert!(bth.parse_payload().is_none());
        assert!(bth.parse_next_layer(|rest| rest.len()).is_none());
    }

    #[test]
    fn trailing_bytes_become_one_payload_layer() {
        let mut bytes = [0u8; 17];
        bytes[12..].copy_from_slice(b"hello");
        let mut bth = Bth::from_bytes(&mut bytes[..]).unwrap();
        let payload = bth.parse_payload().unwrap();
        assert_eq!(payload.len(), 5);
        assert_eq!(payload.data(), b"hello");
        assert_eq!(payload.osi_layer(), OsiLayer::Application);
        assert_eq!(format!("{}", payload), "Payload, 5 bytes");
    }

    #[test]
    fn factory_writes_land_in_the_backing_buffer() {
        let mut bytes = [0u8; 13];
        {
            let mut bth = Bth::from_bytes(&mut bytes[..]).unwrap();
            bth.parse_next_layer(|rest| rest[0] = 0xAA).unwrap();
        }
        assert_eq!(bytes[12], 0xAA);
    }
}
