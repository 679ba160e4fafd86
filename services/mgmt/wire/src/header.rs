//! Management packet header and framing.
//!
//! Every packet in either direction starts with a 6-byte little-endian
//! header (opcode or event code, controller index, payload length).

use crate::error::WireError;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

/// Header size in bytes
pub const HEADER_SIZE: usize = 6;

/// Controller index used by commands that address no controller
pub const INDEX_NONE: u16 = 0xFFFF;

/// Packet header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MgmtHeader {
    /// Opcode (commands) or event code (events)
    pub code: u16,
    /// Controller index
    pub index: u16,
    /// Payload length
    pub len: u16,
}

impl MgmtHeader {
    /// Create a header
    pub fn new(code: u16, index: u16, len: u16) -> Self {
        Self { code, index, len }
    }

    /// Encode header into buffer
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16_le(self.code);
        buf.put_u16_le(self.index);
        buf.put_u16_le(self.len);
    }

    /// Decode header from the start of a buffer
    pub fn decode(buf: &[u8]) -> Result<Self, WireError> {
        if buf.len() < HEADER_SIZE {
            return Err(WireError::HeaderTooShort(buf.len()));
        }

        let mut cursor = &buf[..HEADER_SIZE];
        Ok(Self {
            code: cursor.get_u16_le(),
            index: cursor.get_u16_le(),
            len: cursor.get_u16_le(),
        })
    }
}

/// Frame a payload behind a header.
///
/// Fails when the payload length does not fit the 16-bit length field.
pub fn encode_packet(code: u16, index: u16, payload: &[u8]) -> Result<Bytes, WireError> {
    let len =
        u16::try_from(payload.len()).map_err(|_| WireError::PayloadTooLarge(payload.len()))?;

    let mut buf = BytesMut::with_capacity(HEADER_SIZE + payload.len());
    MgmtHeader::new(code, index, len).encode(&mut buf);
    buf.put_slice(payload);
    Ok(buf.freeze())
}

/// Split a received packet into its header and payload.
///
/// The byte count must equal the header size plus the declared payload
/// length exactly.
pub fn parse_packet(buf: &[u8]) -> Result<(MgmtHeader, &[u8]), WireError> {
    let header = MgmtHeader::decode(buf)?;
    let actual = buf.len() - HEADER_SIZE;

    if actual != header.len as usize {
        return Err(WireError::LengthMismatch {
            declared: header.len as usize,
            actual,
        });
    }

    Ok((header, &buf[HEADER_SIZE..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let packet = encode_packet(0x0005, 0x0001, &[0x01]).unwrap();
        assert_eq!(&packet[..], &[0x05, 0x00, 0x01, 0x00, 0x01, 0x00, 0x01]);

        let none = encode_packet(0x0001, INDEX_NONE, &[]).unwrap();
        assert_eq!(&none[..], &[0x01, 0x00, 0xFF, 0xFF, 0x00, 0x00]);
    }

    #[test]
    fn test_parse_packet() {
        let packet = encode_packet(0x0006, 0x0002, &[0x11, 0x00, 0x00, 0x00]).unwrap();
        let (header, payload) = parse_packet(&packet).unwrap();
        assert_eq!(header, MgmtHeader::new(0x0006, 0x0002, 4));
        assert_eq!(payload, &[0x11, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_oversized_payload_is_not_framed() {
        let max = vec![0u8; u16::MAX as usize];
        let packet = encode_packet(0x0012, 0, &max).unwrap();
        assert_eq!(MgmtHeader::decode(&packet).unwrap().len, u16::MAX);

        let over = vec![0u8; u16::MAX as usize + 1];
        assert_eq!(
            encode_packet(0x0012, 0, &over).unwrap_err(),
            WireError::PayloadTooLarge(65536)
        );
    }

    #[test]
    fn test_parse_packet_too_short() {
        assert_eq!(
            parse_packet(&[0x01, 0x00, 0x00]).unwrap_err(),
            WireError::HeaderTooShort(3)
        );
    }

    #[test]
    fn test_parse_packet_length_mismatch() {
        // Header declares 2 payload bytes, 1 present
        let err = parse_packet(&[0x04, 0x00, 0x00, 0x00, 0x02, 0x00, 0xAA]).unwrap_err();
        assert_eq!(err, WireError::LengthMismatch { declared: 2, actual: 1 });

        // Trailing bytes are rejected too
        let err = parse_packet(&[0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0xAA]).unwrap_err();
        assert!(err.is_frame_error());
    }
}
