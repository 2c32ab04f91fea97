//! Packet framing
//!
//! Every unit of MySQL wire traffic is a packet: a 3-byte little-endian
//! payload length, a 1-byte sequence id, then the payload. Sequence ids start
//! at 0 for each command and increment per packet in both directions.

use super::constants::MAX_PAYLOAD_LENGTH;
use bytes::{BufMut, Bytes, BytesMut};
use std::io;

/// A framed packet read off the wire
#[derive(Debug, Clone)]
pub struct Packet {
    /// Sequence id from the packet header
    pub seq: u8,
    /// Packet payload (length header stripped)
    pub payload: Bytes,
}

/// Decode one packet from the buffer without cloning the buffer.
///
/// Returns the packet and the number of bytes consumed; the caller must
/// advance the buffer. An `UnexpectedEof` error means more data is needed.
///
/// Payloads of `0xFFFFFF` bytes signal a multi-packet message. Handshake and
/// bootstrap traffic never comes close to that size, so it is rejected rather
/// than reassembled.
pub fn decode_packet(data: &mut BytesMut) -> io::Result<(Packet, usize)> {
    if data.len() < 4 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "incomplete packet header",
        ));
    }

    let len = u32::from_le_bytes([data[0], data[1], data[2], 0]) as usize;
    let seq = data[3];

    if len >= MAX_PAYLOAD_LENGTH {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("packet payload of {} bytes requires multi-packet reassembly", len),
        ));
    }

    if data.len() < 4 + len {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "incomplete packet body",
        ));
    }

    let payload = Bytes::copy_from_slice(&data[4..4 + len]);
    Ok((Packet { seq, payload }, 4 + len))
}

/// Frame a payload with the packet header for the given sequence id
pub fn frame_packet(payload: &[u8], seq: u8) -> io::Result<BytesMut> {
    if payload.len() >= MAX_PAYLOAD_LENGTH {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("payload of {} bytes exceeds single-packet limit", payload.len()),
        ));
    }

    let mut buf = BytesMut::with_capacity(4 + payload.len());
    let len = (payload.len() as u32).to_le_bytes();
    buf.put_slice(&len[..3]);
    buf.put_u8(seq);
    buf.put_slice(payload);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_and_decode_roundtrip() {
        let framed = frame_packet(&[0x03, b'S', b'E', b'L'], 0).unwrap();
        assert_eq!(&framed[..4], &[4, 0, 0, 0]);

        let mut buf = BytesMut::from(&framed[..]);
        let (packet, consumed) = decode_packet(&mut buf).unwrap();
        assert_eq!(consumed, 8);
        assert_eq!(packet.seq, 0);
        assert_eq!(&packet.payload[..], &[0x03, b'S', b'E', b'L']);
    }

    #[test]
    fn test_decode_incomplete_header() {
        let mut buf = BytesMut::from(&[0x05, 0x00][..]);
        let err = decode_packet(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_decode_incomplete_body() {
        // Header claims 5 payload bytes, only 2 present
        let mut buf = BytesMut::from(&[0x05, 0x00, 0x00, 0x01, 0xAA, 0xBB][..]);
        let err = decode_packet(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_decode_rejects_multi_packet_length() {
        let mut buf = BytesMut::from(&[0xFF, 0xFF, 0xFF, 0x00][..]);
        let err = decode_packet(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_frame_rejects_oversized_payload() {
        let payload = vec![0u8; MAX_PAYLOAD_LENGTH];
        let err = frame_packet(&payload, 0).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_sequence_id_preserved() {
        let framed = frame_packet(&[0x00], 3).unwrap();
        let mut buf = BytesMut::from(&framed[..]);
        let (packet, _) = decode_packet(&mut buf).unwrap();
        assert_eq!(packet.seq, 3);
    }
}
