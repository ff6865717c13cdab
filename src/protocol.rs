//! Wire format for the LAN video transport
//!
//! Every datagram starts with a 4-byte magic and a kind byte. All integers
//! are big-endian.
//!
//! ```text
//! Announce     : magic | 0x01 | port u16 | name_len u16 | name
//! Subscribe    : magic | 0x02 | name_len u16 | name
//! Unsubscribe  : magic | 0x03 | name_len u16 | name
//! VideoChunk   : magic | 0x04 | seq u32 | index u16 | count u16
//!                      | width u32 | height u32 | timestamp_us u64 | jpeg bytes
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::NetworkError;

/// Datagram magic
pub const MAGIC: [u8; 4] = *b"LCR1";

/// Bytes before the payload of a video chunk
pub const CHUNK_HEADER_SIZE: usize = 4 + 1 + 4 + 2 + 2 + 4 + 4 + 8;

/// Longest source name the length prefix can carry
pub const MAX_NAME_LEN: usize = u16::MAX as usize;

/// Largest UDP payload; control sockets receive into buffers this size
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

const KIND_ANNOUNCE: u8 = 0x01;
const KIND_SUBSCRIBE: u8 = 0x02;
const KIND_UNSUBSCRIBE: u8 = 0x03;
const KIND_VIDEO_CHUNK: u8 = 0x04;

/// Position of one chunk within a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    /// Frame sequence number, wrapping
    pub frame_seq: u32,
    pub chunk_index: u16,
    pub chunk_count: u16,
    pub width: u32,
    pub height: u32,
    /// Capture timestamp in microseconds
    pub timestamp_us: u64,
}

/// A transport datagram
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    /// Publisher advertising `name` on `port`
    Announce { name: String, port: u16 },
    /// Receiver asking for frames of `name`
    Subscribe { name: String },
    Unsubscribe { name: String },
    /// Slice of a JPEG-encoded frame
    VideoChunk { header: ChunkHeader, payload: Bytes },
}

impl Packet {
    /// Serialize to a datagram
    pub fn encode(&self) -> Result<Bytes, NetworkError> {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        buf.put_slice(&MAGIC);

        match self {
            Packet::Announce { name, port } => {
                buf.put_u8(KIND_ANNOUNCE);
                buf.put_u16(*port);
                put_name(&mut buf, name)?;
            }
            Packet::Subscribe { name } => {
                buf.put_u8(KIND_SUBSCRIBE);
                put_name(&mut buf, name)?;
            }
            Packet::Unsubscribe { name } => {
                buf.put_u8(KIND_UNSUBSCRIBE);
                put_name(&mut buf, name)?;
            }
            Packet::VideoChunk { header, payload } => {
                buf.put_u8(KIND_VIDEO_CHUNK);
                buf.put_u32(header.frame_seq);
                buf.put_u16(header.chunk_index);
                buf.put_u16(header.chunk_count);
                buf.put_u32(header.width);
                buf.put_u32(header.height);
                buf.put_u64(header.timestamp_us);
                buf.put_slice(payload);
            }
        }

        Ok(buf.freeze())
    }

    /// Parse a datagram
    pub fn decode(data: &[u8]) -> Result<Packet, NetworkError> {
        let mut buf = data;
        if buf.remaining() < MAGIC.len() + 1 || buf[..MAGIC.len()] != MAGIC {
            return Err(NetworkError::InvalidPacket);
        }
        buf.advance(MAGIC.len());

        match buf.get_u8() {
            KIND_ANNOUNCE => {
                if buf.remaining() < 2 {
                    return Err(NetworkError::InvalidPacket);
                }
                let port = buf.get_u16();
                let name = get_name(&mut buf)?;
                Ok(Packet::Announce { name, port })
            }
            KIND_SUBSCRIBE => Ok(Packet::Subscribe {
                name: get_name(&mut buf)?,
            }),
            KIND_UNSUBSCRIBE => Ok(Packet::Unsubscribe {
                name: get_name(&mut buf)?,
            }),
            KIND_VIDEO_CHUNK => {
                if data.len() < CHUNK_HEADER_SIZE {
                    return Err(NetworkError::InvalidPacket);
                }
                let header = ChunkHeader {
                    frame_seq: buf.get_u32(),
                    chunk_index: buf.get_u16(),
                    chunk_count: buf.get_u16(),
                    width: buf.get_u32(),
                    height: buf.get_u32(),
                    timestamp_us: buf.get_u64(),
                };
                if header.chunk_count == 0 || header.chunk_index >= header.chunk_count {
                    return Err(NetworkError::InvalidPacket);
                }
                Ok(Packet::VideoChunk {
                    header,
                    payload: Bytes::copy_from_slice(buf),
                })
            }
            _ => Err(NetworkError::InvalidPacket),
        }
    }

    fn encoded_len(&self) -> usize {
        match self {
            Packet::Announce { name, .. } => MAGIC.len() + 1 + 2 + 2 + name.len(),
            Packet::Subscribe { name } | Packet::Unsubscribe { name } => MAGIC.len() + 1 + 2 + name.len(),
            Packet::VideoChunk { payload, .. } => CHUNK_HEADER_SIZE + payload.len(),
        }
    }
}

fn put_name(buf: &mut BytesMut, name: &str) -> Result<(), NetworkError> {
    if name.len() > MAX_NAME_LEN {
        return Err(NetworkError::PacketTooLarge(name.len()));
    }
    buf.put_u16(name.len() as u16);
    buf.put_slice(name.as_bytes());
    Ok(())
}

fn get_name(buf: &mut &[u8]) -> Result<String, NetworkError> {
    if buf.remaining() < 2 {
        return Err(NetworkError::InvalidPacket);
    }
    let len = buf.get_u16() as usize;
    if buf.remaining() < len {
        return Err(NetworkError::InvalidPacket);
    }
    let name = std::str::from_utf8(&buf[..len])
        .map_err(|_| NetworkError::InvalidPacket)?
        .to_string();
    buf.advance(len);
    Ok(name)
}

/// Split an encoded frame into chunk packets that fit `max_packet_size`
pub fn chunk_frame(
    frame_seq: u32,
    width: u32,
    height: u32,
    timestamp_us: u64,
    encoded: &Bytes,
    max_packet_size: usize,
) -> Result<Vec<Packet>, NetworkError> {
    if max_packet_size <= CHUNK_HEADER_SIZE {
        return Err(NetworkError::PacketTooLarge(CHUNK_HEADER_SIZE));
    }
    let per_chunk = max_packet_size - CHUNK_HEADER_SIZE;
    let count = encoded.len().div_ceil(per_chunk).max(1);
    if count > u16::MAX as usize {
        return Err(NetworkError::PacketTooLarge(encoded.len()));
    }

    let packets = (0..count)
        .map(|index| {
            let start = index * per_chunk;
            let end = (start + per_chunk).min(encoded.len());
            Packet::VideoChunk {
                header: ChunkHeader {
                    frame_seq,
                    chunk_index: index as u16,
                    chunk_count: count as u16,
                    width,
                    height,
                    timestamp_us,
                },
                payload: encoded.slice(start..end),
            }
        })
        .collect();

    Ok(packets)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_packets() {
        for packet in [
            Packet::Announce {
                name: "Cam A".to_string(),
                port: 40000,
            },
            Packet::Subscribe {
                name: "Bühne".to_string(),
            },
            Packet::Unsubscribe { name: String::new() },
        ] {
            let encoded = packet.encode().unwrap();
            assert_eq!(Packet::decode(&encoded).unwrap(), packet);
        }
    }

    #[test]
    fn test_long_names() {
        let name = "C".repeat(300);
        for packet in [
            Packet::Announce {
                name: name.clone(),
                port: 5000,
            },
            Packet::Subscribe { name: name.clone() },
            Packet::Unsubscribe { name: name.clone() },
        ] {
            let encoded = packet.encode().unwrap();
            assert_eq!(Packet::decode(&encoded).unwrap(), packet);
        }

        let name = "x".repeat(MAX_NAME_LEN + 1);
        let packet = Packet::Subscribe { name };
        assert!(matches!(packet.encode(), Err(NetworkError::PacketTooLarge(len)) if len == MAX_NAME_LEN + 1));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(Packet::decode(b"").is_err());
        assert!(Packet::decode(b"LCR1").is_err());
        assert!(Packet::decode(b"XXXX\x01\x00\x01\x00").is_err());
        assert!(Packet::decode(b"LCR1\x09").is_err());
        // Name length past the end
        assert!(Packet::decode(b"LCR1\x02\x00\x05ab").is_err());
        assert!(Packet::decode(b"LCR1\x02\x00").is_err());
        // Truncated chunk header
        assert!(Packet::decode(b"LCR1\x04\x00\x00").is_err());
    }

    #[test]
    fn test_chunks_fit_and_reassemble() {
        let encoded = Bytes::from((0..10_000u32).map(|i| (i % 251) as u8).collect::<Vec<_>>());
        let packets = chunk_frame(7, 640, 360, 99, &encoded, 1472).unwrap();

        assert_eq!(packets.len(), 10_000usize.div_ceil(1472 - CHUNK_HEADER_SIZE));

        let mut joined = Vec::new();
        for (i, packet) in packets.iter().enumerate() {
            let bytes = packet.encode().unwrap();
            assert!(bytes.len() <= 1472);
            match Packet::decode(&bytes).unwrap() {
                Packet::VideoChunk { header, payload } => {
                    assert_eq!(header.frame_seq, 7);
                    assert_eq!(header.chunk_index as usize, i);
                    assert_eq!(header.chunk_count as usize, packets.len());
                    assert_eq!((header.width, header.height), (640, 360));
                    joined.extend_from_slice(&payload);
                }
                other => panic!("unexpected {:?}", other),
            }
        }
        assert_eq!(joined, encoded.to_vec());
    }

    #[test]
    fn test_chunk_index_out_of_range() {
        let packet = Packet::VideoChunk {
            header: ChunkHeader {
                frame_seq: 1,
                chunk_index: 3,
                chunk_count: 3,
                width: 1,
                height: 1,
                timestamp_us: 0,
            },
            payload: Bytes::from_static(b"x"),
        };
        let bytes = packet.encode().unwrap();
        assert!(Packet::decode(&bytes).is_err());
    }
}
