//! TAF header serialization (C4).
//!
//! The on-disk header is a small protobuf-encoded message (see
//! `TonieboxAudioFileHeader` in the original firmware sources), preceded by
//! a 4-byte big-endian length and zero-padded so that the length prefix plus
//! the message plus the padding is exactly [`HEADER_REGION_SIZE`] bytes.
//!
//! No protobuf codegen crate is pulled in for a single fixed message shape;
//! the wire format (varints + length-delimited fields) is small enough to
//! hand-roll, the way the corpus hand-rolls CRC tables rather than pulling
//! in a checksum crate for one polynomial.

use crate::error::{CodecError, Result};

/// Total size, in bytes, of the header region at the front of a TAF file
/// (4-byte length prefix + protobuf message + zero padding).
pub const HEADER_REGION_SIZE: usize = 4096;

/// Maximum serialized message size; leaves room for the 4-byte length
/// prefix inside [`HEADER_REGION_SIZE`].
const MAX_HEADER_MESSAGE_SIZE: usize = HEADER_REGION_SIZE - 4;

const FIELD_AUDIO_ID: u32 = 1;
const FIELD_SHA1_HASH: u32 = 2;
const FIELD_NUM_BYTES: u32 = 3;
const FIELD_TRACK_PAGE_NUMS: u32 = 4;
const FIELD_FILL: u32 = 5;

const WIRE_VARINT: u32 = 0;
const WIRE_FIXED32: u32 = 5;
const WIRE_LEN: u32 = 2;

/// Parsed contents of a TAF header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TafHeader {
    pub audio_id: u32,
    pub num_bytes: u64,
    pub sha1_hash: [u8; 20],
    pub track_page_nums: Vec<u32>,
}

impl TafHeader {
    /// Serializes the header message (without the length prefix or padding)
    /// and fails with [`CodecError::HeaderTooLarge`] if it would not fit in
    /// the header region alongside the length prefix.
    pub fn encode_message(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(64 + self.track_page_nums.len() * 2);

        write_tag(&mut buf, FIELD_AUDIO_ID, WIRE_FIXED32);
        buf.extend_from_slice(&self.audio_id.to_le_bytes());

        write_tag(&mut buf, FIELD_SHA1_HASH, WIRE_LEN);
        write_varint(&mut buf, self.sha1_hash.len() as u64);
        buf.extend_from_slice(&self.sha1_hash);

        write_tag(&mut buf, FIELD_NUM_BYTES, WIRE_VARINT);
        write_varint(&mut buf, self.num_bytes);

        if !self.track_page_nums.is_empty() {
            let mut packed = Vec::with_capacity(self.track_page_nums.len() * 2);
            for &n in &self.track_page_nums {
                write_varint(&mut packed, n as u64);
            }
            write_tag(&mut buf, FIELD_TRACK_PAGE_NUMS, WIRE_LEN);
            write_varint(&mut buf, packed.len() as u64);
            buf.extend_from_slice(&packed);
        }

        if buf.len() > MAX_HEADER_MESSAGE_SIZE {
            return Err(CodecError::HeaderTooLarge(buf.len()));
        }

        Ok(buf)
    }

    /// Serializes the header, the 4-byte big-endian length prefix, and pads
    /// the result to exactly [`HEADER_REGION_SIZE`] bytes with the
    /// remainder written as an explicit `fill` protobuf field so the region
    /// round-trips byte-for-byte through [`TafHeader::parse`].
    pub fn encode_region(&self) -> Result<Vec<u8>> {
        let mut message = self.encode_message()?;

        let prefix_overhead = message.len() + 4;
        if prefix_overhead > HEADER_REGION_SIZE {
            return Err(CodecError::HeaderTooLarge(message.len()));
        }
        let remaining = HEADER_REGION_SIZE - prefix_overhead;

        // Pad using an explicit `fill` field so the padding bytes are part
        // of a well-formed message rather than trailing garbage. `remaining`
        // bytes must hold `tag + varint(fill_len) + fill_len` exactly; try
        // the varint-length encodings a u16-ish fill_len can take (1 or 2
        // bytes covers every realistic header, since remaining <= 4096).
        if remaining > 0 {
            let tag_size = tagged_header_len(FIELD_FILL, WIRE_LEN);
            let mut found = None;
            for varint_size in 1..=3usize {
                if remaining < tag_size + varint_size {
                    continue;
                }
                let candidate = remaining - tag_size - varint_size;
                if varint_byte_len(candidate as u64) == varint_size {
                    found = Some(candidate);
                    break;
                }
            }
            let fill_len = found.ok_or_else(|| {
                CodecError::MalformedHeader("could not size fill padding field".into())
            })?;
            write_tag(&mut message, FIELD_FILL, WIRE_LEN);
            write_varint(&mut message, fill_len as u64);
            message.extend(std::iter::repeat(0u8).take(fill_len));
        }

        if message.len() + 4 != HEADER_REGION_SIZE {
            return Err(CodecError::MalformedHeader(
                "internal error sizing header padding".into(),
            ));
        }

        let mut region = Vec::with_capacity(HEADER_REGION_SIZE);
        region.extend_from_slice(&(message.len() as u32).to_be_bytes());
        region.extend_from_slice(&message);
        debug_assert_eq!(region.len(), HEADER_REGION_SIZE);
        Ok(region)
    }

    /// Parses a [`HEADER_REGION_SIZE`]-byte header region (as read from
    /// offset 0 of a TAF file) back into a [`TafHeader`].
    pub fn parse(region: &[u8]) -> Result<Self> {
        if region.len() < 4 {
            return Err(CodecError::MalformedHeader("region shorter than length prefix".into()));
        }
        let len = u32::from_be_bytes([region[0], region[1], region[2], region[3]]) as usize;
        if 4 + len > region.len() {
            return Err(CodecError::MalformedHeader("declared length exceeds region".into()));
        }
        let message = &region[4..4 + len];
        Self::parse_message(message)
    }

    fn parse_message(mut data: &[u8]) -> Result<Self> {
        let mut audio_id = None;
        let mut num_bytes = None;
        let mut sha1_hash = None;
        let mut track_page_nums = Vec::new();

        while !data.is_empty() {
            let (tag, rest) = read_varint(data)?;
            data = rest;
            let field = (tag >> 3) as u32;
            let wire = (tag & 0x7) as u32;

            match (field, wire) {
                (f, WIRE_FIXED32) if f == FIELD_AUDIO_ID => {
                    if data.len() < 4 {
                        return Err(CodecError::MalformedHeader("truncated fixed32".into()));
                    }
                    audio_id = Some(u32::from_le_bytes([data[0], data[1], data[2], data[3]]));
                    data = &data[4..];
                }
                (f, WIRE_LEN) if f == FIELD_SHA1_HASH => {
                    let (len, rest) = read_varint(data)?;
                    let (bytes, rest) = split_len(rest, len as usize)?;
                    if bytes.len() != 20 {
                        return Err(CodecError::MalformedHeader("sha1_hash must be 20 bytes".into()));
                    }
                    let mut hash = [0u8; 20];
                    hash.copy_from_slice(bytes);
                    sha1_hash = Some(hash);
                    data = rest;
                }
                (f, WIRE_VARINT) if f == FIELD_NUM_BYTES => {
                    let (v, rest) = read_varint(data)?;
                    num_bytes = Some(v);
                    data = rest;
                }
                (f, WIRE_LEN) if f == FIELD_TRACK_PAGE_NUMS => {
                    let (len, rest) = read_varint(data)?;
                    let (mut packed, rest) = split_len(rest, len as usize)?;
                    while !packed.is_empty() {
                        let (v, r) = read_varint(packed)?;
                        track_page_nums.push(v as u32);
                        packed = r;
                    }
                    data = rest;
                }
                (f, WIRE_LEN) if f == FIELD_FILL => {
                    let (len, rest) = read_varint(data)?;
                    let (_, rest) = split_len(rest, len as usize)?;
                    data = rest;
                }
                (_, WIRE_VARINT) => {
                    let (_, rest) = read_varint(data)?;
                    data = rest;
                }
                (_, WIRE_LEN) => {
                    let (len, rest) = read_varint(data)?;
                    let (_, rest) = split_len(rest, len as usize)?;
                    data = rest;
                }
                (_, WIRE_FIXED32) => {
                    if data.len() < 4 {
                        return Err(CodecError::MalformedHeader("truncated fixed32".into()));
                    }
                    data = &data[4..];
                }
                _ => return Err(CodecError::MalformedHeader("unsupported wire type".into())),
            }
        }

        Ok(TafHeader {
            audio_id: audio_id
                .ok_or_else(|| CodecError::MalformedHeader("missing audio_id".into()))?,
            num_bytes: num_bytes
                .ok_or_else(|| CodecError::MalformedHeader("missing num_bytes".into()))?,
            sha1_hash: sha1_hash
                .ok_or_else(|| CodecError::MalformedHeader("missing sha1_hash".into()))?,
            track_page_nums,
        })
    }
}

fn tagged_header_len(field: u32, wire_type: u32) -> usize {
    let mut buf = Vec::new();
    write_tag(&mut buf, field, wire_type);
    buf.len()
}

fn varint_byte_len(mut value: u64) -> usize {
    let mut len = 1;
    value >>= 7;
    while value > 0 {
        len += 1;
        value >>= 7;
    }
    len
}

fn write_tag(buf: &mut Vec<u8>, field: u32, wire_type: u32) {
    write_varint(buf, ((field as u64) << 3) | wire_type as u64);
}

fn write_varint(buf: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            buf.push(byte);
            break;
        } else {
            buf.push(byte | 0x80);
        }
    }
}

fn read_varint(data: &[u8]) -> Result<(u64, &[u8])> {
    let mut value: u64 = 0;
    let mut shift = 0;
    for (i, &byte) in data.iter().enumerate() {
        value |= ((byte & 0x7f) as u64) << shift;
        if byte & 0x80 == 0 {
            return Ok((value, &data[i + 1..]));
        }
        shift += 7;
        if shift > 63 {
            return Err(CodecError::MalformedHeader("varint too long".into()));
        }
    }
    Err(CodecError::MalformedHeader("truncated varint".into()))
}

fn split_len(data: &[u8], len: usize) -> Result<(&[u8], &[u8])> {
    if len > data.len() {
        return Err(CodecError::MalformedHeader("length-delimited field exceeds buffer".into()));
    }
    Ok((&data[..len], &data[len..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_empty_chapters() {
        let header = TafHeader {
            audio_id: 0xdeadbeef,
            num_bytes: 4096,
            sha1_hash: [7u8; 20],
            track_page_nums: vec![0],
        };
        let region = header.encode_region().unwrap();
        assert_eq!(region.len(), HEADER_REGION_SIZE);
        let parsed = TafHeader::parse(&region).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn round_trip_many_chapters() {
        let header = TafHeader {
            audio_id: 1,
            num_bytes: 123_456,
            sha1_hash: [0xab; 20],
            track_page_nums: (0..100).map(|i| i * 37).collect(),
        };
        let region = header.encode_region().unwrap();
        assert_eq!(region.len(), HEADER_REGION_SIZE);
        let parsed = TafHeader::parse(&region).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn reencode_is_byte_identical() {
        let header = TafHeader {
            audio_id: 42,
            num_bytes: 8192,
            sha1_hash: [1u8; 20],
            track_page_nums: vec![0, 3, 9],
        };
        let region1 = header.encode_region().unwrap();
        let parsed = TafHeader::parse(&region1).unwrap();
        let region2 = parsed.encode_region().unwrap();
        assert_eq!(region1, region2);
    }
}
