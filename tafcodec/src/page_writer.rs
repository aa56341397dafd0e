//! Ogg-style page writer (C3).
//!
//! Packs Opus packets into fixed 4096-byte pages using Ogg lacing rules,
//! and checksums each page with the Ogg CRC32 ([`crate::crc`]) computed
//! over the full page with the CRC field zeroed.

use crate::crc;
use crate::error::{CodecError, Result};

/// Every TAF page, data or terminator, is exactly this many bytes.
pub const PAGE_SIZE: usize = 4096;

/// `OggS`(4) + version(1) + header_type(1) + granule(8) + serial(4) +
/// sequence(4) + crc(4) + segment_count(1).
const PAGE_HEADER_FIXED_SIZE: usize = 27;

const HEADER_TYPE_BOS: u8 = 0x02;
const HEADER_TYPE_EOS: u8 = 0x04;

/// Packs packets into 4096-byte Ogg-style pages and emits them as they fill.
pub struct PageWriter {
    serial: u32,
    next_seq: u32,
    pages_emitted: u32,
    current_segments: Vec<u8>,
    current_payload: Vec<u8>,
    current_granule: u64,
}

impl PageWriter {
    /// `serial` is the Ogg bitstream serial number, which TAF sets to the
    /// audio_id.
    pub fn new(serial: u32) -> Self {
        Self {
            serial,
            next_seq: 0,
            pages_emitted: 0,
            current_segments: Vec::new(),
            current_payload: Vec::new(),
            current_granule: 0,
        }
    }

    /// Bytes of page space not yet spoken for by the buffered packets.
    pub fn remaining_capacity(&self) -> usize {
        PAGE_SIZE - self.bytes_used()
    }

    /// Index the next page written will carry (i.e. the current page count).
    /// Used by the chapter tracker to record "this chapter starts here"
    /// before any packets for it have been accepted.
    pub fn next_page_index(&self) -> u32 {
        self.next_seq
    }

    fn bytes_used(&self) -> usize {
        PAGE_HEADER_FIXED_SIZE + self.current_segments.len() + self.current_payload.len()
    }

    fn fits(&self, packet_len: usize) -> bool {
        let seg_count = lacing_for(packet_len).len();
        if self.current_segments.len() + seg_count > 255 {
            return false;
        }
        self.bytes_used() + seg_count + packet_len <= PAGE_SIZE
    }

    /// Adds one packet, flushing the current page first if it doesn't fit.
    /// Returns any pages that were emitted as a side effect (zero or one).
    /// Fails with [`CodecError::PageOverflow`] if the packet cannot fit even
    /// in a freshly emptied page.
    pub fn accept_packet(&mut self, packet: &[u8], granule_after: u64) -> Result<Vec<Vec<u8>>> {
        let mut emitted = Vec::new();

        if !self.fits(packet.len()) {
            if let Some(page) = self.finish_current_page()? {
                emitted.push(page);
            }
            if !self.fits(packet.len()) {
                return Err(CodecError::PageOverflow {
                    packet_len: packet.len(),
                    remaining: self.remaining_capacity(),
                });
            }
        }

        self.current_segments.extend(lacing_for(packet.len()));
        self.current_payload.extend_from_slice(packet);
        self.current_granule = granule_after;
        Ok(emitted)
    }

    /// Emits whatever is buffered in the current page, zero-padding its tail.
    /// `Ok(None)` if nothing has been written to the current page yet, which
    /// keeps an encode with no audio data from producing a spurious page.
    pub fn finish_current_page(&mut self) -> Result<Option<Vec<u8>>> {
        if self.current_segments.is_empty() {
            return Ok(None);
        }
        let header_type = if self.pages_emitted == 0 { HEADER_TYPE_BOS } else { 0 };
        let page = self.build_page(header_type, &self.current_segments.clone(), &self.current_payload.clone())?;
        self.current_segments.clear();
        self.current_payload.clear();
        Ok(Some(page))
    }

    /// Emits the closing terminator page: zero segments, all-zero payload,
    /// `EOS` set. `BOS` is also set if no data page was ever emitted, so a
    /// fully empty file still carries a well-formed bitstream-start page.
    pub fn emit_terminator_page(&mut self) -> Result<Vec<u8>> {
        let mut header_type = HEADER_TYPE_EOS;
        if self.pages_emitted == 0 {
            header_type |= HEADER_TYPE_BOS;
        }
        self.build_page(header_type, &[], &[])
    }

    fn build_page(&mut self, header_type: u8, segments: &[u8], payload: &[u8]) -> Result<Vec<u8>> {
        let nsegs = segments.len();
        if nsegs > 255 {
            return Err(CodecError::PageOverflow { packet_len: payload.len(), remaining: 0 });
        }

        let mut page = Vec::with_capacity(PAGE_SIZE);
        page.extend_from_slice(b"OggS");
        page.push(0); // version
        page.push(header_type);
        page.extend_from_slice(&self.current_granule.to_le_bytes());
        page.extend_from_slice(&self.serial.to_le_bytes());
        page.extend_from_slice(&self.next_seq.to_le_bytes());
        page.extend_from_slice(&[0u8; 4]); // CRC placeholder, filled below
        page.push(nsegs as u8);
        page.extend_from_slice(segments);
        page.extend_from_slice(payload);

        if page.len() > PAGE_SIZE {
            return Err(CodecError::PageOverflow { packet_len: payload.len(), remaining: 0 });
        }
        page.resize(PAGE_SIZE, 0);

        let crc = crc::update(0, &page);
        page[22..26].copy_from_slice(&crc.to_le_bytes());

        self.next_seq += 1;
        self.pages_emitted += 1;
        Ok(page)
    }
}

/// Ogg lacing values for a packet of `len` bytes: one 255 per full 255-byte
/// segment, terminated by the remainder (which may be 0).
fn lacing_for(len: usize) -> Vec<u8> {
    let mut segments = vec![255u8; len / 255];
    segments.push((len % 255) as u8);
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_current_page_finishes_to_none() {
        let mut writer = PageWriter::new(1);
        assert!(writer.finish_current_page().unwrap().is_none());
    }

    #[test]
    fn single_small_packet_round_trips_page_size() {
        let mut writer = PageWriter::new(42);
        let emitted = writer.accept_packet(&[1, 2, 3], 2880).unwrap();
        assert!(emitted.is_empty());
        let page = writer.finish_current_page().unwrap().unwrap();
        assert_eq!(page.len(), PAGE_SIZE);
        assert_eq!(&page[0..4], b"OggS");
        assert_eq!(page[5], HEADER_TYPE_BOS);
    }

    #[test]
    fn crc_field_is_verifiable() {
        let mut writer = PageWriter::new(7);
        writer.accept_packet(&[9u8; 500], 2880).unwrap();
        let mut page = writer.finish_current_page().unwrap().unwrap();
        let stored = u32::from_le_bytes(page[22..26].try_into().unwrap());
        page[22..26].copy_from_slice(&[0, 0, 0, 0]);
        let recomputed = crc::update(0, &page);
        assert_eq!(stored, recomputed);
    }

    #[test]
    fn terminator_page_sets_eos() {
        let mut writer = PageWriter::new(1);
        let page = writer.emit_terminator_page().unwrap();
        assert_eq!(page.len(), PAGE_SIZE);
        assert_eq!(page[5], HEADER_TYPE_BOS | HEADER_TYPE_EOS);
        assert_eq!(page[26], 0); // nsegs
    }

    #[test]
    fn overflow_when_packet_too_large_for_any_page() {
        let mut writer = PageWriter::new(1);
        let huge = vec![0u8; PAGE_SIZE];
        let err = writer.accept_packet(&huge, 2880).unwrap_err();
        assert!(matches!(err, CodecError::PageOverflow { .. }));
    }

    #[test]
    fn page_full_forces_emit_before_accepting_next() {
        let mut writer = PageWriter::new(1);
        let packet = vec![0u8; 4000];
        let first = writer.accept_packet(&packet, 2880).unwrap();
        assert!(first.is_empty());
        let second = writer.accept_packet(&packet, 5760).unwrap();
        assert_eq!(second.len(), 1);
    }
}
