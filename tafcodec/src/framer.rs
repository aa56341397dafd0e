//! Opus framer (C2).
//!
//! Encodes fixed 60 ms / 2880-sample stereo frames at 48 kHz, 96 kbps, and
//! pads every packet to at least [`OPUS_PACKET_MINSIZE`] bytes using the
//! code-3/CBR padding convention `libopus`'s `opus_packet_pad` uses: the
//! single-frame (code 0) packet is rewritten as a code-3, CBR, one-frame
//! packet carrying a padding-length field, followed by the original frame
//! bytes and the zero padding itself.

use opus::{Application, Channels, Encoder as OpusEncoder};

use crate::error::{CodecError, Result};

/// Samples per Opus frame (60 ms @ 48 kHz).
pub const FRAME_SAMPLES: usize = 2880;
/// Stereo.
pub const CHANNELS: usize = 2;
/// Target bitrate fed to the encoder.
pub const BIT_RATE: i32 = 96_000;
/// Sampling rate the encoder and the whole pipeline assume.
pub const SAMPLE_RATE: u32 = 48_000;
/// Minimum packet size after padding.
pub const OPUS_PACKET_MINSIZE: usize = 64;

/// Stateful frame-by-frame Opus encoder.
pub struct OpusFramer {
    encoder: OpusEncoder,
    /// Interleaved stereo i16 samples not yet forming a full frame.
    accumulator: Vec<i16>,
    /// Total samples (per channel) encoded so far; the Ogg granule position.
    granule: u64,
    flushed: bool,
}

impl OpusFramer {
    pub fn new() -> Result<Self> {
        let mut encoder = OpusEncoder::new(SAMPLE_RATE, Channels::Stereo, Application::Audio)
            .map_err(|e| CodecError::EncodeFailed(e.to_string()))?;
        encoder
            .set_bitrate(opus::Bitrate::Bits(BIT_RATE))
            .map_err(|e| CodecError::EncodeFailed(e.to_string()))?;
        Ok(Self {
            encoder,
            accumulator: Vec::with_capacity(FRAME_SAMPLES * CHANNELS * 2),
            granule: 0,
            flushed: false,
        })
    }

    /// Current cumulative sample count (the Ogg granule position).
    pub fn granule(&self) -> u64 {
        self.granule
    }

    /// Appends interleaved stereo i16 samples and encodes every full frame
    /// that can be formed, returning the padded packets in order.
    pub fn encode(&mut self, samples: &[i16]) -> Result<Vec<Vec<u8>>> {
        self.accumulator.extend_from_slice(samples);

        let frame_len = FRAME_SAMPLES * CHANNELS;
        let mut packets = Vec::new();
        while self.accumulator.len() >= frame_len {
            let frame: Vec<i16> = self.accumulator.drain(..frame_len).collect();
            packets.push(self.encode_frame(&frame)?);
            self.granule += FRAME_SAMPLES as u64;
        }
        Ok(packets)
    }

    /// Zero-extends and encodes a trailing partial frame, if any. Must be
    /// called exactly once, by the enclosing `close`. Returns zero or one
    /// packets: zero iff there was no pending partial frame (this is what
    /// keeps an empty-input encode from emitting a spurious data page).
    pub fn flush(&mut self) -> Result<Vec<Vec<u8>>> {
        if self.flushed {
            return Ok(Vec::new());
        }
        self.flushed = true;

        if self.accumulator.is_empty() {
            return Ok(Vec::new());
        }

        let frame_len = FRAME_SAMPLES * CHANNELS;
        let mut frame = std::mem::take(&mut self.accumulator);
        frame.resize(frame_len, 0);
        let packet = self.encode_frame(&frame)?;
        self.granule += FRAME_SAMPLES as u64;
        Ok(vec![packet])
    }

    fn encode_frame(&mut self, frame: &[i16]) -> Result<Vec<u8>> {
        debug_assert_eq!(frame.len(), FRAME_SAMPLES * CHANNELS);
        let mut buf = vec![0u8; 4000];
        let len = self
            .encoder
            .encode(frame, &mut buf)
            .map_err(|e| CodecError::EncodeFailed(e.to_string()))?;
        buf.truncate(len);
        Ok(pad_packet(&buf, OPUS_PACKET_MINSIZE))
    }
}

/// Pads a single-frame (code 0) Opus packet to at least `min_size` bytes
/// using the RFC 6716 §3.2.5 code-3 CBR padding convention.
fn pad_packet(packet: &[u8], min_size: usize) -> Vec<u8> {
    if packet.len() >= min_size || packet.is_empty() {
        return packet.to_vec();
    }

    let toc = packet[0];
    let frame_data = &packet[1..];
    let new_toc = (toc & 0xFC) | 0x03;

    // header(2) + padding-length bytes + frame_data + padding zero bytes == min_size
    let x = min_size - 2 - frame_data.len();
    let y = x - 1;
    let k = y / 255;
    let v = (y % 255) as u8;
    let padding_len = 254 * k as u64 + v as u64;

    let mut out = Vec::with_capacity(min_size);
    out.push(new_toc);
    out.push(0x41); // frame-count byte: VBR=0, P=1, M=1
    out.extend(std::iter::repeat(255u8).take(k));
    out.push(v);
    out.extend_from_slice(frame_data);
    out.extend(std::iter::repeat(0u8).take(padding_len as usize));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_exactly_one_frame() {
        let mut framer = OpusFramer::new().unwrap();
        let samples = vec![0i16; FRAME_SAMPLES * CHANNELS];
        let packets = framer.encode(&samples).unwrap();
        assert_eq!(packets.len(), 1);
        assert!(packets[0].len() >= OPUS_PACKET_MINSIZE);
        assert_eq!(framer.granule(), FRAME_SAMPLES as u64);

        let trailing = framer.flush().unwrap();
        assert!(trailing.is_empty());
    }

    #[test]
    fn flush_with_no_samples_is_empty() {
        let mut framer = OpusFramer::new().unwrap();
        let packets = framer.flush().unwrap();
        assert!(packets.is_empty());
        assert_eq!(framer.granule(), 0);
    }

    #[test]
    fn flush_pads_trailing_partial_frame() {
        let mut framer = OpusFramer::new().unwrap();
        let samples = vec![0i16; 1000 * CHANNELS];
        let packets = framer.encode(&samples).unwrap();
        assert!(packets.is_empty());

        let trailing = framer.flush().unwrap();
        assert_eq!(trailing.len(), 1);
        assert_eq!(framer.granule(), FRAME_SAMPLES as u64);
    }

    #[test]
    fn pad_packet_reaches_minimum() {
        let tiny = vec![0xF8u8, 0x01, 0x02];
        let padded = pad_packet(&tiny, OPUS_PACKET_MINSIZE);
        assert_eq!(padded.len(), OPUS_PACKET_MINSIZE);
        assert_eq!(padded[0] & 0x03, 0x03);
    }
}
