//! TAF (Tonie Audio Format) codec: an Opus-in-Ogg-style container writer.
//!
//! This crate owns the byte-exact parts of the system (C1-C6 in the
//! component overview): turning PCM into padded Opus packets, packing those
//! into fixed 4096-byte pages, tracking chapters and the payload hash, and
//! serializing the protobuf header region. Everything above "write a TAF
//! file" (content addressing, HTTP serving, configuration) lives in the
//! sibling crates.

pub mod chapter;
pub mod crc;
pub mod encoder;
pub mod error;
pub mod framer;
pub mod hasher;
pub mod header;
pub mod page_writer;
pub mod pcm_source;

pub use chapter::{ChapterTracker, MAX_CHAPTERS};
pub use encoder::TafEncoder;
pub use error::{CodecError, Result};
pub use framer::{OpusFramer, CHANNELS, FRAME_SAMPLES, OPUS_PACKET_MINSIZE, SAMPLE_RATE};
pub use hasher::IntegrityHasher;
pub use header::{TafHeader, HEADER_REGION_SIZE};
pub use page_writer::{PageWriter, PAGE_SIZE};
pub use pcm_source::SubprocessPcmSource;
