//! Top-level TAF encoder (C9: Transcoding Orchestrator), tying the PCM
//! source, Opus framer, page writer, chapter tracker, and integrity hasher
//! into a single write-once file builder.
//!
//! Pages are streamed straight to a temp file as they're produced; the
//! header region is reserved up front with zeros and overwritten by seeking
//! back to the start once the payload length and hash are known. On success
//! the temp file is renamed into place; on any failure, or on explicit
//! `abort`, it is removed.

use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};

use crate::chapter::ChapterTracker;
use crate::error::Result;
use crate::framer::OpusFramer;
use crate::hasher::IntegrityHasher;
use crate::header::{TafHeader, HEADER_REGION_SIZE};
use crate::page_writer::PageWriter;

pub struct TafEncoder {
    audio_id: u32,
    framer: OpusFramer,
    page_writer: PageWriter,
    chapters: ChapterTracker,
    hasher: Option<IntegrityHasher>,
    file: File,
    temp_path: PathBuf,
    final_path: PathBuf,
    bytes_written: u64,
}

impl TafEncoder {
    /// Opens a temp file next to `final_path` and reserves the header
    /// region. `audio_id` becomes both the TAF header's audio_id and the
    /// Ogg bitstream serial number.
    pub async fn create(final_path: impl AsRef<Path>, audio_id: u32) -> Result<Self> {
        let final_path = final_path.as_ref().to_path_buf();
        let temp_path = sibling_temp_path(&final_path);

        let mut file = File::create(&temp_path).await?;
        file.write_all(&[0u8; HEADER_REGION_SIZE]).await?;

        Ok(Self {
            audio_id,
            framer: OpusFramer::new()?,
            page_writer: PageWriter::new(audio_id),
            chapters: ChapterTracker::new(),
            hasher: Some(IntegrityHasher::new()),
            file,
            temp_path,
            final_path,
            bytes_written: 0,
        })
    }

    /// Encodes a chunk of interleaved stereo PCM samples, writing out any
    /// pages that fill as a result.
    pub async fn encode_samples(&mut self, samples: &[i16]) -> Result<()> {
        let packets = self.framer.encode(samples)?;
        self.emit_packets(packets).await
    }

    /// Marks the next page boundary as the start of a new chapter/track.
    pub fn new_chapter(&mut self) -> Result<()> {
        self.chapters.new_chapter(self.page_writer.next_page_index())
    }

    async fn emit_packets(&mut self, packets: Vec<Vec<u8>>) -> Result<()> {
        for packet in packets {
            let granule = self.framer.granule();
            let pages = self.page_writer.accept_packet(&packet, granule)?;
            for page in pages {
                self.write_page(&page).await?;
            }
        }
        Ok(())
    }

    async fn write_page(&mut self, page: &[u8]) -> Result<()> {
        self.hasher.as_mut().expect("hasher taken only at close").update(page);
        self.file.write_all(page).await?;
        self.bytes_written += page.len() as u64;
        Ok(())
    }

    /// Flushes any trailing partial frame, emits the final data page and the
    /// terminator page, writes the header, and renames the temp file into
    /// place. On failure the temp file is removed and the error propagated.
    pub async fn close(mut self) -> Result<PathBuf> {
        match self.finish().await {
            Ok(path) => Ok(path),
            Err(e) => {
                let _ = tokio::fs::remove_file(&self.temp_path).await;
                Err(e)
            }
        }
    }

    /// Abandons the encode, discarding the temp file without writing a
    /// header. Used when a live stream's upstream source fails and the
    /// in-progress file cannot be completed.
    pub async fn abort(self) {
        let _ = tokio::fs::remove_file(&self.temp_path).await;
    }

    async fn finish(&mut self) -> Result<PathBuf> {
        let trailing = self.framer.flush()?;
        self.emit_packets(trailing).await?;

        if let Some(page) = self.page_writer.finish_current_page()? {
            self.write_page(&page).await?;
        }
        let terminator = self.page_writer.emit_terminator_page()?;
        self.write_page(&terminator).await?;

        let sha1_hash = self
            .hasher
            .take()
            .expect("finish called exactly once")
            .finalize();

        let header = TafHeader {
            audio_id: self.audio_id,
            num_bytes: self.bytes_written,
            sha1_hash,
            track_page_nums: self.chapters.page_nums().to_vec(),
        };
        let region = header.encode_region()?;

        self.file.seek(std::io::SeekFrom::Start(0)).await?;
        self.file.write_all(&region).await?;
        self.file.flush().await?;
        self.file.sync_all().await?;

        tokio::fs::rename(&self.temp_path, &self.final_path).await?;
        Ok(self.final_path.clone())
    }
}

fn sibling_temp_path(final_path: &Path) -> PathBuf {
    let file_name = final_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "taf".to_string());
    final_path.with_file_name(format!(".{file_name}.tmp-{}", uuid::Uuid::new_v4()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framer::{CHANNELS, FRAME_SAMPLES};
    use crate::header::TafHeader;

    #[tokio::test]
    async fn empty_input_produces_header_plus_terminator() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.taf");
        let encoder = TafEncoder::create(&path, 1).await.unwrap();
        let final_path = encoder.close().await.unwrap();

        let bytes = tokio::fs::read(&final_path).await.unwrap();
        assert_eq!(bytes.len(), HEADER_REGION_SIZE + crate::page_writer::PAGE_SIZE);

        let header = TafHeader::parse(&bytes[..HEADER_REGION_SIZE]).unwrap();
        assert_eq!(header.num_bytes, crate::page_writer::PAGE_SIZE as u64);
    }

    #[tokio::test]
    async fn one_frame_produces_header_data_and_terminator_pages() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("one_frame.taf");
        let mut encoder = TafEncoder::create(&path, 7).await.unwrap();

        let samples = vec![0i16; FRAME_SAMPLES * CHANNELS];
        encoder.encode_samples(&samples).await.unwrap();
        let final_path = encoder.close().await.unwrap();

        let bytes = tokio::fs::read(&final_path).await.unwrap();
        assert_eq!(bytes.len(), HEADER_REGION_SIZE + 2 * crate::page_writer::PAGE_SIZE);
    }

    #[tokio::test]
    async fn abort_removes_temp_file_without_writing_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aborted.taf");
        let encoder = TafEncoder::create(&path, 1).await.unwrap();
        let temp_path = encoder.temp_path.clone();
        encoder.abort().await;

        assert!(!temp_path.exists());
        assert!(!path.exists());
    }
}
