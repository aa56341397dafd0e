//! PCM source (C1): drives an external decoder subprocess and hands the
//! framer aligned stereo sample chunks.
//!
//! Grounded on the teacher's subprocess-ingest plumbing (spawning a child,
//! piping its stdout, and feeding the result to a downstream stage) with the
//! same "drain on cancel, surface the exit status on EOF" shape, adapted
//! from async byte streams to a PCM sample reader.

use std::process::Stdio;

use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};

use crate::error::{CodecError, Result};

/// Bytes read from the child per poll; kept well under a pipe's buffer size.
const READ_CHUNK_BYTES: usize = 4096;

/// Bytes per interleaved stereo i16 sample pair.
const SAMPLE_ALIGNMENT: usize = 4;

/// Reads raw signed 16-bit little-endian stereo PCM from an external decoder
/// process (e.g. `ffmpeg -f s16le`), re-aligning its stdout stream to whole
/// stereo sample frames across reads.
pub struct SubprocessPcmSource {
    child: Child,
    stdout: tokio::process::ChildStdout,
    /// Trailing bytes read but not yet forming a complete 4-byte sample pair.
    pending: Vec<u8>,
    exhausted: bool,
}

impl SubprocessPcmSource {
    /// Spawns `program args...`, expecting raw s16le 48kHz stereo PCM on
    /// stdout.
    pub async fn spawn(program: &str, args: &[String]) -> Result<Self> {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());

        let mut child = cmd
            .spawn()
            .map_err(|e| CodecError::DecoderFailed(format!("spawn {program}: {e}")))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| CodecError::DecoderFailed("no stdout pipe".into()))?;

        Ok(Self { child, stdout, pending: Vec::new(), exhausted: false })
    }

    /// Reads the next chunk of fully-aligned stereo samples. Returns an
    /// empty vec at end of stream. A non-zero, non-success exit status
    /// observed at EOF is reported as [`CodecError::DecoderFailed`] only if
    /// there were unconsumed trailing bytes left dangling, since a clean
    /// decoder exit after flushing all PCM is the common case and some
    /// decoders exit non-zero on SIGTERM during a cooperative stop.
    pub async fn next_samples(&mut self) -> Result<Vec<i16>> {
        if self.exhausted {
            return Ok(Vec::new());
        }

        let mut buf = vec![0u8; READ_CHUNK_BYTES];
        let n = self
            .stdout
            .read(&mut buf)
            .await
            .map_err(|e| CodecError::DecoderFailed(e.to_string()))?;

        if n == 0 {
            self.exhausted = true;
            let had_dangling_tail = !self.pending.is_empty();
            let status = self
                .child
                .wait()
                .await
                .map_err(|e| CodecError::DecoderFailed(e.to_string()))?;
            if !status.success() && had_dangling_tail {
                return Err(CodecError::DecoderFailed(format!(
                    "decoder exited with {status} leaving {} dangling byte(s)",
                    self.pending.len()
                )));
            }
            return Ok(Vec::new());
        }

        buf.truncate(n);
        self.pending.extend_from_slice(&buf);

        let usable_len = self.pending.len() - (self.pending.len() % SAMPLE_ALIGNMENT);
        let usable: Vec<u8> = self.pending.drain(..usable_len).collect();
        Ok(bytes_to_i16le(&usable))
    }

    /// Stops the decoder early (used when switching chapters or aborting a
    /// live stream) and drains its stdout so the child doesn't block on a
    /// full pipe while exiting.
    pub async fn cancel(mut self) -> Result<()> {
        let _ = self.child.start_kill();
        let mut sink = [0u8; READ_CHUNK_BYTES];
        while let Ok(n) = self.stdout.read(&mut sink).await {
            if n == 0 {
                break;
            }
        }
        let _ = self.child.wait().await;
        Ok(())
    }
}

fn bytes_to_i16le(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|c| i16::from_le_bytes([c[0], c[1]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_little_endian_pairs() {
        let bytes = [0x01, 0x00, 0xFF, 0xFF];
        let samples = bytes_to_i16le(&bytes);
        assert_eq!(samples, vec![1, -1]);
    }

    #[tokio::test]
    async fn spawns_and_reads_from_cat() {
        // `cat` of a fixed-size file acts as a deterministic stand-in for a
        // decoder emitting raw PCM, without depending on ffmpeg in the test
        // environment.
        let mut file = tempfile::NamedTempFile::new().unwrap();
        use std::io::Write;
        file.write_all(&[0u8; 10]).unwrap(); // 10 bytes: 2 full frames + 2 dangling
        let path = file.path().to_string_lossy().to_string();

        let mut source = SubprocessPcmSource::spawn("cat", &[path]).await.unwrap();
        let mut total = Vec::new();
        loop {
            let chunk = source.next_samples().await.unwrap();
            if chunk.is_empty() {
                break;
            }
            total.extend(chunk);
        }
        assert_eq!(total.len(), 4); // 8 of the 10 bytes align to 4 i16 samples
    }
}
