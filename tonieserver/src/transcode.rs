//! Transcoding orchestrator (C9): bridges the PCM source (C1) through the
//! Opus framer, page writer, chapter tracker, and integrity hasher (C2-C6)
//! down in `tafcodec`, for either a one-shot batch conversion or a
//! continuously-running live stream.
//!
//! Grounded on the teacher's ffmpeg invocation shape (`pmoflac`'s transcode
//! helpers spawn `ffmpeg -i <source> -f <fmt> pipe:1` and read the pipe) and
//! on `tafcodec::SubprocessPcmSource` for the actual subprocess plumbing.

use std::path::Path;

use serde::Deserialize;
use tafcodec::{SubprocessPcmSource, TafEncoder};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::error::HandlerError;

/// A batch or live conversion job: 1..99 source URIs ffmpeg can read (local
/// paths or URLs), decoded in order and concatenated into chapters.
#[derive(Debug, Clone, Deserialize)]
pub struct ConvertRequest {
    pub sources: Vec<String>,
    #[serde(default)]
    pub skip_seconds: u32,
    pub audio_id: u32,
}

fn ffmpeg_args(source: &str, skip_seconds: u32) -> Vec<String> {
    vec![
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
        "-ss".into(),
        skip_seconds.to_string(),
        "-i".into(),
        source.into(),
        "-f".into(),
        "s16le".into(),
        "-ar".into(),
        "48000".into(),
        "-ac".into(),
        "2".into(),
        "pipe:1".into(),
    ]
}

/// Drains one source fully into `encoder`, via a freshly spawned ffmpeg.
async fn drain_source(
    encoder: &mut TafEncoder,
    source: &str,
    skip_seconds: u32,
) -> Result<(), HandlerError> {
    let mut pcm = SubprocessPcmSource::spawn("ffmpeg", &ffmpeg_args(source, skip_seconds)).await?;
    loop {
        let samples = pcm.next_samples().await?;
        if samples.is_empty() {
            break;
        }
        encoder.encode_samples(&samples).await?;
    }
    Ok(())
}

/// **Convert (batch)**: decodes every source URI in order, inserting a
/// chapter boundary between sources, then closes the TAF once the last
/// decoder EOFs.
pub async fn convert_batch(data_path: &Path, req: &ConvertRequest) -> Result<(), HandlerError> {
    let mut encoder = TafEncoder::create(data_path, req.audio_id).await?;

    for (i, source) in req.sources.iter().enumerate() {
        if i > 0 {
            encoder.new_chapter()?;
        }
        let skip = if i == 0 { req.skip_seconds } else { 0 };
        info!(source = %source, chapter = i, "decoding source");
        if let Err(e) = drain_source(&mut encoder, source, skip).await {
            encoder.abort().await;
            return Err(e);
        }
    }

    encoder.close().await?;
    Ok(())
}

/// **Stream (live)**: loops over the source list indefinitely, decoding each
/// in turn and advancing a chapter between them, until `quit` is signaled.
/// If a decoder fails mid-source, the orchestrator moves on to the next URI
/// and still records a chapter boundary, rather than ending the stream.
pub async fn stream_live(
    data_path: &Path,
    req: ConvertRequest,
    mut quit: watch::Receiver<bool>,
) -> Result<(), HandlerError> {
    let mut encoder = TafEncoder::create(data_path, req.audio_id).await?;

    if req.sources.is_empty() {
        encoder.close().await?;
        return Ok(());
    }

    let mut idx = 0usize;
    while !*quit.borrow() {
        let source = &req.sources[idx % req.sources.len()];
        let skip = if idx == 0 { req.skip_seconds } else { 0 };

        let mut pcm = match SubprocessPcmSource::spawn("ffmpeg", &ffmpeg_args(source, skip)).await {
            Ok(pcm) => pcm,
            Err(e) => {
                warn!(source = %source, error = %e, "live decoder failed to start, advancing");
                idx += 1;
                encoder.new_chapter()?;
                continue;
            }
        };

        // `pcm.cancel()` takes `self` by value, so it can't sit in the same
        // `select!` as `pcm.next_samples()`'s `&mut self` borrow; quitting
        // instead sets a flag and cancels once the loop below has exited.
        let mut quit_requested = false;
        loop {
            tokio::select! {
                samples = pcm.next_samples() => {
                    match samples {
                        Ok(samples) if samples.is_empty() => break,
                        Ok(samples) => {
                            if let Err(e) = encoder.encode_samples(&samples).await {
                                warn!(source = %source, error = %e, "encode failed mid-stream");
                                break;
                            }
                        }
                        Err(e) => {
                            warn!(source = %source, error = %e, "live decoder failed, advancing");
                            break;
                        }
                    }
                }
                _ = quit.changed() => {
                    quit_requested = true;
                    break;
                }
            }
        }

        if quit_requested {
            pcm.cancel().await?;
            encoder.close().await?;
            return Ok(());
        }

        idx += 1;
        encoder.new_chapter()?;
    }

    encoder.close().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ffmpeg_args_place_seek_before_input() {
        let args = ffmpeg_args("in.mp3", 5);
        let ss = args.iter().position(|a| a == "-ss").unwrap();
        let i = args.iter().position(|a| a == "-i").unwrap();
        assert!(ss < i);
        assert_eq!(args[ss + 1], "5");
    }
}
