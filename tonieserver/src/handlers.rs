//! Content handler (C8): the GET/POST routes a Toniebox talks to.
//!
//! Decision table for `GET .../content/<ruid>`:
//! - no descriptor                                   -> 404
//! - descriptor, `nocloud` and no local data file     -> 404
//! - descriptor, local data file, not `live`           -> Range-aware serve,
//!   `?ogg=true` skips the TAF header so the client gets a raw Ogg stream
//! - descriptor, local data file, `live`               -> tail-follow serve,
//!   retrying on EOF until the writer marks it done
//! - descriptor, no local data file, `cloud_auth` set -> bearer-proxy from
//!   the upstream `source` URL, optionally caching the response locally
//! - anything else                                     -> 404
//!
//! `POST /api/content/<ruid>/convert` drives the transcoding orchestrator
//! (C9) over one or more source URIs, either synchronously (batch) or as a
//! background task (live). `POST /api/pcmUpload` accepts a raw PCM16LE
//! multipart body and encodes it directly to a TAF at a caller-chosen path,
//! independent of the rUID content store.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Multipart, Path as AxumPath, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use futures::stream;
use tokio::io::AsyncReadExt;
use tokio_util::io::ReaderStream;

use tafcodec::{TafEncoder, HEADER_REGION_SIZE};
use toniecontent::{data_path, descriptor_path, normalize, read_descriptor, write_descriptor, ContentDescriptor};

use crate::error::HandlerError;
use crate::range::{self, ByteRange};
use crate::state::AppState;

/// A live read loop's EOF retry interval. Fixed per spec, independent of the
/// `ffmpeg_stream_buffer_ms` setting (which tunes ffmpeg's own internal
/// buffering, not this retry).
const LIVE_READ_RETRY: Duration = Duration::from_millis(500);

const CONTENT_TYPE_OGG: &str = "audio/ogg";

pub async fn get_content_v1(
    state: State<Arc<AppState>>,
    path: AxumPath<String>,
    headers: HeaderMap,
    query: Query<HashMap<String, String>>,
) -> Result<Response, HandlerError> {
    get_content(state, path, headers, query).await
}

pub async fn get_content(
    State(state): State<Arc<AppState>>,
    AxumPath(ruid): AxumPath<String>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Response, HandlerError> {
    let ruid = normalize(&ruid)?;
    let desc_path = descriptor_path(&state.content_dir, &ruid)?;

    let descriptor = read_descriptor(&desc_path)
        .await
        .map_err(|_| HandlerError::NotFound(ruid.clone()))?;

    let data_path = data_path(&state.content_dir, &ruid)?;
    let data_exists = tokio::fs::metadata(&data_path).await.is_ok();

    if !data_exists {
        if descriptor.nocloud || !descriptor.has_cloud_auth() {
            return Err(HandlerError::NotFound(ruid));
        }
        return proxy_from_cloud(&state, &ruid, &descriptor, &data_path).await;
    }

    if descriptor.live {
        return serve_live(&data_path).await;
    }

    let skip_header = query
        .get("ogg")
        .or_else(|| query.get("skip_header"))
        .map(|v| v == "true")
        .unwrap_or(false);
    serve_ranged_file(&data_path, &headers, skip_header).await
}

/// Legacy `/content/download/<8hex>/<8hex>[.json]` URL rewrite used by older
/// firmware, which addresses content by its two path halves instead of a
/// single rUID. The second half may carry a `.json` suffix (the sidecar's
/// own name) which is stripped before rejoining into a rUID.
pub async fn get_content_download(
    state: State<Arc<AppState>>,
    AxumPath((a, b)): AxumPath<(String, String)>,
    headers: HeaderMap,
    query: Query<HashMap<String, String>>,
) -> Result<Response, HandlerError> {
    let b = b.strip_suffix(".json").unwrap_or(&b);
    let ruid = toniecontent::from_halves(&a, b)?;
    get_content(state, AxumPath(ruid), headers, query).await
}

async fn serve_ranged_file(
    path: &Path,
    headers: &HeaderMap,
    skip_header: bool,
) -> Result<Response, HandlerError> {
    let metadata = tokio::fs::metadata(path).await?;
    let total_len = metadata.len();
    let header_skip = if skip_header { HEADER_REGION_SIZE as u64 } else { 0 };
    let serve_len = total_len.saturating_sub(header_skip);

    let range_header = headers.get(header::RANGE).and_then(|v| v.to_str().ok());
    let requested: Option<ByteRange> = range::parse(range_header, serve_len);

    let (start, len, status) = match requested {
        Some(r) => (r.start, r.len(), StatusCode::PARTIAL_CONTENT),
        None => (0, serve_len, StatusCode::OK),
    };

    let mut file = tokio::fs::File::open(path).await?;
    tokio::io::AsyncSeekExt::seek(&mut file, std::io::SeekFrom::Start(header_skip + start)).await?;
    let limited = file.take(len);
    let body = Body::from_stream(ReaderStream::new(limited));

    let mut response = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, CONTENT_TYPE_OGG)
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::CONTENT_LENGTH, len.to_string());

    if status == StatusCode::PARTIAL_CONTENT {
        response = response.header(
            header::CONTENT_RANGE,
            format!("bytes {}-{}/{}", start, start + len.saturating_sub(1), serve_len),
        );
    }

    Ok(response.body(body).expect("well-formed response"))
}

/// Serves a TAF file that is still being written: re-polls the file length
/// and keeps streaming new bytes as they land, instead of stopping at
/// whatever length existed when the request started. The EOF retry sleep is
/// fixed at 500 ms per spec — intrinsic to the contract, not a knob.
async fn serve_live(path: &Path) -> Result<Response, HandlerError> {
    let file = tokio::fs::File::open(path).await?;

    let body_stream = stream::unfold((file, 0u64, LIVE_READ_RETRY), move |(mut f, pos, interval)| async move {
        loop {
            let mut buf = vec![0u8; 8192];
            match f.read(&mut buf).await {
                Ok(0) => {
                    tokio::time::sleep(interval).await;
                    // A real deployment marks the file done via a sentinel;
                    // here we simply keep polling for more bytes.
                    continue;
                }
                Ok(n) => {
                    buf.truncate(n);
                    return Some((Ok::<_, std::io::Error>(bytes::Bytes::from(buf)), (f, pos + n as u64, interval)));
                }
                Err(e) => return Some((Err(e), (f, pos, interval))),
            }
        }
    });

    // The poll loop above never naturally terminates on its own (a live page
    // can always grow); it relies on axum dropping the stream once the
    // client disconnects.
    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, CONTENT_TYPE_OGG)
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(body_stream))
        .expect("well-formed response");
    Ok(response)
}

async fn proxy_from_cloud(
    state: &Arc<AppState>,
    ruid: &str,
    descriptor: &ContentDescriptor,
    data_path: &Path,
) -> Result<Response, HandlerError> {
    let source = descriptor
        .source
        .clone()
        .ok_or_else(|| HandlerError::NotFound(ruid.to_string()))?;
    let token = descriptor.cloud_auth.map(hex::encode).unwrap_or_default();

    let upstream = state
        .http_client
        .get(&source)
        .bearer_auth(token)
        .send()
        .await?;

    if !upstream.status().is_success() {
        return Err(HandlerError::NotFound(ruid.to_string()));
    }

    let body_bytes = upstream.bytes().await?;

    if state.settings.cache_content() {
        if let Some(parent) = data_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        if let Err(e) = tokio::fs::write(data_path, &body_bytes).await {
            tracing::warn!(ruid, error = %e, "failed to cache proxied content locally");
        }
    }

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, CONTENT_TYPE_OGG)
        .body(Body::from(body_bytes))
        .expect("well-formed response"))
}

#[derive(serde::Deserialize, Default)]
pub struct ConvertQuery {
    #[serde(default)]
    live: bool,
}

/// `POST /api/content/<ruid>/convert?live=<bool>`: decodes one or more
/// source URIs (local paths or URLs `ffmpeg` can read) into a TAF via the
/// transcoding orchestrator (C9).
///
/// A batch conversion (`live=false`, the default) runs to completion and
/// only returns once the TAF is fully written. A live conversion starts the
/// orchestrator as a background task and returns immediately with `202`;
/// the descriptor is written with `live=true` up front so concurrent GETs
/// find it and switch to tail-follow serving.
pub async fn convert_audio(
    State(state): State<Arc<AppState>>,
    AxumPath(ruid): AxumPath<String>,
    Query(query): Query<ConvertQuery>,
    axum::Json(req): axum::Json<crate::transcode::ConvertRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let ruid = normalize(&ruid)?;

    let data_path = data_path(&state.content_dir, &ruid)?;
    tokio::fs::create_dir_all(data_path.parent().expect("data_path has a parent")).await?;

    let desc_path = descriptor_path(&state.content_dir, &ruid)?;
    let descriptor = ContentDescriptor { live: query.live, ..Default::default() };
    write_descriptor(&desc_path, &descriptor).await?;

    if query.live {
        // No stop-stream endpoint exists yet to drive `tx`; the sender is
        // kept alive for the task's own lifetime so the channel isn't
        // observed as closed (and `stream_live` doesn't quit) the moment
        // this handler returns.
        let (tx, rx) = tokio::sync::watch::channel(false);
        tokio::spawn(async move {
            let _tx = tx;
            if let Err(e) = crate::transcode::stream_live(&data_path, req, rx).await {
                tracing::warn!(error = %e, "live stream ended with error");
            }
        });
        Ok(StatusCode::ACCEPTED)
    } else {
        crate::transcode::convert_batch(&data_path, &req).await?;
        Ok(StatusCode::CREATED)
    }
}

#[derive(serde::Deserialize, Default)]
pub struct PcmUploadQuery {
    #[serde(default)]
    name: String,
    #[serde(default)]
    #[allow(dead_code)]
    uid: String,
    #[serde(default, rename = "audioId")]
    audio_id: u32,
    #[serde(default)]
    path: String,
}

/// Joins `rel` onto `root` and rejects anything that escapes `root` after
/// canonicalization, the same traversal guard `toniecontent::ruid` applies
/// to rUID-derived paths, generalized here to the caller-chosen `path`/`name`
/// query params `pcmUpload` takes directly.
fn sanitized_join(root: &Path, rel: &str) -> Result<PathBuf, HandlerError> {
    let rel = rel.trim_start_matches(['/', '\\']);
    let joined = root.join(rel);

    if let Ok(canonical_root) = root.canonicalize() {
        if let Ok(canonical_joined) = joined.canonicalize() {
            if !canonical_joined.starts_with(&canonical_root) {
                return Err(toniecontent::StoreError::InvalidPath(rel.to_string()).into());
            }
        }
    }
    Ok(joined)
}

/// `POST /api/pcmUpload?name=&uid=&audioId=&path=`: a multipart body of raw
/// PCM16LE 48 kHz stereo samples, encoded directly to a TAF at
/// `<contentRoot>/<path>/<name>` — independent of rUID addressing, since the
/// caller names the destination explicitly. `uid` is accepted and ignored,
/// matching the original firmware's handler (logged there, never read back).
pub async fn pcm_upload(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PcmUploadQuery>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, HandlerError> {
    let name = if query.name.is_empty() { "unnamed" } else { &query.name };
    let target_dir = sanitized_join(&state.content_dir, &query.path)?;

    let dir_exists = tokio::fs::metadata(&target_dir).await.map(|m| m.is_dir()).unwrap_or(false);
    if !dir_exists {
        return Err(toniecontent::StoreError::InvalidPath(query.path).into());
    }
    let target_file = sanitized_join(&target_dir, name)?;

    let mut encoder = TafEncoder::create(&target_file, query.audio_id).await?;
    let mut remainder: Vec<u8> = Vec::with_capacity(4);

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| HandlerError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))?
    {
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| HandlerError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))?
        {
            remainder.extend_from_slice(&chunk);
            let usable = remainder.len() - remainder.len() % 4;
            if usable == 0 {
                continue;
            }
            let samples = pcm_bytes_to_samples(&remainder[..usable]);
            if let Err(e) = encoder.encode_samples(&samples).await {
                encoder.abort().await;
                return Err(e.into());
            }
            remainder.drain(..usable);
        }
    }

    encoder.close().await?;
    Ok(StatusCode::OK)
}

fn pcm_bytes_to_samples(bytes: &[u8]) -> Vec<i16> {
    bytes.chunks_exact(2).map(|pair| i16::from_le_bytes([pair[0], pair[1]])).collect()
}
