//! Integration tests for the file-level boundary scenarios.

use tafcodec::{TafEncoder, TafHeader, FRAME_SAMPLES, HEADER_REGION_SIZE, PAGE_SIZE, CHANNELS};

#[tokio::test]
async fn mid_stream_chapter_is_recorded_before_its_first_page() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chaptered.taf");
    let mut encoder = TafEncoder::create(&path, 99).await.unwrap();

    let frame = vec![0i16; FRAME_SAMPLES * CHANNELS];
    encoder.encode_samples(&frame).await.unwrap();
    encoder.new_chapter().unwrap();
    encoder.encode_samples(&frame).await.unwrap();
    encoder.encode_samples(&frame).await.unwrap();

    let final_path = encoder.close().await.unwrap();
    let bytes = tokio::fs::read(&final_path).await.unwrap();
    let header = TafHeader::parse(&bytes[..HEADER_REGION_SIZE]).unwrap();

    assert_eq!(header.track_page_nums[0], 0);
    assert!(header.track_page_nums[1] >= 1);
    assert!(header.track_page_nums.windows(2).all(|w| w[0] < w[1]));
}

#[tokio::test]
async fn encoding_identical_pcm_twice_is_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let samples: Vec<i16> = (0..FRAME_SAMPLES as i16 * 5)
        .map(|i| (i % 997) as i16)
        .collect();

    let path_a = dir.path().join("a.taf");
    let mut enc_a = TafEncoder::create(&path_a, 5).await.unwrap();
    enc_a.encode_samples(&samples).await.unwrap();
    let final_a = enc_a.close().await.unwrap();

    let path_b = dir.path().join("b.taf");
    let mut enc_b = TafEncoder::create(&path_b, 5).await.unwrap();
    enc_b.encode_samples(&samples).await.unwrap();
    let final_b = enc_b.close().await.unwrap();

    let bytes_a = tokio::fs::read(&final_a).await.unwrap();
    let bytes_b = tokio::fs::read(&final_b).await.unwrap();
    assert_eq!(bytes_a, bytes_b);
}

#[tokio::test]
async fn num_bytes_in_header_matches_payload_length() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sized.taf");
    let mut encoder = TafEncoder::create(&path, 3).await.unwrap();
    let samples = vec![1i16; FRAME_SAMPLES * CHANNELS * 3];
    encoder.encode_samples(&samples).await.unwrap();
    let final_path = encoder.close().await.unwrap();

    let bytes = tokio::fs::read(&final_path).await.unwrap();
    let header = TafHeader::parse(&bytes[..HEADER_REGION_SIZE]).unwrap();
    assert_eq!(header.num_bytes, (bytes.len() - HEADER_REGION_SIZE) as u64);
    assert_eq!((bytes.len() - HEADER_REGION_SIZE) % PAGE_SIZE, 0);
}
