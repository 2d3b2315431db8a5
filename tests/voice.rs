//! Voice pipeline integration tests
//!
//! Tests audio components without requiring audio hardware

use voicelink::FrameKind;
use voicelink::config::PlaybackConfig;
use voicelink::frame;
use voicelink::voice::{
    CAPTURE_SAMPLE_RATE, CHUNK_SAMPLES, PLAYBACK_SAMPLE_RATE, Playback, PlaybackScheduler,
    decode_pcm16, samples_to_pcm16,
};

mod common;

use common::{generate_silence, generate_sine_samples, pcm16_payload};

/// Seconds of playback one capture-sized chunk covers at the output rate
const CHUNK_SECS: f64 = CHUNK_SAMPLES as f64 / PLAYBACK_SAMPLE_RATE as f64;

fn scheduler() -> PlaybackScheduler {
    PlaybackScheduler::new(PlaybackConfig::default())
}

#[test]
fn test_capture_chunk_roundtrips_through_the_codec() {
    let chunk = generate_sine_samples(CAPTURE_SAMPLE_RATE, 440.0, 0.256, 0.5);
    assert_eq!(chunk.len(), CHUNK_SAMPLES);

    let pcm = samples_to_pcm16(&chunk);
    let encoded = frame::encode_client_audio(&pcm);

    let (kind, payload) = frame::decode(&encoded).unwrap();
    assert_eq!(kind, FrameKind::ClientAudio);
    assert_eq!(payload, pcm16_payload(&pcm).as_slice());

    // And back to floats with no more than quantization error
    let decoded = decode_pcm16(payload).unwrap();
    for (original, restored) in chunk.iter().zip(decoded.iter()) {
        assert!((original - restored).abs() < 1.0 / 32000.0);
    }
}

#[test]
fn test_silence_roundtrips_to_silence() {
    let silence = generate_silence(CAPTURE_SAMPLE_RATE, 0.1);
    let pcm = samples_to_pcm16(&silence);
    assert!(pcm.iter().all(|&s| s == 0));

    let encoded = frame::encode_client_audio(&pcm);
    let (_, payload) = frame::decode(&encoded).unwrap();
    assert!(decode_pcm16(payload).unwrap().iter().all(|&s| s == 0.0));
}

#[test]
fn test_out_of_range_samples_clamp_instead_of_wrapping() {
    let pcm = samples_to_pcm16(&[1.5, -1.5]);
    assert_eq!(pcm, vec![32767, -32768]);
}

#[test]
fn test_clean_turn_plays_contiguously() {
    let mut scheduler = scheduler();

    // Three chunks arriving in quick succession with no gap
    let first = scheduler.schedule(1.0, CHUNK_SECS);
    let second = scheduler.schedule(1.05, CHUNK_SECS);
    let third = scheduler.schedule(1.1, CHUNK_SECS);

    // The turn opener carries the full pre-roll from its arrival time
    assert!((first - (1.0 + 0.25 + 0.5)).abs() < 1e-9);

    // The rest follow immediately: no gap, no overlap
    assert_eq!(second, first + CHUNK_SECS);
    assert_eq!(third, second + CHUNK_SECS);
}

#[test]
fn test_mid_turn_chunk_gets_only_the_playahead_floor() {
    let mut scheduler = scheduler();
    let first = scheduler.schedule(0.0, CHUNK_SECS);
    let end = first + CHUNK_SECS;

    // Cursor is ahead of the clock by more than the grace window: same turn
    let now = end - 0.2;
    let second = scheduler.schedule(now, CHUNK_SECS);
    assert_eq!(second, end.max(now + 0.25));
}

#[test]
fn test_stale_cursor_after_silence_opens_a_new_turn() {
    let mut scheduler = scheduler();
    let first = scheduler.schedule(0.0, CHUNK_SECS);
    let end = first + CHUNK_SECS;

    // Clock has run past the scheduled end plus the grace window
    let now = end + 0.1;
    let second = scheduler.schedule(now, CHUNK_SECS);
    assert!((second - (now + 0.25 + 0.5)).abs() < 1e-9);
}

#[test]
fn test_configured_delays_are_respected() {
    let config = PlaybackConfig {
        playahead_ms: 300,
        turn_delay_ms: 400,
        grace_ms: 40,
    };
    let mut scheduler = PlaybackScheduler::new(config);

    let start = scheduler.schedule(0.0, CHUNK_SECS);
    assert!((start - 0.7).abs() < 1e-9);
}

#[test]
fn test_malformed_payload_schedules_nothing() {
    let mut playback = Playback::new(PlaybackConfig::default());

    let mut payload = pcm16_payload(&samples_to_pcm16(&generate_silence(
        PLAYBACK_SAMPLE_RATE,
        0.01,
    )));
    payload.pop();

    // Odd byte count cannot be PCM16
    assert!(playback.enqueue(&payload).is_err());
    assert!(!playback.is_active());
}
