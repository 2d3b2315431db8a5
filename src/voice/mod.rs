//! Voice processing module
//!
//! Handles microphone capture and scheduled playback. The input and output
//! sides are independent unidirectional streams: capture runs at 16 kHz,
//! playback at 24 kHz.

mod capture;
mod playback;

pub use capture::{
    CHUNK_SAMPLES, CapturePipeline, CaptureState, SAMPLE_RATE as CAPTURE_SAMPLE_RATE,
    sample_to_pcm16, samples_to_pcm16,
};
pub use playback::{
    Playback, PlaybackScheduler, SAMPLE_RATE as PLAYBACK_SAMPLE_RATE, decode_pcm16,
};
