//! Scheduled audio playback to speakers
//!
//! Synthesized speech arrives in bursts ("turns") of PCM16 chunks. Each
//! chunk is scheduled against the output clock so chunks of one turn play
//! back-to-back with no gap or overlap, and the first chunk of a new turn
//! gets extra pre-roll so network jitter never clips its onset.

use std::collections::VecDeque;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};

use crate::config::PlaybackConfig;
use crate::{Error, Result};

/// Sample rate for playback (matches the speech service output)
pub const SAMPLE_RATE: u32 = 24000;

/// Picks start times for incoming speech chunks
///
/// The only mutable state is the cursor `next_start_time`: the output-clock
/// time at which the next chunk should begin. While a turn is in progress
/// the cursor stays ahead of the clock and arriving chunks chain onto it
/// exactly, with no gap. A cursor at or behind the clock (plus a small
/// grace interval) is stale: nothing is pending, so the next chunk opens a
/// new turn and is pushed out by the turn delay in addition to the
/// playahead every chunk gets.
#[derive(Debug)]
pub struct PlaybackScheduler {
    /// Minimum buffering delay for every chunk, in seconds
    playahead: f64,
    /// Extra pre-roll for the first chunk of a turn, in seconds
    turn_delay: f64,
    /// Cursor staleness tolerance, in seconds
    grace: f64,
    /// Output-clock time at which the next chunk should begin
    next_start_time: f64,
}

impl PlaybackScheduler {
    /// Create a scheduler from the configured delays
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn new(config: PlaybackConfig) -> Self {
        Self {
            playahead: config.playahead_ms as f64 / 1000.0,
            turn_delay: config.turn_delay_ms as f64 / 1000.0,
            grace: config.grace_ms as f64 / 1000.0,
            next_start_time: 0.0,
        }
    }

    /// Pick the start time for a chunk of `duration` seconds arriving at
    /// output-clock time `now`, and advance the cursor past it
    pub fn schedule(&mut self, now: f64, duration: f64) -> f64 {
        let new_turn = self.next_start_time <= now + self.grace;

        let mut start = self.next_start_time.max(now + self.playahead);
        if new_turn {
            start = start.max(now + self.playahead + self.turn_delay);
        }

        self.next_start_time = start + duration;
        start
    }

    /// Reset the cursor; the next chunk starts a fresh turn sequence
    pub const fn reset(&mut self) {
        self.next_start_time = 0.0;
    }

    /// Current cursor position
    #[must_use]
    pub const fn next_start_time(&self) -> f64 {
        self.next_start_time
    }
}

/// Decode a PCM16 payload into normalized f32 samples
///
/// # Errors
///
/// Returns `Error::Decode` if the byte length is not a whole number of
/// 16-bit samples.
pub fn decode_pcm16(payload: &[u8]) -> Result<Vec<f32>> {
    if payload.len() % 2 != 0 {
        return Err(Error::Decode(format!(
            "payload of {} bytes is not a whole number of PCM16 samples",
            payload.len()
        )));
    }

    Ok(payload
        .chunks_exact(2)
        .map(|pair| f32::from(i16::from_le_bytes([pair[0], pair[1]])) / 32768.0)
        .collect())
}

/// Absolute-position sample timeline shared with the output callback
///
/// Chunks land at their scheduled frame position; the callback renders from
/// the front, substituting silence for gaps, and advances the clock either
/// way. Bursts queue through their positions alone; there is no separate
/// queue structure.
struct Timeline {
    /// Absolute index of the next frame the output callback will render
    next_frame: u64,
    /// Pending samples, front aligned with `next_frame`
    samples: VecDeque<f32>,
}

impl Timeline {
    const fn new() -> Self {
        Self {
            next_frame: 0,
            samples: VecDeque::new(),
        }
    }

    /// Output-clock time in seconds
    #[allow(clippy::cast_precision_loss)]
    fn clock(&self) -> f64 {
        self.next_frame as f64 / f64::from(SAMPLE_RATE)
    }

    /// Write a chunk at an absolute frame position, zero-filling any gap
    #[allow(clippy::cast_possible_truncation)]
    fn write_at(&mut self, start_frame: u64, chunk: &[f32]) {
        let offset = start_frame.saturating_sub(self.next_frame) as usize;
        let end = offset + chunk.len();
        if self.samples.len() < end {
            self.samples.resize(end, 0.0);
        }
        for (i, &sample) in chunk.iter().enumerate() {
            self.samples[offset + i] = sample;
        }
    }

    /// Fill an interleaved output buffer, advancing the clock
    fn render(&mut self, out: &mut [f32], channels: usize) {
        for frame in out.chunks_mut(channels) {
            let sample = self.samples.pop_front().unwrap_or(0.0);
            self.next_frame += 1;
            for slot in frame.iter_mut() {
                *slot = sample;
            }
        }
    }
}

/// Live output context
///
/// The timeline is shared with the output callback; the stream object
/// itself is owned by a dedicated thread because `cpal::Stream` is not
/// `Send`. Dropping the context hangs up the stop channel, which makes the
/// thread drop the stream and exit.
struct OutputContext {
    timeline: Arc<Mutex<Timeline>>,
    _stop: mpsc::Sender<()>,
}

impl OutputContext {
    fn open() -> Result<Self> {
        let timeline = Arc::new(Mutex::new(Timeline::new()));
        let shared = Arc::clone(&timeline);
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let (ready_tx, ready_rx) = mpsc::channel();

        std::thread::spawn(move || match build_output_stream(&shared) {
            Ok(stream) => {
                if ready_tx.send(Ok(())).is_err() {
                    return;
                }
                let _ = stop_rx.recv();
                drop(stream);
                tracing::debug!("playback output context closed");
            }
            Err(e) => {
                let _ = ready_tx.send(Err(e));
            }
        });

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                timeline,
                _stop: stop_tx,
            }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(Error::DeviceUnavailable(
                "playback thread exited during startup".to_string(),
            )),
        }
    }
}

/// Plays scheduled interview audio to the default output device
pub struct Playback {
    scheduler: PlaybackScheduler,
    output: Option<OutputContext>,
    failed: bool,
}

impl Playback {
    /// Create a playback engine; the output device is opened lazily on the
    /// first received chunk
    #[must_use]
    pub fn new(config: PlaybackConfig) -> Self {
        Self {
            scheduler: PlaybackScheduler::new(config),
            output: None,
            failed: false,
        }
    }

    /// Decode a server audio payload and schedule it for playback
    ///
    /// # Errors
    ///
    /// Returns `Error::Decode` for an invalid PCM16 payload (the chunk is
    /// dropped, nothing is scheduled) and `Error::DeviceUnavailable` if the
    /// output device cannot be opened.
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn enqueue(&mut self, payload: &[u8]) -> Result<()> {
        let samples = decode_pcm16(payload)?;
        if samples.is_empty() {
            return Ok(());
        }

        // Once the device has refused to open, later chunks are dropped
        // without another attempt
        if self.failed {
            tracing::trace!("output unavailable, dropping chunk");
            return Ok(());
        }

        if self.output.is_none() {
            match OutputContext::open() {
                Ok(context) => self.output = Some(context),
                Err(e) => {
                    self.failed = true;
                    return Err(e);
                }
            }
        }
        let Some(output) = self.output.as_ref() else {
            return Ok(());
        };

        let Ok(mut timeline) = output.timeline.lock() else {
            return Ok(());
        };

        let now = timeline.clock();
        let duration = samples.len() as f64 / f64::from(SAMPLE_RATE);
        let start = self.scheduler.schedule(now, duration);
        let start_frame = (start * f64::from(SAMPLE_RATE)).round() as u64;
        timeline.write_at(start_frame, &samples);

        tracing::trace!(
            samples = samples.len(),
            now,
            start,
            "scheduled playback chunk"
        );

        Ok(())
    }

    /// Tear down the output context and reset the cursor
    ///
    /// Samples not yet rendered are abandoned; the next connection starts a
    /// fresh turn sequence.
    pub fn reset(&mut self) {
        self.scheduler.reset();
        self.output = None;
        self.failed = false;
    }

    /// Whether an output context is currently open
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.output.is_some()
    }
}

/// Build and start the output stream; runs on the playback thread
fn build_output_stream(timeline: &Arc<Mutex<Timeline>>) -> Result<cpal::Stream> {
    let host = cpal::default_host();

    let device = host
        .default_output_device()
        .ok_or_else(|| Error::DeviceUnavailable("no output device available".to_string()))?;

    let supported_config = device
        .supported_output_configs()
        .map_err(|e| Error::DeviceUnavailable(e.to_string()))?
        .find(|c| {
            c.channels() == 1
                && c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
        })
        .or_else(|| {
            // Fallback: try stereo
            device.supported_output_configs().ok()?.find(|c| {
                c.channels() == 2
                    && c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
            })
        })
        .ok_or_else(|| Error::DeviceUnavailable("no suitable output config found".to_string()))?;

    let config: StreamConfig = supported_config
        .with_sample_rate(SampleRate(SAMPLE_RATE))
        .config();
    let channels = config.channels as usize;

    let shared = Arc::clone(timeline);
    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                if let Ok(mut timeline) = shared.lock() {
                    timeline.render(data, channels);
                } else {
                    data.fill(0.0);
                }
            },
            |err| {
                tracing::error!(error = %err, "audio playback error");
            },
            None,
        )
        .map_err(|e| Error::DeviceUnavailable(e.to_string()))?;

    stream.play().map_err(|e| Error::DeviceUnavailable(e.to_string()))?;

    tracing::debug!(
        device = device.name().unwrap_or_default(),
        sample_rate = SAMPLE_RATE,
        channels,
        "audio playback started"
    );

    Ok(stream)
}
