//! Audio capture from microphone
//!
//! Turns the live microphone feed into encoded client audio frames at a
//! fixed cadence: mono f32 input at 16 kHz, chunked to 4096 samples,
//! converted to PCM16 and framed for the transport. Echo cancellation and
//! noise suppression ride along where the platform input path provides
//! them; `cpal` exposes no portable toggle.

use std::sync::mpsc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};
use tokio::sync::oneshot;

use crate::frame;
use crate::{Error, Result};

/// Sample rate for audio capture (16kHz for speech)
pub const SAMPLE_RATE: u32 = 16000;

/// Samples per outbound frame
pub const CHUNK_SAMPLES: usize = 4096;

/// State of the capture pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    /// No microphone held
    Idle,
    /// Input stream live, frames flowing to the transport
    Recording,
}

/// Commands for the thread owning the input stream
enum CaptureCommand {
    Start {
        reply: oneshot::Sender<Result<()>>,
    },
    Stop,
}

/// Captures microphone audio and feeds encoded frames to the transport
///
/// The `cpal::Stream` is not `Send`, so the stream object lives on a
/// dedicated thread; this handle drives it over a command channel and
/// stays usable from the session task.
pub struct CapturePipeline {
    commands: mpsc::Sender<CaptureCommand>,
    state: CaptureState,
}

impl CapturePipeline {
    /// Create a capture pipeline delivering encoded frames to `outbound`
    #[must_use]
    pub fn new(outbound: tokio::sync::mpsc::UnboundedSender<Vec<u8>>) -> Self {
        let (commands, command_rx) = mpsc::channel();
        std::thread::spawn(move || run_device_thread(&command_rx, &outbound));

        Self {
            commands,
            state: CaptureState::Idle,
        }
    }

    /// Acquire the microphone and start streaming frames
    ///
    /// A no-op when already recording.
    ///
    /// # Errors
    ///
    /// Returns `Error::DeviceUnavailable` if the platform denies or lacks a
    /// capture device; the state stays `Idle` and nothing is retried.
    pub async fn start_recording(&mut self) -> Result<()> {
        if self.state == CaptureState::Recording {
            return Ok(());
        }

        let (reply, reply_rx) = oneshot::channel();
        self.commands
            .send(CaptureCommand::Start { reply })
            .map_err(|_| Error::DeviceUnavailable("capture thread is gone".to_string()))?;

        match reply_rx.await {
            Ok(Ok(())) => {
                self.state = CaptureState::Recording;
                tracing::info!("recording started");
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(Error::DeviceUnavailable(
                "capture thread dropped the start request".to_string(),
            )),
        }
    }

    /// Stop recording and release the microphone
    ///
    /// Idempotent; calling while idle is a no-op.
    pub fn stop_recording(&mut self) {
        if self.state == CaptureState::Idle {
            return;
        }

        let _ = self.commands.send(CaptureCommand::Stop);
        self.state = CaptureState::Idle;
        tracing::debug!("recording stopped");
    }

    /// Current capture state
    #[must_use]
    pub const fn state(&self) -> CaptureState {
        self.state
    }

    /// Check if currently recording
    #[must_use]
    pub const fn is_recording(&self) -> bool {
        matches!(self.state, CaptureState::Recording)
    }
}

/// Convert a floating sample in [-1.0, 1.0] to PCM16
///
/// Out-of-range input clamps to the PCM16 limits instead of wrapping.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn sample_to_pcm16(sample: f32) -> i16 {
    (sample * 32767.0).round().clamp(-32768.0, 32767.0) as i16
}

/// Convert a block of floating samples to PCM16
#[must_use]
pub fn samples_to_pcm16(samples: &[f32]) -> Vec<i16> {
    samples.iter().copied().map(sample_to_pcm16).collect()
}

/// Owns the input stream; exits when the pipeline handle is dropped
fn run_device_thread(
    commands: &mpsc::Receiver<CaptureCommand>,
    outbound: &tokio::sync::mpsc::UnboundedSender<Vec<u8>>,
) {
    let mut stream: Option<cpal::Stream> = None;

    while let Ok(command) = commands.recv() {
        match command {
            CaptureCommand::Start { reply } => {
                let result = if stream.is_some() {
                    Ok(())
                } else {
                    build_input_stream(outbound.clone()).map(|s| stream = Some(s))
                };
                let _ = reply.send(result);
            }
            CaptureCommand::Stop => {
                stream = None;
            }
        }
    }
}

/// Build and start the input stream; runs on the capture thread
fn build_input_stream(
    outbound: tokio::sync::mpsc::UnboundedSender<Vec<u8>>,
) -> Result<cpal::Stream> {
    let host = cpal::default_host();

    let device = host
        .default_input_device()
        .ok_or_else(|| Error::DeviceUnavailable("no input device available".to_string()))?;

    let supported_config = device
        .supported_input_configs()
        .map_err(|e| Error::DeviceUnavailable(e.to_string()))?
        .find(|c| {
            c.channels() == 1
                && c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
        })
        .ok_or_else(|| Error::DeviceUnavailable("no suitable input config found".to_string()))?;

    let config: StreamConfig = supported_config
        .with_sample_rate(SampleRate(SAMPLE_RATE))
        .config();

    let mut pending: Vec<f32> = Vec::with_capacity(CHUNK_SAMPLES * 2);
    let stream = device
        .build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                pending.extend_from_slice(data);
                while pending.len() >= CHUNK_SAMPLES {
                    let chunk: Vec<i16> =
                        pending.drain(..CHUNK_SAMPLES).map(sample_to_pcm16).collect();
                    let encoded = frame::encode_client_audio(&chunk);
                    // Dropped on the floor when nobody can take it; the
                    // device cannot be paused mid-stream
                    let _ = outbound.send(encoded);
                }
            },
            |err| {
                tracing::error!(error = %err, "audio capture error");
            },
            None,
        )
        .map_err(|e| Error::DeviceUnavailable(e.to_string()))?;

    stream.play().map_err(|e| Error::DeviceUnavailable(e.to_string()))?;

    tracing::debug!(
        device = device.name().unwrap_or_default(),
        sample_rate = SAMPLE_RATE,
        "audio capture started"
    );

    Ok(stream)
}
