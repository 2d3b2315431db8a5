use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;
use url::Url;

use voicelink::config::PlaybackConfig;
use voicelink::voice::{
    CAPTURE_SAMPLE_RATE, CapturePipeline, PLAYBACK_SAMPLE_RATE, Playback, decode_pcm16,
    samples_to_pcm16,
};
use voicelink::{Config, Session, SessionEvent, frame};

/// Voicelink - realtime audio transport for AI voice interviews
#[derive(Parser)]
#[command(name = "voicelink", version, about)]
struct Cli {
    /// Interview session id to connect to
    session: Option<String>,

    /// WebSocket endpoint override
    #[arg(long, env = "VOICELINK_ENDPOINT")]
    endpoint: Option<Url>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Test microphone input through the capture pipeline
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output through the playback scheduler
    TestSpeaker,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,voicelink=info",
        1 => "info,voicelink=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestMic { duration } => test_mic(duration).await,
            Command::TestSpeaker => test_speaker().await,
        };
    }

    let Some(session_id) = cli.session else {
        anyhow::bail!("a session id is required (or use a subcommand, see --help)");
    };

    let mut config = Config::load()?;
    if let Some(endpoint) = cli.endpoint {
        config.server.endpoint = Some(endpoint);
    }
    config.validate()?;

    tracing::info!(session = %session_id, "starting interview session");

    let (events_tx, mut events) = mpsc::unbounded_channel();
    let handle = Session::connect(&config, &session_id, events_tx).await?;
    handle.start_recording();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(SessionEvent::Connected) => println!("[session] connected"),
                Some(SessionEvent::Disconnected) => {
                    println!("[session] disconnected");
                    break;
                }
                Some(SessionEvent::ConnectionError { detail }) => {
                    println!("[session] connection error: {detail}");
                }
                Some(SessionEvent::CaptureError { detail }) => {
                    println!("[session] failed to access microphone: {detail}");
                }
                Some(SessionEvent::PlaybackError { detail }) => {
                    println!("[session] speaker unavailable: {detail}");
                }
                Some(SessionEvent::Message(value)) => println!("[server] {value}"),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupt received, disconnecting");
                handle.disconnect();
            }
        }
    }

    handle.wait().await;
    Ok(())
}

/// Test microphone input
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let (frames_tx, mut frames) = mpsc::unbounded_channel();
    let mut capture = CapturePipeline::new(frames_tx);
    capture.start_recording().await?;

    println!("Sample rate: {CAPTURE_SAMPLE_RATE} Hz");
    println!("---");

    let deadline = tokio::time::Instant::now() + Duration::from_secs(duration);
    let started = std::time::Instant::now();

    while let Ok(Some(encoded)) = tokio::time::timeout_at(deadline, frames.recv()).await {
        let (_, payload) = frame::decode(&encoded)?;
        let samples = decode_pcm16(payload)?;

        let energy = calculate_rms(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        // Visual meter
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "█".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!(
            "[{:5.1}s] RMS: {:.4} | Peak: {:.4} | [{}]",
            started.elapsed().as_secs_f32(),
            energy,
            peak,
            meter
        );
    }

    capture.stop_recording();

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: pactl info | grep 'Default Source'");
    println!("  3. Run: arecord -l (to list devices)");
    println!("  4. Try: pavucontrol (to check levels)");

    Ok(())
}

/// Calculate RMS energy
#[allow(clippy::cast_precision_loss)]
fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Test speaker output with a sine wave
async fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let mut playback = Playback::new(PlaybackConfig::default());

    // Generate 2 seconds of 440Hz sine wave at the playback rate
    let frequency = 440.0_f32;
    let duration_secs = 2.0_f32;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let num_samples = (PLAYBACK_SAMPLE_RATE as f32 * duration_secs) as usize;

    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..num_samples)
        .map(|i| {
            let t = i as f32 / PLAYBACK_SAMPLE_RATE as f32;
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3 // 30% volume
        })
        .collect();

    println!(
        "Scheduling {} samples at {} Hz...",
        samples.len(),
        PLAYBACK_SAMPLE_RATE
    );

    // Feed the tone through the real path: PCM16 chunks into the scheduler
    for chunk in samples.chunks(4800) {
        let payload: Vec<u8> = samples_to_pcm16(chunk)
            .into_iter()
            .flat_map(i16::to_le_bytes)
            .collect();
        playback.enqueue(&payload)?;
    }

    // Pre-roll plus tone length, with a little margin
    tokio::time::sleep(Duration::from_millis(3000)).await;
    playback.reset();

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");
    println!("If you didn't hear anything, check:");
    println!("  1. Run: pactl info | grep 'Default Sink'");
    println!("  2. Run: pactl list sinks short");
    println!("  3. Try: pavucontrol (to check output levels)");

    Ok(())
}
