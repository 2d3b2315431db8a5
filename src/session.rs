//! Interview session lifecycle
//!
//! A session owns one transport, one capture pipeline, and one playback
//! engine, and drives all of them from a single cooperative task: a
//! `select!` loop over host commands, outbound frames from the microphone,
//! and inbound traffic from the socket. Sessions are single-use; after a
//! disconnect or remote close the task ends and a new conversation needs a
//! new session.

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::events::SessionEvent;
use crate::transport::{Incoming, Transport};
use crate::voice::{CapturePipeline, Playback};
use crate::{Error, Result};

/// Commands accepted by a running session
enum SessionCommand {
    StartRecording,
    StopRecording,
    Disconnect,
}

/// A live interview session
///
/// Constructed by [`Session::connect`]; everything afterwards happens on
/// the session task and is driven through the returned [`SessionHandle`].
pub struct Session {
    transport: Transport,
    capture: CapturePipeline,
    playback: Playback,
    events: UnboundedSender<SessionEvent>,
    playback_reported: bool,
}

impl Session {
    /// Connect to the interview endpoint and spawn the session task
    ///
    /// Events (connection lifecycle, device trouble, server messages)
    /// arrive on the `events` channel the host supplies.
    ///
    /// # Errors
    ///
    /// Returns error if no endpoint is configured or the dial fails.
    pub async fn connect(
        config: &Config,
        session_id: &str,
        events: UnboundedSender<SessionEvent>,
    ) -> Result<SessionHandle> {
        let endpoint = config.endpoint()?.clone();

        let mut transport = Transport::new(endpoint, events.clone());
        transport.connect(session_id).await?;

        let (frames_tx, frames_rx) = mpsc::unbounded_channel();
        let session = Self {
            transport,
            capture: CapturePipeline::new(frames_tx),
            playback: Playback::new(config.playback),
            events,
            playback_reported: false,
        };

        let (commands, command_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(session.run(command_rx, frames_rx));

        Ok(SessionHandle {
            commands,
            task: Some(task),
        })
    }

    async fn run(
        mut self,
        mut commands: UnboundedReceiver<SessionCommand>,
        mut frames: UnboundedReceiver<Vec<u8>>,
    ) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(SessionCommand::StartRecording) => self.start_recording().await,
                    Some(SessionCommand::StopRecording) => self.capture.stop_recording(),
                    Some(SessionCommand::Disconnect) | None => break,
                },
                Some(frame) = frames.recv() => self.transport.send(frame).await,
                incoming = self.transport.recv() => match incoming {
                    Incoming::Audio(payload) => self.play(&payload),
                    Incoming::Message(value) => {
                        let _ = self.events.send(SessionEvent::Message(value));
                    }
                    Incoming::Closed => break,
                },
            }
        }

        self.shutdown().await;
    }

    async fn start_recording(&mut self) {
        if let Err(e) = self.capture.start_recording().await {
            tracing::warn!(error = %e, "failed to access microphone");
            let _ = self.events.send(SessionEvent::CaptureError {
                detail: e.to_string(),
            });
        }
    }

    fn play(&mut self, payload: &[u8]) {
        match self.playback.enqueue(payload) {
            Ok(()) => {}
            Err(e @ Error::Decode(_)) => {
                tracing::warn!(error = %e, "dropping undecodable audio chunk");
            }
            Err(e) => {
                // Device trouble is reported once; afterwards chunks are
                // dropped quietly
                if self.playback_reported {
                    tracing::debug!(error = %e, "playback still unavailable");
                } else {
                    self.playback_reported = true;
                    tracing::warn!(error = %e, "playback unavailable");
                    let _ = self.events.send(SessionEvent::PlaybackError {
                        detail: e.to_string(),
                    });
                }
            }
        }
    }

    /// Release the microphone, close the socket, abandon unplayed audio
    async fn shutdown(&mut self) {
        self.capture.stop_recording();
        self.transport.disconnect().await;
        self.playback.reset();
    }
}

/// Host-facing handle to a running session
///
/// All methods are fire-and-forget commands to the session task and are
/// safe to call in any order, any number of times. Dropping the handle
/// disconnects, so the microphone and output device are reclaimed on every
/// exit path.
pub struct SessionHandle {
    commands: UnboundedSender<SessionCommand>,
    task: Option<JoinHandle<()>>,
}

impl SessionHandle {
    /// Ask the session to start streaming microphone audio
    ///
    /// Failure to acquire the device is reported as a
    /// [`SessionEvent::CaptureError`], not an error here.
    pub fn start_recording(&self) {
        let _ = self.commands.send(SessionCommand::StartRecording);
    }

    /// Ask the session to stop streaming microphone audio
    pub fn stop_recording(&self) {
        let _ = self.commands.send(SessionCommand::StopRecording);
    }

    /// End the session: stop recording, close the connection, reset
    /// playback
    ///
    /// Idempotent; also triggered by dropping the handle.
    pub fn disconnect(&self) {
        let _ = self.commands.send(SessionCommand::Disconnect);
    }

    /// Wait until the session task has finished
    ///
    /// Returns after a local `disconnect` or a remote close has been fully
    /// processed.
    pub async fn wait(mut self) {
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        let _ = self.commands.send(SessionCommand::Disconnect);
    }
}
