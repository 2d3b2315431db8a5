//! Session events delivered to the hosting application
//!
//! The engine never surfaces failures by unwinding into the caller;
//! everything the host should show (connection lifecycle, device trouble,
//! server text messages) arrives as a [`SessionEvent`] on the channel the
//! host supplied at connect time.

use serde::Serialize;

/// Events emitted by a voice session
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Connection to the interview endpoint is established
    Connected,

    /// Connection ended, locally or remotely; the session is finished
    Disconnected,

    /// Transport-level error; the connection may still close on its own
    ConnectionError {
        /// Human-readable failure description
        detail: String,
    },

    /// Microphone could not be acquired; recording did not start
    CaptureError {
        /// Human-readable failure description
        detail: String,
    },

    /// Speaker output could not be opened; incoming audio is being dropped
    PlaybackError {
        /// Human-readable failure description
        detail: String,
    },

    /// Structured text message from the interview service, forwarded for
    /// the host's own interpretation
    Message(serde_json::Value),
}
