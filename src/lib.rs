//! Voicelink - realtime audio transport for AI voice interviews
//!
//! This library provides the streaming core of the interview experience:
//! - Binary wire framing for client- and server-origin audio
//! - Microphone capture at 16 kHz, framed into fixed-size PCM16 chunks
//! - A persistent WebSocket transport with frame demultiplexing
//! - Scheduled 24 kHz playback with turn-aware pre-roll
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   encode   ┌─────────────┐    send    ┌───────────┐
//! │   Capture    ├───────────►│ Frame Codec ├───────────►│           │
//! │  (mic 16k)   │            └─────────────┘            │ Transport │◄──► remote
//! └──────────────┘   decode   ┌─────────────┐   receive  │   (ws)    │
//! ┌──────────────┐◄───────────┤ Frame Codec │◄───────────┤           │
//! │   Playback   │            └─────────────┘            └─────┬─────┘
//! │  (spk 24k,   │                                             │ text
//! │  scheduled)  │                                             ▼
//! └──────────────┘                                   SessionEvent sink
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod frame;
pub mod session;
pub mod transport;
pub mod voice;

pub use config::Config;
pub use error::{Error, Result};
pub use events::SessionEvent;
pub use frame::FrameKind;
pub use session::{Session, SessionHandle};
pub use transport::{ConnectionState, Transport};
