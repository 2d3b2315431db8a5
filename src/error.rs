//! Error types for the voicelink engine

use thiserror::Error;

/// Result type alias for voicelink operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the voicelink engine
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Microphone or speaker could not be acquired
    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Wire frame carried no bytes at all
    #[error("malformed frame: empty")]
    MalformedFrame,

    /// Wire frame carried a kind byte this version does not know
    #[error("unknown frame kind: {0:#04x}")]
    UnknownFrameKind(u8),

    /// Audio payload could not be reinterpreted as PCM16 samples
    #[error("decode error: {0}")]
    Decode(String),

    /// Connection was closed by either side
    #[error("connection closed")]
    ConnectionClosed,

    /// Transport-level connection error
    #[error("connection error: {0}")]
    Connection(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
