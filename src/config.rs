//! Configuration management for the voicelink engine

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::Deserialize;
use url::Url;

use crate::{Error, Result};

/// Voicelink configuration
///
/// Loaded from `voicelink.toml` in the platform config directory when
/// present; every field has a working default except the server endpoint,
/// which must come from the file or the CLI.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote endpoint configuration
    pub server: ServerConfig,

    /// Playback scheduling configuration
    pub playback: PlaybackConfig,
}

/// Remote endpoint configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Base WebSocket endpoint; the opaque session id is appended as a
    /// path segment to form the connection target
    pub endpoint: Option<Url>,
}

/// Playback scheduling configuration
///
/// The defaults are tuned for speech synthesis bursts; deployments may
/// adjust them, but `grace` must stay below `playahead` and the turn delay
/// must be non-zero (see [`Config::validate`]).
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Minimum buffering delay applied to every scheduled chunk (ms)
    pub playahead_ms: u64,

    /// Extra pre-roll applied to the first chunk of a new turn (ms)
    pub turn_delay_ms: u64,

    /// Staleness tolerance when deciding whether a new turn has begun (ms)
    pub grace_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            playahead_ms: 250,
            turn_delay_ms: 500,
            grace_ms: 50,
        }
    }
}

impl Config {
    /// Load configuration from the platform config directory
    ///
    /// Missing file or undeterminable config directory fall back to
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read, parsed, or
    /// validated.
    pub fn load() -> Result<Self> {
        match config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from an explicit file path
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, parsed, or validated.
    pub fn load_from(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&raw)?;
        config.validate()?;

        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Validate the relative ordering of the scheduling delays
    ///
    /// # Errors
    ///
    /// Returns error unless `grace < playahead` and the turn delay is
    /// non-zero, the ordering the turn-detection logic relies on.
    pub fn validate(&self) -> Result<()> {
        let playback = self.playback;

        if playback.grace_ms >= playback.playahead_ms {
            return Err(Error::Config(format!(
                "grace_ms ({}) must be below playahead_ms ({})",
                playback.grace_ms, playback.playahead_ms
            )));
        }

        if playback.turn_delay_ms == 0 {
            return Err(Error::Config(
                "turn_delay_ms must be non-zero".to_string(),
            ));
        }

        Ok(())
    }

    /// The configured endpoint, or a config error when none was provided
    ///
    /// # Errors
    ///
    /// Returns error if neither the config file nor the caller supplied an
    /// endpoint.
    pub fn endpoint(&self) -> Result<&Url> {
        self.server
            .endpoint
            .as_ref()
            .ok_or_else(|| Error::Config("no server endpoint configured".to_string()))
    }
}

/// Path of the config file under the platform config directory
fn config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "voicelink").map(|dirs| dirs.config_dir().join("voicelink.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_scheduling_delays() {
        let config = Config::default();
        assert_eq!(config.playback.playahead_ms, 250);
        assert_eq!(config.playback.turn_delay_ms, 500);
        assert_eq!(config.playback.grace_ms, 50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_endpoint_is_an_error_only_when_asked() {
        let config = Config::default();
        assert!(config.server.endpoint.is_none());
        assert!(config.endpoint().is_err());
    }

    #[test]
    fn test_parse_full_config() {
        let config: Config = toml::from_str(
            r#"
            [server]
            endpoint = "wss://interviews.example.com/audio"

            [playback]
            playahead_ms = 300
            turn_delay_ms = 400
            grace_ms = 40
            "#,
        )
        .unwrap();

        assert_eq!(
            config.endpoint().unwrap().as_str(),
            "wss://interviews.example.com/audio"
        );
        assert_eq!(config.playback.playahead_ms, 300);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [playback]
            playahead_ms = 500
            "#,
        )
        .unwrap();

        assert_eq!(config.playback.playahead_ms, 500);
        assert_eq!(config.playback.turn_delay_ms, 500);
        assert_eq!(config.playback.grace_ms, 50);
    }

    #[test]
    fn test_validate_rejects_grace_at_or_above_playahead() {
        let mut config = Config::default();
        config.playback.grace_ms = config.playback.playahead_ms;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_turn_delay() {
        let mut config = Config::default();
        config.playback.turn_delay_ms = 0;
        assert!(config.validate().is_err());
    }
}
