//! Player configuration
//!
//! Stored as YAML in the user's config directory.
//! Default location: ~/.config/karaoke/player-config.yaml

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use karaoke_core::audio::SessionConfig;
use karaoke_core::effect::{clamp_volume, EffectParameters, DEFAULT_VOLUME};
use karaoke_core::presets::Preset;

/// Config file name inside the karaoke config directory
pub const CONFIG_FILE_NAME: &str = "player-config.yaml";

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Devices, buffer size and stream rate
    pub audio: SessionConfig,
    /// Vocal effect settings restored at startup
    pub effects: EffectParameters,
    /// Processed mic volume (0.0 - 2.0)
    pub volume: f32,
    /// Preset applied on top of `effects` at startup
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,
    /// Seconds moved by the `+` / `-` commands
    pub skip_seconds: f64,
    /// Status line refresh rate
    pub refresh_hz: u32,
    /// Exit as soon as the backing track finishes, even with stdin open
    pub auto_stop: bool,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            audio: SessionConfig::default(),
            effects: EffectParameters::default(),
            volume: DEFAULT_VOLUME,
            preset: None,
            skip_seconds: 5.0,
            refresh_hz: 20,
            auto_stop: false,
        }
    }
}

impl PlayerConfig {
    /// Effect parameters and volume with the configured preset applied
    ///
    /// An unknown preset name is logged and ignored.
    pub fn initial_mix(&self) -> (EffectParameters, f32) {
        let mut params = self.effects;
        let mut volume = clamp_volume(self.volume);

        if let Some(name) = &self.preset {
            match Preset::from_name(name) {
                Some(preset) => {
                    volume = preset.apply(&mut params);
                    log::info!("Applied preset '{}'", preset);
                }
                None => log::warn!("Unknown preset '{}' in config, ignoring", name),
            }
        }
        (params, volume)
    }

    /// Interval between status refreshes (at least 1 Hz)
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(1000 / self.refresh_hz.clamp(1, 100) as u64)
    }
}

/// Get the default config file path
pub fn default_config_path() -> PathBuf {
    karaoke_core::config::default_config_path(CONFIG_FILE_NAME)
}
