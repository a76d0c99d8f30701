//! Vocal presets
//!
//! A preset sets the reverb wet level, echo mix and output volume on top
//! of whatever else the singer has dialed in.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::effect::{clamp_volume, EffectParameters};

/// Returned when parsing an unknown preset name
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown preset: {0}")]
pub struct UnknownPreset(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Preset {
    RadioReady,
    StudioRecording,
    LivePerformance,
    Podcast,
    RapHipHop,
    RockVocal,
}

impl Preset {
    pub const ALL: [Preset; 6] = [
        Preset::RadioReady,
        Preset::StudioRecording,
        Preset::LivePerformance,
        Preset::Podcast,
        Preset::RapHipHop,
        Preset::RockVocal,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Preset::RadioReady => "Radio Ready",
            Preset::StudioRecording => "Studio Recording",
            Preset::LivePerformance => "Live Performance",
            Preset::Podcast => "Podcast",
            Preset::RapHipHop => "Rap/Hip-Hop",
            Preset::RockVocal => "Rock Vocal",
        }
    }

    /// `(reverb_wet, echo_mix, volume)`
    fn settings(&self) -> (f32, f32, f32) {
        match self {
            Preset::RadioReady => (0.25, 0.15, 1.1),
            Preset::StudioRecording => (0.35, 0.2, 1.0),
            Preset::LivePerformance => (0.5, 0.3, 1.2),
            Preset::Podcast => (0.1, 0.0, 1.15),
            Preset::RapHipHop => (0.2, 0.4, 1.3),
            Preset::RockVocal => (0.6, 0.25, 1.4),
        }
    }

    /// Look up a preset, ignoring case, spaces and punctuation
    ///
    /// `"rap/hip-hop"`, `"Rap Hip Hop"` and `"raphiphop"` all match.
    pub fn from_name(name: &str) -> Option<Preset> {
        let key = normalize(name);
        Self::ALL.into_iter().find(|p| normalize(p.name()) == key)
    }

    /// Apply the preset's effect settings and return its output volume
    pub fn apply(&self, params: &mut EffectParameters) -> f32 {
        let (reverb_wet, echo_mix, volume) = self.settings();
        params.set_reverb_wet(reverb_wet);
        params.set_echo_mix(echo_mix);
        clamp_volume(volume)
    }
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Preset {
    type Err = UnknownPreset;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Preset::from_name(s).ok_or_else(|| UnknownPreset(s.to_string()))
    }
}
