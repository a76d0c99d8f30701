//! Typed, range-checked effect parameters
//!
//! Every knob has a declared range and default. Setters clamp silently, so
//! an [`EffectParameters`] value is always valid, including one that was
//! deserialized from a hand-edited config file.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::ParamInfo;

/// Output volume range and default (applied to the processed microphone)
pub const MIN_VOLUME: f32 = 0.0;
pub const MAX_VOLUME: f32 = 2.0;
pub const DEFAULT_VOLUME: f32 = 1.0;

/// Clamp an output volume into [`MIN_VOLUME`, `MAX_VOLUME`]
pub fn clamp_volume(volume: f32) -> f32 {
    if volume.is_nan() {
        DEFAULT_VOLUME
    } else {
        volume.clamp(MIN_VOLUME, MAX_VOLUME)
    }
}

/// Identifier for every effect knob
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamId {
    ReverbRoomSize,
    ReverbWet,
    EchoDelay,
    EchoFeedback,
    EchoMix,
    CompressorThreshold,
    CompressorRatio,
    EqBass,
    EqMid,
    EqTreble,
}

impl ParamId {
    pub const COUNT: usize = 10;

    /// All parameters in storage order
    pub const ALL: [ParamId; Self::COUNT] = [
        ParamId::ReverbRoomSize,
        ParamId::ReverbWet,
        ParamId::EchoDelay,
        ParamId::EchoFeedback,
        ParamId::EchoMix,
        ParamId::CompressorThreshold,
        ParamId::CompressorRatio,
        ParamId::EqBass,
        ParamId::EqMid,
        ParamId::EqTreble,
    ];

    /// Storage index
    #[inline]
    fn index(self) -> usize {
        self as usize
    }

    /// Machine name, identical to the config file key
    pub fn name(&self) -> &'static str {
        match self {
            ParamId::ReverbRoomSize => "reverb_room_size",
            ParamId::ReverbWet => "reverb_wet",
            ParamId::EchoDelay => "echo_delay",
            ParamId::EchoFeedback => "echo_feedback",
            ParamId::EchoMix => "echo_mix",
            ParamId::CompressorThreshold => "compressor_threshold",
            ParamId::CompressorRatio => "compressor_ratio",
            ParamId::EqBass => "eq_bass",
            ParamId::EqMid => "eq_mid",
            ParamId::EqTreble => "eq_treble",
        }
    }

    /// Display name, range, default and unit
    pub fn info(&self) -> ParamInfo {
        match self {
            ParamId::ReverbRoomSize => ParamInfo::new("Room Size", 0.6).with_range(0.0, 1.0),
            ParamId::ReverbWet => ParamInfo::new("Reverb Wet", 0.25).with_range(0.0, 1.0),
            ParamId::EchoDelay => ParamInfo::new("Echo Delay", 0.3)
                .with_range(0.1, 1.0)
                .with_unit("s"),
            ParamId::EchoFeedback => ParamInfo::new("Echo Feedback", 0.3).with_range(0.0, 0.9),
            ParamId::EchoMix => ParamInfo::new("Echo Mix", 0.0).with_range(0.0, 1.0),
            ParamId::CompressorThreshold => ParamInfo::new("Threshold", -18.0)
                .with_range(-40.0, 0.0)
                .with_unit("dB"),
            ParamId::CompressorRatio => ParamInfo::new("Ratio", 3.5)
                .with_range(1.0, 20.0)
                .with_unit(":1"),
            ParamId::EqBass => ParamInfo::new("Bass", 2.0)
                .with_range(-20.0, 20.0)
                .with_unit("dB"),
            ParamId::EqMid => ParamInfo::new("Mid", 3.0)
                .with_range(-20.0, 20.0)
                .with_unit("dB"),
            ParamId::EqTreble => ParamInfo::new("Treble", 1.5)
                .with_range(-20.0, 20.0)
                .with_unit("dB"),
        }
    }

    /// Allowed `(min, max)` range
    pub fn range(&self) -> (f32, f32) {
        let info = self.info();
        (info.min, info.max)
    }
}

impl fmt::Display for ParamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned when parsing an unknown parameter name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown effect parameter: {0}")]
pub struct UnknownParam(pub String);

impl FromStr for ParamId {
    type Err = UnknownParam;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        ParamId::ALL
            .into_iter()
            .find(|id| id.name() == wanted)
            .ok_or_else(|| UnknownParam(s.to_string()))
    }
}

/// Complete effect parameter set
///
/// Read as a whole snapshot by [`super::build_chain`]. All mutation goes
/// through clamping setters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "ParamsFile", into = "ParamsFile")]
pub struct EffectParameters {
    values: [f32; ParamId::COUNT],
}

impl Default for EffectParameters {
    fn default() -> Self {
        let mut values = [0.0; ParamId::COUNT];
        for id in ParamId::ALL {
            values[id.index()] = id.info().default;
        }
        Self { values }
    }
}

macro_rules! param_accessors {
    ($($id:ident => $get:ident, $set:ident;)*) => {
        $(
            #[inline]
            pub fn $get(&self) -> f32 {
                self.values[ParamId::$id.index()]
            }

            pub fn $set(&mut self, value: f32) {
                self.set(ParamId::$id, value);
            }
        )*
    };
}

impl EffectParameters {
    /// Read a parameter
    #[inline]
    pub fn get(&self, id: ParamId) -> f32 {
        self.values[id.index()]
    }

    /// Write a parameter, clamped to its declared range
    ///
    /// Returns the value actually stored.
    pub fn set(&mut self, id: ParamId, value: f32) -> f32 {
        let clamped = id.info().clamp(value);
        self.values[id.index()] = clamped;
        clamped
    }

    /// Iterate `(id, value)` pairs in storage order
    pub fn iter(&self) -> impl Iterator<Item = (ParamId, f32)> + '_ {
        ParamId::ALL.into_iter().map(|id| (id, self.get(id)))
    }

    param_accessors! {
        ReverbRoomSize => reverb_room_size, set_reverb_room_size;
        ReverbWet => reverb_wet, set_reverb_wet;
        EchoDelay => echo_delay, set_echo_delay;
        EchoFeedback => echo_feedback, set_echo_feedback;
        EchoMix => echo_mix, set_echo_mix;
        CompressorThreshold => compressor_threshold_db, set_compressor_threshold_db;
        CompressorRatio => compressor_ratio, set_compressor_ratio;
        EqBass => eq_bass_db, set_eq_bass_db;
        EqMid => eq_mid_db, set_eq_mid_db;
        EqTreble => eq_treble_db, set_eq_treble_db;
    }
}

/// On-disk shape of [`EffectParameters`] (missing keys take defaults)
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
struct ParamsFile {
    reverb_room_size: f32,
    reverb_wet: f32,
    echo_delay: f32,
    echo_feedback: f32,
    echo_mix: f32,
    compressor_threshold: f32,
    compressor_ratio: f32,
    eq_bass: f32,
    eq_mid: f32,
    eq_treble: f32,
}

impl Default for ParamsFile {
    fn default() -> Self {
        EffectParameters::default().into()
    }
}

impl From<EffectParameters> for ParamsFile {
    fn from(p: EffectParameters) -> Self {
        Self {
            reverb_room_size: p.reverb_room_size(),
            reverb_wet: p.reverb_wet(),
            echo_delay: p.echo_delay(),
            echo_feedback: p.echo_feedback(),
            echo_mix: p.echo_mix(),
            compressor_threshold: p.compressor_threshold_db(),
            compressor_ratio: p.compressor_ratio(),
            eq_bass: p.eq_bass_db(),
            eq_mid: p.eq_mid_db(),
            eq_treble: p.eq_treble_db(),
        }
    }
}

impl From<ParamsFile> for EffectParameters {
    fn from(file: ParamsFile) -> Self {
        let mut params = EffectParameters::default();
        params.set_reverb_room_size(file.reverb_room_size);
        params.set_reverb_wet(file.reverb_wet);
        params.set_echo_delay(file.echo_delay);
        params.set_echo_feedback(file.echo_feedback);
        params.set_echo_mix(file.echo_mix);
        params.set_compressor_threshold_db(file.compressor_threshold);
        params.set_compressor_ratio(file.compressor_ratio);
        params.set_eq_bass_db(file.eq_bass);
        params.set_eq_mid_db(file.eq_mid);
        params.set_eq_treble_db(file.eq_treble);
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let p = EffectParameters::default();
        assert_eq!(p.reverb_room_size(), 0.6);
        assert_eq!(p.reverb_wet(), 0.25);
        assert_eq!(p.echo_delay(), 0.3);
        assert_eq!(p.echo_feedback(), 0.3);
        assert_eq!(p.echo_mix(), 0.0);
        assert_eq!(p.compressor_threshold_db(), -18.0);
        assert_eq!(p.compressor_ratio(), 3.5);
        assert_eq!(p.eq_bass_db(), 2.0);
        assert_eq!(p.eq_mid_db(), 3.0);
        assert_eq!(p.eq_treble_db(), 1.5);
    }

    #[test]
    fn test_setters_clamp() {
        let mut p = EffectParameters::default();

        p.set_reverb_room_size(1.5);
        assert_eq!(p.reverb_room_size(), 1.0);

        p.set_compressor_ratio(0.0);
        assert_eq!(p.compressor_ratio(), 1.0);

        p.set_echo_delay(0.01);
        assert_eq!(p.echo_delay(), 0.1);

        p.set_echo_feedback(2.0);
        assert_eq!(p.echo_feedback(), 0.9);

        p.set_compressor_threshold_db(-100.0);
        assert_eq!(p.compressor_threshold_db(), -40.0);

        p.set_eq_treble_db(35.0);
        assert_eq!(p.eq_treble_db(), 20.0);

        p.set_reverb_wet(-1.0);
        assert_eq!(p.reverb_wet(), 0.0);
    }

    #[test]
    fn test_every_param_clamps_both_ends() {
        let mut p = EffectParameters::default();
        for id in ParamId::ALL {
            let info = id.info();
            assert_eq!(p.set(id, info.max + 100.0), info.max, "{} upper", id);
            assert_eq!(p.get(id), info.max);
            assert_eq!(p.set(id, info.min - 100.0), info.min, "{} lower", id);
            assert_eq!(p.get(id), info.min);
            assert!(info.default >= info.min && info.default <= info.max, "{} default in range", id);
        }
    }

    #[test]
    fn test_param_names_parse() {
        for id in ParamId::ALL {
            assert_eq!(id.name().parse::<ParamId>().unwrap(), id);
        }
        assert_eq!("Reverb-Wet".parse::<ParamId>().unwrap(), ParamId::ReverbWet);
        assert!("autotune".parse::<ParamId>().is_err());
    }

    #[test]
    fn test_volume_clamp() {
        assert_eq!(clamp_volume(3.0), MAX_VOLUME);
        assert_eq!(clamp_volume(-1.0), MIN_VOLUME);
        assert_eq!(clamp_volume(f32::NAN), DEFAULT_VOLUME);
        assert_eq!(clamp_volume(1.3), 1.3);
    }

    #[test]
    fn test_yaml_missing_fields_default_and_clamp() {
        let yaml = "reverb_wet: 0.5\ncompressor_ratio: 100.0\n";
        let p: EffectParameters = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(p.reverb_wet(), 0.5);
        assert_eq!(p.compressor_ratio(), 20.0);
        assert_eq!(p.eq_mid_db(), 3.0);
        assert_eq!(p.reverb_room_size(), 0.6);
    }

    #[test]
    fn test_yaml_roundtrip() {
        let mut p = EffectParameters::default();
        p.set_echo_mix(0.4);
        p.set_eq_bass_db(-6.0);
        let yaml = serde_yaml::to_string(&p).unwrap();
        assert!(yaml.contains("echo_mix"));
        let back: EffectParameters = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, p);
    }
}
