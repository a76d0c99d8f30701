//! Vocal effects - parameters, native DSP stages and the effects chain
//!
//! The microphone signal runs through a fixed-order chain of native stages:
//! compressor, three peaking EQ bands, an optional echo and a reverb. The
//! chain is rebuilt from an [`EffectParameters`] snapshot whenever a knob
//! moves and handed to the audio thread whole (see [`chain`]).

pub mod chain;
pub mod native;
mod params;

pub use chain::{
    build_chain, chain_channel, ChainPublisher, ChainReceiver, EffectsChain, EqBand, PublishError,
    Stage, StageKind, CHAIN_QUEUE_CAPACITY, ECHO_MIX_THRESHOLD,
};
pub use params::{clamp_volume, EffectParameters, ParamId, UnknownParam, DEFAULT_VOLUME, MAX_VOLUME, MIN_VOLUME};

use thiserror::Error;

use crate::types::StereoBuffer;

/// Information about an effect parameter
#[derive(Debug, Clone)]
pub struct ParamInfo {
    /// Parameter name for display
    pub name: String,
    /// Default value
    pub default: f32,
    /// Minimum value
    pub min: f32,
    /// Maximum value
    pub max: f32,
    /// Unit label (e.g., "s", "dB", ":1")
    pub unit: String,
}

impl Default for ParamInfo {
    fn default() -> Self {
        Self {
            name: String::new(),
            default: 0.5,
            min: 0.0,
            max: 1.0,
            unit: String::new(),
        }
    }
}

impl ParamInfo {
    /// Create a new parameter info with name and default value
    pub fn new(name: impl Into<String>, default: f32) -> Self {
        Self {
            name: name.into(),
            default,
            ..Default::default()
        }
    }

    /// Set the value range
    pub fn with_range(mut self, min: f32, max: f32) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    /// Set the unit label
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    /// Clamp a value into this parameter's range (NaN falls back to the default)
    pub fn clamp(&self, value: f32) -> f32 {
        if value.is_nan() {
            self.default
        } else {
            value.clamp(self.min, self.max)
        }
    }
}

/// Information about an effect stage
#[derive(Debug, Clone)]
pub struct EffectInfo {
    /// Effect name for display
    pub name: String,
    /// Effect category (e.g., "Dynamics", "EQ", "Delay", "Reverb")
    pub category: String,
}

impl EffectInfo {
    /// Create a new effect info
    pub fn new(name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
        }
    }
}

/// Errors a stage can report for a single block
///
/// These never leave the audio callback: the mix engine substitutes the
/// unprocessed microphone block and carries on.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum EffectError {
    /// A stage produced NaN or infinite output
    #[error("Effect stage {stage:?} produced non-finite output")]
    NonFinite { stage: StageKind },
}

/// The core effect trait - implemented by every native stage
///
/// Stages are configured once at construction (from an [`EffectParameters`]
/// snapshot) and only carry DSP state afterwards.
pub trait Effect: Send {
    /// Process a stereo buffer in-place
    fn process(&mut self, buffer: &mut StereoBuffer);

    /// Get information about this effect
    fn info(&self) -> &EffectInfo;

    /// Clear delay lines, envelopes and filter memory
    fn reset(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_info() {
        let param = ParamInfo::new("Gain", 1.0)
            .with_range(-24.0, 24.0)
            .with_unit("dB");

        assert_eq!(param.name, "Gain");
        assert_eq!(param.default, 1.0);
        assert_eq!(param.min, -24.0);
        assert_eq!(param.max, 24.0);
        assert_eq!(param.unit, "dB");
    }

    #[test]
    fn test_param_info_clamp() {
        let param = ParamInfo::new("Ratio", 3.5).with_range(1.0, 20.0);
        assert_eq!(param.clamp(0.0), 1.0);
        assert_eq!(param.clamp(50.0), 20.0);
        assert_eq!(param.clamp(4.0), 4.0);
        assert_eq!(param.clamp(f32::NAN), 3.5);
        assert_eq!(param.clamp(f32::INFINITY), 20.0);
    }
}
