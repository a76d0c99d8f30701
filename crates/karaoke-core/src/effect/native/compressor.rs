//! Vocal compressor - feed-forward, stereo-linked

use crate::effect::{Effect, EffectInfo};
use crate::level::db_to_amplitude;
use crate::types::StereoBuffer;

/// Attack time for the level detector
pub const ATTACK_MS: f32 = 3.0;
/// Release time for the level detector
pub const RELEASE_MS: f32 = 100.0;

/// One-pole smoothing coefficient for a time constant in milliseconds
#[inline]
fn time_coefficient(ms: f32, sample_rate: u32) -> f32 {
    (-1.0 / (ms * 0.001 * sample_rate as f32)).exp()
}

/// Downward compressor with a peak envelope follower
///
/// Both channels share one envelope so the stereo image does not wander.
/// Gain above threshold follows `(env / threshold)^(1/ratio - 1)`.
pub struct CompressorEffect {
    info: EffectInfo,
    threshold: f32,
    /// 1/ratio - 1, precomputed exponent for the gain curve
    slope: f32,
    attack_coeff: f32,
    release_coeff: f32,
    envelope: f32,
}

impl CompressorEffect {
    /// Create a compressor with threshold in dB and ratio N:1
    pub fn new(threshold_db: f32, ratio: f32, sample_rate: u32) -> Self {
        let ratio = ratio.max(1.0);
        Self {
            info: EffectInfo::new("Compressor", "Dynamics"),
            threshold: db_to_amplitude(threshold_db),
            slope: 1.0 / ratio - 1.0,
            attack_coeff: time_coefficient(ATTACK_MS, sample_rate),
            release_coeff: time_coefficient(RELEASE_MS, sample_rate),
            envelope: 0.0,
        }
    }

    /// Gain for the current envelope value
    #[inline]
    fn gain_for(&self, envelope: f32) -> f32 {
        if envelope > self.threshold {
            (envelope / self.threshold).powf(self.slope)
        } else {
            1.0
        }
    }
}

impl Effect for CompressorEffect {
    fn process(&mut self, buffer: &mut StereoBuffer) {
        for sample in buffer.iter_mut() {
            let level = sample.peak();
            let coeff = if level > self.envelope {
                self.attack_coeff
            } else {
                self.release_coeff
            };
            self.envelope = level + coeff * (self.envelope - level);

            let gain = self.gain_for(self.envelope);
            sample.left *= gain;
            sample.right *= gain;
        }
    }

    fn info(&self) -> &EffectInfo {
        &self.info
    }

    fn reset(&mut self) {
        self.envelope = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StereoSample;

    fn constant(level: f32, len: usize) -> StereoBuffer {
        StereoBuffer::from_vec(vec![StereoSample::mono(level); len])
    }

    #[test]
    fn test_below_threshold_is_unity() {
        let mut comp = CompressorEffect::new(-18.0, 4.0, 48000);
        let quiet = db_to_amplitude(-30.0);
        let mut buffer = constant(quiet, 4800);
        comp.process(&mut buffer);
        for s in buffer.iter() {
            assert!((s.left - quiet).abs() < 1e-6);
        }
    }

    #[test]
    fn test_above_threshold_is_reduced() {
        let mut comp = CompressorEffect::new(-20.0, 4.0, 48000);
        let mut buffer = constant(1.0, 48000);
        comp.process(&mut buffer);

        // Settled: 0 dB in, -20 dB threshold, 4:1 -> -15 dB out
        let settled = buffer[47999].left;
        let expected = db_to_amplitude(-15.0);
        assert!(
            (settled - expected).abs() < 0.01,
            "settled gain {} expected {}",
            settled,
            expected
        );
    }

    #[test]
    fn test_ratio_one_is_transparent() {
        let mut comp = CompressorEffect::new(-40.0, 1.0, 48000);
        let mut buffer = constant(0.8, 1024);
        comp.process(&mut buffer);
        assert!((buffer[1023].left - 0.8).abs() < 1e-5);
    }

    #[test]
    fn test_silence_stays_silent() {
        let mut comp = CompressorEffect::new(-18.0, 3.5, 48000);
        let mut buffer = StereoBuffer::silence(256);
        comp.process(&mut buffer);
        assert_eq!(buffer.peak(), 0.0);
    }

    #[test]
    fn test_reset_clears_envelope() {
        let mut comp = CompressorEffect::new(-20.0, 10.0, 48000);
        let mut loud = constant(1.0, 4800);
        comp.process(&mut loud);
        comp.reset();

        // Fresh envelope: the first sample of a quiet signal passes at unity
        let quiet = db_to_amplitude(-30.0);
        let mut buffer = constant(quiet, 1);
        comp.process(&mut buffer);
        assert!((buffer[0].left - quiet).abs() < 1e-6);
    }
}
