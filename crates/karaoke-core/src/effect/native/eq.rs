//! Peaking EQ band built on a trapezoidal state-variable filter

use crate::effect::{Effect, EffectInfo};
use crate::types::StereoBuffer;

/// Two-pole state-variable filter configured as a bell (peaking) EQ
struct BellSvf {
    // State per channel
    ic1eq_l: f32,
    ic2eq_l: f32,
    ic1eq_r: f32,
    ic2eq_r: f32,
    // Coefficients
    a1: f32,
    a2: f32,
    a3: f32,
    /// Band-pass mix for the bell: k * (A^2 - 1)
    m1: f32,
}

impl BellSvf {
    fn new(frequency: f32, q: f32, gain_db: f32, sample_rate: u32) -> Self {
        let nyquist_guard = sample_rate as f32 * 0.45;
        let frequency = frequency.clamp(20.0, nyquist_guard);
        let q = q.clamp(0.1, 10.0);

        let a = 10.0_f32.powf(gain_db / 40.0);
        let g = (std::f32::consts::PI * frequency / sample_rate as f32).tan();
        let k = 1.0 / (q * a);
        let a1 = 1.0 / (1.0 + g * (g + k));
        let a2 = g * a1;
        let a3 = g * a2;

        Self {
            ic1eq_l: 0.0,
            ic2eq_l: 0.0,
            ic1eq_r: 0.0,
            ic2eq_r: 0.0,
            a1,
            a2,
            a3,
            m1: k * (a * a - 1.0),
        }
    }

    #[inline]
    fn tick(&mut self, left: f32, right: f32) -> (f32, f32) {
        // Left channel
        let v3_l = left - self.ic2eq_l;
        let v1_l = self.a1 * self.ic1eq_l + self.a2 * v3_l;
        let v2_l = self.ic2eq_l + self.a2 * self.ic1eq_l + self.a3 * v3_l;
        self.ic1eq_l = 2.0 * v1_l - self.ic1eq_l;
        self.ic2eq_l = 2.0 * v2_l - self.ic2eq_l;

        // Right channel
        let v3_r = right - self.ic2eq_r;
        let v1_r = self.a1 * self.ic1eq_r + self.a2 * v3_r;
        let v2_r = self.ic2eq_r + self.a2 * self.ic1eq_r + self.a3 * v3_r;
        self.ic1eq_r = 2.0 * v1_r - self.ic1eq_r;
        self.ic2eq_r = 2.0 * v2_r - self.ic2eq_r;

        (left + self.m1 * v1_l, right + self.m1 * v1_r)
    }

    fn reset(&mut self) {
        self.ic1eq_l = 0.0;
        self.ic2eq_l = 0.0;
        self.ic1eq_r = 0.0;
        self.ic2eq_r = 0.0;
    }
}

/// One peaking EQ band (boost or cut around a center frequency)
///
/// A gain of 0 dB makes the band an exact passthrough.
pub struct PeakEqEffect {
    info: EffectInfo,
    filter: BellSvf,
    frequency: f32,
    gain_db: f32,
}

impl PeakEqEffect {
    /// Create a band at `frequency` Hz with quality `q` and `gain_db` boost/cut
    pub fn new(frequency: f32, q: f32, gain_db: f32, sample_rate: u32) -> Self {
        Self {
            info: EffectInfo::new("Peak EQ", "EQ"),
            filter: BellSvf::new(frequency, q, gain_db, sample_rate),
            frequency,
            gain_db,
        }
    }

    /// Center frequency in Hz
    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    /// Band gain in dB
    pub fn gain_db(&self) -> f32 {
        self.gain_db
    }
}

impl Effect for PeakEqEffect {
    fn process(&mut self, buffer: &mut StereoBuffer) {
        for sample in buffer.iter_mut() {
            let (l, r) = self.filter.tick(sample.left, sample.right);
            sample.left = l;
            sample.right = r;
        }
    }

    fn info(&self) -> &EffectInfo {
        &self.info
    }

    fn reset(&mut self) {
        self.filter.reset();
    }
}
