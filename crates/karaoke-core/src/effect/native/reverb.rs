//! Stereo room reverb
//!
//! Freeverb topology: eight damped comb filters per channel in parallel,
//! followed by four allpass diffusers in series. Delay lengths are tuned
//! at 44.1kHz and scaled to the stream rate.

use crate::effect::{Effect, EffectInfo};
use crate::types::StereoBuffer;

/// Comb filter delay line lengths (in samples at 44.1kHz)
const COMB_LENGTHS: [usize; 8] = [1557, 1617, 1491, 1422, 1277, 1356, 1188, 1116];

/// Allpass filter delay line lengths
const ALLPASS_LENGTHS: [usize; 4] = [225, 556, 441, 341];

/// Stereo spread offset for the right channel (in samples at 44.1kHz)
const STEREO_SPREAD: usize = 23;

/// High-frequency damping inside the comb feedback path
pub const DAMPING: f32 = 0.5;

/// Stereo width of the wet signal
pub const WIDTH: f32 = 1.0;

const ALLPASS_FEEDBACK: f32 = 0.5;

/// Gain compensation for summing eight combs
const COMB_GAIN: f32 = 0.2;

#[inline]
fn scaled_len(length: usize, sample_rate: u32) -> usize {
    ((length as f32 * sample_rate as f32 / 44100.0) as usize).max(1)
}

struct CombFilter {
    buffer: Vec<f32>,
    pos: usize,
    filter_state: f32,
}

impl CombFilter {
    fn new(length: usize) -> Self {
        Self {
            buffer: vec![0.0; length],
            pos: 0,
            filter_state: 0.0,
        }
    }

    #[inline]
    fn process(&mut self, input: f32, feedback: f32, damp: f32) -> f32 {
        let output = self.buffer[self.pos];

        // One-pole lowpass for damping
        self.filter_state = output * (1.0 - damp) + self.filter_state * damp;

        self.buffer[self.pos] = input + self.filter_state * feedback;
        self.pos = (self.pos + 1) % self.buffer.len();

        output
    }

    fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.filter_state = 0.0;
    }
}

struct AllpassFilter {
    buffer: Vec<f32>,
    pos: usize,
}

impl AllpassFilter {
    fn new(length: usize) -> Self {
        Self {
            buffer: vec![0.0; length],
            pos: 0,
        }
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let buffered = self.buffer[self.pos];
        let output = -input + buffered;
        self.buffer[self.pos] = input + buffered * ALLPASS_FEEDBACK;
        self.pos = (self.pos + 1) % self.buffer.len();
        output
    }

    fn reset(&mut self) {
        self.buffer.fill(0.0);
    }
}

/// Freeverb-style stereo reverb
///
/// `room_size` in [0, 1] maps to comb feedback 0.7..0.98. The dry level is
/// `1 - wet`, so `wet = 0` passes the input through untouched.
pub struct ReverbEffect {
    info: EffectInfo,
    combs_l: Vec<CombFilter>,
    combs_r: Vec<CombFilter>,
    allpass_l: Vec<AllpassFilter>,
    allpass_r: Vec<AllpassFilter>,
    feedback: f32,
    wet1: f32,
    wet2: f32,
    dry: f32,
}

impl ReverbEffect {
    pub fn new(room_size: f32, wet: f32, sample_rate: u32) -> Self {
        let wet = wet.clamp(0.0, 1.0);

        let combs_l = COMB_LENGTHS
            .iter()
            .map(|&len| CombFilter::new(scaled_len(len, sample_rate)))
            .collect();
        let combs_r = COMB_LENGTHS
            .iter()
            .map(|&len| CombFilter::new(scaled_len(len + STEREO_SPREAD, sample_rate)))
            .collect();
        let allpass_l = ALLPASS_LENGTHS
            .iter()
            .map(|&len| AllpassFilter::new(scaled_len(len, sample_rate)))
            .collect();
        let allpass_r = ALLPASS_LENGTHS
            .iter()
            .map(|&len| AllpassFilter::new(scaled_len(len + STEREO_SPREAD, sample_rate)))
            .collect();

        Self {
            info: EffectInfo::new("Reverb", "Reverb"),
            combs_l,
            combs_r,
            allpass_l,
            allpass_r,
            feedback: 0.7 + room_size.clamp(0.0, 1.0) * 0.28,
            wet1: wet * (WIDTH / 2.0 + 0.5),
            wet2: wet * ((1.0 - WIDTH) / 2.0),
            dry: 1.0 - wet,
        }
    }
}

impl Effect for ReverbEffect {
    fn process(&mut self, buffer: &mut StereoBuffer) {
        for sample in buffer.iter_mut() {
            let input = (sample.left + sample.right) * 0.5;

            let mut out_l = 0.0f32;
            let mut out_r = 0.0f32;
            for comb in &mut self.combs_l {
                out_l += comb.process(input, self.feedback, DAMPING);
            }
            for comb in &mut self.combs_r {
                out_r += comb.process(input, self.feedback, DAMPING);
            }
            out_l *= COMB_GAIN;
            out_r *= COMB_GAIN;

            for ap in &mut self.allpass_l {
                out_l = ap.process(out_l);
            }
            for ap in &mut self.allpass_r {
                out_r = ap.process(out_r);
            }

            let out_left = out_l * self.wet1 + out_r * self.wet2 + sample.left * self.dry;
            let out_right = out_r * self.wet1 + out_l * self.wet2 + sample.right * self.dry;

            sample.left = out_left;
            sample.right = out_right;
        }
    }

    fn info(&self) -> &EffectInfo {
        &self.info
    }

    fn reset(&mut self) {
        for comb in self.combs_l.iter_mut().chain(self.combs_r.iter_mut()) {
            comb.reset();
        }
        for ap in self.allpass_l.iter_mut().chain(self.allpass_r.iter_mut()) {
            ap.reset();
        }
    }
}
