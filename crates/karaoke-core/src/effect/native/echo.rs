//! Feedback echo for the vocal chain

use crate::effect::{Effect, EffectInfo};
use crate::types::StereoBuffer;

/// Longest supported echo in seconds
pub const MAX_ECHO_SECONDS: f32 = 1.0;

/// Stereo delay line sized for [`MAX_ECHO_SECONDS`] at the stream rate
struct DelayLine {
    buffer_l: Vec<f32>,
    buffer_r: Vec<f32>,
    write_pos: usize,
    delay_samples: usize,
}

impl DelayLine {
    fn new(delay_samples: usize, sample_rate: u32) -> Self {
        let size = (sample_rate as f32 * MAX_ECHO_SECONDS) as usize + 1;
        Self {
            buffer_l: vec![0.0; size],
            buffer_r: vec![0.0; size],
            write_pos: 0,
            delay_samples: delay_samples.clamp(1, size - 1),
        }
    }

    #[inline]
    fn read(&self) -> (f32, f32) {
        let size = self.buffer_l.len();
        let read_pos = if self.write_pos >= self.delay_samples {
            self.write_pos - self.delay_samples
        } else {
            size - (self.delay_samples - self.write_pos)
        };
        (self.buffer_l[read_pos], self.buffer_r[read_pos])
    }

    #[inline]
    fn process(&mut self, left: f32, right: f32, feedback: f32) -> (f32, f32) {
        let (delayed_l, delayed_r) = self.read();

        self.buffer_l[self.write_pos] = left + delayed_l * feedback;
        self.buffer_r[self.write_pos] = right + delayed_r * feedback;
        self.write_pos = (self.write_pos + 1) % self.buffer_l.len();

        (delayed_l, delayed_r)
    }

    fn reset(&mut self) {
        self.buffer_l.fill(0.0);
        self.buffer_r.fill(0.0);
        self.write_pos = 0;
    }
}

/// Echo with feedback and a dry/wet mix
///
/// Output is `dry * (1 - mix) + delayed * mix`. The delay line is allocated
/// at construction, which happens off the audio thread when the chain is
/// rebuilt.
pub struct EchoEffect {
    info: EffectInfo,
    delay_line: DelayLine,
    feedback: f32,
    mix: f32,
}

impl EchoEffect {
    /// Create an echo with `delay_secs` between repeats
    pub fn new(delay_secs: f32, feedback: f32, mix: f32, sample_rate: u32) -> Self {
        let delay_samples = (delay_secs.clamp(0.0, MAX_ECHO_SECONDS) * sample_rate as f32) as usize;
        Self {
            info: EffectInfo::new("Echo", "Delay"),
            delay_line: DelayLine::new(delay_samples, sample_rate),
            feedback: feedback.clamp(0.0, 0.95),
            mix: mix.clamp(0.0, 1.0),
        }
    }

    /// Delay between repeats in samples
    pub fn delay_samples(&self) -> usize {
        self.delay_line.delay_samples
    }
}

impl Effect for EchoEffect {
    fn process(&mut self, buffer: &mut StereoBuffer) {
        let dry = 1.0 - self.mix;
        for sample in buffer.iter_mut() {
            let (delayed_l, delayed_r) = self.delay_line.process(sample.left, sample.right, self.feedback);
            sample.left = sample.left * dry + delayed_l * self.mix;
            sample.right = sample.right * dry + delayed_r * self.mix;
        }
    }

    fn info(&self) -> &EffectInfo {
        &self.info
    }

    fn reset(&mut self) {
        self.delay_line.reset();
    }
}
