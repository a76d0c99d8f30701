//! Backing track storage, decoding and sample-rate conversion
//!
//! A [`BackingTrack`] is an immutable block of stereo frames at a fixed
//! sample rate. Tracks are decoded once, optionally resampled once, and then
//! shared read-only with the audio thread.

mod decode;
mod resample;
mod wav;

pub use decode::decode_file;
pub use resample::resample;
pub use wav::{read_wav, write_wav};

use std::path::PathBuf;

use thiserror::Error;

use crate::types::StereoSample;

/// Errors while loading or converting a backing track
#[derive(Error, Debug)]
pub enum TrackError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode audio: {0}")]
    Decode(String),

    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("Audio file contains no samples")]
    Empty,

    #[error("Resampling failed: {0}")]
    Resample(String),
}

pub type TrackResult<T> = Result<T, TrackError>;

/// Decoded stereo audio held in memory
#[derive(Debug, Clone)]
pub struct BackingTrack {
    frames: Vec<StereoSample>,
    sample_rate: u32,
}

impl BackingTrack {
    pub fn new(frames: Vec<StereoSample>, sample_rate: u32) -> Self {
        Self { frames, sample_rate }
    }

    /// Build from interleaved samples with any channel count
    ///
    /// Mono is duplicated to both channels; extra channels beyond the first
    /// two are dropped. A trailing partial frame is ignored.
    pub fn from_interleaved(samples: &[f32], channels: usize, sample_rate: u32) -> Self {
        let frames = match channels {
            0 => Vec::new(),
            1 => samples.iter().map(|&s| StereoSample::mono(s)).collect(),
            n => samples
                .chunks_exact(n)
                .map(|frame| StereoSample::new(frame[0], frame[1]))
                .collect(),
        };
        Self { frames, sample_rate }
    }

    /// A silent track of `frames` length
    pub fn silence(frames: usize, sample_rate: u32) -> Self {
        Self::new(vec![StereoSample::silence(); frames], sample_rate)
    }

    #[inline]
    pub fn frames(&self) -> &[StereoSample] {
        &self.frames
    }

    #[inline]
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames.len() as f64 / self.sample_rate as f64
    }

    /// Split into planar left/right channels
    pub fn to_planar(&self) -> [Vec<f32>; 2] {
        let left = self.frames.iter().map(|s| s.left).collect();
        let right = self.frames.iter().map(|s| s.right).collect();
        [left, right]
    }

    /// Interleaved view [L, R, L, R, ...]
    pub fn as_interleaved(&self) -> &[f32] {
        bytemuck::cast_slice(&self.frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mono_is_duplicated() {
        let track = BackingTrack::from_interleaved(&[0.1, 0.2, 0.3], 1, 44100);
        assert_eq!(track.frame_count(), 3);
        assert_eq!(track.frames()[1], StereoSample::new(0.2, 0.2));
    }

    #[test]
    fn test_multichannel_keeps_first_two() {
        let samples = [0.1, 0.2, 0.9, 0.3, 0.4, 0.9, 0.5];
        let track = BackingTrack::from_interleaved(&samples, 3, 48000);
        assert_eq!(track.frame_count(), 2);
        assert_eq!(track.frames()[0], StereoSample::new(0.1, 0.2));
        assert_eq!(track.frames()[1], StereoSample::new(0.3, 0.4));
    }

    #[test]
    fn test_duration() {
        let track = BackingTrack::silence(480_000, 48000);
        assert!((track.duration_seconds() - 10.0).abs() < 1e-9);
        assert_eq!(track.as_interleaved().len(), 960_000);
    }

    #[test]
    fn test_planar_split() {
        let track = BackingTrack::from_interleaved(&[0.1, -0.1, 0.2, -0.2], 2, 48000);
        let [left, right] = track.to_planar();
        assert_eq!(left, vec![0.1, 0.2]);
        assert_eq!(right, vec![-0.1, -0.2]);
    }
}
