//! Audio session configuration
//!
//! Device selection, buffer size and sample-rate preferences for a
//! karaoke session.

use serde::{Deserialize, Serialize};

use crate::types::{DEFAULT_BLOCK_SIZE, MAX_TRACK_SAMPLE_RATE};

/// Buffer sizes accepted for a fixed request (frames)
pub const MIN_BUFFER_FRAMES: u32 = 32;
pub const MAX_BUFFER_FRAMES: u32 = 8192;

/// Buffer size used for [`BufferSize::LowLatency`]
pub const LOW_LATENCY_BUFFER_FRAMES: u32 = 64;

/// Preferred buffer size for audio streams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BufferSize {
    /// Let the system choose the default buffer size
    Default,
    /// Request a specific buffer size in frames (may be adjusted by the system)
    Fixed(u32),
    /// Smallest buffer that is still practical for live vocals
    LowLatency,
}

impl Default for BufferSize {
    fn default() -> Self {
        Self::Fixed(DEFAULT_BLOCK_SIZE as u32)
    }
}

impl BufferSize {
    /// Get the buffer size in frames, or None for system default
    pub fn as_frames(&self) -> Option<u32> {
        match self {
            BufferSize::Default => None,
            BufferSize::Fixed(frames) => Some((*frames).clamp(MIN_BUFFER_FRAMES, MAX_BUFFER_FRAMES)),
            BufferSize::LowLatency => Some(LOW_LATENCY_BUFFER_FRAMES),
        }
    }

    /// Calculate latency in milliseconds for a given sample rate
    pub fn latency_ms(&self, sample_rate: u32) -> Option<f32> {
        self.as_frames()
            .map(|frames| (frames as f32 / sample_rate as f32) * 1000.0)
    }
}

/// Audio device identifier
///
/// Includes both the device name and the host backend (JACK, ALSA, etc.)
/// so devices can be picked from a specific host when several are present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceId {
    /// Device name as reported by the system
    pub name: String,
    /// Audio host identifier (e.g., "JACK", "ALSA", "CoreAudio")
    /// If None, every host is searched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

impl DeviceId {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: None,
        }
    }

    pub fn with_host(name: &str, host: &str) -> Self {
        Self {
            name: name.to_string(),
            host: Some(host.to_string()),
        }
    }

    /// Get a display label that includes the host if available
    pub fn display_label(&self) -> String {
        match &self.host {
            Some(host) => format!("[{}] {}", host, self.name),
            None => self.name.clone(),
        }
    }
}

/// Configuration for a duplex karaoke session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Microphone device (None = host default input)
    pub input_device: Option<DeviceId>,

    /// Playback device (None = host default output)
    pub output_device: Option<DeviceId>,

    /// Preferred buffer size
    pub buffer_size: BufferSize,

    /// Stream sample rate (None = the track rate, capped at `max_track_rate`)
    pub sample_rate: Option<u32>,

    /// Tracks above this rate are resampled before playback
    pub max_track_rate: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            input_device: None,
            output_device: None,
            buffer_size: BufferSize::default(),
            sample_rate: None,
            max_track_rate: MAX_TRACK_SAMPLE_RATE,
        }
    }
}

impl SessionConfig {
    /// Set the microphone device
    pub fn with_input_device(mut self, device: DeviceId) -> Self {
        self.input_device = Some(device);
        self
    }

    /// Set the playback device
    pub fn with_output_device(mut self, device: DeviceId) -> Self {
        self.output_device = Some(device);
        self
    }

    /// Set the preferred buffer size
    pub fn with_buffer_size(mut self, size: BufferSize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Set a fixed buffer size in frames
    pub fn with_buffer_frames(mut self, frames: u32) -> Self {
        self.buffer_size = BufferSize::Fixed(frames);
        self
    }

    /// Set the stream sample rate
    pub fn with_sample_rate(mut self, rate: u32) -> Self {
        self.sample_rate = Some(rate);
        self
    }

    /// Set the resampling ceiling for backing tracks
    pub fn with_max_track_rate(mut self, rate: u32) -> Self {
        self.max_track_rate = rate;
        self
    }

    /// Stream rate for a track recorded at `track_rate`
    pub fn stream_rate_for(&self, track_rate: u32) -> u32 {
        self.sample_rate
            .unwrap_or_else(|| track_rate.min(self.max_track_rate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_buffer_is_one_block() {
        let config = SessionConfig::default();
        assert_eq!(config.buffer_size, BufferSize::Fixed(128));
        assert_eq!(config.buffer_size.as_frames(), Some(128));
        let latency = config.buffer_size.latency_ms(48000).unwrap();
        assert!((latency - 2.6667).abs() < 1e-3);
    }

    #[test]
    fn test_fixed_buffer_is_clamped() {
        assert_eq!(BufferSize::Fixed(1).as_frames(), Some(MIN_BUFFER_FRAMES));
        assert_eq!(BufferSize::Fixed(1 << 20).as_frames(), Some(MAX_BUFFER_FRAMES));
        assert_eq!(BufferSize::Default.as_frames(), None);
    }

    #[test]
    fn test_stream_rate_caps_high_rate_tracks() {
        let config = SessionConfig::default();
        assert_eq!(config.stream_rate_for(96000), 48000);
        assert_eq!(config.stream_rate_for(44100), 44100);
        assert_eq!(config.clone().with_sample_rate(48000).stream_rate_for(44100), 48000);
    }

    #[test]
    fn test_builder_and_serde() {
        let config = SessionConfig::default()
            .with_input_device(DeviceId::with_host("USB Mic", "ALSA"))
            .with_output_device(DeviceId::new("Speakers"))
            .with_buffer_frames(256);

        let yaml = serde_yaml::to_string(&config).unwrap();
        let back: SessionConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, config);
        assert_eq!(back.input_device.unwrap().display_label(), "[ALSA] USB Mic");
    }

    #[test]
    fn test_partial_yaml_takes_defaults() {
        let config: SessionConfig = serde_yaml::from_str("sample_rate: 44100\n").unwrap();
        assert_eq!(config.sample_rate, Some(44100));
        assert_eq!(config.max_track_rate, MAX_TRACK_SAMPLE_RATE);
        assert_eq!(config.buffer_size, BufferSize::Fixed(128));
    }
}
