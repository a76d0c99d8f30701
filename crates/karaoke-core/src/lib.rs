//! Karaoke Core - real-time vocal processing and backing-track playback

pub mod audio;
pub mod config;
pub mod effect;
pub mod engine;
pub mod level;
pub mod lyrics;
pub mod presets;
pub mod track;
pub mod types;

pub use types::*;
