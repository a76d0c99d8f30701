//! Native Rust vocal stages
//!
//! Every stage is configured at construction and allocates only there, so
//! `process` is safe to call from the audio callback.

mod compressor;
mod echo;
mod eq;
mod reverb;

pub use compressor::{CompressorEffect, ATTACK_MS, RELEASE_MS};
pub use echo::{EchoEffect, MAX_ECHO_SECONDS};
pub use eq::PeakEqEffect;
pub use reverb::{ReverbEffect, DAMPING, WIDTH};
