//! Audio engine - mix engine, transport and RT memory management
//!
//! - MixEngine: per-callback mic processing and backing-track mixing
//! - TransportAtomics / TransportController: lock-free play state and seeking
//! - HardClipper: output safety clipping with a clip indicator
//! - gc: deferred deallocation for chains and tracks released on the audio thread

mod clipper;
pub mod gc;
mod mixer;
mod transport;

pub use clipper::HardClipper;
pub use mixer::{MixEngine, MAX_BUFFER_SIZE};
pub use transport::{TransportAtomics, TransportController};
