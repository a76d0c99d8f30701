//! Duplex audio sessions over CPAL
//!
//! A [`KaraokeSession`] opens a microphone input stream and a playback
//! output stream, resamples the backing track once if needed, and drives a
//! [`crate::engine::MixEngine`] from the output callback.
//!
//! # Threading
//!
//! - **UI thread**: publishes effect chains, seeks, reads levels
//! - **Output callback**: owns the mix engine exclusively
//! - **Input callback**: pushes microphone samples into an SPSC ring
//! - **Atomics**: transport state is read and written without locks
//!
//! # Example Usage
//!
//! ```ignore
//! use karaoke_core::audio::{KaraokeSession, SessionConfig};
//!
//! let mut session = KaraokeSession::start(track, &SessionConfig::default(), &params, 1.0)?;
//! session.transport().seek_seconds(30.0);
//! let levels = session.poll_levels();
//! session.stop();
//! ```

mod config;
mod device;
mod error;
mod session;

pub use config::{
    BufferSize, DeviceId, SessionConfig, LOW_LATENCY_BUFFER_FRAMES, MAX_BUFFER_FRAMES, MIN_BUFFER_FRAMES,
};
pub use device::{find_device_by_id, get_input_devices, get_output_devices, resolve_device, AudioDevice, Direction};
pub use error::{AudioError, AudioResult};
pub use session::{KaraokeSession, OfflineSession, SessionControls};
