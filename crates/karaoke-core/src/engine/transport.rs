//! Transport state shared between the audio thread and the UI
//!
//! [`TransportAtomics`] is the only state both threads touch. The audio
//! thread advances the position and reports clip/fallback events; the UI
//! thread drives play state, seeking and volume through a
//! [`TransportController`].

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use crate::effect::{clamp_volume, DEFAULT_VOLUME};
use crate::types::PlayState;

/// Lock-free transport state
///
/// All operations use `Ordering::Relaxed`: readers only need eventual
/// visibility, and the position advance is a compare-exchange so a seek is
/// never lost to a concurrent advance.
///
/// The position and play state are only writable inside the crate, so the
/// `[0, len)` seek clamp cannot be bypassed:
///
/// ```compile_fail
/// use std::sync::atomic::Ordering;
/// use karaoke_core::engine::TransportAtomics;
///
/// let atomics = TransportAtomics::new(100, 48000);
/// atomics.position.store(5000, Ordering::Relaxed);
/// ```
pub struct TransportAtomics {
    /// Current playhead position in frames
    pub(crate) position: AtomicU64,
    /// Playback state, see [`PlayState`]
    pub(crate) state: AtomicU8,
    /// Track length in frames
    length: u64,
    /// Stream (and track) sample rate
    sample_rate: u32,
    /// Output volume for the processed mic, stored as f32 bits
    volume: AtomicU32,
    /// Set by the audio thread when a block clipped
    clip_active: Arc<AtomicBool>,
    /// Blocks that fell back to the unprocessed mic signal
    fallback_blocks: AtomicU64,
    /// Set when playback reached the end of the track
    finished: AtomicBool,
}

impl TransportAtomics {
    pub fn new(length: u64, sample_rate: u32) -> Self {
        Self {
            position: AtomicU64::new(0),
            state: AtomicU8::new(PlayState::Stopped as u8),
            length,
            sample_rate,
            volume: AtomicU32::new(DEFAULT_VOLUME.to_bits()),
            clip_active: Arc::new(AtomicBool::new(false)),
            fallback_blocks: AtomicU64::new(0),
            finished: AtomicBool::new(false),
        }
    }

    /// Get current position in frames (lock-free)
    #[inline]
    pub fn position(&self) -> u64 {
        self.position.load(Ordering::Relaxed)
    }

    /// Get play state as enum (lock-free)
    #[inline]
    pub fn play_state(&self) -> PlayState {
        PlayState::from_u8(self.state.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.play_state() == PlayState::Playing
    }

    /// Track length in frames
    #[inline]
    pub fn length(&self) -> u64 {
        self.length
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Output volume for the processed mic
    #[inline]
    pub fn volume(&self) -> f32 {
        f32::from_bits(self.volume.load(Ordering::Relaxed))
    }

    /// Set the output volume, clamped to the volume range
    ///
    /// Returns the value actually stored.
    pub fn set_volume(&self, volume: f32) -> f32 {
        let volume = clamp_volume(volume);
        self.volume.store(volume.to_bits(), Ordering::Relaxed);
        volume
    }

    /// The flag the output clipper raises
    pub fn clip_indicator(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.clip_active)
    }

    /// Read and clear the clip indicator
    pub fn take_clipped(&self) -> bool {
        self.clip_active.swap(false, Ordering::Relaxed)
    }

    /// Number of blocks that fell back to the dry mic signal
    #[inline]
    pub fn fallback_blocks(&self) -> u64 {
        self.fallback_blocks.load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn record_fallback(&self) {
        self.fallback_blocks.fetch_add(1, Ordering::Relaxed);
    }

    /// Whether playback has reached the end of the track
    #[inline]
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn mark_finished(&self) {
        self.finished.store(true, Ordering::Relaxed);
    }

    /// Advance the position by `frames` from `from`, clamped to the length
    ///
    /// Does nothing if the position changed since `from` was read (a seek
    /// landed during the block). Returns the new position on success.
    #[inline]
    pub(crate) fn advance(&self, from: u64, frames: u64) -> Option<u64> {
        let to = from.saturating_add(frames).min(self.length);
        self.position
            .compare_exchange(from, to, Ordering::Relaxed, Ordering::Relaxed)
            .ok()
            .map(|_| to)
    }
}

/// UI-side transport controls
///
/// Cheap to clone; every clone drives the same atomics.
#[derive(Clone)]
pub struct TransportController {
    atomics: Arc<TransportAtomics>,
}

impl TransportController {
    pub fn new(atomics: Arc<TransportAtomics>) -> Self {
        Self { atomics }
    }

    pub fn atomics(&self) -> &Arc<TransportAtomics> {
        &self.atomics
    }

    /// Move the playhead to `frame`, clamped to `[0, length)`
    ///
    /// An empty track always seeks to 0. Returns the stored position.
    pub fn seek(&self, frame: u64) -> u64 {
        let length = self.atomics.length();
        let target = if length == 0 { 0 } else { frame.min(length - 1) };
        self.atomics.position.store(target, Ordering::Relaxed);
        if target < length {
            self.atomics.finished.store(false, Ordering::Relaxed);
        }
        target
    }

    /// Seek to a time in seconds (negative values seek to the start)
    pub fn seek_seconds(&self, seconds: f64) -> u64 {
        self.seek(self.seconds_to_frames(seconds))
    }

    /// Jump forward by `seconds`
    pub fn skip_forward(&self, seconds: f64) -> u64 {
        let delta = self.seconds_to_frames(seconds);
        self.seek(self.atomics.position().saturating_add(delta))
    }

    /// Jump backward by `seconds`, stopping at the start
    pub fn skip_backward(&self, seconds: f64) -> u64 {
        let delta = self.seconds_to_frames(seconds);
        self.seek(self.atomics.position().saturating_sub(delta))
    }

    /// Playing becomes Paused and Paused becomes Playing
    ///
    /// A stopped transport stays stopped. Returns the resulting state.
    pub fn toggle_play_pause(&self) -> PlayState {
        let result = self
            .atomics
            .state
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                match PlayState::from_u8(current) {
                    PlayState::Playing => Some(PlayState::Paused as u8),
                    PlayState::Paused => Some(PlayState::Playing as u8),
                    PlayState::Stopped => None,
                }
            });
        match result {
            Ok(previous) if previous == PlayState::Playing as u8 => PlayState::Paused,
            Ok(_) => PlayState::Playing,
            Err(_) => PlayState::Stopped,
        }
    }

    pub fn play(&self) {
        self.atomics.state.store(PlayState::Playing as u8, Ordering::Relaxed);
    }

    /// Pause if playing (a stopped transport stays stopped)
    pub fn pause(&self) {
        let _ = self.atomics.state.compare_exchange(
            PlayState::Playing as u8,
            PlayState::Paused as u8,
            Ordering::Relaxed,
            Ordering::Relaxed,
        );
    }

    pub fn stop(&self) {
        self.atomics.state.store(PlayState::Stopped as u8, Ordering::Relaxed);
    }

    pub fn state(&self) -> PlayState {
        self.atomics.play_state()
    }

    pub fn position(&self) -> u64 {
        self.atomics.position()
    }

    pub fn position_seconds(&self) -> f64 {
        self.frames_to_seconds(self.atomics.position())
    }

    pub fn duration_seconds(&self) -> f64 {
        self.frames_to_seconds(self.atomics.length())
    }

    fn seconds_to_frames(&self, seconds: f64) -> u64 {
        if seconds.is_nan() || seconds <= 0.0 {
            return 0;
        }
        (seconds * self.atomics.sample_rate() as f64).round() as u64
    }

    fn frames_to_seconds(&self, frames: u64) -> f64 {
        match self.atomics.sample_rate() {
            0 => 0.0,
            rate => frames as f64 / rate as f64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(length: u64) -> TransportController {
        TransportController::new(Arc::new(TransportAtomics::new(length, 48000)))
    }

    #[test]
    fn test_seek_clamps_to_track() {
        let t = transport(1000);
        assert_eq!(t.seek(500), 500);
        assert_eq!(t.seek(1000), 999);
        assert_eq!(t.seek(u64::MAX), 999);
        assert_eq!(t.seek(0), 0);
    }

    #[test]
    fn test_public_moves_stay_inside_track() {
        let t = transport(1000);
        for target in [0, 1, 999, 1000, 5000, u64::MAX] {
            t.seek(target);
            assert!(t.position() < 1000, "seek({}) left {}", target, t.position());
            t.skip_forward(1e9);
            assert!(t.position() < 1000);
            t.skip_backward(1e9);
            assert_eq!(t.position(), 0);
        }
    }

    #[test]
    fn test_seek_on_empty_track() {
        let t = transport(0);
        assert_eq!(t.seek(42), 0);
        assert_eq!(t.position(), 0);
    }

    #[test]
    fn test_seek_seconds() {
        let t = transport(480_000);
        assert_eq!(t.seek_seconds(2.5), 120_000);
        assert!((t.position_seconds() - 2.5).abs() < 1e-9);
        assert_eq!(t.seek_seconds(-3.0), 0);
        assert_eq!(t.seek_seconds(f64::NAN), 0);
        assert!((t.duration_seconds() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_skip() {
        let t = transport(480_000);
        t.seek(96_000);
        assert_eq!(t.skip_forward(5.0), 336_000);
        assert_eq!(t.skip_forward(5.0), 479_999);
        t.seek(96_000);
        assert_eq!(t.skip_backward(5.0), 0);
    }

    #[test]
    fn test_toggle_play_pause() {
        let t = transport(100);
        assert_eq!(t.toggle_play_pause(), PlayState::Stopped);
        assert_eq!(t.state(), PlayState::Stopped);

        t.play();
        assert_eq!(t.toggle_play_pause(), PlayState::Paused);
        assert_eq!(t.state(), PlayState::Paused);
        assert_eq!(t.toggle_play_pause(), PlayState::Playing);
        assert_eq!(t.state(), PlayState::Playing);
    }

    #[test]
    fn test_pause_does_not_leave_stopped() {
        let t = transport(100);
        t.pause();
        assert_eq!(t.state(), PlayState::Stopped);
        t.play();
        t.pause();
        assert_eq!(t.state(), PlayState::Paused);
        t.stop();
        assert_eq!(t.state(), PlayState::Stopped);
    }

    #[test]
    fn test_advance_loses_to_seek() {
        let t = transport(1000);
        let atomics = Arc::clone(t.atomics());
        let read = atomics.position();
        t.seek(700);
        assert_eq!(atomics.advance(read, 128), None);
        assert_eq!(atomics.position(), 700);
        assert_eq!(atomics.advance(700, 500), Some(1000));
    }

    #[test]
    fn test_volume_clamped() {
        let atomics = TransportAtomics::new(10, 48000);
        assert_eq!(atomics.volume(), DEFAULT_VOLUME);
        assert_eq!(atomics.set_volume(5.0), 2.0);
        assert_eq!(atomics.volume(), 2.0);
        assert_eq!(atomics.set_volume(-1.0), 0.0);
    }

    #[test]
    fn test_seek_clears_finished() {
        let t = transport(100);
        t.atomics().mark_finished();
        assert!(t.atomics().is_finished());
        t.seek(10);
        assert!(!t.atomics().is_finished());
    }
}
