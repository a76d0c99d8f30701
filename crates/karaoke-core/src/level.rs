//! Level metering with peak hold
//!
//! The audio thread measures each microphone block and pushes a
//! [`BlockLevel`] into a lock-free ring. The UI thread drains the ring into a
//! [`LevelMeter`], which converts to dB and maintains the peak-hold markers.
//!
//! Nothing in this module is read from the audio thread; readings that do
//! not fit in the ring are dropped.

use std::time::{Duration, Instant};

/// Meter floor in dB (treated as "negative infinity")
pub const FLOOR_DB: f32 = -60.0;

/// Meter ceiling in dB (full scale)
pub const CEILING_DB: f32 = 0.0;

/// How long a new peak is held before it starts to decay
pub const PEAK_HOLD: Duration = Duration::from_millis(1500);

/// Peak decay per meter update once the hold time has elapsed
pub const PEAK_DECAY_DB: f32 = 0.5;

/// Default level ring capacity (~1.4s of 128-frame blocks at 48kHz)
pub const LEVEL_QUEUE_CAPACITY: usize = 512;

/// Convert linear amplitude to dB, clamped to [`FLOOR_DB`, `CEILING_DB`]
///
/// Zero, negative and NaN amplitudes map to exactly [`FLOOR_DB`].
#[inline]
pub fn amplitude_to_db(amplitude: f32) -> f32 {
    if amplitude.is_nan() || amplitude <= 0.0 {
        return FLOOR_DB;
    }
    (20.0 * amplitude.log10()).clamp(FLOOR_DB, CEILING_DB)
}

/// Convert dB to linear amplitude (`10^(db/20)`)
#[inline]
pub fn db_to_amplitude(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Root-mean-square of a block of samples (0.0 for an empty block)
#[inline]
pub fn rms(samples: impl ExactSizeIterator<Item = f32>) -> f32 {
    let len = samples.len();
    if len == 0 {
        return 0.0;
    }
    let sum: f32 = samples.map(|s| s * s).sum();
    (sum / len as f32).sqrt()
}

/// Linear per-channel level of one audio block, produced on the audio thread
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BlockLevel {
    pub left: f32,
    pub right: f32,
}

/// A meter reading for display
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelReading {
    pub left_db: f32,
    pub right_db: f32,
    pub left_peak_db: f32,
    pub right_peak_db: f32,
}

impl Default for LevelReading {
    fn default() -> Self {
        Self {
            left_db: FLOOR_DB,
            right_db: FLOOR_DB,
            left_peak_db: FLOOR_DB,
            right_peak_db: FLOOR_DB,
        }
    }
}

/// Peak-hold state for one channel
#[derive(Debug, Clone, Copy)]
struct PeakHold {
    peak_db: f32,
    peak_at: Option<Instant>,
}

impl PeakHold {
    fn new() -> Self {
        Self {
            peak_db: FLOOR_DB,
            peak_at: None,
        }
    }

    fn update(&mut self, level_db: f32, now: Instant) {
        if level_db > self.peak_db {
            self.peak_db = level_db;
            self.peak_at = Some(now);
        }

        let held_since = self.peak_at.unwrap_or(now);
        if now.saturating_duration_since(held_since) > PEAK_HOLD {
            self.peak_db = (self.peak_db - PEAK_DECAY_DB).max(FLOOR_DB);
        }
    }
}

/// UI-side stereo level meter with peak hold
#[derive(Debug, Clone)]
pub struct LevelMeter {
    reading: LevelReading,
    left: PeakHold,
    right: PeakHold,
}

impl LevelMeter {
    pub fn new() -> Self {
        Self {
            reading: LevelReading::default(),
            left: PeakHold::new(),
            right: PeakHold::new(),
        }
    }

    /// Feed linear amplitudes (RMS or peak of a block, nominally [0, 1])
    pub fn update(&mut self, left_amplitude: f32, right_amplitude: f32) -> LevelReading {
        self.update_at(Instant::now(), left_amplitude, right_amplitude)
    }

    /// Same as [`LevelMeter::update`] with an explicit clock
    pub fn update_at(&mut self, now: Instant, left_amplitude: f32, right_amplitude: f32) -> LevelReading {
        let left_db = amplitude_to_db(left_amplitude);
        let right_db = amplitude_to_db(right_amplitude);

        self.left.update(left_db, now);
        self.right.update(right_db, now);

        self.reading = LevelReading {
            left_db,
            right_db,
            left_peak_db: self.left.peak_db,
            right_peak_db: self.right.peak_db,
        };
        self.reading
    }

    /// Most recent reading
    pub fn reading(&self) -> LevelReading {
        self.reading
    }

    /// Drop back to the floor (used when a session stops)
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for LevelMeter {
    fn default() -> Self {
        Self::new()
    }
}

/// Create a level channel with the given capacity
pub fn level_channel(capacity: usize) -> (LevelSender, LevelReceiver) {
    let (producer, consumer) = rtrb::RingBuffer::new(capacity);
    (LevelSender { producer }, LevelReceiver { consumer })
}

/// Audio-thread side of the level channel
pub struct LevelSender {
    producer: rtrb::Producer<BlockLevel>,
}

impl LevelSender {
    /// Push a block level, dropping it if the UI has fallen behind
    #[inline]
    pub fn push(&mut self, level: BlockLevel) -> bool {
        self.producer.push(level).is_ok()
    }
}

/// UI-thread side of the level channel
pub struct LevelReceiver {
    consumer: rtrb::Consumer<BlockLevel>,
}

impl LevelReceiver {
    /// Pop the oldest pending block level
    pub fn pop(&mut self) -> Option<BlockLevel> {
        self.consumer.pop().ok()
    }

    /// Apply every pending block level to `meter`
    ///
    /// Returns the latest reading, or `None` when nothing was pending.
    pub fn drain_into(&mut self, meter: &mut LevelMeter) -> Option<LevelReading> {
        let now = Instant::now();
        let mut latest = None;
        while let Ok(level) = self.consumer.pop() {
            latest = Some(meter.update_at(now, level.left, level.right));
        }
        latest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_amplitude_is_floor() {
        assert_eq!(amplitude_to_db(0.0), FLOOR_DB);
        assert_eq!(amplitude_to_db(-0.5), FLOOR_DB);
        assert_eq!(amplitude_to_db(f32::NAN), FLOOR_DB);
        assert_eq!(amplitude_to_db(1e-9), FLOOR_DB);
    }

    #[test]
    fn test_full_scale_is_ceiling() {
        assert!((amplitude_to_db(1.0) - 0.0).abs() < 1e-6);
        assert_eq!(amplitude_to_db(4.0), CEILING_DB);
    }

    #[test]
    fn test_db_roundtrip() {
        let mut db = FLOOR_DB;
        while db <= CEILING_DB {
            let back = amplitude_to_db(db_to_amplitude(db));
            assert!((back - db).abs() < 1e-3, "roundtrip {} -> {}", db, back);
            db += 0.25;
        }
    }

    #[test]
    fn test_rms() {
        assert_eq!(rms(std::iter::empty::<f32>()), 0.0);
        let block = [0.5_f32; 64];
        assert!((rms(block.iter().copied()) - 0.5).abs() < 1e-6);
        let square = [1.0_f32, -1.0, 1.0, -1.0];
        assert!((rms(square.iter().copied()) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_peak_rises_immediately() {
        let mut meter = LevelMeter::new();
        let t0 = Instant::now();
        let reading = meter.update_at(t0, 0.5, 0.1);
        assert!((reading.left_peak_db - amplitude_to_db(0.5)).abs() < 1e-6);
        assert!((reading.right_peak_db - amplitude_to_db(0.1)).abs() < 1e-6);
    }

    #[test]
    fn test_peak_held_then_decays() {
        let mut meter = LevelMeter::new();
        let t0 = Instant::now();
        let first = meter.update_at(t0, 1.0, 1.0);
        assert!((first.left_peak_db - 0.0).abs() < 1e-6);

        // Within the hold window the peak stays put
        let held = meter.update_at(t0 + Duration::from_millis(1000), 0.0, 0.0);
        assert!((held.left_peak_db - 0.0).abs() < 1e-6);
        assert_eq!(held.left_db, FLOOR_DB);

        // After the hold window each update decays by PEAK_DECAY_DB
        let decayed = meter.update_at(t0 + Duration::from_millis(1600), 0.0, 0.0);
        assert!((decayed.left_peak_db + PEAK_DECAY_DB).abs() < 1e-6);
        let decayed = meter.update_at(t0 + Duration::from_millis(1650), 0.0, 0.0);
        assert!((decayed.left_peak_db + 2.0 * PEAK_DECAY_DB).abs() < 1e-6);
    }

    #[test]
    fn test_peak_decay_stops_at_floor() {
        let mut meter = LevelMeter::new();
        let t0 = Instant::now();
        meter.update_at(t0, db_to_amplitude(-59.8), 0.0);
        let mut reading = meter.reading();
        for i in 0..10 {
            reading = meter.update_at(t0 + Duration::from_secs(2 + i), 0.0, 0.0);
        }
        assert_eq!(reading.left_peak_db, FLOOR_DB);
    }

    #[test]
    fn test_level_channel_drops_when_full() {
        let (mut tx, mut rx) = level_channel(2);
        assert!(tx.push(BlockLevel { left: 0.1, right: 0.1 }));
        assert!(tx.push(BlockLevel { left: 0.2, right: 0.2 }));
        assert!(!tx.push(BlockLevel { left: 0.3, right: 0.3 }));

        let mut meter = LevelMeter::new();
        let reading = rx.drain_into(&mut meter).unwrap();
        assert!((reading.left_db - amplitude_to_db(0.2)).abs() < 1e-6);
        assert!(rx.drain_into(&mut meter).is_none());
        assert!(rx.pop().is_none());
    }
}
