//! Output safety clipper
//!
//! Hard clip to full scale with no latency and no state. Samples inside
//! [-1.0, 1.0] pass through bit-exact.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::types::StereoSample;

/// Hard clipper with a shared "clipped" indicator
///
/// The audio thread sets the indicator whenever a block contained at least
/// one sample outside full scale or a non-finite sample; the UI thread reads
/// and clears it.
pub struct HardClipper {
    clip_active: Arc<AtomicBool>,
}

impl HardClipper {
    pub fn new(clip_active: Arc<AtomicBool>) -> Self {
        Self { clip_active }
    }

    /// Clip the block in place, returns whether any sample was clipped
    #[inline]
    pub fn process(&mut self, block: &mut [StereoSample]) -> bool {
        let mut clipped = false;
        for sample in block.iter_mut() {
            if !sample.is_finite() || sample.peak() > 1.0 {
                clipped = true;
            }
            *sample = sample.clamp_unit();
        }
        if clipped {
            self.clip_active.store(true, Ordering::Relaxed);
        }
        clipped
    }

    /// Get the clip indicator atomic (shared with UI thread)
    pub fn clip_indicator(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.clip_active)
    }
}

impl Default for HardClipper {
    fn default() -> Self {
        Self::new(Arc::new(AtomicBool::new(false)))
    }
}
