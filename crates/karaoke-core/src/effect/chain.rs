//! Effects chain construction and hand-off to the audio thread
//!
//! The chain order is fixed:
//!
//! ```text
//! Compressor -> EQ bass -> EQ mid -> EQ treble -> [Echo] -> Reverb
//! ```
//!
//! Echo is only inserted when its mix exceeds [`ECHO_MIX_THRESHOLD`].
//!
//! Stages carry DSP state, so a parameter change rebuilds the whole chain on
//! the control thread and publishes it through a lock-free queue. The audio
//! thread swaps to the newest chain at the start of a block; it never sees a
//! partially updated chain. Replaced chains are released on the GC thread.

use basedrop::Owned;
use thiserror::Error;

use super::native::{CompressorEffect, EchoEffect, PeakEqEffect, ReverbEffect};
use super::{Effect, EffectError, EffectParameters};
use crate::engine::gc::gc_handle;
use crate::types::StereoBuffer;

/// Echo mix at or below this value leaves the echo stage out of the chain
pub const ECHO_MIX_THRESHOLD: f32 = 0.01;

/// Pending chains the audio thread has not yet picked up
pub const CHAIN_QUEUE_CAPACITY: usize = 16;

/// The three fixed EQ bands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EqBand {
    Bass,
    Mid,
    Treble,
}

impl EqBand {
    pub const ALL: [EqBand; 3] = [EqBand::Bass, EqBand::Mid, EqBand::Treble];

    /// Center frequency in Hz
    pub fn frequency(&self) -> f32 {
        match self {
            EqBand::Bass => 100.0,
            EqBand::Mid => 3000.0,
            EqBand::Treble => 10000.0,
        }
    }

    /// Filter quality
    pub fn q(&self) -> f32 {
        match self {
            EqBand::Bass => 0.7,
            EqBand::Mid => 1.0,
            EqBand::Treble => 0.7,
        }
    }

    fn gain_db(&self, params: &EffectParameters) -> f32 {
        match self {
            EqBand::Bass => params.eq_bass_db(),
            EqBand::Mid => params.eq_mid_db(),
            EqBand::Treble => params.eq_treble_db(),
        }
    }
}

/// Identifies a stage position in the chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Compressor,
    Equalizer(EqBand),
    Echo,
    Reverb,
}

impl StageKind {
    pub fn name(&self) -> &'static str {
        match self {
            StageKind::Compressor => "Compressor",
            StageKind::Equalizer(EqBand::Bass) => "EQ Bass",
            StageKind::Equalizer(EqBand::Mid) => "EQ Mid",
            StageKind::Equalizer(EqBand::Treble) => "EQ Treble",
            StageKind::Echo => "Echo",
            StageKind::Reverb => "Reverb",
        }
    }
}

/// One configured stage
pub enum Stage {
    Compressor(CompressorEffect),
    Equalizer(EqBand, PeakEqEffect),
    Echo(EchoEffect),
    Reverb(ReverbEffect),
}

impl Stage {
    pub fn kind(&self) -> StageKind {
        match self {
            Stage::Compressor(_) => StageKind::Compressor,
            Stage::Equalizer(band, _) => StageKind::Equalizer(*band),
            Stage::Echo(_) => StageKind::Echo,
            Stage::Reverb(_) => StageKind::Reverb,
        }
    }

    fn effect_mut(&mut self) -> &mut dyn Effect {
        match self {
            Stage::Compressor(e) => e,
            Stage::Equalizer(_, e) => e,
            Stage::Echo(e) => e,
            Stage::Reverb(e) => e,
        }
    }
}

/// An ordered, ready-to-run set of vocal stages
pub struct EffectsChain {
    stages: Vec<Stage>,
    sample_rate: u32,
}

impl EffectsChain {
    /// A chain with no stages (output equals input)
    pub fn passthrough(sample_rate: u32) -> Self {
        Self {
            stages: Vec::new(),
            sample_rate,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Stage kinds in processing order
    pub fn stage_kinds(&self) -> impl Iterator<Item = StageKind> + '_ {
        self.stages.iter().map(Stage::kind)
    }

    /// Display names of the stages in processing order
    pub fn stage_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.stages.iter().map(|s| s.kind().name())
    }

    /// Run every stage over `buffer` in order
    ///
    /// If a stage leaves non-finite samples behind, its state is cleared and
    /// the error names it. The buffer contents are unspecified in that case;
    /// callers substitute their own copy of the input.
    pub fn process(&mut self, buffer: &mut StereoBuffer) -> Result<(), EffectError> {
        for stage in &mut self.stages {
            stage.effect_mut().process(buffer);
            if !buffer.is_finite() {
                stage.effect_mut().reset();
                return Err(EffectError::NonFinite { stage: stage.kind() });
            }
        }
        Ok(())
    }

    /// Clear the DSP state of every stage
    pub fn reset(&mut self) {
        for stage in &mut self.stages {
            stage.effect_mut().reset();
        }
    }
}

/// Build a chain from a parameter snapshot
///
/// Allocates delay lines; call from the control thread.
pub fn build_chain(params: &EffectParameters, sample_rate: u32) -> EffectsChain {
    let mut stages = Vec::with_capacity(6);

    stages.push(Stage::Compressor(CompressorEffect::new(
        params.compressor_threshold_db(),
        params.compressor_ratio(),
        sample_rate,
    )));

    for band in EqBand::ALL {
        stages.push(Stage::Equalizer(
            band,
            PeakEqEffect::new(band.frequency(), band.q(), band.gain_db(params), sample_rate),
        ));
    }

    if params.echo_mix() > ECHO_MIX_THRESHOLD {
        stages.push(Stage::Echo(EchoEffect::new(
            params.echo_delay(),
            params.echo_feedback(),
            params.echo_mix(),
            sample_rate,
        )));
    }

    stages.push(Stage::Reverb(ReverbEffect::new(
        params.reverb_room_size(),
        params.reverb_wet(),
        sample_rate,
    )));

    EffectsChain { stages, sample_rate }
}

/// Publishing failed because the audio thread has not drained the queue
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishError {
    #[error("Effects chain queue is full (audio thread not consuming)")]
    QueueFull,
}

/// Create a chain hand-off queue for a stream running at `sample_rate`
pub fn chain_channel(sample_rate: u32, capacity: usize) -> (ChainPublisher, ChainReceiver) {
    let (producer, consumer) = rtrb::RingBuffer::new(capacity);
    (
        ChainPublisher { producer, sample_rate },
        ChainReceiver { consumer },
    )
}

/// Control-thread side: builds and publishes chains
pub struct ChainPublisher {
    producer: rtrb::Producer<Owned<EffectsChain>>,
    sample_rate: u32,
}

impl ChainPublisher {
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Hand a fully built chain to the audio thread
    pub fn publish(&mut self, chain: EffectsChain) -> Result<(), PublishError> {
        let chain = Owned::new(&gc_handle(), chain);
        self.producer.push(chain).map_err(|_| PublishError::QueueFull)
    }

    /// Build a chain from `params` and publish it
    pub fn rebuild(&mut self, params: &EffectParameters) -> Result<(), PublishError> {
        let chain = build_chain(params, self.sample_rate);
        log::debug!(
            "Publishing effects chain: {}",
            chain.stage_names().collect::<Vec<_>>().join(" -> ")
        );
        self.publish(chain)
    }
}

/// Audio-thread side: picks up the newest published chain
pub struct ChainReceiver {
    consumer: rtrb::Consumer<Owned<EffectsChain>>,
}

impl ChainReceiver {
    /// Drain the queue and return the most recent chain, if any
    ///
    /// Older pending chains are dropped here; their memory is reclaimed on
    /// the GC thread.
    #[inline]
    pub fn latest(&mut self) -> Option<Owned<EffectsChain>> {
        let mut latest = None;
        while let Ok(chain) = self.consumer.pop() {
            latest = Some(chain);
        }
        latest
    }
}
