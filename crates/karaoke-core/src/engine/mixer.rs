//! Real-time mix engine
//!
//! Called once per output callback. Each call:
//!
//! 1. adopts the newest published effects chain
//! 2. converts the microphone block to stereo and reports its level
//! 3. reads the backing block at the playhead (silence unless playing)
//! 4. runs the mic through the chain, falling back to the dry mic on error
//! 5. scales the processed mic by the output volume
//! 6. adds the backing block
//! 7. hard-clips to full scale
//!
//! Nothing here allocates, locks or logs. All buffers are sized for
//! [`MAX_BUFFER_SIZE`] frames up front; larger callbacks are processed in
//! chunks of that size.

use std::sync::Arc;

use basedrop::{Owned, Shared};

use super::clipper::HardClipper;
use super::transport::TransportAtomics;
use crate::effect::{ChainReceiver, EffectsChain};
use crate::level::{rms, BlockLevel, LevelSender};
use crate::track::BackingTrack;
use crate::types::{PlayState, StereoBuffer, StereoSample};

/// Maximum frames processed in one pass
pub const MAX_BUFFER_SIZE: usize = 8192;

pub struct MixEngine {
    track: Shared<BackingTrack>,
    atomics: Arc<TransportAtomics>,
    chain: Owned<EffectsChain>,
    chains: ChainReceiver,
    levels: LevelSender,
    clipper: HardClipper,
    /// Mic signal, processed in place by the chain
    mic_buffer: StereoBuffer,
    /// Unprocessed copy of the mic block for fallback
    dry_buffer: StereoBuffer,
}

impl MixEngine {
    pub fn new(
        track: Shared<BackingTrack>,
        atomics: Arc<TransportAtomics>,
        chain: Owned<EffectsChain>,
        chains: ChainReceiver,
        levels: LevelSender,
    ) -> Self {
        let clipper = HardClipper::new(atomics.clip_indicator());
        Self {
            track,
            atomics,
            chain,
            chains,
            levels,
            clipper,
            mic_buffer: StereoBuffer::silence(MAX_BUFFER_SIZE),
            dry_buffer: StereoBuffer::silence(MAX_BUFFER_SIZE),
        }
    }

    /// The chain currently in use
    pub fn chain(&self) -> &EffectsChain {
        &self.chain
    }

    pub fn atomics(&self) -> &Arc<TransportAtomics> {
        &self.atomics
    }

    pub fn track(&self) -> &Shared<BackingTrack> {
        &self.track
    }

    /// Mix one callback's worth of audio into `out`
    ///
    /// `mic` holds interleaved microphone samples with `mic_channels`
    /// channels. Frames missing from `mic` are treated as silence.
    pub fn process(&mut self, mic: &[f32], mic_channels: usize, out: &mut [StereoSample]) {
        if let Some(chain) = self.chains.latest() {
            // The old chain goes to the GC thread
            self.chain = chain;
        }

        let channels = mic_channels.max(1);
        let mut offset = 0;
        for block in out.chunks_mut(MAX_BUFFER_SIZE) {
            let start = (offset * channels).min(mic.len());
            let end = ((offset + block.len()) * channels).min(mic.len());
            self.process_block(&mic[start..end], channels, block);
            offset += block.len();
        }
    }

    fn process_block(&mut self, mic: &[f32], channels: usize, out: &mut [StereoSample]) {
        let frames = out.len();
        let volume = self.atomics.volume();

        // Mic to stereo
        self.mic_buffer.set_len_from_capacity(frames);
        let mut mic_frames = mic.chunks_exact(channels);
        for sample in self.mic_buffer.iter_mut() {
            *sample = match mic_frames.next() {
                Some(frame) if channels == 1 => StereoSample::mono(frame[0]),
                Some(frame) => StereoSample::new(frame[0], frame[1]),
                None => StereoSample::silence(),
            };
        }

        let mic_slice = self.mic_buffer.as_slice();
        self.levels.push(BlockLevel {
            left: rms(mic_slice.iter().map(|s| s.left)) * volume,
            right: rms(mic_slice.iter().map(|s| s.right)) * volume,
        });

        // Backing block straight into the output
        self.read_backing(out);

        // Effects with dry fallback
        self.dry_buffer.copy_from(&self.mic_buffer);
        if self.chain.process(&mut self.mic_buffer).is_err() {
            self.mic_buffer.copy_from(&self.dry_buffer);
            self.atomics.record_fallback();
        }

        for (o, m) in out.iter_mut().zip(self.mic_buffer.iter()) {
            *o += *m * volume;
        }

        self.clipper.process(out);
    }

    fn read_backing(&mut self, out: &mut [StereoSample]) {
        if self.atomics.play_state() != PlayState::Playing {
            out.fill(StereoSample::silence());
            return;
        }

        let frames = self.track.frames();
        let position = self.atomics.position();
        let start = (position as usize).min(frames.len());
        let available = (frames.len() - start).min(out.len());

        out[..available].copy_from_slice(&frames[start..start + available]);
        out[available..].fill(StereoSample::silence());

        if let Some(new_position) = self.atomics.advance(position, out.len() as u64) {
            if new_position >= self.atomics.length() {
                self.atomics.mark_finished();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::{build_chain, chain_channel, ChainPublisher, EffectParameters, CHAIN_QUEUE_CAPACITY};
    use crate::engine::gc::gc_handle;
    use crate::engine::transport::TransportController;
    use crate::level::{level_channel, LevelReceiver, LEVEL_QUEUE_CAPACITY};

    const SR: u32 = 48000;
    const BLOCK: usize = 128;

    struct Rig {
        engine: MixEngine,
        transport: TransportController,
        publisher: ChainPublisher,
        levels: LevelReceiver,
    }

    fn rig(track: BackingTrack, params: &EffectParameters) -> Rig {
        let atomics = Arc::new(TransportAtomics::new(track.frame_count() as u64, SR));
        let (publisher, receiver) = chain_channel(SR, CHAIN_QUEUE_CAPACITY);
        let (sender, levels) = level_channel(LEVEL_QUEUE_CAPACITY);
        let chain = Owned::new(&gc_handle(), build_chain(params, SR));
        let engine = MixEngine::new(
            Shared::new(&gc_handle(), track),
            Arc::clone(&atomics),
            chain,
            receiver,
            sender,
        );
        Rig {
            engine,
            transport: TransportController::new(atomics),
            publisher,
            levels,
        }
    }

    /// Deterministic ramp in [-0.5, 0.5] so every frame is distinguishable
    fn ramp_track(frames: usize) -> BackingTrack {
        let samples = (0..frames)
            .map(|i| {
                let v = (i % 1000) as f32 / 1000.0 - 0.5;
                StereoSample::new(v, -v)
            })
            .collect();
        BackingTrack::new(samples, SR)
    }

    fn run_block(engine: &mut MixEngine, mic: &[f32]) -> Vec<StereoSample> {
        let mut out = vec![StereoSample::silence(); BLOCK];
        engine.process(mic, 1, &mut out);
        out
    }

    #[test]
    fn test_position_after_n_callbacks() {
        let length = 1000;
        let mut rig = rig(ramp_track(length), &EffectParameters::default());
        rig.transport.play();

        let silence = [0.0f32; BLOCK];
        for n in 1..=10u64 {
            run_block(&mut rig.engine, &silence);
            assert_eq!(rig.transport.position(), (n * BLOCK as u64).min(length as u64));
        }
        assert!(rig.transport.atomics().is_finished());
    }

    #[test]
    fn test_silent_mic_outputs_backing_exactly() {
        // 10 s at 48 kHz in 128-frame callbacks
        let length = 480_000;
        let track = ramp_track(length);
        let expected = track.frames().to_vec();
        let mut rig = rig(track, &EffectParameters::default());
        rig.transport.play();

        let silence = [0.0f32; BLOCK];
        let callbacks = length / BLOCK;
        for n in 0..callbacks {
            let out = run_block(&mut rig.engine, &silence);
            assert_eq!(out.as_slice(), &expected[n * BLOCK..(n + 1) * BLOCK], "block {}", n);
        }
        assert_eq!(rig.transport.position(), 480_000);

        // Past the end: silence and the position holds
        for _ in 0..10 {
            let out = run_block(&mut rig.engine, &silence);
            assert!(out.iter().all(|s| *s == StereoSample::silence()));
        }
        assert_eq!(rig.transport.position(), 480_000);
        assert!(rig.transport.atomics().is_finished());
    }

    #[test]
    fn test_seek_is_read_by_next_callback() {
        let track = ramp_track(480_000);
        let expected = track.frames()[100_000..100_000 + BLOCK].to_vec();
        let mut rig = rig(track, &EffectParameters::default());
        rig.transport.play();

        let silence = [0.0f32; BLOCK];
        run_block(&mut rig.engine, &silence);
        rig.transport.seek(100_000);
        let out = run_block(&mut rig.engine, &silence);
        assert_eq!(out, expected);
        assert_eq!(rig.transport.position(), 100_000 + BLOCK as u64);
    }

    #[test]
    fn test_output_stays_in_range_at_full_scale() {
        let track = BackingTrack::new(vec![StereoSample::new(1.0, -1.0); 4096], SR);
        let mut params = EffectParameters::default();
        params.set_eq_mid_db(20.0);
        let mut rig = rig(track, &params);
        rig.transport.play();
        rig.transport.atomics().set_volume(2.0);

        let mic: Vec<f32> = (0..BLOCK).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        for _ in 0..16 {
            let out = run_block(&mut rig.engine, &mic);
            for s in &out {
                assert!((-1.0..=1.0).contains(&s.left), "left {}", s.left);
                assert!((-1.0..=1.0).contains(&s.right), "right {}", s.right);
            }
        }
        assert!(rig.transport.atomics().take_clipped());
    }

    #[test]
    fn test_pause_silences_backing_but_keeps_mic() {
        let mut params = EffectParameters::default();
        params.set_compressor_threshold_db(0.0);
        params.set_compressor_ratio(1.0);
        params.set_eq_bass_db(0.0);
        params.set_eq_mid_db(0.0);
        params.set_eq_treble_db(0.0);
        params.set_reverb_wet(0.0);
        let mut rig = rig(ramp_track(10_000), &params);
        rig.transport.play();

        let silence = [0.0f32; BLOCK];
        run_block(&mut rig.engine, &silence);
        rig.transport.pause();
        let before = rig.transport.position();

        let mic = [0.25f32; BLOCK];
        let out = run_block(&mut rig.engine, &mic);
        assert_eq!(rig.transport.position(), before);
        for s in &out {
            assert!((s.left - 0.25).abs() < 1e-5);
            assert!((s.right - 0.25).abs() < 1e-5);
        }
    }

    #[test]
    fn test_non_finite_mic_falls_back_to_dry() {
        let mut rig = rig(ramp_track(10_000), &EffectParameters::default());
        let mut mic = [0.1f32; BLOCK];
        mic[3] = f32::INFINITY;

        let out = run_block(&mut rig.engine, &mic);
        assert_eq!(rig.transport.atomics().fallback_blocks(), 1);
        // Dry mic, clipped
        assert_eq!(out[0], StereoSample::new(0.1, 0.1));
        assert_eq!(out[3], StereoSample::new(1.0, 1.0));
    }

    #[test]
    fn test_nan_mic_never_reaches_output() {
        let mut rig = rig(ramp_track(10_000), &EffectParameters::default());
        rig.transport.play();
        let mut mic = [0.1f32; BLOCK];
        mic[3] = f32::NAN;

        let out = run_block(&mut rig.engine, &mic);
        assert_eq!(rig.transport.atomics().fallback_blocks(), 1);
        for (i, s) in out.iter().enumerate() {
            assert!(
                (-1.0..=1.0).contains(&s.left) && (-1.0..=1.0).contains(&s.right),
                "frame {} out of range: {:?}",
                i,
                s
            );
        }
        assert_eq!(out[3], StereoSample::silence());
        assert!(rig.transport.atomics().take_clipped());
    }

    #[test]
    fn test_published_chain_adopted_at_next_callback() {
        let mut params = EffectParameters::default();
        params.set_echo_mix(0.0);
        let mut rig = rig(ramp_track(10_000), &params);
        assert_eq!(rig.engine.chain().len(), 5);

        params.set_echo_mix(0.5);
        rig.publisher.rebuild(&params).unwrap();
        run_block(&mut rig.engine, &[0.0; BLOCK]);
        assert_eq!(rig.engine.chain().len(), 6);
    }

    #[test]
    fn test_levels_reported_per_block() {
        let mut rig = rig(ramp_track(10_000), &EffectParameters::default());
        rig.transport.atomics().set_volume(0.5);
        run_block(&mut rig.engine, &[0.5f32; BLOCK]);

        let level = rig.levels.pop().unwrap();
        assert!((level.left - 0.25).abs() < 1e-6);
        assert!((level.right - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_stereo_mic_and_short_input() {
        let mut rig = rig(ramp_track(10_000), &EffectParameters::default());
        // Only 4 stereo frames provided for a 128-frame block
        let mic = [0.1, 0.2, 0.1, 0.2, 0.1, 0.2, 0.1, 0.2];
        let mut out = vec![StereoSample::silence(); BLOCK];
        rig.engine.process(&mic, 2, &mut out);

        let level = rig.levels.pop().unwrap();
        let expected_left = (4.0 * 0.01f32 / BLOCK as f32).sqrt();
        assert!((level.left - expected_left).abs() < 1e-6);
        assert!(level.right > level.left);
    }

    #[test]
    fn test_oversized_callback_is_chunked() {
        let length = 20_000;
        let track = ramp_track(length);
        let expected = track.frames()[..MAX_BUFFER_SIZE * 2].to_vec();
        let mut rig = rig(track, &EffectParameters::default());
        rig.transport.play();

        let mic = vec![0.0f32; MAX_BUFFER_SIZE * 2];
        let mut out = vec![StereoSample::silence(); MAX_BUFFER_SIZE * 2];
        rig.engine.process(&mic, 1, &mut out);
        assert_eq!(out, expected);
        assert_eq!(rig.transport.position(), (MAX_BUFFER_SIZE * 2) as u64);
    }
}
