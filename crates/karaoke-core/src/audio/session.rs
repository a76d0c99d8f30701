//! Karaoke session lifecycle (CPAL duplex streams)
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐   chains (rtrb)    ┌─────────────────────┐
//! │   UI / control   │───────────────────►│   Output stream     │
//! │   thread         │                    │  (owns MixEngine)   │
//! └──────────────────┘                    └──────────▲──────────┘
//!      ▲       ▲                                     │ pop()
//!      │       │ levels (rtrb)            ┌──────────┴──────────┐
//!      │       └──────────────────────────│   Mic sample ring   │
//!      │ Relaxed atomics                  │  (SPSC, f32)        │
//!      │                                  └──────────▲──────────┘
//! ┌────┴─────────────┐                               │ push()
//! │ TransportAtomics │                    ┌──────────┴──────────┐
//! └──────────────────┘                    │    Input stream     │
//!                                         └─────────────────────┘
//! ```
//!
//! The output callback pulls the newest microphone samples, runs the mix
//! engine and writes the result. The input callback only pushes samples.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use basedrop::{Owned, Shared};
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{BufferSize as CpalBufferSize, SampleFormat, Stream, StreamConfig};

use super::config::SessionConfig;
use super::device::{resolve_device, Direction};
use super::error::{AudioError, AudioResult};
use crate::effect::{build_chain, chain_channel, ChainPublisher, EffectParameters, PublishError, CHAIN_QUEUE_CAPACITY};
use crate::engine::gc::gc_handle;
use crate::engine::{MixEngine, TransportAtomics, TransportController, MAX_BUFFER_SIZE};
use crate::level::{level_channel, LevelMeter, LevelReading, LevelReceiver, LEVEL_QUEUE_CAPACITY};
use crate::track::{resample, BackingTrack};
use crate::types::{StereoSample, DEFAULT_BLOCK_SIZE};

/// Blocks of microphone audio the input ring can hold
const MIC_RING_BLOCKS: usize = 4;

/// UI-side handles shared by live and offline sessions
pub struct SessionControls {
    atomics: Arc<TransportAtomics>,
    transport: TransportController,
    publisher: ChainPublisher,
    levels: LevelReceiver,
    meter: LevelMeter,
    params: EffectParameters,
}

impl SessionControls {
    pub fn transport(&self) -> &TransportController {
        &self.transport
    }

    pub fn atomics(&self) -> &Arc<TransportAtomics> {
        &self.atomics
    }

    /// Parameters of the most recently published chain
    pub fn params(&self) -> &EffectParameters {
        &self.params
    }

    /// Rebuild the effects chain from `params` and hand it to the audio thread
    ///
    /// On [`PublishError::QueueFull`] the previous parameters stay current;
    /// retry on the next change or UI tick.
    pub fn publish_params(&mut self, params: &EffectParameters) -> Result<(), PublishError> {
        self.publisher.rebuild(params)?;
        self.params = *params;
        Ok(())
    }

    /// Set the output volume for the processed mic (clamped)
    pub fn set_volume(&self, volume: f32) -> f32 {
        self.atomics.set_volume(volume)
    }

    pub fn volume(&self) -> f32 {
        self.atomics.volume()
    }

    /// Apply pending block levels and return the current meter reading
    pub fn poll_levels(&mut self) -> LevelReading {
        self.levels
            .drain_into(&mut self.meter)
            .unwrap_or_else(|| self.meter.reading())
    }

    pub fn is_finished(&self) -> bool {
        self.atomics.is_finished()
    }

    fn reset_meter(&mut self) {
        self.meter.reset();
    }
}

/// Wire up an engine and its controls for a track already at `sample_rate`
fn assemble(
    track: BackingTrack,
    sample_rate: u32,
    params: &EffectParameters,
    volume: f32,
) -> (SessionControls, MixEngine) {
    let atomics = Arc::new(TransportAtomics::new(track.frame_count() as u64, sample_rate));
    atomics.set_volume(volume);

    let (publisher, receiver) = chain_channel(sample_rate, CHAIN_QUEUE_CAPACITY);
    let (level_sender, levels) = level_channel(LEVEL_QUEUE_CAPACITY);

    let chain = Owned::new(&gc_handle(), build_chain(params, sample_rate));
    let engine = MixEngine::new(
        Shared::new(&gc_handle(), track),
        Arc::clone(&atomics),
        chain,
        receiver,
        level_sender,
    );

    let controls = SessionControls {
        transport: TransportController::new(Arc::clone(&atomics)),
        atomics,
        publisher,
        levels,
        meter: LevelMeter::new(),
        params: *params,
    };
    (controls, engine)
}

/// Reject empty tracks and bring the track to `sample_rate`
fn prepare_track(track: BackingTrack, sample_rate: u32) -> AudioResult<BackingTrack> {
    if track.is_empty() {
        return Err(AudioError::EmptyTrack);
    }
    if track.sample_rate() == sample_rate {
        return Ok(track);
    }
    resample(&track, sample_rate).map_err(|e| AudioError::Resample(e.to_string()))
}

/// The live CPAL streams; dropping this stops all callbacks
struct SessionStreams {
    _input: Stream,
    _output: Stream,
}

/// A running duplex session: microphone in, mixed audio out
pub struct KaraokeSession {
    controls: SessionControls,
    streams: Option<SessionStreams>,
    stream_failed: Arc<AtomicBool>,
    input_name: String,
    output_name: String,
    sample_rate: u32,
    buffer_size: Option<u32>,
}

impl KaraokeSession {
    /// Open both devices, start streaming and begin playback
    ///
    /// The track is resampled once if its rate differs from the stream rate.
    /// On error nothing is left running.
    pub fn start(
        track: BackingTrack,
        config: &SessionConfig,
        params: &EffectParameters,
        volume: f32,
    ) -> AudioResult<Self> {
        if track.is_empty() {
            return Err(AudioError::EmptyTrack);
        }

        let output_device = resolve_device(config.output_device.as_ref(), Direction::Output)?;
        let input_device = resolve_device(config.input_device.as_ref(), Direction::Input)?;
        let output_name = output_device.name().unwrap_or_else(|_| "Unknown".to_string());
        let input_name = input_device.name().unwrap_or_else(|_| "Unknown".to_string());
        log::info!("Using output device: {}", output_name);
        log::info!("Using input device: {}", input_name);

        let target_rate = config.stream_rate_for(track.sample_rate());
        let output_config = get_output_config(&output_device, target_rate, config)?;
        let sample_rate = output_config.sample_rate.0;
        let input_config = get_input_config(&input_device, sample_rate, output_config.buffer_size)?;

        let buffer_size = match output_config.buffer_size {
            CpalBufferSize::Fixed(frames) => Some(frames),
            CpalBufferSize::Default => None,
        };
        log::info!(
            "Audio config: out {} ch / in {} ch, {}Hz, {} (~{:.1}ms latency)",
            output_config.channels,
            input_config.channels,
            sample_rate,
            buffer_size.map_or_else(|| "default buffer".to_string(), |f| format!("{} frames", f)),
            buffer_size.unwrap_or(DEFAULT_BLOCK_SIZE as u32) as f32 / sample_rate as f32 * 1000.0
        );

        let track = prepare_track(track, sample_rate)?;
        let (controls, engine) = assemble(track, sample_rate, params, volume);

        let in_channels = input_config.channels as usize;
        let (mic_producer, mic_consumer) =
            rtrb::RingBuffer::<f32>::new(MAX_BUFFER_SIZE * in_channels * MIC_RING_BLOCKS);

        let stream_failed = Arc::new(AtomicBool::new(false));
        let input = build_input_stream(&input_device, &input_config, mic_producer, Arc::clone(&stream_failed))?;
        let output = build_output_stream(
            &output_device,
            &output_config,
            engine,
            mic_consumer,
            in_channels,
            Arc::clone(&stream_failed),
        )?;

        controls.transport.play();
        input
            .play()
            .map_err(|e| AudioError::StreamPlayError(e.to_string()))?;
        output
            .play()
            .map_err(|e| AudioError::StreamPlayError(e.to_string()))?;

        log::info!("Karaoke session started");

        Ok(Self {
            controls,
            streams: Some(SessionStreams {
                _input: input,
                _output: output,
            }),
            stream_failed,
            input_name,
            output_name,
            sample_rate,
            buffer_size,
        })
    }

    /// Build the same engine without opening devices
    ///
    /// The caller drives [`MixEngine::process`] directly (tests, offline
    /// rendering). Playback starts in the Playing state.
    pub fn offline(
        track: BackingTrack,
        sample_rate: u32,
        params: &EffectParameters,
        volume: f32,
    ) -> AudioResult<(OfflineSession, MixEngine)> {
        let track = prepare_track(track, sample_rate)?;
        let (controls, engine) = assemble(track, sample_rate, params, volume);
        controls.transport.play();
        Ok((
            OfflineSession {
                controls,
                active: true,
            },
            engine,
        ))
    }

    /// Stop playback and close both streams
    ///
    /// Returns `false` if the session was already stopped.
    pub fn stop(&mut self) -> bool {
        let Some(streams) = self.streams.take() else {
            return false;
        };
        self.controls.transport.stop();
        // No callbacks run after the streams are dropped
        drop(streams);
        self.controls.reset_meter();
        log::info!("Karaoke session stopped");
        true
    }

    /// Streams are open and no stream error has been reported
    pub fn is_active(&self) -> bool {
        self.streams.is_some() && !self.stream_failed()
    }

    /// Whether either stream reported an error
    pub fn stream_failed(&self) -> bool {
        self.stream_failed.load(Ordering::Relaxed)
    }

    pub fn is_finished(&self) -> bool {
        self.controls.is_finished()
    }

    pub fn transport(&self) -> &TransportController {
        self.controls.transport()
    }

    pub fn atomics(&self) -> &Arc<TransportAtomics> {
        self.controls.atomics()
    }

    pub fn params(&self) -> &EffectParameters {
        self.controls.params()
    }

    pub fn publish_params(&mut self, params: &EffectParameters) -> Result<(), PublishError> {
        self.controls.publish_params(params)
    }

    pub fn set_volume(&self, volume: f32) -> f32 {
        self.controls.set_volume(volume)
    }

    pub fn volume(&self) -> f32 {
        self.controls.volume()
    }

    pub fn poll_levels(&mut self) -> LevelReading {
        self.controls.poll_levels()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Negotiated buffer size in frames (None = device default)
    pub fn buffer_size(&self) -> Option<u32> {
        self.buffer_size
    }

    pub fn input_device_name(&self) -> &str {
        &self.input_name
    }

    pub fn output_device_name(&self) -> &str {
        &self.output_name
    }
}

impl Drop for KaraokeSession {
    fn drop(&mut self) {
        self.stop();
    }
}

/// A device-less session whose engine is driven by the caller
pub struct OfflineSession {
    controls: SessionControls,
    active: bool,
}

impl OfflineSession {
    /// Stop playback; returns `false` if already stopped
    pub fn stop(&mut self) -> bool {
        if !self.active {
            return false;
        }
        self.active = false;
        self.controls.transport.stop();
        self.controls.reset_meter();
        true
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_finished(&self) -> bool {
        self.controls.is_finished()
    }

    pub fn transport(&self) -> &TransportController {
        self.controls.transport()
    }

    pub fn atomics(&self) -> &Arc<TransportAtomics> {
        self.controls.atomics()
    }

    pub fn params(&self) -> &EffectParameters {
        self.controls.params()
    }

    pub fn publish_params(&mut self, params: &EffectParameters) -> Result<(), PublishError> {
        self.controls.publish_params(params)
    }

    pub fn set_volume(&self, volume: f32) -> f32 {
        self.controls.set_volume(volume)
    }

    pub fn poll_levels(&mut self) -> LevelReading {
        self.controls.poll_levels()
    }
}

fn buffer_size_to_cpal(config: &SessionConfig) -> CpalBufferSize {
    match config.buffer_size.as_frames() {
        Some(frames) => CpalBufferSize::Fixed(frames),
        None => CpalBufferSize::Default,
    }
}

/// Pick an f32 stereo output config at `target_rate`
///
/// Falls back to the device's maximum rate (with a warning) when the target
/// rate is not supported; the track is then resampled to match.
fn get_output_config(
    device: &cpal::Device,
    target_rate: u32,
    config: &SessionConfig,
) -> AudioResult<StreamConfig> {
    let supported_configs: Vec<_> = device
        .supported_output_configs()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?
        .collect();

    let in_range = |c: &&cpal::SupportedStreamConfigRange| {
        target_rate >= c.min_sample_rate().0 && target_rate <= c.max_sample_rate().0
    };

    let best = supported_configs
        .iter()
        .filter(|c| c.sample_format() == SampleFormat::F32)
        .filter(|c| c.channels() >= 2)
        .find(in_range)
        .or_else(|| {
            supported_configs
                .iter()
                .filter(|c| c.sample_format() == SampleFormat::F32)
                .find(in_range)
        })
        .or_else(|| {
            supported_configs
                .iter()
                .filter(|c| c.sample_format() == SampleFormat::F32)
                .max_by_key(|c| c.channels())
        })
        .ok_or_else(|| {
            if supported_configs.is_empty() {
                AudioError::ConfigError("No supported output configurations".to_string())
            } else {
                AudioError::UnsupportedFormat("output device has no f32 configuration".to_string())
            }
        })?;

    let sample_rate = if in_range(&best) {
        cpal::SampleRate(target_rate)
    } else {
        let fallback = best.max_sample_rate();
        log::warn!(
            "Output device doesn't support {}Hz, falling back to {}Hz (track will be resampled)",
            target_rate,
            fallback.0
        );
        fallback
    };

    Ok(StreamConfig {
        channels: best.channels(),
        sample_rate,
        buffer_size: buffer_size_to_cpal(config),
    })
}

/// Pick an f32 input config at exactly `sample_rate`
///
/// The microphone is not resampled, so the rate must match the output.
fn get_input_config(
    device: &cpal::Device,
    sample_rate: u32,
    buffer_size: CpalBufferSize,
) -> AudioResult<StreamConfig> {
    let supported_configs: Vec<_> = device
        .supported_input_configs()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?
        .collect();

    let best = supported_configs
        .iter()
        .filter(|c| c.sample_format() == SampleFormat::F32)
        .filter(|c| sample_rate >= c.min_sample_rate().0 && sample_rate <= c.max_sample_rate().0)
        .min_by_key(|c| c.channels())
        .ok_or_else(|| {
            AudioError::ConfigError(format!("Input device has no f32 configuration at {}Hz", sample_rate))
        })?;

    Ok(StreamConfig {
        channels: best.channels(),
        sample_rate: cpal::SampleRate(sample_rate),
        buffer_size,
    })
}

/// Build the microphone stream
///
/// Whole callback buffers are pushed or dropped, so the ring never holds a
/// partial frame.
fn build_input_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    mut producer: rtrb::Producer<f32>,
    failed: Arc<AtomicBool>,
) -> AudioResult<Stream> {
    device
        .build_input_stream(
            config,
            move |data: &[f32], _info: &cpal::InputCallbackInfo| {
                if let Ok(chunk) = producer.write_chunk_uninit(data.len()) {
                    chunk.fill_from_iter(data.iter().copied());
                }
            },
            move |err| {
                failed.store(true, Ordering::Relaxed);
                log::error!("Input audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| AudioError::StreamBuildError(e.to_string()))
}

/// Build the output stream that owns the mix engine
fn build_output_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    mut engine: MixEngine,
    mut mic: rtrb::Consumer<f32>,
    mic_channels: usize,
    failed: Arc<AtomicBool>,
) -> AudioResult<Stream> {
    let channels = config.channels as usize;
    let mut mic_scratch = vec![0.0f32; MAX_BUFFER_SIZE * mic_channels];
    let mut mix_scratch = vec![StereoSample::silence(); MAX_BUFFER_SIZE];

    device
        .build_output_stream(
            config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                for data in data.chunks_mut(MAX_BUFFER_SIZE * channels) {
                    let frames = data.len() / channels;

                    // Newest mic samples only: drop any backlog beyond one block
                    let wanted = frames * mic_channels;
                    let backlog = mic.slots().saturating_sub(wanted);
                    if backlog > 0 {
                        if let Ok(chunk) = mic.read_chunk(backlog) {
                            chunk.commit_all();
                        }
                    }
                    let available = mic.slots().min(wanted);
                    let mut read = 0;
                    if let Ok(chunk) = mic.read_chunk(available) {
                        let (first, second) = chunk.as_slices();
                        mic_scratch[..first.len()].copy_from_slice(first);
                        mic_scratch[first.len()..first.len() + second.len()].copy_from_slice(second);
                        read = first.len() + second.len();
                        chunk.commit_all();
                    }

                    let out = &mut mix_scratch[..frames];
                    engine.process(&mic_scratch[..read], mic_channels, out);

                    for (frame, sample) in data.chunks_mut(channels).zip(out.iter()) {
                        frame[0] = sample.left;
                        if channels > 1 {
                            frame[1] = sample.right;
                        }
                        // Fill additional channels with silence
                        for ch in frame.iter_mut().skip(2) {
                            *ch = 0.0;
                        }
                    }
                }
            },
            move |err| {
                failed.store(true, Ordering::Relaxed);
                log::error!("Output audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| AudioError::StreamBuildError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PlayState;

    fn tone(frames: usize, sample_rate: u32) -> BackingTrack {
        let samples = (0..frames)
            .map(|i| StereoSample::mono(0.1 * (i as f32 * 0.01).sin()))
            .collect();
        BackingTrack::new(samples, sample_rate)
    }

    #[test]
    fn test_start_rejects_empty_track() {
        let track = BackingTrack::new(Vec::new(), 48000);
        let result = KaraokeSession::start(
            track,
            &SessionConfig::default(),
            &EffectParameters::default(),
            1.0,
        );
        assert!(matches!(result, Err(AudioError::EmptyTrack)));
    }

    #[test]
    fn test_offline_rejects_empty_track() {
        let track = BackingTrack::new(Vec::new(), 48000);
        let result = KaraokeSession::offline(track, 48000, &EffectParameters::default(), 1.0);
        assert!(matches!(result, Err(AudioError::EmptyTrack)));
    }

    #[test]
    fn test_stop_twice_is_safe() {
        let (mut session, mut engine) =
            KaraokeSession::offline(tone(4800, 48000), 48000, &EffectParameters::default(), 1.0).unwrap();
        assert!(session.is_active());
        assert_eq!(session.transport().state(), PlayState::Playing);

        let mut out = vec![StereoSample::silence(); 128];
        engine.process(&[], 1, &mut out);
        assert_eq!(session.transport().position(), 128);

        assert!(session.stop());
        assert!(!session.stop());
        assert!(!session.is_active());
        assert_eq!(session.transport().state(), PlayState::Stopped);

        // A stopped engine keeps producing silence without advancing
        engine.process(&[], 1, &mut out);
        assert_eq!(session.transport().position(), 128);
    }

    #[test]
    fn test_offline_resamples_to_stream_rate() {
        let (session, engine) =
            KaraokeSession::offline(tone(96000, 96000), 48000, &EffectParameters::default(), 1.0).unwrap();
        assert_eq!(engine.track().sample_rate(), 48000);
        assert_eq!(engine.track().frame_count(), 48000);
        assert!((session.transport().duration_seconds() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_publish_params_and_volume() {
        let (mut session, mut engine) =
            KaraokeSession::offline(tone(4800, 48000), 48000, &EffectParameters::default(), 3.0).unwrap();
        assert_eq!(session.atomics().volume(), 2.0);
        assert_eq!(session.set_volume(0.5), 0.5);

        let mut params = *session.params();
        params.set_echo_mix(0.4);
        session.publish_params(&params).unwrap();
        assert_eq!(session.params().echo_mix(), 0.4);

        let mut out = vec![StereoSample::silence(); 128];
        engine.process(&[0.5; 128], 1, &mut out);
        assert_eq!(engine.chain().len(), 6);

        let reading = session.poll_levels();
        assert!(reading.left_db > -60.0);
    }
}
