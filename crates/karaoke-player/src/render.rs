//! Offline render: backing track plus a recorded vocal to a WAV file
//!
//! The vocal runs through the same mix engine as a live microphone, one
//! callback-sized block at a time.

use std::path::Path;

use anyhow::{Context, Result};

use karaoke_core::audio::KaraokeSession;
use karaoke_core::effect::EffectParameters;
use karaoke_core::track::{decode_file, resample, write_wav, BackingTrack};
use karaoke_core::types::{StereoSample, DEFAULT_BLOCK_SIZE};

/// What happened during a render
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderStats {
    pub frames: usize,
    pub sample_rate: u32,
    pub clipped: bool,
    pub fallback_blocks: u64,
}

/// Mix `vocal` over `backing` at `sample_rate` until the backing ends
pub fn mix_offline(
    backing: BackingTrack,
    vocal: &BackingTrack,
    sample_rate: u32,
    params: &EffectParameters,
    volume: f32,
) -> Result<(BackingTrack, RenderStats)> {
    let vocal = if vocal.sample_rate() == sample_rate || vocal.is_empty() {
        vocal.clone()
    } else {
        resample(vocal, sample_rate).context("Failed to resample vocal")?
    };

    let (mut session, mut engine) = KaraokeSession::offline(backing, sample_rate, params, volume)?;
    let length = session.atomics().length() as usize;
    let mic = vocal.as_interleaved();

    let mut mixed = vec![StereoSample::silence(); length];
    let mut clipped = false;
    for (index, block) in mixed.chunks_mut(DEFAULT_BLOCK_SIZE).enumerate() {
        let start = (index * DEFAULT_BLOCK_SIZE * 2).min(mic.len());
        let end = (start + block.len() * 2).min(mic.len());
        engine.process(&mic[start..end], 2, block);
        clipped |= session.atomics().take_clipped();
    }

    let stats = RenderStats {
        frames: length,
        sample_rate,
        clipped,
        fallback_blocks: session.atomics().fallback_blocks(),
    };
    session.stop();
    Ok((BackingTrack::new(mixed, sample_rate), stats))
}

/// Decode both inputs, mix them and write a 32-bit float WAV
pub fn render_file(
    backing: &Path,
    vocal: &Path,
    output: &Path,
    sample_rate: Option<u32>,
    max_track_rate: u32,
    params: &EffectParameters,
    volume: f32,
) -> Result<RenderStats> {
    let backing_track =
        decode_file(backing).with_context(|| format!("Failed to load backing track {:?}", backing))?;
    let vocal_track = decode_file(vocal).with_context(|| format!("Failed to load vocal {:?}", vocal))?;

    let rate = sample_rate.unwrap_or_else(|| backing_track.sample_rate().min(max_track_rate));
    let (mixed, stats) = mix_offline(backing_track, &vocal_track, rate, params, volume)?;

    write_wav(output, &mixed).with_context(|| format!("Failed to write {:?}", output))?;
    log::info!(
        "Rendered {:.1}s at {}Hz to {:?}",
        mixed.duration_seconds(),
        rate,
        output
    );
    if stats.clipped {
        log::warn!("Output clipped; lower the vocal volume or the backing level");
    }
    if stats.fallback_blocks > 0 {
        log::warn!("{} blocks fell back to the dry vocal", stats.fallback_blocks);
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant(frames: usize, value: f32, sample_rate: u32) -> BackingTrack {
        BackingTrack::new(vec![StereoSample::mono(value); frames], sample_rate)
    }

    #[test]
    fn test_silent_vocal_renders_backing() {
        let backing = constant(1000, 0.25, 48000);
        let vocal = BackingTrack::new(Vec::new(), 48000);

        let (mixed, stats) =
            mix_offline(backing.clone(), &vocal, 48000, &EffectParameters::default(), 1.0).unwrap();
        assert_eq!(stats.frames, 1000);
        assert!(!stats.clipped);
        assert_eq!(mixed.frames(), backing.frames());
    }

    #[test]
    fn test_loud_vocal_is_clipped() {
        let backing = constant(512, 0.9, 48000);
        let vocal = constant(512, 0.9, 48000);

        let (mixed, stats) =
            mix_offline(backing, &vocal, 48000, &EffectParameters::default(), 2.0).unwrap();
        assert!(stats.clipped);
        assert!(mixed.frames().iter().all(|s| s.left.abs() <= 1.0 && s.right.abs() <= 1.0));
    }

    #[test]
    fn test_render_file_writes_wav() {
        let dir = tempfile::tempdir().unwrap();
        let backing_path = dir.path().join("backing.wav");
        let vocal_path = dir.path().join("vocal.wav");
        let out_path = dir.path().join("mix.wav");
        write_wav(&backing_path, &constant(4800, 0.1, 48000)).unwrap();
        write_wav(&vocal_path, &constant(2400, 0.1, 48000)).unwrap();

        let stats = render_file(
            &backing_path,
            &vocal_path,
            &out_path,
            None,
            48000,
            &EffectParameters::default(),
            1.0,
        )
        .unwrap();
        assert_eq!(stats.frames, 4800);

        let rendered = karaoke_core::track::read_wav(&out_path).unwrap();
        assert_eq!(rendered.frame_count(), 4800);
        assert_eq!(rendered.sample_rate(), 48000);
    }
}
