//! WAV file helpers (hound)
//!
//! Renders are written as 32-bit float stereo. Reading accepts integer or
//! float WAV with any channel count.

use std::path::Path;

use super::{BackingTrack, TrackError, TrackResult};

/// Write a track as a 32-bit float stereo WAV file
pub fn write_wav(path: &Path, track: &BackingTrack) -> TrackResult<()> {
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: track.sample_rate(),
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };

    let mut writer = hound::WavWriter::create(path, spec).map_err(|e| hound_error(path, e))?;
    for &sample in track.as_interleaved() {
        writer.write_sample(sample).map_err(|e| hound_error(path, e))?;
    }
    writer.finalize().map_err(|e| hound_error(path, e))?;

    log::info!(
        "Wrote {} ({} frames, {:.1}s)",
        path.display(),
        track.frame_count(),
        track.duration_seconds()
    );
    Ok(())
}

/// Read a WAV file into a stereo track
pub fn read_wav(path: &Path) -> TrackResult<BackingTrack> {
    let reader = hound::WavReader::open(path).map_err(|e| hound_error(path, e))?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| TrackError::Decode(e.to_string()))?,
        hound::SampleFormat::Int => {
            let scale = 1.0 / (1u64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<Result<_, _>>()
                .map_err(|e| TrackError::Decode(e.to_string()))?
        }
    };

    Ok(BackingTrack::from_interleaved(
        &samples,
        spec.channels as usize,
        spec.sample_rate,
    ))
}

fn hound_error(path: &Path, e: hound::Error) -> TrackError {
    match e {
        hound::Error::IoError(source) => TrackError::Io {
            path: path.to_path_buf(),
            source,
        },
        hound::Error::Unsupported => TrackError::UnsupportedFormat("unsupported WAV layout".to_string()),
        other => TrackError::Decode(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StereoSample;

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("render.wav");

        let frames = vec![StereoSample::new(0.5, -0.5), StereoSample::new(1.0, 0.0)];
        write_wav(&path, &BackingTrack::new(frames.clone(), 44100)).unwrap();

        let spec = hound::WavReader::open(&path).unwrap().spec();
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.bits_per_sample, 32);
        assert_eq!(spec.sample_format, hound::SampleFormat::Float);

        let track = read_wav(&path).unwrap();
        assert_eq!(track.sample_rate(), 44100);
        assert_eq!(track.frames(), frames.as_slice());
    }

    #[test]
    fn test_read_int_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vocal.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 48000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        writer.write_sample(16384i16).unwrap();
        writer.write_sample(-16384i16).unwrap();
        writer.finalize().unwrap();

        let track = read_wav(&path).unwrap();
        assert_eq!(track.frame_count(), 2);
        assert!((track.frames()[0].left - 0.5).abs() < 1e-6);
        assert!((track.frames()[1].right + 0.5).abs() < 1e-6);
    }
}
