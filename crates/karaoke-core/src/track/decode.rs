//! Backing track decoding (Symphonia)

use std::fs::File;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::{BackingTrack, TrackError, TrackResult};

/// Decode any supported audio file (wav, flac, mp3, ogg) into a stereo track
pub fn decode_file(path: &Path) -> TrackResult<BackingTrack> {
    let file = File::open(path).map_err(|e| TrackError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| TrackError::UnsupportedFormat(e.to_string()))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| TrackError::UnsupportedFormat("No audio track found".to_string()))?;

    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate;
    let mut channels = track.codec_params.channels.map(|c| c.count());

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| TrackError::UnsupportedFormat(e.to_string()))?;

    let mut samples: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => {
                log::warn!("Error reading packet from {}: {}", path.display(), e);
                break;
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                log::warn!("Skipping undecodable packet in {}: {}", path.display(), e);
                continue;
            }
            Err(e) => return Err(TrackError::Decode(e.to_string())),
        };

        let spec = *decoded.spec();
        sample_rate.get_or_insert(spec.rate);
        channels.get_or_insert(spec.channels.count());

        let needs_buffer = sample_buf
            .as_ref()
            .map_or(true, |buf| buf.capacity() < decoded.capacity() * spec.channels.count());
        if needs_buffer {
            sample_buf = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
        }

        if let Some(buf) = sample_buf.as_mut() {
            buf.copy_interleaved_ref(decoded);
            samples.extend_from_slice(buf.samples());
        }
    }

    let sample_rate =
        sample_rate.ok_or_else(|| TrackError::UnsupportedFormat("Unknown sample rate".to_string()))?;
    let channels = channels.unwrap_or(2);

    let track = BackingTrack::from_interleaved(&samples, channels, sample_rate);
    if track.is_empty() {
        return Err(TrackError::Empty);
    }

    log::info!(
        "Decoded {}: {} frames, {} Hz, {} channel(s), {:.1}s",
        path.display(),
        track.frame_count(),
        sample_rate,
        channels,
        track.duration_seconds()
    );

    Ok(track)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::write_wav;
    use crate::types::StereoSample;

    #[test]
    fn test_decode_wav_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backing.wav");

        let frames: Vec<StereoSample> = (0..4800)
            .map(|i| StereoSample::new((i as f32 * 0.01).sin() * 0.5, -0.25))
            .collect();
        write_wav(&path, &BackingTrack::new(frames.clone(), 48000)).unwrap();

        let track = decode_file(&path).unwrap();
        assert_eq!(track.sample_rate(), 48000);
        assert_eq!(track.frame_count(), 4800);
        for (a, b) in frames.iter().zip(track.frames()) {
            assert!((a.left - b.left).abs() < 1e-6);
            assert!((a.right - b.right).abs() < 1e-6);
        }
    }

    #[test]
    fn test_decode_mono_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mono.wav");

        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 44100,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..1000 {
            writer.write_sample(i16::MAX / 2).unwrap();
        }
        writer.finalize().unwrap();

        let track = decode_file(&path).unwrap();
        assert_eq!(track.sample_rate(), 44100);
        assert_eq!(track.frame_count(), 1000);
        let s = track.frames()[500];
        assert!((s.left - 0.5).abs() < 1e-3);
        assert_eq!(s.left, s.right);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = decode_file(Path::new("/nonexistent/backing.wav")).unwrap_err();
        assert!(matches!(err, TrackError::Io { .. }));
    }

    #[test]
    fn test_garbage_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.wav");
        std::fs::write(&path, b"definitely not audio").unwrap();
        let err = decode_file(&path).unwrap_err();
        assert!(matches!(err, TrackError::UnsupportedFormat(_)));
    }
}
