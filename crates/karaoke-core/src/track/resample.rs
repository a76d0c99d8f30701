//! One-shot sample-rate conversion for backing tracks (rubato)

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use super::{BackingTrack, TrackError, TrackResult};
use crate::types::StereoSample;

/// Convert a whole track to `target_rate`
///
/// Runs the full track through a sinc resampler in a single chunk, flushes
/// the tail and drops the filter delay, so the output is time-aligned and
/// exactly `round(frames * target / source)` frames long.
pub fn resample(track: &BackingTrack, target_rate: u32) -> TrackResult<BackingTrack> {
    let source_rate = track.sample_rate();
    if source_rate == target_rate || track.is_empty() {
        return Ok(BackingTrack::new(track.frames().to_vec(), target_rate));
    }
    if source_rate == 0 || target_rate == 0 {
        return Err(TrackError::Resample(format!(
            "invalid rate conversion {} Hz -> {} Hz",
            source_rate, target_rate
        )));
    }

    let ratio = target_rate as f64 / source_rate as f64;
    let expected = (track.frame_count() as f64 * ratio).round() as usize;

    log::info!(
        "Resampling backing track from {} Hz to {} Hz ({} frames)",
        source_rate,
        target_rate,
        track.frame_count()
    );

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, track.frame_count(), 2)
        .map_err(|e| TrackError::Resample(e.to_string()))?;

    let waves_in = track.to_planar();
    let mut waves_out = resampler
        .process(&waves_in[..], None)
        .map_err(|e| TrackError::Resample(e.to_string()))?;
    let tail = resampler
        .process_partial(None::<&[Vec<f32>]>, None)
        .map_err(|e| TrackError::Resample(e.to_string()))?;
    for (channel, rest) in waves_out.iter_mut().zip(tail) {
        channel.extend(rest);
    }

    let delay = resampler.output_delay();
    let [left, right]: [Vec<f32>; 2] = waves_out
        .try_into()
        .map_err(|_| TrackError::Resample("resampler returned wrong channel count".to_string()))?;

    let mut frames: Vec<StereoSample> = left
        .into_iter()
        .zip(right)
        .skip(delay)
        .take(expected)
        .map(|(l, r)| StereoSample::new(l, r))
        .collect();
    frames.resize(expected, StereoSample::silence());

    Ok(BackingTrack::new(frames, target_rate))
}
