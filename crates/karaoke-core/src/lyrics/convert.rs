//! `[MM:SS] text` lyrics conversion
//!
//! Each timed line starts at its timestamp and ends where the next line
//! starts; the last line gets [`TIMESTAMPED_LINE_SECONDS`].

use std::path::{Path, PathBuf};

use super::{LyricSegment, Lyrics, LyricsError, LyricsResult, SIDECAR_SUFFIX, TEXT_SIDECAR_SUFFIX, TIMESTAMPED_LINE_SECONDS};

/// Lines with only one of these words are instrumental breaks, not lyrics
pub const INSTRUMENTAL_MARKERS: [&str; 3] = ["müzik", "music", "instrumental"];

/// Parse `[MM:SS]` or `[MM:SS.ff]` at the start of a line
///
/// Returns the time in seconds and the remaining text. Fractional digits
/// are a decimal fraction of a second (`.5` = 500 ms, `.25` = 250 ms).
fn parse_line(line: &str) -> Option<(f64, &str)> {
    let rest = line.strip_prefix('[')?;
    let (stamp, text) = rest.split_once(']')?;
    let (minutes, seconds) = stamp.split_once(':')?;

    let two_digits = |s: &str| s.len() == 2 && s.bytes().all(|b| b.is_ascii_digit());
    let (whole, fraction) = match seconds.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (seconds, None),
    };
    if !two_digits(minutes) || !two_digits(whole) {
        return None;
    }

    let mut time = minutes.parse::<f64>().ok()? * 60.0 + whole.parse::<f64>().ok()?;
    if let Some(fraction) = fraction {
        if fraction.is_empty() || !fraction.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        time += format!("0.{}", fraction).parse::<f64>().ok()?;
    }

    Some((time, text.trim()))
}

fn is_instrumental(text: &str) -> bool {
    let lower = text.to_lowercase();
    INSTRUMENTAL_MARKERS.contains(&lower.as_str())
}

/// Convert timestamped text to lyrics
///
/// Untimed lines, empty lines and instrumental markers are skipped.
pub fn parse_timestamped_text(text: &str) -> Lyrics {
    let timed: Vec<(f64, &str)> = text
        .lines()
        .filter_map(|line| parse_line(line.trim()))
        .filter(|(_, text)| !text.is_empty() && !is_instrumental(text))
        .collect();

    let segments = timed
        .iter()
        .enumerate()
        .map(|(i, &(start, text))| {
            let end = timed
                .get(i + 1)
                .map_or(start + TIMESTAMPED_LINE_SECONDS, |&(next, _)| next);
            LyricSegment::new(start, end, text)
        })
        .collect();

    Lyrics::new(segments)
}

/// Convert a `[MM:SS]` text file into a JSON sidecar
///
/// Without `output`, `song_lyrics.txt` becomes `song.lyrics.json` so the
/// result sits where [`Lyrics::find_sidecar`] looks for `song.wav`.
pub fn convert_text_file(path: &Path, output: Option<&Path>) -> LyricsResult<PathBuf> {
    let contents = std::fs::read_to_string(path).map_err(|source| LyricsError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let lyrics = parse_timestamped_text(&contents);
    if lyrics.is_empty() {
        log::warn!("No timed lyrics found in {:?}", path);
        return Err(LyricsError::NoSegments);
    }

    let output = match output {
        Some(output) => output.to_path_buf(),
        None => {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let stem = name
                .strip_suffix(TEXT_SIDECAR_SUFFIX)
                .or_else(|| name.strip_suffix(".txt"))
                .unwrap_or(&name);
            path.with_file_name(format!("{}{}", stem, SIDECAR_SUFFIX))
        }
    };

    std::fs::write(&output, lyrics.to_json_string()?).map_err(|source| LyricsError::Io {
        path: output.clone(),
        source,
    })?;

    if let Some(last) = lyrics.segments().last() {
        log::info!(
            "Converted {} lyric lines ({:.1}s) to {:?}",
            lyrics.len(),
            last.end,
            output
        );
    }
    Ok(output)
}
