//! Time-synced lyrics
//!
//! Lyrics live in a JSON sidecar next to the backing track
//! (`song.wav` → `song.lyrics.json`). Two layouts are accepted:
//!
//! ```text
//! {"segments": [{"start": 1.0, "end": 3.5, "text": "..."}]}
//! {"lyrics_timestamped": [{"timestamp": 1.0, "text": "..."}]}
//! ```
//!
//! The second layout has no end times; each line is shown for
//! [`TIMESTAMPED_LINE_SECONDS`]. Plain `[MM:SS] text` files are handled by
//! [`parse_timestamped_text`].

mod convert;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use convert::{convert_text_file, parse_timestamped_text, INSTRUMENTAL_MARKERS};

/// Display duration for lines that only carry a start time
pub const TIMESTAMPED_LINE_SECONDS: f64 = 3.0;

/// Sidecar suffix appended to the track's file stem
pub const SIDECAR_SUFFIX: &str = ".lyrics.json";

/// Plain-text lyrics suffix appended to the track's file stem
pub const TEXT_SIDECAR_SUFFIX: &str = "_lyrics.txt";

/// Errors while loading lyrics
#[derive(Error, Debug)]
pub enum LyricsError {
    #[error("Failed to read lyrics {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid lyrics JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Lyrics contain no timed lines")]
    NoSegments,
}

pub type LyricsResult<T> = Result<T, LyricsError>;

/// One displayed line, active for `start <= t < end` (seconds)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LyricSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

impl LyricSegment {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }

    #[inline]
    pub fn contains(&self, seconds: f64) -> bool {
        self.start <= seconds && seconds < self.end
    }
}

/// The lines around a playback position
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LyricWindow<'a> {
    pub previous: Option<&'a LyricSegment>,
    pub current: Option<&'a LyricSegment>,
    pub next: Option<&'a LyricSegment>,
}

impl LyricWindow<'_> {
    /// Position is before the first line
    pub fn is_intro(&self) -> bool {
        self.current.is_none() && self.previous.is_none() && self.next.is_some()
    }

    /// Position is after the last line has ended
    pub fn is_outro(&self) -> bool {
        self.current.is_none() && self.next.is_none() && self.previous.is_some()
    }
}

#[derive(Deserialize)]
struct TimestampedLine {
    #[serde(default)]
    timestamp: f64,
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct LyricsFile {
    segments: Option<Vec<LyricSegment>>,
    lyrics_timestamped: Option<Vec<TimestampedLine>>,
}

#[derive(Serialize)]
struct SegmentsFile<'a> {
    segments: &'a [LyricSegment],
}

/// Lyric lines ordered by start time
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Lyrics {
    segments: Vec<LyricSegment>,
}

impl Lyrics {
    /// Build from segments in any order
    pub fn new(mut segments: Vec<LyricSegment>) -> Self {
        for segment in &mut segments {
            segment.text = segment.text.trim().to_string();
        }
        segments.sort_by(|a, b| a.start.total_cmp(&b.start));
        Self { segments }
    }

    /// Parse either JSON layout; `segments` wins when both are present
    pub fn from_json_str(json: &str) -> LyricsResult<Self> {
        let file: LyricsFile = serde_json::from_str(json)?;

        let segments = match (file.segments, file.lyrics_timestamped) {
            (Some(segments), _) => segments,
            (None, Some(lines)) => lines
                .into_iter()
                .map(|line| {
                    LyricSegment::new(line.timestamp, line.timestamp + TIMESTAMPED_LINE_SECONDS, line.text)
                })
                .collect(),
            (None, None) => Vec::new(),
        };

        if segments.is_empty() {
            return Err(LyricsError::NoSegments);
        }
        Ok(Self::new(segments))
    }

    /// Load a `.json` sidecar or a `[MM:SS] text` file
    pub fn load(path: &Path) -> LyricsResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| LyricsError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let lyrics = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("txt") => parse_timestamped_text(&contents),
            _ => Self::from_json_str(&contents)?,
        };
        if lyrics.is_empty() {
            return Err(LyricsError::NoSegments);
        }

        log::info!("Loaded {} lyric lines from {:?}", lyrics.len(), path);
        Ok(lyrics)
    }

    /// `<dir>/<stem>.lyrics.json` for a track path
    pub fn sidecar_path(track_path: &Path) -> PathBuf {
        Self::sibling(track_path, SIDECAR_SUFFIX)
    }

    /// First existing lyrics file for a track: JSON sidecar, then plain text
    pub fn find_sidecar(track_path: &Path) -> Option<PathBuf> {
        [SIDECAR_SUFFIX, TEXT_SIDECAR_SUFFIX]
            .into_iter()
            .map(|suffix| Self::sibling(track_path, suffix))
            .find(|path| path.is_file())
    }

    fn sibling(track_path: &Path, suffix: &str) -> PathBuf {
        let stem = track_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        track_path.with_file_name(format!("{}{}", stem, suffix))
    }

    pub fn segments(&self) -> &[LyricSegment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Index of the line active at `seconds`
    pub fn active_index(&self, seconds: f64) -> Option<usize> {
        self.segments.iter().position(|s| s.contains(seconds))
    }

    /// Previous, active and next lines at `seconds`
    ///
    /// Between lines (or before the first) `current` is `None` while
    /// `previous` and `next` still point at the surrounding lines.
    pub fn window_at(&self, seconds: f64) -> LyricWindow<'_> {
        if let Some(i) = self.active_index(seconds) {
            return LyricWindow {
                previous: i.checked_sub(1).map(|p| &self.segments[p]),
                current: Some(&self.segments[i]),
                next: self.segments.get(i + 1),
            };
        }

        let upcoming = self.segments.partition_point(|s| s.start <= seconds);
        LyricWindow {
            previous: upcoming.checked_sub(1).map(|p| &self.segments[p]),
            current: None,
            next: self.segments.get(upcoming),
        }
    }

    /// Serialize in the `segments` layout
    pub fn to_json_string(&self) -> LyricsResult<String> {
        Ok(serde_json::to_string_pretty(&SegmentsFile {
            segments: &self.segments,
        })?)
    }
}
