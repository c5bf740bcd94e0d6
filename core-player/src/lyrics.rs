//! # Lyric Synchronization
//!
//! Parses LRC-format lyric text into a sorted line table and maps playback
//! progress to the active line. Progress is monotonic during normal
//! playback, so the synchronizer only scans forward from the previous
//! active line; a backward jump (seek) triggers a full rescan from zero.

use crate::error::{PlayerError, Result};
use std::cmp::Ordering;

/// A single timestamped lyric line.
#[derive(Debug, Clone, PartialEq)]
pub struct LyricLine {
    pub timestamp_secs: f64,
    pub text: String,
}

/// Parse LRC text into lines sorted ascending by timestamp.
///
/// Handles multiple time tags per line (`[00:12.00][00:45.00]chorus`) and
/// skips metadata tags (`[ar:...]`, `[ti:...]`) and untagged lines.
///
/// # Errors
///
/// Returns [`PlayerError::EmptyLyrics`] when no timestamped line survives
/// parsing.
pub fn parse_lrc(text: &str) -> Result<Vec<LyricLine>> {
    let mut lines = Vec::new();

    for raw in text.lines() {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }

        let mut rest = raw;
        let mut stamps = Vec::new();
        while rest.starts_with('[') {
            let Some(end) = rest.find(']') else { break };
            if let Some(secs) = parse_timestamp(&rest[1..end]) {
                stamps.push(secs);
            }
            rest = &rest[end + 1..];
        }

        if stamps.is_empty() {
            continue;
        }

        let content = rest.trim();
        for timestamp_secs in stamps {
            lines.push(LyricLine {
                timestamp_secs,
                text: content.to_string(),
            });
        }
    }

    if lines.is_empty() {
        return Err(PlayerError::EmptyLyrics);
    }

    lines.sort_by(|a, b| {
        a.timestamp_secs
            .partial_cmp(&b.timestamp_secs)
            .unwrap_or(Ordering::Equal)
    });
    Ok(lines)
}

/// Parse a `mm:ss` / `mm:ss.xx` tag body into seconds. Non-numeric tags
/// (metadata) return `None`.
fn parse_timestamp(tag: &str) -> Option<f64> {
    let (minutes, seconds) = tag.split_once(':')?;
    let minutes: f64 = minutes.trim().parse().ok()?;
    let seconds: f64 = seconds.trim().parse().ok()?;
    if minutes < 0.0 || seconds < 0.0 {
        return None;
    }
    Some(minutes * 60.0 + seconds)
}

/// Maps playback progress to the active lyric line.
///
/// The active index is the greatest `i` with `line[i].timestamp ≤ progress`,
/// or `None` while progress is before the first line. A new value is only
/// reported when it differs from the previous one.
pub struct LyricSynchronizer {
    lines: Vec<LyricLine>,
    active: Option<usize>,
    error: Option<String>,
}

impl LyricSynchronizer {
    pub fn new() -> Self {
        Self {
            lines: Vec::new(),
            active: None,
            error: None,
        }
    }

    pub fn lines(&self) -> &[LyricLine] {
        &self.lines
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active
    }

    /// Component-local parse error from the last `load_text`, if any.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Load lyric text for a new track and compute the initial active line
    /// for the given progress (a full scan from zero).
    ///
    /// Empty text clears the table. Parse failures clear the table and set
    /// the component-local error flag; they never surface anywhere else.
    pub fn load_text(&mut self, text: &str, progress: f64) {
        self.active = None;
        self.error = None;

        if text.trim().is_empty() {
            self.lines = Vec::new();
            return;
        }

        match parse_lrc(text) {
            Ok(lines) => {
                self.lines = lines;
                self.active = self.scan_from(0, progress);
            }
            Err(e) => {
                self.lines = Vec::new();
                self.error = Some(e.to_string());
            }
        }
    }

    /// Drop the table (track changed, lyrics not yet loaded).
    pub fn clear(&mut self) {
        self.lines = Vec::new();
        self.active = None;
        self.error = None;
    }

    /// Feed a progress sample. Returns `Some(new_active)` only when the
    /// active line changed.
    pub fn on_progress(&mut self, progress: f64) -> Option<Option<usize>> {
        if self.lines.is_empty() {
            return None;
        }

        let new = match self.active {
            // Seek backwards: full rescan
            Some(a) if progress < self.lines[a].timestamp_secs => self.scan_from(0, progress),
            // Normal monotonic tick: scan forward only
            Some(a) => self.scan_from(a + 1, progress),
            None => self.scan_from(0, progress),
        };

        if new != self.active {
            self.active = new;
            Some(new)
        } else {
            None
        }
    }

    /// Greatest index with timestamp ≤ progress, scanning from `start` with
    /// `start - 1` as the running candidate.
    fn scan_from(&self, start: usize, progress: f64) -> Option<usize> {
        let mut active = start.checked_sub(1);
        for (i, line) in self.lines.iter().enumerate().skip(start) {
            if line.timestamp_secs <= progress {
                active = Some(i);
            } else {
                break;
            }
        }
        active
    }
}

impl Default for LyricSynchronizer {
    fn default() -> Self {
        Self::new()
    }
}
