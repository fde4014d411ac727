//! WebVTT cue parsing.
//!
//! Converts raw subtitle text into an ordered list of timed cues. Parsing is
//! lenient: anything that is not a header, a time range, or cue text is
//! skipped rather than reported.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Format signature that opens a WebVTT file.
const HEADER_SIGNATURE: &str = "WEBVTT";

/// A single timed subtitle entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cue {
    /// Start time in seconds.
    pub start: f64,
    /// End time in seconds (never before `start`).
    pub end: f64,
    /// Cue text, lines joined with a single space.
    pub text: String,
}

/// `[[HH:]MM:SS.mmm] --> [[HH:]MM:SS.mmm]`, cue settings after the end time ignored.
fn time_range_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"^((?:\d+:)?\d{1,2}:\d{2}(?:[.,]\d+)?)\s*-->\s*((?:\d+:)?\d{1,2}:\d{2}(?:[.,]\d+)?)",
        )
        .expect("time range pattern is valid")
    })
}

/// Convert `HH:MM:SS.mmm` or `MM:SS.mmm` to seconds.
fn parse_timestamp(raw: &str) -> Option<f64> {
    let normalized = raw.replace(',', ".");
    let parts = normalized
        .split(':')
        .map(|p| p.parse::<f64>().ok())
        .collect::<Option<Vec<f64>>>()?;

    match parts.as_slice() {
        [h, m, s] => Some(h * 3600.0 + m * 60.0 + s),
        [m, s] => Some(m * 60.0 + s),
        _ => None,
    }
}

/// Cue being accumulated while walking the input.
struct OpenCue {
    start: f64,
    end: f64,
    lines: Vec<String>,
}

impl OpenCue {
    /// Emit the cue if it collected any text and its range is sane.
    fn finish(self, out: &mut Vec<Cue>) {
        if self.lines.is_empty() {
            return;
        }
        if self.end < self.start {
            tracing::debug!(
                "Skipping cue with inverted range {} --> {}",
                self.start,
                self.end
            );
            return;
        }
        out.push(Cue {
            start: self.start,
            end: self.end,
            text: self.lines.join(" "),
        });
    }
}

/// Parse WebVTT text into cues ordered by start time.
///
/// Never fails: malformed lines are skipped, and a time range that is not
/// followed by at least one text line produces no cue.
pub fn parse_cues(raw: &str) -> Vec<Cue> {
    let pattern = time_range_pattern();
    let mut cues = Vec::new();
    let mut current: Option<OpenCue> = None;

    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with(HEADER_SIGNATURE) {
            continue;
        }

        if let Some(caps) = pattern.captures(line) {
            if let Some(open) = current.take() {
                open.finish(&mut cues);
            }
            current = match (parse_timestamp(&caps[1]), parse_timestamp(&caps[2])) {
                (Some(start), Some(end)) => Some(OpenCue {
                    start,
                    end,
                    lines: Vec::new(),
                }),
                _ => None,
            };
        } else if let Some(open) = current.as_mut() {
            open.lines.push(line.to_string());
        }
    }

    if let Some(open) = current {
        open.finish(&mut cues);
    }

    // Stable, so cues sharing a start keep their input order.
    cues.sort_by(|a, b| a.start.total_cmp(&b.start));
    cues
}

/// Render cues as `[MM:SS] text` lines for the analysis prompt.
pub fn cues_to_transcript(cues: &[Cue]) -> String {
    cues.iter()
        .map(|cue| format!("[{}] {}", format_clock(cue.start), cue.text))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format seconds as zero-padded `MM:SS`; minutes are not wrapped into hours.
pub fn format_clock(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!("{:02}:{:02}", total / 60, total % 60)
}
