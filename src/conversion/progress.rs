//! Maps the fetch tool's output lines to a bounded, non-decreasing percentage.

use lazy_static::lazy_static;
use regex::Regex;

use super::events::ProgressUpdate;

pub const FETCH_MARKER: &str = "[download]";
pub const TRANSCODE_MARKERS: [&str; 2] = ["[ffmpeg]", "[ExtractAudio]"];

/// Progress reported right before the tool is launched.
pub const LAUNCH_PERCENT: u8 = 30;
const FETCH_SPAN: f64 = 60.0;
const FETCH_CAP: u8 = 90;
const TRANSCODE_STEP: u8 = 5;
const TRANSCODE_CAP: u8 = 95;

lazy_static! {
    static ref PERCENT: Regex = Regex::new(r"(\d+(?:\.\d+)?)%").unwrap();
}

/// Extracts the first `NN.N%` value from a line.
pub fn parse_percent(line: &str) -> Option<f64> {
    PERCENT
        .captures(line)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

#[derive(Debug)]
pub struct ProgressTracker {
    current: u8,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self {
            current: LAUNCH_PERCENT,
        }
    }
}

impl ProgressTracker {
    pub fn current(&self) -> u8 {
        self.current
    }

    /// Feeds one output line, returning an update when it moves progress forward.
    pub fn observe(&mut self, line: &str) -> Option<ProgressUpdate> {
        if line.contains(FETCH_MARKER) {
            let pct = parse_percent(line)?.clamp(0.0, 100.0);
            let mapped = (f64::from(LAUNCH_PERCENT) + pct * FETCH_SPAN / 100.0).floor() as u8;
            let next = mapped.min(FETCH_CAP);
            if next < self.current {
                return None;
            }
            self.current = next;
            return Some(ProgressUpdate::new(
                next,
                format!("Downloading... {:.1}%", pct),
            ));
        }

        if TRANSCODE_MARKERS.iter().any(|m| line.contains(m)) {
            self.current = (self.current + TRANSCODE_STEP).min(TRANSCODE_CAP);
            return Some(ProgressUpdate::new(self.current, "Converting to MP3..."));
        }

        None
    }
}
