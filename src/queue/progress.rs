use std::sync::LazyLock;

use regex::Regex;

/// Progress a job starts at once it is picked up.
pub const START_PROGRESS: f64 = 0.05;

// `None` only if a pattern fails to compile.
static PERCENT_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)\bProgress:\s*(\d{1,3})%").ok());
static ENCODING_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)Starting encoding!").ok());
static COMPOSING_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)Starting composing audio and video into one file").ok());
static FINISHED_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)Finished!\s*$|Video is available at:|\bFfmpeg finished\.").ok()
});

fn matches(re: &LazyLock<Option<Regex>>, line: &str) -> bool {
    re.as_ref().is_some_and(|re| re.is_match(line))
}

/// Infer progress from an external renderer's log line, or `None` when the line carries none.
///
/// `Progress: N%` maps onto `0.35..=0.95`; the remaining markers map to fixed stages.
pub fn progress_from_log_line(line: &str) -> Option<f64> {
    if let Some(caps) = PERCENT_RE.as_ref().and_then(|re| re.captures(line)) {
        let pct: f64 = caps[1].parse().ok()?;
        return Some(0.35 + pct.clamp(0.0, 100.0) / 100.0 * 0.6);
    }
    if matches(&ENCODING_RE, line) {
        return Some(0.4);
    }
    if matches(&COMPOSING_RE, line) {
        return Some(0.96);
    }
    if matches(&FINISHED_RE, line) {
        return Some(0.985);
    }
    None
}

/// Keeps reported progress monotonic within `[floor, ceiling]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProgressTracker {
    best: f64,
    ceiling: f64,
}

impl ProgressTracker {
    /// Start at `floor`; values are clamped to `[0, ceiling]`.
    pub fn new(floor: f64, ceiling: f64) -> Self {
        Self {
            best: floor,
            ceiling,
        }
    }

    /// Highest value accepted so far.
    pub fn best(&self) -> f64 {
        self.best
    }

    /// Record `value`; returns the new best when it moved forward.
    pub fn observe(&mut self, value: f64) -> Option<f64> {
        let bounded = if value.is_finite() {
            value.clamp(0.0, self.ceiling)
        } else {
            0.0
        };
        if bounded <= self.best {
            return None;
        }
        self.best = bounded;
        Some(bounded)
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new(START_PROGRESS, 1.0)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/queue/progress.rs"]
mod tests;
