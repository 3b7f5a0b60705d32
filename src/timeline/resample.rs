use crate::foundation::error::{RenderError, RenderResult};
use crate::timeline::decode::InputFrame;

/// Output cadence used when none is requested.
pub const DEFAULT_FPS: u32 = 60;
/// Lowest accepted cadence.
pub const MIN_FPS: u32 = 10;
/// Highest accepted cadence.
pub const MAX_FPS: u32 = 240;
/// Longest timeline that is resampled, in ms (four hours).
pub const MAX_TIMELINE_MS: f64 = 4.0 * 60.0 * 60.0 * 1000.0;

/// A frame-shaped point on the fixed output cadence.
pub type Sample = InputFrame;

/// Map a requested frame rate onto the supported range; `0` means the default.
pub fn effective_fps(fps: u32) -> u32 {
    if fps == 0 {
        DEFAULT_FPS
    } else {
        fps.clamp(MIN_FPS, MAX_FPS)
    }
}

/// Resample irregular frames onto a `1000 / fps` ms grid.
///
/// Position is interpolated linearly between the surrounding frames; key state switches to the
/// next frame's keys once the sample is at least halfway there. The last sample always equals the
/// final input frame.
///
/// Timelines ending after [`MAX_TIMELINE_MS`], or at a non-finite time, are rejected as malformed.
pub fn resample_frames(frames: &[InputFrame], fps: u32) -> RenderResult<Vec<Sample>> {
    let Some(last) = frames.last().copied() else {
        return Ok(Vec::new());
    };
    if !last.time_ms.is_finite() || last.time_ms > MAX_TIMELINE_MS {
        return Err(RenderError::malformed(format!(
            "replay timeline is too long to render ({} ms, limit {} ms)",
            last.time_ms, MAX_TIMELINE_MS
        )));
    }
    let step = 1000.0 / f64::from(effective_fps(fps));
    let end = last.time_ms.max(0.0);

    let mut out = Vec::with_capacity((end / step) as usize + 2);
    let mut i = 0usize;
    let mut k = 0u64;
    loop {
        let t = k as f64 * step;
        if t > end {
            break;
        }
        while i + 1 < frames.len() && frames[i + 1].time_ms <= t {
            i += 1;
        }

        let a = frames[i];
        let mut sample = Sample { time_ms: t, ..a };
        if let Some(b) = frames.get(i + 1)
            && b.time_ms > a.time_ms
            && t > a.time_ms
        {
            let r = (t - a.time_ms) / (b.time_ms - a.time_ms);
            sample.x = a.x + (b.x - a.x) * r;
            sample.y = a.y + (b.y - a.y) * r;
            sample.keys = if r >= 0.5 { b.keys } else { a.keys };
        }
        out.push(sample);
        k += 1;
    }

    if out.last().is_none_or(|s| s.time_ms < last.time_ms) {
        out.push(last);
    }
    Ok(out)
}

#[cfg(test)]
#[path = "../../tests/unit/timeline/resample.rs"]
mod tests;
