use std::path::Path;

use crate::foundation::error::{RenderError, RenderResult};

pub use kurbo::{Affine, Point, Rect, Vec2};

/// Width of the logical playfield that replay cursor positions are expressed in.
pub const PLAYFIELD_WIDTH: f64 = 512.0;
/// Height of the logical playfield that replay cursor positions are expressed in.
pub const PLAYFIELD_HEIGHT: f64 = 384.0;

/// Output canvas dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Canvas {
    /// Create a validated canvas with non-zero dimensions.
    pub fn new(width: u32, height: u32) -> RenderResult<Self> {
        if width == 0 || height == 0 {
            return Err(RenderError::validation("canvas width/height must be non-zero"));
        }
        Ok(Self { width, height })
    }
}

/// Clamp `value` into `[min, max]`, returning `fallback` for NaN/infinite input.
pub fn clamp_or(value: f64, min: f64, max: f64, fallback: f64) -> f64 {
    if !value.is_finite() {
        return fallback;
    }
    value.clamp(min, max)
}

/// Round to two decimals the way `Number(x.toFixed(2))` does.
///
/// The decision is made on the exact binary value with exact ties going up, so `0.125` gives
/// `0.13` while `2.675` (stored just below the tie) gives `2.67`.
pub fn round2(value: f64) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let exact = format!("{:.40}", value.abs());
    let Some((whole, frac)) = exact.split_once('.') else {
        return value;
    };
    let Ok(whole) = whole.parse::<f64>() else {
        return value;
    };
    let digits: Vec<u8> = frac.bytes().take(3).map(|b| b - b'0').collect();
    let [tenths, hundredths, rest] = digits[..] else {
        return value;
    };
    let mut cents = whole * 100.0 + f64::from(tenths * 10 + hundredths);
    if rest >= 5 {
        cents += 1.0;
    }
    (cents / 100.0).copysign(value)
}

/// Create `dir` and all of its parents.
pub fn ensure_dir(dir: &Path) -> RenderResult<()> {
    use anyhow::Context as _;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create directory '{}'", dir.display()))?;
    Ok(())
}

/// Ensure the parent directory of `path` exists.
pub fn ensure_parent_dir(path: &Path) -> RenderResult<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
