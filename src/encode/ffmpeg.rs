use std::path::{Path, PathBuf};
use std::process::Command;

use crate::encode::process::{ProcessOpts, probe_tool, run_process};
use crate::foundation::core::ensure_parent_dir;
use crate::foundation::error::{RenderError, RenderResult};
use crate::overlay::playfield::{PlayfieldGuides, PlayfieldMapping};

/// Background colour of the synthetic base clip.
pub const BASE_CLIP_COLOR: &str = "0x11161e";

/// x264 speed/quality trade-off for a quality tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EncodeEffort {
    /// x264 `-preset`.
    pub preset: &'static str,
    /// Constant rate factor.
    pub crf: u8,
}

impl EncodeEffort {
    /// Effort for a quality key; unknown keys use the medium tier.
    pub fn for_quality(key: &str) -> Self {
        match key.to_ascii_lowercase().as_str() {
            "low" => Self {
                preset: "veryfast",
                crf: 25,
            },
            "high" => Self {
                preset: "medium",
                crf: 20,
            },
            "ultra" => Self {
                preset: "medium",
                crf: 18,
            },
            _ => Self {
                preset: "fast",
                crf: 22,
            },
        }
    }
}

/// Parameters of one overlay encode.
#[derive(Clone, Debug)]
pub struct EncodeConfig {
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Output frame rate.
    pub fps: u32,
    /// Clip length in ms.
    pub duration_ms: f64,
    /// Destination file.
    pub out_path: PathBuf,
    /// Encoder effort.
    pub effort: EncodeEffort,
    /// Encoder executable.
    pub program: PathBuf,
}

impl EncodeConfig {
    /// Check dimensions and frame rate before spawning anything.
    pub fn validate(&self) -> RenderResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(RenderError::validation(
                "encode width/height must be non-zero",
            ));
        }
        if self.fps == 0 {
            return Err(RenderError::validation("encode fps must be non-zero"));
        }
        if !self.width.is_multiple_of(2) || !self.height.is_multiple_of(2) {
            return Err(RenderError::validation(
                "encode width/height must be even (required for yuv420p mp4 output)",
            ));
        }
        if !self.duration_ms.is_finite() || self.duration_ms <= 0.0 {
            return Err(RenderError::validation("encode duration must be positive"));
        }
        Ok(())
    }

    /// `lavfi` source describing the solid-colour base clip.
    pub fn base_clip_source(&self) -> String {
        format!(
            "color=c={BASE_CLIP_COLOR}:s={}x{}:r={}:d={:.3}",
            self.width,
            self.height,
            self.fps,
            self.duration_ms / 1000.0
        )
    }
}

/// Return `true` when `program -version` runs.
pub fn is_ffmpeg_on_path(program: &Path) -> bool {
    probe_tool(program, &["-version"])
}

/// Escape a path for use inside a single-quoted filtergraph option.
pub fn escape_filter_path(path: &Path) -> String {
    let raw = path.to_string_lossy().replace('\\', "/");
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '\'' | ':' | '[' | ']' | ',' | ';') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Video filter chain: optional playfield guides, then the subtitle overlay.
pub fn overlay_filter_graph(
    mapping: &PlayfieldMapping,
    guides: Option<PlayfieldGuides>,
    ass_path: &Path,
) -> String {
    let mut filters = Vec::with_capacity(3);
    if let Some(g) = guides {
        filters.push(format!(
            "drawgrid=x={}:y={}:w={}:h={}:t=1:c=white@0.06",
            mapping.x(),
            mapping.y(),
            g.grid_step_x,
            g.grid_step_y
        ));
        filters.push(format!(
            "drawbox=x={}:y={}:w={}:h={}:color=0x8ec5ff@0.22:t={}",
            mapping.x(),
            mapping.y(),
            mapping.width(),
            mapping.height(),
            g.border
        ));
    }
    filters.push(format!("ass='{}'", escape_filter_path(ass_path)));
    filters.join(",")
}

/// Build the encoder command for `cfg` with the given filter chain.
pub fn overlay_command(cfg: &EncodeConfig, filter_graph: &str) -> Command {
    let mut cmd = Command::new(&cfg.program);
    cmd.args(["-y", "-f", "lavfi", "-i"])
        .arg(cfg.base_clip_source())
        .arg("-vf")
        .arg(filter_graph)
        .args(["-c:v", "libx264", "-preset", cfg.effort.preset, "-crf"])
        .arg(cfg.effort.crf.to_string())
        .args(["-pix_fmt", "yuv420p", "-movflags", "+faststart"])
        .arg(&cfg.out_path);
    cmd
}

/// Encode the base clip with `filter_graph` applied, streaming encoder output to `on_line`.
#[tracing::instrument(skip_all, fields(out = %cfg.out_path.display()))]
pub fn encode_overlay(
    cfg: &EncodeConfig,
    filter_graph: &str,
    on_line: &mut dyn FnMut(&str),
) -> RenderResult<()> {
    cfg.validate()?;
    ensure_parent_dir(&cfg.out_path)?;
    tracing::info!(
        width = cfg.width,
        height = cfg.height,
        fps = cfg.fps,
        preset = cfg.effort.preset,
        crf = cfg.effort.crf,
        "encoding overlay video"
    );
    run_process(
        &mut overlay_command(cfg, filter_graph),
        ProcessOpts::default(),
        on_line,
    )?;
    Ok(())
}

/// Build a command producing a `secs`-long `testsrc2` pattern clip.
pub fn test_pattern_command(
    program: &Path,
    width: u32,
    height: u32,
    fps: u32,
    secs: u32,
    out_path: &Path,
) -> Command {
    let mut cmd = Command::new(program);
    cmd.args(["-y", "-f", "lavfi", "-i"])
        .arg(format!("testsrc2=size={width}x{height}:rate={fps}"))
        .arg("-t")
        .arg(secs.to_string())
        .args(["-pix_fmt", "yuv420p"])
        .arg(out_path);
    cmd
}

#[cfg(test)]
#[path = "../../tests/unit/encode/ffmpeg.rs"]
mod tests;
