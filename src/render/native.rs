use std::path::PathBuf;
use std::sync::Arc;

use crate::encode::ffmpeg::{EncodeConfig, encode_overlay, is_ffmpeg_on_path, overlay_filter_graph};
use crate::foundation::error::{RenderError, RenderResult};
use crate::overlay::playfield::PlayfieldMapping;
use crate::overlay::script::{OverlayInput, OverlayOptions, OverlayScript};
use crate::render::settings::QualityPreset;
use crate::render::{Artifact, JobRuntime, RenderHooks};
use crate::replay::parse::{ReplaySummary, read_payload};
use crate::timeline::decode::{Decompressor, decode_timeline};
use crate::timeline::resample::resample_frames;

/// File name of the generated overlay inside the work directory.
pub const OVERLAY_FILE_NAME: &str = "replay-overlay.ass";
/// Shortest video produced, in ms.
pub const MIN_VIDEO_MS: f64 = 3000.0;
/// Time kept after the last sample, in ms.
pub const TAIL_MS: f64 = 900.0;

/// Replay decode, overlay generation and ffmpeg encode.
pub struct NativeBackend {
    ffmpeg: PathBuf,
    decompressor: Arc<dyn Decompressor>,
}

impl NativeBackend {
    /// Use `ffmpeg` for encoding and `decompressor` for the input stream.
    pub fn new(ffmpeg: PathBuf, decompressor: Arc<dyn Decompressor>) -> Self {
        Self {
            ffmpeg,
            decompressor,
        }
    }

    pub(crate) fn run(
        &self,
        runtime: &JobRuntime,
        hooks: &mut dyn RenderHooks,
    ) -> RenderResult<Artifact> {
        let replay_path = runtime
            .files
            .replay
            .as_deref()
            .ok_or_else(|| RenderError::validation("replay file is missing"))?;

        if !is_ffmpeg_on_path(&self.ffmpeg) {
            return Err(RenderError::external(format!(
                "ffmpeg is required for native replay rendering but '{}' was not found",
                self.ffmpeg.display()
            )));
        }
        hooks.on_progress(0.15);

        let payload = read_payload(replay_path)?;
        let summary = &payload.summary;
        hooks.on_log(&format!(
            "Native renderer: parsed replay payload ({}, {})",
            summary.mode_name,
            if summary.player_name.is_empty() {
                "unknown"
            } else {
                &summary.player_name
            }
        ));
        hooks.on_progress(0.25);

        let frames = decode_timeline(
            &payload.compressed_frames,
            &runtime.paths.work_dir,
            self.decompressor.as_ref(),
            &mut |line| hooks.on_log(line),
        )?;
        if frames.len() < 2 {
            return Err(RenderError::malformed(
                "replay has too few frames to render video",
            ));
        }
        hooks.on_log(&format!(
            "Native renderer: decoded {} timeline frames",
            frames.len()
        ));
        hooks.on_progress(0.4);

        let preset = runtime.settings.preset();
        let advanced = &runtime.settings.advanced_render;
        let samples = resample_frames(&frames, preset.fps)?;
        let last_ms = samples
            .last()
            .or(frames.last())
            .map_or(0.0, |s| s.time_ms);
        let duration_ms = MIN_VIDEO_MS.max(last_ms + TAIL_MS);

        let hud = hud_lines(runtime.title.as_deref(), summary, &preset);
        let script = OverlayScript::build(
            &OverlayInput {
                canvas: preset.canvas(),
                duration_ms,
                samples: &samples,
                raw_frames: &frames,
                hud_lines: &hud,
            },
            &OverlayOptions {
                show_key_overlay: advanced.gameplay.show_key_overlay,
                cursor_size_percent: advanced.cursor.size_percent,
            },
        );

        let ass_path = runtime.paths.work_dir.join(OVERLAY_FILE_NAME);
        {
            use anyhow::Context as _;
            std::fs::write(&ass_path, script.to_ass())
                .with_context(|| format!("failed to write overlay '{}'", ass_path.display()))?;
        }
        hooks.on_log(&format!(
            "Native renderer: ASS overlay generated ({} samples)",
            samples.len()
        ));
        hooks.on_progress(0.55);

        let mapping = PlayfieldMapping::new(preset.canvas());
        let guides = advanced
            .gameplay
            .show_boundaries
            .then(|| mapping.guides());
        let filter_graph = overlay_filter_graph(&mapping, guides, &ass_path);

        hooks.on_log("Native renderer: encoding video with ffmpeg");
        hooks.on_progress(0.65);
        encode_overlay(
            &EncodeConfig {
                width: preset.width,
                height: preset.height,
                fps: preset.fps,
                duration_ms,
                out_path: runtime.paths.output_video.clone(),
                effort: preset.effort(),
                program: self.ffmpeg.clone(),
            },
            &filter_graph,
            &mut |line| hooks.on_log(line),
        )?;
        hooks.on_progress(0.98);
        hooks.on_log("Native renderer: video file created");
        Ok(Artifact::Default)
    }
}

/// The three HUD lines: title and player, mode/mods/accuracy, score/combo/quality.
pub fn hud_lines(
    title: Option<&str>,
    summary: &ReplaySummary,
    preset: &QualityPreset,
) -> Vec<String> {
    let player = if summary.player_name.is_empty() {
        "Unknown player"
    } else {
        &summary.player_name
    };
    let first = match title.filter(|t| !t.is_empty()) {
        Some(t) => format!("{t} | {player}"),
        None => player.to_string(),
    };
    let mods = if summary.mods.is_empty() {
        "NM".to_string()
    } else {
        summary.mods.concat()
    };
    let accuracy = summary
        .accuracy
        .map_or_else(|| "accuracy n/a".to_string(), |a| format!("{a:.2}%"));
    vec![
        first,
        format!("{} | {mods} | {accuracy}", summary.mode_name),
        format!(
            "Score {} | Combo {}x | {}",
            summary.score, summary.max_combo, preset.label
        ),
    ]
}

#[cfg(test)]
#[path = "../../tests/unit/render/native.rs"]
mod tests;
