use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::LazyLock;

use base64::Engine as _;
use regex::Regex;
use serde_json::{Value, json};

use crate::encode::process::{ProcessOpts, run_process};
use crate::foundation::core::{ensure_parent_dir, round2};
use crate::foundation::error::{RenderError, RenderResult};
use crate::queue::progress::{ProgressTracker, progress_from_log_line};
use crate::render::settings::{QualityPreset, RenderSettings};
use crate::render::{Artifact, JobRuntime, RenderHooks};

/// Progress reported as soon as the command starts.
pub const TEMPLATE_START_PROGRESS: f64 = 0.35;
/// Highest progress the command itself can report.
pub const TEMPLATE_MAX_PROGRESS: f64 = 0.99;

static PLACEHOLDER_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([a-zA-Z0-9_]+)\s*\}\}").ok());
static VIDEO_PATH_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)Video is available at:\s*(.+?)\s*$").ok());

/// Substitute `{{ key }}` placeholders. Unknown keys become empty strings.
pub fn replace_placeholders(template: &str, context: &BTreeMap<String, String>) -> String {
    let Some(re) = PLACEHOLDER_RE.as_ref() else {
        return template.to_string();
    };
    re.replace_all(template, |caps: &regex::Captures<'_>| {
        context.get(&caps[1]).cloned().unwrap_or_default()
    })
    .into_owned()
}

/// Quote a value as a single shell word for the platform shell.
pub fn quote_for_shell(value: &str) -> String {
    if cfg!(windows) {
        format!("\"{}\"", value.replace('"', "\\\"").replace('%', "%%"))
    } else {
        format!("'{}'", value.replace('\'', "'\\''"))
    }
}

/// Standard base64 with padding.
pub fn base64_encode(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Settings overlay for the external renderer, derived from the job settings.
pub fn settings_patch(settings: &RenderSettings, preset: &QualityPreset) -> Value {
    let a = &settings.advanced_render;
    let mut cursor = json!({
        "EnableTrailGlow": a.cursor.trail_glow,
        "Colors": { "EnableRainbow": a.cursor.rainbow },
    });
    if !a.skin.use_skin_cursor
        && let Some(obj) = cursor.as_object_mut()
    {
        obj.insert("CursorRipples".into(), json!(a.cursor.ripples));
        obj.insert("CursorSize".into(), json!(a.cursor.size));
        obj.insert(
            "TrailMaxLength".into(),
            json!(if a.cursor.trail { 2000 } else { 0 }),
        );
    }

    json!({
        "Recording": {
            "FrameWidth": preset.width,
            "FrameHeight": preset.height,
            "FPS": preset.fps,
        },
        "Audio": {
            "MusicVolume": round2(settings.music_volume / 100.0),
            "SampleVolume": round2(settings.hitsound_volume / 100.0),
            "PlayNightcoreSamples": a.other.play_nightcore_hitsounds,
            "IgnoreBeatmapSamples": a.skin.use_skin_hitsounds,
            "IgnoreBeatmapSampleVolume": a.skin.use_skin_hitsounds,
        },
        "Gameplay": {
            "HitErrorMeter": {
                "Show": a.gameplay.show_hitbar,
                "ShowUnstableRate": a.gameplay.show_unstable_rate,
            },
            "AimErrorMeter": { "Show": a.gameplay.show_aim_error_meter },
            "Score": { "Show": a.gameplay.show_score },
            "HpBar": { "Show": a.gameplay.show_hp_bar },
            "ComboCounter": { "Show": a.gameplay.show_combo_counter },
            "PPCounter": { "Show": a.gameplay.show_pp_counter },
            "HitCounter": {
                "Show": a.gameplay.show_hit_counter,
                "ShowSliderBreaks": a.gameplay.show_slider_breaks,
            },
            "StrainGraph": { "Show": a.gameplay.show_strain_graph },
            "KeyOverlay": { "Show": a.gameplay.show_key_overlay },
            "ScoreBoard": {
                "Show": a.gameplay.show_leaderboard,
                "ShowAvatars": a.gameplay.show_leaderboard_avatars,
            },
            "Mods": { "Show": a.gameplay.show_mods },
            "Boundaries": { "Enabled": a.gameplay.show_boundaries },
            "ShowResultsScreen": a.gameplay.show_results_screen,
            "IgnoreFailsInReplays": a.other.ignore_replay_fail,
        },
        "Skin": {
            "Cursor": { "UseSkinCursor": a.skin.use_skin_cursor },
            "UseColorsFromSkin": a.skin.use_skin_combo_colors,
            "UseBeatmapColors": a.skin.use_beatmap_combo_colors,
        },
        "Objects": {
            "Colors": {
                "UseSkinComboColors": a.skin.use_skin_combo_colors,
                "UseBeatmapComboColors": a.skin.use_beatmap_combo_colors,
            },
        },
        "Cursor": cursor,
        "Playfield": {
            "SeizureWarning": { "Enabled": a.other.seizure_warning },
            "Background": {
                "LoadStoryboards": a.other.load_storyboards,
                "LoadVideos": a.other.load_videos,
                "Dim": {
                    "Intro": a.other.bg_dim_intro,
                    "Normal": a.other.bg_dim_normal,
                    "Breaks": a.other.bg_dim_breaks,
                },
                "Parallax": { "Enabled": a.other.bg_parallax },
            },
            "Logo": { "Enabled": a.other.show_danser_logo },
        },
    })
}

fn path_str(p: Option<&Path>) -> String {
    p.map(|p| p.to_string_lossy().into_owned()).unwrap_or_default()
}

/// Placeholder values for a job, each also available shell-quoted as `<key>_q`.
pub fn template_context(
    runtime: &JobRuntime,
    skin_dir: Option<&Path>,
) -> RenderResult<BTreeMap<String, String>> {
    let settings = &runtime.settings;
    let preset = settings.preset();
    let patch = serde_json::to_string(&settings_patch(settings, &preset))
        .map_err(|e| RenderError::serde(e.to_string()))?;
    let advanced = serde_json::to_string(&settings.advanced_render)
        .map_err(|e| RenderError::serde(e.to_string()))?;

    let raw: [(&str, String); 19] = [
        ("jobId", runtime.job_id.clone()),
        ("title", runtime.title.clone().unwrap_or_default()),
        ("replay", path_str(runtime.files.replay.as_deref())),
        ("skinZip", path_str(runtime.files.skin_zip.as_deref())),
        ("skinDir", path_str(skin_dir)),
        ("beatmap", path_str(runtime.files.beatmap.as_deref())),
        ("outputDir", path_str(Some(&runtime.paths.output_dir))),
        ("outputVideo", path_str(Some(&runtime.paths.output_video))),
        ("videoQuality", preset.key.to_string()),
        ("videoQualityLabel", preset.label.to_string()),
        ("videoWidth", preset.width.to_string()),
        ("videoHeight", preset.height.to_string()),
        ("videoFps", preset.fps.to_string()),
        ("musicVolume", settings.music_volume.to_string()),
        ("hitsoundVolume", settings.hitsound_volume.to_string()),
        ("danserJobSPatchB64", base64_encode(patch.as_bytes())),
        ("danserJobSPatchJson", patch),
        ("replayAdvancedSettingsJson", advanced),
        (
            "danserSkipIntro",
            if settings.advanced_render.other.skip_intro {
                "1"
            } else {
                "0"
            }
            .to_string(),
        ),
    ];

    let mut ctx = BTreeMap::new();
    for (key, value) in raw {
        ctx.insert(format!("{key}_q"), quote_for_shell(&value));
        ctx.insert(key.to_string(), value);
    }
    Ok(ctx)
}

/// Path announced by a `Video is available at: <path>` line, without surrounding quotes.
pub fn announced_video_path(line: &str) -> Option<PathBuf> {
    let caps = VIDEO_PATH_RE.as_ref()?.captures(line)?;
    let raw = caps[1].trim().trim_matches(|c| c == '"' || c == '\'');
    (!raw.is_empty()).then(|| PathBuf::from(raw))
}

fn shell_command(command: &str) -> Command {
    if cfg!(windows) {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", command]);
        cmd
    } else {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", command]);
        cmd
    }
}

/// Runs a configured shell command built from the job's placeholders.
pub struct TemplateBackend {
    template: String,
}

impl TemplateBackend {
    /// Use `template` as the command line.
    pub fn new(template: String) -> Self {
        Self { template }
    }

    pub(crate) fn run(
        &self,
        runtime: &JobRuntime,
        skin_dir: Option<&Path>,
        hooks: &mut dyn RenderHooks,
    ) -> RenderResult<Artifact> {
        if self.template.trim().is_empty() {
            return Err(RenderError::validation("RENDER_COMMAND_TEMPLATE is empty"));
        }
        let command = replace_placeholders(&self.template, &template_context(runtime, skin_dir)?);
        hooks.on_log("Running template renderer command");
        hooks.on_log(&command);

        let mut progress = ProgressTracker::new(TEMPLATE_START_PROGRESS, TEMPLATE_MAX_PROGRESS);
        hooks.on_progress(progress.best());
        let mut announced: Option<PathBuf> = None;

        let result = run_process(
            &mut shell_command(&command),
            ProcessOpts::default(),
            &mut |line| {
                hooks.on_log(line);
                if let Some(p) = announced_video_path(line) {
                    announced = Some(p);
                }
                if let Some(p) = progress_from_log_line(line).and_then(|v| progress.observe(v)) {
                    hooks.on_progress(p);
                }
            },
        );

        if let Err(err) = result {
            let Some(source) = announced.filter(|p| p.is_file()) else {
                return Err(err);
            };
            use anyhow::Context as _;
            ensure_parent_dir(&runtime.paths.output_video)?;
            std::fs::copy(&source, &runtime.paths.output_video).with_context(|| {
                format!("failed to recover video from '{}'", source.display())
            })?;
            tracing::warn!(error = %err, source = %source.display(), "template command failed after producing a video");
            hooks.on_log(&format!(
                "Template command failed after the video was produced; recovered it from {}",
                source.display()
            ));
            if let Some(p) = progress.observe(TEMPLATE_MAX_PROGRESS) {
                hooks.on_progress(p);
            }
        }

        hooks.on_progress(progress.best().max(TEMPLATE_MAX_PROGRESS));
        Ok(Artifact::Default)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/template.rs"]
mod tests;
