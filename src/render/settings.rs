use serde_json::Value;

use crate::encode::ffmpeg::EncodeEffort;
use crate::foundation::core::{Canvas, clamp_or};

/// Output resolution and cadence tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QualityPreset {
    /// Stable key (`low`, `medium`, `high`, `ultra`).
    pub key: &'static str,
    /// Human-readable label.
    pub label: &'static str,
    /// Output width.
    pub width: u32,
    /// Output height.
    pub height: u32,
    /// Output frame rate.
    pub fps: u32,
}

/// All quality tiers, lowest first.
pub const QUALITY_PRESETS: [QualityPreset; 4] = [
    QualityPreset {
        key: "low",
        label: "720p / 30fps",
        width: 1280,
        height: 720,
        fps: 30,
    },
    QualityPreset {
        key: "medium",
        label: "1080p / 60fps",
        width: 1920,
        height: 1080,
        fps: 60,
    },
    QualityPreset {
        key: "high",
        label: "1440p / 60fps",
        width: 2560,
        height: 1440,
        fps: 60,
    },
    QualityPreset {
        key: "ultra",
        label: "4K / 60fps",
        width: 3840,
        height: 2160,
        fps: 60,
    },
];

const DEFAULT_QUALITY: usize = 1;

impl QualityPreset {
    /// Look up a tier by key (case-insensitive); unknown keys give `medium`.
    pub fn from_key(key: &str) -> Self {
        let key = key.trim().to_ascii_lowercase();
        QUALITY_PRESETS
            .iter()
            .find(|p| p.key == key)
            .copied()
            .unwrap_or(QUALITY_PRESETS[DEFAULT_QUALITY])
    }

    /// Output canvas.
    pub fn canvas(&self) -> Canvas {
        Canvas {
            width: self.width,
            height: self.height,
        }
    }

    /// Encoder effort for this tier.
    pub fn effort(&self) -> EncodeEffort {
        EncodeEffort::for_quality(self.key)
    }
}

impl Default for QualityPreset {
    fn default() -> Self {
        QUALITY_PRESETS[DEFAULT_QUALITY]
    }
}

/// Per-job render settings, clamped and defaulted on ingestion.
///
/// Deserialization never fails: numbers may arrive as numbers or numeric strings, booleans follow
/// truthiness, and anything missing or out of range falls back to its default.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase", from = "Value")]
pub struct RenderSettings {
    /// Quality tier key, always one of [`QUALITY_PRESETS`].
    pub video_quality: String,
    /// Music volume in percent (0-200).
    pub music_volume: f64,
    /// Hitsound volume in percent (0-200).
    pub hitsound_volume: f64,
    /// Overlay and external-renderer toggles.
    pub advanced_render: AdvancedRender,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self::from(Value::Null)
    }
}

impl From<Value> for RenderSettings {
    fn from(raw: Value) -> Self {
        Self {
            video_quality: QualityPreset::from_key(
                raw.get("videoQuality").and_then(Value::as_str).unwrap_or("medium"),
            )
            .key
            .to_string(),
            music_volume: ranged(raw.get("musicVolume"), 0.0, 200.0, 100.0),
            hitsound_volume: ranged(raw.get("hitsoundVolume"), 0.0, 200.0, 100.0),
            advanced_render: AdvancedRender::from_value(raw.get("advancedRender")),
        }
    }
}

impl RenderSettings {
    /// Resolved quality tier.
    pub fn preset(&self) -> QualityPreset {
        QualityPreset::from_key(&self.video_quality)
    }
}

/// Read a number or numeric string.
fn number(v: Option<&Value>) -> Option<f64> {
    match v? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn ranged(v: Option<&Value>, min: f64, max: f64, fallback: f64) -> f64 {
    number(v).map_or(fallback, |n| clamp_or(n, min, max, fallback))
}

fn truthy(v: Option<&Value>, fallback: bool) -> bool {
    match v {
        None | Some(Value::Null) => fallback,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_) | Value::Object(_)) => true,
    }
}

fn group<'a>(v: Option<&'a Value>, key: &str) -> Option<&'a Value> {
    v.and_then(|g| g.get(key))
}

/// Gameplay HUD toggles.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct GameplaySettings {
    pub show_hitbar: bool,
    pub show_unstable_rate: bool,
    pub show_score: bool,
    pub show_hp_bar: bool,
    pub show_combo_counter: bool,
    pub show_pp_counter: bool,
    pub show_key_overlay: bool,
    pub show_leaderboard: bool,
    pub show_leaderboard_avatars: bool,
    pub show_boundaries: bool,
    pub show_mods: bool,
    pub show_results_screen: bool,
    pub show_hit_counter: bool,
    pub show_slider_breaks: bool,
    pub show_aim_error_meter: bool,
    pub show_strain_graph: bool,
}

/// Skin usage toggles.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct SkinSettings {
    pub use_skin_cursor: bool,
    pub use_skin_hitsounds: bool,
    pub use_skin_combo_colors: bool,
    pub use_beatmap_combo_colors: bool,
}

/// Cursor appearance.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorSettings {
    /// Click ripples.
    pub ripples: bool,
    /// Cursor trail.
    pub trail: bool,
    /// Size relative to default, 25-300.
    pub size_percent: u32,
    /// Absolute size derived from `size_percent`, 2-64.
    pub size: u32,
    /// Rainbow colouring.
    pub rainbow: bool,
    /// Trail glow.
    pub trail_glow: bool,
}

/// Background, intro and miscellaneous toggles.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct OtherSettings {
    pub seizure_warning: bool,
    pub load_storyboards: bool,
    pub load_videos: bool,
    pub skip_intro: bool,
    pub bg_dim_intro: f64,
    pub bg_dim_normal: f64,
    pub bg_dim_breaks: f64,
    pub bg_parallax: bool,
    pub show_danser_logo: bool,
    pub play_nightcore_hitsounds: bool,
    pub ignore_replay_fail: bool,
}

/// The full advanced settings bundle.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase", from = "Value")]
pub struct AdvancedRender {
    /// HUD toggles.
    pub gameplay: GameplaySettings,
    /// Skin toggles.
    pub skin: SkinSettings,
    /// Cursor appearance.
    pub cursor: CursorSettings,
    /// Everything else.
    pub other: OtherSettings,
}

impl Default for AdvancedRender {
    fn default() -> Self {
        Self::from_value(None)
    }
}

impl From<Value> for AdvancedRender {
    fn from(raw: Value) -> Self {
        Self::from_value(Some(&raw))
    }
}

impl AdvancedRender {
    fn from_value(raw: Option<&Value>) -> Self {
        let g = group(raw, "gameplay");
        let s = group(raw, "skin");
        let c = group(raw, "cursor");
        let o = group(raw, "other");
        let gb = |k: &str, d: bool| truthy(group(g, k), d);
        let sb = |k: &str, d: bool| truthy(group(s, k), d);
        let cb = |k: &str, d: bool| truthy(group(c, k), d);
        let ob = |k: &str, d: bool| truthy(group(o, k), d);

        let size_percent = cursor_size_percent(c);
        let size = clamp_or(12.0 * f64::from(size_percent) / 100.0, 2.0, 64.0, 12.0).round() as u32;

        Self {
            gameplay: GameplaySettings {
                show_hitbar: gb("showHitbar", true),
                show_unstable_rate: gb("showUnstableRate", true),
                show_score: gb("showScore", true),
                show_hp_bar: gb("showHpBar", true),
                show_combo_counter: gb("showComboCounter", true),
                show_pp_counter: gb("showPpCounter", true),
                show_key_overlay: gb("showKeyOverlay", true),
                show_leaderboard: gb("showLeaderboard", true),
                show_leaderboard_avatars: gb("showLeaderboardAvatars", false),
                show_boundaries: gb("showBoundaries", true),
                show_mods: gb("showMods", true),
                show_results_screen: gb("showResultsScreen", true),
                show_hit_counter: gb("showHitCounter", true),
                show_slider_breaks: gb("showSliderBreaks", false),
                show_aim_error_meter: gb("showAimErrorMeter", false),
                show_strain_graph: gb("showStrainGraph", true),
            },
            skin: SkinSettings {
                use_skin_cursor: sb("useSkinCursor", false),
                use_skin_hitsounds: sb("useSkinHitsounds", false),
                use_skin_combo_colors: sb("useSkinComboColors", false),
                use_beatmap_combo_colors: sb("useBeatmapComboColors", false),
            },
            cursor: CursorSettings {
                ripples: cb("ripples", false),
                trail: cb("trail", true),
                size_percent,
                size,
                rainbow: cb("rainbow", true),
                trail_glow: cb("trailGlow", true),
            },
            other: OtherSettings {
                seizure_warning: ob("seizureWarning", true),
                load_storyboards: ob("loadStoryboards", true),
                load_videos: ob("loadVideos", false),
                skip_intro: ob("skipIntro", false),
                bg_dim_intro: ranged(group(o, "bgDimIntro"), 0.0, 1.0, 0.0),
                bg_dim_normal: ranged(group(o, "bgDimNormal"), 0.0, 1.0, 0.95),
                bg_dim_breaks: ranged(group(o, "bgDimBreaks"), 0.0, 1.0, 0.5),
                bg_parallax: ob("bgParallax", true),
                show_danser_logo: ob("showDanserLogo", true),
                play_nightcore_hitsounds: ob("playNightcoreHitsounds", true),
                ignore_replay_fail: ob("ignoreReplayFail", false),
            },
        }
    }
}

/// Cursor size in percent. Older records only carry an absolute `size` (default 12).
fn cursor_size_percent(cursor: Option<&Value>) -> u32 {
    if let Some(pct) = group(cursor, "sizePercent").filter(|v| !v.is_null()) {
        return ranged(Some(pct), 25.0, 300.0, 100.0).round() as u32;
    }
    if let Some(size) = group(cursor, "size").filter(|v| !v.is_null()) {
        let legacy = ranged(Some(size), 2.0, 64.0, 12.0);
        return clamp_or(legacy / 12.0 * 100.0, 25.0, 300.0, 100.0).round() as u32;
    }
    100
}

#[cfg(test)]
#[path = "../../tests/unit/render/settings.rs"]
mod tests;
