//! replay-render turns osu! replay files into overlay videos.
//!
//! A replay goes through a short, mostly pure pipeline before the only heavy step, the ffmpeg
//! encode, runs as an external process.
//!
//! # Pipeline overview
//!
//! 1. **Parse**: `.osr bytes -> ReplayPayload` (summary fields plus the compressed event stream)
//! 2. **Decode**: `compressed stream -> Vec<InputFrame>` through an external LZMA tool
//! 3. **Resample**: `frames -> Vec<Sample>` on the output frame cadence
//! 4. **Overlay**: `samples + summary -> OverlayScript` (ASS subtitles on a letterboxed playfield)
//! 5. **Encode**: burn the overlay into a solid base clip with the system `ffmpeg` binary
//!
//! Jobs wrapping that pipeline are processed one at a time by [`RenderQueue`], which persists
//! state through a [`JobStore`] and reports through [`RenderHooks`].
//!
//! Design constraints:
//!
//! - **No unsafe**: `unsafe` is forbidden in this crate.
//! - **Total parsing**: malformed replays produce errors, never panics.
//! - **Monotonic progress**: job progress never moves backwards.
#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![allow(missing_docs_in_private_items)]

mod config;
mod encode;
mod foundation;
mod overlay;
mod queue;
mod render;
mod replay;
mod timeline;

pub use config::{RendererMode, ServiceConfig, ServiceDirs, ToolPaths};
pub use encode::ffmpeg::{
    EncodeConfig, EncodeEffort, encode_overlay, escape_filter_path, is_ffmpeg_on_path,
    overlay_command, overlay_filter_graph, test_pattern_command,
};
pub use encode::process::{
    LineAccumulator, ProcessOpts, ProcessOutput, StreamKind, probe_tool, run_process,
};
pub use foundation::core::{
    Affine, Canvas, PLAYFIELD_HEIGHT, PLAYFIELD_WIDTH, Point, Rect, Vec2, ensure_dir,
    ensure_parent_dir,
};
pub use foundation::error::{RenderError, RenderResult};
pub use overlay::playfield::{PlayfieldGuides, PlayfieldMapping};
pub use overlay::script::{
    KEY_BINDINGS, KeyBinding, KeyPulse, OverlayEvent, OverlayInput, OverlayOptions,
    OverlayScript, OverlayStyle, format_ass_time, key_pulses, sanitize_ass_text,
};
pub use queue::job::{Job, JobFiles, JobStatus, LOG_RETENTION, LogEntry, StoredFile};
pub use queue::progress::{ProgressTracker, START_PROGRESS, progress_from_log_line};
pub use queue::store::{INTERRUPTED_ERROR, JobStore, JsonDirJobStore, MemoryJobStore};
pub use queue::worker::{QueueDirs, RenderQueue};
pub use render::mock::MockBackend;
pub use render::native::{NativeBackend, hud_lines};
pub use render::settings::{
    AdvancedRender, CursorSettings, GameplaySettings, OtherSettings, QUALITY_PRESETS,
    QualityPreset, RenderSettings, SkinSettings,
};
pub use render::template::{
    TemplateBackend, announced_video_path, base64_encode, quote_for_shell, replace_placeholders,
    settings_patch, template_context,
};
pub use render::{
    JobRuntime, OutputKind, RenderHooks, RenderOutput, Renderer, ReplayRenderer, RuntimeFiles,
    RuntimePaths, TEXT_CONTENT_TYPE, VIDEO_CONTENT_TYPE, extract_skin,
};
pub use replay::mods::{Discipline, HitCounts, accuracy, mode_name, mods_from_bitmask};
pub use replay::parse::{
    ReplayPayload, ReplaySummary, parse_payload, parse_summary, played_at_from_ticks,
    read_payload, read_summary,
};
pub use timeline::decode::{
    Decompressor, ExternalDecompressor, InputFrame, ToolCommand, ToolKind, decode_timeline,
    default_decompressors, parse_frames_text,
};
pub use timeline::resample::{
    DEFAULT_FPS, MAX_FPS, MAX_TIMELINE_MS, MIN_FPS, Sample, effective_fps, resample_frames,
};
