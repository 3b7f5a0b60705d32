//! Render backends and the job-level entry point.
//!
//! [`ReplayRenderer`] is what the queue calls for each job: it prepares the job directories,
//! unpacks an uploaded skin, runs the configured backend and turns whatever artifact it produced
//! into a [`RenderOutput`] descriptor.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{RendererMode, ServiceConfig};
use crate::foundation::core::ensure_dir;
use crate::foundation::error::{RenderError, RenderResult};
use crate::timeline::decode::{Decompressor, ExternalDecompressor};

/// Mock backend.
pub mod mock;
/// Built-in overlay pipeline.
pub mod native;
/// Quality presets and per-job settings.
pub mod settings;
/// External command backend.
pub mod template;

use settings::RenderSettings;

/// MIME type of video results.
pub const VIDEO_CONTENT_TYPE: &str = "video/mp4";
/// MIME type of text results.
pub const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Callbacks a renderer reports through while it runs.
pub trait RenderHooks {
    /// One user-facing log line.
    fn on_log(&mut self, line: &str);
    /// Progress in `[0, 1]`. Callers may report out of order; consumers keep the maximum.
    fn on_progress(&mut self, fraction: f64);
}

/// Input files of a job.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RuntimeFiles {
    /// Replay file (required by the native backend).
    pub replay: Option<PathBuf>,
    /// Uploaded skin archive.
    pub skin_zip: Option<PathBuf>,
    /// Beatmap archive.
    pub beatmap: Option<PathBuf>,
}

/// Job-scoped directories and artifact paths.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuntimePaths {
    /// Scratch directory.
    pub work_dir: PathBuf,
    /// Result directory.
    pub output_dir: PathBuf,
    /// Expected video artifact.
    pub output_video: PathBuf,
    /// Expected text fallback artifact.
    pub output_text: PathBuf,
}

impl RuntimePaths {
    /// Standard layout: `<temp>/<id>` and `<output>/<id>/render.{mp4,txt}`.
    pub fn for_job(temp_root: &Path, output_root: &Path, job_id: &str) -> Self {
        let output_dir = output_root.join(job_id);
        Self {
            work_dir: temp_root.join(job_id),
            output_video: output_dir.join("render.mp4"),
            output_text: output_dir.join("render.txt"),
            output_dir,
        }
    }
}

/// Everything a backend needs to render one job.
#[derive(Clone, Debug, PartialEq)]
pub struct JobRuntime {
    /// Job id.
    pub job_id: String,
    /// Optional job title, shown in the HUD.
    pub title: Option<String>,
    /// Input files.
    pub files: RuntimeFiles,
    /// Output locations.
    pub paths: RuntimePaths,
    /// Validated settings.
    pub settings: RenderSettings,
}

/// Kind of artifact a render produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    /// An MP4 video.
    Video,
    /// A text placeholder.
    Text,
}

/// Result descriptor of a successful render.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderOutput {
    /// Artifact kind.
    pub kind: OutputKind,
    /// Full path of the artifact.
    pub file_path: PathBuf,
    /// File name for downloads.
    pub file_name: String,
    /// MIME type.
    pub content_type: String,
}

impl RenderOutput {
    /// Descriptor of a video artifact.
    pub fn video(path: &Path) -> Self {
        Self::new(OutputKind::Video, path, VIDEO_CONTENT_TYPE)
    }

    /// Descriptor of a text artifact.
    pub fn text(path: &Path) -> Self {
        Self::new(OutputKind::Text, path, TEXT_CONTENT_TYPE)
    }

    fn new(kind: OutputKind, path: &Path, content_type: &str) -> Self {
        Self {
            kind,
            file_path: path.to_path_buf(),
            file_name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            content_type: content_type.to_string(),
        }
    }
}

/// Anything that can turn a job runtime into a result.
pub trait Renderer: Send + Sync {
    /// Render one job, reporting through `hooks`.
    fn render(&self, runtime: &JobRuntime, hooks: &mut dyn RenderHooks)
    -> RenderResult<RenderOutput>;
}

/// Where a backend left its artifact.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Artifact {
    /// Whatever exists at the runtime's video or text path.
    Default,
    /// A text artifact at a backend-chosen path.
    Text(PathBuf),
}

enum Backend {
    Native(native::NativeBackend),
    Template(template::TemplateBackend),
    Mock(mock::MockBackend),
}

/// Dispatches jobs to the configured backend.
pub struct ReplayRenderer {
    backend: Backend,
}

impl ReplayRenderer {
    /// Build the backend selected by `cfg.renderer_mode`.
    pub fn from_config(cfg: &ServiceConfig) -> Self {
        let decompressor: Arc<dyn Decompressor> =
            Arc::new(ExternalDecompressor::new(cfg.tools.decompressors.clone()));
        let backend = match cfg.renderer_mode {
            RendererMode::Native => Backend::Native(native::NativeBackend::new(
                cfg.tools.ffmpeg.clone(),
                decompressor,
            )),
            RendererMode::Template => Backend::Template(template::TemplateBackend::new(
                cfg.render_command_template.clone(),
            )),
            RendererMode::Mock => Backend::Mock(mock::MockBackend::new(cfg.tools.ffmpeg.clone())),
        };
        Self { backend }
    }

    /// Native backend with an explicit decompressor.
    pub fn native(ffmpeg: PathBuf, decompressor: Arc<dyn Decompressor>) -> Self {
        Self {
            backend: Backend::Native(native::NativeBackend::new(ffmpeg, decompressor)),
        }
    }

    /// Active mode.
    pub fn mode(&self) -> RendererMode {
        match self.backend {
            Backend::Native(_) => RendererMode::Native,
            Backend::Template(_) => RendererMode::Template,
            Backend::Mock(_) => RendererMode::Mock,
        }
    }
}

impl Renderer for ReplayRenderer {
    #[tracing::instrument(skip_all, fields(job = %runtime.job_id, mode = self.mode().as_str()))]
    fn render(
        &self,
        runtime: &JobRuntime,
        hooks: &mut dyn RenderHooks,
    ) -> RenderResult<RenderOutput> {
        hooks.on_log("Preparing files");
        hooks.on_log(&format!(
            "Audio mix settings: music {}% / hitsounds {}%",
            runtime.settings.music_volume, runtime.settings.hitsound_volume
        ));
        ensure_dir(&runtime.paths.output_dir)?;
        ensure_dir(&runtime.paths.work_dir)?;

        let skin_dir = match &runtime.files.skin_zip {
            Some(zip_path) => {
                hooks.on_log("Extracting custom skin");
                let dir = runtime.paths.work_dir.join("skin");
                extract_skin(zip_path, &dir)?;
                Some(dir)
            }
            None => None,
        };

        let artifact = match &self.backend {
            Backend::Native(b) => b.run(runtime, hooks)?,
            Backend::Template(b) => b.run(runtime, skin_dir.as_deref(), hooks)?,
            Backend::Mock(b) => b.run(runtime, hooks)?,
        };

        let output = resolve_artifact(&runtime.paths, &artifact)?;
        hooks.on_progress(1.0);
        tracing::info!(file = %output.file_path.display(), "render finished");
        Ok(output)
    }
}

fn resolve_artifact(paths: &RuntimePaths, artifact: &Artifact) -> RenderResult<RenderOutput> {
    if paths.output_video.is_file() {
        return Ok(RenderOutput::video(&paths.output_video));
    }
    let text = match artifact {
        Artifact::Default => &paths.output_text,
        Artifact::Text(p) => p,
    };
    if text.is_file() {
        return Ok(RenderOutput::text(text));
    }
    Err(RenderError::external(
        "Renderer finished but no output file was found. Expected outputVideo or fallback artifact.",
    ))
}

/// Unpack a skin archive into `dir`.
pub fn extract_skin(zip_path: &Path, dir: &Path) -> RenderResult<()> {
    use anyhow::Context as _;
    ensure_dir(dir)?;
    let file = std::fs::File::open(zip_path)
        .with_context(|| format!("failed to open skin archive '{}'", zip_path.display()))?;
    let mut archive = zip::ZipArchive::new(file)
        .with_context(|| format!("failed to read skin archive '{}'", zip_path.display()))?;
    archive
        .extract(dir)
        .with_context(|| format!("failed to extract skin archive into '{}'", dir.display()))?;
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/render/mod.rs"]
mod tests;
