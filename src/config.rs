use std::path::{Path, PathBuf};

use crate::foundation::core::ensure_dir;
use crate::foundation::error::{RenderError, RenderResult};
use crate::timeline::decode::{ToolCommand, default_decompressors};

/// Which backend produces the video.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RendererMode {
    /// Built-in pipeline: replay decode, overlay, ffmpeg encode.
    #[default]
    Native,
    /// A configured external command.
    Template,
    /// Test pattern or placeholder artifact.
    Mock,
}

impl RendererMode {
    /// Parse a mode name. Anything other than `native` or `template` selects the mock backend.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "native" => Self::Native,
            "template" => Self::Template,
            _ => Self::Mock,
        }
    }

    /// Lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Native => "native",
            Self::Template => "template",
            Self::Mock => "mock",
        }
    }
}

/// Directory layout below the service root.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDirs {
    /// Job records.
    pub data: PathBuf,
    /// Uploaded inputs.
    pub uploads: PathBuf,
    /// Per-job results (`<output>/<jobId>`).
    pub output: PathBuf,
    /// Per-job scratch space (`<temp>/<jobId>`).
    pub temp: PathBuf,
    /// In-flight uploads.
    pub incoming: PathBuf,
}

impl ServiceDirs {
    /// Standard layout under `root`.
    pub fn under(root: &Path) -> Self {
        Self {
            data: root.join("data"),
            uploads: root.join("uploads"),
            output: root.join("output"),
            temp: root.join("temp"),
            incoming: root.join("temp").join("_incoming"),
        }
    }

    fn all(&self) -> [&Path; 5] {
        [
            &self.data,
            &self.uploads,
            &self.output,
            &self.temp,
            &self.incoming,
        ]
    }
}

/// External executables used by the renderers.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ToolPaths {
    /// ffmpeg executable.
    pub ffmpeg: PathBuf,
    /// LZMA decompressor candidates, in order of preference.
    pub decompressors: Vec<ToolCommand>,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            decompressors: default_decompressors(),
        }
    }
}

/// Service-wide configuration. Every field has a default, so an empty JSON object is valid.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceConfig {
    /// Root that all service directories live under.
    pub root: PathBuf,
    /// Active backend.
    pub renderer_mode: RendererMode,
    /// Shell command with `{{ key }}` placeholders, used in template mode.
    pub render_command_template: String,
    /// External tools.
    pub tools: ToolPaths,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            renderer_mode: RendererMode::default(),
            render_command_template: String::new(),
            tools: ToolPaths::default(),
        }
    }
}

impl ServiceConfig {
    /// Defaults rooted at `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Read a JSON config file.
    pub fn load(path: &Path) -> RenderResult<Self> {
        use anyhow::Context as _;
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config '{}'", path.display()))?;
        serde_json::from_str(&text)
            .map_err(|e| RenderError::serde(format!("invalid config '{}': {e}", path.display())))
    }

    /// Apply `RENDERER_MODE`, `RENDER_COMMAND_TEMPLATE`, `FFMPEG_PATH` and `REPLAY_RENDER_ROOT`
    /// from the process environment.
    pub fn apply_env(self) -> Self {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable source. Empty values are ignored.
    pub fn apply_env_from(mut self, get: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        if let Some(mode) = var("RENDERER_MODE") {
            self.renderer_mode = RendererMode::parse_lenient(&mode);
        }
        if let Some(template) = var("RENDER_COMMAND_TEMPLATE") {
            self.render_command_template = template;
        }
        if let Some(ffmpeg) = var("FFMPEG_PATH") {
            self.tools.ffmpeg = PathBuf::from(ffmpeg);
        }
        if let Some(root) = var("REPLAY_RENDER_ROOT") {
            self.root = PathBuf::from(root);
        }
        self
    }

    /// Directory layout for this root.
    pub fn dirs(&self) -> ServiceDirs {
        ServiceDirs::under(&self.root)
    }

    /// Create every service directory.
    pub fn ensure_dirs(&self) -> RenderResult<()> {
        let dirs = self.dirs();
        for dir in dirs.all() {
            ensure_dir(dir)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../tests/unit/config.rs"]
mod tests;
