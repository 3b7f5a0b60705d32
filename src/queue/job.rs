use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::render::settings::RenderSettings;
use crate::render::{JobRuntime, RenderOutput, RuntimeFiles, RuntimePaths};

/// Maximum number of log entries a job keeps; older entries are dropped first.
pub const LOG_RETENTION: usize = 200;

/// Lifecycle state. Transitions only move forward: `queued -> processing -> completed | failed`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Waiting for the worker.
    #[default]
    Queued,
    /// Currently rendering.
    Processing,
    /// Finished with a result.
    Completed,
    /// Finished with an error.
    Failed,
}

impl JobStatus {
    /// `true` for `completed` and `failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// One timestamped job log line.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LogEntry {
    /// When the line was recorded.
    pub at: DateTime<Utc>,
    /// The line itself.
    pub message: String,
}

/// An input file stored for a job.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredFile {
    /// Location on disk.
    pub path: PathBuf,
    /// Name the file was submitted under.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_name: Option<String>,
    /// Size in bytes, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl StoredFile {
    /// Reference `path`, recording its file name as the original name.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let original_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned());
        let size = std::fs::metadata(&path).ok().map(|m| m.len());
        Self {
            path,
            original_name,
            size,
        }
    }
}

/// Files attached to a job. Only the replay is required.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct JobFiles {
    /// Replay capture.
    pub replay: StoredFile,
    /// Optional skin archive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skin: Option<StoredFile>,
    /// Optional beatmap archive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beatmap: Option<StoredFile>,
}

/// A render job record.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// Unique id, also used for job directories.
    pub id: String,
    /// Optional display title.
    #[serde(default)]
    pub title: Option<String>,
    /// Lifecycle state.
    #[serde(default)]
    pub status: JobStatus,
    /// Best progress seen, in `[0, 1]`.
    #[serde(default)]
    pub progress: f64,
    /// User-facing log, oldest first.
    #[serde(default)]
    pub logs: Vec<LogEntry>,
    /// Failure message.
    #[serde(default)]
    pub error: Option<String>,
    /// Result descriptor once completed.
    #[serde(default)]
    pub result: Option<RenderOutput>,
    /// Input files.
    pub files: JobFiles,
    /// Validated render settings.
    #[serde(default)]
    pub settings: RenderSettings,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
    /// When the worker picked the job up.
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    /// When the job reached a terminal state.
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// A fresh queued job.
    pub fn new(id: impl Into<String>, files: JobFiles, settings: RenderSettings) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: None,
            status: JobStatus::Queued,
            progress: 0.0,
            logs: Vec::new(),
            error: None,
            result: None,
            files,
            settings,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
        }
    }

    /// Builder-style title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Append a log line, dropping the oldest entries beyond [`LOG_RETENTION`].
    pub fn push_log(&mut self, message: impl Into<String>) {
        self.logs.push(LogEntry {
            at: Utc::now(),
            message: message.into(),
        });
        if self.logs.len() > LOG_RETENTION {
            let excess = self.logs.len() - LOG_RETENTION;
            self.logs.drain(..excess);
        }
    }

    /// Renderer input for this job, with job-scoped directories under `temp_root`/`output_root`.
    pub fn runtime(&self, temp_root: &Path, output_root: &Path) -> JobRuntime {
        JobRuntime {
            job_id: self.id.clone(),
            title: self.title.clone(),
            files: RuntimeFiles {
                replay: Some(self.files.replay.path.clone()),
                skin_zip: self.files.skin.as_ref().map(|f| f.path.clone()),
                beatmap: self.files.beatmap.as_ref().map(|f| f.path.clone()),
            },
            paths: RuntimePaths::for_job(temp_root, output_root, &self.id),
            settings: self.settings.clone(),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/queue/job.rs"]
mod tests;
