use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use anyhow::Context as _;
use chrono::Utc;

use crate::foundation::core::ensure_dir;
use crate::foundation::error::{RenderError, RenderResult};
use crate::queue::job::{Job, JobStatus};

/// Error recorded on jobs that were still pending when the service stopped.
pub const INTERRUPTED_ERROR: &str = "Server restarted before job finished";

/// Persistence for job records.
///
/// `update` is the only mutation primitive the worker needs; it stamps `updated_at` and returns
/// the stored record, or `None` when the id is unknown.
pub trait JobStore: Send + Sync {
    /// Fetch a job by id.
    fn get(&self, id: &str) -> RenderResult<Option<Job>>;

    /// Insert or replace a job.
    fn save(&self, job: &Job) -> RenderResult<()>;

    /// All jobs, oldest first.
    fn list(&self) -> RenderResult<Vec<Job>>;

    /// Apply `f` to the stored job.
    fn update(&self, id: &str, f: &mut dyn FnMut(&mut Job)) -> RenderResult<Option<Job>>;

    /// Append one log line, respecting the retention cap.
    fn append_log(&self, id: &str, message: &str) -> RenderResult<()> {
        self.update(id, &mut |job| job.push_log(message))?;
        Ok(())
    }

    /// Fail every job left `queued` or `processing`. Returns how many were touched.
    fn mark_interrupted(&self) -> RenderResult<usize> {
        let mut touched = 0;
        for job in self.list()? {
            if job.status.is_terminal() {
                continue;
            }
            self.update(&job.id, &mut |job| {
                job.status = JobStatus::Failed;
                if job.error.is_none() {
                    job.error = Some(INTERRUPTED_ERROR.to_string());
                }
                job.completed_at.get_or_insert_with(Utc::now);
                job.push_log(format!("Job failed: {INTERRUPTED_ERROR}"));
            })?;
            touched += 1;
        }
        if touched > 0 {
            tracing::warn!(count = touched, "marked interrupted jobs as failed");
        }
        Ok(touched)
    }
}

fn sort_by_creation(jobs: &mut [Job]) {
    jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    jobs: Mutex<BTreeMap<String, Job>>,
}

impl MemoryJobStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl JobStore for MemoryJobStore {
    fn get(&self, id: &str) -> RenderResult<Option<Job>> {
        let jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(jobs.get(id).cloned())
    }

    fn save(&self, job: &Job) -> RenderResult<()> {
        let mut jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        jobs.insert(job.id.clone(), job.clone());
        Ok(())
    }

    fn list(&self) -> RenderResult<Vec<Job>> {
        let jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        let mut out: Vec<Job> = jobs.values().cloned().collect();
        sort_by_creation(&mut out);
        Ok(out)
    }

    fn update(&self, id: &str, f: &mut dyn FnMut(&mut Job)) -> RenderResult<Option<Job>> {
        let mut jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(jobs.get_mut(id).map(|job| {
            f(job);
            job.updated_at = Utc::now();
            job.clone()
        }))
    }
}

/// One pretty-printed `<id>.json` file per job inside a directory.
///
/// Writes go through a temporary file and a rename so a crash never leaves a truncated record.
#[derive(Debug)]
pub struct JsonDirJobStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonDirJobStore {
    /// Open (and create) the store directory.
    pub fn open(dir: impl Into<PathBuf>) -> RenderResult<Self> {
        let dir = dir.into();
        ensure_dir(&dir)?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    /// Directory holding the records.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, id: &str) -> RenderResult<PathBuf> {
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(RenderError::validation(format!("invalid job id '{id}'")));
        }
        Ok(self.dir.join(format!("{id}.json")))
    }

    fn read_record(path: &Path) -> RenderResult<Job> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read job record '{}'", path.display()))?;
        serde_json::from_str(&text)
            .map_err(|e| RenderError::serde(format!("{}: {e}", path.display())))
    }

    fn write_record(&self, job: &Job) -> RenderResult<()> {
        let path = self.record_path(&job.id)?;
        let text =
            serde_json::to_string_pretty(job).map_err(|e| RenderError::serde(e.to_string()))?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, text)
            .with_context(|| format!("failed to write job record '{}'", tmp.display()))?;
        std::fs::rename(&tmp, &path)
            .with_context(|| format!("failed to move job record into '{}'", path.display()))?;
        Ok(())
    }
}

impl JobStore for JsonDirJobStore {
    fn get(&self, id: &str) -> RenderResult<Option<Job>> {
        let path = self.record_path(id)?;
        if !path.is_file() {
            return Ok(None);
        }
        Self::read_record(&path).map(Some)
    }

    fn save(&self, job: &Job) -> RenderResult<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.write_record(job)
    }

    fn list(&self) -> RenderResult<Vec<Job>> {
        let entries = std::fs::read_dir(&self.dir)
            .with_context(|| format!("failed to list '{}'", self.dir.display()))?;
        let mut out = Vec::new();
        for entry in entries {
            let path = entry
                .with_context(|| format!("failed to list '{}'", self.dir.display()))?
                .path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            match Self::read_record(&path) {
                Ok(job) => out.push(job),
                Err(err) => tracing::warn!(error = %err, "skipping unreadable job record"),
            }
        }
        sort_by_creation(&mut out);
        Ok(out)
    }

    fn update(&self, id: &str, f: &mut dyn FnMut(&mut Job)) -> RenderResult<Option<Job>> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(mut job) = self.get(id)? else {
            return Ok(None);
        };
        f(&mut job);
        job.updated_at = Utc::now();
        self.write_record(&job)?;
        Ok(Some(job))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/queue/store.rs"]
mod tests;
