use std::any::Any;
use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::PathBuf;
use std::sync::mpsc::{Receiver, Sender, channel};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::JoinHandle;

use chrono::Utc;

use crate::foundation::error::RenderResult;
use crate::queue::job::{Job, JobStatus};
use crate::queue::progress::{ProgressTracker, START_PROGRESS, progress_from_log_line};
use crate::queue::store::JobStore;
use crate::render::{RenderHooks, RenderOutput, Renderer};

/// Where job-scoped directories are created.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueueDirs {
    /// Parent of `<temp>/<jobId>` work directories.
    pub temp: PathBuf,
    /// Parent of `<output>/<jobId>` result directories.
    pub output: PathBuf,
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<String>,
    active: Option<String>,
}

impl QueueState {
    fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.active.is_none()
    }
}

#[derive(Default)]
struct Shared {
    state: Mutex<QueueState>,
    idle: Condvar,
}

impl Shared {
    fn lock(&self) -> std::sync::MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct Worker {
    shared: Arc<Shared>,
    store: Arc<dyn JobStore>,
    renderer: Arc<dyn Renderer>,
    dirs: QueueDirs,
}

/// Sequential render queue backed by one worker thread.
///
/// Ids are processed in FIFO order, one at a time. Dropping the queue stops accepting work and
/// waits for the worker to finish whatever was already enqueued.
pub struct RenderQueue {
    shared: Arc<Shared>,
    wake: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl RenderQueue {
    /// Recover interrupted jobs in `store`, then start the worker.
    pub fn start(
        store: Arc<dyn JobStore>,
        renderer: Arc<dyn Renderer>,
        dirs: QueueDirs,
    ) -> RenderResult<Self> {
        store.mark_interrupted()?;

        let shared = Arc::new(Shared::default());
        let (tx, rx) = channel();
        let worker = Worker {
            shared: Arc::clone(&shared),
            store,
            renderer,
            dirs,
        };
        let handle = std::thread::Builder::new()
            .name("render-queue".to_string())
            .spawn(move || worker.run(rx))
            .map_err(anyhow::Error::from)?;
        tracing::debug!("render queue started");

        Ok(Self {
            shared,
            wake: Some(tx),
            handle: Some(handle),
        })
    }

    /// Schedule `id`. Returns `false` when it is already pending or running.
    pub fn enqueue(&self, id: &str) -> bool {
        let Some(wake) = &self.wake else {
            return false;
        };
        {
            let mut state = self.shared.lock();
            if state.active.as_deref() == Some(id) || state.pending.iter().any(|p| p == id) {
                tracing::debug!(job = id, "already scheduled");
                return false;
            }
            state.pending.push_back(id.to_string());
        }
        if wake.send(()).is_err() {
            tracing::warn!(job = id, "render queue worker is gone");
            return false;
        }
        true
    }

    /// Ids waiting to run, in order.
    pub fn pending(&self) -> Vec<String> {
        self.shared.lock().pending.iter().cloned().collect()
    }

    /// Id currently rendering.
    pub fn active(&self) -> Option<String> {
        self.shared.lock().active.clone()
    }

    /// Block until nothing is pending or running.
    pub fn wait_idle(&self) {
        let mut state = self.shared.lock();
        while !state.is_idle() {
            state = self
                .shared
                .idle
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Stop accepting work and join the worker after it drains.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        drop(self.wake.take());
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            tracing::warn!("render queue worker panicked");
        }
    }
}

impl Drop for RenderQueue {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Worker {
    fn run(self, wake: Receiver<()>) {
        while wake.recv().is_ok() {
            loop {
                let next = {
                    let mut state = self.shared.lock();
                    let next = state.pending.pop_front();
                    state.active.clone_from(&next);
                    next
                };
                let Some(id) = next else {
                    self.shared.idle.notify_all();
                    break;
                };
                self.process(&id);
                self.shared.lock().active = None;
                self.shared.idle.notify_all();
            }
        }
        tracing::debug!("render queue stopped");
    }

    #[tracing::instrument(skip(self))]
    fn process(&self, id: &str) {
        let job = match self.store.get(id) {
            Ok(Some(job)) => job,
            Ok(None) => {
                tracing::warn!("job vanished before it could start");
                return;
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to load job");
                return;
            }
        };
        if job.status != JobStatus::Queued {
            tracing::debug!(status = ?job.status, "skipping job that is not queued");
            return;
        }

        let started = self.store.update(id, &mut |job| {
            job.status = JobStatus::Processing;
            job.progress = START_PROGRESS;
            job.started_at = Some(Utc::now());
            job.error = None;
            job.push_log("Job started");
        });
        let job = match started {
            Ok(Some(job)) => job,
            Ok(None) => return,
            Err(err) => {
                tracing::warn!(error = %err, "failed to mark job as processing");
                self.force_fail(id, &format!("Failed to start job: {err}"));
                return;
            }
        };
        tracing::info!("job started");

        let runtime = job.runtime(&self.dirs.temp, &self.dirs.output);
        let mut hooks = JobHooks {
            store: self.store.as_ref(),
            id,
            progress: ProgressTracker::new(START_PROGRESS, 1.0),
        };
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            self.renderer.render(&runtime, &mut hooks)
        }))
        .unwrap_or_else(|payload| Err(anyhow::anyhow!(panic_message(payload.as_ref())).into()));

        match outcome {
            Ok(output) => {
                tracing::info!(file = %output.file_path.display(), "job completed");
                if let Err(err) = self.store.update(id, &mut complete(output)) {
                    tracing::warn!(error = %err, "failed to store job result");
                    self.force_fail(id, &format!("Failed to store job result: {err}"));
                }
            }
            Err(err) => {
                let message = err.to_string();
                tracing::warn!(error = %message, "job failed");
                let stored = self.store.update(id, &mut |job: &mut Job| {
                    job.status = JobStatus::Failed;
                    job.error = Some(message.clone());
                    job.completed_at = Some(Utc::now());
                    job.push_log(format!("Job failed: {message}"));
                });
                if let Err(err) = stored {
                    tracing::warn!(error = %err, "failed to store job failure");
                    self.force_fail(id, &message);
                }
            }
        }
    }

    /// Last-resort terminal write: no log line, keeps an existing error.
    fn force_fail(&self, id: &str, message: &str) {
        let result = self.store.update(id, &mut |job| {
            job.status = JobStatus::Failed;
            job.error.get_or_insert_with(|| message.to_string());
            job.completed_at.get_or_insert_with(Utc::now);
        });
        if let Err(err) = result {
            tracing::error!(job = id, error = %err, "job could not be finalized");
        }
    }
}

fn complete(output: RenderOutput) -> impl FnMut(&mut Job) {
    move |job| {
        job.status = JobStatus::Completed;
        job.progress = 1.0;
        job.result = Some(output.clone());
        job.completed_at = Some(Utc::now());
        job.push_log("Job completed");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("renderer panicked: {detail}")
}

/// Routes renderer callbacks into the job record.
struct JobHooks<'a> {
    store: &'a dyn JobStore,
    id: &'a str,
    progress: ProgressTracker,
}

impl JobHooks<'_> {
    fn advance(&mut self, value: f64) {
        let Some(best) = self.progress.observe(value) else {
            return;
        };
        if let Err(err) = self.store.update(self.id, &mut |job| job.progress = best) {
            tracing::warn!(job = self.id, error = %err, "failed to store progress");
        }
    }
}

impl RenderHooks for JobHooks<'_> {
    fn on_log(&mut self, line: &str) {
        if let Err(err) = self.store.append_log(self.id, line) {
            tracing::warn!(job = self.id, error = %err, "failed to store log line");
        }
        if let Some(value) = progress_from_log_line(line) {
            self.advance(value);
        }
    }

    fn on_progress(&mut self, fraction: f64) {
        self.advance(fraction);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/queue/worker.rs"]
mod tests;
