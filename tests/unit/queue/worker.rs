use super::*;
use std::path::Path;
use std::sync::mpsc;

use crate::foundation::error::RenderError;
use crate::queue::job::{JobFiles, StoredFile};
use crate::queue::store::{INTERRUPTED_ERROR, MemoryJobStore};
use crate::render::JobRuntime;
use crate::render::settings::RenderSettings;

type Script = dyn Fn(&JobRuntime, &mut dyn RenderHooks) -> RenderResult<RenderOutput> + Send + Sync;

struct ScriptedRenderer {
    script: Box<Script>,
    seen: Mutex<Vec<String>>,
}

impl ScriptedRenderer {
    fn new(
        script: impl Fn(&JobRuntime, &mut dyn RenderHooks) -> RenderResult<RenderOutput>
        + Send
        + Sync
        + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            script: Box::new(script),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

impl Renderer for ScriptedRenderer {
    fn render(
        &self,
        runtime: &JobRuntime,
        hooks: &mut dyn RenderHooks,
    ) -> RenderResult<RenderOutput> {
        self.seen.lock().unwrap().push(runtime.job_id.clone());
        (self.script)(runtime, hooks)
    }
}

fn text_output(runtime: &JobRuntime) -> RenderResult<RenderOutput> {
    Ok(RenderOutput::text(&runtime.paths.output_text))
}

fn queued(store: &dyn JobStore, id: &str) {
    let job = Job::new(
        id,
        JobFiles {
            replay: StoredFile::at(format!("/uploads/{id}.osr")),
            skin: None,
            beatmap: None,
        },
        RenderSettings::default(),
    );
    store.save(&job).unwrap();
}

fn dirs() -> QueueDirs {
    QueueDirs {
        temp: Path::new("/tmp/replay-render-test/temp").to_path_buf(),
        output: Path::new("/tmp/replay-render-test/output").to_path_buf(),
    }
}

fn start<S: JobStore + 'static>(
    store: &Arc<S>,
    renderer: &Arc<ScriptedRenderer>,
) -> RenderQueue {
    let store: Arc<dyn JobStore> = store.clone();
    let renderer: Arc<dyn Renderer> = renderer.clone();
    RenderQueue::start(store, renderer, dirs()).unwrap()
}

fn messages(job: &Job) -> Vec<&str> {
    job.logs.iter().map(|l| l.message.as_str()).collect()
}

#[test]
fn successful_job_completes_with_result() {
    let store = Arc::new(MemoryJobStore::new());
    let renderer = ScriptedRenderer::new(|rt, hooks| {
        hooks.on_log("rendering");
        hooks.on_progress(0.5);
        text_output(rt)
    });
    let queue = start(&store, &renderer);
    queued(store.as_ref(), "ok");
    assert!(queue.enqueue("ok"));
    queue.wait_idle();

    let job = store.get("ok").unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.progress, 1.0);
    assert_eq!(job.error, None);
    assert!(job.started_at.is_some() && job.completed_at.is_some());
    assert_eq!(
        job.result.map(|r| r.file_path),
        Some(Path::new("/tmp/replay-render-test/output/ok/render.txt").to_path_buf())
    );
    assert_eq!(messages(&store.get("ok").unwrap().unwrap()), vec![
        "Job started",
        "rendering",
        "Job completed"
    ]);
}

#[test]
fn failure_keeps_best_progress() {
    let store = Arc::new(MemoryJobStore::new());
    let renderer = ScriptedRenderer::new(|_, hooks| {
        hooks.on_progress(0.6);
        hooks.on_progress(0.9);
        hooks.on_progress(0.3);
        Err(RenderError::external("ffmpeg exited with code 1"))
    });
    let queue = start(&store, &renderer);
    queued(store.as_ref(), "bad");
    queue.enqueue("bad");
    queue.wait_idle();

    let job = store.get("bad").unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.progress, 0.9);
    assert_eq!(job.result, None);
    assert!(job.completed_at.is_some());
    let error = job.error.clone().unwrap();
    assert!(error.contains("ffmpeg exited with code 1"));
    assert_eq!(
        messages(&job).last().copied(),
        Some(format!("Job failed: {error}").as_str())
    );
}

#[test]
fn log_lines_drive_progress() {
    let store = Arc::new(MemoryJobStore::new());
    let renderer = ScriptedRenderer::new(|_, hooks| {
        hooks.on_log("stdout> Progress: 50%");
        hooks.on_log("stdout> Progress: 10%");
        Err(RenderError::external("stopped"))
    });
    let queue = start(&store, &renderer);
    queued(store.as_ref(), "logs");
    queue.enqueue("logs");
    queue.wait_idle();
    assert!((store.get("logs").unwrap().unwrap().progress - 0.65).abs() < 1e-9);
}

#[test]
fn jobs_run_in_fifo_order() {
    let store = Arc::new(MemoryJobStore::new());
    let renderer = ScriptedRenderer::new(|rt, _| text_output(rt));
    let queue = start(&store, &renderer);
    for id in ["a", "b", "c"] {
        queued(store.as_ref(), id);
    }
    for id in ["a", "b", "c"] {
        assert!(queue.enqueue(id));
    }
    queue.wait_idle();
    assert_eq!(renderer.seen(), vec!["a", "b", "c"]);
    assert!(queue.pending().is_empty());
    assert_eq!(queue.active(), None);
}

#[test]
fn duplicate_enqueue_is_ignored() {
    let store = Arc::new(MemoryJobStore::new());
    let (release, gate) = mpsc::channel::<()>();
    let gate = Mutex::new(gate);
    let renderer = ScriptedRenderer::new(move |rt, _| {
        let _ = gate.lock().unwrap().recv();
        text_output(rt)
    });
    let queue = start(&store, &renderer);
    queued(store.as_ref(), "dup");
    assert!(queue.enqueue("dup"));
    assert!(!queue.enqueue("dup"));
    release.send(()).unwrap();
    queue.wait_idle();
    assert_eq!(renderer.seen(), vec!["dup"]);
}

#[test]
fn jobs_that_are_not_queued_are_skipped() {
    let store = Arc::new(MemoryJobStore::new());
    let renderer = ScriptedRenderer::new(|rt, _| text_output(rt));
    let queue = start(&store, &renderer);
    queued(store.as_ref(), "done");
    store
        .update("done", &mut |j| j.status = JobStatus::Completed)
        .unwrap();
    queue.enqueue("done");
    queue.enqueue("unknown");
    queue.wait_idle();
    assert!(renderer.seen().is_empty());
    assert_eq!(
        store.get("done").unwrap().unwrap().status,
        JobStatus::Completed
    );
}

#[test]
fn renderer_panic_fails_the_job() {
    let store = Arc::new(MemoryJobStore::new());
    let renderer = ScriptedRenderer::new(|rt, _| {
        if rt.job_id == "boom" {
            panic!("kaboom");
        }
        text_output(rt)
    });
    let queue = start(&store, &renderer);
    queued(store.as_ref(), "boom");
    queued(store.as_ref(), "after");
    queue.enqueue("boom");
    queue.enqueue("after");
    queue.wait_idle();

    let job = store.get("boom").unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error.unwrap().contains("kaboom"));
    assert_eq!(
        store.get("after").unwrap().unwrap().status,
        JobStatus::Completed
    );
}

#[test]
fn startup_fails_interrupted_jobs() {
    let store = Arc::new(MemoryJobStore::new());
    queued(store.as_ref(), "left");
    store
        .update("left", &mut |j| j.status = JobStatus::Processing)
        .unwrap();
    let renderer = ScriptedRenderer::new(|rt, _| text_output(rt));
    let queue = start(&store, &renderer);

    let job = store.get("left").unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error.as_deref(), Some(INTERRUPTED_ERROR));

    queue.enqueue("left");
    queue.wait_idle();
    assert!(renderer.seen().is_empty());
}

#[test]
fn shutdown_drains_pending_work() {
    let store = Arc::new(MemoryJobStore::new());
    let renderer = ScriptedRenderer::new(|rt, _| text_output(rt));
    let queue = start(&store, &renderer);
    queued(store.as_ref(), "x");
    queue.enqueue("x");
    queue.shutdown();
    assert_eq!(
        store.get("x").unwrap().unwrap().status,
        JobStatus::Completed
    );
}

/// Rejects the next `failures` updates that would leave a job in `reject`.
struct FlakyStore {
    inner: MemoryJobStore,
    reject: JobStatus,
    failures: Mutex<u32>,
}

impl FlakyStore {
    fn new(reject: JobStatus, failures: u32) -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryJobStore::new(),
            reject,
            failures: Mutex::new(failures),
        })
    }
}

impl JobStore for FlakyStore {
    fn get(&self, id: &str) -> RenderResult<Option<Job>> {
        self.inner.get(id)
    }

    fn save(&self, job: &Job) -> RenderResult<()> {
        self.inner.save(job)
    }

    fn list(&self) -> RenderResult<Vec<Job>> {
        self.inner.list()
    }

    fn update(&self, id: &str, f: &mut dyn FnMut(&mut Job)) -> RenderResult<Option<Job>> {
        if let Some(mut preview) = self.inner.get(id)? {
            f(&mut preview);
            let mut left = self.failures.lock().unwrap();
            if preview.status == self.reject && *left > 0 {
                *left -= 1;
                return Err(RenderError::external("disk full"));
            }
        }
        self.inner.update(id, f)
    }
}

#[test]
fn failed_start_write_still_fails_the_job() {
    let store = FlakyStore::new(JobStatus::Processing, 1);
    let renderer = ScriptedRenderer::new(|rt, _| text_output(rt));
    let queue = start(&store, &renderer);
    queued(store.as_ref(), "s");
    queue.enqueue("s");
    queue.wait_idle();

    assert!(renderer.seen().is_empty());
    let job = store.get("s").unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error.unwrap().contains("disk full"));
    assert!(job.completed_at.is_some());
}

#[test]
fn failed_result_write_falls_back_to_failed() {
    let store = FlakyStore::new(JobStatus::Completed, 1);
    let renderer = ScriptedRenderer::new(|rt, _| text_output(rt));
    let queue = start(&store, &renderer);
    queued(store.as_ref(), "r");
    queue.enqueue("r");
    queue.wait_idle();

    let job = store.get("r").unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error.unwrap().contains("Failed to store job result"));
    assert!(job.completed_at.is_some());
    assert_eq!(job.result, None);
}

#[test]
fn failed_failure_write_is_retried_once() {
    let store = FlakyStore::new(JobStatus::Failed, 1);
    let renderer =
        ScriptedRenderer::new(|_, _| Err(RenderError::external("ffmpeg exited with code 1")));
    let queue = start(&store, &renderer);
    queued(store.as_ref(), "f");
    queue.enqueue("f");
    queue.wait_idle();

    let job = store.get("f").unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error.unwrap().contains("ffmpeg exited with code 1"));
    assert!(job.completed_at.is_some());
}

#[test]
fn persistent_store_failure_leaves_queue_usable() {
    let store = FlakyStore::new(JobStatus::Failed, 2);
    let renderer = ScriptedRenderer::new(|rt, _| {
        if rt.job_id == "lost" {
            return Err(RenderError::external("boom"));
        }
        text_output(rt)
    });
    let queue = start(&store, &renderer);
    queued(store.as_ref(), "lost");
    queued(store.as_ref(), "next");
    queue.enqueue("lost");
    queue.enqueue("next");
    queue.wait_idle();

    assert_eq!(
        store.get("lost").unwrap().unwrap().status,
        JobStatus::Processing
    );
    assert_eq!(
        store.get("next").unwrap().unwrap().status,
        JobStatus::Completed
    );
}
