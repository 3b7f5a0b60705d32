use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use replay_render::{
    ExternalDecompressor, Job, JobFiles, JobRuntime, JobStatus, JobStore, JsonDirJobStore,
    QueueDirs, RenderHooks, RenderQueue, RenderSettings, Renderer, RendererMode, ReplayRenderer,
    RuntimeFiles, RuntimePaths, ServiceConfig, StoredFile,
};

#[derive(Parser, Debug)]
#[command(name = "replay-render", version)]
struct Cli {
    /// Service config JSON (defaults apply when omitted; environment overrides always apply).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the summary of a replay file as JSON.
    Inspect(InspectArgs),
    /// Render one replay to MP4 with the built-in overlay pipeline (requires `ffmpeg`).
    Render(RenderArgs),
    /// Submit replays as jobs to the persistent queue and wait for them.
    Queue(QueueArgs),
}

#[derive(Parser, Debug)]
struct InspectArgs {
    /// Replay file (.osr).
    replay: PathBuf,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Replay file (.osr).
    replay: PathBuf,

    /// Output MP4 path.
    #[arg(long)]
    out: PathBuf,

    /// Quality tier: low, medium, high or ultra.
    #[arg(long, default_value = "medium")]
    quality: String,

    /// Title shown in the HUD.
    #[arg(long)]
    title: Option<String>,
}

#[derive(Parser, Debug)]
struct QueueArgs {
    /// Replay files (.osr), rendered in order.
    #[arg(required = true)]
    replays: Vec<PathBuf>,

    /// Quality tier applied to every job.
    #[arg(long, default_value = "medium")]
    quality: String,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = load_config(cli.config.as_deref())?;
    match cli.cmd {
        Command::Inspect(args) => cmd_inspect(args),
        Command::Render(args) => cmd_render(&cfg, args),
        Command::Queue(args) => cmd_queue(&cfg, args),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ServiceConfig> {
    let cfg = match path {
        Some(path) => ServiceConfig::load(path)?,
        None => ServiceConfig::default(),
    };
    Ok(cfg.apply_env())
}

fn settings_for(quality: &str) -> RenderSettings {
    RenderSettings::from(serde_json::json!({ "videoQuality": quality }))
}

/// Job log lines go to stderr; progress only to tracing.
struct ConsoleHooks;

impl RenderHooks for ConsoleHooks {
    fn on_log(&mut self, line: &str) {
        eprintln!("{line}");
    }

    fn on_progress(&mut self, fraction: f64) {
        tracing::debug!(progress = fraction, "render progress");
    }
}

fn cmd_inspect(args: InspectArgs) -> anyhow::Result<()> {
    let summary = replay_render::read_summary(&args.replay)?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn cmd_render(cfg: &ServiceConfig, args: RenderArgs) -> anyhow::Result<()> {
    let decompressor = Arc::new(ExternalDecompressor::new(cfg.tools.decompressors.clone()));
    let renderer = ReplayRenderer::native(cfg.tools.ffmpeg.clone(), decompressor);

    let work_dir = std::env::temp_dir().join(format!("replay-render-{}", std::process::id()));
    let output_dir = args
        .out
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();
    let runtime = JobRuntime {
        job_id: "cli".to_string(),
        title: args.title,
        files: RuntimeFiles {
            replay: Some(args.replay),
            ..RuntimeFiles::default()
        },
        paths: RuntimePaths {
            work_dir: work_dir.clone(),
            output_dir,
            output_text: args.out.with_extension("txt"),
            output_video: args.out.clone(),
        },
        settings: settings_for(&args.quality),
    };

    let result = renderer.render(&runtime, &mut ConsoleHooks);
    if work_dir.exists()
        && let Err(err) = std::fs::remove_dir_all(&work_dir)
    {
        tracing::warn!(dir = %work_dir.display(), error = %err, "failed to remove work dir");
    }
    let output = result?;
    eprintln!("wrote {}", output.file_path.display());
    Ok(())
}

fn cmd_queue(cfg: &ServiceConfig, args: QueueArgs) -> anyhow::Result<()> {
    cfg.ensure_dirs()?;
    let dirs = cfg.dirs();
    let store = Arc::new(JsonDirJobStore::open(dirs.data.join("jobs"))?);
    let renderer = Arc::new(ReplayRenderer::from_config(cfg));
    if renderer.mode() != RendererMode::Native {
        tracing::info!(mode = renderer.mode().as_str(), "using non-native renderer");
    }
    let queue = RenderQueue::start(
        store.clone(),
        renderer,
        QueueDirs {
            temp: dirs.temp.clone(),
            output: dirs.output.clone(),
        },
    )?;

    let batch = chrono::Utc::now().format("%Y%m%d%H%M%S%3f").to_string();
    let mut ids = Vec::with_capacity(args.replays.len());
    for (i, replay) in args.replays.iter().enumerate() {
        let replay = replay
            .canonicalize()
            .with_context(|| format!("replay '{}' not found", replay.display()))?;
        let id = format!("{batch}-{i}");
        let mut job = Job::new(
            id.clone(),
            JobFiles {
                replay: StoredFile::at(&replay),
                skin: None,
                beatmap: None,
            },
            settings_for(&args.quality),
        );
        if let Some(stem) = replay.file_stem() {
            job = job.with_title(stem.to_string_lossy());
        }
        store.save(&job)?;
        queue.enqueue(&id);
        ids.push(id);
    }

    queue.wait_idle();
    queue.shutdown();

    let mut failed = 0usize;
    for id in &ids {
        let Some(job) = store.get(id)? else {
            continue;
        };
        if job.status == JobStatus::Failed {
            failed += 1;
        }
        let report = serde_json::json!({
            "id": job.id,
            "status": job.status,
            "progress": job.progress,
            "error": job.error,
            "result": job.result,
        });
        println!("{report}");
    }
    if failed > 0 {
        anyhow::bail!("{failed} of {} job(s) failed", ids.len());
    }
    Ok(())
}
