use std::path::PathBuf;

use crate::encode::ffmpeg::test_pattern_command;
use crate::encode::process::{ProcessOpts, run_process};
use crate::foundation::error::RenderResult;
use crate::render::{Artifact, JobRuntime, RenderHooks};

/// Length of the generated test clip.
pub const MOCK_CLIP_SECS: u32 = 5;
/// Name of the placeholder written when no clip could be produced.
pub const PLACEHOLDER_FILE_NAME: &str = "mock-render.txt";
/// Placeholder contents.
pub const PLACEHOLDER_TEXT: &str =
    "Mock render complete. Configure RENDERER_MODE=template or native for real replay rendering.\n";

/// Produces a test-pattern clip, or a text placeholder when ffmpeg is unavailable.
pub struct MockBackend {
    ffmpeg: PathBuf,
}

impl MockBackend {
    /// Use `ffmpeg` for the test pattern.
    pub fn new(ffmpeg: PathBuf) -> Self {
        Self { ffmpeg }
    }

    pub(crate) fn run(
        &self,
        runtime: &JobRuntime,
        hooks: &mut dyn RenderHooks,
    ) -> RenderResult<Artifact> {
        let preset = runtime.settings.preset();
        hooks.on_log("Starting mock renderer");
        hooks.on_log(&format!("Video quality preset: {}", preset.label));
        hooks.on_progress(0.2);

        hooks.on_log(&format!(
            "Mock renderer: trying ffmpeg test video generation ({})",
            preset.label
        ));
        let mut cmd = test_pattern_command(
            &self.ffmpeg,
            preset.width,
            preset.height,
            preset.fps,
            MOCK_CLIP_SECS,
            &runtime.paths.output_video,
        );
        let artifact = match run_process(&mut cmd, ProcessOpts::default(), &mut |line| {
            hooks.on_log(line)
        }) {
            Ok(_) => Artifact::Default,
            Err(err) => {
                hooks.on_log(&format!(
                    "Mock renderer: ffmpeg not available ({err}), writing placeholder file"
                ));
                let path = runtime.paths.output_dir.join(PLACEHOLDER_FILE_NAME);
                {
                    use anyhow::Context as _;
                    if runtime.paths.output_video.exists() {
                        std::fs::remove_file(&runtime.paths.output_video).with_context(|| {
                            format!(
                                "failed to remove partial '{}'",
                                runtime.paths.output_video.display()
                            )
                        })?;
                    }
                    crate::foundation::core::ensure_dir(&runtime.paths.output_dir)?;
                    std::fs::write(&path, PLACEHOLDER_TEXT)
                        .with_context(|| format!("failed to write '{}'", path.display()))?;
                }
                Artifact::Text(path)
            }
        };
        hooks.on_progress(0.95);
        Ok(artifact)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/mock.rs"]
mod tests;
