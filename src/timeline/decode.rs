use std::path::{Path, PathBuf};
use std::process::Command;

use crate::encode::process::{ProcessOpts, probe_tool, run_process};
use crate::foundation::error::{RenderError, RenderResult};

/// File name the compressed input stream is written to inside the work directory.
pub const COMPRESSED_FILE_NAME: &str = "replay-data.lzma";

const LZMA_SCRIPT: &str = "import sys, lzma\n\
with open(sys.argv[1], 'rb') as f:\n    data = f.read()\n\
decoded = lzma.decompress(data)\n\
sys.stdout.buffer.write(decoded)";

/// One absolute input event on the replay timeline.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct InputFrame {
    /// Milliseconds since the first frame.
    pub time_ms: f64,
    /// Cursor x in playfield units.
    pub x: f64,
    /// Cursor y in playfield units.
    pub y: f64,
    /// Held-key bitmask (1=M1, 2=M2, 4=K1, 8=K2).
    pub keys: u32,
}

/// Turns the compressed input stream into its text form.
pub trait Decompressor: Send + Sync {
    /// Decompress `compressed`, using `work_dir` for scratch files.
    fn decompress(
        &self,
        compressed: &[u8],
        work_dir: &Path,
        on_log: &mut dyn FnMut(&str),
    ) -> RenderResult<Vec<u8>>;
}

/// How a decompression tool is launched.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCommand {
    /// Executable name or path.
    pub program: String,
    /// Arguments placed before the tool-specific ones.
    #[serde(default)]
    pub args_prefix: Vec<String>,
    /// Tool flavour, which decides how the compressed file is passed.
    pub kind: ToolKind,
}

/// Supported decompression tool flavours.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    /// A Python 3 interpreter running the stdlib `lzma` module.
    Python,
    /// `xz` in legacy `.lzma` mode.
    Xz,
}

impl ToolCommand {
    /// A Python interpreter candidate.
    pub fn python(program: &str, args_prefix: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args_prefix: args_prefix.iter().map(|s| s.to_string()).collect(),
            kind: ToolKind::Python,
        }
    }

    /// An `xz` candidate.
    pub fn xz(program: &str) -> Self {
        Self {
            program: program.to_string(),
            args_prefix: Vec::new(),
            kind: ToolKind::Xz,
        }
    }

    fn is_available(&self) -> bool {
        let mut args: Vec<&str> = self.args_prefix.iter().map(String::as_str).collect();
        args.push("--version");
        probe_tool(&self.program, &args)
    }

    fn command_for(&self, compressed_path: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args_prefix);
        match self.kind {
            ToolKind::Python => {
                cmd.arg("-c").arg(LZMA_SCRIPT).arg(compressed_path);
            }
            ToolKind::Xz => {
                cmd.args(["--format=lzma", "-dc"]).arg(compressed_path);
            }
        }
        cmd
    }
}

/// Default candidate list, tried in order.
pub fn default_decompressors() -> Vec<ToolCommand> {
    vec![
        ToolCommand::python("python3", &[]),
        ToolCommand::python("python", &[]),
        ToolCommand::python("py", &["-3"]),
        ToolCommand::xz("xz"),
    ]
}

/// Decompresses by delegating to the first available external tool.
#[derive(Clone, Debug)]
pub struct ExternalDecompressor {
    candidates: Vec<ToolCommand>,
}

impl Default for ExternalDecompressor {
    fn default() -> Self {
        Self::new(default_decompressors())
    }
}

impl ExternalDecompressor {
    /// Use `candidates` in order of preference.
    pub fn new(candidates: Vec<ToolCommand>) -> Self {
        Self { candidates }
    }

    /// Configured candidates.
    pub fn candidates(&self) -> &[ToolCommand] {
        &self.candidates
    }

    fn pick(&self) -> RenderResult<&ToolCommand> {
        self.candidates
            .iter()
            .find(|c| c.is_available())
            .ok_or_else(|| {
                let names: Vec<&str> = self.candidates.iter().map(|c| c.program.as_str()).collect();
                RenderError::external(format!(
                    "no LZMA decompressor available (tried: {})",
                    names.join(", ")
                ))
            })
    }
}

impl Decompressor for ExternalDecompressor {
    #[tracing::instrument(skip_all, fields(bytes = compressed.len()))]
    fn decompress(
        &self,
        compressed: &[u8],
        work_dir: &Path,
        on_log: &mut dyn FnMut(&str),
    ) -> RenderResult<Vec<u8>> {
        let tool = self.pick()?;
        tracing::debug!(program = %tool.program, "selected decompressor");

        let compressed_path: PathBuf = work_dir.join(COMPRESSED_FILE_NAME);
        {
            use anyhow::Context as _;
            crate::foundation::core::ensure_dir(work_dir)?;
            std::fs::write(&compressed_path, compressed).with_context(|| {
                format!("failed to write '{}'", compressed_path.display())
            })?;
        }

        on_log(&format!(
            "Native renderer: decoding replay data via {}",
            tool.program
        ));
        let out = run_process(
            &mut tool.command_for(&compressed_path),
            ProcessOpts {
                forward_stdout: false,
                ..ProcessOpts::default()
            },
            on_log,
        )?;
        Ok(out.stdout)
    }
}

/// Decompress and parse the input stream of a replay into normalized frames.
pub fn decode_timeline(
    compressed: &[u8],
    work_dir: &Path,
    decompressor: &dyn Decompressor,
    on_log: &mut dyn FnMut(&str),
) -> RenderResult<Vec<InputFrame>> {
    if compressed.is_empty() {
        return Err(RenderError::malformed(
            "replay contains empty compressed input stream",
        ));
    }
    let text = decompressor.decompress(compressed, work_dir, on_log)?;
    if text.is_empty() {
        return Err(RenderError::external(
            "failed to decode replay data: decompressed stream is empty",
        ));
    }
    parse_frames_text(&String::from_utf8_lossy(&text))
}

/// Parse comma-separated `delta|x|y[|keys]` entries into absolute frames starting at time 0.
///
/// Entries with a negative delta (seed/metadata entries) are dropped without advancing the clock.
pub fn parse_frames_text(text: &str) -> RenderResult<Vec<InputFrame>> {
    let mut frames = Vec::new();
    let mut clock = 0.0;

    for part in text.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let Some((delta, x, y, keys)) = parse_entry(part) else {
            continue;
        };
        if delta < 0.0 {
            continue;
        }
        clock += delta;
        frames.push(InputFrame {
            time_ms: clock,
            x,
            y,
            keys,
        });
    }

    let Some(first) = frames.first().map(|f| f.time_ms) else {
        return Err(RenderError::malformed(
            "replay timeline has no cursor frames after decoding",
        ));
    };
    if first > 0.0 {
        for f in &mut frames {
            f.time_ms -= first;
        }
    }
    Ok(frames)
}

fn parse_entry(part: &str) -> Option<(f64, f64, f64, u32)> {
    let mut fields = part.split('|');
    let delta = parse_finite(fields.next()?)?;
    let x = parse_finite(fields.next()?)?;
    let y = parse_finite(fields.next()?)?;
    let keys = match fields.next() {
        Some(raw) => parse_finite(raw)?,
        None => 0.0,
    };
    let keys = if (0.0..=f64::from(u32::MAX)).contains(&keys) {
        keys as u32
    } else {
        0
    };
    Some((delta, x, y, keys))
}

fn parse_finite(raw: &str) -> Option<f64> {
    let v: f64 = raw.trim().parse().ok()?;
    v.is_finite().then_some(v)
}

#[cfg(test)]
#[path = "../../tests/unit/timeline/decode.rs"]
mod tests;
