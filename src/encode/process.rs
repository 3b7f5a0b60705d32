use std::ffi::OsStr;
use std::io::Read;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::mpsc;

use crate::foundation::error::{RenderError, RenderResult};

/// Number of trailing stderr lines carried into a failure message.
pub const STDERR_TAIL_LINES: usize = 20;

const READ_CHUNK_BYTES: usize = 8 * 1024;

/// Which pipe a line came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamKind {
    /// Child stdout.
    Stdout,
    /// Child stderr.
    Stderr,
}

impl StreamKind {
    fn prefix(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

/// Splits an arbitrary chunked byte stream into lines.
///
/// `\n`, `\r\n` and a lone `\r` all end a line, so carriage-return progress updates arrive one
/// at a time. A line may straddle chunk boundaries (including mid UTF-8 sequence); the
/// unterminated tail is carried over to the next `push` and released by `finish`.
#[derive(Debug, Default)]
pub struct LineAccumulator {
    carry: Vec<u8>,
}

impl LineAccumulator {
    /// Append a chunk and return every line it completed, without terminators.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.carry.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.carry.iter().position(|b| matches!(b, b'\n' | b'\r')) {
            let end = match (self.carry[pos], self.carry.get(pos + 1)) {
                (b'\r', Some(b'\n')) => pos + 2,
                // A trailing `\r` may be the first half of a `\r\n` split across chunks.
                (b'\r', None) => break,
                _ => pos + 1,
            };
            let line: Vec<u8> = self.carry.drain(..end).take(pos).collect();
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// Release the trailing partial line, trimmed, if it has any content.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.carry);
        let text = String::from_utf8_lossy(&rest);
        let trimmed = text.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }
}

/// Options for [`run_process`].
#[derive(Clone, Copy, Debug)]
pub struct ProcessOpts {
    /// Forward stdout lines to the line callback (stderr lines are always forwarded).
    pub forward_stdout: bool,
    /// Return normally on a non-zero exit instead of failing.
    pub allow_non_zero: bool,
}

impl Default for ProcessOpts {
    fn default() -> Self {
        Self {
            forward_stdout: true,
            allow_non_zero: false,
        }
    }
}

/// Captured result of a finished child process.
#[derive(Debug)]
pub struct ProcessOutput {
    /// Exit status.
    pub status: ExitStatus,
    /// Raw stdout bytes.
    pub stdout: Vec<u8>,
    /// Raw stderr bytes.
    pub stderr: Vec<u8>,
}

impl ProcessOutput {
    /// Last `max_lines` non-blank stderr lines joined with `\n`.
    pub fn stderr_tail(&self, max_lines: usize) -> String {
        stderr_tail(&self.stderr, max_lines)
    }
}

fn stderr_tail(stderr: &[u8], max_lines: usize) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text
        .split(['\n', '\r'])
        .filter(|l| !l.trim().is_empty())
        .collect();
    let start = lines.len().saturating_sub(max_lines);
    lines[start..].join("\n")
}

/// Spawn `cmd`, stream its output lines to `on_line` as `"stdout> ..."` / `"stderr> ..."`, and
/// wait for it to exit.
///
/// Blank lines are not forwarded. A non-zero exit is a [`RenderError::External`] carrying the
/// stderr tail unless `opts.allow_non_zero` is set.
pub fn run_process(
    cmd: &mut Command,
    opts: ProcessOpts,
    on_line: &mut dyn FnMut(&str),
) -> RenderResult<ProcessOutput> {
    let program = cmd.get_program().to_string_lossy().into_owned();
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    tracing::debug!(program = %program, "spawning external process");
    let mut child = cmd
        .spawn()
        .map_err(|e| RenderError::external(format!("failed to spawn {program}: {e}")))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| RenderError::external(format!("failed to open {program} stdout")))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| RenderError::external(format!("failed to open {program} stderr")))?;

    let (tx, rx) = mpsc::channel::<(StreamKind, Vec<u8>)>();
    let stdout_drain = spawn_drain(stdout, StreamKind::Stdout, tx.clone());
    let stderr_drain = spawn_drain(stderr, StreamKind::Stderr, tx);

    let mut stdout_bytes = Vec::new();
    let mut stderr_bytes = Vec::new();
    let mut stdout_lines = LineAccumulator::default();
    let mut stderr_lines = LineAccumulator::default();

    // Ends once both drain threads have dropped their senders.
    for (kind, chunk) in rx {
        match kind {
            StreamKind::Stdout => {
                stdout_bytes.extend_from_slice(&chunk);
                if opts.forward_stdout {
                    emit_lines(on_line, kind, stdout_lines.push(&chunk));
                }
            }
            StreamKind::Stderr => {
                stderr_bytes.extend_from_slice(&chunk);
                emit_lines(on_line, kind, stderr_lines.push(&chunk));
            }
        }
    }

    for (kind, handle) in [
        (StreamKind::Stdout, stdout_drain),
        (StreamKind::Stderr, stderr_drain),
    ] {
        handle
            .join()
            .map_err(|_| RenderError::external(format!("{program} {} reader panicked", kind.prefix())))?
            .map_err(|e| {
                RenderError::external(format!("failed to read {program} {}: {e}", kind.prefix()))
            })?;
    }

    if opts.forward_stdout
        && let Some(rest) = stdout_lines.finish()
    {
        on_line(&format!("stdout> {rest}"));
    }
    if let Some(rest) = stderr_lines.finish() {
        on_line(&format!("stderr> {rest}"));
    }

    let status = child
        .wait()
        .map_err(|e| RenderError::external(format!("failed to wait for {program}: {e}")))?;

    if !status.success() && !opts.allow_non_zero {
        let code = status
            .code()
            .map(|c| format!("code {c}"))
            .unwrap_or_else(|| "a signal".to_string());
        let tail = stderr_tail(&stderr_bytes, STDERR_TAIL_LINES);
        return Err(RenderError::external(if tail.is_empty() {
            format!("{program} exited with {code}")
        } else {
            format!("{program} exited with {code}: {tail}")
        }));
    }

    Ok(ProcessOutput {
        status,
        stdout: stdout_bytes,
        stderr: stderr_bytes,
    })
}

fn emit_lines(on_line: &mut dyn FnMut(&str), kind: StreamKind, lines: Vec<String>) {
    for line in lines {
        if !line.trim().is_empty() {
            on_line(&format!("{}> {line}", kind.prefix()));
        }
    }
}

fn spawn_drain<R: Read + Send + 'static>(
    mut reader: R,
    kind: StreamKind,
    tx: mpsc::Sender<(StreamKind, Vec<u8>)>,
) -> std::thread::JoinHandle<std::io::Result<()>> {
    std::thread::spawn(move || {
        let mut buf = vec![0u8; READ_CHUNK_BYTES];
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                return Ok(());
            }
            if tx.send((kind, buf[..n].to_vec())).is_err() {
                return Ok(());
            }
        }
    })
}

/// Return `true` when `program args..` can be spawned and exits successfully.
pub fn probe_tool(program: impl AsRef<OsStr>, args: &[&str]) -> bool {
    Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(test)]
#[path = "../../tests/unit/encode/process.rs"]
mod tests;
