//! External process plumbing and the ffmpeg overlay encoder.

/// Overlay encode command construction and invocation.
pub mod ffmpeg;
/// Run a child process while streaming its output line by line.
pub mod process;
