//! Input timeline reconstruction.
//!
//! The compressed event stream of a replay is decompressed by an external tool, parsed from its
//! `delta|x|y|keys` text form into absolute frames, and resampled onto the output frame cadence.

/// Decompression and frame parsing.
pub mod decode;
/// Fixed-cadence resampling.
pub mod resample;
