//! Playfield geometry and ASS overlay generation.

/// Playfield-to-pixel mapping and guide geometry.
pub mod playfield;
/// Overlay event construction and ASS serialization.
pub mod script;
