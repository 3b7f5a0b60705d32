//! Binary replay (`.osr`) decoding.

/// Mod labels, disciplines and accuracy.
pub mod mods;
/// Summary and payload parsing.
pub mod parse;
pub(crate) mod reader;
