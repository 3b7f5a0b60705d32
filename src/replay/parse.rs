use std::path::Path;

use chrono::{DateTime, Utc};

use crate::foundation::error::RenderResult;
use crate::replay::mods::{HitCounts, accuracy, mode_name, mods_from_bitmask};
use crate::replay::reader::OsrReader;

/// .NET ticks (100ns units since 0001-01-01) at the Unix epoch.
const UNIX_EPOCH_TICKS: i64 = 621_355_968_000_000_000;
const TICKS_PER_MILLI: i64 = 10_000;
/// Maximum number of characters kept from the life-bar graph.
pub const LIFE_BAR_PREVIEW_CHARS: usize = 120;

/// Summary statistics decoded from a replay file.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaySummary {
    /// Raw mode byte (0-3 for the known disciplines).
    pub mode: u8,
    /// Display name for `mode`.
    pub mode_name: String,
    /// Game client version that recorded the replay.
    pub version: i32,
    /// Player name.
    pub player_name: String,
    /// MD5 of the beatmap the replay was played on.
    pub beatmap_hash: String,
    /// MD5 of the replay itself.
    pub replay_hash: String,
    /// Total score.
    pub score: i32,
    /// Highest combo reached.
    pub max_combo: i16,
    /// Full-combo flag.
    pub perfect: bool,
    /// Raw mods bitmask.
    pub mods_bitmask: u32,
    /// Labels expanded from `mods_bitmask`.
    pub mods: Vec<String>,
    /// Hit-count tallies.
    pub counts: HitCounts,
    /// Accuracy percentage, `None` when no judgements were recorded.
    pub accuracy: Option<f64>,
    /// When the play happened, if the timestamp is valid.
    pub played_at: Option<DateTime<Utc>>,
    /// Start of the life-bar graph string.
    pub life_bar_preview: String,
    /// Online score id, present in newer replays.
    pub online_score_id: Option<i64>,
}

/// A summary together with the still-compressed input event stream.
#[derive(Clone, Debug, PartialEq)]
pub struct ReplayPayload {
    /// Decoded summary.
    pub summary: ReplaySummary,
    /// LZMA-compressed `delta|x|y|keys` event stream.
    pub compressed_frames: Vec<u8>,
    /// Length field as stored in the file.
    pub declared_len: i32,
}

/// Parse only the summary of a replay buffer.
pub fn parse_summary(buf: &[u8]) -> RenderResult<ReplaySummary> {
    parse_payload(buf).map(|p| p.summary)
}

/// Parse a replay buffer, keeping the compressed frame data.
pub fn parse_payload(buf: &[u8]) -> RenderResult<ReplayPayload> {
    let mut r = OsrReader::new(buf);

    let mode = r.u8()?;
    let version = r.i32()?;
    let beatmap_hash = r.string()?;
    let player_name = r.string()?;
    let replay_hash = r.string()?;

    let counts = HitCounts {
        count300: r.i16()?,
        count100: r.i16()?,
        count50: r.i16()?,
        count_geki: r.i16()?,
        count_katu: r.i16()?,
        count_miss: r.i16()?,
    };
    let score = r.i32()?;
    let max_combo = r.i16()?;
    let perfect = r.u8()? == 1;
    let mods_bitmask = r.u32()?;
    let life_bar = r.string()?;
    let timestamp_ticks = r.i64()?;
    let declared_len = r.i32()?;

    // Non-positive lengths carry no frame data.
    let compressed_frames = match usize::try_from(declared_len) {
        Ok(len) if len > 0 => r.bytes(len)?.to_vec(),
        _ => Vec::new(),
    };

    let online_score_id = if r.remaining() >= 8 {
        Some(r.i64()?)
    } else {
        None
    };

    let summary = ReplaySummary {
        mode,
        mode_name: mode_name(mode),
        version,
        player_name,
        beatmap_hash,
        replay_hash,
        score,
        max_combo,
        perfect,
        mods_bitmask,
        mods: mods_from_bitmask(mods_bitmask)
            .into_iter()
            .map(str::to_string)
            .collect(),
        accuracy: accuracy(mode, &counts),
        counts,
        played_at: played_at_from_ticks(timestamp_ticks),
        life_bar_preview: life_bar.chars().take(LIFE_BAR_PREVIEW_CHARS).collect(),
        online_score_id,
    };

    Ok(ReplayPayload {
        summary,
        compressed_frames,
        declared_len,
    })
}

/// Read and parse the summary of the replay at `path`.
pub fn read_summary(path: &Path) -> RenderResult<ReplaySummary> {
    parse_summary(&read_replay_file(path)?)
}

/// Read and parse the full payload of the replay at `path`.
pub fn read_payload(path: &Path) -> RenderResult<ReplayPayload> {
    parse_payload(&read_replay_file(path)?)
}

fn read_replay_file(path: &Path) -> RenderResult<Vec<u8>> {
    use anyhow::Context as _;
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read replay '{}'", path.display()))?;
    Ok(bytes)
}

/// Convert .NET ticks to a UTC instant. Non-positive or out-of-range ticks yield `None`.
pub fn played_at_from_ticks(ticks: i64) -> Option<DateTime<Utc>> {
    if ticks <= 0 {
        return None;
    }
    let ms = (ticks - UNIX_EPOCH_TICKS) / TICKS_PER_MILLI;
    DateTime::from_timestamp_millis(ms)
}

#[cfg(test)]
#[path = "../../tests/unit/replay/parse.rs"]
mod tests;
