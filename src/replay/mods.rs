//! Mod labels and per-discipline accuracy.

use crate::foundation::core::round2;

/// Ordered `(bit, label)` table used to expand a mods bitmask.
pub const MOD_FLAGS: [(u32, &str); 30] = [
    (0, "NF"),
    (1, "EZ"),
    (3, "HD"),
    (4, "HR"),
    (5, "SD"),
    (6, "DT"),
    (7, "RX"),
    (8, "HT"),
    (9, "NC"),
    (10, "FL"),
    (11, "AT"),
    (12, "SO"),
    (13, "AP"),
    (14, "PF"),
    (15, "4K"),
    (16, "5K"),
    (17, "6K"),
    (18, "7K"),
    (19, "8K"),
    (20, "FI"),
    (21, "RN"),
    (22, "CN"),
    (23, "TP"),
    (24, "9K"),
    (25, "CP"),
    (26, "1K"),
    (27, "3K"),
    (28, "2K"),
    (29, "SV2"),
    (30, "MR"),
];

/// Game mode a replay was recorded in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Discipline {
    /// osu!standard (mode 0).
    Standard,
    /// osu!taiko (mode 1).
    Taiko,
    /// osu!catch (mode 2).
    Catch,
    /// osu!mania (mode 3).
    Mania,
}

impl Discipline {
    /// Map a raw mode byte to a discipline. Unknown bytes yield `None`.
    pub fn from_mode(mode: u8) -> Option<Self> {
        match mode {
            0 => Some(Self::Standard),
            1 => Some(Self::Taiko),
            2 => Some(Self::Catch),
            3 => Some(Self::Mania),
            _ => None,
        }
    }

    /// Human-readable mode name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Standard => "osu!standard",
            Self::Taiko => "osu!taiko",
            Self::Catch => "osu!catch",
            Self::Mania => "osu!mania",
        }
    }
}

/// Display name for a raw mode byte (`mode-N` for unknown values).
pub fn mode_name(mode: u8) -> String {
    Discipline::from_mode(mode)
        .map(|d| d.name().to_string())
        .unwrap_or_else(|| format!("mode-{mode}"))
}

/// The six hit-count tallies stored in a replay.
///
/// Field meaning depends on the discipline (e.g. `geki`/`katu` are MAX/200 in mania).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HitCounts {
    /// 300s (best judgement).
    pub count300: i16,
    /// 100s.
    pub count100: i16,
    /// 50s.
    pub count50: i16,
    /// Gekis.
    pub count_geki: i16,
    /// Katus.
    pub count_katu: i16,
    /// Misses.
    pub count_miss: i16,
}

/// Expand a mods bitmask into its labels.
///
/// NC supersedes DT and PF supersedes SD: the superseded label is dropped whenever both are set.
pub fn mods_from_bitmask(mask: u32) -> Vec<&'static str> {
    let mut mods: Vec<&'static str> = MOD_FLAGS
        .iter()
        .filter(|(bit, _)| mask & (1u32 << bit) != 0)
        .map(|(_, label)| *label)
        .collect();

    if mods.contains(&"NC") {
        mods.retain(|m| *m != "DT");
    }
    if mods.contains(&"PF") {
        mods.retain(|m| *m != "SD");
    }
    mods
}

/// Accuracy percentage for `mode`, rounded to two decimals.
///
/// Returns `None` for unknown modes and when the mode's judgement total is zero.
pub fn accuracy(mode: u8, counts: &HitCounts) -> Option<f64> {
    let c300 = f64::from(counts.count300);
    let c100 = f64::from(counts.count100);
    let c50 = f64::from(counts.count50);
    let geki = f64::from(counts.count_geki);
    let katu = f64::from(counts.count_katu);
    let miss = f64::from(counts.count_miss);

    let (numerator, total) = match Discipline::from_mode(mode)? {
        Discipline::Standard => (
            (c50 * 50.0 + c100 * 100.0 + c300 * 300.0) / 300.0,
            c300 + c100 + c50 + miss,
        ),
        Discipline::Taiko => ((c100 * 150.0 + c300 * 300.0) / 300.0, c300 + c100 + miss),
        Discipline::Catch => (c300 + c100 + c50, c300 + c100 + c50 + katu + miss),
        Discipline::Mania => (
            (c50 * 50.0 + c100 * 100.0 + katu * 200.0 + (c300 + geki) * 300.0) / 300.0,
            c300 + c100 + c50 + geki + katu + miss,
        ),
    };

    if total == 0.0 {
        return None;
    }
    Some(round2(numerator / total * 100.0))
}

#[cfg(test)]
#[path = "../../tests/unit/replay/mods.rs"]
mod tests;
