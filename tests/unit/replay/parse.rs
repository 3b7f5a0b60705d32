use super::*;

struct Fixture {
    mode: u8,
    player: &'static str,
    counts: [i16; 6],
    mods: u32,
    life_bar: String,
    ticks: i64,
    frames: Vec<u8>,
    online_id: Option<i64>,
}

impl Default for Fixture {
    fn default() -> Self {
        Self {
            mode: 0,
            player: "cookiezi",
            counts: [100, 0, 0, 0, 0, 0],
            mods: 0,
            life_bar: "0|1,".to_string(),
            ticks: 638_000_000_000_000_000,
            frames: vec![1, 2, 3, 4],
            online_id: Some(4_242),
        }
    }
}

fn push_string(out: &mut Vec<u8>, s: &str) {
    if s.is_empty() {
        out.push(0x00);
        return;
    }
    out.push(0x0b);
    let mut len = s.len();
    loop {
        let mut byte = (len & 0x7f) as u8;
        len >>= 7;
        if len != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if len == 0 {
            break;
        }
    }
    out.extend_from_slice(s.as_bytes());
}

impl Fixture {
    fn to_bytes(&self) -> Vec<u8> {
        let mut out = vec![self.mode];
        out.extend_from_slice(&20_240_101i32.to_le_bytes());
        push_string(&mut out, "d41d8cd98f00b204e9800998ecf8427e");
        push_string(&mut out, self.player);
        push_string(&mut out, "0123456789abcdef0123456789abcdef");
        for c in self.counts {
            out.extend_from_slice(&c.to_le_bytes());
        }
        out.extend_from_slice(&727_000i32.to_le_bytes());
        out.extend_from_slice(&512i16.to_le_bytes());
        out.push(1);
        out.extend_from_slice(&self.mods.to_le_bytes());
        push_string(&mut out, &self.life_bar);
        out.extend_from_slice(&self.ticks.to_le_bytes());
        out.extend_from_slice(&(self.frames.len() as i32).to_le_bytes());
        out.extend_from_slice(&self.frames);
        if let Some(id) = self.online_id {
            out.extend_from_slice(&id.to_le_bytes());
        }
        out
    }
}

#[test]
fn summary_fields_are_decoded_in_order() {
    let s = parse_summary(&Fixture::default().to_bytes()).unwrap();
    assert_eq!(s.mode, 0);
    assert_eq!(s.mode_name, "osu!standard");
    assert_eq!(s.version, 20_240_101);
    assert_eq!(s.player_name, "cookiezi");
    assert_eq!(s.beatmap_hash, "d41d8cd98f00b204e9800998ecf8427e");
    assert_eq!(s.replay_hash, "0123456789abcdef0123456789abcdef");
    assert_eq!(s.counts.count300, 100);
    assert_eq!(s.score, 727_000);
    assert_eq!(s.max_combo, 512);
    assert!(s.perfect);
    assert_eq!(s.accuracy, Some(100.0));
    assert_eq!(s.life_bar_preview, "0|1,");
    assert_eq!(s.online_score_id, Some(4_242));
    assert!(s.played_at.is_some());
}

#[test]
fn payload_keeps_compressed_frames() {
    let p = parse_payload(&Fixture::default().to_bytes()).unwrap();
    assert_eq!(p.compressed_frames, vec![1, 2, 3, 4]);
    assert_eq!(p.declared_len, 4);
}

#[test]
fn parse_is_deterministic() {
    let bytes = Fixture {
        mods: (1 << 6) | (1 << 9),
        ..Fixture::default()
    }
    .to_bytes();
    assert_eq!(parse_summary(&bytes).unwrap(), parse_summary(&bytes).unwrap());
    assert_eq!(parse_summary(&bytes).unwrap().mods, vec!["NC".to_string()]);
}

#[test]
fn empty_frame_blob_is_valid() {
    let p = parse_payload(
        &Fixture {
            frames: Vec::new(),
            ..Fixture::default()
        }
        .to_bytes(),
    )
    .unwrap();
    assert!(p.compressed_frames.is_empty());
    assert_eq!(p.summary.online_score_id, Some(4_242));
}

#[test]
fn online_score_id_requires_eight_trailing_bytes() {
    let mut bytes = Fixture {
        online_id: None,
        ..Fixture::default()
    }
    .to_bytes();
    bytes.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7]);
    let s = parse_summary(&bytes).unwrap();
    assert_eq!(s.online_score_id, None);
}

#[test]
fn truncated_buffer_is_an_error_not_a_partial_summary() {
    let bytes = Fixture::default().to_bytes();
    // Cut inside the compressed frame blob.
    let cut = bytes.len() - 8 - 2;
    let err = parse_summary(&bytes[..cut]).unwrap_err();
    assert!(matches!(err, crate::RenderError::MalformedInput(_)));

    for len in [0, 1, 5, 20] {
        assert!(parse_summary(&bytes[..len]).is_err());
    }
}

#[test]
fn invalid_string_marker_is_an_error() {
    let mut bytes = Fixture::default().to_bytes();
    // First string marker follows mode (1) + version (4).
    bytes[5] = 0x0a;
    let err = parse_summary(&bytes).unwrap_err();
    assert!(err.to_string().contains("invalid string marker"));
}

#[test]
fn life_bar_preview_is_truncated_to_120_chars() {
    let s = parse_summary(
        &Fixture {
            life_bar: "é".repeat(300),
            ..Fixture::default()
        }
        .to_bytes(),
    )
    .unwrap();
    assert_eq!(s.life_bar_preview.chars().count(), LIFE_BAR_PREVIEW_CHARS);
}

#[test]
fn non_positive_ticks_have_no_timestamp() {
    let s = parse_summary(
        &Fixture {
            ticks: 0,
            ..Fixture::default()
        }
        .to_bytes(),
    )
    .unwrap();
    assert_eq!(s.played_at, None);
    assert_eq!(played_at_from_ticks(-5), None);
}

#[test]
fn ticks_convert_to_unix_time() {
    let at = played_at_from_ticks(UNIX_EPOCH_TICKS + 15_000 * TICKS_PER_MILLI).unwrap();
    assert_eq!(at.timestamp_millis(), 15_000);
}
