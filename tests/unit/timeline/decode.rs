use super::*;

struct FixedText(&'static str);

impl Decompressor for FixedText {
    fn decompress(
        &self,
        _compressed: &[u8],
        _work_dir: &Path,
        on_log: &mut dyn FnMut(&str),
    ) -> RenderResult<Vec<u8>> {
        on_log("fake decompress");
        Ok(self.0.as_bytes().to_vec())
    }
}

#[test]
fn deltas_accumulate_and_seed_entries_are_dropped() {
    let frames = parse_frames_text("0|256|192|0,-12345|0|0|7,16|260|190|1,17|270|180").unwrap();
    assert_eq!(frames.len(), 3);
    assert_eq!(frames[1].time_ms, 16.0);
    assert_eq!(frames[1].keys, 1);
    assert_eq!(frames[2].time_ms, 33.0);
    assert_eq!(frames[2].keys, 0);
}

#[test]
fn first_frame_is_normalized_to_zero() {
    let frames = parse_frames_text("250|1|2|0,10|3|4|0").unwrap();
    assert_eq!(frames[0].time_ms, 0.0);
    assert_eq!(frames[1].time_ms, 10.0);
}

#[test]
fn unparseable_and_blank_entries_are_skipped() {
    let frames = parse_frames_text(" , 5|x|2|0, 5|1|NaN|0, 5|1|2|k, 5|1|2|8 ,").unwrap();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].keys, 8);
    assert_eq!(frames[0].time_ms, 0.0);
}

#[test]
fn lone_seed_entry_has_no_cursor_frames() {
    let err = parse_frames_text("-12345|0|0|0").unwrap_err();
    assert!(matches!(err, RenderError::MalformedInput(_)));
    assert!(err.to_string().contains("no cursor frames"));
}

#[test]
fn empty_blob_is_malformed_input() {
    let err = decode_timeline(&[], Path::new("."), &FixedText("0|1|1|0"), &mut |_| {}).unwrap_err();
    assert!(matches!(err, RenderError::MalformedInput(_)));
}

#[test]
fn empty_decompressed_output_is_an_external_failure() {
    let err = decode_timeline(&[1], Path::new("."), &FixedText(""), &mut |_| {}).unwrap_err();
    assert!(matches!(err, RenderError::External(_)));
}

#[test]
fn decode_timeline_uses_the_decompressor() {
    let mut logs = Vec::new();
    let frames = decode_timeline(
        &[1, 2, 3],
        Path::new("."),
        &FixedText("0|10|20|0,20|30|40|2"),
        &mut |l| logs.push(l.to_string()),
    )
    .unwrap();
    assert_eq!(frames.len(), 2);
    assert_eq!(logs, vec!["fake decompress".to_string()]);
}

#[test]
fn missing_tools_are_an_external_failure() {
    let dir = tempfile::tempdir().unwrap();
    let d = ExternalDecompressor::new(vec![
        ToolCommand::python("replay-render-no-python", &[]),
        ToolCommand::xz("replay-render-no-xz"),
    ]);
    let err = d.decompress(&[1, 2, 3], dir.path(), &mut |_| {}).unwrap_err();
    assert!(matches!(err, RenderError::External(_)));
    assert!(err.to_string().contains("replay-render-no-xz"));
}

#[test]
fn default_candidates_prefer_python_then_xz() {
    let d = ExternalDecompressor::default();
    let kinds: Vec<ToolKind> = d.candidates().iter().map(|c| c.kind).collect();
    assert_eq!(
        kinds,
        vec![ToolKind::Python, ToolKind::Python, ToolKind::Python, ToolKind::Xz]
    );
    assert_eq!(d.candidates()[2].args_prefix, vec!["-3".to_string()]);
}
