use super::*;

fn frame(time_ms: f64, x: f64, y: f64, keys: u32) -> InputFrame {
    InputFrame { time_ms, x, y, keys }
}

fn canvas() -> Canvas {
    Canvas::new(1280, 720).unwrap()
}

#[test]
fn ass_time_rounds_to_centiseconds() {
    assert_eq!(format_ass_time(0.0), "0:00:00.00");
    assert_eq!(format_ass_time(1234.0), "0:00:01.23");
    assert_eq!(format_ass_time(1235.0), "0:00:01.24");
    assert_eq!(format_ass_time(3_723_450.0), "1:02:03.45");
    assert_eq!(format_ass_time(-500.0), "0:00:00.00");
    assert_eq!(format_ass_time(f64::NAN), "0:00:00.00");
}

#[test]
fn text_is_sanitized() {
    assert_eq!(sanitize_ass_text("a\\b {c}\r\nd\ne"), "a/b c d e");
}

#[test]
fn hud_lines_skip_empty_and_cap_at_three() {
    let hud = vec![
        "first".to_string(),
        String::new(),
        "third".to_string(),
        "fourth".to_string(),
    ];
    let script = OverlayScript::build(
        &OverlayInput {
            canvas: canvas(),
            duration_ms: 3000.0,
            samples: &[],
            raw_frames: &[],
            hud_lines: &hud,
        },
        &OverlayOptions::default(),
    );
    let texts: Vec<&str> = script.events().iter().map(|e| e.text.as_str()).collect();
    assert_eq!(
        texts,
        vec!["{\\an7\\pos(24,28)}first", "{\\an7\\pos(24,56)}third"]
    );
    assert!(script.events().iter().all(|e| e.end_ms == 3000.0 && e.layer == 10));
}

#[test]
fn script_end_has_a_floor() {
    let script = OverlayScript::build(
        &OverlayInput {
            canvas: canvas(),
            duration_ms: 200.2,
            samples: &[],
            raw_frames: &[],
            hud_lines: &[],
        },
        &OverlayOptions::default(),
    );
    assert_eq!(script.end_ms(), 1500.0);
    assert!(
        script
            .to_ass()
            .ends_with("Comment: 0,0:00:00.00,0:00:01.50,Hud,,0,0,0,,generated-by=replay-render\n")
    );
}

#[test]
fn cursor_events_move_or_hold() {
    let samples = [
        frame(0.0, 0.0, 0.0, 0),
        frame(0.0, 0.0, 0.0, 0),
        frame(16.0, 512.0, 384.0, 0),
    ];
    let script = OverlayScript::build(
        &OverlayInput {
            canvas: canvas(),
            duration_ms: 3000.0,
            samples: &samples,
            raw_frames: &[],
            hud_lines: &[],
        },
        &OverlayOptions::default(),
    );
    let ev = script.events();
    assert_eq!(ev.len(), 2);
    assert_eq!(ev[0].text, "{\\an5\\pos(160,0)}@");
    assert_eq!((ev[0].start_ms, ev[0].end_ms), (0.0, 1.0));
    assert_eq!(ev[1].text, "{\\an5\\move(160,0,1120,720)}@");
    assert_eq!((ev[1].layer, ev[1].end_ms), (2, 16.0));
}

#[test]
fn key_pulses_fire_on_rising_edges_only() {
    let mapping = PlayfieldMapping::new(canvas());
    let frames = [
        frame(0.0, 0.0, 0.0, 0),
        frame(10.0, 0.0, 0.0, 1),
        frame(20.0, 0.0, 0.0, 1 | 4),
        frame(30.0, 0.0, 0.0, 4),
        frame(40.0, 0.0, 0.0, 1 | 4 | 8),
    ];
    let labels: Vec<(f64, &str)> = key_pulses(&frames, &mapping)
        .iter()
        .map(|p| (p.time_ms, p.key.label))
        .collect();
    assert_eq!(labels, vec![(10.0, "M1"), (20.0, "K1"), (40.0, "M1"), (40.0, "K2")]);
}

#[test]
fn pulse_and_label_events_use_key_colour() {
    let frames = [frame(0.0, 256.0, 192.0, 0), frame(100.0, 256.0, 192.0, 2)];
    let script = OverlayScript::build(
        &OverlayInput {
            canvas: canvas(),
            duration_ms: 3000.0,
            samples: &[],
            raw_frames: &frames,
            hud_lines: &[],
        },
        &OverlayOptions::default(),
    );
    let ev = script.events();
    assert_eq!(ev.len(), 2);
    assert_eq!(ev[0].style, OverlayStyle::Pulse);
    assert_eq!(ev[0].text, "{\\an5\\pos(640,360)\\1c&HFF8A00&\\fad(0,120)}*");
    assert_eq!((ev[0].start_ms, ev[0].end_ms), (100.0, 240.0));
    assert_eq!(ev[1].text, "{\\an5\\pos(640,336)\\1c&HFF8A00&\\fad(0,160)}M2");
    assert_eq!((ev[1].layer, ev[1].end_ms), (4, 340.0));

    let hidden = OverlayScript::build(
        &OverlayInput {
            canvas: canvas(),
            duration_ms: 3000.0,
            samples: &[],
            raw_frames: &frames,
            hud_lines: &[],
        },
        &OverlayOptions {
            show_key_overlay: false,
            ..OverlayOptions::default()
        },
    );
    assert!(hidden.events().is_empty());
}

#[test]
fn document_has_all_sections_and_styles() {
    let script = OverlayScript::build(
        &OverlayInput {
            canvas: canvas(),
            duration_ms: 4000.0,
            samples: &[],
            raw_frames: &[],
            hud_lines: &["hud".to_string()],
        },
        &OverlayOptions {
            cursor_size_percent: 200,
            ..OverlayOptions::default()
        },
    );
    let ass = script.to_ass();
    assert!(ass.starts_with("[Script Info]\nScriptType: v4.00+\nPlayResX: 1280\nPlayResY: 720\n"));
    for needle in [
        "[V4+ Styles]",
        "Style: Cursor,Arial,68,",
        "Style: Pulse,Arial,62,",
        "Style: KeyLabel,Consolas,20,",
        "Style: Hud,Consolas,18,&H00F4F7FF,",
        "[Events]",
        "Dialogue: 10,0:00:00.00,0:00:04.00,Hud,,0,0,0,,{\\an7\\pos(24,28)}hud",
    ] {
        assert!(ass.contains(needle), "missing {needle}");
    }
}
