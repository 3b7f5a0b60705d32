use std::fmt::Write as _;

use crate::foundation::core::Canvas;
use crate::overlay::playfield::PlayfieldMapping;
use crate::timeline::decode::InputFrame;
use crate::timeline::resample::Sample;

/// Minimum length of a generated script, in milliseconds.
pub const MIN_SCRIPT_MS: f64 = 1500.0;
/// Maximum number of HUD lines drawn.
pub const MAX_HUD_LINES: usize = 3;
/// Marker written into the trailing comment line.
pub const GENERATOR_TAG: &str = "generated-by=replay-render";

const PULSE_MS: f64 = 140.0;
const LABEL_MS: f64 = 240.0;
const LABEL_OFFSET_PX: i64 = 24;
const CURSOR_FONT_SIZE: f64 = 34.0;

/// A tracked key bit with its label and overlay colour (ASS `BBGGRR`-ordered hex as emitted).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyBinding {
    /// Bit in the key mask.
    pub bit: u32,
    /// Short label.
    pub label: &'static str,
    /// Colour hex used in the `\1c` override.
    pub color: &'static str,
}

/// Keys drawn by the key overlay, in emission order.
pub const KEY_BINDINGS: [KeyBinding; 4] = [
    KeyBinding {
        bit: 1,
        label: "M1",
        color: "00F5FF",
    },
    KeyBinding {
        bit: 2,
        label: "M2",
        color: "FF8A00",
    },
    KeyBinding {
        bit: 4,
        label: "K1",
        color: "6BFF7A",
    },
    KeyBinding {
        bit: 8,
        label: "K2",
        color: "FF4DB8",
    },
];

/// Format milliseconds as an ASS timestamp `H:MM:SS.CC` (rounded centiseconds, negatives clamp
/// to zero).
pub fn format_ass_time(ms: f64) -> String {
    let total_cs = if ms.is_finite() {
        (ms / 10.0).round().max(0.0) as u64
    } else {
        0
    };
    let cs = total_cs % 100;
    let total_sec = total_cs / 100;
    let sec = total_sec % 60;
    let total_min = total_sec / 60;
    format!("{}:{:02}:{:02}.{cs:02}", total_min / 60, total_min % 60, sec)
}

/// Make free text safe for an ASS dialogue line.
pub fn sanitize_ass_text(text: &str) -> String {
    text.replace('\\', "/")
        .replace(['{', '}'], "")
        .replace("\r\n", " ")
        .replace('\n', " ")
}

/// Named styles declared in the script header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OverlayStyle {
    /// Cursor glyph.
    Cursor,
    /// Key press burst.
    Pulse,
    /// Key name above a pulse.
    KeyLabel,
    /// Top-left information lines.
    Hud,
}

impl OverlayStyle {
    /// Style name as referenced by events.
    pub fn name(self) -> &'static str {
        match self {
            Self::Cursor => "Cursor",
            Self::Pulse => "Pulse",
            Self::KeyLabel => "KeyLabel",
            Self::Hud => "Hud",
        }
    }
}

/// One timed drawable.
#[derive(Clone, Debug, PartialEq)]
pub struct OverlayEvent {
    /// Z-order; higher draws on top.
    pub layer: u32,
    /// Start time in ms.
    pub start_ms: f64,
    /// End time in ms.
    pub end_ms: f64,
    /// Style.
    pub style: OverlayStyle,
    /// Text including override tags.
    pub text: String,
}

impl OverlayEvent {
    fn dialogue_line(&self) -> String {
        format!(
            "Dialogue: {},{},{},{},,0,0,0,,{}",
            self.layer,
            format_ass_time(self.start_ms),
            format_ass_time(self.end_ms),
            self.style.name(),
            self.text
        )
    }
}

/// A key bit that went from released to pressed at a frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KeyPulse {
    /// Frame time in ms.
    pub time_ms: f64,
    /// Mapped pixel position of the cursor at the press.
    pub pos: (i64, i64),
    /// Which key.
    pub key: KeyBinding,
}

/// Rising edges of every tracked key bit, in frame order.
pub fn key_pulses(frames: &[InputFrame], mapping: &PlayfieldMapping) -> Vec<KeyPulse> {
    let mut pulses = Vec::new();
    let mut prev = 0u32;
    for f in frames {
        let pressed = f.keys & !prev;
        if pressed != 0 {
            let pos = mapping.map(f.x, f.y);
            for key in KEY_BINDINGS.iter().filter(|k| pressed & k.bit != 0) {
                pulses.push(KeyPulse {
                    time_ms: f.time_ms,
                    pos,
                    key: *key,
                });
            }
        }
        prev = f.keys;
    }
    pulses
}

/// Toggles and sizes applied while building a script.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OverlayOptions {
    /// Draw key pulses and labels.
    pub show_key_overlay: bool,
    /// Cursor glyph size relative to the default, in percent.
    pub cursor_size_percent: u32,
}

impl Default for OverlayOptions {
    fn default() -> Self {
        Self {
            show_key_overlay: true,
            cursor_size_percent: 100,
        }
    }
}

/// Everything a script is built from.
#[derive(Clone, Copy, Debug)]
pub struct OverlayInput<'a> {
    /// Output resolution.
    pub canvas: Canvas,
    /// Video duration in ms.
    pub duration_ms: f64,
    /// Resampled cursor path.
    pub samples: &'a [Sample],
    /// Raw frames, used for key edges.
    pub raw_frames: &'a [InputFrame],
    /// Information lines; empty lines are skipped.
    pub hud_lines: &'a [String],
}

/// A complete overlay: header parameters plus ordered events.
#[derive(Clone, Debug, PartialEq)]
pub struct OverlayScript {
    canvas: Canvas,
    end_ms: f64,
    cursor_font_size: u32,
    events: Vec<OverlayEvent>,
}

impl OverlayScript {
    /// Build HUD, cursor and key events.
    #[tracing::instrument(skip_all, fields(samples = input.samples.len()))]
    pub fn build(input: &OverlayInput<'_>, opts: &OverlayOptions) -> Self {
        let mapping = PlayfieldMapping::new(input.canvas);
        let end_ms = MIN_SCRIPT_MS.max(input.duration_ms.ceil());
        let mut events = Vec::new();

        for (i, line) in input
            .hud_lines
            .iter()
            .take(MAX_HUD_LINES)
            .filter(|l| !l.is_empty())
            .enumerate()
        {
            events.push(OverlayEvent {
                layer: 10,
                start_ms: 0.0,
                end_ms,
                style: OverlayStyle::Hud,
                text: format!(
                    "{{\\an7\\pos(24,{})}}{}",
                    28 + i * 28,
                    sanitize_ass_text(line)
                ),
            });
        }

        for pair in input.samples.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            let start_ms = a.time_ms.max(0.0);
            let (x1, y1) = mapping.map(a.x, a.y);
            let (x2, y2) = mapping.map(b.x, b.y);
            let text = if (x1, y1) != (x2, y2) {
                format!("{{\\an5\\move({x1},{y1},{x2},{y2})}}@")
            } else {
                format!("{{\\an5\\pos({x1},{y1})}}@")
            };
            events.push(OverlayEvent {
                layer: 2,
                start_ms,
                end_ms: (start_ms + 1.0).max(b.time_ms),
                style: OverlayStyle::Cursor,
                text,
            });
        }

        if opts.show_key_overlay {
            for p in key_pulses(input.raw_frames, &mapping) {
                let (x, y) = p.pos;
                events.push(OverlayEvent {
                    layer: 3,
                    start_ms: p.time_ms,
                    end_ms: p.time_ms + PULSE_MS,
                    style: OverlayStyle::Pulse,
                    text: format!("{{\\an5\\pos({x},{y})\\1c&H{}&\\fad(0,120)}}*", p.key.color),
                });
                events.push(OverlayEvent {
                    layer: 4,
                    start_ms: p.time_ms,
                    end_ms: p.time_ms + LABEL_MS,
                    style: OverlayStyle::KeyLabel,
                    text: format!(
                        "{{\\an5\\pos({x},{})\\1c&H{}&\\fad(0,160)}}{}",
                        y - LABEL_OFFSET_PX,
                        p.key.color,
                        p.key.label
                    ),
                });
            }
        }

        let cursor_font_size =
            (CURSOR_FONT_SIZE * f64::from(opts.cursor_size_percent) / 100.0).round().max(1.0) as u32;

        Self {
            canvas: input.canvas,
            end_ms,
            cursor_font_size,
            events,
        }
    }

    /// Script end time in ms.
    pub fn end_ms(&self) -> f64 {
        self.end_ms
    }

    /// Events in emission order.
    pub fn events(&self) -> &[OverlayEvent] {
        &self.events
    }

    /// Serialize as an ASS (v4.00+) document.
    pub fn to_ass(&self) -> String {
        let mut out = String::new();
        out.push_str("[Script Info]\n");
        out.push_str("ScriptType: v4.00+\n");
        let _ = writeln!(out, "PlayResX: {}", self.canvas.width);
        let _ = writeln!(out, "PlayResY: {}", self.canvas.height);
        out.push_str("ScaledBorderAndShadow: yes\nWrapStyle: 2\nYCbCr Matrix: TV.709\n\n");

        out.push_str("[V4+ Styles]\n");
        out.push_str(
            "Format: Name,Fontname,Fontsize,PrimaryColour,SecondaryColour,OutlineColour,BackColour,\
             Bold,Italic,Underline,StrikeOut,ScaleX,ScaleY,Spacing,Angle,BorderStyle,Outline,Shadow,\
             Alignment,MarginL,MarginR,MarginV,Encoding\n",
        );
        let _ = writeln!(
            out,
            "Style: Cursor,Arial,{},&H00FFFFFF,&H000000FF,&H00303030,&H00000000,-1,0,0,0,100,100,0,0,1,2,0,5,20,20,20,1",
            self.cursor_font_size
        );
        out.push_str(
            "Style: Pulse,Arial,62,&H00FFFFFF,&H000000FF,&H00000000,&H00000000,-1,0,0,0,100,100,0,0,1,0,0,5,20,20,20,1\n",
        );
        out.push_str(
            "Style: KeyLabel,Consolas,20,&H00FFFFFF,&H000000FF,&H001A1A1A,&H00000000,-1,0,0,0,100,100,0,0,1,1,0,5,20,20,20,1\n",
        );
        out.push_str(
            "Style: Hud,Consolas,18,&H00F4F7FF,&H000000FF,&H00303030,&H00000000,0,0,0,0,100,100,0,0,1,1,0,7,18,18,18,1\n\n",
        );

        out.push_str("[Events]\n");
        out.push_str("Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text\n");
        for ev in &self.events {
            out.push_str(&ev.dialogue_line());
            out.push('\n');
        }
        let _ = writeln!(
            out,
            "Comment: 0,0:00:00.00,{},Hud,,0,0,0,,{GENERATOR_TAG}",
            format_ass_time(self.end_ms)
        );
        out
    }
}

#[cfg(test)]
#[path = "../../tests/unit/overlay/script.rs"]
mod tests;
