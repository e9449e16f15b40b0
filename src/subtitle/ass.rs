use once_cell::sync::Lazy;
use regex::Regex;

use super::time::{CENTIS_PER_SECOND, MILLIS_PER_SECOND, format_centis_units, from_clock, rounded_span};
use super::{StyleOptions, SubtitleTrack, parsed_entry, strip_markup};

static OVERRIDE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{[^}]*\}").expect("override tag pattern"));

static ASS_TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\d+):(\d{1,2}):(\d{1,2})\.(\d{1,3})\s*$").expect("ass time pattern")
});

const STYLE_FORMAT: &str = "Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding";
const EVENT_FORMAT: &str = "Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text";

/// Column positions of the `[Events]` fields we read
#[derive(Debug, Clone, Copy)]
struct EventColumns {
    start: usize,
    end: usize,
    text: usize,
    count: usize,
}

impl Default for EventColumns {
    fn default() -> Self {
        Self { start: 1, end: 2, text: 9, count: 10 }
    }
}

impl EventColumns {
    fn from_format(line: &str) -> Self {
        let names: Vec<String> = line.split(',').map(|n| n.trim().to_ascii_lowercase()).collect();
        let find = |name: &str| names.iter().position(|n| n == name);

        match (find("start"), find("end"), find("text")) {
            (Some(start), Some(end), Some(text)) => Self { start, end, text, count: names.len() },
            _ => Self::default(),
        }
    }
}

/// `H:MM:SS.cc` to seconds; three fraction digits are read as milliseconds.
pub fn parse_time(value: &str) -> Option<f64> {
    let caps = ASS_TIME.captures(value)?;
    let hours = caps[1].parse().ok()?;
    let minutes = caps[2].parse().ok()?;
    let seconds = caps[3].parse().ok()?;

    let fraction = &caps[4];
    let millis: u64 = format!("{:0<3}", fraction).parse().ok()?;
    Some(from_clock(hours, minutes, seconds, millis, MILLIS_PER_SECOND))
}

/// Dialogue text with override blocks removed and ASS escapes resolved.
pub fn clean_text(raw: &str) -> String {
    OVERRIDE_TAG
        .replace_all(raw, "")
        .replace("\\N", "\n")
        .replace("\\n", "\n")
        .replace("\\h", " ")
        .lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn parse(text: &str) -> SubtitleTrack {
    let mut track = SubtitleTrack::new();
    let mut in_events = false;
    let mut columns = EventColumns::default();

    for line in text.lines() {
        let line = line.trim();

        if line.starts_with('[') && line.ends_with(']') {
            in_events = line.eq_ignore_ascii_case("[events]");
            continue;
        }
        if !in_events {
            continue;
        }

        if let Some(format) = line.strip_prefix("Format:") {
            columns = EventColumns::from_format(format);
            continue;
        }

        let Some(fields) = line.strip_prefix("Dialogue:") else {
            continue;
        };
        let parts: Vec<&str> = fields.splitn(columns.count, ',').collect();
        if parts.len() < columns.count {
            continue;
        }

        let (Some(start), Some(end)) = (parse_time(parts[columns.start]), parse_time(parts[columns.end])) else {
            continue;
        };

        if let Some(entry) = parsed_entry(track.len() + 1, start, end, clean_text(parts[columns.text])) {
            track.push(entry);
        }
    }

    track
}

fn header(style: &StyleOptions) -> String {
    format!(
        "[Script Info]\n\
         ; Generated by amarelo\n\
         ScriptType: v4.00+\n\
         PlayResX: 384\n\
         PlayResY: 288\n\
         WrapStyle: 0\n\
         ScaledBorderAndShadow: yes\n\
         \n\
         [V4+ Styles]\n\
         {}\n\
         Style: Default,{},{},{},&H000000FF,&H00000000,&H80000000,{},0,0,0,100,100,0,0,1,2,1,2,10,10,10,1\n\
         \n\
         [Events]\n\
         {}\n",
        STYLE_FORMAT,
        style.font_name,
        style.font_size,
        style.color().to_ass_style(),
        if style.bold { -1 } else { 0 },
        EVENT_FORMAT,
    )
}

/// Inline override block repeating the requested style on each line.
fn override_block(style: &StyleOptions) -> String {
    let mut tags = String::new();
    if style.bold {
        tags.push_str("\\b1");
    }
    if style.has_custom_color() {
        tags.push_str("\\c");
        tags.push_str(&style.color().to_ass_inline());
    }

    if tags.is_empty() {
        String::new()
    } else {
        format!("{{{}}}", tags)
    }
}

/// Entry text as a `Dialogue:` field.
///
/// HTML-style markup from SRT/VTT has no meaning here, and a literal brace
/// would open an override block on re-parse.
fn dialogue_text(text: &str) -> String {
    strip_markup(text).replace('{', "(").replace('}', ")").replace('\n', "\\N")
}

/// Serialize `track` with a `Default` style built from `style`.
///
/// `inline_overrides` additionally prefixes every dialogue line with the
/// colour/weight override tags so players that ignore the style table still
/// render them.
pub fn generate(track: &SubtitleTrack, style: &StyleOptions, inline_overrides: bool) -> String {
    let mut out = header(style);
    let prefix = if inline_overrides { override_block(style) } else { String::new() };

    for entry in track {
        let text = entry.text.trim();
        if text.is_empty() {
            continue;
        }
        let (start, end) = rounded_span(entry.start, entry.end, CENTIS_PER_SECOND);

        out.push_str(&format!(
            "Dialogue: 0,{},{},Default,,0,0,0,,{}{}\n",
            format_centis_units(start),
            format_centis_units(end),
            prefix,
            dialogue_text(text)
        ));
    }

    out
}
