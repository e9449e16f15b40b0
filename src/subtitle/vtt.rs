use once_cell::sync::Lazy;
use regex::Regex;

use super::time::{MILLIS_PER_SECOND, format_millis_units, from_clock, rounded_span};
use super::{SubtitleTrack, parsed_entry};

// Hours are optional in WebVTT; anything after the end time is cue settings
static CUE_TIMING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:(\d+):)?(\d{2}):(\d{2})\.(\d{3})\s*-->\s*(?:(\d+):)?(\d{2}):(\d{2})\.(\d{3})")
        .expect("vtt timing pattern")
});

fn parse_timing(line: &str) -> Option<(f64, f64)> {
    let caps = CUE_TIMING.captures(line)?;
    let field = |i: usize| -> Option<u64> {
        match caps.get(i) {
            Some(m) => m.as_str().parse().ok(),
            None => Some(0),
        }
    };

    let start = from_clock(field(1)?, field(2)?, field(3)?, field(4)?, MILLIS_PER_SECOND);
    let end = from_clock(field(5)?, field(6)?, field(7)?, field(8)?, MILLIS_PER_SECOND);
    Some((start, end))
}

pub fn parse(text: &str) -> SubtitleTrack {
    let mut track = SubtitleTrack::new();
    let lines: Vec<&str> = text.lines().collect();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i].trim();

        // NOTE and STYLE blocks run until the next blank line
        if line.starts_with("NOTE") || line == "STYLE" || line == "REGION" {
            while i < lines.len() && !lines[i].trim().is_empty() {
                i += 1;
            }
            continue;
        }

        let Some((start, end)) = parse_timing(line) else {
            i += 1;
            continue;
        };

        let mut body = Vec::new();
        i += 1;
        while i < lines.len() && !lines[i].trim().is_empty() {
            body.push(lines[i].trim());
            i += 1;
        }

        if let Some(entry) = parsed_entry(track.len() + 1, start, end, body.join("\n")) {
            track.push(entry);
        }
    }

    track
}

pub fn generate(track: &SubtitleTrack) -> String {
    let mut out = String::from("WEBVTT\n\n");

    for entry in track {
        let text = entry.text.trim();
        if text.is_empty() {
            continue;
        }
        let (start, end) = rounded_span(entry.start, entry.end, MILLIS_PER_SECOND);

        out.push_str(&format!(
            "{} --> {}\n{}\n\n",
            format_millis_units(start, '.'),
            format_millis_units(end, '.'),
            text
        ));
    }

    out
}
