use once_cell::sync::Lazy;
use regex::Regex;

use super::time::{MILLIS_PER_SECOND, format_millis_units, from_clock, rounded_span};
use super::{SubtitleTrack, parsed_entry};

// SRT time line; `.` is accepted as the millisecond separator on input
static TIME_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\d{1,3}):(\d{2}):(\d{2})[,.](\d{3})\s*-->\s*(\d{1,3}):(\d{2}):(\d{2})[,.](\d{3})")
        .expect("srt time pattern")
});

static BLOCK_SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n[ \t]*\n").expect("block separator"));

/// Parse `(start, end)` seconds from an SRT time line.
pub fn parse_time_line(line: &str) -> Option<(f64, f64)> {
    let caps = TIME_LINE.captures(line)?;
    let field = |i: usize| caps[i].parse::<u64>().ok();

    let start = from_clock(field(1)?, field(2)?, field(3)?, field(4)?, MILLIS_PER_SECOND);
    let end = from_clock(field(5)?, field(6)?, field(7)?, field(8)?, MILLIS_PER_SECOND);
    Some((start, end))
}

pub fn parse(text: &str) -> SubtitleTrack {
    let mut track = SubtitleTrack::new();

    for block in BLOCK_SEPARATOR.split(text) {
        let lines: Vec<&str> = block.lines().filter(|l| !l.trim().is_empty()).collect();
        if lines.is_empty() {
            continue;
        }

        // The index line is optional in the wild; the time line is not
        let Some(time_pos) = lines.iter().take(2).position(|l| TIME_LINE.is_match(l)) else {
            continue;
        };
        let Some((start, end)) = parse_time_line(lines[time_pos]) else {
            continue;
        };

        let body = lines[time_pos + 1..]
            .iter()
            .map(|l| l.trim_end())
            .collect::<Vec<_>>()
            .join("\n");

        if let Some(entry) = parsed_entry(track.len() + 1, start, end, body) {
            track.push(entry);
        }
    }

    track
}

pub fn generate(track: &SubtitleTrack) -> String {
    let mut out = String::new();
    let mut index = 0;

    for entry in track {
        let text = entry.text.trim();
        if text.is_empty() {
            continue;
        }
        index += 1;
        let (start, end) = rounded_span(entry.start, entry.end, MILLIS_PER_SECOND);

        out.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            index,
            format_millis_units(start, ','),
            format_millis_units(end, ','),
            text
        ));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subtitle::SubtitleEntry;

    #[test]
    fn test_parse_basic_blocks() {
        let text = "1\n00:00:01,000 --> 00:00:03,000\nHello\n\n2\n00:00:04,500 --> 00:00:06,250\nTwo\nlines\n";
        let track = parse(text);
        assert_eq!(track.len(), 2);
        assert_eq!(track.entries()[1].start, 4.5);
        assert_eq!(track.entries()[1].end, 6.25);
        assert_eq!(track.entries()[1].text, "Two\nlines");
    }

    #[test]
    fn test_parse_accepts_dot_separator() {
        let track = parse("1\n00:00:01.200 --> 00:00:02.300\nDots\n");
        assert_eq!(track.len(), 1);
        assert_eq!(track.entries()[0].start, 1.2);
    }

    #[test]
    fn test_malformed_blocks_are_skipped() {
        let text = "1\n00:00:01 --> 00:00:02\nNo millis\n\n2\n00:00:03,000 --> 00:00:04,000\nKept\n\n3\n00:00:05,000 --> 00:00:05,000\nZero length\n\n4\n00:00:06,000 --> 00:00:07,000\n\n";
        let track = parse(text);
        assert_eq!(track.len(), 1);
        assert_eq!(track.entries()[0].text, "Kept");
        assert_eq!(track.entries()[0].index, 1);
    }

    #[test]
    fn test_parse_without_index_line() {
        let track = parse("00:00:01,000 --> 00:00:03,000\nHello\n\n");
        assert_eq!(track.len(), 1);
        assert_eq!(track.entries()[0].text, "Hello");
    }

    #[test]
    fn test_parse_keeps_inline_markup() {
        let track = parse("1\n00:00:01,000 --> 00:00:02,000\n<b><font color=\"#FF0000\">Loud</font></b>\n");
        assert_eq!(track.entries()[0].text, "<b><font color=\"#FF0000\">Loud</font></b>");
    }

    #[test]
    fn test_round_trip_keeps_italics() {
        let track = SubtitleTrack::from(vec![
            SubtitleEntry::new(1, 1.0, 2.0, "<i>Whispering</i>").unwrap(),
            SubtitleEntry::new(2, 2.5, 4.0, "Normal and <u>underlined</u>").unwrap(),
        ]);
        assert_eq!(parse(&generate(&track)), track);
    }

    #[test]
    fn test_generate_renumbers_and_uses_comma() {
        let track = SubtitleTrack::from(vec![
            SubtitleEntry::new(5, 1.0, 2.0, "a").unwrap(),
            SubtitleEntry::new(9, 61.5, 62.0, "b").unwrap(),
        ]);
        assert_eq!(
            generate(&track),
            "1\n00:00:01,000 --> 00:00:02,000\na\n\n2\n00:01:01,500 --> 00:01:02,000\nb\n\n"
        );
    }

    #[test]
    fn test_generate_never_emits_collapsed_span() {
        let track = SubtitleTrack::from(vec![SubtitleEntry::new(1, 1.0, 1.0002, "tiny").unwrap()]);
        let out = generate(&track);
        assert!(out.contains("00:00:01,000 --> 00:00:01,001"), "{}", out);
    }
}
