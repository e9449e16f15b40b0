// Timed-text model and subtitle codec
//
// - mod.rs: SubtitleEntry / SubtitleTrack model and the SubtitleCodec facade
// - srt.rs, ass.rs, vtt.rs: per-format parse and generate
// - style.rs: style options, colour conversion and inline markup
// - time.rs: fixed-point timestamp conversion

pub mod ass;
pub mod srt;
pub mod style;
pub mod time;
pub mod vtt;

use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tracing::{debug, info};

use crate::error::{AmareloError, Result};

pub use style::{Rgb, StyleOptions, apply_markup, strip_markup};

/// One timed line of subtitle text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleEntry {
    pub index: usize,
    /// Seconds
    pub start: f64,
    /// Seconds
    pub end: f64,
    pub text: String,
    /// Text before translation, when the entry was translated
    pub original_text: Option<String>,
    pub confidence: Option<f32>,
}

impl SubtitleEntry {
    /// Build an entry, enforcing `0 <= start < end` and non-empty text.
    pub fn new(index: usize, start: f64, end: f64, text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        if !start.is_finite() || !end.is_finite() || start < 0.0 {
            return Err(AmareloError::Subtitle(format!(
                "Invalid timestamps for entry {}: {} --> {}",
                index, start, end
            )));
        }
        if end <= start {
            return Err(AmareloError::Subtitle(format!(
                "Invalid time range for entry {}: end {} <= start {}",
                index, end, start
            )));
        }
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(AmareloError::Subtitle(format!("Empty subtitle text for entry {}", index)));
        }

        Ok(Self {
            index,
            start,
            end,
            text: trimmed.to_string(),
            original_text: None,
            confidence: None,
        })
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Copy of this entry with a different time range.
    pub fn with_timing(&self, start: f64, end: f64) -> Self {
        Self {
            start,
            end,
            ..self.clone()
        }
    }
}

/// Ordered sequence of entries for one media file
///
/// Stages never mutate a track they were handed; they build a new one so the
/// before/after pair can always be compared.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubtitleTrack {
    entries: Vec<SubtitleEntry>,
}

impl SubtitleTrack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[SubtitleEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SubtitleEntry> {
        self.entries.iter()
    }

    pub fn first(&self) -> Option<&SubtitleEntry> {
        self.entries.first()
    }

    pub fn last(&self) -> Option<&SubtitleEntry> {
        self.entries.last()
    }

    /// Append in presentation order, renumbering the entry.
    pub fn push(&mut self, mut entry: SubtitleEntry) {
        entry.index = self.entries.len() + 1;
        self.entries.push(entry);
    }

    /// New track with every entry's text replaced, timing untouched.
    pub fn map_text<F>(&self, mut f: F) -> Self
    where
        F: FnMut(&str) -> String,
    {
        Self {
            entries: self
                .entries
                .iter()
                .map(|entry| SubtitleEntry {
                    text: f(&entry.text),
                    ..entry.clone()
                })
                .collect(),
        }
    }
}

impl From<Vec<SubtitleEntry>> for SubtitleTrack {
    fn from(entries: Vec<SubtitleEntry>) -> Self {
        let mut track = Self::new();
        for entry in entries {
            track.push(entry);
        }
        track
    }
}

impl<'a> IntoIterator for &'a SubtitleTrack {
    type Item = &'a SubtitleEntry;
    type IntoIter = std::slice::Iter<'a, SubtitleEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubtitleFormat {
    Srt,
    Ass,
    Vtt,
}

impl SubtitleFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "srt" => Some(Self::Srt),
            "ass" | "ssa" => Some(Self::Ass),
            "vtt" => Some(Self::Vtt),
            _ => None,
        }
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
            .ok_or_else(|| AmareloError::UnsupportedFormat(path.display().to_string()))
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Srt => "srt",
            Self::Ass => "ass",
            Self::Vtt => "vtt",
        }
    }
}

impl std::fmt::Display for SubtitleFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Parses and serializes subtitle text in every supported format
#[derive(Debug, Clone, Default)]
pub struct SubtitleCodec {
    /// Style used for the ASS header when the caller asks for no styling
    base_style: StyleOptions,
}

impl SubtitleCodec {
    pub fn new(base_style: StyleOptions) -> Self {
        Self { base_style }
    }

    pub fn parse(&self, text: &str, format: SubtitleFormat) -> SubtitleTrack {
        let text = normalize_input(text);
        let track = match format {
            SubtitleFormat::Srt => srt::parse(&text),
            SubtitleFormat::Ass => ass::parse(&text),
            SubtitleFormat::Vtt => vtt::parse(&text),
        };
        debug!("Parsed {} {} entries", track.len(), format);
        track
    }

    /// Serialize `track`; `style` adds inline styling on top of the format's defaults.
    pub fn generate(&self, track: &SubtitleTrack, format: SubtitleFormat, style: Option<&StyleOptions>) -> String {
        match format {
            SubtitleFormat::Srt => srt::generate(track),
            SubtitleFormat::Vtt => vtt::generate(track),
            SubtitleFormat::Ass => {
                ass::generate(track, style.unwrap_or(&self.base_style), style.is_some())
            }
        }
    }

    pub async fn read_file<P: AsRef<Path>>(&self, path: P) -> Result<SubtitleTrack> {
        let path = path.as_ref();
        let format = SubtitleFormat::from_path(path)?;
        let bytes = fs::read(path).await?;
        let text = String::from_utf8_lossy(&bytes);
        Ok(self.parse(&text, format))
    }

    pub async fn write_file<P: AsRef<Path>>(
        &self,
        track: &SubtitleTrack,
        path: P,
        format: SubtitleFormat,
        style: Option<&StyleOptions>,
    ) -> Result<()> {
        let path = path.as_ref();
        info!("Writing {} subtitle file: {}", format, path.display());

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        fs::write(path, self.generate(track, format, style)).await?;
        Ok(())
    }

    /// First `max_entries` entries rendered as SRT, markup removed, for preview display.
    pub fn preview(&self, track: &SubtitleTrack, max_entries: usize) -> String {
        let excerpt: SubtitleTrack = track.iter().take(max_entries).cloned().collect::<Vec<_>>().into();
        srt::generate(&excerpt.map_text(strip_markup))
    }
}

/// Strip a UTF-8 BOM and normalise line endings.
fn normalize_input(text: &str) -> String {
    text.trim_start_matches('\u{feff}').replace("\r\n", "\n").replace('\r', "\n")
}

/// Validated entry from parsed timing, logging why a block is dropped.
pub(crate) fn parsed_entry(index: usize, start: f64, end: f64, text: String) -> Option<SubtitleEntry> {
    match SubtitleEntry::new(index, start, end, text) {
        Ok(entry) => Some(entry),
        Err(e) => {
            debug!("Dropping subtitle block: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_entry_validation() {
        assert!(SubtitleEntry::new(1, 1.0, 2.0, "ok").is_ok());
        assert!(SubtitleEntry::new(1, 2.0, 2.0, "zero length").is_err());
        assert!(SubtitleEntry::new(1, 3.0, 2.0, "reversed").is_err());
        assert!(SubtitleEntry::new(1, -1.0, 2.0, "negative").is_err());
        assert!(SubtitleEntry::new(1, 1.0, 2.0, "   ").is_err());
        assert_eq!(SubtitleEntry::new(1, 1.0, 2.0, "  padded \n").unwrap().text, "padded");
    }

    #[test]
    fn test_track_push_renumbers() {
        let track = SubtitleTrack::from(vec![
            SubtitleEntry::new(7, 0.0, 1.0, "a").unwrap(),
            SubtitleEntry::new(3, 1.0, 2.0, "b").unwrap(),
        ]);
        let indices: Vec<usize> = track.iter().map(|e| e.index).collect();
        assert_eq!(indices, vec![1, 2]);
    }

    #[test]
    fn test_map_text_leaves_original_untouched() {
        let track = SubtitleTrack::from(vec![SubtitleEntry::new(1, 0.0, 1.0, "hello").unwrap()]);
        let shouted = track.map_text(|t| t.to_uppercase());
        assert_eq!(track.entries()[0].text, "hello");
        assert_eq!(shouted.entries()[0].text, "HELLO");
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(SubtitleFormat::from_path("a/b.SRT").unwrap(), SubtitleFormat::Srt);
        assert_eq!(SubtitleFormat::from_path("b.ssa").unwrap(), SubtitleFormat::Ass);
        assert_eq!(SubtitleFormat::from_path("b.vtt").unwrap(), SubtitleFormat::Vtt);
        assert!(matches!(
            SubtitleFormat::from_path("b.sub"),
            Err(AmareloError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_srt_round_trip_property() {
        let codec = SubtitleCodec::default();
        let track = SubtitleTrack::from(vec![
            SubtitleEntry::new(1, 0.5, 1.75, "First line").unwrap(),
            SubtitleEntry::new(2, 2.001, 4.999, "Second\nwith two lines").unwrap(),
            SubtitleEntry::new(3, 3599.999, 3723.004, "Past the hour").unwrap(),
        ]);

        let generated = codec.generate(&track, SubtitleFormat::Srt, None);
        let reparsed = codec.parse(&generated, SubtitleFormat::Srt);
        assert_eq!(reparsed, track);
    }

    #[test]
    fn test_red_srt_to_ass_scenario() {
        let codec = SubtitleCodec::default();
        let track = codec.parse("00:00:01,000 --> 00:00:03,000\nHello\n\n", SubtitleFormat::Srt);
        assert_eq!(track.len(), 1);
        let entry = &track.entries()[0];
        assert_eq!((entry.start, entry.end, entry.text.as_str()), (1.0, 3.0, "Hello"));

        let style = StyleOptions {
            font_color: "#FF0000".to_string(),
            ..StyleOptions::default()
        };
        let ass = codec.generate(&track, SubtitleFormat::Ass, Some(&style));
        let dialogue = ass.lines().find(|l| l.starts_with("Dialogue:")).unwrap();
        assert!(dialogue.contains("&H0000FF&"), "{}", dialogue);
        assert!(dialogue.ends_with("Hello"), "{}", dialogue);

        let reparsed = codec.parse(&ass, SubtitleFormat::Ass);
        assert_eq!(reparsed.entries()[0].text, "Hello");
    }

    #[test]
    fn test_empty_input_yields_empty_track() {
        let codec = SubtitleCodec::default();
        for format in [SubtitleFormat::Srt, SubtitleFormat::Ass, SubtitleFormat::Vtt] {
            assert!(codec.parse("", format).is_empty());
            assert!(codec.parse("\n\n  \n", format).is_empty());
        }
    }

    #[test]
    fn test_bom_and_crlf_are_tolerated() {
        let codec = SubtitleCodec::default();
        let text = "\u{feff}1\r\n00:00:01,000 --> 00:00:02,000\r\nHi\r\n\r\n";
        let track = codec.parse(text, SubtitleFormat::Srt);
        assert_eq!(track.len(), 1);
        assert_eq!(track.entries()[0].text, "Hi");
    }

    #[test]
    fn test_preview_limits_entries() {
        let codec = SubtitleCodec::default();
        let track = SubtitleTrack::from(
            (0..10)
                .map(|i| SubtitleEntry::new(0, i as f64, i as f64 + 0.5, format!("line {}", i)).unwrap())
                .collect::<Vec<_>>(),
        );
        let preview = codec.preview(&track, 2);
        assert!(preview.contains("line 1"));
        assert!(!preview.contains("line 2"));
    }

    #[test]
    fn test_preview_is_plain_text_but_track_keeps_markup() {
        let codec = SubtitleCodec::default();
        let track = codec.parse("1\n00:00:01,000 --> 00:00:02,000\n<i>Whispering</i>\n", SubtitleFormat::Srt);
        assert_eq!(track.entries()[0].text, "<i>Whispering</i>");

        let preview = codec.preview(&track, 5);
        assert!(preview.contains("\nWhispering\n"), "{}", preview);
        assert!(!preview.contains("<i>"));
    }

    #[test]
    fn test_write_then_read_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("out.vtt");
        let codec = SubtitleCodec::default();
        let track = SubtitleTrack::from(vec![SubtitleEntry::new(1, 1.0, 2.5, "Bonjour").unwrap()]);

        tokio_test::block_on(codec.write_file(&track, &path, SubtitleFormat::Vtt, None)).unwrap();
        let read = tokio_test::block_on(codec.read_file(&path)).unwrap();
        assert_eq!(read, track);
    }
}
