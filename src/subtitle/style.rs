use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{AmareloError, Result};
use super::{SubtitleFormat, SubtitleTrack};

static MARKUP_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)</?(?:b|i|u|s|font|c)(?:[.\s][^>]*)?>").expect("markup tag pattern")
});

/// Visual style requested for generated subtitles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleOptions {
    pub font_name: String,
    pub font_size: u32,
    /// `#RRGGBB` or `#RGB`
    pub font_color: String,
    pub bold: bool,
}

impl Default for StyleOptions {
    fn default() -> Self {
        Self {
            font_name: "Arial".to_string(),
            font_size: 20,
            font_color: "#FFFFFF".to_string(),
            bold: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb { r: 0xFF, g: 0xFF, b: 0xFF };

    pub fn parse_hex(color: &str) -> Result<Self> {
        let hex = color
            .trim()
            .strip_prefix('#')
            .ok_or_else(|| AmareloError::Config(format!("Color must start with '#': {}", color)))?;

        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(AmareloError::Config(format!("Invalid hex color: {}", color)));
        }

        let expanded: String = match hex.len() {
            3 => hex.chars().flat_map(|c| [c, c]).collect(),
            6 => hex.to_string(),
            _ => return Err(AmareloError::Config(format!("Invalid hex color: {}", color))),
        };

        let channel = |i: usize| {
            u8::from_str_radix(&expanded[i..i + 2], 16)
                .map_err(|e| AmareloError::Config(format!("Invalid hex color {}: {}", color, e)))
        };

        Ok(Self {
            r: channel(0)?,
            g: channel(2)?,
            b: channel(4)?,
        })
    }

    pub fn to_hex(self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    /// ASS style-line colour, alpha first then blue, green, red.
    pub fn to_ass_style(self) -> String {
        format!("&H00{:02X}{:02X}{:02X}", self.b, self.g, self.r)
    }

    /// ASS inline `\c` override value.
    pub fn to_ass_inline(self) -> String {
        format!("&H{:02X}{:02X}{:02X}&", self.b, self.g, self.r)
    }
}

impl StyleOptions {
    pub fn validate(&self) -> Result<()> {
        Rgb::parse_hex(&self.font_color)?;
        if self.font_size == 0 {
            return Err(AmareloError::Config("style.font_size must be positive".to_string()));
        }
        if self.font_name.trim().is_empty() {
            return Err(AmareloError::Config("style.font_name is empty".to_string()));
        }
        Ok(())
    }

    pub fn is_default(&self) -> bool {
        let default = Self::default();
        self.font_name == default.font_name
            && self.font_size == default.font_size
            && self.bold == default.bold
            && self.color() == Rgb::WHITE
    }

    /// Requested colour, white when the configured value does not parse.
    pub fn color(&self) -> Rgb {
        Rgb::parse_hex(&self.font_color).unwrap_or(Rgb::WHITE)
    }

    pub fn has_custom_color(&self) -> bool {
        self.color() != Rgb::WHITE
    }

    /// `force_style` argument for ffmpeg's `subtitles` filter.
    pub fn to_force_style(&self) -> String {
        format!(
            "FontName={},FontSize={},PrimaryColour={},Bold={}",
            self.font_name,
            self.font_size,
            self.color().to_ass_style(),
            if self.bold { 1 } else { 0 }
        )
    }
}

/// Wrap entry text in the inline markup a plain-text format understands.
///
/// SRT gets bold and font colour, VTT only bold (colour needs CSS classes),
/// ASS is styled through its header and is returned unchanged.
pub fn apply_markup(track: &SubtitleTrack, style: &StyleOptions, format: SubtitleFormat) -> SubtitleTrack {
    let (bold, color) = match format {
        SubtitleFormat::Srt => (style.bold, style.has_custom_color()),
        SubtitleFormat::Vtt => (style.bold, false),
        SubtitleFormat::Ass => return track.clone(),
    };

    if !bold && !color {
        return track.clone();
    }

    let hex = style.color().to_hex();
    track.map_text(|text| {
        let mut styled = text.to_string();
        if color {
            styled = format!("<font color=\"{}\">{}</font>", hex, styled);
        }
        if bold {
            styled = format!("<b>{}</b>", styled);
        }
        styled
    })
}

/// Remove HTML-like markup (`<b>`, `<font …>`, VTT `<c.class>`) from text.
pub fn strip_markup(text: &str) -> String {
    MARKUP_TAG.replace_all(text, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subtitle::SubtitleEntry;

    fn track() -> SubtitleTrack {
        SubtitleTrack::from(vec![SubtitleEntry::new(1, 1.0, 2.0, "Hello").unwrap()])
    }

    #[test]
    fn test_parse_hex_colors() {
        assert_eq!(Rgb::parse_hex("#FF0000").unwrap(), Rgb { r: 255, g: 0, b: 0 });
        assert_eq!(Rgb::parse_hex("#0f0").unwrap(), Rgb { r: 0, g: 255, b: 0 });
        assert!(Rgb::parse_hex("FF0000").is_err());
        assert!(Rgb::parse_hex("#GG0000").is_err());
        assert!(Rgb::parse_hex("#FF00").is_err());
    }

    #[test]
    fn test_ass_colors_are_channel_reversed() {
        let red = Rgb::parse_hex("#FF0000").unwrap();
        assert_eq!(red.to_ass_style(), "&H000000FF");
        assert_eq!(red.to_ass_inline(), "&H0000FF&");

        let mixed = Rgb::parse_hex("#123456").unwrap();
        assert_eq!(mixed.to_ass_inline(), "&H563412&");
    }

    #[test]
    fn test_is_default() {
        let mut style = StyleOptions::default();
        assert!(style.is_default());
        style.font_color = "#fff".to_string();
        assert!(style.is_default());
        style.bold = true;
        assert!(!style.is_default());
    }

    #[test]
    fn test_apply_markup_srt() {
        let style = StyleOptions {
            bold: true,
            font_color: "#FF0000".to_string(),
            ..StyleOptions::default()
        };
        let styled = apply_markup(&track(), &style, SubtitleFormat::Srt);
        assert_eq!(styled.entries()[0].text, "<b><font color=\"#FF0000\">Hello</font></b>");
        assert_eq!(styled.entries()[0].start, 1.0);
        assert_eq!(styled.entries()[0].end, 2.0);
    }

    #[test]
    fn test_apply_markup_vtt_is_bold_only() {
        let style = StyleOptions {
            bold: true,
            font_color: "#FF0000".to_string(),
            ..StyleOptions::default()
        };
        let styled = apply_markup(&track(), &style, SubtitleFormat::Vtt);
        assert_eq!(styled.entries()[0].text, "<b>Hello</b>");
    }

    #[test]
    fn test_strip_markup() {
        assert_eq!(strip_markup("<b><font color=\"#FF0000\">Hi</font></b>"), "Hi");
        assert_eq!(strip_markup("<c.yellow>Hey</c> you"), "Hey you");
        assert_eq!(strip_markup("a < b and c > d"), "a < b and c > d");
    }

    #[test]
    fn test_force_style() {
        let style = StyleOptions {
            font_color: "#00FF00".to_string(),
            bold: true,
            ..StyleOptions::default()
        };
        assert_eq!(
            style.to_force_style(),
            "FontName=Arial,FontSize=20,PrimaryColour=&H0000FF00,Bold=1"
        );
    }
}
