//! Video/subtitle pairing by exact and fuzzy base-name matching.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{AmareloError, Result};

pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mkv", "mov", "wmv", "flv", "webm", "m4v", "mpg", "mpeg"];
pub const SUBTITLE_EXTENSIONS: &[&str] = &["srt", "ass", "ssa", "sub", "vtt", "sbv", "dfxp", "ttml"];

static ANNOTATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[[^\]]*\]|\([^)]*\)|\{[^}]*\}").expect("annotation pattern"));

// Trailing `.pt`, `.en`, `.pt-BR`, `.pt_BR`
static LANGUAGE_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.([A-Za-z]{2})(?:[-_]([A-Za-z]{2}))?$").expect("language suffix pattern"));

static SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s._\-]+").expect("separator pattern"));

static RELEASE_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(?:19\d{2}|20\d{2}|\d{3,4}p|[48]k|uhd|hdr|bluray|blu-ray|brrip|bdrip|dvdrip|webrip|web|webdl|web-dl|hdtv|hdrip|x264|x265|h264|h265|hevc|xvid|divx|aac|ac3|dts|proper|repack|extended|remastered|unrated)$",
    )
    .expect("release tag pattern")
});

/// One discovered video and the subtitle chosen for it, if any
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilePairing {
    pub video: PathBuf,
    pub subtitle: Option<PathBuf>,
}

/// Result of a directory scan
#[derive(Debug, Clone, Default)]
pub struct PairingReport {
    pub pairings: Vec<FilePairing>,
    /// Subtitles no video claimed
    pub unmatched_subtitles: Vec<PathBuf>,
}

impl PairingReport {
    /// One warning line per unmatched subtitle.
    pub fn warnings(&self) -> Vec<String> {
        self.unmatched_subtitles
            .iter()
            .map(|path| format!("No video matches subtitle {}", path.display()))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Video,
    Subtitle,
}

pub fn classify<P: AsRef<Path>>(path: P) -> Option<FileKind> {
    let ext = path.as_ref().extension()?.to_str()?.to_ascii_lowercase();
    if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        Some(FileKind::Video)
    } else if SUBTITLE_EXTENSIONS.contains(&ext.as_str()) {
        Some(FileKind::Subtitle)
    } else {
        None
    }
}

fn base_name(path: &Path) -> String {
    path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default()
}

fn parent_dir(path: &Path) -> &Path {
    path.parent().unwrap_or_else(|| Path::new(""))
}

fn file_name_len(path: &Path) -> usize {
    path.file_name().map(|n| n.to_string_lossy().chars().count()).unwrap_or(usize::MAX)
}

/// Language code at the end of a subtitle base name (`movie.pt-BR` → `pt-BR`).
pub fn language_tag<P: AsRef<Path>>(path: P) -> Option<String> {
    let base = base_name(path.as_ref());
    let caps = LANGUAGE_SUFFIX.captures(&base)?;
    let primary = caps.get(1)?.as_str().to_ascii_lowercase();
    match caps.get(2) {
        Some(region) => Some(format!("{}-{}", primary, region.as_str().to_ascii_uppercase())),
        None => Some(primary),
    }
}

/// Normalised comparison key: annotations removed, cut at the first release
/// tag, lower-cased, separators collapsed to single spaces.
pub fn clean_name(name: &str) -> String {
    let without_annotations = ANNOTATION.replace_all(name, " ");
    let mut tokens = Vec::new();

    for token in SEPARATORS.split(&without_annotations) {
        if token.is_empty() {
            continue;
        }
        if !tokens.is_empty() && RELEASE_TAG.is_match(token) {
            break;
        }
        tokens.push(token.to_lowercase());
    }

    tokens.join(" ")
}

fn clean_subtitle_name(path: &Path) -> String {
    let base = base_name(path);
    let without_language = LANGUAGE_SUFFIX.replace(&base, "");
    clean_name(&without_language)
}

fn clean_video_name(path: &Path) -> String {
    clean_name(&base_name(path))
}

/// Pairs videos with subtitles found under a directory.
///
/// A video is only ever paired with a subtitle from its own directory.
#[derive(Debug, Clone, Default)]
pub struct FileMatcher {
    /// Directories the scan does not descend into
    excluded_dirs: Vec<PathBuf>,
}

impl FileMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip `dir` (and everything below it) during `scan`.
    pub fn excluding<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.excluded_dirs.push(dir.into());
        self
    }

    fn is_excluded(&self, path: &Path) -> bool {
        self.excluded_dirs.iter().any(|dir| dir == path)
    }

    /// Walk `dir` and pair every video found. A missing directory is an error.
    pub fn scan<P: AsRef<Path>>(&self, dir: P) -> Result<PairingReport> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(AmareloError::FileNotFound(format!(
                "Input directory does not exist: {}",
                dir.display()
            )));
        }

        let mut videos = Vec::new();
        let mut subtitles = Vec::new();

        let walker = WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !(e.file_type().is_dir() && self.is_excluded(e.path())));

        for entry in walker {
            let entry = entry.map_err(|e| {
                AmareloError::Io(std::io::Error::other(format!("Failed to walk {}: {}", dir.display(), e)))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            match classify(entry.path()) {
                Some(FileKind::Video) => videos.push(entry.into_path()),
                Some(FileKind::Subtitle) => subtitles.push(entry.into_path()),
                None => {}
            }
        }

        info!(
            "Found {} video files and {} subtitle files in {}",
            videos.len(),
            subtitles.len(),
            dir.display()
        );

        Ok(self.match_files(&videos, &subtitles))
    }

    /// Pair `videos` with `subtitles`, preserving the order of `videos`.
    pub fn match_files(&self, videos: &[PathBuf], subtitles: &[PathBuf]) -> PairingReport {
        let mut chosen: Vec<Option<usize>> = vec![None; videos.len()];
        let mut used = vec![false; subtitles.len()];

        // Exact pass: identical base names in the same directory
        let mut by_base: HashMap<(&Path, String), usize> = HashMap::new();
        for (i, sub) in subtitles.iter().enumerate() {
            by_base.entry((parent_dir(sub), base_name(sub))).or_insert(i);
        }
        for (v, video) in videos.iter().enumerate() {
            if let Some(&s) = by_base.get(&(parent_dir(video), base_name(video))) {
                debug!("Exact match: {} <-> {}", video.display(), subtitles[s].display());
                chosen[v] = Some(s);
                used[s] = true;
            }
        }

        // Fuzzy pass over subtitles the exact pass left alone
        let cleaned_videos: Vec<String> = videos.iter().map(|v| clean_video_name(v)).collect();
        let mut tentative: Vec<Option<usize>> = vec![None; videos.len()];

        for (s, sub) in subtitles.iter().enumerate() {
            if used[s] {
                continue;
            }
            let cleaned = clean_subtitle_name(sub);
            if cleaned.is_empty() {
                continue;
            }

            for (v, video_name) in cleaned_videos.iter().enumerate() {
                if chosen[v].is_some() || *video_name != cleaned || parent_dir(&videos[v]) != parent_dir(sub) {
                    continue;
                }
                // Shorter file name carries less release noise
                let better = match tentative[v] {
                    None => true,
                    Some(current) => file_name_len(sub) < file_name_len(&subtitles[current]),
                };
                if better {
                    tentative[v] = Some(s);
                }
            }
        }

        for (v, candidate) in tentative.into_iter().enumerate() {
            if let Some(s) = candidate {
                debug!("Fuzzy match: {} <-> {}", videos[v].display(), subtitles[s].display());
                chosen[v] = Some(s);
                used[s] = true;
            }
        }

        let pairings: Vec<FilePairing> = videos
            .iter()
            .zip(&chosen)
            .map(|(video, s)| FilePairing {
                video: video.clone(),
                subtitle: s.map(|s| subtitles[s].clone()),
            })
            .collect();

        let unmatched_subtitles = subtitles
            .iter()
            .zip(&used)
            .filter(|(_, used)| !**used)
            .map(|(sub, _)| sub.clone())
            .collect();

        let matched = pairings.iter().filter(|p| p.subtitle.is_some()).count();
        info!("Paired {} of {} videos with subtitles", matched, pairings.len());

        PairingReport {
            pairings,
            unmatched_subtitles,
        }
    }
}
