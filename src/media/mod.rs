// Media probing and encoding
//
// - Commands: ffmpeg / ffprobe invocation builders
// - Processor: ffprobe analyzer and ffmpeg subtitle burner

pub mod commands;
pub mod processor;

use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use commands::*;
pub use processor::*;

use crate::config::MediaConfig;
use crate::error::Result;
use crate::subtitle::StyleOptions;

/// What the probe learned about a video file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaDescriptor {
    pub path: PathBuf,
    /// Seconds; `0.0` when the container does not report it
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub audio_codec: Option<String>,
    pub video_codec: Option<String>,
    /// Strictly increasing timestamps in seconds
    pub scene_marks: Vec<f64>,
}

impl MediaDescriptor {
    pub fn new<P: Into<PathBuf>>(path: P, duration: f64) -> Self {
        Self {
            path: path.into(),
            duration,
            width: 0,
            height: 0,
            fps: 0.0,
            audio_codec: None,
            video_codec: None,
            scene_marks: Vec::new(),
        }
    }

    pub fn with_scene_marks(mut self, marks: Vec<f64>) -> Self {
        self.scene_marks = normalize_scene_marks(marks);
        self
    }

    pub fn has_known_duration(&self) -> bool {
        self.duration.is_finite() && self.duration > 0.0
    }
}

/// `count` anchors spread evenly inside `(0, duration)`.
pub fn even_scene_marks(duration: f64, count: usize) -> Vec<f64> {
    if !(duration.is_finite() && duration > 0.0) || count == 0 {
        return Vec::new();
    }
    (1..=count)
        .map(|i| duration * i as f64 / (count + 1) as f64)
        .collect()
}

/// Sort, drop non-finite values and duplicates so marks are strictly increasing.
pub fn normalize_scene_marks(mut marks: Vec<f64>) -> Vec<f64> {
    marks.retain(|m| m.is_finite() && *m >= 0.0);
    marks.sort_by(|a, b| a.total_cmp(b));
    marks.dedup_by(|a, b| a <= b);
    marks
}

#[async_trait]
pub trait MediaProbe: Send + Sync {
    /// Inspect `path`; any failure is a `MediaAnalysis` error
    async fn analyze(&self, path: &Path) -> Result<MediaDescriptor>;
}

#[async_trait]
pub trait SubtitleBurner: Send + Sync {
    /// Render `subtitle` into a copy of `video`, returning the new file's path
    async fn burn(&self, video: &Path, subtitle: &Path, style: &StyleOptions) -> Result<PathBuf>;
}

/// Path of the burned copy: `<dir>/<stem>_with_subs.mp4`
pub fn merged_video_path(video: &Path) -> PathBuf {
    let stem = video
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "video".to_string());
    video.with_file_name(format!("{}_with_subs.mp4", stem))
}

/// Factory for the ffmpeg-backed media collaborators
pub struct MediaFactory;

impl MediaFactory {
    pub fn create_probe(config: MediaConfig) -> Arc<dyn MediaProbe> {
        Arc::new(FfprobeAnalyzer::new(config))
    }

    pub fn create_burner(config: MediaConfig) -> Arc<dyn SubtitleBurner> {
        Arc::new(FfmpegBurner::new(config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_even_scene_marks() {
        assert_eq!(even_scene_marks(100.0, 4), vec![20.0, 40.0, 60.0, 80.0]);
        assert!(even_scene_marks(0.0, 4).is_empty());
        assert!(even_scene_marks(f64::NAN, 4).is_empty());
        assert!(even_scene_marks(100.0, 0).is_empty());
    }

    #[test]
    fn test_normalize_scene_marks() {
        let marks = normalize_scene_marks(vec![5.0, 1.0, f64::NAN, 5.0, -2.0, 3.0]);
        assert_eq!(marks, vec![1.0, 3.0, 5.0]);
    }

    #[test]
    fn test_merged_video_path() {
        assert_eq!(
            merged_video_path(Path::new("/movies/Film.mkv")),
            PathBuf::from("/movies/Film_with_subs.mp4")
        );
    }

    #[test]
    fn test_descriptor_duration_known() {
        assert!(MediaDescriptor::new("a.mp4", 12.0).has_known_duration());
        assert!(!MediaDescriptor::new("a.mp4", 0.0).has_known_duration());
    }
}
