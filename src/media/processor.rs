use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::{
    MediaCommandBuilder, MediaDescriptor, MediaProbe, SubtitleBurner, even_scene_marks, merged_video_path,
    normalize_scene_marks,
};
use crate::config::{MediaConfig, SceneDetection};
use crate::error::{AmareloError, Result};
use crate::subtitle::StyleOptions;

static PTS_TIME: Lazy<Regex> = Lazy::new(|| Regex::new(r"pts_time:\s*([0-9]+(?:\.[0-9]+)?)").expect("pts_time pattern"));

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// `"30000/1001"` or `"25"` to frames per second; `0/0` yields `None`.
pub fn parse_frame_rate(value: &str) -> Option<f64> {
    let rate = match value.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => value.trim().parse().ok()?,
    };
    (rate.is_finite() && rate > 0.0).then_some(rate)
}

/// Build a descriptor (without scene marks) from ffprobe's JSON output.
pub fn parse_probe_output(path: &Path, json: &str) -> Result<MediaDescriptor> {
    let probe: ProbeOutput = serde_json::from_str(json)
        .map_err(|e| AmareloError::MediaAnalysis(format!("Unparsable ffprobe output for {}: {}", path.display(), e)))?;

    if probe.streams.is_empty() {
        return Err(AmareloError::MediaAnalysis(format!("No streams found in {}", path.display())));
    }

    let video = probe.streams.iter().find(|s| s.codec_type.as_deref() == Some("video"));
    let audio = probe.streams.iter().find(|s| s.codec_type.as_deref() == Some("audio"));

    let duration = probe
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .or_else(|| video.and_then(|v| v.duration.as_deref()))
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
        .unwrap_or(0.0);

    let mut descriptor = MediaDescriptor::new(path, duration);
    if let Some(video) = video {
        descriptor.width = video.width.unwrap_or(0);
        descriptor.height = video.height.unwrap_or(0);
        descriptor.fps = video.r_frame_rate.as_deref().and_then(parse_frame_rate).unwrap_or(0.0);
        descriptor.video_codec = video.codec_name.clone();
    }
    descriptor.audio_codec = audio.and_then(|a| a.codec_name.clone());

    Ok(descriptor)
}

/// Scene-change timestamps from ffmpeg `showinfo` log lines.
pub fn parse_scene_times(stderr: &str) -> Vec<f64> {
    let times = PTS_TIME
        .captures_iter(stderr)
        .filter_map(|caps| caps[1].parse::<f64>().ok())
        .collect();
    normalize_scene_marks(times)
}

/// ffprobe-backed media analyzer
pub struct FfprobeAnalyzer {
    config: MediaConfig,
    command_builder: MediaCommandBuilder,
}

impl FfprobeAnalyzer {
    pub fn new(config: MediaConfig) -> Self {
        let command_builder = MediaCommandBuilder::new(&config.ffmpeg_path, &config.ffprobe_path);
        Self { config, command_builder }
    }

    async fn detect_scene_marks(&self, path: &Path) -> Result<Vec<f64>> {
        let command = self.command_builder.detect_scenes(path, self.config.scene_threshold);
        let output = command.execute(AmareloError::MediaAnalysis).await?;
        let marks = parse_scene_times(&String::from_utf8_lossy(&output.stderr));
        if marks.is_empty() {
            return Err(AmareloError::MediaAnalysis("Scene filter reported no scene changes".to_string()));
        }
        Ok(marks)
    }

    async fn scene_marks(&self, descriptor: &MediaDescriptor) -> Vec<f64> {
        let even = || even_scene_marks(descriptor.duration, self.config.scene_anchor_count);
        match self.config.scene_detection {
            SceneDetection::None => Vec::new(),
            SceneDetection::Even => even(),
            SceneDetection::Detect => match self.detect_scene_marks(&descriptor.path).await {
                Ok(marks) => marks,
                Err(e) => {
                    warn!("Scene detection failed for {}, using even anchors: {}", descriptor.path.display(), e);
                    even()
                }
            },
        }
    }
}

#[async_trait]
impl MediaProbe for FfprobeAnalyzer {
    async fn analyze(&self, path: &Path) -> Result<MediaDescriptor> {
        if !path.exists() {
            return Err(AmareloError::MediaAnalysis(format!("File not found: {}", path.display())));
        }
        debug!("Analyzing media file: {}", path.display());

        let output = self.command_builder.probe(path).execute(AmareloError::MediaAnalysis).await?;
        let mut descriptor = parse_probe_output(path, &String::from_utf8_lossy(&output.stdout))?;
        descriptor.scene_marks = self.scene_marks(&descriptor).await;

        info!(
            "Media analyzed: {} ({:.2}s, {}x{}, {:.3} fps, {} scene marks)",
            path.display(),
            descriptor.duration,
            descriptor.width,
            descriptor.height,
            descriptor.fps,
            descriptor.scene_marks.len()
        );
        Ok(descriptor)
    }
}

/// ffmpeg-backed hard-burn of subtitles into video
pub struct FfmpegBurner {
    config: MediaConfig,
    command_builder: MediaCommandBuilder,
}

impl FfmpegBurner {
    pub fn new(config: MediaConfig) -> Self {
        let command_builder = MediaCommandBuilder::new(&config.ffmpeg_path, &config.ffprobe_path);
        Self { config, command_builder }
    }
}

#[async_trait]
impl SubtitleBurner for FfmpegBurner {
    async fn burn(&self, video: &Path, subtitle: &Path, style: &StyleOptions) -> Result<PathBuf> {
        let output_path = merged_video_path(video);
        info!(
            "Burning subtitles from {} into {} -> {}",
            subtitle.display(),
            video.display(),
            output_path.display()
        );

        let command = self.command_builder.burn_subtitles(
            video,
            subtitle,
            output_path.as_path(),
            Some(style),
            &self.config.burn_options,
        );
        command.execute(AmareloError::Encoding).await?;

        info!("Subtitle burn-in completed: {}", output_path.display());
        Ok(output_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROBE_JSON: &str = r#"{
        "streams": [
            {"index": 0, "codec_type": "video", "codec_name": "h264", "width": 1920, "height": 1080,
             "r_frame_rate": "24000/1001", "duration": "120.5"},
            {"index": 1, "codec_type": "audio", "codec_name": "aac", "r_frame_rate": "0/0"}
        ],
        "format": {"filename": "movie.mp4", "duration": "121.000000"}
    }"#;

    #[test]
    fn test_parse_probe_output() {
        let descriptor = parse_probe_output(Path::new("movie.mp4"), PROBE_JSON).unwrap();
        assert_eq!(descriptor.duration, 121.0);
        assert_eq!((descriptor.width, descriptor.height), (1920, 1080));
        assert!((descriptor.fps - 23.976).abs() < 0.001);
        assert_eq!(descriptor.video_codec.as_deref(), Some("h264"));
        assert_eq!(descriptor.audio_codec.as_deref(), Some("aac"));
        assert!(descriptor.scene_marks.is_empty());
    }

    #[test]
    fn test_parse_probe_falls_back_to_stream_duration() {
        let json = r#"{"streams":[{"codec_type":"video","duration":"42.0","r_frame_rate":"25"}]}"#;
        let descriptor = parse_probe_output(Path::new("a.mkv"), json).unwrap();
        assert_eq!(descriptor.duration, 42.0);
        assert_eq!(descriptor.fps, 25.0);
        assert_eq!(descriptor.audio_codec, None);
    }

    #[test]
    fn test_parse_probe_errors() {
        let err = parse_probe_output(Path::new("a.mp4"), "not json").unwrap_err();
        assert!(matches!(err, AmareloError::MediaAnalysis(_)));

        let err = parse_probe_output(Path::new("a.mp4"), r#"{"streams": []}"#).unwrap_err();
        assert!(err.to_string().contains("No streams"));
    }

    #[test]
    fn test_parse_frame_rate() {
        assert_eq!(parse_frame_rate("30/1"), Some(30.0));
        assert_eq!(parse_frame_rate("0/0"), None);
        assert_eq!(parse_frame_rate("abc"), None);
    }

    #[test]
    fn test_parse_scene_times() {
        let stderr = "[Parsed_showinfo_1 @ 0x1] n:   0 pts:  12012 pts_time:12.012 duration:1001\n\
                      noise line\n\
                      [Parsed_showinfo_1 @ 0x1] n:   1 pts:  50000 pts_time:50 duration:1001\n\
                      [Parsed_showinfo_1 @ 0x1] n:   2 pts:  50000 pts_time:50 duration:1001\n";
        assert_eq!(parse_scene_times(stderr), vec![12.012, 50.0]);
        assert!(parse_scene_times("nothing here").is_empty());
    }

    #[tokio::test]
    async fn test_analyze_missing_file() {
        let analyzer = FfprobeAnalyzer::new(MediaConfig::default());
        let err = analyzer.analyze(Path::new("/no/such/video.mp4")).await.unwrap_err();
        assert!(matches!(err, AmareloError::MediaAnalysis(_)));
    }
}
