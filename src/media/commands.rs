use std::path::Path;
use std::process::Output;
use tokio::process::Command;
use tracing::debug;

use crate::error::{AmareloError, Result};
use crate::subtitle::{StyleOptions, SubtitleFormat};

/// Most of an ffmpeg failure is banner noise; keep the tail of stderr
const STDERR_TAIL_LINES: usize = 12;

/// Abstract media tool invocation (ffmpeg / ffprobe)
#[derive(Debug, Clone)]
pub struct MediaCommand {
    pub binary_path: String,
    pub args: Vec<String>,
    pub description: String,
}

impl MediaCommand {
    pub fn new<S1: Into<String>, S2: Into<String>>(binary_path: S1, description: S2) -> Self {
        Self {
            binary_path: binary_path.into(),
            args: Vec::new(),
            description: description.into(),
        }
    }

    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(|s| s.into()));
        self
    }

    pub fn input<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg("-i").arg(path.as_ref().to_string_lossy().to_string())
    }

    pub fn output<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg(path.as_ref().to_string_lossy().to_string())
    }

    pub fn overwrite(self) -> Self {
        self.arg("-y")
    }

    pub fn video_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:v").arg(codec)
    }

    pub fn audio_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:a").arg(codec)
    }

    pub fn copy_audio(self) -> Self {
        self.audio_codec("copy")
    }

    pub fn no_video(self) -> Self {
        self.arg("-vn")
    }

    pub fn audio_sample_rate(self, rate: u32) -> Self {
        self.arg("-ar").arg(rate.to_string())
    }

    pub fn audio_channels(self, channels: u32) -> Self {
        self.arg("-ac").arg(channels.to_string())
    }

    pub fn video_filter<S: Into<String>>(self, filter: S) -> Self {
        self.arg("-vf").arg(filter)
    }

    /// Run the command; failures are reported through `error` so callers
    /// pick the error class (analysis, encoding, transcription).
    pub async fn execute(&self, error: fn(String) -> AmareloError) -> Result<Output> {
        debug!("Executing media command: {} {:?}", self.binary_path, self.args);
        debug!("Description: {}", self.description);

        let output = Command::new(&self.binary_path)
            .args(&self.args)
            .output()
            .await
            .map_err(|e| error(format!("Failed to execute {}: {}", self.binary_path, e)))?;

        if !output.status.success() {
            return Err(error(format!(
                "{} failed ({}): {}",
                self.description,
                output.status,
                stderr_tail(&output)
            )));
        }

        Ok(output)
    }
}

fn stderr_tail(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let lines: Vec<&str> = stderr.lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

/// Quote a path for use inside an ffmpeg filter argument.
///
/// The filtergraph parser strips the single quotes, then the filter's option
/// parser resolves backslash escapes. A quote cannot appear inside a quoted
/// span, so it closes the span, emits an escaped `\'` and reopens.
pub fn escape_filter_path(path: &Path) -> String {
    let raw = path.to_string_lossy().replace('\\', "/");
    let escaped = raw.replace(':', "\\:").replace('\'', r"'\\\''");
    format!("'{}'", escaped)
}

/// Builder for the media operations the workflow needs
#[derive(Debug, Clone)]
pub struct MediaCommandBuilder {
    ffmpeg_path: String,
    ffprobe_path: String,
}

impl MediaCommandBuilder {
    pub fn new<S1: Into<String>, S2: Into<String>>(ffmpeg_path: S1, ffprobe_path: S2) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            ffprobe_path: ffprobe_path.into(),
        }
    }

    /// Container and stream metadata as JSON
    pub fn probe<P: AsRef<Path>>(&self, video_path: P) -> MediaCommand {
        MediaCommand::new(&self.ffprobe_path, "Media probe")
            .args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
            .output(video_path)
    }

    /// Scene-change timestamps printed by `showinfo` on stderr
    pub fn detect_scenes<P: AsRef<Path>>(&self, video_path: P, threshold: f64) -> MediaCommand {
        MediaCommand::new(&self.ffmpeg_path, "Scene detection")
            .arg("-hide_banner")
            .input(video_path)
            .video_filter(format!("select='gt(scene,{})',showinfo", threshold))
            .args(["-an", "-f", "null", "-"])
    }

    /// Re-encode `video_path` with the subtitle rendered into the frame
    pub fn burn_subtitles<P: AsRef<Path>>(
        &self,
        video_path: P,
        subtitle_path: P,
        output_path: P,
        style: Option<&StyleOptions>,
        additional_options: &[String],
    ) -> MediaCommand {
        let subtitle_path = subtitle_path.as_ref();
        let filter = match SubtitleFormat::from_path(subtitle_path) {
            Ok(SubtitleFormat::Ass) => format!("ass={}", escape_filter_path(subtitle_path)),
            _ => match style {
                Some(style) => format!(
                    "subtitles={}:force_style='{}'",
                    escape_filter_path(subtitle_path),
                    style.to_force_style()
                ),
                None => format!("subtitles={}", escape_filter_path(subtitle_path)),
            },
        };

        MediaCommand::new(&self.ffmpeg_path, "Subtitle burn-in")
            .overwrite()
            .input(video_path)
            .video_filter(filter)
            .video_codec("libx264")
            .copy_audio()
            .args(additional_options.iter().cloned())
            .output(output_path)
    }

    /// 16 kHz mono PCM for speech recognition
    pub fn extract_audio<P: AsRef<Path>>(&self, video_path: P, audio_path: P) -> MediaCommand {
        MediaCommand::new(&self.ffmpeg_path, "Audio extraction")
            .input(video_path)
            .no_video()
            .audio_codec("pcm_s16le")
            .audio_sample_rate(16000)
            .audio_channels(1)
            .overwrite()
            .output(audio_path)
    }
}
