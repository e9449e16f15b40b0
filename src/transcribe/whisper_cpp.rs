use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use super::{Segment, Transcriber, Transcription, TranscriptionObserver};
use crate::config::TranscriberConfig;
use crate::error::{AmareloError, Result};
use crate::media::MediaCommandBuilder;

// `[00:00:01.000 --> 00:00:03.500]   text` as printed on stdout
static SEGMENT_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\[(\d+):(\d{2}):(\d{2})\.(\d{3})\s*-->\s*(\d+):(\d{2}):(\d{2})\.(\d{3})\]\s*(.*)$")
        .expect("whisper segment pattern")
});

// `whisper_print_progress_callback: progress =  45%` with `-pp`
static PROGRESS_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"progress\s*=\s*(\d+)%").expect("whisper progress pattern"));

// whisper.cpp `-oj` output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhisperCppOutput {
    pub result: WhisperCppResult,
    #[serde(default)]
    pub transcription: Vec<WhisperCppSegment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhisperCppResult {
    pub language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhisperCppSegment {
    pub offsets: WhisperCppOffsets,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhisperCppOffsets {
    pub from: i64,
    pub to: i64,
}

impl From<WhisperCppOutput> for Transcription {
    fn from(output: WhisperCppOutput) -> Self {
        let segments = output
            .transcription
            .into_iter()
            .filter(|seg| !seg.text.trim().is_empty())
            .map(|seg| Segment {
                start: seg.offsets.from.max(0) as f64 / 1000.0,
                end: seg.offsets.to.max(0) as f64 / 1000.0,
                text: seg.text.trim().to_string(),
                confidence: None,
            })
            .collect();

        Transcription {
            language: output.result.language,
            segments,
        }
    }
}

/// Segment echoed on stdout while whisper-cli runs.
pub fn parse_segment_line(line: &str) -> Option<Segment> {
    let caps = SEGMENT_LINE.captures(line.trim())?;
    let num = |i: usize| caps[i].parse::<u64>().ok();
    let seconds = |h, m, s, ms| (h * 3600 + m * 60 + s) as f64 + ms as f64 / 1000.0;

    let start = seconds(num(1)?, num(2)?, num(3)?, num(4)?);
    let end = seconds(num(5)?, num(6)?, num(7)?, num(8)?);
    let text = caps[9].trim();
    if text.is_empty() {
        return None;
    }
    Some(Segment::new(start, end, text))
}

pub fn parse_progress_line(line: &str) -> Option<f32> {
    PROGRESS_LINE
        .captures(line)
        .and_then(|caps| caps[1].parse::<f32>().ok())
        .map(|p| p.clamp(0.0, 100.0))
}

/// whisper.cpp (`whisper-cli`) transcriber
pub struct WhisperCppTranscriber {
    config: TranscriberConfig,
    command_builder: MediaCommandBuilder,
}

impl WhisperCppTranscriber {
    pub fn new(config: TranscriberConfig) -> Self {
        // ffprobe is never used for extraction
        let command_builder = MediaCommandBuilder::new(&config.ffmpeg_path, "ffprobe");
        Self { config, command_builder }
    }

    async fn run_whisper(&self, audio_path: &Path, output_base: &Path, observer: &dyn TranscriptionObserver) -> Result<()> {
        let mut cmd = Command::new(&self.config.binary_path);
        cmd.arg("-m")
            .arg(&self.config.model_path)
            .arg("-f")
            .arg(audio_path)
            .arg("-oj")
            .arg("-of")
            .arg(output_base)
            .arg("-pp");
        if let Some(lang) = &self.config.language {
            cmd.arg("-l").arg(lang);
        }
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

        debug!("Executing whisper command: {:?}", cmd);

        let mut child = cmd
            .spawn()
            .map_err(|e| AmareloError::Transcription(format!("Failed to execute {}: {}", self.config.binary_path, e)))?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let segments = async {
            if let Some(stdout) = stdout {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    if let Some(segment) = parse_segment_line(&line) {
                        observer.on_segment(&segment);
                    }
                }
            }
        };

        let progress = async {
            let mut tail = Vec::new();
            if let Some(stderr) = stderr {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    match parse_progress_line(&line) {
                        Some(percent) => observer.on_progress(percent),
                        None => {
                            tail.push(line);
                            if tail.len() > 12 {
                                tail.remove(0);
                            }
                        }
                    }
                }
            }
            tail
        };

        let ((), stderr_tail) = tokio::join!(segments, progress);
        let status = child
            .wait()
            .await
            .map_err(|e| AmareloError::Transcription(format!("Failed to wait for whisper: {}", e)))?;

        debug!("Whisper exit status: {}", status);
        if !status.success() {
            return Err(AmareloError::Transcription(format!(
                "Whisper failed ({}): {}",
                status,
                stderr_tail.join("\n")
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Transcriber for WhisperCppTranscriber {
    async fn transcribe(&self, video: &Path, observer: &dyn TranscriptionObserver) -> Result<Transcription> {
        info!("Transcribing audio of {}", video.display());

        let temp_dir = tempfile::tempdir()
            .map_err(|e| AmareloError::Transcription(format!("Failed to create temp dir: {}", e)))?;
        let audio_path = temp_dir.path().join("audio.wav");
        let output_base = temp_dir.path().join("transcript");
        let output_path = temp_dir.path().join("transcript.json");

        self.command_builder
            .extract_audio(video, audio_path.as_path())
            .execute(AmareloError::Transcription)
            .await?;
        observer.on_progress(0.0);

        self.run_whisper(&audio_path, &output_base, observer).await?;

        let json_content = tokio::fs::read_to_string(&output_path)
            .await
            .map_err(|e| AmareloError::Transcription(format!("Failed to read transcription: {}", e)))?;
        let output: WhisperCppOutput = serde_json::from_str(&json_content)
            .map_err(|e| AmareloError::Transcription(format!("Failed to parse transcription JSON: {}", e)))?;

        let transcription = Transcription::from(output);
        observer.on_progress(100.0);
        info!(
            "Transcription finished: {} segments, language {}",
            transcription.segments.len(),
            transcription.language
        );
        Ok(transcription)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whisper_json_to_transcription() {
        let json = r#"{
            "systeminfo": "AVX = 1",
            "result": {"language": "en"},
            "transcription": [
                {"timestamps": {"from": "00:00:00,000", "to": "00:00:02,500"},
                 "offsets": {"from": 0, "to": 2500}, "text": " Hello there."},
                {"timestamps": {"from": "00:00:02,500", "to": "00:00:03,000"},
                 "offsets": {"from": 2500, "to": 3000}, "text": "   "},
                {"timestamps": {"from": "00:00:03,000", "to": "00:00:05,120"},
                 "offsets": {"from": 3000, "to": 5120}, "text": " General Kenobi."}
            ]
        }"#;
        let output: WhisperCppOutput = serde_json::from_str(json).unwrap();
        let transcription = Transcription::from(output);

        assert_eq!(transcription.language, "en");
        assert_eq!(
            transcription.segments,
            vec![Segment::new(0.0, 2.5, "Hello there."), Segment::new(3.0, 5.12, "General Kenobi.")]
        );
    }

    #[test]
    fn test_parse_segment_line() {
        let segment = parse_segment_line("[00:01:02.500 --> 00:01:04.000]   Bom dia").unwrap();
        assert_eq!(segment, Segment::new(62.5, 64.0, "Bom dia"));
        assert!(parse_segment_line("[00:00:00.000 --> 00:00:01.000]   ").is_none());
        assert!(parse_segment_line("whisper_init_from_file: loading model").is_none());
    }

    #[test]
    fn test_parse_progress_line() {
        assert_eq!(parse_progress_line("whisper_print_progress_callback: progress =  45%"), Some(45.0));
        assert_eq!(parse_progress_line("system_info: n_threads = 4"), None);
    }

    #[tokio::test]
    async fn test_missing_ffmpeg_is_transcription_error() {
        let config = TranscriberConfig {
            ffmpeg_path: "amarelo-missing-ffmpeg".to_string(),
            ..TranscriberConfig::default()
        };
        let transcriber = WhisperCppTranscriber::new(config);
        let err = transcriber
            .transcribe(Path::new("video.mp4"), &super::super::NoopObserver)
            .await
            .unwrap_err();
        assert!(matches!(err, AmareloError::Transcription(_)));
    }
}
