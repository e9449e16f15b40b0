use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AmareloError, Result};
use crate::subtitle::{StyleOptions, SubtitleFormat};

fn default_scene_anchor_count() -> usize {
    8
}

fn default_scene_threshold() -> f64 {
    0.4
}

fn default_min_duration() -> f64 {
    0.5
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub transcriber: TranscriberConfig,
    #[serde(default)]
    pub translate: TranslateConfig,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub style: StyleOptions,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriberConfig {
    /// Path to transcriber binary (e.g., whisper-cli)
    pub binary_path: String,
    /// Path to the ggml model file
    pub model_path: String,
    /// Language hint; auto-detect when unset
    pub language: Option<String>,
    /// ffmpeg used to extract 16 kHz mono audio before transcription
    pub ffmpeg_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslateConfig {
    /// Translate every track to `target_language`
    pub enabled: bool,
    /// Ollama endpoint URL
    pub endpoint: String,
    /// LLM model to use for translation
    pub model: String,
    /// Declared language of existing subtitle files; detected when unset
    pub source_language: Option<String>,
    pub target_language: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SceneDetection {
    /// No anchors; the anchor pass leaves timing untouched
    None,
    /// Evenly spaced anchors across the duration
    Even,
    /// ffmpeg scene-change filter, falling back to `Even`
    Detect,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    /// Additional encoding options for the hard-burn step
    /// Common options: ["-preset", "fast", "-crf", "23"]
    pub burn_options: Vec<String>,
    pub scene_detection: SceneDetection,
    #[serde(default = "default_scene_anchor_count")]
    pub scene_anchor_count: usize,
    #[serde(default = "default_scene_threshold")]
    pub scene_threshold: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Replace the paired subtitle (or write next to the video)
    Overwrite,
    /// `<video stem>.<lang>.<ext>` next to the video
    AlternateName,
    /// Mirror the input tree under a separate folder
    OutputFolder,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub mode: OutputMode,
    /// Target of `OutputFolder`; `<input>/Output` when unset
    pub folder: Option<PathBuf>,
    pub format: SubtitleFormat,
    /// Switch SRT output to ASS once visual styling is requested
    #[serde(default = "default_true")]
    pub escalate_styled_srt: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStrategy {
    /// Shift the whole track so the first entry lands on the first scene mark
    SceneAnchor,
    /// Re-run speech timing and keep the existing wording
    Retranscribe,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub strategy: SyncStrategy,
    #[serde(default = "default_min_duration")]
    pub min_duration: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContinuePolicy {
    ProcessAll,
    AskBeforeContinue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    pub policy: ContinuePolicy,
    /// Hard-burn the saved subtitle into a new video
    pub burn_subtitles: bool,
}

impl Default for TranscriberConfig {
    fn default() -> Self {
        Self {
            binary_path: "whisper-cli".to_string(),
            model_path: "models/ggml-base.bin".to_string(),
            language: None,
            ffmpeg_path: "ffmpeg".to_string(),
        }
    }
}

impl Default for TranslateConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: "http://localhost:11434".to_string(),
            model: "llama3.2:3b".to_string(),
            source_language: None,
            target_language: "pt".to_string(),
            timeout_secs: 300,
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            burn_options: vec![
                "-preset".to_string(),
                "fast".to_string(),
                "-crf".to_string(),
                "23".to_string(),
            ],
            scene_detection: SceneDetection::None,
            scene_anchor_count: default_scene_anchor_count(),
            scene_threshold: default_scene_threshold(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            mode: OutputMode::Overwrite,
            folder: None,
            format: SubtitleFormat::Srt,
            escalate_styled_srt: true,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            strategy: SyncStrategy::SceneAnchor,
            min_duration: default_min_duration(),
        }
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            policy: ContinuePolicy::ProcessAll,
            burn_subtitles: false,
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AmareloError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| AmareloError::Config(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| AmareloError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| AmareloError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.style.validate()?;

        if !(self.sync.min_duration > 0.0) {
            return Err(AmareloError::Config(format!(
                "sync.min_duration must be positive, got {}",
                self.sync.min_duration
            )));
        }

        if self.media.scene_detection == SceneDetection::Detect
            && !(0.0..=1.0).contains(&self.media.scene_threshold)
        {
            return Err(AmareloError::Config(format!(
                "media.scene_threshold must be within 0..=1, got {}",
                self.media.scene_threshold
            )));
        }

        if self.translate.enabled && self.translate.target_language.trim().is_empty() {
            return Err(AmareloError::Config(
                "translate.target_language is required when translation is enabled".to_string(),
            ));
        }

        if let Some(folder) = &self.output.folder {
            if folder.as_os_str().is_empty() {
                return Err(AmareloError::Config("output.folder is empty".to_string()));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.output.mode, OutputMode::Overwrite);
        assert_eq!(config.workflow.policy, ContinuePolicy::ProcessAll);
        assert!(config.style.is_default());
    }

    #[test]
    fn test_partial_file_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("amarelo.toml");
        std::fs::write(
            &path,
            r##"
[style]
font_name = "Verdana"
font_size = 28
font_color = "#FFFF00"
bold = true

[output]
mode = "alternate_name"
format = "ass"

[workflow]
policy = "ask_before_continue"
burn_subtitles = true
"##,
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.style.font_name, "Verdana");
        assert_eq!(config.output.mode, OutputMode::AlternateName);
        assert_eq!(config.output.format, SubtitleFormat::Ass);
        assert!(config.output.escalate_styled_srt);
        assert_eq!(config.workflow.policy, ContinuePolicy::AskBeforeContinue);
        assert_eq!(config.sync.min_duration, 0.5);
        assert_eq!(config.transcriber.binary_path, "whisper-cli");
    }

    #[test]
    fn test_invalid_color_is_rejected() {
        let mut config = Config::default();
        config.style.font_color = "red".to_string();
        assert!(matches!(config.validate(), Err(AmareloError::Config(_))));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("saved.toml");
        let mut config = Config::default();
        config.translate.enabled = true;
        config.translate.target_language = "es".to_string();
        config.save_to_file(&path).unwrap();

        let reloaded = Config::from_file(&path).unwrap();
        assert!(reloaded.translate.enabled);
        assert_eq!(reloaded.translate.target_language, "es");
    }
}
