use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AmareloError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Media analysis error: {0}")]
    MediaAnalysis(String),

    #[error("Transcription error: {0}")]
    Transcription(String),

    #[error("Translation error: {0}")]
    Translation(String),

    #[error("Synchronization error: {0}")]
    Synchronization(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("File is locked by another run: {}", .0.display())]
    LockConflict(PathBuf),

    #[error("Subtitle error: {0}")]
    Subtitle(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

impl AmareloError {
    /// Errors that abort a single file but never the whole batch.
    ///
    /// Anything else (configuration, missing input tree) would fail every
    /// remaining file the same way and ends the run.
    pub fn is_file_fatal(&self) -> bool {
        matches!(
            self,
            Self::MediaAnalysis(_)
                | Self::Transcription(_)
                | Self::Synchronization(_)
                | Self::Encoding(_)
                | Self::Subtitle(_)
                | Self::UnsupportedFormat(_)
                | Self::Translation(_)
                | Self::Io(_)
                | Self::Json(_)
                | Self::Http(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, AmareloError>;
