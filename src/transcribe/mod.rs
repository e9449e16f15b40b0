// Speech-to-text collaborators
//
// - WhisperCpp: whisper.cpp command-line implementation

pub mod whisper_cpp;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

pub use whisper_cpp::WhisperCppTranscriber;

use crate::config::TranscriberConfig;
use crate::error::Result;

/// One recognised utterance, times in seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    pub text: String,
    pub confidence: Option<f32>,
}

impl Segment {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
            confidence: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcription {
    /// Detected (or forced) language code
    pub language: String,
    pub segments: Vec<Segment>,
}

/// Receives partial results while a transcription runs
pub trait TranscriptionObserver: Send + Sync {
    fn on_segment(&self, _segment: &Segment) {}

    /// `percent` in `0.0..=100.0`
    fn on_progress(&self, _percent: f32) {}
}

/// Observer that ignores everything
pub struct NoopObserver;

impl TranscriptionObserver for NoopObserver {}

#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe the audio track of `video`; failures are `Transcription` errors
    async fn transcribe(&self, video: &Path, observer: &dyn TranscriptionObserver) -> Result<Transcription>;
}

/// Factory for creating transcriber instances
pub struct TranscriberFactory;

impl TranscriberFactory {
    pub fn create_transcriber(config: TranscriberConfig) -> Arc<dyn Transcriber> {
        Arc::new(WhisperCppTranscriber::new(config))
    }
}
