//! Amarelo - batch subtitle workflow
//!
//! Pairs every video in a folder with its subtitle, transcribes the ones that
//! have none, optionally translates and re-times the result, writes it in the
//! requested format and style, and can burn it into a copy of the video.
//! Transcription uses whisper.cpp, translation an Ollama model and all media
//! work goes through ffmpeg/ffprobe.

pub mod cli;
pub mod config;
pub mod error;
pub mod lock;
pub mod matcher;
pub mod media;
pub mod subtitle;
pub mod sync;
pub mod transcribe;
pub mod translate;
pub mod workflow;
