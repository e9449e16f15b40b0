//! Where a finished subtitle is written, per output mode.

use std::path::{Component, Path, PathBuf};

use crate::config::{OutputConfig, OutputMode};
use crate::error::{AmareloError, Result};
use crate::subtitle::SubtitleFormat;

/// Folder used by `output_folder` mode when none is configured
pub const DEFAULT_OUTPUT_FOLDER: &str = "Output";

/// Everything output resolution needs to know about one file
#[derive(Debug, Clone, Copy)]
pub struct OutputTarget<'a> {
    pub input_root: &'a Path,
    pub video: &'a Path,
    pub paired_subtitle: Option<&'a Path>,
    pub format: SubtitleFormat,
    /// Language of the text being written
    pub language: &'a str,
}

fn video_stem(video: &Path) -> Result<String> {
    video
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .ok_or_else(|| AmareloError::Config(format!("Invalid video filename: {}", video.display())))
}

fn video_dir(video: &Path) -> PathBuf {
    video.parent().map(Path::to_path_buf).unwrap_or_default()
}

/// Folder `output_folder` mode writes under for a run over `input_root`.
///
/// Its contents are generated, so scans of the input tree leave it out.
pub fn output_root(config: &OutputConfig, input_root: &Path) -> PathBuf {
    match &config.folder {
        Some(folder) if folder.is_absolute() => folder.clone(),
        Some(folder) => input_root.join(folder),
        None => input_root.join(DEFAULT_OUTPUT_FOLDER),
    }
}

/// Resolve the subtitle output path for `target` under `config`.
pub fn resolve_output_path(config: &OutputConfig, target: &OutputTarget<'_>) -> Result<PathBuf> {
    let stem = video_stem(target.video)?;
    let ext = target.format.extension();

    let path = match config.mode {
        OutputMode::Overwrite => match target.paired_subtitle {
            Some(subtitle) => match SubtitleFormat::from_path(subtitle) {
                Ok(existing) if existing == target.format => subtitle.to_path_buf(),
                _ => subtitle.with_extension(ext),
            },
            None => video_dir(target.video).join(format!("{}.{}", stem, ext)),
        },
        OutputMode::AlternateName => {
            let language = target.language.trim();
            let name = if language.is_empty() {
                format!("{}.{}", stem, ext)
            } else {
                format!("{}.{}.{}", stem, language, ext)
            };
            video_dir(target.video).join(name)
        }
        OutputMode::OutputFolder => output_root(config, target.input_root)
            .join(relative_video_dir(target.input_root, target.video))
            .join(format!("{}.{}", stem, ext)),
    };

    Ok(path)
}

/// Directory of `video` relative to `root`; empty when it lies outside.
fn relative_video_dir(root: &Path, video: &Path) -> PathBuf {
    let dir = video_dir(video);
    match pathdiff::diff_paths(&dir, root) {
        Some(rel) if !rel.components().any(|c| c == Component::ParentDir) => rel,
        _ => PathBuf::new(),
    }
}
