use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::{Config, OutputMode};
use crate::subtitle::SubtitleFormat;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Produce subtitles for every video under a directory
    Batch {
        /// Input directory containing video files
        #[arg(short, long)]
        input_dir: PathBuf,

        /// Translate subtitles to the target language
        #[arg(long)]
        translate: bool,

        /// Target language code (overrides the config file)
        #[arg(short, long)]
        target_lang: Option<String>,

        /// Burn the finished subtitles into a copy of each video
        #[arg(long)]
        burn: bool,

        /// Ask for confirmation before each file after the first
        #[arg(long)]
        ask: bool,

        /// Where subtitle files are written
        #[arg(long, value_enum)]
        output_mode: Option<OutputModeArg>,

        /// Output subtitle format
        #[arg(short, long, value_enum)]
        format: Option<FormatArg>,
    },

    /// Show which subtitle each video would be paired with
    Pairs {
        /// Input directory containing video files
        #[arg(short, long)]
        input_dir: PathBuf,
    },

    /// Convert a subtitle file between formats
    Convert {
        /// Input subtitle file
        #[arg(short, long)]
        input: PathBuf,

        /// Output subtitle file; the format follows its extension
        #[arg(short, long)]
        output: PathBuf,

        /// Apply the configured font style
        #[arg(long)]
        style: bool,
    },

    /// Print what the media probe reports for a video
    Probe {
        /// Input video file
        #[arg(short, long)]
        input: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputModeArg {
    Overwrite,
    AlternateName,
    OutputFolder,
}

impl From<OutputModeArg> for OutputMode {
    fn from(arg: OutputModeArg) -> Self {
        match arg {
            OutputModeArg::Overwrite => OutputMode::Overwrite,
            OutputModeArg::AlternateName => OutputMode::AlternateName,
            OutputModeArg::OutputFolder => OutputMode::OutputFolder,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Srt,
    Ass,
    Vtt,
}

impl From<FormatArg> for SubtitleFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Srt => SubtitleFormat::Srt,
            FormatArg::Ass => SubtitleFormat::Ass,
            FormatArg::Vtt => SubtitleFormat::Vtt,
        }
    }
}

/// Command-line overrides for a batch run
#[derive(Debug, Clone, Default)]
pub struct BatchOverrides {
    pub translate: bool,
    pub target_lang: Option<String>,
    pub burn: bool,
    pub ask: bool,
    pub output_mode: Option<OutputModeArg>,
    pub format: Option<FormatArg>,
}

impl BatchOverrides {
    /// Fold the flags into `config`; flags only ever switch features on.
    pub fn apply(&self, config: &mut Config) {
        if self.translate {
            config.translate.enabled = true;
        }
        if let Some(lang) = &self.target_lang {
            config.translate.target_language = lang.clone();
        }
        if self.burn {
            config.workflow.burn_subtitles = true;
        }
        if self.ask {
            config.workflow.policy = crate::config::ContinuePolicy::AskBeforeContinue;
        }
        if let Some(mode) = self.output_mode {
            config.output.mode = mode.into();
        }
        if let Some(format) = self.format {
            config.output.format = format.into();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ContinuePolicy;

    #[test]
    fn test_parse_batch_flags() {
        let args = Args::try_parse_from([
            "amarelo",
            "-v",
            "batch",
            "--input-dir",
            "/videos",
            "--translate",
            "--target-lang",
            "es",
            "--output-mode",
            "alternate-name",
            "--format",
            "vtt",
        ])
        .unwrap();

        assert!(args.verbose);
        match args.command {
            Commands::Batch {
                input_dir,
                translate,
                target_lang,
                output_mode,
                format,
                burn,
                ask,
            } => {
                assert_eq!(input_dir, PathBuf::from("/videos"));
                assert!(translate && !burn && !ask);
                assert_eq!(target_lang.as_deref(), Some("es"));
                assert_eq!(output_mode, Some(OutputModeArg::AlternateName));
                assert_eq!(format, Some(FormatArg::Vtt));
            }
            _ => panic!("expected batch command"),
        }
    }

    #[test]
    fn test_overrides_apply_to_config() {
        let mut config = Config::default();
        BatchOverrides {
            translate: true,
            target_lang: Some("ja".to_string()),
            burn: true,
            ask: true,
            output_mode: Some(OutputModeArg::OutputFolder),
            format: Some(FormatArg::Ass),
        }
        .apply(&mut config);

        assert!(config.translate.enabled);
        assert_eq!(config.translate.target_language, "ja");
        assert!(config.workflow.burn_subtitles);
        assert_eq!(config.workflow.policy, ContinuePolicy::AskBeforeContinue);
        assert_eq!(config.output.mode, OutputMode::OutputFolder);
        assert_eq!(config.output.format, SubtitleFormat::Ass);
    }

    #[test]
    fn test_empty_overrides_keep_config() {
        let mut config = Config::default();
        BatchOverrides::default().apply(&mut config);
        assert!(!config.translate.enabled);
        assert_eq!(config.output.mode, OutputMode::Overwrite);
    }
}
