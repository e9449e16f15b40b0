//! Amarelo - batch subtitle workflow
//!
//! Entry point for the `amarelo` binary: pairs videos with subtitles,
//! transcribes or translates where needed and writes styled subtitle files.

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use amarelo::cli::{Args, BatchOverrides, Commands};
use amarelo::config::Config;
use amarelo::matcher::FileMatcher;
use amarelo::media::{MediaFactory, MediaProbe};
use amarelo::subtitle::{SubtitleCodec, SubtitleFormat};
use amarelo::translate::check_ollama_availability;
use amarelo::workflow::{Decision, RunHandle, RunSummary, Workflow, WorkflowEvent, output_root};

/// Config file picked up from the working directory when `--config` is absent
const DEFAULT_CONFIG_FILE: &str = "amarelo.toml";

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    setup_logging(args.verbose)?;
    info!("Starting Amarelo");

    let mut config = load_config(args.config.as_deref())?;

    match args.command {
        Commands::Batch {
            input_dir,
            translate,
            target_lang,
            burn,
            ask,
            output_mode,
            format,
        } => {
            BatchOverrides {
                translate,
                target_lang,
                burn,
                ask,
                output_mode,
                format,
            }
            .apply(&mut config);
            config.validate()?;

            if config.translate.enabled {
                check_ollama_availability(&config.translate.endpoint, &config.translate.model).await?;
            }

            let workflow = Arc::new(Workflow::new(config)?);
            let summary = drive_run(workflow.start(input_dir)).await?;
            print_summary(&summary);

            if !summary.is_clean() {
                std::process::exit(1);
            }
        }
        Commands::Pairs { input_dir } => {
            let report = FileMatcher::new()
                .excluding(output_root(&config.output, &input_dir))
                .scan(&input_dir)?;

            println!("\n{:<50} {:<50}", "Video", "Subtitle");
            println!("{}", "-".repeat(100));
            for pairing in &report.pairings {
                let subtitle = pairing
                    .subtitle
                    .as_ref()
                    .map(|p| relative(&input_dir, p))
                    .unwrap_or_else(|| "(transcribe)".to_string());
                println!("{:<50} {:<50}", relative(&input_dir, &pairing.video), subtitle);
            }
            for warning in report.warnings() {
                println!("warning: {}", warning);
            }
        }
        Commands::Convert { input, output, style } => {
            info!("Converting {} to {}", input.display(), output.display());

            let codec = SubtitleCodec::new(config.style.clone());
            let track = codec.read_file(&input).await?;
            let format = SubtitleFormat::from_path(&output)?;
            let style = style.then_some(&config.style);
            codec.write_file(&track, &output, format, style).await?;

            println!("Wrote {} entries to {}", track.len(), output.display());
        }
        Commands::Probe { input } => {
            let probe = MediaFactory::create_probe(config.media.clone());
            let descriptor = probe.analyze(&input).await?;
            println!("{}", serde_json::to_string_pretty(&descriptor)?);
        }
    }

    Ok(())
}

/// `--config` wins, then `amarelo.toml` in the working directory, then defaults.
fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::from_file(path)?,
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            info!("Found {} in current directory, loading...", DEFAULT_CONFIG_FILE);
            Config::from_file(DEFAULT_CONFIG_FILE)?
        }
        None => Config::default(),
    };
    Ok(config)
}

/// Drain run events into a progress bar until the run finishes.
async fn drive_run(mut handle: RunHandle) -> Result<RunSummary> {
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    let mut interrupted = false;
    loop {
        tokio::select! {
            event = handle.events.recv() => {
                let Some(event) = event else { break };
                match event {
                    WorkflowEvent::Progress { message, current, total, .. } => {
                        bar.set_length(total as u64);
                        bar.set_position(current as u64);
                        bar.set_message(message);
                    }
                    WorkflowEvent::Preview { text } => {
                        bar.suspend(|| println!("{}", text.trim_end()));
                    }
                    WorkflowEvent::NeedsDecision { next } => {
                        bar.set_draw_target(ProgressDrawTarget::hidden());
                        let decision = ask_to_continue(next).await;
                        bar.set_draw_target(ProgressDrawTarget::stderr());
                        // The run may already be gone; its result still arrives via join.
                        let _ = handle.decisions.send(decision);
                    }
                    WorkflowEvent::FileFinished { video, success } => {
                        let mark = if success { "done" } else { "failed" };
                        bar.println(format!("{}: {}", mark, video.display()));
                    }
                    WorkflowEvent::Warning { message } => bar.println(format!("warning: {}", message)),
                    WorkflowEvent::Error { message } => bar.println(format!("error: {}", message)),
                }
            }
            _ = tokio::signal::ctrl_c(), if !interrupted => {
                interrupted = true;
                warn!("Interrupted; stopping after the current file");
                handle.cancel.cancel();
            }
        }
    }

    bar.finish_and_clear();
    Ok(handle.join.await??)
}

/// Prompt on stdin without blocking the runtime; anything but "n"/"q" continues.
async fn ask_to_continue(next: PathBuf) -> Decision {
    let answer = tokio::task::spawn_blocking(move || {
        print!("Continue with {}? [Y/n] ", next.display());
        let _ = std::io::stdout().flush();
        let mut line = String::new();
        std::io::stdin().read_line(&mut line).map(|_| line)
    })
    .await;

    match answer {
        Ok(Ok(line)) => parse_answer(&line),
        _ => Decision::Stop,
    }
}

fn parse_answer(line: &str) -> Decision {
    match line.trim().to_lowercase().as_str() {
        "n" | "no" | "q" | "quit" => Decision::Stop,
        _ => Decision::Continue,
    }
}

fn print_summary(summary: &RunSummary) {
    let elapsed = (summary.finished_at - summary.started_at).num_seconds().max(0) as u64;

    println!("\nRun finished in {}", format_duration(elapsed));
    println!("  processed: {}", summary.successes.len());
    for outcome in &summary.successes {
        println!("    {} -> {}", outcome.video.display(), outcome.subtitle_path.display());
        if let Some(merged) = &outcome.merged_video {
            println!("      burned: {}", merged.display());
        }
    }
    if !summary.skipped.is_empty() {
        println!("  skipped: {}", summary.skipped.len());
    }
    if !summary.warnings.is_empty() {
        println!("  warnings: {}", summary.warnings.len());
    }
    if !summary.errors.is_empty() {
        println!("  errors: {}", summary.errors.len());
        for error in &summary.errors {
            println!("    {}", error);
        }
    }
    if summary.cancelled {
        println!("  stopped before the batch was complete");
    }
}

fn relative(root: &Path, path: &Path) -> String {
    pathdiff::diff_paths(path, root)
        .unwrap_or_else(|| path.to_path_buf())
        .display()
        .to_string()
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<()> {
    let log_dir = std::env::current_dir()?.join(".amarelo").join("log");
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = rolling::daily(&log_dir, "amarelo.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);
    // The guard flushes on drop; keep it for the life of the process
    std::mem::forget(guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    // stderr keeps the console log clear of the progress bar on stdout
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_file(verbose)
        .with_line_number(verbose);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!(
        "Logging initialized - console: {}, file: {}",
        log_level,
        log_dir.join("amarelo.log").display()
    );

    Ok(())
}

/// Format duration in seconds to human readable string
fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    }
}
