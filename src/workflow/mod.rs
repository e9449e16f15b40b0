// Batch orchestration: pairing, per-file pipeline, cross-file control
//
// - State: stages, events, run summary and the channels tying a run to its caller
// - Output: subtitle output path resolution

pub mod output;
pub mod state;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

pub use output::{OutputTarget, output_root, resolve_output_path};
pub use state::*;

use crate::config::{Config, ContinuePolicy, OutputMode, SyncStrategy};
use crate::error::{AmareloError, Result};
use crate::lock::{FileLockRegistry, LockHolder};
use crate::matcher::{FileMatcher, FilePairing, language_tag};
use crate::media::{MediaDescriptor, MediaFactory, MediaProbe, SubtitleBurner};
use crate::subtitle::{StyleOptions, SubtitleCodec, SubtitleEntry, SubtitleFormat, SubtitleTrack, apply_markup};
use crate::sync;
use crate::transcribe::{Segment, Transcriber, TranscriberFactory, TranscriptionObserver};
use crate::translate::{Translator, TranslatorFactory, same_language};

/// Entries shown in a preview event
const PREVIEW_ENTRIES: usize = 5;

/// Entries sampled for language detection
const DETECTION_SAMPLE: usize = 10;

const FALLBACK_LANGUAGE: &str = "en";

/// External services the pipeline delegates to
#[derive(Clone)]
pub struct Collaborators {
    pub probe: Arc<dyn MediaProbe>,
    pub transcriber: Arc<dyn Transcriber>,
    /// Required only when translation is enabled
    pub translator: Option<Arc<dyn Translator>>,
    pub burner: Arc<dyn SubtitleBurner>,
}

impl Collaborators {
    /// Default ffmpeg / whisper.cpp / Ollama implementations
    pub fn from_config(config: &Config) -> Result<Self> {
        let translator = if config.translate.enabled {
            Some(TranslatorFactory::create_translator(config.translate.clone())?)
        } else {
            None
        };

        Ok(Self {
            probe: MediaFactory::create_probe(config.media.clone()),
            transcriber: TranscriberFactory::create_transcriber(config.transcriber.clone()),
            translator,
            burner: MediaFactory::create_burner(config.media.clone()),
        })
    }
}

/// Caller's handle on a run started with [`Workflow::start`]
pub struct RunHandle {
    pub events: mpsc::UnboundedReceiver<WorkflowEvent>,
    pub decisions: mpsc::UnboundedSender<Decision>,
    pub cancel: CancellationFlag,
    pub state: SharedState,
    pub join: JoinHandle<Result<RunSummary>>,
}

/// Track obtained for a file before translation and timing correction
struct AcquiredTrack {
    track: SubtitleTrack,
    source: SourceKind,
    /// Language reported by the transcriber
    spoken_language: Option<String>,
}

/// Forwards transcription callbacks as run events
struct EventObserver<'a> {
    reporter: &'a Reporter,
    name: &'a str,
}

impl TranscriptionObserver for EventObserver<'_> {
    fn on_segment(&self, segment: &Segment) {
        self.reporter.preview(format!("[{:.1}s] {}", segment.start, segment.text));
    }

    fn on_progress(&self, percent: f32) {
        let snapshot = self.reporter.state().snapshot();
        self.reporter.emit(WorkflowEvent::Progress {
            message: format!("Transcribing {}: {:.0}%", self.name, percent),
            current: snapshot.progress_current,
            total: snapshot.progress_total,
            stage: Stage::Transcribing,
        });
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Turn recognised segments into a track, dropping ones with unusable timing.
pub fn segments_to_track(segments: &[Segment]) -> SubtitleTrack {
    let mut track = SubtitleTrack::new();
    for segment in segments {
        match SubtitleEntry::new(track.len() + 1, segment.start, segment.end, segment.text.trim()) {
            Ok(mut entry) => {
                entry.confidence = segment.confidence;
                track.push(entry);
            }
            Err(e) => debug!("Dropping transcription segment: {}", e),
        }
    }
    track
}

pub struct Workflow {
    config: Config,
    matcher: FileMatcher,
    codec: SubtitleCodec,
    collaborators: Collaborators,
    locks: FileLockRegistry,
}

impl Workflow {
    pub fn new(config: Config) -> Result<Self> {
        let collaborators = Collaborators::from_config(&config)?;
        Self::with_collaborators(config, collaborators)
    }

    pub fn with_collaborators(config: Config, collaborators: Collaborators) -> Result<Self> {
        config.validate()?;
        if config.translate.enabled && collaborators.translator.is_none() {
            return Err(AmareloError::Config(
                "Translation is enabled but no translator is configured".to_string(),
            ));
        }

        Ok(Self {
            codec: SubtitleCodec::new(config.style.clone()),
            matcher: FileMatcher::new(),
            config,
            collaborators,
            locks: FileLockRegistry::new(),
        })
    }

    /// Share a lock table with other workflows in this process.
    pub fn with_lock_registry(mut self, locks: FileLockRegistry) -> Self {
        self.locks = locks;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run over `input_dir` on a background task.
    pub fn start(self: Arc<Self>, input_dir: PathBuf) -> RunHandle {
        let (context, controller) = RunContext::channel();
        let join = tokio::spawn(async move { self.run(&input_dir, context).await });

        RunHandle {
            events: controller.events,
            decisions: controller.decisions,
            cancel: controller.cancel,
            state: controller.state,
            join,
        }
    }

    /// Process every video under `input_dir`.
    ///
    /// Per-file failures are recorded in the summary and never abort the
    /// batch. Run-level problems (a missing directory, or an error that is
    /// not file-fatal such as bad configuration) are returned as errors.
    pub async fn run(&self, input_dir: &Path, mut context: RunContext) -> Result<RunSummary> {
        let mut summary = RunSummary::started();
        let holder = LockHolder::new();
        let reporter = context.reporter.clone();

        info!("Starting run {} over {}", holder, input_dir.display());
        reporter.stage(Stage::Matching, format!("Scanning {}", input_dir.display()));

        let report = self
            .matcher
            .clone()
            .excluding(output_root(&self.config.output, input_dir))
            .scan(input_dir)?;
        for warning in report.warnings() {
            reporter.warn(warning);
        }

        let total = report.pairings.len();
        reporter.state().update(|s| s.progress_total = total);
        info!("Found {} video files to process", total);

        for (i, pairing) in report.pairings.iter().enumerate() {
            if i > 0 && self.config.workflow.policy == ContinuePolicy::AskBeforeContinue {
                if context.cancel.is_cancelled() {
                    summary.cancelled = true;
                    break;
                }
                if context.decide(pairing.video.clone()).await == Decision::Stop {
                    info!("Run stopped before {}", pairing.video.display());
                    summary.cancelled = true;
                    break;
                }
            }
            if context.cancel.is_cancelled() {
                info!("Run cancelled before {}", pairing.video.display());
                summary.cancelled = true;
                break;
            }

            let name = display_name(&pairing.video);
            reporter.state().update(|s| {
                s.current_file = Some(pairing.video.clone());
                s.progress_current = i;
            });

            let Some(_guard) = self.locks.try_acquire(&pairing.video, holder) else {
                reporter.warn(format!(
                    "{}: skipped, {}",
                    name,
                    AmareloError::LockConflict(pairing.video.clone())
                ));
                summary.skipped.push(pairing.video.clone());
                continue;
            };

            let result = self.process_file(pairing, input_dir, &reporter).await;
            let success = result.is_ok();
            match result {
                Ok(outcome) => {
                    reporter.stage(Stage::Completed, format!("Finished {}", name));
                    info!("Successfully processed: {}", pairing.video.display());
                    summary.successes.push(outcome);
                }
                Err(e) if e.is_file_fatal() => reporter.fail(format!("{}: {}", name, e)),
                Err(e) => {
                    reporter.fail(format!("{}: {}", name, e));
                    error!("Aborting run: {}", e);
                    return Err(e);
                }
            }

            reporter.state().update(|s| s.progress_current = i + 1);
            reporter.emit(WorkflowEvent::FileFinished {
                video: pairing.video.clone(),
                success,
            });
        }

        let state = reporter.state().snapshot();
        summary.errors = state.errors;
        summary.warnings = state.warnings;
        summary.finished_at = chrono::Utc::now();
        reporter.state().update(|s| s.current_file = None);

        info!(
            "Run finished: {} succeeded, {} failed, {} skipped{}",
            summary.successes.len(),
            summary.errors.len(),
            summary.skipped.len(),
            if summary.cancelled { " (stopped early)" } else { "" }
        );
        Ok(summary)
    }

    async fn process_file(&self, pairing: &FilePairing, input_root: &Path, reporter: &Reporter) -> Result<FileOutcome> {
        let video = pairing.video.as_path();
        let name = display_name(video);

        reporter.stage(Stage::Analyzing, format!("Analyzing {}", name));
        let media = self.collaborators.probe.analyze(video).await?;

        let AcquiredTrack {
            mut track,
            source,
            spoken_language,
        } = self.acquire_track(pairing, &name, reporter).await?;
        reporter.preview(self.codec.preview(&track, PREVIEW_ENTRIES));

        let source_language = match spoken_language {
            Some(language) => language,
            None => self.source_language(&track, pairing.subtitle.as_deref(), &name, reporter).await,
        };
        let mut language = source_language.clone();

        if self.config.translate.enabled {
            let target = self.config.translate.target_language.as_str();
            if same_language(&source_language, target) {
                info!("{} is already in {}, skipping translation", name, target);
            } else if let Some(translator) = &self.collaborators.translator {
                reporter.stage(
                    Stage::Translating,
                    format!("Translating {} from {} to {}", name, source_language, target),
                );
                track = self
                    .translate_track(&track, translator.as_ref(), &source_language, target, &name, reporter)
                    .await;
                language = target.to_string();
                reporter.preview(self.codec.preview(&track, PREVIEW_ENTRIES));
            }
        }

        reporter.stage(Stage::Synchronizing, format!("Synchronizing {}", name));
        let track = self.synchronize(&track, source, &media, &name, reporter).await?;

        let (track, format, style) = self.format_track(track, &name, reporter);

        reporter.stage(Stage::Saving, format!("Saving {}", name));
        let subtitle_path = resolve_output_path(
            &self.config.output,
            &OutputTarget {
                input_root,
                video,
                paired_subtitle: pairing.subtitle.as_deref(),
                format,
                language: &language,
            },
        )?;
        self.codec.write_file(&track, &subtitle_path, format, style).await?;
        reporter.preview(self.codec.preview(&track, PREVIEW_ENTRIES));

        let merged_video = if self.config.workflow.burn_subtitles {
            reporter.stage(Stage::Merging, format!("Burning subtitles into {}", name));
            match self.collaborators.burner.burn(video, &subtitle_path, &self.config.style).await {
                Ok(path) => Some(path),
                Err(e) => {
                    let reason = match e {
                        AmareloError::Encoding(reason) => reason,
                        other => other.to_string(),
                    };
                    return Err(AmareloError::Encoding(format!(
                        "{}; subtitle kept at {}",
                        reason,
                        subtitle_path.display()
                    )));
                }
            }
        } else {
            None
        };

        Ok(FileOutcome {
            video: video.to_path_buf(),
            subtitle_path,
            format,
            source,
            entries: track.len(),
            merged_video,
        })
    }

    /// Load the paired subtitle, falling back to transcription when it is unusable.
    async fn acquire_track(&self, pairing: &FilePairing, name: &str, reporter: &Reporter) -> Result<AcquiredTrack> {
        if let Some(subtitle) = &pairing.subtitle {
            reporter.stage(Stage::Loading, format!("Loading {}", display_name(subtitle)));
            match self.load_subtitle(subtitle).await {
                Ok(track) => {
                    return Ok(AcquiredTrack {
                        track,
                        source: SourceKind::Loaded,
                        spoken_language: None,
                    });
                }
                Err(e) => reporter.warn(format!(
                    "{}: could not load {} ({}), transcribing instead",
                    name,
                    display_name(subtitle),
                    e
                )),
            }
        }

        reporter.stage(Stage::Transcribing, format!("Transcribing {}", name));
        let observer = EventObserver { reporter, name };
        let transcription = self.collaborators.transcriber.transcribe(&pairing.video, &observer).await?;

        let track = segments_to_track(&transcription.segments);
        if track.is_empty() {
            return Err(AmareloError::Transcription("No speech was recognised".to_string()));
        }

        let language = transcription.language.trim();
        let spoken_language = if language.is_empty() || language.eq_ignore_ascii_case("auto") {
            FALLBACK_LANGUAGE.to_string()
        } else {
            language.to_string()
        };

        Ok(AcquiredTrack {
            track,
            source: SourceKind::Transcribed,
            spoken_language: Some(spoken_language),
        })
    }

    async fn load_subtitle(&self, path: &Path) -> Result<SubtitleTrack> {
        let track = self.codec.read_file(path).await?;
        if track.is_empty() {
            return Err(AmareloError::Subtitle("no parseable entries".to_string()));
        }
        info!("Loaded {} entries from {}", track.len(), path.display());
        Ok(track)
    }

    /// Declared language, then the file name tag, then detection, then English.
    async fn source_language(
        &self,
        track: &SubtitleTrack,
        subtitle: Option<&Path>,
        name: &str,
        reporter: &Reporter,
    ) -> String {
        if let Some(declared) = &self.config.translate.source_language {
            if !declared.trim().is_empty() {
                return declared.trim().to_string();
            }
        }

        if let Some(tag) = subtitle.and_then(language_tag) {
            return tag;
        }

        if let Some(translator) = &self.collaborators.translator {
            let sample = track
                .iter()
                .take(DETECTION_SAMPLE)
                .map(|e| e.text.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            match translator.detect_language(&sample).await {
                Ok(Some(language)) => return language,
                Ok(None) => {}
                Err(e) => reporter.warn(format!("{}: language detection failed: {}", name, e)),
            }
        }

        // Only translation and alternate names depend on the guess
        if self.config.translate.enabled || self.config.output.mode == OutputMode::AlternateName {
            reporter.warn(format!(
                "{}: source language unknown, assuming {}",
                name, FALLBACK_LANGUAGE
            ));
        }
        FALLBACK_LANGUAGE.to_string()
    }

    /// Translate entry by entry; a failed entry keeps its original text.
    async fn translate_track(
        &self,
        track: &SubtitleTrack,
        translator: &dyn Translator,
        source: &str,
        target: &str,
        name: &str,
        reporter: &Reporter,
    ) -> SubtitleTrack {
        let mut translated = SubtitleTrack::new();
        let mut failures = 0;

        for entry in track {
            let mut next = entry.clone();
            match translator.translate(&entry.text, source, target).await {
                Ok(text) if !text.trim().is_empty() => {
                    next.text = text.trim().to_string();
                    next.original_text = Some(entry.text.clone());
                }
                Ok(_) => {
                    failures += 1;
                    reporter.warn(format!("{}: entry {} came back empty, kept original text", name, entry.index));
                }
                Err(e) => {
                    failures += 1;
                    reporter.warn(format!("{}: entry {} kept original text: {}", name, entry.index, e));
                }
            }
            translated.push(next);
        }

        if failures > 0 {
            warn!("{}: {} of {} entries left untranslated", name, failures, track.len());
        }
        translated
    }

    async fn synchronize(
        &self,
        track: &SubtitleTrack,
        source: SourceKind,
        media: &MediaDescriptor,
        name: &str,
        reporter: &Reporter,
    ) -> Result<SubtitleTrack> {
        if source == SourceKind::Loaded && self.config.sync.strategy == SyncStrategy::Retranscribe {
            let observer = EventObserver { reporter, name };
            let fresh = self
                .collaborators
                .transcriber
                .transcribe(&media.path, &observer)
                .await
                .map_err(|e| AmareloError::Synchronization(format!("re-transcription failed: {}", e)))?;
            return sync::realign(track, &fresh.segments);
        }

        sync::offset_by_anchor(track, media, self.config.sync.min_duration)
    }

    /// Apply the configured style, choosing the output format it needs.
    fn format_track(
        &self,
        track: SubtitleTrack,
        name: &str,
        reporter: &Reporter,
    ) -> (SubtitleTrack, SubtitleFormat, Option<&StyleOptions>) {
        let style = &self.config.style;
        let mut format = self.config.output.format;
        if style.is_default() {
            return (track, format, None);
        }

        reporter.stage(Stage::Formatting, format!("Formatting {}", name));
        if format == SubtitleFormat::Srt && self.config.output.escalate_styled_srt {
            debug!("Styled SRT requested, writing ASS for {}", name);
            format = SubtitleFormat::Ass;
        }

        match format {
            SubtitleFormat::Ass => (track, format, Some(style)),
            _ => (apply_markup(&track, style, format), format, None),
        }
    }
}
