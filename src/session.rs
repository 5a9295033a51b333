//! Batch orchestration.
//!
//! [`BatchSession`] drives one run over a media library:
//!
//! 1. scan the root directory into a sorted [`WorkList`];
//! 2. slice it at the resume checkpoint, if one is stored and still listed;
//! 3. for each item, in order: skip it if a caption already exists, otherwise
//!    preprocess, transcribe, reflow, and move the caption next to the media
//!    file;
//! 4. clear the checkpoint once every item has been visited.
//!
//! A failing item is recorded and the batch moves on. Cancellation is
//! checked before each item and whenever an external tool returns; when it
//! fires, the current item's path is stored as the checkpoint so that item is
//! retried on the next run.
//!
//! # Example
//!
//! ```no_run
//! use subgen::{BatchOptions, BatchSession, FfmpegPreprocessor, SessionOutcome, WhisperCli};
//!
//! let session = BatchSession::new("/media/library", BatchOptions::new().with_language("en"));
//! match session.run(&FfmpegPreprocessor::default(), &WhisperCli::default())? {
//!     SessionOutcome::Completed(summary) => {
//!         println!("{} processed, {} errors", summary.processed, summary.errored);
//!     }
//!     SessionOutcome::Interrupted { resume_from, .. } => {
//!         println!("paused, will resume at {}", resume_from.display());
//!     }
//! }
//! # Ok::<(), subgen::SubgenError>(())
//! ```

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::caption::reflow_file;
use crate::checkpoint::CheckpointStore;
use crate::configuration::BatchOptions;
use crate::error::SubgenError;
use crate::progress::{ItemReport, ItemStatus, ProgressTracker};
use crate::scanner::{self, MediaUnit, WorkList};
use crate::toolchain::{Preprocessor, TranscribeRequest, Transcriber};

/// Process exit status signalling "interrupted, resume is possible".
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

/// One item that failed during a session.
#[derive(Debug, Clone)]
pub struct ItemFailure {
    /// The media file.
    pub path: PathBuf,
    /// What went wrong.
    pub error: String,
}

/// Counters for one session. Not persisted.
#[derive(Debug, Clone, Default)]
pub struct SessionSummary {
    /// Media files found by the scan.
    pub total: usize,
    /// Media files this session set out to visit (after resume slicing).
    pub session_total: usize,
    /// Captions generated.
    pub processed: usize,
    /// Items skipped because a caption already existed.
    pub skipped: usize,
    /// Items that failed.
    pub errored: usize,
    /// Details of every failure, in processing order.
    pub failures: Vec<ItemFailure>,
}

impl SessionSummary {
    /// Returns `true` if no item failed.
    pub fn is_clean(&self) -> bool {
        self.errored == 0
    }

    fn record(&mut self, report: &ItemReport) {
        match report.status {
            ItemStatus::Succeeded => self.processed += 1,
            ItemStatus::Skipped => self.skipped += 1,
            ItemStatus::Failed => {
                self.errored += 1;
                self.failures.push(ItemFailure {
                    path: report.path.clone(),
                    error: report.error.clone().unwrap_or_default(),
                });
            }
        }
    }
}

/// How a session ended.
#[derive(Debug, Clone)]
pub enum SessionOutcome {
    /// Every remaining item was visited; the checkpoint has been cleared.
    Completed(SessionSummary),
    /// Cancellation was requested.
    Interrupted {
        /// The item a later run will start from.
        resume_from: PathBuf,
        /// Whether the checkpoint record was written.
        checkpoint_saved: bool,
        /// Counters up to the interruption.
        summary: SessionSummary,
    },
}

impl SessionOutcome {
    /// The session counters.
    pub fn summary(&self) -> &SessionSummary {
        match self {
            SessionOutcome::Completed(summary) => summary,
            SessionOutcome::Interrupted { summary, .. } => summary,
        }
    }

    /// Returns `true` for [`SessionOutcome::Interrupted`].
    pub fn is_interrupted(&self) -> bool {
        matches!(self, SessionOutcome::Interrupted { .. })
    }

    /// Process exit status for this outcome: `0` or [`INTERRUPTED_EXIT_CODE`].
    pub fn exit_code(&self) -> i32 {
        if self.is_interrupted() {
            INTERRUPTED_EXIT_CODE
        } else {
            0
        }
    }
}

/// Index in `work_list` to start from when resuming at `resume_from`.
///
/// Returns `0` (with a warning) if `resume_from` is not in the list.
pub fn resume_position(work_list: &[MediaUnit], resume_from: &Path) -> usize {
    let key = resume_from.to_string_lossy();
    match work_list.iter().position(|unit| unit.path_key() == key) {
        Some(index) => {
            log::info!(
                "Resuming from: {} (file {} of {})",
                resume_from.display(),
                index + 1,
                work_list.len()
            );
            index
        }
        None => {
            log::warn!(
                "Resume file '{}' not found in the current list. Starting from the beginning.",
                resume_from.display()
            );
            0
        }
    }
}

/// A single batch run over one root directory.
#[derive(Debug)]
pub struct BatchSession {
    root: PathBuf,
    options: BatchOptions,
    checkpoint: CheckpointStore,
}

impl BatchSession {
    /// Prepare a session for `root`. Nothing is touched until
    /// [`run`](BatchSession::run).
    pub fn new<P: AsRef<Path>>(root: P, options: BatchOptions) -> Self {
        let root = root.as_ref().to_path_buf();
        let checkpoint = CheckpointStore::for_root(&root);
        Self {
            root,
            options,
            checkpoint,
        }
    }

    /// The root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The session's options.
    pub fn options(&self) -> &BatchOptions {
        &self.options
    }

    /// The checkpoint store for this root.
    pub fn checkpoint(&self) -> &CheckpointStore {
        &self.checkpoint
    }

    /// Scan the root directory.
    ///
    /// # Errors
    ///
    /// See [`scanner::scan`].
    pub fn work_list(&self) -> Result<WorkList, SubgenError> {
        scanner::scan(&self.root)
    }

    /// Where this session would resume: the explicit
    /// [`with_resume_from`](BatchOptions::with_resume_from) path, else the
    /// stored checkpoint unless force mode is on.
    pub fn resume_point(&self) -> Option<PathBuf> {
        if let Some(path) = &self.options.resume_from {
            return Some(path.clone());
        }
        if self.options.force {
            return None;
        }
        self.checkpoint.load()
    }

    /// Run the session to completion or interruption.
    ///
    /// Per-item failures never surface here; they are counted in the
    /// returned [`SessionSummary`].
    ///
    /// # Errors
    ///
    /// - [`SubgenError::InvalidOption`] if [`BatchOptions::check`] fails.
    /// - Scan errors for the root directory itself (see [`scanner::scan`]).
    /// - [`SubgenError::IoError`] if the temporary working directory cannot
    ///   be created.
    pub fn run(
        &self,
        preprocessor: &dyn Preprocessor,
        transcriber: &dyn Transcriber,
    ) -> Result<SessionOutcome, SubgenError> {
        self.options.check()?;

        if self.options.force {
            log::info!("Force enabled: discarding any resume state");
            self.checkpoint.clear();
        }

        let work_list = self.work_list()?;
        let mut summary = SessionSummary {
            total: work_list.len(),
            ..SessionSummary::default()
        };

        if work_list.is_empty() {
            log::info!("No supported media files found in {}", self.root.display());
            self.checkpoint.clear();
            return Ok(SessionOutcome::Completed(summary));
        }

        let start = self
            .resume_point()
            .map_or(0, |path| resume_position(&work_list, &path));
        let pending = &work_list[start..];
        summary.session_total = pending.len();

        let workspace = tempfile::Builder::new().prefix("subgen-").tempdir()?;
        log::debug!("Working directory: {}", workspace.path().display());

        let mut tracker = ProgressTracker::new(
            self.options.progress.clone(),
            pending.len() as u64,
            start as u64,
            work_list.len() as u64,
        );

        for (position, unit) in pending.iter().enumerate() {
            if self.options.is_cancelled() {
                return Ok(self.interrupt(unit, summary));
            }
            tracker.starting(position as u64, unit.path().to_path_buf());

            let caption_path = unit.target_caption_path(&self.options.language);
            let result =
                self.process_item(unit, &caption_path, workspace.path(), preprocessor, transcriber);

            let (status, error) = match result {
                Ok(status) => (status, None),
                Err(_) if self.options.is_cancelled() => {
                    return Ok(self.interrupt(unit, summary));
                }
                Err(error) => (ItemStatus::Failed, Some(error.to_string())),
            };

            match (&status, &error) {
                (ItemStatus::Succeeded, _) => {
                    log::info!("Generated {}", caption_path.display());
                }
                (ItemStatus::Skipped, _) => {
                    log::info!("Skipped (already exists): {}", caption_path.display());
                }
                (_, error) => {
                    log::info!(
                        "Failed {}: {}",
                        unit.path().display(),
                        error.as_deref().unwrap_or("unknown error")
                    );
                }
            }

            let report = ItemReport {
                path: unit.path().to_path_buf(),
                caption_path,
                status,
                error,
            };
            summary.record(&report);
            tracker.finished(&report);
        }

        log::info!(
            "Processing complete: {} processed, {} skipped, {} errors",
            summary.processed,
            summary.skipped,
            summary.errored
        );
        self.checkpoint.clear();
        Ok(SessionOutcome::Completed(summary))
    }

    fn interrupt(&self, unit: &MediaUnit, summary: SessionSummary) -> SessionOutcome {
        log::info!("Pausing before finishing {}", unit.path().display());
        let checkpoint_saved = self.checkpoint.save(unit.path());
        SessionOutcome::Interrupted {
            resume_from: unit.path().to_path_buf(),
            checkpoint_saved,
            summary,
        }
    }

    /// Generate the caption for one item. Only reports success or skip;
    /// everything else is an error for the caller to classify.
    fn process_item(
        &self,
        unit: &MediaUnit,
        caption_path: &Path,
        workspace: &Path,
        preprocessor: &dyn Preprocessor,
        transcriber: &dyn Transcriber,
    ) -> Result<ItemStatus, SubgenError> {
        if self.options.skips_existing() && caption_path.exists() {
            return Ok(ItemStatus::Skipped);
        }

        let audio = workspace.join(format!("{}.wav", unit.stem()));
        preprocessor.preprocess(unit.path(), &audio)?;
        if self.options.is_cancelled() {
            return Err(SubgenError::Cancelled);
        }

        let generated = transcriber.output_path(&audio);
        remove_if_present(&generated)?;

        let model = self.options.resolved_model_path();
        let request = TranscribeRequest {
            audio: &audio,
            model: &model,
            language: &self.options.language,
            threads: self.options.threads,
            max_line_width: self.options.layout.max_line_width,
        };
        let transcribed = transcriber.transcribe(&request);
        // The transcoded audio is not needed past this point.
        let _ = fs::remove_file(&audio);
        transcribed?;

        if !generated.is_file() {
            return Err(SubgenError::MissingOutput {
                tool: transcriber.name().to_string(),
                expected: generated,
            });
        }

        reflow_file(&generated, &self.options.layout)?;
        move_file(&generated, caption_path)?;
        Ok(ItemStatus::Succeeded)
    }
}

fn remove_if_present(path: &Path) -> Result<(), SubgenError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
        Err(error) => Err(error.into()),
    }
}

/// Move `source` to `destination`, copying through a sibling staging file
/// when a plain rename is not possible (e.g. across filesystems).
fn move_file(source: &Path, destination: &Path) -> Result<(), SubgenError> {
    if fs::rename(source, destination).is_ok() {
        return Ok(());
    }

    let mut staging = destination.as_os_str().to_owned();
    staging.push(".partial");
    let staging = PathBuf::from(staging);

    if let Err(error) = fs::copy(source, &staging) {
        let _ = fs::remove_file(&staging);
        return Err(error.into());
    }
    if let Err(error) = fs::rename(&staging, destination) {
        let _ = fs::remove_file(&staging);
        return Err(error.into());
    }
    let _ = fs::remove_file(source);
    Ok(())
}
