//! Session configuration.
//!
//! [`BatchOptions`] is a builder that threads transcription parameters,
//! caption layout, resume policy, progress callbacks, and cancellation tokens
//! through a [`BatchSession`](crate::BatchSession) without polluting every
//! function signature.
//!
//! # Example
//!
//! ```no_run
//! use subgen::{BatchOptions, CancellationToken, CaptionLayout};
//!
//! let token = CancellationToken::new();
//! let options = BatchOptions::new()
//!     .with_language("de")
//!     .with_model_path("~/whisper-models/ggml-large-v3.bin")
//!     .with_threads(8)
//!     .with_layout(CaptionLayout::new(37, 2))
//!     .with_cancellation(token.clone());
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::SubgenError;
use crate::progress::{CancellationToken, NoOpProgress, ProgressCallback};

/// Default speech-recognition language code.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Default location of the GGML model file.
pub const DEFAULT_MODEL_PATH: &str = "~/whisper-models/ggml-medium.bin";

/// Default maximum characters per caption line.
pub const DEFAULT_MAX_LINE_WIDTH: usize = 42;

/// Default maximum lines per caption.
pub const DEFAULT_MAX_LINES: usize = 2;

/// Line-width and line-count constraints applied when reflowing captions.
///
/// A value of `0` disables the corresponding limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptionLayout {
    /// Maximum characters per line.
    pub max_line_width: usize,
    /// Maximum lines per caption; extra lines are dropped.
    pub max_lines: usize,
}

impl CaptionLayout {
    /// Create a layout with the given limits.
    pub fn new(max_line_width: usize, max_lines: usize) -> Self {
        Self {
            max_line_width,
            max_lines,
        }
    }
}

impl Default for CaptionLayout {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINE_WIDTH, DEFAULT_MAX_LINES)
    }
}

/// Configuration for a batch session.
///
/// All fields have sensible defaults matching the common whisper.cpp setup:
/// English, the medium GGML model under `~/whisper-models`, automatic thread
/// count, 42 characters × 2 lines, skipping files that already have captions.
#[derive(Clone)]
pub struct BatchOptions {
    pub(crate) language: String,
    pub(crate) model_path: PathBuf,
    /// Thread count forwarded to the transcriber. `0` lets it decide.
    pub(crate) threads: usize,
    pub(crate) layout: CaptionLayout,
    pub(crate) skip_existing: bool,
    /// Overwrite existing captions and discard any stored checkpoint.
    pub(crate) force: bool,
    /// Explicit resume point taking precedence over the stored checkpoint.
    pub(crate) resume_from: Option<PathBuf>,
    pub(crate) progress: Arc<dyn ProgressCallback>,
    /// Cancellation token. `None` means never cancelled.
    pub(crate) cancellation: Option<CancellationToken>,
}

impl Debug for BatchOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("BatchOptions")
            .field("language", &self.language)
            .field("model_path", &self.model_path)
            .field("threads", &self.threads)
            .field("layout", &self.layout)
            .field("skip_existing", &self.skip_existing)
            .field("force", &self.force)
            .field("resume_from", &self.resume_from)
            .field("has_cancellation", &self.cancellation.is_some())
            .finish()
    }
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchOptions {
    /// Create a new configuration with default settings.
    pub fn new() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            threads: 0,
            layout: CaptionLayout::default(),
            skip_existing: true,
            force: false,
            resume_from: None,
            progress: Arc::new(NoOpProgress),
            cancellation: None,
        }
    }

    /// Set the language code passed to the transcriber and used in caption
    /// file names (`movie.<language>.srt`).
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Set the model file path. A leading `~` is expanded when the path is
    /// resolved.
    #[must_use]
    pub fn with_model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.model_path = path.into();
        self
    }

    /// Set the transcriber thread count. `0` lets the transcriber decide.
    #[must_use]
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Set the caption layout used for reflow and forwarded as a line-width
    /// hint to the transcriber.
    #[must_use]
    pub fn with_layout(mut self, layout: CaptionLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Control whether items that already have a caption file are skipped.
    /// Defaults to `true`. Ignored when [`with_force`](BatchOptions::with_force)
    /// is enabled.
    #[must_use]
    pub fn with_skip_existing(mut self, skip: bool) -> Self {
        self.skip_existing = skip;
        self
    }

    /// Overwrite existing captions and discard any stored checkpoint before
    /// starting.
    #[must_use]
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Resume from an explicit media path instead of the stored checkpoint.
    #[must_use]
    pub fn with_resume_from(mut self, path: impl Into<PathBuf>) -> Self {
        self.resume_from = Some(path.into());
        self
    }

    /// Attach a progress callback.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Attach a cancellation token.
    ///
    /// When the token is cancelled, the session stops at the next check,
    /// stores a checkpoint at the current item and returns
    /// [`SessionOutcome::Interrupted`](crate::SessionOutcome::Interrupted).
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// The configured language code.
    pub fn language(&self) -> &str {
        &self.language
    }

    /// The model path as configured, before `~` expansion.
    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    /// The model path with a leading `~` expanded to the home directory.
    pub fn resolved_model_path(&self) -> PathBuf {
        expand_home(&self.model_path)
    }

    /// The configured thread count (`0` = automatic).
    pub fn threads(&self) -> usize {
        self.threads
    }

    /// The configured caption layout.
    pub fn layout(&self) -> CaptionLayout {
        self.layout
    }

    /// Whether existing captions are skipped (and not forced).
    pub fn skips_existing(&self) -> bool {
        self.skip_existing && !self.force
    }

    /// Whether force mode is enabled.
    pub fn is_forced(&self) -> bool {
        self.force
    }

    /// Reject values that cannot produce a usable caption file name.
    ///
    /// The language code becomes part of `<stem>.<language>.srt`, so it must
    /// be non-empty and must not contain whitespace or path separators.
    ///
    /// # Errors
    ///
    /// Returns [`SubgenError::InvalidOption`] describing the offending value.
    pub fn check(&self) -> Result<(), SubgenError> {
        let language = self.language.as_str();
        if language.is_empty() {
            return Err(SubgenError::InvalidOption(
                "language code must not be empty".to_string(),
            ));
        }
        if language
            .chars()
            .any(|character| character.is_whitespace() || matches!(character, '/' | '\\'))
        {
            return Err(SubgenError::InvalidOption(format!(
                "language code '{language}' must not contain whitespace or path separators"
            )));
        }
        Ok(())
    }

    /// Returns `true` if cancellation has been requested.
    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(|token| token.is_cancelled())
    }
}

/// Expand a leading `~` in `path` to the current user's home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    match path.to_str() {
        Some(text) => PathBuf::from(shellexpand::tilde(text).into_owned()),
        None => path.to_path_buf(),
    }
}
