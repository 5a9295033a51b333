//! # subgen
//!
//! Batch-generate subtitles for media libraries with whisper.cpp.
//!
//! `subgen` walks a directory tree, hands every audio/video file to an
//! external speech-recognition tool (whisper.cpp's `whisper-cli` by default,
//! with `ffmpeg` preparing the audio), and reflows the resulting SubRip
//! captions to a maximum line width and line count. Runs are resumable: an
//! interrupted session stores a checkpoint inside the library and the next
//! run continues where it stopped.
//!
//! ## Quick Start
//!
//! ### Caption a Library
//!
//! ```no_run
//! use subgen::{BatchOptions, BatchSession, FfmpegPreprocessor, WhisperCli};
//!
//! let options = BatchOptions::new()
//!     .with_language("en")
//!     .with_model_path("~/whisper-models/ggml-medium.bin");
//! let session = BatchSession::new("/media/library", options);
//! let outcome = session.run(&FfmpegPreprocessor::default(), &WhisperCli::default())?;
//! println!("{} captions generated", outcome.summary().processed);
//! # Ok::<(), subgen::SubgenError>(())
//! ```
//!
//! ### Reflow an Existing Caption File
//!
//! ```no_run
//! use subgen::{CaptionLayout, reflow_file};
//!
//! reflow_file("movie.en.srt", &CaptionLayout::new(42, 2))?;
//! # Ok::<(), subgen::SubgenError>(())
//! ```
//!
//! ## Features
//!
//! - **Deterministic scanning**: media files are ordered by path so a resume
//!   point stays valid between runs
//! - **Resumable sessions**: Ctrl+C stores a checkpoint at the current file;
//!   the next run picks it up
//! - **Failure isolation**: one broken file is reported and counted, never
//!   fatal to the batch
//! - **Caption reflow**: greedy word wrap with hard splitting of oversized
//!   words, line-count truncation, and pass-through of malformed blocks
//! - **Pluggable tools**: [`Preprocessor`] and [`Transcriber`] traits for
//!   custom or stubbed collaborators
//! - **Progress & cancellation**: [`ProgressCallback`] and
//!   [`CancellationToken`]
//!
//! ## Requirements
//!
//! `ffmpeg` and a whisper.cpp build providing `whisper-cli` must be
//! available, together with a GGML model file.

pub mod caption;
pub mod checkpoint;
pub mod configuration;
pub mod error;
pub mod interrupt;
pub mod progress;
pub mod scanner;
pub mod session;
pub mod toolchain;
pub mod validation;

pub use caption::{CaptionBlock, CaptionTrack, reflow_file, reflow_file_to, reflow_track, wrap_text};
pub use checkpoint::{CHECKPOINT_FILE_NAME, CheckpointStore};
pub use configuration::{BatchOptions, CaptionLayout};
pub use error::SubgenError;
pub use interrupt::cancel_on_interrupt;
pub use progress::{CancellationToken, ItemReport, ItemStatus, ProgressCallback, ProgressInfo};
pub use scanner::{MediaUnit, SUPPORTED_EXTENSIONS, WorkList};
pub use session::{
    BatchSession, INTERRUPTED_EXIT_CODE, ItemFailure, SessionOutcome, SessionSummary,
};
pub use toolchain::{FfmpegPreprocessor, Preprocessor, TranscribeRequest, Transcriber, WhisperCli};
pub use validation::ValidationReport;
