//! Preflight validation.
//!
//! [`validate_setup`] checks everything a batch run depends on before any
//! media is touched: the root directory, the model file, and the two external
//! executables. The result is a [`ValidationReport`] listing informational
//! notices, warnings, and errors.
//!
//! # Example
//!
//! ```no_run
//! use subgen::{BatchOptions, validation};
//!
//! let report = validation::validate_setup(
//!     "/media/library",
//!     &BatchOptions::new(),
//!     "whisper-cli",
//!     "ffmpeg",
//! );
//! if !report.is_valid() {
//!     eprint!("{report}");
//! }
//! ```

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::Path;

use crate::checkpoint::CheckpointStore;
use crate::configuration::BatchOptions;
use crate::error::SubgenError;
use crate::toolchain::locate;

/// Summary of preflight validation.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// Informational notices (not problems).
    pub info: Vec<String>,
    /// Non-fatal issues that may affect the run.
    pub warnings: Vec<String>,
    /// Fatal issues that will prevent the run.
    pub errors: Vec<String>,
}

impl ValidationReport {
    /// Returns `true` if no errors were found.
    ///
    /// Warnings do not affect this result; only errors make the report
    /// invalid.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Total number of issues (info + warnings + errors).
    pub fn issue_count(&self) -> usize {
        self.info.len() + self.warnings.len() + self.errors.len()
    }
}

impl Display for ValidationReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        for item in &self.info {
            writeln!(f, "[INFO] {item}")?;
        }
        for item in &self.warnings {
            writeln!(f, "[WARN] {item}")?;
        }
        for item in &self.errors {
            writeln!(f, "[ERROR] {item}")?;
        }
        if self.issue_count() == 0 {
            writeln!(f, "No issues found.")?;
        }
        Ok(())
    }
}

/// Check that the model file exists, expanding a leading `~`.
///
/// # Errors
///
/// Returns [`SubgenError::ModelNotFound`] with the expanded path.
pub fn check_model(options: &BatchOptions) -> Result<(), SubgenError> {
    let model = options.resolved_model_path();
    if model.is_file() {
        Ok(())
    } else {
        Err(SubgenError::ModelNotFound(model))
    }
}

/// Run every preflight check for a session over `root`.
pub fn validate_setup<P: AsRef<Path>>(
    root: P,
    options: &BatchOptions,
    transcriber_executable: &str,
    preprocessor_executable: &str,
) -> ValidationReport {
    let root = root.as_ref();
    let mut report = ValidationReport::default();

    // ── Root directory ─────────────────────────────────────────────
    if !root.exists() {
        report
            .errors
            .push(SubgenError::RootNotFound(root.to_path_buf()).to_string());
    } else if !root.is_dir() {
        report
            .errors
            .push(SubgenError::NotADirectory(root.to_path_buf()).to_string());
    } else {
        report.info.push(format!("Root: {}", root.display()));

        let checkpoint = CheckpointStore::for_root(root);
        if checkpoint.exists() {
            match checkpoint.load() {
                Some(next) => report
                    .info
                    .push(format!("Resume state present: next file {}", next.display())),
                None => report.warnings.push(format!(
                    "Resume state file {} is unreadable and will be ignored",
                    checkpoint.path().display()
                )),
            }
        }
    }

    // ── Model ──────────────────────────────────────────────────────
    match check_model(options) {
        Ok(()) => report.info.push(format!(
            "Model: {}",
            options.resolved_model_path().display()
        )),
        Err(error) => report.errors.push(error.to_string()),
    }

    // ── Executables ────────────────────────────────────────────────
    for executable in [transcriber_executable, preprocessor_executable] {
        match locate(executable) {
            Ok(path) => report
                .info
                .push(format!("Executable: {executable} ({})", path.display())),
            Err(error) => report.errors.push(error.to_string()),
        }
    }

    // ── Options ────────────────────────────────────────────────────
    if let Err(error) = options.check() {
        report.errors.push(error.to_string());
    }

    // ── Layout ─────────────────────────────────────────────────────
    let layout = options.layout();
    if layout.max_line_width == 0 {
        report
            .warnings
            .push("Max line length is 0, so caption lines will not be wrapped".to_string());
    }
    if layout.max_lines == 0 {
        report
            .warnings
            .push("Max lines is 0, so caption line count will not be limited".to_string());
    }

    report
}
