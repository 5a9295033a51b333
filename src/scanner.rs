//! Media library scanning.
//!
//! [`scan`] walks a directory tree and returns every supported audio/video
//! file as a [`MediaUnit`], sorted by path. The order depends only on the set
//! of matching paths, never on filesystem enumeration order, so a resume
//! checkpoint recorded on one run stays meaningful on the next.
//!
//! # Example
//!
//! ```no_run
//! use subgen::{SubgenError, scanner};
//!
//! let work_list = scanner::scan("/media/library")?;
//! for unit in &work_list {
//!     println!("{} -> {}", unit.path().display(), unit.target_caption_path("en").display());
//! }
//! # Ok::<(), SubgenError>(())
//! ```

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::SubgenError;

/// File name suffixes recognised as media, compared case-insensitively.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    // Video
    ".mp4", ".mkv", ".mov", ".avi", ".wmv", ".flv", ".webm",
    // Audio
    ".mp3", ".wav", ".flac", ".aac", ".ogg", ".m4a",
];

/// Ordered list of media files for one session.
pub type WorkList = Vec<MediaUnit>;

/// One media file to be transcribed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaUnit {
    path: PathBuf,
}

impl MediaUnit {
    /// Wrap a media file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The media file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The path rendered as a string, used for ordering and checkpoints.
    pub fn path_key(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    /// File name without its final extension.
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Where the caption for this file goes: `<dir>/<stem>.<language>.srt`.
    pub fn target_caption_path(&self, language: &str) -> PathBuf {
        let file_name = format!("{}.{language}.srt", self.stem());
        match self.path.parent() {
            Some(parent) => parent.join(file_name),
            None => PathBuf::from(file_name),
        }
    }
}

/// Returns `true` if the file name ends with a supported media extension.
pub fn is_supported_media<P: AsRef<Path>>(path: P) -> bool {
    let Some(name) = path.as_ref().file_name() else {
        return false;
    };
    let name = name.to_string_lossy().to_lowercase();
    SUPPORTED_EXTENSIONS
        .iter()
        .any(|extension| name.ends_with(extension))
}

/// Recursively collect supported media files under `root`, sorted by path.
///
/// Symlinks to files are included; directory symlinks are not followed.
/// Entries that cannot be read (permission denied, broken links) are logged
/// and skipped so one bad subtree does not abort the scan.
///
/// # Errors
///
/// - [`SubgenError::RootNotFound`] if `root` does not exist.
/// - [`SubgenError::NotADirectory`] if `root` is not a directory.
/// - [`SubgenError::Scan`] if `root` itself cannot be read.
pub fn scan<P: AsRef<Path>>(root: P) -> Result<WorkList, SubgenError> {
    let root = root.as_ref();
    if !root.exists() {
        return Err(SubgenError::RootNotFound(root.to_path_buf()));
    }
    if !root.is_dir() {
        return Err(SubgenError::NotADirectory(root.to_path_buf()));
    }
    log::debug!("Scanning {} for media files", root.display());

    let mut keyed: Vec<(String, MediaUnit)> = Vec::new();

    for entry in WalkDir::new(root).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) if error.depth() == 0 => return Err(error.into()),
            Err(error) => {
                log::warn!("Skipping unreadable entry during scan: {error}");
                continue;
            }
        };

        if entry.file_type().is_dir() {
            continue;
        }
        // `is_file` follows symlinks, so dangling links are dropped here.
        if !entry.path().is_file() || !is_supported_media(entry.path()) {
            continue;
        }

        let unit = MediaUnit::new(entry.into_path());
        keyed.push((unit.path_key(), unit));
    }

    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    log::debug!("Found {} media files", keyed.len());
    Ok(keyed.into_iter().map(|(_, unit)| unit).collect())
}
