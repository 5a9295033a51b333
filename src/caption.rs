//! Caption parsing and reflow.
//!
//! This module provides [`CaptionTrack`] and [`CaptionBlock`] for working
//! with SubRip (`.srt`) caption text, and [`wrap_text`] / [`reflow_track`]
//! for re-wrapping caption text to a maximum line width and line count.
//!
//! Index and timing lines are never touched. Blocks with fewer than three
//! lines are treated as malformed and written back exactly as they were read.
//!
//! # Example
//!
//! ```
//! use subgen::reflow_track;
//!
//! let raw = "1\n00:00:01,000 --> 00:00:04,000\nHello there, this is a rather long\ncaption line\n";
//! let reflowed = reflow_track(raw, 20, 2);
//! assert_eq!(
//!     reflowed,
//!     "1\n00:00:01,000 --> 00:00:04,000\nHello there, this is\na rather long\n\n",
//! );
//! ```

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::configuration::CaptionLayout;
use crate::error::SubgenError;

/// One or more blank lines, tolerating `\r\n` and whitespace-only lines.
static BLOCK_SEPARATOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\r?\n(?:[ \t]*\r?\n)+").expect("block separator pattern is valid")
});

/// A single caption block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptionBlock {
    /// A well-formed caption: index line, timing line, and text.
    Cue {
        /// The index line, passed through unmodified.
        index: String,
        /// The timing line, passed through unmodified.
        timing: String,
        /// All text lines joined with single spaces.
        text: String,
    },
    /// A block with fewer than three lines, kept byte-for-byte.
    Malformed(String),
}

impl CaptionBlock {
    fn parse(raw: &str) -> Self {
        let lines: Vec<&str> = raw.split('\n').collect();
        if lines.len() < 3 {
            return CaptionBlock::Malformed(raw.to_string());
        }

        let strip = |line: &str| line.strip_suffix('\r').unwrap_or(line).to_string();
        let text = lines[2..]
            .iter()
            .map(|line| line.strip_suffix('\r').unwrap_or(line))
            .collect::<Vec<_>>()
            .join(" ");

        CaptionBlock::Cue {
            index: strip(lines[0]),
            timing: strip(lines[1]),
            text,
        }
    }

    /// Re-wrap this block's text. Malformed blocks are returned unchanged.
    pub fn reflow(&self, layout: &CaptionLayout) -> Self {
        match self {
            CaptionBlock::Cue {
                index,
                timing,
                text,
            } => CaptionBlock::Cue {
                index: index.clone(),
                timing: timing.clone(),
                text: wrap_text(text, layout.max_line_width, layout.max_lines),
            },
            CaptionBlock::Malformed(raw) => CaptionBlock::Malformed(raw.clone()),
        }
    }
}

impl Display for CaptionBlock {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            CaptionBlock::Cue {
                index,
                timing,
                text,
            } => write!(f, "{index}\n{timing}\n{text}"),
            CaptionBlock::Malformed(raw) => f.write_str(raw),
        }
    }
}

/// An ordered sequence of caption blocks parsed from a SubRip file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptionTrack {
    /// The blocks in file order.
    pub blocks: Vec<CaptionBlock>,
}

impl CaptionTrack {
    /// Parse raw SubRip content.
    ///
    /// Blocks are separated by one or more blank lines. Whitespace-only
    /// blocks are dropped. Parsing never fails: anything that does not look
    /// like a caption becomes a [`CaptionBlock::Malformed`].
    pub fn parse(raw: &str) -> Self {
        let blocks = BLOCK_SEPARATOR
            .split(raw.trim())
            .filter(|block| !block.trim().is_empty())
            .map(CaptionBlock::parse)
            .collect();
        Self { blocks }
    }

    /// Re-wrap every cue to fit `layout`.
    pub fn reflow(&self, layout: &CaptionLayout) -> Self {
        Self {
            blocks: self
                .blocks
                .iter()
                .map(|block| block.reflow(layout))
                .collect(),
        }
    }

    /// Number of blocks, including malformed ones.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Returns `true` if the track has no blocks.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Serialize to SubRip text: blocks separated by a blank line, with a
    /// trailing blank line.
    pub fn to_srt(&self) -> String {
        self.to_string()
    }
}

impl Display for CaptionTrack {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        for (position, block) in self.blocks.iter().enumerate() {
            if position > 0 {
                f.write_str("\n\n")?;
            }
            write!(f, "{block}")?;
        }
        f.write_str("\n\n")
    }
}

/// Greedily word-wrap `text` into at most `max_lines` lines of at most
/// `max_line_width` characters, joined with `\n`.
///
/// Words are separated on any whitespace. A word longer than
/// `max_line_width` on its own is hard-split into chunks of exactly
/// `max_line_width` characters, and its remainder becomes the start of the
/// next line. Lines beyond `max_lines` are dropped.
///
/// Widths are counted in `char`s. A limit of `0` disables that limit.
///
/// # Example
///
/// ```
/// use subgen::wrap_text;
///
/// assert_eq!(wrap_text("one two three four five six seven", 10, 2), "one two\nthree four");
/// ```
pub fn wrap_text(text: &str, max_line_width: usize, max_lines: usize) -> String {
    let width = if max_line_width == 0 {
        usize::MAX
    } else {
        max_line_width
    };

    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_width = 0;

    for word in text.split_whitespace() {
        let word_width = word.chars().count();
        let candidate_width = if current.is_empty() {
            word_width
        } else {
            current_width + 1 + word_width
        };

        if candidate_width <= width {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
            current_width = candidate_width;
            continue;
        }

        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }

        let mut remainder = word;
        let mut remainder_width = word_width;
        while remainder_width > width {
            let split_at = remainder
                .char_indices()
                .nth(width)
                .map_or(remainder.len(), |(offset, _)| offset);
            lines.push(remainder[..split_at].to_string());
            remainder = &remainder[split_at..];
            remainder_width -= width;
        }
        current.push_str(remainder);
        current_width = remainder_width;
    }

    if !current.is_empty() {
        lines.push(current);
    }

    if max_lines > 0 {
        lines.truncate(max_lines);
    }
    lines.join("\n")
}

/// Parse, reflow, and re-serialize raw SubRip content.
///
/// See [`CaptionTrack::parse`] and [`wrap_text`] for the exact rules.
pub fn reflow_track(raw: &str, max_line_width: usize, max_lines: usize) -> String {
    CaptionTrack::parse(raw)
        .reflow(&CaptionLayout::new(max_line_width, max_lines))
        .to_srt()
}

/// Reflow a SubRip file in place.
///
/// # Errors
///
/// Returns [`SubgenError::IoError`] if the file cannot be read or written.
pub fn reflow_file<P: AsRef<Path>>(path: P, layout: &CaptionLayout) -> Result<(), SubgenError> {
    let path = path.as_ref();
    reflow_file_to(path, path, layout)
}

/// Reflow the SubRip file at `source` and write the result to `destination`.
///
/// `source` and `destination` may be the same path.
///
/// # Errors
///
/// Returns [`SubgenError::IoError`] if either file cannot be accessed.
pub fn reflow_file_to<P: AsRef<Path>, Q: AsRef<Path>>(
    source: P,
    destination: Q,
    layout: &CaptionLayout,
) -> Result<(), SubgenError> {
    let content = std::fs::read_to_string(source.as_ref())?;
    let track = CaptionTrack::parse(&content).reflow(layout);
    log::debug!(
        "Reflowed {} caption blocks from {}",
        track.len(),
        source.as_ref().display()
    );
    std::fs::write(destination, track.to_srt())?;
    Ok(())
}
