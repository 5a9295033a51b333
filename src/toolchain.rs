//! External tool boundary.
//!
//! A [`BatchSession`](crate::BatchSession) never spawns processes itself. It
//! talks to a [`Preprocessor`] (turn any media file into 16 kHz mono PCM WAV)
//! and a [`Transcriber`] (turn that WAV into a SubRip file). The default
//! implementations shell out to `ffmpeg` and whisper.cpp's `whisper-cli`;
//! tests substitute in-process stubs.
//!
//! Given a [`CancellationToken`], the default implementations poll the
//! running process and kill it once cancellation is requested, so a tool that
//! ignores SIGINT cannot hold a paused session hostage.

use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use crate::error::SubgenError;
use crate::progress::CancellationToken;

/// Number of trailing stderr lines kept in [`SubgenError::ToolFailed`].
const STDERR_TAIL_LINES: usize = 5;

/// How often a running tool is checked for exit and cancellation.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Parameters for one transcription.
#[derive(Debug, Clone)]
pub struct TranscribeRequest<'a> {
    /// Preprocessed audio file. The transcriber writes its output next to it.
    pub audio: &'a Path,
    /// Model file path, already `~`-expanded.
    pub model: &'a Path,
    /// Language code.
    pub language: &'a str,
    /// Thread count; `0` means let the transcriber decide.
    pub threads: usize,
    /// Maximum line width hint; `0` means no hint.
    pub max_line_width: usize,
}

/// Converts a media file into audio suitable for transcription.
pub trait Preprocessor {
    /// Write single-channel 16 kHz 16-bit PCM audio from `input` to `output`.
    fn preprocess(&self, input: &Path, output: &Path) -> Result<(), SubgenError>;
}

/// Produces a SubRip caption file from preprocessed audio.
pub trait Transcriber {
    /// Name used in log and error messages.
    fn name(&self) -> &str;

    /// Run the transcription described by `request`.
    fn transcribe(&self, request: &TranscribeRequest<'_>) -> Result<(), SubgenError>;

    /// Where a successful [`transcribe`](Transcriber::transcribe) leaves its
    /// caption file. Defaults to `<audio file name>.srt` in the audio's
    /// directory.
    fn output_path(&self, audio: &Path) -> PathBuf {
        let mut file_name = audio.file_name().map(OsString::from).unwrap_or_default();
        file_name.push(".srt");
        audio.with_file_name(file_name)
    }
}

/// [`Preprocessor`] backed by the `ffmpeg` executable.
#[derive(Debug, Clone)]
pub struct FfmpegPreprocessor {
    executable: String,
    cancellation: Option<CancellationToken>,
}

impl FfmpegPreprocessor {
    /// Use the given executable name or path.
    pub fn new(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
            cancellation: None,
        }
    }

    /// Kill the running `ffmpeg` when `token` is cancelled.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// The configured executable.
    pub fn executable(&self) -> &str {
        &self.executable
    }
}

impl Default for FfmpegPreprocessor {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl Preprocessor for FfmpegPreprocessor {
    fn preprocess(&self, input: &Path, output: &Path) -> Result<(), SubgenError> {
        let mut command = Command::new(&self.executable);
        command
            .arg("-nostdin")
            .arg("-i")
            .arg(input)
            .args(["-ar", "16000", "-ac", "1", "-c:a", "pcm_s16le", "-y"])
            .arg(output);
        run_tool(&self.executable, &mut command, self.cancellation.as_ref())
    }
}

/// [`Transcriber`] backed by whisper.cpp's `whisper-cli`.
#[derive(Debug, Clone)]
pub struct WhisperCli {
    executable: String,
    cancellation: Option<CancellationToken>,
}

impl WhisperCli {
    /// Use the given executable name or path.
    pub fn new(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
            cancellation: None,
        }
    }

    /// Kill the running transcription when `token` is cancelled.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// The configured executable.
    pub fn executable(&self) -> &str {
        &self.executable
    }

    /// Build the command line for `request` without running it.
    pub fn command(&self, request: &TranscribeRequest<'_>) -> Command {
        let mut command = Command::new(&self.executable);
        command
            .arg("-m")
            .arg(request.model)
            .arg("-l")
            .arg(request.language)
            .arg("--output-srt");
        if request.threads > 0 {
            command.arg("-t").arg(request.threads.to_string());
        }
        if request.max_line_width > 0 {
            command.arg("-ml").arg(request.max_line_width.to_string());
        }
        command.arg(request.audio);
        command
    }
}

impl Default for WhisperCli {
    fn default() -> Self {
        Self::new("whisper-cli")
    }
}

impl Transcriber for WhisperCli {
    fn name(&self) -> &str {
        &self.executable
    }

    fn transcribe(&self, request: &TranscribeRequest<'_>) -> Result<(), SubgenError> {
        run_tool(
            &self.executable,
            &mut self.command(request),
            self.cancellation.as_ref(),
        )
    }
}

/// Resolve an executable name or path the way the shell would.
///
/// # Errors
///
/// Returns [`SubgenError::ToolNotFound`] if nothing matches.
pub fn locate(executable: &str) -> Result<PathBuf, SubgenError> {
    which::which(executable).map_err(|_| SubgenError::ToolNotFound(executable.to_string()))
}

/// Run `command` to completion, capturing its stderr.
///
/// Returns [`SubgenError::Cancelled`] after killing the process if
/// `cancellation` fires while it runs.
fn run_tool(
    tool: &str,
    command: &mut Command,
    cancellation: Option<&CancellationToken>,
) -> Result<(), SubgenError> {
    log::debug!("Running {command:?}");

    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| SubgenError::ToolSpawn {
            tool: tool.to_string(),
            source,
        })?;

    // Drained on a separate thread so a chatty tool never blocks on a full pipe.
    let stderr_reader = child.stderr.take().map(|mut pipe| {
        thread::spawn(move || {
            let mut buffer = Vec::new();
            let _ = pipe.read_to_end(&mut buffer);
            buffer
        })
    });

    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if cancellation.is_some_and(CancellationToken::is_cancelled) {
            log::info!("Stopping {tool}");
            let _ = child.kill();
            let _ = child.wait();
            return Err(SubgenError::Cancelled);
        }
        thread::sleep(POLL_INTERVAL);
    };

    if status.success() {
        return Ok(());
    }

    let stderr = stderr_reader
        .and_then(|reader| reader.join().ok())
        .unwrap_or_default();
    Err(SubgenError::ToolFailed {
        tool: tool.to_string(),
        status: status.to_string(),
        stderr: stderr_tail(&String::from_utf8_lossy(&stderr)),
    })
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join(" | ")
}
