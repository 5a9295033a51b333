//! Batch session integration tests.
//!
//! External tools are replaced by in-process stubs so every scenario runs
//! without ffmpeg or whisper.cpp installed.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use subgen::{
    BatchOptions, BatchSession, CancellationToken, CaptionLayout, CheckpointStore, ItemReport,
    ItemStatus, Preprocessor, ProgressCallback, ProgressInfo, SessionOutcome, SubgenError,
    TranscribeRequest, Transcriber,
};

const GENERATED_CAPTION: &str = "1\n00:00:00,000 --> 00:00:02,500\nthis caption text is long enough that it needs to be wrapped onto more lines than allowed\n\n2\n00:00:02,500 --> 00:00:04,000\nshort line\n";

// ── Stub collaborators ─────────────────────────────────────────────

#[derive(Default)]
struct RecordingPreprocessor {
    inputs: Mutex<Vec<PathBuf>>,
    fail_on: Vec<&'static str>,
}

impl RecordingPreprocessor {
    fn failing_on(names: &[&'static str]) -> Self {
        Self {
            fail_on: names.to_vec(),
            ..Self::default()
        }
    }

    fn input_names(&self) -> Vec<String> {
        self.inputs
            .lock()
            .unwrap()
            .iter()
            .map(|path| path.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }
}

impl Preprocessor for RecordingPreprocessor {
    fn preprocess(&self, input: &Path, output: &Path) -> Result<(), SubgenError> {
        self.inputs.lock().unwrap().push(input.to_path_buf());
        let name = input.file_name().unwrap().to_string_lossy();
        if self.fail_on.iter().any(|failing| *failing == name) {
            return Err(SubgenError::ToolFailed {
                tool: "ffmpeg-stub".to_string(),
                status: "exit status: 1".to_string(),
                stderr: "Invalid data found when processing input".to_string(),
            });
        }
        fs::write(output, b"RIFF")?;
        Ok(())
    }
}

#[derive(Clone, Debug)]
struct RecordedRequest {
    audio: PathBuf,
    model: PathBuf,
    language: String,
    threads: usize,
    max_line_width: usize,
}

#[derive(Default)]
struct ScriptedTranscriber {
    requests: Mutex<Vec<RecordedRequest>>,
    fail_on: Vec<&'static str>,
    no_output_for: Vec<&'static str>,
    cancel_on: Option<(&'static str, CancellationToken)>,
}

impl ScriptedTranscriber {
    fn stems(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|request| request.audio.file_stem().unwrap().to_string_lossy().into_owned())
            .collect()
    }
}

impl Transcriber for ScriptedTranscriber {
    fn name(&self) -> &str {
        "whisper-stub"
    }

    fn transcribe(&self, request: &TranscribeRequest<'_>) -> Result<(), SubgenError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            audio: request.audio.to_path_buf(),
            model: request.model.to_path_buf(),
            language: request.language.to_string(),
            threads: request.threads,
            max_line_width: request.max_line_width,
        });
        assert!(request.audio.is_file(), "audio should be preprocessed first");

        let stem = request.audio.file_stem().unwrap().to_string_lossy();

        if let Some((cancel_stem, token)) = &self.cancel_on {
            if *cancel_stem == stem {
                // Simulates Ctrl+C reaching both us and the child process.
                token.cancel();
                return Err(SubgenError::ToolFailed {
                    tool: "whisper-stub".to_string(),
                    status: "signal: 2 (SIGINT)".to_string(),
                    stderr: String::new(),
                });
            }
        }
        if self.fail_on.iter().any(|failing| *failing == stem) {
            return Err(SubgenError::ToolFailed {
                tool: "whisper-stub".to_string(),
                status: "exit status: 1".to_string(),
                stderr: "failed to read audio".to_string(),
            });
        }
        if self.no_output_for.iter().any(|silent| *silent == stem) {
            return Ok(());
        }

        fs::write(self.output_path(request.audio), GENERATED_CAPTION)?;
        Ok(())
    }
}

fn library(names: &[&str]) -> tempfile::TempDir {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    for name in names {
        let path = directory.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"media").unwrap();
    }
    directory
}

fn completed(outcome: SessionOutcome) -> subgen::SessionSummary {
    match outcome {
        SessionOutcome::Completed(summary) => summary,
        other => panic!("Expected completed session, got: {other:?}"),
    }
}

// ── End-to-end scenarios ───────────────────────────────────────────

#[test]
fn all_items_succeed() {
    let root = library(&["a.mp4", "b.wav"]);
    let preprocessor = RecordingPreprocessor::default();
    let transcriber = ScriptedTranscriber::default();

    let session = BatchSession::new(root.path(), BatchOptions::new());
    let summary = completed(session.run(&preprocessor, &transcriber).unwrap());

    assert_eq!(summary.processed, 2);
    assert_eq!(summary.errored, 0);
    assert_eq!(summary.skipped, 0);
    assert!(root.path().join("a.en.srt").is_file());
    assert!(root.path().join("b.en.srt").is_file());
    assert!(!session.checkpoint().exists());
}

#[test]
fn generated_captions_are_reflowed() {
    let root = library(&["a.mp4"]);
    let options = BatchOptions::new().with_layout(CaptionLayout::new(20, 2));

    let session = BatchSession::new(root.path(), options);
    completed(
        session
            .run(&RecordingPreprocessor::default(), &ScriptedTranscriber::default())
            .unwrap(),
    );

    let caption = fs::read_to_string(root.path().join("a.en.srt")).unwrap();
    assert_eq!(
        caption,
        "1\n00:00:00,000 --> 00:00:02,500\nthis caption text is\nlong enough that it\n\n2\n00:00:02,500 --> 00:00:04,000\nshort line\n\n"
    );
}

#[test]
fn one_failing_item_does_not_stop_the_batch() {
    let root = library(&["a.mp4", "b.wav"]);
    let transcriber = ScriptedTranscriber {
        fail_on: vec!["b"],
        ..ScriptedTranscriber::default()
    };

    let session = BatchSession::new(root.path(), BatchOptions::new());
    let summary = completed(
        session
            .run(&RecordingPreprocessor::default(), &transcriber)
            .unwrap(),
    );

    assert_eq!(summary.processed, 1);
    assert_eq!(summary.errored, 1);
    assert!(root.path().join("a.en.srt").is_file());
    assert!(!root.path().join("b.en.srt").exists());
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].path, root.path().join("b.wav"));
    assert!(
        summary.failures[0].error.contains("exit status: 1"),
        "Failure should carry the exit status: {}",
        summary.failures[0].error
    );
}

#[test]
fn interruption_checkpoints_current_item_and_resume_continues_there() {
    let root = library(&["a.mp4", "b.mp4", "c.mp4"]);
    let token = CancellationToken::new();
    let transcriber = ScriptedTranscriber {
        cancel_on: Some(("b", token.clone())),
        ..ScriptedTranscriber::default()
    };

    let options = BatchOptions::new().with_cancellation(token);
    let session = BatchSession::new(root.path(), options);
    let outcome = session
        .run(&RecordingPreprocessor::default(), &transcriber)
        .unwrap();

    let expected = root.path().join("b.mp4");
    match &outcome {
        SessionOutcome::Interrupted {
            resume_from,
            checkpoint_saved,
            summary,
        } => {
            assert_eq!(resume_from, &expected);
            assert!(checkpoint_saved);
            assert_eq!(summary.processed, 1);
            assert_eq!(summary.errored, 0, "Interruption is not a failure");
        }
        other => panic!("Expected interruption, got: {other:?}"),
    }
    assert_eq!(outcome.exit_code(), subgen::INTERRUPTED_EXIT_CODE);
    assert_eq!(session.checkpoint().load(), Some(expected));
    assert!(root.path().join("a.en.srt").is_file());
    assert!(!root.path().join("b.en.srt").exists());

    // Second run picks up the checkpoint.
    let preprocessor = RecordingPreprocessor::default();
    let session = BatchSession::new(root.path(), BatchOptions::new());
    let summary = completed(
        session
            .run(&preprocessor, &ScriptedTranscriber::default())
            .unwrap(),
    );

    assert_eq!(preprocessor.input_names(), vec!["b.mp4", "c.mp4"]);
    assert_eq!(summary.processed, 2);
    assert_eq!(summary.total, 3);
    assert_eq!(summary.session_total, 2);
    assert!(!session.checkpoint().exists());
}

#[test]
fn cancellation_before_start_touches_nothing() {
    let root = library(&["a.mp4", "b.mp4"]);
    let token = CancellationToken::new();
    token.cancel();

    let preprocessor = RecordingPreprocessor::default();
    let session = BatchSession::new(root.path(), BatchOptions::new().with_cancellation(token));
    let outcome = session
        .run(&preprocessor, &ScriptedTranscriber::default())
        .unwrap();

    assert!(outcome.is_interrupted());
    assert!(preprocessor.input_names().is_empty());
    assert_eq!(session.checkpoint().load(), Some(root.path().join("a.mp4")));
}

/// Blocks until its token is cancelled, like a tool that ignores SIGINT
/// until it is killed.
struct BlockingTranscriber {
    token: CancellationToken,
    audio: Mutex<Option<PathBuf>>,
}

impl Transcriber for BlockingTranscriber {
    fn name(&self) -> &str {
        "whisper-blocking"
    }

    fn transcribe(&self, request: &TranscribeRequest<'_>) -> Result<(), SubgenError> {
        *self.audio.lock().unwrap() = Some(request.audio.to_path_buf());
        while !self.token.is_cancelled() {
            thread::sleep(Duration::from_millis(10));
        }
        Err(SubgenError::Cancelled)
    }
}

#[test]
fn cancellation_while_tool_blocks_saves_checkpoint_and_cleans_up() {
    let root = library(&["a.mp4", "b.mp4"]);
    let token = CancellationToken::new();
    let remote = token.clone();
    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        remote.cancel();
    });

    let preprocessor = RecordingPreprocessor::default();
    let transcriber = BlockingTranscriber {
        token: token.clone(),
        audio: Mutex::new(None),
    };
    let session = BatchSession::new(root.path(), BatchOptions::new().with_cancellation(token));
    let outcome = session.run(&preprocessor, &transcriber).unwrap();
    canceller.join().unwrap();

    match outcome {
        SessionOutcome::Interrupted {
            resume_from,
            checkpoint_saved,
            ..
        } => {
            assert_eq!(resume_from, root.path().join("a.mp4"));
            assert!(checkpoint_saved);
        }
        other => panic!("Expected interruption, got: {other:?}"),
    }
    assert_eq!(session.checkpoint().load(), Some(root.path().join("a.mp4")));
    assert!(!root.path().join("a.en.srt").exists());

    assert_eq!(preprocessor.input_names(), vec!["a.mp4"]);

    let audio = transcriber.audio.lock().unwrap().clone().unwrap();
    assert!(!audio.parent().unwrap().exists(), "Working directory should be removed");
}

#[cfg(unix)]
#[test]
fn cancellation_stops_transcriber_that_ignores_interrupts() {
    use std::os::unix::fs::PermissionsExt;
    use std::time::Instant;

    use subgen::WhisperCli;

    let root = library(&["a.mp4", "b.mp4"]);
    let tools = tempfile::tempdir().expect("Failed to create temp dir");
    let script = tools.path().join("whisper-cli");
    fs::write(&script, "#!/bin/sh\ntrap '' INT\nexec sleep 30\n").unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

    let token = CancellationToken::new();
    let remote = token.clone();
    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(200));
        remote.cancel();
    });

    let started = Instant::now();
    let session = BatchSession::new(root.path(), BatchOptions::new().with_cancellation(token.clone()));
    let outcome = session
        .run(
            &RecordingPreprocessor::default(),
            &WhisperCli::new(script.to_string_lossy()).with_cancellation(token),
        )
        .unwrap();
    canceller.join().unwrap();

    assert!(outcome.is_interrupted());
    assert!(started.elapsed() < Duration::from_secs(10), "Tool should be killed");
    assert_eq!(session.checkpoint().load(), Some(root.path().join("a.mp4")));
}

#[test]
fn invalid_language_is_rejected_before_any_work() {
    let root = library(&["a.mp4"]);
    let preprocessor = RecordingPreprocessor::default();

    let result = BatchSession::new(root.path(), BatchOptions::new().with_language(""))
        .run(&preprocessor, &ScriptedTranscriber::default());

    assert!(matches!(result, Err(SubgenError::InvalidOption(_))));
    assert!(preprocessor.input_names().is_empty());
}

// ── Resume ─────────────────────────────────────────────────────────

#[test]
fn resume_processes_exactly_the_tail() {
    let root = library(&["a.mp4", "b.mp4", "c.mp4", "d.mp4"]);
    CheckpointStore::for_root(root.path()).save(root.path().join("c.mp4"));

    let preprocessor = RecordingPreprocessor::default();
    let session = BatchSession::new(root.path(), BatchOptions::new());
    completed(
        session
            .run(&preprocessor, &ScriptedTranscriber::default())
            .unwrap(),
    );

    assert_eq!(preprocessor.input_names(), vec!["c.mp4", "d.mp4"]);
}

#[test]
fn explicit_resume_point_overrides_checkpoint() {
    let root = library(&["a.mp4", "b.mp4", "c.mp4"]);
    CheckpointStore::for_root(root.path()).save(root.path().join("c.mp4"));

    let preprocessor = RecordingPreprocessor::default();
    let options = BatchOptions::new().with_resume_from(root.path().join("b.mp4"));
    completed(
        BatchSession::new(root.path(), options)
            .run(&preprocessor, &ScriptedTranscriber::default())
            .unwrap(),
    );

    assert_eq!(preprocessor.input_names(), vec!["b.mp4", "c.mp4"]);
}

#[test]
fn stale_checkpoint_restarts_from_beginning() {
    let root = library(&["a.mp4", "b.mp4"]);
    let store = CheckpointStore::for_root(root.path());
    store.save(root.path().join("removed.mp4"));

    let preprocessor = RecordingPreprocessor::default();
    let summary = completed(
        BatchSession::new(root.path(), BatchOptions::new())
            .run(&preprocessor, &ScriptedTranscriber::default())
            .unwrap(),
    );

    assert_eq!(preprocessor.input_names(), vec!["a.mp4", "b.mp4"]);
    assert_eq!(summary.processed, 2);
    assert!(!store.exists());
}

#[test]
fn corrupt_checkpoint_restarts_from_beginning() {
    let root = library(&["a.mp4", "b.mp4"]);
    let store = CheckpointStore::for_root(root.path());
    fs::write(store.path(), "{not json").unwrap();

    let preprocessor = RecordingPreprocessor::default();
    completed(
        BatchSession::new(root.path(), BatchOptions::new())
            .run(&preprocessor, &ScriptedTranscriber::default())
            .unwrap(),
    );

    assert_eq!(preprocessor.input_names(), vec!["a.mp4", "b.mp4"]);
    assert!(!store.exists());
}

#[test]
fn force_discards_checkpoint_and_overwrites() {
    let root = library(&["a.mp4", "b.mp4"]);
    fs::write(root.path().join("a.en.srt"), "old").unwrap();
    let store = CheckpointStore::for_root(root.path());
    store.save(root.path().join("b.mp4"));

    let preprocessor = RecordingPreprocessor::default();
    let options = BatchOptions::new().with_force(true);
    let summary = completed(
        BatchSession::new(root.path(), options)
            .run(&preprocessor, &ScriptedTranscriber::default())
            .unwrap(),
    );

    assert_eq!(preprocessor.input_names(), vec!["a.mp4", "b.mp4"]);
    assert_eq!(summary.processed, 2);
    assert_ne!(fs::read_to_string(root.path().join("a.en.srt")).unwrap(), "old");
    assert!(!store.exists());
}

// ── Skip-existing ──────────────────────────────────────────────────

#[test]
fn existing_captions_are_skipped_without_invoking_tools() {
    let root = library(&["a.mp4", "b.mp4"]);
    fs::write(root.path().join("a.en.srt"), "keep me").unwrap();

    let preprocessor = RecordingPreprocessor::default();
    let transcriber = ScriptedTranscriber::default();
    let summary = completed(
        BatchSession::new(root.path(), BatchOptions::new())
            .run(&preprocessor, &transcriber)
            .unwrap(),
    );

    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.errored, 0);
    assert_eq!(preprocessor.input_names(), vec!["b.mp4"]);
    assert_eq!(transcriber.stems(), vec!["b"]);
    assert_eq!(
        fs::read_to_string(root.path().join("a.en.srt")).unwrap(),
        "keep me"
    );
}

#[test]
fn disabling_skip_existing_regenerates() {
    let root = library(&["a.mp4"]);
    fs::write(root.path().join("a.en.srt"), "stale").unwrap();

    let summary = completed(
        BatchSession::new(root.path(), BatchOptions::new().with_skip_existing(false))
            .run(&RecordingPreprocessor::default(), &ScriptedTranscriber::default())
            .unwrap(),
    );

    assert_eq!(summary.processed, 1);
    assert_eq!(summary.skipped, 0);
}

#[test]
fn caption_language_follows_options() {
    let root = library(&["a.mp4"]);
    let session = BatchSession::new(root.path(), BatchOptions::new().with_language("fr"));
    fs::write(root.path().join("a.en.srt"), "english").unwrap();

    let summary = completed(
        session
            .run(&RecordingPreprocessor::default(), &ScriptedTranscriber::default())
            .unwrap(),
    );

    assert_eq!(summary.processed, 1);
    assert!(root.path().join("a.fr.srt").is_file());
}

// ── Failure classification ─────────────────────────────────────────

#[test]
fn missing_transcriber_output_is_a_failure() {
    let root = library(&["a.mp4", "b.mp4"]);
    let transcriber = ScriptedTranscriber {
        no_output_for: vec!["a"],
        ..ScriptedTranscriber::default()
    };

    let summary = completed(
        BatchSession::new(root.path(), BatchOptions::new())
            .run(&RecordingPreprocessor::default(), &transcriber)
            .unwrap(),
    );

    assert_eq!(summary.errored, 1);
    assert_eq!(summary.processed, 1);
    assert!(
        summary.failures[0].error.contains("Expected whisper-stub to generate"),
        "Unexpected error: {}",
        summary.failures[0].error
    );
}

#[test]
fn preprocess_failure_skips_transcription() {
    let root = library(&["a.mp4", "b.mp4"]);
    let preprocessor = RecordingPreprocessor::failing_on(&["a.mp4"]);
    let transcriber = ScriptedTranscriber::default();

    let summary = completed(
        BatchSession::new(root.path(), BatchOptions::new())
            .run(&preprocessor, &transcriber)
            .unwrap(),
    );

    assert_eq!(summary.errored, 1);
    assert_eq!(summary.processed, 1);
    assert_eq!(transcriber.stems(), vec!["b"]);
    assert!(summary.failures[0].error.contains("ffmpeg-stub"));
}

#[test]
fn missing_root_is_an_error() {
    let directory = tempfile::tempdir().unwrap();
    let result = BatchSession::new(directory.path().join("nope"), BatchOptions::new())
        .run(&RecordingPreprocessor::default(), &ScriptedTranscriber::default());

    assert!(matches!(result, Err(SubgenError::RootNotFound(_))));
}

#[test]
fn empty_library_completes_and_clears_checkpoint() {
    let root = library(&["notes.txt"]);
    let store = CheckpointStore::for_root(root.path());
    store.save(root.path().join("gone.mp4"));

    let summary = completed(
        BatchSession::new(root.path(), BatchOptions::new())
            .run(&RecordingPreprocessor::default(), &ScriptedTranscriber::default())
            .unwrap(),
    );

    assert_eq!(summary.total, 0);
    assert_eq!(summary.processed, 0);
    assert!(!store.exists());
}

// ── Collaborator parameters and resources ──────────────────────────

#[test]
fn transcription_parameters_are_forwarded() {
    let root = library(&["nested/clip.mkv"]);
    let model = root.path().join("ggml-tiny.bin");
    let options = BatchOptions::new()
        .with_language("de")
        .with_model_path(&model)
        .with_threads(6)
        .with_layout(CaptionLayout::new(37, 3));

    let transcriber = ScriptedTranscriber::default();
    completed(
        BatchSession::new(root.path(), options)
            .run(&RecordingPreprocessor::default(), &transcriber)
            .unwrap(),
    );

    let requests = transcriber.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].language, "de");
    assert_eq!(requests[0].model, model);
    assert_eq!(requests[0].threads, 6);
    assert_eq!(requests[0].max_line_width, 37);
    assert_eq!(requests[0].audio.file_name().unwrap(), "clip.wav");
    assert!(root.path().join("nested/clip.de.srt").is_file());
}

#[test]
fn working_directory_is_removed_after_run() {
    let root = library(&["a.mp4"]);
    let transcriber = ScriptedTranscriber::default();
    completed(
        BatchSession::new(root.path(), BatchOptions::new())
            .run(&RecordingPreprocessor::default(), &transcriber)
            .unwrap(),
    );

    let audio = transcriber.requests.lock().unwrap()[0].audio.clone();
    let workspace = audio.parent().unwrap();
    assert!(!workspace.starts_with(root.path()), "Intermediates stay out of the library");
    assert!(!workspace.exists());
}

#[test]
fn working_directory_is_removed_after_interruption() {
    let root = library(&["a.mp4", "b.mp4"]);
    let token = CancellationToken::new();
    let transcriber = ScriptedTranscriber {
        cancel_on: Some(("a", token.clone())),
        ..ScriptedTranscriber::default()
    };

    let outcome = BatchSession::new(root.path(), BatchOptions::new().with_cancellation(token))
        .run(&RecordingPreprocessor::default(), &transcriber)
        .unwrap();

    assert!(outcome.is_interrupted());
    let audio = transcriber.requests.lock().unwrap()[0].audio.clone();
    assert!(!audio.parent().unwrap().exists());
}

// ── Progress reporting ─────────────────────────────────────────────

#[derive(Default)]
struct RecordingProgress {
    infos: Mutex<Vec<ProgressInfo>>,
    reports: Mutex<Vec<ItemReport>>,
}

impl ProgressCallback for RecordingProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        self.infos.lock().unwrap().push(info.clone());
    }

    fn on_item_finished(&self, report: &ItemReport) {
        self.reports.lock().unwrap().push(report.clone());
    }
}

#[test]
fn progress_reports_every_item_in_order() {
    let root = library(&["a.mp4", "b.mp4", "c.mp4"]);
    fs::write(root.path().join("a.en.srt"), "done").unwrap();
    CheckpointStore::for_root(root.path()).save(root.path().join("a.mp4"));

    let recorder = Arc::new(RecordingProgress::default());
    let transcriber = ScriptedTranscriber {
        fail_on: vec!["c"],
        ..ScriptedTranscriber::default()
    };
    completed(
        BatchSession::new(
            root.path(),
            BatchOptions::new().with_progress(recorder.clone()),
        )
        .run(&RecordingPreprocessor::default(), &transcriber)
        .unwrap(),
    );

    let infos = recorder.infos.lock().unwrap();
    assert_eq!(infos.len(), 3);
    for (position, info) in infos.iter().enumerate() {
        assert_eq!(info.current, position as u64 + 1);
        assert_eq!(info.total, 3);
        assert_eq!(info.overall_total, 3);
    }

    let statuses: Vec<ItemStatus> = recorder
        .reports
        .lock()
        .unwrap()
        .iter()
        .map(|report| report.status)
        .collect();
    assert_eq!(
        statuses,
        vec![ItemStatus::Skipped, ItemStatus::Succeeded, ItemStatus::Failed]
    );
}
