use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use subgen::{
    BatchOptions, BatchSession, CancellationToken, CaptionLayout, CheckpointStore,
    FfmpegPreprocessor, ItemReport, ItemStatus, ProgressCallback, ProgressInfo, SessionOutcome,
    SubgenError, WhisperCli,
    configuration::{DEFAULT_LANGUAGE, DEFAULT_MAX_LINE_WIDTH, DEFAULT_MAX_LINES, DEFAULT_MODEL_PATH},
    toolchain, validation,
};

const CLI_AFTER_HELP: &str = "Examples:\n  subgen generate ~/Videos --language en --threads 8\n  subgen generate ~/Videos --no-skip-existing --progress\n  subgen reflow movie.en.srt --max-line-length 37\n  subgen state show ~/Videos\n  subgen validate ~/Videos\n  subgen completions zsh > _subgen";

const MODEL_DOWNLOAD_HINT: &str = "Please ensure the model file exists. You might need to download it, e.g.:\n  mkdir -p ~/whisper-models && curl -L -o ~/whisper-models/ggml-medium.bin https://huggingface.co/ggerganov/whisper.cpp/resolve/main/ggml-medium.bin";

#[derive(Debug, Parser)]
#[command(
    name = "subgen",
    version,
    about = "Generate subtitles for media libraries using whisper.cpp",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Args, Clone, Default)]
struct GlobalOptions {
    /// Show additional logging output.
    #[arg(long, global = true)]
    verbose: bool,

    /// Show a progress bar instead of per-file status lines.
    #[arg(long, global = true)]
    progress: bool,
}

#[derive(Debug, Clone, Args)]
struct TranscribeArgs {
    /// Language code for Whisper.
    #[arg(short, long, default_value = DEFAULT_LANGUAGE)]
    language: String,

    /// Path to the GGML model file.
    #[arg(long, default_value = DEFAULT_MODEL_PATH)]
    model_path: PathBuf,

    /// Path or name of the Whisper CLI executable.
    #[arg(long, default_value = "whisper-cli")]
    cli_executable: String,

    /// Path or name of the ffmpeg executable.
    #[arg(long, default_value = "ffmpeg")]
    ffmpeg_executable: String,

    /// Number of threads for whisper.cpp (0 lets whisper.cpp decide).
    #[arg(long, default_value_t = 0)]
    threads: usize,

    #[command(flatten)]
    layout: LayoutArgs,
}

impl TranscribeArgs {
    fn batch_options(&self) -> BatchOptions {
        BatchOptions::new()
            .with_language(self.language.clone())
            .with_model_path(self.model_path.clone())
            .with_threads(self.threads)
            .with_layout(self.layout.layout())
    }
}

#[derive(Debug, Clone, Args)]
struct LayoutArgs {
    /// Maximum characters per subtitle line (0 disables wrapping).
    #[arg(long, default_value_t = DEFAULT_MAX_LINE_WIDTH)]
    max_line_length: usize,

    /// Maximum lines per subtitle caption (0 disables the limit).
    #[arg(long, default_value_t = DEFAULT_MAX_LINES)]
    max_lines: usize,
}

impl LayoutArgs {
    fn layout(&self) -> CaptionLayout {
        CaptionLayout::new(self.max_line_length, self.max_lines)
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Generate subtitles for every media file under a directory.
    #[command(
        about = "Generate subtitles for a media library",
        visible_alias = "run",
        after_help = "Examples:\n  subgen generate ~/Videos\n  subgen generate ~/Videos --language de --model-path ~/whisper-models/ggml-large-v3.bin\n  subgen generate ~/Videos --force --json"
    )]
    Generate {
        /// Root directory to search for media files.
        root: PathBuf,

        #[command(flatten)]
        transcribe: TranscribeArgs,

        /// Skip files that already have subtitles (default).
        #[arg(long, overrides_with = "no_skip_existing")]
        skip_existing: bool,

        /// Regenerate subtitles even when they already exist.
        #[arg(long, overrides_with = "skip_existing")]
        no_skip_existing: bool,

        /// Overwrite all existing subtitle files and ignore resume state.
        #[arg(long)]
        force: bool,

        /// Start from this media file instead of the stored resume state.
        #[arg(long)]
        resume_from: Option<PathBuf>,

        /// Print the final summary as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Reflow an existing SubRip file.
    #[command(
        about = "Rewrap an existing .srt file",
        after_help = "Examples:\n  subgen reflow movie.en.srt\n  subgen reflow movie.en.srt --out movie.short.srt --max-line-length 32 --max-lines 1"
    )]
    Reflow {
        /// Input .srt file.
        input: PathBuf,

        /// Output path. Defaults to rewriting the input in place.
        #[arg(long)]
        out: Option<PathBuf>,

        #[command(flatten)]
        layout: LayoutArgs,
    },

    /// Inspect or discard the resume state of a directory.
    #[command(about = "Show or clear resume state")]
    State {
        #[command(subcommand)]
        action: StateAction,
    },

    /// Check model, executables, and directory before a run.
    #[command(
        about = "Validate the transcription setup",
        after_help = "Examples:\n  subgen validate ~/Videos\n  subgen validate ~/Videos --cli-executable ~/whisper.cpp/build/bin/whisper-cli"
    )]
    Validate {
        /// Root directory that would be processed.
        root: PathBuf,

        #[command(flatten)]
        transcribe: TranscribeArgs,
    },

    /// Generate shell completion scripts.
    #[command(about = "Generate shell completions")]
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Subcommand)]
enum StateAction {
    /// Print the file the next run will start from.
    Show {
        /// Root directory holding the resume state.
        root: PathBuf,
    },
    /// Delete the resume state.
    Clear {
        /// Root directory holding the resume state.
        root: PathBuf,
    },
}

fn init_logging(global: &GlobalOptions) {
    let default_filter = if global.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();
}

fn ensure_directory(root: &Path) -> Result<(), SubgenError> {
    if !root.exists() {
        return Err(SubgenError::RootNotFound(root.to_path_buf()));
    }
    if !root.is_dir() {
        return Err(SubgenError::NotADirectory(root.to_path_buf()));
    }
    Ok(())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Console reporter: a progress bar with `--progress`, status lines otherwise.
struct TerminalProgress {
    bar: Option<ProgressBar>,
}

impl TerminalProgress {
    fn new(show_bar: bool) -> Result<Self, Box<dyn std::error::Error>> {
        let bar = if show_bar {
            let bar = ProgressBar::new(0);
            let style = ProgressStyle::with_template(
                "{spinner:.green} {bar:40.cyan/blue} {pos}/{len} [{elapsed_precise}] {msg}",
            )?;
            bar.set_style(style.progress_chars("##-"));
            Some(bar)
        } else {
            None
        };
        Ok(Self { bar })
    }

    fn println(&self, line: String) {
        match &self.bar {
            Some(bar) => bar.println(line),
            None => println!("{line}"),
        }
    }

    fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}

impl ProgressCallback for TerminalProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        match &self.bar {
            Some(bar) => {
                bar.set_length(info.total);
                bar.set_message(display_name(&info.path));
            }
            None => eprintln!(
                "{} (Overall: {}/{}) Processing: {}...",
                format!("[{}/{}]", info.current, info.total).cyan().bold(),
                info.overall_current,
                info.overall_total,
                display_name(&info.path),
            ),
        }
    }

    fn on_item_finished(&self, report: &ItemReport) {
        let line = match report.status {
            ItemStatus::Succeeded => format!(
                "{} {}",
                "✓ Successfully generated:".green().bold(),
                report.caption_path.display()
            ),
            ItemStatus::Skipped => format!(
                "{} {}",
                "Skipped (already exists):".yellow(),
                report.caption_path.display()
            ),
            _ => format!(
                "{} {}: {}",
                "✗ Failed".red().bold(),
                report.path.display(),
                report.error.as_deref().unwrap_or("unknown error")
            ),
        };
        self.println(line);

        if let Some(bar) = &self.bar {
            bar.inc(1);
        }
    }
}

fn print_summary(outcome: &SessionOutcome, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let summary = outcome.summary();

    if json {
        let (status, resume_from) = match outcome {
            SessionOutcome::Completed(_) => ("completed", None),
            SessionOutcome::Interrupted { resume_from, .. } => {
                ("interrupted", Some(resume_from.display().to_string()))
            }
        };
        let payload = json!({
            "status": status,
            "total": summary.total,
            "session_total": summary.session_total,
            "processed": summary.processed,
            "skipped": summary.skipped,
            "errored": summary.errored,
            "failures": summary.failures.iter().map(|failure| json!({
                "path": failure.path.display().to_string(),
                "error": failure.error,
            })).collect::<Vec<_>>(),
            "resume_from": resume_from,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    if let SessionOutcome::Interrupted {
        resume_from,
        checkpoint_saved,
        ..
    } = outcome
    {
        eprintln!("\n{}", "Pausing...".yellow().bold());
        if *checkpoint_saved {
            eprintln!(
                "Resume state saved. Next file to process: {}",
                resume_from.display()
            );
            eprintln!("Run the command again on the same directory to resume.");
        } else {
            eprintln!(
                "{} {}",
                "warning:".yellow().bold(),
                "resume state could not be saved".yellow()
            );
        }
    }

    println!("\n{}", summary_heading(outcome));
    println!("Successfully processed: {} files", summary.processed);
    if summary.skipped > 0 {
        println!("Skipped (already exist): {} files", summary.skipped);
    }
    let errors = format!("Errors encountered: {} files", summary.errored);
    if summary.is_clean() {
        println!("{errors}");
    } else {
        println!("{}", errors.red());
    }
    Ok(())
}

fn summary_heading(outcome: &SessionOutcome) -> &'static str {
    if outcome.is_interrupted() {
        "Processing paused:"
    } else {
        "Processing complete:"
    }
}

#[allow(clippy::too_many_arguments)]
fn generate(
    global: &GlobalOptions,
    root: PathBuf,
    transcribe: TranscribeArgs,
    no_skip_existing: bool,
    force: bool,
    resume_from: Option<PathBuf>,
    json: bool,
) -> Result<i32, Box<dyn std::error::Error>> {
    ensure_directory(&root)?;

    let mut options = transcribe
        .batch_options()
        .with_skip_existing(!no_skip_existing)
        .with_force(force);
    if let Some(path) = resume_from {
        options = options.with_resume_from(path);
    }
    options.check()?;

    if let Err(error) = validation::check_model(&options) {
        return Err(format!("{error}\n{MODEL_DOWNLOAD_HINT}").into());
    }
    toolchain::locate(&transcribe.cli_executable)?;
    toolchain::locate(&transcribe.ffmpeg_executable)?;

    let token = CancellationToken::new();
    subgen::cancel_on_interrupt(token.clone())?;
    let progress = Arc::new(TerminalProgress::new(global.progress)?);
    let options = options
        .with_cancellation(token.clone())
        .with_progress(progress.clone());

    let threads = match options.threads() {
        0 => "auto".to_string(),
        count => count.to_string(),
    };
    if !json {
        println!("Starting subtitle generation for directory: {}", root.display());
        println!("Model: {}", options.resolved_model_path().display());
        println!("Executable: {}", transcribe.cli_executable);
        println!("Language: {}", options.language());
        println!("Threads: {threads}");
        println!("Max Line Length: {}", options.layout().max_line_width);
        println!("Max Lines: {}", options.layout().max_lines);
        println!("Force: {force}");
    }

    let session = BatchSession::new(&root, options);
    if force {
        eprintln!(
            "{} {}",
            "warning:".yellow().bold(),
            "force enabled: clearing resume state and overwriting all subtitles".yellow()
        );
    } else if session.checkpoint().exists() && !json {
        println!(
            "Attempting to resume from state file: {}",
            session.checkpoint().path().display()
        );
    }

    let outcome = session.run(
        &FfmpegPreprocessor::new(transcribe.ffmpeg_executable.clone())
            .with_cancellation(token.clone()),
        &WhisperCli::new(transcribe.cli_executable.clone()).with_cancellation(token),
    )?;
    progress.finish();

    print_summary(&outcome, json)?;
    Ok(outcome.exit_code())
}

fn run() -> Result<i32, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(&cli.global);

    match cli.command {
        Commands::Generate {
            root,
            transcribe,
            skip_existing: _,
            no_skip_existing,
            force,
            resume_from,
            json,
        } => {
            return generate(
                &cli.global,
                root,
                transcribe,
                no_skip_existing,
                force,
                resume_from,
                json,
            );
        }
        Commands::Reflow { input, out, layout } => {
            let destination = out.unwrap_or_else(|| input.clone());
            subgen::reflow_file_to(&input, &destination, &layout.layout())?;
            println!("{} {}", "saved".green().bold(), destination.display());
        }
        Commands::State { action } => match action {
            StateAction::Show { root } => {
                ensure_directory(&root)?;
                let store = CheckpointStore::for_root(&root);
                match store.load() {
                    Some(next) => println!("Next file to process: {}", next.display()),
                    None => println!("No resume state in {}", root.display()),
                }
            }
            StateAction::Clear { root } => {
                ensure_directory(&root)?;
                if CheckpointStore::for_root(&root).clear() {
                    println!("{} resume state", "cleared".green().bold());
                } else {
                    println!("No resume state in {}", root.display());
                }
            }
        },
        Commands::Validate { root, transcribe } => {
            let report = validation::validate_setup(
                &root,
                &transcribe.batch_options(),
                &transcribe.cli_executable,
                &transcribe.ffmpeg_executable,
            );
            print!("{report}");
            if !report.is_valid() {
                return Ok(1);
            }
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "subgen", &mut std::io::stdout());
        }
    }

    Ok(0)
}

fn main() {
    match run() {
        Ok(0) => {}
        Ok(code) => std::process::exit(code),
        Err(error) => {
            eprintln!("error: {error}");
            std::process::exit(1);
        }
    }
}
