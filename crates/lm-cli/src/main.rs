//! logmask - streaming log masking
//!
//! Commands:
//! - `mask`: mask log files in a bounded-concurrency batch
//! - `scrub`: mask stdin line by line
//! - `patterns`: list the effective rule catalog
//! - `config`: show, initialize, or locate the settings file

use clap::{Args, Parser, Subcommand, ValueEnum};
use lm_cli::logging::{init_logging, set_log_scrubber, LogConfig, LogFormat, LogLevel};
use lm_cli::{CliError, CliResult, ExitCode};
use lm_config::{
    default_settings_path, load_settings, resolve_config, save_settings, settings_document,
    validate_options, LoadedSettings,
};
use lm_scrub::{LineScrubber, PatternCatalog, ScrubberConfig, ScrubberOptions};
use lm_stream::{
    BatchCoordinator, BatchOutcome, JobSignals, JsonlWriter, NullEmitter, ProcessingOptions,
    ProgressEmitter,
};
use serde_json::json;
use std::io::{self, BufRead, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Mask secrets and personal data in log files
#[derive(Parser)]
#[command(name = "logmask")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Settings file (takes precedence over LOGMASK_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level for stderr diagnostics
    #[arg(long, global = true, value_enum)]
    log_level: Option<LogLevel>,

    /// Log format for stderr diagnostics
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormat>,
}

#[derive(Subcommand)]
enum Commands {
    /// Mask one or more log files
    Mask(MaskArgs),
    /// Mask stdin to stdout, line by line
    Scrub(ScrubArgs),
    /// List sensitive keys and masking rules
    Patterns(PatternsArgs),
    /// Inspect or create the settings file
    Config(ConfigArgs),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    #[default]
    Human,
    Json,
}

/// Flags shared by the commands that build a scrubber.
#[derive(Args, Debug)]
struct MaskingFlags {
    /// Replacement text for masked values
    #[arg(long)]
    mask: Option<String>,

    /// Leave URL query parameters untouched
    #[arg(long)]
    no_url_params: bool,
}

impl MaskingFlags {
    fn apply(&self, options: &mut ScrubberOptions) {
        if let Some(mask) = &self.mask {
            options.default_mask = mask.clone();
        }
        if self.no_url_params {
            options.mask_url_params = false;
        }
    }
}

#[derive(Args, Debug)]
struct MaskArgs {
    /// Files to mask
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Write outputs here instead of next to each input
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Suffix appended to each output file name
    #[arg(long)]
    suffix: Option<String>,

    /// Input encoding (utf-8, gbk, utf-16le, latin1, ...)
    #[arg(long)]
    encoding: Option<String>,

    /// Maximum files processed at once
    #[arg(long)]
    concurrency: Option<usize>,

    /// Process files that look binary
    #[arg(long)]
    include_binary: bool,

    /// Reject inputs larger than this many bytes
    #[arg(long)]
    max_file_size: Option<u64>,

    /// Write LF line endings instead of the platform default
    #[arg(long)]
    lf: bool,

    /// Read buffer size in bytes
    #[arg(long)]
    high_water_mark: Option<usize>,

    #[command(flatten)]
    masking: MaskingFlags,

    /// Stream progress events as JSONL on stderr
    #[arg(long)]
    events: bool,

    /// Result format on stdout
    #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
    format: OutputFormat,
}

impl MaskArgs {
    fn apply(&self, options: &mut ProcessingOptions) {
        if let Some(dir) = &self.output_dir {
            options.output_dir = Some(dir.clone());
        }
        if let Some(suffix) = &self.suffix {
            options.output_suffix = suffix.clone();
        }
        if let Some(encoding) = &self.encoding {
            options.encoding = encoding.clone();
        }
        if let Some(concurrency) = self.concurrency {
            options.concurrency = concurrency;
        }
        if self.include_binary {
            options.skip_binary_files = false;
        }
        if let Some(bytes) = self.max_file_size {
            options.max_file_size = bytes;
        }
        if self.lf {
            options.preserve_line_endings = false;
        }
        if let Some(bytes) = self.high_water_mark {
            options.high_water_mark = bytes;
        }
        self.masking.apply(&mut options.scrubber_options);
    }
}

#[derive(Args, Debug)]
struct ScrubArgs {
    #[command(flatten)]
    masking: MaskingFlags,
}

#[derive(Args, Debug)]
struct PatternsArgs {
    #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
    format: OutputFormat,
}

#[derive(Args, Debug)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Print the effective settings as JSON
    Show,
    /// Write a settings file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,

        /// Target file (defaults to --config, then the standard location)
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Print where settings are loaded from
    Path,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            let code = if err.use_stderr() {
                ExitCode::ArgsError
            } else {
                ExitCode::Clean
            };
            std::process::exit(code.as_i32());
        }
    };

    let log_config = LogConfig::from_env(cli.global.log_level, cli.global.log_format);
    init_logging(&log_config);

    let result = match &cli.command {
        Commands::Mask(args) => run_mask(&cli.global, args),
        Commands::Scrub(args) => run_scrub(&cli.global, args),
        Commands::Patterns(args) => run_patterns(&cli.global, args),
        Commands::Config(args) => run_config(&cli.global, args),
    };

    let code = match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("logmask: {}", err);
            err.exit_code()
        }
    };
    std::process::exit(code.as_i32());
}

fn load(global: &GlobalOpts) -> CliResult<LoadedSettings> {
    let paths = resolve_config(global.config.as_deref());
    let loaded = load_settings(&paths)?;
    debug!(source = %loaded.source, "settings loaded");
    Ok(loaded)
}

fn run_mask(global: &GlobalOpts, args: &MaskArgs) -> CliResult<ExitCode> {
    let mut options = load(global)?.options;
    args.apply(&mut options);
    for warning in validate_options(&options)? {
        warn!("{}", warning);
    }
    set_log_scrubber(Arc::new(ScrubberConfig::from_options(
        &options.scrubber_options,
    )));

    let inputs = args
        .paths
        .iter()
        .map(std::path::absolute)
        .collect::<io::Result<Vec<_>>>()
        .map_err(|e| CliError::io("resolving input paths", e))?;
    let output_dir = options
        .output_dir
        .as_deref()
        .map(std::path::absolute)
        .transpose()
        .map_err(|e| CliError::io("resolving output directory", e))?;

    let emitter: Arc<dyn ProgressEmitter> = if args.events {
        Arc::new(JsonlWriter::new(io::stderr()))
    } else {
        Arc::new(NullEmitter)
    };
    let coordinator = Arc::new(BatchCoordinator::with_emitter(emitter));
    let signals = JobSignals::default();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::io("starting runtime", e))?;

    let outcome = runtime.block_on(async {
        let watcher = tokio::spawn(watch_signals(Arc::clone(&coordinator), signals.clone()));
        let outcome = coordinator
            .run_with_signals(inputs, output_dir, options, signals)
            .await;
        watcher.abort();
        outcome
    })?;

    print_outcome(&outcome, args.format)?;
    Ok(ExitCode::for_summary(&outcome.summary))
}

fn print_outcome(outcome: &BatchOutcome, format: OutputFormat) -> CliResult<()> {
    let text = match format {
        OutputFormat::Human => outcome.summary.render(),
        OutputFormat::Json => serde_json::to_string_pretty(outcome)? + "\n",
    };
    write_stdout(text.as_bytes())
}

/// Ctrl-C cancels the job. On Unix, SIGUSR1 pauses and SIGUSR2 resumes.
/// Signals that arrive before the job registers go straight to its signals.
async fn watch_signals(coordinator: Arc<BatchCoordinator>, signals: JobSignals) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match (
            signal(SignalKind::user_defined1()),
            signal(SignalKind::user_defined2()),
        ) {
            (Ok(mut pause), Ok(mut resume)) => loop {
                tokio::select! {
                    res = tokio::signal::ctrl_c() => {
                        if res.is_err() {
                            warn!("ctrl-c handler unavailable");
                            return;
                        }
                        request_cancel(&coordinator, &signals);
                    }
                    Some(()) = pause.recv() => {
                        if !coordinator.pause() {
                            signals.pause.pause();
                        }
                    }
                    Some(()) = resume.recv() => {
                        if !coordinator.resume() {
                            signals.pause.resume();
                        }
                    }
                }
            },
            _ => warn!("pause/resume signals unavailable"),
        }
    }

    while tokio::signal::ctrl_c().await.is_ok() {
        request_cancel(&coordinator, &signals);
    }
}

fn request_cancel(coordinator: &BatchCoordinator, signals: &JobSignals) {
    if !coordinator.cancel() {
        signals.cancel.cancel();
    }
    info!("cancellation requested; waiting for in-flight files");
}

fn run_scrub(global: &GlobalOpts, args: &ScrubArgs) -> CliResult<ExitCode> {
    let mut scrubber_options = load(global)?.options.scrubber_options;
    args.masking.apply(&mut scrubber_options);
    let config = Arc::new(ScrubberConfig::from_options(&scrubber_options));
    set_log_scrubber(Arc::clone(&config));
    let mut scrubber = LineScrubber::new(config);

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .map_err(|e| CliError::io("reading stdin", e))?;
        if read == 0 {
            break;
        }
        let (content, eol) = split_eol(&buf);
        let result = scrubber.process_line(&String::from_utf8_lossy(content));
        let written = out
            .write_all(result.masked.as_bytes())
            .and_then(|()| out.write_all(eol));
        if let Err(err) = written {
            return stdout_error(err);
        }
    }
    if let Err(err) = out.flush() {
        return stdout_error(err);
    }

    let stats = scrubber.stats();
    debug!(
        lines = stats.total_lines,
        masked = stats.masked_lines,
        "stdin scrubbed"
    );
    Ok(ExitCode::Clean)
}

fn split_eol(line: &[u8]) -> (&[u8], &[u8]) {
    if let Some(content) = line.strip_suffix(b"\r\n") {
        (content, b"\r\n")
    } else if let Some(content) = line.strip_suffix(b"\n") {
        (content, b"\n")
    } else {
        (line, b"")
    }
}

/// A closed pipe on stdout (e.g. `| head`) ends the command cleanly.
fn stdout_error(err: io::Error) -> CliResult<ExitCode> {
    if err.kind() == io::ErrorKind::BrokenPipe {
        Ok(ExitCode::Clean)
    } else {
        Err(CliError::io("writing stdout", err))
    }
}

fn write_stdout(bytes: &[u8]) -> CliResult<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match out.write_all(bytes).and_then(|()| out.flush()) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        Err(err) => Err(CliError::io("writing stdout", err)),
    }
}

fn run_patterns(global: &GlobalOpts, args: &PatternsArgs) -> CliResult<ExitCode> {
    let scrubber_options = load(global)?.options.scrubber_options;
    let mask = if scrubber_options.default_mask.is_empty() {
        lm_scrub::DEFAULT_MASK.to_string()
    } else {
        scrubber_options.default_mask.clone()
    };
    let mut diagnostics = Vec::new();
    let catalog = PatternCatalog::from_options(&scrubber_options, &mask, &mut diagnostics);
    for diagnostic in &diagnostics {
        warn!(field = %diagnostic.field, "{}", diagnostic.message);
    }

    let patterns = catalog.describe();
    let mut keys: Vec<&str> = catalog.keys().iter().collect();
    keys.sort_unstable();

    let text = match args.format {
        OutputFormat::Json => {
            let doc = json!({
                "defaultMask": mask,
                "sensitiveKeys": keys,
                "patterns": patterns,
            });
            serde_json::to_string_pretty(&doc)? + "\n"
        }
        OutputFormat::Human => {
            let mut out = String::new();
            out.push_str(&format!(
                "{:<24} {:<10} {:<9} {:<8} DESCRIPTION\n",
                "NAME", "CATEGORY", "REPLACE", "ENABLED"
            ));
            for info in &patterns {
                out.push_str(&format!(
                    "{:<24} {:<10} {:<9} {:<8} {}\n",
                    info.name,
                    info.category.as_str(),
                    info.replacement,
                    if info.enabled { "yes" } else { "no" },
                    info.description
                ));
            }
            out.push_str(&format!("\nSensitive keys ({}): {}\n", keys.len(), keys.join(", ")));
            out
        }
    };
    write_stdout(text.as_bytes())?;
    Ok(ExitCode::Clean)
}

fn run_config(global: &GlobalOpts, args: &ConfigArgs) -> CliResult<ExitCode> {
    match &args.command {
        ConfigCommands::Show => {
            let loaded = load(global)?;
            match &loaded.path {
                Some(path) => eprintln!("# source: {} ({})", loaded.source, path.display()),
                None => eprintln!("# source: {}", loaded.source),
            }
            for diagnostic in &loaded.diagnostics {
                eprintln!("# ignored {}", diagnostic);
            }
            let doc = settings_document(&loaded.options)?;
            write_stdout((serde_json::to_string_pretty(&doc)? + "\n").as_bytes())?;
            Ok(ExitCode::Clean)
        }
        ConfigCommands::Init { force, path } => {
            let target = path
                .clone()
                .or_else(|| global.config.clone())
                .or_else(default_settings_path)
                .ok_or_else(|| {
                    CliError::Usage(
                        "no settings location available; pass --path or --config".to_string(),
                    )
                })?;
            if target.exists() && !force {
                return Err(CliError::Usage(format!(
                    "settings file already exists at {}; pass --force to overwrite",
                    target.display()
                )));
            }
            save_settings(&target, &ProcessingOptions::default())?;
            info!(path = %target.display(), "settings file written");
            write_stdout(format!("{}\n", target.display()).as_bytes())?;
            Ok(ExitCode::Clean)
        }
        ConfigCommands::Path => {
            let paths = resolve_config(global.config.as_deref());
            let text = match &paths.settings {
                Some(path) => format!("{}\n", path.display()),
                None => "none\n".to_string(),
            };
            eprintln!("# source: {}", paths.source);
            write_stdout(text.as_bytes())?;
            Ok(ExitCode::Clean)
        }
    }
}
