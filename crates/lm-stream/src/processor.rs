//! Single-file streaming processor.
//!
//! A run validates the input, then pulls `highWaterMark`-sized chunks,
//! decodes them into lines, scrubs each line, encodes it and awaits the write
//! before taking the next one. Output goes to a temp file that is renamed
//! onto the final path only when the whole input has been consumed.
//!
//! Cancellation is observed before and after every line and at each
//! suspension point (pause wait, write, next read). Pause is checked before
//! every line.

use crate::cancel::CancellationToken;
use crate::encoding::{Charset, LineDecoder};
use crate::error::{Result, StreamError};
use crate::events::{event_names, NullEmitter, ProgressEmitter, ProgressEvent};
use crate::options::{ProcessingOptions, ProcessingResult};
use crate::pause::{PauseController, StreamBinding};
use crate::sweep::{sweep_stale_temp_files, STALE_TEMP_AGE};
use crate::validate::validate_input;
use crate::writer::AtomicWriter;
use lm_scrub::{LineScrubber, ScrubberConfig};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::{debug, info_span, Instrument};

/// Lines between two `file_progress` events.
pub const PROGRESS_INTERVAL_LINES: u64 = 1000;

/// Line terminator used when `preserve_line_endings` is set.
#[cfg(windows)]
pub const PLATFORM_EOL: &str = "\r\n";
#[cfg(not(windows))]
pub const PLATFORM_EOL: &str = "\n";

/// Shared signals and sinks a run is bound to.
#[derive(Clone)]
pub struct RunContext {
    pub cancel: CancellationToken,
    pub pause: Arc<PauseController>,
    pub emitter: Arc<dyn ProgressEmitter>,
    /// Position of the file in its batch; events are keyed by it.
    pub file_index: usize,
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new(CancellationToken::new(), Arc::new(PauseController::new()))
    }
}

impl RunContext {
    pub fn new(cancel: CancellationToken, pause: Arc<PauseController>) -> Self {
        Self {
            cancel,
            pause,
            emitter: Arc::new(NullEmitter),
            file_index: 0,
        }
    }

    pub fn with_emitter(mut self, emitter: Arc<dyn ProgressEmitter>) -> Self {
        self.emitter = emitter;
        self
    }

    pub fn with_file_index(mut self, index: usize) -> Self {
        self.file_index = index;
        self
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(StreamError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// I/O failures after a cancel request are teardown noise, not failures.
    fn settle(&self, err: StreamError) -> StreamError {
        if self.cancel.is_cancelled() && !err.is_validation() {
            StreamError::Cancelled
        } else {
            err
        }
    }

    fn emit(&self, event: ProgressEvent) {
        self.emitter.emit(event.with_file_index(self.file_index));
    }
}

/// Final path for `input`: `<dir>/<basename><suffix>`, where `dir` is the
/// given output dir or the input's own directory.
pub fn output_path_for(input: &Path, output_dir: Option<&Path>, suffix: &str) -> Result<PathBuf> {
    let name = input
        .file_name()
        .ok_or_else(|| StreamError::InvalidPath(input.to_path_buf()))?;
    let dir = match output_dir {
        Some(dir) => dir.to_path_buf(),
        None => match input.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        },
    };
    Ok(dir.join(format!("{}{}", name.to_string_lossy(), suffix)))
}

/// Drives one file from validation to atomic publish.
#[derive(Debug, Clone)]
pub struct StreamProcessor {
    options: Arc<ProcessingOptions>,
    scrubber: Arc<ScrubberConfig>,
}

impl StreamProcessor {
    /// Build a processor, normalizing the scrubber options once.
    pub fn new(options: ProcessingOptions) -> Self {
        let scrubber = Arc::new(ScrubberConfig::from_options(&options.scrubber_options));
        Self::with_scrubber(Arc::new(options), scrubber)
    }

    /// Build a processor around an already-normalized scrubber config.
    pub fn with_scrubber(options: Arc<ProcessingOptions>, scrubber: Arc<ScrubberConfig>) -> Self {
        Self { options, scrubber }
    }

    pub fn options(&self) -> &ProcessingOptions {
        &self.options
    }

    /// Process `input`. Never fails outward: every outcome is a result.
    ///
    /// `output_dir` overrides the options' output directory.
    pub async fn run(
        &self,
        input: &Path,
        output_dir: Option<&Path>,
        ctx: &RunContext,
    ) -> ProcessingResult {
        let span = info_span!("file", index = ctx.file_index, path = %input.display());
        self.run_inner(input, output_dir, ctx).instrument(span).await
    }

    async fn run_inner(
        &self,
        input: &Path,
        output_dir: Option<&Path>,
        ctx: &RunContext,
    ) -> ProcessingResult {
        let started = Instant::now();
        ctx.emit(
            ProgressEvent::new(event_names::FILE_STARTED).with_detail("inputPath", input),
        );
        debug!("run started");

        let dir = output_dir.or(self.options.output_dir.as_deref());
        let output_path = output_path_for(input, dir, &self.options.output_suffix);

        let mut scrubber = LineScrubber::new(Arc::clone(&self.scrubber));
        let outcome = match &output_path {
            Ok(path) => self.execute(input, path, ctx, &mut scrubber).await,
            Err(_) => Err(StreamError::InvalidPath(input.to_path_buf())),
        };

        let elapsed = started.elapsed();
        let stats = scrubber.into_stats();
        let output_path = output_path.ok();

        let result = match (outcome, output_path) {
            (Ok(()), Some(path)) => ProcessingResult::succeeded(input, path, stats, elapsed),
            (Err(StreamError::Cancelled), path) => {
                ProcessingResult::cancelled(input, path, Some(stats), elapsed)
            }
            (Err(err), path) => {
                ProcessingResult::failed(input, path, err.to_string(), Some(stats), elapsed)
            }
            (Ok(()), None) => ProcessingResult::failed(
                input,
                None,
                StreamError::InvalidPath(input.to_path_buf()).to_string(),
                Some(stats),
                elapsed,
            ),
        };

        let name = if result.success {
            event_names::FILE_COMPLETED
        } else if result.cancelled {
            event_names::FILE_CANCELLED
        } else {
            event_names::FILE_FAILED
        };
        let mut event = ProgressEvent::new(name)
            .with_elapsed_ms(result.processing_time)
            .with_detail("inputPath", &result.input_path);
        if let Some(path) = &result.output_path {
            if result.success {
                event = event.with_detail("outputPath", path);
            }
        }
        if let Some(stats) = &result.stats {
            event = event.with_detail("stats", stats);
        }
        if let Some(error) = &result.error {
            event = event.with_detail("error", error);
        }
        ctx.emit(event);

        debug!(
            success = result.success,
            cancelled = result.cancelled,
            elapsed_ms = result.processing_time,
            "run finished"
        );
        result
    }

    async fn execute(
        &self,
        input: &Path,
        output_path: &Path,
        ctx: &RunContext,
        scrubber: &mut LineScrubber,
    ) -> Result<()> {
        ctx.check_cancelled()?;

        let charset = Charset::resolve(&self.options.encoding)?;
        let total_bytes = validate_input(input, &self.options).await?;

        let out_dir = match output_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        tokio::fs::create_dir_all(&out_dir).await?;
        let swept = sweep_stale_temp_files(&out_dir, STALE_TEMP_AGE).await;
        if !swept.removed.is_empty() {
            debug!(removed = swept.removed.len(), "swept stale temp outputs");
        }

        ctx.check_cancelled()?;

        let mut reader = File::open(input).await?;
        let mut writer =
            AtomicWriter::create(output_path, self.options.effective_high_water_mark()).await?;
        let binding = ctx.pause.attach();

        let pumped = self
            .pump(&mut reader, &mut writer, charset, total_bytes, ctx, &binding, scrubber)
            .await
            .and_then(|()| ctx.check_cancelled());
        drop(binding);

        let finished = match pumped {
            Ok(()) => writer.commit().await.map(|_| ()),
            Err(err) => {
                writer.abort().await;
                Err(err)
            }
        };
        finished.map_err(|err| ctx.settle(err))
    }

    #[allow(clippy::too_many_arguments)]
    async fn pump(
        &self,
        reader: &mut File,
        writer: &mut AtomicWriter,
        charset: Charset,
        total_bytes: u64,
        ctx: &RunContext,
        binding: &StreamBinding,
        scrubber: &mut LineScrubber,
    ) -> Result<()> {
        let eol = if self.options.preserve_line_endings {
            PLATFORM_EOL
        } else {
            "\n"
        };

        let mut decoder = LineDecoder::new(charset);
        let mut chunk = vec![0u8; self.options.effective_high_water_mark()];
        let mut lines: VecDeque<String> = VecDeque::new();
        let mut encoded = Vec::new();
        let mut bytes_read = 0u64;
        let mut eof = false;

        loop {
            while let Some(line) = lines.pop_front() {
                ctx.check_cancelled()?;
                if binding.is_paused() {
                    writer.flush().await?;
                    binding.wait_if_paused(&ctx.cancel).await?;
                }
                ctx.check_cancelled()?;

                let result = scrubber.process_line(&line);
                encoded.clear();
                charset.encode_into(&result.masked, &mut encoded);
                charset.encode_into(eol, &mut encoded);

                tokio::select! {
                    written = writer.write_all(&encoded) => written?,
                    _ = ctx.cancel.cancelled() => return Err(StreamError::Cancelled),
                }

                let done = scrubber.stats().total_lines;
                if done % PROGRESS_INTERVAL_LINES == 0 {
                    ctx.emit(
                        ProgressEvent::new(event_names::FILE_PROGRESS)
                            .with_progress(bytes_read, Some(total_bytes))
                            .with_detail("lines", done),
                    );
                }
            }

            if eof {
                return Ok(());
            }

            ctx.check_cancelled()?;
            let n = tokio::select! {
                read = reader.read(&mut chunk) => read?,
                _ = ctx.cancel.cancelled() => return Err(StreamError::Cancelled),
            };
            if n == 0 {
                decoder.finish(&mut lines);
                eof = true;
            } else {
                bytes_read += n as u64;
                decoder.push(&chunk[..n], &mut lines);
            }
        }
    }
}

/// Convenience: run one file with default signals.
pub async fn process_file(
    input: &Path,
    options: ProcessingOptions,
) -> ProcessingResult {
    let processor = StreamProcessor::new(options);
    processor.run(input, None, &RunContext::default()).await
}
