//! Streaming file pipeline for logmask.
//!
//! Turns log files into masked copies without holding them in memory:
//!
//! - [`StreamProcessor`] validates one input, decodes it chunk by chunk,
//!   scrubs each line with [`lm_scrub::LineScrubber`], and publishes the
//!   output atomically through a temp file.
//! - [`BatchCoordinator`] runs many files under a concurrency bound and
//!   returns results in input order with a [`BatchSummary`].
//! - [`PauseController`] and [`CancellationToken`] are the shared job
//!   signals; [`ProgressEmitter`] receives lifecycle events.
//!
//! ```no_run
//! use lm_stream::{BatchCoordinator, ProcessingOptions};
//! use std::path::PathBuf;
//!
//! # async fn demo() -> Result<(), lm_stream::BatchError> {
//! let coordinator = BatchCoordinator::new();
//! let outcome = coordinator
//!     .run_all(vec![PathBuf::from("/var/log/app.log")], None, ProcessingOptions::default())
//!     .await?;
//! println!("{}", outcome.summary.render());
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod cancel;
pub mod encoding;
pub mod error;
pub mod events;
pub mod options;
pub mod pause;
pub mod processor;
pub mod summary;
pub mod sweep;
pub mod validate;
pub mod writer;

pub use batch::{BatchCoordinator, BatchOutcome, JobSignals};
pub use cancel::CancellationToken;
pub use encoding::{Charset, LineDecoder, NativeCharset};
pub use error::{BatchError, Result, StreamError};
pub use events::{
    event_names, EventBus, JobEmitter, JsonlWriter, NullEmitter, Progress,
    ProgressEmitter, ProgressEvent,
};
pub use options::{
    Disposition, ProcessingOptions, ProcessingResult, DEFAULT_CONCURRENCY, DEFAULT_ENCODING,
    DEFAULT_HIGH_WATER_MARK, DEFAULT_MAX_FILE_SIZE, DEFAULT_OUTPUT_SUFFIX,
    MAX_RECOMMENDED_CONCURRENCY,
};
pub use pause::{PauseController, PauseState, StreamBinding, StreamId};
pub use processor::{output_path_for, process_file, RunContext, StreamProcessor, PLATFORM_EOL};
pub use summary::{BatchSummary, FailedFile};
pub use sweep::{sweep_stale_temp_files, SweepReport, STALE_TEMP_AGE};
pub use validate::{looks_binary, validate_input};
pub use writer::AtomicWriter;

pub use lm_scrub::{FileStats, ScrubberOptions};
