//! Progress event emission.
//!
//! Lifecycle events for files (keyed by input index) and for the batch are
//! dispatched through a [`ProgressEmitter`]. Implementations cover an
//! in-process event bus with multiple subscribers, a JSONL writer, and
//! fan-out to several emitters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::Write;
use std::sync::{mpsc, Arc, Mutex};

/// Event names for files and batches.
pub mod event_names {
    pub const BATCH_STARTED: &str = "batch_started";
    pub const BATCH_PAUSED: &str = "batch_paused";
    pub const BATCH_RESUMED: &str = "batch_resumed";
    pub const BATCH_CANCEL_REQUESTED: &str = "batch_cancel_requested";
    pub const BATCH_FINISHED: &str = "batch_finished";

    pub const FILE_STARTED: &str = "file_started";
    pub const FILE_PROGRESS: &str = "file_progress";
    pub const FILE_COMPLETED: &str = "file_completed";
    pub const FILE_FAILED: &str = "file_failed";
    pub const FILE_CANCELLED: &str = "file_cancelled";
}

/// Progress counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub current: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
}

/// Structured progress event for shells and CLI consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub event: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<Progress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, Value>,
}

impl ProgressEvent {
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            timestamp: Utc::now(),
            job_id: None,
            file_index: None,
            progress: None,
            elapsed_ms: None,
            details: BTreeMap::new(),
        }
    }

    pub fn with_job_id(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = Some(job_id.into());
        self
    }

    pub fn with_file_index(mut self, index: usize) -> Self {
        self.file_index = Some(index);
        self
    }

    pub fn with_progress(mut self, current: u64, total: Option<u64>) -> Self {
        self.progress = Some(Progress { current, total });
        self
    }

    pub fn with_elapsed_ms(mut self, elapsed_ms: u64) -> Self {
        self.elapsed_ms = Some(elapsed_ms);
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.details.insert(key.into(), v);
        }
        self
    }

    pub fn to_jsonl(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(
                r#"{{"error":"serialization_failed","event":"{}"}}"#,
                self.event
            )
        })
    }
}

/// Sink for lifecycle events. Must not block the pipeline.
pub trait ProgressEmitter: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

/// Emitter that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEmitter;

impl ProgressEmitter for NullEmitter {
    fn emit(&self, _event: ProgressEvent) {}
}

/// In-process bus; every subscriber gets every event.
#[derive(Debug, Default)]
pub struct EventBus {
    senders: Mutex<Vec<mpsc::Sender<ProgressEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// New receiver. Dropped receivers are pruned on the next emit.
    pub fn subscribe(&self) -> mpsc::Receiver<ProgressEvent> {
        let (tx, rx) = mpsc::channel();
        if let Ok(mut senders) = self.senders.lock() {
            senders.push(tx);
        }
        rx
    }

    pub fn emit(&self, event: ProgressEvent) {
        if let Ok(mut senders) = self.senders.lock() {
            senders.retain(|sender| sender.send(event.clone()).is_ok());
        }
    }
}

impl ProgressEmitter for EventBus {
    fn emit(&self, event: ProgressEvent) {
        EventBus::emit(self, event);
    }
}

/// Writes one JSON line per event and flushes after each.
pub struct JsonlWriter<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonlWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }
}

impl<W: Write + Send> ProgressEmitter for JsonlWriter<W> {
    fn emit(&self, event: ProgressEvent) {
        let line = event.to_jsonl();
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writeln!(writer, "{}", line);
            let _ = writer.flush();
        }
    }
}

/// Emitter that stamps each event with the owning job's id.
pub struct JobEmitter {
    job_id: String,
    inner: Arc<dyn ProgressEmitter>,
}

impl JobEmitter {
    pub fn new(job_id: impl Into<String>, inner: Arc<dyn ProgressEmitter>) -> Self {
        Self {
            job_id: job_id.into(),
            inner,
        }
    }
}

impl ProgressEmitter for JobEmitter {
    fn emit(&self, mut event: ProgressEvent) {
        if event.job_id.is_none() {
            event.job_id = Some(self.job_id.clone());
        }
        self.inner.emit(event);
    }
}
