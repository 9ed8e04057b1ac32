//! Atomic output writer.
//!
//! Output is written to a sibling temp file and only renamed onto the final
//! path once the whole file has been produced, so a reader never observes a
//! partially written output.

use crate::error::Result;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};

const MAX_TEMP_ATTEMPTS: i64 = 16;

/// Temp file name for `final_path`: `<final-name>.<pid>-<unix-millis>.tmp`.
pub fn temp_path_for(final_path: &Path, millis: i64) -> PathBuf {
    let name = final_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    final_path.with_file_name(format!("{}.{}-{}.tmp", name, std::process::id(), millis))
}

/// Buffered writer over a temp file that is committed by rename.
pub struct AtomicWriter {
    final_path: PathBuf,
    temp_path: PathBuf,
    file: Option<BufWriter<File>>,
}

impl AtomicWriter {
    /// Create the temp file next to `final_path`. The parent directory must
    /// exist.
    pub async fn create(final_path: &Path, buffer_capacity: usize) -> Result<Self> {
        let now = chrono::Utc::now().timestamp_millis();
        let mut attempt = 0;
        loop {
            let temp_path = temp_path_for(final_path, now + attempt);
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&temp_path)
                .await
            {
                Ok(file) => {
                    tracing::debug!(temp = %temp_path.display(), "opened temp output");
                    return Ok(Self {
                        final_path: final_path.to_path_buf(),
                        temp_path,
                        file: Some(BufWriter::with_capacity(buffer_capacity.max(1), file)),
                    });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists && attempt < MAX_TEMP_ATTEMPTS => {
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub fn final_path(&self) -> &Path {
        &self.final_path
    }

    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    /// Write bytes. Suspends while the sink cannot accept more.
    pub async fn write_all(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.write_all(bytes).await,
            None => Err(std::io::Error::new(ErrorKind::BrokenPipe, "writer closed")),
        }
    }

    /// Push buffered bytes to the temp file.
    pub async fn flush(&mut self) -> std::io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush().await,
            None => Ok(()),
        }
    }

    /// Flush, replace any existing final file, and rename the temp onto it.
    /// On failure the temp file is removed.
    pub async fn commit(mut self) -> Result<PathBuf> {
        let outcome = self.finish_and_rename().await;
        if outcome.is_err() {
            remove_quietly(&self.temp_path).await;
        }
        outcome?;
        Ok(self.final_path.clone())
    }

    /// Close and remove the temp file. Teardown errors are ignored.
    pub async fn abort(mut self) {
        if let Some(mut file) = self.file.take() {
            let _ = file.shutdown().await;
        }
        remove_quietly(&self.temp_path).await;
    }

    async fn finish_and_rename(&mut self) -> Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush().await?;
            file.get_ref().sync_all().await?;
        }
        match tokio::fs::remove_file(&self.final_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        atomic_rename(&self.temp_path, &self.final_path).await
    }
}

impl Drop for AtomicWriter {
    fn drop(&mut self) {
        // Dropped without commit or abort (e.g. the task was aborted).
        if self.file.take().is_some() {
            let _ = std::fs::remove_file(&self.temp_path);
        }
    }
}

/// Rename temp file to final path.
pub async fn atomic_rename(temp_path: &Path, final_path: &Path) -> Result<()> {
    tokio::fs::rename(temp_path, final_path).await?;
    Ok(())
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove temp output");
        }
    }
}
