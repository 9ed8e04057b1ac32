//! Input validation run before any output is created.

use crate::error::{Result, StreamError};
use crate::options::ProcessingOptions;
use std::io::ErrorKind;
use std::path::Path;
use tokio::io::AsyncReadExt;

/// Number of leading bytes inspected by the binary heuristic.
pub const BINARY_SNIFF_LEN: usize = 512;

/// Share of non-text bytes above which a sample counts as binary.
pub const BINARY_THRESHOLD: f64 = 0.30;

/// Check that `path` is a readable regular file within the size limit and,
/// unless disabled, not binary. Returns the file size.
pub async fn validate_input(path: &Path, options: &ProcessingOptions) -> Result<u64> {
    let metadata = tokio::fs::metadata(path).await.map_err(|e| match e.kind() {
        ErrorKind::NotFound => StreamError::NotFound(path.to_path_buf()),
        ErrorKind::PermissionDenied => StreamError::Unreadable(path.to_path_buf()),
        _ => StreamError::Io(e),
    })?;

    if !metadata.is_file() {
        return Err(StreamError::NotAFile(path.to_path_buf()));
    }

    let size = metadata.len();
    if size > options.max_file_size {
        return Err(StreamError::TooLarge {
            size,
            limit: options.max_file_size,
        });
    }

    let mut file = tokio::fs::File::open(path).await.map_err(|e| match e.kind() {
        ErrorKind::PermissionDenied => StreamError::Unreadable(path.to_path_buf()),
        _ => StreamError::Io(e),
    })?;

    if options.skip_binary_files {
        let mut sample = Vec::with_capacity(BINARY_SNIFF_LEN);
        (&mut file)
            .take(BINARY_SNIFF_LEN as u64)
            .read_to_end(&mut sample)
            .await?;
        if looks_binary(&sample) {
            return Err(StreamError::Binary(path.to_path_buf()));
        }
    }

    Ok(size)
}

/// Binary if any NUL byte, or if more than 30% of bytes fall outside
/// printable ASCII, tab, LF and CR.
pub fn looks_binary(sample: &[u8]) -> bool {
    if sample.is_empty() {
        return false;
    }
    if sample.contains(&0) {
        return true;
    }
    let non_text = sample
        .iter()
        .filter(|&&b| !matches!(b, 0x20..=0x7E | b'\t' | b'\n' | b'\r'))
        .count();
    non_text as f64 / sample.len() as f64 > BINARY_THRESHOLD
}
