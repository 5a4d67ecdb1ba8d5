//! File-batch decoding pipeline.
//!
//! A request's files flow through four stages, each in its own module:
//!
//! 1. [`orchestrator`]: validates the batch and fans files out to the processor, collecting
//!    results back in input order.
//! 2. [`processor`]: turns one file into one [`FileResult`](crate::api::models::decode::FileResult).
//!    Nothing escapes this boundary; failures become `status: error` entries.
//! 3. [`variants`] and [`staging`]: decode the bytes into the original and inverted luma
//!    rasters and hold them (in memory or in scoped temp files) for the detector.
//! 4. [`decoder`]: runs the [`FiducialDetector`](crate::detector::FiducialDetector) over every
//!    variant and concatenates the detections.

pub mod decoder;
pub mod orchestrator;
pub mod processor;
pub mod staging;
pub mod variants;

use std::path::PathBuf;

use bytes::Bytes;
use thiserror::Error;

pub use orchestrator::BatchOrchestrator;
pub use processor::FileProcessor;

/// Per-file failure. Always folded into that file's result, never surfaced as a request error.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Invalid image: {0}")]
    Image(#[from] image::ImageError),

    #[error("File size of {size} bytes exceeds maximum allowed size of {max} bytes")]
    TooLarge { size: usize, max: u64 },

    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to stage image variant: {message}")]
    Staging { message: String },

    #[error("Processing aborted: {message}")]
    Panicked { message: String },
}

/// A file as the pipeline sees it: raw bytes plus the name the client gave it.
#[derive(Debug, Clone, Default)]
pub struct UploadedFile {
    pub name: Option<String>,
    pub content: Bytes,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            name: Some(name.into()),
            content: content.into(),
        }
    }

    /// True for a part with neither a name nor content, which is what browsers submit for an
    /// untouched file input.
    pub fn is_empty(&self) -> bool {
        self.name.as_deref().is_none_or(str::is_empty) && self.content.is_empty()
    }
}

/// Where a file's bytes come from. Resolved inside the file's own processing task, so a source
/// that cannot be read only fails its own entry.
#[derive(Debug, Clone)]
pub enum FileSource {
    Bytes { name: Option<String>, content: Bytes },
    Path(PathBuf),
}

impl From<UploadedFile> for FileSource {
    fn from(file: UploadedFile) -> Self {
        FileSource::Bytes {
            name: file.name,
            content: file.content,
        }
    }
}

impl FileSource {
    /// Name reported for this source before its bytes are read
    pub fn display_name(&self) -> String {
        match self {
            FileSource::Bytes { name, .. } => name.clone().unwrap_or_default(),
            FileSource::Path(path) => path.to_string_lossy().into_owned(),
        }
    }

    /// Same rule as [`UploadedFile::is_empty`]; a path is never empty before it is read.
    pub fn is_empty(&self) -> bool {
        match self {
            FileSource::Bytes { name, content } => name.as_deref().is_none_or(str::is_empty) && content.is_empty(),
            FileSource::Path(_) => false,
        }
    }

    pub async fn resolve(self) -> Result<UploadedFile, DecodeError> {
        match self {
            FileSource::Bytes { name, content } => Ok(UploadedFile { name, content }),
            FileSource::Path(path) => {
                let content = tokio::fs::read(&path).await?;
                Ok(UploadedFile {
                    name: Some(path.to_string_lossy().into_owned()),
                    content: Bytes::from(content),
                })
            }
        }
    }
}
