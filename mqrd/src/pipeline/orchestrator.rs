use std::sync::Arc;

use futures::{StreamExt, stream};
use metrics::counter;
use tracing::{error, info, instrument, warn};

use super::processor::{FileProcessor, basename};
use super::{DecodeError, FileSource, UploadedFile};
use crate::api::models::decode::FileResult;
use crate::config::FileLimitsConfig;
use crate::errors::{Error, Result};

/// Entry point for a batch of uploads.
///
/// Validates the batch, then runs the [`FileProcessor`] for every file on the blocking pool with
/// at most `max_concurrent_files` in flight. Results come back in input order whatever the
/// concurrency, and a file that cannot be read or whose processing task dies yields an error
/// entry for that file alone.
#[derive(Clone)]
pub struct BatchOrchestrator {
    processor: Arc<FileProcessor>,
    max_files_count: usize,
    max_concurrent_files: usize,
}

impl BatchOrchestrator {
    pub fn new(processor: Arc<FileProcessor>, limits: &FileLimitsConfig) -> Self {
        Self {
            processor,
            max_files_count: limits.max_files_count,
            max_concurrent_files: limits.max_concurrent_files.max(1),
        }
    }

    pub fn validate(&self, sources: &[FileSource]) -> Result<()> {
        match sources.first() {
            None => return Err(Error::EmptyBatch),
            Some(first) if first.is_empty() => return Err(Error::EmptyBatch),
            Some(_) => {}
        }

        if sources.len() > self.max_files_count {
            return Err(Error::TooManyFiles {
                max: self.max_files_count,
            });
        }

        Ok(())
    }

    /// Decode a batch of uploads already held in memory.
    pub async fn handle(&self, files: Vec<UploadedFile>) -> Result<Vec<FileResult>> {
        self.handle_sources(files.into_iter().map(FileSource::from).collect()).await
    }

    #[instrument(skip_all, fields(files = sources.len()))]
    pub async fn handle_sources(&self, sources: Vec<FileSource>) -> Result<Vec<FileResult>> {
        self.validate(&sources)?;

        let results: Vec<FileResult> = stream::iter(sources.into_iter().enumerate())
            .map(|(index, source)| {
                let processor = Arc::clone(&self.processor);
                let filename = basename(&source.display_name());
                async move {
                    let file = match source.resolve().await {
                        Ok(file) => file,
                        Err(e) => {
                            warn!(index, filename = %filename, error = %e, "File could not be read");
                            counter!("mqrd_files_processed_total", "status" => "error").increment(1);
                            return FileResult::error(filename, e.to_string());
                        }
                    };

                    match tokio::task::spawn_blocking(move || processor.process(file)).await {
                        Ok(result) => result,
                        Err(e) => {
                            error!(index, filename = %filename, error = %e, "File processing task failed");
                            let cause = DecodeError::Panicked { message: e.to_string() };
                            FileResult::error(filename, cause.to_string())
                        }
                    }
                }
            })
            .buffered(self.max_concurrent_files)
            .collect()
            .await;

        let failed = results.iter().filter(|r| !r.is_ok()).count();
        info!(files = results.len(), failed, "Batch processed");
        Ok(results)
    }
}
