use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use tracing::{debug, instrument, warn};

use super::staging::VariantStaging;
use super::{DecodeError, UploadedFile, decoder, variants};
use crate::api::models::decode::{Detection, FileResult};
use crate::detector::FiducialDetector;

/// Terminal path segment of a client-supplied file name.
///
/// Both separators are honoured since browsers on Windows submit names like `C:\fakepath\a.png`.
pub fn basename(name: &str) -> String {
    name.rsplit(['/', '\\']).next().unwrap_or_default().to_string()
}

/// Turns one upload into one [`FileResult`].
///
/// [`process`](Self::process) is infallible: decode, staging and size-limit failures become a
/// `status: error` result for this file only. Detector failures are absorbed per variant by
/// [`decoder::decode`].
pub struct FileProcessor {
    detector: Arc<dyn FiducialDetector>,
    staging: VariantStaging,
    /// Per-file byte limit; 0 disables the check
    max_file_size: u64,
}

impl FileProcessor {
    pub fn new(detector: Arc<dyn FiducialDetector>, staging: VariantStaging, max_file_size: u64) -> Self {
        Self {
            detector,
            staging,
            max_file_size,
        }
    }

    #[instrument(skip_all, fields(filename, size = file.content.len()))]
    pub fn process(&self, file: UploadedFile) -> FileResult {
        let filename = basename(file.name.as_deref().unwrap_or_default());
        tracing::Span::current().record("filename", filename.as_str());

        let started = Instant::now();
        let result = match self.run(&file.content) {
            Ok(detections) => {
                debug!(detections = detections.len(), "File decoded");
                FileResult::ok(filename, detections)
            }
            Err(e) => {
                warn!(error = %e, "File could not be processed");
                FileResult::error(filename, e.to_string())
            }
        };

        counter!("mqrd_files_processed_total", "status" => result.status.as_str()).increment(1);
        histogram!("mqrd_file_processing_seconds").record(started.elapsed().as_secs_f64());
        result
    }

    fn run(&self, content: &[u8]) -> Result<Vec<Detection>, DecodeError> {
        if self.max_file_size > 0 && content.len() as u64 > self.max_file_size {
            return Err(DecodeError::TooLarge {
                size: content.len(),
                max: self.max_file_size,
            });
        }

        let staged = variants::generate(content)?
            .into_iter()
            .map(|variant| self.staging.materialize(variant))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(decoder::decode(self.detector.as_ref(), &staged))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::decode::FileStatus;
    use crate::detector::{Polygon2D, RqrrDetector};
    use crate::test_utils::{PanicDetector, PolarityDetector, dark_corner_png, encode_png, qr_code_image};
    use std::panic::{AssertUnwindSafe, catch_unwind};

    fn processor(detector: impl FiducialDetector + 'static) -> FileProcessor {
        FileProcessor::new(Arc::new(detector), VariantStaging::Memory, 10 * 1024 * 1024)
    }

    #[test]
    fn basename_strips_directories() {
        assert_eq!(basename("mda1-second.png"), "mda1-second.png");
        assert_eq!(basename("/tmp/uploads/mda1-second.png"), "mda1-second.png");
        assert_eq!(basename("C:\\fakepath\\scan.jpg"), "scan.jpg");
        assert_eq!(basename("nested/dir/"), "");
        assert_eq!(basename(""), "");
    }

    #[test]
    fn original_polarity_only_yields_one_detection() {
        let result = processor(PolarityDetector::dark_only()).process(UploadedFile::new("a/b/code.png", dark_corner_png(20, 10)));

        assert_eq!(result.filename, "code.png");
        assert_eq!(result.status, FileStatus::Ok);
        assert_eq!(result.results.len(), 1);
        assert_eq!(result.results[0].decoded, "dark-20x10");
        assert!(result.error.is_none());
    }

    #[test]
    fn both_polarities_yield_original_then_inverted() {
        let result = processor(PolarityDetector::both()).process(UploadedFile::new("code.png", dark_corner_png(20, 10)));

        assert_eq!(result.results.len(), 2);
        assert_eq!(result.results[0].decoded, "dark-20x10");
        assert_eq!(result.results[1].decoded, "light-20x10");
        assert_eq!(result.results[0].bounds, result.results[1].bounds);
    }

    #[test]
    fn invalid_image_becomes_error_result() {
        let result = processor(PolarityDetector::both()).process(UploadedFile::new("notes.txt", "hello"));

        assert_eq!(result.filename, "notes.txt");
        assert_eq!(result.status, FileStatus::Error);
        assert!(result.results.is_empty());
        assert!(result.error.unwrap().starts_with("Invalid image"));
    }

    #[test]
    fn oversized_file_is_rejected_per_file() {
        let png = dark_corner_png(20, 10);
        let limit = png.len() as u64 - 1;
        let processor = FileProcessor::new(Arc::new(PolarityDetector::both()), VariantStaging::Memory, limit);

        let result = processor.process(UploadedFile::new("big.png", png));
        assert_eq!(result.status, FileStatus::Error);
        assert!(result.error.unwrap().contains("exceeds maximum allowed size"));
    }

    #[test]
    fn zero_limit_disables_size_check() {
        let processor = FileProcessor::new(Arc::new(PolarityDetector::both()), VariantStaging::Memory, 0);
        let result = processor.process(UploadedFile::new("any.png", dark_corner_png(64, 64)));
        assert!(result.is_ok());
    }

    #[test]
    fn missing_name_yields_empty_filename() {
        let file = UploadedFile {
            name: None,
            content: dark_corner_png(8, 8).into(),
        };
        let result = processor(PolarityDetector::dark_only()).process(file);
        assert_eq!(result.filename, "");
        assert!(result.is_ok());
    }

    #[test]
    fn same_bytes_give_identical_results() {
        let processor = processor(PolarityDetector::both());
        let png = dark_corner_png(12, 12);

        let first = processor.process(UploadedFile::new("x.png", png.clone()));
        let second = processor.process(UploadedFile::new("x.png", png));
        assert_eq!(first, second);
    }

    #[test]
    fn disk_staging_is_released_after_success_and_failure() {
        let dir = tempfile::tempdir().unwrap();
        let staging = VariantStaging::Disk {
            directory: Some(dir.path().to_path_buf()),
        };

        let ok = FileProcessor::new(Arc::new(PolarityDetector::both()), staging.clone(), 0)
            .process(UploadedFile::new("ok.png", dark_corner_png(10, 10)));
        assert_eq!(ok.results.len(), 2);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

        let panicking = FileProcessor::new(Arc::new(PanicDetector), staging, 0);
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            panicking.process(UploadedFile::new("boom.png", dark_corner_png(10, 10)))
        }));
        assert!(outcome.is_err());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn real_symbol_through_disk_staging() {
        let dir = tempfile::tempdir().unwrap();
        let staging = VariantStaging::Disk {
            directory: Some(dir.path().to_path_buf()),
        };
        let processor = FileProcessor::new(Arc::new(RqrrDetector::new()), staging, 0);

        let png = encode_png(&qr_code_image("MQRD 42", 6));
        let result = processor.process(UploadedFile::new("scans/label.png", png));

        assert_eq!(result.filename, "label.png");
        assert_eq!(result.status, FileStatus::Ok);
        assert!(!result.results.is_empty());
        assert_eq!(result.results[0].decoded, "MQRD 42");

        let json = serde_json::to_value(&result.results[0]).unwrap();
        let bounds: Polygon2D = json["bounds"].as_str().unwrap().parse().unwrap();
        assert_eq!(bounds.len(), 4);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
