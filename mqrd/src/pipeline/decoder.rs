//! Batch decoding: one detector pass per staged variant, in variant order.

use metrics::counter;
use tracing::{debug, warn};

use super::staging::StagedVariant;
use crate::api::models::decode::Detection;
use crate::detector::FiducialDetector;

/// Run `detector` over every variant in order and concatenate what it finds.
///
/// Detections are not deduplicated: a symbol readable in both polarities shows up once per
/// variant. A variant the detector (or staging) cannot handle contributes nothing; the remaining
/// variants still run.
pub fn decode(detector: &dyn FiducialDetector, variants: &[StagedVariant]) -> Vec<Detection> {
    let mut detections = Vec::new();

    for variant in variants {
        let kind = variant.kind();

        let image = match variant.load() {
            Ok(image) => image,
            Err(e) => {
                warn!(variant = %kind, error = %e, "Could not load staged variant, skipping");
                counter!("mqrd_variant_detector_errors_total", "variant" => kind.as_str()).increment(1);
                continue;
            }
        };

        match detector.detect(&image) {
            Ok(found) => {
                debug!(variant = %kind, detector = detector.name(), count = found.len(), "Variant scanned");
                counter!("mqrd_detections_total", "variant" => kind.as_str()).increment(found.len() as u64);
                detections.extend(found.into_iter().map(Detection::from));
            }
            Err(e) => {
                warn!(variant = %kind, detector = detector.name(), error = %e, "Detector failed on variant, skipping");
                counter!("mqrd_variant_detector_errors_total", "variant" => kind.as_str()).increment(1);
            }
        }
    }

    detections
}
