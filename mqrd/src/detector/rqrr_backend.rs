use image::GrayImage;
use rqrr::PreparedImage;
use tracing::{debug, trace};

use super::{DetectorError, Fiducial, FiducialDetector, Point2D, Polygon2D};

/// Detector backed by the pure-Rust `rqrr` grid finder.
///
/// Every located grid is reported, including grids whose payload fails to decode. Those come back
/// with an empty message so callers can still see where a symbol sits.
#[derive(Debug, Default, Clone)]
pub struct RqrrDetector;

impl RqrrDetector {
    pub fn new() -> Self {
        Self
    }
}

impl FiducialDetector for RqrrDetector {
    fn name(&self) -> &'static str {
        "rqrr"
    }

    fn detect(&self, image: &GrayImage) -> Result<Vec<Fiducial>, DetectorError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(DetectorError::InvalidBuffer {
                reason: format!("image has zero area ({width}x{height})"),
            });
        }

        let mut prepared = PreparedImage::prepare_from_greyscale(width as usize, height as usize, |x, y| {
            image.get_pixel(x as u32, y as u32).0[0]
        });
        let grids = prepared.detect_grids();
        trace!(width, height, grids = grids.len(), "Grid search finished");

        let fiducials = grids
            .into_iter()
            .map(|grid| {
                let bounds = Polygon2D::new(
                    grid.bounds
                        .iter()
                        .map(|corner| Point2D::new(f64::from(corner.x), f64::from(corner.y)))
                        .collect(),
                );
                let message = match grid.decode() {
                    Ok((_meta, content)) => content,
                    Err(e) => {
                        debug!(error = %e, %bounds, "Located grid could not be decoded");
                        String::new()
                    }
                };
                Fiducial { message, bounds }
            })
            .collect();

        Ok(fiducials)
    }
}
