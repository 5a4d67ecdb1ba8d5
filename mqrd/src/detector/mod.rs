//! Fiducial detection seam.
//!
//! The pipeline never looks for symbols itself. It hands single-channel rasters to a
//! [`FiducialDetector`] and gets back zero or more located symbols, each with its decoded message
//! and the quadrilateral that bounds it in image coordinates.
//!
//! Implementations must be deterministic and free of side effects: the same raster always yields
//! the same detections in the same order. The shipped backend is [`RqrrDetector`].

mod rqrr_backend;

use std::fmt;
use std::str::FromStr;

use image::GrayImage;
use thiserror::Error;

pub use self::rqrr_backend::RqrrDetector;

/// A point in image coordinates (pixels, origin top-left).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Polygon in detector-defined winding order.
///
/// The textual form is a compatibility contract with existing consumers:
///
/// ```text
/// Polygon2D( (318.906359181835,902.4339247801383) (386.0880409267389,903.668952557007) ... )
/// ```
///
/// Coordinates use Rust's shortest round-trip float formatting, which is locale independent and
/// always carries a fractional part (`318.0`, never `318`).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Polygon2D {
    pub vertices: Vec<Point2D>,
}

impl Polygon2D {
    pub fn new(vertices: Vec<Point2D>) -> Self {
        Self { vertices }
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }
}

impl From<[(f64, f64); 4]> for Polygon2D {
    fn from(corners: [(f64, f64); 4]) -> Self {
        Self::new(corners.iter().map(|&(x, y)| Point2D::new(x, y)).collect())
    }
}

impl fmt::Display for Polygon2D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Polygon2D( ")?;
        for vertex in &self.vertices {
            write!(f, "({:?},{:?}) ", vertex.x, vertex.y)?;
        }
        f.write_str(")")
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid polygon string: {reason}")]
pub struct ParsePolygonError {
    reason: String,
}

impl ParsePolygonError {
    fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

impl FromStr for Polygon2D {
    type Err = ParsePolygonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s
            .strip_prefix("Polygon2D(")
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(|| ParsePolygonError::new("expected `Polygon2D( ... )`"))?;

        let vertices = body
            .split_whitespace()
            .map(|token| {
                let (x, y) = token
                    .strip_prefix('(')
                    .and_then(|t| t.strip_suffix(')'))
                    .and_then(|t| t.split_once(','))
                    .ok_or_else(|| ParsePolygonError::new(format!("malformed point `{token}`")))?;
                let x = x.parse().map_err(|_| ParsePolygonError::new(format!("bad x coordinate `{x}`")))?;
                let y = y.parse().map_err(|_| ParsePolygonError::new(format!("bad y coordinate `{y}`")))?;
                Ok(Point2D::new(x, y))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { vertices })
    }
}

/// A symbol located by a detector.
#[derive(Debug, Clone, PartialEq)]
pub struct Fiducial {
    /// Decoded payload. Empty when the symbol was located but could not be read.
    pub message: String,
    pub bounds: Polygon2D,
}

#[derive(Debug, Error)]
pub enum DetectorError {
    /// The raster cannot be handed to the backend (zero-sized, too large, ...)
    #[error("unusable image buffer: {reason}")]
    InvalidBuffer { reason: String },

    /// Backend-specific failure
    #[error("detector backend failed: {0}")]
    Backend(String),
}

/// Locates and decodes symbols in a single-channel raster.
pub trait FiducialDetector: Send + Sync {
    /// Short backend name used in logs.
    fn name(&self) -> &'static str;

    fn detect(&self, image: &GrayImage) -> Result<Vec<Fiducial>, DetectorError>;
}
