use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use utoipa::ToSchema;

use crate::detector::{Fiducial, Polygon2D};

/// One decoded symbol.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Detection {
    /// Decoded payload. Empty when a symbol was located but could not be read.
    #[schema(example = "1000000000553531")]
    pub decoded: String,
    /// Symbol corners as `Polygon2D( (x1,y1) (x2,y2) (x3,y3) (x4,y4) )`
    #[serde_as(as = "DisplayFromStr")]
    #[schema(
        value_type = String,
        example = "Polygon2D( (318.906359181835,902.4339247801383) (386.0880409267389,903.668952557007) (385.64719511149076,971.2244383204787) (317.6544971334475,971.332342732513) )"
    )]
    pub bounds: Polygon2D,
}

impl From<Fiducial> for Detection {
    fn from(fiducial: Fiducial) -> Self {
        Self {
            decoded: fiducial.message,
            bounds: fiducial.bounds,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Ok,
    Error,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Ok => "ok",
            FileStatus::Error => "error",
        }
    }
}

/// Outcome for a single uploaded file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FileResult {
    /// Basename of the uploaded file name
    #[schema(example = "mda1-second.png")]
    pub filename: String,
    pub status: FileStatus,
    /// Detections from every image variant, in variant order
    pub results: Vec<Detection>,
    /// Failure detail, present only when `status` is `error`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileResult {
    pub fn ok(filename: String, results: Vec<Detection>) -> Self {
        Self {
            filename,
            status: FileStatus::Ok,
            results,
            error: None,
        }
    }

    pub fn error(filename: String, error: impl Into<String>) -> Self {
        Self {
            filename,
            status: FileStatus::Error,
            results: Vec::new(),
            error: Some(error.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == FileStatus::Ok
    }
}

/// Error body returned for rejected requests
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    #[schema(example = "No files provided")]
    pub detail: String,
}
