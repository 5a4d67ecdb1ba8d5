use axum::{
    Json,
    extract::{
        Multipart, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::StatusCode,
};
use tracing::{debug, instrument};

use crate::AppState;
use crate::api::models::decode::{ErrorDetail, FileResult};
use crate::errors::{Error, Result};
use crate::pipeline::UploadedFile;

/// Multipart field carrying the images
const FILES_FIELD: &str = "files";

fn multipart_error(e: MultipartError) -> Error {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        Error::PayloadTooLarge { message: e.body_text() }
    } else {
        Error::BadRequest {
            message: format!("Failed to parse multipart data: {}", e.body_text()),
        }
    }
}

#[utoipa::path(
    post,
    path = "/micro-qrs/decode",
    tag = "micro-qrs",
    summary = "Decode Micro QR codes",
    description = "Upload one or more images as repeated `files` parts. Every image is scanned as-is and as a \
color-inverted copy; detections from both passes are returned, original first. The response has one entry per \
uploaded file, in upload order. A file that cannot be read as an image gets `status: error` without failing the \
rest of the batch.",
    request_body(
        content_type = "multipart/form-data",
        description = "Repeated `files` parts containing image data (PNG, JPEG, BMP, GIF, TIFF, WebP, ...)"
    ),
    responses(
        (status = 200, description = "One result per uploaded file, in upload order", body = Vec<FileResult>),
        (status = 400, description = "No files provided, or too many files", body = ErrorDetail),
        (status = 413, description = "Request body too large", body = ErrorDetail),
        (status = 500, description = "Internal server error", body = ErrorDetail)
    )
)]
#[instrument(skip_all)]
pub async fn decode_micro_qrs(
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<Vec<FileResult>>> {
    let max_files = state.config.limits.files.max_files_count;
    let mut files = Vec::new();

    // A body that is not multipart at all carries no files; let validation report that
    match multipart {
        Ok(mut multipart) => {
            while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
                if field.name() != Some(FILES_FIELD) {
                    debug!(field = ?field.name(), "Ignoring unexpected multipart field");
                    continue;
                }

                let name = field.file_name().map(str::to_string);
                let content = field.bytes().await.map_err(multipart_error)?;
                debug!(filename = ?name, size = content.len(), "Received file part");
                files.push(UploadedFile { name, content });

                // The batch is already over the count limit; the rest of the body is not needed
                if files.len() > max_files {
                    debug!(max_files, "File count limit exceeded, skipping remaining parts");
                    break;
                }
            }
        }
        Err(rejection) => {
            debug!(error = %rejection, "Request body is not multipart");
        }
    }

    let results = state.orchestrator.handle(files).await?;
    Ok(Json(results))
}
