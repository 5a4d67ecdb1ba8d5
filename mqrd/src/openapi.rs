//! OpenAPI document for the HTTP surface, served as JSON at `/api-docs/openapi.json` and rendered
//! with Scalar at `/docs`.

use utoipa::OpenApi;

use crate::api;
use crate::api::models::decode::{Detection, ErrorDetail, FileResult, FileStatus};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "mqrd",
        description = "Batch Micro QR decoding: upload images, get decoded payloads and symbol bounds."
    ),
    paths(api::handlers::decode::decode_micro_qrs),
    components(schemas(FileResult, FileStatus, Detection, ErrorDetail)),
    tags((name = "micro-qrs", description = "Micro QR code decoding"))
)]
pub struct ApiDoc;
