//! # mqrd: batch Micro QR decoding service
//!
//! `mqrd` accepts image uploads over HTTP, looks for Micro QR codes in them and answers with the
//! decoded payloads and the polygon bounding each symbol.
//!
//! ## Request Flow
//!
//! A `POST /micro-qrs/decode` request carries one or more images as repeated `files` multipart
//! parts. The handler in [`api`] collects them into [`pipeline::UploadedFile`]s and hands the batch
//! to the [`pipeline::BatchOrchestrator`], which rejects empty or over-sized batches and otherwise
//! runs every file through the [`pipeline::FileProcessor`]:
//!
//! 1. the bytes are decoded into an 8-bit luma raster plus a photometrically inverted copy,
//!    because some detectors only see finder patterns of one polarity;
//! 2. each variant is staged in memory or in a scoped temp file;
//! 3. the configured [`detector::FiducialDetector`] scans the variants in order and every
//!    detection is kept, so a code readable in both polarities appears twice.
//!
//! The response is an array with exactly one entry per uploaded file, in upload order. A file
//! that cannot be processed yields a `status: error` entry; it never fails the whole request.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use mqrd::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = mqrd::config::Args::parse();
//!     let config = Config::load(&args)?;
//!     mqrd::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     Application::new(config)?
//!         .serve(async {
//!             let _ = tokio::signal::ctrl_c().await;
//!         })
//!         .await
//! }
//! ```

pub mod api;
pub mod config;
pub mod detector;
pub mod errors;
mod openapi;
pub mod pipeline;
pub mod telemetry;

#[cfg(test)]
pub mod test_utils;

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use axum_prometheus::PrometheusMetricLayer;
use bon::Builder;
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, debug, info};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::api::models::decode::FileResult;
pub use crate::config::Config;
use crate::detector::{FiducialDetector, RqrrDetector};
use crate::openapi::ApiDoc;
use crate::pipeline::staging::VariantStaging;
use crate::pipeline::{BatchOrchestrator, FileProcessor, FileSource};

/// Application state shared across all request handlers.
///
/// ```ignore
/// let state = AppState::builder()
///     .config(config)
///     .orchestrator(orchestrator)
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub orchestrator: BatchOrchestrator,
}

/// Wire the pipeline for `config` around `detector`.
pub fn build_orchestrator(config: &Config, detector: Arc<dyn FiducialDetector>) -> BatchOrchestrator {
    let processor = FileProcessor::new(
        detector,
        VariantStaging::from_config(&config.staging),
        config.limits.files.max_file_size,
    );
    BatchOrchestrator::new(Arc::new(processor), &config.limits.files)
}

/// Build the router: the decode endpoint, health check, API docs, optional Prometheus metrics
/// and request tracing.
pub fn build_router(state: AppState) -> Router {
    let decode_route = match state.config.request_body_limit() {
        Some(limit) => post(api::handlers::decode::decode_micro_qrs).layer(DefaultBodyLimit::max(limit)),
        None => post(api::handlers::decode::decode_micro_qrs).layer(DefaultBodyLimit::disable()),
    };

    let mut router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .route("/micro-qrs/decode", decode_route)
        .with_state(state.clone())
        .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()));

    if state.config.enable_metrics {
        let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();
        router = router
            .route("/internal/metrics", get(|| async move { metric_handle.render() }))
            .layer(prometheus_layer);
    }

    with_request_layers(router)
}

/// Panic recovery and request tracing shared by every route. A panicking handler is answered
/// with the regular 500 error body instead of a dropped connection.
fn with_request_layers(router: Router) -> Router {
    router.layer(CatchPanicLayer::custom(errors::panic_response)).layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    )
}

/// Run the pipeline over local files, the same way the HTTP endpoint does. A path that cannot be
/// read yields an error entry in its slot; only batch validation fails the call.
pub async fn decode_paths(config: &Config, paths: Vec<PathBuf>, detector: Arc<dyn FiducialDetector>) -> anyhow::Result<Vec<FileResult>> {
    let sources = paths.into_iter().map(FileSource::Path).collect();

    build_orchestrator(config, detector)
        .handle_sources(sources)
        .await
        .map_err(|e| anyhow::anyhow!(e.detail()))
}

pub struct Application {
    router: Router,
    config: Config,
}

impl Application {
    /// Create the application with the default detector backend
    pub fn new(config: Config) -> anyhow::Result<Self> {
        Self::with_detector(config, Arc::new(RqrrDetector::new()))
    }

    pub fn with_detector(config: Config, detector: Arc<dyn FiducialDetector>) -> anyhow::Result<Self> {
        debug!("Starting mqrd with configuration: {:#?}", config);
        config.validate().map_err(|e| anyhow::anyhow!(e.to_string()))?;
        info!(detector = detector.name(), "Using fiducial detector");

        let state = AppState::builder()
            .orchestrator(build_orchestrator(&config, detector))
            .config(config.clone())
            .build();
        let router = build_router(state);

        Ok(Self { router, config })
    }

    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "mqrd listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        telemetry::shutdown_telemetry();
        info!("Shutdown complete");
        Ok(())
    }
}
