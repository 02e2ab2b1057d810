//! Observability module for centralized metrics, tracing, and logging setup.
//!
//! This module provides:
//! - Structured logging with configurable levels and formats
//! - Metrics collection rendered as a Prometheus text snapshot
//! - Span helpers for pipeline stages and pages

use anyhow::Result;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::prelude::*;

use crate::observability_config::{LogFormat, ObservabilityConfig};
use crate::pipeline::{PageIndex, PageStage};

/// Handles kept alive for the duration of a run.
pub struct Observability {
    metrics: Option<PrometheusHandle>,
}

impl Observability {
    /// Prometheus text rendering of every metric recorded so far.
    ///
    /// Returns `None` when metrics export is disabled.
    pub fn render_metrics(&self) -> Option<String> {
        self.metrics.as_ref().map(|handle| handle.render())
    }
}

/// Initialize the complete observability stack
pub fn init_observability() -> Result<Observability> {
    let config = ObservabilityConfig::from_env();
    init_observability_with_config(&config)
}

/// Initialize the complete observability stack with custom configuration
pub fn init_observability_with_config(config: &ObservabilityConfig) -> Result<Observability> {
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid observability configuration: {}", e))?;

    init_tracing_with_config(config)?;

    let metrics = if config.enable_metrics_export {
        Some(init_metrics_with_config(config)?)
    } else {
        None
    };

    tracing::info!(
        environment = %config.environment,
        metrics_enabled = %config.enable_metrics_export,
        "Observability stack initialized successfully"
    );

    Ok(Observability { metrics })
}

/// Initialize structured logging with tracing and configuration
fn init_tracing_with_config(config: &ObservabilityConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("ocr_prep={}", config.log_level.to_lowercase()).parse()?)
        .add_directive(format!("ocr_preprocessing={}", config.log_level.to_lowercase()).parse()?);

    let log_format = config.effective_log_format();

    match log_format {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .pretty()
                        .with_target(true)
                        .with_thread_ids(false)
                        .with_thread_names(false),
                )
                .try_init()?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_thread_ids(true)
                        .with_thread_names(true),
                )
                .try_init()?;
        }
    }

    tracing::info!(
        environment = %config.environment,
        log_level = %config.log_level,
        log_format = ?log_format,
        "Tracing initialized with structured logging"
    );
    Ok(())
}

/// Install the Prometheus recorder; no HTTP listener is started.
fn init_metrics_with_config(config: &ObservabilityConfig) -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    tracing::info!(
        metrics_enabled = %config.enable_metrics_export,
        "Metrics collection initialized"
    );
    Ok(handle)
}

/// Create a span covering one full pass of a stage over every page
pub fn stage_span(stage: PageStage, page_count: usize) -> tracing::Span {
    tracing::info_span!(
        "pipeline_stage",
        stage = stage.name(),
        page_count = page_count,
        component = "pipeline"
    )
}

/// Create a span for one page inside a stage
pub fn page_span(stage: PageStage, page: PageIndex) -> tracing::Span {
    tracing::debug_span!(
        "pipeline_page",
        stage = stage.name(),
        page = page.get(),
        component = "pipeline"
    )
}

/// Create a span for OCR operations
pub fn ocr_span(operation: &str) -> tracing::Span {
    tracing::info_span!("ocr_operation", operation = operation, component = "ocr")
}

/// Record the duration of one stage pass and the pages it processed
pub fn record_stage_metrics(stage: PageStage, duration: std::time::Duration, pages: usize) {
    let stage = stage.name();
    metrics::histogram!("preprocessing_stage_duration_seconds", "stage" => stage)
        .record(duration.as_secs_f64());
    metrics::counter!("preprocessing_pages_total", "stage" => stage).increment(pages as u64);
}

/// Record a stage failure
pub fn record_stage_failure(stage: PageStage) {
    metrics::counter!("preprocessing_failures_total", "stage" => stage.name()).increment(1);
}

/// Record the skew measured on a page
pub fn record_skew_angle(angle_degrees: f32) {
    metrics::histogram!("deskew_angle_degrees").record(angle_degrees as f64);
}

/// Record OCR operation metrics
pub fn record_ocr_metrics(success: bool, duration: std::time::Duration) {
    metrics::counter!("ocr_operations_total", "result" => if success { "success" } else { "failure" })
        .increment(1);
    metrics::histogram!("ocr_duration_seconds").record(duration.as_secs_f64());
}
