//! # Application Error Types
//!
//! This module defines the error types used throughout the preprocessing
//! pipeline. Fatal conditions carry the failing page index and stage name
//! wherever one exists.

use std::fmt;
use std::path::PathBuf;

use crate::pipeline::{PageIndex, PageStage};
use crate::preprocessing::PreprocessingError;

/// Pipeline error type for consistent error handling
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// The source document is missing, unreadable, corrupt or has no pages
    DocumentRead { path: PathBuf, message: String },
    /// A page raster could not be decoded from disk
    RasterDecode {
        page: PageIndex,
        stage: PageStage,
        message: String,
    },
    /// A preprocessing stage failed on a page
    Stage {
        page: PageIndex,
        stage: PageStage,
        source: PreprocessingError,
    },
    /// File system errors
    FileSystem(String),
    /// Configuration validation errors
    Config(String),
    /// The recognizer failed on a page
    Recognition { page: PageIndex, message: String },
    /// Internal application errors
    Internal(String),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::DocumentRead { path, message } => {
                write!(f, "[DOCUMENT_READ] {}: {}", path.display(), message)
            }
            PipelineError::RasterDecode {
                page,
                stage,
                message,
            } => write!(
                f,
                "[RASTER_DECODE] page {} at stage {}: {}",
                page, stage, message
            ),
            PipelineError::Stage {
                page,
                stage,
                source,
            } => write!(f, "[STAGE] page {} at stage {}: {}", page, stage, source),
            PipelineError::FileSystem(msg) => write!(f, "[FILESYSTEM] {}", msg),
            PipelineError::Config(msg) => write!(f, "[CONFIG] {}", msg),
            PipelineError::Recognition { page, message } => {
                write!(f, "[RECOGNITION] page {}: {}", page, message)
            }
            PipelineError::Internal(msg) => write!(f, "[INTERNAL] {}", msg),
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PipelineError::Stage { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl PipelineError {
    /// Page the error is attached to, if any.
    pub fn page(&self) -> Option<PageIndex> {
        match self {
            PipelineError::RasterDecode { page, .. }
            | PipelineError::Stage { page, .. }
            | PipelineError::Recognition { page, .. } => Some(*page),
            _ => None,
        }
    }

    /// Stage the error is attached to, if any.
    pub fn stage(&self) -> Option<PageStage> {
        match self {
            PipelineError::RasterDecode { stage, .. } | PipelineError::Stage { stage, .. } => {
                Some(*stage)
            }
            _ => None,
        }
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::FileSystem(err.to_string())
    }
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, PipelineError>;

/// Standardized error logging utilities for consistent error reporting across the application
pub mod error_logging {
    use tracing::error;

    use crate::pipeline::{PageIndex, PageStage};

    /// Log a stage failure with page and stage context
    pub fn log_stage_error(
        error: &impl std::fmt::Display,
        operation: &str,
        page: Option<PageIndex>,
        stage: Option<PageStage>,
    ) {
        error!(
            error = %error,
            operation = %operation,
            page = ?page.map(|p| p.get()),
            stage = ?stage.map(|s| s.name()),
            "Pipeline stage failed"
        );
    }

    /// Log OCR processing errors with page and processing context
    pub fn log_ocr_error(
        error: &impl std::fmt::Display,
        operation: &str,
        page: Option<PageIndex>,
        processing_duration: Option<std::time::Duration>,
    ) {
        error!(
            error = %error,
            operation = %operation,
            page = ?page.map(|p| p.get()),
            processing_duration_ms = ?processing_duration.map(|d| d.as_millis()),
            "OCR processing failed"
        );
    }

    /// Log file system errors with path and operation context
    pub fn log_filesystem_error(
        error: &impl std::fmt::Display,
        operation: &str,
        path: Option<&str>,
    ) {
        error!(
            error = %error,
            operation = %operation,
            path = ?path,
            "File system operation failed"
        );
    }

    /// Log internal application errors with component context
    pub fn log_internal_error(error: &impl std::fmt::Display, component: &str, operation: &str) {
        error!(
            error = %error,
            component = %component,
            operation = %operation,
            "Internal application error"
        );
    }

    /// Log configuration errors during startup/initialization
    pub fn log_config_error(error: &impl std::fmt::Display, config_key: &str, operation: &str) {
        error!(
            error = %error,
            config_key = %config_key,
            operation = %operation,
            "Configuration error"
        );
    }
}
