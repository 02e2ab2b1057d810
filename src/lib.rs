//! # ocr-prep
//!
//! Preprocessing of scanned document pages ahead of OCR: Otsu binarization,
//! longer-side scaling, Hough-based deskewing, non-local means and
//! morphological denoising, driven stage by stage over every page of a
//! document.

pub mod cli;
pub mod config;
pub mod errors;
pub mod geometry;
pub mod observability;
pub mod observability_config;
pub mod ocr;
pub mod ocr_config;
pub mod ocr_errors;
pub mod pipeline;
pub mod preprocessing;
pub mod rasterizer;
pub mod workspace;

// Re-export types for easier access
pub use errors::{AppResult, PipelineError};
pub use pipeline::{PageIndex, PageRaster, PageStage, Pipeline, PreprocessingMode};
