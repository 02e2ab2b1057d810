//! # Image Preprocessing Module
//!
//! This module provides the page preprocessing stages that run before text
//! recognition: binarization, scale normalization, skew detection and
//! correction, and denoising.
//!
//! The module is organized into focused sub-modules:
//! - `thresholding`: Luminance conversion and Otsu binarization
//! - `scaling`: Longer-side cap, never upscales
//! - `line_segments`: Probabilistic Hough line segment detection
//! - `deskewing`: Skew estimation and rotation about the page center
//! - `denoising`: Non-local means for gray and color pages
//! - `filtering`: Morphological operations and median blur
//! - `types`: Shared types and error definitions
//!
//! Every stage is a pure function over an in-memory raster.

pub mod denoising;
pub mod deskewing;
pub mod filtering;
pub mod line_segments;
pub mod scaling;
pub mod thresholding;
pub mod types;

// Re-export commonly used types and functions for convenience
pub use types::{
    BlurredImageResult, DenoisedImageResult, DeskewResult, LineSegment, MorphologicalImageResult,
    MorphologicalOperation, NlMeansParams, PreprocessingError, ScaledImageResult,
    StructuringElement, ThresholdedImageResult,
};

// Re-export main functions from sub-modules
pub use denoising::denoise_nl_means;
pub use deskewing::{
    deskew_image, estimate_skew_angle, rotate_about_center, DeskewOptions, SkewEstimate,
    SKEW_EPSILON_DEGREES,
};
pub use filtering::{apply_morphological_operation, dilate, erode, median_blur};
pub use line_segments::{detect_line_segments, HoughParams};
pub use scaling::ImageScaler;
pub use thresholding::{apply_otsu_threshold, to_luminance};
