//! # Shared Types for Image Preprocessing
//!
//! This module contains all the shared types, structs, and enums used across
//! the preprocessing sub-modules.

use image::DynamicImage;

/// Errors that can occur during image preprocessing operations.
///
/// `NoSkewSignal` and `DegenerateHistogram` are raised by the estimators and
/// recovered by the stage that owns them; they only escape when a caller uses
/// the estimator directly.
#[derive(Debug, Clone, PartialEq)]
pub enum PreprocessingError {
    /// A tunable parameter is outside its valid range
    InvalidParameter { name: &'static str, message: String },
    /// The raster has no pixels
    EmptyImage,
    /// No line segments were found while estimating skew
    NoSkewSignal,
    /// The intensity histogram has zero variance (constant page)
    DegenerateHistogram { intensity: u8 },
}

impl std::fmt::Display for PreprocessingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PreprocessingError::InvalidParameter { name, message } => {
                write!(f, "Invalid parameter '{}': {}", name, message)
            }
            PreprocessingError::EmptyImage => write!(f, "Image has no pixels"),
            PreprocessingError::NoSkewSignal => {
                write!(f, "No line segments detected, skew cannot be estimated")
            }
            PreprocessingError::DegenerateHistogram { intensity } => {
                write!(
                    f,
                    "Histogram has zero variance (every pixel is {})",
                    intensity
                )
            }
        }
    }
}

impl std::error::Error for PreprocessingError {}

/// Result of a longer-side scaling operation.
#[derive(Debug, Clone)]
pub struct ScaledImageResult {
    /// The scaled image
    pub image: DynamicImage,
    /// Original image dimensions (width, height)
    pub original_dimensions: (u32, u32),
    /// New image dimensions (width, height)
    pub new_dimensions: (u32, u32),
    /// Scale factor applied (never above 1.0)
    pub scale_factor: f32,
    /// Processing time in milliseconds
    pub processing_time_ms: u32,
}

/// Result of image thresholding operation.
#[derive(Debug, Clone)]
pub struct ThresholdedImageResult {
    /// The thresholded binary image
    pub image: DynamicImage,
    /// Optimal threshold value found by Otsu's method
    pub threshold: u8,
    /// True when the histogram had zero variance and threshold 0 was used
    pub degenerate: bool,
    /// Processing time in milliseconds
    pub processing_time_ms: u32,
}

/// Result of non-local means denoising.
#[derive(Debug, Clone)]
pub struct DenoisedImageResult {
    /// The denoised image
    pub image: DynamicImage,
    /// Parameters the filter ran with
    pub params: NlMeansParams,
    /// Processing time in milliseconds
    pub processing_time_ms: u32,
}

/// Result of a median blur.
#[derive(Debug, Clone)]
pub struct BlurredImageResult {
    /// The blurred image
    pub image: DynamicImage,
    /// Kernel radius (1 for a 3x3 window)
    pub radius: u32,
    /// Processing time in milliseconds
    pub processing_time_ms: u32,
}

/// Result of morphological operations on binary images.
#[derive(Debug, Clone)]
pub struct MorphologicalImageResult {
    /// The morphologically processed image
    pub image: DynamicImage,
    /// Type of morphological operation applied
    pub operation: MorphologicalOperation,
    /// Kernel size used (e.g., 3 for 3x3 kernel)
    pub kernel_size: u32,
    /// Processing time in milliseconds
    pub processing_time_ms: u32,
}

/// Types of morphological operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MorphologicalOperation {
    /// Erosion operation (shrinks bright regions)
    Erosion,
    /// Dilation operation (expands bright regions)
    Dilation,
    /// Opening operation (erosion followed by dilation - removes noise)
    Opening,
    /// Closing operation (dilation followed by erosion - fills gaps)
    Closing,
}

/// Result of deskewing operation.
#[derive(Debug, Clone)]
pub struct DeskewResult {
    /// The deskewed image, same dimensions as the input
    pub image: DynamicImage,
    /// Detected skew angle in degrees (0.0 when no segments were found)
    pub skew_angle_degrees: f32,
    /// Number of line segments the estimate was taken from
    pub segment_count: usize,
    /// Whether a rotation was actually applied
    pub rotated: bool,
    /// Processing time in milliseconds
    pub processing_time_ms: u32,
}

/// A detected line segment with integer endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSegment {
    pub start: (i32, i32),
    pub end: (i32, i32),
}

impl LineSegment {
    pub fn new(start: (i32, i32), end: (i32, i32)) -> Self {
        Self { start, end }
    }

    /// Angle of the segment in degrees, `atan2(dy, dx)` with the endpoints
    /// ordered left to right so the result lies in `[-90, 90]`.
    pub fn angle_degrees(&self) -> f64 {
        let (start, end) = if self.end.0 < self.start.0 {
            (self.end, self.start)
        } else {
            (self.start, self.end)
        };
        let dx = (end.0 - start.0) as f64;
        let dy = (end.1 - start.1) as f64;
        dy.atan2(dx).to_degrees()
    }
}

/// Square structuring element shared by erosion and dilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructuringElement {
    mask: [[bool; 3]; 3],
}

impl StructuringElement {
    /// The 3x3 all-ones kernel.
    pub const RECT_3X3: StructuringElement = StructuringElement {
        mask: [[true; 3]; 3],
    };

    pub const fn size(&self) -> u32 {
        3
    }

    /// Offsets `(dx, dy)` of the active kernel cells relative to the anchor.
    pub fn offsets(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        self.mask.iter().enumerate().flat_map(|(row, cells)| {
            cells
                .iter()
                .enumerate()
                .filter(|(_, active)| **active)
                .map(move |(col, _)| (col as i32 - 1, row as i32 - 1))
        })
    }
}

/// Tunable parameters for non-local means denoising.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NlMeansParams {
    /// Filter strength for luminance; higher removes more noise and detail
    pub filter_strength: f32,
    /// Filter strength used for color rasters
    pub color_strength: f32,
    /// Side of the square patch compared between pixels (odd)
    pub template_window: u32,
    /// Side of the square area searched for similar patches (odd)
    pub search_window: u32,
}

impl Default for NlMeansParams {
    fn default() -> Self {
        Self {
            filter_strength: 10.0,
            color_strength: 10.0,
            template_window: 7,
            search_window: 21,
        }
    }
}

impl NlMeansParams {
    /// Validate window sizes and strengths.
    pub fn validate(&self) -> Result<(), PreprocessingError> {
        if self.filter_strength <= 0.0 || !self.filter_strength.is_finite() {
            return Err(PreprocessingError::InvalidParameter {
                name: "filter_strength",
                message: format!("must be a positive number, got {}", self.filter_strength),
            });
        }
        if self.color_strength <= 0.0 || !self.color_strength.is_finite() {
            return Err(PreprocessingError::InvalidParameter {
                name: "color_strength",
                message: format!("must be a positive number, got {}", self.color_strength),
            });
        }
        if self.template_window == 0 || self.template_window % 2 == 0 {
            return Err(PreprocessingError::InvalidParameter {
                name: "template_window",
                message: format!("must be odd, got {}", self.template_window),
            });
        }
        if self.search_window == 0 || self.search_window % 2 == 0 {
            return Err(PreprocessingError::InvalidParameter {
                name: "search_window",
                message: format!("must be odd, got {}", self.search_window),
            });
        }
        if self.search_window < self.template_window {
            return Err(PreprocessingError::InvalidParameter {
                name: "search_window",
                message: format!(
                    "must be at least the template window ({}), got {}",
                    self.template_window, self.search_window
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_angle_is_order_independent() {
        let forward = LineSegment::new((0, 0), (100, -10));
        let backward = LineSegment::new((100, -10), (0, 0));
        assert!((forward.angle_degrees() - backward.angle_degrees()).abs() < 1e-9);
        assert!(forward.angle_degrees() < 0.0);
    }

    #[test]
    fn test_structuring_element_has_nine_offsets() {
        let offsets: Vec<_> = StructuringElement::RECT_3X3.offsets().collect();
        assert_eq!(offsets.len(), 9);
        assert!(offsets.contains(&(-1, -1)));
        assert!(offsets.contains(&(1, 1)));
    }

    #[test]
    fn test_nl_means_params_validation() {
        assert!(NlMeansParams::default().validate().is_ok());

        let even_template = NlMeansParams {
            template_window: 6,
            ..Default::default()
        };
        assert!(even_template.validate().is_err());

        let small_search = NlMeansParams {
            search_window: 5,
            ..Default::default()
        };
        assert!(small_search.validate().is_err());

        let zero_strength = NlMeansParams {
            filter_strength: 0.0,
            ..Default::default()
        };
        assert!(zero_strength.validate().is_err());
    }
}
