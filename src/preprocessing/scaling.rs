//! # Image Scaling Module
//!
//! Caps the longer side of a page raster so later stages run on a bounded
//! number of pixels. Rasters are only ever shrunk.

use image::{imageops::FilterType, DynamicImage, GenericImageView};

use super::types::{PreprocessingError, ScaledImageResult};

/// Configuration for image scaling operations.
#[derive(Debug, Clone)]
pub struct ImageScaler {
    /// Longest allowed side in pixels after scaling.
    max_dimension: u32,
}

impl ImageScaler {
    /// Default cap on the longer side.
    pub const DEFAULT_MAX_DIMENSION: u32 = 1024;

    /// Creates a new ImageScaler with the default cap (1024 pixels).
    ///
    /// # Examples
    ///
    /// ```
    /// use ocr_prep::preprocessing::ImageScaler;
    ///
    /// let scaler = ImageScaler::new();
    /// assert_eq!(scaler.max_dimension(), 1024);
    /// ```
    pub fn new() -> Self {
        Self {
            max_dimension: Self::DEFAULT_MAX_DIMENSION,
        }
    }

    /// Creates a new ImageScaler with a custom cap.
    ///
    /// # Arguments
    ///
    /// * `max_dimension` - Longest allowed side in pixels, must be positive.
    ///
    /// # Examples
    ///
    /// ```
    /// use ocr_prep::preprocessing::ImageScaler;
    ///
    /// let scaler = ImageScaler::with_max_dimension(2048).unwrap();
    /// assert_eq!(scaler.max_dimension(), 2048);
    /// ```
    ///
    /// # Errors
    ///
    /// Returns `PreprocessingError::InvalidParameter` if the cap is zero.
    pub fn with_max_dimension(max_dimension: u32) -> Result<Self, PreprocessingError> {
        if max_dimension == 0 {
            return Err(PreprocessingError::InvalidParameter {
                name: "max_dimension",
                message: "must be greater than zero".to_string(),
            });
        }

        Ok(Self { max_dimension })
    }

    /// Returns the current cap on the longer side.
    pub fn max_dimension(&self) -> u32 {
        self.max_dimension
    }

    /// Computes the scale factor for a raster of the given size.
    ///
    /// `min(1, cap / max(width, height))`, so the factor never exceeds 1.
    pub fn scale_factor(&self, width: u32, height: u32) -> f64 {
        let longer_side = width.max(height);
        if longer_side == 0 {
            return 1.0;
        }
        (self.max_dimension as f64 / longer_side as f64).min(1.0)
    }

    /// Target dimensions for a raster, each side floored and at least 1.
    pub fn target_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        let longer_side = width.max(height);
        if longer_side <= self.max_dimension {
            return (width, height);
        }
        // Integer arithmetic so the longer side lands exactly on the cap
        let cap = self.max_dimension as u64;
        let shrink = |side: u32| ((side as u64 * cap / longer_side as u64) as u32).max(1);
        (shrink(width), shrink(height))
    }

    /// Scales an image so that its longer side does not exceed the cap.
    ///
    /// Rasters already within the cap are returned unchanged without
    /// resampling. Larger rasters are resampled with a Lanczos3 filter, which
    /// low-pass filters while shrinking.
    ///
    /// # Arguments
    ///
    /// * `image` - The input image to scale.
    ///
    /// # Returns
    ///
    /// Returns a `Result` containing the scaled image and metadata or a `PreprocessingError`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use ocr_prep::preprocessing::ImageScaler;
    /// use image::open;
    ///
    /// # fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let scaler = ImageScaler::new();
    /// let img = open("page_0000.png")?;
    /// let scaled = scaler.scale(&img)?;
    /// assert!(scaled.new_dimensions.0.max(scaled.new_dimensions.1) <= 1024);
    /// # Ok(())
    /// # }
    /// ```
    pub fn scale(&self, image: &DynamicImage) -> Result<ScaledImageResult, PreprocessingError> {
        let start_time = std::time::Instant::now();
        let (width, height) = image.dimensions();

        if width == 0 || height == 0 {
            return Err(PreprocessingError::EmptyImage);
        }

        let factor = self.scale_factor(width, height);
        let (new_width, new_height) = self.target_dimensions(width, height);

        let scaled = if (new_width, new_height) == (width, height) {
            image.clone()
        } else {
            resize_exact(image, new_width, new_height)
        };

        let processing_time = start_time.elapsed();

        tracing::debug!(
            target: "ocr_preprocessing",
            "Scaling completed in {:.2}ms: {}x{} -> {}x{} (factor {:.4})",
            processing_time.as_millis(),
            width,
            height,
            new_width,
            new_height,
            factor
        );

        Ok(ScaledImageResult {
            image: scaled,
            original_dimensions: (width, height),
            new_dimensions: (new_width, new_height),
            scale_factor: factor as f32,
            processing_time_ms: processing_time.as_millis() as u32,
        })
    }
}

impl Default for ImageScaler {
    fn default() -> Self {
        Self::new()
    }
}

/// Resizes to exact dimensions, keeping the channel layout of the input.
fn resize_exact(image: &DynamicImage, width: u32, height: u32) -> DynamicImage {
    match image {
        DynamicImage::ImageLuma8(gray) => DynamicImage::ImageLuma8(image::imageops::resize(
            gray,
            width,
            height,
            FilterType::Lanczos3,
        )),
        DynamicImage::ImageRgb8(rgb) => DynamicImage::ImageRgb8(image::imageops::resize(
            rgb,
            width,
            height,
            FilterType::Lanczos3,
        )),
        other => other.resize_exact(width, height, FilterType::Lanczos3),
    }
}
