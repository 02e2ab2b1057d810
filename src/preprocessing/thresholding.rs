//! # Image Thresholding Module
//!
//! This module provides binary thresholding functionality for OCR preprocessing.
//! It includes luminance conversion and Otsu's method for automatic threshold selection.

use image::{DynamicImage, GrayImage, Luma};
use tracing;

use super::types::{PreprocessingError, ThresholdedImageResult};

/// Threshold used when the histogram has no variance to split.
pub const DEGENERATE_FALLBACK_THRESHOLD: u8 = 0;

/// Converts a raster to single-channel luminance.
///
/// Gray rasters are returned as-is. Color rasters use the ITU-R BT.601
/// weights `0.299 R + 0.587 G + 0.114 B`, rounded to the nearest integer.
/// Any other layout (alpha, 16-bit) is first converted to 8-bit RGB.
pub fn to_luminance(image: &DynamicImage) -> GrayImage {
    if let DynamicImage::ImageLuma8(gray) = image {
        return gray.clone();
    }

    let rgb = image.to_rgb8();
    let mut gray = GrayImage::new(rgb.width(), rgb.height());
    for (x, y, pixel) in rgb.enumerate_pixels() {
        let [r, g, b] = pixel.0;
        let luminance = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
        gray.put_pixel(x, y, Luma([luminance.round().clamp(0.0, 255.0) as u8]));
    }
    gray
}

/// Converts 16-bit and float rasters to the 8-bit layout with the same
/// channels. 8-bit rasters are returned as a copy.
pub fn to_eight_bit(image: &DynamicImage) -> DynamicImage {
    match (image.color().channel_count(), image.color().has_alpha()) {
        (1, _) => DynamicImage::ImageLuma8(image.to_luma8()),
        (2, _) => DynamicImage::ImageLumaA8(image.to_luma_alpha8()),
        (_, true) => DynamicImage::ImageRgba8(image.to_rgba8()),
        _ => DynamicImage::ImageRgb8(image.to_rgb8()),
    }
}

/// Applies Otsu's thresholding algorithm to convert an image to binary (black/white).
///
/// The threshold maximizes the between-class variance of the intensity
/// histogram; samples strictly above it become 255 and all others 0. A page of
/// one constant intensity has no variance to split, so threshold 0 is used
/// instead: black stays black and every other intensity becomes white.
///
/// # Arguments
///
/// * `image` - The input image to threshold (gray or color)
///
/// # Returns
///
/// Returns a `Result` containing the thresholded image and metadata, or a `PreprocessingError`
///
/// # Examples
///
/// ```no_run
/// use ocr_prep::preprocessing::apply_otsu_threshold;
/// use image::open;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let img = open("page_0000.png")?;
/// let thresholded = apply_otsu_threshold(&img)?;
/// println!("Optimal threshold: {}", thresholded.threshold);
/// # Ok(())
/// # }
/// ```
pub fn apply_otsu_threshold(
    image: &DynamicImage,
) -> Result<ThresholdedImageResult, PreprocessingError> {
    let start_time = std::time::Instant::now();

    if image.width() == 0 || image.height() == 0 {
        return Err(PreprocessingError::EmptyImage);
    }

    let gray = to_luminance(image);
    let histogram = compute_histogram(&gray);

    let (threshold, degenerate) = match find_otsu_threshold(&histogram) {
        Ok(threshold) => (threshold, false),
        Err(PreprocessingError::DegenerateHistogram { intensity }) => {
            tracing::debug!(
                target: "ocr_preprocessing",
                "Constant page (intensity {}), falling back to threshold {}",
                intensity,
                DEGENERATE_FALLBACK_THRESHOLD
            );
            (DEGENERATE_FALLBACK_THRESHOLD, true)
        }
        Err(other) => return Err(other),
    };

    let binary_img = apply_binary_threshold(&gray, threshold);

    let processing_time = start_time.elapsed();

    tracing::debug!(
        target: "ocr_preprocessing",
        "Otsu thresholding completed in {:.2}ms: threshold={}, degenerate={}, dimensions={}x{}",
        processing_time.as_millis(),
        threshold,
        degenerate,
        gray.width(),
        gray.height()
    );

    Ok(ThresholdedImageResult {
        image: DynamicImage::ImageLuma8(binary_img),
        threshold,
        degenerate,
        processing_time_ms: processing_time.as_millis() as u32,
    })
}

/// Maps every sample above `threshold` to 255 and the rest to 0.
pub fn apply_binary_threshold(gray: &GrayImage, threshold: u8) -> GrayImage {
    let mut binary_img = GrayImage::new(gray.width(), gray.height());
    for (x, y, pixel) in gray.enumerate_pixels() {
        let binary_value = if pixel[0] > threshold { 255u8 } else { 0u8 };
        binary_img.put_pixel(x, y, Luma([binary_value]));
    }
    binary_img
}

/// Builds the 256-bucket intensity histogram of a gray raster.
pub fn compute_histogram(gray: &GrayImage) -> [u64; 256] {
    let mut histogram = [0u64; 256];
    for pixel in gray.pixels() {
        histogram[pixel[0] as usize] += 1;
    }
    histogram
}

/// Finds the optimal threshold using Otsu's method by maximizing between-class variance.
///
/// The background class holds intensities `<= t`, the foreground `> t`. Splits
/// that leave a class empty are skipped and the first strict maximum wins.
///
/// # Errors
///
/// Returns `PreprocessingError::DegenerateHistogram` when no split has a
/// positive variance (a single populated bucket), and
/// `PreprocessingError::EmptyImage` for an all-zero histogram.
pub fn find_otsu_threshold(histogram: &[u64; 256]) -> Result<u8, PreprocessingError> {
    let total_pixels: u64 = histogram.iter().sum();
    if total_pixels == 0 {
        return Err(PreprocessingError::EmptyImage);
    }

    let total_weighted_sum: f64 = histogram
        .iter()
        .enumerate()
        .map(|(intensity, &count)| intensity as f64 * count as f64)
        .sum();

    let mut background_count = 0u64;
    let mut background_weighted_sum = 0f64;
    let mut max_variance = 0f64;
    let mut optimal_threshold: Option<u8> = None;

    for (threshold, &count) in histogram.iter().enumerate() {
        background_count += count;
        background_weighted_sum += threshold as f64 * count as f64;

        let foreground_count = total_pixels - background_count;
        if background_count == 0 || foreground_count == 0 {
            continue;
        }

        let w0 = background_count as f64 / total_pixels as f64;
        let w1 = foreground_count as f64 / total_pixels as f64;
        let mu0 = background_weighted_sum / background_count as f64;
        let mu1 = (total_weighted_sum - background_weighted_sum) / foreground_count as f64;

        let variance = w0 * w1 * (mu0 - mu1).powi(2);
        if variance > max_variance {
            max_variance = variance;
            optimal_threshold = Some(threshold as u8);
        }
    }

    match optimal_threshold {
        Some(threshold) => Ok(threshold),
        None => {
            let intensity = histogram
                .iter()
                .position(|&count| count > 0)
                .unwrap_or_default() as u8;
            Err(PreprocessingError::DegenerateHistogram { intensity })
        }
    }
}
