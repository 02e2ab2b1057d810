//! # Image Deskewing Module
//!
//! This module provides text rotation detection and correction functionality.
//! Skew is measured from straight line segments found in the page's edge map,
//! and corrected by rotating the page about its center.

use image::{DynamicImage, GrayImage, ImageBuffer, Pixel};
use imageproc::edges::canny;
use tracing;

use super::line_segments::{detect_line_segments, HoughParams};
use super::thresholding::{to_eight_bit, to_luminance};
use super::types::{DeskewResult, PreprocessingError};

/// Estimates with a smaller magnitude than this are treated as no skew.
pub const SKEW_EPSILON_DEGREES: f32 = 0.1;

/// Keys coefficient of the bicubic kernel used when rotating.
const BICUBIC_A: f64 = -0.75;

/// Tunable parameters for skew estimation and correction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeskewOptions {
    /// Canny hysteresis threshold, used as both the low and the high bound
    pub edge_threshold: f32,
    /// Line segment detector parameters
    pub hough: HoughParams,
    /// Estimates below this magnitude (degrees) leave the page unrotated
    pub min_correction_degrees: f32,
}

impl Default for DeskewOptions {
    fn default() -> Self {
        Self {
            edge_threshold: 100.0,
            hough: HoughParams::default(),
            min_correction_degrees: SKEW_EPSILON_DEGREES,
        }
    }
}

/// Skew measured on a page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkewEstimate {
    /// Correction angle in degrees (positive rotates counter-clockwise)
    pub angle_degrees: f32,
    /// Number of segments the median was taken over
    pub segment_count: usize,
}

/// Detects and corrects text skew in an image using line segment analysis.
///
/// Pages without any detectable segment pass through unrotated with a skew
/// of 0, as do pages whose estimate is below `min_correction_degrees`. The
/// output always has the same dimensions and channel layout as the input;
/// 16-bit and float samples come back as 8-bit.
///
/// # Arguments
///
/// * `image` - The input image to deskew
/// * `options` - Edge and line detection parameters
///
/// # Returns
///
/// Returns a `Result` containing the deskew result or a `PreprocessingError`
///
/// # Examples
///
/// ```no_run
/// use ocr_prep::preprocessing::{deskew_image, DeskewOptions};
/// use image::open;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let img = open("page_0000.png")?;
/// let result = deskew_image(&img, &DeskewOptions::default())?;
/// println!("Detected skew: {:.2}°", result.skew_angle_degrees);
/// # Ok(())
/// # }
/// ```
pub fn deskew_image(
    image: &DynamicImage,
    options: &DeskewOptions,
) -> Result<DeskewResult, PreprocessingError> {
    let start_time = std::time::Instant::now();

    if image.width() == 0 || image.height() == 0 {
        return Err(PreprocessingError::EmptyImage);
    }

    let gray = to_luminance(image);

    let estimate = match estimate_skew_angle(&gray, options) {
        Ok(estimate) => estimate,
        Err(PreprocessingError::NoSkewSignal) => {
            tracing::debug!(
                target: "ocr_preprocessing",
                "No line segments found on {}x{} page, skipping deskewing",
                gray.width(),
                gray.height()
            );

            return Ok(DeskewResult {
                image: image.clone(),
                skew_angle_degrees: 0.0,
                segment_count: 0,
                rotated: false,
                processing_time_ms: start_time.elapsed().as_millis() as u32,
            });
        }
        Err(other) => return Err(other),
    };

    if estimate.angle_degrees.abs() < options.min_correction_degrees {
        tracing::debug!(
            target: "ocr_preprocessing",
            "Skew angle {:.2}° is below threshold, skipping deskewing",
            estimate.angle_degrees
        );

        return Ok(DeskewResult {
            image: image.clone(),
            skew_angle_degrees: estimate.angle_degrees,
            segment_count: estimate.segment_count,
            rotated: false,
            processing_time_ms: start_time.elapsed().as_millis() as u32,
        });
    }

    let rotated = rotate_about_center(image, estimate.angle_degrees);

    let processing_time = start_time.elapsed();

    tracing::debug!(
        target: "ocr_preprocessing",
        "Deskewing completed in {:.2}ms: corrected {:.2}° skew from {} segments",
        processing_time.as_millis(),
        estimate.angle_degrees,
        estimate.segment_count
    );

    Ok(DeskewResult {
        image: rotated,
        skew_angle_degrees: estimate.angle_degrees,
        segment_count: estimate.segment_count,
        rotated: true,
        processing_time_ms: processing_time.as_millis() as u32,
    })
}

/// Estimates the skew of a gray page.
///
/// 1. Canny edge map (thin, non-maximum suppressed edges)
/// 2. Line segments from the probabilistic Hough transform
/// 3. Median of the segment angles
/// 4. Estimates below -45° are folded to `-(90 + angle)`
///
/// # Errors
///
/// Returns `PreprocessingError::NoSkewSignal` when no segment is found.
pub fn estimate_skew_angle(
    gray: &GrayImage,
    options: &DeskewOptions,
) -> Result<SkewEstimate, PreprocessingError> {
    let edges = detect_edges(gray, options.edge_threshold);
    let segments = detect_line_segments(&edges, &options.hough)?;

    let angles: Vec<f64> = segments.iter().map(|s| s.angle_degrees()).collect();
    let median = median_angle(&angles).ok_or(PreprocessingError::NoSkewSignal)?;

    let corrected = if median < -45.0 {
        -(90.0 + median)
    } else {
        median
    };

    Ok(SkewEstimate {
        angle_degrees: corrected as f32,
        segment_count: segments.len(),
    })
}

/// Binary Canny edge map, 255 on edges, with `threshold` as both
/// hysteresis bounds.
/// Non-maximum suppression keeps edges one pixel wide.
pub fn detect_edges(gray: &GrayImage, threshold: f32) -> GrayImage {
    canny(gray, threshold, threshold)
}

/// Median of the angles, averaging the two middle values for even counts.
pub fn median_angle(angles: &[f64]) -> Option<f64> {
    if angles.is_empty() {
        return None;
    }

    let mut sorted = angles.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Rotates an image about its center, keeping its dimensions.
///
/// Positive angles rotate counter-clockwise as displayed. Every output pixel
/// is sampled from the source with bicubic interpolation; samples falling
/// outside the source replicate the nearest border pixel.
///
/// # Arguments
///
/// * `image` - The input image to rotate
/// * `angle_degrees` - Rotation angle in degrees (positive = counter-clockwise)
pub fn rotate_about_center(image: &DynamicImage, angle_degrees: f32) -> DynamicImage {
    match image {
        DynamicImage::ImageLuma8(gray) => {
            DynamicImage::ImageLuma8(rotate_buffer(gray, angle_degrees as f64))
        }
        DynamicImage::ImageRgb8(rgb) => {
            DynamicImage::ImageRgb8(rotate_buffer(rgb, angle_degrees as f64))
        }
        DynamicImage::ImageLumaA8(gray_alpha) => {
            DynamicImage::ImageLumaA8(rotate_buffer(gray_alpha, angle_degrees as f64))
        }
        DynamicImage::ImageRgba8(rgba) => {
            DynamicImage::ImageRgba8(rotate_buffer(rgba, angle_degrees as f64))
        }
        other => rotate_about_center(&to_eight_bit(other), angle_degrees),
    }
}

fn rotate_buffer<P>(
    input: &ImageBuffer<P, Vec<u8>>,
    angle_degrees: f64,
) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8>,
{
    let (width, height) = input.dimensions();
    let mut output = ImageBuffer::new(width, height);
    if width == 0 || height == 0 {
        return output;
    }

    let channels = P::CHANNEL_COUNT as usize;
    let center_x = (width / 2) as f64;
    let center_y = (height / 2) as f64;
    let (sin, cos) = angle_degrees.to_radians().sin_cos();
    let max_x = width as i64 - 1;
    let max_y = height as i64 - 1;
    let raw = input.as_raw();

    for (x, y, pixel) in output.enumerate_pixels_mut() {
        let dx = x as f64 - center_x;
        let dy = y as f64 - center_y;
        let src_x = cos * dx - sin * dy + center_x;
        let src_y = sin * dx + cos * dy + center_y;

        let base_x = src_x.floor();
        let base_y = src_y.floor();
        let weights_x = cubic_weights(src_x - base_x);
        let weights_y = cubic_weights(src_y - base_y);

        let mut accum = [0f64; 4];
        for (j, wy) in weights_y.iter().enumerate() {
            let sy = (base_y as i64 + j as i64 - 1).clamp(0, max_y) as usize;
            for (i, wx) in weights_x.iter().enumerate() {
                let sx = (base_x as i64 + i as i64 - 1).clamp(0, max_x) as usize;
                let offset = (sy * width as usize + sx) * channels;
                for (c, sum) in accum.iter_mut().take(channels).enumerate() {
                    *sum += wx * wy * raw[offset + c] as f64;
                }
            }
        }

        for (channel, sum) in pixel.channels_mut().iter_mut().zip(accum.iter()) {
            *channel = sum.round().clamp(0.0, 255.0) as u8;
        }
    }

    output
}

/// Bicubic weights for the four taps at offsets -1, 0, 1, 2.
fn cubic_weights(t: f64) -> [f64; 4] {
    let a = BICUBIC_A;
    let w0 = ((a * (t + 1.0) - 5.0 * a) * (t + 1.0) + 8.0 * a) * (t + 1.0) - 4.0 * a;
    let w1 = ((a + 2.0) * t - (a + 3.0)) * t * t + 1.0;
    let w2 = ((a + 2.0) * (1.0 - t) - (a + 3.0)) * (1.0 - t) * (1.0 - t) + 1.0;
    let w3 = 1.0 - w0 - w1 - w2;
    [w0, w1, w2, w3]
}
