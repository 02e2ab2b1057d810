//! # Image Filtering Module
//!
//! This module provides morphological operations for cleaning binarized pages
//! and the median blur used by the light preprocessing mode. Bright pixels are
//! foreground; erosion shrinks them and dilation grows them.

use image::{DynamicImage, GrayImage, Luma};
use imageproc::filter::median_filter;
use tracing;

use super::thresholding::to_luminance;
use super::types::{
    BlurredImageResult, MorphologicalImageResult, MorphologicalOperation, PreprocessingError,
    StructuringElement,
};

/// Applies morphological operations to clean up binary images.
///
/// Erosion, dilation, opening (erode then dilate) and closing (dilate then
/// erode) are supported. Neighborhoods are clipped at the image border, so
/// border pixels only see their in-bounds neighbors.
///
/// # Arguments
///
/// * `image` - The input binary image to process
/// * `operation` - The morphological operation to apply
/// * `element` - Structuring element, usually `StructuringElement::RECT_3X3`
///
/// # Returns
///
/// Returns a `Result` containing the processed image and metadata, or a `PreprocessingError`
///
/// # Examples
///
/// ```no_run
/// use ocr_prep::preprocessing::{
///     apply_morphological_operation, MorphologicalOperation, StructuringElement,
/// };
/// use image::open;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let img = open("page_0000.png")?;
/// let cleaned = apply_morphological_operation(
///     &img,
///     MorphologicalOperation::Opening,
///     &StructuringElement::RECT_3X3,
/// )?;
/// // cleaned.image has isolated specks removed
/// # Ok(())
/// # }
/// ```
pub fn apply_morphological_operation(
    image: &DynamicImage,
    operation: MorphologicalOperation,
    element: &StructuringElement,
) -> Result<MorphologicalImageResult, PreprocessingError> {
    let start_time = std::time::Instant::now();

    if image.width() == 0 || image.height() == 0 {
        return Err(PreprocessingError::EmptyImage);
    }

    let gray = to_luminance(image);

    let processed = match operation {
        MorphologicalOperation::Erosion => erode(&gray, element),
        MorphologicalOperation::Dilation => dilate(&gray, element),
        MorphologicalOperation::Opening => dilate(&erode(&gray, element), element),
        MorphologicalOperation::Closing => erode(&dilate(&gray, element), element),
    };

    let processing_time = start_time.elapsed();

    tracing::debug!(
        target: "ocr_preprocessing",
        "Morphological operation completed in {:.2}ms: operation={:?}, dimensions={}x{}",
        processing_time.as_millis(),
        operation,
        processed.width(),
        processed.height()
    );

    Ok(MorphologicalImageResult {
        image: DynamicImage::ImageLuma8(processed),
        operation,
        kernel_size: element.size(),
        processing_time_ms: processing_time.as_millis() as u32,
    })
}

/// Minimum over the structuring element's in-bounds neighborhood.
pub fn erode(image: &GrayImage, element: &StructuringElement) -> GrayImage {
    neighborhood_filter(image, element, u8::MAX, u8::min)
}

/// Maximum over the structuring element's in-bounds neighborhood.
pub fn dilate(image: &GrayImage, element: &StructuringElement) -> GrayImage {
    neighborhood_filter(image, element, u8::MIN, u8::max)
}

fn neighborhood_filter(
    image: &GrayImage,
    element: &StructuringElement,
    identity: u8,
    combine: fn(u8, u8) -> u8,
) -> GrayImage {
    let (width, height) = image.dimensions();
    let offsets: Vec<(i32, i32)> = element.offsets().collect();

    GrayImage::from_fn(width, height, |x, y| {
        let value = offsets.iter().fold(identity, |acc, &(dx, dy)| {
            let nx = x as i32 + dx;
            let ny = y as i32 + dy;
            if nx < 0 || ny < 0 || nx >= width as i32 || ny >= height as i32 {
                acc
            } else {
                combine(acc, image.get_pixel(nx as u32, ny as u32)[0])
            }
        });
        Luma([value])
    })
}

/// Applies a 3x3 median blur to a gray version of the image.
///
/// Used by the light preprocessing mode in place of the full stage sequence.
pub fn median_blur(image: &DynamicImage) -> Result<BlurredImageResult, PreprocessingError> {
    let start_time = std::time::Instant::now();

    if image.width() == 0 || image.height() == 0 {
        return Err(PreprocessingError::EmptyImage);
    }

    let gray = to_luminance(image);
    let blurred = median_filter(&gray, 1, 1);

    let processing_time = start_time.elapsed();

    tracing::debug!(
        target: "ocr_preprocessing",
        "Median blur completed in {:.2}ms: dimensions={}x{}",
        processing_time.as_millis(),
        blurred.width(),
        blurred.height()
    );

    Ok(BlurredImageResult {
        image: DynamicImage::ImageLuma8(blurred),
        radius: 1,
        processing_time_ms: processing_time.as_millis() as u32,
    })
}
