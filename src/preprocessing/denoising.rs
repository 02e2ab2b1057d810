//! # Non-Local Means Denoising Module
//!
//! Every output pixel is a weighted average of the pixels in a square search
//! window around it. The weight of a candidate is `exp(-d / h²)`, where `d` is
//! the mean squared difference between the patch around the pixel and the
//! patch around the candidate. Patch distances for one search offset are read
//! from a single integral image of squared differences, so the cost per offset
//! is linear in the number of pixels.

use image::{DynamicImage, ImageBuffer, Pixel};
use rayon::prelude::*;
use tracing;

use super::thresholding::to_eight_bit;
use super::types::{DenoisedImageResult, NlMeansParams, PreprocessingError};

/// Applies non-local means denoising to a gray or color page.
///
/// Gray rasters are filtered with `filter_strength` and stay gray. Color
/// rasters are filtered jointly with `color_strength`: one weight per
/// candidate, from the squared difference averaged over the channels. The
/// channel layout is kept (alpha is filtered with the other channels) and
/// 16-bit or float samples come back as 8-bit. Image borders are handled by
/// replicating edge pixels.
///
/// # Arguments
///
/// * `image` - The input image to denoise
/// * `params` - Filter strengths and window sizes
///
/// # Returns
///
/// Returns a `Result` containing the denoised image and metadata, or a `PreprocessingError`
///
/// # Examples
///
/// ```no_run
/// use ocr_prep::preprocessing::{denoise_nl_means, NlMeansParams};
/// use image::open;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let img = open("page_0000.png")?;
/// let denoised = denoise_nl_means(&img, &NlMeansParams::default())?;
/// # Ok(())
/// # }
/// ```
pub fn denoise_nl_means(
    image: &DynamicImage,
    params: &NlMeansParams,
) -> Result<DenoisedImageResult, PreprocessingError> {
    params.validate()?;

    let start_time = std::time::Instant::now();

    if image.width() == 0 || image.height() == 0 {
        return Err(PreprocessingError::EmptyImage);
    }

    let denoised = match image {
        DynamicImage::ImageLuma8(gray) => {
            DynamicImage::ImageLuma8(denoise_buffer(gray, params.filter_strength, params))
        }
        DynamicImage::ImageRgb8(rgb) => {
            DynamicImage::ImageRgb8(denoise_buffer(rgb, params.color_strength, params))
        }
        DynamicImage::ImageLumaA8(gray_alpha) => {
            DynamicImage::ImageLumaA8(denoise_buffer(gray_alpha, params.filter_strength, params))
        }
        DynamicImage::ImageRgba8(rgba) => {
            DynamicImage::ImageRgba8(denoise_buffer(rgba, params.color_strength, params))
        }
        other => return denoise_nl_means(&to_eight_bit(other), params),
    };

    let processing_time = start_time.elapsed();

    tracing::debug!(
        target: "ocr_preprocessing",
        "Non-local means completed in {:.2}ms: h={:.1}, template={}, search={}, dimensions={}x{}",
        processing_time.as_millis(),
        params.filter_strength,
        params.template_window,
        params.search_window,
        denoised.width(),
        denoised.height()
    );

    Ok(DenoisedImageResult {
        image: denoised,
        params: *params,
        processing_time_ms: processing_time.as_millis() as u32,
    })
}

fn denoise_buffer<P>(
    input: &ImageBuffer<P, Vec<u8>>,
    strength: f32,
    params: &NlMeansParams,
) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8>,
{
    let (width, height) = input.dimensions();
    let channels = P::CHANNEL_COUNT as usize;
    let raw = nl_means(
        input.as_raw(),
        width as usize,
        height as usize,
        channels,
        strength,
        params,
    );

    // Sizes match by construction
    ImageBuffer::from_raw(width, height, raw).unwrap_or_else(|| input.clone())
}

/// Source samples surrounded by a replicated border of `pad` pixels.
struct PaddedPlane {
    data: Vec<f32>,
    width: usize,
    channels: usize,
}

impl PaddedPlane {
    fn new(raw: &[u8], width: usize, height: usize, channels: usize, pad: usize) -> Self {
        let padded_width = width + 2 * pad;
        let padded_height = height + 2 * pad;
        let mut data = Vec::with_capacity(padded_width * padded_height * channels);

        for py in 0..padded_height {
            let sy = py.saturating_sub(pad).min(height - 1);
            for px in 0..padded_width {
                let sx = px.saturating_sub(pad).min(width - 1);
                let offset = (sy * width + sx) * channels;
                data.extend(raw[offset..offset + channels].iter().map(|&v| v as f32));
            }
        }

        Self {
            data,
            width: padded_width,
            channels,
        }
    }

    fn sample(&self, x: usize, y: usize) -> &[f32] {
        let offset = (y * self.width + x) * self.channels;
        &self.data[offset..offset + self.channels]
    }
}

fn nl_means(
    raw: &[u8],
    width: usize,
    height: usize,
    channels: usize,
    strength: f32,
    params: &NlMeansParams,
) -> Vec<u8> {
    let template = params.template_window as usize;
    let half_template = template / 2;
    let half_search = (params.search_window / 2) as isize;
    let pad = half_template + half_search as usize;

    let padded = PaddedPlane::new(raw, width, height, channels, pad);

    // Patch distances are needed for every pixel within half_template of the image
    let region_width = width + 2 * half_template;
    let region_height = height + 2 * half_template;
    let stride = region_width + 1;

    let mut integral = vec![0f64; stride * (region_height + 1)];
    let mut weight_sums = vec![0f64; width * height];
    let mut value_sums = vec![0f64; width * height * channels];

    let patch_area = (template * template) as f64;
    let h_squared = (strength as f64).powi(2);

    for dy in -half_search..=half_search {
        for dx in -half_search..=half_search {
            // Integral image of squared differences for this offset
            for ry in 0..region_height {
                let mut row_sum = 0f64;
                let py = ry + half_search as usize;
                let qy = (py as isize + dy) as usize;
                for rx in 0..region_width {
                    let px = rx + half_search as usize;
                    let qx = (px as isize + dx) as usize;
                    let diff: f32 = padded
                        .sample(px, py)
                        .iter()
                        .zip(padded.sample(qx, qy))
                        .map(|(a, b)| (a - b) * (a - b))
                        .sum();
                    row_sum += diff as f64 / channels as f64;
                    integral[(ry + 1) * stride + rx + 1] = integral[ry * stride + rx + 1] + row_sum;
                }
            }

            let integral = &integral;
            let padded = &padded;
            weight_sums
                .par_chunks_mut(width)
                .zip(value_sums.par_chunks_mut(width * channels))
                .enumerate()
                .for_each(|(y, (weights, values))| {
                    for x in 0..width {
                        let x1 = x + template;
                        let y1 = y + template;
                        let patch_sum = integral[y1 * stride + x1] - integral[y * stride + x1]
                            - integral[y1 * stride + x]
                            + integral[y * stride + x];
                        let distance = (patch_sum / patch_area).max(0.0);
                        let weight = (-distance / h_squared).exp();

                        let nx = (x as isize + pad as isize + dx) as usize;
                        let ny = (y as isize + pad as isize + dy) as usize;
                        let neighbor = padded.sample(nx, ny);

                        weights[x] += weight;
                        for c in 0..channels {
                            values[x * channels + c] += weight * neighbor[c] as f64;
                        }
                    }
                });
        }
    }

    value_sums
        .iter()
        .enumerate()
        .map(|(i, &value)| {
            let weight = weight_sums[i / channels];
            (value / weight).round().clamp(0.0, 255.0) as u8
        })
        .collect()
}
