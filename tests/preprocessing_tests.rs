//! # Preprocessing Tests Module
//!
//! Property tests of the individual preprocessing stages on synthetic pages.


#[cfg(test)]
mod tests {
    use super::test_helpers::*;
    use image::{DynamicImage, GrayImage, Luma};
    use ocr_prep::preprocessing::{
        apply_morphological_operation, apply_otsu_threshold, denoise_nl_means, deskew_image,
        estimate_skew_angle, DeskewOptions, ImageScaler, MorphologicalOperation, NlMeansParams,
        PreprocessingError, StructuringElement,
    };

    fn is_binary(image: &DynamicImage) -> bool {
        image.to_luma8().pixels().all(|p| p[0] == 0 || p[0] == 255)
    }

    fn mean_abs_difference(a: &GrayImage, b: &GrayImage) -> f64 {
        let total: u64 = a
            .pixels()
            .zip(b.pixels())
            .map(|(p, q)| (p[0] as i32 - q[0] as i32).unsigned_abs() as u64)
            .sum();
        total as f64 / (a.width() * a.height()) as f64
    }

    /// Binarizer output is strictly 0/255 with unchanged dimensions
    #[test]
    fn test_binarizer_output_is_binary() {
        let color = noisy_color_page(PAGE_WIDTH, PAGE_HEIGHT, 3.0, 7);
        let result = apply_otsu_threshold(&color).unwrap();
        assert!(is_binary(&result.image));
        assert_eq!(
            (result.image.width(), result.image.height()),
            (PAGE_WIDTH, PAGE_HEIGHT)
        );
        assert!(result.threshold > 20 && result.threshold < 235);
        assert!(!result.degenerate);
    }

    /// A constant page is degenerate but still binarized
    #[test]
    fn test_binarizer_constant_page() {
        for intensity in [0u8, 90, 255] {
            let page = DynamicImage::ImageLuma8(GrayImage::from_pixel(40, 30, Luma([intensity])));
            let result = apply_otsu_threshold(&page).unwrap();
            assert!(result.degenerate);
            assert!(is_binary(&result.image));
            assert_eq!((result.image.width(), result.image.height()), (40, 30));
        }
    }

    /// Scaling never enlarges and keeps the aspect ratio within a pixel
    #[test]
    fn test_scaler_properties() {
        let scaler = ImageScaler::new();
        for (width, height) in [(2480, 3508), (3508, 2480), (1025, 10), (1024, 1024), (300, 200)] {
            let page = DynamicImage::ImageLuma8(GrayImage::new(width, height));
            let result = scaler.scale(&page).unwrap();
            let (new_width, new_height) = result.new_dimensions;

            assert!(new_width <= width && new_height <= height);
            assert_eq!(new_width.max(new_height), width.max(height).min(1024));

            let factor = (1024.0 / width.max(height) as f64).min(1.0);
            let exact = (width as f64 * factor, height as f64 * factor);
            assert!(
                (new_width as f64 - exact.0).abs() <= 1.0 && (new_height as f64 - exact.1).abs() <= 1.0,
                "{}x{} scaled to {}x{}",
                width,
                height,
                new_width,
                new_height
            );
        }
    }

    /// Pages within the cap come back untouched
    #[test]
    fn test_scaler_leaves_small_pages_unchanged() {
        let page = DynamicImage::ImageLuma8(rotated_bars_page(PAGE_WIDTH, PAGE_HEIGHT, 0.0));
        let result = ImageScaler::new().scale(&page).unwrap();
        assert_eq!(result.image.to_luma8(), page.to_luma8());
        assert_eq!(result.scale_factor, 1.0);
    }

    /// A straight page is measured flat and left alone
    #[test]
    fn test_deskew_horizontal_page_unchanged() {
        let page = DynamicImage::ImageLuma8(rotated_bars_page(PAGE_WIDTH, PAGE_HEIGHT, 0.0));
        let result = deskew_image(&page, &DeskewOptions::default()).unwrap();
        assert!(result.segment_count > 0);
        assert!(!result.rotated);
        assert_eq!(result.image.to_luma8(), page.to_luma8());
    }

    /// A page rotated by +5 degrees measures close to -5 degrees
    #[test]
    fn test_deskew_measures_rotated_page() {
        let page = DynamicImage::ImageLuma8(rotated_bars_page(PAGE_WIDTH, PAGE_HEIGHT, 5.0));
        let result = deskew_image(&page, &DeskewOptions::default()).unwrap();
        assert!(result.rotated);
        assert!(
            (result.skew_angle_degrees + 5.0).abs() < 1.0,
            "measured {}",
            result.skew_angle_degrees
        );

        let residual = estimate_skew_angle(&result.image.to_luma8(), &DeskewOptions::default())
            .unwrap()
            .angle_degrees;
        assert!(residual.abs() < 1.0, "residual skew {}", residual);
    }

    /// Full-size scans keep their skew signal after being scaled down to the cap
    #[test]
    fn test_deskew_after_scaling_full_size_page() {
        let scaler = ImageScaler::new();
        for (seed, angle) in [0.0, 5.0, -5.0, 10.0, -10.0].into_iter().enumerate() {
            let scan = noisy_color_page(A4_WIDTH, A4_HEIGHT, angle, seed as u64);
            let binary = apply_otsu_threshold(&scan).unwrap();
            let scaled = scaler.scale(&binary.image).unwrap();
            assert_eq!(scaled.new_dimensions.1, 1024);

            let result = deskew_image(&scaled.image, &DeskewOptions::default()).unwrap();
            assert!(
                (result.skew_angle_degrees + angle as f32).abs() < 1.0,
                "page rotated {} measured {}",
                angle,
                result.skew_angle_degrees
            );

            let residual = estimate_skew_angle(&result.image.to_luma8(), &DeskewOptions::default())
                .unwrap()
                .angle_degrees;
            assert!(residual.abs() < 1.0, "page rotated {} residual skew {}", angle, residual);
        }
    }

    /// A blank page has no skew signal and passes through
    #[test]
    fn test_deskew_blank_page() {
        let page = DynamicImage::ImageLuma8(GrayImage::from_pixel(200, 150, Luma([255])));
        let result = deskew_image(&page, &DeskewOptions::default()).unwrap();
        assert!(!result.rotated);
        assert_eq!(result.skew_angle_degrees, 0.0);
        assert_eq!(result.image.to_luma8(), page.to_luma8());

        assert_eq!(
            estimate_skew_angle(&page.to_luma8(), &DeskewOptions::default()),
            Err(PreprocessingError::NoSkewSignal)
        );
    }

    /// Opening removes an isolated speck and keeps a solid block
    #[test]
    fn test_opening_removes_specks_only() {
        let mut image = GrayImage::new(40, 40);
        image.put_pixel(5, 5, Luma([255]));
        for y in 20..30 {
            for x in 20..32 {
                image.put_pixel(x, y, Luma([255]));
            }
        }

        let result = apply_morphological_operation(
            &DynamicImage::ImageLuma8(image),
            MorphologicalOperation::Opening,
            &StructuringElement::RECT_3X3,
        )
        .unwrap();
        let opened = result.image.to_luma8();

        assert_eq!(opened.get_pixel(5, 5)[0], 0);
        let bright = opened.pixels().filter(|p| p[0] == 255).count();
        assert_eq!(bright, 10 * 12);
    }

    /// Erosion then dilation leaves a solid region larger than the kernel intact
    #[test]
    fn test_erode_then_dilate_keeps_area() {
        let image = GrayImage::from_fn(30, 30, |x, y| {
            if (8..20).contains(&x) && (10..16).contains(&y) {
                Luma([255])
            } else {
                Luma([0])
            }
        });
        let eroded = apply_morphological_operation(
            &DynamicImage::ImageLuma8(image.clone()),
            MorphologicalOperation::Erosion,
            &StructuringElement::RECT_3X3,
        )
        .unwrap();
        let dilated = apply_morphological_operation(
            &eroded.image,
            MorphologicalOperation::Dilation,
            &StructuringElement::RECT_3X3,
        )
        .unwrap();
        assert_eq!(dilated.image.to_luma8(), image);
    }

    /// A second non-local means pass changes the page less than the first
    #[test]
    fn test_nl_means_converges() {
        let params = NlMeansParams {
            template_window: 5,
            search_window: 11,
            ..NlMeansParams::default()
        };
        let noisy = noisy_gray_page(64, 48, 128, 20, 11);

        let first = denoise_nl_means(&DynamicImage::ImageLuma8(noisy.clone()), &params).unwrap();
        let second = denoise_nl_means(&first.image, &params).unwrap();

        let first_change = mean_abs_difference(&noisy, &first.image.to_luma8());
        let second_change = mean_abs_difference(&first.image.to_luma8(), &second.image.to_luma8());
        assert!(first_change > 0.0);
        assert!(
            second_change < first_change,
            "first pass {} second pass {}",
            first_change,
            second_change
        );
    }
}
