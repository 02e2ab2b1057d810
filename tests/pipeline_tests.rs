//! # Pipeline Tests Module
//!
//! End-to-end runs of the stage driver over synthetic documents, including
//! workspace output, reruns from input rasters and recognition.


#[cfg(test)]
mod tests {
    use super::test_helpers::*;
    use image::DynamicImage;
    use ocr_prep::config::PipelineConfig;
    use ocr_prep::errors::PipelineError;
    use ocr_prep::pipeline::{
        recognize_pages, PageIndex, PageRaster, PageStage, Pipeline, PreprocessingMode,
        ProgressCallback,
    };
    use ocr_prep::preprocessing::{estimate_skew_angle, DeskewOptions, NlMeansParams};
    use ocr_prep::rasterizer::ImageFileRasterizer;
    use parking_lot::Mutex;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use tempfile::TempDir;

    const SKEW_TOLERANCE_DEGREES: f32 = 1.0;

    fn fast_config(mode: PreprocessingMode) -> PipelineConfig {
        PipelineConfig {
            mode,
            workers: 2,
            nl_means: NlMeansParams {
                template_window: 5,
                search_window: 11,
                ..NlMeansParams::default()
            },
            ..PipelineConfig::default()
        }
    }

    type StageSnapshots = Arc<Mutex<Vec<(PageStage, bool, Option<(u32, u32)>)>>>;

    /// Reads the dimensions of the first work raster whenever a stage completes
    struct WorkPageRecorder {
        work_page: PathBuf,
        snapshots: StageSnapshots,
    }

    impl ProgressCallback for WorkPageRecorder {
        fn on_stage_complete(&self, stage: PageStage, _page_count: usize, persisted: bool) {
            let dimensions = image::image_dimensions(&self.work_page).ok();
            self.snapshots.lock().push((stage, persisted, dimensions));
        }
    }

    fn recorded_full_run(persist_intermediate: bool) -> Vec<(PageStage, bool, Option<(u32, u32)>)> {
        let config = PipelineConfig {
            persist_intermediate,
            nl_means: NlMeansParams {
                template_window: 3,
                search_window: 5,
                ..NlMeansParams::default()
            },
            ..fast_config(PreprocessingMode::Full)
        };
        let page = DynamicImage::ImageLuma8(rotated_bars_page(1300, 700, 0.0));
        let output = TempDir::new().unwrap();
        let snapshots = StageSnapshots::default();
        let recorder = WorkPageRecorder {
            work_page: output.path().join("work").join("page_0000.png"),
            snapshots: Arc::clone(&snapshots),
        };

        pipeline_with_pages(config, vec![page])
            .with_progress(Box::new(recorder))
            .run(Path::new("scan.pdf"), output.path())
            .unwrap();

        let recorded = snapshots.lock().clone();
        recorded
    }

    fn pipeline_with_pages(config: PipelineConfig, pages: Vec<DynamicImage>) -> Pipeline {
        Pipeline::new(config, Box::new(MemoryRasterizer::new(pages))).unwrap()
    }

    /// Three pages rotated {0, 10, -10} degrees come out straight, in order
    #[test]
    fn test_full_mode_straightens_rotated_pages() {
        let angles = [0.0, 10.0, -10.0];
        let pages = angles
            .iter()
            .enumerate()
            .map(|(i, angle)| noisy_color_page(PAGE_WIDTH, PAGE_HEIGHT, *angle, i as u64))
            .collect();
        let pipeline = pipeline_with_pages(fast_config(PreprocessingMode::Full), pages);
        let output = TempDir::new().unwrap();

        let run = pipeline.run(Path::new("scan.pdf"), output.path()).unwrap();

        assert_eq!(run.pages.len(), 3);
        assert_eq!(run.manifest.page_count, 3);
        for (i, (page, angle)) in run.pages.iter().zip(angles).enumerate() {
            assert_eq!(page.index, PageIndex::new(i));
            assert_eq!(page.stage, PageStage::Done);
            assert_eq!(page.image.width().max(page.image.height()), PAGE_WIDTH.min(1024));
            assert!(matches!(page.image, DynamicImage::ImageLuma8(_)));

            let measured = page.skew_angle_degrees.unwrap();
            assert!(
                (measured + angle as f32).abs() < SKEW_TOLERANCE_DEGREES,
                "page {} rotated {} measured {}",
                i,
                angle,
                measured
            );

            let residual = estimate_skew_angle(&page.image.to_luma8(), &DeskewOptions::default())
                .unwrap()
                .angle_degrees;
            assert!(
                residual.abs() < SKEW_TOLERANCE_DEGREES,
                "page {} residual skew {}",
                i,
                residual
            );
        }
    }

    /// The output layout holds inputs, final rasters and the manifest
    #[test]
    fn test_run_writes_workspace_layout() {
        let pages = (0..3)
            .map(|i| noisy_color_page(200, 150, 0.0, i))
            .collect();
        let config = PipelineConfig {
            persist_intermediate: false,
            ..fast_config(PreprocessingMode::Threshold)
        };
        let pipeline = pipeline_with_pages(config, pages);
        let output = TempDir::new().unwrap();

        let run = pipeline.run(Path::new("scan.pdf"), output.path()).unwrap();

        let workspace = &run.workspace;
        for i in 0..3 {
            let index = PageIndex::new(i);
            assert!(workspace.input_page_path(index).is_file());
            // The last stage is always persisted
            let final_page = image::open(workspace.work_page_path(index)).unwrap();
            assert_eq!(final_page.to_luma8(), run.pages[i].image.to_luma8());
        }

        let manifest = workspace.read_manifest().unwrap();
        assert_eq!(manifest, run.manifest);
        assert_eq!(manifest.mode, PreprocessingMode::Threshold);
        assert_eq!(manifest.document, Path::new("scan.pdf"));
        assert!(manifest.pages.iter().all(|page| page.stage == PageStage::Done));
    }

    /// With intermediate persistence the work raster is rewritten after every stage
    #[test]
    fn test_intermediate_rasters_written_after_every_stage() {
        let snapshots = recorded_full_run(true);

        let stages: Vec<PageStage> = snapshots.iter().map(|(stage, _, _)| *stage).collect();
        assert_eq!(stages, PreprocessingMode::Full.stages().to_vec());
        assert!(snapshots.iter().all(|(_, persisted, _)| *persisted));

        // Binarized output is still full size, the scaled one is capped
        assert_eq!(snapshots[0], (PageStage::Binarized, true, Some((1300, 700))));
        assert_eq!(snapshots[1], (PageStage::Scaled, true, Some((1024, 551))));
        assert_eq!(snapshots[6].2, Some((1024, 551)));
    }

    /// Without it only the last stage reaches work/
    #[test]
    fn test_only_last_stage_written_without_intermediate() {
        let snapshots = recorded_full_run(false);

        let (last, earlier) = snapshots.split_last().unwrap();
        assert!(earlier.iter().all(|(_, persisted, dims)| !persisted && dims.is_none()));
        assert_eq!(*last, (PageStage::MorphDenoised, true, Some((1024, 551))));
    }

    /// A rerun reloads pages by index and applies the new mode
    #[test]
    fn test_rerun_from_input_rasters() {
        let pages = (0..2).map(|i| noisy_color_page(160, 120, 0.0, i)).collect();
        let output = TempDir::new().unwrap();
        pipeline_with_pages(fast_config(PreprocessingMode::Threshold), pages)
            .run(Path::new("book.pdf"), output.path())
            .unwrap();

        let blur = Pipeline::new(
            fast_config(PreprocessingMode::Blur),
            Box::new(ImageFileRasterizer),
        )
        .unwrap();
        let rerun = blur.rerun(output.path()).unwrap();

        assert_eq!(rerun.pages.len(), 2);
        assert_eq!(rerun.manifest.mode, PreprocessingMode::Blur);
        assert_eq!(rerun.manifest.document, Path::new("book.pdf"));
        assert_eq!(rerun.pages[1].index, PageIndex::new(1));
        assert!(rerun.pages.iter().all(|page| page.is_done()));
    }

    /// A missing input raster fails the rerun with its page index
    #[test]
    fn test_rerun_reports_missing_page() {
        let pages = (0..3).map(|i| noisy_color_page(80, 60, 0.0, i)).collect();
        let output = TempDir::new().unwrap();
        let run = pipeline_with_pages(fast_config(PreprocessingMode::Threshold), pages)
            .run(Path::new("book.pdf"), output.path())
            .unwrap();
        std::fs::remove_file(run.workspace.input_page_path(PageIndex::new(1))).unwrap();

        let pipeline = Pipeline::new(
            fast_config(PreprocessingMode::Threshold),
            Box::new(ImageFileRasterizer),
        )
        .unwrap();
        let err = pipeline.rerun(output.path()).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::RasterDecode {
                stage: PageStage::Rasterized,
                ..
            }
        ));
        assert_eq!(err.page(), Some(PageIndex::new(1)));
    }

    /// Pages above the cap are scaled to it on the longer side
    #[test]
    fn test_full_mode_caps_large_pages() {
        let config = PipelineConfig {
            nl_means: NlMeansParams {
                template_window: 3,
                search_window: 5,
                ..NlMeansParams::default()
            },
            ..fast_config(PreprocessingMode::Full)
        };
        let pipeline = pipeline_with_pages(config, Vec::new());

        let page = PageRaster::new(
            PageIndex::new(0),
            DynamicImage::ImageLuma8(rotated_bars_page(1300, 700, 0.0)),
        );
        let done = pipeline.process_pages(vec![page], None).unwrap();
        assert_eq!((done[0].image.width(), done[0].image.height()), (1024, 551));
    }

    /// Missing documents fail before any page work
    #[test]
    fn test_missing_document() {
        let output = TempDir::new().unwrap();
        let pipeline = Pipeline::new(
            fast_config(PreprocessingMode::Full),
            Box::new(ImageFileRasterizer),
        )
        .unwrap();

        let err = pipeline
            .run(Path::new("/nonexistent/scan.png"), output.path())
            .unwrap_err();
        assert!(matches!(err, PipelineError::DocumentRead { .. }));
        assert!(!output.path().join("work").join("manifest.json").exists());
    }

    /// Recognized text follows page order and lands in the workspace
    #[test]
    fn test_recognition_writes_text() {
        let pages = vec![
            noisy_color_page(120, 90, 0.0, 1),
            noisy_color_page(140, 90, 0.0, 2),
        ];
        let output = TempDir::new().unwrap();
        let run = pipeline_with_pages(fast_config(PreprocessingMode::Threshold), pages)
            .run(Path::new("scan.pdf"), output.path())
            .unwrap();

        let texts = recognize_pages(&run.pages, &SizeRecognizer).unwrap();
        assert_eq!(texts.len(), 2);
        assert!(texts[0].1.starts_with("120x90"));
        assert!(texts[1].1.starts_with("140x90"));

        run.workspace.write_text(&texts).unwrap();
        let document = std::fs::read_to_string(run.workspace.document_text_path()).unwrap();
        assert!(document.find("120x90").unwrap() < document.find("140x90").unwrap());

        let err = recognize_pages(&run.pages, &FailingRecognizer).unwrap_err();
        assert!(matches!(err, PipelineError::Recognition { .. }));
        assert_eq!(err.page(), Some(PageIndex::new(0)));
    }
}
