//! # Pipeline Driver
//!
//! Runs every page of a document through the preprocessing stages of the
//! configured mode. Each stage is a full pass over all pages on a bounded
//! rayon pool; the next stage starts only once every page has finished the
//! current one. Page order is carried by [`PageIndex`] and checked after every
//! stage.
//!
//! ```text
//! Rasterized → Binarized → Scaled → Deskewed → StatDenoised
//!            → Eroded → Dilated → MorphDenoised → Done
//! ```

pub mod manifest;
pub mod stage;

use std::path::Path;
use std::time::Instant;

use rayon::prelude::*;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::errors::{error_logging, AppResult, PipelineError};
use crate::observability::{
    ocr_span, page_span, record_ocr_metrics, record_skew_angle, record_stage_failure,
    record_stage_metrics, stage_span,
};
use crate::ocr::Recognizer;
use crate::preprocessing::{
    apply_morphological_operation, apply_otsu_threshold, denoise_nl_means, deskew_image,
    median_blur, ImageScaler, MorphologicalOperation, PreprocessingError, StructuringElement,
};
use crate::rasterizer::PageRasterizer;
use crate::workspace::Workspace;

pub use manifest::{PageSummary, RunManifest};
pub use stage::{PageIndex, PageRaster, PageStage, PreprocessingMode};

/// Outcome of a completed run
#[derive(Debug)]
pub struct PipelineRun {
    pub workspace: Workspace,
    pub manifest: RunManifest,
    /// Final rasters in page order, all in the `Done` state
    pub pages: Vec<PageRaster>,
}

/// Progress reporting for pipeline stages
pub trait ProgressCallback: Send + Sync {
    /// Called once every page has finished `stage`, after its outputs were
    /// persisted. `persisted` tells whether `work/` was written for it.
    fn on_stage_complete(&self, stage: PageStage, page_count: usize, persisted: bool);
}

/// No-op progress callback
pub struct SilentProgress;

impl ProgressCallback for SilentProgress {
    fn on_stage_complete(&self, _stage: PageStage, _page_count: usize, _persisted: bool) {}
}

/// Stage-barrier preprocessing driver
pub struct Pipeline {
    config: PipelineConfig,
    rasterizer: Box<dyn PageRasterizer>,
    scaler: ImageScaler,
    pool: rayon::ThreadPool,
    progress: Box<dyn ProgressCallback>,
}

impl Pipeline {
    /// Build a pipeline with its own worker pool.
    ///
    /// # Arguments
    ///
    /// * `config` - Validated against [`PipelineConfig::validate`]
    /// * `rasterizer` - Source of page images for [`Pipeline::run`]
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Config` for invalid settings and
    /// `PipelineError::Internal` when the worker pool cannot be started.
    pub fn new(config: PipelineConfig, rasterizer: Box<dyn PageRasterizer>) -> AppResult<Self> {
        config.validate()?;

        let scaler = ImageScaler::with_max_dimension(config.max_dimension)
            .map_err(|e| PipelineError::Config(e.to_string()))?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers)
            .thread_name(|i| format!("ocr-prep-worker-{}", i))
            .build()
            .map_err(|e| PipelineError::Internal(format!("cannot start worker pool: {}", e)))?;

        info!(
            mode = %config.mode,
            workers = pool.current_num_threads(),
            max_dimension = config.max_dimension,
            "Pipeline created"
        );

        Ok(Self {
            config,
            rasterizer,
            scaler,
            pool,
            progress: Box::new(SilentProgress),
        })
    }

    /// Report stage completion to `progress`
    pub fn with_progress(mut self, progress: Box<dyn ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Rasterize `document` and preprocess every page into `output_dir`.
    ///
    /// # Arguments
    ///
    /// * `document` - Source document handed to the rasterizer
    /// * `output_dir` - Root of the workspace layout; created if missing
    ///
    /// # Returns
    ///
    /// The final rasters in page order together with the written manifest.
    ///
    /// # Errors
    ///
    /// * `DocumentRead` - the document is missing, corrupt or has no pages
    /// * `Stage` - a stage failed on a page; carries page index and stage
    /// * `FileSystem` - the workspace could not be written
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use ocr_prep::config::PipelineConfig;
    /// use ocr_prep::pipeline::Pipeline;
    /// use ocr_prep::rasterizer::PdftoppmRasterizer;
    /// use std::path::Path;
    ///
    /// # fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let pipeline = Pipeline::new(PipelineConfig::default(), Box::new(PdftoppmRasterizer::new(300)))?;
    /// let run = pipeline.run(Path::new("scan.pdf"), Path::new("out"))?;
    /// println!("{} pages ready", run.pages.len());
    /// # Ok(())
    /// # }
    /// ```
    pub fn run(&self, document: &Path, output_dir: &Path) -> AppResult<PipelineRun> {
        let start = Instant::now();
        let workspace = Workspace::create(output_dir)?;

        let images = self.rasterizer.rasterize(document)?;
        if images.is_empty() {
            return Err(PipelineError::DocumentRead {
                path: document.to_path_buf(),
                message: "document has no pages".to_string(),
            });
        }

        let pages: Vec<PageRaster> = images
            .into_iter()
            .enumerate()
            .map(|(i, image)| PageRaster::new(PageIndex::new(i), image))
            .collect();

        info!(
            document = %document.display(),
            page_count = pages.len(),
            "Document rasterized"
        );

        self.pool
            .install(|| pages.par_iter().try_for_each(|page| workspace.write_input_page(page)))?;

        let pages = self.process_pages(pages, Some(&workspace))?;
        let manifest = RunManifest::new(document.to_path_buf(), self.config.mode, &pages);
        workspace.write_manifest(&manifest)?;

        info!(
            page_count = pages.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Pipeline run completed"
        );

        Ok(PipelineRun {
            workspace,
            manifest,
            pages,
        })
    }

    /// Preprocess again from the input rasters of an earlier run.
    ///
    /// Pages are reloaded by explicit index `0..page_count` from the
    /// manifest. The configured mode applies, not the mode of the earlier run.
    ///
    /// # Errors
    ///
    /// * `FileSystem` - no readable manifest under `output_dir`
    /// * `RasterDecode` - an input raster is missing or corrupt
    pub fn rerun(&self, output_dir: &Path) -> AppResult<PipelineRun> {
        let start = Instant::now();
        let workspace = Workspace::open(output_dir)?;
        let previous = workspace.read_manifest()?;

        let indices: Vec<PageIndex> = previous.page_indices().collect();
        let pages = self.pool.install(|| {
            indices
                .par_iter()
                .map(|&index| {
                    workspace
                        .read_input_page(index)
                        .map(|image| PageRaster::new(index, image))
                })
                .collect::<Vec<_>>()
        });
        // First failure in page order
        let pages = pages.into_iter().collect::<AppResult<Vec<_>>>()?;

        info!(
            document = %previous.document.display(),
            page_count = pages.len(),
            previous_mode = %previous.mode,
            "Reloaded input rasters"
        );

        let pages = self.process_pages(pages, Some(&workspace))?;
        let manifest = RunManifest::new(previous.document, self.config.mode, &pages);
        workspace.write_manifest(&manifest)?;

        info!(
            page_count = pages.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Pipeline rerun completed"
        );

        Ok(PipelineRun {
            workspace,
            manifest,
            pages,
        })
    }

    /// Run every stage of the configured mode over `pages`.
    ///
    /// With a workspace, stage outputs go to `work/` after every stage when
    /// intermediate persistence is enabled, and always after the last one.
    pub fn process_pages(
        &self,
        pages: Vec<PageRaster>,
        workspace: Option<&Workspace>,
    ) -> AppResult<Vec<PageRaster>> {
        let stages = self.config.mode.stages();
        let mut pages = pages;

        for (position, &stage) in stages.iter().enumerate() {
            pages = self.run_stage(stage, pages)?;

            let is_last = position + 1 == stages.len();
            let mut persisted = false;
            if let Some(workspace) = workspace {
                if self.config.persist_intermediate || is_last {
                    self.pool.install(|| {
                        pages
                            .par_iter()
                            .try_for_each(|page| workspace.write_work_page(page))
                    })?;
                    persisted = true;
                }
            }
            self.progress.on_stage_complete(stage, pages.len(), persisted);
        }

        for page in &mut pages {
            page.advance(PageStage::Done, self.config.mode)?;
        }

        Ok(pages)
    }

    /// One full pass of `stage` over every page; returns after the last page.
    fn run_stage(&self, stage: PageStage, pages: Vec<PageRaster>) -> AppResult<Vec<PageRaster>> {
        let span = stage_span(stage, pages.len());
        let _guard = span.enter();
        let start = Instant::now();
        let expected: Vec<PageIndex> = pages.iter().map(|page| page.index).collect();

        info!(stage = stage.name(), page_count = pages.len(), "Stage started");

        let results: Vec<AppResult<PageRaster>> = self.pool.install(|| {
            pages
                .into_par_iter()
                .map(|page| self.apply_stage(stage, page))
                .collect()
        });

        let processed = match results.into_iter().collect::<AppResult<Vec<_>>>() {
            Ok(processed) => processed,
            Err(err) => {
                record_stage_failure(stage);
                error_logging::log_stage_error(&err, "run_stage", err.page(), err.stage());
                return Err(err);
            }
        };

        let order_kept = processed.len() == expected.len()
            && processed
                .iter()
                .zip(&expected)
                .all(|(page, index)| page.index == *index);
        if !order_kept {
            let err = PipelineError::Internal(format!(
                "stage {} changed the page set: expected {} pages in order, got {}",
                stage,
                expected.len(),
                processed.len()
            ));
            error_logging::log_internal_error(&err, "pipeline", "run_stage");
            return Err(err);
        }

        let duration = start.elapsed();
        record_stage_metrics(stage, duration, processed.len());
        info!(
            stage = stage.name(),
            page_count = processed.len(),
            duration_ms = duration.as_millis() as u64,
            "Stage completed"
        );

        Ok(processed)
    }

    fn apply_stage(&self, stage: PageStage, mut page: PageRaster) -> AppResult<PageRaster> {
        let span = page_span(stage, page.index);
        let _guard = span.enter();

        let index = page.index;
        let stage_error = move |source: PreprocessingError| PipelineError::Stage {
            page: index,
            stage,
            source,
        };
        let morphology = |operation| {
            apply_morphological_operation(&page.image, operation, &StructuringElement::RECT_3X3)
                .map(|result| result.image)
                .map_err(stage_error)
        };

        let image = match stage {
            PageStage::Binarized => {
                let result = apply_otsu_threshold(&page.image).map_err(stage_error)?;
                if result.degenerate {
                    warn!(page = index.get(), "Single-intensity page binarized with threshold 0");
                }
                result.image
            }
            PageStage::Scaled => self.scaler.scale(&page.image).map_err(stage_error)?.image,
            PageStage::Deskewed => {
                let result = deskew_image(&page.image, &self.config.deskew).map_err(stage_error)?;
                record_skew_angle(result.skew_angle_degrees);
                page.skew_angle_degrees = Some(result.skew_angle_degrees);
                result.image
            }
            PageStage::StatDenoised => {
                denoise_nl_means(&page.image, &self.config.nl_means)
                    .map_err(stage_error)?
                    .image
            }
            PageStage::Eroded => morphology(MorphologicalOperation::Erosion)?,
            PageStage::Dilated => morphology(MorphologicalOperation::Dilation)?,
            PageStage::MorphDenoised => morphology(MorphologicalOperation::Opening)?,
            PageStage::Blurred => median_blur(&page.image).map_err(stage_error)?.image,
            PageStage::Rasterized | PageStage::Done => {
                return Err(PipelineError::Internal(format!(
                    "{} is not a processing stage",
                    stage
                )))
            }
        };

        page.advance(stage, self.config.mode)?;
        page.image = image;
        Ok(page)
    }
}

/// Recognize the text of every finished page, in page order.
///
/// # Errors
///
/// Returns `PipelineError::Internal` if a page has not reached `Done`, so no
/// partial output ever reaches the recognizer, and
/// `PipelineError::Recognition` for the first page the recognizer fails on.
pub fn recognize_pages(
    pages: &[PageRaster],
    recognizer: &dyn Recognizer,
) -> AppResult<Vec<(PageIndex, String)>> {
    let span = ocr_span("recognize_pages");
    let _guard = span.enter();

    if let Some(page) = pages.iter().find(|page| !page.is_done()) {
        return Err(PipelineError::Internal(format!(
            "page {} is at stage {}, not done",
            page.index, page.stage
        )));
    }

    let mut texts = Vec::with_capacity(pages.len());
    for page in pages {
        let start = Instant::now();
        match recognizer.recognize(&page.image.to_luma8()) {
            Ok(text) => {
                record_ocr_metrics(true, start.elapsed());
                info!(
                    page = page.index.get(),
                    characters = text.len(),
                    "Page recognized"
                );
                texts.push((page.index, text));
            }
            Err(err) => {
                let duration = start.elapsed();
                record_ocr_metrics(false, duration);
                error_logging::log_ocr_error(&err, "recognize", Some(page.index), Some(duration));
                return Err(PipelineError::Recognition {
                    page: page.index,
                    message: err.to_string(),
                });
            }
        }
    }

    Ok(texts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr_errors::OcrError;
    use image::{DynamicImage, GrayImage, Luma};

    struct FixedRasterizer(Vec<DynamicImage>);

    impl PageRasterizer for FixedRasterizer {
        fn rasterize(&self, _document: &Path) -> AppResult<Vec<DynamicImage>> {
            Ok(self.0.clone())
        }
    }

    struct EchoRecognizer;

    impl Recognizer for EchoRecognizer {
        fn recognize(&self, image: &image::GrayImage) -> Result<String, OcrError> {
            Ok(format!("{}x{}", image.width(), image.height()))
        }
    }

    fn page(width: u32, height: u32, value: u8) -> DynamicImage {
        let mut gray = GrayImage::from_pixel(width, height, Luma([255]));
        for x in 2..width.saturating_sub(2) {
            gray.put_pixel(x, height / 2, Luma([value]));
        }
        DynamicImage::ImageLuma8(gray)
    }

    fn config(mode: PreprocessingMode) -> PipelineConfig {
        PipelineConfig {
            mode,
            workers: 2,
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn test_threshold_mode_keeps_page_order() {
        let pipeline = Pipeline::new(
            config(PreprocessingMode::Threshold),
            Box::new(FixedRasterizer(vec![])),
        )
        .unwrap();
        let pages: Vec<PageRaster> = (0..5)
            .map(|i| PageRaster::new(PageIndex::new(i), page(20 + i as u32, 10, 0)))
            .collect();

        let done = pipeline.process_pages(pages, None).unwrap();
        assert_eq!(done.len(), 5);
        for (i, page) in done.iter().enumerate() {
            assert_eq!(page.index, PageIndex::new(i));
            assert_eq!(page.stage, PageStage::Done);
            assert_eq!(page.image.width(), 20 + i as u32);
        }
    }

    #[test]
    fn test_stage_failure_reports_page_and_stage() {
        let pipeline =
            Pipeline::new(config(PreprocessingMode::Blur), Box::new(FixedRasterizer(vec![])))
                .unwrap();
        let pages = vec![
            PageRaster::new(PageIndex::new(0), page(8, 8, 0)),
            PageRaster::new(PageIndex::new(1), DynamicImage::new_luma8(0, 0)),
            PageRaster::new(PageIndex::new(2), DynamicImage::new_luma8(0, 0)),
        ];

        let err = pipeline.process_pages(pages, None).unwrap_err();
        assert_eq!(err.page(), Some(PageIndex::new(1)));
        assert_eq!(err.stage(), Some(PageStage::Blurred));
    }

    #[test]
    fn test_empty_document_is_document_read() {
        let dir = tempfile::TempDir::new().unwrap();
        let pipeline = Pipeline::new(
            config(PreprocessingMode::Threshold),
            Box::new(FixedRasterizer(vec![])),
        )
        .unwrap();
        let result = pipeline.run(Path::new("empty.pdf"), dir.path());
        assert!(matches!(result, Err(PipelineError::DocumentRead { .. })));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut bad = config(PreprocessingMode::Full);
        bad.max_dimension = 0;
        let result = Pipeline::new(bad, Box::new(FixedRasterizer(vec![])));
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_recognize_pages_requires_done() {
        let pages = vec![PageRaster::new(PageIndex::new(0), page(8, 8, 0))];
        let result = recognize_pages(&pages, &EchoRecognizer);
        assert!(matches!(result, Err(PipelineError::Internal(_))));
    }

    #[test]
    fn test_recognize_pages_in_order() {
        let pipeline = Pipeline::new(
            config(PreprocessingMode::Threshold),
            Box::new(FixedRasterizer(vec![])),
        )
        .unwrap();
        let pages = vec![
            PageRaster::new(PageIndex::new(0), page(10, 6, 0)),
            PageRaster::new(PageIndex::new(1), page(12, 6, 0)),
        ];
        let done = pipeline.process_pages(pages, None).unwrap();

        let texts = recognize_pages(&done, &EchoRecognizer).unwrap();
        assert_eq!(
            texts,
            vec![
                (PageIndex::new(0), "10x6".to_string()),
                (PageIndex::new(1), "12x6".to_string()),
            ]
        );
    }
}
