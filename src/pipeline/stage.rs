//! Page identity, stage state machine and preprocessing modes.

use std::fmt;
use std::str::FromStr;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::errors::{AppResult, PipelineError};

/// 0-based page ordinal, the correlation key between stage outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageIndex(usize);

impl PageIndex {
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    pub const fn get(self) -> usize {
        self.0
    }

    /// Deterministic raster file name for this page, e.g. `page_0007.png`
    pub fn file_name(self) -> String {
        format!("page_{:04}.png", self.0)
    }

    /// Deterministic text file name for this page, e.g. `page_0007.txt`
    pub fn text_file_name(self) -> String {
        format!("page_{:04}.txt", self.0)
    }
}

impl fmt::Display for PageIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Last completed step of a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStage {
    Rasterized,
    Binarized,
    Scaled,
    Deskewed,
    StatDenoised,
    Eroded,
    Dilated,
    MorphDenoised,
    Blurred,
    Done,
}

impl PageStage {
    /// Stable lowercase name used in logs, metrics and errors
    pub fn name(self) -> &'static str {
        match self {
            PageStage::Rasterized => "rasterized",
            PageStage::Binarized => "binarized",
            PageStage::Scaled => "scaled",
            PageStage::Deskewed => "deskewed",
            PageStage::StatDenoised => "stat_denoised",
            PageStage::Eroded => "eroded",
            PageStage::Dilated => "dilated",
            PageStage::MorphDenoised => "morph_denoised",
            PageStage::Blurred => "blurred",
            PageStage::Done => "done",
        }
    }

    /// Next stage of a page under `mode`.
    ///
    /// Returns `None` for `Done` and for stages that `mode` never visits.
    pub fn successor(self, mode: PreprocessingMode) -> Option<PageStage> {
        let stages = mode.stages();
        match self {
            PageStage::Rasterized => Some(stages.first().copied().unwrap_or(PageStage::Done)),
            PageStage::Done => None,
            stage => stages
                .iter()
                .position(|candidate| *candidate == stage)
                .map(|position| stages.get(position + 1).copied().unwrap_or(PageStage::Done)),
        }
    }
}

impl fmt::Display for PageStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

const FULL_STAGES: [PageStage; 7] = [
    PageStage::Binarized,
    PageStage::Scaled,
    PageStage::Deskewed,
    PageStage::StatDenoised,
    PageStage::Eroded,
    PageStage::Dilated,
    PageStage::MorphDenoised,
];
const THRESHOLD_STAGES: [PageStage; 1] = [PageStage::Binarized];
const BLUR_STAGES: [PageStage; 1] = [PageStage::Blurred];

/// Operator-selectable stage sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreprocessingMode {
    /// Binarize, scale, deskew, non-local means, erode, dilate, opening
    #[default]
    Full,
    /// Grayscale and Otsu threshold only
    Threshold,
    /// Grayscale and 3x3 median blur only
    Blur,
}

impl PreprocessingMode {
    /// Processing stages of this mode in execution order, excluding
    /// `Rasterized` and `Done`.
    pub fn stages(self) -> &'static [PageStage] {
        match self {
            PreprocessingMode::Full => &FULL_STAGES,
            PreprocessingMode::Threshold => &THRESHOLD_STAGES,
            PreprocessingMode::Blur => &BLUR_STAGES,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PreprocessingMode::Full => "full",
            PreprocessingMode::Threshold => "threshold",
            PreprocessingMode::Blur => "blur",
        }
    }
}

impl fmt::Display for PreprocessingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PreprocessingMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "full" => Ok(PreprocessingMode::Full),
            "threshold" => Ok(PreprocessingMode::Threshold),
            "blur" => Ok(PreprocessingMode::Blur),
            other => Err(format!(
                "unknown preprocessing mode '{}', expected full, threshold or blur",
                other
            )),
        }
    }
}

/// One page moving through the pipeline.
#[derive(Debug, Clone)]
pub struct PageRaster {
    pub index: PageIndex,
    pub image: DynamicImage,
    /// Skew measured by the deskew stage, if it ran
    pub skew_angle_degrees: Option<f32>,
    pub stage: PageStage,
}

impl PageRaster {
    /// Freshly rasterized page
    pub fn new(index: PageIndex, image: DynamicImage) -> Self {
        Self {
            index,
            image,
            skew_angle_degrees: None,
            stage: PageStage::Rasterized,
        }
    }

    /// Move the page to `next`, which must be the successor of its current
    /// stage under `mode`.
    pub fn advance(&mut self, next: PageStage, mode: PreprocessingMode) -> AppResult<()> {
        match self.stage.successor(mode) {
            Some(expected) if expected == next => {
                self.stage = next;
                Ok(())
            }
            expected => Err(PipelineError::Internal(format!(
                "page {} cannot move from {} to {} in {} mode (expected {:?})",
                self.index,
                self.stage,
                next,
                mode,
                expected.map(PageStage::name)
            ))),
        }
    }

    pub fn is_done(&self) -> bool {
        self.stage == PageStage::Done
    }
}
