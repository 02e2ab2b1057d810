//! Run manifest written next to the work rasters.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::stage::{PageIndex, PageRaster, PageStage, PreprocessingMode};

/// Summary of one page at the end of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSummary {
    pub index: PageIndex,
    pub width: u32,
    pub height: u32,
    pub skew_angle_degrees: Option<f32>,
    pub stage: PageStage,
}

impl PageSummary {
    pub fn from_page(page: &PageRaster) -> Self {
        Self {
            index: page.index,
            width: page.image.width(),
            height: page.image.height(),
            skew_angle_degrees: page.skew_angle_degrees,
            stage: page.stage,
        }
    }
}

/// Record of a pipeline run, used to rerun from the input rasters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    /// Document the pages were rasterized from
    pub document: PathBuf,
    pub mode: PreprocessingMode,
    pub page_count: usize,
    pub created_at: DateTime<Utc>,
    pub pages: Vec<PageSummary>,
}

impl RunManifest {
    pub fn new(document: PathBuf, mode: PreprocessingMode, pages: &[PageRaster]) -> Self {
        Self {
            document,
            mode,
            page_count: pages.len(),
            created_at: Utc::now(),
            pages: pages.iter().map(PageSummary::from_page).collect(),
        }
    }

    /// Page indices of the run, in page order
    pub fn page_indices(&self) -> impl Iterator<Item = PageIndex> {
        (0..self.page_count).map(PageIndex::new)
    }
}
