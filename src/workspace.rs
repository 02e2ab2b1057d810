//! # Output Workspace
//!
//! Directory layout of one pipeline run:
//!
//! ```text
//! <output>/
//!   input_rasters/page_0000.png   rasterized pages
//!   work/page_0000.png            latest stage output per page
//!   work/manifest.json            run manifest
//!   text/page_0000.txt            recognized text per page
//!   document.txt                  recognized text of every page
//!   metrics.prom                  Prometheus text snapshot
//! ```
//!
//! Every per-page file name comes from the page index.

use std::fs;
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use crate::errors::{error_logging, AppResult, PipelineError};
use crate::pipeline::{PageIndex, PageRaster, PageStage, RunManifest};

pub const INPUT_DIR: &str = "input_rasters";
pub const WORK_DIR: &str = "work";
pub const TEXT_DIR: &str = "text";
pub const MANIFEST_FILE: &str = "manifest.json";
pub const DOCUMENT_TEXT_FILE: &str = "document.txt";
pub const METRICS_FILE: &str = "metrics.prom";

lazy_static! {
    static ref PAGE_FILE_PATTERN: Regex =
        Regex::new(r"^page_\d{4,}\.(png|txt)$").expect("Invalid page file pattern");
}

fn filesystem_error(operation: &str, path: &Path, error: impl std::fmt::Display) -> PipelineError {
    let path_text = path.display().to_string();
    error_logging::log_filesystem_error(&error, operation, Some(&path_text));
    PipelineError::FileSystem(format!("{} {}: {}", operation, path_text, error))
}

/// Handle on the output directory of a run
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Create the layout under `root`, removing page files left by an
    /// earlier run so stale pages never mix with new ones.
    pub fn create(root: impl Into<PathBuf>) -> AppResult<Self> {
        let workspace = Self { root: root.into() };
        for dir in [workspace.input_dir(), workspace.work_dir(), workspace.text_dir()] {
            fs::create_dir_all(&dir).map_err(|e| filesystem_error("create", &dir, e))?;
            workspace.remove_page_files(&dir)?;
        }
        let document_text = workspace.document_text_path();
        if document_text.exists() {
            fs::remove_file(&document_text)
                .map_err(|e| filesystem_error("remove", &document_text, e))?;
        }
        Ok(workspace)
    }

    /// Open the layout of a previous run, keeping its input rasters.
    ///
    /// Stale work and text files are removed.
    pub fn open(root: impl Into<PathBuf>) -> AppResult<Self> {
        let workspace = Self { root: root.into() };
        let manifest = workspace.manifest_path();
        if !manifest.is_file() {
            return Err(PipelineError::FileSystem(format!(
                "no run manifest at {}",
                manifest.display()
            )));
        }
        let text_dir = workspace.text_dir();
        fs::create_dir_all(&text_dir).map_err(|e| filesystem_error("create", &text_dir, e))?;
        workspace.remove_page_files(&text_dir)?;
        workspace.remove_page_files(&workspace.work_dir())?;
        Ok(workspace)
    }

    fn remove_page_files(&self, dir: &Path) -> AppResult<()> {
        let entries = fs::read_dir(dir).map_err(|e| filesystem_error("list", dir, e))?;
        for entry in entries {
            let path = entry.map_err(|e| filesystem_error("list", dir, e))?.path();
            let is_page_file = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| PAGE_FILE_PATTERN.is_match(name));
            if is_page_file {
                fs::remove_file(&path).map_err(|e| filesystem_error("remove", &path, e))?;
                debug!(path = %path.display(), "Removed stale page file");
            }
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn input_dir(&self) -> PathBuf {
        self.root.join(INPUT_DIR)
    }

    pub fn work_dir(&self) -> PathBuf {
        self.root.join(WORK_DIR)
    }

    pub fn text_dir(&self) -> PathBuf {
        self.root.join(TEXT_DIR)
    }

    pub fn input_page_path(&self, index: PageIndex) -> PathBuf {
        self.input_dir().join(index.file_name())
    }

    pub fn work_page_path(&self, index: PageIndex) -> PathBuf {
        self.work_dir().join(index.file_name())
    }

    pub fn text_page_path(&self, index: PageIndex) -> PathBuf {
        self.text_dir().join(index.text_file_name())
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.work_dir().join(MANIFEST_FILE)
    }

    pub fn document_text_path(&self) -> PathBuf {
        self.root.join(DOCUMENT_TEXT_FILE)
    }

    fn write_png(path: &Path, image: &DynamicImage) -> AppResult<()> {
        image
            .save_with_format(path, ImageFormat::Png)
            .map_err(|e| filesystem_error("write", path, e))
    }

    /// Persist a rasterized page under `input_rasters/`
    pub fn write_input_page(&self, page: &PageRaster) -> AppResult<()> {
        Self::write_png(&self.input_page_path(page.index), &page.image)
    }

    /// Persist the latest stage output of a page under `work/`
    pub fn write_work_page(&self, page: &PageRaster) -> AppResult<()> {
        Self::write_png(&self.work_page_path(page.index), &page.image)
    }

    /// Load a rasterized page by explicit index
    pub fn read_input_page(&self, index: PageIndex) -> AppResult<DynamicImage> {
        let path = self.input_page_path(index);
        image::open(&path).map_err(|e| PipelineError::RasterDecode {
            page: index,
            stage: PageStage::Rasterized,
            message: format!("{}: {}", path.display(), e),
        })
    }

    pub fn write_manifest(&self, manifest: &RunManifest) -> AppResult<()> {
        let path = self.manifest_path();
        let json = serde_json::to_string_pretty(manifest)
            .map_err(|e| PipelineError::Internal(format!("manifest serialization: {}", e)))?;
        fs::write(&path, json).map_err(|e| filesystem_error("write", &path, e))
    }

    pub fn read_manifest(&self) -> AppResult<RunManifest> {
        let path = self.manifest_path();
        let json = fs::read_to_string(&path).map_err(|e| filesystem_error("read", &path, e))?;
        serde_json::from_str(&json).map_err(|e| {
            PipelineError::FileSystem(format!("corrupt manifest {}: {}", path.display(), e))
        })
    }

    /// Write per-page text files and the combined document text, in page order
    pub fn write_text(&self, pages: &[(PageIndex, String)]) -> AppResult<()> {
        let mut document = String::new();
        for (index, text) in pages {
            let path = self.text_page_path(*index);
            fs::write(&path, text).map_err(|e| filesystem_error("write", &path, e))?;

            if !document.is_empty() {
                document.push_str("\n\n");
            }
            document.push_str(text);
        }
        document.push('\n');

        let path = self.document_text_path();
        fs::write(&path, document).map_err(|e| filesystem_error("write", &path, e))
    }
}
