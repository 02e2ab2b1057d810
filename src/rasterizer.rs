//! # Page Rasterizers
//!
//! Turn a source document into ordered page images. Pages are always returned
//! in document order; order is derived from explicit page numbers, never from
//! directory enumeration.

use std::path::{Path, PathBuf};
use std::process::Command;

use image::DynamicImage;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, info};

use crate::config::DEFAULT_DPI;
use crate::errors::{AppResult, PipelineError};

lazy_static! {
    // pdftoppm pads the page number to the width of the page count
    static ref PDFTOPPM_PAGE_PATTERN: Regex =
        Regex::new(r"^page-(\d+)\.png$").expect("Invalid pdftoppm page pattern");
}

/// Source of page images for the pipeline.
pub trait PageRasterizer: Send + Sync {
    /// Rasterize `document` into page images in page order.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::DocumentRead`] when the document is missing,
    /// unreadable, corrupt or has no pages.
    fn rasterize(&self, document: &Path) -> AppResult<Vec<DynamicImage>>;
}

fn document_error(document: &Path, message: impl Into<String>) -> PipelineError {
    PipelineError::DocumentRead {
        path: document.to_path_buf(),
        message: message.into(),
    }
}

fn ensure_readable_file(document: &Path) -> AppResult<()> {
    let metadata = document
        .metadata()
        .map_err(|e| document_error(document, format!("cannot access document: {}", e)))?;
    if !metadata.is_file() {
        return Err(document_error(document, "path is not a file"));
    }
    if metadata.len() == 0 {
        return Err(document_error(document, "document is empty"));
    }
    Ok(())
}

/// Rasterizes PDF documents with poppler's `pdftoppm`.
#[derive(Debug, Clone)]
pub struct PdftoppmRasterizer {
    dpi: u32,
    program: PathBuf,
}

impl Default for PdftoppmRasterizer {
    fn default() -> Self {
        Self::new(DEFAULT_DPI)
    }
}

impl PdftoppmRasterizer {
    pub fn new(dpi: u32) -> Self {
        Self {
            dpi,
            program: PathBuf::from("pdftoppm"),
        }
    }

    /// Use a specific `pdftoppm` executable instead of the one on `PATH`
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }
}

/// Page number encoded in a `pdftoppm` output file name
fn pdftoppm_page_number(file_name: &str) -> Option<u32> {
    PDFTOPPM_PAGE_PATTERN
        .captures(file_name)
        .and_then(|captures| captures.get(1))
        .and_then(|number| number.as_str().parse().ok())
}

impl PageRasterizer for PdftoppmRasterizer {
    fn rasterize(&self, document: &Path) -> AppResult<Vec<DynamicImage>> {
        ensure_readable_file(document)?;

        let output_dir = tempfile::tempdir()?;
        let output_root = output_dir.path().join("page");

        info!(
            document = %document.display(),
            dpi = self.dpi,
            "Rasterizing document with pdftoppm"
        );

        let output = Command::new(&self.program)
            .arg("-r")
            .arg(self.dpi.to_string())
            .arg("-png")
            .arg(document)
            .arg(&output_root)
            .output()
            .map_err(|e| {
                document_error(
                    document,
                    format!("failed to run {}: {}", self.program.display(), e),
                )
            })?;

        if !output.status.success() {
            return Err(document_error(
                document,
                format!(
                    "pdftoppm exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }

        let mut numbered = Vec::new();
        for entry in std::fs::read_dir(output_dir.path())? {
            let path = entry?.path();
            let number = path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(pdftoppm_page_number);
            if let Some(number) = number {
                numbered.push((number, path));
            }
        }
        numbered.sort_by_key(|(number, _)| *number);

        if numbered.is_empty() {
            return Err(document_error(document, "document has no pages"));
        }

        let pages = numbered
            .iter()
            .map(|(number, path)| {
                image::open(path).map_err(|e| {
                    document_error(document, format!("cannot decode page {}: {}", number, e))
                })
            })
            .collect::<AppResult<Vec<_>>>()?;

        debug!(page_count = pages.len(), "Document rasterized");
        Ok(pages)
    }
}

/// Treats a single image file as a one-page document.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageFileRasterizer;

impl PageRasterizer for ImageFileRasterizer {
    fn rasterize(&self, document: &Path) -> AppResult<Vec<DynamicImage>> {
        ensure_readable_file(document)?;

        let image = image::open(document)
            .map_err(|e| document_error(document, format!("cannot decode image: {}", e)))?;

        if image.width() == 0 || image.height() == 0 {
            return Err(document_error(document, "image has no pixels"));
        }

        debug!(
            document = %document.display(),
            width = image.width(),
            height = image.height(),
            "Loaded single-page image"
        );
        Ok(vec![image])
    }
}

/// Pick a rasterizer by file extension: PDF through `pdftoppm`, anything
/// else as a single image.
pub fn rasterizer_for(document: &Path, dpi: u32) -> Box<dyn PageRasterizer> {
    let is_pdf = document
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

    if is_pdf {
        Box::new(PdftoppmRasterizer::new(dpi))
    } else {
        Box::new(ImageFileRasterizer)
    }
}
