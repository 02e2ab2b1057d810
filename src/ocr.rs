//! # OCR Processing Module
//!
//! Text recognition on final page rasters. The [`Recognizer`] trait is the
//! seam between the pipeline and an engine; `TesseractRecognizer` (cargo
//! feature `tesseract`) runs Tesseract through `leptess`.

use image::GrayImage;
use lazy_static::lazy_static;
use regex::Regex;

use crate::ocr_config::OcrConfig;
use crate::ocr_errors::OcrError;

lazy_static! {
    static ref REPEATED_SPACES: Regex =
        Regex::new(r"[ \t]{2,}").expect("Invalid repeated space pattern");
}

/// Yields text from a preprocessed page raster.
pub trait Recognizer: Send + Sync {
    fn recognize(&self, image: &GrayImage) -> Result<String, OcrError>;
}

/// Clean raw engine output: trim every line, drop blank lines and collapse
/// runs of spaces.
///
/// # Examples
///
/// ```rust
/// use ocr_prep::ocr::clean_extracted_text;
///
/// assert_eq!(clean_extracted_text("  Chapter   one \n\n\n page  two "), "Chapter one\npage two");
/// ```
pub fn clean_extracted_text(raw: &str) -> String {
    raw.lines()
        .map(|line| REPEATED_SPACES.replace_all(line.trim(), " "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Create the recognizer this build supports.
///
/// # Errors
///
/// Returns `OcrError::Initialization` when Tesseract cannot load the
/// configured languages.
#[cfg(feature = "tesseract")]
pub fn create_recognizer(config: &OcrConfig) -> Result<Box<dyn Recognizer>, OcrError> {
    Ok(Box::new(TesseractRecognizer::new(config)?))
}

/// Create the recognizer this build supports.
///
/// Built without the `tesseract` feature, so this always returns
/// `OcrError::Unavailable`.
#[cfg(not(feature = "tesseract"))]
pub fn create_recognizer(config: &OcrConfig) -> Result<Box<dyn Recognizer>, OcrError> {
    Err(OcrError::Unavailable(format!(
        "built without the tesseract feature (languages {})",
        config.languages
    )))
}

#[cfg(feature = "tesseract")]
pub use tesseract::TesseractRecognizer;

#[cfg(feature = "tesseract")]
mod tesseract {
    use std::io::Cursor;

    use image::{DynamicImage, GrayImage, ImageFormat};
    use leptess::LepTess;
    use parking_lot::Mutex;
    use tracing::{debug, info};

    use super::{clean_extracted_text, Recognizer};
    use crate::ocr_config::OcrConfig;
    use crate::ocr_errors::OcrError;

    /// Tesseract engine guarded for use from the pipeline's workers
    pub struct TesseractRecognizer {
        engine: Mutex<LepTess>,
    }

    impl TesseractRecognizer {
        pub fn new(config: &OcrConfig) -> Result<Self, OcrError> {
            config
                .validate()
                .map_err(|e| OcrError::Initialization(e.to_string()))?;

            let mut engine = LepTess::new(config.tessdata_prefix.as_deref(), &config.languages)
                .map_err(|e| {
                    OcrError::Initialization(format!(
                        "Failed to initialize Tesseract for '{}': {}",
                        config.languages, e
                    ))
                })?;

            engine
                .set_variable(
                    leptess::Variable::TesseditPagesegMode,
                    config.psm_mode.as_str(),
                )
                .map_err(|e| OcrError::Initialization(format!("Failed to set PSM mode: {}", e)))?;

            info!(
                languages = %config.languages,
                psm = config.psm_mode.as_str(),
                "Tesseract recognizer initialized"
            );

            Ok(Self {
                engine: Mutex::new(engine),
            })
        }
    }

    impl Recognizer for TesseractRecognizer {
        fn recognize(&self, image: &GrayImage) -> Result<String, OcrError> {
            let mut png = Vec::new();
            DynamicImage::ImageLuma8(image.clone())
                .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
                .map_err(|e| OcrError::ImageLoad(format!("Failed to encode page: {}", e)))?;

            let raw = {
                let mut engine = self.engine.lock();
                engine
                    .set_image_from_mem(&png)
                    .map_err(|e| OcrError::ImageLoad(format!("Failed to load page: {}", e)))?;
                engine.get_utf8_text().map_err(|e| {
                    OcrError::Extraction(format!("Failed to extract text from page: {}", e))
                })?
            };

            let text = clean_extracted_text(&raw);
            debug!(
                raw_characters = raw.len(),
                characters = text.len(),
                "Tesseract extraction finished"
            );
            Ok(text)
        }
    }
}
