//! # OCR Configuration Module
//!
//! This module defines configuration structures for text recognition on
//! preprocessed pages.

use crate::errors::{AppResult, PipelineError};

// Constants for OCR configuration
pub const DEFAULT_LANGUAGES: &str = "eng";

/// Page Segmentation Mode for Tesseract OCR
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageSegMode {
    /// Orientation and script detection (OSD) only
    OsdOnly = 0,
    /// Automatic page segmentation with OSD
    AutoOsd = 1,
    /// Automatic page segmentation, no OSD
    AutoNoOsd = 2,
    /// Fully automatic page segmentation
    #[default]
    Auto = 3,
    /// Assume a single column of text
    SingleColumn = 4,
    /// Assume a single uniform block of vertically aligned text
    SingleBlockVert = 5,
    /// Assume a single uniform block of text
    SingleBlock = 6,
    /// Treat the image as a single text line
    SingleLine = 7,
    /// Treat the image as a single word
    SingleWord = 8,
    /// Treat the image as a single word in a circle
    WordInCircle = 9,
    /// Treat the image as a single character
    SingleChar = 10,
    /// Find as much text as possible in no particular order
    SparseText = 11,
    /// Sparse text with OSD
    SparseTextOsd = 12,
    /// Treat the image as a single text line, bypassing hacks that are Tesseract-specific
    RawLine = 13,
}

impl PageSegMode {
    const ALL: [PageSegMode; 14] = [
        PageSegMode::OsdOnly,
        PageSegMode::AutoOsd,
        PageSegMode::AutoNoOsd,
        PageSegMode::Auto,
        PageSegMode::SingleColumn,
        PageSegMode::SingleBlockVert,
        PageSegMode::SingleBlock,
        PageSegMode::SingleLine,
        PageSegMode::SingleWord,
        PageSegMode::WordInCircle,
        PageSegMode::SingleChar,
        PageSegMode::SparseText,
        PageSegMode::SparseTextOsd,
        PageSegMode::RawLine,
    ];

    /// Mode for a Tesseract `--psm` number
    pub fn from_number(value: u8) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }

    /// Convert PSM mode to string value for Tesseract
    pub fn as_str(&self) -> &'static str {
        match self {
            PageSegMode::OsdOnly => "0",
            PageSegMode::AutoOsd => "1",
            PageSegMode::AutoNoOsd => "2",
            PageSegMode::Auto => "3",
            PageSegMode::SingleColumn => "4",
            PageSegMode::SingleBlockVert => "5",
            PageSegMode::SingleBlock => "6",
            PageSegMode::SingleLine => "7",
            PageSegMode::SingleWord => "8",
            PageSegMode::WordInCircle => "9",
            PageSegMode::SingleChar => "10",
            PageSegMode::SparseText => "11",
            PageSegMode::SparseTextOsd => "12",
            PageSegMode::RawLine => "13",
        }
    }
}

/// Configuration structure for OCR processing
#[derive(Debug, Clone, PartialEq)]
pub struct OcrConfig {
    /// OCR language codes (e.g., "eng", "eng+fra", "deu")
    pub languages: String,
    /// Directory holding the traineddata files; Tesseract's default when unset
    pub tessdata_prefix: Option<String>,
    /// Page segmentation mode for OCR
    pub psm_mode: PageSegMode,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            languages: DEFAULT_LANGUAGES.to_string(),
            tessdata_prefix: None,
            psm_mode: PageSegMode::default(),
        }
    }
}

impl OcrConfig {
    /// Validate OCR configuration parameters
    pub fn validate(&self) -> AppResult<()> {
        if self.languages.trim().is_empty() {
            return Err(PipelineError::Config(
                "languages cannot be empty".to_string(),
            ));
        }

        let malformed = self
            .languages
            .split('+')
            .find(|code| code.is_empty() || !code.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
        if let Some(code) = malformed {
            return Err(PipelineError::Config(format!(
                "invalid language code '{}' in '{}'",
                code, self.languages
            )));
        }

        if let Some(prefix) = &self.tessdata_prefix {
            if prefix.trim().is_empty() {
                return Err(PipelineError::Config(
                    "tessdata_prefix cannot be empty when set".to_string(),
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = OcrConfig::default();
        assert_eq!(config.languages, "eng");
        assert_eq!(config.psm_mode, PageSegMode::Auto);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_language_validation() {
        let mut config = OcrConfig::default();

        config.languages = "eng+fra".to_string();
        assert!(config.validate().is_ok());

        config.languages = "  ".to_string();
        assert!(config.validate().is_err());

        config.languages = "eng++fra".to_string();
        assert!(config.validate().is_err());

        config.languages = "eng;rm".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_tessdata_prefix_validation() {
        let config = OcrConfig {
            tessdata_prefix: Some(String::new()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_page_seg_mode_numbers() {
        assert_eq!(PageSegMode::from_number(3), Some(PageSegMode::Auto));
        assert_eq!(PageSegMode::from_number(6), Some(PageSegMode::SingleBlock));
        assert_eq!(PageSegMode::from_number(14), None);
        for mode in PageSegMode::ALL {
            assert_eq!(mode.as_str().parse::<usize>().unwrap(), mode as usize);
        }
    }
}
