//! # Unified Application Configuration
//!
//! This module provides a centralized configuration system that consolidates
//! all application settings into a single, structured configuration object.
//! It supports loading from environment variables, validation, and provides
//! a clean interface for accessing configuration throughout the application.

use std::env;
use std::str::FromStr;

use crate::errors::{AppResult, PipelineError};
use crate::observability_config::ObservabilityConfig;
use crate::ocr_config::{OcrConfig, PageSegMode};
use crate::pipeline::PreprocessingMode;
use crate::preprocessing::{DeskewOptions, ImageScaler, NlMeansParams};

/// Default rasterization resolution in dots per inch
pub const DEFAULT_DPI: u32 = 300;

/// Pipeline configuration settings
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Which stage sequence to run
    pub mode: PreprocessingMode,
    /// Cap on the longer side of every page after scaling
    pub max_dimension: u32,
    /// Rasterization resolution for document pages
    pub dpi: u32,
    /// Worker threads per stage; 0 uses every available core
    pub workers: usize,
    /// Write the work directory after every stage, not only the last
    pub persist_intermediate: bool,
    /// Non-local means parameters
    pub nl_means: NlMeansParams,
    /// Skew detection parameters
    pub deskew: DeskewOptions,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mode: PreprocessingMode::Full,
            max_dimension: ImageScaler::DEFAULT_MAX_DIMENSION,
            dpi: DEFAULT_DPI,
            workers: 0,
            persist_intermediate: true,
            nl_means: NlMeansParams::default(),
            deskew: DeskewOptions::default(),
        }
    }
}

impl PipelineConfig {
    /// Validate pipeline configuration
    pub fn validate(&self) -> AppResult<()> {
        if self.max_dimension == 0 {
            return Err(PipelineError::Config(
                "max_dimension must be greater than 0".to_string(),
            ));
        }

        if !(50..=1200).contains(&self.dpi) {
            return Err(PipelineError::Config(format!(
                "dpi must be between 50 and 1200, got {}",
                self.dpi
            )));
        }

        if self.workers > 256 {
            return Err(PipelineError::Config(format!(
                "workers cannot be greater than 256, got {}",
                self.workers
            )));
        }

        self.nl_means
            .validate()
            .map_err(|e| PipelineError::Config(e.to_string()))?;

        self.deskew
            .hough
            .validate()
            .map_err(|e| PipelineError::Config(e.to_string()))?;

        let edge_threshold = self.deskew.edge_threshold;
        if edge_threshold.is_nan() || edge_threshold <= 0.0 {
            return Err(PipelineError::Config(format!(
                "deskew edge_threshold must be greater than 0, got {}",
                edge_threshold
            )));
        }

        let min_correction = self.deskew.min_correction_degrees;
        if min_correction.is_nan() || min_correction < 0.0 {
            return Err(PipelineError::Config(format!(
                "deskew min_correction_degrees must be non-negative, got {}",
                min_correction
            )));
        }

        Ok(())
    }
}

/// Unified application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Pipeline configuration
    pub pipeline: PipelineConfig,
    /// OCR processing configuration
    pub ocr: OcrConfig,
    /// Observability configuration
    pub observability: ObservabilityConfig,
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
    expected: &str,
) -> AppResult<T> {
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| PipelineError::Config(format!("{} must be {}", key, expected))),
        None => Ok(default),
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let mut config = Self::default();

        // Load pipeline configuration
        if let Some(mode) = lookup("OCR_PREP_MODE") {
            config.pipeline.mode = mode.parse().map_err(PipelineError::Config)?;
        }
        config.pipeline.max_dimension = parse_var(
            &lookup,
            "OCR_PREP_MAX_DIMENSION",
            config.pipeline.max_dimension,
            "a valid number",
        )?;
        config.pipeline.dpi = parse_var(&lookup, "OCR_PREP_DPI", config.pipeline.dpi, "a valid number")?;
        config.pipeline.workers = parse_var(
            &lookup,
            "OCR_PREP_WORKERS",
            config.pipeline.workers,
            "a valid number",
        )?;
        config.pipeline.persist_intermediate = parse_var(
            &lookup,
            "OCR_PREP_PERSIST_INTERMEDIATE",
            config.pipeline.persist_intermediate,
            "true or false",
        )?;

        // Load non-local means parameters
        let nl_means = &mut config.pipeline.nl_means;
        nl_means.filter_strength = parse_var(
            &lookup,
            "NLM_FILTER_STRENGTH",
            nl_means.filter_strength,
            "a valid number",
        )?;
        nl_means.color_strength = parse_var(
            &lookup,
            "NLM_COLOR_STRENGTH",
            nl_means.color_strength,
            "a valid number",
        )?;
        nl_means.template_window = parse_var(
            &lookup,
            "NLM_TEMPLATE_WINDOW",
            nl_means.template_window,
            "a valid number",
        )?;
        nl_means.search_window = parse_var(
            &lookup,
            "NLM_SEARCH_WINDOW",
            nl_means.search_window,
            "a valid number",
        )?;

        // Load deskew parameters
        let deskew = &mut config.pipeline.deskew;
        deskew.edge_threshold = parse_var(
            &lookup,
            "DESKEW_EDGE_THRESHOLD",
            deskew.edge_threshold,
            "a valid number",
        )?;
        deskew.hough.vote_threshold = parse_var(
            &lookup,
            "DESKEW_VOTE_THRESHOLD",
            deskew.hough.vote_threshold,
            "a valid number",
        )?;
        deskew.hough.min_line_length = parse_var(
            &lookup,
            "DESKEW_MIN_LINE_LENGTH",
            deskew.hough.min_line_length,
            "a valid number",
        )?;
        deskew.hough.max_line_gap = parse_var(
            &lookup,
            "DESKEW_MAX_LINE_GAP",
            deskew.hough.max_line_gap,
            "a valid number",
        )?;

        // Load OCR configuration
        if let Some(languages) = lookup("OCR_LANGUAGES") {
            config.ocr.languages = languages;
        }
        config.ocr.tessdata_prefix = lookup("TESSDATA_PREFIX");
        let psm: u8 = parse_var(
            &lookup,
            "OCR_PAGE_SEG_MODE",
            config.ocr.psm_mode as u8,
            "a page segmentation mode between 0 and 13",
        )?;
        config.ocr.psm_mode = PageSegMode::from_number(psm).ok_or_else(|| {
            PipelineError::Config(
                "OCR_PAGE_SEG_MODE must be a page segmentation mode between 0 and 13".to_string(),
            )
        })?;

        // Load observability configuration
        config.observability = ObservabilityConfig::from_lookup(&lookup);

        Ok(config)
    }

    /// Validate all configuration sections
    pub fn validate(&self) -> AppResult<()> {
        self.pipeline.validate()?;
        self.ocr.validate()?;
        self.observability
            .validate()
            .map_err(PipelineError::Config)?;
        Ok(())
    }

    /// Get a summary of the current configuration for logging
    pub fn summary(&self) -> String {
        format!(
            "Configuration: mode={}, max_dimension={}, dpi={}, workers={}, persist_intermediate={}, ocr_languages={}, tessdata_prefix={}, metrics_enabled={}",
            self.pipeline.mode,
            self.pipeline.max_dimension,
            self.pipeline.dpi,
            self.pipeline.workers,
            self.pipeline.persist_intermediate,
            self.ocr.languages,
            if self.ocr.tessdata_prefix.is_some() { "[SET]" } else { "[DEFAULT]" },
            self.observability.enable_metrics_export
        )
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            ocr: OcrConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config_validation() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pipeline.max_dimension, 1024);
        assert_eq!(config.pipeline.dpi, 300);
    }

    #[test]
    fn test_from_lookup_with_no_variables_matches_defaults() {
        let config = AppConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.pipeline, PipelineConfig::default());
        assert_eq!(config.ocr, OcrConfig::default());
    }

    #[test]
    fn test_from_lookup_reads_overrides() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("OCR_PREP_MODE", "threshold"),
            ("OCR_PREP_MAX_DIMENSION", "2048"),
            ("OCR_PREP_WORKERS", "4"),
            ("OCR_PREP_PERSIST_INTERMEDIATE", "false"),
            ("NLM_SEARCH_WINDOW", "11"),
            ("DESKEW_MAX_LINE_GAP", "8"),
            ("OCR_LANGUAGES", "eng+deu"),
            ("OCR_PAGE_SEG_MODE", "6"),
            ("LOG_LEVEL", "debug"),
        ]))
        .unwrap();

        assert_eq!(config.pipeline.mode, PreprocessingMode::Threshold);
        assert_eq!(config.pipeline.max_dimension, 2048);
        assert_eq!(config.pipeline.workers, 4);
        assert!(!config.pipeline.persist_intermediate);
        assert_eq!(config.pipeline.nl_means.search_window, 11);
        assert_eq!(config.pipeline.deskew.hough.max_line_gap, 8);
        assert_eq!(config.ocr.languages, "eng+deu");
        assert_eq!(config.ocr.psm_mode, PageSegMode::SingleBlock);
        assert_eq!(config.observability.log_level, "debug");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_lookup_rejects_garbage() {
        let result = AppConfig::from_lookup(lookup_from(&[("OCR_PREP_DPI", "lots")]));
        assert!(matches!(result, Err(PipelineError::Config(msg)) if msg.contains("OCR_PREP_DPI")));

        let result = AppConfig::from_lookup(lookup_from(&[("OCR_PREP_MODE", "sharpen")]));
        assert!(matches!(result, Err(PipelineError::Config(_))));

        let result = AppConfig::from_lookup(lookup_from(&[("OCR_PAGE_SEG_MODE", "42")]));
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_pipeline_config_validation() {
        let mut config = PipelineConfig::default();
        assert!(config.validate().is_ok());

        config.max_dimension = 0;
        assert!(config.validate().is_err());
        config.max_dimension = 1024;

        config.dpi = 10;
        assert!(config.validate().is_err());
        config.dpi = 300;

        config.nl_means.template_window = 8;
        assert!(config.validate().is_err());
        config.nl_means.template_window = 7;

        config.deskew.edge_threshold = 0.0;
        assert!(config.validate().is_err());
        config.deskew.edge_threshold = 100.0;

        config.deskew.min_correction_degrees = -1.0;
        assert!(config.validate().is_err());
        config.deskew.min_correction_degrees = 0.1;

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_summary_redacts_tessdata_path() {
        let mut config = AppConfig::default();
        config.ocr.tessdata_prefix = Some("/secret/tessdata".to_string());
        let summary = config.summary();
        assert!(summary.contains("[SET]"));
        assert!(!summary.contains("/secret/tessdata"));
        assert!(summary.contains("mode=full"));
    }
}
