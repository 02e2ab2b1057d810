//! CLI interface module
//!
//! Command-line surface of the `ocr-prep` binary, using clap derive macros.
//! Flags override the values loaded from the environment.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::AppConfig;
use crate::errors::PipelineError;
use crate::ocr_errors::OcrError;
use crate::pipeline::PreprocessingMode;

/// Process exit codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    /// Invalid configuration or arguments
    InvalidArgs = 2,
    /// Source document missing, corrupt or empty
    InputNotFound = 3,
    /// Output directory could not be written
    OutputError = 4,
    /// A preprocessing stage failed
    ProcessingError = 5,
    /// Text recognition failed or is unavailable
    RecognitionError = 6,
}

impl ExitCode {
    /// Exit code for an error returned by a command
    pub fn for_error(error: &anyhow::Error) -> Self {
        if let Some(err) = error.downcast_ref::<PipelineError>() {
            return match err {
                PipelineError::Config(_) => ExitCode::InvalidArgs,
                PipelineError::DocumentRead { .. } => ExitCode::InputNotFound,
                PipelineError::FileSystem(_) => ExitCode::OutputError,
                PipelineError::RasterDecode { .. } | PipelineError::Stage { .. } => {
                    ExitCode::ProcessingError
                }
                PipelineError::Recognition { .. } => ExitCode::RecognitionError,
                PipelineError::Internal(_) => ExitCode::GeneralError,
            };
        }
        if error.downcast_ref::<OcrError>().is_some() {
            return ExitCode::RecognitionError;
        }
        ExitCode::GeneralError
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code as u8)
    }
}

/// Preprocess scanned pages for OCR
#[derive(Parser, Debug)]
#[command(name = "ocr-prep")]
#[command(version)]
#[command(about = "Preprocess scanned document pages for OCR", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Rasterize a document and preprocess every page
    Run(RunArgs),
    /// Preprocess again from the input rasters of an earlier run
    Rerun(RerunArgs),
    /// Preprocess a single image and recognize its text
    OcrImage(OcrImageArgs),
}

/// Settings shared by every command
#[derive(clap::Args, Debug, Default)]
pub struct PipelineArgs {
    /// Stage sequence: full, threshold or blur
    #[arg(long)]
    pub mode: Option<PreprocessingMode>,

    /// Cap on the longer side of every page
    #[arg(long)]
    pub max_dimension: Option<u32>,

    /// Worker threads per stage (0 = all cores)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Only write work rasters after the last stage
    #[arg(long)]
    pub no_intermediate: bool,

    /// Tesseract language codes, e.g. eng+fra
    #[arg(long)]
    pub languages: Option<String>,
}

impl PipelineArgs {
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(mode) = self.mode {
            config.pipeline.mode = mode;
        }
        if let Some(max_dimension) = self.max_dimension {
            config.pipeline.max_dimension = max_dimension;
        }
        if let Some(workers) = self.workers {
            config.pipeline.workers = workers;
        }
        if self.no_intermediate {
            config.pipeline.persist_intermediate = false;
        }
        if let Some(languages) = &self.languages {
            config.ocr.languages = languages.clone();
        }
    }
}

/// Arguments for the run command
#[derive(clap::Args, Debug)]
pub struct RunArgs {
    /// Source document (PDF, or a single image)
    pub document: PathBuf,

    /// Output directory
    #[arg(default_value = "./output")]
    pub output: PathBuf,

    /// Rasterization resolution in DPI
    #[arg(long)]
    pub dpi: Option<u32>,

    /// Recognize text on the final pages
    #[arg(long)]
    pub ocr: bool,

    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

/// Arguments for the rerun command
#[derive(clap::Args, Debug)]
pub struct RerunArgs {
    /// Output directory of the earlier run
    pub output: PathBuf,

    /// Recognize text on the final pages
    #[arg(long)]
    pub ocr: bool,

    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

/// Arguments for the ocr-image command
#[derive(clap::Args, Debug)]
pub struct OcrImageArgs {
    /// Image file to recognize
    pub image: PathBuf,

    /// Output directory
    #[arg(default_value = "./output")]
    pub output: PathBuf,

    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

impl Commands {
    /// Output directory the command writes to
    pub fn output_dir(&self) -> &PathBuf {
        match self {
            Commands::Run(args) => &args.output,
            Commands::Rerun(args) => &args.output,
            Commands::OcrImage(args) => &args.output,
        }
    }

    /// Apply command-line overrides on top of the loaded configuration
    pub fn apply(&self, config: &mut AppConfig) {
        match self {
            Commands::Run(args) => {
                if let Some(dpi) = args.dpi {
                    config.pipeline.dpi = dpi;
                }
                args.pipeline.apply(config);
            }
            Commands::Rerun(args) => args.pipeline.apply(config),
            Commands::OcrImage(args) => {
                // Single images default to the light grayscale + threshold path
                if args.pipeline.mode.is_none() {
                    config.pipeline.mode = PreprocessingMode::Threshold;
                }
                args.pipeline.apply(config);
            }
        }
    }

    /// Whether the command recognizes text after preprocessing
    pub fn wants_recognition(&self) -> bool {
        match self {
            Commands::Run(args) => args.ocr,
            Commands::Rerun(args) => args.ocr,
            Commands::OcrImage(_) => true,
        }
    }
}
