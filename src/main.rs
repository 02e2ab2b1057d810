use std::path::Path;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use ocr_prep::cli::{Cli, Commands, ExitCode};
use ocr_prep::config::AppConfig;
use ocr_prep::errors::error_logging;
use ocr_prep::observability::{self, Observability};
use ocr_prep::ocr::create_recognizer;
use ocr_prep::pipeline::{recognize_pages, PageStage, Pipeline, PipelineRun, ProgressCallback};
use ocr_prep::rasterizer::{rasterizer_for, ImageFileRasterizer, PageRasterizer};
use ocr_prep::workspace::METRICS_FILE;

fn main() -> std::process::ExitCode {
    // Load .env before anything reads the environment
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match execute(cli.command) {
        Ok(()) => ExitCode::Success.into(),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::for_error(&e).into()
        }
    }
}

fn execute(command: Commands) -> Result<()> {
    // Logging comes up first so configuration errors reach it
    let observability = observability::init_observability()?;

    let config = match load_config(&command) {
        Ok(config) => config,
        Err(e) => {
            error_logging::log_config_error(&e, "startup", "load");
            return Err(e.into());
        }
    };
    info!("{}", config.summary());

    // Fail before any page work when recognition cannot happen
    let recognizer = if command.wants_recognition() {
        Some(create_recognizer(&config.ocr)?)
    } else {
        None
    };

    let result = run_command(&command, &config).and_then(|run| {
        if let Some(recognizer) = &recognizer {
            let texts = recognize_pages(&run.pages, recognizer.as_ref())?;
            run.workspace.write_text(&texts)?;
            info!(
                pages = texts.len(),
                document_text = %run.workspace.document_text_path().display(),
                "Recognized text written"
            );
        }
        Ok(run)
    });

    write_metrics_snapshot(&observability, command.output_dir());

    let run = result?;
    info!(
        pages = run.pages.len(),
        output = %run.workspace.root().display(),
        "Done"
    );
    Ok(())
}

fn load_config(command: &Commands) -> ocr_prep::errors::AppResult<AppConfig> {
    let mut config = AppConfig::from_env()?;
    command.apply(&mut config);
    config.validate()?;
    Ok(config)
}

fn run_command(command: &Commands, config: &AppConfig) -> ocr_prep::errors::AppResult<PipelineRun> {
    let pipeline = |rasterizer: Box<dyn PageRasterizer>| {
        Pipeline::new(config.pipeline.clone(), rasterizer)
            .map(|pipeline| pipeline.with_progress(Box::new(ConsoleProgress)))
    };
    match command {
        Commands::Run(args) => {
            pipeline(rasterizer_for(&args.document, config.pipeline.dpi))?
                .run(&args.document, &args.output)
        }
        Commands::Rerun(args) => pipeline(Box::new(ImageFileRasterizer))?.rerun(&args.output),
        Commands::OcrImage(args) => {
            pipeline(Box::new(ImageFileRasterizer))?.run(&args.image, &args.output)
        }
    }
}

/// Stage progress on stderr, keeping stdout for the structured log
struct ConsoleProgress;

impl ProgressCallback for ConsoleProgress {
    fn on_stage_complete(&self, stage: PageStage, page_count: usize, persisted: bool) {
        let note = if persisted { ", written to work/" } else { "" };
        eprintln!("  {:<15} {} page(s){}", stage.name(), page_count, note);
    }
}

/// Write the Prometheus snapshot next to the run output, also after failures
fn write_metrics_snapshot(observability: &Observability, output_dir: &Path) {
    let Some(rendered) = observability.render_metrics() else {
        return;
    };
    if !output_dir.is_dir() {
        return;
    }
    let path = output_dir.join(METRICS_FILE);
    if let Err(e) = std::fs::write(&path, rendered) {
        warn!(path = %path.display(), error = %e, "Failed to write metrics snapshot");
    }
}
