//! # CLI Tests Module
//!
//! Runs the built `ocr-prep` binary end to end.

#[cfg(test)]
mod tests {
    use assert_cmd::Command;
    use image::{GrayImage, Luma};
    use predicates::prelude::*;
    use tempfile::TempDir;

    fn ocr_prep_cmd() -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_ocr-prep"));
        cmd.env("LOG_FORMAT", "json")
            .env("LOG_LEVEL", "info")
            .env_remove("RUST_LOG")
            .env_remove("OCR_PREP_MAX_DIMENSION");
        cmd
    }

    #[test]
    fn test_invalid_configuration_is_logged() {
        let dir = TempDir::new().unwrap();

        ocr_prep_cmd()
            .env("ENABLE_METRICS_EXPORT", "false")
            .arg("run")
            .arg(dir.path().join("scan.pdf"))
            .arg(dir.path().join("out"))
            .args(["--max-dimension", "0"])
            .assert()
            .code(2)
            .stdout(predicate::str::contains("Configuration error"))
            .stdout(predicate::str::contains("max_dimension"))
            .stderr(predicate::str::contains("[CONFIG]"));
    }

    #[test]
    fn test_empty_document_is_input_error() {
        let dir = TempDir::new().unwrap();
        let document = dir.path().join("empty.png");
        std::fs::write(&document, b"").unwrap();

        ocr_prep_cmd()
            .env("ENABLE_METRICS_EXPORT", "false")
            .arg("run")
            .arg(&document)
            .arg(dir.path().join("out"))
            .assert()
            .code(3)
            .stderr(predicate::str::contains("[DOCUMENT_READ]"));
    }

    #[test]
    fn test_run_single_image() {
        let dir = TempDir::new().unwrap();
        let document = dir.path().join("page.png");
        GrayImage::from_fn(80, 60, |x, y| {
            if (20..60).contains(&x) && y % 12 < 4 {
                Luma([20])
            } else {
                Luma([230])
            }
        })
        .save(&document)
        .unwrap();
        let output = dir.path().join("out");

        ocr_prep_cmd()
            .arg("run")
            .arg(&document)
            .arg(&output)
            .args(["--mode", "threshold", "-w", "1"])
            .assert()
            .success();

        assert!(output.join("input_rasters").join("page_0000.png").is_file());
        assert!(output.join("work").join("page_0000.png").is_file());
        assert!(output.join("work").join("manifest.json").is_file());
        assert!(output.join("metrics.prom").is_file());
    }
}
