//! Tesseract OCR backend.

use tokio::process::Command;

use crate::{prelude::*, process::check_for_command_failure};

use super::TextExtractor;

/// OCR backend wrapping the `tesseract` CLI tool.
pub struct TesseractExtractor {
    /// Where to find tesseract's language data, if not in the default spot.
    tessdata_path: Option<PathBuf>,
}

impl TesseractExtractor {
    /// Create a new `tesseract` extractor.
    pub fn new(tessdata_path: Option<PathBuf>) -> Self {
        Self { tessdata_path }
    }
}

#[async_trait]
impl TextExtractor for TesseractExtractor {
    #[instrument(level = "debug", skip_all, fields(path = %path.display()))]
    async fn extract_text(&self, path: &Path) -> Result<String> {
        // Tesseract writes its output next to a base path we give it.
        let tmpdir = tempfile::TempDir::with_prefix("tesseract")?;
        let output_base = tmpdir.path().join("output");

        let mut command = Command::new("tesseract");
        command.arg(path).arg(&output_base);
        if let Some(tessdata_path) = &self.tessdata_path {
            command.env("TESSDATA_PREFIX", tessdata_path);
        }
        let output = command.output().await.context("cannot run tesseract")?;
        check_for_command_failure("tesseract", &output, None)?;

        tokio::fs::read_to_string(output_base.with_extension("txt"))
            .await
            .context("cannot read tesseract output file")
    }
}
