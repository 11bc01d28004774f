//! RapidOCR backend.

use tokio::process::Command;

use crate::{prelude::*, process::check_for_command_failure};

use super::TextExtractor;

/// OCR backend wrapping the `rapidocr` CLI tool.
///
/// The tool downloads its ONNX detection and recognition models on first use
/// and caches them locally, so the first run needs network access.
#[non_exhaustive]
pub struct RapidOcrExtractor {}

impl RapidOcrExtractor {
    /// Create a new `rapidocr` extractor.
    pub fn new() -> Self {
        Self {}
    }
}

#[async_trait]
impl TextExtractor for RapidOcrExtractor {
    #[instrument(level = "debug", skip_all, fields(path = %path.display()))]
    async fn extract_text(&self, path: &Path) -> Result<String> {
        let output = Command::new("rapidocr")
            .arg("-img")
            .arg(path)
            .output()
            .await
            .context("cannot run rapidocr")?;
        check_for_command_failure("rapidocr", &output, None)?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
