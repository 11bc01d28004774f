//! EasyOCR backend.

use tokio::process::Command;

use crate::{prelude::*, process::check_for_command_failure};

use super::TextExtractor;

/// OCR backend wrapping the `easyocr` CLI tool.
///
/// EasyOCR downloads its models on first use and caches them under the
/// user's home directory.
#[non_exhaustive]
pub struct EasyOcrExtractor {}

impl EasyOcrExtractor {
    /// Create a new `easyocr` extractor.
    pub fn new() -> Self {
        Self {}
    }
}

#[async_trait]
impl TextExtractor for EasyOcrExtractor {
    #[instrument(level = "debug", skip_all, fields(path = %path.display()))]
    async fn extract_text(&self, path: &Path) -> Result<String> {
        // `--detail 0` prints recognized text only, one line per region.
        let output = Command::new("easyocr")
            .args(["-l", "en", "--detail", "0", "-f"])
            .arg(path)
            .output()
            .await
            .context("cannot run easyocr")?;
        check_for_command_failure("easyocr", &output, None)?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
