//! OCR backend using Apple's Vision framework.

use std::sync::Arc;

use tokio::process::Command;

use crate::{prelude::*, process::check_for_command_failure};

use super::TextExtractor;

/// OCR backend wrapping the `ocrmac` CLI tool, which drives the Vision
/// framework.
#[non_exhaustive]
pub struct OcrMacExtractor {}

impl OcrMacExtractor {
    /// Create a new `ocrmac` extractor.
    ///
    /// The Vision framework only exists on macOS, so selecting this backend
    /// anywhere else is a configuration error.
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> Result<Arc<dyn TextExtractor>> {
        if cfg!(target_os = "macos") {
            Ok(Arc::new(Self {}))
        } else {
            Err(anyhow!("the \"ocrmac\" backend requires macOS"))
        }
    }
}

#[async_trait]
impl TextExtractor for OcrMacExtractor {
    #[instrument(level = "debug", skip_all, fields(path = %path.display()))]
    async fn extract_text(&self, path: &Path) -> Result<String> {
        let output = Command::new("ocrmac")
            .arg(path)
            .output()
            .await
            .context("cannot run ocrmac")?;
        check_for_command_failure("ocrmac", &output, None)?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
