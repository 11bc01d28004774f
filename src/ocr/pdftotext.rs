//! An "OCR" backend that calls `pdftotext`.

use tokio::process::Command;

use crate::{prelude::*, process::check_for_command_failure};

use super::TextExtractor;

/// "OCR" backend wrapping the `pdftotext` CLI tool from `poppler-utils`.
///
/// This will miss any "non-searchable" text in a PDF, but sometimes you just
/// want cheap and fast.
#[non_exhaustive]
pub struct PdfToTextExtractor {}

impl PdfToTextExtractor {
    /// Create a new `pdftotext` extractor.
    pub fn new() -> Self {
        Self {}
    }
}

#[async_trait]
impl TextExtractor for PdfToTextExtractor {
    #[instrument(level = "debug", skip_all, fields(path = %path.display()))]
    async fn extract_text(&self, path: &Path) -> Result<String> {
        // Fail all non-PDF files immediately.
        let is_pdf = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        if !is_pdf {
            bail!("pdftotext only works with PDFs: {}", path.display());
        }

        let tmpdir = tempfile::TempDir::with_prefix("pdftotext")?;
        let output_path = tmpdir.path().join("output.txt");
        let output = Command::new("pdftotext")
            .arg("-layout")
            .arg(path)
            .arg(&output_path)
            .output()
            .await
            .context("cannot run pdftotext")?;
        check_for_command_failure("pdftotext", &output, None)?;

        tokio::fs::read_to_string(&output_path)
            .await
            .context("cannot read pdftotext output file")
    }
}
