//! OCR backend interface.
//!
//! Each backend wraps an external OCR tool behind the [`TextExtractor`]
//! trait. Backends are selected once at startup from the configuration.

use std::{fmt, str::FromStr, sync::Arc};

use clap::ValueEnum;

use crate::{config::Config, prelude::*};

pub mod easy;
pub mod ocrmac;
pub mod pdftotext;
pub mod rapid;
pub mod tesseract;

/// The OCR backends we know how to drive.
///
/// This is a closed set. An unrecognized backend identifier fails at
/// configuration time with the bad value named.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, ValueEnum)]
#[serde(rename_all = "snake_case")]
#[clap(rename_all = "snake_case")]
pub enum OcrBackend {
    /// RapidOCR, using ONNX models.
    Rapid,

    /// EasyOCR.
    Easy,

    /// Apple's Vision framework, via the `ocrmac` tool. macOS only.
    #[serde(rename = "ocrmac")]
    #[clap(name = "ocrmac")]
    OcrMac,

    /// Tesseract.
    Tesseract,

    /// `pdftotext` from poppler-utils, for PDFs that already contain
    /// searchable text.
    #[serde(rename = "pdftotext")]
    #[clap(name = "pdftotext")]
    PdfToText,
}

impl OcrBackend {
    /// The canonical name of this backend.
    pub fn as_str(self) -> &'static str {
        match self {
            OcrBackend::Rapid => "rapid",
            OcrBackend::Easy => "easy",
            OcrBackend::OcrMac => "ocrmac",
            OcrBackend::Tesseract => "tesseract",
            OcrBackend::PdfToText => "pdftotext",
        }
    }
}

impl fmt::Display for OcrBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OcrBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "rapid" => Ok(OcrBackend::Rapid),
            "easy" => Ok(OcrBackend::Easy),
            "ocrmac" => Ok(OcrBackend::OcrMac),
            "tesseract" => Ok(OcrBackend::Tesseract),
            "pdftotext" => Ok(OcrBackend::PdfToText),
            other => Err(anyhow!(
                "unknown OCR backend {other:?} (expected one of \"rapid\", \"easy\", \
                 \"ocrmac\", \"tesseract\" or \"pdftotext\")"
            )),
        }
    }
}

/// Interface for extracting text from a document.
#[async_trait]
pub trait TextExtractor: Send + Sync + 'static {
    /// Extract the text of the document at `path`.
    async fn extract_text(&self, path: &Path) -> Result<String>;
}

/// Initialize the extractor for the configured backend.
///
/// Backend initialization may download OCR models on first use; the
/// underlying tools cache them, so later runs work offline.
pub fn extractor_for_backend(config: &Config) -> Result<Arc<dyn TextExtractor>> {
    match config.ocr_backend {
        OcrBackend::Rapid => Ok(Arc::new(rapid::RapidOcrExtractor::new())),
        OcrBackend::Easy => Ok(Arc::new(easy::EasyOcrExtractor::new())),
        OcrBackend::OcrMac => ocrmac::OcrMacExtractor::new(),
        OcrBackend::Tesseract => Ok(Arc::new(tesseract::TesseractExtractor::new(
            config.tessdata_path.clone(),
        ))),
        OcrBackend::PdfToText => Ok(Arc::new(pdftotext::PdfToTextExtractor::new())),
    }
}
