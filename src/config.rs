//! Configuration.
//!
//! A [`Config`] is built once at startup and passed by reference to every
//! component. Runtime reconfiguration means constructing a new value and
//! swapping it in; nothing here is globally mutable.

use crate::{export::ExportFormat, llm::DEFAULT_EXTRACTION_PROMPT, ocr::OcrBackend, prelude::*};

/// The model we use when none is configured.
const DEFAULT_MODEL: &str = "llama3.2";

/// The raw, all-optional shape of a config file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "snake_case")]
pub struct ConfigFile {
    /// The OCR backend to use.
    pub ocr_backend: Option<OcrBackend>,

    /// The model to extract transactions with.
    pub model: Option<String>,

    /// The extraction prompt, replacing the built-in one.
    pub prompt: Option<String>,

    /// Where tesseract's language data lives, for the `tesseract` backend.
    pub tessdata_path: Option<PathBuf>,

    /// The folder to write exports into.
    pub output_folder: Option<PathBuf>,

    /// The base name for export files.
    pub output_basename: Option<String>,

    /// The export format.
    pub export_format: Option<ExportFormat>,
}

impl ConfigFile {
    /// Read a config file, accepting either TOML or JSON.
    pub async fn read(path: &Path) -> Result<ConfigFile> {
        let data = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read config file {path:?}"))?;
        if data.trim_start().starts_with('{') {
            serde_json::from_str(&data)
                .with_context(|| format!("failed to parse JSON config {path:?}"))
        } else {
            toml::from_str(&data)
                .with_context(|| format!("failed to parse TOML config {path:?}"))
        }
    }
}

/// Command-line overrides, applied on top of a config file.
#[derive(Debug, Default)]
pub struct ConfigOverrides {
    pub ocr_backend: Option<OcrBackend>,
    pub model: Option<String>,
    pub prompt: Option<String>,
    pub tessdata_path: Option<PathBuf>,
    pub output_folder: Option<PathBuf>,
    pub output_basename: Option<String>,
    pub export_format: Option<ExportFormat>,
}

/// Fully-resolved, immutable configuration for one pipeline run.
#[derive(Clone, Debug)]
pub struct Config {
    /// The OCR backend to use.
    pub ocr_backend: OcrBackend,

    /// The model to extract transactions with.
    pub model: String,

    /// The extraction prompt.
    pub prompt: String,

    /// Where tesseract's language data lives, if not in the default spot.
    pub tessdata_path: Option<PathBuf>,

    /// The folder to write exports into.
    pub output_folder: PathBuf,

    /// The base name for export files.
    pub output_basename: String,

    /// The export format.
    pub export_format: ExportFormat,
}

impl Config {
    /// Build the final configuration. Overrides win over the file, and both
    /// win over the built-in defaults.
    pub fn resolve(file: ConfigFile, overrides: ConfigOverrides) -> Config {
        Config {
            ocr_backend: overrides
                .ocr_backend
                .or(file.ocr_backend)
                .unwrap_or(OcrBackend::Tesseract),
            model: overrides
                .model
                .or(file.model)
                .unwrap_or_else(|| DEFAULT_MODEL.to_owned()),
            prompt: overrides
                .prompt
                .or(file.prompt)
                .unwrap_or_else(|| DEFAULT_EXTRACTION_PROMPT.to_owned()),
            tessdata_path: overrides.tessdata_path.or(file.tessdata_path),
            output_folder: overrides
                .output_folder
                .or(file.output_folder)
                .unwrap_or_else(|| PathBuf::from("output")),
            output_basename: overrides
                .output_basename
                .or(file.output_basename)
                .unwrap_or_else(|| "transactions".to_owned()),
            export_format: overrides
                .export_format
                .or(file.export_format)
                .unwrap_or(ExportFormat::Csv),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_config_parses() {
        let file: ConfigFile = toml::from_str(
            r#"
ocr_backend = "tesseract"
model = "llama3.2"
output_folder = "exports"
export_format = "json"
"#,
        )
        .unwrap();
        assert_eq!(file.ocr_backend, Some(OcrBackend::Tesseract));
        assert_eq!(file.export_format, Some(ExportFormat::Json));
    }

    #[test]
    fn json_config_parses() {
        let file: ConfigFile = serde_json::from_str(
            r#"{"ocr_backend": "rapid", "output_basename": "statements"}"#,
        )
        .unwrap();
        assert_eq!(file.ocr_backend, Some(OcrBackend::Rapid));
        assert_eq!(file.output_basename.as_deref(), Some("statements"));
    }

    #[test]
    fn unknown_backend_in_config_names_the_bad_value() {
        let err = toml::from_str::<ConfigFile>(r#"ocr_backend = "paddle""#).unwrap_err();
        assert!(err.to_string().contains("paddle"));
    }

    #[test]
    fn unknown_export_format_in_config_names_the_bad_value() {
        let err = toml::from_str::<ConfigFile>(r#"export_format = "xml""#).unwrap_err();
        assert!(err.to_string().contains("xml"));
    }

    #[test]
    fn overrides_win_over_the_file_and_defaults_fill_the_rest() {
        let file = ConfigFile {
            model: Some("from-file".to_owned()),
            export_format: Some(ExportFormat::Json),
            ..ConfigFile::default()
        };
        let overrides = ConfigOverrides {
            model: Some("from-cli".to_owned()),
            ..ConfigOverrides::default()
        };
        let config = Config::resolve(file, overrides);
        assert_eq!(config.model, "from-cli");
        assert_eq!(config.export_format, ExportFormat::Json);
        assert_eq!(config.ocr_backend, OcrBackend::Tesseract);
        assert_eq!(config.output_folder, PathBuf::from("output"));
        assert_eq!(config.prompt, DEFAULT_EXTRACTION_PROMPT);
    }
}
