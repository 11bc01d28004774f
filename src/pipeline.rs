//! The extraction pipeline: OCR, structured extraction, aggregation, export.

use crate::{
    config::Config,
    export::{self, ExportedArtifact},
    llm::ExtractionClient,
    ocr::{self, TextExtractor},
    prelude::*,
    table::Table,
    ui::{ProgressConfig, Ui},
};

/// File extensions we treat as statement documents when expanding a
/// directory input.
const DOCUMENT_EXTENSIONS: &[&str] =
    &["bmp", "jpeg", "jpg", "pdf", "png", "tif", "tiff", "webp"];

/// Run the whole pipeline over `paths`, producing one export artifact.
///
/// Documents are processed one at a time, in order. A failure on any single
/// document aborts the run with no partial output.
#[instrument(level = "debug", skip_all)]
pub async fn run_pipeline(
    ui: &Ui,
    config: &Config,
    paths: &[PathBuf],
) -> Result<ExportedArtifact> {
    let paths = expand_input_paths(paths)?;
    if paths.is_empty() {
        bail!("no input documents found");
    }

    let extractor = ocr::extractor_for_backend(config)?;
    let client = ExtractionClient::new()?;
    client.ensure_model_available(ui, &config.model).await?;

    let pb = ui.new_progress_bar(
        &ProgressConfig {
            emoji: "🏦",
            msg: "Extracting statements",
            done_msg: "Extracted statements",
        },
        paths.len() as u64,
    );

    let mut statements = Vec::with_capacity(paths.len());
    for path in &paths {
        let statement = process_document(&*extractor, &client, config, path).await?;
        statements.push(statement);
        pb.inc(1);
    }
    pb.finish_using_style();

    let table = Table::from_statement_jsons(statements.iter().map(String::as_str))?;
    if table.is_empty() {
        warn!("no transactions were extracted from any document");
    }
    export::export_table(
        &table,
        &config.output_folder,
        &config.output_basename,
        config.export_format,
    )
}

/// OCR one document and extract its statement JSON.
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
async fn process_document(
    extractor: &dyn TextExtractor,
    client: &ExtractionClient,
    config: &Config,
    path: &Path,
) -> Result<String> {
    let text = extractor
        .extract_text(path)
        .await
        .with_context(|| format!("failed to extract text from {}", path.display()))?;
    debug!(chars = text.len(), "extracted text");
    client
        .extract_statement(&config.prompt, &text, &config.model)
        .await
        .with_context(|| {
            format!("failed to extract transactions from {}", path.display())
        })
}

/// Expand directory inputs into the document files they contain, in sorted
/// order. Plain file paths pass through unchanged.
fn expand_input_paths(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut expanded = Vec::new();
    for path in paths {
        if path.is_dir() {
            let entries = std::fs::read_dir(path)
                .with_context(|| format!("failed to read directory {}", path.display()))?;
            let mut documents = Vec::new();
            for entry in entries {
                let entry = entry.with_context(|| {
                    format!("failed to read directory {}", path.display())
                })?;
                let entry_path = entry.path();
                if is_document(&entry_path) {
                    documents.push(entry_path);
                }
            }
            documents.sort();
            expanded.extend(documents);
        } else {
            expanded.push(path.clone());
        }
    }
    Ok(expanded)
}

/// Does this look like a document we can OCR?
fn is_document(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                DOCUMENT_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str())
            })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directories_expand_to_their_documents_in_sorted_order() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.png", "a.PDF", "notes.txt", "c.jpg"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }

        let expanded = expand_input_paths(&[dir.path().to_owned()]).unwrap();
        let names = expanded
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_owned())
            .collect::<Vec<_>>();
        assert_eq!(names, ["a.PDF", "b.png", "c.jpg"]);
    }

    #[test]
    fn plain_file_paths_pass_through_even_without_known_extensions() {
        let paths = vec![PathBuf::from("missing/statement.png")];
        let expanded = expand_input_paths(&paths).unwrap();
        assert_eq!(expanded, paths);
    }
}
