//! The `extract` subcommand.

use clap::Args;

use crate::{
    config::{Config, ConfigFile, ConfigOverrides},
    export::ExportFormat,
    ocr::OcrBackend,
    pipeline::run_pipeline,
    prelude::*,
    ui::Ui,
};

/// Options for the `extract` subcommand.
#[derive(Args, Clone, Debug)]
pub struct ExtractOpts {
    /// Statement documents (images or PDFs) to process. Directories expand to
    /// the documents they contain.
    #[clap(required = true)]
    pub paths: Vec<PathBuf>,

    /// Path to a TOML or JSON config file.
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// The OCR backend to use.
    #[clap(long, value_enum)]
    pub ocr_backend: Option<OcrBackend>,

    /// The model to extract transactions with.
    #[clap(long)]
    pub model: Option<String>,

    /// Path to a file containing a custom extraction prompt.
    #[clap(long)]
    pub prompt: Option<PathBuf>,

    /// Where tesseract's language data lives, for the `tesseract` backend.
    #[clap(long)]
    pub tessdata_path: Option<PathBuf>,

    /// The folder to write exports into.
    #[clap(long)]
    pub output_folder: Option<PathBuf>,

    /// The base name for export files. A numeric suffix is appended so that
    /// repeated runs never overwrite earlier exports.
    #[clap(long)]
    pub output_basename: Option<String>,

    /// The export format.
    #[clap(long, value_enum)]
    pub export_format: Option<ExportFormat>,

    /// Print the exported data to stdout as well as writing it.
    #[clap(long)]
    pub print: bool,
}

/// Run the `extract` subcommand.
#[instrument(level = "debug", skip_all)]
pub async fn cmd_extract(ui: Ui, opts: &ExtractOpts) -> Result<()> {
    let file = match &opts.config {
        Some(path) => ConfigFile::read(path).await?,
        None => ConfigFile::default(),
    };
    let prompt = match &opts.prompt {
        Some(path) => Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("failed to read prompt file {path:?}"))?,
        ),
        None => None,
    };
    let config = Config::resolve(
        file,
        ConfigOverrides {
            ocr_backend: opts.ocr_backend,
            model: opts.model.clone(),
            prompt,
            tessdata_path: opts.tessdata_path.clone(),
            output_folder: opts.output_folder.clone(),
            output_basename: opts.output_basename.clone(),
            export_format: opts.export_format,
        },
    );
    debug!(?config, "resolved configuration");

    let artifact = run_pipeline(&ui, &config, &opts.paths).await?;
    info!(path = %artifact.path.display(), "export complete");
    if opts.print {
        print!("{}", artifact.content);
    }
    Ok(())
}
