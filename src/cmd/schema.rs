//! The `schema` subcommand.

use clap::Args;

use crate::{prelude::*, statement::statement_schema};

/// Options for the `schema` subcommand.
#[derive(Args, Clone, Debug)]
pub struct SchemaOpts {
    /// Where to write the schema. Defaults to stdout.
    #[clap(long = "output", short = 'o')]
    pub output_path: Option<PathBuf>,
}

/// Print the JSON Schema the LLM output must conform to.
pub async fn cmd_schema(opts: &SchemaOpts) -> Result<()> {
    let schema = statement_schema()?;
    let pretty =
        serde_json::to_string_pretty(&schema).context("failed to serialize schema")?;
    match &opts.output_path {
        Some(path) => {
            tokio::fs::write(path, pretty.as_bytes())
                .await
                .with_context(|| format!("failed to write schema to {path:?}"))?;
        }
        None => println!("{pretty}"),
    }
    Ok(())
}
