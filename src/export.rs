//! Exporting aggregated tables to disk.

use std::{fmt, fs, io::Write as _, str::FromStr};

use clap::ValueEnum;

use crate::{prelude::*, table::Table};

/// The export formats we support.
///
/// This is a closed set. Parsing an unrecognized selector fails up front with
/// the bad value named, rather than silently producing no output.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, ValueEnum)]
#[serde(rename_all = "snake_case")]
#[clap(rename_all = "snake_case")]
pub enum ExportFormat {
    /// Comma-separated values with a header row.
    Csv,

    /// An array of one JSON object per row.
    Json,
}

impl ExportFormat {
    /// The canonical name of this format.
    pub fn as_str(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }

    /// The file extension for this format, including the dot.
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => ".csv",
            ExportFormat::Json => ".json",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            other => Err(anyhow!(
                "unknown export format {other:?} (expected \"csv\" or \"json\")"
            )),
        }
    }
}

/// A successfully written export.
#[derive(Clone, Debug)]
pub struct ExportedArtifact {
    /// Where the export landed.
    pub path: PathBuf,

    /// The serialized content, so callers can display it without re-reading
    /// the file.
    pub content: String,
}

/// Write `table` to `<folder>/<base_name><N><ext>`, where `N` is the smallest
/// non-negative integer for which that path does not already exist.
///
/// Creates `folder` (and intermediate directories) if absent. Existing files
/// are never overwritten; each successful call produces exactly one new file.
#[instrument(level = "debug", skip(table))]
pub fn export_table(
    table: &Table,
    folder: &Path,
    base_name: &str,
    format: ExportFormat,
) -> Result<ExportedArtifact> {
    let content = serialize_table(table, format)?;
    fs::create_dir_all(folder)
        .with_context(|| format!("failed to create output folder {folder:?}"))?;

    // Probe for the smallest free suffix. `create_new` makes the probe and
    // the claim a single step, so two runs cannot both win the same name.
    for index in 0u32.. {
        let path = folder.join(format!("{base_name}{index}{}", format.extension()));
        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(mut file) => {
                file.write_all(content.as_bytes())
                    .with_context(|| format!("failed to write {path:?}"))?;
                debug!(path = %path.display(), rows = table.len(), "wrote export");
                return Ok(ExportedArtifact { path, content });
            }
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to create {path:?}"));
            }
        }
    }
    bail!("ran out of numeric suffixes for {base_name:?} in {folder:?}")
}

/// Serialize a table in the requested format.
pub fn serialize_table(table: &Table, format: ExportFormat) -> Result<String> {
    match format {
        ExportFormat::Csv => table_to_csv(table),
        ExportFormat::Json => table_to_json(table),
    }
}

/// Serialize as CSV: a header row of column names, then one row per record.
fn table_to_csv(table: &Table) -> Result<String> {
    // The `csv` crate refuses zero-field records, so handle a columnless
    // table up front.
    if table.columns().is_empty() {
        return Ok(String::new());
    }
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(table.columns())
        .context("failed to write CSV header")?;
    for row in table.rows() {
        writer
            .write_record(row.iter().map(csv_cell))
            .context("failed to write CSV row")?;
    }
    let bytes = writer
        .into_inner()
        .context("failed to flush CSV writer")?;
    String::from_utf8(bytes).context("CSV output was not valid UTF-8")
}

/// Render one cell for CSV output. Nulls become empty cells, and any nested
/// structure is embedded as compact JSON.
fn csv_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

/// Serialize as a JSON array of one object per row.
fn table_to_json(table: &Table) -> Result<String> {
    serde_json::to_string_pretty(&table.to_records())
        .context("failed to serialize table as JSON")
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATEMENT: &str = r#"{"transactions":[{"transaction_date":"2025-01-24","description":"Walmart","amount":34.24,"transaction_type":"withdrawal"}]}"#;

    fn example_table() -> Table {
        Table::from_statement_json(STATEMENT).unwrap()
    }

    #[test]
    fn csv_output_matches_expected_two_line_file() {
        let csv = serialize_table(&example_table(), ExportFormat::Csv).unwrap();
        assert_eq!(
            csv,
            "transaction_date,description,amount,transaction_type\n\
             2025-01-24,Walmart,34.24,withdrawal\n"
        );
    }

    #[test]
    fn csv_round_trips_through_a_reader() {
        let table = Table::from_statement_jsons([
            STATEMENT,
            r#"{"transactions":[{"transaction_date":null,"description":"Payroll","amount":1250.0,"transaction_type":"deposit"}]}"#,
        ])
        .unwrap();
        let csv = serialize_table(&table, ExportFormat::Csv).unwrap();

        let mut reader = csv::Reader::from_reader(csv.as_bytes());
        let headers = reader.headers().unwrap().clone();
        assert_eq!(
            headers.iter().collect::<Vec<_>>(),
            table.columns().iter().map(String::as_str).collect::<Vec<_>>()
        );
        let records = reader
            .records()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(records.len(), table.len());
        assert_eq!(&records[0][1], "Walmart");
        assert_eq!(&records[1][0], ""); // null date reads back as empty
        assert_eq!(&records[1][2], "1250.0");
    }

    #[test]
    fn json_output_is_an_array_of_records() {
        let json = serialize_table(&example_table(), ExportFormat::Json).unwrap();
        let parsed: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed[0]["description"], json!("Walmart"));
        assert_eq!(parsed[0]["amount"], json!(34.24));
    }

    #[test]
    fn empty_table_serializes_to_nothing() {
        let csv = serialize_table(&Table::new(), ExportFormat::Csv).unwrap();
        assert_eq!(csv, "");
    }

    #[test]
    fn export_probes_for_the_next_free_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let table = example_table();

        let first =
            export_table(&table, dir.path(), "statement", ExportFormat::Csv).unwrap();
        assert_eq!(first.path, dir.path().join("statement0.csv"));

        let second =
            export_table(&table, dir.path(), "statement", ExportFormat::Csv).unwrap();
        assert_eq!(second.path, dir.path().join("statement1.csv"));

        // The first export is still intact.
        let original = std::fs::read_to_string(&first.path).unwrap();
        assert_eq!(original, first.content);
    }

    #[test]
    fn probing_considers_only_the_selected_format() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("statement0.json"), "[]").unwrap();

        let artifact =
            export_table(&example_table(), dir.path(), "statement", ExportFormat::Csv)
                .unwrap();
        assert_eq!(artifact.path, dir.path().join("statement0.csv"));
    }

    #[test]
    fn export_creates_missing_output_folders() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("out").join("statements");

        let artifact =
            export_table(&example_table(), &nested, "statement", ExportFormat::Json)
                .unwrap();
        assert!(artifact.path.exists());
        assert_eq!(
            std::fs::read_to_string(&artifact.path).unwrap(),
            artifact.content
        );
    }

    #[test]
    fn unknown_format_selector_names_the_bad_value() {
        let err = <ExportFormat as FromStr>::from_str("xml").unwrap_err();
        assert!(err.to_string().contains("xml"));
    }
}
