//! Aggregation of extracted statements into a single table.

use serde_json::Map;

use crate::prelude::*;

/// A row-oriented table built from one or more extracted statements.
///
/// Columns are the union of the fields seen across all rows, in first-seen
/// order. Rows keep their order of appearance, with documents concatenated in
/// input order. Cells a row never had are `null`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Create an empty table.
    pub fn new() -> Table {
        Table::default()
    }

    /// Build a table from a single statement's JSON text.
    ///
    /// We locate the first top-level key whose value is a list, and treat each
    /// element of that list as a row. This deliberately avoids hard-coding a
    /// key name, so it tolerates models that use a container key other than
    /// `transactions`. A statement with no list-valued key produces an empty
    /// table. If more than one list-valued key is present, the first in
    /// document order wins and we log the keys we ignored.
    pub fn from_statement_json(statement: &str) -> Result<Table> {
        let value: Value = serde_json::from_str(statement)
            .context("failed to parse statement JSON")?;
        let mut table = Table::new();
        let Value::Object(map) = value else {
            warn!("statement is not a JSON object; producing an empty table");
            return Ok(table);
        };
        let mut lists = map.iter().filter_map(|(k, v)| v.as_array().map(|a| (k, a)));
        let Some((key, rows)) = lists.next() else {
            warn!("statement has no list-valued key; producing an empty table");
            return Ok(table);
        };
        let ignored = lists.map(|(k, _)| k.as_str()).collect::<Vec<_>>();
        if !ignored.is_empty() {
            warn!(
                %key,
                ?ignored,
                "statement has multiple list-valued keys; using the first"
            );
        }
        for (idx, row) in rows.iter().enumerate() {
            match row {
                Value::Object(fields) => table.push_record(fields),
                _ => warn!(%key, idx, "skipping non-object list element"),
            }
        }
        Ok(table)
    }

    /// Build a table from several statements' JSON text, concatenating their
    /// rows in input order.
    pub fn from_statement_jsons<'a>(
        statements: impl IntoIterator<Item = &'a str>,
    ) -> Result<Table> {
        let mut table = Table::new();
        for statement in statements {
            let other = Table::from_statement_json(statement)?;
            table.extend(&other);
        }
        Ok(table)
    }

    /// Append a single record, extending our columns as needed.
    pub fn push_record(&mut self, fields: &Map<String, Value>) {
        let mut row = vec![Value::Null; self.columns.len()];
        for (name, value) in fields {
            let idx = match self.columns.iter().position(|c| c == name) {
                Some(idx) => idx,
                None => {
                    self.columns.push(name.clone());
                    for existing in &mut self.rows {
                        existing.push(Value::Null);
                    }
                    row.push(Value::Null);
                    self.columns.len() - 1
                }
            };
            row[idx] = value.clone();
        }
        self.rows.push(row);
    }

    /// Append all of `other`'s rows to this table, merging columns.
    pub fn extend(&mut self, other: &Table) {
        for record in other.to_records() {
            self.push_record(&record);
        }
    }

    /// Our column names, in first-seen order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Our rows. Each row has one cell per column.
    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// How many rows do we have?
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Do we have no rows at all?
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Convert each row back to a JSON object keyed by column name.
    pub fn to_records(&self) -> Vec<Map<String, Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_list_valued_key_yields_zero_rows() {
        let table = Table::from_statement_json(r#"{"account": "checking"}"#).unwrap();
        assert!(table.is_empty());
        assert!(table.columns().is_empty());
    }

    #[test]
    fn non_object_statement_yields_zero_rows() {
        let table = Table::from_statement_json("[1, 2, 3]").unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn single_statement_yields_one_row_with_exact_values() {
        let statement = r#"{"transactions":[{"transaction_date":"2025-01-24","description":"Walmart","amount":34.24,"transaction_type":"withdrawal"}]}"#;
        let table = Table::from_statement_json(statement).unwrap();
        assert_eq!(
            table.columns(),
            ["transaction_date", "description", "amount", "transaction_type"]
        );
        assert_eq!(
            table.rows(),
            [vec![
                json!("2025-01-24"),
                json!("Walmart"),
                json!(34.24),
                json!("withdrawal"),
            ]]
        );
    }

    #[test]
    fn concatenation_produces_n_plus_m_rows_in_input_order() {
        let first = r#"{"transactions":[
            {"description": "a", "amount": 1.0},
            {"description": "b", "amount": 2.0}
        ]}"#;
        let second = r#"{"transactions":[
            {"description": "c", "amount": 3.0}
        ]}"#;
        let table = Table::from_statement_jsons([first, second]).unwrap();
        assert_eq!(table.len(), 3);
        let descriptions = table
            .rows()
            .iter()
            .map(|row| row[0].as_str().unwrap().to_owned())
            .collect::<Vec<_>>();
        assert_eq!(descriptions, ["a", "b", "c"]);
    }

    #[test]
    fn statement_with_no_list_contributes_zero_rows_when_aggregating() {
        let with_rows = r#"{"transactions":[{"description": "a"}]}"#;
        let without = r#"{"note": "scanned page was blank"}"#;
        let table = Table::from_statement_jsons([with_rows, without]).unwrap();
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn first_list_valued_key_wins() {
        // The container key is not fixed by contract, so we sniff for the
        // first list value in document order.
        let statement = r#"{
            "summary": "two lists",
            "entries": [{"description": "from entries"}],
            "transactions": [{"description": "from transactions"}]
        }"#;
        let table = Table::from_statement_json(statement).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows()[0][0], json!("from entries"));
    }

    #[test]
    fn columns_are_the_union_in_first_seen_order() {
        let first = r#"{"transactions":[{"description": "a", "amount": 1.0}]}"#;
        let second = r#"{"transactions":[{"amount": 2.0, "balance": 10.0}]}"#;
        let table = Table::from_statement_jsons([first, second]).unwrap();
        assert_eq!(table.columns(), ["description", "amount", "balance"]);
        assert_eq!(table.rows()[0], [json!("a"), json!(1.0), Value::Null]);
        assert_eq!(table.rows()[1], [Value::Null, json!(2.0), json!(10.0)]);
    }

    #[test]
    fn records_round_trip_non_null_fields() {
        let statement = r#"{"transactions":[{"transaction_date":"2025-01-24","description":"Walmart","amount":34.24,"transaction_type":"withdrawal"}]}"#;
        let table = Table::from_statement_json(statement).unwrap();
        let records = table.to_records();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record["transaction_date"], json!("2025-01-24"));
        assert_eq!(record["description"], json!("Walmart"));
        assert_eq!(record["amount"], json!(34.24));
        assert_eq!(record["transaction_type"], json!("withdrawal"));
    }
}
