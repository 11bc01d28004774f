//! The bank-statement data model, and the JSON Schema the LLM must follow.

use schemars::JsonSchema;

use crate::prelude::*;

/// A single transaction, as extracted from a statement.
///
/// Every field is nullable. The LLM is told to return `null` for anything it
/// cannot find in the source text, rather than omitting the field.
#[derive(Clone, Debug, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Transaction {
    /// The date of the transaction, in `YYYY-MM-DD` format.
    pub transaction_date: Option<String>,

    /// A short description of the transaction.
    pub description: Option<String>,

    /// The transaction amount, as a plain decimal number with no currency
    /// symbols or thousands separators.
    pub amount: Option<f64>,

    /// Whether money entered or left the account.
    pub transaction_type: Option<TransactionType>,
}

/// The direction of a transaction.
#[derive(
    Clone, Copy, Debug, Deserialize, Eq, JsonSchema, PartialEq, Serialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// Money entering the account.
    Deposit,

    /// Money leaving the account.
    Withdrawal,
}

/// One statement document's worth of transactions.
#[derive(Clone, Debug, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BankStatement {
    /// All transactions found in the statement, in order of appearance.
    pub transactions: Vec<Transaction>,
}

/// The JSON Schema for [`BankStatement`], as a JSON value.
///
/// This is what we hand to the LLM as a response format, and what we validate
/// its output against.
pub fn statement_schema() -> Result<Value> {
    let schema = schemars::schema_for!(BankStatement);
    serde_json::to_value(schema).context("failed to serialize bank statement schema")
}
