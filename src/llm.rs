//! The structured extraction client.
//!
//! Talks to an OpenAI-compatible endpoint (by default a local Ollama server)
//! and asks for chat completions constrained to the bank-statement schema.

use std::{sync::LazyLock, time::Duration};

use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs, ResponseFormat, ResponseFormatJsonSchema,
    },
};
use regex::Regex;

use crate::{
    prelude::*,
    statement::statement_schema,
    ui::{ProgressConfig, Ui},
};

/// The default extraction prompt, used if the config doesn't provide one.
pub const DEFAULT_EXTRACTION_PROMPT: &str = include_str!("llm/default_prompt.txt");

/// How many completion attempts we make when the output fails schema
/// validation.
const MAX_SCHEMA_ATTEMPTS: u32 = 3;

/// Fixed delay between validation-failure retries. No exponential backoff:
/// the server is local, and the retry exists to re-roll the sampler, not to
/// wait out congestion.
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// The API base we use when `OPENAI_API_BASE` is unset: a local Ollama
/// server.
const DEFAULT_API_BASE: &str = "http://localhost:11434/v1";

/// A client for schema-constrained extraction requests.
pub struct ExtractionClient {
    /// The OpenAI-compatible client used for completions.
    client: Client<OpenAIConfig>,

    /// A plain HTTP client, for Ollama's native model-management API.
    http: reqwest::Client,

    /// The API base the client was built against.
    api_base: String,
}

impl ExtractionClient {
    /// Create a client for the configured endpoint.
    pub fn new() -> Result<ExtractionClient> {
        let api_base = std::env::var("OPENAI_API_BASE")
            .unwrap_or_else(|_| DEFAULT_API_BASE.to_owned());
        let mut client_config = OpenAIConfig::new().with_api_base(api_base.clone());
        if let Ok(api_key) = std::env::var("OPENAI_API_KEY") {
            client_config = client_config.with_api_key(api_key);
        }
        Ok(ExtractionClient {
            client: Client::with_config(client_config),
            http: reqwest::Client::new(),
            api_base,
        })
    }

    /// Make sure `model` is available locally, pulling it if our endpoint is
    /// an Ollama server. Other endpoints are assumed to manage their own
    /// models.
    #[instrument(level = "debug", skip(self, ui))]
    pub async fn ensure_model_available(&self, ui: &Ui, model: &str) -> Result<()> {
        let Some(native_base) = self.api_base.strip_suffix("/v1") else {
            debug!("API base does not look like an Ollama server, skipping model check");
            return Ok(());
        };

        let tags: Value = match self
            .http
            .get(format!("{native_base}/api/tags"))
            .send()
            .await
        {
            Ok(response) => response
                .json()
                .await
                .context("failed to parse Ollama model list")?,
            Err(err) => {
                // If the server isn't Ollama (or isn't up), the completion
                // request will produce a clearer error than we could here.
                debug!(%err, "could not list local models, skipping model check");
                return Ok(());
            }
        };
        let already_present = tags["models"].as_array().into_iter().flatten().any(|m| {
            m["name"].as_str().is_some_and(|name| {
                name == model || name.strip_suffix(":latest") == Some(model)
            })
        });
        if already_present {
            debug!(model, "model is already available");
            return Ok(());
        }

        info!(model, "model not present locally, pulling");
        let spinner = ui.new_spinner(&ProgressConfig {
            emoji: "⬇️",
            msg: "Pulling model",
            done_msg: "Pulled model",
        });
        let response = self
            .http
            .post(format!("{native_base}/api/pull"))
            .json(&json!({ "model": model, "stream": false }))
            .send()
            .await
            .context("failed to pull model")?
            .error_for_status()
            .with_context(|| format!("Ollama could not pull model {model:?}"))?;
        let body: Value = response
            .json()
            .await
            .context("failed to parse Ollama pull response")?;
        if body["status"] != json!("success") {
            bail!("Ollama model pull did not complete: {body}");
        }
        spinner.finish_using_style();
        Ok(())
    }

    /// Extract a statement from OCRed text, as a JSON string conforming to
    /// [`statement_schema`].
    ///
    /// The completion is constrained to the schema server-side, and the
    /// result is validated locally as well. Output that fails validation is
    /// retried up to [`MAX_SCHEMA_ATTEMPTS`] times with a fixed
    /// [`RETRY_DELAY`]; exhausting the budget is a hard failure. Transport
    /// errors are not retried.
    #[instrument(level = "debug", skip_all)]
    pub async fn extract_statement(
        &self,
        prompt: &str,
        text: &str,
        model: &str,
    ) -> Result<String> {
        let schema = statement_schema()?;
        let validator = jsonschema::validator_for(&schema)
            .map_err(|err| anyhow!("failed to compile bank statement schema: {err}"))?;

        let mut last_errors = Vec::new();
        for attempt in 1..=MAX_SCHEMA_ATTEMPTS {
            if attempt > 1 {
                tokio::time::sleep(RETRY_DELAY).await;
            }
            let content = self
                .request_completion(prompt, text, model, schema.clone())
                .await?;
            let mut parsed = match serde_json::from_str::<Value>(&content) {
                Ok(parsed) => parsed,
                Err(err) => {
                    // The model didn't even produce JSON. Give it another
                    // chance.
                    warn!(attempt, %err, "LLM response was not valid JSON");
                    last_errors = vec![format!("response was not valid JSON: {err}")];
                    continue;
                }
            };
            coerce_amount_strings(&mut parsed);
            if validator.is_valid(&parsed) {
                return serde_json::to_string_pretty(&parsed)
                    .context("failed to re-serialize validated statement");
            }
            last_errors = validator
                .iter_errors(&parsed)
                .map(|err| err.to_string())
                .collect();
            warn!(attempt, errors = ?last_errors, "LLM output failed schema validation");
        }
        bail!(
            "LLM output failed schema validation after {MAX_SCHEMA_ATTEMPTS} attempts:\n{}",
            last_errors.join("\n")
        )
    }

    /// Issue a single schema-constrained completion request and return the
    /// raw response content.
    async fn request_completion(
        &self,
        prompt: &str,
        text: &str,
        model: &str,
        schema: Value,
    ) -> Result<String> {
        let json_schema = ResponseFormatJsonSchema {
            name: "bank_statement".to_owned(),
            description: None,
            schema: Some(schema),
            strict: Some(true),
        };
        let request = CreateChatCompletionRequestArgs::default()
            .model(model)
            .messages([
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(prompt)
                    .build()
                    .context("failed to build system message")?
                    .into(),
                ChatCompletionRequestUserMessageArgs::default()
                    .content(text)
                    .build()
                    .context("failed to build user message")?
                    .into(),
            ])
            .response_format(ResponseFormat::JsonSchema { json_schema })
            .build()
            .context("failed to build chat completion request")?;
        trace!(?request, "chat completion request");

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .context("chat completion request failed")?;
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("no choices in LLM response"))?;
        let content = choice
            .message
            .content
            .ok_or_else(|| anyhow!("no content in LLM response"))?;
        debug!(%content, "chat completion response");
        Ok(content)
    }
}

/// Replace any string-valued `amount` field with a plain number, stripping
/// currency symbols and thousands separators. Models fed messy OCR text
/// sometimes echo amounts the way the statement printed them.
fn coerce_amount_strings(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, field) in map.iter_mut() {
                if key == "amount" {
                    if let Some(amount) = field.as_str().and_then(parse_messy_amount) {
                        *field = amount;
                        continue;
                    }
                }
                coerce_amount_strings(field);
            }
        }
        Value::Array(items) => {
            for item in items {
                coerce_amount_strings(item);
            }
        }
        _ => {}
    }
}

/// Parse an amount that may carry currency symbols and thousands separators,
/// like `"$1,234.56"`.
fn parse_messy_amount(raw: &str) -> Option<Value> {
    static NON_NUMERIC: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[^0-9.\-]").expect("failed to compile regex"));
    let cleaned = NON_NUMERIC.replace_all(raw, "");
    let amount = cleaned.parse::<f64>().ok()?;
    serde_json::Number::from_f64(amount).map(Value::Number)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messy_amounts_parse_to_plain_numbers() {
        assert_eq!(parse_messy_amount("$1,234.56"), Some(json!(1234.56)));
        assert_eq!(parse_messy_amount("€ 45.00"), Some(json!(45.0)));
        assert_eq!(parse_messy_amount("-45.00"), Some(json!(-45.0)));
        assert_eq!(parse_messy_amount("34.24"), Some(json!(34.24)));
        assert_eq!(parse_messy_amount(""), None);
        assert_eq!(parse_messy_amount("N/A"), None);
    }

    #[test]
    fn coercion_rewrites_nested_amount_fields_only() {
        let mut value = json!({
            "transactions": [
                {"description": "$5 coffee", "amount": "$1,234.56"},
                {"description": "payroll", "amount": 1250.0},
            ]
        });
        coerce_amount_strings(&mut value);
        assert_eq!(value["transactions"][0]["amount"], json!(1234.56));
        assert_eq!(value["transactions"][0]["description"], json!("$5 coffee"));
        assert_eq!(value["transactions"][1]["amount"], json!(1250.0));
    }

    #[test]
    fn valid_statement_passes_schema_validation() {
        let schema = statement_schema().unwrap();
        let validator = jsonschema::validator_for(&schema).unwrap();
        let statement = json!({
            "transactions": [{
                "transaction_date": "2025-01-24",
                "description": "Walmart",
                "amount": 34.24,
                "transaction_type": "withdrawal",
            }]
        });
        assert!(validator.is_valid(&statement));
    }

    #[test]
    fn nulls_are_valid_but_missing_container_is_not() {
        let schema = statement_schema().unwrap();
        let validator = jsonschema::validator_for(&schema).unwrap();
        let nulls = json!({
            "transactions": [{
                "transaction_date": null,
                "description": null,
                "amount": null,
                "transaction_type": null,
            }]
        });
        assert!(validator.is_valid(&nulls));
        assert!(!validator.is_valid(&json!({})));
    }

    #[test]
    fn string_amount_fails_validation_until_coerced() {
        let schema = statement_schema().unwrap();
        let validator = jsonschema::validator_for(&schema).unwrap();
        let mut statement = json!({
            "transactions": [{
                "transaction_date": "2025-01-24",
                "description": "Walmart",
                "amount": "$34.24",
                "transaction_type": "withdrawal",
            }]
        });
        assert!(!validator.is_valid(&statement));
        coerce_amount_strings(&mut statement);
        assert!(validator.is_valid(&statement));
    }
}
