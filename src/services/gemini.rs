use jsonschema::JSONSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::utils::strip_data_uri;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Extraction API key missing")]
    MissingApiKey,
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Extraction service error {status}: {body}")]
    Service { status: u16, body: String },
    #[error("Empty response from extraction service")]
    EmptyResponse,
    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("Response does not match the extraction schema")]
    SchemaMismatch,
}

/// Anything that turns a document into a best-effort JSON extraction.
#[allow(async_fn_in_trait)]
pub trait DocumentExtractor {
    async fn extract(&self, image: &str, prompt: &str, mime_type: &str) -> Result<Value, ExtractionError>;
}

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    Inline { inline_data: InlineData },
}

#[derive(Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: String,
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

pub struct GeminiExtractor {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiExtractor {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, ExtractionError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ExtractionError::MissingApiKey);
        }
        Ok(GeminiExtractor {
            client: reqwest::Client::new(),
            api_key,
            model: model.into(),
        })
    }

    async fn generate(&self, parts: Vec<Part>) -> Result<String, ExtractionError> {
        let request = GenerateRequest {
            contents: vec![Content { parts }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
                temperature: 0.1,
            },
        };

        let response = self
            .client
            .post(format!("{}/{}:generateContent", API_BASE, self.model))
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractionError::Service { status, body });
        }

        let body: GenerateResponse = response.json().await?;
        response_text(body)
    }
}

impl DocumentExtractor for GeminiExtractor {
    async fn extract(&self, image: &str, prompt: &str, mime_type: &str) -> Result<Value, ExtractionError> {
        let schema = extraction_schema();
        let parts = vec![
            Part::Text {
                text: prompt.to_string(),
            },
            Part::Inline {
                inline_data: InlineData {
                    mime_type: mime_type.to_string(),
                    data: strip_data_uri(image).to_string(),
                },
            },
        ];

        let raw = self.generate(parts).await?;
        let value = parse_json(&raw)?;
        if schema.is_valid(&value) {
            return Ok(value);
        }

        tracing::warn!(model = %self.model, "Extraction did not match schema, asking for a repair");
        let repair = format!(
            "Fix this JSON so that it matches the requested structure exactly. Output JSON only.\n\nRequested structure:\n{}\n\nJSON:\n{}",
            prompt, raw
        );
        let raw = self.generate(vec![Part::Text { text: repair }]).await?;
        let value = parse_json(&raw)?;
        if !schema.is_valid(&value) {
            return Err(ExtractionError::SchemaMismatch);
        }
        Ok(value)
    }
}

fn response_text(body: GenerateResponse) -> Result<String, ExtractionError> {
    let text: String = body
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect::<String>())
        .unwrap_or_default();
    let text = text.trim();
    if text.is_empty() {
        return Err(ExtractionError::EmptyResponse);
    }
    Ok(text.to_string())
}

/// Models sometimes wrap JSON in a markdown fence even when asked not to.
fn parse_json(raw: &str) -> Result<Value, ExtractionError> {
    let trimmed = raw.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed);
    Ok(serde_json::from_str::<Value>(body.trim())?)
}

/// Deliberately loose: shape and types only, nothing required.
pub fn extraction_schema() -> JSONSchema {
    let text = json!({"type": ["string", "number", "null"]});
    let amount = json!({"type": ["number", "string", "null"]});
    let party = json!({
        "type": ["object", "null"],
        "properties": {
            "name": text,
            "rif": text
        }
    });
    let schema = json!({
        "type": "object",
        "properties": {
            "client": party,
            "supplier": party,
            "invoiceNumber": text,
            "controlSerial": text,
            "date": text,
            "currency": text,
            "subtotal": amount,
            "tax": amount,
            "total": amount,
            "exchangeRate": amount,
            "items": {
                "type": ["array", "null"],
                "items": {
                    "type": "object",
                    "properties": {
                        "description": text,
                        "quantity": amount,
                        "unitPrice": amount,
                        "total": amount
                    }
                }
            }
        }
    });

    JSONSchema::compile(&schema).expect("Invalid JSON schema")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_accepts_partial_extractions() {
        let schema = extraction_schema();
        assert!(schema.is_valid(&json!({})));
        assert!(schema.is_valid(&json!({
            "client": null,
            "supplier": {"name": "Acme", "rif": "J-9"},
            "total": "100,00",
            "items": [{"description": "Paper", "quantity": 1}],
            "somethingElse": true
        })));
    }

    #[test]
    fn schema_rejects_wrong_shapes() {
        let schema = extraction_schema();
        assert!(!schema.is_valid(&json!([])));
        assert!(!schema.is_valid(&json!({"supplier": "Acme"})));
        assert!(!schema.is_valid(&json!({"items": {"description": "x"}})));
    }

    #[test]
    fn fenced_json_is_unwrapped() {
        let value = parse_json("```json\n{\"total\": 5}\n```").unwrap();
        assert_eq!(value["total"], 5);
        assert!(parse_json("not json").is_err());
    }

    #[test]
    fn response_text_joins_parts() {
        let body: GenerateResponse = serde_json::from_value(json!({
            "candidates": [{"content": {"parts": [{"text": "{\"a\":"}, {"text": "1}"}]}}]
        }))
        .unwrap();
        assert_eq!(response_text(body).unwrap(), "{\"a\":1}");

        let empty: GenerateResponse = serde_json::from_value(json!({"candidates": []})).unwrap();
        assert!(matches!(response_text(empty), Err(ExtractionError::EmptyResponse)));
    }

    #[test]
    fn inline_part_serializes_with_snake_case_keys() {
        let part = Part::Inline {
            inline_data: InlineData {
                mime_type: "image/png".into(),
                data: "AAAA".into(),
            },
        };
        let value = serde_json::to_value(&part).unwrap();
        assert_eq!(value["inline_data"]["mime_type"], "image/png");
    }

    #[test]
    fn blank_api_key_is_rejected() {
        assert!(matches!(
            GeminiExtractor::new("  ", "gemini-2.5-pro"),
            Err(ExtractionError::MissingApiKey)
        ));
    }
}
