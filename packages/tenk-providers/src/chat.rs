use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, Result};
use tenk_config::LlmProviderConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
	System,
	User,
	Assistant,
}
impl Role {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::System => "system",
			Self::User => "user",
			Self::Assistant => "assistant",
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
	pub role: Role,
	pub content: String,
}
impl Message {
	pub fn system(content: impl Into<String>) -> Self {
		Self { role: Role::System, content: content.into() }
	}

	pub fn user(content: impl Into<String>) -> Self {
		Self { role: Role::User, content: content.into() }
	}

	pub fn assistant(content: impl Into<String>) -> Self {
		Self { role: Role::Assistant, content: content.into() }
	}
}

/// JSON schema the completion must satisfy, sent as an OpenAI `json_schema` response format.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSchema {
	pub name: String,
	pub schema: Value,
}
impl OutputSchema {
	pub fn new(name: impl Into<String>, schema: Value) -> Self {
		Self { name: name.into(), schema }
	}
}

#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
	Text(String),
	Structured(Value),
}

pub async fn complete(
	cfg: &LlmProviderConfig,
	messages: &[Message],
	schema: Option<&OutputSchema>,
) -> Result<Completion> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = crate::endpoint(&cfg.api_base, &cfg.path);
	let body = build_request_body(cfg, messages, schema);
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	tracing::debug!(
		provider_id = %cfg.provider_id,
		model = %cfg.model,
		structured = schema.is_some(),
		"Chat completion received."
	);

	parse_completion(json, schema)
}

fn build_request_body(
	cfg: &LlmProviderConfig,
	messages: &[Message],
	schema: Option<&OutputSchema>,
) -> Value {
	let mut body = serde_json::json!({
		"model": cfg.model,
		"temperature": cfg.temperature,
		"messages": messages,
	});

	if let Some(schema) = schema {
		body["response_format"] = serde_json::json!({
			"type": "json_schema",
			"json_schema": {
				"name": schema.name,
				"strict": true,
				"schema": schema.schema,
			},
		});
	}

	body
}

fn parse_completion(json: Value, schema: Option<&OutputSchema>) -> Result<Completion> {
	let message = json
		.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|choice| choice.get("message"))
		.ok_or_else(|| Error::InvalidResponse {
			message: "Chat response is missing choices[0].message.".to_string(),
		})?;
	let content = message.get("content").and_then(|c| c.as_str());

	let Some(schema) = schema else {
		let text = content.ok_or_else(|| Error::InvalidResponse {
			message: "Chat response message has no text content.".to_string(),
		})?;

		return Ok(Completion::Text(text.to_string()));
	};

	if let Some(refusal) = message.get("refusal").and_then(|r| r.as_str()) {
		return Err(Error::SchemaViolation {
			schema: schema.name.clone(),
			message: format!("Model refused: {refusal}"),
		});
	}

	let content = content.ok_or_else(|| Error::SchemaViolation {
		schema: schema.name.clone(),
		message: "Response has no content.".to_string(),
	})?;
	let parsed: Value =
		serde_json::from_str(strip_code_fence(content)).map_err(|err| Error::SchemaViolation {
			schema: schema.name.clone(),
			message: format!("Content is not valid JSON: {err}"),
		})?;

	if !parsed.is_object() {
		return Err(Error::SchemaViolation {
			schema: schema.name.clone(),
			message: "Content is not a JSON object.".to_string(),
		});
	}

	Ok(Completion::Structured(parsed))
}

fn strip_code_fence(content: &str) -> &str {
	let trimmed = content.trim();
	let Some(rest) = trimmed.strip_prefix("```") else {
		return trimmed;
	};
	let rest = rest.strip_prefix("json").unwrap_or(rest);

	rest.strip_suffix("```").unwrap_or(rest).trim()
}
