use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
	pub system_prompt: String,
	pub user_prompt: String,
	pub max_tokens: u32,
}
impl ChatRequest {
	pub fn new(
		system_prompt: impl Into<String>,
		user_prompt: impl Into<String>,
		max_tokens: u32,
	) -> Self {
		Self { system_prompt: system_prompt.into(), user_prompt: user_prompt.into(), max_tokens }
	}

	fn messages(&self) -> Vec<Value> {
		vec![
			serde_json::json!({ "role": "system", "content": self.system_prompt }),
			serde_json::json!({ "role": "user", "content": self.user_prompt }),
		]
	}
}

/// Runs a single chat completion and returns the trimmed text of the first choice.
pub async fn complete(
	cfg: &pulse_config::LlmProviderConfig,
	request: &ChatRequest,
) -> Result<String> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"temperature": cfg.temperature,
		"max_tokens": request.max_tokens,
		"messages": request.messages(),
	});
	let res = client
		.post(&url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;
	let content = parse_completion_text(&json)?;

	tracing::debug!(model = %cfg.model, chars = content.len(), "Chat completion received.");

	Ok(content)
}

fn parse_completion_text(json: &Value) -> Result<String> {
	json.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|choice| choice.get("message"))
		.and_then(|msg| msg.get("content"))
		.and_then(|c| c.as_str())
		.map(|content| content.trim().to_string())
		.ok_or_else(|| Error::InvalidResponse {
			message: "Chat response is missing choice content.".to_string(),
		})
}
