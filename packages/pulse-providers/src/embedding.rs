use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use crate::{Error, Result};

/// Which side of the retrieval pair a text is embedded for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingInput {
	Query,
	Passage,
}
impl EmbeddingInput {
	fn input_type(self, cfg: &pulse_config::EmbeddingProviderConfig) -> Option<&str> {
		match self {
			Self::Query => cfg.query_input_type.as_deref(),
			Self::Passage => cfg.passage_input_type.as_deref(),
		}
	}
}

pub async fn embed(
	cfg: &pulse_config::EmbeddingProviderConfig,
	texts: &[String],
	input: EmbeddingInput,
) -> Result<Vec<Vec<f32>>> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = build_embedding_body(cfg, texts, input);
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;
	let vectors = parse_embedding_response(json)?;

	if vectors.len() != texts.len() {
		return Err(Error::InvalidResponse {
			message: format!(
				"Embedding response returned {} vectors for {} inputs.",
				vectors.len(),
				texts.len()
			),
		});
	}

	Ok(vectors)
}

fn build_embedding_body(
	cfg: &pulse_config::EmbeddingProviderConfig,
	texts: &[String],
	input: EmbeddingInput,
) -> Value {
	let mut body = serde_json::json!({
		"model": cfg.model,
		"input": texts,
		"encoding_format": "float",
	});

	if let Some(input_type) = input.input_type(cfg)
		&& let Some(map) = body.as_object_mut()
	{
		map.insert("input_type".to_string(), Value::String(input_type.to_string()));
	}

	body
}

fn parse_embedding_response(json: Value) -> Result<Vec<Vec<f32>>> {
	let data = json.get("data").and_then(|v| v.as_array()).ok_or_else(|| {
		Error::InvalidResponse { message: "Embedding response is missing data array.".to_string() }
	})?;

	let mut indexed: Vec<(usize, Vec<f32>)> = Vec::with_capacity(data.len());
	for (fallback_index, item) in data.iter().enumerate() {
		let index = item
			.get("index")
			.and_then(|v| v.as_u64())
			.map(|v| v as usize)
			.unwrap_or(fallback_index);
		let embedding =
			item.get("embedding").and_then(|v| v.as_array()).ok_or_else(|| Error::InvalidResponse {
				message: "Embedding item missing embedding array.".to_string(),
			})?;
		let mut vec = Vec::with_capacity(embedding.len());
		for value in embedding {
			let number = value.as_f64().ok_or_else(|| Error::InvalidResponse {
				message: "Embedding value must be numeric.".to_string(),
			})?;
			vec.push(number as f32);
		}
		indexed.push((index, vec));
	}

	indexed.sort_by_key(|(index, _)| *index);

	Ok(indexed.into_iter().map(|(_, vec)| vec).collect())
}

#[cfg(test)]
mod tests {
	use serde_json::Map;

	use super::*;

	fn test_cfg() -> pulse_config::EmbeddingProviderConfig {
		pulse_config::EmbeddingProviderConfig {
			provider_id: "test".to_string(),
			api_base: "http://127.0.0.1:1".to_string(),
			api_key: "test-key".to_string(),
			path: "/embeddings".to_string(),
			model: "embed-test".to_string(),
			dimensions: 2,
			timeout_ms: 1_000,
			default_headers: Map::new(),
			query_input_type: Some("query".to_string()),
			passage_input_type: None,
		}
	}

	#[test]
	fn parses_embeddings_in_index_order() {
		let json = serde_json::json!({
			"data": [
				{ "index": 1, "embedding": [2.0, 3.0] },
				{ "index": 0, "embedding": [0.5, 1.5] }
			]
		});
		let parsed = parse_embedding_response(json).expect("parse failed");
		assert_eq!(parsed.len(), 2);
		assert_eq!(parsed[0], vec![0.5, 1.5]);
		assert_eq!(parsed[1], vec![2.0, 3.0]);
	}

	#[test]
	fn rejects_non_numeric_values() {
		let json = serde_json::json!({ "data": [{ "index": 0, "embedding": ["x"] }] });

		assert!(parse_embedding_response(json).is_err());
	}

	#[test]
	fn input_type_follows_configured_side() {
		let cfg = test_cfg();
		let texts = vec!["slow login".to_string()];
		let query = build_embedding_body(&cfg, &texts, EmbeddingInput::Query);
		let passage = build_embedding_body(&cfg, &texts, EmbeddingInput::Passage);

		assert_eq!(query["input_type"], "query");
		assert!(passage.get("input_type").is_none());
		assert_eq!(passage["model"], "embed-test");
	}
}
