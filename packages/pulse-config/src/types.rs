use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	#[serde(default)]
	pub agent: Agent,
	#[serde(default)]
	pub sandbox: Sandbox,
	#[serde(default)]
	pub cutoff: Cutoff,
	#[serde(default)]
	pub ingest: Ingest,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Storage {
	pub qdrant: Qdrant,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Qdrant {
	pub url: String,
	pub collection: String,
	pub vector_dim: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub llm: LlmProviderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	pub default_headers: Map<String, Value>,
	/// Sent as `input_type` when embedding search phrases. Omitted when unset.
	#[serde(default = "default_query_input_type")]
	pub query_input_type: Option<String>,
	/// Sent as `input_type` when embedding corpus passages. Omitted when unset.
	#[serde(default = "default_passage_input_type")]
	pub passage_input_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub timeout_ms: u64,
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Agent {
	/// Upper bound on synthesize-and-execute attempts per question.
	pub max_attempts: u32,
	/// Wall-clock budget for a single sandbox execution.
	pub attempt_timeout_ms: u64,
	pub synthesis_max_tokens: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Sandbox {
	pub max_search_limit: u64,
	pub default_fetch_limit: u64,
	pub fetch_page_size: u32,
	pub chat_max_tokens: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Cutoff {
	pub min_keep: usize,
	pub drop_ratio: f64,
	pub max_prompt_tokens: usize,
	pub chars_per_token: usize,
	pub reply_max_tokens: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Ingest {
	pub batch_size: usize,
	pub pause_ms: u64,
}

impl Default for Agent {
	fn default() -> Self {
		Self { max_attempts: 3, attempt_timeout_ms: 120_000, synthesis_max_tokens: 4_096 }
	}
}

impl Default for Sandbox {
	fn default() -> Self {
		Self {
			max_search_limit: 1_000,
			default_fetch_limit: 10_000,
			fetch_page_size: 256,
			chat_max_tokens: 3_000,
		}
	}
}

impl Default for Cutoff {
	fn default() -> Self {
		Self {
			min_keep: 3,
			drop_ratio: 0.02,
			max_prompt_tokens: 60_000,
			chars_per_token: 4,
			reply_max_tokens: 100,
		}
	}
}

impl Default for Ingest {
	fn default() -> Self {
		Self { batch_size: 16, pause_ms: 250 }
	}
}

fn default_query_input_type() -> Option<String> {
	Some("query".to_string())
}

fn default_passage_input_type() -> Option<String> {
	Some("passage".to_string())
}
