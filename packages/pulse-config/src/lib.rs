mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Agent, Config, Cutoff, EmbeddingProviderConfig, Ingest, LlmProviderConfig, Providers, Qdrant,
	Sandbox, Service, Storage,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.storage.qdrant.collection.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.qdrant.collection must be non-empty.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions != cfg.storage.qdrant.vector_dim {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must match storage.qdrant.vector_dim."
				.to_string(),
		});
	}
	if !cfg.providers.llm.temperature.is_finite() {
		return Err(Error::Validation {
			message: "providers.llm.temperature must be a finite number.".to_string(),
		});
	}
	if !(0.0..=2.0).contains(&cfg.providers.llm.temperature) {
		return Err(Error::Validation {
			message: "providers.llm.temperature must be in the range 0.0-2.0.".to_string(),
		});
	}

	for (label, key) in
		[("embedding", &cfg.providers.embedding.api_key), ("llm", &cfg.providers.llm.api_key)]
	{
		if key.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider {label} api_key must be non-empty."),
			});
		}
	}

	if cfg.agent.max_attempts == 0 {
		return Err(Error::Validation {
			message: "agent.max_attempts must be greater than zero.".to_string(),
		});
	}
	if cfg.agent.attempt_timeout_ms == 0 {
		return Err(Error::Validation {
			message: "agent.attempt_timeout_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.sandbox.max_search_limit == 0 {
		return Err(Error::Validation {
			message: "sandbox.max_search_limit must be greater than zero.".to_string(),
		});
	}
	if cfg.sandbox.fetch_page_size == 0 {
		return Err(Error::Validation {
			message: "sandbox.fetch_page_size must be greater than zero.".to_string(),
		});
	}
	if cfg.cutoff.min_keep == 0 {
		return Err(Error::Validation {
			message: "cutoff.min_keep must be greater than zero.".to_string(),
		});
	}
	if !cfg.cutoff.drop_ratio.is_finite() {
		return Err(Error::Validation {
			message: "cutoff.drop_ratio must be a finite number.".to_string(),
		});
	}
	if !(0.0..1.0).contains(&cfg.cutoff.drop_ratio) {
		return Err(Error::Validation {
			message: "cutoff.drop_ratio must be in the range 0.0-1.0 (exclusive).".to_string(),
		});
	}
	if cfg.cutoff.chars_per_token == 0 {
		return Err(Error::Validation {
			message: "cutoff.chars_per_token must be greater than zero.".to_string(),
		});
	}
	if cfg.cutoff.max_prompt_tokens == 0 {
		return Err(Error::Validation {
			message: "cutoff.max_prompt_tokens must be greater than zero.".to_string(),
		});
	}
	if cfg.ingest.batch_size == 0 {
		return Err(Error::Validation {
			message: "ingest.batch_size must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	let embedding = &mut cfg.providers.embedding;

	if embedding.query_input_type.as_deref().map(|kind| kind.trim().is_empty()).unwrap_or(false) {
		embedding.query_input_type = None;
	}
	if embedding.passage_input_type.as_deref().map(|kind| kind.trim().is_empty()).unwrap_or(false)
	{
		embedding.passage_input_type = None;
	}
}
