use std::{
	env, fs,
	path::PathBuf,
	sync::atomic::{AtomicU64, Ordering},
	time::{SystemTime, UNIX_EPOCH},
};

use toml::Value;

use pulse_config::{Config, Error};

const SAMPLE_CONFIG_TEMPLATE_TOML: &str = include_str!("fixtures/sample_config.template.toml");

fn sample_toml() -> String {
	SAMPLE_CONFIG_TEMPLATE_TOML.to_string()
}

fn sample_toml_without(section: &str) -> String {
	let mut value: Value =
		toml::from_str(SAMPLE_CONFIG_TEMPLATE_TOML).expect("Failed to parse template config.");
	let root = value.as_table_mut().expect("Template config must be a table.");

	root.remove(section);

	toml::to_string(&value).expect("Failed to render template config.")
}

fn sample_toml_with_input_types(query: &str, passage: &str) -> String {
	let mut value: Value =
		toml::from_str(SAMPLE_CONFIG_TEMPLATE_TOML).expect("Failed to parse template config.");
	let embedding = value
		.get_mut("providers")
		.and_then(|providers| providers.get_mut("embedding"))
		.and_then(Value::as_table_mut)
		.expect("Template config must include [providers.embedding].");

	embedding.insert("query_input_type".to_string(), Value::String(query.to_string()));
	embedding.insert("passage_input_type".to_string(), Value::String(passage.to_string()));

	toml::to_string(&value).expect("Failed to render template config.")
}

fn write_temp_config(payload: String) -> PathBuf {
	static COUNTER: AtomicU64 = AtomicU64::new(0);

	let nanos = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("System time must be valid.")
		.as_nanos();
	let ordinal = COUNTER.fetch_add(1, Ordering::SeqCst);
	let pid = std::process::id();
	let mut path = env::temp_dir();

	path.push(format!("pulse_config_test_{nanos}_{pid}_{ordinal}.toml"));

	fs::write(&path, payload).expect("Failed to write test config.");

	path
}

fn base_config() -> Config {
	toml::from_str(&sample_toml()).expect("Failed to parse test config.")
}

#[test]
fn sample_config_loads() {
	let path = write_temp_config(sample_toml());
	let result = pulse_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	let cfg = result.expect("Expected sample config to load.");

	assert_eq!(cfg.agent.max_attempts, 3);
	assert_eq!(cfg.cutoff.min_keep, 3);
	assert_eq!(cfg.providers.embedding.query_input_type.as_deref(), Some("query"));
}

#[test]
fn optional_sections_fall_back_to_defaults() {
	let mut payload = sample_toml_without("agent");

	for section in ["sandbox", "cutoff", "ingest"] {
		let mut value: Value = toml::from_str(&payload).expect("Failed to parse config.");

		value.as_table_mut().expect("Config must be a table.").remove(section);

		payload = toml::to_string(&value).expect("Failed to render config.");
	}

	let cfg: Config = toml::from_str(&payload).expect("Failed to parse config.");

	assert_eq!(cfg.agent.max_attempts, 3);
	assert_eq!(cfg.agent.attempt_timeout_ms, 120_000);
	assert_eq!(cfg.cutoff.min_keep, 3);
	assert!((cfg.cutoff.drop_ratio - 0.02).abs() < f64::EPSILON);
	assert_eq!(cfg.cutoff.max_prompt_tokens, 60_000);
	assert_eq!(cfg.sandbox.default_fetch_limit, 10_000);
	assert_eq!(cfg.ingest.batch_size, 16);
	assert!(pulse_config::validate(&cfg).is_ok());
}

#[test]
fn missing_file_reports_read_error() {
	let mut path = env::temp_dir();

	path.push("pulse_config_test_missing_file.toml");

	let err = pulse_config::load(&path).expect_err("Expected read error.");

	assert!(matches!(err, Error::ReadConfig { .. }), "Unexpected error: {err}");
}

#[test]
fn malformed_toml_reports_parse_error() {
	let path = write_temp_config("[service\nhttp_bind = 1".to_string());
	let result = pulse_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	let err = result.expect_err("Expected parse error.");

	assert!(matches!(err, Error::ParseConfig { .. }), "Unexpected error: {err}");
}

#[test]
fn blank_input_types_are_normalized_away() {
	let path = write_temp_config(sample_toml_with_input_types("  ", ""));
	let result = pulse_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	let cfg = result.expect("Expected config to load.");

	assert!(cfg.providers.embedding.query_input_type.is_none());
	assert!(cfg.providers.embedding.passage_input_type.is_none());
}

#[test]
fn embedding_dimensions_must_match_vector_dim() {
	let mut cfg = base_config();

	cfg.storage.qdrant.vector_dim = 1_024;

	let err = pulse_config::validate(&cfg).expect_err("Expected dimension mismatch error.");

	assert!(
		err.to_string()
			.contains("providers.embedding.dimensions must match storage.qdrant.vector_dim."),
		"Unexpected error: {err}"
	);
}

#[test]
fn max_attempts_must_be_positive() {
	let mut cfg = base_config();

	cfg.agent.max_attempts = 0;

	let err = pulse_config::validate(&cfg).expect_err("Expected max_attempts error.");

	assert!(
		err.to_string().contains("agent.max_attempts must be greater than zero."),
		"Unexpected error: {err}"
	);
}

#[test]
fn drop_ratio_must_be_a_fraction() {
	let mut cfg = base_config();

	cfg.cutoff.drop_ratio = 1.5;

	let err = pulse_config::validate(&cfg).expect_err("Expected drop_ratio range error.");

	assert!(err.to_string().contains("cutoff.drop_ratio must be in the range"), "{err}");

	cfg.cutoff.drop_ratio = f64::NAN;

	let err = pulse_config::validate(&cfg).expect_err("Expected drop_ratio finite error.");

	assert!(err.to_string().contains("cutoff.drop_ratio must be a finite number."), "{err}");
}

#[test]
fn min_keep_must_be_positive() {
	let mut cfg = base_config();

	cfg.cutoff.min_keep = 0;

	let err = pulse_config::validate(&cfg).expect_err("Expected min_keep error.");

	assert!(err.to_string().contains("cutoff.min_keep must be greater than zero."), "{err}");
}

#[test]
fn provider_keys_must_be_non_empty() {
	let mut cfg = base_config();

	cfg.providers.llm.api_key = "  ".to_string();

	let err = pulse_config::validate(&cfg).expect_err("Expected api_key error.");

	assert!(err.to_string().contains("Provider llm api_key must be non-empty."), "{err}");
}
