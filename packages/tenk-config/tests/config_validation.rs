use std::{
	env, fs,
	path::PathBuf,
	sync::atomic::{AtomicU64, Ordering},
	time::{SystemTime, UNIX_EPOCH},
};

use toml::Value;

use tenk_config::{Config, Error};

const SAMPLE_CONFIG_TOML: &str = include_str!("fixtures/sample_config.toml");

fn sample_toml_with(section: &str, key: &str, value: Value) -> String {
	let mut root: Value = toml::from_str(SAMPLE_CONFIG_TOML).expect("Failed to parse sample config.");
	let mut table = root.as_table_mut().expect("Sample config must be a table.");

	for part in section.split('.') {
		table = table
			.get_mut(part)
			.and_then(Value::as_table_mut)
			.unwrap_or_else(|| panic!("Sample config must include [{section}]."));
	}

	table.insert(key.to_string(), value);

	toml::to_string(&root).expect("Failed to render sample config.")
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

	path.push(format!("tenk_config_test_{nanos}_{pid}_{ordinal}.toml"));

	fs::write(&path, payload).expect("Failed to write test config.");

	path
}

fn base_config() -> Config {
	tenk_config::parse(SAMPLE_CONFIG_TOML).expect("Sample config must be valid.")
}

fn expect_validation(cfg: &Config, expected: &str) {
	let err = tenk_config::validate(cfg).expect_err("Expected validation error.");

	assert!(err.to_string().contains(expected), "Unexpected error: {err}");
}

#[test]
fn sample_config_loads_with_defaults() {
	let path = write_temp_config(SAMPLE_CONFIG_TOML.to_string());
	let result = tenk_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	let cfg = result.expect("Sample config must load.");

	assert_eq!(cfg.retrieval.k, 3);
	assert_eq!(cfg.retrieval.fetch_k, 10);
	assert_eq!(cfg.retrieval.mmr_lambda, 0.5);
	assert_eq!(cfg.providers.query_llm.path, "/chat/completions");
	assert_eq!(cfg.providers.embedding.path, "/embeddings");
	assert!(cfg.synthesis.strict_citations);
	assert!(cfg.prompts.response.contains("{context}"));
	assert!(cfg.prompts.more_info.contains("{logic}"));
	assert!(cfg.prompts.generate_queries.contains("{count}"));

	let qdrant = cfg.retrieval.qdrant.expect("Sample config must include qdrant.");

	assert_eq!(qdrant.text_key, "page_content");
	assert_eq!(qdrant.source_key, "source");
	assert!(qdrant.vector_name.is_none());
}

#[test]
fn missing_file_reports_path() {
	let path = env::temp_dir().join("tenk_config_test_missing.toml");
	let err = tenk_config::load(&path).expect_err("Expected read error.");

	assert!(matches!(err, Error::ReadConfig { .. }), "Unexpected error: {err}");
}

#[test]
fn unknown_retriever_provider_is_rejected() {
	let payload = sample_toml_with("retrieval", "provider", Value::String("pinecone".to_string()));
	let err = tenk_config::parse(&payload).expect_err("Expected provider validation error.");

	assert!(
		err.to_string().contains("retrieval.provider must be one of qdrant, local"),
		"Unexpected error: {err}"
	);
}

#[test]
fn provider_selector_is_case_insensitive() {
	let payload = sample_toml_with("retrieval", "provider", Value::String(" Qdrant ".to_string()));
	let cfg = tenk_config::parse(&payload).expect("Expected normalized provider.");

	assert_eq!(cfg.retrieval.provider, "qdrant");
}

#[test]
fn local_provider_requires_local_section() {
	let mut cfg = base_config();

	cfg.retrieval.provider = "local".to_string();

	expect_validation(&cfg, "retrieval.local is required when retrieval.provider is local.");
}

#[test]
fn fetch_k_must_cover_k() {
	let mut cfg = base_config();

	cfg.retrieval.k = 12;

	expect_validation(&cfg, "retrieval.fetch_k must be at least retrieval.k.");

	cfg = base_config();
	cfg.retrieval.k = 0;

	expect_validation(&cfg, "retrieval.k must be greater than zero.");
}

#[test]
fn search_type_and_lambda_are_checked() {
	let mut cfg = base_config();

	cfg.retrieval.search_type = "hybrid".to_string();

	expect_validation(&cfg, "retrieval.search_type must be one of similarity or mmr.");

	cfg = base_config();
	cfg.retrieval.search_type = "mmr".to_string();
	cfg.retrieval.mmr_lambda = 1.5;

	expect_validation(&cfg, "retrieval.mmr_lambda must be in the range 0.0-1.0.");

	cfg.retrieval.mmr_lambda = f32::NAN;

	expect_validation(&cfg, "retrieval.mmr_lambda must be in the range 0.0-1.0.");
}

#[test]
fn query_failure_policy_is_checked() {
	let mut cfg = base_config();

	cfg.retrieval.on_query_failure = "retry".to_string();

	expect_validation(&cfg, "retrieval.on_query_failure must be one of skip, tolerate, or abort.");

	for policy in tenk_config::QUERY_FAILURE_POLICIES {
		cfg.retrieval.on_query_failure = policy.to_string();

		assert!(tenk_config::validate(&cfg).is_ok(), "Policy {policy} must be accepted.");
	}
}

#[test]
fn research_bounds_must_be_positive() {
	let mut cfg = base_config();

	cfg.research.queries_per_step = 0;

	expect_validation(&cfg, "research.queries_per_step must be greater than zero.");

	cfg = base_config();
	cfg.research.max_steps = 0;

	expect_validation(&cfg, "research.max_steps must be greater than zero.");
}

#[test]
fn provider_keys_and_temperature_are_checked() {
	let mut cfg = base_config();

	cfg.providers.response_llm.api_key = "  ".to_string();

	expect_validation(&cfg, "providers.response_llm.api_key must be non-empty.");

	cfg = base_config();
	cfg.providers.query_llm.temperature = -0.1;

	expect_validation(&cfg, "providers.query_llm.temperature must be a finite number");

	cfg = base_config();
	cfg.providers.embedding.dimensions = 0;

	expect_validation(&cfg, "providers.embedding.dimensions must be greater than zero.");
}

#[test]
fn response_prompt_requires_context_placeholder() {
	let mut cfg = base_config();

	cfg.prompts.response = "Answer the question.".to_string();

	expect_validation(&cfg, "prompts.response must contain the {context} placeholder.");
}

#[test]
fn blank_vector_name_is_normalized_away() {
	let payload =
		sample_toml_with("retrieval.qdrant", "vector_name", Value::String("  ".to_string()));
	let cfg = tenk_config::parse(&payload).expect("Expected valid config.");
	let qdrant = cfg.retrieval.qdrant.expect("Expected qdrant section.");

	assert!(qdrant.vector_name.is_none());
}

#[test]
fn env_api_keys_are_resolved() {
	let name = format!("TENK_CONFIG_TEST_KEY_{}", std::process::id());
	let mut cfg = base_config();

	cfg.providers.query_llm.api_key = format!("env:{name}");

	let err = tenk_config::resolve_env(&mut cfg).expect_err("Expected missing env error.");

	assert!(
		matches!(&err, Error::MissingEnv { field, .. } if field == "providers.query_llm.api_key"),
		"Unexpected error: {err}"
	);

	// SAFETY: the variable name is unique to this test process and read only by this test.
	unsafe {
		env::set_var(&name, "resolved-secret");
	}

	tenk_config::resolve_env(&mut cfg).expect("Expected env resolution.");

	assert_eq!(cfg.providers.query_llm.api_key, "resolved-secret");
	assert_eq!(cfg.providers.response_llm.api_key, "test-key");
}
