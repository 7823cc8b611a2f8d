pub mod prompts;

mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Config, EmbeddingProviderConfig, LlmProviderConfig, LocalRetrieval, Prompts, Providers,
	QdrantRetrieval, Research, Retrieval, Service, Synthesis,
};

use std::{env, fs, path::Path};

pub const RETRIEVER_PROVIDERS: [&str; 2] = ["qdrant", "local"];
pub const SEARCH_TYPES: [&str; 2] = ["similarity", "mmr"];
pub const QUERY_FAILURE_POLICIES: [&str; 3] = ["skip", "tolerate", "abort"];

const ENV_PREFIX: &str = "env:";

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;
	let mut cfg = parse(&raw).map_err(|err| match err {
		Error::ParseConfig { source, .. } => Error::ParseConfig { path: path.to_path_buf(), source },
		other => other,
	})?;

	resolve_env(&mut cfg)?;

	Ok(cfg)
}

/// Parses, normalizes and validates a config without touching the environment.
pub fn parse(raw: &str) -> Result<Config> {
	let mut cfg: Config = toml::from_str(raw)
		.map_err(|err| Error::ParseConfig { path: Default::default(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	for (label, provider) in
		[("query_llm", &cfg.providers.query_llm), ("response_llm", &cfg.providers.response_llm)]
	{
		if provider.api_key.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("providers.{label}.api_key must be non-empty."),
			});
		}
		if provider.model.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("providers.{label}.model must be non-empty."),
			});
		}
		if !provider.temperature.is_finite() || provider.temperature < 0.0 {
			return Err(Error::Validation {
				message: format!(
					"providers.{label}.temperature must be a finite number, zero or greater."
				),
			});
		}
	}
	if cfg.providers.embedding.api_key.trim().is_empty() {
		return Err(Error::Validation {
			message: "providers.embedding.api_key must be non-empty.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}

	validate_retrieval(cfg)?;

	if cfg.research.queries_per_step == 0 {
		return Err(Error::Validation {
			message: "research.queries_per_step must be greater than zero.".to_string(),
		});
	}
	if cfg.research.max_steps == 0 {
		return Err(Error::Validation {
			message: "research.max_steps must be greater than zero.".to_string(),
		});
	}

	for (label, template) in [
		("router", &cfg.prompts.router),
		("more_info", &cfg.prompts.more_info),
		("general", &cfg.prompts.general),
		("research_plan", &cfg.prompts.research_plan),
		("generate_queries", &cfg.prompts.generate_queries),
		("response", &cfg.prompts.response),
	] {
		if template.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("prompts.{label} must be non-empty."),
			});
		}
	}

	if !cfg.prompts.response.contains("{context}") {
		return Err(Error::Validation {
			message: "prompts.response must contain the {context} placeholder.".to_string(),
		});
	}

	Ok(())
}

fn validate_retrieval(cfg: &Config) -> Result<()> {
	let retrieval = &cfg.retrieval;

	match retrieval.provider.as_str() {
		"qdrant" => {
			let Some(qdrant) = retrieval.qdrant.as_ref() else {
				return Err(Error::Validation {
					message: "retrieval.qdrant is required when retrieval.provider is qdrant."
						.to_string(),
				});
			};

			if qdrant.url.trim().is_empty() || qdrant.collection.trim().is_empty() {
				return Err(Error::Validation {
					message: "retrieval.qdrant.url and retrieval.qdrant.collection must be non-empty."
						.to_string(),
				});
			}
		},
		"local" =>
			if retrieval.local.is_none() {
				return Err(Error::Validation {
					message: "retrieval.local is required when retrieval.provider is local."
						.to_string(),
				});
			},
		other => {
			return Err(Error::Validation {
				message: format!(
					"retrieval.provider must be one of {}; got {other:?}.",
					RETRIEVER_PROVIDERS.join(", ")
				),
			});
		},
	}

	if retrieval.k == 0 {
		return Err(Error::Validation {
			message: "retrieval.k must be greater than zero.".to_string(),
		});
	}
	if retrieval.fetch_k < retrieval.k {
		return Err(Error::Validation {
			message: "retrieval.fetch_k must be at least retrieval.k.".to_string(),
		});
	}
	if !SEARCH_TYPES.contains(&retrieval.search_type.as_str()) {
		return Err(Error::Validation {
			message: "retrieval.search_type must be one of similarity or mmr.".to_string(),
		});
	}
	if !retrieval.mmr_lambda.is_finite() || !(0.0..=1.0).contains(&retrieval.mmr_lambda) {
		return Err(Error::Validation {
			message: "retrieval.mmr_lambda must be in the range 0.0-1.0.".to_string(),
		});
	}
	if !QUERY_FAILURE_POLICIES.contains(&retrieval.on_query_failure.as_str()) {
		return Err(Error::Validation {
			message: "retrieval.on_query_failure must be one of skip, tolerate, or abort."
				.to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if let Some(qdrant) = cfg.retrieval.qdrant.as_mut()
		&& qdrant.vector_name.as_deref().map(|name| name.trim().is_empty()).unwrap_or(false)
	{
		qdrant.vector_name = None;
	}

	cfg.retrieval.provider = cfg.retrieval.provider.trim().to_ascii_lowercase();
	cfg.retrieval.search_type = cfg.retrieval.search_type.trim().to_ascii_lowercase();
	cfg.retrieval.on_query_failure = cfg.retrieval.on_query_failure.trim().to_ascii_lowercase();
}

/// Replaces every `env:NAME` api key with the value of `NAME`.
pub fn resolve_env(cfg: &mut Config) -> Result<()> {
	for (label, key) in [
		("providers.query_llm.api_key", &mut cfg.providers.query_llm.api_key),
		("providers.response_llm.api_key", &mut cfg.providers.response_llm.api_key),
		("providers.embedding.api_key", &mut cfg.providers.embedding.api_key),
	] {
		let Some(name) = key.strip_prefix(ENV_PREFIX).map(|name| name.trim().to_string()) else {
			continue;
		};
		let value = env::var(&name)
			.ok()
			.filter(|value| !value.trim().is_empty())
			.ok_or_else(|| Error::MissingEnv { field: label.to_string(), name: name.clone() })?;

		*key = value;
	}

	Ok(())
}
