//! Retrieval capability and the backends behind it.
//!
//! A backend is chosen once from `retrieval.provider` by [`build_retriever`]. Every backend embeds
//! the query, fetches `fetch_k` candidates and narrows them to `k` with the configured search type.

use std::sync::Arc;

use crate::{BoxFuture, EmbeddingProvider, Error, Passage, Result};
use tenk_config::{Config, EmbeddingProviderConfig};
use tenk_storage::{Candidate, cosine_similarity, local::LocalStore, qdrant::QdrantStore};

pub trait Retriever
where
	Self: Send + Sync,
{
	/// Returns passages in selection order, which is descending relevance for similarity search.
	fn retrieve<'a>(
		&'a self,
		query: &'a str,
		params: &'a SearchParams,
	) -> BoxFuture<'a, Result<Vec<Passage>>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchType {
	Similarity,
	Mmr,
}
impl SearchType {
	pub fn parse(raw: &str) -> Option<Self> {
		match raw.trim().to_ascii_lowercase().as_str() {
			"similarity" => Some(Self::Similarity),
			"mmr" => Some(Self::Mmr),
			_ => None,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchParams {
	pub k: usize,
	pub fetch_k: usize,
	pub search_type: SearchType,
	pub mmr_lambda: f32,
}
impl SearchParams {
	pub fn from_config(cfg: &tenk_config::Retrieval) -> Result<Self> {
		let Some(search_type) = SearchType::parse(&cfg.search_type) else {
			return Err(Error::ContractViolation {
				message: format!("Unknown search type {:?}.", cfg.search_type),
			});
		};

		Ok(Self {
			k: cfg.k as usize,
			fetch_k: cfg.fetch_k.max(cfg.k) as usize,
			search_type,
			mmr_lambda: cfg.mmr_lambda,
		})
	}
}

impl Default for SearchParams {
	fn default() -> Self {
		Self { k: 3, fetch_k: 10, search_type: SearchType::Similarity, mmr_lambda: 0.5 }
	}
}

/// What to do when a single retrieval call fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
	/// Omit the failed query; fail the invocation only if every call failed.
	#[default]
	Skip,
	/// Omit the failed query and never fail the invocation.
	Tolerate,
	/// Fail the invocation on the first failed call.
	Abort,
}
impl FailurePolicy {
	pub fn parse(raw: &str) -> Option<Self> {
		match raw.trim().to_ascii_lowercase().as_str() {
			"skip" => Some(Self::Skip),
			"tolerate" => Some(Self::Tolerate),
			"abort" => Some(Self::Abort),
			_ => None,
		}
	}

	pub fn from_config(cfg: &tenk_config::Retrieval) -> Result<Self> {
		Self::parse(&cfg.on_query_failure).ok_or_else(|| Error::ContractViolation {
			message: format!("Unknown query failure policy {:?}.", cfg.on_query_failure),
		})
	}
}

pub fn build_retriever(
	cfg: &Config,
	embedding: Arc<dyn EmbeddingProvider>,
) -> Result<Arc<dyn Retriever>> {
	let embedder = QueryEmbedder { cfg: cfg.providers.embedding.clone(), provider: embedding };

	match cfg.retrieval.provider.as_str() {
		"qdrant" => {
			let Some(qdrant) = cfg.retrieval.qdrant.as_ref() else {
				return Err(Error::ContractViolation {
					message: "Qdrant retriever selected without a retrieval.qdrant section."
						.to_string(),
				});
			};
			let store = QdrantStore::new(qdrant)?;

			tracing::info!(collection = %store.collection, "Using Qdrant retriever.");

			Ok(Arc::new(QdrantRetriever { store, embedder }))
		},
		"local" => {
			let Some(local) = cfg.retrieval.local.as_ref() else {
				return Err(Error::ContractViolation {
					message: "Local retriever selected without a retrieval.local section."
						.to_string(),
				});
			};
			let store = LocalStore::open(&local.path)?;
			let expected = cfg.providers.embedding.dimensions as usize;

			if store.dimensions() != expected {
				return Err(Error::ContractViolation {
					message: format!(
						"Snapshot {} has {}-dimensional vectors but the embedding model produces {expected}.",
						local.path.display(),
						store.dimensions()
					),
				});
			}

			tracing::info!(path = %local.path.display(), records = store.len(), "Using local retriever.");

			Ok(Arc::new(LocalRetriever { store, embedder }))
		},
		other => Err(Error::ContractViolation {
			message: format!("Unknown retriever provider {other:?}."),
		}),
	}
}

/// Greedy maximal marginal relevance over `candidates`, returning up to `k` indices in pick order.
pub fn mmr_select(query: &[f32], candidates: &[Vec<f32>], lambda: f32, k: usize) -> Vec<usize> {
	let relevance: Vec<f32> = candidates
		.iter()
		.map(|vector| cosine_similarity(query, vector).unwrap_or(0.0))
		.collect();
	let mut remaining: Vec<usize> = (0..candidates.len()).collect();
	let mut selected: Vec<usize> = Vec::with_capacity(k.min(candidates.len()));

	while selected.len() < k && !remaining.is_empty() {
		let mut best: Option<(usize, f32)> = None;

		for (pos, idx) in remaining.iter().copied().enumerate() {
			let redundancy = selected
				.iter()
				.filter_map(|chosen| cosine_similarity(&candidates[idx], &candidates[*chosen]))
				.fold(None, |acc: Option<f32>, sim| Some(acc.map_or(sim, |max| max.max(sim))))
				.unwrap_or(0.0);
			let score = lambda * relevance[idx] - (1.0 - lambda) * redundancy;

			// Strict comparison keeps the better-ranked candidate on ties.
			if best.map(|(_, current)| score > current).unwrap_or(true) {
				best = Some((pos, score));
			}
		}

		let Some((pos, _)) = best else {
			break;
		};

		selected.push(remaining.remove(pos));
	}

	selected
}

struct QueryEmbedder {
	cfg: EmbeddingProviderConfig,
	provider: Arc<dyn EmbeddingProvider>,
}
impl QueryEmbedder {
	async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
		self.provider.embed(&self.cfg, texts).await.map_err(|err| Error::BackendUnavailable {
			message: format!("Embedding failed: {err}"),
		})
	}

	async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
		let mut vectors = self.embed(&[query.to_string()]).await?;

		vectors.pop().ok_or_else(|| Error::BackendUnavailable {
			message: "Embedding provider returned no vector for the query.".to_string(),
		})
	}

	async fn select(
		&self,
		query_vector: &[f32],
		candidates: Vec<Candidate>,
		params: &SearchParams,
	) -> Result<Vec<Passage>> {
		match params.search_type {
			SearchType::Similarity =>
				Ok(candidates.into_iter().take(params.k).map(|candidate| candidate.passage).collect()),
			SearchType::Mmr => {
				let (passages, vectors): (Vec<Passage>, Vec<Option<Vec<f32>>>) = candidates
					.into_iter()
					.map(|candidate| (candidate.passage, candidate.vector))
					.unzip();
				let vectors = match vectors.into_iter().collect::<Option<Vec<_>>>() {
					Some(vectors) => vectors,
					None => {
						let texts: Vec<String> =
							passages.iter().map(|passage| passage.text.clone()).collect();

						self.embed(&texts).await?
					},
				};
				let order = mmr_select(query_vector, &vectors, params.mmr_lambda, params.k);
				let mut slots: Vec<Option<Passage>> = passages.into_iter().map(Some).collect();

				Ok(order.into_iter().filter_map(|idx| slots[idx].take()).collect())
			},
		}
	}
}

struct QdrantRetriever {
	store: QdrantStore,
	embedder: QueryEmbedder,
}

impl Retriever for QdrantRetriever {
	fn retrieve<'a>(
		&'a self,
		query: &'a str,
		params: &'a SearchParams,
	) -> BoxFuture<'a, Result<Vec<Passage>>> {
		Box::pin(async move {
			let vector = self.embedder.embed_query(query).await?;
			let candidates = self.store.nearest(vector.clone(), params.fetch_k as u32).await?;

			self.embedder.select(&vector, candidates, params).await
		})
	}
}

struct LocalRetriever {
	store: LocalStore,
	embedder: QueryEmbedder,
}

impl Retriever for LocalRetriever {
	fn retrieve<'a>(
		&'a self,
		query: &'a str,
		params: &'a SearchParams,
	) -> BoxFuture<'a, Result<Vec<Passage>>> {
		Box::pin(async move {
			let vector = self.embedder.embed_query(query).await?;
			let candidates = self.store.nearest(&vector, params.fetch_k)?;

			self.embedder.select(&vector, candidates, params).await
		})
	}
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::{AtomicUsize, Ordering};

	use serde_json::Map;

	use super::*;
	use tenk_storage::local::SnapshotRecord;

	/// Maps text to a vector by keyword so tests can reason about similarity.
	struct KeywordEmbedding {
		calls: AtomicUsize,
	}

	impl EmbeddingProvider for KeywordEmbedding {
		fn embed<'a>(
			&'a self,
			_: &'a EmbeddingProviderConfig,
			texts: &'a [String],
		) -> BoxFuture<'a, tenk_providers::Result<Vec<Vec<f32>>>> {
			self.calls.fetch_add(1, Ordering::SeqCst);

			Box::pin(async move { Ok(texts.iter().map(|text| keyword_vector(text)).collect()) })
		}
	}

	fn keyword_vector(text: &str) -> Vec<f32> {
		if text.contains("revenue") {
			vec![1.0, 0.0]
		} else if text.contains("risk") {
			vec![0.0, 1.0]
		} else {
			vec![0.7, 0.7]
		}
	}

	fn embedder() -> (QueryEmbedder, Arc<KeywordEmbedding>) {
		let provider = Arc::new(KeywordEmbedding { calls: AtomicUsize::new(0) });
		let cfg = EmbeddingProviderConfig {
			provider_id: "test".to_string(),
			api_base: "http://localhost".to_string(),
			api_key: "key".to_string(),
			path: "/embeddings".to_string(),
			model: "test-embedding".to_string(),
			dimensions: 2,
			timeout_ms: 1_000,
			default_headers: Map::new(),
		};

		(QueryEmbedder { cfg, provider: provider.clone() }, provider)
	}

	fn candidate(source: &str, text: &str, score: f32, vector: Option<Vec<f32>>) -> Candidate {
		Candidate {
			passage: Passage { source: source.to_string(), text: text.to_string(), score },
			vector,
		}
	}

	fn sources(passages: &[Passage]) -> Vec<&str> {
		passages.iter().map(|passage| passage.source.as_str()).collect()
	}

	fn base_config() -> Config {
		tenk_config::parse(
			r#"
[providers.query_llm]
provider_id = "openai"
api_base = "http://localhost"
api_key = "key"
model = "gpt-4o-mini"

[providers.response_llm]
provider_id = "openai"
api_base = "http://localhost"
api_key = "key"
model = "gpt-4o-mini"

[providers.embedding]
provider_id = "openai"
api_base = "http://localhost"
api_key = "key"
model = "text-embedding-3-small"
dimensions = 2

[retrieval]
provider = "local"

[retrieval.local]
path = "/nonexistent/tenk-snapshot.jsonl"
"#,
		)
		.expect("config failed")
	}

	#[test]
	fn mmr_prefers_diverse_candidates_at_low_lambda() {
		let query = [1.0, 0.0];
		let candidates = vec![vec![1.0, 0.0], vec![1.0, 0.01], vec![0.7, 0.7]];

		assert_eq!(mmr_select(&query, &candidates, 0.3, 2), vec![0, 2]);
		assert_eq!(mmr_select(&query, &candidates, 1.0, 2), vec![0, 1]);
		assert_eq!(mmr_select(&query, &candidates, 0.5, 10).len(), 3);
	}

	#[test]
	fn params_and_policy_come_from_config() {
		let mut cfg = base_config();

		cfg.retrieval.search_type = "mmr".to_string();
		cfg.retrieval.on_query_failure = "abort".to_string();

		let params = SearchParams::from_config(&cfg.retrieval).expect("params failed");

		assert_eq!(params.search_type, SearchType::Mmr);
		assert_eq!((params.k, params.fetch_k), (3, 10));
		assert_eq!(FailurePolicy::from_config(&cfg.retrieval).ok(), Some(FailurePolicy::Abort));

		cfg.retrieval.on_query_failure = "retry".to_string();

		assert!(matches!(
			FailurePolicy::from_config(&cfg.retrieval),
			Err(Error::ContractViolation { .. })
		));
	}

	#[test]
	fn unknown_provider_is_a_contract_violation() {
		let mut cfg = base_config();
		let (_, provider) = embedder();

		cfg.retrieval.provider = "pinecone".to_string();

		let err = build_retriever(&cfg, provider).err().expect("expected error");

		assert!(matches!(err, Error::ContractViolation { .. }), "Unexpected error: {err}");
	}

	#[test]
	fn unreadable_snapshot_is_backend_unavailable() {
		let cfg = base_config();
		let (_, provider) = embedder();
		let err = build_retriever(&cfg, provider).err().expect("expected error");

		assert!(matches!(err, Error::BackendUnavailable { .. }), "Unexpected error: {err}");
	}

	#[test]
	fn snapshot_dimensions_must_match_the_embedding_model() {
		let path = std::env::temp_dir()
			.join(format!("tenk-agent-dims-{}.jsonl", std::process::id()));

		std::fs::write(&path, "{\"source\":\"a.htm\",\"text\":\"a\",\"vector\":[1.0,0.0,0.0]}\n")
			.expect("Failed to write snapshot.");

		let mut cfg = base_config();
		let (_, provider) = embedder();

		if let Some(local) = cfg.retrieval.local.as_mut() {
			local.path = path.clone();
		}

		let mismatched = build_retriever(&cfg, provider.clone()).err();

		cfg.providers.embedding.dimensions = 3;

		let matched = build_retriever(&cfg, provider);

		std::fs::remove_file(&path).ok();

		assert!(matches!(mismatched, Some(Error::ContractViolation { .. })));
		assert!(matched.is_ok());
	}

	#[tokio::test]
	async fn local_similarity_returns_top_k_in_score_order() {
		let (embedder, _) = embedder();
		let store = LocalStore::from_records(vec![
			SnapshotRecord {
				source: "risk.htm".to_string(),
				text: "risk".to_string(),
				vector: vec![0.0, 1.0],
			},
			SnapshotRecord {
				source: "revenue.htm".to_string(),
				text: "revenue".to_string(),
				vector: vec![1.0, 0.0],
			},
			SnapshotRecord {
				source: "mixed.htm".to_string(),
				text: "mixed".to_string(),
				vector: vec![0.7, 0.7],
			},
		])
		.expect("store failed");
		let retriever = LocalRetriever { store, embedder };
		let params = SearchParams { k: 2, ..SearchParams::default() };
		let passages = retriever.retrieve("revenue 2023", &params).await.expect("retrieve failed");

		assert_eq!(sources(&passages), vec!["revenue.htm", "mixed.htm"]);
	}

	#[tokio::test]
	async fn mmr_embeds_candidates_without_vectors_in_one_batch() {
		let (embedder, provider) = embedder();
		let candidates = vec![
			candidate("a.htm", "revenue grew", 0.99, None),
			candidate("b.htm", "revenue grew again", 0.98, None),
			candidate("c.htm", "segment mix", 0.70, None),
		];
		let params = SearchParams {
			k: 2,
			fetch_k: 3,
			search_type: SearchType::Mmr,
			mmr_lambda: 0.3,
		};
		let passages =
			embedder.select(&[1.0, 0.0], candidates, &params).await.expect("select failed");

		assert_eq!(sources(&passages), vec!["a.htm", "c.htm"]);
		assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn mmr_reuses_backend_vectors() {
		let (embedder, provider) = embedder();
		let candidates = vec![
			candidate("a.htm", "x", 0.99, Some(vec![1.0, 0.0])),
			candidate("b.htm", "y", 0.98, Some(vec![0.0, 1.0])),
		];
		let params = SearchParams { search_type: SearchType::Mmr, ..SearchParams::default() };
		let passages =
			embedder.select(&[1.0, 0.0], candidates, &params).await.expect("select failed");

		assert_eq!(passages.len(), 2);
		assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
	}
}
