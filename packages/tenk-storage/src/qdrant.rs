use std::collections::HashMap;

use qdrant_client::qdrant::{Query, QueryPointsBuilder, ScoredPoint, Value, value::Kind};

use crate::{Candidate, Passage, Result};

pub struct QdrantStore {
	pub client: qdrant_client::Qdrant,
	pub collection: String,
	vector_name: Option<String>,
	text_key: String,
	source_key: String,
}
impl QdrantStore {
	pub fn new(cfg: &tenk_config::QdrantRetrieval) -> Result<Self> {
		let client = qdrant_client::Qdrant::from_url(&cfg.url).build()?;

		Ok(Self {
			client,
			collection: cfg.collection.clone(),
			vector_name: cfg.vector_name.clone(),
			text_key: cfg.text_key.clone(),
			source_key: cfg.source_key.clone(),
		})
	}

	/// Returns up to `limit` points nearest to `vector`, in descending score order.
	pub async fn nearest(&self, vector: Vec<f32>, limit: u32) -> Result<Vec<Candidate>> {
		let mut search = QueryPointsBuilder::new(self.collection.clone())
			.query(Query::new_nearest(vector))
			.with_payload(true)
			.limit(limit as u64);

		if let Some(name) = self.vector_name.as_ref() {
			search = search.using(name.clone());
		}

		let response = self.client.query(search).await?;

		Ok(response.result.into_iter().filter_map(|point| self.to_candidate(point)).collect())
	}

	fn to_candidate(&self, point: ScoredPoint) -> Option<Candidate> {
		let Some(text) = payload_str(&point.payload, &self.text_key) else {
			tracing::warn!(
				collection = %self.collection,
				text_key = %self.text_key,
				"Skipping point without passage text."
			);

			return None;
		};
		let source = payload_str(&point.payload, &self.source_key).unwrap_or("unknown");

		Some(Candidate {
			passage: Passage { source: source.to_string(), text: text.to_string(), score: point.score },
			vector: None,
		})
	}
}

/// Reads a string payload field; dotted keys walk nested objects (`metadata.source`).
fn payload_str<'a>(payload: &'a HashMap<String, Value>, key: &str) -> Option<&'a str> {
	let mut parts = key.split('.');
	let mut value = payload.get(parts.next()?)?;

	for part in parts {
		let Some(Kind::StructValue(inner)) = &value.kind else {
			return None;
		};

		value = inner.fields.get(part)?;
	}

	match &value.kind {
		Some(Kind::StringValue(text)) => Some(text.as_str()),
		_ => None,
	}
}
