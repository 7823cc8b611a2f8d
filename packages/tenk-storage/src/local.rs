use std::{cmp::Ordering, fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{Candidate, Error, Passage, Result, cosine_similarity};

/// One line of a local snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
	pub source: String,
	pub text: String,
	pub vector: Vec<f32>,
}

/// Brute-force cosine index over an embedded passage snapshot held in memory.
#[derive(Debug)]
pub struct LocalStore {
	records: Vec<SnapshotRecord>,
	dimensions: usize,
}
impl LocalStore {
	pub fn open(path: &Path) -> Result<Self> {
		let raw = fs::read_to_string(path)
			.map_err(|err| Error::Io { path: path.to_path_buf(), source: err })?;
		let mut records = Vec::new();

		for (index, line) in raw.lines().enumerate() {
			if line.trim().is_empty() {
				continue;
			}

			let record: SnapshotRecord = serde_json::from_str(line)
				.map_err(|err| Error::SerdeJson { line: index + 1, source: err })?;

			records.push(record);
		}

		let store = Self::from_records(records)?;

		tracing::info!(
			path = %path.display(),
			records = store.len(),
			dimensions = store.dimensions,
			"Local snapshot loaded."
		);

		Ok(store)
	}

	pub fn from_records(records: Vec<SnapshotRecord>) -> Result<Self> {
		let Some(first) = records.first() else {
			return Err(Error::InvalidSnapshot("snapshot contains no records".to_string()));
		};
		let dimensions = first.vector.len();

		if dimensions == 0 {
			return Err(Error::InvalidSnapshot("record vectors must be non-empty".to_string()));
		}
		if let Some(bad) = records.iter().position(|record| record.vector.len() != dimensions) {
			return Err(Error::InvalidSnapshot(format!(
				"record {} has {} dimensions, expected {dimensions}",
				bad + 1,
				records[bad].vector.len()
			)));
		}

		Ok(Self { records, dimensions })
	}

	pub fn len(&self) -> usize {
		self.records.len()
	}

	pub fn is_empty(&self) -> bool {
		self.records.is_empty()
	}

	pub fn dimensions(&self) -> usize {
		self.dimensions
	}

	/// Returns up to `limit` records by descending cosine similarity; ties keep file order.
	pub fn nearest(&self, vector: &[f32], limit: usize) -> Result<Vec<Candidate>> {
		if vector.len() != self.dimensions {
			return Err(Error::InvalidArgument(format!(
				"query vector has {} dimensions, snapshot has {}",
				vector.len(),
				self.dimensions
			)));
		}

		let mut scored: Vec<(f32, &SnapshotRecord)> = self
			.records
			.iter()
			.filter_map(|record| {
				cosine_similarity(vector, &record.vector).map(|score| (score, record))
			})
			.collect();

		scored.sort_by(|(lhs, _), (rhs, _)| rhs.partial_cmp(lhs).unwrap_or(Ordering::Equal));
		scored.truncate(limit);

		Ok(scored
			.into_iter()
			.map(|(score, record)| Candidate {
				passage: Passage {
					source: record.source.clone(),
					text: record.text.clone(),
					score,
				},
				vector: Some(record.vector.clone()),
			})
			.collect())
	}
}
