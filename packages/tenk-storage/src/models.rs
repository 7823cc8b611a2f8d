use serde::{Deserialize, Serialize};

/// A scored unit of retrieved filing text, used as citation evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
	pub source: String,
	pub text: String,
	/// Backend similarity; higher is more relevant.
	pub score: f32,
}

/// A backend hit before the final `k` are selected.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
	pub passage: Passage,
	pub vector: Option<Vec<f32>>,
}

pub fn cosine_similarity(lhs: &[f32], rhs: &[f32]) -> Option<f32> {
	if lhs.is_empty() || lhs.len() != rhs.len() {
		return None;
	}

	let mut dot = 0.0_f32;
	let mut lhs_norm = 0.0_f32;
	let mut rhs_norm = 0.0_f32;

	for (l, r) in lhs.iter().zip(rhs.iter()) {
		dot += l * r;
		lhs_norm += l * l;
		rhs_norm += r * r;
	}

	if lhs_norm <= f32::EPSILON || rhs_norm <= f32::EPSILON {
		return None;
	}

	Some((dot / (lhs_norm.sqrt() * rhs_norm.sqrt())).clamp(-1.0, 1.0))
}
