use std::{
	env, fs,
	path::PathBuf,
	time::{SystemTime, UNIX_EPOCH},
};

use tenk_storage::{
	Error,
	local::{LocalStore, SnapshotRecord},
};

fn write_snapshot(name: &str, contents: &str) -> PathBuf {
	let nanos = SystemTime::now().duration_since(UNIX_EPOCH).expect("clock before epoch").as_nanos();
	let path = env::temp_dir().join(format!("tenk-storage-{name}-{}-{nanos}.jsonl", std::process::id()));

	fs::write(&path, contents).expect("Failed to write snapshot.");

	path
}

fn record(source: &str, text: &str, vector: Vec<f32>) -> SnapshotRecord {
	SnapshotRecord { source: source.to_string(), text: text.to_string(), vector }
}

#[test]
fn open_reads_json_lines_and_skips_blank_lines() {
	let path = write_snapshot(
		"open",
		concat!(
			"{\"source\":\"acme-10k-2023.htm\",\"text\":\"Revenue grew 12%.\",\"vector\":[1.0,0.0]}\n",
			"\n",
			"{\"source\":\"acme-10k-2022.htm\",\"text\":\"Revenue grew 8%.\",\"vector\":[0.0,1.0]}\n",
		),
	);
	let store = LocalStore::open(&path).expect("Failed to open snapshot.");

	fs::remove_file(&path).ok();

	assert_eq!(store.len(), 2);
	assert_eq!(store.dimensions(), 2);
}

#[test]
fn open_reports_the_offending_line() {
	let path = write_snapshot(
		"bad-line",
		"{\"source\":\"a\",\"text\":\"t\",\"vector\":[1.0]}\n{\"source\":\"b\"}\n",
	);
	let err = LocalStore::open(&path).expect_err("Expected parse error.");

	fs::remove_file(&path).ok();

	assert!(matches!(err, Error::SerdeJson { line: 2, .. }), "Unexpected error: {err}");
}

#[test]
fn open_missing_file_is_io_error() {
	let err = LocalStore::open(&env::temp_dir().join("tenk-storage-does-not-exist.jsonl"))
		.expect_err("Expected io error.");

	assert!(matches!(err, Error::Io { .. }), "Unexpected error: {err}");
}

#[test]
fn rejects_empty_and_ragged_snapshots() {
	assert!(matches!(LocalStore::from_records(Vec::new()), Err(Error::InvalidSnapshot(_))));

	let ragged = vec![record("a", "one", vec![1.0, 0.0]), record("b", "two", vec![1.0])];

	assert!(matches!(LocalStore::from_records(ragged), Err(Error::InvalidSnapshot(_))));
}

#[test]
fn nearest_ranks_by_cosine_and_keeps_file_order_on_ties() {
	let store = LocalStore::from_records(vec![
		record("far.htm", "unrelated", vec![0.0, 1.0]),
		record("tie-first.htm", "first", vec![2.0, 0.0]),
		record("tie-second.htm", "second", vec![1.0, 0.0]),
		record("close.htm", "close", vec![1.0, 0.2]),
	])
	.expect("Failed to build store.");
	let hits = store.nearest(&[1.0, 0.0], 3).expect("Search failed.");
	let sources: Vec<&str> = hits.iter().map(|hit| hit.passage.source.as_str()).collect();

	assert_eq!(sources, vec!["tie-first.htm", "tie-second.htm", "close.htm"]);
	assert!(hits.iter().all(|hit| hit.vector.is_some()));
	assert!(hits[0].passage.score >= hits[2].passage.score);
}

#[test]
fn nearest_rejects_wrong_dimensions() {
	let store = LocalStore::from_records(vec![record("a", "one", vec![1.0, 0.0])])
		.expect("Failed to build store.");

	assert!(matches!(store.nearest(&[1.0, 0.0, 0.0], 1), Err(Error::InvalidArgument(_))));
}
