//! Corpus snapshot loading and the read-only in-memory store.
//!
//! Snapshot formats (JSON):
//!
//! - legacy: a bare array of `{participant_id, embedding, data}` records
//! - tagged: `{"model": "...", "dimensions": D, "records": [...]}`
//!
//! Legacy snapshots carry no model tag, so the model check is skipped for
//! them with a warning.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};

use crate::semantic::errors::MatchError;
use crate::semantic::rank::{is_degenerate, l2_norm};
use crate::storage;

/// One survey respondent with a precomputed embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusRecord {
    pub participant_id: String,
    pub embedding: Vec<f32>,
    /// Display field name -> value. Null values are dropped.
    #[serde(default, deserialize_with = "string_map_skip_null")]
    pub data: BTreeMap<String, String>,
}

fn string_map_skip_null<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: BTreeMap<String, Option<String>> = BTreeMap::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .filter_map(|(key, value)| value.map(|value| (key, value)))
        .collect())
}

#[derive(Serialize, Deserialize)]
struct TaggedSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
    records: Vec<CorpusRecord>,
}

/// All corpus records, validated and held in memory.
///
/// Immutable after construction. Iteration order is snapshot order.
#[derive(Debug)]
pub struct CorpusStore {
    records: Vec<CorpusRecord>,
    /// Precomputed L2 norms, parallel to `records`
    norms: Vec<f64>,
    dimensions: usize,
    model: Option<String>,
    id_index: HashMap<String, usize>,
}

impl CorpusStore {
    /// Validate records and build the store.
    ///
    /// Fails on an empty record list, a duplicate participant id, or any
    /// vector whose length differs from `dimensions` (or from the first
    /// record when `dimensions` is `None`).
    pub fn from_records(
        records: Vec<CorpusRecord>,
        model: Option<String>,
        dimensions: Option<usize>,
    ) -> Result<Self, MatchError> {
        let first = records.first().ok_or(MatchError::EmptyCorpus)?;
        let dimensions = dimensions.unwrap_or(first.embedding.len());

        let mut id_index = HashMap::with_capacity(records.len());
        let mut norms = Vec::with_capacity(records.len());

        for (idx, record) in records.iter().enumerate() {
            if record.embedding.len() != dimensions {
                return Err(MatchError::DimensionMismatch {
                    context: format!("corpus record '{}'", record.participant_id),
                    expected: dimensions,
                    got: record.embedding.len(),
                });
            }

            if id_index.insert(record.participant_id.clone(), idx).is_some() {
                return Err(MatchError::DuplicateParticipant(
                    record.participant_id.clone(),
                ));
            }

            let norm = l2_norm(&record.embedding);
            if is_degenerate(norm) {
                log::warn!(
                    "corpus record '{}' has a degenerate embedding",
                    record.participant_id
                );
            }
            norms.push(norm);
        }

        Ok(Self {
            records,
            norms,
            dimensions,
            model,
            id_index,
        })
    }

    /// Load a snapshot from disk.
    pub fn load(path: &Path) -> Result<Self, MatchError> {
        let content = std::fs::read(path).map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => MatchError::CorpusNotFound(path.to_path_buf()),
            _ => invalid(path, err.to_string()),
        })?;

        let value: serde_json::Value =
            serde_json::from_slice(&content).map_err(|err| invalid(path, err.to_string()))?;

        let store = match value {
            serde_json::Value::Array(_) => {
                let records: Vec<CorpusRecord> =
                    serde_json::from_value(value).map_err(|err| invalid(path, err.to_string()))?;
                log::warn!(
                    "corpus snapshot {} has no model tag; embedding compatibility is not checked",
                    path.display()
                );
                Self::from_records(records, None, None)?
            }
            serde_json::Value::Object(_) => {
                let snapshot: TaggedSnapshot =
                    serde_json::from_value(value).map_err(|err| invalid(path, err.to_string()))?;
                Self::from_records(snapshot.records, snapshot.model, snapshot.dimensions)?
            }
            _ => {
                return Err(invalid(
                    path,
                    "expected a list of records or a tagged snapshot object".to_string(),
                ))
            }
        };

        log::info!(
            "loaded {} corpus records ({} dimensions) from {}",
            store.len(),
            store.dimensions(),
            path.display()
        );

        Ok(store)
    }

    /// Write a tagged snapshot. Uses atomic write: temp file -> rename.
    pub fn save(&self, path: &Path) -> Result<(), MatchError> {
        let snapshot = TaggedSnapshot {
            model: self.model.clone(),
            dimensions: Some(self.dimensions),
            records: self.records.clone(),
        };

        let content =
            serde_json::to_vec(&snapshot).map_err(|err| invalid(path, err.to_string()))?;
        storage::write_atomic(path, &content).map_err(|err| invalid(path, err.to_string()))?;

        log::info!("saved {} corpus records to {}", self.len(), path.display());
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &CorpusRecord> {
        self.records.iter()
    }

    /// Records paired with their precomputed norms.
    pub(crate) fn iter_with_norms(&self) -> impl Iterator<Item = (&CorpusRecord, f64)> {
        self.records.iter().zip(self.norms.iter().copied())
    }

    pub fn get(&self, participant_id: &str) -> Option<&CorpusRecord> {
        self.id_index
            .get(participant_id)
            .map(|&idx| &self.records[idx])
    }

    /// How often each value of display field `field` occurs.
    ///
    /// Records without the field are not counted.
    pub fn value_counts(&self, field: &str) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for value in self.records.iter().filter_map(|r| r.data.get(field)) {
            *counts.entry(value.clone()).or_insert(0) += 1;
        }
        counts
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

    /// Embedding model tag, if the snapshot carried one.
    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }
}

fn invalid(path: &Path, reason: String) -> MatchError {
    MatchError::InvalidSnapshot {
        path: PathBuf::from(path),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, embedding: Vec<f32>) -> CorpusRecord {
        CorpusRecord {
            participant_id: id.to_string(),
            embedding,
            data: BTreeMap::new(),
        }
    }

    #[test]
    fn test_value_counts_skip_absent_fields() {
        let with = |id: &str, gender: Option<&str>| CorpusRecord {
            data: gender
                .map(|g| BTreeMap::from([("Gender".to_string(), g.to_string())]))
                .unwrap_or_default(),
            ..record(id, vec![1.0, 0.0])
        };
        let store = CorpusStore::from_records(
            vec![with("a", Some("Woman")), with("b", None), with("c", Some("Woman"))],
            None,
            None,
        )
        .unwrap();

        assert_eq!(
            store.value_counts("Gender"),
            BTreeMap::from([("Woman".to_string(), 2)])
        );
        assert!(store.value_counts("Province").is_empty());
    }

    #[test]
    fn test_missing_snapshot_is_corpus_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let result = CorpusStore::load(&dir.path().join("survey_embeddings.json"));
        assert!(matches!(result, Err(MatchError::CorpusNotFound(_))));
    }

    #[test]
    fn test_legacy_snapshot_loads_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("survey_embeddings.json");
        std::fs::write(
            &path,
            r#"[
                {
                    "participant_id": "b",
                    "embedding": [1.0, 0.0],
                    "data": {"Age": "25", "Gender": null}
                },
                {"participant_id": "a", "embedding": [0.0, 1.0], "data": {}},
                {"participant_id": "c", "embedding": [0.5, 0.5]}
            ]"#,
        )
        .unwrap();

        let store = CorpusStore::load(&path).unwrap();
        assert_eq!(store.len(), 3);
        assert_eq!(store.dimensions(), 2);
        assert_eq!(store.model(), None);

        let ids: Vec<&str> = store.iter().map(|r| r.participant_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);

        let first = store.get("b").unwrap();
        assert_eq!(first.data.get("Age").map(String::as_str), Some("25"));
        assert!(!first.data.contains_key("Gender"));
    }

    #[test]
    fn test_mixed_dimensions_rejected_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("survey_embeddings.json");
        std::fs::write(
            &path,
            r#"[
                {"participant_id": "p1", "embedding": [1, 0, 0, 0, 0], "data": {}},
                {"participant_id": "p2", "embedding": [0, 1, 0, 0, 0], "data": {}},
                {"participant_id": "p3", "embedding": [0, 0, 1], "data": {}},
                {"participant_id": "p4", "embedding": [0, 0, 0, 1, 0], "data": {}}
            ]"#,
        )
        .unwrap();

        let result = CorpusStore::load(&path);
        assert!(matches!(
            result,
            Err(MatchError::DimensionMismatch {
                expected: 5,
                got: 3,
                ..
            })
        ));
    }

    #[test]
    fn test_declared_dimensions_are_enforced() {
        let result = CorpusStore::from_records(
            vec![record("p1", vec![1.0, 0.0])],
            Some("model-a".to_string()),
            Some(3),
        );
        assert!(matches!(result, Err(MatchError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_duplicate_participant_rejected() {
        let result = CorpusStore::from_records(
            vec![record("p1", vec![1.0, 0.0]), record("p1", vec![0.0, 1.0])],
            None,
            None,
        );
        assert!(matches!(result, Err(MatchError::DuplicateParticipant(id)) if id == "p1"));
    }

    #[test]
    fn test_empty_snapshot_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("survey_embeddings.json");
        std::fs::write(&path, "[]").unwrap();

        assert!(matches!(CorpusStore::load(&path), Err(MatchError::EmptyCorpus)));
    }

    #[test]
    fn test_garbage_snapshot_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("survey_embeddings.json");
        std::fs::write(&path, "not json at all").unwrap();
        assert!(matches!(
            CorpusStore::load(&path),
            Err(MatchError::InvalidSnapshot { .. })
        ));

        std::fs::write(&path, "42").unwrap();
        assert!(matches!(
            CorpusStore::load(&path),
            Err(MatchError::InvalidSnapshot { .. })
        ));
    }

    #[test]
    fn test_tagged_snapshot_persistence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/survey_embeddings.json");

        let mut data = BTreeMap::new();
        data.insert("Province".to_string(), "ON".to_string());
        let store = CorpusStore::from_records(
            vec![
                CorpusRecord {
                    participant_id: "p1".to_string(),
                    embedding: vec![0.25, -0.5, 1.0],
                    data,
                },
                record("p2", vec![1.0, 1.0, 1.0]),
            ],
            Some("hash-3".to_string()),
            None,
        )
        .unwrap();

        store.save(&path).unwrap();

        let loaded = CorpusStore::load(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.model(), Some("hash-3"));
        assert_eq!(loaded.dimensions(), 3);
        assert_eq!(loaded.get("p1"), store.get("p1"));
    }
}
