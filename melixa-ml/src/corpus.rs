//! Reference corpus
//!
//! The immutable collection of previously analyzed tracks that recommendations
//! are drawn from and normalization statistics are computed over. Loaded once
//! at startup from a JSON array of `{ identifier, features }` records.

use crate::error::{MoodError, MoodResult};
use crate::features::{FeatureSpace, FeatureVector, Normalized, Raw, FEATURE_COUNT};
use crate::normalization::NormalizationStats;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::{info, warn};

/// On-disk record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceRecord {
    /// Track identifier; older stores call this field `filename`
    #[serde(alias = "filename")]
    pub identifier: String,
    pub features: Vec<f64>,
}

/// One reference track
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceItem<S: FeatureSpace> {
    pub identifier: String,
    pub features: FeatureVector<S>,
}

/// Ordered, read-only collection of reference items in feature space `S`
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceCorpus<S: FeatureSpace> {
    items: Vec<ReferenceItem<S>>,
    duplicates: Vec<String>,
}

impl<S: FeatureSpace> ReferenceCorpus<S> {
    /// Build a corpus, flagging (not rejecting) duplicate identifiers
    pub fn new(items: Vec<ReferenceItem<S>>) -> Self {
        let mut seen = HashSet::new();
        let mut duplicates = Vec::new();
        for item in &items {
            if !seen.insert(item.identifier.as_str()) && !duplicates.contains(&item.identifier) {
                warn!(identifier = %item.identifier, "Duplicate identifier in reference corpus");
                duplicates.push(item.identifier.clone());
            }
        }
        Self { items, duplicates }
    }

    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            duplicates: Vec::new(),
        }
    }

    /// Validate on-disk records into a corpus
    ///
    /// # Errors
    /// `CorpusSchema` if any record does not carry exactly 15 features.
    pub fn from_records(records: Vec<ReferenceRecord>) -> MoodResult<Self> {
        let items = records
            .into_iter()
            .enumerate()
            .map(|(index, record)| {
                let features = FeatureVector::try_from_slice(&record.features).map_err(|actual| {
                    MoodError::CorpusSchema(format!(
                        "record {} ('{}') has {} features, expected {}",
                        index, record.identifier, actual, FEATURE_COUNT
                    ))
                })?;
                Ok(ReferenceItem {
                    identifier: record.identifier,
                    features,
                })
            })
            .collect::<MoodResult<Vec<_>>>()?;
        Ok(Self::new(items))
    }

    /// Records in insertion order
    pub fn to_records(&self) -> Vec<ReferenceRecord> {
        self.items
            .iter()
            .map(|item| ReferenceRecord {
                identifier: item.identifier.clone(),
                features: item.features.as_slice().to_vec(),
            })
            .collect()
    }

    /// Parse a JSON corpus store
    pub fn from_json(json: &str) -> MoodResult<Self> {
        let records: Vec<ReferenceRecord> = serde_json::from_str(json)
            .map_err(|e| MoodError::CorpusSchema(format!("invalid corpus JSON: {}", e)))?;
        Self::from_records(records)
    }

    pub fn to_json(&self) -> MoodResult<String> {
        serde_json::to_string_pretty(&self.to_records())
            .map_err(|e| MoodError::CorpusSchema(format!("failed to serialize corpus: {}", e)))
    }

    /// Load a corpus store from disk
    pub fn load(path: &Path) -> MoodResult<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| MoodError::io(path, e))?;
        let corpus = Self::from_json(&json)?;
        info!(
            path = %path.display(),
            items = corpus.len(),
            duplicates = corpus.duplicates.len(),
            space = S::NAME,
            "Loaded reference corpus"
        );
        Ok(corpus)
    }

    /// Write the corpus store atomically (temp file + rename)
    pub fn save(&self, path: &Path) -> MoodResult<()> {
        let json = self.to_json()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| MoodError::io(parent, e))?;
        }
        let temp_path = path.with_extension("json.tmp");
        std::fs::write(&temp_path, json).map_err(|e| MoodError::io(&temp_path, e))?;
        std::fs::rename(&temp_path, path).map_err(|e| MoodError::io(path, e))?;
        Ok(())
    }

    pub fn items(&self) -> &[ReferenceItem<S>] {
        &self.items
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReferenceItem<S>> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Identifiers that occur more than once, in order of first repetition
    pub fn duplicates(&self) -> &[String] {
        &self.duplicates
    }
}

impl ReferenceCorpus<Raw> {
    /// Project every item into normalized space with `stats`
    pub fn normalized(&self, stats: &NormalizationStats) -> ReferenceCorpus<Normalized> {
        ReferenceCorpus {
            items: self
                .items
                .iter()
                .map(|item| ReferenceItem {
                    identifier: item.identifier.clone(),
                    features: stats.normalize(&item.features),
                })
                .collect(),
            duplicates: self.duplicates.clone(),
        }
    }
}

impl<S: FeatureSpace> Default for ReferenceCorpus<S> {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(identifier: &str, value: f64, width: usize) -> ReferenceRecord {
        ReferenceRecord {
            identifier: identifier.to_string(),
            features: vec![value; width],
        }
    }

    #[test]
    fn test_wrong_width_is_schema_error() {
        let result = ReferenceCorpus::<Raw>::from_records(vec![
            record("a.mp3", 1.0, 15),
            record("b.mp3", 1.0, 14),
        ]);
        match result {
            Err(MoodError::CorpusSchema(msg)) => {
                assert!(msg.contains("b.mp3"));
                assert!(msg.contains("14"));
            }
            other => panic!("expected CorpusSchema error, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicates_are_flagged_not_rejected() {
        let corpus = ReferenceCorpus::<Raw>::from_records(vec![
            record("a.mp3", 1.0, 15),
            record("b.mp3", 2.0, 15),
            record("a.mp3", 3.0, 15),
            record("a.mp3", 4.0, 15),
        ])
        .unwrap();
        assert_eq!(corpus.len(), 4);
        assert_eq!(corpus.duplicates(), &["a.mp3".to_string()]);
    }

    #[test]
    fn test_filename_alias_accepted() {
        let json = format!(
            r#"[{{"filename": "10.mp3", "features": {:?}}}]"#,
            vec![0.5; FEATURE_COUNT]
        );
        let corpus = ReferenceCorpus::<Raw>::from_json(&json).unwrap();
        assert_eq!(corpus.items()[0].identifier, "10.mp3");
    }

    #[test]
    fn test_malformed_json_is_schema_error() {
        assert!(matches!(
            ReferenceCorpus::<Raw>::from_json("{not json"),
            Err(MoodError::CorpusSchema(_))
        ));
    }

    #[test]
    fn test_empty_corpus() {
        let corpus = ReferenceCorpus::<Raw>::from_json("[]").unwrap();
        assert!(corpus.is_empty());
        assert!(corpus.duplicates().is_empty());
    }
}
