//! Classifier artifact and reference corpus fixtures

use melixa_ml::classifier::{
    ArtifactBundle, ClassifierError, ClassifierModel, LogisticModel, MoodClassifier,
    StandardScaler,
};
use melixa_ml::corpus::ReferenceRecord;
use melixa_ml::features::{FeatureSlot, FEATURE_COUNT};
use melixa_ml::mood::{Mood, MOOD_COUNT};
use std::path::{Path, PathBuf};

/// Small logistic model leaning on energy and tempo
///
/// Energetic grows with loudness, calm shrinks with it; weights are small so
/// no class saturates on normalized inputs.
pub fn logistic_bundle() -> ArtifactBundle {
    let mut coefficients = vec![vec![0.0; FEATURE_COUNT]; MOOD_COUNT];
    let (tempo, energy) = (FeatureSlot::TempoMean.index(), FeatureSlot::EnergyMean.index());
    coefficients[0][tempo] = -0.4;
    coefficients[0][energy] = -0.6;
    coefficients[1][tempo] = 0.5;
    coefficients[1][energy] = 0.7;
    coefficients[2][tempo] = 0.2;
    coefficients[3][energy] = -0.3;

    ArtifactBundle::new(
        Mood::ALL,
        &StandardScaler::identity(),
        ClassifierModel::Logistic(LogisticModel {
            coefficients,
            intercepts: vec![0.1, 0.0, 0.05, -0.1],
        }),
    )
}

/// Three plausible reference tracks
pub fn reference_records() -> Vec<ReferenceRecord> {
    vec![
        ReferenceRecord {
            identifier: "ambient_drift.mp3".to_string(),
            features: vec![
                68.0, 0.06, 1250.0, 0.05, 2100.0, 60.0, 8.0, 0.42, 0.6, 21.0, 3.5, 0.02, 600.0,
                0.05, 0.3,
            ],
        },
        ReferenceRecord {
            identifier: "club_anthem.mp3".to_string(),
            features: vec![
                128.0, 0.26, 2700.0, 0.12, 5200.0, 140.0, -12.0, 0.31, 2.1, 25.0, 1.2, 0.08,
                1900.0, 0.07, 1.8,
            ],
        },
        ReferenceRecord {
            identifier: "acoustic_ballad.mp3".to_string(),
            features: vec![
                84.0, 0.12, 1700.0, 0.07, 3100.0, 95.0, 4.0, 0.45, 1.1, 22.5, 2.0, 0.04, 1100.0,
                0.06, 0.8,
            ],
        },
    ]
}

/// Write the default artifact and corpus under `dir`
pub fn write_fixture_files(dir: &Path) -> (PathBuf, PathBuf) {
    let artifact_path = dir.join("model").join("artifact.json");
    let corpus_path = dir.join("corpus.json");

    logistic_bundle()
        .save(&artifact_path)
        .expect("Failed to write artifact fixture");
    let json = serde_json::to_string_pretty(&reference_records()).expect("Failed to encode corpus");
    std::fs::write(&corpus_path, json).expect("Failed to write corpus fixture");

    (artifact_path, corpus_path)
}

/// Classifier that always reports an inference failure
#[derive(Debug)]
pub struct FailingClassifier;

impl MoodClassifier for FailingClassifier {
    fn predict_proba(
        &self,
        _input: &[f64; FEATURE_COUNT],
    ) -> Result<[f64; MOOD_COUNT], ClassifierError> {
        Err(ClassifierError::Failed("inference backend unavailable".to_string()))
    }
}

/// Classifier that panics during inference
#[derive(Debug)]
pub struct PanickingClassifier;

impl MoodClassifier for PanickingClassifier {
    fn predict_proba(
        &self,
        _input: &[f64; FEATURE_COUNT],
    ) -> Result<[f64; MOOD_COUNT], ClassifierError> {
        panic!("classifier exploded");
    }
}
