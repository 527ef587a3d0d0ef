//! Mood prediction through the public API
//!
//! Covers the rule-based estimate, the model blend with a persisted logistic
//! artifact, and recovery from classifier failures.

mod helpers;

use helpers::{logistic_bundle, reference_records, FailingClassifier};
use melixa_ml::classifier::{ClassifierArtifact, ClassifierError, MoodClassifier, StandardScaler};
use melixa_ml::corpus::ReferenceCorpus;
use melixa_ml::features::{FeatureVector, Raw, FEATURE_COUNT};
use melixa_ml::mood::{Mood, MOOD_COUNT};
use melixa_ml::normalization::NormalizationStats;
use melixa_ml::predictor::heuristic::HeuristicRegion;
use melixa_ml::predictor::{MoodPredictor, FALLBACK_PROBABILITIES};

fn slow_quiet_clip() -> FeatureVector<Raw> {
    FeatureVector::new([
        30.0, 0.05, 1200.0, 0.02, 900.0, 10.0, -5.0, 0.2, 0.3, 15.0, 2.0, 0.01, 200.0, 0.02, 0.1,
    ])
}

fn corpus_predictor() -> MoodPredictor {
    let corpus = ReferenceCorpus::<Raw>::from_records(reference_records()).unwrap();
    let artifact = ClassifierArtifact::from_bundle(logistic_bundle()).unwrap();
    MoodPredictor::new(artifact, NormalizationStats::from_corpus(&corpus))
}

fn double_predictor(classifier: Box<dyn MoodClassifier>, classes: [Mood; MOOD_COUNT]) -> MoodPredictor {
    let artifact = ClassifierArtifact::new(classifier, StandardScaler::identity(), classes).unwrap();
    MoodPredictor::new(artifact, NormalizationStats::deam_fallback())
}

#[test]
fn test_slow_quiet_clip_heuristic_is_calm() {
    let predictor = corpus_predictor();
    let (region, heuristic) = predictor.heuristic_estimate(&slow_quiet_clip());

    assert_eq!(region, HeuristicRegion::LowTempoLowEnergy);
    assert_eq!(region.name(), "low-tempo/low-energy");

    let calm = heuristic.get(Mood::Calm).unwrap();
    assert!(calm >= 0.4, "calm = {}", calm);
    for (mood, value) in heuristic.iter() {
        assert!(calm >= value, "{} = {} beats calm", mood, value);
    }
}

#[test]
fn test_slow_quiet_clip_full_prediction() {
    let predictor = corpus_predictor();
    let prediction = predictor.predict(&slow_quiet_clip());

    assert!(!prediction.is_degraded());
    assert_eq!(prediction.region, Some(HeuristicRegion::LowTempoLowEnergy));
    let total: f64 = prediction.distribution.values().iter().sum();
    assert!((total - 1.0).abs() < 1e-6);
    // Logistic weights push quiet, slow inputs toward calm as well
    assert_eq!(prediction.mood, Mood::Calm);
}

#[test]
fn test_every_reference_track_gets_a_distribution() {
    let predictor = corpus_predictor();
    for record in reference_records() {
        let features = FeatureVector::<Raw>::try_from_slice(&record.features).unwrap();
        let prediction = predictor.predict(&features);

        assert!(!prediction.is_degraded(), "{}", record.identifier);
        let values = prediction.distribution.values();
        assert!(values.iter().all(|v| (0.0..=1.0).contains(v)));
        assert!((values.iter().sum::<f64>() - 1.0).abs() < 1e-6);
        assert_eq!(prediction.confidence, prediction.distribution.argmax().1);
    }
}

#[test]
fn test_failing_classifier_returns_fixed_fallback() {
    let predictor = double_predictor(Box::new(FailingClassifier), Mood::ALL);
    let prediction = predictor.predict(&slow_quiet_clip());

    assert_eq!(prediction.distribution.values(), &[0.3, 0.25, 0.25, 0.2]);
    assert_eq!(prediction.distribution.values(), &FALLBACK_PROBABILITIES);
    assert!(prediction.is_degraded());
    assert_eq!(prediction.region, None);
    assert_eq!(prediction.model_confidence, None);
    assert_eq!(predictor.degraded_predictions(), 1);
}

#[test]
fn test_fallback_follows_artifact_class_order() {
    let classes = [Mood::Sad, Mood::Happy, Mood::Energetic, Mood::Calm];
    let predictor = double_predictor(Box::new(FailingClassifier), classes);
    let prediction = predictor.predict(&slow_quiet_clip());

    assert_eq!(prediction.distribution.values(), &FALLBACK_PROBABILITIES);
    assert_eq!(prediction.distribution.classes(), &classes);
    assert_eq!(prediction.mood, Mood::Sad);
}

#[derive(Debug)]
struct NanClassifier;

impl MoodClassifier for NanClassifier {
    fn predict_proba(
        &self,
        _input: &[f64; FEATURE_COUNT],
    ) -> Result<[f64; MOOD_COUNT], ClassifierError> {
        Ok([0.5, f64::NAN, 0.25, 0.25])
    }
}

#[test]
fn test_non_finite_classifier_output_degrades() {
    let predictor = double_predictor(Box::new(NanClassifier), Mood::ALL);
    let prediction = predictor.predict(&slow_quiet_clip());

    assert!(prediction.is_degraded());
    assert_eq!(prediction.distribution.values(), &FALLBACK_PROBABILITIES);
}

#[test]
fn test_non_finite_features_are_replaced() {
    let predictor = corpus_predictor();
    let mut values = *slow_quiet_clip().as_array();
    values[3] = f64::NAN;
    values[9] = f64::INFINITY;

    let (features, replaced) = FeatureVector::<Raw>::sanitized(values);
    assert_eq!(replaced.len(), 2);
    let prediction = predictor.predict(&features);
    assert!(!prediction.is_degraded());
}
