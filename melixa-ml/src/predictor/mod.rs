//! Mood predictor
//!
//! Combines three probability estimates into one calibrated distribution:
//! 1. Model: normalize with corpus statistics, clip to [-3, 3], run the
//!    classifier artifact
//! 2. Heuristic: ordered rule table over bounded raw-feature scores
//! 3. Prior: uniform
//!
//! The mixing weights depend on the model's own confidence (its largest
//! probability). The blend is then sharpened by raising each value to the
//! calibration temperature and renormalizing.
//!
//! A classifier error or panic never fails the call: the predictor logs a
//! warning and returns the fixed fallback distribution marked as degraded.

pub mod heuristic;

pub use heuristic::{HeuristicRegion, HeuristicRule, HeuristicScores, HeuristicTable, MoodWeights};

use crate::classifier::{ClassifierArtifact, ClassifierError};
use crate::features::{FeatureVector, Raw};
use crate::mood::{Mood, MOOD_COUNT};
use crate::normalization::NormalizationStats;
use melixa_common::config::PredictionTuning;
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// Normalized features are clipped to this many standard deviations
pub const CLIP_LIMIT: f64 = 3.0;

/// Returned (in artifact class order) when prediction fails
pub const FALLBACK_PROBABILITIES: [f64; MOOD_COUNT] = [0.3, 0.25, 0.25, 0.2];

/// Uniform prior
pub const PRIOR_PROBABILITIES: [f64; MOOD_COUNT] = [0.25; MOOD_COUNT];

/// Probability per mood, in a fixed class order, summing to 1.0
#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityDistribution {
    classes: [Mood; MOOD_COUNT],
    values: [f64; MOOD_COUNT],
}

impl ProbabilityDistribution {
    pub fn new(classes: [Mood; MOOD_COUNT], values: [f64; MOOD_COUNT]) -> Self {
        Self { classes, values }
    }

    pub fn classes(&self) -> &[Mood; MOOD_COUNT] {
        &self.classes
    }

    pub fn values(&self) -> &[f64; MOOD_COUNT] {
        &self.values
    }

    pub fn get(&self, mood: Mood) -> Option<f64> {
        self.classes
            .iter()
            .position(|m| *m == mood)
            .map(|i| self.values[i])
    }

    /// Most probable mood and its probability
    ///
    /// Ties go to the first class in class order.
    pub fn argmax(&self) -> (Mood, f64) {
        let mut best = 0;
        for i in 1..MOOD_COUNT {
            if self.values[i] > self.values[best] {
                best = i;
            }
        }
        (self.classes[best], self.values[best])
    }

    pub fn iter(&self) -> impl Iterator<Item = (Mood, f64)> + '_ {
        self.classes.iter().copied().zip(self.values.iter().copied())
    }

    /// Label to probability, for serialization
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        self.iter()
            .map(|(mood, p)| (mood.as_str().to_string(), p))
            .collect()
    }
}

/// Mixing weights of the three estimates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlendWeights {
    pub model: f64,
    pub heuristic: f64,
    pub prior: f64,
}

impl BlendWeights {
    pub const fn new(model: f64, heuristic: f64, prior: f64) -> Self {
        Self {
            model,
            heuristic,
            prior,
        }
    }
}

/// Confidence brackets, weights and calibration of the blend
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlendPolicy {
    /// Model confidence strictly above this uses `high`
    pub high_confidence: f64,
    /// Model confidence strictly above this (and not above `high_confidence`) uses `medium`
    pub medium_confidence: f64,
    pub high: BlendWeights,
    pub medium: BlendWeights,
    pub low: BlendWeights,
    pub temperature: f64,
}

impl Default for BlendPolicy {
    fn default() -> Self {
        Self::from_tuning(&PredictionTuning::default())
    }
}

impl BlendPolicy {
    pub fn from_tuning(tuning: &PredictionTuning) -> Self {
        Self {
            high_confidence: tuning.high_confidence,
            medium_confidence: tuning.medium_confidence,
            high: BlendWeights::new(0.6, 0.3, 0.1),
            medium: BlendWeights::new(0.4, 0.4, 0.2),
            low: BlendWeights::new(0.2, 0.6, 0.2),
            temperature: tuning.temperature,
        }
    }

    /// Weights for a given model confidence
    pub fn weights_for(&self, confidence: f64) -> BlendWeights {
        if confidence > self.high_confidence {
            self.high
        } else if confidence > self.medium_confidence {
            self.medium
        } else {
            self.low
        }
    }

    /// Weighted sum of the three estimates
    pub fn blend(
        &self,
        weights: BlendWeights,
        model: &[f64; MOOD_COUNT],
        heuristic: &[f64; MOOD_COUNT],
    ) -> [f64; MOOD_COUNT] {
        let mut combined = [0.0; MOOD_COUNT];
        for (i, value) in combined.iter_mut().enumerate() {
            *value = weights.model * model[i]
                + weights.heuristic * heuristic[i]
                + weights.prior * PRIOR_PROBABILITIES[i];
        }
        combined
    }

    /// Raise to the temperature and renormalize
    pub fn calibrate(
        &self,
        combined: &[f64; MOOD_COUNT],
    ) -> Result<[f64; MOOD_COUNT], ClassifierError> {
        let powered = combined.map(|p| p.max(0.0).powf(self.temperature));
        let total: f64 = powered.iter().sum();
        if !total.is_finite() {
            return Err(ClassifierError::NonFiniteMass);
        }
        if total <= 0.0 {
            return Err(ClassifierError::ZeroMass);
        }
        Ok(powered.map(|p| p / total))
    }
}

/// Outcome of one prediction
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub distribution: ProbabilityDistribution,
    pub mood: Mood,
    /// Probability of `mood`, in [0, 1]
    pub confidence: f64,
    /// Heuristic region that matched; `None` when degraded
    pub region: Option<HeuristicRegion>,
    /// Largest model probability before blending; `None` when degraded
    pub model_confidence: Option<f64>,
    /// Why the fallback distribution was used
    pub degraded: Option<String>,
}

impl Prediction {
    pub fn is_degraded(&self) -> bool {
        self.degraded.is_some()
    }
}

/// Stateless predictor over immutable shared inputs
#[derive(Debug)]
pub struct MoodPredictor {
    artifact: ClassifierArtifact,
    stats: NormalizationStats,
    heuristics: HeuristicTable,
    policy: BlendPolicy,
    degraded_count: AtomicU64,
}

impl MoodPredictor {
    pub fn new(artifact: ClassifierArtifact, stats: NormalizationStats) -> Self {
        Self::with_policy(artifact, stats, BlendPolicy::default())
    }

    pub fn with_policy(
        artifact: ClassifierArtifact,
        stats: NormalizationStats,
        policy: BlendPolicy,
    ) -> Self {
        Self {
            artifact,
            stats,
            heuristics: HeuristicTable::default(),
            policy,
            degraded_count: AtomicU64::new(0),
        }
    }

    /// Replace the heuristic decision table
    pub fn with_heuristics(mut self, heuristics: HeuristicTable) -> Self {
        self.heuristics = heuristics;
        self
    }

    pub fn artifact(&self) -> &ClassifierArtifact {
        &self.artifact
    }

    pub fn stats(&self) -> &NormalizationStats {
        &self.stats
    }

    pub fn policy(&self) -> &BlendPolicy {
        &self.policy
    }

    /// Number of predictions that fell back since construction
    pub fn degraded_predictions(&self) -> u64 {
        self.degraded_count.load(Ordering::Relaxed)
    }

    /// Calibrated mood distribution for a raw feature vector
    pub fn predict(&self, features: &FeatureVector<Raw>) -> Prediction {
        match self.try_predict(features) {
            Ok(prediction) => prediction,
            Err(e) => self.fallback(e.to_string()),
        }
    }

    /// Heuristic region and its probabilities in artifact class order
    pub fn heuristic_estimate(
        &self,
        features: &FeatureVector<Raw>,
    ) -> (HeuristicRegion, ProbabilityDistribution) {
        let scores = HeuristicScores::from_features(features);
        let (region, weights) = self.heuristics.evaluate(&scores);
        let classes = *self.artifact.classes();
        (
            region,
            ProbabilityDistribution::new(classes, weights.ordered(&classes)),
        )
    }

    /// Fixed fallback distribution, marked degraded with `reason`
    pub fn fallback(&self, reason: String) -> Prediction {
        warn!(reason = %reason, "Mood prediction degraded, using fallback distribution");
        self.degraded_count.fetch_add(1, Ordering::Relaxed);

        let distribution =
            ProbabilityDistribution::new(*self.artifact.classes(), FALLBACK_PROBABILITIES);
        let (mood, confidence) = distribution.argmax();
        Prediction {
            distribution,
            mood,
            confidence,
            region: None,
            model_confidence: None,
            degraded: Some(reason),
        }
    }

    fn try_predict(&self, features: &FeatureVector<Raw>) -> Result<Prediction, ClassifierError> {
        let normalized = self.stats.normalize(features).clipped(CLIP_LIMIT);
        let model = panic::catch_unwind(AssertUnwindSafe(|| self.artifact.predict_proba(&normalized)))
            .map_err(|payload| ClassifierError::Failed(panic_message(payload.as_ref())))??;
        let model_confidence = model.iter().cloned().fold(0.0, f64::max);

        let (region, heuristic) = self.heuristic_estimate(features);
        let weights = self.policy.weights_for(model_confidence);
        let combined = self.policy.blend(weights, &model, heuristic.values());
        let calibrated = self.policy.calibrate(&combined)?;

        let distribution = ProbabilityDistribution::new(*self.artifact.classes(), calibrated);
        let (mood, confidence) = distribution.argmax();
        debug!(
            region = %region,
            model_confidence,
            weights = ?weights,
            mood = %mood,
            confidence,
            "Mood predicted"
        );

        Ok(Prediction {
            distribution,
            mood,
            confidence,
            region: Some(region),
            model_confidence: Some(model_confidence),
            degraded: None,
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown cause".to_string());
    format!("classifier panicked: {}", detail)
}
