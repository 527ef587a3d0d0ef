//! Rule-based mood estimate from raw features
//!
//! Five bounded scores are derived from the raw feature vector and matched
//! against an ordered rule table; the first matching rule supplies a fixed
//! probability vector. The table always ends in a catch-all region, so every
//! input lands in exactly one region.

use crate::features::{FeatureSlot, FeatureVector, Raw};
use crate::mood::{Mood, MOOD_COUNT};
use std::fmt;

/// Scores in [0, 1] derived from raw features
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeuristicScores {
    pub tempo: f64,
    pub energy: f64,
    pub brightness: f64,
    pub rhythmic: f64,
    pub harmonic: f64,
}

impl HeuristicScores {
    pub fn from_features(features: &FeatureVector<Raw>) -> Self {
        let bounded =
            |slot: FeatureSlot, full_scale: f64| (features.get(slot) / full_scale).clamp(0.0, 1.0);
        Self {
            tempo: bounded(FeatureSlot::TempoMean, 140.0),
            energy: bounded(FeatureSlot::EnergyMean, 0.3),
            brightness: bounded(FeatureSlot::SpectralCentroidMean, 3000.0),
            rhythmic: bounded(FeatureSlot::OnsetStrengthMean, 2.0),
            harmonic: bounded(FeatureSlot::HarmonicMean, 0.5),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeuristicRegion {
    HighTempoHighEnergy,
    ModerateTempoEnergy,
    LowTempoLowEnergy,
    BrightHarmonic,
    Mixed,
}

impl HeuristicRegion {
    pub fn name(self) -> &'static str {
        match self {
            HeuristicRegion::HighTempoHighEnergy => "high-tempo/high-energy",
            HeuristicRegion::ModerateTempoEnergy => "moderate-tempo/moderate-energy",
            HeuristicRegion::LowTempoLowEnergy => "low-tempo/low-energy",
            HeuristicRegion::BrightHarmonic => "bright+harmonic",
            HeuristicRegion::Mixed => "mixed",
        }
    }
}

impl fmt::Display for HeuristicRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Probabilities keyed by mood, stored in [`Mood::ALL`] order
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoodWeights([f64; MOOD_COUNT]);

impl MoodWeights {
    /// Scale raw hand-tuned weights so they sum to 1.0
    pub fn normalized(calm: f64, energetic: f64, happy: f64, sad: f64) -> Self {
        let total = calm + energetic + happy + sad;
        Self([calm / total, energetic / total, happy / total, sad / total])
    }

    pub fn get(&self, mood: Mood) -> f64 {
        self.0[mood.canonical_index()]
    }

    /// Values in the given class order
    pub fn ordered(&self, classes: &[Mood; MOOD_COUNT]) -> [f64; MOOD_COUNT] {
        classes.map(|mood| self.get(mood))
    }
}

/// One row of the decision table
#[derive(Clone)]
pub struct HeuristicRule {
    pub region: HeuristicRegion,
    pub matches: fn(&HeuristicScores) -> bool,
    pub weights: MoodWeights,
}

impl fmt::Debug for HeuristicRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeuristicRule")
            .field("region", &self.region)
            .field("weights", &self.weights)
            .finish()
    }
}

/// Ordered decision table with a catch-all
#[derive(Debug, Clone)]
pub struct HeuristicTable {
    rules: Vec<HeuristicRule>,
    fallback: MoodWeights,
}

impl HeuristicTable {
    pub fn new(rules: Vec<HeuristicRule>, fallback: MoodWeights) -> Self {
        Self { rules, fallback }
    }

    /// First matching region and its weights
    pub fn evaluate(&self, scores: &HeuristicScores) -> (HeuristicRegion, MoodWeights) {
        self.rules
            .iter()
            .find(|rule| (rule.matches)(scores))
            .map(|rule| (rule.region, rule.weights))
            .unwrap_or((HeuristicRegion::Mixed, self.fallback))
    }

    pub fn rules(&self) -> &[HeuristicRule] {
        &self.rules
    }
}

impl Default for HeuristicTable {
    fn default() -> Self {
        let rules = vec![
            HeuristicRule {
                region: HeuristicRegion::HighTempoHighEnergy,
                matches: |s| s.tempo > 0.7 && s.energy > 0.5,
                weights: MoodWeights::normalized(0.1, 0.5, 0.4, 0.1),
            },
            HeuristicRule {
                region: HeuristicRegion::ModerateTempoEnergy,
                matches: |s| s.tempo > 0.5 && s.energy > 0.3,
                weights: MoodWeights::normalized(0.2, 0.3, 0.5, 0.1),
            },
            HeuristicRule {
                region: HeuristicRegion::LowTempoLowEnergy,
                matches: |s| s.tempo < 0.6 && s.energy < 0.4,
                weights: MoodWeights::normalized(0.5, 0.1, 0.25, 0.3),
            },
            HeuristicRule {
                region: HeuristicRegion::BrightHarmonic,
                matches: |s| s.brightness > 0.6 && s.harmonic > 0.5,
                weights: MoodWeights::normalized(0.2, 0.3, 0.5, 0.1),
            },
        ];
        Self::new(rules, MoodWeights::normalized(0.35, 0.25, 0.35, 0.15))
    }
}
