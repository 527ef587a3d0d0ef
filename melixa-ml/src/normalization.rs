//! Per-dimension normalization statistics
//!
//! Computed once at startup from the raw reference corpus and read-only
//! afterwards. Every standard deviation carries a small epsilon so that a
//! constant dimension never divides by zero.

use crate::corpus::ReferenceCorpus;
use crate::features::{FeatureVector, Normalized, Raw, FEATURE_COUNT};
use tracing::{info, warn};

/// Added to every standard deviation
pub const STD_EPSILON: f64 = 1e-8;

/// Per-dimension means of the DEAM reference set
pub const DEAM_MEANS: [f64; FEATURE_COUNT] = [
    122.3, 0.175, 1982.97, 0.084, 3599.55, 97.4, -1.13, 0.366, 1.412, 23.05, 0.816, 0.062, 1313.81,
    0.274, 1.516,
];

/// Per-dimension standard deviations of the DEAM reference set
pub const DEAM_STDS: [f64; FEATURE_COUNT] = [
    25.08, 0.063, 564.98, 0.032, 1716.32, 47.68, 22.81, 0.068, 0.375, 2.11, 2.47, 0.021, 677.62,
    0.066, 0.958,
];

/// Where the statistics came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsSource {
    Corpus { items: usize },
    /// Published DEAM statistics, used when the corpus is empty
    DeamFallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizationStats {
    mean: [f64; FEATURE_COUNT],
    std: [f64; FEATURE_COUNT],
    source: StatsSource,
}

impl NormalizationStats {
    /// Build from explicit statistics; `STD_EPSILON` is added to every std
    pub fn new(mean: [f64; FEATURE_COUNT], std: [f64; FEATURE_COUNT], source: StatsSource) -> Self {
        Self {
            mean,
            std: std.map(|s| s.abs() + STD_EPSILON),
            source,
        }
    }

    /// Mean and population std of every dimension over the corpus
    pub fn from_corpus(corpus: &ReferenceCorpus<Raw>) -> Self {
        if corpus.is_empty() {
            warn!("Reference corpus is empty, using DEAM normalization statistics");
            return Self::deam_fallback();
        }

        let n = corpus.len() as f64;
        let mut mean = [0.0; FEATURE_COUNT];
        for item in corpus.iter() {
            for (m, v) in mean.iter_mut().zip(item.features.as_slice()) {
                *m += v / n;
            }
        }
        let mut variance = [0.0; FEATURE_COUNT];
        for item in corpus.iter() {
            for ((var, v), m) in variance
                .iter_mut()
                .zip(item.features.as_slice())
                .zip(&mean)
            {
                *var += (v - m) * (v - m) / n;
            }
        }

        info!(items = corpus.len(), "Computed normalization statistics from corpus");
        Self::new(
            mean,
            variance.map(f64::sqrt),
            StatsSource::Corpus {
                items: corpus.len(),
            },
        )
    }

    pub fn deam_fallback() -> Self {
        Self::new(DEAM_MEANS, DEAM_STDS, StatsSource::DeamFallback)
    }

    /// `(x - mean) / std` per dimension
    pub fn normalize(&self, features: &FeatureVector<Raw>) -> FeatureVector<Normalized> {
        let mut values = [0.0; FEATURE_COUNT];
        for (i, value) in values.iter_mut().enumerate() {
            *value = (features.as_slice()[i] - self.mean[i]) / self.std[i];
        }
        FeatureVector::new(values)
    }

    pub fn mean(&self) -> &[f64; FEATURE_COUNT] {
        &self.mean
    }

    /// Standard deviations, epsilon included
    pub fn std(&self) -> &[f64; FEATURE_COUNT] {
        &self.std
    }

    pub fn source(&self) -> StatsSource {
        self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::ReferenceItem;
    use crate::features::FeatureSlot;

    fn item(id: &str, values: [f64; FEATURE_COUNT]) -> ReferenceItem<Raw> {
        ReferenceItem {
            identifier: id.to_string(),
            features: FeatureVector::new(values),
        }
    }

    #[test]
    fn test_stats_from_corpus() {
        let mut a = [1.0; FEATURE_COUNT];
        let mut b = [1.0; FEATURE_COUNT];
        a[0] = 100.0;
        b[0] = 140.0;
        let corpus = ReferenceCorpus::new(vec![item("a", a), item("b", b)]);

        let stats = NormalizationStats::from_corpus(&corpus);
        assert_eq!(stats.source(), StatsSource::Corpus { items: 2 });
        assert!((stats.mean()[0] - 120.0).abs() < 1e-9);
        assert!((stats.std()[0] - 20.0).abs() < 1e-6);
        // Constant dimension: std is exactly the epsilon
        assert_eq!(stats.std()[1], STD_EPSILON);

        let normalized = stats.normalize(&FeatureVector::new(b));
        assert!((normalized.get(FeatureSlot::TempoMean) - 1.0).abs() < 1e-6);
        assert_eq!(normalized.get(FeatureSlot::EnergyMean), 0.0);
    }

    #[test]
    fn test_empty_corpus_uses_deam_statistics() {
        let stats = NormalizationStats::from_corpus(&ReferenceCorpus::empty());
        assert_eq!(stats.source(), StatsSource::DeamFallback);
        assert_eq!(stats.mean(), &DEAM_MEANS);

        let normalized = stats.normalize(&FeatureVector::new(DEAM_MEANS));
        assert!(normalized.is_zero());
    }

    #[test]
    fn test_normalized_output_is_finite_for_constant_dimension() {
        let corpus = ReferenceCorpus::new(vec![item("a", [2.0; FEATURE_COUNT])]);
        let stats = NormalizationStats::from_corpus(&corpus);
        let normalized = stats.normalize(&FeatureVector::new([1e6; FEATURE_COUNT]));
        assert!(normalized.as_slice().iter().all(|v| v.is_finite()));
    }
}
