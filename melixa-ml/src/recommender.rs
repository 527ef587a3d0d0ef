//! Content-based recommendations
//!
//! Linear scan over the reference corpus with a composite similarity score
//! `100 * (0.7 * cosine + 0.3 / (1 + euclidean))`. Query and corpus share one
//! feature space by type.

use crate::corpus::ReferenceCorpus;
use crate::features::{FeatureSpace, FeatureVector};
use serde::Serialize;

/// Number of recommendations when the caller does not say otherwise
pub const DEFAULT_TOP_K: usize = 5;

const COSINE_WEIGHT: f64 = 0.7;
const DISTANCE_WEIGHT: f64 = 0.3;

/// One ranked reference track
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub identifier: String,
    /// Similarity in [0, 100]
    pub similarity: f64,
}

/// Cosine similarity in [-1, 1]; 0.0 when either vector is all zeros
pub fn cosine_similarity<S: FeatureSpace>(a: &FeatureVector<S>, b: &FeatureVector<S>) -> f64 {
    let norm_a = a.norm();
    let norm_b = b.norm();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let dot: f64 = a
        .as_slice()
        .iter()
        .zip(b.as_slice())
        .map(|(x, y)| x * y)
        .sum();
    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

pub fn euclidean_distance<S: FeatureSpace>(a: &FeatureVector<S>, b: &FeatureVector<S>) -> f64 {
    a.as_slice()
        .iter()
        .zip(b.as_slice())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

/// Composite similarity, clamped to [0, 100]
///
/// Opposed vectors would score below zero on the cosine term alone; they are
/// reported as 0.
pub fn similarity<S: FeatureSpace>(a: &FeatureVector<S>, b: &FeatureVector<S>) -> f64 {
    let cosine = cosine_similarity(a, b);
    let closeness = 1.0 / (1.0 + euclidean_distance(a, b));
    (100.0 * (COSINE_WEIGHT * cosine + DISTANCE_WEIGHT * closeness)).clamp(0.0, 100.0)
}

/// Score rounded to 2 decimals, the precision reported to callers
fn rounded(score: f64) -> f64 {
    (score * 100.0).round() / 100.0
}

/// Top `k` corpus items by descending similarity
///
/// Scores are rounded to 2 decimals before ranking, so scores that display
/// equal keep corpus insertion order. An empty corpus or `k == 0` yields an
/// empty list.
pub fn recommend<S: FeatureSpace>(
    features: &FeatureVector<S>,
    corpus: &ReferenceCorpus<S>,
    k: usize,
) -> Vec<Recommendation> {
    let mut scored: Vec<(usize, f64)> = corpus
        .iter()
        .enumerate()
        .map(|(index, item)| (index, rounded(similarity(features, &item.features))))
        .collect();

    // Stable sort keeps insertion order among equal scores
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.truncate(k);

    let items = corpus.items();
    scored
        .into_iter()
        .map(|(index, score)| Recommendation {
            identifier: items[index].identifier.clone(),
            similarity: score,
        })
        .collect()
}
