//! Pipeline facade
//!
//! Owns the startup-loaded, read-only context (extractor, predictor with its
//! artifact and statistics, raw reference corpus) and runs one request:
//! decode, extract once, then predict and recommend against that same vector.
//!
//! Decode and feature-count errors propagate to the caller. Any other failure
//! in the analysis stage, a panic included, degrades to the fallback
//! distribution with no recommendations.

use crate::audio::decode_audio_bytes;
use crate::classifier::ClassifierArtifact;
use crate::corpus::ReferenceCorpus;
use crate::error::{MoodError, MoodResult};
use crate::features::{
    Extraction, FeatureExtractor, FeatureSlot, FeatureVector, Raw, FEATURE_COUNT,
};
use crate::mood::Mood;
use crate::normalization::{NormalizationStats, StatsSource, DEAM_MEANS};
use crate::predictor::{BlendPolicy, MoodPredictor, Prediction};
use crate::recommender::{recommend, Recommendation};
use chrono::{DateTime, Utc};
use melixa_common::config::PredictionTuning;
use serde::Serialize;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

/// Sample identifiers listed by [`MoodPipeline::info`]
const INFO_SAMPLE_SIZE: usize = 5;

/// Result of one pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct MoodReport {
    pub request_id: Uuid,
    pub analyzed_at: DateTime<Utc>,
    pub mood: Mood,
    /// Probability of `mood` as a percentage, 2 decimals
    pub confidence: f64,
    pub probabilities: BTreeMap<String, f64>,
    /// Similarity already rounded to 2 decimals by the recommender
    pub recommendations: Vec<Recommendation>,
    pub degraded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degraded_reason: Option<String>,
    pub analysis: AnalysisInfo,
    /// Unrounded prediction
    #[serde(skip)]
    pub prediction: Prediction,
}

/// Processing details reported alongside the mood
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisInfo {
    pub tempo: f64,
    pub energy: f64,
    pub duration_seconds: f64,
    pub frame_count: usize,
    pub replaced_slots: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heuristic_region: Option<String>,
    pub processing_ms: u64,
}

/// Model and corpus metadata
#[derive(Debug, Clone, Serialize)]
pub struct PipelineInfo {
    pub classes: Vec<Mood>,
    pub feature_count: usize,
    pub feature_names: Vec<&'static str>,
    pub model: String,
    pub corpus_size: usize,
    pub duplicate_identifiers: Vec<String>,
    pub sample_identifiers: Vec<String>,
    pub normalization: String,
    pub top_k: usize,
    pub sample_rate: u32,
}

/// Outcome of a self-check prediction
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub model_loaded: bool,
    pub corpus_items: usize,
    pub check_mood: Mood,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Immutable per-process context plus the request entry points
pub struct MoodPipeline {
    extractor: FeatureExtractor,
    predictor: MoodPredictor,
    corpus: ReferenceCorpus<Raw>,
    top_k: usize,
}

impl MoodPipeline {
    /// Assemble from loaded parts
    ///
    /// Recommendations compare raw extracted vectors against the raw corpus.
    pub fn new(
        extractor: FeatureExtractor,
        predictor: MoodPredictor,
        corpus: ReferenceCorpus<Raw>,
        top_k: usize,
    ) -> Self {
        Self {
            extractor,
            predictor,
            corpus,
            top_k,
        }
    }

    /// Load artifact and corpus from disk and build the full context
    ///
    /// # Errors
    /// `ArtifactSchema`, `CorpusSchema` or `Io`; all are startup errors.
    pub fn load(
        artifact_path: &Path,
        corpus_path: &Path,
        tuning: &PredictionTuning,
        top_k: usize,
    ) -> MoodResult<Self> {
        tuning.validate()?;
        let corpus = ReferenceCorpus::<Raw>::load(corpus_path)?;
        let stats = NormalizationStats::from_corpus(&corpus);
        let artifact = ClassifierArtifact::load(artifact_path)?;
        let predictor = MoodPredictor::with_policy(artifact, stats, BlendPolicy::from_tuning(tuning));
        Ok(Self::new(FeatureExtractor::new(), predictor, corpus, top_k))
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    pub fn predictor(&self) -> &MoodPredictor {
        &self.predictor
    }

    pub fn corpus(&self) -> &ReferenceCorpus<Raw> {
        &self.corpus
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Analyze an encoded audio file held in memory
    ///
    /// `hint` is the file extension, if known.
    pub fn process(&self, bytes: Vec<u8>, hint: Option<&str>) -> MoodResult<MoodReport> {
        let request_id = Uuid::new_v4();
        let span = info_span!("process", request_id = %request_id);
        let _guard = span.enter();

        let started = Instant::now();
        match decode_audio_bytes(bytes, hint) {
            Ok(audio) => self.run(request_id, &audio.samples, audio.sample_rate, started),
            Err(e @ MoodError::Decode(_)) => Err(e),
            Err(e) => {
                warn!(error = %e, "Audio preparation failed");
                let prediction = self.predictor.fallback("audio preparation failed".to_string());
                Ok(self.finish(request_id, prediction, Vec::new(), None, 0.0, started))
            }
        }
    }

    /// Analyze mono samples that are already at the analysis rate
    pub fn process_samples(&self, samples: &[f32], sample_rate: u32) -> MoodResult<MoodReport> {
        let request_id = Uuid::new_v4();
        let span = info_span!("process", request_id = %request_id);
        let _guard = span.enter();

        self.run(request_id, samples, sample_rate, Instant::now())
    }

    /// Prediction and recommendations for an already extracted vector
    pub fn analyze(&self, features: &FeatureVector<Raw>) -> (Prediction, Vec<Recommendation>) {
        let prediction = self.predictor.predict(features);
        let recommendations = recommend(features, &self.corpus, self.top_k);
        (prediction, recommendations)
    }

    fn run(
        &self,
        request_id: Uuid,
        samples: &[f32],
        sample_rate: u32,
        started: Instant,
    ) -> MoodResult<MoodReport> {
        let extraction = match self.extractor.extract(samples, sample_rate) {
            Ok(extraction) => Some(extraction),
            Err(e @ (MoodError::Decode(_) | MoodError::FeatureCount { .. })) => return Err(e),
            Err(e) => {
                warn!(error = %e, "Feature extraction failed");
                None
            }
        };

        let (prediction, recommendations) = match &extraction {
            Some(extraction) => {
                let features = extraction.features;
                let analysis = panic::catch_unwind(AssertUnwindSafe(|| self.analyze(&features)));
                match analysis {
                    Ok(result) => result,
                    Err(_) => (
                        self.predictor
                            .fallback("internal failure during analysis".to_string()),
                        Vec::new(),
                    ),
                }
            }
            None => (
                self.predictor
                    .fallback("feature extraction failed".to_string()),
                Vec::new(),
            ),
        };

        Ok(self.finish(
            request_id,
            prediction,
            recommendations,
            extraction.as_ref(),
            samples.len() as f64 / sample_rate.max(1) as f64,
            started,
        ))
    }

    fn finish(
        &self,
        request_id: Uuid,
        prediction: Prediction,
        recommendations: Vec<Recommendation>,
        extraction: Option<&Extraction>,
        duration_seconds: f64,
        started: Instant,
    ) -> MoodReport {
        let processing_ms = started.elapsed().as_millis() as u64;
        let report = build_report(
            request_id,
            prediction,
            recommendations,
            extraction,
            duration_seconds,
            processing_ms,
        );
        info!(
            mood = %report.mood,
            confidence = report.confidence,
            recommendations = report.recommendations.len(),
            degraded = report.degraded,
            processing_ms,
            "Analysis complete"
        );
        report
    }

    /// Model and corpus metadata
    pub fn info(&self) -> PipelineInfo {
        let artifact = self.predictor.artifact();
        PipelineInfo {
            classes: artifact.classes().to_vec(),
            feature_count: artifact.feature_count(),
            feature_names: feature_names().to_vec(),
            model: artifact.describe(),
            corpus_size: self.corpus.len(),
            duplicate_identifiers: self.corpus.duplicates().to_vec(),
            sample_identifiers: self
                .corpus
                .iter()
                .take(INFO_SAMPLE_SIZE)
                .map(|item| item.identifier.clone())
                .collect(),
            normalization: match self.predictor.stats().source() {
                StatsSource::Corpus { items } => format!("corpus ({} items)", items),
                StatsSource::DeamFallback => "DEAM fallback".to_string(),
            },
            top_k: self.top_k,
            sample_rate: self.extractor.settings().sample_rate,
        }
    }

    /// Run a self-check prediction on the reference means
    pub fn health_check(&self) -> HealthReport {
        let check = self
            .predictor
            .predict(&FeatureVector::<Raw>::new(DEAM_MEANS));
        debug!(mood = %check.mood, degraded = check.is_degraded(), "Health check");
        HealthReport {
            status: if check.is_degraded() { "degraded" } else { "ok" },
            model_loaded: true,
            corpus_items: self.corpus.len(),
            check_mood: check.mood,
            detail: check.degraded,
        }
    }
}

fn build_report(
    request_id: Uuid,
    prediction: Prediction,
    recommendations: Vec<Recommendation>,
    extraction: Option<&Extraction>,
    duration_seconds: f64,
    processing_ms: u64,
) -> MoodReport {
    let features = extraction.map(|e| e.features);
    let slot = |s: FeatureSlot| features.map(|f| f.get(s)).unwrap_or(0.0);

    MoodReport {
        request_id,
        analyzed_at: Utc::now(),
        mood: prediction.mood,
        confidence: round2(prediction.confidence * 100.0),
        probabilities: prediction.distribution.to_map(),
        recommendations,
        degraded: prediction.is_degraded(),
        degraded_reason: prediction.degraded.clone(),
        analysis: AnalysisInfo {
            tempo: round2(slot(FeatureSlot::TempoMean)),
            energy: slot(FeatureSlot::EnergyMean),
            duration_seconds: extraction
                .map(|e| e.duration_seconds)
                .unwrap_or(duration_seconds),
            frame_count: extraction.map(|e| e.frame_count).unwrap_or(0),
            replaced_slots: extraction
                .map(|e| e.replaced_slots.iter().map(|s| s.name().to_string()).collect())
                .unwrap_or_default(),
            heuristic_region: prediction.region.map(|r| r.name().to_string()),
            processing_ms,
        },
        prediction,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Feature names in slot order, for diagnostics
pub fn feature_names() -> [&'static str; FEATURE_COUNT] {
    FeatureSlot::ALL.map(|s| s.name())
}
