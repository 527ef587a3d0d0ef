//! melixa-ml library interface
//!
//! Mood prediction and content-based recommendation for short audio clips.
//! One request flows through:
//! - `audio`: decode and resample to the analysis rate
//! - `features`: 15-value summary vector
//! - `predictor`: classifier output blended with rule-based estimates
//! - `recommender`: nearest reference tracks
//!
//! `pipeline` ties these together over the read-only context loaded at startup.

pub mod audio;
pub mod classifier;
pub mod corpus;
pub mod error;
pub mod features;
pub mod mood;
pub mod normalization;
pub mod pipeline;
pub mod predictor;
pub mod recommender;

pub use crate::classifier::{ClassifierArtifact, ClassifierError, MoodClassifier};
pub use crate::corpus::{ReferenceCorpus, ReferenceItem, ReferenceRecord};
pub use crate::error::{MoodError, MoodResult};
pub use crate::features::{FeatureExtractor, FeatureSlot, FeatureVector, Normalized, Raw, FEATURE_COUNT};
pub use crate::mood::Mood;
pub use crate::normalization::NormalizationStats;
pub use crate::pipeline::{MoodPipeline, MoodReport};
pub use crate::predictor::{MoodPredictor, Prediction, ProbabilityDistribution};
pub use crate::recommender::{recommend, Recommendation};
