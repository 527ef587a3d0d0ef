//! Classifier artifact
//!
//! A pre-fitted model, its affine input scaler and the ordered class labels,
//! loaded once at startup and read-only afterwards. The only contract the
//! rest of the crate relies on is "probability distribution over the four
//! classes for a 15-value input", expressed by [`MoodClassifier`].

pub mod models;

pub use models::{
    ClassifierModel, GradientBoostingModel, LogisticModel, RegressionTree, SoftVotingModel,
    TreeNode, VotingMember,
};

use crate::error::{MoodError, MoodResult};
use crate::features::{FeatureVector, Normalized, FEATURE_COUNT};
use crate::mood::{Mood, MOOD_COUNT};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;
use tracing::info;

/// Current artifact file format
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// Failure inside a classifier at inference time
///
/// Never surfaces as a request error: the predictor turns it into a
/// degraded prediction.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClassifierError {
    #[error("malformed model: {0}")]
    Malformed(String),

    #[error("non-finite probability for class {index}")]
    NonFinite { index: usize },

    #[error("negative probability {value} for class {index}")]
    Negative { index: usize, value: f64 },

    #[error("probabilities have non-finite total mass")]
    NonFiniteMass,

    #[error("probabilities have zero total mass")]
    ZeroMass,

    #[error("classifier failed: {0}")]
    Failed(String),
}

/// Probability model over the four mood classes
///
/// Output order is the artifact's class order. Implementations must be
/// shareable across request threads.
pub trait MoodClassifier: Send + Sync + fmt::Debug {
    fn predict_proba(
        &self,
        input: &[f64; FEATURE_COUNT],
    ) -> Result<[f64; MOOD_COUNT], ClassifierError>;

    /// Short human-readable description for diagnostics
    fn describe(&self) -> String {
        "custom classifier".to_string()
    }
}

/// Fitted standardization `(x - mean) / scale`
#[derive(Debug, Clone, PartialEq)]
pub struct StandardScaler {
    mean: [f64; FEATURE_COUNT],
    scale: [f64; FEATURE_COUNT],
}

impl StandardScaler {
    /// Zero scale entries are replaced with 1.0 (constant training feature)
    pub fn new(mean: [f64; FEATURE_COUNT], scale: [f64; FEATURE_COUNT]) -> Self {
        Self {
            mean,
            scale: scale.map(|s| if s == 0.0 { 1.0 } else { s }),
        }
    }

    pub fn identity() -> Self {
        Self::new([0.0; FEATURE_COUNT], [1.0; FEATURE_COUNT])
    }

    pub fn transform(&self, input: &[f64; FEATURE_COUNT]) -> [f64; FEATURE_COUNT] {
        let mut out = [0.0; FEATURE_COUNT];
        for (i, value) in out.iter_mut().enumerate() {
            *value = (input[i] - self.mean[i]) / self.scale[i];
        }
        out
    }

    fn from_params(params: &ScalerParams) -> MoodResult<Self> {
        let width_error = |name: &str, len: usize| {
            MoodError::ArtifactSchema(format!(
                "scaler {} has width {}, expected {}",
                name, len, FEATURE_COUNT
            ))
        };
        let mean: [f64; FEATURE_COUNT] = params
            .mean
            .as_slice()
            .try_into()
            .map_err(|_| width_error("mean", params.mean.len()))?;
        let scale: [f64; FEATURE_COUNT] = params
            .scale
            .as_slice()
            .try_into()
            .map_err(|_| width_error("scale", params.scale.len()))?;
        if mean.iter().chain(&scale).any(|v| !v.is_finite()) {
            return Err(MoodError::ArtifactSchema(
                "scaler parameters must be finite".to_string(),
            ));
        }
        Ok(Self::new(mean, scale))
    }

    fn to_params(&self) -> ScalerParams {
        ScalerParams {
            mean: self.mean.to_vec(),
            scale: self.scale.to_vec(),
        }
    }
}

/// Scaler as stored on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerParams {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

/// Artifact as stored on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactBundle {
    #[serde(default = "default_format_version")]
    pub format_version: u32,
    pub classes: Vec<String>,
    pub scaler: ScalerParams,
    pub model: ClassifierModel,
}

fn default_format_version() -> u32 {
    ARTIFACT_FORMAT_VERSION
}

impl ArtifactBundle {
    pub fn new(classes: [Mood; MOOD_COUNT], scaler: &StandardScaler, model: ClassifierModel) -> Self {
        Self {
            format_version: ARTIFACT_FORMAT_VERSION,
            classes: classes.iter().map(|m| m.as_str().to_string()).collect(),
            scaler: scaler.to_params(),
            model,
        }
    }

    pub fn from_json(json: &str) -> MoodResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| MoodError::ArtifactSchema(format!("invalid artifact JSON: {}", e)))
    }

    pub fn to_json(&self) -> MoodResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| MoodError::ArtifactSchema(format!("failed to serialize artifact: {}", e)))
    }

    /// Write atomically (temp file + rename)
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
}

/// Loaded, validated classifier artifact
#[derive(Debug)]
pub struct ClassifierArtifact {
    classifier: Box<dyn MoodClassifier>,
    scaler: StandardScaler,
    classes: [Mood; MOOD_COUNT],
}

impl ClassifierArtifact {
    /// Wrap an arbitrary classifier (used for custom models and test doubles)
    pub fn new(
        classifier: Box<dyn MoodClassifier>,
        scaler: StandardScaler,
        classes: [Mood; MOOD_COUNT],
    ) -> MoodResult<Self> {
        check_distinct(&classes)?;
        Ok(Self {
            classifier,
            scaler,
            classes,
        })
    }

    /// Validate a persisted bundle
    ///
    /// # Errors
    /// `ArtifactSchema` on an unsupported format version, a class list that is
    /// not exactly the four distinct moods, a scaler width other than 15, or a
    /// model whose shapes do not fit that layout.
    pub fn from_bundle(bundle: ArtifactBundle) -> MoodResult<Self> {
        if bundle.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(MoodError::ArtifactSchema(format!(
                "unsupported artifact format version {}",
                bundle.format_version
            )));
        }
        if bundle.classes.len() != MOOD_COUNT {
            return Err(MoodError::ArtifactSchema(format!(
                "artifact has {} classes, expected {}",
                bundle.classes.len(),
                MOOD_COUNT
            )));
        }
        let mut classes = [Mood::Calm; MOOD_COUNT];
        for (slot, label) in classes.iter_mut().zip(&bundle.classes) {
            *slot = label.parse().map_err(MoodError::ArtifactSchema)?;
        }
        check_distinct(&classes)?;

        let scaler = StandardScaler::from_params(&bundle.scaler)?;
        bundle
            .model
            .validate()
            .map_err(|e| MoodError::ArtifactSchema(format!("invalid model: {}", e)))?;

        Ok(Self {
            classifier: Box::new(bundle.model),
            scaler,
            classes,
        })
    }

    pub fn from_json(json: &str) -> MoodResult<Self> {
        Self::from_bundle(ArtifactBundle::from_json(json)?)
    }

    /// Load and validate an artifact file
    pub fn load(path: &Path) -> MoodResult<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| MoodError::io(path, e))?;
        let artifact = Self::from_json(&json)?;
        info!(
            path = %path.display(),
            classes = ?artifact.classes,
            model = %artifact.classifier.describe(),
            "Loaded classifier artifact"
        );
        Ok(artifact)
    }

    /// Class labels in output order
    pub fn classes(&self) -> &[Mood; MOOD_COUNT] {
        &self.classes
    }

    /// Input width the scaler expects
    pub fn feature_count(&self) -> usize {
        FEATURE_COUNT
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    pub fn describe(&self) -> String {
        self.classifier.describe()
    }

    /// Scale the input and run the model
    ///
    /// The output is checked (finite, non-negative, positive mass) and
    /// renormalized to sum to 1.0.
    pub fn predict_proba(
        &self,
        features: &FeatureVector<Normalized>,
    ) -> Result<[f64; MOOD_COUNT], ClassifierError> {
        let scaled = self.scaler.transform(features.as_array());
        let probs = self.classifier.predict_proba(&scaled)?;

        for (index, &value) in probs.iter().enumerate() {
            if !value.is_finite() {
                return Err(ClassifierError::NonFinite { index });
            }
            if value < 0.0 {
                return Err(ClassifierError::Negative { index, value });
            }
        }
        let total: f64 = probs.iter().sum();
        if total <= 0.0 {
            return Err(ClassifierError::ZeroMass);
        }
        Ok(probs.map(|p| p / total))
    }
}

fn check_distinct(classes: &[Mood; MOOD_COUNT]) -> MoodResult<()> {
    for (i, mood) in classes.iter().enumerate() {
        if classes[..i].contains(mood) {
            return Err(MoodError::ArtifactSchema(format!(
                "class '{}' listed more than once",
                mood
            )));
        }
    }
    Ok(())
}
