//! Serializable classifier models
//!
//! The fitted ensemble is persisted as plain parameters: a multinomial
//! logistic regression, a multiclass gradient-boosted tree ensemble, and a
//! soft-voting combination of either. Shapes are checked once at load time by
//! [`ClassifierModel::validate`]; evaluation still guards tree traversal so a
//! malformed tree yields an error instead of a panic or an endless loop.

use super::{ClassifierError, MoodClassifier};
use crate::features::FEATURE_COUNT;
use crate::mood::MOOD_COUNT;
use serde::{Deserialize, Serialize};

/// Persisted model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClassifierModel {
    Logistic(LogisticModel),
    GradientBoosting(GradientBoostingModel),
    SoftVoting(SoftVotingModel),
}

/// Multinomial logistic regression: softmax(W x + b)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    /// One row of 15 weights per class
    pub coefficients: Vec<Vec<f64>>,
    pub intercepts: Vec<f64>,
}

/// Multiclass gradient boosting with one regression tree per class per stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostingModel {
    /// Initial raw score per class
    pub init: Vec<f64>,
    pub learning_rate: f64,
    /// `stages[i][class]`
    pub stages: Vec<Vec<RegressionTree>>,
}

/// Flat binary regression tree; node 0 is the root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    pub nodes: Vec<TreeNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    /// Go to `left` when `x[feature] <= threshold`, else to `right`
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

/// Weighted average of member probability vectors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoftVotingModel {
    pub members: Vec<VotingMember>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VotingMember {
    #[serde(default = "default_weight")]
    pub weight: f64,
    pub model: ClassifierModel,
}

fn default_weight() -> f64 {
    1.0
}

impl ClassifierModel {
    /// Check every shape and index against the 15-feature / 4-class layout
    pub fn validate(&self) -> Result<(), String> {
        match self {
            ClassifierModel::Logistic(model) => model.validate(),
            ClassifierModel::GradientBoosting(model) => model.validate(),
            ClassifierModel::SoftVoting(model) => model.validate(),
        }
    }

    /// Short human-readable summary
    pub fn summary(&self) -> String {
        match self {
            ClassifierModel::Logistic(_) => "logistic regression".to_string(),
            ClassifierModel::GradientBoosting(model) => {
                format!("gradient boosting ({} stages)", model.stages.len())
            }
            ClassifierModel::SoftVoting(model) => {
                let members: Vec<String> = model.members.iter().map(|m| m.model.summary()).collect();
                format!("soft voting [{}]", members.join(", "))
            }
        }
    }
}

impl MoodClassifier for ClassifierModel {
    fn predict_proba(
        &self,
        input: &[f64; FEATURE_COUNT],
    ) -> Result<[f64; MOOD_COUNT], ClassifierError> {
        match self {
            ClassifierModel::Logistic(model) => model.predict_proba(input),
            ClassifierModel::GradientBoosting(model) => model.predict_proba(input),
            ClassifierModel::SoftVoting(model) => model.predict_proba(input),
        }
    }

    fn describe(&self) -> String {
        self.summary()
    }
}

impl LogisticModel {
    fn validate(&self) -> Result<(), String> {
        if self.coefficients.len() != MOOD_COUNT || self.intercepts.len() != MOOD_COUNT {
            return Err(format!(
                "logistic model needs {} coefficient rows and intercepts, got {} and {}",
                MOOD_COUNT,
                self.coefficients.len(),
                self.intercepts.len()
            ));
        }
        if let Some(row) = self.coefficients.iter().find(|r| r.len() != FEATURE_COUNT) {
            return Err(format!(
                "logistic coefficient row has {} weights, expected {}",
                row.len(),
                FEATURE_COUNT
            ));
        }
        Ok(())
    }

    fn predict_proba(
        &self,
        input: &[f64; FEATURE_COUNT],
    ) -> Result<[f64; MOOD_COUNT], ClassifierError> {
        let mut scores = [0.0; MOOD_COUNT];
        for (class, score) in scores.iter_mut().enumerate() {
            let row = self
                .coefficients
                .get(class)
                .ok_or_else(|| ClassifierError::Malformed("missing coefficient row".into()))?;
            let intercept = self.intercepts.get(class).copied().unwrap_or(0.0);
            *score = intercept + row.iter().zip(input).map(|(w, x)| w * x).sum::<f64>();
        }
        Ok(softmax(scores))
    }
}

impl GradientBoostingModel {
    fn validate(&self) -> Result<(), String> {
        if self.init.len() != MOOD_COUNT {
            return Err(format!(
                "gradient boosting init has {} values, expected {}",
                self.init.len(),
                MOOD_COUNT
            ));
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(format!("invalid learning rate {}", self.learning_rate));
        }
        for (i, stage) in self.stages.iter().enumerate() {
            if stage.len() != MOOD_COUNT {
                return Err(format!(
                    "stage {} has {} trees, expected {}",
                    i,
                    stage.len(),
                    MOOD_COUNT
                ));
            }
            for tree in stage {
                tree.validate().map_err(|e| format!("stage {}: {}", i, e))?;
            }
        }
        Ok(())
    }

    fn predict_proba(
        &self,
        input: &[f64; FEATURE_COUNT],
    ) -> Result<[f64; MOOD_COUNT], ClassifierError> {
        let mut scores = [0.0; MOOD_COUNT];
        for (score, init) in scores.iter_mut().zip(&self.init) {
            *score = *init;
        }
        for stage in &self.stages {
            for (score, tree) in scores.iter_mut().zip(stage) {
                *score += self.learning_rate * tree.evaluate(input)?;
            }
        }
        Ok(softmax(scores))
    }
}

impl RegressionTree {
    fn validate(&self) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        for (i, node) in self.nodes.iter().enumerate() {
            if let TreeNode::Split {
                feature,
                left,
                right,
                threshold,
            } = node
            {
                if *feature >= FEATURE_COUNT {
                    return Err(format!("node {} splits on feature {}", i, feature));
                }
                if *left >= self.nodes.len() || *right >= self.nodes.len() {
                    return Err(format!("node {} has a child index out of range", i));
                }
                if threshold.is_nan() {
                    return Err(format!("node {} has a NaN threshold", i));
                }
            }
        }
        Ok(())
    }

    /// Leaf value reached by `input`
    pub fn evaluate(&self, input: &[f64; FEATURE_COUNT]) -> Result<f64, ClassifierError> {
        let mut index = 0;
        // A valid path visits each node at most once
        for _ in 0..=self.nodes.len() {
            match self.nodes.get(index) {
                Some(TreeNode::Leaf { value }) => return Ok(*value),
                Some(TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let x = input.get(*feature).ok_or_else(|| {
                        ClassifierError::Malformed(format!("feature index {} out of range", feature))
                    })?;
                    index = if x <= threshold { *left } else { *right };
                }
                None => {
                    return Err(ClassifierError::Malformed(format!(
                        "node index {} out of range",
                        index
                    )))
                }
            }
        }
        Err(ClassifierError::Malformed("tree traversal did not terminate".into()))
    }
}

impl SoftVotingModel {
    fn validate(&self) -> Result<(), String> {
        if self.members.is_empty() {
            return Err("soft voting model has no members".to_string());
        }
        let total: f64 = self.members.iter().map(|m| m.weight).sum();
        if self.members.iter().any(|m| !m.weight.is_finite() || m.weight < 0.0) || total <= 0.0 {
            return Err("soft voting weights must be non-negative with a positive sum".to_string());
        }
        for member in &self.members {
            member.model.validate()?;
        }
        Ok(())
    }

    fn predict_proba(
        &self,
        input: &[f64; FEATURE_COUNT],
    ) -> Result<[f64; MOOD_COUNT], ClassifierError> {
        let mut combined = [0.0; MOOD_COUNT];
        let mut total = 0.0;
        for member in &self.members {
            let probs = member.model.predict_proba(input)?;
            for (c, p) in combined.iter_mut().zip(probs) {
                *c += member.weight * p;
            }
            total += member.weight;
        }
        if total <= 0.0 {
            return Err(ClassifierError::ZeroMass);
        }
        Ok(combined.map(|c| c / total))
    }
}

/// Numerically stable softmax
fn softmax(scores: [f64; MOOD_COUNT]) -> [f64; MOOD_COUNT] {
    let max = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let exp = scores.map(|s| (s - max).exp());
    let sum: f64 = exp.iter().sum();
    exp.map(|e| e / sum)
}
