//! Error types for melixa-ml
//!
//! Severity follows where the error can occur:
//! - Startup (`ArtifactSchema`, `CorpusSchema`, `Io`, `Common`): fatal, abort process start
//! - Per request, user-facing (`Decode`): the input is not usable audio
//! - Per request, internal (`FeatureCount`, `Analysis`): extraction bug, fails that request only
//!
//! Classifier failures are not represented here. The predictor recovers from
//! them locally and reports a degraded prediction instead of an error.

use std::path::PathBuf;
use thiserror::Error;

/// melixa-ml error type
#[derive(Debug, Error)]
pub enum MoodError {
    /// Input cannot be interpreted as audio
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// Feature aggregation produced the wrong number of values
    #[error("Feature count error: expected {expected} features, got {actual}")]
    FeatureCount { expected: usize, actual: usize },

    /// Signal analysis failed (FFT or resampler setup)
    #[error("Analysis error: {0}")]
    Analysis(String),

    /// Persisted classifier artifact does not match the expected schema
    #[error("Classifier artifact schema error: {0}")]
    ArtifactSchema(String),

    /// Reference corpus store does not match the expected schema
    #[error("Reference corpus schema error: {0}")]
    CorpusSchema(String),

    /// File I/O error with the offending path
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// melixa-common error
    #[error("Common error: {0}")]
    Common(#[from] melixa_common::Error),
}

impl MoodError {
    /// Wrap an I/O error together with the path it occurred on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MoodError::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the caller supplied unusable input (4xx-equivalent)
    pub fn is_user_error(&self) -> bool {
        matches!(self, MoodError::Decode(_))
    }

    /// Whether this error belongs to startup configuration and must abort the process
    pub fn is_startup_error(&self) -> bool {
        matches!(
            self,
            MoodError::ArtifactSchema(_)
                | MoodError::CorpusSchema(_)
                | MoodError::Io { .. }
                | MoodError::Common(_)
        )
    }
}

/// Result type for melixa-ml operations
pub type MoodResult<T> = Result<T, MoodError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(MoodError::Decode("bad header".into()).is_user_error());
        assert!(!MoodError::Decode("bad header".into()).is_startup_error());

        let count = MoodError::FeatureCount {
            expected: 15,
            actual: 14,
        };
        assert!(!count.is_user_error());
        assert!(!count.is_startup_error());

        assert!(MoodError::CorpusSchema("14 features".into()).is_startup_error());
        assert!(MoodError::ArtifactSchema("3 classes".into()).is_startup_error());
    }

    #[test]
    fn test_io_error_mentions_path() {
        let err = MoodError::io(
            "/data/features.json",
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        );
        assert!(err.to_string().contains("/data/features.json"));
    }
}
