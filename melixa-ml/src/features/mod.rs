//! Feature vectors and the extractor that produces them
//!
//! A feature vector is the fixed 15-slot acoustic summary of one clip. The
//! vector type carries its feature space (`Raw` or `Normalized`) as a type
//! parameter, so a raw query can never be scored against a normalized corpus.

pub mod extractor;
pub mod rhythm;
pub mod spectral;

pub use extractor::{Extraction, ExtractorSettings, FeatureExtractor};

use std::fmt;
use std::marker::PhantomData;
use tracing::warn;

/// Number of slots in every feature vector
pub const FEATURE_COUNT: usize = 15;

/// Semantic meaning of each feature slot, in vector order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureSlot {
    TempoMean,
    EnergyMean,
    SpectralCentroidMean,
    ZeroCrossingRateMean,
    SpectralRolloffMean,
    TimbreCoef1Mean,
    TimbreCoef2Mean,
    HarmonicMean,
    OnsetStrengthMean,
    SpectralContrastMean,
    TempoStd,
    EnergyStd,
    SpectralRolloffStd,
    HarmonicStd,
    OnsetStrengthStd,
}

impl FeatureSlot {
    /// All slots in vector order
    pub const ALL: [FeatureSlot; FEATURE_COUNT] = [
        FeatureSlot::TempoMean,
        FeatureSlot::EnergyMean,
        FeatureSlot::SpectralCentroidMean,
        FeatureSlot::ZeroCrossingRateMean,
        FeatureSlot::SpectralRolloffMean,
        FeatureSlot::TimbreCoef1Mean,
        FeatureSlot::TimbreCoef2Mean,
        FeatureSlot::HarmonicMean,
        FeatureSlot::OnsetStrengthMean,
        FeatureSlot::SpectralContrastMean,
        FeatureSlot::TempoStd,
        FeatureSlot::EnergyStd,
        FeatureSlot::SpectralRolloffStd,
        FeatureSlot::HarmonicStd,
        FeatureSlot::OnsetStrengthStd,
    ];

    /// Position of this slot in the vector
    pub fn index(self) -> usize {
        self as usize
    }

    /// Stable snake_case name used in logs and reports
    pub fn name(self) -> &'static str {
        match self {
            FeatureSlot::TempoMean => "tempo_mean",
            FeatureSlot::EnergyMean => "energy_mean",
            FeatureSlot::SpectralCentroidMean => "spectral_centroid_mean",
            FeatureSlot::ZeroCrossingRateMean => "zero_crossing_rate_mean",
            FeatureSlot::SpectralRolloffMean => "spectral_rolloff_mean",
            FeatureSlot::TimbreCoef1Mean => "timbre_coef_1_mean",
            FeatureSlot::TimbreCoef2Mean => "timbre_coef_2_mean",
            FeatureSlot::HarmonicMean => "harmonic_mean",
            FeatureSlot::OnsetStrengthMean => "onset_strength_mean",
            FeatureSlot::SpectralContrastMean => "spectral_contrast_mean",
            FeatureSlot::TempoStd => "tempo_std",
            FeatureSlot::EnergyStd => "energy_std",
            FeatureSlot::SpectralRolloffStd => "spectral_rolloff_std",
            FeatureSlot::HarmonicStd => "harmonic_std",
            FeatureSlot::OnsetStrengthStd => "onset_strength_std",
        }
    }
}

impl fmt::Display for FeatureSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

mod sealed {
    pub trait Sealed {}
}

/// Marker trait for feature spaces
pub trait FeatureSpace: sealed::Sealed + 'static {
    /// Name used in logs
    const NAME: &'static str;
}

/// Features exactly as extracted from audio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Raw {}

/// Features standardized with corpus statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalized {}

impl sealed::Sealed for Raw {}
impl sealed::Sealed for Normalized {}

impl FeatureSpace for Raw {
    const NAME: &'static str = "raw";
}

impl FeatureSpace for Normalized {
    const NAME: &'static str = "normalized";
}

/// Fixed-length, finite feature vector in feature space `S`
///
/// Immutable after construction. Every constructor replaces non-finite
/// values with 0.0 and logs the replacement.
pub struct FeatureVector<S: FeatureSpace = Raw> {
    values: [f64; FEATURE_COUNT],
    _space: PhantomData<fn() -> S>,
}

impl<S: FeatureSpace> FeatureVector<S> {
    /// Build a vector, replacing non-finite values with 0.0
    pub fn new(values: [f64; FEATURE_COUNT]) -> Self {
        Self::sanitized(values).0
    }

    /// Build a vector and report which slots were replaced
    ///
    /// Each replacement is logged at warn level so repeated degenerate input
    /// stays visible instead of being silently absorbed.
    pub fn sanitized(mut values: [f64; FEATURE_COUNT]) -> (Self, Vec<FeatureSlot>) {
        let mut replaced = Vec::new();
        for slot in FeatureSlot::ALL {
            let value = values[slot.index()];
            if !value.is_finite() {
                warn!(
                    slot = slot.name(),
                    value = %value,
                    space = S::NAME,
                    "Non-finite feature replaced with 0.0"
                );
                values[slot.index()] = 0.0;
                replaced.push(slot);
            }
        }
        (
            Self {
                values,
                _space: PhantomData,
            },
            replaced,
        )
    }

    /// Build a vector from a slice, requiring exactly `FEATURE_COUNT` values
    ///
    /// Returns the actual length on mismatch.
    pub fn try_from_slice(values: &[f64]) -> Result<Self, usize> {
        let array: [f64; FEATURE_COUNT] = values.try_into().map_err(|_| values.len())?;
        Ok(Self::new(array))
    }

    /// All-zero vector
    pub fn zeros() -> Self {
        Self {
            values: [0.0; FEATURE_COUNT],
            _space: PhantomData,
        }
    }

    /// Value of one slot
    pub fn get(&self, slot: FeatureSlot) -> f64 {
        self.values[slot.index()]
    }

    /// Values in slot order
    pub fn as_array(&self) -> &[f64; FEATURE_COUNT] {
        &self.values
    }

    /// Values as a slice
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// Euclidean norm
    pub fn norm(&self) -> f64 {
        self.values.iter().map(|v| v * v).sum::<f64>().sqrt()
    }

    /// True when every slot is exactly zero
    pub fn is_zero(&self) -> bool {
        self.values.iter().all(|&v| v == 0.0)
    }

    /// Clamp every slot into `[-limit, limit]`
    pub fn clipped(&self, limit: f64) -> Self {
        Self {
            values: self.values.map(|v| v.clamp(-limit, limit)),
            _space: PhantomData,
        }
    }
}

impl<S: FeatureSpace> Clone for FeatureVector<S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S: FeatureSpace> Copy for FeatureVector<S> {}

impl<S: FeatureSpace> PartialEq for FeatureVector<S> {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
    }
}

impl<S: FeatureSpace> fmt::Debug for FeatureVector<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeatureVector")
            .field("space", &S::NAME)
            .field("values", &self.values)
            .finish()
    }
}

/// Arithmetic mean; 0.0 for an empty series
pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation (ddof = 0); 0.0 for an empty series
pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}
