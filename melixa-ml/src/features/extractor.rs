//! Audio feature extractor
//!
//! Turns a mono signal at the analysis rate into the 15-slot raw feature
//! vector: rhythm, energy, spectral shape, timbre, harmony, onset and
//! texture summaries, each aggregated over frames as a mean (and for five of
//! them, a population standard deviation).
//!
//! # Algorithm
//! 1. Peak-normalize the signal (silence is left as-is)
//! 2. Centered STFT: 2048-sample Hann frames, hop 512
//! 3. Per frame: RMS, zero-crossing rate, centroid, 85% rolloff, chroma,
//!    octave-band contrast and 128 mel power bands
//! 4. Mel power to dB (80 dB dynamic range), timbre coefficients 1 and 2 via DCT
//! 5. Onset envelope from the dB mel spectrogram, windowed tempo estimation
//! 6. Aggregate, then replace any non-finite slot with 0.0

use super::rhythm::{onset_strength, TempoEstimator};
use super::spectral::{
    self, bin_frequencies, dct_rows, ChromaMap, ContrastBands, MelFilterbank, Stft,
};
use super::{mean, std_dev, FeatureSlot, FeatureVector, Raw, FEATURE_COUNT};
use crate::error::{MoodError, MoodResult};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Sample rate every signal must have before extraction
pub const ANALYSIS_SAMPLE_RATE: u32 = 22_050;

/// Extractor parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtractorSettings {
    pub sample_rate: u32,
    pub frame_length: usize,
    pub hop_length: usize,
    pub n_mels: usize,
    /// Fraction of spectral magnitude below the rolloff frequency
    pub rolloff_percent: f64,
    /// Lower edge of the first contrast octave (Hz)
    pub contrast_fmin: f64,
    pub contrast_bands: usize,
    pub contrast_quantile: f64,
    /// Dynamic range kept when converting mel power to dB
    pub top_db: f64,
}

impl Default for ExtractorSettings {
    fn default() -> Self {
        Self {
            sample_rate: ANALYSIS_SAMPLE_RATE,
            frame_length: 2048,
            hop_length: 512,
            n_mels: 128,
            rolloff_percent: 0.85,
            contrast_fmin: 200.0,
            contrast_bands: 6,
            contrast_quantile: 0.02,
            top_db: 80.0,
        }
    }
}

/// Result of one extraction
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub features: FeatureVector<Raw>,
    /// Slots whose value was non-finite and replaced with 0.0
    pub replaced_slots: Vec<FeatureSlot>,
    pub frame_count: usize,
    pub duration_seconds: f64,
}

/// Feature extractor
///
/// Filterbanks and the FFT plan are built once in the constructor; `extract`
/// only allocates per-call buffers, so one extractor can be shared across
/// threads.
pub struct FeatureExtractor {
    settings: ExtractorSettings,
    stft: Stft,
    freqs: Vec<f64>,
    mel: MelFilterbank,
    chroma: ChromaMap,
    contrast: ContrastBands,
    timbre_basis: Vec<Vec<f64>>,
    tempo: TempoEstimator,
    /// Total non-finite slot replacements since construction
    replacements: AtomicU64,
}

/// Per-frame series collected during the STFT pass
#[derive(Default)]
struct FrameSeries {
    rms: Vec<f64>,
    zcr: Vec<f64>,
    centroid: Vec<f64>,
    rolloff: Vec<f64>,
    chroma: Vec<f64>,
    contrast: Vec<f64>,
    mel_power: Vec<Vec<f64>>,
}

impl FeatureExtractor {
    /// Create an extractor with default settings
    pub fn new() -> Self {
        Self::with_settings(ExtractorSettings::default())
    }

    /// Create an extractor with custom settings
    pub fn with_settings(settings: ExtractorSettings) -> Self {
        let sr = settings.sample_rate as f64;
        Self {
            stft: Stft::new(settings.frame_length, settings.hop_length),
            freqs: bin_frequencies(sr, settings.frame_length),
            mel: MelFilterbank::new(settings.n_mels, sr, settings.frame_length),
            chroma: ChromaMap::new(sr, settings.frame_length),
            contrast: ContrastBands::new(
                sr,
                settings.frame_length,
                settings.contrast_fmin,
                settings.contrast_bands,
                settings.contrast_quantile,
            ),
            timbre_basis: dct_rows(settings.n_mels, 2),
            tempo: TempoEstimator::new(sr / settings.hop_length as f64),
            replacements: AtomicU64::new(0),
            settings,
        }
    }

    pub fn settings(&self) -> &ExtractorSettings {
        &self.settings
    }

    /// Total count of non-finite slots replaced across all extractions
    pub fn non_finite_replacements(&self) -> u64 {
        self.replacements.load(Ordering::Relaxed)
    }

    /// Extract the raw feature vector of a mono signal
    ///
    /// # Errors
    /// - `Decode` if the signal is empty or not at the analysis sample rate
    /// - `FeatureCount` if aggregation does not yield exactly 15 values
    pub fn extract(&self, samples: &[f32], sample_rate: u32) -> MoodResult<Extraction> {
        if sample_rate != self.settings.sample_rate {
            return Err(MoodError::Decode(format!(
                "expected {} Hz mono signal, got {} Hz",
                self.settings.sample_rate, sample_rate
            )));
        }
        if samples.is_empty() {
            return Err(MoodError::Decode("audio contains no samples".to_string()));
        }

        let signal = peak_normalize(samples);
        let series = self.frame_series(&signal)?;
        let frame_count = series.rms.len();

        let mel_db = self.mel_db(&series.mel_power);
        let (timbre_1, timbre_2): (Vec<f64>, Vec<f64>) = mel_db
            .iter()
            .map(|frame| (dot(&self.timbre_basis[0], frame), dot(&self.timbre_basis[1], frame)))
            .unzip();

        let onset = onset_strength(&mel_db);
        let tempo = self.tempo.summarize(&onset);

        let values = vec![
            tempo.mean_bpm,
            mean(&series.rms),
            mean(&series.centroid),
            mean(&series.zcr),
            mean(&series.rolloff),
            mean(&timbre_1),
            mean(&timbre_2),
            mean(&series.chroma),
            mean(&onset),
            mean(&series.contrast),
            tempo.std_bpm,
            std_dev(&series.rms),
            std_dev(&series.rolloff),
            std_dev(&series.chroma),
            std_dev(&onset),
        ];
        let actual = values.len();
        let array: [f64; FEATURE_COUNT] =
            values.try_into().map_err(|_| MoodError::FeatureCount {
                expected: FEATURE_COUNT,
                actual,
            })?;

        let (features, replaced_slots) = FeatureVector::<Raw>::sanitized(array);
        if !replaced_slots.is_empty() {
            self.replacements
                .fetch_add(replaced_slots.len() as u64, Ordering::Relaxed);
        }

        let duration_seconds = samples.len() as f64 / sample_rate as f64;
        debug!(
            frames = frame_count,
            duration_seconds,
            tempo_bpm = tempo.mean_bpm,
            tempo_windows = tempo.windows,
            replaced = replaced_slots.len(),
            "Extracted audio features"
        );

        Ok(Extraction {
            features,
            replaced_slots,
            frame_count,
            duration_seconds,
        })
    }

    fn frame_series(&self, signal: &[f64]) -> MoodResult<FrameSeries> {
        let padded = self.stft.pad(signal);
        let frames = self.stft.frame_count(signal.len());
        let bins = self.stft.bin_count();

        let mut scratch = self.stft.scratch();
        let mut magnitudes = vec![0.0; bins];
        let mut power = vec![0.0; bins];
        let mut sorted = Vec::with_capacity(bins);
        let mut series = FrameSeries::default();

        for index in 0..frames {
            let frame = self.stft.frame(&padded, index);
            series.rms.push(spectral::frame_rms(frame));
            series.zcr.push(spectral::zero_crossing_rate(frame));

            self.stft
                .magnitudes(frame, &mut scratch, &mut magnitudes)
                .map_err(|e| MoodError::Analysis(e.to_string()))?;
            for (p, m) in power.iter_mut().zip(&magnitudes) {
                *p = m * m;
            }

            series
                .centroid
                .push(spectral::spectral_centroid(&magnitudes, &self.freqs));
            series.rolloff.push(spectral::spectral_rolloff(
                &magnitudes,
                &self.freqs,
                self.settings.rolloff_percent,
            ));
            series.chroma.extend(self.chroma.apply(&power));
            self.contrast
                .apply(&magnitudes, &mut sorted, &mut series.contrast);

            let mut mel = vec![0.0; self.mel.band_count()];
            self.mel.apply(&power, &mut mel);
            series.mel_power.push(mel);
        }

        Ok(series)
    }

    /// Mel power to dB, clamped to `top_db` below the loudest bin of the clip
    fn mel_db(&self, mel_power: &[Vec<f64>]) -> Vec<Vec<f64>> {
        let mut db: Vec<Vec<f64>> = mel_power
            .iter()
            .map(|frame| frame.iter().map(|&p| spectral::power_to_db(p)).collect())
            .collect();
        let max = db
            .iter()
            .flatten()
            .cloned()
            .fold(f64::NEG_INFINITY, f64::max);
        let floor = max - self.settings.top_db;
        for v in db.iter_mut().flatten() {
            *v = v.max(floor);
        }
        db
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Scale so the loudest sample has magnitude 1.0; silence is returned unscaled
fn peak_normalize(samples: &[f32]) -> Vec<f64> {
    let peak = samples
        .iter()
        .map(|s| (*s as f64).abs())
        .filter(|s| s.is_finite())
        .fold(0.0, f64::max);
    let gain = if peak > 0.0 { 1.0 / peak } else { 1.0 };
    samples
        .iter()
        .map(|&s| {
            let s = s as f64;
            if s.is_finite() {
                s * gain
            } else {
                0.0
            }
        })
        .collect()
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
