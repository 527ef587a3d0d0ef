//! Short-time spectral analysis
//!
//! Framing, windowed real FFT, and the per-frame spectral measures used by
//! the extractor: centroid, rolloff, mel power bands, chroma and spectral
//! contrast. Filterbanks are built once and reused for every frame.

use realfft::num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};
use std::f64::consts::PI;
use std::fmt;
use std::sync::Arc;

/// Floor applied before converting power to decibels
pub const AMIN: f64 = 1e-10;

/// Power (or magnitude treated as power) to decibels with an amplitude floor
pub fn power_to_db(value: f64) -> f64 {
    10.0 * value.max(AMIN).log10()
}

/// Centered short-time Fourier transform
///
/// Frames are centered on multiples of the hop length; the signal is
/// zero-padded by half a frame on both sides.
pub struct Stft {
    frame_length: usize,
    hop_length: usize,
    window: Vec<f64>,
    fft: Arc<dyn RealToComplex<f64>>,
}

impl Stft {
    /// Build an STFT with a periodic Hann window
    pub fn new(frame_length: usize, hop_length: usize) -> Self {
        let mut planner = RealFftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(frame_length);
        let window = (0..frame_length)
            .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / frame_length as f64).cos())
            .collect();
        Self {
            frame_length,
            hop_length,
            window,
            fft,
        }
    }

    pub fn frame_length(&self) -> usize {
        self.frame_length
    }

    pub fn hop_length(&self) -> usize {
        self.hop_length
    }

    /// Number of frequency bins per frame (N/2 + 1)
    pub fn bin_count(&self) -> usize {
        self.frame_length / 2 + 1
    }

    /// Number of centered frames for a signal of `sample_count` samples
    pub fn frame_count(&self, sample_count: usize) -> usize {
        1 + sample_count / self.hop_length
    }

    /// Zero-pad the signal by half a frame on both sides
    pub fn pad(&self, samples: &[f64]) -> Vec<f64> {
        let half = self.frame_length / 2;
        let mut padded = vec![0.0; samples.len() + 2 * half];
        padded[half..half + samples.len()].copy_from_slice(samples);
        padded
    }

    /// Frame `index` of an already padded signal
    pub fn frame<'a>(&self, padded: &'a [f64], index: usize) -> &'a [f64] {
        let start = index * self.hop_length;
        &padded[start..start + self.frame_length]
    }

    /// Magnitude spectrum of one frame, written into `magnitudes`
    pub fn magnitudes(
        &self,
        frame: &[f64],
        scratch: &mut StftScratch,
        magnitudes: &mut [f64],
    ) -> Result<(), SpectralError> {
        for ((dst, &sample), &w) in scratch.input.iter_mut().zip(frame).zip(&self.window) {
            *dst = sample * w;
        }
        self.fft
            .process(&mut scratch.input, &mut scratch.output)
            .map_err(|e| SpectralError(e.to_string()))?;
        for (dst, bin) in magnitudes.iter_mut().zip(&scratch.output) {
            *dst = bin.norm();
        }
        Ok(())
    }

    /// Allocate per-call buffers for `magnitudes`
    pub fn scratch(&self) -> StftScratch {
        StftScratch {
            input: self.fft.make_input_vec(),
            output: self.fft.make_output_vec(),
        }
    }
}

/// Reusable FFT buffers, one set per extraction call
pub struct StftScratch {
    input: Vec<f64>,
    output: Vec<Complex<f64>>,
}

/// FFT failure (buffer size mismatch)
#[derive(Debug, Clone)]
pub struct SpectralError(pub String);

impl fmt::Display for SpectralError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FFT failed: {}", self.0)
    }
}

impl std::error::Error for SpectralError {}

/// Center frequency in Hz of every FFT bin
pub fn bin_frequencies(sample_rate: f64, frame_length: usize) -> Vec<f64> {
    (0..=frame_length / 2)
        .map(|k| k as f64 * sample_rate / frame_length as f64)
        .collect()
}

/// Magnitude-weighted mean frequency; 0.0 for a silent frame
pub fn spectral_centroid(magnitudes: &[f64], freqs: &[f64]) -> f64 {
    let total: f64 = magnitudes.iter().sum();
    if total <= AMIN {
        return 0.0;
    }
    magnitudes
        .iter()
        .zip(freqs)
        .map(|(m, f)| m * f)
        .sum::<f64>()
        / total
}

/// Lowest frequency below which `percent` of the magnitude lies
pub fn spectral_rolloff(magnitudes: &[f64], freqs: &[f64], percent: f64) -> f64 {
    let total: f64 = magnitudes.iter().sum();
    let threshold = percent * total;
    let mut cumulative = 0.0;
    for (m, f) in magnitudes.iter().zip(freqs) {
        cumulative += m;
        if cumulative >= threshold {
            return *f;
        }
    }
    freqs.last().copied().unwrap_or(0.0)
}

/// Root-mean-square amplitude of a frame
pub fn frame_rms(frame: &[f64]) -> f64 {
    if frame.is_empty() {
        return 0.0;
    }
    (frame.iter().map(|s| s * s).sum::<f64>() / frame.len() as f64).sqrt()
}

/// Fraction of adjacent sample pairs whose sign differs (zero counts as positive)
pub fn zero_crossing_rate(frame: &[f64]) -> f64 {
    if frame.len() < 2 {
        return 0.0;
    }
    let crossings = frame
        .windows(2)
        .filter(|pair| (pair[0] >= 0.0) != (pair[1] >= 0.0))
        .count();
    crossings as f64 / frame.len() as f64
}

/// Slaney-style Hz to mel conversion (linear below 1 kHz, logarithmic above)
pub fn hz_to_mel(hz: f64) -> f64 {
    const F_SP: f64 = 200.0 / 3.0;
    const MIN_LOG_HZ: f64 = 1000.0;
    let min_log_mel = MIN_LOG_HZ / F_SP;
    let logstep = 6.4f64.ln() / 27.0;
    if hz >= MIN_LOG_HZ {
        min_log_mel + (hz / MIN_LOG_HZ).ln() / logstep
    } else {
        hz / F_SP
    }
}

/// Inverse of [`hz_to_mel`]
pub fn mel_to_hz(mel: f64) -> f64 {
    const F_SP: f64 = 200.0 / 3.0;
    const MIN_LOG_HZ: f64 = 1000.0;
    let min_log_mel = MIN_LOG_HZ / F_SP;
    let logstep = 6.4f64.ln() / 27.0;
    if mel >= min_log_mel {
        MIN_LOG_HZ * (logstep * (mel - min_log_mel)).exp()
    } else {
        F_SP * mel
    }
}

/// Triangular mel filterbank with Slaney area normalization
///
/// Stored sparsely: each band keeps its first bin and its non-zero weights.
pub struct MelFilterbank {
    bands: Vec<(usize, Vec<f64>)>,
}

impl MelFilterbank {
    /// Build `n_mels` bands spanning 0 Hz to Nyquist
    pub fn new(n_mels: usize, sample_rate: f64, frame_length: usize) -> Self {
        let freqs = bin_frequencies(sample_rate, frame_length);
        let mel_max = hz_to_mel(sample_rate / 2.0);
        let hz_points: Vec<f64> = (0..n_mels + 2)
            .map(|i| mel_to_hz(mel_max * i as f64 / (n_mels + 1) as f64))
            .collect();

        let bands = (0..n_mels)
            .map(|band| {
                let lower_edge = hz_points[band];
                let center = hz_points[band + 1];
                let upper_edge = hz_points[band + 2];
                let enorm = 2.0 / (upper_edge - lower_edge);

                let mut start = None;
                let mut weights = Vec::new();
                for (bin, &f) in freqs.iter().enumerate() {
                    let lower = (f - lower_edge) / (center - lower_edge);
                    let upper = (upper_edge - f) / (upper_edge - center);
                    let w = lower.min(upper).max(0.0) * enorm;
                    if w > 0.0 {
                        start.get_or_insert(bin);
                        weights.push(w);
                    } else if start.is_some() {
                        break;
                    }
                }
                (start.unwrap_or(0), weights)
            })
            .collect();

        Self { bands }
    }

    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    /// Mel band energies of one power spectrum, written into `out`
    pub fn apply(&self, power: &[f64], out: &mut [f64]) {
        for ((start, weights), dst) in self.bands.iter().zip(out.iter_mut()) {
            *dst = weights
                .iter()
                .zip(&power[*start..])
                .map(|(w, p)| w * p)
                .sum();
        }
    }
}

/// Pitch-class mapping of FFT bins for 12-bin chroma
pub struct ChromaMap {
    /// (bin, pitch class) for every bin at or above A0
    bins: Vec<(usize, usize)>,
}

impl ChromaMap {
    const MIN_FREQ: f64 = 27.5;

    pub fn new(sample_rate: f64, frame_length: usize) -> Self {
        let bins = bin_frequencies(sample_rate, frame_length)
            .into_iter()
            .enumerate()
            .filter(|(_, f)| *f >= Self::MIN_FREQ)
            .map(|(bin, f)| {
                let midi = 69.0 + 12.0 * (f / 440.0).log2();
                (bin, (midi.round() as i64).rem_euclid(12) as usize)
            })
            .collect();
        Self { bins }
    }

    /// Chroma energies of one power spectrum, scaled so the loudest class is 1.0
    ///
    /// A silent frame yields all zeros.
    pub fn apply(&self, power: &[f64]) -> [f64; 12] {
        let mut chroma = [0.0; 12];
        for &(bin, class) in &self.bins {
            chroma[class] += power[bin];
        }
        let max = chroma.iter().cloned().fold(0.0, f64::max);
        if max > AMIN {
            for c in chroma.iter_mut() {
                *c /= max;
            }
        } else {
            chroma = [0.0; 12];
        }
        chroma
    }
}

/// Octave sub-bands for spectral contrast
pub struct ContrastBands {
    /// Bin index ranges, one per sub-band
    ranges: Vec<(usize, usize)>,
    quantile: f64,
}

impl ContrastBands {
    /// `n_bands` octaves above `fmin`, plus the band below `fmin` (n_bands + 1 total)
    pub fn new(
        sample_rate: f64,
        frame_length: usize,
        fmin: f64,
        n_bands: usize,
        quantile: f64,
    ) -> Self {
        let freqs = bin_frequencies(sample_rate, frame_length);
        let mut edges = vec![0.0];
        edges.extend((0..=n_bands).map(|i| fmin * 2f64.powi(i as i32)));

        let ranges = (0..=n_bands)
            .map(|k| {
                let low = edges[k];
                let high = if k == n_bands { f64::INFINITY } else { edges[k + 1] };
                let first = freqs.iter().position(|&f| f >= low).unwrap_or(freqs.len());
                let last = freqs
                    .iter()
                    .rposition(|&f| f <= high)
                    .map(|i| i + 1)
                    .unwrap_or(first);
                (first, last.max(first))
            })
            .collect();

        Self { ranges, quantile }
    }

    pub fn band_count(&self) -> usize {
        self.ranges.len()
    }

    /// Peak-to-valley contrast in dB of each sub-band, appended to `out`
    pub fn apply(&self, magnitudes: &[f64], sorted: &mut Vec<f64>, out: &mut Vec<f64>) {
        for &(first, last) in &self.ranges {
            if first >= last {
                out.push(0.0);
                continue;
            }
            sorted.clear();
            sorted.extend_from_slice(&magnitudes[first..last]);
            sorted.sort_by(|a, b| a.total_cmp(b));

            let n = ((self.quantile * sorted.len() as f64).round() as usize).max(1);
            let valley = sorted[..n].iter().sum::<f64>() / n as f64;
            let peak = sorted[sorted.len() - n..].iter().sum::<f64>() / n as f64;
            out.push(power_to_db(peak) - power_to_db(valley));
        }
    }
}

/// Rows `1..=count` of an orthonormal DCT-II basis of size `n`
///
/// Row 0 (overall level) is skipped since only the shape coefficients are used.
pub fn dct_rows(n: usize, count: usize) -> Vec<Vec<f64>> {
    let scale = (2.0 / n as f64).sqrt();
    (1..=count)
        .map(|k| {
            (0..n)
                .map(|j| scale * (PI / n as f64 * (j as f64 + 0.5) * k as f64).cos())
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f64 = 22_050.0;

    fn sine_frame(freq: f64, len: usize) -> Vec<f64> {
        (0..len)
            .map(|i| (2.0 * PI * freq * i as f64 / SR).sin())
            .collect()
    }

    #[test]
    fn test_mel_scale_round_trip() {
        for hz in [0.0, 300.0, 999.0, 1000.0, 4000.0, 11025.0] {
            let back = mel_to_hz(hz_to_mel(hz));
            assert!((back - hz).abs() < 1e-6, "{} -> {}", hz, back);
        }
        // Linear region: 200/3 Hz per mel
        assert!((hz_to_mel(200.0) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_sine_peak_lands_in_right_bin() {
        let stft = Stft::new(2048, 512);
        let freq = 1000.0;
        let frame = sine_frame(freq, 2048);
        let mut scratch = stft.scratch();
        let mut mags = vec![0.0; stft.bin_count()];
        stft.magnitudes(&frame, &mut scratch, &mut mags).unwrap();

        let peak_bin = mags
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        let expected = (freq * 2048.0 / SR).round() as usize;
        assert!((peak_bin as i64 - expected as i64).abs() <= 1);

        let freqs = bin_frequencies(SR, 2048);
        let centroid = spectral_centroid(&mags, &freqs);
        assert!((centroid - freq).abs() < 100.0, "centroid {}", centroid);
    }

    #[test]
    fn test_silent_frame_measures_are_zero() {
        let freqs = bin_frequencies(SR, 2048);
        let mags = vec![0.0; freqs.len()];
        assert_eq!(spectral_centroid(&mags, &freqs), 0.0);
        assert_eq!(spectral_rolloff(&mags, &freqs, 0.85), 0.0);
        assert_eq!(ChromaMap::new(SR, 2048).apply(&mags), [0.0; 12]);
    }

    #[test]
    fn test_rolloff_threshold() {
        let freqs = vec![0.0, 100.0, 200.0, 300.0];
        let mags = vec![1.0, 1.0, 1.0, 1.0];
        // 85% of 4.0 = 3.4, reached at the fourth bin
        assert_eq!(spectral_rolloff(&mags, &freqs, 0.85), 300.0);
        assert_eq!(spectral_rolloff(&mags, &freqs, 0.5), 100.0);
    }

    #[test]
    fn test_zero_crossing_rate() {
        let alternating: Vec<f64> = (0..100).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        assert!((zero_crossing_rate(&alternating) - 0.99).abs() < 1e-12);
        assert_eq!(zero_crossing_rate(&[0.5; 64]), 0.0);
    }

    #[test]
    fn test_chroma_a440_is_pitch_class_a() {
        let stft = Stft::new(2048, 512);
        let frame = sine_frame(440.0, 2048);
        let mut scratch = stft.scratch();
        let mut mags = vec![0.0; stft.bin_count()];
        stft.magnitudes(&frame, &mut scratch, &mut mags).unwrap();
        let power: Vec<f64> = mags.iter().map(|m| m * m).collect();

        let chroma = ChromaMap::new(SR, 2048).apply(&power);
        assert_eq!(chroma[9], 1.0);
        assert!(chroma.iter().all(|c| (0.0..=1.0).contains(c)));
    }

    #[test]
    fn test_mel_filterbank_shape() {
        let bank = MelFilterbank::new(128, SR, 2048);
        assert_eq!(bank.band_count(), 128);

        let power = vec![1.0; 1025];
        let mut out = vec![0.0; 128];
        bank.apply(&power, &mut out);
        assert!(out.iter().all(|v| v.is_finite() && *v >= 0.0));
        assert!(out.iter().any(|v| *v > 0.0));
    }

    #[test]
    fn test_contrast_flat_spectrum_is_zero() {
        let bands = ContrastBands::new(SR, 2048, 200.0, 6, 0.02);
        assert_eq!(bands.band_count(), 7);

        let mags = vec![0.3; 1025];
        let mut sorted = Vec::new();
        let mut out = Vec::new();
        bands.apply(&mags, &mut sorted, &mut out);
        assert_eq!(out.len(), 7);
        assert!(out.iter().all(|c| c.abs() < 1e-9));
    }

    #[test]
    fn test_dct_rows_are_orthonormal() {
        let rows = dct_rows(128, 2);
        let dot = |a: &[f64], b: &[f64]| a.iter().zip(b).map(|(x, y)| x * y).sum::<f64>();
        assert!((dot(&rows[0], &rows[0]) - 1.0).abs() < 1e-9);
        assert!(dot(&rows[0], &rows[1]).abs() < 1e-9);
        // A constant input has no shape coefficients
        assert!(dot(&rows[0], &vec![-100.0; 128]).abs() < 1e-9);
    }
}
