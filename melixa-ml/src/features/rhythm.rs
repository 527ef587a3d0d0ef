//! Onset strength and tempo estimation

use super::{mean, std_dev};

/// Onset strength envelope from a dB mel spectrogram
///
/// Mean over mel bands of the positive first difference. Frame 0 has no
/// predecessor and is 0.0.
pub fn onset_strength(mel_db: &[Vec<f64>]) -> Vec<f64> {
    let mut envelope = Vec::with_capacity(mel_db.len());
    if mel_db.is_empty() {
        return envelope;
    }
    envelope.push(0.0);
    for pair in mel_db.windows(2) {
        let (prev, cur) = (&pair[0], &pair[1]);
        let flux: f64 = cur
            .iter()
            .zip(prev)
            .map(|(c, p)| (c - p).max(0.0))
            .sum();
        envelope.push(if cur.is_empty() { 0.0 } else { flux / cur.len() as f64 });
    }
    envelope
}

/// Windowed autocorrelation tempo estimator
///
/// The onset envelope is cut into overlapping windows. Each window yields one
/// local tempo: the autocorrelation lag with the highest score after a
/// log-normal prior centered on `start_bpm` is applied. Windows with no
/// onset energy produce no estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempoEstimator {
    /// Onset envelope frames per second
    pub frame_rate: f64,
    pub window_frames: usize,
    pub window_hop: usize,
    pub min_bpm: f64,
    pub max_bpm: f64,
    pub start_bpm: f64,
    /// Width of the tempo prior in octaves
    pub prior_octaves: f64,
}

/// Summary of local tempo estimates over a clip
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TempoSummary {
    pub mean_bpm: f64,
    pub std_bpm: f64,
    pub windows: usize,
}

impl TempoEstimator {
    pub fn new(frame_rate: f64) -> Self {
        Self {
            frame_rate,
            window_frames: 384,
            window_hop: 96,
            min_bpm: 30.0,
            max_bpm: 300.0,
            start_bpm: 120.0,
            prior_octaves: 1.0,
        }
    }

    /// Mean and population std of the local tempo estimates
    ///
    /// Both are 0.0 when no window carries onset energy.
    pub fn summarize(&self, envelope: &[f64]) -> TempoSummary {
        let tempi = self.local_tempi(envelope);
        TempoSummary {
            mean_bpm: mean(&tempi),
            std_bpm: std_dev(&tempi),
            windows: tempi.len(),
        }
    }

    /// One tempo estimate per window that has onset energy
    pub fn local_tempi(&self, envelope: &[f64]) -> Vec<f64> {
        if envelope.len() <= self.window_frames {
            return self.estimate_window(envelope).into_iter().collect();
        }
        (0..=envelope.len() - self.window_frames)
            .step_by(self.window_hop.max(1))
            .filter_map(|start| self.estimate_window(&envelope[start..start + self.window_frames]))
            .collect()
    }

    /// Best tempo for a single window, or `None` if the window is flat
    pub fn estimate_window(&self, window: &[f64]) -> Option<f64> {
        let n = window.len();
        if n < 4 {
            return None;
        }
        let m = mean(window);
        let centered: Vec<f64> = window.iter().map(|v| v - m).collect();
        let energy: f64 = centered.iter().map(|v| v * v).sum();
        if energy <= 1e-12 {
            return None;
        }

        let min_lag = ((60.0 * self.frame_rate / self.max_bpm).ceil() as usize).max(1);
        let max_lag = ((60.0 * self.frame_rate / self.min_bpm).floor() as usize).min(n / 2);
        if max_lag < min_lag {
            return None;
        }

        let mut best: Option<(usize, f64)> = None;
        for lag in min_lag..=max_lag {
            let r: f64 = centered[..n - lag]
                .iter()
                .zip(&centered[lag..])
                .map(|(a, b)| a * b)
                .sum();
            if r <= 0.0 {
                continue;
            }
            let score = r * self.prior(self.lag_to_bpm(lag));
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((lag, score));
            }
        }
        best.map(|(lag, _)| self.lag_to_bpm(lag))
    }

    fn lag_to_bpm(&self, lag: usize) -> f64 {
        60.0 * self.frame_rate / lag as f64
    }

    fn prior(&self, bpm: f64) -> f64 {
        let octaves = (bpm / self.start_bpm).log2() / self.prior_octaves;
        (-0.5 * octaves * octaves).exp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME_RATE: f64 = 22_050.0 / 512.0;

    fn pulse_train(len: usize, period: usize) -> Vec<f64> {
        (0..len).map(|i| if i % period == 0 { 1.0 } else { 0.0 }).collect()
    }

    #[test]
    fn test_onset_strength_rectified_flux() {
        let mel_db = vec![vec![0.0, 0.0], vec![10.0, -10.0], vec![10.0, 0.0]];
        let onset = onset_strength(&mel_db);
        assert_eq!(onset, vec![0.0, 5.0, 5.0]);
        assert!(onset_strength(&[]).is_empty());
    }

    #[test]
    fn test_pulse_train_tempo() {
        let estimator = TempoEstimator::new(FRAME_RATE);
        let envelope = pulse_train(400, 20);
        let tempo = estimator.estimate_window(&envelope[..384]).unwrap();
        // 60 * 43.066 / 20
        assert!((tempo - 129.2).abs() < 0.1, "tempo {}", tempo);
    }

    #[test]
    fn test_steady_tempo_has_zero_std() {
        let estimator = TempoEstimator::new(FRAME_RATE);
        let envelope = pulse_train(1200, 20);
        let summary = estimator.summarize(&envelope);
        assert!(summary.windows > 1);
        assert!(summary.std_bpm < 1e-9);
        assert!((summary.mean_bpm - 129.2).abs() < 0.1);
    }

    #[test]
    fn test_flat_envelope_has_no_tempo() {
        let estimator = TempoEstimator::new(FRAME_RATE);
        assert_eq!(estimator.estimate_window(&[0.0; 384]), None);
        assert_eq!(estimator.summarize(&[0.3; 500]), TempoSummary::default());
    }

    #[test]
    fn test_short_envelope_uses_single_window() {
        let estimator = TempoEstimator::new(FRAME_RATE);
        let envelope = pulse_train(200, 20);
        assert_eq!(estimator.local_tempi(&envelope).len(), 1);
    }
}
