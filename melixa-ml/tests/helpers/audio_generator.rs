//! In-memory WAV fixtures
//!
//! Everything is generated with `hound` into a byte buffer so tests never
//! depend on files checked into the repository.

use std::f32::consts::PI;
use std::io::Cursor;

/// Shape of a generated tone
#[derive(Debug, Clone)]
pub struct ToneConfig {
    pub duration_seconds: f32,
    pub sample_rate: u32,
    pub channels: u16,
    pub frequency: f32,
    pub amplitude: f32,
}

impl Default for ToneConfig {
    fn default() -> Self {
        Self {
            duration_seconds: 3.0,
            sample_rate: 22_050,
            channels: 1,
            frequency: 440.0,
            amplitude: 0.3,
        }
    }
}

/// Encode mono samples as 16-bit PCM WAV, duplicated across `channels`
pub fn wav_bytes(samples: &[f32], sample_rate: u32, channels: u16) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).expect("Failed to create WAV writer");
        for &sample in samples {
            let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            for _ in 0..channels {
                writer.write_sample(value).expect("Failed to write sample");
            }
        }
        writer.finalize().expect("Failed to finalize WAV");
    }
    cursor.into_inner()
}

/// Sine tone samples (mono)
pub fn sine_samples(config: &ToneConfig) -> Vec<f32> {
    let total = (config.duration_seconds * config.sample_rate as f32) as usize;
    (0..total)
        .map(|i| {
            let t = i as f32 / config.sample_rate as f32;
            config.amplitude * (2.0 * PI * config.frequency * t).sin()
        })
        .collect()
}

/// Sine tone as WAV bytes
pub fn sine_wav(config: &ToneConfig) -> Vec<u8> {
    wav_bytes(&sine_samples(config), config.sample_rate, config.channels)
}

/// Short decaying noise-free clicks every `interval` samples
pub fn click_track_samples(duration_seconds: f32, sample_rate: u32, interval: usize) -> Vec<f32> {
    let total = (duration_seconds * sample_rate as f32) as usize;
    let mut samples = vec![0.0f32; total];
    for start in (0..total).step_by(interval) {
        for (offset, sample) in samples[start..].iter_mut().take(256).enumerate() {
            let decay = (-(offset as f32) / 40.0).exp();
            *sample = 0.8 * decay * (2.0 * PI * 2000.0 * offset as f32 / sample_rate as f32).sin();
        }
    }
    samples
}

/// Click track as mono WAV bytes
pub fn click_track_wav(duration_seconds: f32, sample_rate: u32, interval: usize) -> Vec<u8> {
    wav_bytes(
        &click_track_samples(duration_seconds, sample_rate, interval),
        sample_rate,
        1,
    )
}
