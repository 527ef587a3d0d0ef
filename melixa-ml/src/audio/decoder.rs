//! Audio decoding to mono f32 PCM
//!
//! Uses symphonia for format-agnostic decoding (WAV, MP3, FLAC, OGG, ...)
//! from an in-memory byte buffer, and rubato for sinc resampling to the
//! analysis sample rate.

use crate::error::{MoodError, MoodResult};
use crate::features::extractor::ANALYSIS_SAMPLE_RATE;
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use std::io::Cursor;
use std::path::Path;
use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::conv::FromSample;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::sample::Sample;
use tracing::{debug, warn};

/// Decoded audio
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    /// Mono samples, channels averaged
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    /// Channel count of the source stream
    pub channels: usize,
    pub duration_seconds: f64,
}

/// Decode an in-memory audio file to mono f32 samples at its native rate
///
/// `hint` is an optional file extension ("wav", "mp3") used to speed up
/// format probing.
///
/// # Errors
/// `Decode` when the bytes are not a supported container, contain no audio
/// track, or yield no samples.
pub fn decode_native(bytes: Vec<u8>, hint: Option<&str>) -> MoodResult<DecodedAudio> {
    if bytes.is_empty() {
        return Err(MoodError::Decode("empty input".to_string()));
    }
    debug!(bytes = bytes.len(), hint = ?hint, "Decoding audio");

    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());
    let mut format_hint = Hint::new();
    if let Some(extension) = hint {
        format_hint.with_extension(extension);
    }

    let opened = symphonia::default::get_probe()
        .format(
            &format_hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| MoodError::Decode(format!("unrecognized audio format: {}", e)))?;
    let mut format = opened.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| MoodError::Decode("no audio track found".to_string()))?;
    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| MoodError::Decode("sample rate unknown".to_string()))?;
    let channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(1);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| MoodError::Decode(format!("unsupported codec: {}", e)))?;

    let mut samples: Vec<f32> = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(MoodError::Decode(format!("error reading packet: {}", e))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => samples.extend(mix_to_mono(&decoded)),
            // Corrupt frame; skip it and keep going
            Err(SymphoniaError::DecodeError(e)) => {
                warn!(error = %e, "Skipping undecodable packet");
            }
            Err(e) => return Err(MoodError::Decode(format!("decoder failed: {}", e))),
        }
    }

    if samples.is_empty() {
        return Err(MoodError::Decode("audio contains no samples".to_string()));
    }

    let duration_seconds = samples.len() as f64 / sample_rate as f64;
    debug!(
        sample_rate,
        channels,
        samples = samples.len(),
        duration_seconds = format!("{:.2}", duration_seconds),
        "Audio decoding complete"
    );

    Ok(DecodedAudio {
        samples,
        sample_rate,
        channels,
        duration_seconds,
    })
}

/// Decode an in-memory audio file and resample it to the analysis rate
pub fn decode_audio_bytes(bytes: Vec<u8>, hint: Option<&str>) -> MoodResult<DecodedAudio> {
    let target_rate = ANALYSIS_SAMPLE_RATE;
    let decoded = decode_native(bytes, hint)?;
    if decoded.sample_rate == target_rate {
        return Ok(decoded);
    }
    let samples = resample(decoded.samples, decoded.sample_rate, target_rate)?;
    Ok(DecodedAudio {
        duration_seconds: samples.len() as f64 / target_rate as f64,
        samples,
        sample_rate: target_rate,
        channels: decoded.channels,
    })
}

/// Read an audio file and decode it at the analysis rate
///
/// The file extension is passed on as the format hint.
pub fn decode_audio_file(path: &Path) -> MoodResult<DecodedAudio> {
    let bytes = std::fs::read(path).map_err(|e| MoodError::io(path, e))?;
    let hint = path.extension().and_then(|e| e.to_str());
    decode_audio_bytes(bytes, hint)
}

/// Resample mono samples with 256-tap sinc interpolation
///
/// Single pass over the whole clip (chunk size = input length).
pub fn resample(samples: Vec<f32>, source_rate: u32, target_rate: u32) -> MoodResult<Vec<f32>> {
    if samples.is_empty() || source_rate == target_rate {
        return Ok(samples);
    }
    if source_rate == 0 {
        return Err(MoodError::Decode("source sample rate is zero".to_string()));
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let ratio = target_rate as f64 / source_rate as f64;
    let frames = samples.len();

    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, frames, 1)
        .map_err(|e| MoodError::Analysis(format!("failed to create resampler: {}", e)))?;
    let input = vec![samples];
    let mut output = resampler
        .process(&input, None)
        .map_err(|e| MoodError::Analysis(format!("resampling failed: {}", e)))?;

    let resampled = output.pop().unwrap_or_default();
    debug!(
        source_rate,
        target_rate,
        input_frames = frames,
        output_frames = resampled.len(),
        "Resampled audio"
    );
    Ok(resampled)
}

/// Average all channels of a decoded buffer into mono f32
fn mix_to_mono(decoded: &AudioBufferRef) -> Vec<f32> {
    match decoded {
        AudioBufferRef::U8(buf) => average_channels(&**buf),
        AudioBufferRef::U16(buf) => average_channels(&**buf),
        AudioBufferRef::U24(buf) => average_channels(&**buf),
        AudioBufferRef::U32(buf) => average_channels(&**buf),
        AudioBufferRef::S8(buf) => average_channels(&**buf),
        AudioBufferRef::S16(buf) => average_channels(&**buf),
        AudioBufferRef::S24(buf) => average_channels(&**buf),
        AudioBufferRef::S32(buf) => average_channels(&**buf),
        AudioBufferRef::F32(buf) => average_channels(&**buf),
        AudioBufferRef::F64(buf) => average_channels(&**buf),
    }
}

fn average_channels<S: Sample>(buf: &AudioBuffer<S>) -> Vec<f32>
where
    f32: FromSample<S>,
{
    let channels = buf.spec().channels.count();
    if channels == 0 {
        return Vec::new();
    }
    (0..buf.frames())
        .map(|frame| {
            let sum: f32 = (0..channels)
                .map(|ch| f32::from_sample(buf.chan(ch)[frame]))
                .sum();
            sum / channels as f32
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_garbage_bytes_are_decode_errors() {
        let result = decode_native(b"definitely not audio data at all".to_vec(), None);
        assert!(matches!(result, Err(MoodError::Decode(_))));
    }

    #[test]
    fn test_empty_input_is_decode_error() {
        assert!(matches!(
            decode_audio_bytes(Vec::new(), Some("wav")),
            Err(MoodError::Decode(_))
        ));
    }

    #[test]
    fn test_resample_halves_length() {
        let samples: Vec<f32> = (0..44_100)
            .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 44_100.0).sin())
            .collect();
        let out = resample(samples, 44_100, 22_050).unwrap();
        // Output is trimmed by the filter delay, but within a few hundred frames
        assert!((21_500..=22_100).contains(&out.len()), "len {}", out.len());
        assert!(out.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = decode_audio_file(Path::new("/nonexistent/clip.wav"));
        assert!(matches!(result, Err(MoodError::Io { .. })));
    }

    #[test]
    fn test_resample_same_rate_is_identity() {
        let samples = vec![0.1, -0.2, 0.3];
        assert_eq!(resample(samples.clone(), 22_050, 22_050).unwrap(), samples);
    }
}
