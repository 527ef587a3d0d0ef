//! Audio input: container decoding and resampling to the analysis rate

pub mod decoder;

pub use decoder::{decode_audio_bytes, decode_audio_file, decode_native, resample, DecodedAudio};
