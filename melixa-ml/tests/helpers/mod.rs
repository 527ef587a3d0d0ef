//! Test Helper Utilities
//!
//! Shared fixtures for melixa-ml integration tests

#![allow(dead_code, unused_imports)]

pub mod audio_generator;
pub mod fixtures;

pub use audio_generator::{click_track_wav, sine_wav, wav_bytes, ToneConfig};
pub use fixtures::{
    logistic_bundle, reference_records, write_fixture_files, FailingClassifier,
    PanickingClassifier,
};
