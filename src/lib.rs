//! `diction` — speech punctuation restoration and voice activity detection.
//!
//! This crate provides:
//! - Pipeline construction from a task designator + pretrained model identifier
//! - A punctuation-restoration pipeline with per-call context carried in an
//!   opaque cache value
//! - A voice-activity-detection pipeline that turns an audio resource into a
//!   list of speech time ranges
//! - Audio fetching/decoding helpers and pluggable segment output encoders
//!
//! The library is designed to be used by both CLI drivers and embedding
//! applications, with an emphasis on small capability traits so every driver
//! behavior is verifiable against a test double.

// High-level API (most consumers should start here).
pub mod pipeline;
pub mod punctuation;
pub mod vad;

// Pipeline construction vocabulary.
pub mod models;
pub mod task;

// Audio fetching and decoding.
pub mod audio;

// Segment data structures.
pub mod segments;

// Output selection and encoder interfaces.
pub mod json_array_encoder;
pub mod segment_encoder;

// Logging configuration and control.
#[cfg(feature = "logging")]
pub mod logging;

mod error;

pub use error::{Error, Result};
