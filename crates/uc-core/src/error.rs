//! Error types for the compressor engine

use thiserror::Error;

/// Core error type
///
/// Only the non-real-time setup path ever returns these; the audio path
/// absorbs all faults locally (bypass or state reset).
#[derive(Error, Debug)]
pub enum UcError {
    #[error("Invalid sample rate: {0}")]
    InvalidSampleRate(f64),

    #[error("Invalid block size: {0}")]
    InvalidBlockSize(usize),

    #[error("Invalid channel count: {0}")]
    InvalidChannelCount(usize),

    #[error("Unknown parameter: {0}")]
    UnknownParam(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias
pub type UcResult<T> = Result<T, UcError>;
