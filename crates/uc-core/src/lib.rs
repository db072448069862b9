//! uc-core: Shared types for the universal compressor engine
//!
//! This crate provides the foundational types used across the compressor
//! crates: the sample type, decibel conversions, error types, and the
//! lock-free named parameter store.

mod error;
mod params;
mod sample;

pub use error::*;
pub use params::*;
pub use sample::*;
