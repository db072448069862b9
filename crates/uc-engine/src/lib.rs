//! uc-engine: Block orchestration for the universal compressor
//!
//! Ties the four detector banks, the anti-aliasing stage, the parameter
//! store, and the metering bridge into one processor with the host-facing
//! prepare/process lifecycle.

mod layout;
mod metering;
mod processor;

pub use layout::create_parameter_layout;
pub use metering::MeterBridge;
pub use processor::UniversalCompressor;
