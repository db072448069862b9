//! Lock-free meter publication
//!
//! Three independent scalar readouts, written once per block by the audio
//! thread and read torn-free from any other thread. Each value is meaningful
//! on its own, so relaxed ordering is sufficient.

use portable_atomic::AtomicF64;
use std::sync::atomic::Ordering;
use uc_core::{Sample, SILENCE_FLOOR_DB};

/// Cross-thread bridge for the three meter values
#[derive(Debug)]
pub struct MeterBridge {
    input_db: AtomicF64,
    output_db: AtomicF64,
    gain_reduction_db: AtomicF64,
}

impl MeterBridge {
    pub fn new() -> Self {
        Self {
            input_db: AtomicF64::new(SILENCE_FLOOR_DB),
            output_db: AtomicF64::new(SILENCE_FLOOR_DB),
            gain_reduction_db: AtomicF64::new(0.0),
        }
    }

    /// Back to the post-prepare state: silence floors, no reduction
    pub fn reset(&self) {
        self.input_db.store(SILENCE_FLOOR_DB, Ordering::Relaxed);
        self.output_db.store(SILENCE_FLOOR_DB, Ordering::Relaxed);
        self.gain_reduction_db.store(0.0, Ordering::Relaxed);
    }

    pub fn publish_input_db(&self, value: Sample) {
        self.input_db.store(value, Ordering::Relaxed);
    }

    pub fn publish_output_db(&self, value: Sample) {
        self.output_db.store(value, Ordering::Relaxed);
    }

    pub fn publish_gain_reduction_db(&self, value: Sample) {
        self.gain_reduction_db.store(value, Ordering::Relaxed);
    }

    pub fn input_db(&self) -> Sample {
        self.input_db.load(Ordering::Relaxed)
    }

    pub fn output_db(&self) -> Sample {
        self.output_db.load(Ordering::Relaxed)
    }

    pub fn gain_reduction_db(&self) -> Sample {
        self.gain_reduction_db.load(Ordering::Relaxed)
    }
}

impl Default for MeterBridge {
    fn default() -> Self {
        Self::new()
    }
}
