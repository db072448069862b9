//! uc-dsp: Detector state machines for the universal compressor
//!
//! Four analog compressor emulations behind one switchable engine:
//! - `opto` - optical feedback topology, two-stage program-dependent release
//! - `fet` - FET feedback topology, fixed threshold driven by input gain
//! - `vca` - feed-forward true-RMS with constant release rate
//! - `bus` - feed-forward console bus with sidechain high-pass and discrete
//!   timing
//!
//! Plus the shared 2x anti-aliasing stage (`antialias`) and the fast
//! dB/linear lookup tables (`lut`).
//!
//! All per-sample paths are allocation-free; allocation happens only in
//! `prepare`.

pub mod antialias;
pub mod bus;
pub mod fet;
pub mod lut;
pub mod opto;
pub mod vca;

use serde::{Deserialize, Serialize};
use uc_core::Sample;

pub use bus::{BusCompressor, BusParams, BusRelease, BUS_ATTACK_TIMES_MS, BUS_RATIOS};
pub use fet::{FetCompressor, FetParams, FET_RATIOS};
pub use opto::{OptoCompressor, OptoParams, ReleasePhase};
pub use vca::{VcaCompressor, VcaParams};

/// Hard safety ceiling applied to every detector output, in linear amplitude
pub const OUTPUT_CEILING: Sample = 2.0;

/// Compressor topology selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CompressorMode {
    /// Optical (LA-2A style): feedback, two-stage release
    Opto,
    /// FET (1176 style): feedback, fixed threshold
    Fet,
    /// VCA (DBX 160 style): feed-forward, true RMS
    #[default]
    Vca,
    /// Bus (SSL G style): feed-forward, sidechain-filtered
    Bus,
}

impl CompressorMode {
    pub fn from_index(index: usize) -> Self {
        match index {
            0 => Self::Opto,
            1 => Self::Fet,
            2 => Self::Vca,
            _ => Self::Bus,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Self::Opto => 0,
            Self::Fet => 1,
            Self::Vca => 2,
            Self::Bus => 3,
        }
    }
}

/// Per-block parameter snapshot for the active mode
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ModeParams {
    Opto(OptoParams),
    Fet(FetParams),
    Vca(VcaParams),
    Bus(BusParams),
}

impl ModeParams {
    pub fn mode(&self) -> CompressorMode {
        match self {
            Self::Opto(_) => CompressorMode::Opto,
            Self::Fet(_) => CompressorMode::Fet,
            Self::Vca(_) => CompressorMode::Vca,
            Self::Bus(_) => CompressorMode::Bus,
        }
    }
}

/// Capability interface shared by the four detector banks
///
/// The per-sample entry points are inherent methods (each mode takes its own
/// parameter set); this trait covers the lifecycle and metering surface the
/// orchestrator needs regardless of mode.
pub trait Detector: Send {
    /// Size the per-channel state banks and capture the sample rate.
    /// The only operation allowed to allocate.
    fn prepare(&mut self, sample_rate: f64, num_channels: usize);

    /// Zero all envelopes and filter accumulators
    fn reset(&mut self);

    /// Current gain reduction for one channel in dB (<= 0; 0 = no reduction)
    fn gain_reduction_db(&self, channel: usize) -> Sample;
}

/// Clamp an envelope into its valid range, resetting non-finite values to
/// unity gain. Invoked once per sample per detector so the safety contract
/// lives in one place.
#[inline]
pub fn sanitize_envelope(envelope: Sample, floor: Sample) -> Sample {
    if envelope.is_finite() {
        envelope.clamp(floor, 1.0)
    } else {
        1.0
    }
}

/// Reset a non-finite filter accumulator to zero
#[inline]
pub fn sanitize_state(value: Sample) -> Sample {
    if value.is_finite() { value } else { 0.0 }
}
