//! Bus compressor (SSL G-Series style)
//!
//! Feed-forward console glue: a 60 Hz one-pole high-pass in the sidechain
//! keeps low frequencies from pumping the mix, timing is selected from the
//! console's discrete switch positions, and the auto release adapts between
//! a fast transient law and a slow sustained law.

use uc_core::Sample;

use crate::{lut, sanitize_envelope, sanitize_state, Detector, OUTPUT_CEILING};

const MAX_REDUCTION_DB: Sample = 20.0;
const SIDECHAIN_HP_HZ: Sample = 60.0;
const ENVELOPE_FLOOR: Sample = 0.05;

/// Front-panel attack switch positions, in ms
pub const BUS_ATTACK_TIMES_MS: [Sample; 6] = [0.1, 0.3, 1.0, 3.0, 10.0, 30.0];

/// Front-panel ratio switch positions
pub const BUS_RATIOS: [Sample; 3] = [2.0, 4.0, 10.0];

/// Release switch: four fixed times plus the program-dependent auto mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BusRelease {
    Ms100,
    #[default]
    Ms300,
    Ms600,
    Ms1200,
    Auto,
}

impl BusRelease {
    pub fn from_index(index: usize) -> Self {
        match index {
            0 => Self::Ms100,
            1 => Self::Ms300,
            2 => Self::Ms600,
            3 => Self::Ms1200,
            _ => Self::Auto,
        }
    }

    /// Fixed release time in seconds, or `None` for auto
    pub fn time_s(self) -> Option<Sample> {
        match self {
            Self::Ms100 => Some(0.1),
            Self::Ms300 => Some(0.3),
            Self::Ms600 => Some(0.6),
            Self::Ms1200 => Some(1.2),
            Self::Auto => None,
        }
    }
}

/// Per-block parameters for the bus mode
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BusParams {
    /// Threshold in dB
    pub threshold_db: Sample,
    /// Actual ratio value, one of [`BUS_RATIOS`]
    pub ratio: Sample,
    /// Index into [`BUS_ATTACK_TIMES_MS`]
    pub attack_index: usize,
    pub release: BusRelease,
    /// Makeup gain in dB
    pub makeup_db: Sample,
    /// Whether the 60 Hz sidechain high-pass is engaged
    pub sidechain: bool,
}

impl Default for BusParams {
    fn default() -> Self {
        Self {
            threshold_db: 0.0,
            ratio: 2.0,
            attack_index: 2,
            release: BusRelease::Ms300,
            makeup_db: 0.0,
            sidechain: true,
        }
    }
}

#[derive(Debug, Clone)]
struct ChannelState {
    envelope: Sample,
    previous_level: Sample,
    hp_state: Sample,
    prev_input: Sample,
}

impl Default for ChannelState {
    fn default() -> Self {
        Self {
            envelope: 1.0,
            previous_level: 0.0,
            hp_state: 0.0,
            prev_input: 0.0,
        }
    }
}

/// Bus mode detector bank, one state record per channel
#[derive(Debug, Default)]
pub struct BusCompressor {
    states: Vec<ChannelState>,
    sample_rate: f64,
}

impl BusCompressor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process(&mut self, input: Sample, channel: usize, params: &BusParams) -> Sample {
        let sr = self.sample_rate;
        let Some(state) = self.states.get_mut(channel) else {
            return input;
        };

        // Sidechain high-pass keeps kick and bass energy from driving the
        // detector
        let sidechain_input = if params.sidechain {
            let hp_alpha = (SIDECHAIN_HP_HZ / sr).min(1.0);
            state.hp_state = sanitize_state(state.hp_state);
            state.hp_state = input - state.prev_input + state.hp_state * (1.0 - hp_alpha);
            state.prev_input = input;
            state.hp_state
        } else {
            input
        };

        let detection = sidechain_input.abs();

        let ratio = params.ratio.max(1.0);
        let threshold = lut::db_to_gain(params.threshold_db);

        let mut reduction = 0.0;
        if detection > threshold {
            let over_db = lut::gain_to_db(detection / threshold);
            // Hard knee, capped: this is a glue compressor, not a limiter
            reduction = (over_db * (1.0 - 1.0 / ratio)).min(MAX_REDUCTION_DB);
        }

        let attack_index = params.attack_index.min(BUS_ATTACK_TIMES_MS.len() - 1);
        let attack_time = BUS_ATTACK_TIMES_MS[attack_index] * 0.001;

        let release_time = match params.release.time_s() {
            Some(t) => t,
            None => {
                // Auto release: a smoothed detection delta classifies the
                // material; transients release fast, sustained passages slow
                let base = 0.1;
                let compression_factor = (reduction / 6.0).clamp(0.0, 1.0);
                let activity = ((detection - state.previous_level).abs() * 10.0).clamp(0.0, 1.0);

                let t = if activity > 0.3 {
                    base * (1.0 + compression_factor * 2.0)
                } else {
                    base * (2.0 + compression_factor * 8.0)
                };

                state.previous_level = state.previous_level * 0.9 + detection * 0.1;
                t
            }
        };

        let target = lut::db_to_gain(-reduction);

        // First-order approximation of the exponential coefficient, clamped
        // for stability at short time constants
        if target < state.envelope {
            let attack_coeff = (1.0 - 1.0 / (attack_time * sr)).clamp(0.0, 0.9999);
            state.envelope = target + (state.envelope - target) * attack_coeff;
        } else {
            let release_coeff = (1.0 - 1.0 / (release_time * sr)).clamp(0.0, 0.9999);
            state.envelope = target + (state.envelope - target) * release_coeff;
        }
        state.envelope = sanitize_envelope(state.envelope, ENVELOPE_FLOOR);

        let compressed = input * state.envelope;

        // Quad VCA coloration: the subtlest of the four modes; the glue is
        // the curve, not the harmonics
        let mut processed = compressed;
        let abs_level = processed.abs();

        if abs_level > 0.01 {
            let sign = if processed < 0.0 { -1.0 } else { 1.0 };
            let level_db = lut::gain_to_db(abs_level.max(1e-4));

            if level_db > -20.0 && reduction > 3.0 {
                // 2nd harmonic target slides from -90 dBFS toward -80 dBFS
                // as the compressor is pushed
                let push_factor = (reduction / 10.0).min(1.0);
                let h2_db = -90.0 + push_factor * 10.0;
                let h2_scale = lut::db_to_gain(h2_db) / (abs_level * abs_level + 1e-4);
                let h2_level = abs_level * abs_level * h2_scale;
                processed += compressed * compressed * sign * h2_level;

                if reduction > 6.0 {
                    let h3_scale = 0.00501;
                    let h3_level = abs_level * abs_level * abs_level * h3_scale;
                    processed += compressed * compressed * compressed * h3_level;
                }
            }

            // Console output stage squeeze
            if abs_level > 0.95 {
                let excess = (abs_level - 0.95) / 0.05;
                let ssl_sat = 0.95 + 0.05 * (excess * 0.7).tanh();
                processed = sign * ssl_sat * (processed / abs_level);
            }
        }

        let output = processed * lut::db_to_gain(params.makeup_db);
        output.clamp(-OUTPUT_CEILING, OUTPUT_CEILING)
    }
}

impl Detector for BusCompressor {
    fn prepare(&mut self, sample_rate: f64, num_channels: usize) {
        self.sample_rate = sample_rate;
        self.states = vec![ChannelState::default(); num_channels];
    }

    fn reset(&mut self) {
        for state in &mut self.states {
            *state = ChannelState::default();
        }
    }

    fn gain_reduction_db(&self, channel: usize) -> Sample {
        self.states
            .get(channel)
            .map(|s| uc_core::gain_to_db(s.envelope))
            .unwrap_or(0.0)
    }
}
