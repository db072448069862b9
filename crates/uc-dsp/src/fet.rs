//! FET compressor (1176 style)
//!
//! Feedback topology with a fixed internal threshold; the input control is
//! pure gain that drives signal into that threshold, which is the defining
//! 1176 behavior. Ratio position 4 is the all-buttons mode: a bent
//! three-segment gain law with near-instant attack and its own envelope
//! coefficients.

use std::f64::consts::PI;
use uc_core::Sample;

use crate::{lut, sanitize_envelope, sanitize_state, Detector, OUTPUT_CEILING};

/// Fixed threshold, -10 dBFS
const THRESHOLD_DB: Sample = -10.0;
const MAX_REDUCTION_DB: Sample = 30.0;
const TRANSFORMER_FREQ: Sample = 20_000.0;
const ENVELOPE_FLOOR: Sample = 0.001;

/// Front-panel ratio positions; the last entry is all-buttons mode
pub const FET_RATIOS: [Sample; 5] = [4.0, 8.0, 12.0, 20.0, 100.0];

const ALL_BUTTONS: usize = 4;

/// Per-block parameters for the FET mode
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FetParams {
    /// Input drive in dB (-20 to +40); more input means more compression
    pub input_gain_db: Sample,
    /// Makeup gain in dB (-20 to +20)
    pub output_gain_db: Sample,
    /// Attack in ms (0.02 to 0.8)
    pub attack_ms: Sample,
    /// Release in ms (50 to 1100)
    pub release_ms: Sample,
    /// Index into [`FET_RATIOS`]
    pub ratio_index: usize,
    /// Whether the caller runs this detector in an oversampled domain;
    /// when false the harmonic residue is boosted to compensate for the
    /// post-filtering loss
    pub oversampled: bool,
}

impl Default for FetParams {
    fn default() -> Self {
        Self {
            input_gain_db: 0.0,
            output_gain_db: 0.0,
            attack_ms: 0.02,
            release_ms: 400.0,
            ratio_index: 0,
            oversampled: true,
        }
    }
}

#[derive(Debug, Clone)]
struct ChannelState {
    envelope: Sample,
    prev_output: Sample,
    previous_level: Sample,
}

impl Default for ChannelState {
    fn default() -> Self {
        Self {
            envelope: 1.0,
            prev_output: 0.0,
            previous_level: 0.0,
        }
    }
}

/// FET mode detector bank, one state record per channel
#[derive(Debug, Default)]
pub struct FetCompressor {
    states: Vec<ChannelState>,
    sample_rate: f64,
}

impl FetCompressor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process(&mut self, input: Sample, channel: usize, params: &FetParams) -> Sample {
        let sr = self.sample_rate;
        let Some(state) = self.states.get_mut(channel) else {
            return input;
        };

        let threshold = lut::db_to_gain(THRESHOLD_DB);
        let input_gain = lut::db_to_gain(params.input_gain_db);
        let amplified = input * input_gain;

        let ratio_index = params.ratio_index.min(ALL_BUTTONS);
        let ratio = FET_RATIOS[ratio_index];
        let all_buttons = ratio_index == ALL_BUTTONS;

        // Feedback: apply the current envelope, detect from the output
        let compressed = amplified * state.envelope;
        let detection = compressed.abs();

        let mut reduction = 0.0;
        if detection > threshold {
            let over_db = lut::gain_to_db(detection / threshold);

            if all_buttons {
                // Bent all-buttons curve: gentle below 3 dB over, ramping
                // toward 4:1 through 10 dB, near-limiting above
                reduction = if over_db < 3.0 {
                    over_db * 0.33
                } else if over_db < 10.0 {
                    let t = (over_db - 3.0) / 7.0;
                    1.0 + (over_db - 3.0) * (0.75 + t * 0.15)
                } else {
                    6.25 + (over_db - 10.0) * 0.95
                };
            } else {
                reduction = over_db * (1.0 - 1.0 / ratio);
            }
            reduction = reduction.min(MAX_REDUCTION_DB);
        }

        let mut attack_time = params.attack_ms * 0.001;
        let mut release_time = params.release_ms * 0.001;

        if all_buttons {
            attack_time = attack_time.min(1e-4);
            release_time *= 0.7;
            let reduction_factor = (reduction / 20.0).clamp(0.0, 1.0);
            release_time *= 1.0 + reduction_factor * 0.3;
        }

        // Program dependency: transients shorten attack and stretch release,
        // sustained material scales both with accumulated reduction
        let program_factor = (1.0 + reduction * 0.05).clamp(0.5, 2.0);
        let signal_delta = (detection - state.previous_level).abs();
        state.previous_level = detection;

        if signal_delta > 0.1 {
            attack_time *= 0.8;
            release_time *= 1.2;
        } else {
            attack_time *= program_factor;
            release_time *= program_factor;
        }

        let target = lut::db_to_gain(-reduction);
        let attack_coeff = (-1.0 / (attack_time * sr)).exp();
        let release_coeff = (-1.0 / (release_time * sr)).exp();

        if all_buttons {
            if target < state.envelope {
                // 100 microsecond grab regardless of the attack knob
                let fet_attack = (-1.0 / (1e-4 * sr)).exp();
                state.envelope = fet_attack * state.envelope + (1.0 - fet_attack) * target;
            } else {
                let fet_release = release_coeff * 0.98;
                state.envelope = fet_release * state.envelope + (1.0 - fet_release) * target;
            }
        } else if target < state.envelope {
            state.envelope = attack_coeff * state.envelope + (1.0 - attack_coeff) * target;
        } else {
            state.envelope = release_coeff * state.envelope + (1.0 - release_coeff) * target;
        }

        // Feedback loops need a hard envelope floor to prevent runaway
        state.envelope = sanitize_envelope(state.envelope, ENVELOPE_FLOOR);

        // Class A FET output stage. The 1176 is very clean: harmonics only
        // appear while compressing, around -100/-110 dBFS at nominal level
        let mut output = compressed;
        let abs_output = output.abs();

        if reduction > 3.0 && abs_output > 1e-3 {
            let sign = if output < 0.0 { -1.0 } else { 1.0 };
            let compression_scale = (reduction / 20.0).min(1.0);

            let h2 = output * output * 0.00063 * compression_scale;
            let h3 = output * output * output * 0.0005 * compression_scale;
            output += h2 * sign + h3;
        }

        if abs_output > 1.5 {
            let sign = if output < 0.0 { -1.0 } else { 1.0 };
            output = sign * (1.5 + ((abs_output - 1.5) * 0.2).tanh() * 0.5);
        }

        // Without oversampling the post filters eat most of the harmonic
        // residue; boost it back up
        if !params.oversampled {
            let output_level_db = lut::gain_to_db(output.abs().max(1e-4));
            if output_level_db > -40.0 {
                let harmonic_content = output - compressed;
                output = compressed + harmonic_content * 10.0;
            }
        }

        // Minimal transformer coloration, gentle rolloff above 20 kHz
        let coeff = (-2.0 * PI * TRANSFORMER_FREQ / sr).exp();
        state.prev_output = sanitize_state(state.prev_output);
        let filtered = output * (1.0 - coeff * 0.05) + state.prev_output * coeff * 0.05;
        state.prev_output = filtered;

        let output_gain = lut::db_to_gain(params.output_gain_db);
        (filtered * output_gain).clamp(-OUTPUT_CEILING, OUTPUT_CEILING)
    }
}

impl Detector for FetCompressor {
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
