//! Optical compressor (LA-2A style)
//!
//! Feedback topology: the detector listens to the already-compressed output,
//! which makes the effective ratio level-dependent. The T4 optical cell is
//! modeled with a midrange-biased detection filter, a slow light-memory
//! low-pass that floors the instantaneous level, and a two-stage release
//! whose second stage depends on how hard and how long the cell was driven.

use std::f64::consts::PI;
use uc_core::Sample;

use crate::{lut, sanitize_envelope, sanitize_state, Detector, OUTPUT_CEILING};

/// Internal sidechain reference level; the peak-reduction control scales
/// signal into this rather than moving it
const INTERNAL_THRESHOLD: Sample = 0.5;
const MAX_REDUCTION_DB: Sample = 40.0;
const ATTACK_TIME: Sample = 0.010;
const HF_ROLLOFF: Sample = 0.7;
const TRANSFORMER_FREQ: Sample = 20_000.0;

/// Reduction cap is 40 dB, so the envelope never needs to go below this
const ENVELOPE_FLOOR: Sample = 0.01;

/// Per-block parameters for the optical mode
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptoParams {
    /// Sidechain drive, 0-100; maps to 0 to +40 dB of sidechain gain
    pub peak_reduction: Sample,
    /// Makeup gain in dB
    pub gain_db: Sample,
    /// Limit mode: mixes some input into the feedback sidechain and raises
    /// the variable ratio tenfold
    pub limit: bool,
    /// Whether the caller runs this detector in an oversampled domain
    /// (enables the 4th harmonic)
    pub oversampled: bool,
}

impl Default for OptoParams {
    fn default() -> Self {
        Self {
            peak_reduction: 0.0,
            gain_db: 0.0,
            limit: false,
            oversampled: true,
        }
    }
}

/// Which stage of the T4 cell's recovery is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReleasePhase {
    #[default]
    Idle,
    Fast,
    Slow,
}

#[derive(Debug, Clone)]
struct ChannelState {
    envelope: Sample,
    light_memory: Sample,
    hf_filter: Sample,
    release_start_level: Sample,
    release_phase: ReleasePhase,
    max_reduction: Sample,
    hold_counter: Sample,
    output_filter: Sample,
}

impl Default for ChannelState {
    fn default() -> Self {
        Self {
            envelope: 1.0,
            light_memory: 0.0,
            hf_filter: 0.0,
            release_start_level: 1.0,
            release_phase: ReleasePhase::Idle,
            max_reduction: 0.0,
            hold_counter: 0.0,
            output_filter: 0.0,
        }
    }
}

/// Optical mode detector bank, one state record per channel
#[derive(Debug, Default)]
pub struct OptoCompressor {
    states: Vec<ChannelState>,
    sample_rate: f64,
}

impl OptoCompressor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recovery stage currently active on `channel`
    pub fn release_phase(&self, channel: usize) -> ReleasePhase {
        self.states
            .get(channel)
            .map(|s| s.release_phase)
            .unwrap_or_default()
    }

    pub fn process(&mut self, input: Sample, channel: usize, params: &OptoParams) -> Sample {
        let sr = self.sample_rate;
        let Some(state) = self.states.get_mut(channel) else {
            return input;
        };

        // Feedback topology: gain is applied first, detection follows from
        // the output
        let compressed = input * state.envelope;

        // Limit mode mixes 1/25 input into the sidechain
        let sidechain = if params.limit {
            input * 0.04 + compressed * 0.96
        } else {
            compressed
        };

        // Peak reduction drives the sidechain amplifier, 0 to +40 dB
        let sidechain_gain = lut::db_to_gain(params.peak_reduction * 0.4);
        let mut detection = (sidechain * sidechain_gain).abs();

        // T4 cells are midrange-sensitive; roll off high-frequency detail
        state.hf_filter = sanitize_state(state.hf_filter);
        state.hf_filter = state.hf_filter * HF_ROLLOFF + detection * (1.0 - HF_ROLLOFF);
        detection = state.hf_filter;

        // Light memory: photoresistor persistence floors the instantaneous
        // level, which is what staggers the release into two stages
        state.light_memory = sanitize_state(state.light_memory);
        state.light_memory = state.light_memory * 0.95 + detection * 0.05;
        let light = detection.max(state.light_memory * 0.3);

        let mut reduction = 0.0;
        if light > INTERNAL_THRESHOLD {
            let excess = light - INTERNAL_THRESHOLD;
            // The feedback loop yields a ratio that grows with excess level
            let mut variable_ratio = 1.0 + excess * 20.0;
            if params.limit {
                variable_ratio *= 10.0;
            }
            reduction = (20.0 * (1.0 + excess * variable_ratio).log10()).min(MAX_REDUCTION_DB);
        }

        let target = lut::db_to_gain(-reduction);

        if target < state.envelope {
            let attack_coeff = (-1.0 / (ATTACK_TIME * sr)).exp();
            state.envelope = target + (state.envelope - target) * attack_coeff;

            state.release_phase = ReleasePhase::Idle;
            state.release_start_level = state.envelope;
        } else {
            // Two-stage T4 recovery: 40-80 ms for the first half, then
            // 0.5-5 s depending on how hard and how long the cell was lit
            let recovery = (state.envelope - state.release_start_level)
                / (1.0 - state.release_start_level + 1e-4);

            let release_time = if recovery < 0.5 {
                state.release_phase = ReleasePhase::Fast;
                let factor = (state.max_reduction * 0.05).clamp(0.0, 1.0);
                0.040 + factor * 0.040
            } else {
                state.release_phase = ReleasePhase::Slow;
                let intensity = (state.max_reduction / 30.0).clamp(0.0, 1.0);
                let held = (state.hold_counter / (sr * 2.0)).clamp(0.0, 1.0);
                0.5 + intensity * held * 4.5
            };

            let release_coeff = (-1.0 / (release_time * sr)).exp();
            state.envelope = target + (state.envelope - target) * release_coeff;
        }
        state.envelope = sanitize_envelope(state.envelope, ENVELOPE_FLOOR);

        // Compression history for the program-dependent second stage
        if reduction > state.max_reduction {
            state.max_reduction = reduction;
        }
        if reduction > 0.5 {
            state.hold_counter = (state.hold_counter + 1.0).min(sr * 10.0);
        } else {
            state.max_reduction *= 0.9999;
            state.hold_counter *= 0.999;
        }

        // Tube output stage: prominent 2nd harmonic, some 3rd, a little 4th
        // when the caller is oversampling
        let makeup = lut::db_to_gain(params.gain_db);
        let driven = compressed * makeup;

        let mut saturated = driven;
        let abs_in = driven.abs();
        if abs_in > 1e-3 {
            let sign = if driven < 0.0 { -1.0 } else { 1.0 };
            let level_db = lut::gain_to_db(abs_in.max(1e-4));

            if level_db > -40.0 {
                let thd_target = if level_db > 6.0 { 0.0075 } else { 0.0035 };

                let h2_level = abs_in * abs_in * (thd_target * 0.85);
                saturated += driven * driven * sign * h2_level;

                let h3_level = abs_in * abs_in * abs_in * (thd_target * 0.12);
                saturated += driven * driven * driven * h3_level;

                if params.oversampled {
                    let h4_level = abs_in.powi(4) * (thd_target * 0.03);
                    saturated += driven.powi(4) * sign * h4_level;
                }
            }

            // Tube compression knee above 0.8
            if abs_in > 0.8 {
                let excess = (abs_in - 0.8) / 0.2;
                let tube = 0.8 + 0.2 * (excess * 0.7).tanh();
                saturated = sign * tube * (saturated / abs_in);
            }
        }

        // Output transformer rolloff, fixed at 20 kHz relative to the base
        // rate so harmonic balance does not shift with oversampling
        let coeff = (-2.0 * PI * TRANSFORMER_FREQ / sr).exp();
        state.output_filter = sanitize_state(state.output_filter);
        state.output_filter = saturated * (1.0 - coeff * 0.05) + state.output_filter * coeff * 0.05;

        state.output_filter.clamp(-OUTPUT_CEILING, OUTPUT_CEILING)
    }
}

impl Detector for OptoCompressor {
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
