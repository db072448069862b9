//! VCA compressor (DBX 160 style)
//!
//! Feed-forward topology: detection always comes from the raw input through
//! a true-RMS stage, never from the output, which keeps the loop stable even
//! at the 120:1 ratio extreme. Attack time is selected from the reduction
//! magnitude; release is a constant 120 dB/s rate rather than a fixed time.

use uc_core::Sample;

use crate::{lut, sanitize_envelope, sanitize_state, Detector, OUTPUT_CEILING};

const RMS_TIME: Sample = 0.003;
const MAX_REDUCTION_DB: Sample = 60.0;
const RELEASE_RATE_DB_PER_S: Sample = 120.0;
const KNEE_WIDTH_DB: Sample = 10.0;
const ENVELOPE_FLOOR: Sample = 0.0001;

/// Per-block parameters for the VCA mode
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VcaParams {
    /// Threshold in dB
    pub threshold_db: Sample,
    /// Ratio, 1:1 up to 120:1 (near-infinite)
    pub ratio: Sample,
    /// Attack knob in ms; the 160's timing tracks reduction magnitude, so
    /// this is accepted but does not drive the envelope
    pub attack_ms: Sample,
    /// Release knob in ms; superseded by the fixed 120 dB/s release rate
    pub release_ms: Sample,
    /// Output gain in dB
    pub output_gain_db: Sample,
    /// OverEasy soft knee (10 dB window around threshold)
    pub over_easy: bool,
}

impl Default for VcaParams {
    fn default() -> Self {
        Self {
            threshold_db: 0.0,
            ratio: 1.0,
            attack_ms: 1.0,
            release_ms: 100.0,
            output_gain_db: 0.0,
            over_easy: false,
        }
    }
}

#[derive(Debug, Clone)]
struct ChannelState {
    envelope: Sample,
    rms_buffer: Sample,
    signal_envelope: Sample,
    envelope_rate: Sample,
    previous_input: Sample,
}

impl Default for ChannelState {
    fn default() -> Self {
        Self {
            envelope: 1.0,
            rms_buffer: 0.0,
            signal_envelope: 0.0,
            envelope_rate: 0.0,
            previous_input: 0.0,
        }
    }
}

/// VCA mode detector bank, one state record per channel
#[derive(Debug, Default)]
pub struct VcaCompressor {
    states: Vec<ChannelState>,
    sample_rate: f64,
}

impl VcaCompressor {
    pub fn new() -> Self {
        Self::default()
    }

    /// OverEasy knee law: cubic blend into the full ratio across a 10 dB
    /// window centered on threshold
    fn knee_reduction(over_db: Sample, ratio: Sample, over_easy: bool) -> Sample {
        let slope = 1.0 - 1.0 / ratio;
        if !over_easy {
            return over_db * slope;
        }

        let knee_start = -KNEE_WIDTH_DB * 0.5;
        let knee_end = KNEE_WIDTH_DB * 0.5;

        if over_db <= knee_start {
            0.0
        } else if over_db <= knee_end {
            let position = (over_db - knee_start) / KNEE_WIDTH_DB;
            let knee_gain = 3.0 * position * position - 2.0 * position * position * position;
            over_db * knee_gain * slope
        } else {
            // Past the knee: full slope plus the offset accumulated inside it
            let knee_offset = knee_end * 0.5 * slope;
            knee_offset + (over_db - knee_end) * slope
        }
    }

    pub fn process(&mut self, input: Sample, channel: usize, params: &VcaParams) -> Sample {
        let sr = self.sample_rate;
        let Some(state) = self.states.get_mut(channel) else {
            return input;
        };

        let detection = input.abs();

        // True RMS over a 3 ms window approximates loudness the way the ear
        // does, and is what makes the 160 forgiving on transients
        let rms_alpha = (-1.0 / (RMS_TIME * sr)).exp();
        state.rms_buffer = sanitize_state(state.rms_buffer);
        state.rms_buffer = state.rms_buffer * rms_alpha + detection * detection * (1.0 - rms_alpha);
        let rms_level = state.rms_buffer.sqrt();

        // Program trackers
        let signal_delta = (detection - state.previous_input).abs();
        state.envelope_rate = state.envelope_rate * 0.95 + signal_delta * 0.05;
        state.previous_input = detection;
        state.signal_envelope = state.signal_envelope * 0.99 + rms_level * 0.01;

        let ratio = params.ratio.max(1.0);
        let threshold = lut::db_to_gain(params.threshold_db);

        let mut reduction = 0.0;
        if rms_level > threshold {
            let over_db = lut::gain_to_db(rms_level / threshold);
            reduction =
                Self::knee_reduction(over_db, ratio, params.over_easy).min(MAX_REDUCTION_DB);
        }

        // Attack tracks the size of the level change: 15 ms for 10 dB,
        // 5 ms for 20 dB, 3 ms for 30 dB
        let attack_time = if reduction > 0.1 {
            let t: Sample = if reduction <= 10.0 {
                0.015
            } else if reduction <= 20.0 {
                0.005
            } else {
                0.003
            };
            t.max(0.001)
        } else {
            0.015
        };

        // Constant-rate release: time proportional to the reduction left to
        // give back, floored at 8 ms
        let release_time = if reduction > 0.1 {
            (reduction / RELEASE_RATE_DB_PER_S).max(0.008)
        } else {
            0.008
        };

        let target = lut::db_to_gain(-reduction);
        let attack_coeff = (-1.0 / (attack_time * sr)).exp();
        let release_coeff = (-1.0 / (release_time * sr)).exp();

        if target < state.envelope {
            state.envelope = target + (state.envelope - target) * attack_coeff;
        } else {
            state.envelope = target + (state.envelope - target) * release_coeff;
        }
        state.envelope = sanitize_envelope(state.envelope, ENVELOPE_FLOOR);

        let compressed = input * state.envelope;

        // DBX 202 VCA harmonics: spec-level 0.075% 2nd, 0.5% 3rd at infinite
        // compression, and only when genuinely compressing
        let mut processed = compressed;
        let abs_level = processed.abs();

        if abs_level > 0.01 {
            let sign = if processed < 0.0 { -1.0 } else { 1.0 };
            let level_db = lut::gain_to_db(abs_level.max(1e-4));

            if level_db > -20.0 && reduction > 5.0 {
                let compression_factor = (reduction / 30.0).min(1.0);

                let h2_scale = 0.00075 / (abs_level * abs_level + 1e-4);
                let h2_level = abs_level * abs_level * h2_scale * compression_factor;
                processed += compressed * compressed * sign * h2_level;

                if reduction > 15.0 {
                    // 3rd harmonic falls off linearly with frequency
                    let freq_factor = 50.0 / 1000.0;
                    let h3_scale =
                        (0.005 * freq_factor) / (abs_level * abs_level * abs_level + 1e-4);
                    let h3_level =
                        abs_level * abs_level * abs_level * h3_scale * compression_factor;
                    processed += compressed * compressed * compressed * h3_level;
                }
            }

            // Very high headroom; only a gentle squeeze near the rails
            if abs_level > 1.5 {
                let excess = abs_level - 1.5;
                let vca_sat = 1.5 + (excess * 0.3).tanh() * 0.2;
                processed = sign * vca_sat * (processed / abs_level);
            }
        }

        let output = processed * lut::db_to_gain(params.output_gain_db);
        output.clamp(-OUTPUT_CEILING, OUTPUT_CEILING)
    }
}

impl Detector for VcaCompressor {
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
