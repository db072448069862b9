//! Shared 2x anti-aliasing stage
//!
//! All four modes run their saturating stages inside a 2x oversampled
//! domain so polynomial waveshaping does not alias into the audible band.
//! The stage owns, per channel:
//! - a matched up/down half-band FIR pair (Kaiser-windowed sinc)
//! - a gentle pre-saturation low-pass applied before upsampling
//! - a post-saturation low-pass plus DC blocker applied after downsampling
//!
//! Coefficients depend only on sample rate and are recomputed in `prepare`;
//! the per-sample path never allocates.

use std::f64::consts::PI;
use uc_core::Sample;

use crate::sanitize_state;

/// Half-band prototype length. Group delay of the up/down pair is
/// `TAPS - 1` samples at the oversampled rate, i.e. about `TAPS / 2`
/// host-rate samples.
const TAPS: usize = 32;

const STOPBAND_ATTEN_DB: f64 = 96.0;
const TRANSITION: f64 = 0.05;

/// Modified Bessel function I0 (for the Kaiser window)
fn bessel_i0(x: f64) -> f64 {
    let ax = x.abs();
    if ax < 3.75 {
        let y = (x / 3.75).powi(2);
        1.0 + y
            * (3.5156229
                + y * (3.0899424
                    + y * (1.2067492 + y * (0.2659732 + y * (0.0360768 + y * 0.0045813)))))
    } else {
        let y = 3.75 / ax;
        (ax.exp() / ax.sqrt())
            * (0.39894228
                + y * (0.01328592
                    + y * (0.00225319
                        + y * (-0.00157565
                            + y * (0.00916281
                                + y * (-0.02057706
                                    + y * (0.02635537 + y * (-0.01647633 + y * 0.00392377))))))))
    }
}

/// Design the half-band lowpass prototype (cutoff at a quarter of the
/// oversampled rate), normalized for unity gain at DC
fn design_halfband() -> Vec<f64> {
    let m = TAPS - 1;
    let beta = 0.1102 * (STOPBAND_ATTEN_DB - 8.7);
    let fc = 0.25 + TRANSITION / 2.0;

    let mut coeffs = vec![0.0; TAPS];
    for (i, c) in coeffs.iter_mut().enumerate() {
        let n = i as f64 - m as f64 / 2.0;
        let sinc = if n.abs() < 1e-10 {
            2.0 * fc
        } else {
            (2.0 * PI * fc * n).sin() / (PI * n)
        };
        let alpha = m as f64 / 2.0;
        let arg = 1.0 - ((i as f64 - alpha) / alpha).powi(2);
        let window = if arg > 0.0 {
            bessel_i0(beta * arg.sqrt()) / bessel_i0(beta)
        } else {
            0.0
        };
        *c = sinc * window;
    }

    let sum: f64 = coeffs.iter().sum();
    for c in &mut coeffs {
        *c /= sum;
    }
    coeffs
}

/// FIR delay line running at the oversampled rate
#[derive(Debug, Clone)]
struct Fir {
    delay: Vec<f64>,
}

impl Fir {
    fn new() -> Self {
        Self {
            delay: vec![0.0; TAPS],
        }
    }

    #[inline]
    fn process(&mut self, input: f64, taps: &[f64]) -> f64 {
        self.delay.rotate_right(1);
        self.delay[0] = input;
        self.delay
            .iter()
            .zip(taps)
            .map(|(&d, &c)| d * c)
            .sum()
    }

    fn reset(&mut self) {
        self.delay.fill(0.0);
    }
}

/// Per-channel filter state around the saturation stage
#[derive(Debug, Clone, Default)]
struct ChannelState {
    pre_filter: Sample,
    post_filter: Sample,
    dc_state: Sample,
    dc_prev: Sample,
}

/// 2x oversampling stage shared by all four compressor modes
#[derive(Debug)]
pub struct AntiAliasingStage {
    taps: Vec<f64>,
    up: Vec<Fir>,
    down: Vec<Fir>,
    states: Vec<ChannelState>,
    os_buffers: Vec<Vec<Sample>>,
    sample_rate: f64,
    pre_coeff: Sample,
    post_coeff: Sample,
}

impl AntiAliasingStage {
    pub fn new() -> Self {
        Self {
            taps: design_halfband(),
            up: Vec::new(),
            down: Vec::new(),
            states: Vec::new(),
            os_buffers: Vec::new(),
            sample_rate: 0.0,
            pre_coeff: 0.0,
            post_coeff: 0.0,
        }
    }

    /// Allocate and size all per-channel state. Must complete before any
    /// audio callback; resets every filter to zero.
    pub fn prepare(&mut self, sample_rate: f64, max_block: usize, num_channels: usize) {
        self.sample_rate = sample_rate;
        self.up = vec![Fir::new(); num_channels];
        self.down = vec![Fir::new(); num_channels];
        self.states = vec![ChannelState::default(); num_channels];
        self.os_buffers = vec![vec![0.0; max_block * 2]; num_channels];

        // Gentle high-frequency reduction before saturation, symmetric
        // cleanup after. 20 kHz pre, 45% of the sample rate (capped at
        // 20 kHz) post.
        self.pre_coeff = (-2.0 * PI * 20_000.0 / sample_rate).exp();
        let post_cutoff = (sample_rate * 0.45).min(20_000.0);
        self.post_coeff = (-2.0 * PI * post_cutoff / sample_rate).exp();

        log::debug!(
            "anti-aliasing prepared: sr={sample_rate}, block={max_block}, channels={num_channels}"
        );
    }

    pub fn is_prepared(&self) -> bool {
        !self.os_buffers.is_empty() && self.sample_rate > 0.0
    }

    pub fn factor(&self) -> usize {
        2
    }

    /// Fixed group delay of the up/down pair in host-rate samples
    pub fn latency(&self) -> usize {
        if self.is_prepared() { TAPS / 2 } else { 0 }
    }

    /// Pre-filter and upsample one channel block into the internal
    /// oversampled buffer
    pub fn upsample(&mut self, channel: usize, input: &[Sample]) {
        let state = &mut self.states[channel];
        let fir = &mut self.up[channel];
        let os = &mut self.os_buffers[channel];

        for (i, &raw) in input.iter().enumerate() {
            state.pre_filter = sanitize_state(state.pre_filter);
            state.pre_filter =
                raw * (1.0 - self.pre_coeff * 0.1) + state.pre_filter * self.pre_coeff * 0.1;

            // Zero-stuff by two; the factor compensates interpolation loss
            os[i * 2] = fir.process(state.pre_filter * 2.0, &self.taps);
            os[i * 2 + 1] = fir.process(0.0, &self.taps);
        }
    }

    /// Mutable view of one channel's oversampled block (`len` = 2x the
    /// host block length)
    pub fn os_block_mut(&mut self, channel: usize, len: usize) -> &mut [Sample] {
        &mut self.os_buffers[channel][..len]
    }

    /// Downsample one channel's oversampled buffer back into `output`,
    /// then apply the post low-pass and DC blocker
    pub fn downsample(&mut self, channel: usize, output: &mut [Sample]) {
        let state = &mut self.states[channel];
        let fir = &mut self.down[channel];
        let os = &self.os_buffers[channel];

        for (i, out) in output.iter_mut().enumerate() {
            // Both oversampled samples pass through the filter; only the
            // second output survives decimation
            fir.process(os[i * 2], &self.taps);
            let decimated = fir.process(os[i * 2 + 1], &self.taps);

            state.post_filter = sanitize_state(state.post_filter);
            state.post_filter = decimated * (1.0 - self.post_coeff * 0.05)
                + state.post_filter * self.post_coeff * 0.05;

            // One-pole DC blocker removes offset introduced by asymmetric
            // saturation
            state.dc_state = sanitize_state(state.dc_state);
            let dc_blocked = state.post_filter - state.dc_prev + state.dc_state * 0.995;
            state.dc_prev = state.post_filter;
            state.dc_state = dc_blocked;

            *out = dc_blocked;
        }
    }

    pub fn reset(&mut self) {
        for fir in self.up.iter_mut().chain(self.down.iter_mut()) {
            fir.reset();
        }
        for state in &mut self.states {
            *state = ChannelState::default();
        }
        for buf in &mut self.os_buffers {
            buf.fill(0.0);
        }
    }
}

impl Default for AntiAliasingStage {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f64 = 44_100.0;

    fn sine(n: usize, freq: f64) -> Vec<Sample> {
        (0..n)
            .map(|i| (2.0 * PI * freq * i as f64 / SAMPLE_RATE).sin())
            .collect()
    }

    #[test]
    fn test_prototype_unity_dc() {
        let taps = design_halfband();
        let sum: f64 = taps.iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_round_trip_preserves_level() {
        let mut stage = AntiAliasingStage::new();
        stage.prepare(SAMPLE_RATE, 512, 1);

        let input = sine(512, 1_000.0);
        let mut output = vec![0.0; 512];

        // Run several blocks so the filters settle
        for _ in 0..4 {
            stage.upsample(0, &input);
            stage.downsample(0, &mut output);
        }

        let in_peak = uc_core::peak(&input);
        let out_peak = uc_core::peak(&output);
        assert!(
            (out_peak - in_peak).abs() / in_peak < 0.15,
            "in={in_peak}, out={out_peak}"
        );
        assert!(output.iter().all(|x| x.is_finite()));
    }

    #[test]
    fn test_silence_stays_silent() {
        let mut stage = AntiAliasingStage::new();
        stage.prepare(SAMPLE_RATE, 256, 2);

        let input = vec![0.0; 256];
        let mut output = vec![1.0; 256];
        stage.upsample(1, &input);
        stage.downsample(1, &mut output);

        assert!(output.iter().all(|&x| x.abs() < 1e-12));
    }

    #[test]
    fn test_latency_reported_after_prepare() {
        let mut stage = AntiAliasingStage::new();
        assert_eq!(stage.latency(), 0);
        stage.prepare(SAMPLE_RATE, 128, 2);
        assert_eq!(stage.latency(), TAPS / 2);
    }

    #[test]
    fn test_dc_offset_removed() {
        let mut stage = AntiAliasingStage::new();
        stage.prepare(SAMPLE_RATE, 512, 1);

        let input = vec![0.25; 512];
        let mut output = vec![0.0; 512];
        for _ in 0..40 {
            stage.upsample(0, &input);
            stage.downsample(0, &mut output);
        }

        // DC input settles toward zero after the blocker
        let tail = &output[256..];
        let mean: f64 = tail.iter().sum::<f64>() / tail.len() as f64;
        assert!(mean.abs() < 0.02, "residual DC {mean}");
    }
}
