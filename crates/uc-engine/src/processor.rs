//! Block orchestrator
//!
//! Owns the four always-resident detector banks, the shared anti-aliasing
//! stage, and the per-block contract: snapshot parameters once, stream every
//! channel through the active mode inside the 2x domain, publish meters,
//! blend dry/wet. All faults inside the audio path degrade to bypass; only
//! `prepare` surfaces typed errors.

use std::sync::Arc;

use uc_core::{ParameterStore, Sample, UcError, UcResult, SILENCE_FLOOR_DB};
use uc_dsp::antialias::AntiAliasingStage;
use uc_dsp::{
    lut, BusCompressor, BusParams, BusRelease, CompressorMode, Detector, FetCompressor, FetParams,
    ModeParams, OptoCompressor, OptoParams, VcaCompressor, VcaParams, BUS_RATIOS,
};

use crate::layout::{self, create_parameter_layout};
use crate::metering::MeterBridge;

/// Meters floor to -60 dB below this linear level
const METER_SILENCE: Sample = 1e-3;

/// Switchable four-topology compressor engine
pub struct UniversalCompressor {
    params: Arc<ParameterStore>,
    meters: Arc<MeterBridge>,
    opto: OptoCompressor,
    fet: FetCompressor,
    vca: VcaCompressor,
    bus: BusCompressor,
    antialias: AntiAliasingStage,
    dry: Vec<Vec<Sample>>,
    sample_rate: f64,
    max_block: usize,
    num_channels: usize,
}

impl UniversalCompressor {
    pub fn new() -> Self {
        Self {
            params: Arc::new(ParameterStore::new(create_parameter_layout())),
            meters: Arc::new(MeterBridge::new()),
            opto: OptoCompressor::new(),
            fet: FetCompressor::new(),
            vca: VcaCompressor::new(),
            bus: BusCompressor::new(),
            antialias: AntiAliasingStage::new(),
            dry: Vec::new(),
            sample_rate: 0.0,
            max_block: 0,
            num_channels: 0,
        }
    }

    /// Shared parameter store; writers on any thread, the audio thread only
    /// reads
    pub fn params(&self) -> Arc<ParameterStore> {
        Arc::clone(&self.params)
    }

    /// Meter readouts for UI threads
    pub fn meters(&self) -> Arc<MeterBridge> {
        Arc::clone(&self.meters)
    }

    /// Size all processing state for the host configuration. The only
    /// allocating operation; must complete before the first audio callback.
    pub fn prepare(
        &mut self,
        sample_rate: f64,
        max_block: usize,
        num_channels: usize,
    ) -> UcResult<()> {
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(UcError::InvalidSampleRate(sample_rate));
        }
        if max_block == 0 {
            return Err(UcError::InvalidBlockSize(max_block));
        }
        if num_channels == 0 {
            return Err(UcError::InvalidChannelCount(num_channels));
        }

        self.sample_rate = sample_rate;
        self.max_block = max_block;
        self.num_channels = num_channels;

        // The detectors keep their published time constants relative to the
        // host rate even though they run on 2x samples
        self.opto.prepare(sample_rate, num_channels);
        self.fet.prepare(sample_rate, num_channels);
        self.vca.prepare(sample_rate, num_channels);
        self.bus.prepare(sample_rate, num_channels);
        self.antialias.prepare(sample_rate, max_block, num_channels);

        self.dry = vec![vec![0.0; max_block]; num_channels];

        lut::warm();
        self.meters.reset();

        log::debug!(
            "prepared: sr={sample_rate}, max_block={max_block}, channels={num_channels}, \
             latency={}",
            self.antialias.latency()
        );
        Ok(())
    }

    pub fn current_mode(&self) -> CompressorMode {
        self.params
            .get(layout::MODE)
            .map(|v| CompressorMode::from_index(v as usize))
            .unwrap_or(CompressorMode::Opto)
    }

    /// Fixed group delay of the oversampling pair, for host delay
    /// compensation
    pub fn latency_samples(&self) -> usize {
        self.antialias.latency()
    }

    pub fn input_level_db(&self) -> Sample {
        self.meters.input_db()
    }

    pub fn output_level_db(&self) -> Sample {
        self.meters.output_db()
    }

    pub fn gain_reduction_db(&self) -> Sample {
        self.meters.gain_reduction_db()
    }

    /// Capture the active mode's parameter set once per block. Returns
    /// `None` if any required value is missing, which bypasses the block
    /// rather than processing with stale defaults.
    fn cache_params(&self, mode: CompressorMode) -> Option<ModeParams> {
        let p = &self.params;
        match mode {
            CompressorMode::Opto => {
                let peak_reduction = p.get(layout::OPTO_PEAK_REDUCTION)?;
                let gain = p.get(layout::OPTO_GAIN)?;
                let limit = p.get(layout::OPTO_LIMIT)? > 0.5;
                Some(ModeParams::Opto(OptoParams {
                    peak_reduction,
                    // 0-100 knob, unity at 50: -40 to +40 dB
                    gain_db: (gain - 50.0) * 0.8,
                    limit,
                    oversampled: true,
                }))
            }
            CompressorMode::Fet => Some(ModeParams::Fet(FetParams {
                input_gain_db: p.get(layout::FET_INPUT)?,
                output_gain_db: p.get(layout::FET_OUTPUT)?,
                attack_ms: p.get(layout::FET_ATTACK)?,
                release_ms: p.get(layout::FET_RELEASE)?,
                ratio_index: p.get(layout::FET_RATIO)? as usize,
                oversampled: true,
            })),
            CompressorMode::Vca => Some(ModeParams::Vca(VcaParams {
                threshold_db: p.get(layout::VCA_THRESHOLD)?,
                ratio: p.get(layout::VCA_RATIO)?,
                attack_ms: p.get(layout::VCA_ATTACK)?,
                release_ms: p.get(layout::VCA_RELEASE)?,
                output_gain_db: p.get(layout::VCA_OUTPUT)?,
                over_easy: p.get(layout::VCA_OVEREASY)? > 0.5,
            })),
            CompressorMode::Bus => {
                let ratio_index = (p.get(layout::BUS_RATIO)? as usize).min(BUS_RATIOS.len() - 1);
                Some(ModeParams::Bus(BusParams {
                    threshold_db: p.get(layout::BUS_THRESHOLD)?,
                    ratio: BUS_RATIOS[ratio_index],
                    attack_index: p.get(layout::BUS_ATTACK)? as usize,
                    release: BusRelease::from_index(p.get(layout::BUS_RELEASE)? as usize),
                    makeup_db: p.get(layout::BUS_MAKEUP)?,
                    sidechain: p.get(layout::SIDECHAIN_ENABLE)? > 0.5,
                }))
            }
        }
    }

    /// Deepest reduction across channels for the active bank
    fn active_gain_reduction(&self, mode: CompressorMode, channels: usize) -> Sample {
        let detector: &dyn Detector = match mode {
            CompressorMode::Opto => &self.opto,
            CompressorMode::Fet => &self.fet,
            CompressorMode::Vca => &self.vca,
            CompressorMode::Bus => &self.bus,
        };
        (0..channels)
            .map(|ch| detector.gain_reduction_db(ch))
            .fold(0.0, Sample::min)
    }

    fn peak_db(buffer: &[&mut [Sample]], channels: usize) -> Sample {
        let mut level: Sample = 0.0;
        for ch in buffer.iter().take(channels) {
            level = level.max(uc_core::peak(ch));
        }
        if level > METER_SILENCE {
            uc_core::gain_to_db(level)
        } else {
            SILENCE_FLOOR_DB
        }
    }

    /// Process one block in place. Never allocates, never blocks; any
    /// missing precondition turns the call into a silent bypass.
    pub fn process_block(&mut self, buffer: &mut [&mut [Sample]]) {
        if !self.antialias.is_prepared() || buffer.is_empty() {
            return;
        }
        let block_len = buffer[0].len();
        if block_len == 0 || block_len > self.max_block {
            return;
        }
        let channels = buffer.len().min(self.num_channels);
        if buffer.iter().take(channels).any(|ch| ch.len() != block_len) {
            return;
        }

        match self.params.get(layout::BYPASS) {
            Some(v) if v <= 0.5 => {}
            _ => return,
        }

        let mode = self.current_mode();
        let Some(mode_params) = self.cache_params(mode) else {
            return;
        };
        let Some(mix) = self.params.get(layout::MIX) else {
            return;
        };
        let mix = (mix / 100.0).clamp(0.0, 1.0);

        self.meters.publish_input_db(Self::peak_db(buffer, channels));

        if mix < 1.0 {
            for (dry, wet) in self.dry.iter_mut().zip(buffer.iter()).take(channels) {
                dry[..block_len].copy_from_slice(wet);
            }
        }

        let os_len = block_len * self.antialias.factor();
        for ch in 0..channels {
            let data = &mut *buffer[ch];
            self.antialias.upsample(ch, data);

            let os = self.antialias.os_block_mut(ch, os_len);
            match &mode_params {
                ModeParams::Opto(p) => {
                    for s in os.iter_mut() {
                        *s = self.opto.process(*s, ch, p);
                    }
                }
                ModeParams::Fet(p) => {
                    for s in os.iter_mut() {
                        *s = self.fet.process(*s, ch, p);
                    }
                }
                ModeParams::Vca(p) => {
                    for s in os.iter_mut() {
                        *s = self.vca.process(*s, ch, p);
                    }
                }
                ModeParams::Bus(p) => {
                    for s in os.iter_mut() {
                        *s = self.bus.process(*s, ch, p);
                    }
                }
            }

            self.antialias.downsample(ch, data);
        }

        // Parallel compression blend
        if mix < 1.0 {
            for ch in 0..channels {
                let wet = &mut *buffer[ch];
                let dry = &self.dry[ch];
                for (w, &d) in wet.iter_mut().zip(dry) {
                    *w = d * (1.0 - mix) + *w * mix;
                }
            }
        }

        self.meters
            .publish_output_db(Self::peak_db(buffer, channels));
        self.meters
            .publish_gain_reduction_db(self.active_gain_reduction(mode, channels));
    }

    /// Zero every detector and filter without resizing anything
    pub fn reset(&mut self) {
        self.opto.reset();
        self.fet.reset();
        self.vca.reset();
        self.bus.reset();
        self.antialias.reset();
        self.meters.reset();
    }
}

impl Default for UniversalCompressor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_rejects_bad_config() {
        let mut comp = UniversalCompressor::new();
        assert!(matches!(
            comp.prepare(0.0, 512, 2),
            Err(UcError::InvalidSampleRate(_))
        ));
        assert!(matches!(
            comp.prepare(-44_100.0, 512, 2),
            Err(UcError::InvalidSampleRate(_))
        ));
        assert!(matches!(
            comp.prepare(44_100.0, 0, 2),
            Err(UcError::InvalidBlockSize(0))
        ));
        assert!(matches!(
            comp.prepare(44_100.0, 512, 0),
            Err(UcError::InvalidChannelCount(0))
        ));
        assert!(comp.prepare(44_100.0, 512, 2).is_ok());
    }

    #[test]
    fn test_unprepared_process_is_noop() {
        let mut comp = UniversalCompressor::new();
        let mut left = vec![0.5; 64];
        let mut right = vec![0.5; 64];
        let mut buffer: Vec<&mut [Sample]> = vec![&mut left, &mut right];
        comp.process_block(&mut buffer);
        assert!(left.iter().all(|&x| x == 0.5));
    }

    #[test]
    fn test_bypass_leaves_buffer_untouched() {
        let mut comp = UniversalCompressor::new();
        comp.prepare(44_100.0, 64, 1).unwrap();
        comp.params().set(layout::BYPASS, 1.0).unwrap();

        let mut data = vec![0.25; 64];
        let mut buffer: Vec<&mut [Sample]> = vec![&mut data];
        comp.process_block(&mut buffer);
        assert!(data.iter().all(|&x| x == 0.25));
    }

    #[test]
    fn test_default_mode_is_vca() {
        let comp = UniversalCompressor::new();
        assert_eq!(comp.current_mode(), CompressorMode::Vca);
    }

    #[test]
    fn test_latency_reported_after_prepare() {
        let mut comp = UniversalCompressor::new();
        assert_eq!(comp.latency_samples(), 0);
        comp.prepare(48_000.0, 256, 2).unwrap();
        assert!(comp.latency_samples() > 0);
    }

    #[test]
    fn test_ragged_channel_lengths_are_bypassed() {
        let mut comp = UniversalCompressor::new();
        comp.prepare(44_100.0, 64, 2).unwrap();

        let mut left = vec![0.25; 64];
        let mut right = vec![0.25; 32];
        let mut buffer: Vec<&mut [Sample]> = vec![&mut left, &mut right];
        comp.process_block(&mut buffer);
        assert!(left.iter().all(|&x| x == 0.25));
        assert!(right.iter().all(|&x| x == 0.25));
    }

    #[test]
    fn test_oversized_block_is_bypassed() {
        let mut comp = UniversalCompressor::new();
        comp.prepare(44_100.0, 64, 1).unwrap();

        let mut data = vec![0.25; 128];
        let mut buffer: Vec<&mut [Sample]> = vec![&mut data];
        comp.process_block(&mut buffer);
        assert!(data.iter().all(|&x| x == 0.25));
    }
}
