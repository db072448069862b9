//! Engine integration tests
//!
//! Runs the full block path: parameter store -> orchestrator -> oversampled
//! detectors -> meters, the way a host would drive it.

use std::f64::consts::PI;

use uc_core::Sample;
use uc_dsp::CompressorMode;
use uc_engine::UniversalCompressor;

const SAMPLE_RATE: f64 = 44_100.0;
const BLOCK_SIZE: usize = 512;

/// Generate test sine wave
fn generate_sine(samples: usize, freq: f64, amplitude: f64) -> Vec<Sample> {
    (0..samples)
        .map(|i| {
            let t = i as f64 / SAMPLE_RATE;
            amplitude * (2.0 * PI * freq * t).sin()
        })
        .collect()
}

fn is_valid_signal(signal: &[Sample]) -> bool {
    signal.iter().all(|&x| x.is_finite())
}

/// Stream a stereo signal through the engine block by block, in place
fn run_stereo(comp: &mut UniversalCompressor, left: &mut [Sample], right: &mut [Sample]) {
    let total = left.len();
    let mut pos = 0;
    while pos < total {
        let len = BLOCK_SIZE.min(total - pos);
        let (l, r) = (&mut left[pos..pos + len], &mut right[pos..pos + len]);
        let mut buffer: Vec<&mut [Sample]> = vec![l, r];
        comp.process_block(&mut buffer);
        pos += len;
    }
}

fn prepared_engine() -> UniversalCompressor {
    let mut comp = UniversalCompressor::new();
    comp.prepare(SAMPLE_RATE, BLOCK_SIZE, 2).unwrap();
    comp
}

#[test]
fn test_silence_stays_silent_in_all_modes() {
    for mode in 0..4 {
        let mut comp = prepared_engine();
        comp.params().set("mode", mode as Sample).unwrap();

        let mut left = vec![0.0; 4 * BLOCK_SIZE];
        let mut right = vec![0.0; 4 * BLOCK_SIZE];
        run_stereo(&mut comp, &mut left, &mut right);

        assert!(left.iter().all(|&x| x.abs() < 1e-9), "mode {mode}");
        assert_eq!(comp.input_level_db(), -60.0);
        assert_eq!(comp.output_level_db(), -60.0);
        assert!(comp.gain_reduction_db() > -0.1);
    }
}

#[test]
fn test_vca_block_path_compresses_and_meters() {
    let mut comp = prepared_engine();
    let params = comp.params();
    params.set("mode", 2.0).unwrap();
    params.set("vca_threshold", -20.0).unwrap();
    params.set("vca_ratio", 4.0).unwrap();

    let mut left = generate_sine(44_100, 1_000.0, 0.5);
    let mut right = left.clone();
    run_stereo(&mut comp, &mut left, &mut right);

    assert!(is_valid_signal(&left) && is_valid_signal(&right));
    assert_eq!(comp.current_mode(), CompressorMode::Vca);

    // Meters: input around -6 dBFS peak, output below it, reduction active
    assert!((comp.input_level_db() + 6.0).abs() < 1.0);
    assert!(comp.output_level_db() < comp.input_level_db());
    let gr = comp.gain_reduction_db();
    assert!((-12.0..=-4.0).contains(&gr), "gr = {gr}");
}

#[test]
fn test_mode_switch_mid_stream_stays_bounded() {
    let mut comp = prepared_engine();
    let params = comp.params();
    params.set("opto_peak_reduction", 70.0).unwrap();
    params.set("fet_input", 20.0).unwrap();
    params.set("vca_threshold", -20.0).unwrap();
    params.set("vca_ratio", 10.0).unwrap();
    params.set("bus_threshold", -12.0).unwrap();

    let tone = generate_sine(BLOCK_SIZE, 1_000.0, 0.9);

    // Cycle through every mode transition while the tone keeps running
    for step in 0..32 {
        comp.params().set("mode", (step % 4) as Sample).unwrap();

        let mut left = tone.clone();
        let mut right = tone.clone();
        run_stereo(&mut comp, &mut left, &mut right);

        for &x in left.iter().chain(right.iter()) {
            assert!(x.is_finite());
            assert!(x.abs() <= 2.0, "sample {x} above the hard ceiling");
        }
        let gr = comp.gain_reduction_db();
        assert!(gr.is_finite());
        assert!((-80.0..=1e-5).contains(&gr), "gr = {gr}");
    }
}

#[test]
fn test_dry_wet_mix_blends_toward_input() {
    // Heavy compression, 100% wet vs 25% wet on the same program
    let mut wet = prepared_engine();
    let mut mostly_dry = prepared_engine();
    for comp in [&wet, &mostly_dry] {
        let params = comp.params();
        params.set("mode", 2.0).unwrap();
        params.set("vca_threshold", -30.0).unwrap();
        params.set("vca_ratio", 20.0).unwrap();
    }
    mostly_dry.params().set("mix", 25.0).unwrap();

    let source = generate_sine(22_050, 1_000.0, 0.8);

    let mut wet_l = source.clone();
    let mut wet_r = source.clone();
    run_stereo(&mut wet, &mut wet_l, &mut wet_r);

    let mut dry_l = source.clone();
    let mut dry_r = source.clone();
    run_stereo(&mut mostly_dry, &mut dry_l, &mut dry_r);

    // The blended output sits closer to the unprocessed level
    let tail = 11_025;
    let peak = |s: &[Sample]| s[tail..].iter().fold(0.0_f64, |a, &x| a.max(x.abs()));
    let wet_peak = peak(&wet_l);
    let dry_peak = peak(&dry_l);
    let source_peak = peak(&source);
    assert!(wet_peak < dry_peak);
    assert!((source_peak - dry_peak).abs() < (source_peak - wet_peak).abs());
}

#[test]
fn test_bypass_toggle_mid_stream() {
    let mut comp = prepared_engine();
    let params = comp.params();
    params.set("mode", 2.0).unwrap();
    params.set("vca_threshold", -30.0).unwrap();
    params.set("vca_ratio", 20.0).unwrap();

    let tone = generate_sine(BLOCK_SIZE, 1_000.0, 0.8);

    let mut left = tone.clone();
    let mut right = tone.clone();
    run_stereo(&mut comp, &mut left, &mut right);

    // Engaged: the block was rewritten
    assert!(left.iter().zip(&tone).any(|(a, b)| (a - b).abs() > 1e-6));

    comp.params().set("bypass", 1.0).unwrap();
    let mut left = tone.clone();
    let mut right = tone.clone();
    run_stereo(&mut comp, &mut left, &mut right);

    // Bypassed: untouched samples
    assert!(left.iter().zip(&tone).all(|(a, b)| a == b));
}

#[test]
fn test_opto_scenario_engages_and_releases() {
    let mut comp = prepared_engine();
    let params = comp.params();
    params.set("mode", 0.0).unwrap();
    params.set("opto_peak_reduction", 50.0).unwrap();
    params.set("opto_gain", 50.0).unwrap();

    // One second of -6 dBFS tone settles around 12.7 dB of reduction
    let mut left = generate_sine(44_100, 1_000.0, 0.5);
    let mut right = left.clone();
    run_stereo(&mut comp, &mut left, &mut right);

    let held = comp.gain_reduction_db();
    assert!((-15.0..=-10.5).contains(&held), "held = {held}");

    // Five seconds of silence: the two-stage release ends nearly dark
    let mut left = vec![0.0; 5 * 44_100];
    let mut right = vec![0.0; 5 * 44_100];
    run_stereo(&mut comp, &mut left, &mut right);
    let released = comp.gain_reduction_db();
    assert!(released > -1.0, "release incomplete: {released} dB");
}

#[test]
fn test_stereo_meter_reports_deepest_channel() {
    let mut comp = prepared_engine();
    let params = comp.params();
    params.set("mode", 2.0).unwrap();
    params.set("vca_threshold", -20.0).unwrap();
    params.set("vca_ratio", 10.0).unwrap();

    // Hot left channel, quiet right channel
    let mut left = generate_sine(22_050, 1_000.0, 0.9);
    let mut right = generate_sine(22_050, 1_000.0, 0.01);
    run_stereo(&mut comp, &mut left, &mut right);

    // Published value is the deepest (most negative) across channels, so it
    // reflects the hot channel
    let gr = comp.gain_reduction_db();
    assert!(gr < -8.0, "gr = {gr}");
}

#[test]
fn test_parameter_snapshot_round_trip() {
    let comp = prepared_engine();
    let params = comp.params();
    params.set("mode", 1.0).unwrap();
    params.set("fet_input", 12.0).unwrap();
    params.set("fet_ratio", 3.0).unwrap();
    params.set("mix", 60.0).unwrap();

    let json = params.to_json().unwrap();

    let other = UniversalCompressor::new();
    other.params().from_json(&json).unwrap();
    assert_eq!(other.params().get("mode"), Some(1.0));
    assert_eq!(other.params().get("fet_input"), Some(12.0));
    assert_eq!(other.params().get("fet_ratio"), Some(3.0));
    assert_eq!(other.params().get("mix"), Some(60.0));
    assert_eq!(other.current_mode(), CompressorMode::Fet);
}

#[test]
fn test_meters_readable_from_consumer_thread() {
    let mut comp = prepared_engine();
    comp.params().set("vca_threshold", -20.0).unwrap();
    comp.params().set("vca_ratio", 8.0).unwrap();
    let meters = comp.meters();

    let reader = std::thread::spawn(move || {
        for _ in 0..10_000 {
            let gr = meters.gain_reduction_db();
            assert!(gr.is_finite());
            assert!(gr <= 1e-5);
        }
    });

    let mut left = generate_sine(44_100, 1_000.0, 0.7);
    let mut right = left.clone();
    run_stereo(&mut comp, &mut left, &mut right);

    reader.join().unwrap();
}
