//! Concrete parameter layout for the universal compressor
//!
//! One flat namespace covering the global controls and all four mode panels.
//! Ranges and defaults follow the hardware references each mode emulates.

use uc_core::{ParamRange, ParamSpec};

// Global
pub const MODE: &str = "mode";
pub const BYPASS: &str = "bypass";
pub const MIX: &str = "mix";
pub const STEREO_LINK: &str = "stereo_link";
pub const SIDECHAIN_ENABLE: &str = "sidechain_enable";

// Opto panel
pub const OPTO_PEAK_REDUCTION: &str = "opto_peak_reduction";
pub const OPTO_GAIN: &str = "opto_gain";
pub const OPTO_LIMIT: &str = "opto_limit";

// FET panel
pub const FET_INPUT: &str = "fet_input";
pub const FET_OUTPUT: &str = "fet_output";
pub const FET_ATTACK: &str = "fet_attack";
pub const FET_RELEASE: &str = "fet_release";
pub const FET_RATIO: &str = "fet_ratio";

// VCA panel
pub const VCA_THRESHOLD: &str = "vca_threshold";
pub const VCA_RATIO: &str = "vca_ratio";
pub const VCA_ATTACK: &str = "vca_attack";
pub const VCA_RELEASE: &str = "vca_release";
pub const VCA_OUTPUT: &str = "vca_output";
pub const VCA_OVEREASY: &str = "vca_overeasy";

// Bus panel
pub const BUS_THRESHOLD: &str = "bus_threshold";
pub const BUS_RATIO: &str = "bus_ratio";
pub const BUS_ATTACK: &str = "bus_attack";
pub const BUS_RELEASE: &str = "bus_release";
pub const BUS_MAKEUP: &str = "bus_makeup";

/// Full parameter set, defaulting to the VCA mode
pub fn create_parameter_layout() -> Vec<ParamSpec> {
    vec![
        ParamSpec::new(MODE, "Mode", ParamRange::choice(4, 2)),
        ParamSpec::new(BYPASS, "Bypass", ParamRange::toggle(false)),
        ParamSpec::new(MIX, "Mix", ParamRange::new(0.0, 100.0, 100.0)),
        ParamSpec::new(STEREO_LINK, "Stereo Link", ParamRange::toggle(true)),
        ParamSpec::new(SIDECHAIN_ENABLE, "Sidechain Filter", ParamRange::toggle(true)),
        // Opto: peak reduction drives the sidechain, gain knob is 0-100 with
        // unity at 50
        ParamSpec::new(
            OPTO_PEAK_REDUCTION,
            "Peak Reduction",
            ParamRange::new(0.0, 100.0, 0.0),
        ),
        ParamSpec::new(OPTO_GAIN, "Gain", ParamRange::new(0.0, 100.0, 50.0)),
        ParamSpec::new(OPTO_LIMIT, "Limit Mode", ParamRange::toggle(false)),
        // FET: attack/release in ms, five ratio buttons
        ParamSpec::new(FET_INPUT, "Input", ParamRange::new(-20.0, 40.0, 0.0)),
        ParamSpec::new(FET_OUTPUT, "Output", ParamRange::new(-20.0, 20.0, 0.0)),
        ParamSpec::new(FET_ATTACK, "Attack", ParamRange::new(0.02, 0.8, 0.02)),
        ParamSpec::new(FET_RELEASE, "Release", ParamRange::new(50.0, 1100.0, 400.0)),
        ParamSpec::new(FET_RATIO, "Ratio", ParamRange::choice(5, 0)),
        // VCA: threshold range matches the 160's 10 mV to 3 V detector span
        ParamSpec::new(VCA_THRESHOLD, "Threshold", ParamRange::new(-38.0, 12.0, 0.0)),
        ParamSpec::new(VCA_RATIO, "Ratio", ParamRange::new(1.0, 120.0, 1.0)),
        ParamSpec::new(VCA_ATTACK, "Attack", ParamRange::new(0.1, 50.0, 1.0)),
        ParamSpec::new(VCA_RELEASE, "Release", ParamRange::new(10.0, 5000.0, 100.0)),
        ParamSpec::new(VCA_OUTPUT, "Output", ParamRange::new(-20.0, 20.0, 0.0)),
        ParamSpec::new(VCA_OVEREASY, "Over Easy", ParamRange::toggle(false)),
        // Bus: discrete console switch positions
        ParamSpec::new(BUS_THRESHOLD, "Threshold", ParamRange::new(-30.0, 15.0, 0.0)),
        ParamSpec::new(BUS_RATIO, "Ratio", ParamRange::choice(3, 0)),
        ParamSpec::new(BUS_ATTACK, "Attack", ParamRange::choice(6, 2)),
        ParamSpec::new(BUS_RELEASE, "Release", ParamRange::choice(5, 1)),
        ParamSpec::new(BUS_MAKEUP, "Makeup", ParamRange::new(0.0, 20.0, 0.0)),
    ]
}
