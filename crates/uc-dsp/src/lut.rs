//! Fast dB/linear conversion via precomputed tables
//!
//! The detectors convert between decibels and linear gain several times per
//! oversampled sample. These tables replace `powf`/`log10` in that path with
//! an interpolated lookup accurate to well under 1e-4 dB.
//!
//! Tables are built on first use; `warm()` is called from the engine's
//! prepare path so the real-time thread never pays the build cost.

use std::sync::OnceLock;
use uc_core::Sample;

const DB_MIN: Sample = -120.0;
const DB_MAX: Sample = 60.0;
const DB_STEPS: usize = 4096;

// log2 mantissa table resolution (mantissa in [1, 2))
const LOG_STEPS: usize = 2048;

const DB_PER_OCTAVE: Sample = 6.020599913279624; // 20*log10(2)

struct Tables {
    db_to_gain: Vec<Sample>,
    log2: Vec<Sample>,
}

static TABLES: OnceLock<Tables> = OnceLock::new();

fn tables() -> &'static Tables {
    TABLES.get_or_init(|| {
        let db_step = (DB_MAX - DB_MIN) / DB_STEPS as Sample;
        let db_to_gain = (0..=DB_STEPS)
            .map(|i| 10.0_f64.powf((DB_MIN + i as Sample * db_step) / 20.0))
            .collect();
        let log2 = (0..=LOG_STEPS)
            .map(|i| (1.0 + i as Sample / LOG_STEPS as Sample).log2())
            .collect();
        Tables { db_to_gain, log2 }
    })
}

/// Build the tables eagerly (call from a non-real-time context)
pub fn warm() {
    let _ = tables();
}

/// Decibels to linear gain
#[inline]
pub fn db_to_gain(db: Sample) -> Sample {
    if !(DB_MIN..=DB_MAX).contains(&db) {
        return 10.0_f64.powf(db / 20.0);
    }
    let t = tables();
    let pos = (db - DB_MIN) * (DB_STEPS as Sample / (DB_MAX - DB_MIN));
    let idx = pos as usize;
    let frac = pos - idx as Sample;
    let a = t.db_to_gain[idx];
    let b = t.db_to_gain[(idx + 1).min(DB_STEPS)];
    a + (b - a) * frac
}

/// Linear gain to decibels, floored at -100 dB (matches `uc_core::gain_to_db`)
#[inline]
pub fn gain_to_db(gain: Sample) -> Sample {
    if gain <= 1e-5 {
        return -100.0;
    }
    if !gain.is_finite() {
        return uc_core::gain_to_db(gain);
    }
    let t = tables();
    let bits = gain.to_bits();
    let exponent = ((bits >> 52) & 0x7ff) as i64 - 1023;
    // Mantissa fraction in [0, 1); index into the log2 table
    let frac_bits = bits & 0x000f_ffff_ffff_ffff;
    let pos = frac_bits as Sample * (LOG_STEPS as Sample / 4503599627370496.0);
    let idx = pos as usize;
    let frac = pos - idx as Sample;
    let a = t.log2[idx];
    let b = t.log2[(idx + 1).min(LOG_STEPS)];
    let log2_m = a + (b - a) * frac;
    DB_PER_OCTAVE * (exponent as Sample + log2_m)
}
