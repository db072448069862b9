//! Sample type and level conversions

/// Type alias for audio samples (always f64 for maximum precision)
pub type Sample = f64;

/// Silence floor used by the meters, in dB
pub const SILENCE_FLOOR_DB: Sample = -60.0;

/// Convert decibels to linear gain
#[inline]
pub fn db_to_gain(db: Sample) -> Sample {
    10.0_f64.powf(db / 20.0)
}

/// Convert linear gain to decibels, floored at -100 dB for near-zero input
#[inline]
pub fn gain_to_db(gain: Sample) -> Sample {
    if gain > 1e-5 {
        20.0 * gain.log10()
    } else {
        -100.0
    }
}

/// Peak magnitude of a channel buffer
#[inline]
pub fn peak(buffer: &[Sample]) -> Sample {
    buffer.iter().fold(0.0, |acc, &x| acc.max(x.abs()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_db_gain_round_trip() {
        for db in [-60.0, -18.0, -6.0, 0.0, 6.0, 20.0] {
            assert_relative_eq!(gain_to_db(db_to_gain(db)), db, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_gain_to_db_floor() {
        assert_eq!(gain_to_db(0.0), -100.0);
        assert_eq!(gain_to_db(1e-9), -100.0);
    }

    #[test]
    fn test_peak() {
        assert_eq!(peak(&[0.1, -0.5, 0.3]), 0.5);
        assert_eq!(peak(&[]), 0.0);
    }
}
