//! Named parameter store for audio processors
//!
//! Single-writer/multi-reader atomic scalar publication: a UI or host thread
//! writes values, the audio thread reads them torn-free without locks.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::{Sample, UcError, UcResult};

/// Parameter range specification
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ParamRange {
    pub min: Sample,
    pub max: Sample,
    pub default: Sample,
}

impl ParamRange {
    pub const fn new(min: Sample, max: Sample, default: Sample) -> Self {
        Self { min, max, default }
    }

    /// Boolean flag range (0 = off, 1 = on)
    pub const fn toggle(default_on: bool) -> Self {
        Self {
            min: 0.0,
            max: 1.0,
            default: if default_on { 1.0 } else { 0.0 },
        }
    }

    /// Discrete choice range over `count` indices
    pub const fn choice(count: usize, default: usize) -> Self {
        Self {
            min: 0.0,
            max: (count - 1) as Sample,
            default: default as Sample,
        }
    }

    #[inline]
    pub fn clamp(&self, value: Sample) -> Sample {
        value.clamp(self.min, self.max)
    }
}

/// Static description of one parameter
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ParamSpec {
    pub id: &'static str,
    pub name: &'static str,
    pub range: ParamRange,
}

impl ParamSpec {
    pub const fn new(id: &'static str, name: &'static str, range: ParamRange) -> Self {
        Self { id, name, range }
    }
}

/// Atomic parameter cell for lock-free access
#[derive(Debug)]
struct AtomicParam {
    bits: AtomicU64,
}

impl AtomicParam {
    fn new(value: Sample) -> Self {
        Self {
            bits: AtomicU64::new(value.to_bits()),
        }
    }

    #[inline]
    fn get(&self) -> Sample {
        Sample::from_bits(self.bits.load(Ordering::Relaxed))
    }

    #[inline]
    fn set(&self, value: Sample) {
        self.bits.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// Serializable snapshot of all parameter values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamSnapshot {
    pub values: Vec<(String, Sample)>,
}

/// Lock-free named parameter store
///
/// The parameter set is fixed at construction; reads and writes after that
/// are wait-free and never allocate.
#[derive(Debug)]
pub struct ParameterStore {
    specs: Vec<ParamSpec>,
    values: Vec<AtomicParam>,
}

impl ParameterStore {
    pub fn new(specs: Vec<ParamSpec>) -> Self {
        let values = specs
            .iter()
            .map(|s| AtomicParam::new(s.range.default))
            .collect();
        Self { specs, values }
    }

    fn index_of(&self, id: &str) -> Option<usize> {
        self.specs.iter().position(|s| s.id == id)
    }

    /// Current value of a parameter, or `None` if the id is unknown
    #[inline]
    pub fn get(&self, id: &str) -> Option<Sample> {
        self.index_of(id).map(|i| self.values[i].get())
    }

    /// Set a parameter, clamping into its declared range
    pub fn set(&self, id: &str, value: Sample) -> UcResult<()> {
        let i = self
            .index_of(id)
            .ok_or_else(|| UcError::UnknownParam(id.to_string()))?;
        self.values[i].set(self.specs[i].range.clamp(value));
        Ok(())
    }

    /// Reset every parameter to its declared default
    pub fn reset_to_defaults(&self) {
        for (spec, value) in self.specs.iter().zip(&self.values) {
            value.set(spec.range.default);
        }
    }

    pub fn specs(&self) -> &[ParamSpec] {
        &self.specs
    }

    /// Capture all current values for persistence
    pub fn snapshot(&self) -> ParamSnapshot {
        ParamSnapshot {
            values: self
                .specs
                .iter()
                .zip(&self.values)
                .map(|(spec, value)| (spec.id.to_string(), value.get()))
                .collect(),
        }
    }

    /// Restore values from a snapshot; unknown ids are ignored, values are
    /// clamped into the current ranges
    pub fn restore(&self, snapshot: &ParamSnapshot) {
        for (id, value) in &snapshot.values {
            if let Some(i) = self.index_of(id) {
                self.values[i].set(self.specs[i].range.clamp(*value));
            }
        }
    }

    /// Serialize the current values to JSON
    pub fn to_json(&self) -> UcResult<String> {
        serde_json::to_string(&self.snapshot())
            .map_err(|e| UcError::Serialization(e.to_string()))
    }

    /// Restore values from a JSON snapshot
    pub fn from_json(&self, json: &str) -> UcResult<()> {
        let snapshot: ParamSnapshot =
            serde_json::from_str(json).map_err(|e| UcError::Serialization(e.to_string()))?;
        self.restore(&snapshot);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> ParameterStore {
        ParameterStore::new(vec![
            ParamSpec::new("threshold", "Threshold", ParamRange::new(-60.0, 0.0, -20.0)),
            ParamSpec::new("ratio", "Ratio", ParamRange::new(1.0, 120.0, 4.0)),
            ParamSpec::new("bypass", "Bypass", ParamRange::toggle(false)),
        ])
    }

    #[test]
    fn test_defaults() {
        let store = test_store();
        assert_eq!(store.get("threshold"), Some(-20.0));
        assert_eq!(store.get("ratio"), Some(4.0));
        assert_eq!(store.get("bypass"), Some(0.0));
        assert_eq!(store.get("nope"), None);
    }

    #[test]
    fn test_set_clamps() {
        let store = test_store();
        store.set("ratio", 500.0).unwrap();
        assert_eq!(store.get("ratio"), Some(120.0));
        store.set("threshold", -90.0).unwrap();
        assert_eq!(store.get("threshold"), Some(-60.0));
        assert!(store.set("nope", 1.0).is_err());
    }

    #[test]
    fn test_snapshot_round_trip() {
        let store = test_store();
        store.set("ratio", 10.0).unwrap();
        store.set("bypass", 1.0).unwrap();

        let json = store.to_json().unwrap();

        let restored = test_store();
        restored.from_json(&json).unwrap();
        assert_eq!(restored.get("ratio"), Some(10.0));
        assert_eq!(restored.get("bypass"), Some(1.0));
        assert_eq!(restored.get("threshold"), Some(-20.0));
    }

    #[test]
    fn test_restore_ignores_unknown() {
        let store = test_store();
        store.restore(&ParamSnapshot {
            values: vec![("ghost".to_string(), 3.0), ("ratio".to_string(), 8.0)],
        });
        assert_eq!(store.get("ratio"), Some(8.0));
    }
}
