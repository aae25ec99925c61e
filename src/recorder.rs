//! FlowWriter (C6): accumulates one time series per recorded
//! component/sub-port tag (e.g. `"tank-inflow"`, `"genset-outflow"`) for
//! later hand-off to [`crate::stats`].
//!
//! Every tag is registered once up front (construction time, §5: "its
//! `register_id` is called during construction only"), written many times
//! during a run, and sealed exactly once by [`FlowWriter::finalize_at_time`].
//! Writes after finalization are rejected rather than silently dropped,
//! since a late write would otherwise mean a component kept transitioning
//! after the scenario was declared over.

use std::collections::HashMap;

use crate::types::{Flow, RealTime, SimulationError};

/// One recorded `(requested, achieved)` sample at a point in time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Datum {
    /// Seconds since the scenario start.
    pub time_s: RealTime,
    /// Requested rate at `time_s`.
    pub requested: Flow,
    /// Achieved rate at `time_s`.
    pub achieved: Flow,
}

/// Accumulates per-tag flow time series for one scenario run.
#[derive(Debug, Default)]
pub struct FlowWriter {
    series: HashMap<String, Vec<Datum>>,
    finalized: bool,
}

impl FlowWriter {
    /// An empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tag so it has a (possibly empty) series even if no
    /// sample is ever written for it. Idempotent.
    pub fn register_id(&mut self, tag: impl Into<String>) {
        self.series.entry(tag.into()).or_default();
    }

    /// Record a sample for `tag` at `time_s`. A second write at the same
    /// `time_s` (common right after a zero-time settle cascade) overwrites
    /// the prior sample rather than appending a duplicate point.
    pub fn write_data(&mut self, tag: &str, time_s: RealTime, requested: Flow, achieved: Flow) -> Result<(), SimulationError> {
        if self.finalized {
            return Err(SimulationError::WriterFinalized);
        }
        let series = self.series.entry(tag.to_string()).or_default();
        match series.last_mut() {
            Some(last) if last.time_s == time_s => {
                last.requested = requested;
                last.achieved = achieved;
            }
            _ => series.push(Datum { time_s, requested, achieved }),
        }
        Ok(())
    }

    /// Seal the writer, forcing every registered tag to a final zero-flow
    /// record at `time_s` (the scenario's end, regardless of what its last
    /// real sample was). No writes are accepted afterward.
    pub fn finalize_at_time(&mut self, time_s: RealTime) -> Result<(), SimulationError> {
        if self.finalized {
            return Err(SimulationError::WriterFinalized);
        }
        for series in self.series.values_mut() {
            series.push(Datum { time_s, requested: 0.0, achieved: 0.0 });
        }
        self.finalized = true;
        Ok(())
    }

    /// `true` once [`FlowWriter::finalize_at_time`] has been called.
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// The recorded series for `tag`, if registered.
    pub fn series(&self, tag: &str) -> Option<&[Datum]> {
        self.series.get(tag).map(Vec::as_slice)
    }

    /// Every registered tag and its recorded series.
    pub fn all_series(&self) -> &HashMap<String, Vec<Datum>> {
        &self.series
    }
}
