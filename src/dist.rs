//! Distribution facade (C8): the core's only window onto randomness.
//!
//! Everything about *how* a distribution is fit or sampled lives outside
//! this crate (spec §1: "Probability distributions and random-number
//! plumbing" is an external collaborator). What the kernel needs is two
//! narrow operations: turn a uniform draw into a time advance for a named
//! distribution, and produce uniform draws in the first place. Both are
//! expressed as a trait so the scenario runner can be driven by a real RNG
//! in production and by a scripted sequence in tests.

use crate::types::RealTime;

/// Identifies a distribution by the same key used in `ScenarioInput::dist`
/// (see [`crate::spec::DistSpec`]).
pub type DistId = str;

/// External source of time advances and uniform draws.
///
/// `rand_fn` is consumed by the scenario runner to decide when the next
/// occurrence of a scenario starts (`Scenario::occurrence_distribution_id`);
/// `next_time_advance` turns that (or any other) uniform draw into a
/// concrete delay for a named distribution. Implementations are expected to
/// be deterministic for a fixed seed so that two runs with identical inputs
/// produce byte-identical [`crate::stats::AllResults`] (spec §5, property 4).
pub trait DistributionSystem {
    /// Map a uniform draw `u01 in [0, 1)` to a time advance (seconds) for
    /// the distribution named `dist_id`.
    fn next_time_advance(&self, dist_id: &DistId, u01: f64) -> RealTime;

    /// Produce the next uniform draw in `[0, 1)`. Mutates internal RNG
    /// state (or, if [`DistributionSystem::fixed_random_frac`] is set,
    /// simply returns that constant).
    fn rand_fn(&mut self) -> f64;

    /// `SimulationInfo`'s "fixed random fraction" override: when set, every
    /// draw this facade produces is pinned to this constant rather than
    /// sampled, for deterministic testing. `None` means draw normally.
    fn fixed_random_frac(&self) -> Option<f64> {
        None
    }
}

/// A [`DistributionSystem`] that always returns a fixed delay and a fixed
/// uniform draw, for unit and scenario tests that need determinism without
/// pulling in a real RNG crate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedDistribution {
    /// The constant delay returned by every [`Self::next_time_advance`] call.
    pub delay: RealTime,
    /// The constant draw returned by every [`Self::rand_fn`] call.
    pub frac: f64,
}

impl FixedDistribution {
    /// A facade that always advances by `delay` seconds and draws `frac`.
    pub fn new(delay: RealTime, frac: f64) -> Self {
        Self { delay, frac }
    }
}

impl DistributionSystem for FixedDistribution {
    fn next_time_advance(&self, _dist_id: &DistId, _u01: f64) -> RealTime {
        self.delay
    }

    fn rand_fn(&mut self) -> f64 {
        self.frac
    }

    fn fixed_random_frac(&self) -> Option<f64> {
        Some(self.frac)
    }
}

/// A [`DistributionSystem`] driven by a caller-supplied sequence of draws,
/// recycled once exhausted. Useful for scripting a specific sequence of
/// occurrence gaps in a test without depending on a particular RNG crate's
/// output stream.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptedDistribution {
    draws: Vec<f64>,
    next: usize,
    delay_per_unit: RealTime,
}

impl ScriptedDistribution {
    /// Build from a non-empty sequence of `u01` draws; `delay_per_unit`
    /// scales a draw into a time advance (`delay = (draw * delay_per_unit)
    /// as RealTime`), matching a uniform distribution over `[0,
    /// delay_per_unit]`.
    pub fn new(draws: Vec<f64>, delay_per_unit: RealTime) -> Self {
        assert!(!draws.is_empty(), "scripted distribution needs at least one draw");
        Self {
            draws,
            next: 0,
            delay_per_unit,
        }
    }
}

impl DistributionSystem for ScriptedDistribution {
    fn next_time_advance(&self, _dist_id: &DistId, u01: f64) -> RealTime {
        (u01 * self.delay_per_unit as f64).round() as RealTime
    }

    fn rand_fn(&mut self) -> f64 {
        let v = self.draws[self.next % self.draws.len()];
        self.next += 1;
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_distribution_is_constant() {
        let mut d = FixedDistribution::new(3600, 0.25);
        assert_eq!(d.rand_fn(), 0.25);
        assert_eq!(d.next_time_advance("repair", 0.9), 3600);
        assert_eq!(d.fixed_random_frac(), Some(0.25));
    }

    #[test]
    fn scripted_distribution_cycles() {
        let mut d = ScriptedDistribution::new(vec![0.0, 0.5, 1.0], 100);
        assert_eq!(d.rand_fn(), 0.0);
        assert_eq!(d.rand_fn(), 0.5);
        assert_eq!(d.rand_fn(), 1.0);
        assert_eq!(d.rand_fn(), 0.0);
        assert_eq!(d.next_time_advance("x", 0.5), 50);
    }
}
