//! Flow algebra (C2): the per-component conservation record and check.

use crate::types::{ComponentId, ComponentError, Flow, RealTime, FLOW_TOLERANCE};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A component's achieved flow split by role, at one instant. Unused terms
/// are zero. The invariant
/// `inflow == outflow + storeflow + lossflow + wasteflow`
/// must hold within [`FLOW_TOLERANCE`] for any component that passes flow
/// through (flow-limits, converter, mux, storage, mover, on/off switch,
/// pass-through/meter, uncontrolled source). Pure leaves (load, controllable
/// source) have only one side and are not checked.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FlowState {
    /// Achieved inflow.
    pub inflow: Flow,
    /// Achieved outflow.
    pub outflow: Flow,
    /// Achieved storeflow (storage charging).
    pub storeflow: Flow,
    /// Achieved lossflow (accounted loss, e.g. a converter's rejected heat
    /// up to its lossflow request).
    pub lossflow: Flow,
    /// Achieved wasteflow (unaccounted remainder).
    pub wasteflow: Flow,
}

impl FlowState {
    /// Sum of every accounted-for outgoing term.
    pub fn accounted(&self) -> Flow {
        self.outflow + self.storeflow + self.lossflow + self.wasteflow
    }

    /// Validate the conservation invariant, returning a
    /// [`ComponentError::FlowInvariant`] naming `component`/`time` on
    /// failure.
    pub fn check(&self, component: ComponentId, time: RealTime) -> Result<(), ComponentError> {
        let accounted = self.accounted();
        if (self.inflow - accounted).abs() > FLOW_TOLERANCE {
            return Err(ComponentError::FlowInvariant(
                component, time, self.inflow, accounted,
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use petgraph::stable_graph::NodeIndex;

    #[test]
    fn balanced_state_passes() {
        let fs = FlowState {
            inflow: 10.0,
            outflow: 6.0,
            storeflow: 2.0,
            lossflow: 1.0,
            wasteflow: 1.0,
        };
        assert!(fs.check(NodeIndex::new(0), 0).is_ok());
    }

    #[test]
    fn unbalanced_state_fails() {
        let fs = FlowState {
            inflow: 10.0,
            outflow: 6.0,
            ..Default::default()
        };
        assert!(fs.check(NodeIndex::new(0), 0).is_err());
    }
}
