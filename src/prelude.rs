//! Convenience re-export of the members most callers need.

pub use crate::dist::{DistId, DistributionSystem, FixedDistribution, ScriptedDistribution};
pub use crate::model::{AtomicModel, DispatchStrategy, Efficiency, Model, ModelKind};
pub use crate::network::{Coupling, Network};
pub use crate::port::{Port, PortUpdate};
pub use crate::recorder::{Datum, FlowWriter};
pub use crate::scenario::{build_network, BuiltNetwork, ScenarioRunner};
pub use crate::scheduler::Scheduler;
pub use crate::spec::{
    ComponentDef, ComponentSpec, Connection, ConnectionPortType, ConversionSpec, DistSpec, Scenario,
    ScenarioInput, SimulationInfo,
};
pub use crate::stats::{component_stats, role_totals, AllResults, ComponentStats, RoleTotals, ScenarioResults};
pub use crate::types::{
    BadInputError, ComponentError, ComponentId, Flow, LoadItem, PortId, PortRole, PortValue, RealTime,
    SimulationError, Stream, TimeAdvance, TimeState, TimeUnit,
};
