//! Module containing all scalar type definitions, port identifiers, and the
//! crate's error taxonomy.

use std::fmt;

use petgraph::stable_graph::NodeIndex;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod time_unit;
pub use time_unit::TimeUnit;

/// Index type backing the network graph.
pub(crate) type IndexType = u32;
/// Identifier of a component (and index into the network graph).
pub type ComponentId = NodeIndex<IndexType>;

/// Signed simulation clock, in seconds.
pub type RealTime = i64;

/// Flow rate (conventionally kW); energy is `rate * seconds` (kJ).
pub type Flow = f64;

/// Absolute tolerance used for every flow comparison in the crate.
pub const FLOW_TOLERANCE: Flow = 1e-6;

/// `true` if `a` and `b` are equal within [`FLOW_TOLERANCE`].
pub fn flow_eq(a: Flow, b: Flow) -> bool {
    (a - b).abs() <= FLOW_TOLERANCE
}

/// `true` if `a <= b` within [`FLOW_TOLERANCE`].
pub fn flow_le(a: Flow, b: Flow) -> bool {
    a <= b + FLOW_TOLERANCE
}

/// A next-event delay, or "idle forever". `Infinity` sorts above any
/// representable delay, matching the sentinel `ta()` is allowed to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TimeAdvance {
    /// Fire the next internal transition after this many seconds.
    At(RealTime),
    /// Never fire on its own; only external input can move this model.
    Infinity,
}

impl TimeAdvance {
    /// `true` for [`TimeAdvance::Infinity`].
    pub fn is_infinity(&self) -> bool {
        matches!(self, TimeAdvance::Infinity)
    }

    /// The absolute time this advance resolves to, given the model's
    /// current logical time. `None` means it never fires.
    pub fn resolve(&self, now: RealTime) -> Option<RealTime> {
        match self {
            TimeAdvance::At(dt) => Some(now + dt),
            TimeAdvance::Infinity => None,
        }
    }
}

impl fmt::Display for TimeAdvance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeAdvance::At(dt) => write!(f, "{dt}s"),
            TimeAdvance::Infinity => write!(f, "inf"),
        }
    }
}

/// Identifies a port on an atomic model. Scoped to the owning model: two
/// different models may both use `PortId(0)` to mean different things.
///
/// The base four ids follow spec: downstream asks for more outflow (0),
/// upstream reports inflow delivery (1), this model asks upstream for more
/// inflow (2), this model reports achieved outflow downstream (3). Converter
/// lossflow/wasteflow and Mover's second inflow extend sequentially from 4.
/// Mux numbers its N inflow-side ports and M outflow-side ports in two
/// disjoint ranges (see [`PortId::mux_inflow_request`] and friends) since a
/// mux has no single canonical inflow/outflow pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PortId(pub u32);

impl PortId {
    /// Downstream requests more outflow from this model.
    pub const INPORT_OUTFLOW_REQUEST: PortId = PortId(0);
    /// Upstream reports achieved inflow to this model.
    pub const INPORT_INFLOW_ACHIEVED: PortId = PortId(1);
    /// This model requests more inflow from upstream.
    pub const OUTPORT_INFLOW_REQUEST: PortId = PortId(2);
    /// This model reports achieved outflow to downstream.
    pub const OUTPORT_OUTFLOW_ACHIEVED: PortId = PortId(3);

    /// Converter: downstream (a meter on the lossflow stream) requests
    /// lossflow.
    pub const INPORT_LOSSFLOW_REQUEST: PortId = PortId(4);
    /// Converter: reports achieved lossflow downstream.
    pub const OUTPORT_LOSSFLOW_ACHIEVED: PortId = PortId(5);
    /// Converter: reports achieved wasteflow (accounting only, usually
    /// left uncoupled).
    pub const OUTPORT_WASTEFLOW_ACHIEVED: PortId = PortId(6);

    /// Storage: reports achieved storeflow (accounting only).
    pub const OUTPORT_STOREFLOW_ACHIEVED: PortId = PortId(4);
    /// Storage: reports achieved discharge (accounting only).
    pub const OUTPORT_DISCHARGE_ACHIEVED: PortId = PortId(5);

    /// Mover: requests more "moved" inflow from upstream.
    pub const OUTPORT_MOVED_INFLOW_REQUEST: PortId = PortId(10);
    /// Mover: upstream reports achieved "moved" inflow.
    pub const INPORT_MOVED_INFLOW_ACHIEVED: PortId = PortId(11);
    /// Mover: requests more "powered" inflow from upstream.
    pub const OUTPORT_POWERED_INFLOW_REQUEST: PortId = PortId(12);
    /// Mover: upstream reports achieved "powered" inflow.
    pub const INPORT_POWERED_INFLOW_ACHIEVED: PortId = PortId(13);

    /// Mux: nth inflow port, outport asking upstream `i` for more inflow.
    pub fn mux_inflow_request(i: u32) -> PortId {
        PortId(2 * i)
    }
    /// Mux: nth inflow port, inport receiving achieved inflow from upstream `i`.
    pub fn mux_inflow_achieved(i: u32) -> PortId {
        PortId(2 * i + 1)
    }
    /// Mux: kth outflow port, inport receiving an outflow request from downstream `k`.
    pub fn mux_outflow_request(k: u32) -> PortId {
        PortId(1_000 + 2 * k)
    }
    /// Mux: kth outflow port, outport reporting achieved outflow to downstream `k`.
    pub fn mux_outflow_achieved(k: u32) -> PortId {
        PortId(1_000 + 2 * k + 1)
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "port#{}", self.0)
    }
}

/// A coupling message: a new value on a given port.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PortValue {
    /// The destination port (local to the receiving model).
    pub port: PortId,
    /// The new flow value.
    pub value: Flow,
}

impl PortValue {
    /// Build a new port value.
    pub fn new(port: PortId, value: Flow) -> Self {
        Self { port, value }
    }
}

/// A named flow-carrying stream (`"electricity"`, `"diesel"`, `"heat"`, ...).
/// Two connected ports must share a stream name; the network builder
/// rejects links that don't (see [`crate::types::SimulationError::MixedStreams`]).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Stream {
    /// Stream name, e.g. `"electricity"`.
    pub name: String,
    /// Rate unit (e.g. `"kW"`), informational only: no implicit conversion
    /// is ever performed between differing units (see
    /// [`SimulationError::InconsistentStreamUnits`]).
    pub rate_unit: Option<String>,
    /// Quantity unit (e.g. `"kJ"`), informational only.
    pub quantity_unit: Option<String>,
}

impl Stream {
    /// A stream with no unit metadata.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rate_unit: None,
            quantity_unit: None,
        }
    }

    /// A stream carrying explicit rate/quantity unit metadata.
    pub fn with_units(
        name: impl Into<String>,
        rate_unit: impl Into<String>,
        quantity_unit: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            rate_unit: Some(rate_unit.into()),
            quantity_unit: Some(quantity_unit.into()),
        }
    }
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// How a port's achieved flow is accounted for in the stats stage (C9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PortRole {
    /// A generic inflow, accounted under none of the roles below.
    Inflow,
    /// Inflow into a load component.
    LoadInflow,
    /// Inflow that ends up as wasteflow (unaccounted converter loss).
    WasteInflow,
    /// Inflow into storage (charging).
    StorageInflow,
    /// A generic outflow.
    Outflow,
    /// Outflow out of a source.
    SourceOutflow,
    /// Outflow out of storage (discharging).
    StorageOutflow,
}

/// One breakpoint of a piecewise-constant, right-continuous load profile.
/// `rate` is `None` for the end marker (§3: "last item is an end-marker at
/// or after the scenario duration").
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LoadItem {
    /// Breakpoint time.
    pub time: RealTime,
    /// Requested rate starting at `time`, or `None` for the end marker.
    pub rate: Option<Flow>,
}

impl LoadItem {
    /// A breakpoint requesting `rate` starting at `time`.
    pub fn new(time: RealTime, rate: Flow) -> Self {
        Self {
            time,
            rate: Some(rate),
        }
    }

    /// The end-marker breakpoint: the profile requests nothing from `time`
    /// onward and `ta` becomes infinite.
    pub fn end(time: RealTime) -> Self {
        Self { time, rate: None }
    }

    /// `true` for the end marker.
    pub fn is_end(&self) -> bool {
        self.rate.is_none()
    }
}

/// A scheduled `(time, available?)` transition, as produced by external
/// reliability/fragility schedule computation (out of scope for this
/// crate — see [`crate::dist`]).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TimeState {
    /// The time of the transition.
    pub time: RealTime,
    /// `true` if the component becomes available at `time`.
    pub available: bool,
}

impl TimeState {
    /// Build a new scheduled transition.
    pub fn new(time: RealTime, available: bool) -> Self {
        Self { time, available }
    }
}

/// Malformed scenario configuration, detected before a run starts.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BadInputError {
    /// A load profile's breakpoint times are not strictly increasing.
    #[error("load profile times are not strictly increasing at index {0}")]
    NonMonotonicLoad(usize),
    /// A connection joins two ports whose configured streams differ.
    #[error("connection stream mismatch: {0} vs {1}")]
    StreamMismatch(String, String),
    /// A converter's constant efficiency is outside `(0, 1]`.
    #[error("constant efficiency {0} is outside (0, 1]")]
    InvalidEfficiency(Flow),
    /// A storage component's capacity is not positive.
    #[error("storage capacity {0} must be > 0")]
    InvalidCapacity(Flow),
    /// A flow-limit component has `lower > upper`.
    #[error("flow limits lower bound {0} exceeds upper bound {1}")]
    InvalidFlowLimits(Flow, Flow),
    /// A required field was missing from a component/scenario spec.
    #[error("missing required field `{0}` on `{1}`")]
    MissingField(&'static str, String),
    /// A mover's coefficient of performance is not positive.
    #[error("mover COP {0} must be > 0")]
    InvalidCop(Flow),
    /// A tabulated conversion function's samples are not monotone, or the
    /// forward/inverse pair disagree by more than [`FLOW_TOLERANCE`].
    #[error("tabulated conversion function is not a valid monotone inverse pair")]
    InvalidConversionTable,
    /// A connection's `(port_type, port_num)` does not resolve against the
    /// component kind it names (e.g. a lossflow tap on a `Load`).
    #[error("connection {0} does not expose the requested port shape")]
    PortShapeMismatch(String),
    /// A storage component's initial state of charge is outside `[0, 1]`.
    #[error("initial state of charge {0} must be in [0, 1]")]
    InvalidStateOfCharge(Flow),
}

/// Errors surfaced by an individual component's state machine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ComponentError {
    /// A message arrived on a port id the model doesn't define.
    #[error("message on undefined port {0} for component {1:?}")]
    BadPort(PortId, ComponentId),
    /// A downstream report exceeded the prior request by more than
    /// [`FLOW_TOLERANCE`] (after over-deliver clamping).
    #[error("component {0:?} reported achieved {1} > requested {2}")]
    AchievedMoreThanRequested(ComponentId, Flow, Flow),
    /// A model's state fails the conservation invariant
    /// (`inflow = outflow + storeflow + lossflow + wasteflow`) by more than
    /// [`FLOW_TOLERANCE`].
    #[error("flow invariant violated at component {0:?} (time {1}): inflow {2}, accounted {3}")]
    FlowInvariant(ComponentId, RealTime, Flow, Flow),
    /// A model received both an inflow-achieved and an outflow-request in
    /// the same `delta_ext` with no confluent rule defined for that pair.
    #[error("component {0:?} received simultaneous inflow/outflow input with no confluent rule")]
    SimultaneousIoRequest(ComponentId),
    /// A runtime message arrived on a port whose configured stream differs
    /// from the message's stream.
    #[error("mixed streams at component {0:?}: expected {1}, got {2}")]
    MixedStreams(ComponentId, String, String),
    /// A component was constructed with differing in/out port rate units.
    #[error("inconsistent stream units at component {0:?}: {1} vs {2}")]
    InconsistentStreamUnits(ComponentId, String, String),
}

/// Top-level error type returned by the network, scheduler, and scenario
/// runner.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimulationError {
    /// See [`BadInputError`]. Fatal before a run starts.
    #[error("bad input: {0}")]
    BadInput(#[from] BadInputError),
    /// See [`ComponentError`]. Fatal for the scenario run in progress.
    #[error("component error: {0}")]
    Component(#[from] ComponentError),
    /// The scheduler exceeded `max_no_advance` consecutive zero-time steps.
    #[error("stuck simulation: exceeded {0} consecutive zero-time advances")]
    Stuck(usize),
    /// A component id was not found in the network.
    #[error("component not found: {0:?}")]
    ComponentNotFound(ComponentId),
    /// A coupling references a port id the destination model doesn't
    /// define, detected at build time.
    #[error("coupling references undefined port {0} on component {1:?}")]
    BadCoupling(PortId, ComponentId),
    /// A write was attempted on the [`crate::recorder::FlowWriter`] after
    /// `finalize_at_time` had already been called.
    #[error("flow writer already finalized")]
    WriterFinalized,
}
