//! Atomic models (C3): per-kind state plus the four DEVS transition
//! functions (`ta`, `lambda`, `delta_int`, `delta_ext`) and the derived
//! `delta_conf`.
//!
//! Rather than a virtual-inheritance hierarchy, every component kind is a
//! concrete state record; [`Model`] is the tagged union of all of them, and
//! the [`AtomicModel`] trait is implemented once for `Model` by dispatching
//! on the enum discriminant. The scheduler only ever sees `Model` and
//! `AtomicModel` — it never downcasts.

mod converter;
mod flow_limits;
mod load;
mod mover;
mod mux;
mod on_off_switch;
mod pass_through;
mod source;
mod storage;
mod uncontrolled_source;

pub use converter::{ConversionTable, ConverterState, Efficiency};
pub use flow_limits::FlowLimitsState;
pub use load::LoadState;
pub use mover::MoverState;
pub use mux::{DispatchStrategy, MuxState};
pub use on_off_switch::OnOffSwitchState;
pub use pass_through::{PassThroughKind, PassThroughState};
pub use source::SourceState;
pub use storage::StorageState;
pub use uncontrolled_source::UncontrolledSourceState;

use crate::flow::FlowState;
use crate::types::{ComponentError, ComponentId, Flow, LoadItem, PortId, RealTime, Stream, TimeAdvance};
use crate::types::{PortValue, TimeState};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The five pure DEVS transition functions every atomic model exposes.
pub trait AtomicModel {
    /// Next internal event delay. `TimeAdvance::At(0)` means "send pending
    /// reports now"; `TimeAdvance::Infinity` means idle until external
    /// input arrives.
    fn ta(&self) -> TimeAdvance;

    /// Outputs emitted just before `delta_int`, valid only when `ta` is due.
    fn lambda(&self) -> Vec<PortValue>;

    /// Internal transition: advances the model's own schedule and clears
    /// pending-report flags.
    fn delta_int(&mut self);

    /// External transition after `elapsed` seconds, given the external
    /// input multiset `xs` (same-port values are summed by the caller
    /// before being split by port).
    fn delta_ext(&mut self, elapsed: RealTime, xs: &[PortValue]);

    /// Confluent transition: an internal timeout and external input land
    /// at the same instant. Runs the internal transition, then applies the
    /// external input at the resulting state with zero elapsed time, rather
    /// than running the two independently with no defined order.
    fn delta_conf(&mut self, xs: &[PortValue]) {
        self.delta_int();
        self.delta_ext(0, xs);
    }

    /// The model's current logical time.
    fn time(&self) -> RealTime;

    /// The model's current flow-conservation record (C2).
    fn flow_state(&self) -> FlowState;

    /// Validate the conservation invariant for `id`, if this kind of model
    /// is subject to it (pure leaves — `Load`, `Source` — are not).
    fn check_conservation(&self, id: ComponentId) -> Result<(), ComponentError>;
}

/// What kind of component a [`Model`] is, used for stats/CSV labeling (C9)
/// and the `<id>-<subport>` result tagging of spec §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ModelKind {
    /// [`LoadState`].
    Load,
    /// [`SourceState`].
    Source,
    /// [`UncontrolledSourceState`].
    UncontrolledSource,
    /// [`FlowLimitsState`].
    FlowLimits,
    /// [`ConverterState`].
    Converter,
    /// [`MuxState`].
    Mux,
    /// [`StorageState`].
    Storage,
    /// [`OnOffSwitchState`].
    OnOffSwitch,
    /// [`PassThroughState`] tagged [`PassThroughKind::FlowMeter`].
    FlowMeter,
    /// [`PassThroughState`] tagged [`PassThroughKind::PassThrough`].
    PassThrough,
    /// [`MoverState`].
    Mover,
}

/// Tagged union of every atomic model kind (§9 "Polymorphism across
/// element kinds").
#[derive(Debug, Clone, PartialEq)]
pub enum Model {
    /// See [`LoadState`].
    Load(LoadState),
    /// See [`SourceState`].
    Source(SourceState),
    /// See [`UncontrolledSourceState`].
    UncontrolledSource(UncontrolledSourceState),
    /// See [`FlowLimitsState`].
    FlowLimits(FlowLimitsState),
    /// See [`ConverterState`].
    Converter(ConverterState),
    /// See [`MuxState`].
    Mux(MuxState),
    /// See [`StorageState`].
    Storage(StorageState),
    /// See [`OnOffSwitchState`].
    OnOffSwitch(OnOffSwitchState),
    /// See [`PassThroughState`].
    PassThrough(PassThroughState),
    /// See [`MoverState`].
    Mover(MoverState),
}

macro_rules! dispatch {
    ($self:expr, $pat:ident => $body:expr) => {
        match $self {
            Model::Load($pat) => $body,
            Model::Source($pat) => $body,
            Model::UncontrolledSource($pat) => $body,
            Model::FlowLimits($pat) => $body,
            Model::Converter($pat) => $body,
            Model::Mux($pat) => $body,
            Model::Storage($pat) => $body,
            Model::OnOffSwitch($pat) => $body,
            Model::PassThrough($pat) => $body,
            Model::Mover($pat) => $body,
        }
    };
}

impl AtomicModel for Model {
    fn ta(&self) -> TimeAdvance {
        dispatch!(self, s => s.ta())
    }

    fn lambda(&self) -> Vec<PortValue> {
        dispatch!(self, s => s.lambda())
    }

    fn delta_int(&mut self) {
        dispatch!(self, s => s.delta_int())
    }

    fn delta_ext(&mut self, elapsed: RealTime, xs: &[PortValue]) {
        dispatch!(self, s => s.delta_ext(elapsed, xs))
    }

    fn time(&self) -> RealTime {
        dispatch!(self, s => s.time())
    }

    fn flow_state(&self) -> FlowState {
        dispatch!(self, s => s.flow_state())
    }

    fn check_conservation(&self, id: ComponentId) -> Result<(), ComponentError> {
        dispatch!(self, s => s.check_conservation(id))
    }
}

impl Model {
    /// The component kind, for stats/CSV labeling.
    pub fn kind(&self) -> ModelKind {
        match self {
            Model::Load(_) => ModelKind::Load,
            Model::Source(_) => ModelKind::Source,
            Model::UncontrolledSource(_) => ModelKind::UncontrolledSource,
            Model::FlowLimits(_) => ModelKind::FlowLimits,
            Model::Converter(_) => ModelKind::Converter,
            Model::Mux(_) => ModelKind::Mux,
            Model::Storage(_) => ModelKind::Storage,
            Model::OnOffSwitch(_) => ModelKind::OnOffSwitch,
            Model::PassThrough(s) => s.kind.as_model_kind(),
            Model::Mover(_) => ModelKind::Mover,
        }
    }

    /// Build a controllable [`SourceState`].
    pub fn source(stream: Stream, max_outflow: Option<Flow>) -> Self {
        Model::Source(SourceState::new(stream, max_outflow))
    }

    /// Build an [`UncontrolledSourceState`] from a supply profile.
    pub fn uncontrolled_source(stream: Stream, supply_profile: Vec<LoadItem>) -> Self {
        Model::UncontrolledSource(UncontrolledSourceState::new(stream, supply_profile))
    }

    /// Build a [`LoadState`] from a load profile.
    pub fn load(stream: Stream, profile: Vec<LoadItem>) -> Self {
        Model::Load(LoadState::new(stream, profile))
    }

    /// Build a [`FlowLimitsState`].
    pub fn flow_limits(stream: Stream, lower: Flow, upper: Flow) -> Self {
        Model::FlowLimits(FlowLimitsState::new(stream, lower, upper))
    }

    /// Build a constant-efficiency [`ConverterState`].
    pub fn converter(
        inflow_stream: Stream,
        outflow_stream: Stream,
        lossflow_stream: Option<Stream>,
        efficiency: Efficiency,
    ) -> Self {
        Model::Converter(ConverterState::new(
            inflow_stream,
            outflow_stream,
            lossflow_stream,
            efficiency,
        ))
    }

    /// Build a [`MuxState`].
    pub fn mux(stream: Stream, num_inflows: u32, num_outflows: u32, strategy: DispatchStrategy) -> Self {
        Model::Mux(MuxState::new(stream, num_inflows, num_outflows, strategy))
    }

    /// Build a [`StorageState`].
    pub fn storage(stream: Stream, capacity: Flow, max_charge_rate: Flow, initial_soc: Flow) -> Self {
        Model::Storage(StorageState::new(stream, capacity, max_charge_rate, initial_soc))
    }

    /// Build an [`OnOffSwitchState`] from a precomputed reliability/
    /// fragility schedule.
    pub fn on_off_switch(stream: Stream, schedule: Vec<TimeState>) -> Self {
        Model::OnOffSwitch(OnOffSwitchState::new(stream, schedule))
    }

    /// Build a [`PassThroughState`] tagged as a flow meter.
    pub fn flow_meter(stream: Stream) -> Self {
        Model::PassThrough(PassThroughState::new(stream, PassThroughKind::FlowMeter))
    }

    /// Build a [`PassThroughState`] with optional min/max outflow bounds.
    pub fn pass_through(stream: Stream) -> Self {
        Model::PassThrough(PassThroughState::new(stream, PassThroughKind::PassThrough))
    }

    /// Build a [`MoverState`].
    pub fn mover(
        moved_stream: Stream,
        powered_stream: Stream,
        outflow_stream: Stream,
        cop: Flow,
    ) -> Self {
        Model::Mover(MoverState::new(moved_stream, powered_stream, outflow_stream, cop))
    }

    /// The stream a given local port belongs to, or `None` if this model
    /// doesn't define that port. The network builder uses this to reject
    /// couplings that join two ports on different streams (§4.4).
    pub fn port_stream(&self, port: PortId) -> Option<&Stream> {
        use PortId as P;
        match self {
            Model::Load(s) => match port {
                P::OUTPORT_INFLOW_REQUEST | P::INPORT_INFLOW_ACHIEVED => Some(&s.stream),
                _ => None,
            },
            Model::Source(s) => match port {
                P::INPORT_OUTFLOW_REQUEST | P::OUTPORT_OUTFLOW_ACHIEVED => Some(&s.stream),
                _ => None,
            },
            Model::UncontrolledSource(s) => match port {
                P::INPORT_OUTFLOW_REQUEST | P::OUTPORT_OUTFLOW_ACHIEVED => Some(&s.stream),
                P::INPORT_LOSSFLOW_REQUEST | P::OUTPORT_LOSSFLOW_ACHIEVED => Some(&s.stream),
                _ => None,
            },
            Model::FlowLimits(s) => match port {
                P::INPORT_OUTFLOW_REQUEST
                | P::OUTPORT_OUTFLOW_ACHIEVED
                | P::OUTPORT_INFLOW_REQUEST
                | P::INPORT_INFLOW_ACHIEVED => Some(&s.stream),
                _ => None,
            },
            Model::Converter(s) => match port {
                P::INPORT_OUTFLOW_REQUEST | P::OUTPORT_OUTFLOW_ACHIEVED => Some(&s.outflow_stream),
                P::OUTPORT_INFLOW_REQUEST | P::INPORT_INFLOW_ACHIEVED => Some(&s.inflow_stream),
                P::INPORT_LOSSFLOW_REQUEST | P::OUTPORT_LOSSFLOW_ACHIEVED => {
                    s.lossflow_stream.as_ref()
                }
                P::OUTPORT_WASTEFLOW_ACHIEVED => Some(&s.inflow_stream),
                _ => None,
            },
            Model::Mux(s) => {
                let n_in = s.num_inflows();
                let n_out = s.num_outflows();
                let is_inflow_port = (0..n_in)
                    .any(|i| port == PortId::mux_inflow_request(i) || port == PortId::mux_inflow_achieved(i));
                let is_outflow_port = (0..n_out)
                    .any(|k| port == PortId::mux_outflow_request(k) || port == PortId::mux_outflow_achieved(k));
                if is_inflow_port || is_outflow_port {
                    Some(&s.stream)
                } else {
                    None
                }
            }
            Model::Storage(s) => match port {
                P::INPORT_OUTFLOW_REQUEST
                | P::OUTPORT_OUTFLOW_ACHIEVED
                | P::OUTPORT_INFLOW_REQUEST
                | P::INPORT_INFLOW_ACHIEVED
                | P::OUTPORT_STOREFLOW_ACHIEVED
                | P::OUTPORT_DISCHARGE_ACHIEVED => Some(&s.stream),
                _ => None,
            },
            Model::OnOffSwitch(s) => match port {
                P::INPORT_OUTFLOW_REQUEST
                | P::OUTPORT_OUTFLOW_ACHIEVED
                | P::OUTPORT_INFLOW_REQUEST
                | P::INPORT_INFLOW_ACHIEVED => Some(&s.stream),
                _ => None,
            },
            Model::PassThrough(s) => match port {
                P::INPORT_OUTFLOW_REQUEST
                | P::OUTPORT_OUTFLOW_ACHIEVED
                | P::OUTPORT_INFLOW_REQUEST
                | P::INPORT_INFLOW_ACHIEVED => Some(&s.stream),
                _ => None,
            },
            Model::Mover(s) => match port {
                P::INPORT_OUTFLOW_REQUEST | P::OUTPORT_OUTFLOW_ACHIEVED => Some(&s.outflow_stream),
                P::OUTPORT_MOVED_INFLOW_REQUEST | P::INPORT_MOVED_INFLOW_ACHIEVED => {
                    Some(&s.moved_stream)
                }
                P::OUTPORT_POWERED_INFLOW_REQUEST | P::INPORT_POWERED_INFLOW_ACHIEVED => {
                    Some(&s.powered_stream)
                }
                _ => None,
            },
        }
    }
}
