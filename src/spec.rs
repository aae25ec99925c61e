//! Scenario input (spec §6): the serde-friendly configuration surface the
//! core consumes. Parsing this out of TOML, building it by hand, or
//! generating it from a GUI are all out of scope here — the core only
//! needs the typed struct graph below plus [`crate::scenario::build_network`]
//! to turn one `(ComponentSpec, Connection)` pair into a [`crate::network::Network`].
//!
//! Represented as a tagged union of plain structs/enums behind the crate's
//! `serde` feature, the same shape used elsewhere in this crate for
//! externally-facing configuration.

use std::collections::HashMap;

use crate::model::{ConversionTable, DispatchStrategy, Efficiency};
use crate::types::{Flow, LoadItem, RealTime, Stream, TimeUnit};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// `SimulationInfo` (§6): units and top-level run parameters, plus a legacy
/// fixed-random-fraction override for pinning every distribution draw to a
/// constant fraction regardless of the RNG in use.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SimulationInfo {
    /// Informational rate unit shared by every stream unless overridden
    /// (e.g. `"kW"`).
    pub rate_unit: String,
    /// Informational quantity unit shared by every stream (e.g. `"kJ"`).
    pub quantity_unit: String,
    /// Unit `max_time` and every load/schedule timestamp are expressed in
    /// before normalization to [`RealTime`] seconds.
    pub time_unit: TimeUnit,
    /// The scenario duration, in `time_unit`.
    pub max_time: RealTime,
    /// Seed for the external RNG feeding [`crate::dist::DistributionSystem`].
    /// Opaque to the core; forwarded so callers can reproduce a run.
    pub random_seed: Option<u64>,
    /// Pins every draw from the distribution facade to a constant,
    /// overriding the RNG entirely.
    pub fixed_random_frac: Option<f64>,
}

impl SimulationInfo {
    /// `max_time` converted to seconds.
    pub fn max_time_seconds(&self) -> RealTime {
        self.time_unit.to_seconds(self.max_time)
    }
}

/// A non-closure description of a [`Efficiency`], serializable and
/// reconstructible without trait objects. [`Efficiency::Function`] keeps the
/// closure form for callers that don't need to serialize it, but a closure
/// cannot appear in a serialized `ConversionSpec`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ConversionSpec {
    /// `outflow = eta * inflow`, `eta in (0, 1]`.
    ConstantEfficiency(Flow),
    /// A tabulated monotone `(inflow, outflow)` sample set and its inverse.
    Tabulated(Vec<(Flow, Flow)>),
}

impl ConversionSpec {
    /// Build the runtime [`Efficiency`] this spec describes.
    pub fn to_efficiency(&self) -> Efficiency {
        match self {
            ConversionSpec::ConstantEfficiency(eta) => Efficiency::constant(*eta),
            ConversionSpec::Tabulated(points) => Efficiency::tabulated(ConversionTable::new(points.clone())),
        }
    }
}

/// A component's configuration (spec §6 `ComponentSpec`), tagged by kind.
/// `failure_modes`/`fragility_modes` name external schedule computations;
/// the core only ever sees their *result* (a [`crate::types::TimeState`]
/// sequence passed into [`crate::scenario::ScenarioRunner`]), so they are
/// carried here purely as identifiers for bookkeeping/labeling.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ComponentSpec {
    /// §4.3.2.
    Source {
        /// The stream this source supplies.
        output_stream: Stream,
        /// Capacity ceiling, `None` for unlimited.
        max_outflow: Option<Flow>,
    },
    /// §4.3.3.
    UncontrolledSource {
        /// The stream this source supplies.
        output_stream: Stream,
        /// Which named load id (in `ScenarioInput::loads`) supplies this
        /// component's availability profile, per scenario.
        supply_by_scenario: HashMap<String, String>,
    },
    /// §4.3.1.
    Load {
        /// The stream this load draws.
        input_stream: Stream,
        /// Which named load id supplies this component's demand profile,
        /// per scenario.
        loads_by_scenario: HashMap<String, String>,
    },
    /// §4.3.5.
    Converter {
        /// The stream drawn in.
        input_stream: Stream,
        /// The stream delivered out.
        output_stream: Stream,
        /// The stream the lossflow tap is denominated in, if any.
        lossflow_stream: Option<Stream>,
        /// The inflow/outflow conversion.
        conversion: ConversionSpec,
    },
    /// §4.3.6.
    Muxer {
        /// The single stream every port of this mux carries.
        stream: Stream,
        /// Number of upstream ports.
        num_inflows: u32,
        /// Number of downstream ports.
        num_outflows: u32,
        /// How requests/achieved are split across ports.
        dispatch_strategy: DispatchStrategy,
    },
    /// §4.3.7.
    Storage {
        /// The stream this storage buffers.
        stream: Stream,
        /// Capacity in energy units (`quantity_unit`, e.g. kJ).
        capacity: Flow,
        /// Ceiling on the inflow request while charging.
        max_inflow: Flow,
        /// Informational energy-quantity unit (e.g. `"kJ"`); no implicit
        /// conversion is performed against `SimulationInfo::quantity_unit`.
        capacity_unit: String,
        /// Initial state of charge in `[0, 1]`, defaulted to `0.0` (empty)
        /// when a config omits it.
        initial_soc: Flow,
    },
    /// §4.3.9 (`FlowMeter` is the same kind with no bounds; see
    /// [`ComponentSpec::is_flow_meter`]).
    PassThrough {
        /// The stream this node carries.
        stream: Stream,
        /// Optional outflow ceiling.
        max_outflow: Option<Flow>,
        /// Optional outflow floor.
        min_outflow: Option<Flow>,
    },
    /// §4.3.10.
    Mover {
        /// The "moved" (e.g. ambient heat) inflow stream.
        inflow0_stream: Stream,
        /// The "powered" (e.g. electricity) inflow stream.
        inflow1_stream: Stream,
        /// The outflow stream.
        outflow_stream: Stream,
        /// Coefficient of performance, `> 0`.
        cop: Flow,
    },
}

impl ComponentSpec {
    /// `true` for an unbounded [`ComponentSpec::PassThrough`], which the
    /// builder instantiates as a [`crate::model::ModelKind::FlowMeter`]
    /// instead of [`crate::model::ModelKind::PassThrough`].
    pub fn is_flow_meter(&self) -> bool {
        matches!(
            self,
            ComponentSpec::PassThrough {
                max_outflow: None,
                min_outflow: None,
                ..
            }
        )
    }
}

/// A component's full configuration entry: its kind plus the named
/// failure/fragility modes an external schedule-computation stage resolves
/// into the [`crate::types::TimeState`] sequence handed to
/// [`crate::scenario::ScenarioRunner`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ComponentDef {
    /// The component's kind and kind-specific parameters.
    pub spec: ComponentSpec,
    /// Named failure modes (reliability), resolved externally.
    pub failure_modes: Vec<String>,
    /// Named fragility modes (intensity-triggered), resolved externally.
    pub fragility_modes: Vec<String>,
}

impl ComponentDef {
    /// A component with no failure/fragility modes attached.
    pub fn new(spec: ComponentSpec) -> Self {
        Self {
            spec,
            failure_modes: Vec::new(),
            fragility_modes: Vec::new(),
        }
    }

    /// `true` if this component has any failure or fragility mode, i.e. it
    /// needs to be wrapped in an [`crate::model::Model::on_off_switch`] by
    /// the runner.
    pub fn is_schedulable(&self) -> bool {
        !self.failure_modes.is_empty() || !self.fragility_modes.is_empty()
    }
}

/// Which logical port of a component a [`Connection`] endpoint attaches to.
/// `port_num` (on [`Connection`]) disambiguates components with more than
/// one port of a given type (mux inflows/outflows); it is ignored for every
/// other kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ConnectionPortType {
    /// The component's single downstream-facing port (source outflow,
    /// converter outflow, mover outflow, flow-limits/storage/switch/
    /// pass-through outflow side, or mux's `port_num`-th outflow).
    Outflow,
    /// The component's single upstream-facing port (load inflow, converter
    /// inflow, flow-limits/storage/switch/pass-through inflow side, or
    /// mux's `port_num`-th inflow).
    Inflow,
    /// A converter's lossflow tap.
    Lossflow,
    /// A mover's "moved" inflow.
    MovedInflow,
    /// A mover's "powered" inflow.
    PoweredInflow,
}

/// A directed link between two components' ports on a shared stream (spec
/// §6 `Connection`).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Connection {
    /// Upstream component id.
    pub src_id: String,
    /// Which port of `src_id` this connection reads from.
    pub src_port_type: ConnectionPortType,
    /// Disambiguates multi-port components (mux); `0` otherwise.
    pub src_port_num: u32,
    /// Downstream component id.
    pub dst_id: String,
    /// Which port of `dst_id` this connection feeds.
    pub dst_port_type: ConnectionPortType,
    /// Disambiguates multi-port components (mux); `0` otherwise.
    pub dst_port_num: u32,
    /// The stream both ports must share.
    pub stream: Stream,
}

/// One scenario definition (spec §6 `Scenario`): which network to run, for
/// how long, and how many times to repeat it in a campaign.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Scenario {
    /// Which entry of `ScenarioInput::networks` to instantiate.
    pub network_id: String,
    /// Run duration, in `SimulationInfo::time_unit`.
    pub duration: RealTime,
    /// Which `ScenarioInput::dist` entry schedules the inter-arrival time
    /// between occurrences in a campaign. `None` runs exactly one
    /// occurrence.
    pub occurrence_distribution_id: Option<String>,
    /// Upper bound on how many occurrences a campaign run produces.
    pub max_occurrences: u32,
    /// External-intensity values (wind speed, flood depth, ...) that
    /// fragility-mode schedule computation consumed to produce each
    /// component's [`crate::types::TimeState`] sequence. Carried here only
    /// for CSV/report labeling; the core does not interpret them.
    pub intensities: HashMap<String, Flow>,
    /// Whether availability/downtime stats (C9) should be computed for
    /// this scenario's schedulable components.
    pub calculate_reliability: bool,
}

impl Scenario {
    /// [`Self::duration`] converted to seconds via `time_unit`.
    pub fn duration_seconds(&self, time_unit: TimeUnit) -> RealTime {
        time_unit.to_seconds(self.duration)
    }
}

/// A distribution's parameters (spec §6 `DistSpec`). The core never
/// samples these itself (§1 Non-goals) — it is data passed through to an
/// external [`crate::dist::DistributionSystem`] implementation that knows
/// how to interpret each variant.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DistSpec {
    /// Always the same value.
    Fixed {
        /// The constant delay, in seconds.
        value_seconds: RealTime,
    },
    /// Uniform over `[lower, upper]` seconds.
    Uniform {
        /// Lower bound, seconds.
        lower_seconds: RealTime,
        /// Upper bound, seconds.
        upper_seconds: RealTime,
    },
    /// Normal with the given mean/stddev, seconds.
    Normal {
        /// Mean, seconds.
        mean_seconds: f64,
        /// Standard deviation, seconds.
        std_seconds: f64,
    },
    /// Weibull with shape `k` and scale `lambda`, seconds.
    Weibull {
        /// Shape parameter.
        shape: f64,
        /// Scale parameter, seconds.
        scale_seconds: f64,
    },
    /// An empirical quantile table: `(cumulative probability, seconds)`
    /// pairs, strictly increasing in both columns.
    QuantileTable {
        /// The `(p, seconds)` samples.
        quantiles: Vec<(f64, RealTime)>,
    },
}

/// The full scenario campaign input (spec §6 `ScenarioInput`).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ScenarioInput {
    /// Run-wide units and parameters.
    pub simulation_info: SimulationInfo,
    /// Named load/supply profiles, referenced by id from
    /// [`ComponentSpec::Load`]/[`ComponentSpec::UncontrolledSource`].
    pub loads: HashMap<String, Vec<LoadItem>>,
    /// Named component definitions, referenced by id from
    /// [`Connection::src_id`]/[`Connection::dst_id`].
    pub components: HashMap<String, ComponentDef>,
    /// Named networks: each a set of connections over `components`.
    pub networks: HashMap<String, Vec<Connection>>,
    /// Named scenarios, each instantiating one network.
    pub scenarios: HashMap<String, Scenario>,
    /// Named distribution parameter sets.
    pub dist: HashMap<String, DistSpec>,
}
