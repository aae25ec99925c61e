//! Scenario runner (C7): turns a [`ScenarioInput`] plus a resolved set of
//! per-component availability schedules into a wired [`Network`], drives it
//! to completion, and hands the recorded series to [`crate::stats`].
//!
//! Computing those schedules from `failure_modes`/`fragility_modes` and an
//! [`crate::dist::DistributionSystem`] is an external concern (spec §1); this
//! module only consumes their result, a [`TimeState`] sequence per
//! schedulable component id.

use std::collections::HashMap;

use log::warn;

use crate::dist::DistributionSystem;
use crate::model::{Model, ModelKind};
use crate::network::Network;
use crate::recorder::FlowWriter;
use crate::scheduler::Scheduler;
use crate::spec::{ComponentDef, ComponentSpec, Connection, ConnectionPortType, ConversionSpec, ScenarioInput};
use crate::stats::{AllResults, ScenarioResults};
use crate::types::{
    BadInputError, ComponentId, Flow, PortId, PortRole, RealTime, SimulationError, Stream, TimeState,
};

/// One resolved attachment point on a component: which pair of ports
/// carries a request outward and an achieved value inward, or vice versa.
/// Lets connection wiring and switch-wrapping treat every model kind
/// uniformly instead of matching on [`ModelKind`] at every call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PortEndpoint {
    /// Receives a request, reports an achieved value: a source-shaped side.
    Supplier { request_in: PortId, achieved_out: PortId },
    /// Emits a request, receives an achieved value: a load-shaped side.
    Consumer { request_out: PortId, achieved_in: PortId },
}

/// Resolve a connection endpoint's `(port_type, port_num)` against a
/// model's actual ports. `None` if this model kind doesn't expose that
/// port type (e.g. a lossflow tap on a `Load`).
fn resolve_port(model: &Model, port_type: ConnectionPortType, port_num: u32) -> Option<PortEndpoint> {
    use ConnectionPortType as C;
    use PortEndpoint::{Consumer, Supplier};
    use PortId as P;

    match (model, port_type) {
        (Model::Source(_) | Model::UncontrolledSource(_), C::Outflow) => Some(Supplier {
            request_in: P::INPORT_OUTFLOW_REQUEST,
            achieved_out: P::OUTPORT_OUTFLOW_ACHIEVED,
        }),
        (Model::UncontrolledSource(_), C::Lossflow) => Some(Supplier {
            request_in: P::INPORT_LOSSFLOW_REQUEST,
            achieved_out: P::OUTPORT_LOSSFLOW_ACHIEVED,
        }),
        (Model::Load(_), C::Inflow) => Some(Consumer {
            request_out: P::OUTPORT_INFLOW_REQUEST,
            achieved_in: P::INPORT_INFLOW_ACHIEVED,
        }),
        (Model::FlowLimits(_) | Model::Storage(_) | Model::OnOffSwitch(_) | Model::PassThrough(_), C::Outflow) => {
            Some(Supplier {
                request_in: P::INPORT_OUTFLOW_REQUEST,
                achieved_out: P::OUTPORT_OUTFLOW_ACHIEVED,
            })
        }
        (Model::FlowLimits(_) | Model::Storage(_) | Model::OnOffSwitch(_) | Model::PassThrough(_), C::Inflow) => {
            Some(Consumer {
                request_out: P::OUTPORT_INFLOW_REQUEST,
                achieved_in: P::INPORT_INFLOW_ACHIEVED,
            })
        }
        (Model::Converter(_), C::Outflow) => Some(Supplier {
            request_in: P::INPORT_OUTFLOW_REQUEST,
            achieved_out: P::OUTPORT_OUTFLOW_ACHIEVED,
        }),
        (Model::Converter(_), C::Inflow) => Some(Consumer {
            request_out: P::OUTPORT_INFLOW_REQUEST,
            achieved_in: P::INPORT_INFLOW_ACHIEVED,
        }),
        (Model::Converter(_), C::Lossflow) => Some(Supplier {
            request_in: P::INPORT_LOSSFLOW_REQUEST,
            achieved_out: P::OUTPORT_LOSSFLOW_ACHIEVED,
        }),
        (Model::Mux(_), C::Outflow) => Some(Supplier {
            request_in: P::mux_outflow_request(port_num),
            achieved_out: P::mux_outflow_achieved(port_num),
        }),
        (Model::Mux(_), C::Inflow) => Some(Consumer {
            request_out: P::mux_inflow_request(port_num),
            achieved_in: P::mux_inflow_achieved(port_num),
        }),
        (Model::Mover(_), C::Outflow) => Some(Supplier {
            request_in: P::INPORT_OUTFLOW_REQUEST,
            achieved_out: P::OUTPORT_OUTFLOW_ACHIEVED,
        }),
        (Model::Mover(_), C::MovedInflow) => Some(Consumer {
            request_out: P::OUTPORT_MOVED_INFLOW_REQUEST,
            achieved_in: P::INPORT_MOVED_INFLOW_ACHIEVED,
        }),
        (Model::Mover(_), C::PoweredInflow) => Some(Consumer {
            request_out: P::OUTPORT_POWERED_INFLOW_REQUEST,
            achieved_in: P::INPORT_POWERED_INFLOW_ACHIEVED,
        }),
        _ => None,
    }
}

/// Which side of a through-shaped component an [`crate::model::Model::on_off_switch`]
/// gates when wrapping it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PrimaryShape {
    Supplier,
    Consumer,
}

/// The shape of the single port pair a switch replaces for `kind`, or
/// `None` if this kind isn't wrapped by the runner. Multi-stream kinds
/// (`Converter`, `Mux`, `Mover`) are out of scope for switch-wrapping: a
/// single on/off schedule cannot gate several independently-streamed port
/// pairs at once.
fn primary_shape(kind: ModelKind) -> Option<PrimaryShape> {
    match kind {
        ModelKind::Source
        | ModelKind::UncontrolledSource
        | ModelKind::FlowLimits
        | ModelKind::Storage
        | ModelKind::PassThrough
        | ModelKind::FlowMeter => Some(PrimaryShape::Supplier),
        ModelKind::Load => Some(PrimaryShape::Consumer),
        ModelKind::Converter | ModelKind::Mux | ModelKind::Mover | ModelKind::OnOffSwitch => None,
    }
}

/// Insert an [`crate::model::Model::on_off_switch`] between `inner_id` and
/// the rest of the network, gating whichever side `shape` names. Returns
/// the switch's id, which callers should use in place of `inner_id` for
/// every external connection.
fn wrap_with_switch(
    net: &mut Network,
    stream: Stream,
    schedule: Vec<TimeState>,
    inner_id: ComponentId,
    shape: PrimaryShape,
) -> Result<ComponentId, SimulationError> {
    let switch_id = net.add_model(Model::on_off_switch(stream, schedule));
    match shape {
        PrimaryShape::Supplier => {
            net.couple(switch_id, PortId::OUTPORT_INFLOW_REQUEST, inner_id, PortId::INPORT_OUTFLOW_REQUEST)?;
            net.couple(inner_id, PortId::OUTPORT_OUTFLOW_ACHIEVED, switch_id, PortId::INPORT_INFLOW_ACHIEVED)?;
        }
        PrimaryShape::Consumer => {
            net.couple(switch_id, PortId::OUTPORT_OUTFLOW_ACHIEVED, inner_id, PortId::INPORT_INFLOW_ACHIEVED)?;
            net.couple(inner_id, PortId::OUTPORT_INFLOW_REQUEST, switch_id, PortId::INPORT_OUTFLOW_REQUEST)?;
        }
    }
    Ok(switch_id)
}

/// Which accessor a recorded tag reads from its owning [`Model`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SubflowKind {
    Bare,
    Inflow,
    Outflow,
    Lossflow,
    Wasteflow,
    Storeflow,
    Discharge,
    MuxInflow(u32),
    MuxOutflow(u32),
}

/// Read `(requested, achieved)` for one recorded tag straight off its
/// owning model's accessors (§6: `<id>[-<subport>]` result tagging).
fn read_subflow(model: &Model, subflow: SubflowKind) -> (Flow, Flow) {
    use SubflowKind as K;
    match (model, subflow) {
        (Model::Source(s), K::Bare) => (s.requested(), s.achieved()),
        (Model::Load(s), K::Bare) => (s.requested(), s.achieved()),
        (Model::OnOffSwitch(s), K::Bare) => (s.requested(), s.achieved()),
        (Model::PassThrough(s), K::Bare) => (s.requested(), s.achieved()),
        (Model::FlowLimits(s), K::Bare) => (s.requested(), s.achieved()),
        (Model::Mover(s), K::Bare) => (s.outflow_requested(), s.outflow_achieved()),
        (Model::UncontrolledSource(s), K::Inflow) => (s.supply(), s.supply()),
        (Model::UncontrolledSource(s), K::Outflow) => (s.requested(), s.achieved()),
        (Model::UncontrolledSource(s), K::Lossflow) => (s.lossflow(), s.lossflow()),
        (Model::Converter(c), K::Inflow) => (c.inflow_requested(), c.inflow_achieved()),
        (Model::Converter(c), K::Outflow) => (c.outflow_requested(), c.outflow_achieved()),
        (Model::Converter(c), K::Lossflow) => (c.lossflow_requested(), c.lossflow_achieved()),
        (Model::Converter(c), K::Wasteflow) => (c.wasteflow_achieved(), c.wasteflow_achieved()),
        (Model::Mux(m), K::MuxInflow(i)) => (m.inflow_requested(i), m.inflow_achieved(i)),
        (Model::Mux(m), K::MuxOutflow(k)) => (m.outflow_requested(k), m.outflow_achieved(k)),
        (Model::Storage(st), K::Inflow) => (st.inflow_requested(), st.inflow_achieved()),
        (Model::Storage(st), K::Outflow) => (st.outflow_requested(), st.outflow_achieved()),
        (Model::Storage(st), K::Storeflow) => (st.storeflow_achieved(), st.storeflow_achieved()),
        (Model::Storage(st), K::Discharge) => (st.discharge_achieved(), st.discharge_achieved()),
        _ => (0.0, 0.0),
    }
}

/// One recorded tag: its full name, what to read off its owning model, and
/// the metadata [`ScenarioResults`] wants for it.
struct TagRecord {
    tag: String,
    subflow: SubflowKind,
    role: PortRole,
    stream: Stream,
    kind: ModelKind,
    owner: ComponentId,
}

/// The recordable tags a [`ComponentSpec`] exposes, with the role and
/// stream [`crate::stats::role_totals`]/CSV labeling need for each. `id` is
/// the config-level component id; tags are `id` itself for single-port
/// kinds or `id-<subport>` otherwise, matching spec §6 (e.g.
/// `"bus-inflow(1)"` for a mux's second inflow).
fn component_tags(id: &str, spec: &ComponentSpec) -> Vec<(String, SubflowKind, PortRole, Stream)> {
    use SubflowKind as K;
    match spec {
        ComponentSpec::Source { output_stream, .. } => {
            vec![(id.to_string(), K::Bare, PortRole::SourceOutflow, output_stream.clone())]
        }
        ComponentSpec::UncontrolledSource { output_stream, .. } => vec![
            (format!("{id}-inflow"), K::Inflow, PortRole::Inflow, output_stream.clone()),
            (format!("{id}-outflow"), K::Outflow, PortRole::SourceOutflow, output_stream.clone()),
            (format!("{id}-lossflow"), K::Lossflow, PortRole::Outflow, output_stream.clone()),
        ],
        ComponentSpec::Load { input_stream, .. } => {
            vec![(id.to_string(), K::Bare, PortRole::LoadInflow, input_stream.clone())]
        }
        ComponentSpec::Converter {
            input_stream,
            output_stream,
            lossflow_stream,
            ..
        } => vec![
            (format!("{id}-inflow"), K::Inflow, PortRole::Inflow, input_stream.clone()),
            (format!("{id}-outflow"), K::Outflow, PortRole::Outflow, output_stream.clone()),
            (
                format!("{id}-lossflow"),
                K::Lossflow,
                PortRole::Outflow,
                lossflow_stream.clone().unwrap_or_else(|| input_stream.clone()),
            ),
            (format!("{id}-wasteflow"), K::Wasteflow, PortRole::WasteInflow, input_stream.clone()),
        ],
        ComponentSpec::Muxer {
            stream,
            num_inflows,
            num_outflows,
            ..
        } => {
            let mut tags = Vec::with_capacity((*num_inflows + *num_outflows) as usize);
            for i in 0..*num_inflows {
                tags.push((format!("{id}-inflow({i})"), K::MuxInflow(i), PortRole::Inflow, stream.clone()));
            }
            for k in 0..*num_outflows {
                tags.push((format!("{id}-outflow({k})"), K::MuxOutflow(k), PortRole::Outflow, stream.clone()));
            }
            tags
        }
        ComponentSpec::Storage { stream, .. } => vec![
            (format!("{id}-inflow"), K::Inflow, PortRole::StorageInflow, stream.clone()),
            (format!("{id}-outflow"), K::Outflow, PortRole::StorageOutflow, stream.clone()),
            (format!("{id}-storeflow"), K::Storeflow, PortRole::Inflow, stream.clone()),
            (format!("{id}-discharge"), K::Discharge, PortRole::Outflow, stream.clone()),
        ],
        ComponentSpec::PassThrough { stream, .. } => {
            vec![(id.to_string(), K::Bare, PortRole::Outflow, stream.clone())]
        }
        ComponentSpec::Mover { outflow_stream, .. } => {
            vec![(id.to_string(), K::Bare, PortRole::Outflow, outflow_stream.clone())]
        }
    }
}

/// Check a load/supply profile against spec §3's "strictly time-increasing,
/// last item an end marker" requirement before it ever reaches
/// [`crate::model::Model::load`]/[`crate::model::Model::uncontrolled_source`],
/// which otherwise assert the same thing and would panic on malformed input.
fn validate_load_profile(profile: &[crate::types::LoadItem]) -> Result<(), BadInputError> {
    if profile.is_empty() {
        return Err(BadInputError::NonMonotonicLoad(0));
    }
    for (i, w) in profile.windows(2).enumerate() {
        if w[1].time <= w[0].time {
            return Err(BadInputError::NonMonotonicLoad(i + 1));
        }
    }
    if !profile.last().unwrap().is_end() {
        return Err(BadInputError::NonMonotonicLoad(profile.len() - 1));
    }
    Ok(())
}

/// Check a [`ComponentSpec`]'s own numeric parameters (efficiency, capacity,
/// bounds, COP) against spec §7's `BadInput` taxonomy, ahead of the
/// constructors in [`crate::model`] that otherwise `assert!` the same
/// invariants. Load-profile checks are handled separately by
/// [`validate_load_profile`] once the profile has been resolved.
fn validate_spec(spec: &ComponentSpec) -> Result<(), BadInputError> {
    match spec {
        ComponentSpec::Converter { conversion, .. } => match conversion {
            ConversionSpec::ConstantEfficiency(eta) => {
                if !(*eta > 0.0 && *eta <= 1.0) {
                    return Err(BadInputError::InvalidEfficiency(*eta));
                }
            }
            ConversionSpec::Tabulated(points) => {
                let monotone = points.len() >= 2 && points.windows(2).all(|w| w[1].0 > w[0].0 && w[1].1 > w[0].1);
                if !monotone {
                    return Err(BadInputError::InvalidConversionTable);
                }
            }
        },
        ComponentSpec::Storage {
            capacity,
            max_inflow,
            initial_soc,
            ..
        } => {
            if *capacity <= 0.0 {
                return Err(BadInputError::InvalidCapacity(*capacity));
            }
            if *max_inflow < 0.0 {
                return Err(BadInputError::InvalidCapacity(*max_inflow));
            }
            if !(0.0..=1.0).contains(initial_soc) {
                return Err(BadInputError::InvalidStateOfCharge(*initial_soc));
            }
        }
        ComponentSpec::PassThrough {
            max_outflow,
            min_outflow,
            ..
        } => {
            let lower = min_outflow.unwrap_or(0.0);
            let upper = max_outflow.unwrap_or(Flow::INFINITY);
            if !(lower >= 0.0 && lower <= upper) {
                return Err(BadInputError::InvalidFlowLimits(lower, upper));
            }
        }
        ComponentSpec::Mover { cop, .. } => {
            if *cop <= 0.0 {
                return Err(BadInputError::InvalidCop(*cop));
            }
        }
        ComponentSpec::Muxer {
            num_inflows,
            num_outflows,
            ..
        } => {
            if *num_inflows == 0 || *num_outflows == 0 {
                return Err(BadInputError::MissingField("num_inflows/num_outflows", "muxer requires at least one of each".to_string()));
            }
        }
        ComponentSpec::Source { .. } | ComponentSpec::UncontrolledSource { .. } | ComponentSpec::Load { .. } => {}
    }
    Ok(())
}

/// Instantiate one component's [`Model`] from its definition, resolving
/// `*_by_scenario` load-profile references against `input.loads`.
fn build_model(def: &ComponentDef, input: &ScenarioInput, scenario_id: &str, id: &str) -> Result<Model, SimulationError> {
    validate_spec(&def.spec)?;
    match &def.spec {
        ComponentSpec::Source {
            output_stream,
            max_outflow,
        } => Ok(Model::source(output_stream.clone(), *max_outflow)),
        ComponentSpec::UncontrolledSource {
            output_stream,
            supply_by_scenario,
        } => {
            let load_id = supply_by_scenario
                .get(scenario_id)
                .ok_or_else(|| BadInputError::MissingField("supply_by_scenario", format!("{id}@{scenario_id}")))?;
            let profile = input
                .loads
                .get(load_id)
                .ok_or_else(|| BadInputError::MissingField("loads", load_id.clone()))?;
            validate_load_profile(profile)?;
            Ok(Model::uncontrolled_source(output_stream.clone(), profile.clone()))
        }
        ComponentSpec::Load {
            input_stream,
            loads_by_scenario,
        } => {
            let load_id = loads_by_scenario
                .get(scenario_id)
                .ok_or_else(|| BadInputError::MissingField("loads_by_scenario", format!("{id}@{scenario_id}")))?;
            let profile = input
                .loads
                .get(load_id)
                .ok_or_else(|| BadInputError::MissingField("loads", load_id.clone()))?;
            validate_load_profile(profile)?;
            Ok(Model::load(input_stream.clone(), profile.clone()))
        }
        ComponentSpec::Converter {
            input_stream,
            output_stream,
            lossflow_stream,
            conversion,
        } => Ok(Model::converter(
            input_stream.clone(),
            output_stream.clone(),
            lossflow_stream.clone(),
            conversion.to_efficiency(),
        )),
        ComponentSpec::Muxer {
            stream,
            num_inflows,
            num_outflows,
            dispatch_strategy,
        } => Ok(Model::mux(stream.clone(), *num_inflows, *num_outflows, *dispatch_strategy)),
        ComponentSpec::Storage {
            stream,
            capacity,
            max_inflow,
            initial_soc,
            ..
        } => Ok(Model::storage(stream.clone(), *capacity, *max_inflow, *initial_soc)),
        ComponentSpec::PassThrough {
            stream,
            max_outflow,
            min_outflow,
        } => {
            if def.spec.is_flow_meter() {
                Ok(Model::flow_meter(stream.clone()))
            } else {
                Ok(Model::flow_limits(
                    stream.clone(),
                    min_outflow.unwrap_or(0.0),
                    max_outflow.unwrap_or(Flow::INFINITY),
                ))
            }
        }
        ComponentSpec::Mover {
            inflow0_stream,
            inflow1_stream,
            outflow_stream,
            cop,
        } => Ok(Model::mover(
            inflow0_stream.clone(),
            inflow1_stream.clone(),
            outflow_stream.clone(),
            *cop,
        )),
    }
}

/// A wired [`Network`] plus the tag metadata [`ScenarioRunner`] needs to
/// record and label it, returned by [`build_network`].
pub struct BuiltNetwork {
    /// The wired network, ready to hand to a [`Scheduler`].
    pub net: Network,
    /// Config-level component id to the node external connections should
    /// use: the `OnOffSwitch`'s id when wrapped, the component's own id
    /// otherwise.
    pub components: HashMap<String, ComponentId>,
    tags: Vec<TagRecord>,
}

/// Build every component named by `network_id`'s connections, wrap the
/// schedulable ones (per `schedules`) in an on/off switch, and wire every
/// [`Connection`] between them.
pub fn build_network(
    input: &ScenarioInput,
    scenario_id: &str,
    schedules: &HashMap<String, Vec<TimeState>>,
) -> Result<BuiltNetwork, SimulationError> {
    let scenario = input
        .scenarios
        .get(scenario_id)
        .ok_or_else(|| BadInputError::MissingField("scenarios", scenario_id.to_string()))?;
    let connections = input
        .networks
        .get(&scenario.network_id)
        .ok_or_else(|| BadInputError::MissingField("networks", scenario.network_id.clone()))?;

    let mut ids: std::collections::BTreeSet<&str> = std::collections::BTreeSet::new();
    for c in connections {
        ids.insert(c.src_id.as_str());
        ids.insert(c.dst_id.as_str());
    }

    let mut net = Network::new();
    let mut inner_ids: HashMap<String, ComponentId> = HashMap::new();
    let mut public_ids: HashMap<String, ComponentId> = HashMap::new();
    let mut kinds: HashMap<String, ModelKind> = HashMap::new();
    let mut tags: Vec<TagRecord> = Vec::new();

    for id in ids {
        let def = input
            .components
            .get(id)
            .ok_or_else(|| BadInputError::MissingField("components", id.to_string()))?;
        let model = build_model(def, input, scenario_id, id)?;
        let kind = model.kind();
        let inner_id = net.add_model(model);

        let mut owner_for_bare = inner_id;
        if def.is_schedulable() {
            if let (Some(sched), Some(shape)) = (schedules.get(id), primary_shape(kind)) {
                let stream = component_stream(&def.spec);
                owner_for_bare = wrap_with_switch(&mut net, stream, sched.clone(), inner_id, shape)?;
            }
        }

        for (tag, subflow, role, stream) in component_tags(id, &def.spec) {
            let owner = match subflow {
                SubflowKind::Bare => owner_for_bare,
                _ => inner_id,
            };
            tags.push(TagRecord {
                tag,
                subflow,
                role,
                stream,
                kind,
                owner,
            });
        }

        inner_ids.insert(id.to_string(), inner_id);
        public_ids.insert(id.to_string(), owner_for_bare);
        kinds.insert(id.to_string(), kind);
    }

    for conn in connections {
        couple_connection(&mut net, conn, &inner_ids, &public_ids, &kinds)?;
    }

    Ok(BuiltNetwork {
        net,
        components: public_ids,
        tags,
    })
}

/// The single stream a component definition is denominated in, for the
/// switch wrapping it (every wrap-eligible kind has exactly one).
fn component_stream(spec: &ComponentSpec) -> Stream {
    match spec {
        ComponentSpec::Source { output_stream, .. } => output_stream.clone(),
        ComponentSpec::UncontrolledSource { output_stream, .. } => output_stream.clone(),
        ComponentSpec::Load { input_stream, .. } => input_stream.clone(),
        ComponentSpec::PassThrough { stream, .. } => stream.clone(),
        ComponentSpec::Storage { stream, .. } => stream.clone(),
        ComponentSpec::Converter { input_stream, .. } => input_stream.clone(),
        ComponentSpec::Muxer { stream, .. } => stream.clone(),
        ComponentSpec::Mover { outflow_stream, .. } => outflow_stream.clone(),
    }
}

/// Resolve and wire one [`Connection`], redirecting Source/UncontrolledSource
/// and Load endpoints to their wrapping switch when one was built for them.
fn couple_connection(
    net: &mut Network,
    conn: &Connection,
    inner_ids: &HashMap<String, ComponentId>,
    public_ids: &HashMap<String, ComponentId>,
    kinds: &HashMap<String, ModelKind>,
) -> Result<(), SimulationError> {
    let (src_node, src_ep) = endpoint_for(net, conn.src_id.as_str(), conn.src_port_type, conn.src_port_num, inner_ids, public_ids, kinds)?;
    let (dst_node, dst_ep) = endpoint_for(net, conn.dst_id.as_str(), conn.dst_port_type, conn.dst_port_num, inner_ids, public_ids, kinds)?;

    match (src_ep, dst_ep) {
        (PortEndpoint::Supplier { request_in, achieved_out }, PortEndpoint::Consumer { request_out, achieved_in }) => {
            net.couple(src_node, achieved_out, dst_node, achieved_in)?;
            net.couple(dst_node, request_out, src_node, request_in)?;
            Ok(())
        }
        _ => Err(BadInputError::PortShapeMismatch(format!("{}->{}", conn.src_id, conn.dst_id)).into()),
    }
}

fn endpoint_for(
    net: &Network,
    id: &str,
    port_type: ConnectionPortType,
    port_num: u32,
    inner_ids: &HashMap<String, ComponentId>,
    public_ids: &HashMap<String, ComponentId>,
    kinds: &HashMap<String, ModelKind>,
) -> Result<(ComponentId, PortEndpoint), SimulationError> {
    let kind = *kinds
        .get(id)
        .ok_or_else(|| BadInputError::MissingField("components", id.to_string()))?;
    let inner_id = inner_ids[id];
    let public_id = public_ids[id];

    if public_id != inner_id {
        // This component was wrapped; its switch exposes the same
        // port-id pair its inner model would have, for the one shape the
        // switch gates (see `primary_shape`).
        match (kind, port_type) {
            (ModelKind::Source | ModelKind::UncontrolledSource, ConnectionPortType::Outflow) => {
                return Ok((
                    public_id,
                    PortEndpoint::Supplier {
                        request_in: PortId::INPORT_OUTFLOW_REQUEST,
                        achieved_out: PortId::OUTPORT_OUTFLOW_ACHIEVED,
                    },
                ));
            }
            (ModelKind::Load, ConnectionPortType::Inflow) => {
                return Ok((
                    public_id,
                    PortEndpoint::Consumer {
                        request_out: PortId::OUTPORT_INFLOW_REQUEST,
                        achieved_in: PortId::INPORT_INFLOW_ACHIEVED,
                    },
                ));
            }
            (ModelKind::FlowLimits | ModelKind::Storage | ModelKind::PassThrough | ModelKind::FlowMeter, ConnectionPortType::Outflow) => {
                return Ok((
                    public_id,
                    PortEndpoint::Supplier {
                        request_in: PortId::INPORT_OUTFLOW_REQUEST,
                        achieved_out: PortId::OUTPORT_OUTFLOW_ACHIEVED,
                    },
                ));
            }
            _ => {}
        }
    }

    let model = net.model(inner_id).ok_or(SimulationError::ComponentNotFound(inner_id))?;
    let endpoint = resolve_port(model, port_type, port_num)
        .ok_or_else(|| BadInputError::PortShapeMismatch(format!("{id}:{port_type:?}")))?;
    Ok((inner_id, endpoint))
}

/// Drives one scenario occurrence to completion, recording every tagged
/// sub-flow at every settled instant.
pub struct ScenarioRunner {
    scheduler: Scheduler,
    writer: FlowWriter,
    tags: Vec<TagRecord>,
    duration_s: RealTime,
    scenario_id: String,
}

impl ScenarioRunner {
    /// Build a runner for `scenario_id`, wiring its network and registering
    /// every recordable tag up front.
    pub fn new(
        input: &ScenarioInput,
        scenario_id: &str,
        schedules: &HashMap<String, Vec<TimeState>>,
        max_no_advance: usize,
    ) -> Result<Self, SimulationError> {
        let scenario = input
            .scenarios
            .get(scenario_id)
            .ok_or_else(|| BadInputError::MissingField("scenarios", scenario_id.to_string()))?;
        let duration_s = scenario.duration_seconds(input.simulation_info.time_unit);

        let built = build_network(input, scenario_id, schedules)?;
        let mut writer = FlowWriter::new();
        for t in &built.tags {
            writer.register_id(t.tag.clone());
        }

        let scheduler = Scheduler::new(built.net, max_no_advance, duration_s);
        let mut runner = Self {
            scheduler,
            writer,
            tags: built.tags,
            duration_s,
            scenario_id: scenario_id.to_string(),
        };
        runner.record_all(0)?;
        Ok(runner)
    }

    fn record_all(&mut self, t: RealTime) -> Result<(), SimulationError> {
        for tag in &self.tags {
            let model = self
                .scheduler
                .network()
                .model(tag.owner)
                .ok_or(SimulationError::ComponentNotFound(tag.owner))?;
            let (requested, achieved) = read_subflow(model, tag.subflow);
            self.writer.write_data(&tag.tag, t, requested, achieved)?;
        }
        Ok(())
    }

    /// Run to `duration_s`, recording every settled instant, then finalize
    /// the writer and build this occurrence's [`ScenarioResults`].
    ///
    /// A [`BadInputError`] (malformed configuration) propagates to the
    /// caller; any other [`SimulationError`] encountered mid-run (a stuck
    /// simulation, a conservation violation) is caught and reported via
    /// `ScenarioResults::is_good = false` instead, per spec §6's "failed
    /// occurrences still report whatever was recorded before the abort".
    pub fn run(mut self) -> Result<ScenarioResults, SimulationError> {
        let mut is_good = true;
        loop {
            let Some(next) = self.scheduler.next_time() else { break };
            if next > self.duration_s {
                break;
            }
            match self.scheduler.step_once() {
                Ok(Some(t)) => self.record_all(t)?,
                Ok(None) => break,
                Err(SimulationError::BadInput(e)) => return Err(SimulationError::BadInput(e)),
                Err(e) => {
                    warn!("scenario {} aborted mid-run: {e}", self.scenario_id);
                    is_good = false;
                    break;
                }
            }
        }
        self.writer.finalize_at_time(self.duration_s)?;

        let mut stream_types = HashMap::new();
        let mut component_types = HashMap::new();
        let mut port_roles = HashMap::new();
        for t in &self.tags {
            stream_types.insert(t.tag.clone(), t.stream.name.clone());
            component_types.insert(t.tag.clone(), t.kind);
            port_roles.insert(t.tag.clone(), t.role);
        }

        Ok(ScenarioResults::from_writer(
            &self.writer,
            is_good,
            0,
            self.duration_s,
            stream_types,
            component_types,
            port_roles,
        ))
    }
}

/// Run every occurrence of `scenario_id` in a campaign, spacing successive
/// occurrences by draws from `Scenario::occurrence_distribution_id`
/// (`None` runs exactly the one occurrence). Each occurrence re-instantiates
/// the same [`ScenarioInput`]/`schedules` pair; `start_time_s` on each
/// [`ScenarioResults`] is the cumulative gap since the campaign began.
pub fn run_campaign(
    input: &ScenarioInput,
    scenario_id: &str,
    schedules: &HashMap<String, Vec<TimeState>>,
    dist: &mut dyn DistributionSystem,
    max_no_advance: usize,
) -> Result<AllResults, SimulationError> {
    let scenario = input
        .scenarios
        .get(scenario_id)
        .ok_or_else(|| BadInputError::MissingField("scenarios", scenario_id.to_string()))?;

    let mut all = AllResults::new();
    let mut start_time_s: RealTime = 0;
    let occurrences = scenario.max_occurrences.max(1);

    for _ in 0..occurrences {
        let runner = ScenarioRunner::new(input, scenario_id, schedules, max_no_advance)?;
        let mut result = runner.run()?;
        result.start_time_s = start_time_s;
        all.push(scenario_id, result);

        let Some(dist_id) = scenario.occurrence_distribution_id.as_deref() else {
            break;
        };
        let u01 = dist.rand_fn();
        start_time_s += dist.next_time_advance(dist_id, u01);
    }

    Ok(all)
}
