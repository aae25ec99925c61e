//! Stats & balance (C9): per-component totals by role, energy balance, and
//! availability/downtime, computed from a finalized [`crate::recorder::FlowWriter`].
//!
//! This module only ever reads recorded time series; it never touches the
//! scheduler or the network, matching spec §4.6 step 5 ("hands the
//! recorded time-series to C9 for statistics").

use std::collections::HashMap;

use crate::model::ModelKind;
use crate::recorder::{Datum, FlowWriter};
use crate::types::{Flow, PortRole, RealTime, TimeState, FLOW_TOLERANCE};

/// One `(time, requested, achieved)` recorded sample, re-exported for
/// callers that only need [`crate::stats`] (mirrors [`crate::recorder::Datum`]).
pub type StatDatum = Datum;

/// Energy and availability statistics for one recorded component/sub-port
/// over a scenario run.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ComponentStats {
    /// Total achieved energy delivered through this tag (kJ, `rate *
    /// elapsed`, integrated over the recorded step function).
    pub energy_kj: Flow,
    /// Total requested energy (kJ), for load-not-served accounting.
    pub requested_energy_kj: Flow,
    /// `energy_kj / requested_energy_kj`, or `1.0` if nothing was ever
    /// requested.
    pub energy_availability: Flow,
    /// Total seconds the component's schedule marked it unavailable.
    pub downtime_s: RealTime,
    /// Longest single unavailable interval, seconds.
    pub max_downtime_s: RealTime,
    /// Requested-but-undelivered energy (kJ): `requested_energy_kj -
    /// energy_kj`, floored at zero.
    pub load_not_served_kj: Flow,
}

/// Integrate a piecewise-constant, right-continuous series of `(time,
/// rate)` samples from its first timestamp to `end_time`, in rate-seconds
/// (kJ when rate is kW).
fn integrate(series: &[Datum], end_time: RealTime, pick: impl Fn(&Datum) -> Flow) -> Flow {
    let mut total = 0.0;
    for w in series.windows(2) {
        let dt = (w[1].time_s - w[0].time_s).max(0);
        total += pick(&w[0]) * dt as Flow;
    }
    if let Some(last) = series.last() {
        if last.time_s < end_time {
            total += pick(last) * (end_time - last.time_s) as Flow;
        }
    }
    total
}

/// Compute [`ComponentStats`] for one recorded tag's achieved/requested
/// series over `[0, duration_s]`. `schedule` is the component's
/// availability schedule, if any (used for downtime accounting); `None`
/// for components with no failure/fragility mode.
pub fn component_stats(series: &[Datum], duration_s: RealTime, schedule: Option<&[TimeState]>) -> ComponentStats {
    let energy_kj = integrate(series, duration_s, |d| d.achieved);
    let requested_energy_kj = integrate(series, duration_s, |d| d.requested);
    let energy_availability = if requested_energy_kj > FLOW_TOLERANCE {
        energy_kj / requested_energy_kj
    } else {
        1.0
    };
    let load_not_served_kj = (requested_energy_kj - energy_kj).max(0.0);

    let (downtime_s, max_downtime_s) = match schedule {
        Some(sched) => downtime_from_schedule(sched, duration_s),
        None => (0, 0),
    };

    ComponentStats {
        energy_kj,
        requested_energy_kj,
        energy_availability,
        downtime_s,
        max_downtime_s,
        load_not_served_kj,
    }
}

/// Total and maximum unavailable-interval duration implied by a
/// [`TimeState`] schedule over `[0, duration_s]`.
fn downtime_from_schedule(schedule: &[TimeState], duration_s: RealTime) -> (RealTime, RealTime) {
    let mut total = 0;
    let mut longest = 0;
    for w in schedule.windows(2) {
        if !w[0].available {
            let span = w[1].time - w[0].time;
            total += span;
            longest = longest.max(span);
        }
    }
    if let Some(last) = schedule.last() {
        if !last.available && last.time < duration_s {
            let span = duration_s - last.time;
            total += span;
            longest = longest.max(span);
        }
    }
    (total, longest)
}

/// Per-scenario-instance output handed back to the caller (spec §6
/// `ScenarioResults`).
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioResults {
    /// `false` if the run was aborted by a fatal error or cancellation;
    /// `results` still holds whatever was recorded before the abort.
    pub is_good: bool,
    /// Wall-clock start offset of this occurrence within a campaign.
    pub start_time_s: RealTime,
    /// This occurrence's run duration, seconds.
    pub duration_s: RealTime,
    /// Recorded series, keyed by `<component id>[-<subport>]` tag (spec
    /// §6: e.g. `"genset-inflow"`, `"genset-outflow"`).
    pub results: HashMap<String, Vec<Datum>>,
    /// Stream name for every recorded tag.
    pub stream_types: HashMap<String, String>,
    /// Component kind for every recorded tag's owning component.
    pub component_types: HashMap<String, ModelKind>,
    /// Accounting role for every recorded tag.
    pub port_roles: HashMap<String, PortRole>,
}

impl ScenarioResults {
    /// Build from a finalized [`FlowWriter`] plus the tag metadata the
    /// runner accumulated while wiring the network.
    pub fn from_writer(
        writer: &FlowWriter,
        is_good: bool,
        start_time_s: RealTime,
        duration_s: RealTime,
        stream_types: HashMap<String, String>,
        component_types: HashMap<String, ModelKind>,
        port_roles: HashMap<String, PortRole>,
    ) -> Self {
        let results = writer
            .all_series()
            .iter()
            .map(|(tag, series)| (tag.clone(), series.clone()))
            .collect();
        Self {
            is_good,
            start_time_s,
            duration_s,
            results,
            stream_types,
            component_types,
            port_roles,
        }
    }

    /// [`ComponentStats`] for `tag`, if recorded. `schedule` is that
    /// component's availability schedule, if any.
    pub fn stats_for(&self, tag: &str, schedule: Option<&[TimeState]>) -> Option<ComponentStats> {
        let series = self.results.get(tag)?;
        Some(component_stats(series, self.duration_s, schedule))
    }
}

/// Totals by [`PortRole`] across every recorded tag of one
/// [`ScenarioResults`], in kJ.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RoleTotals {
    /// Total energy delivered by every source-outflow tag.
    pub source_kj: Flow,
    /// Total energy consumed by every load-inflow tag.
    pub load_kj: Flow,
    /// Net energy absorbed by storage (`storage_in - storage_out`).
    pub storage_net_kj: Flow,
    /// Total wasteflow energy.
    pub waste_kj: Flow,
}

impl RoleTotals {
    /// `source - (load + storage + waste)`, which must be `0` within
    /// [`FLOW_TOLERANCE`]-scale energy tolerance for a balanced scenario
    /// (spec §6 CSV "ENERGY BALANCE" row, property 9).
    pub fn energy_balance(&self) -> Flow {
        self.source_kj - (self.load_kj + self.storage_net_kj + self.waste_kj)
    }
}

/// Sum achieved energy by role across every `(tag, role)` pair in a
/// [`ScenarioResults`], using each tag's already-finalized series.
pub fn role_totals(results: &ScenarioResults) -> RoleTotals {
    let mut totals = RoleTotals::default();
    for (tag, role) in &results.port_roles {
        let Some(series) = results.results.get(tag) else { continue };
        let energy = integrate(series, results.duration_s, |d| d.achieved);
        match role {
            PortRole::SourceOutflow => totals.source_kj += energy,
            PortRole::LoadInflow => totals.load_kj += energy,
            PortRole::StorageInflow => totals.storage_net_kj += energy,
            PortRole::StorageOutflow => totals.storage_net_kj -= energy,
            PortRole::WasteInflow => totals.waste_kj += energy,
            PortRole::Inflow | PortRole::Outflow => {}
        }
    }
    totals
}

/// Aggregated campaign output (spec §6 `AllResults`): every occurrence of
/// every scenario in a campaign.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AllResults {
    /// `false` if any scenario occurrence failed.
    pub is_good: bool,
    /// Occurrences recorded per scenario id, in occurrence order.
    pub scenarios: HashMap<String, Vec<ScenarioResults>>,
}

impl AllResults {
    /// An empty result set, `is_good = true` until a failure is folded in.
    pub fn new() -> Self {
        Self {
            is_good: true,
            scenarios: HashMap::new(),
        }
    }

    /// Fold one scenario occurrence's results in, updating [`Self::is_good`].
    pub fn push(&mut self, scenario_id: impl Into<String>, result: ScenarioResults) {
        self.is_good &= result.is_good;
        self.scenarios.entry(scenario_id.into()).or_default().push(result);
    }
}
