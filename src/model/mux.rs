//! Mux (§4.3.6): fans `N` inflow ports into `M` outflow ports on the same
//! stream, redistributing on every settle step so that
//! `sum(inflow achieved) == sum(outflow achieved)` holds once quiescent.

use super::AtomicModel;
use crate::flow::FlowState;
use crate::port::Port;
use crate::types::{ComponentError, ComponentId, Flow, PortId, PortValue, RealTime, Stream, TimeAdvance, FLOW_TOLERANCE};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How a [`MuxState`] splits requests among inflows and achieved flow among
/// outflows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DispatchStrategy {
    /// Exhaust inflow ports / satisfy outflow ports in index order.
    InOrder,
    /// Split evenly, water-filling any request below its even share.
    Distribute,
}

/// State for a [`super::Model::Mux`].
#[derive(Debug, Clone, PartialEq)]
pub struct MuxState {
    pub(crate) stream: Stream,
    time: RealTime,
    strategy: DispatchStrategy,
    inflows: Vec<Port>,
    outflows: Vec<Port>,
    report_inflow_request: Vec<bool>,
    report_outflow_achieved: Vec<bool>,
}

impl MuxState {
    /// Build a mux with `num_inflows` upstream and `num_outflows` downstream
    /// ports, all on `stream`.
    pub fn new(stream: Stream, num_inflows: u32, num_outflows: u32, strategy: DispatchStrategy) -> Self {
        assert!(num_inflows > 0, "mux needs at least one inflow port");
        assert!(num_outflows > 0, "mux needs at least one outflow port");
        Self {
            stream,
            time: 0,
            strategy,
            inflows: vec![Port::new(); num_inflows as usize],
            outflows: vec![Port::new(); num_outflows as usize],
            report_inflow_request: vec![false; num_inflows as usize],
            report_outflow_achieved: vec![false; num_outflows as usize],
        }
    }

    /// The stream this mux carries.
    pub fn stream(&self) -> &Stream {
        &self.stream
    }

    /// Number of inflow ports.
    pub fn num_inflows(&self) -> u32 {
        self.inflows.len() as u32
    }

    /// Number of outflow ports.
    pub fn num_outflows(&self) -> u32 {
        self.outflows.len() as u32
    }

    /// The `i`th inflow port's currently achieved rate.
    pub fn inflow_achieved(&self, i: u32) -> Flow {
        self.inflows[i as usize].achieved
    }

    /// The `i`th inflow port's currently requested rate.
    pub fn inflow_requested(&self, i: u32) -> Flow {
        self.inflows[i as usize].requested
    }

    /// The `k`th outflow port's currently achieved rate.
    pub fn outflow_achieved(&self, k: u32) -> Flow {
        self.outflows[k as usize].achieved
    }

    /// The `k`th outflow port's currently requested rate.
    pub fn outflow_requested(&self, k: u32) -> Flow {
        self.outflows[k as usize].requested
    }

    fn has_pending_report(&self) -> bool {
        self.report_inflow_request.iter().any(|&b| b) || self.report_outflow_achieved.iter().any(|&b| b)
    }

    fn redistribute_requests(&mut self) {
        let total: Flow = self.outflows.iter().map(|p| p.requested).sum();
        match self.strategy {
            DispatchStrategy::InOrder => {
                let mut remaining = total;
                for i in 0..self.inflows.len() {
                    let req = remaining.max(0.0);
                    // An inflow that has already responded with less than it
                    // was asked for is known-capped: it can only ever
                    // contribute what it last achieved, so the shortfall must
                    // carry to the next inflow. An inflow that hasn't
                    // responded yet (or matched its request in full) is
                    // assumed able to cover the rest of `remaining` on its
                    // own, so later inflows see nothing left to ask for.
                    let capped = self.inflows[i].requested > FLOW_TOLERANCE
                        && self.inflows[i].achieved < self.inflows[i].requested - FLOW_TOLERANCE;
                    let contribution = if capped { self.inflows[i].achieved } else { req };
                    let (p, upd) = self.inflows[i].with_requested(req, self.time);
                    self.inflows[i] = p;
                    self.report_inflow_request[i] |= upd.send_request;
                    remaining = (remaining - contribution).max(0.0);
                }
            }
            DispatchStrategy::Distribute => {
                let share = total / self.inflows.len() as Flow;
                for i in 0..self.inflows.len() {
                    let (p, upd) = self.inflows[i].with_requested(share, self.time);
                    self.inflows[i] = p;
                    self.report_inflow_request[i] |= upd.send_request;
                }
            }
        }
    }

    fn redistribute_achieved(&mut self) {
        let total_in: Flow = self.inflows.iter().map(|p| p.achieved).sum();
        match self.strategy {
            DispatchStrategy::InOrder => {
                let mut remaining = total_in;
                for k in 0..self.outflows.len() {
                    let give = self.outflows[k].requested.min(remaining.max(0.0));
                    let (p, upd) = self.outflows[k].with_achieved(give, self.time);
                    self.outflows[k] = p;
                    self.report_outflow_achieved[k] |= upd.send_achieved;
                    remaining -= give;
                }
            }
            DispatchStrategy::Distribute => {
                let requests: Vec<Flow> = self.outflows.iter().map(|p| p.requested).collect();
                let alloc = water_fill(total_in, &requests);
                for k in 0..self.outflows.len() {
                    let (p, upd) = self.outflows[k].with_achieved(alloc[k], self.time);
                    self.outflows[k] = p;
                    self.report_outflow_achieved[k] |= upd.send_achieved;
                }
            }
        }
    }
}

/// Evenly shares `total` among `requests`, redistributing any leftover from
/// a request below its even share to the remaining requests, converging in
/// at most `requests.len()` rounds.
fn water_fill(total: Flow, requests: &[Flow]) -> Vec<Flow> {
    let n = requests.len();
    let mut alloc = vec![0.0; n];
    let mut active: Vec<usize> = (0..n).filter(|&i| requests[i] > FLOW_TOLERANCE).collect();
    let mut remaining = total;
    loop {
        if active.is_empty() || remaining <= FLOW_TOLERANCE {
            break;
        }
        let share = remaining / active.len() as Flow;
        let mut next_active = Vec::new();
        let mut satisfied_any = false;
        for &i in &active {
            if requests[i] <= share + FLOW_TOLERANCE {
                alloc[i] = requests[i];
                remaining -= requests[i];
                satisfied_any = true;
            } else {
                next_active.push(i);
            }
        }
        if !satisfied_any {
            for &i in &active {
                alloc[i] = share;
            }
            break;
        }
        active = next_active;
    }
    alloc
}

impl AtomicModel for MuxState {
    fn ta(&self) -> TimeAdvance {
        if self.has_pending_report() {
            TimeAdvance::At(0)
        } else {
            TimeAdvance::Infinity
        }
    }

    fn lambda(&self) -> Vec<PortValue> {
        let mut out = Vec::new();
        for i in 0..self.inflows.len() {
            if self.report_inflow_request[i] {
                out.push(PortValue::new(
                    PortId::mux_inflow_request(i as u32),
                    self.inflows[i].requested,
                ));
            }
        }
        for k in 0..self.outflows.len() {
            if self.report_outflow_achieved[k] {
                out.push(PortValue::new(
                    PortId::mux_outflow_achieved(k as u32),
                    self.outflows[k].achieved,
                ));
            }
        }
        out
    }

    fn delta_int(&mut self) {
        self.report_inflow_request.iter_mut().for_each(|b| *b = false);
        self.report_outflow_achieved.iter_mut().for_each(|b| *b = false);
    }

    fn delta_ext(&mut self, elapsed: RealTime, xs: &[PortValue]) {
        self.time += elapsed;
        for pv in xs {
            for k in 0..self.outflows.len() {
                if pv.port == PortId::mux_outflow_request(k as u32) {
                    let (p, upd) = self.outflows[k].with_requested(pv.value, self.time);
                    self.outflows[k] = p;
                    self.report_outflow_achieved[k] |= upd.send_achieved;
                }
            }
            for i in 0..self.inflows.len() {
                if pv.port == PortId::mux_inflow_achieved(i as u32) {
                    let (p, upd) = self.inflows[i].with_achieved(pv.value, self.time);
                    self.inflows[i] = p;
                    self.report_inflow_request[i] |= upd.send_request;
                }
            }
        }
        self.redistribute_requests();
        self.redistribute_achieved();
    }

    fn time(&self) -> RealTime {
        self.time
    }

    fn flow_state(&self) -> FlowState {
        FlowState {
            inflow: self.inflows.iter().map(|p| p.achieved).sum(),
            outflow: self.outflows.iter().map(|p| p.achieved).sum(),
            ..Default::default()
        }
    }

    fn check_conservation(&self, id: ComponentId) -> Result<(), ComponentError> {
        self.flow_state().check(id, self.time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_order_requests_first_inflow_fully() {
        let mut m = MuxState::new(Stream::new("electricity"), 2, 1, DispatchStrategy::InOrder);
        m.delta_ext(0, &[PortValue::new(PortId::mux_outflow_request(0), 15.0)]);
        assert_eq!(m.inflows[0].requested, 15.0);
        assert_eq!(m.inflows[1].requested, 0.0);
    }

    #[test]
    fn in_order_shifts_shortfall_to_next_inflow() {
        let mut m = MuxState::new(Stream::new("electricity"), 2, 1, DispatchStrategy::InOrder);
        m.delta_ext(0, &[PortValue::new(PortId::mux_outflow_request(0), 15.0)]);
        m.delta_int();
        m.delta_ext(0, &[PortValue::new(PortId::mux_inflow_achieved(0), 12.0)]);
        assert_eq!(m.inflows[1].requested, 3.0);
    }

    #[test]
    fn distribute_splits_achieved_with_water_filling() {
        let mut m = MuxState::new(Stream::new("electricity"), 1, 2, DispatchStrategy::Distribute);
        m.delta_ext(
            0,
            &[
                PortValue::new(PortId::mux_outflow_request(0), 3.0),
                PortValue::new(PortId::mux_outflow_request(1), 10.0),
            ],
        );
        m.delta_int();
        m.delta_ext(0, &[PortValue::new(PortId::mux_inflow_achieved(0), 8.0)]);
        assert_eq!(m.outflow_achieved(0), 3.0);
        assert_eq!(m.outflow_achieved(1), 5.0);
    }
}
