//! Storage (§4.3.7): a state-of-charge reservoir that always asks upstream
//! for `max_charge_rate`, serves downstream requests first from achieved
//! inflow and then from stored energy, and schedules its own next event for
//! whenever SOC would hit a capacity boundary at the current net rate.

use super::AtomicModel;
use crate::flow::FlowState;
use crate::port::Port;
use crate::types::{
    flow_eq, ComponentError, ComponentId, Flow, PortId, PortValue, RealTime, Stream, TimeAdvance,
    FLOW_TOLERANCE,
};

/// State for a [`super::Model::Storage`].
#[derive(Debug, Clone, PartialEq)]
pub struct StorageState {
    pub(crate) stream: Stream,
    time: RealTime,
    capacity: Flow,
    max_charge_rate: Flow,
    soc: Flow,
    inflow_port: Port,
    outflow_port: Port,
    /// Signed: positive while charging, negative while discharging.
    storeflow_achieved: Flow,
    discharge_achieved: Flow,
    report_inflow_request: bool,
    report_outflow_achieved: bool,
    report_storeflow_achieved: bool,
    report_discharge_achieved: bool,
}

impl StorageState {
    /// Build storage with `capacity` (energy units, e.g. kJ), `max_charge_rate`
    /// (the inflow request ceiling), and `initial_soc` in `[0, 1]`.
    pub fn new(stream: Stream, capacity: Flow, max_charge_rate: Flow, initial_soc: Flow) -> Self {
        assert!(capacity > 0.0, "storage capacity must be > 0");
        assert!(max_charge_rate >= 0.0, "max charge rate must be >= 0");
        assert!((0.0..=1.0).contains(&initial_soc), "initial soc must be in [0, 1]");
        let mut s = Self {
            stream,
            time: 0,
            capacity,
            max_charge_rate,
            soc: initial_soc,
            inflow_port: Port::new(),
            outflow_port: Port::new(),
            storeflow_achieved: 0.0,
            discharge_achieved: 0.0,
            report_inflow_request: false,
            report_outflow_achieved: false,
            report_storeflow_achieved: false,
            report_discharge_achieved: false,
        };
        s.recompute_inflow_request();
        s
    }

    /// The stream this storage buffers.
    pub fn stream(&self) -> &Stream {
        &self.stream
    }

    /// Current state of charge, in `[0, 1]`.
    pub fn soc(&self) -> Flow {
        self.soc
    }

    /// Currently achieved inflow.
    pub fn inflow_achieved(&self) -> Flow {
        self.inflow_port.achieved
    }

    /// Currently requested inflow.
    pub fn inflow_requested(&self) -> Flow {
        self.inflow_port.requested
    }

    /// Currently achieved outflow.
    pub fn outflow_achieved(&self) -> Flow {
        self.outflow_port.achieved
    }

    /// Currently requested outflow.
    pub fn outflow_requested(&self) -> Flow {
        self.outflow_port.requested
    }

    /// Currently achieved storeflow (signed: positive while charging).
    pub fn storeflow_achieved(&self) -> Flow {
        self.storeflow_achieved
    }

    /// Currently achieved discharge (non-negative).
    pub fn discharge_achieved(&self) -> Flow {
        self.discharge_achieved
    }

    fn has_pending_report(&self) -> bool {
        self.report_inflow_request
            || self.report_outflow_achieved
            || self.report_storeflow_achieved
            || self.report_discharge_achieved
    }

    fn net_rate(&self) -> Flow {
        self.inflow_port.achieved - self.outflow_port.achieved
    }

    fn advance_soc(&mut self, elapsed: RealTime) {
        if elapsed == 0 {
            return;
        }
        let net = self.net_rate();
        self.soc = (self.soc + net * elapsed as Flow / self.capacity).clamp(0.0, 1.0);
    }

    fn recompute_inflow_request(&mut self) {
        let desired = if self.soc < 1.0 - FLOW_TOLERANCE {
            self.max_charge_rate
        } else {
            0.0
        };
        let (p, upd) = self.inflow_port.with_requested(desired, self.time);
        self.inflow_port = p;
        self.report_inflow_request |= upd.send_request;
    }

    fn recompute_outflow(&mut self) {
        let avail = if self.soc > FLOW_TOLERANCE {
            Flow::INFINITY
        } else {
            self.inflow_port.achieved
        };
        let (p, upd) = self
            .outflow_port
            .with_requested_and_available(self.outflow_port.requested, avail, self.time);
        self.outflow_port = p;
        self.report_outflow_achieved |= upd.send_achieved;
    }

    fn recompute_flow_terms(&mut self) {
        let net = self.net_rate();
        if !flow_eq(net, self.storeflow_achieved) {
            self.storeflow_achieved = net;
            self.report_storeflow_achieved = true;
        }
        let discharge = (-net).max(0.0);
        if !flow_eq(discharge, self.discharge_achieved) {
            self.discharge_achieved = discharge;
            self.report_discharge_achieved = true;
        }
    }
}

impl AtomicModel for StorageState {
    fn ta(&self) -> TimeAdvance {
        if self.has_pending_report() {
            return TimeAdvance::At(0);
        }
        let net = self.net_rate();
        if net.abs() <= FLOW_TOLERANCE {
            return TimeAdvance::Infinity;
        }
        let energy = self.soc * self.capacity;
        let dt = if net > 0.0 {
            (self.capacity - energy) / net
        } else {
            energy / (-net)
        };
        if !dt.is_finite() {
            return TimeAdvance::Infinity;
        }
        TimeAdvance::At(dt.round().max(0.0) as RealTime)
    }

    fn lambda(&self) -> Vec<PortValue> {
        let mut out = Vec::with_capacity(4);
        if self.report_inflow_request {
            out.push(PortValue::new(PortId::OUTPORT_INFLOW_REQUEST, self.inflow_port.requested));
        }
        if self.report_outflow_achieved {
            out.push(PortValue::new(
                PortId::OUTPORT_OUTFLOW_ACHIEVED,
                self.outflow_port.achieved,
            ));
        }
        if self.report_storeflow_achieved {
            out.push(PortValue::new(
                PortId::OUTPORT_STOREFLOW_ACHIEVED,
                self.storeflow_achieved,
            ));
        }
        if self.report_discharge_achieved {
            out.push(PortValue::new(
                PortId::OUTPORT_DISCHARGE_ACHIEVED,
                self.discharge_achieved,
            ));
        }
        out
    }

    fn delta_int(&mut self) {
        if self.has_pending_report() {
            self.report_inflow_request = false;
            self.report_outflow_achieved = false;
            self.report_storeflow_achieved = false;
            self.report_discharge_achieved = false;
            return;
        }
        if let TimeAdvance::At(dt) = self.ta() {
            self.time += dt;
            self.soc = if self.net_rate() > 0.0 { 1.0 } else { 0.0 };
            self.recompute_outflow();
            self.recompute_inflow_request();
            self.recompute_flow_terms();
        }
    }

    fn delta_ext(&mut self, elapsed: RealTime, xs: &[PortValue]) {
        self.advance_soc(elapsed);
        self.time += elapsed;
        for pv in xs {
            if pv.port == PortId::INPORT_OUTFLOW_REQUEST {
                let (p, upd) = self.outflow_port.with_requested(pv.value, self.time);
                self.outflow_port = p;
                self.report_outflow_achieved |= upd.send_achieved;
            } else if pv.port == PortId::INPORT_INFLOW_ACHIEVED {
                let (p, _upd) = self.inflow_port.with_achieved(pv.value, self.time);
                self.inflow_port = p;
            }
        }
        self.recompute_outflow();
        self.recompute_inflow_request();
        self.recompute_flow_terms();
    }

    fn time(&self) -> RealTime {
        self.time
    }

    fn flow_state(&self) -> FlowState {
        FlowState {
            inflow: self.inflow_port.achieved,
            outflow: self.outflow_port.achieved,
            storeflow: self.storeflow_achieved,
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
    fn charges_toward_full_at_net_rate() {
        let mut s = StorageState::new(Stream::new("electricity"), 100.0, 1.0, 0.0);
        s.delta_ext(0, &[PortValue::new(PortId::INPORT_INFLOW_ACHIEVED, 1.0)]);
        s.delta_int(); // clear the pending storeflow report
        assert_eq!(s.ta(), TimeAdvance::At(100));
    }

    #[test]
    fn discharges_to_empty_then_clamps_outflow() {
        let mut s = StorageState::new(Stream::new("electricity"), 100.0, 1.0, 0.5);
        s.delta_ext(
            0,
            &[
                PortValue::new(PortId::INPORT_INFLOW_ACHIEVED, 1.0),
                PortValue::new(PortId::INPORT_OUTFLOW_REQUEST, 2.0),
            ],
        );
        assert_eq!(s.outflow_achieved(), 2.0);
        s.delta_int(); // clear pending reports
        assert_eq!(s.ta(), TimeAdvance::At(50));
        s.delta_int(); // apply the SOC-boundary transition
        assert_eq!(s.soc(), 0.0);
        assert_eq!(s.outflow_achieved(), 1.0);
    }
}
