//! OnOffSwitch (§4.3.8): gates a pass-through stream by a precomputed
//! reliability/fragility schedule. Wraps a scheduled component so the
//! scenario runner can force its flow to zero during outages without the
//! wrapped component needing to know about availability at all.

use super::AtomicModel;
use crate::flow::FlowState;
use crate::port::Port;
use crate::types::{ComponentError, ComponentId, Flow, PortId, PortValue, RealTime, Stream, TimeAdvance, TimeState};

/// State for a [`super::Model::OnOffSwitch`].
#[derive(Debug, Clone, PartialEq)]
pub struct OnOffSwitchState {
    pub(crate) stream: Stream,
    time: RealTime,
    schedule: Vec<TimeState>,
    index: usize,
    applied: bool,
    is_on: bool,
    downstream_request: Flow,
    port: Port,
    report_inflow_request: bool,
    report_outflow_achieved: bool,
}

impl OnOffSwitchState {
    /// Build from a non-empty, strictly time-increasing availability
    /// schedule.
    pub fn new(stream: Stream, schedule: Vec<TimeState>) -> Self {
        assert!(!schedule.is_empty(), "on/off schedule must not be empty");
        Self {
            stream,
            time: 0,
            schedule,
            index: 0,
            applied: false,
            is_on: true,
            downstream_request: 0.0,
            port: Port::new(),
            report_inflow_request: false,
            report_outflow_achieved: false,
        }
    }

    /// The stream this switch gates.
    pub fn stream(&self) -> &Stream {
        &self.stream
    }

    /// `true` if the component is currently available.
    pub fn is_on(&self) -> bool {
        self.is_on
    }

    /// Currently achieved outflow (forced to `0` while off).
    pub fn achieved(&self) -> Flow {
        self.port.achieved
    }

    /// Currently requested outflow (gated to `0` while off).
    pub fn requested(&self) -> Flow {
        self.port.requested
    }

    fn has_pending_report(&self) -> bool {
        self.report_inflow_request || self.report_outflow_achieved
    }

    fn gated_request(&self) -> Flow {
        if self.is_on {
            self.downstream_request
        } else {
            0.0
        }
    }
}

impl AtomicModel for OnOffSwitchState {
    fn ta(&self) -> TimeAdvance {
        if self.has_pending_report() {
            return TimeAdvance::At(0);
        }
        if !self.applied {
            return TimeAdvance::At(0);
        }
        if self.index + 1 < self.schedule.len() {
            TimeAdvance::At(self.schedule[self.index + 1].time - self.time)
        } else {
            TimeAdvance::Infinity
        }
    }

    fn lambda(&self) -> Vec<PortValue> {
        let mut out = Vec::with_capacity(2);
        if self.report_inflow_request {
            out.push(PortValue::new(PortId::OUTPORT_INFLOW_REQUEST, self.port.requested));
        }
        if self.report_outflow_achieved {
            out.push(PortValue::new(
                PortId::OUTPORT_OUTFLOW_ACHIEVED,
                self.port.achieved,
            ));
        }
        out
    }

    fn delta_int(&mut self) {
        if self.has_pending_report() {
            self.report_inflow_request = false;
            self.report_outflow_achieved = false;
            return;
        }
        if !self.applied {
            self.applied = true;
        } else {
            self.index += 1;
        }
        self.time = self.schedule[self.index].time;
        self.is_on = self.schedule[self.index].available;
        let (p, upd) = self.port.with_requested(self.gated_request(), self.time);
        self.port = p;
        self.report_inflow_request = upd.send_request;
        self.report_outflow_achieved = upd.send_achieved;
    }

    fn delta_ext(&mut self, elapsed: RealTime, xs: &[PortValue]) {
        self.time += elapsed;
        for pv in xs {
            if pv.port == PortId::INPORT_OUTFLOW_REQUEST {
                self.downstream_request = pv.value;
                let (p, upd) = self.port.with_requested(self.gated_request(), self.time);
                self.port = p;
                self.report_inflow_request |= upd.send_request;
                self.report_outflow_achieved |= upd.send_achieved;
            } else if pv.port == PortId::INPORT_INFLOW_ACHIEVED {
                let (p, upd) = self.port.with_achieved(pv.value, self.time);
                self.port = p;
                self.report_outflow_achieved |= upd.send_achieved;
                self.report_inflow_request |= upd.send_request;
            }
        }
    }

    fn time(&self) -> RealTime {
        self.time
    }

    fn flow_state(&self) -> FlowState {
        FlowState {
            inflow: self.port.achieved,
            outflow: self.port.achieved,
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

    fn schedule() -> Vec<TimeState> {
        vec![TimeState::new(0, true), TimeState::new(5, false), TimeState::new(8, true)]
    }

    #[test]
    fn forces_flow_to_zero_while_off() {
        let mut sw = OnOffSwitchState::new(Stream::new("electricity"), schedule());
        sw.delta_int(); // apply schedule[0]: on, no change yet (nothing requested)
        sw.delta_ext(0, &[PortValue::new(PortId::INPORT_OUTFLOW_REQUEST, 10.0)]);
        sw.delta_int(); // clear the resulting inflow-request report
        sw.delta_ext(0, &[PortValue::new(PortId::INPORT_INFLOW_ACHIEVED, 10.0)]);
        assert_eq!(sw.achieved(), 10.0);
        sw.delta_int(); // clear the resulting outflow-achieved report

        sw.delta_int(); // apply schedule[1]: off
        assert!(!sw.is_on());
        assert_eq!(sw.port.requested, 0.0);
        assert_eq!(sw.achieved(), 0.0);
    }

    #[test]
    fn resumes_last_downstream_request_when_back_on() {
        let mut sw = OnOffSwitchState::new(Stream::new("electricity"), schedule());
        sw.delta_int(); // apply schedule[0]: on
        sw.delta_ext(0, &[PortValue::new(PortId::INPORT_OUTFLOW_REQUEST, 10.0)]);
        sw.delta_int(); // clear pending report
        sw.delta_int(); // apply schedule[1]: off at t=5
        sw.delta_int(); // clear pending report
        sw.delta_int(); // apply schedule[2]: on at t=8
        assert_eq!(sw.port.requested, 10.0);
    }
}
