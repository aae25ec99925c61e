//! FlowLimits (§4.3.4): clamps the passed-through request to `[lower,
//! upper]`. Implemented as a single shared port since no loss occurs at the
//! limiter itself — only the *request* is bounded, not split.

use super::AtomicModel;
use crate::flow::FlowState;
use crate::port::Port;
use crate::types::{ComponentError, ComponentId, Flow, PortId, PortValue, RealTime, Stream, TimeAdvance};

/// State for a [`super::Model::FlowLimits`].
#[derive(Debug, Clone, PartialEq)]
pub struct FlowLimitsState {
    pub(crate) stream: Stream,
    time: RealTime,
    lower: Flow,
    upper: Flow,
    flow: Port,
    report_inflow_request: bool,
    report_outflow_achieved: bool,
}

impl FlowLimitsState {
    /// Build with bounds `0 <= lower <= upper`.
    pub fn new(stream: Stream, lower: Flow, upper: Flow) -> Self {
        assert!(lower >= 0.0 && lower <= upper, "flow limits require 0 <= lower <= upper");
        Self {
            stream,
            time: 0,
            lower,
            upper,
            flow: Port::new(),
            report_inflow_request: false,
            report_outflow_achieved: false,
        }
    }

    /// The stream this limiter bounds.
    pub fn stream(&self) -> &Stream {
        &self.stream
    }

    /// Currently achieved (== both inflow and outflow) rate.
    pub fn achieved(&self) -> Flow {
        self.flow.achieved
    }

    /// Currently requested (clamped) rate.
    pub fn requested(&self) -> Flow {
        self.flow.requested
    }

    fn has_pending_report(&self) -> bool {
        self.report_inflow_request || self.report_outflow_achieved
    }

    fn clamp(&self, r: Flow) -> Flow {
        r.max(self.lower).min(self.upper)
    }
}

impl AtomicModel for FlowLimitsState {
    fn ta(&self) -> TimeAdvance {
        if self.has_pending_report() {
            TimeAdvance::At(0)
        } else {
            TimeAdvance::Infinity
        }
    }

    fn lambda(&self) -> Vec<PortValue> {
        let mut out = Vec::with_capacity(2);
        if self.report_inflow_request {
            out.push(PortValue::new(PortId::OUTPORT_INFLOW_REQUEST, self.flow.requested));
        }
        if self.report_outflow_achieved {
            out.push(PortValue::new(PortId::OUTPORT_OUTFLOW_ACHIEVED, self.flow.achieved));
        }
        out
    }

    fn delta_int(&mut self) {
        self.report_inflow_request = false;
        self.report_outflow_achieved = false;
    }

    fn delta_ext(&mut self, elapsed: RealTime, xs: &[PortValue]) {
        self.time += elapsed;
        for pv in xs {
            if pv.port == PortId::INPORT_OUTFLOW_REQUEST {
                let clamped = self.clamp(pv.value);
                // Optimistically assume the clamped rate is achievable
                // until told otherwise; a later inflow-achieved message
                // corrects this down if upstream can't keep up.
                let (p, upd) = self.flow.with_requested_and_available(clamped, clamped, self.time);
                self.flow = p;
                self.report_inflow_request |= upd.send_request;
                self.report_outflow_achieved |= upd.send_achieved;
            } else if pv.port == PortId::INPORT_INFLOW_ACHIEVED {
                let (p, upd) = self.flow.with_achieved(pv.value, self.time);
                self.flow = p;
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
            inflow: self.flow.achieved,
            outflow: self.flow.achieved,
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
    fn clamps_above_upper() {
        let mut fl = FlowLimitsState::new(Stream::new("electricity"), 0.0, 50.0);
        fl.delta_ext(0, &[PortValue::new(PortId::INPORT_OUTFLOW_REQUEST, 160.0)]);
        assert_eq!(fl.flow.requested, 50.0);
        assert_eq!(fl.achieved(), 50.0);
        assert!(fl.report_inflow_request);
        assert!(fl.report_outflow_achieved);
    }

    #[test]
    fn inflow_achieved_below_clamp_reduces_outflow() {
        let mut fl = FlowLimitsState::new(Stream::new("electricity"), 0.0, 50.0);
        fl.delta_ext(0, &[PortValue::new(PortId::INPORT_OUTFLOW_REQUEST, 160.0)]);
        fl.delta_int();
        fl.delta_ext(0, &[PortValue::new(PortId::INPORT_INFLOW_ACHIEVED, 40.0)]);
        assert_eq!(fl.achieved(), 40.0);
    }
}
