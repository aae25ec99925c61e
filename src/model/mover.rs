//! Mover (§4.3.10): a heat pump / compressor. Combines a "moved" inflow and
//! a "powered" inflow into one outflow stream at a fixed coefficient of
//! performance: `outflow = moved_inflow + powered_inflow`,
//! `powered_inflow = outflow / (cop + 1)`.

use super::AtomicModel;
use crate::flow::FlowState;
use crate::port::Port;
use crate::types::{ComponentError, ComponentId, Flow, PortId, PortValue, RealTime, Stream, TimeAdvance};

/// State for a [`super::Model::Mover`].
#[derive(Debug, Clone, PartialEq)]
pub struct MoverState {
    pub(crate) moved_stream: Stream,
    pub(crate) powered_stream: Stream,
    pub(crate) outflow_stream: Stream,
    time: RealTime,
    cop: Flow,
    moved_port: Port,
    powered_port: Port,
    outflow_port: Port,
    report_moved_request: bool,
    report_powered_request: bool,
    report_outflow_achieved: bool,
}

impl MoverState {
    /// Build a mover with coefficient of performance `cop > 0`.
    pub fn new(moved_stream: Stream, powered_stream: Stream, outflow_stream: Stream, cop: Flow) -> Self {
        assert!(cop > 0.0, "mover COP must be > 0");
        Self {
            moved_stream,
            powered_stream,
            outflow_stream,
            time: 0,
            cop,
            moved_port: Port::new(),
            powered_port: Port::new(),
            outflow_port: Port::new(),
            report_moved_request: false,
            report_powered_request: false,
            report_outflow_achieved: false,
        }
    }

    /// The outflow stream.
    pub fn outflow_stream(&self) -> &Stream {
        &self.outflow_stream
    }

    /// Currently achieved outflow.
    pub fn outflow_achieved(&self) -> Flow {
        self.outflow_port.achieved
    }

    /// Currently requested outflow.
    pub fn outflow_requested(&self) -> Flow {
        self.outflow_port.requested
    }

    /// Currently achieved "moved" inflow.
    pub fn moved_achieved(&self) -> Flow {
        self.moved_port.achieved
    }

    /// Currently requested "moved" inflow.
    pub fn moved_requested(&self) -> Flow {
        self.moved_port.requested
    }

    /// Currently achieved "powered" inflow.
    pub fn powered_achieved(&self) -> Flow {
        self.powered_port.achieved
    }

    /// Currently requested "powered" inflow.
    pub fn powered_requested(&self) -> Flow {
        self.powered_port.requested
    }

    fn moved_frac(&self) -> Flow {
        self.cop / (self.cop + 1.0)
    }

    fn powered_frac(&self) -> Flow {
        1.0 / (self.cop + 1.0)
    }

    fn has_pending_report(&self) -> bool {
        self.report_moved_request || self.report_powered_request || self.report_outflow_achieved
    }

    fn max_outflow_from_inflows(&self) -> Flow {
        (self.moved_port.achieved / self.moved_frac()).min(self.powered_port.achieved / self.powered_frac())
    }

    fn recompute_outflow(&mut self) {
        let achievable = self.max_outflow_from_inflows().min(self.outflow_port.requested);
        let (p, upd) = self.outflow_port.with_achieved(achievable, self.time);
        self.outflow_port = p;
        self.report_outflow_achieved |= upd.send_achieved;
    }
}

impl AtomicModel for MoverState {
    fn ta(&self) -> TimeAdvance {
        if self.has_pending_report() {
            TimeAdvance::At(0)
        } else {
            TimeAdvance::Infinity
        }
    }

    fn lambda(&self) -> Vec<PortValue> {
        let mut out = Vec::with_capacity(3);
        if self.report_moved_request {
            out.push(PortValue::new(
                PortId::OUTPORT_MOVED_INFLOW_REQUEST,
                self.moved_port.requested,
            ));
        }
        if self.report_powered_request {
            out.push(PortValue::new(
                PortId::OUTPORT_POWERED_INFLOW_REQUEST,
                self.powered_port.requested,
            ));
        }
        if self.report_outflow_achieved {
            out.push(PortValue::new(
                PortId::OUTPORT_OUTFLOW_ACHIEVED,
                self.outflow_port.achieved,
            ));
        }
        out
    }

    fn delta_int(&mut self) {
        self.report_moved_request = false;
        self.report_powered_request = false;
        self.report_outflow_achieved = false;
    }

    fn delta_ext(&mut self, elapsed: RealTime, xs: &[PortValue]) {
        self.time += elapsed;
        for pv in xs {
            if pv.port == PortId::INPORT_OUTFLOW_REQUEST {
                let (op, upd_out) = self.outflow_port.with_requested(pv.value, self.time);
                self.outflow_port = op;
                self.report_outflow_achieved |= upd_out.send_achieved;

                let (mp, upd_m) = self
                    .moved_port
                    .with_requested(pv.value * self.moved_frac(), self.time);
                self.moved_port = mp;
                self.report_moved_request |= upd_m.send_request;

                let (pp, upd_p) = self
                    .powered_port
                    .with_requested(pv.value * self.powered_frac(), self.time);
                self.powered_port = pp;
                self.report_powered_request |= upd_p.send_request;
            } else if pv.port == PortId::INPORT_MOVED_INFLOW_ACHIEVED {
                let (mp, upd_m) = self.moved_port.with_achieved(pv.value, self.time);
                self.moved_port = mp;
                self.report_moved_request |= upd_m.send_request;
                self.recompute_outflow();
            } else if pv.port == PortId::INPORT_POWERED_INFLOW_ACHIEVED {
                let (pp, upd_p) = self.powered_port.with_achieved(pv.value, self.time);
                self.powered_port = pp;
                self.report_powered_request |= upd_p.send_request;
                self.recompute_outflow();
            }
        }
    }

    fn time(&self) -> RealTime {
        self.time
    }

    fn flow_state(&self) -> FlowState {
        // Account inflow as the portion of moved/powered actually used by
        // the achieved outflow, not whatever slack an over-supplying
        // upstream reported: `used_moved + used_powered == outflow` by
        // construction, matching the mover's fixed-ratio contract exactly.
        FlowState {
            inflow: self.outflow_port.achieved,
            outflow: self.outflow_port.achieved,
            ..Default::default()
        }
    }

    fn check_conservation(&self, id: ComponentId) -> Result<(), ComponentError> {
        self.flow_state().check(id, self.time)
    }
}
