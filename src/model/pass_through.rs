//! FlowMeter / PassThrough (§4.3.9): an identity element that copies
//! outflow-request upstream and inflow-achieved downstream, distinguished
//! from a bare coupling only by owning a node in the recording graph.

use super::{AtomicModel, ModelKind};
use crate::flow::FlowState;
use crate::port::Port;
use crate::types::{ComponentError, ComponentId, PortId, PortValue, RealTime, Stream, TimeAdvance};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Distinguishes a pure recording node (`FlowMeter`) from a bounded
/// pass-through wire (`PassThrough`) for stats/CSV labeling; both share the
/// identical identity transition function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PassThroughKind {
    /// Records flow without otherwise altering it.
    FlowMeter,
    /// Records flow and optionally clamps it to `[min_outflow, max_outflow]`.
    PassThrough,
}

impl PassThroughKind {
    pub(super) fn as_model_kind(self) -> ModelKind {
        match self {
            PassThroughKind::FlowMeter => ModelKind::FlowMeter,
            PassThroughKind::PassThrough => ModelKind::PassThrough,
        }
    }
}

/// State for [`PassThroughKind::FlowMeter`] and [`PassThroughKind::PassThrough`].
#[derive(Debug, Clone, PartialEq)]
pub struct PassThroughState {
    pub(crate) stream: Stream,
    pub(crate) kind: PassThroughKind,
    time: RealTime,
    min_outflow: f64,
    max_outflow: f64,
    port: Port,
    report_inflow_request: bool,
    report_outflow_achieved: bool,
}

impl PassThroughState {
    /// A meter/pass-through with no outflow bounds.
    pub fn new(stream: Stream, kind: PassThroughKind) -> Self {
        Self::bounded(stream, kind, 0.0, f64::INFINITY)
    }

    /// A pass-through bounded to `[min_outflow, max_outflow]`.
    pub fn bounded(stream: Stream, kind: PassThroughKind, min_outflow: f64, max_outflow: f64) -> Self {
        Self {
            stream,
            kind,
            time: 0,
            min_outflow,
            max_outflow,
            port: Port::new(),
            report_inflow_request: false,
            report_outflow_achieved: false,
        }
    }

    /// The stream this node carries.
    pub fn stream(&self) -> &Stream {
        &self.stream
    }

    /// Currently achieved rate.
    pub fn achieved(&self) -> f64 {
        self.port.achieved
    }

    /// Currently requested (clamped) rate.
    pub fn requested(&self) -> f64 {
        self.port.requested
    }

    fn clamp(&self, r: f64) -> f64 {
        r.max(self.min_outflow).min(self.max_outflow)
    }

    fn has_pending_report(&self) -> bool {
        self.report_inflow_request || self.report_outflow_achieved
    }
}

impl AtomicModel for PassThroughState {
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
        self.report_inflow_request = false;
        self.report_outflow_achieved = false;
    }

    fn delta_ext(&mut self, elapsed: RealTime, xs: &[PortValue]) {
        self.time += elapsed;
        for pv in xs {
            if pv.port == PortId::INPORT_OUTFLOW_REQUEST {
                let clamped = self.clamp(pv.value);
                let (p, upd) = self.port.with_requested(clamped, self.time);
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
