//! UncontrolledSource (§4.3.3): interprets a supply profile as *available*
//! output; downstream requests up to that availability are met, any excess
//! supply becomes lossflow (curtailment), any unmet request is simply not
//! delivered (the port invariant `achieved <= requested` already expresses
//! unmet demand). Curtailment is tapped through an explicit lossflow port so
//! a downstream can meter how much supply went unused, the same way
//! [`super::converter::ConverterState`] taps its remainder.

use super::AtomicModel;
use crate::flow::FlowState;
use crate::port::Port;
use crate::types::{
    ComponentError, ComponentId, Flow, LoadItem, PortId, PortValue, RealTime, Stream, TimeAdvance,
};

/// State for a [`super::Model::UncontrolledSource`].
#[derive(Debug, Clone, PartialEq)]
pub struct UncontrolledSourceState {
    pub(crate) stream: Stream,
    time: RealTime,
    profile: Vec<LoadItem>,
    index: usize,
    applied: bool,
    supply: Flow,
    outflow_port: Port,
    lossflow_port: Port,
    report_outflow_achieved: bool,
    report_lossflow_achieved: bool,
}

impl UncontrolledSourceState {
    /// Build from a strictly time-increasing supply profile ending with an
    /// end marker (supply drops to zero from that time on).
    pub fn new(stream: Stream, profile: Vec<LoadItem>) -> Self {
        assert!(!profile.is_empty(), "supply profile must not be empty");
        assert!(
            profile.last().unwrap().is_end(),
            "supply profile must end with an end marker"
        );
        Self {
            stream,
            time: 0,
            profile,
            index: 0,
            applied: false,
            supply: 0.0,
            outflow_port: Port::new(),
            lossflow_port: Port::new(),
            report_outflow_achieved: false,
            report_lossflow_achieved: false,
        }
    }

    /// The stream this source supplies.
    pub fn stream(&self) -> &Stream {
        &self.stream
    }

    /// Currently available supply.
    pub fn supply(&self) -> Flow {
        self.supply
    }

    /// Currently achieved (delivered) outflow.
    pub fn achieved(&self) -> Flow {
        self.outflow_port.achieved
    }

    /// Currently requested outflow.
    pub fn requested(&self) -> Flow {
        self.outflow_port.requested
    }

    /// Currently achieved lossflow (bounded by the lossflow request).
    pub fn lossflow_achieved(&self) -> Flow {
        self.lossflow_port.achieved
    }

    /// Currently requested lossflow.
    pub fn lossflow_requested(&self) -> Flow {
        self.lossflow_port.requested
    }

    /// Currently curtailed supply (supply in excess of what's requested),
    /// irrespective of whether anything downstream asked to meter it.
    pub fn lossflow(&self) -> Flow {
        (self.supply - self.outflow_port.achieved).max(0.0)
    }

    fn has_pending_report(&self) -> bool {
        self.report_outflow_achieved || self.report_lossflow_achieved
    }

    fn recompute_against_supply(&mut self) {
        let (p, upd) = self
            .outflow_port
            .with_requested_and_available(self.outflow_port.requested, self.supply, self.time);
        self.outflow_port = p;
        self.report_outflow_achieved |= upd.send_achieved;

        let (lp, upd_loss) = self
            .lossflow_port
            .with_requested_and_available(self.lossflow_port.requested, self.lossflow(), self.time);
        self.lossflow_port = lp;
        self.report_lossflow_achieved |= upd_loss.send_achieved;
    }
}

impl AtomicModel for UncontrolledSourceState {
    fn ta(&self) -> TimeAdvance {
        if self.has_pending_report() {
            return TimeAdvance::At(0);
        }
        if !self.applied {
            return TimeAdvance::At(0);
        }
        if self.index + 1 < self.profile.len() {
            TimeAdvance::At(self.profile[self.index + 1].time - self.time)
        } else {
            TimeAdvance::Infinity
        }
    }

    fn lambda(&self) -> Vec<PortValue> {
        let mut out = Vec::with_capacity(2);
        if self.report_outflow_achieved {
            out.push(PortValue::new(
                PortId::OUTPORT_OUTFLOW_ACHIEVED,
                self.outflow_port.achieved,
            ));
        }
        if self.report_lossflow_achieved {
            out.push(PortValue::new(
                PortId::OUTPORT_LOSSFLOW_ACHIEVED,
                self.lossflow_port.achieved,
            ));
        }
        out
    }

    fn delta_int(&mut self) {
        if self.has_pending_report() {
            self.report_outflow_achieved = false;
            self.report_lossflow_achieved = false;
            return;
        }
        if !self.applied {
            self.applied = true;
        } else {
            self.index += 1;
        }
        self.time = self.profile[self.index].time;
        self.supply = self.profile[self.index].rate.unwrap_or(0.0);
        self.recompute_against_supply();
    }

    fn delta_ext(&mut self, elapsed: RealTime, xs: &[PortValue]) {
        self.time += elapsed;
        for pv in xs {
            if pv.port == PortId::INPORT_OUTFLOW_REQUEST {
                let (p, upd) =
                    self.outflow_port
                        .with_requested_and_available(pv.value, self.supply, self.time);
                self.outflow_port = p;
                self.report_outflow_achieved |= upd.send_achieved;
            } else if pv.port == PortId::INPORT_LOSSFLOW_REQUEST {
                let (lp, upd) = self
                    .lossflow_port
                    .with_requested_and_available(pv.value, self.lossflow(), self.time);
                self.lossflow_port = lp;
                self.report_lossflow_achieved |= upd.send_achieved;
            }
        }
        self.recompute_against_supply();
    }

    fn time(&self) -> RealTime {
        self.time
    }

    fn flow_state(&self) -> FlowState {
        FlowState {
            inflow: self.supply,
            outflow: self.outflow_port.achieved,
            lossflow: self.lossflow(),
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

    fn flat(rate: Flow) -> Vec<LoadItem> {
        vec![LoadItem::new(0, rate), LoadItem::end(10)]
    }

    #[test]
    fn uncoupled_curtailment_is_reported_without_a_lossflow_request() {
        let mut s = UncontrolledSourceState::new(Stream::new("solar"), flat(100.0));
        s.delta_int();
        s.delta_ext(0, &[PortValue::new(PortId::INPORT_OUTFLOW_REQUEST, 40.0)]);
        assert_eq!(s.achieved(), 40.0);
        assert_eq!(s.lossflow(), 60.0);
        assert_eq!(s.lossflow_achieved(), 0.0);
    }

    #[test]
    fn lossflow_request_reports_achieved_curtailment() {
        let mut s = UncontrolledSourceState::new(Stream::new("solar"), flat(100.0));
        s.delta_int();
        s.delta_ext(
            0,
            &[
                PortValue::new(PortId::INPORT_OUTFLOW_REQUEST, 40.0),
                PortValue::new(PortId::INPORT_LOSSFLOW_REQUEST, 60.0),
            ],
        );
        assert_eq!(s.lossflow_achieved(), 60.0);
        assert!(s.lambda().iter().any(|pv| pv.port == PortId::OUTPORT_LOSSFLOW_ACHIEVED));
    }

    #[test]
    fn lossflow_request_above_curtailment_is_clamped() {
        let mut s = UncontrolledSourceState::new(Stream::new("solar"), flat(100.0));
        s.delta_int();
        s.delta_ext(
            0,
            &[
                PortValue::new(PortId::INPORT_OUTFLOW_REQUEST, 90.0),
                PortValue::new(PortId::INPORT_LOSSFLOW_REQUEST, 50.0),
            ],
        );
        assert_eq!(s.lossflow(), 10.0);
        assert_eq!(s.lossflow_achieved(), 10.0);
    }
}
