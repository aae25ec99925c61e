//! Controllable source (§4.3.2): reports delivered outflow clamped to an
//! optional maximum, with no internal dynamics beyond reporting.

use super::AtomicModel;
use crate::flow::FlowState;
use crate::port::Port;
use crate::types::{ComponentError, ComponentId, Flow, PortId, PortValue, RealTime, Stream, TimeAdvance};

/// State for a [`super::Model::Source`].
#[derive(Debug, Clone, PartialEq)]
pub struct SourceState {
    pub(crate) stream: Stream,
    time: RealTime,
    max_outflow: Option<Flow>,
    port: Port,
    report_outflow_achieved: bool,
}

impl SourceState {
    /// Build a source with an optional capacity limit (`None` = unlimited).
    pub fn new(stream: Stream, max_outflow: Option<Flow>) -> Self {
        Self {
            stream,
            time: 0,
            max_outflow,
            port: Port::new(),
            report_outflow_achieved: false,
        }
    }

    /// The stream this source supplies.
    pub fn stream(&self) -> &Stream {
        &self.stream
    }

    /// The source's capacity, if any.
    pub fn max_outflow(&self) -> Option<Flow> {
        self.max_outflow
    }

    /// Currently achieved outflow.
    pub fn achieved(&self) -> Flow {
        self.port.achieved
    }

    /// Currently requested outflow.
    pub fn requested(&self) -> Flow {
        self.port.requested
    }
}

impl AtomicModel for SourceState {
    fn ta(&self) -> TimeAdvance {
        if self.report_outflow_achieved {
            TimeAdvance::At(0)
        } else {
            TimeAdvance::Infinity
        }
    }

    fn lambda(&self) -> Vec<PortValue> {
        if self.report_outflow_achieved {
            vec![PortValue::new(
                PortId::OUTPORT_OUTFLOW_ACHIEVED,
                self.port.achieved,
            )]
        } else {
            vec![]
        }
    }

    fn delta_int(&mut self) {
        self.report_outflow_achieved = false;
    }

    fn delta_ext(&mut self, elapsed: RealTime, xs: &[PortValue]) {
        self.time += elapsed;
        for pv in xs {
            if pv.port == PortId::INPORT_OUTFLOW_REQUEST {
                let avail = self.max_outflow.unwrap_or(Flow::INFINITY);
                let (p, upd) = self.port.with_requested_and_available(pv.value, avail, self.time);
                self.port = p;
                self.report_outflow_achieved |= upd.send_achieved;
            }
        }
    }

    fn time(&self) -> RealTime {
        self.time
    }

    fn flow_state(&self) -> FlowState {
        FlowState {
            outflow: self.port.achieved,
            ..Default::default()
        }
    }

    fn check_conservation(&self, _id: ComponentId) -> Result<(), ComponentError> {
        // A source is a pure origin: nothing flows in, so there is nothing
        // to balance outflow against.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlimited_source_meets_any_request() {
        let mut s = SourceState::new(Stream::new("diesel"), None);
        s.delta_ext(0, &[PortValue::new(PortId::INPORT_OUTFLOW_REQUEST, 1000.0)]);
        assert_eq!(s.achieved(), 1000.0);
        assert!(s.report_outflow_achieved);
    }

    #[test]
    fn limited_source_clamps() {
        let mut s = SourceState::new(Stream::new("diesel"), Some(50.0));
        s.delta_ext(0, &[PortValue::new(PortId::INPORT_OUTFLOW_REQUEST, 1000.0)]);
        assert_eq!(s.achieved(), 50.0);
    }
}
