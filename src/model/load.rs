//! Load (§4.3.1): steps through a piecewise-constant load profile, always
//! requesting the current breakpoint's rate from upstream.

use super::AtomicModel;
use crate::flow::FlowState;
use crate::port::Port;
use crate::types::{
    ComponentError, ComponentId, LoadItem, PortId, PortValue, RealTime, Stream, TimeAdvance,
};

/// State for a [`super::Model::Load`].
#[derive(Debug, Clone, PartialEq)]
pub struct LoadState {
    pub(crate) stream: Stream,
    time: RealTime,
    profile: Vec<LoadItem>,
    index: usize,
    applied: bool,
    port: Port,
    report_inflow_request: bool,
}

impl LoadState {
    /// Build a new load from a strictly time-increasing profile whose last
    /// item is an end marker.
    pub fn new(stream: Stream, profile: Vec<LoadItem>) -> Self {
        assert!(!profile.is_empty(), "load profile must not be empty");
        assert!(profile.last().unwrap().is_end(), "load profile must end with an end marker");
        Self {
            stream,
            time: 0,
            profile,
            index: 0,
            applied: false,
            port: Port::new(),
            report_inflow_request: false,
        }
    }

    /// The stream this load draws.
    pub fn stream(&self) -> &Stream {
        &self.stream
    }

    /// The currently requested rate.
    pub fn requested(&self) -> f64 {
        self.port.requested
    }

    /// The currently achieved (delivered) rate.
    pub fn achieved(&self) -> f64 {
        self.port.achieved
    }
}

impl AtomicModel for LoadState {
    fn ta(&self) -> TimeAdvance {
        if self.report_inflow_request {
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
        if self.report_inflow_request {
            vec![PortValue::new(
                PortId::OUTPORT_INFLOW_REQUEST,
                self.port.requested,
            )]
        } else {
            vec![]
        }
    }

    fn delta_int(&mut self) {
        if self.report_inflow_request {
            self.report_inflow_request = false;
            return;
        }
        if !self.applied {
            self.applied = true;
        } else {
            self.index += 1;
        }
        self.time = self.profile[self.index].time;
        let rate = self.profile[self.index].rate.unwrap_or(0.0);
        let (p, upd) = self.port.with_requested(rate, self.time);
        self.port = p;
        self.report_inflow_request = upd.send_request;
    }

    fn delta_ext(&mut self, elapsed: RealTime, xs: &[PortValue]) {
        self.time += elapsed;
        for pv in xs {
            if pv.port == PortId::INPORT_INFLOW_ACHIEVED {
                let (p, _upd) = self.port.with_achieved(pv.value, self.time);
                self.port = p;
            }
        }
    }

    fn time(&self) -> RealTime {
        self.time
    }

    fn flow_state(&self) -> FlowState {
        FlowState {
            inflow: self.port.achieved,
            ..Default::default()
        }
    }

    fn check_conservation(&self, _id: ComponentId) -> Result<(), ComponentError> {
        // Load is a pure sink: inflow is consumed whole, there is no
        // outflow/storeflow/lossflow/wasteflow split to balance against.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> Vec<LoadItem> {
        vec![
            LoadItem::new(0, 160.0),
            LoadItem::new(1, 80.0),
            LoadItem::new(2, 40.0),
            LoadItem::end(3),
        ]
    }

    #[test]
    fn steps_through_breakpoints() {
        let mut load = LoadState::new(Stream::new("electricity"), profile());
        assert_eq!(load.ta(), TimeAdvance::At(0));
        load.delta_int(); // apply breakpoint 0
        assert_eq!(load.requested(), 160.0);
        assert_eq!(load.ta(), TimeAdvance::At(0)); // pending report
        load.delta_int(); // clear report
        assert_eq!(load.ta(), TimeAdvance::At(1));

        load.delta_int(); // apply breakpoint 1
        assert_eq!(load.requested(), 80.0);
        load.delta_int(); // clear report
        assert_eq!(load.ta(), TimeAdvance::At(1));

        load.delta_int(); // apply breakpoint 2
        assert_eq!(load.requested(), 40.0);
        load.delta_int(); // clear report
        assert_eq!(load.ta(), TimeAdvance::At(1));

        load.delta_int(); // apply end marker
        assert_eq!(load.requested(), 0.0);
        load.delta_int(); // clear report
        assert_eq!(load.ta(), TimeAdvance::Infinity);
    }
}
