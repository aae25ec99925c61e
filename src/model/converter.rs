//! Converter (§4.3.5): applies a conversion function between an inflow and
//! outflow stream, with an optional lossflow tap and an unaccounted
//! wasteflow remainder.
//!
//! `conversion` covers the three conversion-function shapes a converter can
//! carry (constant efficiency, a tabulated monotone function, or a user
//! closure) as one [`Efficiency`] enum.

use std::fmt;
use std::sync::Arc;

use super::AtomicModel;
use crate::flow::FlowState;
use crate::port::Port;
use crate::types::{
    flow_eq, ComponentError, ComponentId, Flow, PortId, PortValue, RealTime, Stream, TimeAdvance,
};

/// A table of `(inflow, outflow)` samples, strictly increasing in both
/// columns, used to interpolate a monotone conversion function and its
/// inverse.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionTable {
    points: Vec<(Flow, Flow)>,
}

impl ConversionTable {
    /// Build from samples sorted ascending by inflow; every outflow must
    /// also be strictly increasing so the function has a well-defined
    /// inverse.
    pub fn new(points: Vec<(Flow, Flow)>) -> Self {
        assert!(points.len() >= 2, "conversion table needs at least two points");
        for w in points.windows(2) {
            assert!(
                w[1].0 > w[0].0 && w[1].1 > w[0].1,
                "conversion table must be strictly monotone in both inflow and outflow"
            );
        }
        Self { points }
    }

    /// `f_out_from_in`.
    pub fn out_from_in(&self, x: Flow) -> Flow {
        Self::interpolate(&self.points, x)
    }

    /// `f_in_from_out`, the inverse.
    pub fn in_from_out(&self, y: Flow) -> Flow {
        let swapped: Vec<(Flow, Flow)> = self.points.iter().map(|(a, b)| (*b, *a)).collect();
        Self::interpolate(&swapped, y)
    }

    fn interpolate(points: &[(Flow, Flow)], v: Flow) -> Flow {
        let lo = points[0];
        let hi = points[points.len() - 1];
        let v = v.max(lo.0).min(hi.0);
        for w in points.windows(2) {
            if v <= w[1].0 {
                if flow_eq(w[1].0, w[0].0) {
                    return w[0].1;
                }
                let t = (v - w[0].0) / (w[1].0 - w[0].0);
                return w[0].1 + t * (w[1].1 - w[0].1);
            }
        }
        hi.1
    }
}

/// The inflow-to-outflow conversion a [`ConverterState`] applies.
#[derive(Clone)]
pub enum Efficiency {
    /// A fixed fraction `outflow = eta * inflow`, `eta in (0, 1]`.
    Constant(Flow),
    /// A tabulated monotone function and its inverse.
    Tabulated(ConversionTable),
    /// A user-supplied forward/inverse pair. Not serializable; prefer
    /// [`Efficiency::Constant`] or [`Efficiency::Tabulated`] when
    /// determinism across runs/persistence matters.
    Function {
        /// `f_out_from_in`.
        f_out_from_in: Arc<dyn Fn(Flow) -> Flow + Send + Sync>,
        /// `f_in_from_out`.
        f_in_from_out: Arc<dyn Fn(Flow) -> Flow + Send + Sync>,
    },
}

impl Efficiency {
    /// A constant-efficiency conversion, `eta in (0, 1]`.
    pub fn constant(eta: Flow) -> Self {
        assert!(eta > 0.0 && eta <= 1.0, "constant efficiency must be in (0, 1]");
        Efficiency::Constant(eta)
    }

    /// A tabulated monotone conversion.
    pub fn tabulated(table: ConversionTable) -> Self {
        Efficiency::Tabulated(table)
    }

    /// A user-closure conversion; caller is responsible for the pair being
    /// mutual inverses within tolerance.
    pub fn function(
        f_out_from_in: Arc<dyn Fn(Flow) -> Flow + Send + Sync>,
        f_in_from_out: Arc<dyn Fn(Flow) -> Flow + Send + Sync>,
    ) -> Self {
        Efficiency::Function {
            f_out_from_in,
            f_in_from_out,
        }
    }

    fn out_from_in(&self, x: Flow) -> Flow {
        match self {
            Efficiency::Constant(eta) => x * eta,
            Efficiency::Tabulated(t) => t.out_from_in(x),
            Efficiency::Function { f_out_from_in, .. } => f_out_from_in(x),
        }
    }

    fn in_from_out(&self, y: Flow) -> Flow {
        match self {
            Efficiency::Constant(eta) => y / eta,
            Efficiency::Tabulated(t) => t.in_from_out(y),
            Efficiency::Function { f_in_from_out, .. } => f_in_from_out(y),
        }
    }
}

impl fmt::Debug for Efficiency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Efficiency::Constant(eta) => f.debug_tuple("Constant").field(eta).finish(),
            Efficiency::Tabulated(t) => f.debug_tuple("Tabulated").field(t).finish(),
            Efficiency::Function { .. } => f.write_str("Function(..)"),
        }
    }
}

impl PartialEq for Efficiency {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Efficiency::Constant(a), Efficiency::Constant(b)) => flow_eq(*a, *b),
            (Efficiency::Tabulated(a), Efficiency::Tabulated(b)) => a == b,
            (
                Efficiency::Function { f_out_from_in: a, .. },
                Efficiency::Function { f_out_from_in: b, .. },
            ) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// State for a [`super::Model::Converter`].
#[derive(Debug, Clone, PartialEq)]
pub struct ConverterState {
    pub(crate) inflow_stream: Stream,
    pub(crate) outflow_stream: Stream,
    pub(crate) lossflow_stream: Option<Stream>,
    time: RealTime,
    conversion: Efficiency,
    inflow_port: Port,
    outflow_port: Port,
    lossflow_port: Port,
    wasteflow_achieved: Flow,
    report_inflow_request: bool,
    report_outflow_achieved: bool,
    report_lossflow_achieved: bool,
    report_wasteflow_achieved: bool,
}

impl ConverterState {
    /// Build a converter; `lossflow_stream` is `None` when the remainder is
    /// pure wasteflow with no tapped lossflow stream.
    pub fn new(
        inflow_stream: Stream,
        outflow_stream: Stream,
        lossflow_stream: Option<Stream>,
        conversion: Efficiency,
    ) -> Self {
        Self {
            inflow_stream,
            outflow_stream,
            lossflow_stream,
            time: 0,
            conversion,
            inflow_port: Port::new(),
            outflow_port: Port::new(),
            lossflow_port: Port::new(),
            wasteflow_achieved: 0.0,
            report_inflow_request: false,
            report_outflow_achieved: false,
            report_lossflow_achieved: false,
            report_wasteflow_achieved: false,
        }
    }

    /// The inflow stream.
    pub fn inflow_stream(&self) -> &Stream {
        &self.inflow_stream
    }

    /// The outflow stream.
    pub fn outflow_stream(&self) -> &Stream {
        &self.outflow_stream
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

    /// Currently achieved lossflow (bounded by the lossflow request).
    pub fn lossflow_achieved(&self) -> Flow {
        self.lossflow_port.achieved
    }

    /// Currently requested lossflow.
    pub fn lossflow_requested(&self) -> Flow {
        self.lossflow_port.requested
    }

    /// Currently achieved wasteflow (the unaccounted remainder).
    pub fn wasteflow_achieved(&self) -> Flow {
        self.wasteflow_achieved
    }

    fn has_pending_report(&self) -> bool {
        self.report_inflow_request
            || self.report_outflow_achieved
            || self.report_lossflow_achieved
            || self.report_wasteflow_achieved
    }

    fn recompute_loss_waste(&mut self) {
        let available = (self.inflow_port.achieved - self.outflow_port.achieved).max(0.0);
        let loss = available.min(self.lossflow_port.requested);
        let (lp, upd_loss) = self.lossflow_port.with_achieved(loss, self.time);
        self.lossflow_port = lp;
        self.report_lossflow_achieved |= upd_loss.send_achieved;

        let waste = (available - loss).max(0.0);
        if !flow_eq(waste, self.wasteflow_achieved) {
            self.wasteflow_achieved = waste;
            self.report_wasteflow_achieved = true;
        }
    }
}

impl AtomicModel for ConverterState {
    fn ta(&self) -> TimeAdvance {
        if self.has_pending_report() {
            TimeAdvance::At(0)
        } else {
            TimeAdvance::Infinity
        }
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
        if self.report_lossflow_achieved {
            out.push(PortValue::new(
                PortId::OUTPORT_LOSSFLOW_ACHIEVED,
                self.lossflow_port.achieved,
            ));
        }
        if self.report_wasteflow_achieved {
            out.push(PortValue::new(
                PortId::OUTPORT_WASTEFLOW_ACHIEVED,
                self.wasteflow_achieved,
            ));
        }
        out
    }

    fn delta_int(&mut self) {
        self.report_inflow_request = false;
        self.report_outflow_achieved = false;
        self.report_lossflow_achieved = false;
        self.report_wasteflow_achieved = false;
    }

    fn delta_ext(&mut self, elapsed: RealTime, xs: &[PortValue]) {
        self.time += elapsed;
        for pv in xs {
            if pv.port == PortId::INPORT_OUTFLOW_REQUEST {
                let (op, upd_out) = self.outflow_port.with_requested(pv.value, self.time);
                self.outflow_port = op;
                self.report_outflow_achieved |= upd_out.send_achieved;

                let in_req = self.conversion.in_from_out(pv.value);
                let (ip, upd_in) = self.inflow_port.with_requested(in_req, self.time);
                self.inflow_port = ip;
                self.report_inflow_request |= upd_in.send_request;
            } else if pv.port == PortId::INPORT_LOSSFLOW_REQUEST {
                let (lp, upd_loss) = self.lossflow_port.with_requested(pv.value, self.time);
                self.lossflow_port = lp;
                self.report_lossflow_achieved |= upd_loss.send_achieved;
            } else if pv.port == PortId::INPORT_INFLOW_ACHIEVED {
                let (ip, upd_in) = self.inflow_port.with_achieved(pv.value, self.time);
                self.inflow_port = ip;
                self.report_inflow_request |= upd_in.send_request;

                let out_val = self.conversion.out_from_in(self.inflow_port.achieved);
                let (op, upd_out) = self.outflow_port.with_achieved(out_val, self.time);
                self.outflow_port = op;
                self.report_outflow_achieved |= upd_out.send_achieved;
            }
        }
        self.recompute_loss_waste();
    }

    fn time(&self) -> RealTime {
        self.time
    }

    fn flow_state(&self) -> FlowState {
        FlowState {
            inflow: self.inflow_port.achieved,
            outflow: self.outflow_port.achieved,
            lossflow: self.lossflow_port.achieved,
            wasteflow: self.wasteflow_achieved,
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
    fn constant_efficiency_round_trip() {
        let mut c = ConverterState::new(
            Stream::new("diesel"),
            Stream::new("electricity"),
            None,
            Efficiency::constant(0.5),
        );
        c.delta_ext(0, &[PortValue::new(PortId::INPORT_OUTFLOW_REQUEST, 80.0)]);
        assert_eq!(c.inflow_port.requested, 160.0);
        c.delta_int();
        c.delta_ext(0, &[PortValue::new(PortId::INPORT_INFLOW_ACHIEVED, 160.0)]);
        assert_eq!(c.outflow_achieved(), 80.0);
        assert_eq!(c.wasteflow_achieved(), 0.0);
    }

    #[test]
    fn shortfall_becomes_wasteflow_without_lossflow_stream() {
        let mut c = ConverterState::new(
            Stream::new("diesel"),
            Stream::new("electricity"),
            None,
            Efficiency::constant(0.5),
        );
        c.delta_ext(0, &[PortValue::new(PortId::INPORT_OUTFLOW_REQUEST, 80.0)]);
        c.delta_int();
        c.delta_ext(0, &[PortValue::new(PortId::INPORT_INFLOW_ACHIEVED, 100.0)]);
        assert_eq!(c.outflow_achieved(), 50.0);
        assert_eq!(c.lossflow_achieved(), 0.0);
        assert_eq!(c.wasteflow_achieved(), 50.0);
    }

    #[test]
    fn lossflow_request_is_drawn_before_wasteflow() {
        let mut c = ConverterState::new(
            Stream::new("natural_gas"),
            Stream::new("electricity"),
            Some(Stream::new("waste_heat")),
            Efficiency::constant(0.5),
        );
        c.delta_ext(
            0,
            &[
                PortValue::new(PortId::INPORT_OUTFLOW_REQUEST, 50.0),
                PortValue::new(PortId::INPORT_LOSSFLOW_REQUEST, 30.0),
            ],
        );
        c.delta_int();
        c.delta_ext(0, &[PortValue::new(PortId::INPORT_INFLOW_ACHIEVED, 100.0)]);
        assert_eq!(c.outflow_achieved(), 50.0);
        assert_eq!(c.lossflow_achieved(), 30.0);
        assert_eq!(c.wasteflow_achieved(), 20.0);
    }
}
