//! Network graph (C4): wires atomic models together with couplings and
//! routes each model's outputs to its destinations.
//!
//! A `petgraph` directed graph of models joined by typed port edges: an
//! edge `(src, src_port) -> (dst, dst_port)` delivers whatever
//! [`crate::types::PortValue`] `src` emits on `src_port` to `dst_port` on
//! `dst`.

use petgraph::stable_graph::StableDiGraph;
use petgraph::visit::EdgeRef;

use crate::model::Model;
use crate::types::{BadInputError, ComponentId, PortId, SimulationError};

/// A directed link between two model ports on the same stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Coupling {
    /// Port on the source model that `src_port` outputs are read from.
    pub src_port: PortId,
    /// Port on the destination model the value is delivered to.
    pub dst_port: PortId,
}

type Graph = StableDiGraph<Model, Coupling, crate::types::IndexType>;

/// A wired set of atomic models. Building one never fails partway: every
/// [`Network::couple`] call either succeeds or leaves the network exactly
/// as it was.
#[derive(Debug, Default)]
pub struct Network {
    graph: Graph,
}

impl Network {
    /// An empty network.
    pub fn new() -> Self {
        Self { graph: Graph::default() }
    }

    /// Add a model, returning its id.
    pub fn add_model(&mut self, model: Model) -> ComponentId {
        self.graph.add_node(model)
    }

    /// Look up a model by id.
    pub fn model(&self, id: ComponentId) -> Option<&Model> {
        self.graph.node_weight(id)
    }

    /// Look up a model by id, mutably.
    pub fn model_mut(&mut self, id: ComponentId) -> Option<&mut Model> {
        self.graph.node_weight_mut(id)
    }

    /// Every model id currently in the network.
    pub fn component_ids(&self) -> impl Iterator<Item = ComponentId> + '_ {
        self.graph.node_indices()
    }

    /// Number of models in the network.
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    /// `true` if the network has no models.
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Couple `src`'s `src_port` output to `dst`'s `dst_port` input.
    ///
    /// Rejects unknown component ids, port ids the model doesn't define,
    /// and (§4.4) couplings that join ports on different streams.
    pub fn couple(
        &mut self,
        src: ComponentId,
        src_port: PortId,
        dst: ComponentId,
        dst_port: PortId,
    ) -> Result<(), SimulationError> {
        let src_stream = self
            .graph
            .node_weight(src)
            .ok_or(SimulationError::ComponentNotFound(src))?
            .port_stream(src_port)
            .ok_or(SimulationError::BadCoupling(src_port, src))?;
        let dst_stream = self
            .graph
            .node_weight(dst)
            .ok_or(SimulationError::ComponentNotFound(dst))?
            .port_stream(dst_port)
            .ok_or(SimulationError::BadCoupling(dst_port, dst))?;
        if src_stream.name != dst_stream.name {
            return Err(BadInputError::StreamMismatch(src_stream.name.clone(), dst_stream.name.clone()).into());
        }
        self.graph.add_edge(src, dst, Coupling { src_port, dst_port });
        Ok(())
    }

    /// Every `(destination, destination port)` coupled to `(src, src_port)`.
    pub(crate) fn route(&self, src: ComponentId, src_port: PortId) -> Vec<(ComponentId, PortId)> {
        self.graph
            .edges(src)
            .filter(|e| e.weight().src_port == src_port)
            .map(|e| (e.target(), e.weight().dst_port))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Stream;

    #[test]
    fn couples_matching_streams() {
        let mut net = Network::new();
        let stream = Stream::new("electricity");
        let source = net.add_model(Model::source(stream.clone(), None));
        let load = net.add_model(Model::load(stream, vec![crate::types::LoadItem::end(0)]));
        net.couple(source, PortId::OUTPORT_OUTFLOW_ACHIEVED, load, PortId::INPORT_INFLOW_ACHIEVED)
            .unwrap();
        let routed = net.route(source, PortId::OUTPORT_OUTFLOW_ACHIEVED);
        assert_eq!(routed, vec![(load, PortId::INPORT_INFLOW_ACHIEVED)]);
    }

    #[test]
    fn rejects_stream_mismatch() {
        let mut net = Network::new();
        let source = net.add_model(Model::source(Stream::new("electricity"), None));
        let load = net.add_model(Model::load(Stream::new("diesel"), vec![crate::types::LoadItem::end(0)]));
        let err = net
            .couple(source, PortId::OUTPORT_OUTFLOW_ACHIEVED, load, PortId::INPORT_INFLOW_ACHIEVED)
            .unwrap_err();
        assert!(matches!(err, SimulationError::BadInput(BadInputError::StreamMismatch(_, _))));
    }

    #[test]
    fn rejects_undefined_port() {
        let mut net = Network::new();
        let source = net.add_model(Model::source(Stream::new("electricity"), None));
        let load = net.add_model(Model::load(Stream::new("electricity"), vec![crate::types::LoadItem::end(0)]));
        let err = net
            .couple(source, PortId::OUTPORT_WASTEFLOW_ACHIEVED, load, PortId::INPORT_INFLOW_ACHIEVED)
            .unwrap_err();
        assert!(matches!(err, SimulationError::BadCoupling(_, _)));
    }
}
