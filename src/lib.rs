#![deny(missing_debug_implementations)]

//! # erin-core
//!
//! A flow-balanced DEVS (Discrete EVent System Specification) kernel for
//! energy resilience analysis of small networks of flow-handling
//! components: sources, loads, converters, storage, switches, limiters,
//! movers and muxers.
//!
//! ## Main concepts
//!
//! A [`network::Network`] wires up [`model::Model`] instances (one state
//! machine per component, see [`model`]) with [`network::Coupling`]s between
//! their ports (see [`port::Port`]). A [`scheduler::Scheduler`] drives the
//! network's models to a fixed point at every event instant, preserving the
//! flow-conservation invariant in [`flow`] at every step. The
//! [`scenario::ScenarioRunner`] ties a network, a reliability schedule, and
//! a run duration together and produces [`stats::ScenarioResults`].
//!
//! None of TOML parsing, CSV writing, Graphviz rendering, CLI wiring, or
//! random-number generation live in this crate: the kernel consumes a
//! [`dist::DistributionSystem`] trait object and precomputed
//! [`types::TimeState`] schedules, and hands its results back as plain data.
//!
//! ## Example
//!
//! ```
//! use erin_core::prelude::*;
//!
//! let mut net = Network::new();
//! let stream = Stream::new("electricity");
//! let source = net.add_model(Model::source(stream.clone(), None));
//! let limit = net.add_model(Model::flow_limits(stream.clone(), 0.0, 50.0));
//! let load = net.add_model(Model::load(
//!     stream,
//!     vec![
//!         LoadItem::new(0, 160.0),
//!         LoadItem::new(1, 80.0),
//!         LoadItem::new(2, 40.0),
//!         LoadItem::end(3),
//!     ],
//! ));
//! net.couple(source, PortId::OUTPORT_OUTFLOW_ACHIEVED, limit, PortId::INPORT_INFLOW_ACHIEVED)
//!     .unwrap();
//! net.couple(limit, PortId::OUTPORT_INFLOW_REQUEST, source, PortId::INPORT_OUTFLOW_REQUEST)
//!     .unwrap();
//! net.couple(limit, PortId::OUTPORT_OUTFLOW_ACHIEVED, load, PortId::INPORT_INFLOW_ACHIEVED)
//!     .unwrap();
//! net.couple(load, PortId::OUTPORT_INFLOW_REQUEST, limit, PortId::INPORT_OUTFLOW_REQUEST)
//!     .unwrap();
//!
//! let mut sched = Scheduler::new(net, 4, 4 * 3);
//! sched.run_to(4).unwrap();
//! ```

pub mod dist;
pub mod event;
pub mod flow;
pub mod model;
pub mod network;
pub mod port;
pub mod prelude;
pub mod recorder;
pub mod scenario;
pub mod scheduler;
pub mod spec;
pub mod stats;
pub mod types;

#[cfg(test)]
mod test;
