//! Scheduler (C5): the single-threaded cooperative DEVS event loop.
//!
//! Each step advances to the minimum next event time across every model,
//! computes the imminent models' outputs from the state as it stood at the
//! start of the step, routes them, and applies exactly one transition
//! (`delta_int`, `delta_ext`, or `delta_conf`) per touched model before
//! moving on. Suspension never happens mid-model (§4.5, §5).

use std::collections::{HashMap, HashSet};

use log::{debug, trace, warn};

use crate::event::EventQueue;
use crate::model::AtomicModel;
use crate::network::Network;
use crate::types::{ComponentId, PortValue, RealTime, SimulationError, TimeAdvance};

/// Drives a [`Network`] to a fixed point at every event instant.
#[derive(Debug)]
pub struct Scheduler {
    net: Network,
    queue: EventQueue,
    max_no_advance: usize,
    no_advance_run: usize,
    last_time: Option<RealTime>,
}

impl Scheduler {
    /// Build a scheduler over `net`. `max_no_advance` bounds consecutive
    /// zero-time steps before a run is declared stuck; §4.5 suggests
    /// `4 * |models|` as a starting point. `scenario_duration` is accepted
    /// and recorded for callers that want it, but [`Scheduler::run_to`]
    /// takes its own stop time explicitly.
    pub fn new(mut net: Network, max_no_advance: usize, scenario_duration: RealTime) -> Self {
        let _ = scenario_duration;
        let mut queue = EventQueue::new();
        for id in net.component_ids().collect::<Vec<_>>() {
            reschedule(&mut net, &mut queue, id);
        }
        Self {
            net,
            queue,
            max_no_advance,
            no_advance_run: 0,
            last_time: None,
        }
    }

    /// Borrow the underlying network (e.g. to read final model states).
    pub fn network(&self) -> &Network {
        &self.net
    }

    /// Borrow the underlying network mutably.
    pub fn network_mut(&mut self) -> &mut Network {
        &mut self.net
    }

    /// The next scheduled event time, if any model has one.
    pub fn next_time(&mut self) -> Option<RealTime> {
        self.queue.peek_time()
    }

    /// Run event instants until the next one would exceed `until`, or no
    /// model has a pending event.
    pub fn run_to(&mut self, until: RealTime) -> Result<(), SimulationError> {
        while let Some(t_next) = self.queue.peek_time() {
            if t_next > until {
                break;
            }
            self.step(t_next)?;
        }
        Ok(())
    }

    /// Run exactly one event instant, returning its time, or `None` if the
    /// queue is empty.
    pub fn step_once(&mut self) -> Result<Option<RealTime>, SimulationError> {
        match self.queue.peek_time() {
            Some(t_next) => {
                self.step(t_next)?;
                Ok(Some(t_next))
            }
            None => Ok(None),
        }
    }

    fn step(&mut self, t_next: RealTime) -> Result<(), SimulationError> {
        let (_, imminent) = self.queue.pop_imminent().expect("peeked time must be poppable");
        trace!("event instant t={t_next}, {} imminent model(s)", imminent.len());

        let mut outbox: HashMap<ComponentId, Vec<PortValue>> = HashMap::new();
        for &src in &imminent {
            let model = self.net.model(src).ok_or(SimulationError::ComponentNotFound(src))?;
            for pv in model.lambda() {
                for (dst, dst_port) in self.net.route(src, pv.port) {
                    outbox.entry(dst).or_default().push(PortValue::new(dst_port, pv.value));
                }
            }
        }
        let inbox: HashMap<ComponentId, Vec<PortValue>> =
            outbox.into_iter().map(|(dst, pvs)| (dst, merge_same_port(pvs))).collect();

        let imminent_set: HashSet<ComponentId> = imminent.iter().copied().collect();
        let mut touched: HashSet<ComponentId> = imminent_set.clone();
        touched.extend(inbox.keys().copied());

        let advanced = self.last_time != Some(t_next);

        for id in touched {
            let prev_time = self
                .net
                .model(id)
                .ok_or(SimulationError::ComponentNotFound(id))?
                .time();
            let elapsed = t_next - prev_time;
            let is_imminent = imminent_set.contains(&id);
            let xs = inbox.get(&id);

            {
                let model = self.net.model_mut(id).ok_or(SimulationError::ComponentNotFound(id))?;
                match (is_imminent, xs) {
                    (true, Some(xs)) => model.delta_conf(xs),
                    (true, None) => model.delta_int(),
                    (false, Some(xs)) => model.delta_ext(elapsed, xs),
                    (false, None) => unreachable!("touched model is neither imminent nor fed"),
                }
            }

            self.net
                .model(id)
                .ok_or(SimulationError::ComponentNotFound(id))?
                .check_conservation(id)?;
            reschedule(&mut self.net, &mut self.queue, id);
        }

        if advanced {
            self.no_advance_run = 0;
        } else {
            self.no_advance_run += 1;
            if self.no_advance_run > self.max_no_advance {
                warn!("stuck simulation at t={t_next}: {} consecutive zero-time advances", self.no_advance_run);
                return Err(SimulationError::Stuck(self.max_no_advance));
            }
        }
        self.last_time = Some(t_next);
        debug!("t={t_next} settled, {} model(s) transitioned", touched_count(&imminent_set, &inbox));
        Ok(())
    }
}

fn touched_count(imminent: &HashSet<ComponentId>, inbox: &HashMap<ComponentId, Vec<PortValue>>) -> usize {
    let mut all: HashSet<ComponentId> = imminent.clone();
    all.extend(inbox.keys().copied());
    all.len()
}

fn reschedule(net: &mut Network, queue: &mut EventQueue, id: ComponentId) {
    let Some(model) = net.model(id) else { return };
    match model.ta() {
        TimeAdvance::At(dt) => queue.schedule(id, model.time() + dt),
        TimeAdvance::Infinity => queue.cancel(id),
    }
}

/// Sums port values that target the same port, matching the contract that
/// `delta_ext` receives at most one value per port (§5: "order of messages
/// within one destination is insignificant; δ_ext sums same-port values").
fn merge_same_port(mut pvs: Vec<PortValue>) -> Vec<PortValue> {
    pvs.sort_by_key(|pv| pv.port.0);
    let mut merged: Vec<PortValue> = Vec::with_capacity(pvs.len());
    for pv in pvs {
        match merged.last_mut() {
            Some(last) if last.port == pv.port => last.value += pv.value,
            _ => merged.push(pv),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Model;
    use crate::types::{LoadItem, PortId, Stream};

    #[test]
    fn settles_unlimited_source_to_step_load() {
        let mut net = Network::new();
        let stream = Stream::new("electricity");
        let source = net.add_model(Model::source(stream.clone(), None));
        let load = net.add_model(Model::load(
            stream,
            vec![LoadItem::new(0, 100.0), LoadItem::end(10)],
        ));
        net.couple(source, PortId::OUTPORT_OUTFLOW_ACHIEVED, load, PortId::INPORT_INFLOW_ACHIEVED)
            .unwrap();
        net.couple(load, PortId::OUTPORT_INFLOW_REQUEST, source, PortId::INPORT_OUTFLOW_REQUEST)
            .unwrap();

        let mut sched = Scheduler::new(net, 16, 5);
        sched.run_to(5).unwrap();

        match sched.network().model(load).unwrap() {
            Model::Load(s) => assert_eq!(s.achieved(), 100.0),
            _ => panic!("expected load"),
        }
    }

    #[test]
    fn merge_same_port_sums_values() {
        let merged = merge_same_port(vec![
            PortValue::new(PortId::INPORT_INFLOW_ACHIEVED, 3.0),
            PortValue::new(PortId::INPORT_INFLOW_ACHIEVED, 4.0),
        ]);
        assert_eq!(merged, vec![PortValue::new(PortId::INPORT_INFLOW_ACHIEVED, 7.0)]);
    }

    #[test]
    fn flow_limits_clamps_source_through_the_scheduler() {
        let mut net = Network::new();
        let stream = Stream::new("electricity");
        let source = net.add_model(Model::source(stream.clone(), None));
        let limit = net.add_model(Model::flow_limits(stream.clone(), 0.0, 50.0));
        let load = net.add_model(Model::load(stream, vec![LoadItem::new(0, 160.0), LoadItem::end(10)]));
        net.couple(source, PortId::OUTPORT_OUTFLOW_ACHIEVED, limit, PortId::INPORT_INFLOW_ACHIEVED)
            .unwrap();
        net.couple(limit, PortId::OUTPORT_INFLOW_REQUEST, source, PortId::INPORT_OUTFLOW_REQUEST)
            .unwrap();
        net.couple(limit, PortId::OUTPORT_OUTFLOW_ACHIEVED, load, PortId::INPORT_INFLOW_ACHIEVED)
            .unwrap();
        net.couple(load, PortId::OUTPORT_INFLOW_REQUEST, limit, PortId::INPORT_OUTFLOW_REQUEST)
            .unwrap();

        let mut sched = Scheduler::new(net, 16, 5);
        sched.run_to(5).unwrap();

        match sched.network().model(load).unwrap() {
            Model::Load(s) => assert_eq!(s.achieved(), 50.0),
            _ => panic!("expected load"),
        }
    }
}
