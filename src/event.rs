//! Event queue for the scheduler (C5): a priority-ordered multimap from
//! absolute time to the components due to transition then, with ties
//! broken by insertion order (§4.5: "two events with equal real time are
//! ordered by logical_tick").
//!
//! A binary heap keyed on `(time, tick)` with lazy deletion: a component's
//! due time changes on almost every step, so entries are invalidated rather
//! than removed and stale entries are skipped on pop, avoiding a heap
//! rebuild every step.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use crate::types::{ComponentId, RealTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Entry {
    time: RealTime,
    tick: u64,
    component: ComponentId,
}

/// Tracks each component's next due instant and yields them in time order.
///
/// A component is only ever present with its most recent scheduled time;
/// calling [`EventQueue::schedule`] again (or [`EventQueue::cancel`])
/// supersedes any earlier entry. Stale heap entries left behind by a
/// superseding call are discarded lazily when they reach the front.
#[derive(Debug, Default)]
pub struct EventQueue {
    heap: BinaryHeap<Reverse<Entry>>,
    current: HashMap<ComponentId, (RealTime, u64)>,
    next_tick: u64,
}

impl EventQueue {
    /// An empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule (or reschedule) `component`'s next internal transition at
    /// `time`, absolute.
    pub fn schedule(&mut self, component: ComponentId, time: RealTime) {
        let tick = self.next_tick;
        self.next_tick += 1;
        self.current.insert(component, (time, tick));
        self.heap.push(Reverse(Entry { time, tick, component }));
    }

    /// Remove `component` from the queue; it was moved to `TimeAdvance::Infinity`.
    pub fn cancel(&mut self, component: ComponentId) {
        self.current.remove(&component);
    }

    fn is_live(&self, e: &Entry) -> bool {
        self.current.get(&e.component) == Some(&(e.time, e.tick))
    }

    fn drop_stale_top(&mut self) {
        while let Some(Reverse(e)) = self.heap.peek() {
            if self.is_live(e) {
                break;
            }
            self.heap.pop();
        }
    }

    /// The earliest scheduled time, if any component is pending.
    pub fn peek_time(&mut self) -> Option<RealTime> {
        self.drop_stale_top();
        self.heap.peek().map(|Reverse(e)| e.time)
    }

    /// Pop every component scheduled at the minimum time, along with that
    /// time. `None` if the queue is empty.
    pub fn pop_imminent(&mut self) -> Option<(RealTime, Vec<ComponentId>)> {
        self.drop_stale_top();
        let Reverse(first) = self.heap.pop()?;
        self.current.remove(&first.component);
        let t = first.time;
        let mut imminent = vec![first.component];
        loop {
            self.drop_stale_top();
            match self.heap.peek() {
                Some(Reverse(e)) if e.time == t => {
                    let Reverse(e) = self.heap.pop().unwrap();
                    self.current.remove(&e.component);
                    imminent.push(e.component);
                }
                _ => break,
            }
        }
        Some((t, imminent))
    }

    /// Number of components with a live scheduled time.
    pub fn len(&self) -> usize {
        self.current.len()
    }

    /// `true` if no component has a scheduled time.
    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use petgraph::stable_graph::NodeIndex;

    fn id(i: u32) -> ComponentId {
        NodeIndex::new(i as usize)
    }

    #[test]
    fn pops_in_time_order() {
        let mut q = EventQueue::new();
        q.schedule(id(0), 10);
        q.schedule(id(1), 5);
        q.schedule(id(2), 5);
        let (t, mut due) = q.pop_imminent().unwrap();
        due.sort();
        assert_eq!(t, 5);
        assert_eq!(due, vec![id(1), id(2)]);
        let (t, due) = q.pop_imminent().unwrap();
        assert_eq!(t, 10);
        assert_eq!(due, vec![id(0)]);
        assert!(q.is_empty());
    }

    #[test]
    fn reschedule_supersedes_stale_entry() {
        let mut q = EventQueue::new();
        q.schedule(id(0), 100);
        q.schedule(id(0), 3);
        let (t, due) = q.pop_imminent().unwrap();
        assert_eq!(t, 3);
        assert_eq!(due, vec![id(0)]);
        assert!(q.is_empty());
    }

    #[test]
    fn cancel_removes_without_firing() {
        let mut q = EventQueue::new();
        q.schedule(id(0), 1);
        q.cancel(id(0));
        assert!(q.pop_imminent().is_none());
    }
}
