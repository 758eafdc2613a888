//! Deterministic execution order.
//!
//! The active set is the upstream closure of the systems a manager is
//! responsible for. It is ordered with Kahn's algorithm; among ready systems
//! the kinematics producer goes first and the rest by ascending id, so the same
//! topology always yields the same order.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use jf_core::SystemId;
use tracing::debug;

use crate::error::{GraphError, GraphResult};
use crate::graph::Graph;

/// A topological order over the active set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    order: Vec<SystemId>,
}

impl Schedule {
    /// Derive the order for `roots` and everything upstream of them.
    pub fn derive(graph: &Graph, roots: &[SystemId]) -> GraphResult<Self> {
        Ok(Self {
            order: graph.schedule(roots)?,
        })
    }

    pub fn order(&self) -> &[SystemId] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn position(&self, system: SystemId) -> Option<usize> {
        self.order.iter().position(|s| *s == system)
    }
}

impl Graph {
    /// Topologically ordered upstream closure of `roots`.
    pub fn schedule(&self, roots: &[SystemId]) -> GraphResult<Vec<SystemId>> {
        let active = self.upstream_closure(roots)?;

        let n = self.systems.len();
        let mut in_degree = vec![0_usize; n];
        let mut successors: Vec<Vec<SystemId>> = vec![Vec::new(); n];
        for &system in &active {
            for pred in self.predecessors(system)? {
                in_degree[system.slot()] += 1;
                successors[pred.slot()].push(system);
            }
        }

        let producer = self.producer;
        let key = |id: SystemId| Reverse((Some(id) != producer, id));

        let mut ready: BinaryHeap<Reverse<(bool, SystemId)>> = active
            .iter()
            .copied()
            .filter(|id| in_degree[id.slot()] == 0)
            .map(key)
            .collect();

        let mut order = Vec::with_capacity(active.len());
        while let Some(Reverse((_, system))) = ready.pop() {
            order.push(system);
            for &next in &successors[system.slot()] {
                let degree = &mut in_degree[next.slot()];
                *degree -= 1;
                if *degree == 0 {
                    ready.push(key(next));
                }
            }
        }

        // Connect refuses cycles, so this only trips on a corrupted arena.
        if let Some(stuck) = active.iter().copied().find(|id| !order.contains(id)) {
            return Err(GraphError::Cycle {
                from: stuck,
                to: stuck,
            });
        }

        debug!(systems = order.len(), "derived schedule");
        Ok(order)
    }

    /// `roots` plus every system they transitively depend on, in id order.
    fn upstream_closure(&self, roots: &[SystemId]) -> GraphResult<Vec<SystemId>> {
        let mut in_set = vec![false; self.systems.len()];
        let mut stack = Vec::with_capacity(roots.len());
        for &root in roots {
            self.system(root)?;
            stack.push(root);
        }
        while let Some(system) = stack.pop() {
            if std::mem::replace(&mut in_set[system.slot()], true) {
                continue;
            }
            stack.extend(self.predecessors(system)?);
        }
        Ok(in_set
            .iter()
            .enumerate()
            .filter(|(_, inside)| **inside)
            .map(|(slot, _)| SystemId::from_index(slot as u32))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::SystemSpec;
    use jf_core::ValueType;
    use proptest::prelude::*;

    fn node(graph: &mut Graph, name: &str, inputs: usize) -> SystemId {
        let mut spec = SystemSpec::new().output("out", ValueType::Scalar);
        for i in 0..inputs {
            spec = spec.input(format!("in{i}"), ValueType::Scalar);
        }
        graph.add_system(name, spec).unwrap()
    }

    fn wire(graph: &mut Graph, from: SystemId, to: SystemId, port: usize) {
        let out = graph.output_by_name(from, "out").unwrap();
        let inp = graph.input_at(to, port).unwrap();
        graph.connect(out, inp).unwrap();
    }

    #[test]
    fn chain_is_ordered() {
        let mut graph = Graph::new();
        // Added in reverse so id order disagrees with data order.
        let c = node(&mut graph, "c", 1);
        let b = node(&mut graph, "b", 1);
        let a = node(&mut graph, "a", 0);
        wire(&mut graph, a, b, 0);
        wire(&mut graph, b, c, 0);

        assert_eq!(graph.schedule(&[c]).unwrap(), vec![a, b, c]);
    }

    #[test]
    fn only_upstream_systems_are_active() {
        let mut graph = Graph::new();
        let a = node(&mut graph, "a", 0);
        let b = node(&mut graph, "b", 1);
        let unrelated = node(&mut graph, "unrelated", 0);
        wire(&mut graph, a, b, 0);

        let order = graph.schedule(&[b]).unwrap();
        assert_eq!(order, vec![a, b]);
        assert!(!order.contains(&unrelated));
        assert!(graph.schedule(&[]).unwrap().is_empty());
    }

    #[test]
    fn ties_break_by_id_and_are_stable() {
        let mut graph = Graph::new();
        let x = node(&mut graph, "x", 0);
        let y = node(&mut graph, "y", 0);
        let sink = node(&mut graph, "sink", 2);
        wire(&mut graph, y, sink, 0);
        wire(&mut graph, x, sink, 1);

        let first = graph.schedule(&[sink]).unwrap();
        assert_eq!(first, vec![x, y, sink]);
        for _ in 0..10 {
            assert_eq!(graph.schedule(&[sink]).unwrap(), first);
        }
    }

    #[test]
    fn producer_runs_first() {
        let mut graph = Graph::new();
        let source = node(&mut graph, "source", 0);
        let consumer = graph
            .add_system(
                "consumer",
                SystemSpec::new()
                    .with_kinematics(3)
                    .input("in", ValueType::Scalar),
            )
            .unwrap();
        let kin = graph
            .add_system("kin", SystemSpec::kinematics_producer(3))
            .unwrap();
        wire(&mut graph, source, consumer, 0);

        assert_eq!(graph.schedule(&[consumer]).unwrap(), vec![kin, source, consumer]);
    }

    #[test]
    fn kinematics_consumer_without_producer_fails() {
        let mut graph = Graph::new();
        let consumer = graph
            .add_system("consumer", SystemSpec::new().with_kinematics(7))
            .unwrap();
        assert!(matches!(
            graph.schedule(&[consumer]),
            Err(GraphError::MissingKinematicsProducer { .. })
        ));
    }

    #[test]
    fn rederiving_picks_up_new_edges() {
        let mut graph = Graph::new();
        let a = node(&mut graph, "a", 0);
        let b = node(&mut graph, "b", 1);
        let schedule = Schedule::derive(&graph, &[b]).unwrap();
        assert_eq!(schedule.len(), 1);

        wire(&mut graph, a, b, 0);
        let schedule = Schedule::derive(&graph, &[b]).unwrap();
        assert_eq!(schedule.position(a), Some(0));
        assert_eq!(schedule.position(b), Some(1));
    }

    #[test]
    fn unknown_root_is_rejected() {
        let graph = Graph::new();
        assert!(matches!(
            graph.schedule(&[SystemId::from_index(4)]),
            Err(GraphError::UnknownSystem(_))
        ));
    }

    proptest! {
        // Random DAGs: edges only go from lower to higher creation index,
        // which guarantees acyclicity, then the schedule must respect them.
        #[test]
        fn producers_precede_consumers(
            n in 2_usize..12,
            edges in prop::collection::vec((0_usize..12, 0_usize..12), 0..40),
        ) {
            let mut graph = Graph::new();
            let ids: Vec<SystemId> = (0..n).map(|i| node(&mut graph, &format!("s{i}"), n)).collect();
            let mut wired = Vec::new();
            for (a, b) in edges {
                let (from, to) = (a % n, b % n);
                if from >= to {
                    continue;
                }
                let out = graph.output_by_name(ids[from], "out").unwrap();
                let inp = graph.input_at(ids[to], from).unwrap();
                if graph.connect(out, inp).is_ok() {
                    wired.push((ids[from], ids[to]));
                }
            }

            let order = graph.schedule(&ids).unwrap();
            prop_assert_eq!(order.len(), n);
            for (from, to) in wired {
                let pf = order.iter().position(|s| *s == from).unwrap();
                let pt = order.iter().position(|s| *s == to).unwrap();
                prop_assert!(pf < pt);
            }
        }
    }
}
