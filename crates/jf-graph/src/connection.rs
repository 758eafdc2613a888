//! Connections between outputs and inputs.
//!
//! A connection is stored on its input as the id of the feeding output, which
//! makes fan-in of one structural: an input has room for exactly one source.
//! Fan-out is unrestricted.

use jf_core::{InputId, OutputId, SystemId, ValueType};
use tracing::debug;

use crate::error::{GraphError, GraphResult};
use crate::graph::Graph;

/// A directed edge from one output to one input of the same type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connection {
    pub source: OutputId,
    pub dest: InputId,
    pub value_type: ValueType,
}

impl Graph {
    /// Connect `output` to `input`.
    ///
    /// Fails, leaving the graph untouched, if the input is already connected,
    /// the port types differ, or the edge would close a cycle.
    pub fn connect(&mut self, output: OutputId, input: InputId) -> GraphResult<()> {
        let out_port = self.output(output)?;
        let in_port = self.input(input)?;

        if let Some(existing) = in_port.source {
            return Err(GraphError::AlreadyConnected { input, existing });
        }
        if out_port.value_type != in_port.value_type {
            return Err(GraphError::TypeMismatch {
                output,
                input,
                output_type: out_port.value_type,
                input_type: in_port.value_type,
            });
        }

        let from = out_port.owner;
        let to = in_port.owner;
        if from == to || self.reaches(to, from) {
            return Err(GraphError::Cycle { from, to });
        }

        if let Some(Some(port)) = self.inputs.get_mut(input.slot()) {
            port.source = Some(output);
        }
        self.revision += 1;
        debug!(%output, %input, "connected");
        Ok(())
    }

    /// Remove the connection feeding `input`, returning its former source.
    pub fn disconnect(&mut self, input: InputId) -> GraphResult<OutputId> {
        let port = self
            .inputs
            .get_mut(input.slot())
            .and_then(Option::as_mut)
            .ok_or(GraphError::UnknownInput(input))?;
        let source = port.source.take().ok_or(GraphError::NotConnected { input })?;
        self.revision += 1;
        debug!(output = %source, %input, "disconnected");
        Ok(source)
    }

    /// All connections, ordered by destination input.
    pub fn connections(&self) -> impl Iterator<Item = Connection> + '_ {
        self.inputs().filter_map(|port| {
            port.source.map(|source| Connection {
                source,
                dest: port.id,
                value_type: port.value_type,
            })
        })
    }

    /// Whether `to` is reachable from `from` along data and kinematics edges.
    pub fn reaches(&self, from: SystemId, to: SystemId) -> bool {
        let succ = self.successor_lists();
        let mut visited = vec![false; self.systems.len()];
        let mut stack = vec![from];
        while let Some(current) = stack.pop() {
            if current == to {
                return true;
            }
            let Some(seen) = visited.get_mut(current.slot()) else {
                continue;
            };
            if std::mem::replace(seen, true) {
                continue;
            }
            if let Some(next) = succ.get(current.slot()) {
                stack.extend(next.iter().copied());
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::SystemSpec;

    fn scalar_node(graph: &mut Graph, name: &str) -> (SystemId, InputId, OutputId) {
        let id = graph
            .add_system(
                name,
                SystemSpec::new()
                    .input("in", ValueType::Scalar)
                    .output("out", ValueType::Scalar),
            )
            .unwrap();
        (
            id,
            graph.input_by_name(id, "in").unwrap(),
            graph.output_by_name(id, "out").unwrap(),
        )
    }

    #[test]
    fn connect_and_disconnect() {
        let mut graph = Graph::new();
        let (_, _, a_out) = scalar_node(&mut graph, "a");
        let (_, b_in, _) = scalar_node(&mut graph, "b");

        graph.connect(a_out, b_in).unwrap();
        assert_eq!(graph.source_of(b_in), Some(a_out));
        assert_eq!(graph.connections().count(), 1);

        assert_eq!(graph.disconnect(b_in).unwrap(), a_out);
        assert_eq!(graph.source_of(b_in), None);
        assert!(matches!(
            graph.disconnect(b_in),
            Err(GraphError::NotConnected { .. })
        ));
    }

    #[test]
    fn fan_out_is_unrestricted() {
        let mut graph = Graph::new();
        let (_, _, a_out) = scalar_node(&mut graph, "a");
        let (_, b_in, _) = scalar_node(&mut graph, "b");
        let (_, c_in, _) = scalar_node(&mut graph, "c");
        graph.connect(a_out, b_in).unwrap();
        graph.connect(a_out, c_in).unwrap();
        assert_eq!(graph.source_of(b_in), Some(a_out));
        assert_eq!(graph.source_of(c_in), Some(a_out));
        assert_eq!(graph.connections().count(), 2);
    }

    #[test]
    fn second_producer_for_input_is_rejected() {
        let mut graph = Graph::new();
        let (_, _, a_out) = scalar_node(&mut graph, "a");
        let (_, _, b_out) = scalar_node(&mut graph, "b");
        let (_, c_in, _) = scalar_node(&mut graph, "c");
        graph.connect(a_out, c_in).unwrap();
        let rev = graph.revision();

        let err = graph.connect(b_out, c_in).unwrap_err();
        assert_eq!(
            err,
            GraphError::AlreadyConnected {
                input: c_in,
                existing: a_out
            }
        );
        assert_eq!(graph.source_of(c_in), Some(a_out));
        assert_eq!(graph.revision(), rev);
    }

    #[test]
    fn type_mismatch_is_rejected() {
        let mut graph = Graph::new();
        let a = graph
            .add_system("a", SystemSpec::new().output("q", ValueType::Joints { dof: 7 }))
            .unwrap();
        let b = graph
            .add_system("b", SystemSpec::new().input("q", ValueType::Joints { dof: 4 }))
            .unwrap();
        let out = graph.output_by_name(a, "q").unwrap();
        let inp = graph.input_by_name(b, "q").unwrap();

        let err = graph.connect(out, inp).unwrap_err();
        assert!(matches!(err, GraphError::TypeMismatch { .. }));
        assert_eq!(graph.connections().count(), 0);
    }

    #[test]
    fn cycles_are_rejected() {
        let mut graph = Graph::new();
        let (_, a_in, a_out) = scalar_node(&mut graph, "a");
        let (_, b_in, b_out) = scalar_node(&mut graph, "b");
        let (_, c_in, c_out) = scalar_node(&mut graph, "c");
        graph.connect(a_out, b_in).unwrap();
        graph.connect(b_out, c_in).unwrap();

        assert!(matches!(
            graph.connect(c_out, a_in),
            Err(GraphError::Cycle { .. })
        ));
        assert!(matches!(
            graph.connect(a_out, a_in),
            Err(GraphError::Cycle { .. })
        ));
        assert_eq!(graph.connections().count(), 2);
    }

    #[test]
    fn kinematics_edges_count_toward_cycles() {
        let mut graph = Graph::new();
        let kin = graph
            .add_system(
                "kin",
                SystemSpec::kinematics_producer(2).output("q", ValueType::Joints { dof: 2 }),
            )
            .unwrap();
        let consumer = graph
            .add_system(
                "consumer",
                SystemSpec::new()
                    .with_kinematics(2)
                    .input("q", ValueType::Joints { dof: 2 }),
            )
            .unwrap();
        assert!(graph.reaches(kin, consumer));
        assert!(!graph.reaches(consumer, kin));

        let q_out = graph.output_by_name(kin, "q").unwrap();
        let q_in = graph.input_by_name(consumer, "q").unwrap();
        graph.connect(q_out, q_in).unwrap();
    }
}
