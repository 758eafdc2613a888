//! jf-graph: topology layer for jointflow.
//!
//! Provides:
//! - Arena storage for systems and their typed ports (integer handles, no pointers)
//! - Connections as (output, input) index pairs with single-producer,
//!   exact-type and acyclicity checks
//! - Deterministic topological scheduling of the systems a manager is
//!   responsible for, including the implicit kinematics-producer edges
//!
//! The graph holds structure only; behaviour lives in `jf-systems`.
//!
//! # Example
//!
//! ```
//! use jf_core::ValueType;
//! use jf_graph::{Graph, SystemSpec};
//!
//! let mut graph = Graph::new();
//! let a = graph
//!     .add_system("a", SystemSpec::new().output("out", ValueType::Scalar))
//!     .unwrap();
//! let b = graph
//!     .add_system("b", SystemSpec::new().input("in", ValueType::Scalar))
//!     .unwrap();
//! let out = graph.output_by_name(a, "out").unwrap();
//! let inp = graph.input_by_name(b, "in").unwrap();
//! graph.connect(out, inp).unwrap();
//!
//! assert_eq!(graph.schedule(&[b]).unwrap(), vec![a, b]);
//! ```

pub mod connection;
pub mod error;
pub mod graph;
pub mod schedule;
pub mod spec;

pub use connection::Connection;
pub use error::{GraphError, GraphResult};
pub use graph::{Graph, InputPort, OutputPort, SystemNode};
pub use schedule::Schedule;
pub use spec::{PortSpec, SystemRole, SystemSpec};
