//! Graph construction and validation errors.
//!
//! All of these are structural: they are raised while the graph is being
//! assembled and are fatal to assembly. A failing operation leaves the graph
//! unchanged.

use jf_core::{InputId, OutputId, SystemId, ValueKind, ValueType};
use thiserror::Error;

pub type GraphResult<T> = Result<T, GraphError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("{0} does not exist")]
    UnknownSystem(SystemId),

    #[error("{0} does not exist")]
    UnknownInput(InputId),

    #[error("{0} does not exist")]
    UnknownOutput(OutputId),

    #[error("No system named '{name}'")]
    NoSuchSystem { name: String },

    #[error("System '{system}' has no input '{port}'")]
    NoSuchInput { system: String, port: String },

    #[error("System '{system}' has no output '{port}'")]
    NoSuchOutput { system: String, port: String },

    #[error("A system named '{name}' already exists")]
    DuplicateSystemName { name: String },

    #[error("System '{system}' declares port '{port}' twice")]
    DuplicatePortName { system: String, port: String },

    #[error("{input} is already connected to {existing}")]
    AlreadyConnected { input: InputId, existing: OutputId },

    #[error("{input} is not connected")]
    NotConnected { input: InputId },

    #[error("Cannot connect {output} ({output_type}) to {input} ({input_type}): types differ")]
    TypeMismatch {
        output: OutputId,
        input: InputId,
        output_type: ValueType,
        input_type: ValueType,
    },

    #[error("Port '{port}' carries {found}, not {expected}")]
    KindMismatch {
        port: String,
        expected: ValueKind,
        found: ValueType,
    },

    #[error("Connecting {from} -> {to} would create a cycle")]
    Cycle { from: SystemId, to: SystemId },

    #[error("System '{name}' cannot be a second kinematics producer ({existing} already is)")]
    SecondProducer { name: String, existing: SystemId },

    #[error("Kinematics producer '{name}' must not declare inputs")]
    ProducerHasInputs { name: String },

    #[error("Kinematics producer '{name}' must declare its degrees of freedom")]
    ProducerWithoutDof { name: String },

    #[error("System '{system}' expects {found} DOF but the kinematics producer has {expected}")]
    DofMismatch {
        system: String,
        expected: usize,
        found: usize,
    },

    #[error("System '{system}' needs kinematics but the graph has no kinematics producer")]
    MissingKinematicsProducer { system: String },

    #[error("System '{system}' is still connected")]
    SystemInUse { system: String },
}
