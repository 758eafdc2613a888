use jf_core::SystemId;
use jf_graph::GraphError;
use jf_kinematics::KinematicsError;
use jf_systems::SystemError;
use thiserror::Error;

use crate::manager::ManagerState;

pub type ExecResult<T> = Result<T, ExecError>;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    System(#[from] SystemError),

    #[error(transparent)]
    Kinematics(#[from] KinematicsError),

    #[error("Cannot {op} while {state}")]
    InvalidState {
        op: &'static str,
        state: ManagerState,
    },

    #[error("{system} has no implementation attached")]
    Detached { system: SystemId },

    #[error("Invalid configuration: {what}")]
    Config { what: String },

    #[error("Failed to parse configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Failed to spawn the real-time thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("The real-time thread panicked")]
    WorkerPanicked,
}
