use std::path::PathBuf;

use jf_exec::ExecError;
use jf_graph::GraphError;
use jf_kinematics::KinematicsError;
use jf_systems::SystemError;
use thiserror::Error;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse demo configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid demo configuration: {what}")]
    Config { what: String },

    #[error("Failed to encode output: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    System(#[from] SystemError),

    #[error(transparent)]
    Kinematics(#[from] KinematicsError),

    #[error("Execution faulted at tick {tick}: {message}")]
    Faulted { tick: u64, message: String },
}
