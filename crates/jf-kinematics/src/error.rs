//! Error types for kinematics production.

use jf_core::CoreError;
use thiserror::Error;

pub type KinematicsResult<T> = Result<T, KinematicsError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum KinematicsError {
    #[error("Expected {expected} joints, got {found}")]
    DofMismatch { expected: usize, found: usize },

    #[error("{what} has shape {found:?}, expected {expected:?}")]
    Shape {
        what: &'static str,
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("Invalid kinematic chain: {what}")]
    InvalidChain { what: &'static str },

    #[error("Joint sensor failed: {message}")]
    Sensor { message: String },

    #[error(transparent)]
    Core(#[from] CoreError),
}
