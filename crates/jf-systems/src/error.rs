//! Errors raised by a system while it operates.
//!
//! Apart from [`SystemError::Fault`], every variant aborts only the current
//! tick. Port indices are local to the failing system; the executor resolves
//! them to names when it reports.

use jf_core::{CoreError, ValueKind, ValueType};
use jf_kinematics::KinematicsError;
use thiserror::Error;

pub type SystemResult<T> = Result<T, SystemError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SystemError {
    #[error("Input #{input} has no value this tick")]
    UndefinedInput { input: usize },

    #[error("Output #{output} was not written this tick")]
    UndefinedOutput { output: usize },

    #[error("No input #{index}")]
    NoSuchInput { index: usize },

    #[error("No output #{index}")]
    NoSuchOutput { index: usize },

    #[error("Input #{input} carries {found}, read as {expected}")]
    InputType {
        input: usize,
        expected: ValueKind,
        found: ValueType,
    },

    #[error("Output #{output} is declared {expected}, written {found}")]
    OutputType {
        output: usize,
        expected: ValueType,
        found: ValueType,
    },

    #[error("Output #{output} is declared {expected}, requested as {requested}")]
    OutputKind {
        output: usize,
        expected: ValueType,
        requested: ValueKind,
    },

    #[error("System has no kinematics input")]
    NoKinematics,

    #[error("Kinematics state is from tick {produced}, current tick is {tick}")]
    KinematicsStale { tick: u64, produced: u64 },

    #[error("Only the kinematics producer may write kinematics state")]
    NotProducer,

    #[error("Port layout does not match the system: {what}")]
    Layout { what: &'static str },

    #[error(transparent)]
    Kinematics(#[from] KinematicsError),

    #[error(transparent)]
    Core(#[from] CoreError),

    /// Unrecoverable. The executor stops instead of retrying next tick.
    #[error("Fault: {message}")]
    Fault { message: String },
}

impl SystemError {
    pub fn fault(message: impl Into<String>) -> Self {
        SystemError::Fault {
            message: message.into(),
        }
    }

    /// True for errors that must stop execution rather than abort one tick.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SystemError::Fault { .. })
    }
}
