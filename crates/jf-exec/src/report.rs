//! Reports sent to the supervising thread.

use std::time::Duration;

use jf_core::{SystemId, TickStamp};
use jf_graph::GraphError;
use jf_systems::SystemError;

#[derive(Debug, Clone, PartialEq)]
pub enum ExecReport {
    /// A system failed; the tick's outputs were discarded.
    TickAborted {
        tick: u64,
        system: SystemId,
        error: SystemError,
    },
    /// A tick took longer than its period.
    Overrun { stamp: TickStamp, period: Duration },
    /// An unrecoverable failure. Execution stops after this report.
    Faulted {
        tick: u64,
        system: SystemId,
        error: SystemError,
    },
    /// A graph edit or `finalize` was rejected. The graph is unchanged and
    /// the same error was returned to the caller.
    Structural { op: &'static str, error: GraphError },
    /// Execution reached the terminal state.
    Stopped { ticks: u64 },
}

impl ExecReport {
    pub fn tick(&self) -> Option<u64> {
        match self {
            ExecReport::TickAborted { tick, .. } | ExecReport::Faulted { tick, .. } => Some(*tick),
            ExecReport::Overrun { stamp, .. } => Some(stamp.tick),
            ExecReport::Structural { .. } | ExecReport::Stopped { .. } => None,
        }
    }
}
