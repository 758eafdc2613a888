//! The capability interface every node implements.

use jf_graph::SystemSpec;

use crate::error::SystemResult;
use crate::io::SystemIo;

/// A node of the control graph.
///
/// `spec` declares ports and capabilities once, when the system is added to
/// a graph. `operate` runs exactly once per tick on the real-time thread and
/// must not block or do I/O. An output it leaves unwritten aborts the tick.
pub trait System: Send {
    fn spec(&self) -> SystemSpec;

    fn operate(&mut self, io: &mut SystemIo<'_>) -> SystemResult<()>;

    /// Called when execution stops. Systems holding integrators or filters
    /// clear them here.
    fn reset(&mut self) {}
}

impl<S: System + ?Sized> System for Box<S> {
    fn spec(&self) -> SystemSpec {
        (**self).spec()
    }

    fn operate(&mut self, io: &mut SystemIo<'_>) -> SystemResult<()> {
        (**self).operate(io)
    }

    fn reset(&mut self) {
        (**self).reset()
    }
}
