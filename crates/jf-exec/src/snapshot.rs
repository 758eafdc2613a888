//! Published tick results, readable from any thread.

use std::sync::Arc;

use jf_core::{DoubleBuffer, OutputId, PortValue, Value};
use jf_kinematics::KinematicsState;

use crate::port::Output;

/// Every output value and the kinematics state of the last completed tick.
///
/// Outputs of systems outside the active set, or of a graph that has not
/// completed a tick yet, are `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub tick: u64,
    pub values: Vec<Option<Value>>,
    pub kinematics: Option<KinematicsState>,
}

impl Snapshot {
    pub fn value(&self, output: OutputId) -> Option<&Value> {
        self.values.get(output.slot()).and_then(Option::as_ref)
    }

    pub fn get<T: PortValue>(&self, output: Output<T>) -> Option<&T> {
        self.value(output.id()).and_then(Value::get::<T>)
    }
}

/// Read handle on the executor's published snapshot.
///
/// Reads never block the real-time thread: if a read is still in progress
/// when the next tick completes, that tick's publish is skipped instead.
#[derive(Debug, Clone)]
pub struct SnapshotReader {
    buffer: Arc<DoubleBuffer<Snapshot>>,
}

impl SnapshotReader {
    pub(crate) fn new(buffer: Arc<DoubleBuffer<Snapshot>>) -> Self {
        Self { buffer }
    }

    /// Tick of the latest published snapshot; 0 before the first one.
    pub fn tick(&self) -> u64 {
        self.buffer.read(|snapshot| snapshot.tick)
    }

    /// Number of snapshots published so far.
    pub fn version(&self) -> u64 {
        self.buffer.version()
    }

    /// Run `f` against the latest snapshot. Keep `f` short.
    pub fn read<R>(&self, f: impl FnOnce(&Snapshot) -> R) -> R {
        self.buffer.read(f)
    }

    pub fn get<T: PortValue>(&self, output: Output<T>) -> Option<T> {
        self.buffer.read(|snapshot| snapshot.get(output).cloned())
    }

    pub fn kinematics(&self) -> Option<KinematicsState> {
        self.buffer.read(|snapshot| snapshot.kinematics.clone())
    }

    pub fn load(&self) -> Snapshot {
        self.buffer.load()
    }
}
