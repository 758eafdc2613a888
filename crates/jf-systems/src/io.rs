//! The view a system gets of the graph while it operates.
//!
//! The executor keeps every output's value in one flat buffer indexed by
//! output slot. Because a system's outputs occupy a contiguous range, the
//! buffer can be split into the part before that range, the range itself and
//! the part after: the system gets shared access to everything it may read
//! and exclusive access to exactly what it may write.

use std::ops::Range;

use jf_core::{PortValue, Value, ValueType};
use jf_kinematics::KinematicsState;

use crate::error::{SystemError, SystemResult};
use crate::slot::{InputSlot, OutputSlot};

/// One output's value plus the tick that wrote it.
///
/// A cell is defined for tick `n` only if it was written during tick `n`;
/// values left over from earlier ticks read as undefined. Ticks start at 1,
/// so a fresh cell is never defined. The value storage outlives the ticks:
/// writes go into it in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueCell {
    value: Option<Value>,
    tick: u64,
}

impl ValueCell {
    /// An undefined cell whose storage is already shaped for `value_type`.
    pub fn new(value_type: ValueType) -> Self {
        Self {
            value: Some(Value::zeros(value_type)),
            tick: 0,
        }
    }

    /// The value if it was written during `tick`.
    pub fn get(&self, tick: u64) -> Option<&Value> {
        if self.tick == tick {
            self.value.as_ref()
        } else {
            None
        }
    }

    /// Last written value, whatever tick wrote it.
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Whether the storage already has the shape of `value_type`.
    pub fn is_shaped(&self, value_type: ValueType) -> bool {
        self.value
            .as_ref()
            .is_some_and(|value| value.value_type() == value_type)
    }

    pub fn set(&mut self, value: Value, tick: u64) {
        self.value = Some(value);
        self.tick = tick;
    }

    /// Mark the cell written during `tick` and hand out its storage, shaped
    /// as `value_type`. Only a cell that was never shaped, or was left with
    /// other dimensions by a faulty write, is reallocated.
    pub fn write(&mut self, value_type: ValueType, tick: u64) -> &mut Value {
        self.tick = tick;
        let value = self.value.get_or_insert_with(|| Value::zeros(value_type));
        if value.value_type() != value_type {
            *value = Value::zeros(value_type);
        }
        value
    }
}

/// How a system may touch the tick's kinematics state.
#[derive(Debug)]
pub enum KinematicsAccess<'a> {
    None,
    Shared(&'a KinematicsState),
    /// Reserved to the kinematics producer.
    Exclusive(&'a mut KinematicsState),
}

pub struct SystemIo<'a> {
    tick: u64,
    sources: &'a [Option<usize>],
    output_types: &'a [ValueType],
    own_start: usize,
    before: &'a [ValueCell],
    own: &'a mut [ValueCell],
    after: &'a [ValueCell],
    kinematics: KinematicsAccess<'a>,
}

impl<'a> SystemIo<'a> {
    /// `sources[i]` is the output slot feeding input `i`, or `None` if the
    /// input is unconnected. `outputs` is the system's own slot range in
    /// `cells` and must have one entry per `output_types`.
    pub fn new(
        tick: u64,
        sources: &'a [Option<usize>],
        output_types: &'a [ValueType],
        cells: &'a mut [ValueCell],
        outputs: Range<usize>,
        kinematics: KinematicsAccess<'a>,
    ) -> SystemResult<Self> {
        if outputs.start > outputs.end || outputs.end > cells.len() {
            return Err(SystemError::Layout {
                what: "output range outside the value buffer",
            });
        }
        if outputs.len() != output_types.len() {
            return Err(SystemError::Layout {
                what: "output range and declared outputs differ in length",
            });
        }
        let (before, rest) = cells.split_at_mut(outputs.start);
        let (own, after) = rest.split_at_mut(outputs.len());
        Ok(Self {
            tick,
            sources,
            output_types,
            own_start: outputs.start,
            before,
            own,
            after,
            kinematics,
        })
    }

    /// The tick being executed.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn input_count(&self) -> usize {
        self.sources.len()
    }

    pub fn output_count(&self) -> usize {
        self.own.len()
    }

    fn cell(&self, slot: usize) -> Option<&ValueCell> {
        let own_end = self.own_start + self.own.len();
        if slot < self.own_start {
            self.before.get(slot)
        } else if slot < own_end {
            self.own.get(slot - self.own_start)
        } else {
            self.after.get(slot - own_end)
        }
    }

    fn input_value(&self, index: usize) -> SystemResult<&Value> {
        let source = *self
            .sources
            .get(index)
            .ok_or(SystemError::NoSuchInput { index })?;
        source
            .and_then(|slot| self.cell(slot))
            .and_then(|cell| cell.get(self.tick))
            .ok_or(SystemError::UndefinedInput { input: index })
    }

    /// Read an input. Unconnected inputs and inputs whose source has not
    /// written this tick are undefined.
    pub fn input<T: PortValue>(&self, slot: InputSlot<T>) -> SystemResult<&T> {
        let index = slot.index();
        let value = self.input_value(index)?;
        T::from_value(value).ok_or(SystemError::InputType {
            input: index,
            expected: T::KIND,
            found: value.value_type(),
        })
    }

    fn output_type(&self, index: usize) -> SystemResult<ValueType> {
        self.output_types
            .get(index)
            .copied()
            .ok_or(SystemError::NoSuchOutput { index })
    }

    /// Write an output by value. The value's full type, dimensions included,
    /// must match the declared port type.
    ///
    /// Moving a heap-backed value in drops the storage it replaces; systems
    /// producing joint vectors or matrices every tick use
    /// [`output_mut`](Self::output_mut) instead.
    pub fn set_output<T: PortValue>(&mut self, slot: OutputSlot<T>, value: T) -> SystemResult<()> {
        let index = slot.index();
        let expected = self.output_type(index)?;
        let value = value.into_value();
        let found = value.value_type();
        if found != expected {
            return Err(SystemError::OutputType {
                output: index,
                expected,
                found,
            });
        }
        let tick = self.tick;
        let cell = self
            .own
            .get_mut(index)
            .ok_or(SystemError::NoSuchOutput { index })?;
        cell.set(value, tick);
        Ok(())
    }

    /// Storage of an output, shaped as declared, to be filled in place. The
    /// output counts as written for this tick.
    pub fn output_mut<T: PortValue>(&mut self, slot: OutputSlot<T>) -> SystemResult<&mut T> {
        let index = slot.index();
        let expected = self.output_type(index)?;
        if expected.kind() != T::KIND {
            return Err(SystemError::OutputKind {
                output: index,
                expected,
                requested: T::KIND,
            });
        }
        let tick = self.tick;
        let cell = self
            .own
            .get_mut(index)
            .ok_or(SystemError::NoSuchOutput { index })?;
        T::from_value_mut(cell.write(expected, tick)).ok_or(SystemError::OutputKind {
            output: index,
            expected,
            requested: T::KIND,
        })
    }

    /// Value this system wrote to output `index` during the current tick.
    pub fn output_value(&self, index: usize) -> Option<&Value> {
        self.own.get(index).and_then(|cell| cell.get(self.tick))
    }

    /// Every output must have been written this tick with its declared
    /// dimensions.
    pub fn check_outputs(&self) -> SystemResult<()> {
        for (output, (cell, expected)) in self.own.iter().zip(self.output_types).enumerate() {
            let value = cell
                .get(self.tick)
                .ok_or(SystemError::UndefinedOutput { output })?;
            let found = value.value_type();
            if found != *expected {
                return Err(SystemError::OutputType {
                    output,
                    expected: *expected,
                    found,
                });
            }
        }
        Ok(())
    }

    /// The kinematics state for this tick.
    pub fn kinematics(&self) -> SystemResult<&KinematicsState> {
        let state: &KinematicsState = match &self.kinematics {
            KinematicsAccess::None => return Err(SystemError::NoKinematics),
            KinematicsAccess::Shared(state) => *state,
            KinematicsAccess::Exclusive(state) => &**state,
        };
        if state.tick() != self.tick {
            return Err(SystemError::KinematicsStale {
                tick: self.tick,
                produced: state.tick(),
            });
        }
        Ok(state)
    }

    pub fn kinematics_mut(&mut self) -> SystemResult<&mut KinematicsState> {
        match &mut self.kinematics {
            KinematicsAccess::Exclusive(state) => Ok(&mut **state),
            _ => Err(SystemError::NotProducer),
        }
    }
}

/// Runs one system against hand-filled input values.
#[cfg(test)]
pub(crate) mod harness {
    use super::*;
    use crate::system::System;

    pub struct Harness<S> {
        pub system: S,
        pub tick: u64,
        cells: Vec<ValueCell>,
        sources: Vec<Option<usize>>,
        output_types: Vec<ValueType>,
        pub kinematics: Option<KinematicsState>,
        producer: bool,
    }

    impl<S: System> Harness<S> {
        /// Every input is fed from its own slot; outputs follow the inputs.
        pub fn new(system: S) -> Self {
            let spec = system.spec();
            let n_in = spec.inputs.len();
            let output_types: Vec<ValueType> = spec.outputs.iter().map(|p| p.value_type).collect();
            let mut cells = vec![ValueCell::default(); n_in];
            cells.extend(output_types.iter().map(|t| ValueCell::new(*t)));
            Self {
                kinematics: spec.kinematics_dof.map(KinematicsState::new),
                producer: spec.is_producer(),
                system,
                tick: 1,
                cells,
                sources: (0..n_in).map(Some).collect(),
                output_types,
            }
        }

        pub fn disconnect(&mut self, input: usize) {
            self.sources[input] = None;
        }

        pub fn feed(&mut self, input: usize, value: Value) {
            self.cells[input].set(value, self.tick);
        }

        /// Stamp the kinematics state as produced for the current tick.
        pub fn refresh_kinematics(&mut self) {
            let tick = self.tick;
            if let Some(state) = self.kinematics.as_mut() {
                state.stamp(tick);
            }
        }

        pub fn run(&mut self) -> SystemResult<Vec<Option<Value>>> {
            let n_in = self.sources.len();
            let outputs = n_in..self.cells.len();
            let access = match self.kinematics.as_mut() {
                None => KinematicsAccess::None,
                Some(state) if self.producer => KinematicsAccess::Exclusive(state),
                Some(state) => KinematicsAccess::Shared(state),
            };
            let mut io = SystemIo::new(
                self.tick,
                &self.sources,
                &self.output_types,
                &mut self.cells,
                outputs,
                access,
            )?;
            self.system.operate(&mut io)?;
            io.check_outputs()?;
            Ok((0..io.output_count())
                .map(|i| io.output_value(i).cloned())
                .collect())
        }
    }
}
