//! Closure-backed single-input, single-output system.

use core::fmt;
use core::marker::PhantomData;

use jf_core::{CoreError, PortValue, ValueType};
use jf_graph::SystemSpec;

use crate::error::SystemResult;
use crate::io::SystemIo;
use crate::slot::{InputSlot, OutputSlot};
use crate::system::System;

/// Wraps `FnMut(&I) -> SystemResult<O>` as a system with ports `input` and
/// `output`. The closure runs on the real-time thread. Its result is moved
/// into the output, so closures returning joint vectors or matrices allocate
/// every tick.
pub struct Callback<I, O, F> {
    input_type: ValueType,
    output_type: ValueType,
    f: F,
    _marker: PhantomData<fn(&I) -> O>,
}

impl<I, O, F> Callback<I, O, F>
where
    I: PortValue,
    O: PortValue,
    F: FnMut(&I) -> SystemResult<O> + Send,
{
    pub const INPUT: InputSlot<I> = InputSlot::new(0);
    pub const OUTPUT: OutputSlot<O> = OutputSlot::new(0);

    pub fn new(input_type: ValueType, output_type: ValueType, f: F) -> SystemResult<Self> {
        if input_type.kind() != I::KIND || output_type.kind() != O::KIND {
            return Err(CoreError::InvalidArg {
                what: "callback port types do not match its value types",
            }
            .into());
        }
        Ok(Self {
            input_type,
            output_type,
            f,
            _marker: PhantomData,
        })
    }
}

impl<I, O, F> fmt::Debug for Callback<I, O, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback")
            .field("input_type", &self.input_type)
            .field("output_type", &self.output_type)
            .finish_non_exhaustive()
    }
}

impl<I, O, F> System for Callback<I, O, F>
where
    I: PortValue,
    O: PortValue,
    F: FnMut(&I) -> SystemResult<O> + Send,
{
    fn spec(&self) -> SystemSpec {
        SystemSpec::new()
            .input("input", self.input_type)
            .output("output", self.output_type)
    }

    fn operate(&mut self, io: &mut SystemIo<'_>) -> SystemResult<()> {
        let out = (self.f)(io.input(Self::INPUT)?)?;
        io.set_output(Self::OUTPUT, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::harness::Harness;
    use crate::SystemError;
    use jf_core::Value;
    use nalgebra::Vector3;

    #[test]
    fn closure_maps_input_to_output() {
        let norm = Callback::new(ValueType::Vector3, ValueType::Scalar, |v: &Vector3<f64>| {
            Ok(v.norm())
        })
        .unwrap();
        let mut h = Harness::new(norm);
        h.feed(0, Value::Vector3(Vector3::new(3.0, 4.0, 0.0)));
        assert_eq!(h.run().unwrap()[0], Some(Value::Scalar(5.0)));
    }

    #[test]
    fn closure_errors_propagate() {
        let failing = Callback::new(ValueType::Scalar, ValueType::Scalar, |_: &f64| {
            Err::<f64, _>(SystemError::fault("limit switch"))
        })
        .unwrap();
        let mut h = Harness::new(failing);
        h.feed(0, Value::Scalar(0.0));
        let err = h.run().unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn kinds_are_checked() {
        let r = Callback::new(ValueType::Pose, ValueType::Scalar, |x: &f64| Ok(*x));
        assert!(r.is_err());
    }
}
