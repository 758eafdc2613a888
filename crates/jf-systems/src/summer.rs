//! Signed sum of two inputs.

use jf_core::{CoreError, PortValue, Value, ValueType};
use jf_graph::SystemSpec;
use nalgebra::{DMatrix, DVector, Vector3};

use crate::error::SystemResult;
use crate::io::SystemIo;
use crate::slot::{InputSlot, OutputSlot};
use crate::system::System;

/// Port values a [`Summer`] can combine without allocating.
pub trait Summable: PortValue {
    /// `out = sa * a + sb * b`. All three have the same dimensions.
    fn weighted_sum(out: &mut Self, a: &Self, sa: f64, b: &Self, sb: f64);
}

impl Summable for f64 {
    fn weighted_sum(out: &mut Self, a: &Self, sa: f64, b: &Self, sb: f64) {
        *out = sa * a + sb * b;
    }
}

impl Summable for Vector3<f64> {
    fn weighted_sum(out: &mut Self, a: &Self, sa: f64, b: &Self, sb: f64) {
        *out = a * sa + b * sb;
    }
}

impl Summable for DVector<f64> {
    fn weighted_sum(out: &mut Self, a: &Self, sa: f64, b: &Self, sb: f64) {
        out.zip_zip_apply(a, b, |o, x, y| *o = sa * x + sb * y);
    }
}

impl Summable for DMatrix<f64> {
    fn weighted_sum(out: &mut Self, a: &Self, sa: f64, b: &Self, sb: f64) {
        out.zip_zip_apply(a, b, |o, x, y| *o = sa * x + sb * y);
    }
}

/// `output = sign_a * a + sign_b * b`. With signs `(1, -1)` it forms an error
/// signal from a reference and a feedback.
#[derive(Debug, Clone)]
pub struct Summer<T> {
    value_type: ValueType,
    signs: (f64, f64),
    out: T,
}

impl<T: Summable> Summer<T> {
    pub const A: InputSlot<T> = InputSlot::new(0);
    pub const B: InputSlot<T> = InputSlot::new(1);
    pub const OUTPUT: OutputSlot<T> = OutputSlot::new(0);

    /// Output `signs.0 * a + signs.1 * b`.
    ///
    /// # Arguments
    ///
    /// - `value_type`: Type of both inputs and the output
    /// - `signs`: Weights applied to `a` and `b`
    ///
    /// # Errors
    ///
    /// Returns `InvalidArg` when `T` is not the port type of `value_type`.
    pub fn new(value_type: ValueType, signs: (f64, f64)) -> SystemResult<Self> {
        let out = T::from_value(&Value::zeros(value_type))
            .cloned()
            .ok_or(CoreError::InvalidArg {
                what: "summer port type does not match its value type",
            })?;
        Ok(Self {
            value_type,
            signs,
            out,
        })
    }

    /// `a - b`.
    pub fn difference(value_type: ValueType) -> SystemResult<Self> {
        Self::new(value_type, (1.0, -1.0))
    }
}

impl<T: Summable> System for Summer<T> {
    fn spec(&self) -> SystemSpec {
        SystemSpec::new()
            .input("a", self.value_type)
            .input("b", self.value_type)
            .output("output", self.value_type)
    }

    fn operate(&mut self, io: &mut SystemIo<'_>) -> SystemResult<()> {
        // Connected ports share one type, so both inputs match `out`.
        let a = io.input(Self::A)?;
        let b = io.input(Self::B)?;
        let (sa, sb) = self.signs;
        T::weighted_sum(&mut self.out, a, sa, b, sb);
        self.out.copy_to(io.output_mut(Self::OUTPUT)?);
        Ok(())
    }
}
