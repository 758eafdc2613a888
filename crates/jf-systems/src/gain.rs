//! Scalar gain on a joint vector.

use jf_core::ValueType;
use jf_graph::SystemSpec;
use nalgebra::DVector;

use crate::error::{SystemError, SystemResult};
use crate::io::SystemIo;
use crate::slot::{InputSlot, OutputSlot};
use crate::system::System;

#[derive(Debug, Clone)]
pub struct Gain {
    gain: f64,
    out: DVector<f64>,
}

impl Gain {
    pub const INPUT: InputSlot<DVector<f64>> = InputSlot::new(0);
    pub const OUTPUT: OutputSlot<DVector<f64>> = OutputSlot::new(0);

    pub fn new(dof: usize, gain: f64) -> Self {
        Self {
            gain,
            out: DVector::zeros(dof),
        }
    }

    pub fn gain(&self) -> f64 {
        self.gain
    }
}

impl System for Gain {
    fn spec(&self) -> SystemSpec {
        let joints = ValueType::Joints { dof: self.out.len() };
        SystemSpec::new().input("input", joints).output("output", joints)
    }

    fn operate(&mut self, io: &mut SystemIo<'_>) -> SystemResult<()> {
        let input = io.input(Self::INPUT)?;
        if input.len() != self.out.len() {
            return Err(SystemError::Layout {
                what: "joint vector does not match the gain's DOF",
            });
        }
        let gain = self.gain;
        self.out.zip_apply(input, |o, i| *o = gain * i);
        io.output_mut(Self::OUTPUT)?.copy_from(&self.out);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::harness::Harness;
    use jf_core::Value;

    #[test]
    fn scales_every_joint() {
        let mut h = Harness::new(Gain::new(3, -2.0));
        h.feed(0, Value::Joints(DVector::from_vec(vec![1.0, 0.0, 0.5])));
        assert_eq!(
            h.run().unwrap()[0],
            Some(Value::Joints(DVector::from_vec(vec![-2.0, 0.0, -1.0])))
        );
    }
}
