//! Constant source.

use jf_core::{PortValue, ValueType};
use jf_graph::SystemSpec;

use crate::error::SystemResult;
use crate::io::SystemIo;
use crate::slot::OutputSlot;
use crate::system::System;

/// Writes the same value every tick. Output `value`.
#[derive(Debug, Clone)]
pub struct Constant<T> {
    value: T,
    value_type: ValueType,
}

impl<T: PortValue> Constant<T> {
    pub const OUTPUT: OutputSlot<T> = OutputSlot::new(0);

    pub fn new(value: T) -> Self {
        let value_type = value.clone().into_value().value_type();
        Self { value, value_type }
    }
}

impl<T: PortValue> System for Constant<T> {
    fn spec(&self) -> SystemSpec {
        SystemSpec::new().output("value", self.value_type)
    }

    fn operate(&mut self, io: &mut SystemIo<'_>) -> SystemResult<()> {
        self.value.copy_to(io.output_mut(Self::OUTPUT)?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::harness::Harness;
    use jf_core::Value;
    use nalgebra::{DVector, Vector3};

    #[test]
    fn writes_its_value_every_tick() {
        let mut h = Harness::new(Constant::new(Vector3::new(0.0, 0.0, -9.81)));
        assert_eq!(h.system.spec().outputs[0].value_type, ValueType::Vector3);
        for tick in 1..4 {
            h.tick = tick;
            let out = h.run().unwrap();
            assert_eq!(out[0], Some(Value::Vector3(Vector3::new(0.0, 0.0, -9.81))));
        }
    }

    #[test]
    fn joint_vectors_declare_their_dof() {
        let mut h = Harness::new(Constant::new(DVector::from_element(7, 1.0)));
        assert_eq!(h.system.spec().outputs[0].value_type, ValueType::Joints { dof: 7 });
        assert_eq!(h.run().unwrap()[0], Some(Value::Joints(DVector::from_element(7, 1.0))));
    }
}
