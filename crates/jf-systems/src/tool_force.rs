//! Cartesian tool force to joint torques.

use jf_core::ValueType;
use jf_graph::SystemSpec;
use jf_kinematics::KinematicsError;
use nalgebra::{DVector, Vector3};

use crate::error::SystemResult;
use crate::io::SystemIo;
use crate::slot::{InputSlot, OutputSlot};
use crate::system::System;

/// Joint torques that produce a given force at the tool: `τ = J_linᵀ · f`.
///
/// Stateless. Reads the tool's linear Jacobian from the tick's kinematics.
#[derive(Debug, Clone)]
pub struct ToolForceToJointTorques {
    torques: DVector<f64>,
}

impl ToolForceToJointTorques {
    pub const INPUT: InputSlot<Vector3<f64>> = InputSlot::new(0);
    pub const OUTPUT: OutputSlot<DVector<f64>> = OutputSlot::new(0);

    pub fn new(dof: usize) -> Self {
        Self {
            torques: DVector::zeros(dof),
        }
    }

    pub fn dof(&self) -> usize {
        self.torques.len()
    }
}

impl System for ToolForceToJointTorques {
    fn spec(&self) -> SystemSpec {
        SystemSpec::new()
            .with_kinematics(self.dof())
            .input("input", ValueType::Vector3)
            .output("output", ValueType::Joints { dof: self.dof() })
    }

    fn operate(&mut self, io: &mut SystemIo<'_>) -> SystemResult<()> {
        let force = io.input(Self::INPUT)?;
        let jacobian = io.kinematics()?.tool_jacobian_linear();
        if jacobian.ncols() != self.torques.len() {
            return Err(KinematicsError::DofMismatch {
                expected: self.torques.len(),
                found: jacobian.ncols(),
            }
            .into());
        }
        jacobian.tr_mul_to(force, &mut self.torques);
        io.output_mut(Self::OUTPUT)?.copy_from(&self.torques);
        Ok(())
    }
}
