//! The graph's source of kinematics state.

use jf_core::ValueType;
use jf_graph::SystemSpec;
use jf_kinematics::{
    JointSensor, KinematicsError, KinematicsResult, KinematicsSolver,
};
use nalgebra::{DVector, Vector3};

use crate::error::{SystemError, SystemResult};
use crate::io::SystemIo;
use crate::slot::OutputSlot;
use crate::system::System;

/// Samples the joints, runs forward kinematics and stamps the tick's
/// [`KinematicsState`](jf_kinematics::KinematicsState).
///
/// Also exposes the sample and the tool position as ordinary outputs:
/// `joint_positions`, `joint_velocities`, `tool_position`.
pub struct KinematicsProducer {
    sensor: Box<dyn JointSensor>,
    solver: Box<dyn KinematicsSolver>,
    positions: DVector<f64>,
    velocities: DVector<f64>,
    fatal_sensor_errors: bool,
}

impl KinematicsProducer {
    pub const JOINT_POSITIONS: OutputSlot<DVector<f64>> = OutputSlot::new(0);
    pub const JOINT_VELOCITIES: OutputSlot<DVector<f64>> = OutputSlot::new(1);
    pub const TOOL_POSITION: OutputSlot<Vector3<f64>> = OutputSlot::new(2);

    /// Pair a joint sensor with the solver that turns its samples into the
    /// tick's kinematics state.
    ///
    /// # Arguments
    ///
    /// - `sensor`: Source of joint positions and velocities
    /// - `solver`: Forward kinematics for the same arm
    ///
    /// # Errors
    ///
    /// Returns `DofMismatch` when the sensor and solver disagree on the
    /// number of joints.
    pub fn new(
        sensor: impl JointSensor + 'static,
        solver: impl KinematicsSolver + 'static,
    ) -> KinematicsResult<Self> {
        let dof = solver.dof();
        if sensor.dof() != dof {
            return Err(KinematicsError::DofMismatch {
                expected: dof,
                found: sensor.dof(),
            });
        }
        Ok(Self {
            sensor: Box::new(sensor),
            solver: Box::new(solver),
            positions: DVector::zeros(dof),
            velocities: DVector::zeros(dof),
            fatal_sensor_errors: false,
        })
    }

    /// Treat sensor failures as faults that stop execution instead of
    /// aborting a single tick.
    pub fn with_fatal_sensor_errors(mut self) -> Self {
        self.fatal_sensor_errors = true;
        self
    }

    pub fn dof(&self) -> usize {
        self.positions.len()
    }
}

impl System for KinematicsProducer {
    fn spec(&self) -> SystemSpec {
        let joints = ValueType::Joints { dof: self.dof() };
        SystemSpec::kinematics_producer(self.dof())
            .output("joint_positions", joints)
            .output("joint_velocities", joints)
            .output("tool_position", ValueType::Vector3)
    }

    fn operate(&mut self, io: &mut SystemIo<'_>) -> SystemResult<()> {
        if let Err(err) = self.sensor.sample(&mut self.positions, &mut self.velocities) {
            return Err(if self.fatal_sensor_errors {
                SystemError::fault(err.to_string())
            } else {
                err.into()
            });
        }

        let tick = io.tick();
        let state = io.kinematics_mut()?;
        state.set_joints(&self.positions, &self.velocities)?;
        self.solver.update(state)?;
        state.stamp(tick);
        let tool = state.tool_position();

        io.output_mut(Self::JOINT_POSITIONS)?.copy_from(&self.positions);
        io.output_mut(Self::JOINT_VELOCITIES)?.copy_from(&self.velocities);
        io.set_output(Self::TOOL_POSITION, tool)
    }
}
