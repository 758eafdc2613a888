//! Per-tick kinematics snapshot.

use jf_core::numeric::ensure_all_finite;
use nalgebra::{DMatrix, DVector, Isometry3, Vector3};

use crate::error::{KinematicsError, KinematicsResult};

/// Joint state and derived tool quantities for one tick.
///
/// All storage is allocated once in [`KinematicsState::new`]; producers
/// overwrite it in place every tick. The degrees of freedom never change.
#[derive(Debug, Clone, PartialEq)]
pub struct KinematicsState {
    dof: usize,
    /// Tick this state was produced for; 0 until the first production.
    tick: u64,
    pub(crate) joint_positions: DVector<f64>,
    pub(crate) joint_velocities: DVector<f64>,
    pub(crate) tool_pose: Isometry3<f64>,
    /// 3 x dof, joint velocities to tool linear velocity.
    pub(crate) tool_jacobian_linear: DMatrix<f64>,
    /// 3 x dof, joint velocities to tool angular velocity.
    pub(crate) tool_jacobian_angular: DMatrix<f64>,
    pub(crate) tool_velocity: Vector3<f64>,
}

impl KinematicsState {
    pub fn new(dof: usize) -> Self {
        Self {
            dof,
            tick: 0,
            joint_positions: DVector::zeros(dof),
            joint_velocities: DVector::zeros(dof),
            tool_pose: Isometry3::identity(),
            tool_jacobian_linear: DMatrix::zeros(3, dof),
            tool_jacobian_angular: DMatrix::zeros(3, dof),
            tool_velocity: Vector3::zeros(),
        }
    }

    pub fn dof(&self) -> usize {
        self.dof
    }

    /// Tick this state belongs to. Zero means it was never produced.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn is_produced(&self) -> bool {
        self.tick > 0
    }

    pub fn joint_positions(&self) -> &DVector<f64> {
        &self.joint_positions
    }

    pub fn joint_velocities(&self) -> &DVector<f64> {
        &self.joint_velocities
    }

    pub fn tool_pose(&self) -> &Isometry3<f64> {
        &self.tool_pose
    }

    pub fn tool_position(&self) -> Vector3<f64> {
        self.tool_pose.translation.vector
    }

    pub fn tool_jacobian_linear(&self) -> &DMatrix<f64> {
        &self.tool_jacobian_linear
    }

    pub fn tool_jacobian_angular(&self) -> &DMatrix<f64> {
        &self.tool_jacobian_angular
    }

    pub fn tool_velocity(&self) -> &Vector3<f64> {
        &self.tool_velocity
    }

    /// Copy a joint sample in. Lengths must equal the DOF and values must be finite.
    pub fn set_joints(&mut self, positions: &DVector<f64>, velocities: &DVector<f64>) -> KinematicsResult<()> {
        for v in [positions, velocities] {
            if v.len() != self.dof {
                return Err(KinematicsError::DofMismatch {
                    expected: self.dof,
                    found: v.len(),
                });
            }
        }
        ensure_all_finite(positions.iter(), "joint position")?;
        ensure_all_finite(velocities.iter(), "joint velocity")?;
        self.joint_positions.copy_from(positions);
        self.joint_velocities.copy_from(velocities);
        Ok(())
    }

    pub fn set_tool_pose(&mut self, pose: Isometry3<f64>) {
        self.tool_pose = pose;
    }

    /// Overwrite both Jacobians; shapes must be 3 x dof.
    pub fn set_tool_jacobian(&mut self, linear: &DMatrix<f64>, angular: &DMatrix<f64>) -> KinematicsResult<()> {
        for (what, m) in [("linear Jacobian", linear), ("angular Jacobian", angular)] {
            if m.shape() != (3, self.dof) {
                return Err(KinematicsError::Shape {
                    what,
                    expected: (3, self.dof),
                    found: m.shape(),
                });
            }
        }
        self.tool_jacobian_linear.copy_from(linear);
        self.tool_jacobian_angular.copy_from(angular);
        self.refresh_tool_velocity();
        Ok(())
    }

    /// Recompute the tool's linear velocity from the linear Jacobian and the
    /// joint velocities.
    pub fn refresh_tool_velocity(&mut self) {
        self.tool_velocity
            .gemv(1.0, &self.tool_jacobian_linear, &self.joint_velocities, 0.0);
    }

    /// Overwrite this state with `other`. Storage is reused when the DOF
    /// agree, which is always the case between states of one graph.
    pub fn copy_from(&mut self, other: &KinematicsState) {
        if self.dof != other.dof {
            *self = other.clone();
            return;
        }
        self.tick = other.tick;
        self.joint_positions.copy_from(&other.joint_positions);
        self.joint_velocities.copy_from(&other.joint_velocities);
        self.tool_pose = other.tool_pose;
        self.tool_jacobian_linear.copy_from(&other.tool_jacobian_linear);
        self.tool_jacobian_angular.copy_from(&other.tool_jacobian_angular);
        self.tool_velocity = other.tool_velocity;
    }

    /// Mark the state as produced for `tick`.
    pub fn stamp(&mut self, tick: u64) {
        self.tick = tick;
    }

    /// Check that storage still has the shapes fixed at construction.
    pub fn check_shape(&self) -> KinematicsResult<()> {
        let n = self.dof;
        let checks = [
            ("joint positions", (n, 1), self.joint_positions.shape()),
            ("joint velocities", (n, 1), self.joint_velocities.shape()),
            ("linear Jacobian", (3, n), self.tool_jacobian_linear.shape()),
            ("angular Jacobian", (3, n), self.tool_jacobian_angular.shape()),
        ];
        for (what, expected, found) in checks {
            if expected != found {
                return Err(KinematicsError::Shape {
                    what,
                    expected,
                    found,
                });
            }
        }
        Ok(())
    }
}
