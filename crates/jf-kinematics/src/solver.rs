//! Forward kinematics solvers.
//!
//! A solver turns the joint sample already copied into a [`KinematicsState`]
//! into tool pose and Jacobians. Solvers run on the real-time thread and must
//! not allocate in [`KinematicsSolver::update`].

use core::f64::consts::FRAC_PI_2;

use nalgebra::{DMatrix, Isometry3, Translation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::{KinematicsError, KinematicsResult};
use crate::state::KinematicsState;

pub trait KinematicsSolver: Send {
    fn dof(&self) -> usize;

    /// Recompute tool pose, Jacobians and tool velocity in place.
    fn update(&mut self, state: &mut KinematicsState) -> KinematicsResult<()>;
}

/// Standard Denavit-Hartenberg parameters of one revolute joint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DhLink {
    pub a: f64,
    pub alpha: f64,
    pub d: f64,
    /// Joint angle offset added to the measured position.
    #[serde(default)]
    pub theta: f64,
}

impl DhLink {
    pub fn new(a: f64, alpha: f64, d: f64, theta: f64) -> Self {
        Self { a, alpha, d, theta }
    }

    /// Rot_z(theta + q) * Trans_z(d) * Trans_x(a) * Rot_x(alpha)
    pub fn transform(&self, q: f64) -> Isometry3<f64> {
        let z = Isometry3::from_parts(
            Translation3::new(0.0, 0.0, self.d),
            UnitQuaternion::from_axis_angle(&Vector3::z_axis(), self.theta + q),
        );
        let x = Isometry3::from_parts(
            Translation3::new(self.a, 0.0, 0.0),
            UnitQuaternion::from_axis_angle(&Vector3::x_axis(), self.alpha),
        );
        z * x
    }
}

/// Serial chain of revolute joints described by DH parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct DhChain {
    links: Vec<DhLink>,
    base: Isometry3<f64>,
    tool: Isometry3<f64>,
}

impl DhChain {
    /// Build a chain with identity base and tool transforms.
    ///
    /// # Arguments
    /// * `links` - One DH row per joint, base to tip
    ///
    /// # Returns
    /// * `Err(InvalidChain)` - No links, or a non-finite parameter
    pub fn new(links: Vec<DhLink>) -> KinematicsResult<Self> {
        if links.is_empty() {
            return Err(KinematicsError::InvalidChain {
                what: "chain has no links",
            });
        }
        let finite = links
            .iter()
            .all(|l| [l.a, l.alpha, l.d, l.theta].iter().all(|v| v.is_finite()));
        if !finite {
            return Err(KinematicsError::InvalidChain {
                what: "DH parameters must be finite",
            });
        }
        Ok(Self {
            links,
            base: Isometry3::identity(),
            tool: Isometry3::identity(),
        })
    }

    /// Fixed transform from the last link frame to the tool point.
    pub fn with_tool(mut self, tool: Isometry3<f64>) -> Self {
        self.tool = tool;
        self
    }

    /// Fixed transform from the world frame to the first joint frame.
    pub fn with_base(mut self, base: Isometry3<f64>) -> Self {
        self.base = base;
        self
    }

    /// Seven-joint arm in the WAM layout (illustrative link lengths, metres).
    pub fn wam7() -> Self {
        let links = vec![
            DhLink::new(0.0, -FRAC_PI_2, 0.0, 0.0),
            DhLink::new(0.0, FRAC_PI_2, 0.0, 0.0),
            DhLink::new(0.045, -FRAC_PI_2, 0.55, 0.0),
            DhLink::new(-0.045, FRAC_PI_2, 0.0, 0.0),
            DhLink::new(0.0, -FRAC_PI_2, 0.3, 0.0),
            DhLink::new(0.0, FRAC_PI_2, 0.0, 0.0),
            DhLink::new(0.0, 0.0, 0.06, 0.0),
        ];
        Self {
            links,
            base: Isometry3::identity(),
            tool: Isometry3::translation(0.0, 0.0, 0.1),
        }
    }

    pub fn links(&self) -> &[DhLink] {
        &self.links
    }

    fn tool_pose_at(&self, state: &KinematicsState) -> Isometry3<f64> {
        let mut frame = self.base;
        for (link, q) in self.links.iter().zip(state.joint_positions.iter()) {
            frame = frame * link.transform(*q);
        }
        frame * self.tool
    }
}

impl KinematicsSolver for DhChain {
    fn dof(&self) -> usize {
        self.links.len()
    }

    fn update(&mut self, state: &mut KinematicsState) -> KinematicsResult<()> {
        if state.dof() != self.links.len() {
            return Err(KinematicsError::DofMismatch {
                expected: self.links.len(),
                found: state.dof(),
            });
        }

        let tool = self.tool_pose_at(state);
        let p = tool.translation.vector;

        // Geometric Jacobian: joint i rotates about z of frame i-1.
        let mut frame = self.base;
        for (i, link) in self.links.iter().enumerate() {
            let z = frame.rotation * Vector3::z();
            let o = frame.translation.vector;
            let lin = z.cross(&(p - o));
            for r in 0..3 {
                state.tool_jacobian_linear[(r, i)] = lin[r];
                state.tool_jacobian_angular[(r, i)] = z[r];
            }
            frame = frame * link.transform(state.joint_positions[i]);
        }

        state.tool_pose = tool;
        state.refresh_tool_velocity();
        Ok(())
    }
}

/// Solver that reports a constant pose and Jacobian regardless of joint state.
///
/// Useful for bench setups and tests where the arm geometry is irrelevant.
#[derive(Debug, Clone, PartialEq)]
pub struct FixedKinematics {
    pose: Isometry3<f64>,
    linear: DMatrix<f64>,
    angular: DMatrix<f64>,
}

impl FixedKinematics {
    /// `linear` must be 3 x dof; the angular Jacobian is zero.
    pub fn new(linear: DMatrix<f64>) -> KinematicsResult<Self> {
        if linear.nrows() != 3 || linear.ncols() == 0 {
            return Err(KinematicsError::Shape {
                what: "linear Jacobian",
                expected: (3, linear.ncols().max(1)),
                found: linear.shape(),
            });
        }
        let angular = DMatrix::zeros(3, linear.ncols());
        Ok(Self {
            pose: Isometry3::identity(),
            linear,
            angular,
        })
    }

    pub fn with_pose(mut self, pose: Isometry3<f64>) -> Self {
        self.pose = pose;
        self
    }
}

impl KinematicsSolver for FixedKinematics {
    fn dof(&self) -> usize {
        self.linear.ncols()
    }

    fn update(&mut self, state: &mut KinematicsState) -> KinematicsResult<()> {
        state.set_tool_pose(self.pose);
        state.set_tool_jacobian(&self.linear, &self.angular)
    }
}
