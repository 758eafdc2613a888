//! The demo arm graph and its configuration.
//!
//! ```text
//! arm (sensor + DH chain) --joint_positions--> joint_hold.feedback
//! hold_setpoint ----------------------------> joint_hold.reference
//! tool_force ---------------------------------> torques.input   (Jᵀ f)
//! ```

use std::path::Path;

use jf_exec::{ExecConfig, ExecutionManager, Output};
use jf_kinematics::{DhChain, DhLink, KinematicsSolver, SampleFeed};
use jf_systems::{Constant, KinematicsProducer, PiController, PiGains, ToolForceToJointTorques};
use nalgebra::{DVector, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::{CliError, CliResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    pub exec: ExecConfig,
    /// DH parameters of the arm. Empty selects the built-in 7-DOF WAM layout.
    pub links: Vec<DhLink>,
    pub joint_positions: Vec<f64>,
    pub joint_velocities: Vec<f64>,
    /// Force applied at the tool, in the base frame (N).
    pub tool_force: [f64; 3],
    /// Joint positions the PI controller holds.
    pub hold: Vec<f64>,
    pub gains: PiGains,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            exec: ExecConfig::default(),
            links: Vec::new(),
            joint_positions: vec![0.0; 7],
            joint_velocities: vec![0.0; 7],
            tool_force: [0.0, 0.0, -10.0],
            hold: vec![0.1; 7],
            gains: PiGains {
                kp: 20.0,
                ti: 0.5,
                out_min: -5.0,
                out_max: 5.0,
                integral_limit: Some(1.0),
            },
        }
    }
}

impl DemoConfig {
    pub fn load(path: &Path) -> CliResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| CliError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_yaml::from_str(&text)?)
    }

    fn chain(&self) -> CliResult<DhChain> {
        if self.links.is_empty() {
            Ok(DhChain::wam7())
        } else {
            Ok(DhChain::new(self.links.clone())?)
        }
    }

    fn check_lengths(&self, dof: usize) -> CliResult<()> {
        for (what, len) in [
            ("joint_positions", self.joint_positions.len()),
            ("joint_velocities", self.joint_velocities.len()),
            ("hold", self.hold.len()),
        ] {
            if len != dof {
                return Err(CliError::Config {
                    what: format!("{what} has {len} entries, the arm has {dof} joints"),
                });
            }
        }
        Ok(())
    }
}

/// The assembled demo, finalized and ready to tick.
pub struct Demo {
    pub manager: ExecutionManager,
    feed: SampleFeed,
    positions: Vec<f64>,
    velocities: Vec<f64>,
    pub dof: usize,
    pub tool_position: Output<Vector3<f64>>,
    pub torques: Output<DVector<f64>>,
    pub control: Output<DVector<f64>>,
}

impl Demo {
    pub fn build(config: &DemoConfig) -> CliResult<Self> {
        let chain = config.chain()?;
        let dof = chain.dof();
        config.check_lengths(dof)?;

        let (mut feed, sensor) = SampleFeed::new(dof);
        feed.set(&config.joint_positions, &config.joint_velocities)?;
        let dt = config.exec.period().as_secs_f64();

        let mut m = ExecutionManager::new(config.exec.clone())?;
        let arm = m.add_system("arm", KinematicsProducer::new(sensor, chain)?)?;
        let force = m.add_system("tool_force", Constant::new(Vector3::from(config.tool_force)))?;
        let torques = m.add_system("torques", ToolForceToJointTorques::new(dof))?;
        let hold = m.add_system(
            "hold_setpoint",
            Constant::new(DVector::from_column_slice(&config.hold)),
        )?;
        let joint_hold = m.add_system("joint_hold", PiController::new(dof, config.gains.clone(), dt)?)?;

        let force_out = m.output::<Vector3<f64>>(force, "value")?;
        let torques_in = m.input::<Vector3<f64>>(torques, "input")?;
        m.connect(force_out, torques_in)?;

        let hold_out = m.output::<DVector<f64>>(hold, "value")?;
        let reference = m.input::<DVector<f64>>(joint_hold, "reference")?;
        m.connect(hold_out, reference)?;

        let positions = m.output::<DVector<f64>>(arm, "joint_positions")?;
        let feedback = m.input::<DVector<f64>>(joint_hold, "feedback")?;
        m.connect(positions, feedback)?;

        m.manage(torques)?;
        m.manage(joint_hold)?;
        m.finalize()?;

        let tool_position = m.output::<Vector3<f64>>(arm, "tool_position")?;
        let torques = m.output::<DVector<f64>>(torques, "output")?;
        let control = m.output::<DVector<f64>>(joint_hold, "control")?;
        Ok(Self {
            manager: m,
            feed,
            positions: config.joint_positions.clone(),
            velocities: config.joint_velocities.clone(),
            dof,
            tool_position,
            torques,
            control,
        })
    }

    /// Move the simulated arm along its joint velocities for `dt` seconds and
    /// publish the new sample to the sensor.
    pub fn advance(&mut self, dt: f64) -> CliResult<()> {
        for (q, qd) in self.positions.iter_mut().zip(&self.velocities) {
            *q += qd * dt;
        }
        self.feed.set(&self.positions, &self.velocities)?;
        Ok(())
    }
}
