//! Two-input controllers: a reference and a feedback of the same type in,
//! one control output.
//!
//! - [`Controller`] is inert. It computes nothing, so its output stays
//!   undefined and every tick it runs in is reported as aborted. It exists to
//!   check that a graph is wired correctly before a real law is dropped in.
//! - [`PiController`] applies a proportional-integral law per joint, with
//!   output clamping, integral clamping and anti-windup.

use core::marker::PhantomData;

use jf_core::{CoreError, PortValue, ValueType};
use jf_graph::SystemSpec;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::error::{SystemError, SystemResult};
use crate::io::SystemIo;
use crate::slot::{InputSlot, OutputSlot};
use crate::system::System;

/// Inert controller over values of type `T`.
#[derive(Debug, Clone)]
pub struct Controller<T> {
    value_type: ValueType,
    _marker: PhantomData<fn() -> T>,
}

impl<T: PortValue> Controller<T> {
    pub const REFERENCE: InputSlot<T> = InputSlot::new(0);
    pub const FEEDBACK: InputSlot<T> = InputSlot::new(1);
    pub const CONTROL: OutputSlot<T> = OutputSlot::new(0);

    /// `value_type` gives the port dimensions and must be of `T`'s kind.
    pub fn new(value_type: ValueType) -> SystemResult<Self> {
        if value_type.kind() != T::KIND {
            return Err(CoreError::InvalidArg {
                what: "controller port type does not match its value type",
            }
            .into());
        }
        Ok(Self {
            value_type,
            _marker: PhantomData,
        })
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }
}

impl<T: PortValue> System for Controller<T> {
    fn spec(&self) -> SystemSpec {
        SystemSpec::new()
            .input("reference", self.value_type)
            .input("feedback", self.value_type)
            .output("control", self.value_type)
    }

    fn operate(&mut self, _io: &mut SystemIo<'_>) -> SystemResult<()> {
        Ok(())
    }
}

/// PI gains and limits, shared by every joint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PiGains {
    /// Proportional gain.
    pub kp: f64,
    /// Integral time constant (seconds). Larger values reduce integral action.
    pub ti: f64,
    pub out_min: f64,
    pub out_max: f64,
    /// Integral windup limit. If None, only anti-windup applies.
    #[serde(default)]
    pub integral_limit: Option<f64>,
}

impl PiGains {
    /// # Arguments
    /// * `kp` - Proportional gain
    /// * `ti` - Integral time constant in seconds
    /// * `out_min` - Lower output clamp
    /// * `out_max` - Upper output clamp
    ///
    /// # Returns
    /// * `Err(InvalidArg)` - `ti` not positive, or `out_min` not below `out_max`
    pub fn new(kp: f64, ti: f64, out_min: f64, out_max: f64) -> SystemResult<Self> {
        let gains = Self {
            kp,
            ti,
            out_min,
            out_max,
            integral_limit: None,
        };
        gains.validate()?;
        Ok(gains)
    }

    pub fn with_integral_limit(mut self, limit: f64) -> Self {
        self.integral_limit = Some(limit);
        self
    }

    /// Check gains loaded from configuration.
    pub fn validate(&self) -> SystemResult<()> {
        if !(self.ti > 0.0) {
            return Err(CoreError::InvalidArg {
                what: "ti must be positive",
            }
            .into());
        }
        if !(self.out_min < self.out_max) {
            return Err(CoreError::InvalidArg {
                what: "out_min must be less than out_max",
            }
            .into());
        }
        if self.integral_limit.is_some_and(|limit| !(limit >= 0.0)) {
            return Err(CoreError::InvalidArg {
                what: "integral_limit must be non-negative",
            }
            .into());
        }
        Ok(())
    }

    /// One PI step for a single channel. Returns the new integral and the
    /// clamped output.
    pub fn step(&self, integral: f64, error: f64, dt: f64) -> (f64, f64) {
        let p_term = self.kp * error;

        let ki = self.kp / self.ti;
        let mut next = integral + error * dt;
        if let Some(limit) = self.integral_limit {
            next = next.clamp(-limit, limit);
        }

        let raw = p_term + ki * next;
        let output = raw.clamp(self.out_min, self.out_max);

        // Saturated: hold the integral.
        let integral = if output == raw { next } else { integral };
        (integral, output)
    }
}

/// Per-joint PI controller on joint-space vectors.
#[derive(Debug, Clone)]
pub struct PiController {
    gains: PiGains,
    dt: f64,
    integral: DVector<f64>,
    control: DVector<f64>,
}

impl PiController {
    pub const REFERENCE: InputSlot<DVector<f64>> = InputSlot::new(0);
    pub const FEEDBACK: InputSlot<DVector<f64>> = InputSlot::new(1);
    pub const CONTROL: OutputSlot<DVector<f64>> = OutputSlot::new(0);

    /// Create a controller with a zeroed integral.
    ///
    /// # Arguments
    ///
    /// - `dof`: Number of joints on the reference and feedback ports
    /// - `gains`: Shared gains applied to every joint
    /// - `dt`: Tick period in seconds
    ///
    /// # Errors
    ///
    /// Returns `InvalidArg` if the gains are invalid or `dt` is not a
    /// positive finite number.
    pub fn new(dof: usize, gains: PiGains, dt: f64) -> SystemResult<Self> {
        gains.validate()?;
        if !(dt > 0.0 && dt.is_finite()) {
            return Err(CoreError::InvalidArg {
                what: "dt must be positive and finite",
            }
            .into());
        }
        Ok(Self {
            gains,
            dt,
            integral: DVector::zeros(dof),
            control: DVector::zeros(dof),
        })
    }

    pub fn dof(&self) -> usize {
        self.integral.len()
    }

    pub fn gains(&self) -> &PiGains {
        &self.gains
    }

    pub fn integral(&self) -> &DVector<f64> {
        &self.integral
    }
}

impl System for PiController {
    fn spec(&self) -> SystemSpec {
        let joints = ValueType::Joints { dof: self.dof() };
        SystemSpec::new()
            .input("reference", joints)
            .input("feedback", joints)
            .output("control", joints)
    }

    fn operate(&mut self, io: &mut SystemIo<'_>) -> SystemResult<()> {
        let reference = io.input(Self::REFERENCE)?;
        let feedback = io.input(Self::FEEDBACK)?;
        if reference.len() != self.dof() || feedback.len() != self.dof() {
            return Err(SystemError::Layout {
                what: "joint vectors do not match the controller's DOF",
            });
        }
        for i in 0..self.dof() {
            let error = reference[i] - feedback[i];
            let (integral, output) = self.gains.step(self.integral[i], error, self.dt);
            self.integral[i] = integral;
            self.control[i] = output;
        }
        io.output_mut(Self::CONTROL)?.copy_from(&self.control);
        Ok(())
    }

    fn reset(&mut self) {
        self.integral.fill(0.0);
    }
}
