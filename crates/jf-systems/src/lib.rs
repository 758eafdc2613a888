//! jf-systems: the node interface of a jointflow graph and a set of leaves.
//!
//! A [`System`] declares its ports through a [`SystemSpec`](jf_graph::SystemSpec)
//! and computes in [`System::operate`], reading inputs and writing outputs
//! through a [`SystemIo`]. Leaves:
//!
//! - [`KinematicsProducer`]: samples joints and publishes the tick's kinematics
//! - [`ToolForceToJointTorques`]: maps a tool force to joint torques via Jᵀ
//! - [`Controller`]: inert reference/feedback controller for plumbing checks
//! - [`PiController`]: per-joint proportional-integral control
//! - [`Constant`], [`Summer`], [`Gain`], [`Callback`]: small building blocks

pub mod callback;
pub mod constant;
pub mod controller;
pub mod error;
pub mod gain;
pub mod io;
pub mod kinematics_producer;
pub mod slot;
pub mod summer;
pub mod system;
pub mod tool_force;

pub use callback::Callback;
pub use constant::Constant;
pub use controller::{Controller, PiController, PiGains};
pub use error::{SystemError, SystemResult};
pub use gain::Gain;
pub use io::{KinematicsAccess, SystemIo, ValueCell};
pub use kinematics_producer::KinematicsProducer;
pub use slot::{InputSlot, OutputSlot};
pub use summer::{Summable, Summer};
pub use system::System;
pub use tool_force::ToolForceToJointTorques;
