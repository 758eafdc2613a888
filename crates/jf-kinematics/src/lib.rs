//! Kinematics state shared by the systems of one control graph.
//!
//! Once per tick the graph's kinematics producer pulls a joint sample from a
//! [`JointSensor`], hands it to a [`KinematicsSolver`] and stamps the resulting
//! [`KinematicsState`] with the tick number. Every kinematics-aware system then
//! reads that state by shared reference for the rest of the tick.

pub mod error;
pub mod sensor;
pub mod solver;
pub mod state;

pub use error::{KinematicsError, KinematicsResult};
pub use sensor::{FnJointSensor, JointSample, JointSensor, SampleFeed, SampleFeedSensor};
pub use solver::{DhChain, DhLink, FixedKinematics, KinematicsSolver};
pub use state::KinematicsState;
