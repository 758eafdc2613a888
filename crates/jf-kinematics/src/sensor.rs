//! Joint sensing.
//!
//! The hardware side (bus drivers, encoders) is outside this workspace; it
//! plugs in through [`JointSensor`]. Two adapters are provided: a closure
//! wrapper, and a feed that another thread writes samples into.

use std::sync::Arc;

use jf_core::DoubleBuffer;
use nalgebra::DVector;

use crate::error::{KinematicsError, KinematicsResult};

/// Supplies one joint position/velocity sample per tick.
pub trait JointSensor: Send {
    fn dof(&self) -> usize;

    /// Write the current sample into `positions` and `velocities`, both of
    /// length `dof()`. Called on the real-time thread.
    fn sample(
        &mut self,
        positions: &mut DVector<f64>,
        velocities: &mut DVector<f64>,
    ) -> KinematicsResult<()>;
}

/// Sensor backed by a closure.
pub struct FnJointSensor<F> {
    dof: usize,
    sample: F,
}

impl<F> FnJointSensor<F>
where
    F: FnMut(&mut DVector<f64>, &mut DVector<f64>) -> KinematicsResult<()> + Send,
{
    pub fn new(dof: usize, sample: F) -> Self {
        Self { dof, sample }
    }
}

impl<F> JointSensor for FnJointSensor<F>
where
    F: FnMut(&mut DVector<f64>, &mut DVector<f64>) -> KinematicsResult<()> + Send,
{
    fn dof(&self) -> usize {
        self.dof
    }

    fn sample(
        &mut self,
        positions: &mut DVector<f64>,
        velocities: &mut DVector<f64>,
    ) -> KinematicsResult<()> {
        (self.sample)(positions, velocities)
    }
}

/// One joint position/velocity sample.
#[derive(Debug, Clone, PartialEq)]
pub struct JointSample {
    pub positions: DVector<f64>,
    pub velocities: DVector<f64>,
}

impl JointSample {
    pub fn zeros(dof: usize) -> Self {
        Self {
            positions: DVector::zeros(dof),
            velocities: DVector::zeros(dof),
        }
    }
}

/// Writer half of a sample feed. Not `Clone`: a feed has exactly one writer.
pub struct SampleFeed {
    dof: usize,
    buffer: Arc<DoubleBuffer<JointSample>>,
}

impl SampleFeed {
    /// Create a feed initialised to all-zero joints, and the sensor reading it.
    pub fn new(dof: usize) -> (Self, SampleFeedSensor) {
        let buffer = Arc::new(DoubleBuffer::new(JointSample::zeros(dof)));
        let sensor = SampleFeedSensor {
            dof,
            buffer: Arc::clone(&buffer),
        };
        (Self { dof, buffer }, sensor)
    }

    /// Publish a new sample. Returns `false` if the reader held the back slot
    /// and the sample was dropped.
    pub fn set(&mut self, positions: &[f64], velocities: &[f64]) -> KinematicsResult<bool> {
        for len in [positions.len(), velocities.len()] {
            if len != self.dof {
                return Err(KinematicsError::DofMismatch {
                    expected: self.dof,
                    found: len,
                });
            }
        }
        Ok(self.buffer.publish(|sample| {
            sample.positions.copy_from_slice(positions);
            sample.velocities.copy_from_slice(velocities);
        }))
    }

    /// Number of samples published so far.
    pub fn published(&self) -> u64 {
        self.buffer.version()
    }
}

/// Reader half of a [`SampleFeed`].
///
/// Sampling never waits for the writer. If the writer is filling the slot
/// being read, the buffers passed to [`JointSensor::sample`] are left as they
/// were, so a producer that reuses them sees the previous sample again.
pub struct SampleFeedSensor {
    dof: usize,
    buffer: Arc<DoubleBuffer<JointSample>>,
}

impl JointSensor for SampleFeedSensor {
    fn dof(&self) -> usize {
        self.dof
    }

    fn sample(
        &mut self,
        positions: &mut DVector<f64>,
        velocities: &mut DVector<f64>,
    ) -> KinematicsResult<()> {
        // The feeder holds the slot mid-publish: keep the previous sample.
        self.buffer.try_read(|sample| {
            positions.copy_from(&sample.positions);
            velocities.copy_from(&sample.velocities);
        });
        Ok(())
    }
}
