//! Port declarations of a system.

use jf_core::ValueType;

/// What part a system plays in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SystemRole {
    /// Ordinary computation.
    #[default]
    Regular,
    /// The graph's single source of kinematics state. Runs first every tick
    /// and is the implicit predecessor of every kinematics consumer.
    KinematicsProducer,
}

/// Name and type of one port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSpec {
    pub name: String,
    pub value_type: ValueType,
}

impl PortSpec {
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
        }
    }
}

/// Ordered inputs and outputs of a system, plus its kinematics capability.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SystemSpec {
    pub inputs: Vec<PortSpec>,
    pub outputs: Vec<PortSpec>,
    /// Degrees of freedom of the kinematics input, if the system declares one.
    pub kinematics_dof: Option<usize>,
    pub role: SystemRole,
}

impl SystemSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spec of a kinematics producer for a `dof`-joint robot.
    pub fn kinematics_producer(dof: usize) -> Self {
        Self {
            kinematics_dof: Some(dof),
            role: SystemRole::KinematicsProducer,
            ..Self::default()
        }
    }

    pub fn input(mut self, name: impl Into<String>, value_type: ValueType) -> Self {
        self.inputs.push(PortSpec::new(name, value_type));
        self
    }

    pub fn output(mut self, name: impl Into<String>, value_type: ValueType) -> Self {
        self.outputs.push(PortSpec::new(name, value_type));
        self
    }

    /// Declare a kinematics input for a `dof`-joint robot.
    pub fn with_kinematics(mut self, dof: usize) -> Self {
        self.kinematics_dof = Some(dof);
        self
    }

    pub fn is_producer(&self) -> bool {
        self.role == SystemRole::KinematicsProducer
    }
}
