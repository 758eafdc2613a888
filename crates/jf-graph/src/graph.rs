//! Arena storage for systems and ports.

use std::collections::HashSet;
use std::ops::Range;

use jf_core::{InputId, OutputId, SystemId, ValueType};
use tracing::debug;

use crate::error::{GraphError, GraphResult};
use crate::spec::{SystemRole, SystemSpec};

/// A system's entry in the arena.
///
/// Outputs of one system occupy a contiguous id range, so an executor can
/// hand a system exclusive access to exactly its own output slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemNode {
    pub id: SystemId,
    pub name: String,
    pub inputs: Vec<InputId>,
    pub outputs: Vec<OutputId>,
    pub kinematics_dof: Option<usize>,
    pub role: SystemRole,
}

impl SystemNode {
    pub fn is_producer(&self) -> bool {
        self.role == SystemRole::KinematicsProducer
    }

    /// Slot range of this system's outputs.
    pub fn output_slots(&self) -> Range<usize> {
        match (self.outputs.first(), self.outputs.last()) {
            (Some(first), Some(last)) => first.slot()..last.slot() + 1,
            _ => 0..0,
        }
    }
}

/// An input port. `source` is the connection, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputPort {
    pub id: InputId,
    pub owner: SystemId,
    pub name: String,
    pub value_type: ValueType,
    pub source: Option<OutputId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPort {
    pub id: OutputId,
    pub owner: SystemId,
    pub name: String,
    pub value_type: ValueType,
}

/// The dataflow graph: systems, ports and the connections between them.
///
/// Removed systems leave tombstones so ids are never reused.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    pub(crate) systems: Vec<Option<SystemNode>>,
    pub(crate) inputs: Vec<Option<InputPort>>,
    pub(crate) outputs: Vec<Option<OutputPort>>,
    pub(crate) producer: Option<SystemId>,
    pub(crate) revision: u64,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a system and allocate its ports.
    pub fn add_system(&mut self, name: impl Into<String>, spec: SystemSpec) -> GraphResult<SystemId> {
        let name = name.into();
        self.check_new_system(&name, &spec)?;

        let id = SystemId::from_index(self.systems.len() as u32);

        let mut inputs = Vec::with_capacity(spec.inputs.len());
        for port in spec.inputs {
            let input_id = InputId::from_index(self.inputs.len() as u32);
            self.inputs.push(Some(InputPort {
                id: input_id,
                owner: id,
                name: port.name,
                value_type: port.value_type,
                source: None,
            }));
            inputs.push(input_id);
        }

        let mut outputs = Vec::with_capacity(spec.outputs.len());
        for port in spec.outputs {
            let output_id = OutputId::from_index(self.outputs.len() as u32);
            self.outputs.push(Some(OutputPort {
                id: output_id,
                owner: id,
                name: port.name,
                value_type: port.value_type,
            }));
            outputs.push(output_id);
        }

        if spec.role == SystemRole::KinematicsProducer {
            self.producer = Some(id);
        }

        debug!(system = %id, name = %name, "added system");
        self.systems.push(Some(SystemNode {
            id,
            name,
            inputs,
            outputs,
            kinematics_dof: spec.kinematics_dof,
            role: spec.role,
        }));
        self.revision += 1;
        Ok(id)
    }

    fn check_new_system(&self, name: &str, spec: &SystemSpec) -> GraphResult<()> {
        if self.system_by_name(name).is_ok() {
            return Err(GraphError::DuplicateSystemName { name: name.into() });
        }

        let mut seen = HashSet::new();
        for port in spec.inputs.iter().chain(&spec.outputs) {
            if !seen.insert(port.name.as_str()) {
                return Err(GraphError::DuplicatePortName {
                    system: name.into(),
                    port: port.name.clone(),
                });
            }
        }

        if spec.is_producer() {
            if let Some(existing) = self.producer {
                return Err(GraphError::SecondProducer {
                    name: name.into(),
                    existing,
                });
            }
            if !spec.inputs.is_empty() {
                return Err(GraphError::ProducerHasInputs { name: name.into() });
            }
            let Some(dof) = spec.kinematics_dof else {
                return Err(GraphError::ProducerWithoutDof { name: name.into() });
            };
            // Consumers added before the producer must agree with it.
            for node in self.systems() {
                if let Some(found) = node.kinematics_dof {
                    if found != dof {
                        return Err(GraphError::DofMismatch {
                            system: node.name.clone(),
                            expected: dof,
                            found,
                        });
                    }
                }
            }
        } else if let (Some(found), Some(expected)) = (spec.kinematics_dof, self.producer_dof()) {
            if found != expected {
                return Err(GraphError::DofMismatch {
                    system: name.into(),
                    expected,
                    found,
                });
            }
        }
        Ok(())
    }

    /// Remove a system that no connection touches.
    pub fn remove_system(&mut self, id: SystemId) -> GraphResult<SystemNode> {
        let node = self.system(id)?;
        let fed = node.inputs.iter().any(|i| self.source_of(*i).is_some());
        let feeding = self
            .inputs()
            .any(|inp| inp.source.is_some_and(|src| node.outputs.contains(&src)));
        let feeds_kinematics = node.is_producer()
            && self
                .systems()
                .any(|other| other.id != id && other.kinematics_dof.is_some());
        if fed || feeding || feeds_kinematics {
            return Err(GraphError::SystemInUse {
                system: node.name.clone(),
            });
        }

        let node = self.systems[id.slot()]
            .take()
            .ok_or(GraphError::UnknownSystem(id))?;
        for input in &node.inputs {
            self.inputs[input.slot()] = None;
        }
        for output in &node.outputs {
            self.outputs[output.slot()] = None;
        }
        if self.producer == Some(id) {
            self.producer = None;
        }
        debug!(system = %id, name = %node.name, "removed system");
        self.revision += 1;
        Ok(node)
    }

    /// Monotonic counter bumped by every topology change.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn system(&self, id: SystemId) -> GraphResult<&SystemNode> {
        self.systems
            .get(id.slot())
            .and_then(Option::as_ref)
            .ok_or(GraphError::UnknownSystem(id))
    }

    pub fn input(&self, id: InputId) -> GraphResult<&InputPort> {
        self.inputs
            .get(id.slot())
            .and_then(Option::as_ref)
            .ok_or(GraphError::UnknownInput(id))
    }

    pub fn output(&self, id: OutputId) -> GraphResult<&OutputPort> {
        self.outputs
            .get(id.slot())
            .and_then(Option::as_ref)
            .ok_or(GraphError::UnknownOutput(id))
    }

    /// Live systems in id order.
    pub fn systems(&self) -> impl Iterator<Item = &SystemNode> {
        self.systems.iter().flatten()
    }

    pub fn inputs(&self) -> impl Iterator<Item = &InputPort> {
        self.inputs.iter().flatten()
    }

    pub fn outputs(&self) -> impl Iterator<Item = &OutputPort> {
        self.outputs.iter().flatten()
    }

    /// Number of live systems.
    pub fn len(&self) -> usize {
        self.systems().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Size of the output arena, tombstones included.
    pub fn output_capacity(&self) -> usize {
        self.outputs.len()
    }

    pub fn system_capacity(&self) -> usize {
        self.systems.len()
    }

    pub fn system_by_name(&self, name: &str) -> GraphResult<SystemId> {
        self.systems()
            .find(|s| s.name == name)
            .map(|s| s.id)
            .ok_or_else(|| GraphError::NoSuchSystem { name: name.into() })
    }

    pub fn input_by_name(&self, system: SystemId, name: &str) -> GraphResult<InputId> {
        let node = self.system(system)?;
        node.inputs
            .iter()
            .copied()
            .find(|id| self.input(*id).is_ok_and(|p| p.name == name))
            .ok_or_else(|| GraphError::NoSuchInput {
                system: node.name.clone(),
                port: name.into(),
            })
    }

    pub fn output_by_name(&self, system: SystemId, name: &str) -> GraphResult<OutputId> {
        let node = self.system(system)?;
        node.outputs
            .iter()
            .copied()
            .find(|id| self.output(*id).is_ok_and(|p| p.name == name))
            .ok_or_else(|| GraphError::NoSuchOutput {
                system: node.name.clone(),
                port: name.into(),
            })
    }

    pub fn input_at(&self, system: SystemId, index: usize) -> GraphResult<InputId> {
        let node = self.system(system)?;
        node.inputs
            .get(index)
            .copied()
            .ok_or_else(|| GraphError::NoSuchInput {
                system: node.name.clone(),
                port: format!("#{index}"),
            })
    }

    pub fn output_at(&self, system: SystemId, index: usize) -> GraphResult<OutputId> {
        let node = self.system(system)?;
        node.outputs
            .get(index)
            .copied()
            .ok_or_else(|| GraphError::NoSuchOutput {
                system: node.name.clone(),
                port: format!("#{index}"),
            })
    }

    /// The output feeding `input`, if connected.
    pub fn source_of(&self, input: InputId) -> Option<OutputId> {
        self.input(input).ok().and_then(|p| p.source)
    }

    pub fn producer(&self) -> Option<SystemId> {
        self.producer
    }

    pub fn producer_dof(&self) -> Option<usize> {
        self.producer
            .and_then(|id| self.system(id).ok())
            .and_then(|node| node.kinematics_dof)
    }

    /// Systems whose outputs feed `system` directly, plus the kinematics
    /// producer when `system` declares a kinematics input.
    pub fn predecessors(&self, system: SystemId) -> GraphResult<Vec<SystemId>> {
        let node = self.system(system)?;
        let mut preds: Vec<SystemId> = node
            .inputs
            .iter()
            .filter_map(|i| self.source_of(*i))
            .filter_map(|o| self.output(o).ok().map(|p| p.owner))
            .collect();
        if node.kinematics_dof.is_some() && !node.is_producer() {
            match self.producer {
                Some(producer) => preds.push(producer),
                None => {
                    return Err(GraphError::MissingKinematicsProducer {
                        system: node.name.clone(),
                    })
                }
            }
        }
        preds.sort_unstable();
        preds.dedup();
        Ok(preds)
    }

    /// Direct successors of every system, indexed by system slot.
    pub(crate) fn successor_lists(&self) -> Vec<Vec<SystemId>> {
        let mut succ = vec![Vec::new(); self.systems.len()];
        for input in self.inputs() {
            if let Some(owner) = input
                .source
                .and_then(|src| self.output(src).ok())
                .map(|p| p.owner)
            {
                succ[owner.slot()].push(input.owner);
            }
        }
        if let Some(producer) = self.producer {
            for node in self.systems() {
                if node.kinematics_dof.is_some() && node.id != producer {
                    succ[producer.slot()].push(node.id);
                }
            }
        }
        succ
    }
}
