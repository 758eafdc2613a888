//! The graph, its systems and the per-tick value buffers.
//!
//! The engine is what moves to the real-time thread while the manager is
//! running and comes back when it pauses. Everything a tick needs is laid out
//! in the execution plan when the schedule is derived, so [`Engine::tick`]
//! only walks the plan.

use std::ops::Range;

use jf_core::{InputId, OutputId, SystemId, Value, ValueType};
use jf_graph::{Graph, Schedule};
use jf_kinematics::KinematicsState;
use jf_systems::{KinematicsAccess, System, SystemError, SystemIo, ValueCell};
use tracing::debug;

use crate::error::{ExecError, ExecResult};
use crate::snapshot::Snapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    None,
    Shared,
    Exclusive,
}

/// Precomputed wiring of one scheduled system.
#[derive(Debug)]
struct Step {
    system: SystemId,
    sources: Vec<Option<usize>>,
    outputs: Range<usize>,
    output_types: Vec<ValueType>,
    access: Access,
}

/// Result of one tick.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Every scheduled system ran and the tick's values were committed.
    Completed { tick: u64 },
    /// `system` failed; nothing from this tick was committed.
    Aborted {
        tick: u64,
        system: SystemId,
        error: SystemError,
    },
}

impl TickOutcome {
    pub fn tick(&self) -> u64 {
        match self {
            TickOutcome::Completed { tick } | TickOutcome::Aborted { tick, .. } => *tick,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, TickOutcome::Completed { .. })
    }
}

pub struct Engine {
    graph: Graph,
    systems: Vec<Option<Box<dyn System>>>,
    managed: Vec<SystemId>,
    schedule: Option<Schedule>,
    plan: Vec<Step>,
    /// Values being produced by the running tick.
    pending: Vec<ValueCell>,
    /// Values of the last completed tick.
    current: Vec<ValueCell>,
    /// Written in place by the producer during a tick.
    kinematics: Option<KinematicsState>,
    /// Copy of `kinematics` as of the last completed tick.
    committed: Option<KinematicsState>,
    next_tick: u64,
    last_completed: u64,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self {
            graph: Graph::new(),
            systems: Vec::new(),
            managed: Vec::new(),
            schedule: None,
            plan: Vec::new(),
            pending: Vec::new(),
            current: Vec::new(),
            kinematics: None,
            committed: None,
            next_tick: 1,
            last_completed: 0,
        }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Whether topology edits re-derive the schedule immediately.
    pub fn is_scheduled(&self) -> bool {
        self.schedule.is_some()
    }

    pub fn schedule(&self) -> Option<&Schedule> {
        self.schedule.as_ref()
    }

    pub fn managed(&self) -> &[SystemId] {
        &self.managed
    }

    pub fn system_name(&self, system: SystemId) -> &str {
        self.graph
            .system(system)
            .map(|node| node.name.as_str())
            .unwrap_or("<removed>")
    }

    pub fn next_tick(&self) -> u64 {
        self.next_tick
    }

    pub fn last_completed(&self) -> u64 {
        self.last_completed
    }

    /// Kinematics state of the last completed tick.
    pub fn kinematics(&self) -> Option<&KinematicsState> {
        self.committed.as_ref()
    }

    /// Value of `output` from the last completed tick.
    pub fn value(&self, output: OutputId) -> Option<&Value> {
        self.current
            .get(output.slot())
            .and_then(|cell| cell.get(self.last_completed))
    }

    pub fn add_system(&mut self, name: &str, system: Box<dyn System>) -> ExecResult<SystemId> {
        let id = self.graph.add_system(name, system.spec())?;
        self.systems.resize_with(self.graph.system_capacity(), || None);
        self.systems[id.slot()] = Some(system);
        if let Err(err) = self.refresh() {
            self.graph.remove_system(id)?;
            self.systems[id.slot()] = None;
            return Err(err);
        }
        Ok(id)
    }

    /// Remove an unconnected system and hand its implementation back.
    pub fn remove_system(&mut self, id: SystemId) -> ExecResult<Box<dyn System>> {
        self.graph.remove_system(id)?;
        self.managed.retain(|m| *m != id);
        let system = self
            .systems
            .get_mut(id.slot())
            .and_then(Option::take)
            .ok_or(ExecError::Detached { system: id })?;
        self.refresh()?;
        Ok(system)
    }

    pub fn connect(&mut self, output: OutputId, input: InputId) -> ExecResult<()> {
        self.graph.connect(output, input)?;
        if let Err(err) = self.refresh() {
            self.graph.disconnect(input)?;
            return Err(err);
        }
        Ok(())
    }

    pub fn disconnect(&mut self, input: InputId) -> ExecResult<OutputId> {
        let former = self.graph.disconnect(input)?;
        if let Err(err) = self.refresh() {
            self.graph.connect(former, input)?;
            return Err(err);
        }
        Ok(former)
    }

    pub fn manage(&mut self, system: SystemId) -> ExecResult<()> {
        self.graph.system(system)?;
        if self.managed.contains(&system) {
            return Ok(());
        }
        self.managed.push(system);
        self.managed.sort_unstable();
        if let Err(err) = self.refresh() {
            self.managed.retain(|m| *m != system);
            return Err(err);
        }
        Ok(())
    }

    pub fn unmanage(&mut self, system: SystemId) -> ExecResult<()> {
        self.managed.retain(|m| *m != system);
        self.refresh()
    }

    /// Derive the schedule and execution plan; edits re-derive from now on.
    pub fn finalize(&mut self) -> ExecResult<()> {
        let schedule = Schedule::derive(&self.graph, &self.managed)?;
        self.build_plan(schedule)
    }

    fn refresh(&mut self) -> ExecResult<()> {
        if self.schedule.is_none() {
            return Ok(());
        }
        let schedule = Schedule::derive(&self.graph, &self.managed)?;
        self.build_plan(schedule)
    }

    fn build_plan(&mut self, schedule: Schedule) -> ExecResult<()> {
        let mut plan = Vec::with_capacity(schedule.len());
        for &system in schedule.order() {
            let node = self.graph.system(system)?;
            if self.systems.get(system.slot()).map_or(true, Option::is_none) {
                return Err(ExecError::Detached { system });
            }
            let sources = node
                .inputs
                .iter()
                .map(|i| self.graph.source_of(*i).map(OutputId::slot))
                .collect();
            let output_types = node
                .outputs
                .iter()
                .map(|o| self.graph.output(*o).map(|p| p.value_type))
                .collect::<Result<Vec<_>, _>>()?;
            let access = if node.is_producer() {
                Access::Exclusive
            } else if node.kinematics_dof.is_some() {
                Access::Shared
            } else {
                Access::None
            };
            plan.push(Step {
                system,
                sources,
                outputs: node.output_slots(),
                output_types,
                access,
            });
        }

        // Shape every output's storage now so ticks write in place.
        let slots = self.graph.output_capacity();
        self.pending.resize_with(slots, ValueCell::default);
        self.current.resize_with(slots, ValueCell::default);
        for port in self.graph.outputs() {
            for cells in [&mut self.pending, &mut self.current] {
                let cell = &mut cells[port.id.slot()];
                if !cell.is_shaped(port.value_type) {
                    *cell = ValueCell::new(port.value_type);
                }
            }
        }
        let dof = self.graph.producer_dof();
        self.kinematics = sized_state(dof, self.kinematics.take());
        self.committed = sized_state(dof, self.committed.take());

        debug!(
            systems = plan.len(),
            revision = self.graph.revision(),
            "execution plan rebuilt"
        );
        self.plan = plan;
        self.schedule = Some(schedule);
        Ok(())
    }

    /// Execute the next tick. On success the tick's values become current;
    /// on failure they are discarded and the previous tick stays current.
    pub fn tick(&mut self) -> TickOutcome {
        let tick = self.next_tick;
        self.next_tick += 1;

        let Self {
            systems,
            plan,
            pending,
            kinematics,
            ..
        } = self;

        for step in plan.iter() {
            if let Err(error) = run_step(step, tick, systems, pending, kinematics) {
                return TickOutcome::Aborted {
                    tick,
                    system: step.system,
                    error,
                };
            }
        }

        std::mem::swap(&mut self.pending, &mut self.current);
        if let (Some(committed), Some(state)) = (self.committed.as_mut(), self.kinematics.as_ref()) {
            committed.copy_from(state);
        }
        self.last_completed = tick;
        TickOutcome::Completed { tick }
    }

    /// Copy the last completed tick into `snapshot`. Values already present
    /// in the snapshot are overwritten in place, so once both snapshot
    /// buffers have been filled publishing no longer allocates.
    pub fn fill_snapshot(&self, snapshot: &mut Snapshot) {
        let tick = self.last_completed;
        snapshot.tick = tick;
        snapshot.values.resize(self.current.len(), None);
        for (dst, cell) in snapshot.values.iter_mut().zip(&self.current) {
            match (dst.as_mut(), cell.get(tick)) {
                (Some(dst), Some(value)) => dst.assign(value),
                (None, Some(value)) => *dst = Some(value.clone()),
                (_, None) => *dst = None,
            }
        }
        match (&mut snapshot.kinematics, &self.committed) {
            (Some(dst), Some(src)) => dst.copy_from(src),
            (dst, src) => dst.clone_from(src),
        }
    }

    /// Clear the internal state of every system.
    pub fn reset_systems(&mut self) {
        for system in self.systems.iter_mut().flatten() {
            system.reset();
        }
    }
}

fn run_step(
    step: &Step,
    tick: u64,
    systems: &mut [Option<Box<dyn System>>],
    pending: &mut [ValueCell],
    kinematics: &mut Option<KinematicsState>,
) -> Result<(), SystemError> {
    let system = systems
        .get_mut(step.system.slot())
        .and_then(Option::as_mut)
        .ok_or(SystemError::Layout {
            what: "scheduled system has no implementation",
        })?;
    let access = match (step.access, kinematics.as_mut()) {
        (Access::Exclusive, Some(state)) => KinematicsAccess::Exclusive(state),
        (Access::Shared, Some(state)) => KinematicsAccess::Shared(state),
        _ => KinematicsAccess::None,
    };
    let mut io = SystemIo::new(
        tick,
        &step.sources,
        &step.output_types,
        pending,
        step.outputs.clone(),
        access,
    )?;
    system.operate(&mut io)?;
    io.check_outputs()
}

/// Keep `state` if it already has `dof` joints.
fn sized_state(dof: Option<usize>, state: Option<KinematicsState>) -> Option<KinematicsState> {
    match (dof, state) {
        (Some(dof), Some(state)) if state.dof() == dof => Some(state),
        (Some(dof), _) => Some(KinematicsState::new(dof)),
        (None, _) => None,
    }
}
