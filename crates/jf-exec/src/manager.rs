//! The execution manager: graph assembly, lifecycle and the real-time thread.
//!
//! ```text
//! Idle --finalize--> Scheduled --start--> Running
//!                       ^  |                 |
//!                       |  +--tick_once      |
//!                       +-------pause--------+
//! any state --stop / StopHandle / fault--> Stopped
//! ```
//!
//! Topology may change in Idle and Scheduled. In Scheduled every edit
//! re-derives the schedule immediately, and an edit that leaves the graph
//! unschedulable is rolled back.

use std::fmt;
use std::sync::atomic::Ordering;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use jf_core::{InputId, OutputId, PortValue, SystemId, TickStats, Value};
use jf_graph::{Graph, GraphError};
use jf_kinematics::KinematicsState;
use jf_systems::System;
use tracing::{info, warn};

use crate::config::ExecConfig;
use crate::engine::{Engine, TickOutcome};
use crate::error::{ExecError, ExecResult};
use crate::port::{Input, Output};
use crate::report::ExecReport;
use crate::snapshot::SnapshotReader;
use crate::worker::{self, Control, Driver, ExitReason, Flow, Shared, WorkerExit};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ManagerState {
    Idle,
    Scheduled,
    Running,
    Stopped,
}

impl fmt::Display for ManagerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ManagerState::Idle => "idle",
            ManagerState::Scheduled => "scheduled",
            ManagerState::Running => "running",
            ManagerState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Requests a stop from any thread.
///
/// A running loop wakes immediately, finishes nothing beyond the tick in
/// flight and exits. If the manager is not running, it moves to Stopped the
/// next time its owner touches it.
#[derive(Debug, Clone)]
pub struct StopHandle {
    shared: Arc<Shared>,
    control: Sender<Control>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.shared.stop_requested.store(true, Ordering::Release);
        let _ = self.control.send(Control::Stop);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.shared.stop_requested.load(Ordering::Acquire)
    }
}

type Worker = JoinHandle<(WorkerExit, Driver)>;

pub struct ExecutionManager {
    config: ExecConfig,
    state: ManagerState,
    /// `None` while the real-time thread owns it.
    engine: Option<Engine>,
    driver: Option<Driver>,
    worker: Option<Worker>,
    shared: Arc<Shared>,
    control_tx: Sender<Control>,
    control_rx: Option<Receiver<Control>>,
    reports_rx: Receiver<ExecReport>,
}

impl ExecutionManager {
    /// Create an Idle manager with an empty graph.
    ///
    /// # Arguments
    ///
    /// - `config`: Tick rate, thread name and fault policy for the loop
    ///
    /// # Errors
    ///
    /// Returns `Config` when `config` fails validation.
    pub fn new(config: ExecConfig) -> ExecResult<Self> {
        config.validate()?;
        let shared = Arc::new(Shared::new());
        let (reports_tx, reports_rx) = mpsc::sync_channel(config.report_capacity);
        let (control_tx, control_rx) = mpsc::channel();
        let driver = Driver::new(Arc::clone(&shared), reports_tx, &config);
        Ok(Self {
            config,
            state: ManagerState::Idle,
            engine: Some(Engine::new()),
            driver: Some(driver),
            worker: None,
            shared,
            control_tx,
            control_rx: Some(control_rx),
            reports_rx,
        })
    }

    pub fn config(&self) -> &ExecConfig {
        &self.config
    }

    pub fn state(&self) -> ManagerState {
        self.state
    }

    fn transition(&mut self, to: ManagerState) {
        if self.state != to {
            info!(from = %self.state, to = %to, "execution manager state change");
            self.state = to;
        }
    }

    /// Collect a worker that exited on its own and apply pending stop
    /// requests. Returns the up-to-date state.
    pub fn poll(&mut self) -> ManagerState {
        if self.state == ManagerState::Running && self.worker.as_ref().is_some_and(JoinHandle::is_finished) {
            // Errors here already left the manager Stopped.
            let _ = self.join_worker();
        }
        if self.state != ManagerState::Running
            && self.state != ManagerState::Stopped
            && self.shared.stop_requested.load(Ordering::Acquire)
        {
            self.enter_stopped();
        }
        self.state
    }

    fn enter_stopped(&mut self) {
        if let Some(engine) = self.engine.as_mut() {
            engine.reset_systems();
        }
        if let Some(driver) = self.driver.as_ref() {
            driver.report(ExecReport::Stopped {
                ticks: self.shared.stats.count(),
            });
        }
        self.transition(ManagerState::Stopped);
    }

    fn engine(&self, op: &'static str) -> ExecResult<&Engine> {
        self.engine.as_ref().ok_or(ExecError::InvalidState {
            op,
            state: self.state,
        })
    }

    /// The engine, if topology may be edited in the current state.
    fn editable(&mut self, op: &'static str) -> ExecResult<&mut Engine> {
        let state = self.poll();
        match (state, self.engine.as_mut()) {
            (ManagerState::Idle | ManagerState::Scheduled, Some(engine)) => Ok(engine),
            _ => Err(ExecError::InvalidState { op, state }),
        }
    }

    /// Also send a structural failure of `op` to the report channel.
    fn structural<T>(&self, op: &'static str, result: ExecResult<T>) -> ExecResult<T> {
        if let Err(ExecError::Graph(error)) = &result {
            warn!(op, error = %error, "graph edit rejected");
            if let Some(driver) = self.driver.as_ref() {
                driver.report(ExecReport::Structural {
                    op,
                    error: error.clone(),
                });
            }
        }
        result
    }

    pub fn add_system(&mut self, name: &str, system: impl System + 'static) -> ExecResult<SystemId> {
        let op = "add a system";
        let result = self
            .editable(op)
            .and_then(|engine| engine.add_system(name, Box::new(system)));
        let id = self.structural(op, result)?;
        info!(system = name, id = %id, "system added");
        Ok(id)
    }

    pub fn remove_system(&mut self, system: SystemId) -> ExecResult<Box<dyn System>> {
        let op = "remove a system";
        let result = self.editable(op).and_then(|engine| engine.remove_system(system));
        self.structural(op, result)
    }

    /// Read-only view of the topology. Unavailable while running.
    pub fn graph(&self) -> ExecResult<&Graph> {
        Ok(self.engine("inspect the graph")?.graph())
    }

    pub fn system_id(&self, name: &str) -> ExecResult<SystemId> {
        Ok(self.engine("look up a system")?.graph().system_by_name(name)?)
    }

    pub fn system_name(&self, system: SystemId) -> Option<&str> {
        self.engine
            .as_ref()
            .and_then(|e| e.graph().system(system).ok())
            .map(|node| node.name.as_str())
    }

    pub fn input_id(&self, system: SystemId, name: &str) -> ExecResult<InputId> {
        Ok(self.engine("look up an input")?.graph().input_by_name(system, name)?)
    }

    pub fn output_id(&self, system: SystemId, name: &str) -> ExecResult<OutputId> {
        Ok(self.engine("look up an output")?.graph().output_by_name(system, name)?)
    }

    /// Typed handle on an input; the port must carry `T`.
    pub fn input<T: PortValue>(&self, system: SystemId, name: &str) -> ExecResult<Input<T>> {
        let graph = self.engine("look up an input")?.graph();
        let port = graph.input(graph.input_by_name(system, name)?)?;
        if port.value_type.kind() != T::KIND {
            return Err(GraphError::KindMismatch {
                port: name.into(),
                expected: T::KIND,
                found: port.value_type,
            }
            .into());
        }
        Ok(Input::new(port.id))
    }

    /// Typed handle on an output; the port must carry `T`.
    pub fn output<T: PortValue>(&self, system: SystemId, name: &str) -> ExecResult<Output<T>> {
        let graph = self.engine("look up an output")?.graph();
        let port = graph.output(graph.output_by_name(system, name)?)?;
        if port.value_type.kind() != T::KIND {
            return Err(GraphError::KindMismatch {
                port: name.into(),
                expected: T::KIND,
                found: port.value_type,
            }
            .into());
        }
        Ok(Output::new(port.id))
    }

    pub fn connect<T: PortValue>(&mut self, output: Output<T>, input: Input<T>) -> ExecResult<()> {
        self.connect_ids(output.id(), input.id())
    }

    pub fn connect_ids(&mut self, output: OutputId, input: InputId) -> ExecResult<()> {
        let result = self.editable("connect").and_then(|engine| engine.connect(output, input));
        self.structural("connect", result)
    }

    /// Unbind `input`, returning the output it was connected to.
    pub fn disconnect(&mut self, input: InputId) -> ExecResult<OutputId> {
        let result = self.editable("disconnect").and_then(|engine| engine.disconnect(input));
        self.structural("disconnect", result)
    }

    /// Make the manager responsible for `system`'s outputs. The system and
    /// everything upstream of it will run every tick.
    pub fn manage(&mut self, system: SystemId) -> ExecResult<()> {
        let op = "manage a system";
        let result = self.editable(op).and_then(|engine| engine.manage(system));
        self.structural(op, result)
    }

    pub fn unmanage(&mut self, system: SystemId) -> ExecResult<()> {
        let op = "unmanage a system";
        let result = self.editable(op).and_then(|engine| engine.unmanage(system));
        self.structural(op, result)
    }

    /// Validate the graph and derive the schedule. Idle -> Scheduled.
    pub fn finalize(&mut self) -> ExecResult<()> {
        let state = self.poll();
        if state != ManagerState::Idle {
            return Err(ExecError::InvalidState {
                op: "finalize",
                state,
            });
        }
        let engine = self.engine.as_mut().ok_or(ExecError::InvalidState {
            op: "finalize",
            state,
        })?;
        let result = engine.finalize();
        self.structural("finalize", result)?;
        let engine = self.engine("finalize")?;
        info!(
            systems = engine.schedule().map_or(0, |s| s.len()),
            managed = engine.managed().len(),
            "graph finalized"
        );
        self.transition(ManagerState::Scheduled);
        Ok(())
    }

    /// Current execution order, when scheduled and not running.
    pub fn schedule(&self) -> Option<&[SystemId]> {
        self.engine
            .as_ref()
            .and_then(Engine::schedule)
            .map(|s| s.order())
    }

    /// Run one tick on the calling thread. Only while Scheduled.
    pub fn tick_once(&mut self) -> ExecResult<TickOutcome> {
        let state = self.poll();
        let (Some(engine), Some(driver)) = (self.engine.as_mut(), self.driver.as_mut()) else {
            return Err(ExecError::InvalidState {
                op: "tick",
                state,
            });
        };
        if state != ManagerState::Scheduled {
            return Err(ExecError::InvalidState {
                op: "tick",
                state,
            });
        }
        let (outcome, _, flow) = driver.step(engine);
        if flow == Flow::Fault {
            self.enter_stopped();
        }
        Ok(outcome)
    }

    /// Hand the engine to a new real-time thread. Scheduled -> Running.
    pub fn start(&mut self) -> ExecResult<()> {
        let state = self.poll();
        if state != ManagerState::Scheduled {
            return Err(ExecError::InvalidState { op: "start", state });
        }
        if self.engine.is_none() || self.driver.is_none() || self.control_rx.is_none() {
            return Err(ExecError::InvalidState { op: "start", state });
        }
        let (Some(engine), Some(mut driver), Some(control)) =
            (self.engine.take(), self.driver.take(), self.control_rx.take())
        else {
            return Err(ExecError::InvalidState { op: "start", state });
        };
        // Drop pause requests left over from an earlier run.
        while control.try_recv().is_ok() {}
        driver.reset_aborts();

        let spawned = thread::Builder::new()
            .name(self.config.thread_name.clone())
            .spawn(move || worker::run(engine, driver, control));
        match spawned {
            Ok(handle) => {
                self.worker = Some(handle);
                self.transition(ManagerState::Running);
                Ok(())
            }
            Err(err) => {
                // The closure and everything it owned are gone.
                self.transition(ManagerState::Stopped);
                Err(ExecError::Spawn(err))
            }
        }
    }

    /// Stop ticking after the tick in flight and take the engine back.
    /// Running -> Scheduled, or Stopped if the loop had already ended.
    pub fn pause(&mut self) -> ExecResult<()> {
        let state = self.poll();
        if state != ManagerState::Running {
            return Err(ExecError::InvalidState { op: "pause", state });
        }
        let _ = self.control_tx.send(Control::Pause);
        self.join_worker()
    }

    /// Stop for good. Safe to call in any state.
    pub fn stop(&mut self) -> ExecResult<()> {
        self.shared.stop_requested.store(true, Ordering::Release);
        match self.state {
            ManagerState::Running => {
                let _ = self.control_tx.send(Control::Stop);
                self.join_worker()
            }
            ManagerState::Stopped => Ok(()),
            ManagerState::Idle | ManagerState::Scheduled => {
                self.enter_stopped();
                Ok(())
            }
        }
    }

    fn join_worker(&mut self) -> ExecResult<()> {
        let Some(handle) = self.worker.take() else {
            return Ok(());
        };
        match handle.join() {
            Ok((exit, driver)) => {
                self.engine = Some(exit.engine);
                self.driver = Some(driver);
                self.control_rx = Some(exit.control);
                match exit.reason {
                    ExitReason::Paused if !self.shared.stop_requested.load(Ordering::Acquire) => {
                        self.transition(ManagerState::Scheduled);
                    }
                    ExitReason::Paused => self.enter_stopped(),
                    ExitReason::Stopped | ExitReason::Faulted => {
                        if let Some(engine) = self.engine.as_mut() {
                            engine.reset_systems();
                        }
                        self.transition(ManagerState::Stopped);
                    }
                }
                Ok(())
            }
            Err(_) => {
                warn!("real-time thread panicked");
                self.transition(ManagerState::Stopped);
                Err(ExecError::WorkerPanicked)
            }
        }
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            shared: Arc::clone(&self.shared),
            control: self.control_tx.clone(),
        }
    }

    pub fn reader(&self) -> SnapshotReader {
        SnapshotReader::new(Arc::clone(&self.shared.snapshot))
    }

    /// Published value of `output` from the last completed tick.
    pub fn value<T: PortValue>(&self, output: Output<T>) -> Option<T> {
        self.reader().get(output)
    }

    /// Last committed value straight from the engine, when not running.
    pub fn current_value(&self, output: OutputId) -> Option<&Value> {
        self.engine.as_ref().and_then(|e| e.value(output))
    }

    /// Kinematics state of the last completed tick, when not running.
    pub fn kinematics(&self) -> Option<&KinematicsState> {
        self.engine.as_ref().and_then(Engine::kinematics)
    }

    pub fn stats(&self) -> &TickStats {
        &self.shared.stats
    }

    /// Completed ticks whose snapshot could not be published because a
    /// reader still held the back buffer.
    pub fn skipped_publishes(&self) -> u64 {
        self.shared.skipped_publishes.load(Ordering::Relaxed)
    }

    /// Reports lost because nobody drained the queue.
    pub fn dropped_reports(&self) -> u64 {
        self.shared.dropped_reports.load(Ordering::Relaxed)
    }

    /// Drain every report received so far.
    pub fn take_reports(&self) -> Vec<ExecReport> {
        self.reports_rx.try_iter().collect()
    }
}

impl Drop for ExecutionManager {
    fn drop(&mut self) {
        if self.state == ManagerState::Running {
            let _ = self.stop();
        }
    }
}
