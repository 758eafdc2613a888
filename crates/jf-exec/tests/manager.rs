//! Execution manager behaviour: scheduling, tick semantics and the
//! real-time thread lifecycle.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use jf_core::{CoreError, SystemId, ValueType};
use jf_exec::{ExecConfig, ExecError, ExecReport, ExecutionManager, ManagerState, TickOutcome};
use jf_graph::{GraphError, SystemSpec};
use jf_kinematics::{FixedKinematics, SampleFeed};
use jf_systems::{
    Callback, Constant, Controller, KinematicsProducer, OutputSlot, Summer, System, SystemError,
    SystemIo, SystemResult, ToolForceToJointTorques,
};
use nalgebra::{DMatrix, DVector, Vector3};

/// Writes the current tick number.
struct TickSource {
    resets: Arc<AtomicUsize>,
}

impl TickSource {
    fn new() -> Self {
        Self {
            resets: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl System for TickSource {
    fn spec(&self) -> SystemSpec {
        SystemSpec::new().output("tick", ValueType::Scalar)
    }

    fn operate(&mut self, io: &mut SystemIo<'_>) -> SystemResult<()> {
        let tick = io.tick() as f64;
        io.set_output(OutputSlot::<f64>::new(0), tick)
    }

    fn reset(&mut self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
    }
}

type Log = Arc<Mutex<Vec<&'static str>>>;

/// Passes its input through and records that it ran.
fn relay(name: &'static str, log: &Log) -> impl System + use<> {
    let log = Arc::clone(log);
    Callback::new(ValueType::Scalar, ValueType::Scalar, move |x: &f64| {
        log.lock().unwrap().push(name);
        Ok(*x)
    })
    .unwrap()
}

/// Passes its input through unless `fail` is set.
fn gate(fail: &Arc<AtomicBool>) -> impl System + use<> {
    let fail = Arc::clone(fail);
    Callback::new(ValueType::Scalar, ValueType::Scalar, move |x: &f64| {
        if fail.load(Ordering::SeqCst) {
            Err(CoreError::InvalidArg { what: "gate closed" }.into())
        } else {
            Ok(*x)
        }
    })
    .unwrap()
}

fn wire(manager: &mut ExecutionManager, from: SystemId, output: &str, to: SystemId, input: &str) {
    let out = manager.output::<f64>(from, output).unwrap();
    let inp = manager.input::<f64>(to, input).unwrap();
    manager.connect(out, inp).unwrap();
}

fn wait_for(what: &str, mut done: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !done() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(1));
    }
}

/// Overrun reports are off so report assertions do not depend on timing.
fn quiet() -> ExecConfig {
    ExecConfig {
        overrun_reporting: false,
        ..ExecConfig::default()
    }
}

fn manager() -> ExecutionManager {
    ExecutionManager::new(quiet()).unwrap()
}

#[test]
fn chain_runs_in_data_order() {
    let log = Log::default();
    let mut m = manager();
    // Added in reverse so id order disagrees with data order.
    let c = m.add_system("c", relay("c", &log)).unwrap();
    let b = m.add_system("b", relay("b", &log)).unwrap();
    let a = m.add_system("a", TickSource::new()).unwrap();
    wire(&mut m, a, "tick", b, "input");
    wire(&mut m, b, "output", c, "input");
    m.manage(c).unwrap();

    assert_eq!(m.schedule(), None);
    m.finalize().unwrap();
    assert_eq!(m.state(), ManagerState::Scheduled);
    assert_eq!(m.schedule(), Some(&[a, b, c][..]));

    for expected in 1..=3 {
        assert_eq!(m.tick_once().unwrap(), TickOutcome::Completed { tick: expected });
    }
    assert_eq!(*log.lock().unwrap(), vec!["b", "c", "b", "c", "b", "c"]);

    let out = m.output::<f64>(c, "output").unwrap();
    assert_eq!(m.value(out), Some(3.0));
    assert_eq!(m.reader().tick(), 3);
}

#[test]
fn unmanaged_systems_do_not_run() {
    let log = Log::default();
    let mut m = manager();
    let a = m.add_system("a", TickSource::new()).unwrap();
    let b = m.add_system("b", relay("b", &log)).unwrap();
    let idle = m.add_system("idle", relay("idle", &log)).unwrap();
    wire(&mut m, a, "tick", b, "input");
    wire(&mut m, a, "tick", idle, "input");
    m.manage(b).unwrap();
    m.finalize().unwrap();

    m.tick_once().unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["b"]);
    let idle_out = m.output::<f64>(idle, "output").unwrap();
    assert_eq!(m.value(idle_out), None);
}

#[test]
fn unconnected_input_aborts_the_tick() {
    let mut m = manager();
    let a = m.add_system("a", Constant::new(1.0_f64)).unwrap();
    let diff = m
        .add_system("diff", Summer::<f64>::difference(ValueType::Scalar).unwrap())
        .unwrap();
    wire(&mut m, a, "value", diff, "a");
    m.manage(diff).unwrap();
    m.finalize().unwrap();

    let outcome = m.tick_once().unwrap();
    assert_eq!(
        outcome,
        TickOutcome::Aborted {
            tick: 1,
            system: diff,
            error: SystemError::UndefinedInput { input: 1 },
        }
    );
    assert_eq!(m.state(), ManagerState::Scheduled);
    assert_eq!(m.stats().aborted(), 1);
    assert!(matches!(
        m.take_reports().as_slice(),
        [ExecReport::TickAborted { tick: 1, .. }]
    ));

    let out = m.output::<f64>(diff, "output").unwrap();
    assert_eq!(m.value(out), None);
}

#[test]
fn aborted_tick_keeps_previous_values() {
    let fail = Arc::new(AtomicBool::new(false));
    let mut m = manager();
    let source = m.add_system("source", TickSource::new()).unwrap();
    let g = m.add_system("gate", gate(&fail)).unwrap();
    wire(&mut m, source, "tick", g, "input");
    m.manage(g).unwrap();
    m.finalize().unwrap();

    let source_out = m.output::<f64>(source, "tick").unwrap();
    let gate_out = m.output::<f64>(g, "output").unwrap();

    assert!(m.tick_once().unwrap().is_completed());
    fail.store(true, Ordering::SeqCst);
    assert!(!m.tick_once().unwrap().is_completed());

    // The source ran in tick 2, but nothing of that tick is visible.
    assert_eq!(m.value(source_out), Some(1.0));
    assert_eq!(m.value(gate_out), Some(1.0));
    assert_eq!(m.current_value(source_out.id()).and_then(|v| v.as_scalar()), Some(1.0));
    assert_eq!(m.reader().tick(), 1);

    fail.store(false, Ordering::SeqCst);
    assert_eq!(m.tick_once().unwrap(), TickOutcome::Completed { tick: 3 });
    assert_eq!(m.value(gate_out), Some(3.0));
}

#[test]
fn inert_controller_leaves_its_output_undefined() {
    let mut m = manager();
    let reference = m.add_system("reference", Constant::new(1.0_f64)).unwrap();
    let feedback = m.add_system("feedback", Constant::new(0.5_f64)).unwrap();
    let controller = m
        .add_system("controller", Controller::<f64>::new(ValueType::Scalar).unwrap())
        .unwrap();
    wire(&mut m, reference, "value", controller, "reference");
    wire(&mut m, feedback, "value", controller, "feedback");
    m.manage(controller).unwrap();
    m.finalize().unwrap();

    assert_eq!(
        m.tick_once().unwrap(),
        TickOutcome::Aborted {
            tick: 1,
            system: controller,
            error: SystemError::UndefinedOutput { output: 0 },
        }
    );
    assert_eq!(m.state(), ManagerState::Scheduled);
}

#[test]
fn repeated_aborts_fault_when_limited() {
    let config = ExecConfig {
        fault_on_consecutive_aborts: Some(3),
        ..quiet()
    };
    let mut m = ExecutionManager::new(config).unwrap();
    let controller = m
        .add_system("controller", Controller::<f64>::new(ValueType::Scalar).unwrap())
        .unwrap();
    let reference = m.add_system("reference", Constant::new(1.0_f64)).unwrap();
    wire(&mut m, reference, "value", controller, "reference");
    wire(&mut m, reference, "value", controller, "feedback");
    m.manage(controller).unwrap();
    m.finalize().unwrap();

    m.tick_once().unwrap();
    m.tick_once().unwrap();
    assert_eq!(m.state(), ManagerState::Scheduled);
    m.tick_once().unwrap();
    assert_eq!(m.state(), ManagerState::Stopped);

    let reports = m.take_reports();
    assert!(matches!(reports[2], ExecReport::Faulted { tick: 3, .. }));
    assert!(matches!(reports.last(), Some(ExecReport::Stopped { ticks: 3 })));
}

#[test]
fn fatal_error_stops_execution() {
    let mut m = manager();
    let source = m.add_system("source", TickSource::new()).unwrap();
    let sensor = m
        .add_system(
            "sensor",
            Callback::new(ValueType::Scalar, ValueType::Scalar, |_: &f64| -> SystemResult<f64> {
                Err(SystemError::fault("encoder lost"))
            })
            .unwrap(),
        )
        .unwrap();
    wire(&mut m, source, "tick", sensor, "input");
    m.manage(sensor).unwrap();
    m.finalize().unwrap();

    assert!(!m.tick_once().unwrap().is_completed());
    assert_eq!(m.state(), ManagerState::Stopped);
    assert!(matches!(
        m.tick_once(),
        Err(ExecError::InvalidState {
            state: ManagerState::Stopped,
            ..
        })
    ));

    let reports = m.take_reports();
    assert!(matches!(
        reports.as_slice(),
        [ExecReport::Faulted { tick: 1, .. }, ExecReport::Stopped { .. }]
    ));
}

#[test]
fn slow_tick_is_reported_as_overrun() {
    let mut m = ExecutionManager::new(ExecConfig::default().with_rate(1000.0)).unwrap();
    let source = m.add_system("source", TickSource::new()).unwrap();
    let slow = m
        .add_system(
            "slow",
            Callback::new(ValueType::Scalar, ValueType::Scalar, |x: &f64| {
                thread::sleep(Duration::from_millis(5));
                Ok(*x)
            })
            .unwrap(),
        )
        .unwrap();
    wire(&mut m, source, "tick", slow, "input");
    m.manage(slow).unwrap();
    m.finalize().unwrap();

    // Overruns are reported but the tick still completes.
    assert!(m.tick_once().unwrap().is_completed());
    assert_eq!(m.stats().overruns(), 1);
    let reports = m.take_reports();
    match reports.as_slice() {
        [ExecReport::Overrun { stamp, period }] => {
            assert_eq!(stamp.tick, 1);
            assert_eq!(*period, Duration::from_millis(1));
            assert!(stamp.duration() >= Duration::from_millis(5));
        }
        other => panic!("unexpected reports: {other:?}"),
    }
}

#[test]
fn managing_a_consumer_without_producer_is_rolled_back() {
    let mut m = manager();
    let source = m.add_system("source", TickSource::new()).unwrap();
    m.manage(source).unwrap();
    m.finalize().unwrap();

    let torques = m.add_system("torques", ToolForceToJointTorques::new(7)).unwrap();
    let err = m.manage(torques).unwrap_err();
    assert!(matches!(
        err,
        ExecError::Graph(GraphError::MissingKinematicsProducer { .. })
    ));
    assert_eq!(m.schedule(), Some(&[source][..]));
    assert!(m.tick_once().unwrap().is_completed());
    assert!(matches!(
        m.take_reports().as_slice(),
        [ExecReport::Structural {
            op: "manage a system",
            error: GraphError::MissingKinematicsProducer { .. },
        }]
    ));
}

#[test]
fn aborted_tick_keeps_committed_kinematics() {
    let (mut feed, sensor) = SampleFeed::new(2);
    feed.set(&[1.0, 1.0], &[0.0, 0.0]).unwrap();
    let fail = Arc::new(AtomicBool::new(false));
    let check = {
        let fail = Arc::clone(&fail);
        let joints = ValueType::Joints { dof: 2 };
        Callback::new(joints, joints, move |q: &DVector<f64>| {
            if fail.load(Ordering::SeqCst) {
                Err(CoreError::InvalidArg { what: "joint limit" }.into())
            } else {
                Ok(q.clone())
            }
        })
        .unwrap()
    };

    let mut m = manager();
    let arm = m
        .add_system(
            "arm",
            KinematicsProducer::new(sensor, FixedKinematics::new(DMatrix::zeros(3, 2)).unwrap()).unwrap(),
        )
        .unwrap();
    let check = m.add_system("check", check).unwrap();
    let positions = m.output::<DVector<f64>>(arm, "joint_positions").unwrap();
    let input = m.input::<DVector<f64>>(check, "input").unwrap();
    m.connect(positions, input).unwrap();
    m.manage(check).unwrap();
    m.finalize().unwrap();

    assert!(m.tick_once().unwrap().is_completed());
    feed.set(&[9.0, 9.0], &[0.0, 0.0]).unwrap();
    fail.store(true, Ordering::SeqCst);
    assert!(!m.tick_once().unwrap().is_completed());

    // The producer ran in tick 2, but tick 1 is still what everyone sees.
    let committed = m.kinematics().unwrap();
    assert_eq!(committed.tick(), 1);
    assert_eq!(committed.joint_positions().as_slice(), &[1.0, 1.0]);
    assert_eq!(m.value(positions), Some(DVector::from_vec(vec![1.0, 1.0])));
    assert_eq!(m.reader().kinematics().map(|k| k.tick()), Some(1));

    fail.store(false, Ordering::SeqCst);
    assert!(m.tick_once().unwrap().is_completed());
    let committed = m.kinematics().unwrap();
    assert_eq!(committed.tick(), 3);
    assert_eq!(committed.joint_positions().as_slice(), &[9.0, 9.0]);
}

#[test]
fn edits_while_scheduled_reschedule() {
    let log = Log::default();
    let mut m = manager();
    let source = m.add_system("source", TickSource::new()).unwrap();
    m.manage(source).unwrap();
    m.finalize().unwrap();
    m.tick_once().unwrap();

    let late = m.add_system("late", relay("late", &log)).unwrap();
    wire(&mut m, source, "tick", late, "input");
    m.manage(late).unwrap();
    assert_eq!(m.schedule(), Some(&[source, late][..]));

    assert_eq!(m.tick_once().unwrap(), TickOutcome::Completed { tick: 2 });
    let out = m.output::<f64>(late, "output").unwrap();
    assert_eq!(m.value(out), Some(2.0));

    let input = m.input::<f64>(late, "input").unwrap();
    assert_eq!(m.disconnect(input.id()).unwrap(), m.output::<f64>(source, "tick").unwrap().id());
    assert!(!m.tick_once().unwrap().is_completed());
}

#[test]
fn typed_lookup_checks_the_port_kind() {
    let mut m = manager();
    let source = m.add_system("source", TickSource::new()).unwrap();
    assert!(matches!(
        m.output::<DVector<f64>>(source, "tick"),
        Err(ExecError::Graph(GraphError::KindMismatch { .. }))
    ));
    assert!(matches!(
        m.output::<f64>(source, "nope"),
        Err(ExecError::Graph(GraphError::NoSuchOutput { .. }))
    ));
    assert_eq!(m.system_id("source").unwrap(), source);
    assert_eq!(m.system_name(source), Some("source"));
}

#[test]
fn tool_force_maps_to_joint_torques() {
    const DOF: usize = 7;
    let mut jacobian = DMatrix::zeros(3, DOF);
    jacobian.view_mut((0, 0), (3, 3)).fill_with_identity();
    let (mut feed, sensor) = SampleFeed::new(DOF);
    feed.set(&[0.1; DOF], &[0.0; DOF]).unwrap();

    let mut m = manager();
    let force = m
        .add_system("force", Constant::new(Vector3::new(1.0, 0.0, 0.0)))
        .unwrap();
    let torques = m.add_system("torques", ToolForceToJointTorques::new(DOF)).unwrap();
    let producer = m
        .add_system(
            "producer",
            KinematicsProducer::new(sensor, FixedKinematics::new(jacobian).unwrap()).unwrap(),
        )
        .unwrap();
    let force_out = m.output::<Vector3<f64>>(force, "value").unwrap();
    let torques_in = m.input::<Vector3<f64>>(torques, "input").unwrap();
    m.connect(force_out, torques_in).unwrap();
    m.manage(torques).unwrap();
    m.finalize().unwrap();

    assert_eq!(m.schedule(), Some(&[producer, force, torques][..]));
    assert!(m.tick_once().unwrap().is_completed());

    let out = m.output::<DVector<f64>>(torques, "output").unwrap();
    let mut expected = DVector::zeros(DOF);
    expected[0] = 1.0;
    assert_eq!(m.value(out), Some(expected));

    let kinematics = m.reader().kinematics().unwrap();
    assert_eq!(kinematics.tick(), 1);
    assert_eq!(kinematics.joint_positions()[3], 0.1);
}

#[test]
fn real_time_thread_lifecycle() {
    let source = TickSource::new();
    let resets = Arc::clone(&source.resets);
    let mut m = ExecutionManager::new(ExecConfig::default().with_rate(1000.0)).unwrap();
    let id = m.add_system("source", source).unwrap();
    m.manage(id).unwrap();
    m.finalize().unwrap();
    let out = m.output::<f64>(id, "tick").unwrap();
    let reader = m.reader();

    m.start().unwrap();
    assert_eq!(m.state(), ManagerState::Running);
    assert!(matches!(
        m.add_system("late", TickSource::new()),
        Err(ExecError::InvalidState {
            state: ManagerState::Running,
            ..
        })
    ));
    assert!(m.tick_once().is_err());
    wait_for("five ticks", || reader.tick() >= 5);

    m.pause().unwrap();
    assert_eq!(m.state(), ManagerState::Scheduled);
    let paused_at = m
        .current_value(out.id())
        .and_then(|v| v.as_scalar())
        .unwrap() as u64;
    assert!(paused_at >= 5);
    assert_eq!(resets.load(Ordering::SeqCst), 0);

    // Ticks keep counting across a pause.
    assert_eq!(
        m.tick_once().unwrap(),
        TickOutcome::Completed { tick: paused_at + 1 }
    );
    assert_eq!(m.value(out), Some((paused_at + 1) as f64));
    m.start().unwrap();
    wait_for("ticks after resume", || reader.tick() > paused_at + 3);

    let handle = m.stop_handle();
    thread::spawn(move || handle.stop()).join().unwrap();
    wait_for("the loop to stop", || m.poll() == ManagerState::Stopped);

    let stopped_at = reader.tick();
    thread::sleep(Duration::from_millis(10));
    assert_eq!(reader.tick(), stopped_at);
    assert_eq!(resets.load(Ordering::SeqCst), 1);
    assert!(m.start().is_err());
    assert!(matches!(
        m.take_reports().last(),
        Some(ExecReport::Stopped { .. })
    ));
}

#[test]
fn stop_during_a_tick_finishes_only_that_tick() {
    let started = Arc::new(AtomicBool::new(false));
    let slow = {
        let started = Arc::clone(&started);
        Callback::new(ValueType::Scalar, ValueType::Scalar, move |x: &f64| {
            started.store(true, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(50));
            Ok(*x * 2.0)
        })
        .unwrap()
    };

    let mut m = manager();
    let source = m.add_system("source", TickSource::new()).unwrap();
    let slow = m.add_system("slow", slow).unwrap();
    wire(&mut m, source, "tick", slow, "input");
    m.manage(slow).unwrap();
    m.finalize().unwrap();
    let out = m.output::<f64>(slow, "output").unwrap();
    let reader = m.reader();
    let handle = m.stop_handle();

    m.start().unwrap();
    wait_for("the first tick to start", || started.load(Ordering::SeqCst));
    handle.stop();
    wait_for("the loop to stop", || m.poll() == ManagerState::Stopped);

    assert_eq!(reader.tick(), 1);
    assert_eq!(reader.get(out), Some(2.0));
    thread::sleep(Duration::from_millis(100));
    assert_eq!(reader.tick(), 1);
    assert_eq!(m.stats().count(), 1);
}

#[test]
fn stop_request_applies_outside_the_loop() {
    let mut m = manager();
    let id = m.add_system("source", TickSource::new()).unwrap();
    m.manage(id).unwrap();
    m.finalize().unwrap();

    let handle = m.stop_handle();
    handle.stop();
    assert!(handle.is_stop_requested());
    assert!(m.tick_once().is_err());
    assert_eq!(m.state(), ManagerState::Stopped);
    assert!(matches!(
        m.take_reports().as_slice(),
        [ExecReport::Stopped { ticks: 0 }]
    ));

    // Stopping again is a no-op.
    m.stop().unwrap();
    assert!(m.take_reports().is_empty());
}

#[test]
fn finalize_only_from_idle() {
    let mut m = manager();
    let id = m.add_system("source", TickSource::new()).unwrap();
    m.manage(id).unwrap();
    assert!(m.tick_once().is_err());
    m.finalize().unwrap();
    assert!(matches!(
        m.finalize(),
        Err(ExecError::InvalidState {
            state: ManagerState::Scheduled,
            ..
        })
    ));
}
