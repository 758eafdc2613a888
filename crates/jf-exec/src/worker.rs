//! Tick bookkeeping and the real-time loop.
//!
//! [`Driver::step`] is shared by the real-time thread and by synchronous
//! stepping: it times the tick, publishes on success and turns failures into
//! reports. Nothing on the success path formats or logs.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvTimeoutError, SyncSender, TryRecvError, TrySendError};
use std::time::{Duration, Instant};

use jf_core::{DoubleBuffer, TickStamp, TickStats, TickTimer};
use tracing::{error, info, warn};

use crate::config::ExecConfig;
use crate::engine::{Engine, TickOutcome};
use crate::report::ExecReport;
use crate::snapshot::Snapshot;

/// State shared between the manager, its handles and the real-time thread.
#[derive(Debug)]
pub(crate) struct Shared {
    pub stats: TickStats,
    pub snapshot: Arc<DoubleBuffer<Snapshot>>,
    pub stop_requested: AtomicBool,
    pub skipped_publishes: AtomicU64,
    pub dropped_reports: AtomicU64,
}

impl Shared {
    pub fn new() -> Self {
        Self {
            stats: TickStats::new(),
            snapshot: Arc::new(DoubleBuffer::new(Snapshot::default())),
            stop_requested: AtomicBool::new(false),
            skipped_publishes: AtomicU64::new(0),
            dropped_reports: AtomicU64::new(0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Control {
    Pause,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Fault,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExitReason {
    Paused,
    Stopped,
    Faulted,
}

pub(crate) struct WorkerExit {
    pub engine: Engine,
    pub control: Receiver<Control>,
    pub reason: ExitReason,
}

pub(crate) struct Driver {
    shared: Arc<Shared>,
    reports: SyncSender<ExecReport>,
    period: Duration,
    overrun_reporting: bool,
    abort_limit: Option<u32>,
    consecutive_aborts: u32,
}

impl Driver {
    pub fn new(shared: Arc<Shared>, reports: SyncSender<ExecReport>, config: &ExecConfig) -> Self {
        Self {
            shared,
            reports,
            period: config.period(),
            overrun_reporting: config.overrun_reporting,
            abort_limit: config.fault_on_consecutive_aborts,
            consecutive_aborts: 0,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Never blocks: a full report queue drops the report and counts it.
    pub fn report(&self, report: ExecReport) {
        match self.reports.try_send(report) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.shared.dropped_reports.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Run one tick of `engine`.
    pub fn step(&mut self, engine: &mut Engine) -> (TickOutcome, TickStamp, Flow) {
        let timer = TickTimer::start(engine.next_tick());
        let outcome = engine.tick();
        let stamp = timer.stop();
        self.shared.stats.record(&stamp, outcome.is_completed());

        let flow = match &outcome {
            TickOutcome::Completed { .. } => {
                self.consecutive_aborts = 0;
                if !self.shared.snapshot.publish(|s| engine.fill_snapshot(s)) {
                    self.shared.skipped_publishes.fetch_add(1, Ordering::Relaxed);
                }
                Flow::Continue
            }
            TickOutcome::Aborted {
                tick,
                system,
                error,
            } => {
                self.consecutive_aborts += 1;
                let name = engine.system_name(*system);
                let limit_hit = self
                    .abort_limit
                    .is_some_and(|limit| self.consecutive_aborts >= limit);
                if error.is_fatal() || limit_hit {
                    error!(
                        tick,
                        system = name,
                        error = %error,
                        consecutive = self.consecutive_aborts,
                        "execution faulted"
                    );
                    self.report(ExecReport::Faulted {
                        tick: *tick,
                        system: *system,
                        error: error.clone(),
                    });
                    Flow::Fault
                } else {
                    warn!(tick, system = name, error = %error, "tick aborted");
                    self.report(ExecReport::TickAborted {
                        tick: *tick,
                        system: *system,
                        error: error.clone(),
                    });
                    Flow::Continue
                }
            }
        };

        if stamp.overran(self.period) {
            self.shared.stats.record_overrun();
            if self.overrun_reporting {
                warn!(
                    tick = stamp.tick,
                    duration_us = stamp.duration().as_micros() as u64,
                    period_us = self.period.as_micros() as u64,
                    "tick overran its period"
                );
                self.report(ExecReport::Overrun {
                    stamp,
                    period: self.period,
                });
            }
        }

        (outcome, stamp, flow)
    }

    pub fn reset_aborts(&mut self) {
        self.consecutive_aborts = 0;
    }
}

/// Body of the real-time thread. Ticks at the driver's period until told to
/// pause or stop, or until a fault.
pub(crate) fn run(mut engine: Engine, mut driver: Driver, control: Receiver<Control>) -> (WorkerExit, Driver) {
    info!(
        period_us = driver.period().as_micros() as u64,
        first_tick = engine.next_tick(),
        "real-time loop started"
    );

    let mut deadline = Instant::now();
    let reason = loop {
        match wait_until(&control, deadline) {
            Some(Control::Pause) => break ExitReason::Paused,
            Some(Control::Stop) => break ExitReason::Stopped,
            None => {}
        }
        if driver.shared.stop_requested.load(Ordering::Acquire) {
            break ExitReason::Stopped;
        }

        let (_, _, flow) = driver.step(&mut engine);
        if flow == Flow::Fault {
            break ExitReason::Faulted;
        }

        deadline += driver.period();
        let now = Instant::now();
        if deadline < now {
            // Late: start the next tick now rather than bursting to catch up.
            deadline = now;
        }
    };

    if reason != ExitReason::Paused {
        driver.report(ExecReport::Stopped {
            ticks: driver.shared.stats.count(),
        });
    }
    info!(reason = ?reason, ticks = driver.shared.stats.count(), "real-time loop exited");

    (
        WorkerExit {
            engine,
            control,
            reason,
        },
        driver,
    )
}

/// Block until `deadline` or a control message, whichever comes first.
fn wait_until(control: &Receiver<Control>, deadline: Instant) -> Option<Control> {
    let now = Instant::now();
    let received = if deadline > now {
        control.recv_timeout(deadline - now)
    } else {
        control.try_recv().map_err(|err| match err {
            TryRecvError::Empty => RecvTimeoutError::Timeout,
            TryRecvError::Disconnected => RecvTimeoutError::Disconnected,
        })
    };
    match received {
        Ok(message) => Some(message),
        Err(RecvTimeoutError::Timeout) => None,
        Err(RecvTimeoutError::Disconnected) => Some(Control::Stop),
    }
}
