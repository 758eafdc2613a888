//! jf-exec: execution of jointflow graphs.
//!
//! The [`ExecutionManager`] owns the graph while it is assembled, derives a
//! schedule for the systems it manages and then runs that schedule once per
//! tick, either synchronously through [`ExecutionManager::tick_once`] or on a
//! dedicated real-time thread.
//!
//! Each tick is all-or-nothing. Values written during a tick only become
//! visible (through [`SnapshotReader`] and [`ExecutionManager::current_value`])
//! once every scheduled system has run. A failing system aborts the tick and
//! the previous tick's values stay current. Failures, overruns and the final
//! stop are delivered as [`ExecReport`]s.
//!
//! # Example
//!
//! ```
//! use jf_core::ValueType;
//! use jf_exec::{ExecConfig, ExecutionManager, TickOutcome};
//! use jf_systems::{Constant, Summer};
//!
//! let mut manager = ExecutionManager::new(ExecConfig::default()).unwrap();
//! let a = manager.add_system("a", Constant::new(2.0_f64)).unwrap();
//! let b = manager.add_system("b", Constant::new(0.5_f64)).unwrap();
//! let diff = manager
//!     .add_system("diff", Summer::<f64>::difference(ValueType::Scalar).unwrap())
//!     .unwrap();
//!
//! let a_out = manager.output::<f64>(a, "value").unwrap();
//! let b_out = manager.output::<f64>(b, "value").unwrap();
//! manager.connect(a_out, manager.input::<f64>(diff, "a").unwrap()).unwrap();
//! manager.connect(b_out, manager.input::<f64>(diff, "b").unwrap()).unwrap();
//! manager.manage(diff).unwrap();
//! manager.finalize().unwrap();
//!
//! assert_eq!(manager.tick_once().unwrap(), TickOutcome::Completed { tick: 1 });
//! let out = manager.output::<f64>(diff, "output").unwrap();
//! assert_eq!(manager.value(out), Some(1.5));
//! ```

mod config;
mod engine;
mod error;
mod manager;
mod port;
mod report;
mod snapshot;
mod worker;

pub use config::ExecConfig;
pub use engine::{Engine, TickOutcome};
pub use error::{ExecError, ExecResult};
pub use manager::{ExecutionManager, ManagerState, StopHandle};
pub use port::{Input, Output};
pub use report::ExecReport;
pub use snapshot::{Snapshot, SnapshotReader};
