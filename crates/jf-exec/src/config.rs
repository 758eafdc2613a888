//! Executor configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ExecError, ExecResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecConfig {
    /// Tick rate of the real-time loop.
    pub rate_hz: f64,
    /// Name given to the real-time thread.
    pub thread_name: String,
    /// Send an [`ExecReport::Overrun`](crate::ExecReport::Overrun) for every
    /// tick that exceeds its period. Overruns are counted either way.
    pub overrun_reporting: bool,
    /// Stop after this many aborted ticks in a row.
    pub fault_on_consecutive_aborts: Option<u32>,
    /// Reports beyond this many unread ones are dropped and counted.
    pub report_capacity: usize,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            rate_hz: 500.0,
            thread_name: "jf-rt".to_string(),
            overrun_reporting: true,
            fault_on_consecutive_aborts: None,
            report_capacity: 1024,
        }
    }
}

impl ExecConfig {
    pub fn with_rate(mut self, rate_hz: f64) -> Self {
        self.rate_hz = rate_hz;
        self
    }

    pub fn from_yaml(text: &str) -> ExecResult<Self> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ExecResult<()> {
        if !(self.rate_hz > 0.0 && self.rate_hz.is_finite()) {
            return Err(ExecError::Config {
                what: format!("rate_hz must be positive and finite, got {}", self.rate_hz),
            });
        }
        if self.thread_name.is_empty() {
            return Err(ExecError::Config {
                what: "thread_name must not be empty".into(),
            });
        }
        if self.fault_on_consecutive_aborts == Some(0) {
            return Err(ExecError::Config {
                what: "fault_on_consecutive_aborts must be at least 1".into(),
            });
        }
        if self.report_capacity == 0 {
            return Err(ExecError::Config {
                what: "report_capacity must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// Tick period, rounded to the nanosecond.
    pub fn period(&self) -> Duration {
        Duration::from_nanos((1e9 / self.rate_hz).round() as u64)
    }
}
