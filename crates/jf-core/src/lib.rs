//! jf-core: stable foundation for jointflow.
//!
//! Contains:
//! - ids (compact handles for systems and ports)
//! - value (the closed set of signal types carried by ports)
//! - numeric (Real + tolerances + float helpers)
//! - timing (tick stamps and accumulated tick statistics)
//! - buffer (single-writer double buffer for cross-thread publishing)
//! - error (shared error types)

pub mod buffer;
pub mod error;
pub mod ids;
pub mod numeric;
pub mod timing;
pub mod value;

pub use buffer::DoubleBuffer;
pub use error::{CoreError, CoreResult};
pub use ids::*;
pub use numeric::*;
pub use timing::{TickStamp, TickStats, TickTimer};
pub use value::{PortValue, Value, ValueKind, ValueType};
