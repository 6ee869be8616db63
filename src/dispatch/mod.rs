//! Admission control and lifecycle observers.
//!
//! # Data Flow
//! ```text
//! Session (head observed, no upgrade)
//!     → hooks.at_request_received
//!     → gate.admit (forward or short-circuit)
//!     → processor.receive (only when forwarded)
//! ```

pub mod gate;
pub mod hooks;

pub use gate::{Admission, DispatchGate};
pub use hooks::{ConnectionHooks, NoopHooks, TracingHooks};
