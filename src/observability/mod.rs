//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Sessions, processors, listener produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout log stream
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Connection id and exchange id are attached as fields to every session event
//! - Metric updates are no-ops until an exporter is installed

pub mod logging;
pub mod metrics;
