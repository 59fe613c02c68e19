//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Rule pipeline and decisions produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (decision and reload counters, rule gauge)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Structured fields on every event (service, stage, generation)
//! - Metrics are cheap and no-ops until a recorder is installed
//! - Per-decision events are debug level; reloads are info

pub mod logging;
pub mod metrics;
