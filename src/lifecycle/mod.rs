//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → Identity → Initial rule load → Router
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Reloader stops → Watcher dropped → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//!     SIGHUP → Trigger rule reload
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then identity, then rules
//! - Routing is usable before any watcher is running

pub mod shutdown;
pub mod signals;
pub mod startup;
