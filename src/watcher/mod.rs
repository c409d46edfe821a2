//! Watch engine for automatic dev-server reloads.
//!
//! Watches a set of source trees, coalesces bursts of filesystem events into
//! a single reload trigger, and tears everything down cleanly.
//!
//! # Architecture
//!
//! ```text
//! WatchEngine
//!   - Single notify::RecommendedWatcher
//!   - WatchRegistry (path -> subscription, dedup)
//!   - ReloadGate (one trigger per burst)
//!   - Liveness gate on the supervised pid at startup
//!         |
//!   reload callback (caller-supplied)
//! ```

mod engine;
mod error;
mod event;
mod gate;
mod liveness;
mod registry;

pub use engine::{ReloadCallback, WatchEngine, WatchEngineBuilder};
pub use error::WatchError;
pub use event::ChangeKind;
pub use gate::ReloadGate;
pub use liveness::ensure_alive;
pub use registry::{WatchRegistry, WatchTarget};
