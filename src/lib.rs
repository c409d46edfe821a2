pub mod config;
pub mod logging;
pub mod watcher;

pub use config::Settings;
pub use watcher::{
    ChangeKind, ReloadGate, WatchEngine, WatchEngineBuilder, WatchError, WatchRegistry,
    WatchTarget,
};
