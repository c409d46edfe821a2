//! Registry of active watch subscriptions.
//!
//! The registry is the source of truth for "already watching": recursive
//! descent consults it before issuing a subscription, so revisiting a path
//! never produces a duplicate handle.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// A single subscribed filesystem path.
///
/// Targets are created when the subscriber first visits a path and are never
/// mutated afterwards; only [`WatchRegistry::take_all`] removes them.
#[derive(Debug, Clone)]
pub struct WatchTarget {
    /// The subscribed path. Stable identity key within the registry.
    pub path: PathBuf,
    /// Whether the caller asked for this path explicitly, as opposed to it
    /// being discovered during recursive descent.
    pub is_root: bool,
}

impl WatchTarget {
    pub fn new(path: PathBuf, is_root: bool) -> Self {
        Self { path, is_root }
    }
}

/// Maps each subscribed path to its watch target.
///
/// Invariant: at most one target per distinct path.
#[derive(Debug, Default)]
pub struct WatchRegistry {
    targets: HashMap<PathBuf, WatchTarget>,
}

impl WatchRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a target. Returns false (and keeps the existing entry) when the
    /// path is already subscribed.
    pub fn insert(&mut self, target: WatchTarget) -> bool {
        if self.targets.contains_key(&target.path) {
            return false;
        }
        self.targets.insert(target.path.clone(), target);
        true
    }

    /// Check whether a path is already subscribed.
    pub fn contains(&self, path: &Path) -> bool {
        self.targets.contains_key(path)
    }

    /// Look up the target for a path.
    pub fn get(&self, path: &Path) -> Option<&WatchTarget> {
        self.targets.get(path)
    }

    /// Iterate over all subscribed paths.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.targets.keys().map(PathBuf::as_path)
    }

    /// Number of active subscriptions.
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Empty the registry, handing every target to the caller for teardown.
    pub fn take_all(&mut self) -> Vec<WatchTarget> {
        std::mem::take(&mut self.targets).into_values().collect()
    }
}
