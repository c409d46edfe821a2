//! The watch engine: recursive subscription, event loop, and teardown.

use std::path::{Path, PathBuf};

use notify::{Event, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::time;

use super::error::WatchError;
use super::event::ChangeKind;
use super::gate::ReloadGate;
use super::liveness;
use super::registry::{WatchRegistry, WatchTarget};

/// Callback invoked when a debounced change is detected.
///
/// Receives the engine itself so it can inspect [`WatchEngine::roots`],
/// call [`WatchEngine::clear`], or [`WatchEngine::reset`] the gate when
/// automatic re-arming is disabled.
pub type ReloadCallback = Box<dyn FnMut(&mut WatchEngine) + Send>;

/// Watches a set of source trees and fires a reload callback once per burst
/// of changes, after a fixed quiescence window.
///
/// Single-threaded by design: the engine owns the registry, the gate, and
/// the underlying `notify` watcher for its whole lifetime, and all watch
/// state is touched only from the [`run`](Self::run) task. Run it on a
/// current-thread runtime.
pub struct WatchEngine {
    /// Paths explicitly requested by the caller. Seeds the recursive
    /// subscriber; discovered children live only in the registry.
    roots: Vec<PathBuf>,
    /// Active subscriptions, keyed by path.
    registry: WatchRegistry,
    /// Debounce/arming state.
    gate: ReloadGate,
    /// Extension allow-list for individual file subscriptions.
    extensions: Vec<String>,
    /// Whether the gate resets automatically after the callback returns.
    rearm: bool,
    /// Pid of the supervised server process, checked once at startup.
    pid: u32,
    /// Reload callback. Taken out of the slot for the duration of a call so
    /// the engine can be passed to it mutably.
    callback: Option<ReloadCallback>,
    /// Channel carrying raw notifications out of the notify backend.
    event_rx: mpsc::Receiver<notify::Result<Event>>,
    /// The underlying file watcher. Held for the engine's lifetime; its
    /// subscriptions are keyed by path, so the registry paths double as
    /// unwatch handles.
    watcher: notify::RecommendedWatcher,
}

impl WatchEngine {
    /// Create a builder for configuring the engine.
    pub fn builder() -> WatchEngineBuilder {
        WatchEngineBuilder::new()
    }

    /// Start watching. Does not return under normal operation.
    ///
    /// Startup order matters: the liveness gate and the empty-root check run
    /// before any subscription call, and a failed root subscription releases
    /// everything subscribed so far before surfacing the error. No partial
    /// engine is left running.
    pub async fn run(&mut self) -> Result<(), WatchError> {
        liveness::ensure_alive(self.pid)?;

        if self.roots.is_empty() {
            return Err(WatchError::EmptyWatchList);
        }

        let roots = self.roots.clone();
        for root in &roots {
            if let Err(e) = self.subscribe(root, true) {
                self.clear();
                return Err(e);
            }
        }

        crate::log_event!(
            "watcher",
            "watching",
            "{} paths under {} roots",
            self.registry.len(),
            self.roots.len()
        );

        loop {
            let deadline = self.gate.deadline();

            tokio::select! {
                maybe = self.event_rx.recv() => match maybe {
                    Some(Ok(event)) => self.handle_event(event),
                    Some(Err(e)) => {
                        // Transient backend failure; the next batch is still
                        // worth waiting for.
                        tracing::error!("[watcher] notification error: {e}");
                    }
                    None => return Err(WatchError::ChannelClosed),
                },

                _ = async {
                    match deadline {
                        Some(at) => time::sleep_until(time::Instant::from_std(at)).await,
                        None => std::future::pending::<()>().await,
                    }
                } => {
                    self.trigger();
                }
            }
        }
    }

    /// Subscribe `path` and its matching descendants for change notifications.
    ///
    /// Idempotent: a path already in the registry returns immediately, which
    /// also keeps recursive descent from looping. Directories are watched
    /// themselves and descended into; regular files are watched individually
    /// when their extension is on the allow-list. Watching both the directory
    /// and the file tolerates backends that report only one of the two, at
    /// the cost of duplicate notifications the gate absorbs anyway.
    ///
    /// On failure partway through the walk, paths subscribed earlier in the
    /// call remain registered; call [`clear`](Self::clear) to release them.
    /// [`run`](Self::run) does exactly that when a root fails.
    pub fn subscribe(&mut self, path: &Path, is_root: bool) -> Result<(), WatchError> {
        if !path.is_dir() {
            return Err(WatchError::NotADirectory {
                path: path.to_path_buf(),
            });
        }

        if self.registry.contains(path) {
            return Ok(());
        }

        if is_root && !self.roots.iter().any(|r| r == path) {
            self.roots.push(path.to_path_buf());
        }

        self.watch_path(path, is_root)?;

        let entries = std::fs::read_dir(path).map_err(|e| WatchError::PathWatchFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("[watcher] unreadable entry under {}: {e}", path.display());
                    continue;
                }
            };

            let child = entry.path();
            if child.is_dir() {
                self.subscribe(&child, false)?;
            } else if self.matches_extension(&child) && !self.registry.contains(&child) {
                self.watch_path(&child, false)?;
            }
        }

        Ok(())
    }

    /// Unsubscribe every watch target and empty the registry.
    ///
    /// Best-effort: an individual unwatch failure (already torn down by the
    /// OS, say) is logged and iteration continues, so no remaining handle is
    /// leaked. Calling this on an empty registry is a no-op. Safe to call
    /// from inside the reload callback.
    pub fn clear(&mut self) {
        for target in self.registry.take_all() {
            if let Err(e) = self.watcher.unwatch(&target.path) {
                tracing::warn!("[watcher] unwatch {} failed: {e}", target.path.display());
            }
        }
        crate::debug_event!("watcher", "cleared");
    }

    /// Disarm the gate so the next qualifying event starts a fresh burst.
    ///
    /// Only needed from the callback when the engine was built with
    /// `rearm(false)`.
    pub fn reset(&mut self) {
        self.gate.reset();
    }

    /// The roots explicitly requested by the caller.
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// The active subscription registry.
    pub fn registry(&self) -> &WatchRegistry {
        &self.registry
    }

    /// Whether a deferred reload is currently scheduled.
    pub fn is_reloading(&self) -> bool {
        self.gate.is_armed()
    }

    /// Classify one raw notification and arm the gate when it qualifies.
    pub(crate) fn handle_event(&mut self, event: Event) {
        let kind = ChangeKind::classify(&event);
        if !kind.qualifies() {
            crate::debug_event!("watcher", "ignored", "{kind:?} {:?}", event.paths);
            return;
        }

        if self.gate.arm() {
            crate::log_event!(
                "watcher",
                "change detected",
                "{kind:?} {:?}, reload in {}ms",
                event.paths,
                self.gate.window().as_millis()
            );
        } else {
            crate::debug_event!("watcher", "absorbed", "{kind:?} {:?}", event.paths);
        }
    }

    /// Fire the reload callback for the pending burst.
    pub(crate) fn trigger(&mut self) {
        crate::log_event!("watcher", "reload");

        if let Some(mut callback) = self.callback.take() {
            callback(self);
            self.callback = Some(callback);
        }

        // Disarm only after the callback has run: events raised during its
        // execution collapse into the burst that just fired.
        if self.rearm {
            self.gate.reset();
        }
    }

    fn watch_path(&mut self, path: &Path, is_root: bool) -> Result<(), WatchError> {
        self.watcher
            .watch(path, RecursiveMode::NonRecursive)
            .map_err(|e| WatchError::PathWatchFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        self.registry.insert(WatchTarget::new(path.to_path_buf(), is_root));
        crate::debug_event!("watcher", "subscribed", "{}", path.display());
        Ok(())
    }

    fn matches_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
    }
}

/// Builder for constructing a [`WatchEngine`].
pub struct WatchEngineBuilder {
    roots: Vec<PathBuf>,
    extensions: Vec<String>,
    debounce_ms: u64,
    rearm: bool,
    pid: Option<u32>,
    callback: Option<ReloadCallback>,
}

impl WatchEngineBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        Self {
            roots: Vec::new(),
            extensions: vec!["php".to_string()],
            debounce_ms: 1000,
            rearm: true,
            pid: None,
            callback: None,
        }
    }

    /// Add a root directory to watch.
    pub fn root(mut self, path: impl Into<PathBuf>) -> Self {
        self.roots.push(path.into());
        self
    }

    /// Set all root directories at once.
    pub fn roots(mut self, roots: impl IntoIterator<Item = PathBuf>) -> Self {
        self.roots = roots.into_iter().collect();
        self
    }

    /// Set the file extension allow-list.
    pub fn extensions(mut self, extensions: impl IntoIterator<Item = String>) -> Self {
        self.extensions = extensions.into_iter().collect();
        self
    }

    /// Set the quiescence window in milliseconds.
    pub fn debounce_ms(mut self, ms: u64) -> Self {
        self.debounce_ms = ms;
        self
    }

    /// Whether the gate re-arms automatically after the callback returns.
    /// When false, the callback must call [`WatchEngine::reset`] itself or
    /// no further reloads fire.
    pub fn rearm(mut self, rearm: bool) -> Self {
        self.rearm = rearm;
        self
    }

    /// Set the pid of the supervised server process.
    pub fn pid(mut self, pid: u32) -> Self {
        self.pid = Some(pid);
        self
    }

    /// Set the reload callback.
    pub fn callback(mut self, callback: impl FnMut(&mut WatchEngine) + Send + 'static) -> Self {
        self.callback = Some(Box::new(callback));
        self
    }

    /// Build the engine. Creates the notify backend but subscribes nothing;
    /// subscription happens in [`WatchEngine::run`].
    pub fn build(self) -> Result<WatchEngine, WatchError> {
        let pid = self.pid.ok_or_else(|| WatchError::InitFailed {
            reason: "supervised pid is required".to_string(),
        })?;

        let callback = self.callback.ok_or_else(|| WatchError::InitFailed {
            reason: "reload callback is required".to_string(),
        })?;

        let (tx, rx) = mpsc::channel(100);
        let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = tx.blocking_send(res);
        })?;

        Ok(WatchEngine {
            roots: self.roots,
            registry: WatchRegistry::new(),
            gate: ReloadGate::new(self.debounce_ms),
            extensions: self.extensions,
            rearm: self.rearm,
            pid,
            callback: Some(callback),
            event_rx: rx,
            watcher,
        })
    }
}

impl Default for WatchEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::EventKind;
    use notify::event::{CreateKind, DataChange, Flag, ModifyKind};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn test_engine(triggers: Arc<AtomicUsize>) -> WatchEngine {
        WatchEngine::builder()
            .pid(std::process::id())
            .callback(move |_engine| {
                triggers.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap()
    }

    fn modify_event() -> Event {
        Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
    }

    #[test]
    fn test_burst_arms_gate_once() {
        let triggers = Arc::new(AtomicUsize::new(0));
        let mut engine = test_engine(triggers.clone());

        engine.handle_event(modify_event());
        assert!(engine.is_reloading());

        engine.handle_event(Event::new(EventKind::Create(CreateKind::File)));
        engine.handle_event(modify_event());
        assert!(engine.is_reloading());

        engine.trigger();
        assert_eq!(triggers.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_rearm_after_trigger() {
        let triggers = Arc::new(AtomicUsize::new(0));
        let mut engine = test_engine(triggers.clone());

        engine.handle_event(modify_event());
        engine.trigger();
        assert!(!engine.is_reloading());

        // A fresh burst after the callback completed arms a new trigger.
        engine.handle_event(modify_event());
        assert!(engine.is_reloading());
        engine.trigger();
        assert_eq!(triggers.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_no_rearm_latches_until_reset() {
        let triggers = Arc::new(AtomicUsize::new(0));
        let counter = triggers.clone();
        let mut engine = WatchEngine::builder()
            .pid(std::process::id())
            .rearm(false)
            .callback(move |_engine| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap();

        engine.handle_event(modify_event());
        engine.trigger();

        // Still armed: new events are absorbed, nothing new scheduled.
        assert!(engine.is_reloading());
        engine.handle_event(modify_event());
        assert_eq!(triggers.load(Ordering::SeqCst), 1);

        engine.reset();
        engine.handle_event(modify_event());
        assert!(engine.is_reloading());
    }

    #[test]
    fn test_subscription_removed_does_not_arm() {
        let triggers = Arc::new(AtomicUsize::new(0));
        let mut engine = test_engine(triggers.clone());

        engine.handle_event(modify_event().set_flag(Flag::Rescan));
        assert!(!engine.is_reloading());
        assert_eq!(triggers.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_callback_can_clear_engine() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = WatchEngine::builder()
            .pid(std::process::id())
            .callback(|engine: &mut WatchEngine| {
                engine.clear();
            })
            .build()
            .unwrap();

        engine.subscribe(dir.path(), true).unwrap();
        assert!(!engine.registry().is_empty());

        engine.handle_event(modify_event());
        engine.trigger();
        assert!(engine.registry().is_empty());
    }

    #[test]
    fn test_build_requires_pid_and_callback() {
        let missing_pid = WatchEngine::builder()
            .callback(|_: &mut WatchEngine| {})
            .build();
        assert!(matches!(missing_pid, Err(WatchError::InitFailed { .. })));

        let missing_callback = WatchEngine::builder().pid(std::process::id()).build();
        assert!(matches!(
            missing_callback,
            Err(WatchError::InitFailed { .. })
        ));
    }
}
