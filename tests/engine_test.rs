//! Integration tests for the watch engine against real directory trees.

use std::fs;
use std::path::Path;
use std::time::Duration;

use devwatch::{WatchEngine, WatchError};
use tokio::sync::mpsc;
use tokio::time::timeout;

/// Engine with a no-op callback and the test process as supervised pid.
fn test_engine(extensions: &[&str]) -> WatchEngine {
    WatchEngine::builder()
        .pid(std::process::id())
        .extensions(extensions.iter().map(|e| e.to_string()))
        .callback(|_: &mut WatchEngine| {})
        .build()
        .expect("engine should build")
}

#[test]
fn test_recursive_coverage_with_extension_filter() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    fs::write(root.join("a.php"), "<?php\n").unwrap();
    fs::write(root.join("b.txt"), "notes\n").unwrap();
    fs::create_dir(root.join("sub")).unwrap();
    fs::write(root.join("sub/c.php"), "<?php\n").unwrap();

    let mut engine = test_engine(&["php"]);
    engine.subscribe(root, true).unwrap();

    let registry = engine.registry();
    assert!(registry.contains(root));
    assert!(registry.contains(&root.join("sub")));
    assert!(registry.contains(&root.join("a.php")));
    assert!(registry.contains(&root.join("sub/c.php")));
    assert!(!registry.contains(&root.join("b.txt")));
    assert_eq!(registry.len(), 4);

    // Root flag reflects how each path was reached.
    assert!(registry.get(root).unwrap().is_root);
    assert!(!registry.get(&root.join("sub")).unwrap().is_root);
    assert_eq!(engine.roots(), &[root.to_path_buf()]);
}

#[test]
fn test_subscribe_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.php"), "<?php\n").unwrap();

    let mut engine = test_engine(&["php"]);
    engine.subscribe(dir.path(), true).unwrap();
    let count = engine.registry().len();

    engine.subscribe(dir.path(), true).unwrap();
    assert_eq!(engine.registry().len(), count);
    assert_eq!(engine.roots().len(), 1);
}

#[test]
fn test_missing_directory_adds_nothing() {
    let mut engine = test_engine(&["php"]);

    let err = engine
        .subscribe(Path::new("/no/such/dir"), true)
        .unwrap_err();
    assert!(matches!(err, WatchError::NotADirectory { .. }));
    assert!(engine.registry().is_empty());
}

#[test]
fn test_regular_file_is_not_a_valid_root() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("a.php");
    fs::write(&file, "<?php\n").unwrap();

    let mut engine = test_engine(&["php"]);
    let err = engine.subscribe(&file, true).unwrap_err();
    assert!(matches!(err, WatchError::NotADirectory { .. }));
    assert!(engine.registry().is_empty());
}

#[test]
fn test_clear_releases_everything_and_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.php"), "<?php\n").unwrap();
    fs::create_dir(dir.path().join("sub")).unwrap();

    let mut engine = test_engine(&["php"]);
    engine.subscribe(dir.path(), true).unwrap();
    assert!(!engine.registry().is_empty());

    engine.clear();
    assert!(engine.registry().is_empty());

    // Clearing an empty registry is a no-op.
    engine.clear();
    assert!(engine.registry().is_empty());
}

#[test]
fn test_failed_subscribe_keeps_prior_subscriptions_until_clear() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.php"), "<?php\n").unwrap();

    let mut engine = test_engine(&["php"]);
    engine.subscribe(dir.path(), true).unwrap();
    let subscribed = engine.registry().len();

    // A later failing call leaves the earlier subscriptions registered;
    // releasing them is the caller's job via clear().
    let err = engine
        .subscribe(Path::new("/no/such/dir"), true)
        .unwrap_err();
    assert!(matches!(err, WatchError::NotADirectory { .. }));
    assert_eq!(engine.registry().len(), subscribed);

    engine.clear();
    assert!(engine.registry().is_empty());
}

#[tokio::test]
async fn test_run_rejects_empty_watch_list() {
    let mut engine = test_engine(&["php"]);

    let err = engine.run().await.unwrap_err();
    assert!(matches!(err, WatchError::EmptyWatchList));
    assert!(engine.registry().is_empty());
}

#[tokio::test]
async fn test_liveness_gate_runs_before_any_subscription() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.php"), "<?php\n").unwrap();

    // Linux pid_max tops out at 2^22; this pid cannot exist.
    let mut engine = WatchEngine::builder()
        .root(dir.path())
        .pid(u32::MAX / 2)
        .callback(|_: &mut WatchEngine| {})
        .build()
        .unwrap();

    let err = engine.run().await.unwrap_err();
    assert!(matches!(err, WatchError::ProcessNotFound { .. }));
    assert!(engine.registry().is_empty());
}

#[tokio::test]
async fn test_failed_root_releases_partial_subscriptions() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.php"), "<?php\n").unwrap();

    let mut engine = WatchEngine::builder()
        .root(dir.path())
        .root("/no/such/dir")
        .pid(std::process::id())
        .callback(|_: &mut WatchEngine| {})
        .build()
        .unwrap();

    let err = engine.run().await.unwrap_err();
    assert!(matches!(err, WatchError::NotADirectory { .. }));

    // The first root was subscribed, then torn down on failure.
    assert!(engine.registry().is_empty());
}

#[tokio::test]
async fn test_burst_collapses_to_single_reload() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_path_buf();
    fs::write(root.join("index.php"), "<?php\n").unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut engine = WatchEngine::builder()
        .root(&root)
        .extensions(vec!["php".to_string()])
        .debounce_ms(300)
        .pid(std::process::id())
        .callback(move |_: &mut WatchEngine| {
            let _ = tx.send(());
        })
        .build()
        .unwrap();

    tokio::spawn(async move {
        let _ = engine.run().await;
    });

    // Let the subscriptions land before writing.
    tokio::time::sleep(Duration::from_millis(200)).await;

    fs::write(root.join("index.php"), "<?php // one\n").unwrap();
    fs::write(root.join("index.php"), "<?php // two\n").unwrap();
    fs::write(root.join("new.php"), "<?php\n").unwrap();

    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("reload should fire within the window")
        .unwrap();

    // The whole burst produced exactly one reload.
    assert!(
        timeout(Duration::from_millis(600), rx.recv()).await.is_err(),
        "burst must not fire a second reload"
    );

    // A fresh burst after the reload re-arms the gate.
    fs::write(root.join("index.php"), "<?php // three\n").unwrap();
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("second burst should fire a new reload")
        .unwrap();
}
