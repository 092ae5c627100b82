//! End-to-end autoload scenarios over real descriptor trees.

use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use autokit::inventory;
use autokit::{BootstrapRegistration, ModuleLookup, ModuleValue};
use tempfile::tempdir;

static FORTYONE_RUNS: AtomicUsize = AtomicUsize::new(0);
static X_FIRST_RUNS: AtomicUsize = AtomicUsize::new(0);
static X_SECOND_RUNS: AtomicUsize = AtomicUsize::new(0);

fn sum_bootstrap(ctx: &dyn ModuleLookup) -> anyhow::Result<ModuleValue> {
    let b = ctx.get_module("b")?;
    let b = b
        .downcast_ref::<i64>()
        .copied()
        .ok_or_else(|| anyhow::anyhow!("module 'b' must export an i64"))?;
    Ok(Arc::new(1 + b))
}

fn fortyone_bootstrap(_ctx: &dyn ModuleLookup) -> anyhow::Result<ModuleValue> {
    FORTYONE_RUNS.fetch_add(1, Ordering::SeqCst);
    Ok(Arc::new(41i64))
}

fn x_first_bootstrap(_ctx: &dyn ModuleLookup) -> anyhow::Result<ModuleValue> {
    X_FIRST_RUNS.fetch_add(1, Ordering::SeqCst);
    Ok(Arc::new("first".to_string()))
}

fn x_second_bootstrap(_ctx: &dyn ModuleLookup) -> anyhow::Result<ModuleValue> {
    X_SECOND_RUNS.fetch_add(1, Ordering::SeqCst);
    Ok(Arc::new("second".to_string()))
}

inventory::submit! {
    BootstrapRegistration::new("e2e::sum", sum_bootstrap)
}
inventory::submit! {
    BootstrapRegistration::new("e2e::fortyone", fortyone_bootstrap)
}
inventory::submit! {
    BootstrapRegistration::new("e2e::x_first", x_first_bootstrap)
}
inventory::submit! {
    BootstrapRegistration::new("e2e::x_second", x_second_bootstrap)
}

#[test]
fn eager_module_pulls_lazy_dependency_through_the_context() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("a.auto.json"),
        r#"{"id": "a", "bootstrap": "e2e::sum"}"#,
    )
    .unwrap();
    fs::write(
        dir.path().join("b.auto.yaml"),
        "id: b\nbootstrap: e2e::fortyone\nlazy: true\n",
    )
    .unwrap();

    // "a" is eager; constructing the context resolves it, which pulls lazy
    // "b" in as a side effect.
    let context = autokit::run([dir.path()]).unwrap();

    assert_eq!(*context.get_module_as::<i64>("a").unwrap(), 42);
    assert_eq!(*context.get_module_as::<i64>("b").unwrap(), 41);
    assert_eq!(FORTYONE_RUNS.load(Ordering::SeqCst), 1);
}

#[test]
fn later_directory_overwrites_earlier_id() {
    let first = tempdir().unwrap();
    let second = tempdir().unwrap();
    fs::write(
        first.path().join("x.auto.json"),
        r#"{"id": "x", "bootstrap": "e2e::x_first", "lazy": true}"#,
    )
    .unwrap();
    fs::write(
        second.path().join("x.auto.json"),
        r#"{"id": "x", "bootstrap": "e2e::x_second", "lazy": true}"#,
    )
    .unwrap();

    let context = autokit::run([first.path(), second.path()]).unwrap();

    assert_eq!(*context.get_module_as::<String>("x").unwrap(), "second");
    assert_eq!(X_FIRST_RUNS.load(Ordering::SeqCst), 0);
    assert_eq!(X_SECOND_RUNS.load(Ordering::SeqCst), 1);
}

#[test]
fn static_manifest_is_its_own_export() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("settings.auto.yaml"),
        "id: settings\nretries: 3\nendpoint: http://localhost:8087\n",
    )
    .unwrap();

    let context = autokit::run([dir.path()]).unwrap();
    let settings = context
        .get_module_as::<serde_json::Value>("settings")
        .unwrap();
    assert_eq!(settings["id"], "settings");
    assert_eq!(settings["retries"], 3);
    assert_eq!(settings["endpoint"], "http://localhost:8087");
}

#[test]
fn descriptor_without_id_fails_the_whole_run() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("anon.auto.json"), r#"{"retries": 3}"#).unwrap();

    let err = autokit::run([dir.path()]).unwrap_err();
    assert!(err.to_string().contains("context construction"));
}

#[test]
fn empty_directory_set_yields_an_empty_context() {
    let context = autokit::run(Vec::<std::path::PathBuf>::new()).unwrap();
    assert!(context.get_module("anything").is_err());
}
