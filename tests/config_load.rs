use std::error::Error;
use std::fs;

use tempfile::TempDir;

use buildwatch::config::{load_and_validate, ConfigFile};
use buildwatch::services::{Phase, ServiceScheduler};

type TestResult = Result<(), Box<dyn Error>>;

fn load_str(toml: &str) -> anyhow::Result<ConfigFile> {
    let tmp = TempDir::new().expect("tempdir");
    let path = tmp.path().join("Buildwatch.toml");
    fs::write(&path, toml).expect("write config");
    load_and_validate(&path)
}

#[test]
fn full_config_loads_with_defaults() -> TestResult {
    let cfg = load_str(
        r#"
        [watch]
        roots = ["shared"]
        exclude = ["generated"]

        [[watch.override]]
        pattern = "**/*.scss"
        debounce_ms = 600

        [build]
        cmd = "compile {input} {output}"

        [[source]]
        input = "assets/app.tailwind.css"
        output = "public/app.css"
        label = "app css"

        [service.binaries]
        cmd = "bin-fetch --all"
        order = 10
        phases = ["init"]

        [service.icons]
        cmd = "icon-pack build"
        order = 15
        after = ["binaries"]
        phases = ["init"]
        "#,
    )?;

    // Omitted: falls back to the default window.
    assert_eq!(cfg.watch.debounce_ms, 250);
    assert_eq!(cfg.watch.roots, vec!["shared".to_string()]);
    assert_eq!(cfg.watch.overrides.len(), 1);
    assert_eq!(cfg.watch.overrides[0].debounce_ms, 600);

    assert_eq!(cfg.sources.len(), 1);
    assert_eq!(cfg.sources[0].label.as_deref(), Some("app css"));

    assert_eq!(cfg.services.len(), 2);
    assert_eq!(cfg.services["binaries"].order, 10);
    assert_eq!(cfg.services["icons"].after, vec!["binaries".to_string()]);

    Ok(())
}

#[test]
fn config_drives_the_service_plan() -> TestResult {
    let cfg = load_str(
        r#"
        [service.icons]
        cmd = "icon-pack build"
        order = 15
        after = ["binaries"]
        phases = ["init"]

        [service.binaries]
        cmd = "bin-fetch --all"
        order = 10
        phases = ["init"]
        "#,
    )?;

    let scheduler = ServiceScheduler::from_config(&cfg)?;
    let plan = scheduler.plan(Phase::Init);
    assert_eq!(plan.names(), vec!["binaries", "icons"]);
    assert!(plan.ambiguity.is_none());

    assert!(scheduler.plan(Phase::Watch).services.is_empty());

    Ok(())
}

#[test]
fn empty_config_is_rejected() {
    let err = load_str("").unwrap_err();
    assert!(err.to_string().contains("at least one"));
}

#[test]
fn source_without_any_build_command_is_rejected() {
    let err = load_str(
        r#"
        [[source]]
        input = "a.in"
        output = "a.out"
        "#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("no cmd"));
}

#[test]
fn glob_source_requires_output_template() {
    let err = load_str(
        r#"
        [build]
        cmd = "compile {input} {output}"

        [[source]]
        input = "apps/*/app.tailwind.css"
        output = "public/app.css"
        "#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("placeholder"));
}

#[test]
fn zero_debounce_window_is_rejected() {
    let err = load_str(
        r#"
        [watch]
        debounce_ms = 0

        [build]
        cmd = "compile"

        [[source]]
        input = "a.in"
        output = "a.out"
        "#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("debounce_ms"));
}

#[test]
fn self_dependency_is_rejected() {
    let err = load_str(
        r#"
        [service.loopy]
        cmd = "echo loopy"
        after = ["loopy"]
        "#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("depend on itself"));
}

#[test]
fn invalid_phase_name_is_rejected() {
    let err = load_str(
        r#"
        [service.deploy]
        cmd = "echo deploy"
        phases = ["deploy"]
        "#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("invalid phase"));
}

#[test]
fn dependency_cycles_load_fine() -> TestResult {
    // Cycles are a scheduling diagnostic, not a config error.
    let cfg = load_str(
        r#"
        [service.a]
        cmd = "echo a"
        after = ["b"]

        [service.b]
        cmd = "echo b"
        after = ["a"]
        "#,
    )?;

    let scheduler = ServiceScheduler::from_config(&cfg)?;
    let plan = scheduler.plan(Phase::Init);
    assert_eq!(plan.services.len(), 2);
    assert!(plan.ambiguity.is_some());

    Ok(())
}

#[test]
fn unknown_dependency_loads_fine() -> TestResult {
    let cfg = load_str(
        r#"
        [service.x]
        cmd = "echo x"
        after = ["y"]
        "#,
    )?;

    let scheduler = ServiceScheduler::from_config(&cfg)?;
    let plan = scheduler.plan(Phase::Init);
    assert_eq!(plan.names(), vec!["x"]);
    assert!(plan.ambiguity.is_some());

    Ok(())
}
