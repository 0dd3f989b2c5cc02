use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use tempfile::TempDir;

use buildwatch::config::{BuildSection, DebounceOverride, SourceConfig, WatchSection};
use buildwatch::watch::{PathFilter, SourceDiscovery};

type TestResult = Result<(), Box<dyn Error>>;

fn source_entry(input: &str, output: &str) -> SourceConfig {
    SourceConfig {
        input: input.to_string(),
        output: output.to_string(),
        watch: Vec::new(),
        label: None,
        cmd: None,
        debounce_ms: None,
    }
}

fn build_section() -> BuildSection {
    BuildSection {
        cmd: Some("compile {input} {output}".to_string()),
    }
}

fn project() -> Result<(TempDir, PathBuf), Box<dyn Error>> {
    let tmp = TempDir::new()?;
    let root = tmp.path().canonicalize()?;
    Ok((tmp, root))
}

#[test]
fn concrete_entry_resolves_paths_and_roots() -> TestResult {
    let (_tmp, root) = project()?;
    fs::create_dir_all(root.join("assets"))?;
    fs::create_dir_all(root.join("templates"))?;
    fs::write(root.join("assets/app.tailwind.css"), "@tailwind base;")?;

    let mut entry = source_entry("assets/app.tailwind.css", "public/app.css");
    entry.watch = vec!["templates".to_string()];

    let discovery = SourceDiscovery::new(
        root.clone(),
        vec![entry],
        build_section(),
        WatchSection::default(),
        PathFilter::new(root.clone(), &[])?,
    );

    let sources = discovery.discover()?;
    assert_eq!(sources.len(), 1);

    let source = &sources[0];
    assert_eq!(source.input, root.join("assets/app.tailwind.css"));
    assert_eq!(source.output, root.join("public/app.css"));
    assert_eq!(source.label, "assets/app.tailwind.css");
    assert_eq!(source.debounce, Duration::from_millis(250));
    assert_eq!(source.cmd, "compile {input} {output}");

    assert!(source.watch_roots.contains(&root.join("assets")));
    assert!(source.watch_roots.contains(&root.join("templates")));

    Ok(())
}

#[test]
fn glob_entry_expands_to_one_source_per_match() -> TestResult {
    let (_tmp, root) = project()?;
    for app in ["a", "b"] {
        fs::create_dir_all(root.join(format!("apps/{app}")))?;
        fs::write(
            root.join(format!("apps/{app}/app.tailwind.css")),
            "@tailwind base;",
        )?;
    }

    let discovery = SourceDiscovery::new(
        root.clone(),
        vec![source_entry("apps/*/app.tailwind.css", "{dir}/{stem}.css")],
        build_section(),
        WatchSection::default(),
        PathFilter::new(root.clone(), &[])?,
    );

    let sources = discovery.discover()?;
    assert_eq!(sources.len(), 2);

    // Matches are sorted for a stable set.
    assert_eq!(sources[0].input, root.join("apps/a/app.tailwind.css"));
    assert_eq!(sources[0].output, root.join("apps/a/app.css"));
    assert_eq!(sources[0].label, "apps/a/app.tailwind.css");

    assert_eq!(sources[1].input, root.join("apps/b/app.tailwind.css"));
    assert_eq!(sources[1].output, root.join("apps/b/app.css"));

    Ok(())
}

#[test]
fn glob_expansion_skips_excluded_directories() -> TestResult {
    let (_tmp, root) = project()?;
    fs::create_dir_all(root.join("apps/real"))?;
    fs::write(root.join("apps/real/app.tailwind.css"), "")?;
    fs::create_dir_all(root.join("node_modules/pkg"))?;
    fs::write(root.join("node_modules/pkg/app.tailwind.css"), "")?;

    let discovery = SourceDiscovery::new(
        root.clone(),
        vec![source_entry("**/app.tailwind.css", "{dir}/{stem}.css")],
        build_section(),
        WatchSection::default(),
        PathFilter::new(root.clone(), &[])?,
    );

    let sources = discovery.discover()?;
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0].input, root.join("apps/real/app.tailwind.css"));

    Ok(())
}

#[test]
fn debounce_overrides_apply_per_pattern() -> TestResult {
    let (_tmp, root) = project()?;
    fs::create_dir_all(root.join("assets"))?;
    fs::write(root.join("assets/app.scss"), "")?;
    fs::write(root.join("assets/app.tailwind.css"), "")?;

    let watch = WatchSection {
        overrides: vec![DebounceOverride {
            pattern: "**/*.scss".to_string(),
            debounce_ms: 600,
        }],
        ..WatchSection::default()
    };

    let mut slow = source_entry("assets/app.scss", "public/app.css");
    slow.label = Some("slow".to_string());
    let fast = source_entry("assets/app.tailwind.css", "public/tw.css");
    let mut explicit = source_entry("assets/app.scss", "public/app2.css");
    explicit.debounce_ms = Some(50);

    let discovery = SourceDiscovery::new(
        root.clone(),
        vec![slow, fast, explicit],
        build_section(),
        watch,
        PathFilter::new(root.clone(), &[])?,
    );

    let sources = discovery.discover()?;
    assert_eq!(sources.len(), 3);

    // Override pattern matched the scss input.
    assert_eq!(sources[0].label, "slow");
    assert_eq!(sources[0].debounce, Duration::from_millis(600));

    // Untouched by the override: global default.
    assert_eq!(sources[1].debounce, Duration::from_millis(250));

    // Per-source value beats the override pattern.
    assert_eq!(sources[2].debounce, Duration::from_millis(50));

    Ok(())
}

#[test]
fn global_watch_roots_attach_to_every_source() -> TestResult {
    let (_tmp, root) = project()?;
    fs::create_dir_all(root.join("assets"))?;
    fs::create_dir_all(root.join("shared"))?;
    fs::write(root.join("assets/app.tailwind.css"), "")?;

    let watch = WatchSection {
        roots: vec!["shared".to_string()],
        ..WatchSection::default()
    };

    let discovery = SourceDiscovery::new(
        root.clone(),
        vec![source_entry("assets/app.tailwind.css", "public/app.css")],
        build_section(),
        watch,
        PathFilter::new(root.clone(), &[])?,
    );

    let sources = discovery.discover()?;
    assert!(sources[0].watch_roots.contains(&root.join("shared")));

    Ok(())
}

#[test]
fn per_source_cmd_overrides_the_default() -> TestResult {
    let (_tmp, root) = project()?;
    fs::create_dir_all(root.join("assets"))?;
    fs::write(root.join("assets/app.tailwind.css"), "")?;

    let mut entry = source_entry("assets/app.tailwind.css", "public/app.css");
    entry.cmd = Some("tailwindcss -i {input} -o {output}".to_string());

    let discovery = SourceDiscovery::new(
        root.clone(),
        vec![entry],
        build_section(),
        WatchSection::default(),
        PathFilter::new(root.clone(), &[])?,
    );

    let sources = discovery.discover()?;
    assert_eq!(sources[0].cmd, "tailwindcss -i {input} -o {output}");

    Ok(())
}
