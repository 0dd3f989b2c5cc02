use std::error::Error;
use std::path::Path;

use buildwatch::watch::PathFilter;

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn dot_directories_are_excluded_by_convention() -> TestResult {
    let filter = PathFilter::new("/proj", &[])?;

    assert!(filter.excludes_dir(Path::new("/proj/.git")));
    assert!(filter.excludes_dir(Path::new("/proj/a/.cache")));
    assert!(!filter.excludes_dir(Path::new("/proj/assets")));

    Ok(())
}

#[test]
fn builtin_dependency_caches_are_excluded() -> TestResult {
    let filter = PathFilter::new("/proj", &[])?;

    assert!(filter.excludes_dir(Path::new("/proj/node_modules")));
    assert!(filter.excludes_dir(Path::new("/proj/sub/vendor")));
    assert!(filter.excludes_dir(Path::new("/proj/target")));

    Ok(())
}

#[test]
fn configured_names_and_globs_are_excluded() -> TestResult {
    let exclude = vec!["generated".to_string(), "var/cache".to_string()];
    let filter = PathFilter::new("/proj", &exclude)?;

    // Plain name: excluded anywhere in the tree.
    assert!(filter.excludes_dir(Path::new("/proj/a/generated")));

    // Glob with a slash: matched against the path relative to the root.
    assert!(filter.excludes_dir(Path::new("/proj/var/cache")));
    assert!(!filter.excludes_dir(Path::new("/proj/var/log")));

    Ok(())
}

#[test]
fn invalid_exclude_glob_is_rejected() {
    let exclude = vec!["var/[".to_string()];
    assert!(PathFilter::new("/proj", &exclude).is_err());
}

#[test]
fn editor_noise_files_are_detected() {
    assert!(PathFilter::is_noise_file(Path::new("/proj/app.css.swp")));
    assert!(PathFilter::is_noise_file(Path::new("/proj/app.css~")));
    assert!(PathFilter::is_noise_file(Path::new("/proj/.app.css.kate-swp")));
    assert!(PathFilter::is_noise_file(Path::new("/proj/backup.tmp")));

    assert!(!PathFilter::is_noise_file(Path::new("/proj/app.css")));
    assert!(!PathFilter::is_noise_file(Path::new("/proj/app.tailwind.css")));
}
