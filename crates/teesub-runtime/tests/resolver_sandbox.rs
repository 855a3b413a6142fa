use assert_fs::prelude::*;
use assert_fs::TempDir;
use teesub_runtime::{DatasetResolver, ResolveError};

#[test]
fn resolves_direct_child_directory() {
    let base = TempDir::new().unwrap();
    base.child("ds/nested").create_dir_all().unwrap();

    let resolver = DatasetResolver::new(base.path());
    let root = resolver.resolve("ds").unwrap();
    assert!(root.ends_with("ds"));
    assert!(resolver.resolve("ds/nested").is_ok());
    assert!(resolver.resolve("./ds/../ds").is_ok());
}

#[test]
fn relative_escapes_are_rejected() {
    let base = TempDir::new().unwrap();
    base.child("ds").create_dir_all().unwrap();
    let resolver = DatasetResolver::new(base.path());

    for reference in ["../../etc", "..", "ds/../..", ".", "", "/etc"] {
        assert!(
            matches!(
                resolver.resolve(reference),
                Err(ResolveError::PathEscape { .. })
            ),
            "reference {reference:?}"
        );
    }
}

#[test]
fn absolute_reference_inside_base_is_rejected() {
    let base = TempDir::new().unwrap();
    base.child("ds").create_dir_all().unwrap();
    let resolver = DatasetResolver::new(base.path());

    let absolute = base.child("ds").path().to_string_lossy().into_owned();
    assert!(matches!(
        resolver.resolve(&absolute),
        Err(ResolveError::PathEscape { .. })
    ));
}

#[test]
fn files_and_missing_entries_are_not_found() {
    let base = TempDir::new().unwrap();
    base.child("plain.txt").write_str("x").unwrap();
    let resolver = DatasetResolver::new(base.path());

    assert!(matches!(
        resolver.resolve("plain.txt"),
        Err(ResolveError::DatasetNotFound { .. })
    ));
    assert!(matches!(
        resolver.resolve("nope"),
        Err(ResolveError::DatasetNotFound { .. })
    ));
}

#[test]
fn missing_base_is_not_found() {
    let base = TempDir::new().unwrap();
    let resolver = DatasetResolver::new(base.path().join("absent"));
    assert!(matches!(
        resolver.resolve("ds"),
        Err(ResolveError::DatasetNotFound { .. })
    ));
}

#[cfg(unix)]
#[test]
fn symlink_out_of_base_is_rejected() {
    let outside = TempDir::new().unwrap();
    outside.child("secret").create_dir_all().unwrap();

    let base = TempDir::new().unwrap();
    base.child("link")
        .symlink_to_dir(outside.child("secret").path())
        .unwrap();

    let resolver = DatasetResolver::new(base.path());
    assert!(matches!(
        resolver.resolve("link"),
        Err(ResolveError::PathEscape { .. })
    ));
}
