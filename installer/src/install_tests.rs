//! Unit tests for the installer.

use super::*;
use rstest::{fixture, rstest};
use tempfile::TempDir;

struct Harness {
    _root: TempDir,
    layout: Layout,
    key: PackageKey,
}

#[fixture]
fn harness() -> Harness {
    let root = TempDir::new().expect("root");
    let layout = Layout::new(Utf8PathBuf::from_path_buf(root.path().to_path_buf()).expect("utf8"));
    let key = PackageKey::new("tool", "1.0.0", "linux-amd64".parse().expect("tag")).expect("key");
    Harness {
        _root: root,
        layout,
        key,
    }
}

fn package(files: &[(&str, &[u8])]) -> TempDir {
    let dir = TempDir::new().expect("package");
    for (name, content) in files {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("mkdir");
        }
        fs::write(path, content).expect("write");
    }
    dir
}

fn bins(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| (*n).to_owned()).collect()
}

fn file_set(root: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in fs::read_dir(&dir).expect("read_dir") {
            let path = entry.expect("entry").path();
            if path.is_dir() {
                pending.push(path.clone());
            }
            found.push(path.strip_prefix(root).expect("prefix").to_path_buf());
        }
    }
    found.sort();
    found
}

#[rstest]
fn installs_into_deterministic_path(harness: Harness) {
    let pkg = package(&[("bin/tool", b"#!/bin/sh\n"), ("README", b"docs")]);

    let installed = Installer::new(harness.layout.clone())
        .install(&bins(&["bin/tool"]), &harness.key, pkg.path())
        .expect("install");

    assert_eq!(installed, harness.layout.install_path(&harness.key));
    assert_eq!(
        fs::read(installed.join("README")).expect("readme"),
        b"docs"
    );
    assert!(installed.join("bin/tool").is_file());
}

#[cfg(unix)]
#[rstest]
fn adds_missing_executable_bits(harness: Harness) {
    use std::os::unix::fs::PermissionsExt;

    let pkg = package(&[("bin/tool", b"#!/bin/sh\n")]);
    fs::set_permissions(pkg.path().join("bin/tool"), fs::Permissions::from_mode(0o644))
        .expect("chmod");

    let installed = Installer::new(harness.layout.clone())
        .install(&bins(&["bin/tool"]), &harness.key, pkg.path())
        .expect("install");

    let mode = fs::metadata(installed.join("bin/tool"))
        .expect("metadata")
        .permissions()
        .mode();
    assert_eq!(mode & 0o777, 0o755);
}

#[rstest]
fn missing_binary_creates_nothing(harness: Harness) {
    let pkg = package(&[("bin/tool", b"x")]);

    let err = Installer::new(harness.layout.clone())
        .install(&bins(&["bin/tool", "bin/missing"]), &harness.key, pkg.path())
        .expect_err("missing binary");

    assert!(matches!(err, InstallError::MissingBinary { ref path } if path == "bin/missing"));
    assert!(!harness.layout.install_path(&harness.key).exists());
    assert!(!harness.layout.installs_dir().exists());
    assert!(pkg.path().join("bin/tool").exists());
}

#[rstest]
#[case::parent("../outside")]
#[case::absolute("/bin/sh")]
#[case::empty("")]
fn rejects_escaping_binary_paths(harness: Harness, #[case] declared: &str) {
    let pkg = package(&[("bin/tool", b"x")]);

    let err = Installer::new(harness.layout.clone())
        .install(&bins(&[declared]), &harness.key, pkg.path())
        .expect_err("invalid path");

    assert!(matches!(err, InstallError::InvalidBinaryPath { .. }));
}

#[rstest]
fn reinstall_replaces_wholesale_and_is_idempotent(harness: Harness) {
    let installer = Installer::new(harness.layout.clone());
    let first = package(&[("bin/tool", b"v1"), ("stale.txt", b"old")]);
    installer
        .install(&bins(&["bin/tool"]), &harness.key, first.path())
        .expect("first install");

    let second = package(&[("bin/tool", b"v2"), ("lib/data", b"d")]);
    let installed = installer
        .install(&bins(&["bin/tool"]), &harness.key, second.path())
        .expect("second install");
    let after_second = file_set(installed.as_std_path());

    let third = package(&[("bin/tool", b"v2"), ("lib/data", b"d")]);
    installer
        .install(&bins(&["bin/tool"]), &harness.key, third.path())
        .expect("third install");

    assert!(!installed.join("stale.txt").exists());
    assert_eq!(fs::read(installed.join("bin/tool")).expect("tool"), b"v2");
    assert_eq!(file_set(installed.as_std_path()), after_second);
}

#[rstest]
fn leaves_no_staging_directories(harness: Harness) {
    let pkg = package(&[("bin/tool", b"x")]);
    let installer = Installer::new(harness.layout.clone());
    installer
        .install(&bins(&["bin/tool"]), &harness.key, pkg.path())
        .expect("install");
    let again = package(&[("bin/tool", b"y")]);
    let installed = installer
        .install(&bins(&["bin/tool"]), &harness.key, again.path())
        .expect("reinstall");

    let parent = installed.parent().expect("version dir");
    let names: Vec<_> = fs::read_dir(parent)
        .expect("read_dir")
        .map(|e| e.expect("entry").file_name())
        .collect();
    assert_eq!(names, vec![std::ffi::OsString::from("linux-amd64")]);
}

#[rstest]
fn failed_relocation_keeps_previous_install(harness: Harness) {
    let first = package(&[("bin/tool", b"v1")]);
    Installer::new(harness.layout.clone())
        .install(&bins(&["bin/tool"]), &harness.key, first.path())
        .expect("first install");

    let second = package(&[("bin/tool", b"v2")]);
    let err = Installer::new(harness.layout.clone())
        .with_strategies(Vec::new())
        .install(&bins(&["bin/tool"]), &harness.key, second.path())
        .expect_err("no strategy can relocate");

    assert!(matches!(err, InstallError::RelocationFailed { .. }));
    let target = harness.layout.install_path(&harness.key);
    assert_eq!(fs::read(target.join("bin/tool")).expect("tool"), b"v1");
}

#[rstest]
fn cancellation_keeps_previous_install(harness: Harness) {
    let first = package(&[("bin/tool", b"v1")]);
    Installer::new(harness.layout.clone())
        .install(&bins(&["bin/tool"]), &harness.key, first.path())
        .expect("first install");

    let cancel = CancellationToken::new();
    cancel.cancel();
    let second = package(&[("bin/tool", b"v2")]);
    let err = Installer::new(harness.layout.clone())
        .with_cancellation(cancel)
        .install(&bins(&["bin/tool"]), &harness.key, second.path())
        .expect_err("cancelled");

    assert!(matches!(err, InstallError::Cancelled(_)));
    let target = harness.layout.install_path(&harness.key);
    assert_eq!(fs::read(target.join("bin/tool")).expect("tool"), b"v1");
}

#[rstest]
fn windows_family_resolves_exe_suffix(harness: Harness) {
    let pkg = package(&[("tool.exe", b"MZ")]);

    let installed = Installer::new(harness.layout.clone())
        .with_family(PlatformFamily::Windows)
        .install(&bins(&["tool"]), &harness.key, pkg.path())
        .expect("install");

    assert!(installed.join("tool.exe").is_file());
}

#[test]
fn posix_family_does_not_guess_extensions() {
    let pkg = package(&[("tool.exe", b"MZ")]);
    assert_eq!(resolve_binary(pkg.path(), "tool", PlatformFamily::Posix), None);
    assert_eq!(
        resolve_binary(pkg.path(), "tool", PlatformFamily::Windows),
        Some(PathBuf::from("tool.exe"))
    );
}

#[cfg(unix)]
#[test]
fn copy_strategy_preserves_modes_and_symlinks() {
    use std::os::unix::fs::PermissionsExt;

    let src = package(&[("bin/tool-1.0", b"bin"), ("share/doc", b"doc")]);
    fs::set_permissions(
        src.path().join("bin/tool-1.0"),
        fs::Permissions::from_mode(0o750),
    )
    .expect("chmod");
    std::os::unix::fs::symlink("tool-1.0", src.path().join("bin/tool")).expect("symlink");
    let dest_root = TempDir::new().expect("dest");
    let dest = dest_root.path().join("moved");

    RelocationStrategy::CopyThenRemove
        .relocate(src.path(), &dest)
        .expect("copy");

    assert!(!src.path().exists());
    let mode = fs::metadata(dest.join("bin/tool-1.0"))
        .expect("metadata")
        .permissions()
        .mode();
    assert_eq!(mode & 0o777, 0o750);
    assert_eq!(
        fs::read_link(dest.join("bin/tool")).expect("link"),
        PathBuf::from("tool-1.0")
    );
    assert_eq!(fs::read(dest.join("share/doc")).expect("doc"), b"doc");
}

#[test]
fn rename_strategy_moves_tree() {
    let src = package(&[("a/b", b"c")]);
    let dest_root = TempDir::new().expect("dest");
    let dest = dest_root.path().join("moved");

    RelocationStrategy::Rename
        .relocate(src.path(), &dest)
        .expect("rename");

    assert_eq!(fs::read(dest.join("a/b")).expect("file"), b"c");
}
