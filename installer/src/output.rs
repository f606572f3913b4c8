//! Output formatting for the installer CLI.
//!
//! Progress and results go to stderr as plain lines; `--json` additionally
//! prints a machine-readable [`InstallSummary`] on stdout.

use std::io::Write;

use camino::Utf8Path;
use serde::Serialize;

use crate::layout::PackageKey;
use crate::pipeline::InstallOutcome;
use crate::shim::PublishedShim;
use crate::versions::InstalledVersion;

/// Write one line, ignoring failures of the underlying stream.
pub fn write_stderr_line(stderr: &mut dyn Write, message: impl std::fmt::Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort logging; ignore write failures.
    }
}

/// Serialisable description of a completed install.
///
/// # Example
///
/// ```
/// use nori_installer::output::InstallSummary;
///
/// let summary = InstallSummary {
///     package: "tool".to_owned(),
///     version: "1.0.0".to_owned(),
///     platform: "linux-amd64".to_owned(),
///     install_path: "/home/u/.nori/installs/tool/1.0.0/linux-amd64".to_owned(),
///     shims: vec!["/home/u/.nori/shims/tool".to_owned()],
///     bytes: 1024,
///     activated: true,
/// };
/// let json = serde_json::to_string(&summary).unwrap();
/// assert!(json.contains("\"package\":\"tool\""));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallSummary {
    /// Package name.
    pub package: String,
    /// Installed version.
    pub version: String,
    /// Platform tag.
    pub platform: String,
    /// Final install directory.
    pub install_path: String,
    /// Launcher files written.
    pub shims: Vec<String>,
    /// Size of the downloaded archive.
    pub bytes: u64,
    /// Whether the version was recorded as active.
    pub activated: bool,
}

impl From<&InstallOutcome> for InstallSummary {
    fn from(outcome: &InstallOutcome) -> Self {
        Self {
            package: outcome.key.name().to_owned(),
            version: outcome.key.version().to_owned(),
            platform: outcome.key.platform().to_string(),
            install_path: outcome.install_path.to_string(),
            shims: outcome
                .shims
                .iter()
                .flat_map(|shim| shim.paths.iter())
                .map(|path| path.display().to_string())
                .collect(),
            bytes: outcome.bytes,
            activated: outcome.activated,
        }
    }
}

/// Format a success message after installation.
#[must_use]
pub fn success_message(outcome: &InstallOutcome) -> String {
    let count = outcome.shims.len();
    let plural = if count == 1 { "launcher" } else { "launchers" };
    format!(
        "Installed {} to {} ({count} {plural})",
        outcome.key, outcome.install_path
    )
}

/// Confirmation after switching versions.
#[must_use]
pub fn activated_message(key: &PackageKey, shims: &[PublishedShim]) -> String {
    let count = shims.len();
    let plural = if count == 1 { "launcher" } else { "launchers" };
    format!(
        "Using {}@{} ({count} {plural} updated)",
        key.name(),
        key.version()
    )
}

/// One line of `list` output for an installed version.
#[must_use]
pub fn version_line(installed: &InstalledVersion) -> String {
    if installed.active {
        format!("  {} (active)", installed.version)
    } else {
        format!("  {}", installed.version)
    }
}

/// Reminder to add the shims directory to `PATH`.
#[must_use]
pub fn path_hint(shims_dir: &Utf8Path) -> String {
    format!("Make sure {shims_dir} is on your PATH.")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shim::LauncherStrategy;
    use camino::Utf8PathBuf;
    use rstest::{fixture, rstest};
    use std::path::PathBuf;

    #[fixture]
    fn outcome() -> InstallOutcome {
        InstallOutcome {
            key: PackageKey::new("tool", "1.2.3", "linux-amd64".parse().expect("tag"))
                .expect("key"),
            install_path: Utf8PathBuf::from("/r/installs/tool/1.2.3/linux-amd64"),
            shims: vec![PublishedShim {
                name: "tool".to_owned(),
                strategy: LauncherStrategy::Symlink,
                paths: vec![PathBuf::from("/r/shims/tool")],
            }],
            bytes: 42,
            activated: true,
        }
    }

    #[rstest]
    fn summary_flattens_launcher_paths(outcome: InstallOutcome) {
        let summary = InstallSummary::from(&outcome);
        assert_eq!(summary.shims, vec!["/r/shims/tool".to_owned()]);
        assert_eq!(summary.platform, "linux-amd64");
        assert_eq!(summary.bytes, 42);
    }

    #[rstest]
    fn summary_serialises_as_flat_object(outcome: InstallOutcome) {
        let json = serde_json::to_value(InstallSummary::from(&outcome)).expect("json");
        assert_eq!(json["package"], "tool");
        assert_eq!(json["activated"], true);
    }

    #[rstest]
    fn success_message_counts_launchers(outcome: InstallOutcome) {
        let message = success_message(&outcome);
        assert!(message.contains("tool@1.2.3 (linux-amd64)"));
        assert!(message.contains("1 launcher)"));
    }

    #[rstest]
    fn activated_message_names_version(outcome: InstallOutcome) {
        let message = activated_message(&outcome.key, &outcome.shims);
        assert_eq!(message, "Using tool@1.2.3 (1 launcher updated)");
    }

    #[rstest]
    #[case(true, "  2.0.0 (active)")]
    #[case(false, "  2.0.0")]
    fn version_line_marks_active(#[case] active: bool, #[case] expected: &str) {
        let installed = InstalledVersion {
            version: "2.0.0".to_owned(),
            active,
        };
        assert_eq!(version_line(&installed), expected);
    }

    #[test]
    fn write_stderr_line_appends_newline() {
        let mut buffer = Vec::new();
        write_stderr_line(&mut buffer, "hello");
        assert_eq!(buffer, b"hello\n");
    }
}
