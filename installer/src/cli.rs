//! CLI argument definitions for `nori-install`.
//!
//! Parsing lives here so the binary stays focused on wiring the pipeline.

use crate::artefact::descriptor::ArchiveKind;
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};

/// Fetch, verify, extract and install developer tool archives.
#[derive(Parser, Debug)]
#[command(name = "nori-install")]
#[command(version, about)]
#[command(after_help = concat!(
    "EXAMPLES:\n",
    "  Install a tarball and expose its binary on PATH:\n",
    "    $ nori-install install ripgrep 14.1.0 \\\n",
    "        --url https://example.com/rg-14.1.0-linux-amd64.tar.gz \\\n",
    "        --checksum sha256:<hex> --bin rg\n\n",
    "  Switch back to an installed version:\n",
    "    $ nori-install use ripgrep 13.0.0 --bin rg\n\n",
    "  Verify a file against a checksum:\n",
    "    $ nori-install verify ./rg.tar.gz --checksum sha256:<hex>\n",
))]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Nori root directory [default: $NORI_ROOT or ~/.nori].
    #[arg(long, global = true, value_name = "DIR")]
    pub root: Option<Utf8PathBuf>,

    /// Suppress progress output (errors still shown).
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Increase log verbosity (repeatable: -v, -vv, -vvv).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Download, verify and install one package version.
    Install(InstallArgs),

    /// Switch the active version of an installed package.
    Use(UseArgs),

    /// Remove a package's launchers and clear its active version.
    Deactivate(DeactivateArgs),

    /// List installed packages, or the installed versions of one.
    List(ListArgs),

    /// Check a local file against a checksum.
    Verify(VerifyArgs),
}

/// Arguments for the install command.
#[derive(Parser, Debug, Clone)]
pub struct InstallArgs {
    /// Package name.
    pub name: String,

    /// Package version.
    pub version: String,

    /// Archive URL.
    #[arg(long)]
    pub url: String,

    /// Archive format.
    #[arg(long, default_value_t = ArchiveKind::Tar, value_name = "tar|zip")]
    pub kind: ArchiveKind,

    /// Expected checksum, e.g. `sha256:<hex>`.
    #[arg(long)]
    pub checksum: String,

    /// Relative path of an executable to expose (can be repeated).
    #[arg(long = "bin", value_name = "PATH", required = true)]
    pub bins: Vec<String>,

    /// Platform tag `<os>-<arch>` [default: host].
    #[arg(long, value_name = "TAG")]
    pub platform: Option<String>,

    /// Do not record this version as active.
    #[arg(long)]
    pub no_activate: bool,

    /// Print a JSON summary on stdout.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the use command.
#[derive(Parser, Debug, Clone)]
pub struct UseArgs {
    /// Package name.
    pub name: String,

    /// Installed version to activate.
    pub version: String,

    /// Relative path of an executable to expose (can be repeated).
    #[arg(long = "bin", value_name = "PATH", required = true)]
    pub bins: Vec<String>,

    /// Platform tag `<os>-<arch>` [default: host].
    #[arg(long, value_name = "TAG")]
    pub platform: Option<String>,
}

/// Arguments for the deactivate command.
#[derive(Parser, Debug, Clone)]
pub struct DeactivateArgs {
    /// Package name.
    pub name: String,

    /// Relative path of an executable whose launcher to remove (can be
    /// repeated).
    #[arg(long = "bin", value_name = "PATH", required = true)]
    pub bins: Vec<String>,
}

/// Arguments for the list command.
#[derive(Parser, Debug, Clone)]
pub struct ListArgs {
    /// Show the installed versions of this package.
    pub name: Option<String>,

    /// Platform tag `<os>-<arch>` [default: host].
    #[arg(long, value_name = "TAG")]
    pub platform: Option<String>,
}

/// Arguments for the verify command.
#[derive(Parser, Debug, Clone)]
pub struct VerifyArgs {
    /// File to check.
    pub file: Utf8PathBuf,

    /// Expected checksum, e.g. `sha256:<hex>`.
    #[arg(long)]
    pub checksum: String,
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
