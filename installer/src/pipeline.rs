//! Install pipeline orchestration.
//!
//! Runs the stages strictly in sequence for one request:
//! fetch, extract, detect root, install, then (when activating) publish
//! shims and record the active version. The extracted tree is owned here and released on every exit
//! path. Progress lines go to the supplied writer unless quiet.

use std::io::Write;

use camino::Utf8PathBuf;
use log::{debug, info, warn};

use crate::artefact::cancel::{CancellationToken, Clock};
use crate::artefact::descriptor::AssetDescriptor;
use crate::artefact::download::{Fetcher, LogProgress, ProgressSink, Transport};
use crate::artefact::extraction::ArchiveExtractor;
use crate::artefact::root::detect_root;
use crate::config::Settings;
use crate::error::{PipelineError, Result};
use crate::install::Installer;
use crate::layout::{Layout, PackageKey};
use crate::output::write_stderr_line;
use crate::shim::PublishedShim;
use crate::versions;

const PROGRESS_STEP: u64 = 4 * 1024 * 1024;

/// One package to install.
#[derive(Debug, Clone)]
pub struct InstallRequest {
    /// Package identity and install location.
    pub key: PackageKey,
    /// What to download.
    pub asset: AssetDescriptor,
    /// Relative paths of the executables the package must provide.
    pub binaries: Vec<String>,
    /// Publish shims for this version and record it as active.
    pub activate: bool,
}

/// What a successful run produced.
#[derive(Debug, Clone)]
pub struct InstallOutcome {
    /// The installed package.
    pub key: PackageKey,
    /// Final install directory.
    pub install_path: Utf8PathBuf,
    /// Launchers written; empty unless activated.
    pub shims: Vec<PublishedShim>,
    /// Size of the downloaded archive.
    pub bytes: u64,
    /// Whether the version was recorded as active.
    pub activated: bool,
}

/// The stages wired to one layout, transport and clock.
pub struct Pipeline<'a> {
    layout: Layout,
    settings: Settings,
    transport: &'a dyn Transport,
    clock: &'a dyn Clock,
    cancel: CancellationToken,
    quiet: bool,
}

impl<'a> Pipeline<'a> {
    /// A pipeline with default settings.
    #[must_use]
    pub fn new(layout: Layout, transport: &'a dyn Transport, clock: &'a dyn Clock) -> Self {
        Self {
            layout,
            settings: Settings::default(),
            transport,
            clock,
            cancel: CancellationToken::new(),
            quiet: false,
        }
    }

    /// Apply loaded settings.
    #[must_use]
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Share a cancellation token with every stage.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Suppress progress lines.
    #[must_use]
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// The layout in use.
    #[must_use]
    pub const fn layout(&self) -> &Layout {
        &self.layout
    }

    fn report(&self, stderr: &mut dyn Write, message: impl std::fmt::Display) {
        if !self.quiet {
            write_stderr_line(stderr, message);
        }
    }

    /// Run every stage for `request`.
    ///
    /// # Errors
    ///
    /// Returns the first stage failure. Temporary extraction directories
    /// and staged install trees are removed before returning.
    pub fn run(&self, request: &InstallRequest, stderr: &mut dyn Write) -> Result<InstallOutcome> {
        let key = &request.key;
        let asset = &request.asset;

        self.report(stderr, format!("Downloading {key} from {}...", asset.url()));
        let fetcher = Fetcher::new(self.transport, self.clock, self.settings.retry_policy());
        let mut progress = LogProgress::new(key.name(), PROGRESS_STEP);
        let payload = fetcher.fetch(
            asset.url(),
            asset.checksum(),
            &self.cancel,
            Some(&mut progress as &mut dyn ProgressSink),
        )?;

        self.report(stderr, format!("Extracting {} archive...", asset.kind()));
        let mut extractor = ArchiveExtractor::new().with_cancellation(self.cancel.clone());
        if self.settings.extract.temp_in_root {
            extractor = extractor.with_temp_parent(self.layout.tmp_dir());
        }
        let tree = extractor.extract(&payload, asset.kind(), asset.checksum())?;
        let package_root = detect_root(tree.path()).map_err(|source| PipelineError::DetectRoot {
            path: tree.path().to_path_buf(),
            source,
        })?;
        debug!("package root is {}", package_root.display());

        let installer = Installer::new(self.layout.clone()).with_cancellation(self.cancel.clone());
        let install_path = installer.install(&request.binaries, key, &package_root)?;
        if let Err(err) = tree.close() {
            warn!("failed to remove extraction directory: {err}");
        }

        let shims = if request.activate {
            versions::activate(&self.layout, key, &request.binaries)?
        } else {
            debug!("leaving launchers on the active version of {}", key.name());
            Vec::new()
        };

        info!("installed {key}");
        Ok(InstallOutcome {
            key: key.clone(),
            install_path,
            shims,
            bytes: payload.len() as u64,
            activated: request.activate,
        })
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
