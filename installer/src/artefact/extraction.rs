//! Archive extraction into an isolated temporary directory.
//!
//! Tar (optionally gzip-compressed) and zip archives are unpacked with the
//! same entry-name sanitisation: absolute names and `..` segments are
//! rejected, and every write is checked against the canonical extraction
//! root so symlinks planted by earlier entries cannot redirect later ones.
//! Extraction is all-or-nothing; on any error the temporary directory is
//! removed before the error is returned.

use std::ffi::OsString;
use std::fs;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};

use log::{debug, warn};
use tempfile::TempDir;

use super::cancel::{Cancelled, CancellationToken};
use super::checksum::{ChecksumError, verify_digest};
use super::descriptor::ArchiveKind;
use super::digest::Digest;

const DEFAULT_FILE_MODE: u32 = 0o644;
const DEFAULT_DIR_MODE: u32 = 0o755;
const TEMP_PREFIX: &str = "nori-extract-";

/// Errors arising from archive extraction.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// The payload failed checksum re-verification.
    #[error("refusing to extract: {0}")]
    Checksum(#[from] ChecksumError),

    /// The tar stream is wrapped in a compression format we cannot read.
    #[error("unsupported compression: {format}")]
    UnsupportedCompression {
        /// Name of the detected compression format.
        format: &'static str,
    },

    /// An entry would be written outside the destination directory.
    #[error("path traversal detected in entry {path}: {reason}")]
    PathTraversal {
        /// The offending entry name from the archive.
        path: String,
        /// Which rule rejected it.
        reason: &'static str,
    },

    /// An I/O or archive parsing failure.
    #[error("extraction I/O error while {context}: {source}")]
    Io {
        /// What the extractor was doing.
        context: String,
        /// The underlying error.
        #[source]
        source: io::Error,
    },

    /// The zip central directory or an entry could not be read.
    #[error("invalid zip archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Cancellation was requested mid-extraction.
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

impl ExtractError {
    fn io(context: impl Into<String>) -> impl FnOnce(io::Error) -> Self {
        let context = context.into();
        move |source| Self::Io { context, source }
    }

    fn traversal(path: &Path, reason: &'static str) -> Self {
        Self::PathTraversal {
            path: path.display().to_string(),
            reason,
        }
    }
}

/// An exclusively owned directory holding an unpacked archive.
///
/// Dropping the tree deletes the directory, so every exit path of the
/// caller releases it.
#[derive(Debug)]
pub struct ExtractedTree {
    dir: TempDir,
}

impl ExtractedTree {
    /// Root of the unpacked content.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Delete the tree now, reporting any removal error.
    ///
    /// # Errors
    ///
    /// Returns the I/O error raised while removing the directory.
    pub fn close(self) -> io::Result<()> {
        self.dir.close()
    }
}

/// Compression wrappers recognised by magic bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TarCompression {
    None,
    Gzip,
}

fn sniff_compression(content: &[u8]) -> Result<TarCompression, ExtractError> {
    let unsupported = |format| Err(ExtractError::UnsupportedCompression { format });
    match content {
        [0x1f, 0x8b, ..] => Ok(TarCompression::Gzip),
        [0xfd, b'7', b'z', b'X', b'Z', 0x00, ..] => unsupported("xz"),
        [0x28, 0xb5, 0x2f, 0xfd, ..] => unsupported("zstd"),
        [b'B', b'Z', b'h', ..] => unsupported("bzip2"),
        _ => Ok(TarCompression::None),
    }
}

/// Unpacks verified archive bytes into fresh temporary directories.
#[derive(Debug, Clone, Default)]
pub struct ArchiveExtractor {
    temp_parent: Option<PathBuf>,
    cancel: CancellationToken,
}

impl ArchiveExtractor {
    /// Extract into the system temporary directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create extraction directories under `parent` instead.
    ///
    /// Keeping them on the same volume as the install root lets the
    /// installer relocate by rename.
    #[must_use]
    pub fn with_temp_parent(mut self, parent: impl Into<PathBuf>) -> Self {
        self.temp_parent = Some(parent.into());
        self
    }

    /// Abort between entries once `cancel` fires.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Verify `content` against `expected`, then unpack it.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::Checksum`] before touching the filesystem if
    /// verification fails, and any other [`ExtractError`] after removing
    /// the partially populated directory.
    pub fn extract(
        &self,
        content: &[u8],
        kind: ArchiveKind,
        expected: &Digest,
    ) -> Result<ExtractedTree, ExtractError> {
        verify_digest(content, expected)?;

        let dir = self.allocate()?;
        let root = Destination::new(dir.path())?;
        match kind {
            ArchiveKind::Tar => match sniff_compression(content)? {
                TarCompression::Gzip => {
                    debug!("extracting gzip-compressed tar into {}", dir.path().display());
                    unpack_tar(flate2::read::GzDecoder::new(content), &root, &self.cancel)?;
                }
                TarCompression::None => {
                    debug!("extracting tar into {}", dir.path().display());
                    unpack_tar(content, &root, &self.cancel)?;
                }
            },
            ArchiveKind::Zip => {
                debug!("extracting zip into {}", dir.path().display());
                unpack_zip(content, &root, &self.cancel)?;
            }
        }
        Ok(ExtractedTree { dir })
    }

    fn allocate(&self) -> Result<TempDir, ExtractError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(TEMP_PREFIX);
        match &self.temp_parent {
            Some(parent) => {
                fs::create_dir_all(parent).map_err(ExtractError::io(format!(
                    "creating temporary parent {}",
                    parent.display()
                )))?;
                builder.tempdir_in(parent)
            }
            None => builder.tempdir(),
        }
        .map_err(ExtractError::io("creating temporary directory"))
    }
}

fn unpack_tar<R: Read>(
    reader: R,
    root: &Destination,
    cancel: &CancellationToken,
) -> Result<(), ExtractError> {
    let mut archive = tar::Archive::new(reader);
    let entries = archive
        .entries()
        .map_err(ExtractError::io("reading tar stream"))?;
    for entry in entries {
        cancel.check()?;
        let mut entry = entry.map_err(ExtractError::io("reading tar header"))?;
        let name = entry
            .path()
            .map_err(ExtractError::io("decoding tar entry name"))?
            .into_owned();
        let mode = entry.header().mode().ok();
        match entry.header().entry_type() {
            tar::EntryType::Directory => root.create_dir(&name, mode)?,
            tar::EntryType::Regular | tar::EntryType::Continuous | tar::EntryType::GNUSparse => {
                root.write_file(&name, &mut entry, mode)?;
            }
            tar::EntryType::Symlink => {
                let target = link_target(&entry, &name)?;
                root.create_symlink(&name, &target)?;
            }
            tar::EntryType::Link => {
                let target = link_target(&entry, &name)?;
                root.copy_hard_link(&name, &target)?;
            }
            other => {
                warn!("skipping tar entry {} of type {other:?}", name.display());
            }
        }
    }
    Ok(())
}

fn link_target<R: Read>(entry: &tar::Entry<'_, R>, name: &Path) -> Result<PathBuf, ExtractError> {
    entry
        .link_name()
        .map_err(ExtractError::io("decoding tar link name"))?
        .map(std::borrow::Cow::into_owned)
        .ok_or_else(|| ExtractError::Io {
            context: format!("reading link entry {}", name.display()),
            source: io::Error::new(io::ErrorKind::InvalidData, "link entry without target"),
        })
}

fn unpack_zip(
    content: &[u8],
    root: &Destination,
    cancel: &CancellationToken,
) -> Result<(), ExtractError> {
    let mut archive = zip::ZipArchive::new(io::Cursor::new(content))?;
    for index in 0..archive.len() {
        cancel.check()?;
        let mut file = archive.by_index(index)?;
        let name = PathBuf::from(file.name());
        let mode = file.unix_mode();
        if file.is_dir() {
            root.create_dir(&name, mode)?;
        } else {
            root.write_file(&name, &mut file, mode)?;
        }
    }
    Ok(())
}

/// Clean an archive entry name into a relative path.
///
/// Drops `.` segments and rejects absolute names and any `..` segment.
///
/// # Errors
///
/// Returns [`ExtractError::PathTraversal`] naming the rule that fired.
pub fn clean_entry_name(name: &Path) -> Result<PathBuf, ExtractError> {
    let mut cleaned = PathBuf::new();
    for component in name.components() {
        match component {
            Component::Normal(part) => cleaned.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                return Err(ExtractError::traversal(name, "parent directory segment"));
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(ExtractError::traversal(name, "absolute path"));
            }
        }
    }
    Ok(cleaned)
}

/// Resolve an entry name to a path under `root`.
///
/// # Errors
///
/// Returns [`ExtractError::PathTraversal`] if the name is absolute,
/// contains `..`, or the joined path does not stay under `root`.
pub fn sanitize_entry_path(name: &Path, root: &Path) -> Result<PathBuf, ExtractError> {
    let cleaned = clean_entry_name(name)?;
    let joined = root.join(&cleaned);
    let relative = joined
        .strip_prefix(root)
        .map_err(|_| ExtractError::traversal(name, "escapes destination"))?;
    if matches!(relative.components().next(), Some(Component::ParentDir)) {
        return Err(ExtractError::traversal(name, "escapes destination"));
    }
    Ok(joined)
}

/// The extraction root plus its canonical form for containment checks.
struct Destination {
    root: PathBuf,
    canonical: PathBuf,
}

impl Destination {
    fn new(root: &Path) -> Result<Self, ExtractError> {
        let canonical = fs::canonicalize(root).map_err(ExtractError::io(format!(
            "resolving {}",
            root.display()
        )))?;
        Ok(Self {
            root: root.to_path_buf(),
            canonical,
        })
    }

    fn create_dir(&self, name: &Path, mode: Option<u32>) -> Result<(), ExtractError> {
        let dest = sanitize_entry_path(name, &self.root)?;
        let relative = clean_entry_name(name)?;
        self.ensure_dirs(name, &relative)?;
        set_mode(&dest, dir_mode(mode))
    }

    fn write_file(
        &self,
        name: &Path,
        content: &mut dyn Read,
        mode: Option<u32>,
    ) -> Result<(), ExtractError> {
        let dest = sanitize_entry_path(name, &self.root)?;
        let relative = clean_entry_name(name)?;
        if relative.as_os_str().is_empty() {
            return Err(ExtractError::traversal(name, "file entry names the root"));
        }
        if let Some(parent) = relative.parent() {
            self.ensure_dirs(name, parent)?;
        }
        remove_existing_leaf(&dest)?;

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&dest)
            .map_err(ExtractError::io(format!("creating {}", dest.display())))?;
        io::copy(content, &mut file)
            .map_err(ExtractError::io(format!("writing {}", dest.display())))?;
        set_mode(&dest, file_mode(mode))
    }

    #[cfg(unix)]
    fn create_symlink(&self, name: &Path, target: &Path) -> Result<(), ExtractError> {
        let dest = sanitize_entry_path(name, &self.root)?;
        let relative = clean_entry_name(name)?;
        let parent = relative.parent().unwrap_or_else(|| Path::new(""));
        if !lexically_within(parent, target) {
            return Err(ExtractError::traversal(name, "symlink target escapes destination"));
        }
        self.ensure_dirs(name, parent)?;
        // The link is resolved from where its parent really is, which may
        // differ from the entry name once earlier links are followed.
        let real_parent = self.real_relative(name, parent)?;
        if !lexically_within(&real_parent, target) {
            return Err(ExtractError::traversal(name, "symlink target escapes destination"));
        }
        remove_existing_leaf(&dest)?;
        std::os::unix::fs::symlink(target, &dest)
            .map_err(ExtractError::io(format!("linking {}", dest.display())))?;

        // A target that already exists must resolve inside the root even
        // after following links planted by earlier entries.
        if let Ok(resolved) = fs::canonicalize(&dest) {
            if !resolved.starts_with(&self.canonical) {
                if let Err(err) = fs::remove_file(&dest) {
                    warn!("failed to remove rejected symlink {}: {err}", dest.display());
                }
                return Err(ExtractError::traversal(name, "symlink resolves outside destination"));
            }
        }
        Ok(())
    }

    #[cfg(not(unix))]
    fn create_symlink(&self, name: &Path, target: &Path) -> Result<(), ExtractError> {
        sanitize_entry_path(name, &self.root)?;
        warn!(
            "skipping symlink {} -> {}: unsupported on this platform",
            name.display(),
            target.display()
        );
        Ok(())
    }

    fn copy_hard_link(&self, name: &Path, target: &Path) -> Result<(), ExtractError> {
        let source = sanitize_entry_path(target, &self.root)?;
        let source_meta = fs::symlink_metadata(&source)
            .map_err(ExtractError::io(format!("reading link source {}", target.display())))?;
        if !source_meta.is_file() {
            return Err(ExtractError::traversal(name, "hard link to non-regular file"));
        }
        self.ensure_within(name, &source)?;
        let mut reader = fs::File::open(&source)
            .map_err(ExtractError::io(format!("opening {}", source.display())))?;
        let mode = permission_bits(&source_meta);
        self.write_file(name, &mut reader, mode)
    }

    /// Create `relative` under the root one component at a time, refusing
    /// to traverse any symlink that resolves outside the root.
    fn ensure_dirs(&self, name: &Path, relative: &Path) -> Result<(), ExtractError> {
        let mut current = self.root.clone();
        for component in relative.components() {
            current.push(component);
            match fs::symlink_metadata(&current) {
                Ok(meta) if meta.file_type().is_symlink() => self.ensure_within(name, &current)?,
                Ok(meta) if meta.is_dir() => {}
                Ok(_) => {
                    return Err(ExtractError::Io {
                        context: format!("creating directory {}", current.display()),
                        source: io::Error::new(
                            io::ErrorKind::AlreadyExists,
                            "a file occupies the directory path",
                        ),
                    });
                }
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    fs::create_dir(&current).map_err(ExtractError::io(format!(
                        "creating directory {}",
                        current.display()
                    )))?;
                    set_mode(&current, DEFAULT_DIR_MODE)?;
                }
                Err(err) => {
                    return Err(ExtractError::Io {
                        context: format!("inspecting {}", current.display()),
                        source: err,
                    });
                }
            }
        }
        Ok(())
    }

    /// `relative`'s location under the canonical root after following links.
    #[cfg(unix)]
    fn real_relative(&self, name: &Path, relative: &Path) -> Result<PathBuf, ExtractError> {
        let path = self.root.join(relative);
        let resolved = fs::canonicalize(&path)
            .map_err(ExtractError::io(format!("resolving {}", path.display())))?;
        resolved
            .strip_prefix(&self.canonical)
            .map(Path::to_path_buf)
            .map_err(|_| ExtractError::traversal(name, "resolves outside destination"))
    }

    fn ensure_within(&self, name: &Path, path: &Path) -> Result<(), ExtractError> {
        let resolved = fs::canonicalize(path)
            .map_err(ExtractError::io(format!("resolving {}", path.display())))?;
        if resolved.starts_with(&self.canonical) {
            Ok(())
        } else {
            Err(ExtractError::traversal(name, "resolves outside destination"))
        }
    }
}

/// Whether `target`, interpreted relative to `parent` (itself relative to
/// the root), stays inside the root without consulting the filesystem.
fn lexically_within(parent: &Path, target: &Path) -> bool {
    let mut stack: Vec<OsString> = parent
        .components()
        .map(|c| c.as_os_str().to_os_string())
        .collect();
    for component in target.components() {
        match component {
            Component::Normal(part) => stack.push(part.to_os_string()),
            Component::CurDir => {}
            Component::ParentDir => {
                if stack.pop().is_none() {
                    return false;
                }
            }
            Component::RootDir | Component::Prefix(_) => return false,
        }
    }
    true
}

/// Remove a non-directory already at `dest` so writes never follow it.
fn remove_existing_leaf(dest: &Path) -> Result<(), ExtractError> {
    match fs::symlink_metadata(dest) {
        Ok(meta) if meta.is_dir() => Err(ExtractError::Io {
            context: format!("writing {}", dest.display()),
            source: io::Error::new(io::ErrorKind::AlreadyExists, "a directory occupies the path"),
        }),
        Ok(_) => fs::remove_file(dest)
            .map_err(ExtractError::io(format!("replacing {}", dest.display()))),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(ExtractError::Io {
            context: format!("inspecting {}", dest.display()),
            source: err,
        }),
    }
}

fn file_mode(declared: Option<u32>) -> u32 {
    declared.map_or(DEFAULT_FILE_MODE, |mode| mode & 0o777)
}

/// Directories always stay owner-accessible so extraction and cleanup work.
fn dir_mode(declared: Option<u32>) -> u32 {
    declared.map_or(DEFAULT_DIR_MODE, |mode| (mode & 0o777) | 0o700)
}

#[cfg(unix)]
fn permission_bits(meta: &fs::Metadata) -> Option<u32> {
    use std::os::unix::fs::PermissionsExt;
    Some(meta.permissions().mode())
}

#[cfg(not(unix))]
fn permission_bits(_meta: &fs::Metadata) -> Option<u32> {
    None
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<(), ExtractError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .map_err(ExtractError::io(format!("setting permissions on {}", path.display())))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<(), ExtractError> {
    Ok(())
}

#[cfg(test)]
#[path = "extraction_tests.rs"]
mod tests;
