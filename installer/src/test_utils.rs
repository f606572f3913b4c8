//! Shared test utilities for the installer crate.
//!
//! Builds archives in memory, scripts transport responses, and records
//! backoff sleeps without waiting.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{Cursor, Write};
use std::time::Duration;

use flate2::Compression;
use flate2::write::GzEncoder;

use crate::artefact::cancel::{Cancelled, CancellationToken, Clock};
use crate::artefact::digest::Digest;
use crate::artefact::download::{AttemptError, ProgressSink, Transport};

/// One entry of an archive built by the helpers in this module.
#[derive(Debug, Clone)]
pub enum ArchiveEntry {
    /// A directory.
    Dir {
        /// Entry name inside the archive.
        name: String,
    },
    /// A regular file.
    File {
        /// Entry name inside the archive.
        name: String,
        /// File content.
        content: Vec<u8>,
        /// Unix permission bits.
        mode: u32,
    },
    /// A symbolic link (tar only).
    Symlink {
        /// Entry name inside the archive.
        name: String,
        /// Link target as stored in the archive.
        target: String,
    },
}

impl ArchiveEntry {
    /// A directory entry.
    #[must_use]
    pub fn dir(name: &str) -> Self {
        Self::Dir {
            name: name.to_owned(),
        }
    }

    /// A `0o644` file entry.
    #[must_use]
    pub fn file(name: &str, content: &[u8]) -> Self {
        Self::file_with_mode(name, content, 0o644)
    }

    /// A file entry with explicit permission bits.
    #[must_use]
    pub fn file_with_mode(name: &str, content: &[u8], mode: u32) -> Self {
        Self::File {
            name: name.to_owned(),
            content: content.to_vec(),
            mode,
        }
    }

    /// A symlink entry.
    #[must_use]
    pub fn symlink(name: &str, target: &str) -> Self {
        Self::Symlink {
            name: name.to_owned(),
            target: target.to_owned(),
        }
    }
}

/// Build an uncompressed tar archive.
///
/// Entry names are written verbatim into the header, so traversal
/// attempts such as `../evil.txt` survive into the archive.
///
/// # Panics
///
/// Panics if the in-memory writer fails.
#[must_use]
pub fn tar_bytes(entries: &[ArchiveEntry]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for entry in entries {
        let mut header = tar::Header::new_gnu();
        match entry {
            ArchiveEntry::Dir { name } => {
                header.set_entry_type(tar::EntryType::Directory);
                header.set_mode(0o755);
                header.set_size(0);
                set_raw_name(&mut header, name);
                header.set_cksum();
                builder.append(&header, std::io::empty()).expect("append dir");
            }
            ArchiveEntry::File {
                name,
                content,
                mode,
            } => {
                header.set_entry_type(tar::EntryType::Regular);
                header.set_mode(*mode);
                header.set_size(content.len() as u64);
                set_raw_name(&mut header, name);
                header.set_cksum();
                builder
                    .append(&header, content.as_slice())
                    .expect("append file");
            }
            ArchiveEntry::Symlink { name, target } => {
                header.set_entry_type(tar::EntryType::Symlink);
                header.set_mode(0o777);
                header.set_size(0);
                set_raw_name(&mut header, name);
                header
                    .set_link_name_literal(target)
                    .expect("link name fits header");
                header.set_cksum();
                builder
                    .append(&header, std::io::empty())
                    .expect("append symlink");
            }
        }
    }
    builder.into_inner().expect("finish tar")
}

/// Build a gzip-compressed tar archive.
///
/// # Panics
///
/// Panics if the in-memory writer fails.
#[must_use]
pub fn tar_gz_bytes(entries: &[ArchiveEntry]) -> Vec<u8> {
    let tar = tar_bytes(entries);
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&tar).expect("gzip write");
    encoder.finish().expect("gzip finish")
}

/// Build a zip archive. Symlink entries are stored as small text files.
///
/// # Panics
///
/// Panics if the in-memory writer fails.
#[must_use]
pub fn zip_bytes(entries: &[ArchiveEntry]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for entry in entries {
        match entry {
            ArchiveEntry::Dir { name } => {
                let options = zip::write::SimpleFileOptions::default().unix_permissions(0o755);
                writer.add_directory(name.as_str(), options).expect("zip dir");
            }
            ArchiveEntry::File {
                name,
                content,
                mode,
            } => {
                let options = zip::write::SimpleFileOptions::default().unix_permissions(*mode);
                writer.start_file(name.as_str(), options).expect("zip file");
                writer.write_all(content).expect("zip write");
            }
            ArchiveEntry::Symlink { name, target } => {
                let options = zip::write::SimpleFileOptions::default();
                writer.start_file(name.as_str(), options).expect("zip file");
                writer.write_all(target.as_bytes()).expect("zip write");
            }
        }
    }
    writer.finish().expect("zip finish").into_inner()
}

/// Write `name` into the header's name field without path validation.
fn set_raw_name(header: &mut tar::Header, name: &str) {
    let bytes = name.as_bytes();
    let field = &mut header.as_old_mut().name;
    assert!(bytes.len() < field.len(), "test entry name too long: {name}");
    field.fill(0);
    field
        .get_mut(..bytes.len())
        .expect("length checked")
        .copy_from_slice(bytes);
}

/// SHA-256 digest of `content`.
#[must_use]
pub fn digest_of(content: &[u8]) -> Digest {
    Digest::of_sha256(content)
}

/// One scripted transport response.
#[derive(Debug)]
pub enum ScriptedResponse {
    /// Respond with this body, delivered in chunks of `chunk` bytes.
    Body {
        /// Response body.
        body: Vec<u8>,
        /// Chunk size used when mirroring to the progress sink.
        chunk: usize,
    },
    /// Respond with an HTTP status error.
    Status(u16),
    /// Fail at the transport level.
    Transport(String),
}

impl ScriptedResponse {
    /// A successful response delivered in one chunk.
    #[must_use]
    pub fn ok(body: &[u8]) -> Self {
        Self::Body {
            body: body.to_vec(),
            chunk: body.len().max(1),
        }
    }
}

/// A [`Transport`] that replays a fixed list of responses.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    responses: RefCell<VecDeque<ScriptedResponse>>,
    calls: RefCell<Vec<String>>,
}

impl ScriptedTransport {
    /// Create a transport that answers with `responses` in order.
    #[must_use]
    pub fn new(responses: Vec<ScriptedResponse>) -> Self {
        Self {
            responses: RefCell::new(responses.into()),
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Number of `get` calls made so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }

    /// URLs requested so far, in order.
    #[must_use]
    pub fn requested_urls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }
}

impl Transport for ScriptedTransport {
    fn get(
        &self,
        url: &str,
        cancel: &CancellationToken,
        progress: &mut dyn ProgressSink,
    ) -> Result<Vec<u8>, AttemptError> {
        self.calls.borrow_mut().push(url.to_owned());
        cancel.check()?;
        let response = self
            .responses
            .borrow_mut()
            .pop_front()
            .expect("unexpected transport call");
        match response {
            ScriptedResponse::Body { body, chunk } => {
                for piece in body.chunks(chunk.max(1)) {
                    progress.observe(piece);
                }
                Ok(body)
            }
            ScriptedResponse::Status(status) => Err(AttemptError::Status {
                url: url.to_owned(),
                status,
            }),
            ScriptedResponse::Transport(reason) => Err(AttemptError::Transport {
                url: url.to_owned(),
                reason,
            }),
        }
    }
}

/// A [`Clock`] that records requested sleeps and returns immediately.
#[derive(Debug, Default)]
pub struct InstantClock {
    sleeps: RefCell<Vec<Duration>>,
}

impl InstantClock {
    /// Create a clock with no recorded sleeps.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleeps requested so far, in order.
    #[must_use]
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.borrow().clone()
    }
}

impl Clock for InstantClock {
    fn sleep(&self, duration: Duration, cancel: &CancellationToken) -> Result<(), Cancelled> {
        self.sleeps.borrow_mut().push(duration);
        cancel.check()
    }
}
