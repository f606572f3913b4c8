//! Checksum verification of in-memory payloads.

use super::digest::{Digest, DigestError};

/// Errors arising from checksum verification.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChecksumError {
    /// The expected checksum string is malformed.
    #[error("invalid checksum format: {0}")]
    InvalidFormat(#[from] DigestError),

    /// The payload digest differs from the expected digest.
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    Mismatch {
        /// Digest the caller asked for.
        expected: Digest,
        /// Digest computed over the payload.
        actual: Digest,
    },
}

/// Verify `content` against an expected checksum string such as
/// `sha256:09ca7e4e...`.
///
/// # Errors
///
/// Returns [`ChecksumError::InvalidFormat`] when `expected` does not parse
/// and [`ChecksumError::Mismatch`] when the digests differ.
///
/// # Examples
///
/// ```
/// use nori_installer::artefact::checksum::verify;
///
/// let expected = "sha256:09ca7e4eaa6e8ae9c7d261167129184883644d07dfba7cbfbc4c8a2e08360d5b";
/// assert!(verify(b"hello, world", expected).is_ok());
/// assert!(verify(b"hello, world!", expected).is_err());
/// ```
pub fn verify(content: &[u8], expected: &str) -> Result<(), ChecksumError> {
    let expected: Digest = expected.parse()?;
    verify_digest(content, &expected)
}

/// Verify `content` against an already parsed digest.
///
/// # Errors
///
/// Returns [`ChecksumError::Mismatch`] when the digests differ.
pub fn verify_digest(content: &[u8], expected: &Digest) -> Result<(), ChecksumError> {
    let actual = expected.recompute(content);
    if constant_time_eq(actual.as_bytes(), expected.as_bytes()) {
        Ok(())
    } else {
        Err(ChecksumError::Mismatch {
            expected: expected.clone(),
            actual,
        })
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (&left, &right) in a.iter().zip(b.iter()) {
        diff |= left ^ right;
    }
    diff == 0
}
