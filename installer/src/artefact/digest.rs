//! Typed content digests in `<algorithm>:<hex>` form.
//!
//! Only SHA-256 is understood today. Parsing accepts upper- or lowercase hex;
//! the canonical printed form is always lowercase.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest as _, Sha256};
use std::fmt;
use std::str::FromStr;

/// Errors arising from malformed digest strings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DigestError {
    /// The string has no `<algorithm>:` prefix.
    #[error("invalid digest \"{value}\": expected \"<algorithm>:<hex>\"")]
    MissingAlgorithm {
        /// The rejected input.
        value: String,
    },

    /// The algorithm tag is not one this build understands.
    #[error("unsupported digest algorithm \"{algorithm}\"; expected one of: sha256")]
    UnknownAlgorithm {
        /// The rejected algorithm tag.
        algorithm: String,
    },

    /// The hex payload has the wrong length for its algorithm.
    #[error("invalid {algorithm} digest: expected {expected} hex characters, got {actual}")]
    InvalidLength {
        /// Algorithm the payload was checked against.
        algorithm: DigestAlgorithm,
        /// Required number of hex characters.
        expected: usize,
        /// Number of characters supplied.
        actual: usize,
    },

    /// The payload contains a non-hex character.
    #[error("invalid {algorithm} digest: non-hex character '{character}'")]
    NonHex {
        /// Algorithm the payload was checked against.
        algorithm: DigestAlgorithm,
        /// The first offending character.
        character: char,
    },
}

/// Hash algorithms a [`Digest`] may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DigestAlgorithm {
    /// SHA-256, 32-byte output.
    Sha256,
}

impl DigestAlgorithm {
    /// Tag used in the serialised form.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
        }
    }

    /// Length of the raw digest in bytes.
    #[must_use]
    pub const fn byte_len(self) -> usize {
        match self {
            Self::Sha256 => 32,
        }
    }

    /// Length of the hex-encoded digest.
    #[must_use]
    pub const fn hex_len(self) -> usize {
        self.byte_len() * 2
    }

    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "sha256" => Some(Self::Sha256),
            _ => None,
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A validated digest: algorithm tag plus raw bytes of the right length.
///
/// # Examples
///
/// ```
/// use nori_installer::artefact::digest::Digest;
///
/// let digest = Digest::of_sha256(b"hello, world");
/// let printed = digest.to_string();
/// assert!(printed.starts_with("sha256:"));
/// assert_eq!(printed.parse::<Digest>().unwrap(), digest);
/// ```
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Digest {
    algorithm: DigestAlgorithm,
    bytes: Vec<u8>,
}

impl Digest {
    /// Compute the SHA-256 digest of `content`.
    #[must_use]
    pub fn of_sha256(content: &[u8]) -> Self {
        Self {
            algorithm: DigestAlgorithm::Sha256,
            bytes: Sha256::digest(content).to_vec(),
        }
    }

    /// Compute a digest of `content` with the same algorithm as `self`.
    #[must_use]
    pub fn recompute(&self, content: &[u8]) -> Self {
        match self.algorithm {
            DigestAlgorithm::Sha256 => Self::of_sha256(content),
        }
    }

    /// The algorithm this digest was produced with.
    #[must_use]
    pub const fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    /// Raw digest bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Lowercase hex payload without the algorithm prefix.
    #[must_use]
    pub fn hex(&self) -> String {
        hex::encode(&self.bytes)
    }
}

impl FromStr for Digest {
    type Err = DigestError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let Some((tag, payload)) = value.split_once(':') else {
            return Err(DigestError::MissingAlgorithm {
                value: value.to_owned(),
            });
        };
        let algorithm =
            DigestAlgorithm::from_tag(tag).ok_or_else(|| DigestError::UnknownAlgorithm {
                algorithm: tag.to_owned(),
            })?;
        let actual = payload.chars().count();
        if actual != algorithm.hex_len() {
            return Err(DigestError::InvalidLength {
                algorithm,
                expected: algorithm.hex_len(),
                actual,
            });
        }
        if let Some(character) = payload.chars().find(|c| !c.is_ascii_hexdigit()) {
            return Err(DigestError::NonHex {
                algorithm,
                character,
            });
        }
        // Length and alphabet were checked above, so decoding cannot fail;
        // map the error anyway rather than panic.
        let bytes = hex::decode(payload).map_err(|_| DigestError::NonHex {
            algorithm,
            character: '?',
        })?;
        Ok(Self { algorithm, bytes })
    }
}

impl TryFrom<&str> for Digest {
    type Error = DigestError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({self})")
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
