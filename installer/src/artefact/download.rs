//! Artefact download with bounded retry and checksum verification.
//!
//! A [`Transport`] performs one HTTP GET; the [`Fetcher`] drives it through a
//! small retry state machine, sleeping between attempts via an injectable
//! [`Clock`], and verifies the payload once a transfer succeeds.

use std::io::Read;
use std::time::Duration;

use log::{debug, info, warn};

use super::cancel::{Cancelled, CancellationToken, Clock};
use super::checksum::{ChecksumError, verify_digest};
use super::digest::Digest;

/// Default number of attempts, including the first.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default backoff unit; attempt `n` waits `n - 1` units first.
pub const DEFAULT_BACKOFF_UNIT: Duration = Duration::from_secs(1);

const READ_CHUNK: usize = 64 * 1024;

/// Observer of streamed response bytes.
///
/// Sinks see every chunk exactly once, in order, and cannot alter it.
pub trait ProgressSink {
    /// Called once per chunk read from the response body.
    fn observe(&mut self, chunk: &[u8]);
}

impl<F: FnMut(&[u8])> ProgressSink for F {
    fn observe(&mut self, chunk: &[u8]) {
        self(chunk);
    }
}

/// Counts bytes seen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ByteCounter {
    /// Total number of bytes observed so far.
    pub total: u64,
}

impl ProgressSink for ByteCounter {
    fn observe(&mut self, chunk: &[u8]) {
        self.total += chunk.len() as u64;
    }
}

/// Logs a debug line each time another `step` bytes have arrived.
#[derive(Debug, Clone)]
pub struct LogProgress {
    label: String,
    step: u64,
    seen: u64,
    next_report: u64,
}

impl LogProgress {
    /// Report progress for `label` every `step` bytes.
    #[must_use]
    pub fn new(label: impl Into<String>, step: u64) -> Self {
        let step = step.max(1);
        Self {
            label: label.into(),
            step,
            seen: 0,
            next_report: step,
        }
    }

    /// Bytes observed so far.
    #[must_use]
    pub const fn seen(&self) -> u64 {
        self.seen
    }
}

impl ProgressSink for LogProgress {
    fn observe(&mut self, chunk: &[u8]) {
        self.seen += chunk.len() as u64;
        while self.seen >= self.next_report {
            debug!("{}: {} bytes received", self.label, self.seen);
            self.next_report += self.step;
        }
    }
}

/// Failure of a single transfer attempt.
#[derive(Debug, thiserror::Error)]
pub enum AttemptError {
    /// Connection, DNS, timeout, or mid-body I/O failure.
    #[error("transport error for {url}: {reason}")]
    Transport {
        /// The URL that was requested.
        url: String,
        /// A human-readable description of the failure.
        reason: String,
    },

    /// The server answered with a non-2xx status.
    #[error("HTTP {status} for {url}")]
    Status {
        /// The URL that was requested.
        url: String,
        /// The response status code.
        status: u16,
    },

    /// Cancellation was requested while the transfer was in flight.
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

impl AttemptError {
    /// Whether a later attempt might succeed: transport failures and 5xx.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Status { status, .. } => *status >= 500 && *status <= 599,
            Self::Cancelled(_) => false,
        }
    }
}

/// Errors surfaced by [`Fetcher::fetch`].
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// A transport failure that was not retried.
    #[error("transport error for {url}: {reason}")]
    Transport {
        /// The URL that was requested.
        url: String,
        /// A human-readable description of the failure.
        reason: String,
    },

    /// The server answered with a non-retryable status.
    #[error("HTTP {status} for {url}")]
    HttpStatus {
        /// The URL that was requested.
        url: String,
        /// The response status code.
        status: u16,
    },

    /// The transfer succeeded but the payload failed verification.
    #[error("checksum verification failed for {url}: {source}")]
    ChecksumFailed {
        /// The URL that was requested.
        url: String,
        /// The verification failure.
        #[source]
        source: ChecksumError,
    },

    /// Every attempt failed with a retryable error.
    #[error("failed after {attempts} attempts: {cause}")]
    Exhausted {
        /// Number of attempts made.
        attempts: u32,
        /// The last attempt's failure.
        #[source]
        cause: AttemptError,
    },

    /// Cancellation was requested.
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

impl FetchError {
    fn terminal(error: AttemptError) -> Self {
        match error {
            AttemptError::Transport { url, reason } => Self::Transport { url, reason },
            AttemptError::Status { url, status } => Self::HttpStatus { url, status },
            AttemptError::Cancelled(cancelled) => Self::Cancelled(cancelled),
        }
    }
}

/// Performs a single HTTP GET.
///
/// Implementations stream the body, mirror each chunk to `progress`, and
/// poll `cancel` between chunks.
#[cfg_attr(test, mockall::automock)]
pub trait Transport {
    /// Fetch `url` once.
    ///
    /// # Errors
    ///
    /// Returns an [`AttemptError`] describing why this attempt failed.
    fn get(
        &self,
        url: &str,
        cancel: &CancellationToken,
        progress: &mut dyn ProgressSink,
    ) -> Result<Vec<u8>, AttemptError>;
}

/// HTTP transport using `ureq`, with no global request timeout.
#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    /// Create a transport with its own connection pool.
    #[must_use]
    pub fn new() -> Self {
        let config = ureq::Agent::config_builder().timeout_global(None).build();
        Self {
            agent: ureq::Agent::new_with_config(config),
        }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for UreqTransport {
    fn get(
        &self,
        url: &str,
        cancel: &CancellationToken,
        progress: &mut dyn ProgressSink,
    ) -> Result<Vec<u8>, AttemptError> {
        cancel.check()?;
        let response = self
            .agent
            .get(url)
            .call()
            .map_err(|e| map_ureq_error(url, &e))?;
        let mut reader = response.into_body().into_reader();
        let mut body = Vec::new();
        let mut chunk = vec![0u8; READ_CHUNK];
        loop {
            cancel.check()?;
            let read = reader
                .read(&mut chunk)
                .map_err(|e| AttemptError::Transport {
                    url: url.to_owned(),
                    reason: e.to_string(),
                })?;
            let Some(bytes) = chunk.get(..read) else {
                break;
            };
            if bytes.is_empty() {
                break;
            }
            progress.observe(bytes);
            body.extend_from_slice(bytes);
        }
        Ok(body)
    }
}

/// Map a ureq error to an [`AttemptError`].
fn map_ureq_error(url: &str, err: &ureq::Error) -> AttemptError {
    match err {
        ureq::Error::StatusCode(status) => AttemptError::Status {
            url: url.to_owned(),
            status: *status,
        },
        other => AttemptError::Transport {
            url: url.to_owned(),
            reason: other.to_string(),
        },
    }
}

/// Attempt count and linear backoff unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff_unit: Duration,
}

impl RetryPolicy {
    /// Build a policy; `max_attempts` is clamped to at least one.
    #[must_use]
    pub fn new(max_attempts: u32, backoff_unit: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_unit,
        }
    }

    /// Total attempts, including the first.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before attempt `attempt` (1-based): `attempt - 1` units.
    #[must_use]
    pub fn backoff_before(&self, attempt: u32) -> Duration {
        self.backoff_unit * attempt.saturating_sub(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_BACKOFF_UNIT)
    }
}

/// States of the retry loop.
#[derive(Debug)]
enum RetryState {
    Attempting(u32),
    Waiting { next_attempt: u32, backoff: Duration },
    Succeeded(Vec<u8>),
    Exhausted(AttemptError),
}

/// Downloads and verifies payloads.
pub struct Fetcher<'a> {
    transport: &'a dyn Transport,
    clock: &'a dyn Clock,
    policy: RetryPolicy,
}

impl<'a> Fetcher<'a> {
    /// Create a fetcher over the given transport and clock.
    #[must_use]
    pub fn new(transport: &'a dyn Transport, clock: &'a dyn Clock, policy: RetryPolicy) -> Self {
        Self {
            transport,
            clock,
            policy,
        }
    }

    /// The retry policy in force.
    #[must_use]
    pub const fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Download `url` and verify it against `expected`.
    ///
    /// Transport failures and 5xx responses are retried up to the policy's
    /// attempt limit. Other statuses and checksum failures return at once.
    ///
    /// # Errors
    ///
    /// See [`FetchError`] for the distinct failure kinds.
    pub fn fetch(
        &self,
        url: &str,
        expected: &Digest,
        cancel: &CancellationToken,
        progress: Option<&mut dyn ProgressSink>,
    ) -> Result<Vec<u8>, FetchError> {
        let mut discard = |_: &[u8]| {};
        let sink: &mut dyn ProgressSink = match progress {
            Some(sink) => sink,
            None => &mut discard,
        };

        let mut state = RetryState::Attempting(1);
        loop {
            state = match state {
                RetryState::Attempting(attempt) => {
                    debug!("fetching {url} (attempt {attempt}/{})", self.policy.max_attempts);
                    self.attempt(url, attempt, cancel, sink)?
                }
                RetryState::Waiting {
                    next_attempt,
                    backoff,
                } => {
                    self.clock.sleep(backoff, cancel)?;
                    RetryState::Attempting(next_attempt)
                }
                RetryState::Succeeded(payload) => {
                    verify_digest(&payload, expected).map_err(|source| {
                        FetchError::ChecksumFailed {
                            url: url.to_owned(),
                            source,
                        }
                    })?;
                    info!("fetched {} bytes from {url}", payload.len());
                    return Ok(payload);
                }
                RetryState::Exhausted(cause) => {
                    return Err(FetchError::Exhausted {
                        attempts: self.policy.max_attempts,
                        cause,
                    });
                }
            };
        }
    }

    fn attempt(
        &self,
        url: &str,
        attempt: u32,
        cancel: &CancellationToken,
        sink: &mut dyn ProgressSink,
    ) -> Result<RetryState, FetchError> {
        match self.transport.get(url, cancel, sink) {
            Ok(payload) => Ok(RetryState::Succeeded(payload)),
            Err(error) if !error.is_retryable() => Err(FetchError::terminal(error)),
            Err(error) if attempt >= self.policy.max_attempts => {
                Ok(RetryState::Exhausted(error))
            }
            Err(error) => {
                let next_attempt = attempt + 1;
                let backoff = self.policy.backoff_before(next_attempt);
                warn!("attempt {attempt} failed: {error}; retrying in {backoff:?}");
                Ok(RetryState::Waiting {
                    next_attempt,
                    backoff,
                })
            }
        }
    }
}

#[cfg(test)]
#[path = "download_tests.rs"]
mod tests;
