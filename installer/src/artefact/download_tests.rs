//! Unit tests for the retrying fetcher.

use super::*;
use crate::test_utils::{InstantClock, ScriptedResponse, ScriptedTransport, digest_of};
use rstest::rstest;

const URL: &str = "https://example.test/tool.tar.gz";
const PAYLOAD: &[u8] = b"hello, world";

fn fetch_with(
    transport: &ScriptedTransport,
    clock: &InstantClock,
    expected: &Digest,
) -> Result<Vec<u8>, FetchError> {
    let fetcher = Fetcher::new(transport, clock, RetryPolicy::default());
    fetcher.fetch(URL, expected, &CancellationToken::new(), None)
}

#[test]
fn returns_verified_payload_unmodified() {
    let transport = ScriptedTransport::new(vec![ScriptedResponse::ok(PAYLOAD)]);
    let clock = InstantClock::new();

    let payload = fetch_with(&transport, &clock, &digest_of(PAYLOAD)).expect("fetch succeeds");

    assert_eq!(payload, PAYLOAD);
    assert_eq!(payload.len(), 12);
    assert_eq!(transport.call_count(), 1);
    assert!(clock.sleeps().is_empty());
}

#[test]
fn fetcher_requests_the_descriptor_url() {
    let mut transport = MockTransport::new();
    transport
        .expect_get()
        .times(1)
        .returning(|url, _, _| match url {
            URL => Ok(PAYLOAD.to_vec()),
            other => Err(AttemptError::Status {
                url: other.to_owned(),
                status: 404,
            }),
        });
    let clock = InstantClock::new();
    let fetcher = Fetcher::new(&transport, &clock, RetryPolicy::default());

    let payload = fetcher
        .fetch(URL, &digest_of(PAYLOAD), &CancellationToken::new(), None)
        .expect("fetch succeeds");

    assert_eq!(payload, PAYLOAD);
}

#[test]
fn retries_server_errors_with_linear_backoff() {
    let transport = ScriptedTransport::new(vec![
        ScriptedResponse::Status(500),
        ScriptedResponse::Status(500),
        ScriptedResponse::ok(PAYLOAD),
    ]);
    let clock = InstantClock::new();

    let payload = fetch_with(&transport, &clock, &digest_of(PAYLOAD)).expect("third attempt wins");

    assert_eq!(payload, PAYLOAD);
    assert_eq!(transport.call_count(), 3);
    assert_eq!(
        clock.sleeps(),
        vec![Duration::from_secs(1), Duration::from_secs(2)]
    );
}

#[test]
fn retries_transport_errors() {
    let transport = ScriptedTransport::new(vec![
        ScriptedResponse::Transport("connection refused".to_owned()),
        ScriptedResponse::ok(PAYLOAD),
    ]);
    let clock = InstantClock::new();

    let payload = fetch_with(&transport, &clock, &digest_of(PAYLOAD)).expect("second attempt wins");

    assert_eq!(payload, PAYLOAD);
    assert_eq!(transport.call_count(), 2);
}

#[test]
fn exhaustion_wraps_last_error() {
    let transport = ScriptedTransport::new(vec![
        ScriptedResponse::Transport("timeout".to_owned()),
        ScriptedResponse::Status(502),
        ScriptedResponse::Status(503),
    ]);
    let clock = InstantClock::new();

    let err = fetch_with(&transport, &clock, &digest_of(PAYLOAD)).expect_err("all attempts fail");

    match err {
        FetchError::Exhausted { attempts, cause } => {
            assert_eq!(attempts, 3);
            assert!(matches!(cause, AttemptError::Status { status: 503, .. }));
        }
        other => panic!("expected Exhausted, got {other:?}"),
    }
    assert_eq!(transport.call_count(), 3);
}

#[rstest]
#[case::not_found(404)]
#[case::forbidden(403)]
#[case::redirect_loop(310)]
fn client_errors_are_not_retried(#[case] status: u16) {
    let transport = ScriptedTransport::new(vec![ScriptedResponse::Status(status)]);
    let clock = InstantClock::new();

    let err = fetch_with(&transport, &clock, &digest_of(PAYLOAD)).expect_err("terminal status");

    assert!(matches!(err, FetchError::HttpStatus { status: s, .. } if s == status));
    assert_eq!(transport.call_count(), 1);
    assert!(clock.sleeps().is_empty());
}

#[test]
fn checksum_failure_is_not_retried() {
    let transport = ScriptedTransport::new(vec![ScriptedResponse::ok(b"tampered")]);
    let clock = InstantClock::new();

    let err = fetch_with(&transport, &clock, &digest_of(PAYLOAD)).expect_err("checksum fails");

    assert!(matches!(
        err,
        FetchError::ChecksumFailed {
            source: ChecksumError::Mismatch { .. },
            ..
        }
    ));
    assert_eq!(transport.call_count(), 1);
}

#[test]
fn progress_sink_sees_every_chunk() {
    let body = vec![7u8; 10_000];
    let transport = ScriptedTransport::new(vec![ScriptedResponse::Body {
        body: body.clone(),
        chunk: 999,
    }]);
    let clock = InstantClock::new();
    let fetcher = Fetcher::new(&transport, &clock, RetryPolicy::default());
    let mut counter = ByteCounter::default();

    let payload = fetcher
        .fetch(URL, &digest_of(&body), &CancellationToken::new(), Some(&mut counter))
        .expect("fetch succeeds");

    assert_eq!(payload, body);
    assert_eq!(counter.total, 10_000);
}

#[test]
fn cancellation_during_backoff_stops_retrying() {
    let transport = ScriptedTransport::new(vec![ScriptedResponse::Status(500)]);
    let clock = InstantClock::new();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let fetcher = Fetcher::new(&transport, &clock, RetryPolicy::default());

    let err = fetcher
        .fetch(URL, &digest_of(PAYLOAD), &cancel, None)
        .expect_err("cancelled");

    assert!(matches!(err, FetchError::Cancelled(_)));
}

#[rstest]
#[case(1, Duration::ZERO)]
#[case(2, Duration::from_millis(250))]
#[case(3, Duration::from_millis(500))]
fn backoff_grows_linearly(#[case] attempt: u32, #[case] expected: Duration) {
    let policy = RetryPolicy::new(3, Duration::from_millis(250));
    assert_eq!(policy.backoff_before(attempt), expected);
}

#[test]
fn policy_requires_at_least_one_attempt() {
    assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts(), 1);
}

#[test]
fn log_progress_counts_bytes() {
    let mut progress = LogProgress::new("tool", 4);
    progress.observe(b"abcdef");
    progress.observe(b"gh");
    assert_eq!(progress.seen(), 8);
}

#[rstest]
#[case::server_error(ureq::Error::StatusCode(500), true)]
#[case::not_found(ureq::Error::StatusCode(404), false)]
#[case::io(ureq::Error::Io(std::io::Error::other("connection reset")), true)]
fn maps_ureq_errors(#[case] error: ureq::Error, #[case] retryable: bool) {
    let mapped = map_ureq_error(URL, &error);
    assert_eq!(mapped.is_retryable(), retryable);
}
