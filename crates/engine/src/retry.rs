//! Retry / backoff controller.
//!
//! Wraps one remote invocation. The decision of what to do after a failed
//! attempt is the pure [`RetryPolicy::next_action`]; [`attempt_with_retry`]
//! drives it with an injectable [`Sleeper`] so tests can observe delays
//! without waiting.

use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::error::RemoteError;
use crate::pool::CancelToken;

// ── Constants ───────────────────────────────────────────────────────

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(5);
pub const DEFAULT_MULTIPLIER: f64 = 2.0;
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(60);
pub const DEFAULT_RETRYABLE_STATUSES: &[u16] = &[422, 429, 500, 502, 503, 504];

/// Longest uninterrupted sleep while waiting out a backoff.
const CANCEL_POLL: Duration = Duration::from_millis(100);

// ── Policy ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: f64,
    pub retryable_statuses: Vec<u16>,
    pub retry_connection: bool,
    pub retry_timeout: bool,
    /// Upper bound of uniform random jitter added to each delay.
    pub jitter: Duration,
    /// Ceiling for any single wait, including server-sent `Retry-After`.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            multiplier: DEFAULT_MULTIPLIER,
            retryable_statuses: DEFAULT_RETRYABLE_STATUSES.to_vec(),
            retry_connection: true,
            retry_timeout: true,
            jitter: Duration::ZERO,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryAction {
    Retry(Duration),
    Fail,
}

impl RetryPolicy {
    pub fn is_retryable(&self, err: &RemoteError) -> bool {
        match err {
            RemoteError::Status { status, .. } => self.retryable_statuses.contains(status),
            RemoteError::Connection(_) => self.retry_connection,
            RemoteError::Timeout(_) => self.retry_timeout,
            RemoteError::Protocol(_) => false,
        }
    }

    /// Delay after failed attempt `attempt` (1-based), before the next one.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let factor = self.multiplier.max(0.0).powi(exp);
        Duration::try_from_secs_f64(self.base_delay.as_secs_f64() * factor).unwrap_or(Duration::MAX)
    }

    /// What to do after attempt `attempt` failed with `err`.
    pub fn next_action(&self, err: &RemoteError, attempt: u32) -> RetryAction {
        if attempt >= self.max_attempts.max(1) || !self.is_retryable(err) {
            return RetryAction::Fail;
        }
        let delay = match err {
            RemoteError::Status { status: 429, retry_after: Some(secs), .. } => {
                Duration::from_secs(*secs)
            }
            _ => self.backoff(attempt),
        };
        RetryAction::Retry(delay.min(self.max_delay))
    }

    fn jitter_sample(&self) -> Duration {
        if self.jitter.is_zero() {
            return Duration::ZERO;
        }
        let max = self.jitter.as_millis().min(u64::MAX as u128) as u64;
        Duration::from_millis(rand::thread_rng().gen_range(0..=max))
    }
}

// ── State machine ───────────────────────────────────────────────────

/// Per-invocation state. Never shared between concurrent calls.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetryState {
    pub attempt: u32,
    pub last_error: Option<RemoteError>,
}

/// Terminal failure: the last error seen and how many attempts were made.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryFailure {
    pub error: RemoteError,
    pub attempts: u32,
}

impl std::fmt::Display for RetryFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (after {} attempt(s))", self.error, self.attempts)
    }
}

pub trait Sleeper: Send + Sync {
    fn sleep(&self, delay: Duration);

    /// Wait out `delay` unless `cancel` trips. Returns `false` when the wait
    /// was abandoned.
    fn sleep_unless_cancelled(&self, delay: Duration, cancel: &CancelToken) -> bool {
        if cancel.is_cancelled() {
            return false;
        }
        self.sleep(delay);
        !cancel.is_cancelled()
    }
}

/// Blocks the current thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, delay: Duration) {
        std::thread::sleep(delay);
    }

    fn sleep_unless_cancelled(&self, delay: Duration, cancel: &CancelToken) -> bool {
        let mut left = delay;
        while !left.is_zero() {
            if cancel.is_cancelled() {
                return false;
            }
            let step = left.min(CANCEL_POLL);
            std::thread::sleep(step);
            left -= step;
        }
        !cancel.is_cancelled()
    }
}

/// Run `call` until it succeeds, fails terminally, or runs out of attempts.
///
/// `call` receives the 1-based attempt number. `what` names the operation in
/// retry log lines.
pub fn attempt_with_retry<T>(
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    what: &str,
    call: impl FnMut(u32) -> Result<T, RemoteError>,
) -> Result<T, RetryFailure> {
    attempt_until_cancelled(policy, sleeper, &CancelToken::new(), what, call)
}

/// Like [`attempt_with_retry`], but gives up as soon as `cancel` trips
/// during a backoff wait. The failure then carries the last error seen.
pub fn attempt_until_cancelled<T>(
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    cancel: &CancelToken,
    what: &str,
    mut call: impl FnMut(u32) -> Result<T, RemoteError>,
) -> Result<T, RetryFailure> {
    let mut state = RetryState::default();
    loop {
        state.attempt += 1;
        match call(state.attempt) {
            Ok(value) => return Ok(value),
            Err(err) => match policy.next_action(&err, state.attempt) {
                RetryAction::Retry(delay) => {
                    let delay = delay.saturating_add(policy.jitter_sample()).min(policy.max_delay);
                    warn!(
                        "{what}: {err}; retrying in {:.1}s (attempt {}/{})",
                        delay.as_secs_f64(),
                        state.attempt + 1,
                        policy.max_attempts,
                    );
                    if !sleeper.sleep_unless_cancelled(delay, cancel) {
                        warn!("{what}: cancelled while waiting to retry");
                        return Err(RetryFailure {
                            error: err,
                            attempts: state.attempt,
                        });
                    }
                    state.last_error = Some(err);
                }
                RetryAction::Fail => {
                    return Err(RetryFailure {
                        error: err,
                        attempts: state.attempt,
                    });
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<Duration>>);

    impl Sleeper for Recorder {
        fn sleep(&self, delay: Duration) {
            self.0.lock().unwrap().push(delay);
        }
    }

    fn status(code: u16) -> RemoteError {
        RemoteError::Status { status: code, message: "x".into(), retry_after: None }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy { base_delay: Duration::from_millis(100), ..RetryPolicy::default() }
    }

    #[test]
    fn two_retryable_failures_then_success() {
        let sleeper = Recorder::default();
        let mut calls = 0;
        let out = attempt_with_retry(&policy(), &sleeper, "test", |_| {
            calls += 1;
            if calls < 3 { Err(status(503)) } else { Ok("done") }
        });
        assert_eq!(out, Ok("done"));
        assert_eq!(calls, 3);
        assert_eq!(
            *sleeper.0.lock().unwrap(),
            vec![Duration::from_millis(100), Duration::from_millis(200)]
        );
    }

    #[test]
    fn non_retryable_fails_without_sleeping() {
        let sleeper = Recorder::default();
        let out: Result<(), _> = attempt_with_retry(&policy(), &sleeper, "test", |_| Err(status(400)));
        assert_eq!(out.unwrap_err().attempts, 1);
        assert!(sleeper.0.lock().unwrap().is_empty());
    }

    #[test]
    fn exhaustion_returns_last_error() {
        let sleeper = Recorder::default();
        let out: Result<(), _> = attempt_with_retry(&policy(), &sleeper, "test", |n| {
            Err(RemoteError::Connection(format!("refused #{n}")))
        });
        let failure = out.unwrap_err();
        assert_eq!(failure.attempts, 3);
        assert_eq!(failure.error, RemoteError::Connection("refused #3".into()));
        assert_eq!(sleeper.0.lock().unwrap().len(), 2);
    }

    #[test]
    fn retry_after_overrides_backoff() {
        let err = RemoteError::Status { status: 429, message: String::new(), retry_after: Some(7) };
        assert_eq!(policy().next_action(&err, 1), RetryAction::Retry(Duration::from_secs(7)));
    }

    #[test]
    fn unprocessable_entity_is_retryable() {
        assert_eq!(
            policy().next_action(&status(422), 2),
            RetryAction::Retry(Duration::from_millis(200))
        );
        assert_eq!(policy().next_action(&status(422), 3), RetryAction::Fail);
    }

    #[test]
    fn protocol_errors_are_final() {
        assert_eq!(
            policy().next_action(&RemoteError::Protocol("bad".into()), 1),
            RetryAction::Fail
        );
    }

    #[test]
    fn default_backoff_schedule() {
        let p = RetryPolicy::default();
        assert_eq!(p.backoff(1), Duration::from_secs(5));
        assert_eq!(p.backoff(2), Duration::from_secs(10));
        assert_eq!(p.backoff(3), Duration::from_secs(20));
    }

    #[test]
    fn zero_max_attempts_still_tries_once() {
        let p = RetryPolicy { max_attempts: 0, ..policy() };
        let sleeper = Recorder::default();
        let mut calls = 0;
        let _: Result<(), _> = attempt_with_retry(&p, &sleeper, "test", |_| {
            calls += 1;
            Err(status(500))
        });
        assert_eq!(calls, 1);
    }

    #[test]
    fn long_retry_after_is_capped() {
        let p = RetryPolicy { max_delay: Duration::from_secs(30), ..policy() };
        let err = RemoteError::Status { status: 429, message: String::new(), retry_after: Some(3600) };
        assert_eq!(p.next_action(&err, 1), RetryAction::Retry(Duration::from_secs(30)));

        let steep = RetryPolicy { base_delay: Duration::from_secs(50), ..p };
        assert_eq!(steep.next_action(&status(503), 2), RetryAction::Retry(Duration::from_secs(30)));
    }

    /// Trips the token on its first sleep.
    struct CancelOnSleep(CancelToken, Recorder);

    impl Sleeper for CancelOnSleep {
        fn sleep(&self, delay: Duration) {
            self.1.sleep(delay);
            self.0.cancel();
        }
    }

    #[test]
    fn cancel_during_backoff_stops_retrying() {
        let cancel = CancelToken::new();
        let sleeper = CancelOnSleep(cancel.clone(), Recorder::default());
        let mut calls = 0;
        let out: Result<(), _> = attempt_until_cancelled(&policy(), &sleeper, &cancel, "test", |_| {
            calls += 1;
            Err(status(503))
        });
        let failure = out.unwrap_err();
        assert_eq!(calls, 1);
        assert_eq!(failure.attempts, 1);
        assert_eq!(failure.error, status(503));
        assert_eq!(sleeper.1 .0.lock().unwrap().len(), 1);
    }

    #[test]
    fn already_cancelled_skips_the_wait() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let sleeper = Recorder::default();
        let out: Result<(), _> =
            attempt_until_cancelled(&policy(), &sleeper, &cancel, "test", |_| Err(status(503)));
        assert_eq!(out.unwrap_err().attempts, 1);
        assert!(sleeper.0.lock().unwrap().is_empty());
    }

    #[test]
    fn thread_sleeper_wakes_on_cancel() {
        let cancel = CancelToken::new();
        let remote = cancel.clone();
        let trip = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            remote.cancel();
        });
        let started = std::time::Instant::now();
        assert!(!ThreadSleeper.sleep_unless_cancelled(Duration::from_secs(30), &cancel));
        assert!(started.elapsed() < Duration::from_secs(5));
        trip.join().unwrap();
    }

    #[test]
    fn jitter_stays_within_bound() {
        let p = RetryPolicy { jitter: Duration::from_millis(50), ..policy() };
        for _ in 0..20 {
            assert!(p.jitter_sample() <= Duration::from_millis(50));
        }
    }
}
