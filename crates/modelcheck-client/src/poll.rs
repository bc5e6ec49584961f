use std::fmt;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;

use modelcheck_common::{ModelState, Operation, WatchResponse};

use crate::backend::ModelBackend;

/// How often and for how long to poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub timeout: Duration,
    /// Retry fetch errors until the deadline instead of failing on the first one.
    pub tolerate_fetch_errors: bool,
}

impl PollPolicy {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(1_000);
    /// Locally uploaded models.
    pub const LOCAL_TIMEOUT: Duration = Duration::from_millis(120_000);
    /// GitHub-backed models, which pull their weights first.
    pub const REMOTE_TIMEOUT: Duration = Duration::from_millis(3_600_000);
    /// Floor for `interval`; a zero interval would spin on the backend.
    pub const MIN_INTERVAL: Duration = Duration::from_millis(10);

    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval: interval.max(Self::MIN_INTERVAL),
            timeout,
            tolerate_fetch_errors: false,
        }
    }

    pub fn local() -> Self {
        Self::new(Self::DEFAULT_INTERVAL, Self::LOCAL_TIMEOUT)
    }

    pub fn remote() -> Self {
        Self::new(Self::DEFAULT_INTERVAL, Self::REMOTE_TIMEOUT)
    }

    pub fn tolerating_fetch_errors(mut self) -> Self {
        self.tolerate_fetch_errors = true;
        self
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::local()
    }
}

/// Classifier result for one fetched value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Continue,
    Done,
    Fail(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome<T> {
    Completed(T),
    TimedOut { last: Option<T>, elapsed: Duration },
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PollError {
    #[error("timed out after {elapsed:?}")]
    TimedOut { elapsed: Duration },
    #[error("{0}")]
    Failed(String),
}

impl<T> PollOutcome<T> {
    pub fn is_completed(&self) -> bool {
        matches!(self, PollOutcome::Completed(_))
    }

    pub fn completed(self) -> Option<T> {
        match self {
            PollOutcome::Completed(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_result(self) -> Result<T, PollError> {
        match self {
            PollOutcome::Completed(v) => Ok(v),
            PollOutcome::TimedOut { elapsed, .. } => Err(PollError::TimedOut { elapsed }),
            PollOutcome::Failed(reason) => Err(PollError::Failed(reason)),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PollOutcome::Completed(_) => "completed",
            PollOutcome::TimedOut { .. } => "timed out",
            PollOutcome::Failed(_) => "failed",
        }
    }
}

/// Fetch, classify, sleep, repeat until the classifier says `Done`/`Fail` or
/// the deadline passes.
///
/// The last sleep is cut short at the deadline and followed by one final
/// fetch, so the loop exits at most one fetch after `policy.timeout`.
pub async fn wait_until<T, E, F, Fut, C>(
    policy: &PollPolicy,
    mut fetch: F,
    mut classify: C,
) -> PollOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
    C: FnMut(&T) -> Verdict,
{
    let start = Instant::now();
    let deadline = start + policy.timeout;
    let mut last = None;
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        match fetch().await {
            Ok(value) => match classify(&value) {
                Verdict::Done => {
                    tracing::debug!(
                        attempt,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "poll completed"
                    );
                    return PollOutcome::Completed(value);
                }
                Verdict::Fail(reason) => {
                    tracing::debug!(attempt, %reason, "poll failed");
                    return PollOutcome::Failed(reason);
                }
                Verdict::Continue => {
                    tracing::debug!(attempt, "poll pending");
                    last = Some(value);
                }
            },
            Err(err) if policy.tolerate_fetch_errors => {
                tracing::debug!(attempt, error = %err, "poll fetch failed, retrying");
            }
            Err(err) => return PollOutcome::Failed(err.to_string()),
        }

        let now = Instant::now();
        if now >= deadline {
            let elapsed = now - start;
            tracing::warn!(attempt, elapsed_ms = elapsed.as_millis() as u64, "poll timed out");
            return PollOutcome::TimedOut { last, elapsed };
        }
        let interval = policy.interval.max(PollPolicy::MIN_INTERVAL);
        tokio::time::sleep(interval.min(deadline - now)).await;
    }
}

/// Poll `GET /v1alpha/{name}` until `done`. A finished operation carrying an
/// error is `Failed`.
pub async fn wait_operation(
    backend: &dyn ModelBackend,
    name: &str,
    policy: &PollPolicy,
) -> PollOutcome<Operation> {
    let outcome = wait_until(
        policy,
        || backend.get_operation(name),
        |op: &Operation| match (&op.error, op.done) {
            (Some(err), true) => Verdict::Fail(format!(
                "operation {} failed: {} {}",
                op.name, err.code, err.message
            )),
            (_, true) => Verdict::Done,
            _ => Verdict::Continue,
        },
    )
    .await;
    tracing::info!(operation = %name, outcome = outcome.label(), "operation wait finished");
    outcome
}

/// Target for the state-watch poller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateTarget {
    Is(ModelState),
    IsNot(ModelState),
}

impl StateTarget {
    pub fn matches(&self, state: &ModelState) -> bool {
        match self {
            StateTarget::Is(s) => s == state,
            StateTarget::IsNot(s) => s != state,
        }
    }
}

impl fmt::Display for StateTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateTarget::Is(s) => write!(f, "== {s}"),
            StateTarget::IsNot(s) => write!(f, "!= {s}"),
        }
    }
}

/// Poll `.../watch` until the state satisfies `target`. `STATE_ERROR` fails
/// immediately unless it is the target.
pub async fn wait_model_state(
    backend: &dyn ModelBackend,
    model_id: &str,
    target: StateTarget,
    policy: &PollPolicy,
) -> PollOutcome<WatchResponse> {
    let outcome = wait_until(
        policy,
        || backend.watch_model(model_id),
        |w: &WatchResponse| {
            if target.matches(&w.state) {
                Verdict::Done
            } else if w.state == ModelState::Error {
                Verdict::Fail(format!(
                    "model {model_id} entered {}: {}",
                    w.state,
                    w.message.as_deref().unwrap_or("")
                ))
            } else {
                Verdict::Continue
            }
        },
    )
    .await;
    tracing::info!(model_id, target = %target, outcome = outcome.label(), "state wait finished");
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(interval_ms: u64, timeout_ms: u64) -> PollPolicy {
        PollPolicy::new(Duration::from_millis(interval_ms), Duration::from_millis(timeout_ms))
    }

    #[tokio::test(start_paused = true)]
    async fn test_completes_on_third_attempt() {
        let start = Instant::now();
        let mut n = 0u32;
        let outcome = wait_until(
            &policy(1_000, 10_000),
            || {
                n += 1;
                let k = n;
                async move { Ok::<_, String>(k) }
            },
            |k: &u32| if *k >= 3 { Verdict::Done } else { Verdict::Continue },
        )
        .await;
        assert_eq!(outcome, PollOutcome::Completed(3));
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_within_bound() {
        for (interval, timeout) in [(1_000, 5_000), (2_000, 3_000), (500, 0), (5_000, 1_000)] {
            let p = policy(interval, timeout);
            let start = Instant::now();
            let outcome = wait_until(
                &p,
                || async { Ok::<_, String>("pending") },
                |_: &&str| Verdict::Continue,
            )
            .await;
            let elapsed = start.elapsed();
            match outcome {
                PollOutcome::TimedOut { last, elapsed: reported } => {
                    assert_eq!(last, Some("pending"));
                    assert_eq!(reported, elapsed);
                }
                other => panic!("expected timeout, got {other:?}"),
            }
            assert!(elapsed >= p.timeout);
            assert!(elapsed <= p.timeout + p.interval);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_is_clamped() {
        let p = policy(0, 1_000);
        assert_eq!(p.interval, PollPolicy::MIN_INTERVAL);

        // Fields are public, so the loop clamps too.
        let raw = PollPolicy {
            interval: Duration::ZERO,
            ..p
        };
        let mut attempts = 0u32;
        let outcome = wait_until(
            &raw,
            || {
                attempts += 1;
                async { Ok::<_, String>(()) }
            },
            |_: &()| Verdict::Continue,
        )
        .await;
        assert!(matches!(outcome, PollOutcome::TimedOut { .. }));
        assert!(attempts <= 102, "{attempts} attempts");
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_error_fails_unless_tolerated() {
        let outcome = wait_until(
            &policy(1_000, 5_000),
            || async { Err::<u32, _>("connection refused") },
            |_| Verdict::Done,
        )
        .await;
        assert_eq!(outcome, PollOutcome::Failed("connection refused".to_string()));

        let mut n = 0u32;
        let outcome = wait_until(
            &policy(1_000, 5_000).tolerating_fetch_errors(),
            || {
                n += 1;
                let k = n;
                async move {
                    if k < 3 {
                        Err("404 model not found")
                    } else {
                        Ok(k)
                    }
                }
            },
            |_| Verdict::Done,
        )
        .await;
        assert_eq!(outcome.into_result(), Ok(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_classifier_failure() {
        let outcome = wait_until(
            &policy(1_000, 5_000),
            || async { Ok::<_, String>(ModelState::Error) },
            |s: &ModelState| {
                if *s == ModelState::Error {
                    Verdict::Fail("errored".into())
                } else {
                    Verdict::Continue
                }
            },
        )
        .await;
        assert_eq!(
            outcome.into_result(),
            Err::<ModelState, _>(PollError::Failed("errored".into()))
        );
    }

    #[test]
    fn test_state_target() {
        assert!(StateTarget::Is(ModelState::Online).matches(&ModelState::Online));
        assert!(!StateTarget::Is(ModelState::Online).matches(&ModelState::Offline));
        assert!(StateTarget::IsNot(ModelState::Unspecified).matches(&ModelState::Offline));
        assert_eq!(
            StateTarget::IsNot(ModelState::Unspecified).to_string(),
            "!= STATE_UNSPECIFIED"
        );
    }
}
