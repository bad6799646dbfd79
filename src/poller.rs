// Copyright 2023 mailgun-provider authors
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Poll-until-condition loop used to wait for domain verification.
//!
//! [`poll`] calls a read-only fetch function, classifies each result as
//! pending or target, and sleeps `interval` between attempts until the target
//! is reached, the overall timeout passes, a fetch fails for good, or the
//! caller cancels.

use std::fmt;
use std::time::Duration;

use thiserror::Error;
use tokio::time::{Instant, sleep_until, timeout_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::MailgunApi;
use crate::error::ProviderError;
use crate::models::DomainSnapshot;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(10 * 60);
/// Consecutive "not found" answers tolerated right after creation.
pub const DEFAULT_NOT_FOUND_CHECKS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub timeout: Duration,
    pub not_found_checks: u32,
}

impl PollConfig {
    pub fn new(interval: Duration, timeout: Duration) -> Result<Self, ProviderError> {
        if interval.is_zero() {
            return Err(ProviderError::Validation("poll interval must be positive".into()));
        }
        if timeout.is_zero() {
            return Err(ProviderError::Validation("poll timeout must be positive".into()));
        }
        Ok(Self {
            interval,
            timeout,
            not_found_checks: DEFAULT_NOT_FOUND_CHECKS,
        })
    }

    pub fn with_not_found_checks(mut self, checks: u32) -> Self {
        self.not_found_checks = checks;
        self
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_POLL_TIMEOUT,
            not_found_checks: DEFAULT_NOT_FOUND_CHECKS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Pending,
    Target,
}

impl fmt::Display for PollState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollState::Pending => write!(f, "pending"),
            PollState::Target => write!(f, "target"),
        }
    }
}

/// Outcome of a single fetch attempt.
#[derive(Debug)]
pub enum PollResult<S> {
    Observed { snapshot: S, state: PollState },
    /// The object is not visible yet; retried while the tolerance lasts.
    NotFound(ProviderError),
    Failed(ProviderError),
}

impl<S> PollResult<S> {
    pub fn classify(result: Result<S, ProviderError>, is_target: impl Fn(&S) -> bool) -> Self {
        match result {
            Ok(snapshot) => {
                let state = if is_target(&snapshot) {
                    PollState::Target
                } else {
                    PollState::Pending
                };
                PollResult::Observed { snapshot, state }
            }
            Err(err) if err.is_not_found() => PollResult::NotFound(err),
            Err(err) => PollResult::Failed(err),
        }
    }
}

#[derive(Debug, Error)]
pub enum PollError<S> {
    #[error("target state not reached within {elapsed:?}")]
    Timeout { elapsed: Duration, last: Option<S> },

    #[error("fetch failed: {0}")]
    Fetch(#[source] ProviderError),

    #[error("polling cancelled")]
    Cancelled,
}

/// Calls `fetch` until `is_target` accepts a snapshot.
///
/// The first fetch happens immediately. Both the fetch and the wait between
/// attempts are raced against `cancel` and against the overall deadline, so a
/// slow request cannot stretch the timeout.
pub async fn poll<S, F, Fut, P>(
    mut fetch: F,
    is_target: P,
    config: &PollConfig,
    cancel: &CancellationToken,
) -> Result<S, PollError<S>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<S, ProviderError>>,
    P: Fn(&S) -> bool,
{
    let start = Instant::now();
    let deadline = start + config.timeout;
    let mut not_found = 0u32;
    let mut last: Option<S> = None;
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PollError::Cancelled),
            fetched = timeout_at(deadline, fetch()) => fetched,
        };
        let Ok(result) = fetched else {
            warn!("Deadline passed during fetch attempt {}", attempt);
            return Err(PollError::Timeout {
                elapsed: start.elapsed(),
                last,
            });
        };

        match PollResult::classify(result, &is_target) {
            PollResult::Observed {
                snapshot,
                state: PollState::Target,
            } => {
                info!("Target state reached after {} attempt(s)", attempt);
                return Ok(snapshot);
            }
            PollResult::Observed { snapshot, state } => {
                debug!("Attempt {}: {}", attempt, state);
                not_found = 0;
                last = Some(snapshot);
            }
            PollResult::NotFound(err) => {
                not_found += 1;
                if not_found > config.not_found_checks {
                    return Err(PollError::Fetch(err));
                }
                debug!(
                    "Attempt {}: not found ({}/{})",
                    attempt, not_found, config.not_found_checks
                );
            }
            PollResult::Failed(err) => return Err(PollError::Fetch(err)),
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(PollError::Timeout {
                elapsed: now - start,
                last,
            });
        }

        let wake = (now + config.interval).min(deadline);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PollError::Cancelled),
            _ = sleep_until(wake) => {}
        }

        // A fetch started at the deadline could never complete.
        if wake >= deadline {
            return Err(PollError::Timeout {
                elapsed: start.elapsed(),
                last,
            });
        }
    }
}

/// Waits until Mailgun reports every DNS record of a domain as valid.
pub struct VerificationPoller {
    config: PollConfig,
}

impl VerificationPoller {
    pub fn new(config: PollConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    pub async fn wait(
        &self,
        api: &dyn MailgunApi,
        domain: &str,
        cancel: &CancellationToken,
    ) -> Result<DomainSnapshot, PollError<DomainSnapshot>> {
        info!(
            "Waiting up to {:?} for domain {} to verify (every {:?})",
            self.config.timeout, domain, self.config.interval
        );
        poll(
            || api.get_domain(domain),
            DomainSnapshot::records_are_valid,
            &self.config,
            cancel,
        )
        .await
    }
}

impl PollError<DomainSnapshot> {
    /// Collapses a verification failure into the crate error, keeping the
    /// records that were still pending for the diagnostic.
    pub fn into_provider_error(self, domain: &str) -> ProviderError {
        match self {
            PollError::Timeout { elapsed, last } => ProviderError::VerificationTimeout {
                domain: domain.to_string(),
                elapsed,
                pending_records: last.map(|s| s.pending_records()).unwrap_or_default(),
            },
            PollError::Fetch(err) => err,
            PollError::Cancelled => ProviderError::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn config(interval: u64, timeout: u64) -> PollConfig {
        PollConfig::new(Duration::from_secs(interval), Duration::from_secs(timeout)).unwrap()
    }

    #[test]
    fn test_config_rejects_zero() {
        assert!(PollConfig::new(Duration::ZERO, Duration::from_secs(1)).is_err());
        assert!(PollConfig::new(Duration::from_secs(1), Duration::ZERO).is_err());
        assert_eq!(PollConfig::default().interval, Duration::from_secs(15));
        assert_eq!(PollConfig::default().timeout, Duration::from_secs(600));
    }

    #[test]
    fn test_classify() {
        let r = PollResult::classify(Ok(3), |n: &i32| *n > 2);
        assert!(matches!(r, PollResult::Observed { state: PollState::Target, .. }));

        let r = PollResult::classify(Ok(1), |n: &i32| *n > 2);
        assert!(matches!(r, PollResult::Observed { state: PollState::Pending, .. }));

        let r = PollResult::<i32>::classify(Err(ProviderError::NotFound("x".into())), |_| true);
        assert!(matches!(r, PollResult::NotFound(_)));

        let r = PollResult::<i32>::classify(Err(ProviderError::Validation("x".into())), |_| true);
        assert!(matches!(r, PollResult::Failed(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_target_after_pending_attempts() {
        let calls = AtomicUsize::new(0);
        let start = Instant::now();

        let result = poll(
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move { Ok::<_, ProviderError>(n) }
            },
            |n| *n >= 3,
            &config(10, 600),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        let elapsed = start.elapsed();
        assert_eq!(result, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert!(elapsed >= Duration::from_secs(30), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_secs(31), "elapsed {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_target_does_not_wait() {
        let start = Instant::now();
        let result = poll(
            || async { Ok::<_, ProviderError>("verified") },
            |_| true,
            &config(10, 600),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(result, "verified");
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_carries_last_snapshot() {
        let calls = AtomicUsize::new(0);
        let start = Instant::now();

        let err = poll(
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move { Ok::<_, ProviderError>(n) }
            },
            |_| false,
            &config(10, 20),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        let elapsed = start.elapsed();
        match err {
            PollError::Timeout { last, .. } => assert_eq!(last, Some(1)),
            other => panic!("expected timeout, got {other:?}"),
        }
        // Fetches at 0s and 10s; none is started at the 20s deadline.
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(elapsed >= Duration::from_secs(20), "elapsed {elapsed:?}");
        assert!(elapsed <= Duration::from_secs(30), "elapsed {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_fetch_is_bounded_by_deadline() {
        let start = Instant::now();

        let err = poll(
            || async {
                tokio::time::sleep(Duration::from_secs(3_600)).await;
                Ok::<_, ProviderError>(0)
            },
            |_| true,
            &config(10, 60),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, PollError::Timeout { last: None, .. }));
        assert!(start.elapsed() <= Duration::from_secs(61));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_mid_wait_is_prompt() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            trigger.cancel();
        });

        let start = Instant::now();
        let err = poll(
            || async { Ok::<_, ProviderError>(()) },
            |_| false,
            &config(60, 600),
            &cancel,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, PollError::Cancelled));
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(5), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_secs(6), "elapsed {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_mid_fetch_is_prompt() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            trigger.cancel();
        });

        let start = Instant::now();
        let err = poll(
            || async {
                tokio::time::sleep(Duration::from_secs(3_600)).await;
                Ok::<_, ProviderError>(())
            },
            |_| true,
            &config(10, 7_200),
            &cancel,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, PollError::Cancelled));
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(3), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_secs(4), "elapsed {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_fetch_at_deadline() {
        let calls = AtomicUsize::new(0);
        let start = Instant::now();

        let err = poll(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, ProviderError>(()) }
            },
            |_| false,
            &config(15, 40),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, PollError::Timeout { last: Some(()), .. }));
        // 0s, 15s and 30s; the clamped wake-up at 40s ends the loop.
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(40));
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = poll(
            || async { Ok::<_, ProviderError>(()) },
            |_| true,
            &config(1, 10),
            &cancel,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PollError::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_is_tolerated_then_found() {
        let calls = AtomicUsize::new(0);

        let result = poll(
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(ProviderError::NotFound("domain".into()))
                    } else {
                        Ok(n)
                    }
                }
            },
            |_| true,
            &config(1, 600),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(result, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_budget_exhausted() {
        let calls = AtomicUsize::new(0);

        let err = poll(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(ProviderError::NotFound("domain".into())) }
            },
            |_| true,
            &config(1, 600).with_not_found_checks(2),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, PollError::Fetch(ProviderError::NotFound(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_errors_are_fatal() {
        let calls = AtomicUsize::new(0);

        let err = poll(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err::<(), _>(ProviderError::Api {
                        status: 500,
                        message: "internal".into(),
                    })
                }
            },
            |_| true,
            &config(1, 600),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, PollError::Fetch(ProviderError::Api { status: 500, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_into_provider_error_lists_pending_records() {
        let snapshot: DomainSnapshot = serde_json::from_value(serde_json::json!({
            "domain": {"name": "example.com"},
            "sending_dns_records": [
                {"name": "example.com", "valid": "valid"},
                {"name": "email.example.com", "valid": "unknown"}
            ]
        }))
        .unwrap();

        let err = PollError::Timeout {
            elapsed: Duration::from_secs(600),
            last: Some(snapshot),
        }
        .into_provider_error("example.com");

        match err {
            ProviderError::VerificationTimeout { pending_records, .. } => {
                assert_eq!(pending_records, vec!["email.example.com".to_string()]);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            PollError::<DomainSnapshot>::Cancelled.into_provider_error("example.com"),
            ProviderError::Cancelled
        ));
    }
}
