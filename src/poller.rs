//! CID metadata poller
//!
//! The storage backend assigns a content identifier asynchronously after an
//! object is written and publishes it as user metadata. This module waits for
//! that field with bounded exponential backoff.
//!
//! # Schedule
//!
//! ```text
//! attempt ─ 500ms ─ attempt ─ 1s ─ attempt ─ 2s ─ attempt ─ 4s ─ attempt ─ 4s ─ ...
//! ```
//!
//! The first lookup happens immediately. Polling stops when the CID shows up,
//! when the wait budget is spent, when the optional attempt cap is reached, or
//! when the cancellation token fires. The final sleep is clamped so the last
//! lookup lands on the deadline instead of past it.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::PollConfig;
use crate::metrics::{POLL_ATTEMPTS_TOTAL, POLL_DURATION_SECONDS};
use crate::storage::{ObjectMetadata, ObjectStore};

/// Metadata keys checked for the CID, in order
pub const CID_METADATA_KEYS: [&str; 3] = ["cid", "CID", "Cid"];

/// Outcome of waiting for a CID
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollResult {
    /// The backend published a non-blank CID (already trimmed)
    Found(String),
    /// The wait budget or attempt cap ran out first
    TimedOut,
    /// The cancellation token fired while waiting
    Cancelled,
}

impl PollResult {
    fn label(&self) -> &'static str {
        match self {
            PollResult::Found(_) => "found",
            PollResult::TimedOut => "timed_out",
            PollResult::Cancelled => "cancelled",
        }
    }
}

/// Bounds for a single poll run
#[derive(Debug, Clone)]
pub struct PollPolicy {
    /// Wall-clock budget measured from the first lookup
    pub max_wait: Duration,
    /// Optional cap on the number of lookups
    pub max_attempts: Option<u32>,
    /// Delay after the first failed lookup
    pub initial_delay: Duration,
    /// Ceiling for the doubling delay
    pub max_delay: Duration,
    /// Upper bound for one metadata lookup
    pub attempt_timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_wait: Duration::from_secs(30),
            max_attempts: None,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_millis(4_000),
            attempt_timeout: Duration::from_secs(5),
        }
    }
}

impl From<&PollConfig> for PollPolicy {
    fn from(config: &PollConfig) -> Self {
        Self {
            max_wait: config.max_wait(),
            max_attempts: config.max_attempts,
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            attempt_timeout: Duration::from_millis(config.attempt_timeout_ms),
        }
    }
}

impl PollPolicy {
    pub fn backoff(&self) -> Backoff {
        Backoff::new(self.initial_delay, self.max_delay)
    }
}

/// Doubling delay sequence capped at a maximum
///
/// Never ends: once the cap is reached it keeps yielding the cap.
#[derive(Debug, Clone)]
pub struct Backoff {
    next: Duration,
    max: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            next: initial.min(max),
            max,
        }
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let current = self.next;
        self.next = self.next.saturating_mul(2).min(self.max);
        Some(current)
    }
}

/// Pull the CID out of object metadata
///
/// Keys are checked in [`CID_METADATA_KEYS`] order; the first value that is
/// not blank after trimming wins.
pub fn extract_cid(metadata: &ObjectMetadata) -> Option<String> {
    CID_METADATA_KEYS
        .iter()
        .filter_map(|key| metadata.get(*key))
        .map(|value| value.trim())
        .find(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}

/// Wait until the object at `bucket/key` carries a CID
///
/// Lookup failures (object not visible yet, transport errors, slow responses)
/// are absorbed and retried. Nothing is raised to the caller: an absent CID
/// is reported as [`PollResult::TimedOut`].
///
/// Only the calling task is suspended between attempts. Dropping the returned
/// future stops polling immediately.
pub async fn poll_cid(
    store: &dyn ObjectStore,
    bucket: &str,
    key: &str,
    policy: &PollPolicy,
    cancel: &CancellationToken,
) -> PollResult {
    let started = Instant::now();
    let deadline = started + policy.max_wait;
    let mut backoff = policy.backoff();
    let mut attempt: u32 = 0;

    let result = loop {
        if cancel.is_cancelled() {
            break PollResult::Cancelled;
        }

        attempt += 1;
        POLL_ATTEMPTS_TOTAL.inc();

        // The last lookup may start exactly at the deadline; it still gets a
        // short window to answer.
        let remaining = deadline.saturating_duration_since(Instant::now());
        let lookup_budget = policy
            .attempt_timeout
            .min(remaining)
            .max(policy.initial_delay.min(policy.attempt_timeout));

        let lookup = tokio::time::timeout(lookup_budget, store.head_object(bucket, key));
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => break PollResult::Cancelled,
            outcome = lookup => outcome,
        };

        match outcome {
            Ok(Ok(Some(metadata))) => {
                if let Some(cid) = extract_cid(&metadata) {
                    break PollResult::Found(cid);
                }
                tracing::debug!(%key, attempt, "Object visible but CID not assigned yet");
            }
            Ok(Ok(None)) => {
                tracing::debug!(%key, attempt, "Object not visible yet");
            }
            Ok(Err(error)) => {
                tracing::debug!(%key, attempt, %error, "Metadata lookup failed; retrying");
            }
            Err(_) => {
                tracing::debug!(
                    %key,
                    attempt,
                    budget_ms = lookup_budget.as_millis() as u64,
                    "Metadata lookup timed out; retrying"
                );
            }
        }

        if policy.max_attempts.is_some_and(|max| attempt >= max) {
            break PollResult::TimedOut;
        }

        let now = Instant::now();
        if now >= deadline {
            break PollResult::TimedOut;
        }

        let delay = backoff
            .next()
            .unwrap_or(policy.max_delay)
            .min(deadline - now);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break PollResult::Cancelled,
            _ = tokio::time::sleep(delay) => {}
        }
    };

    let elapsed = started.elapsed();
    POLL_DURATION_SECONDS
        .with_label_values(&[result.label()])
        .observe(elapsed.as_secs_f64());

    match &result {
        PollResult::Found(cid) => tracing::info!(
            %bucket,
            %key,
            %cid,
            attempts = attempt,
            elapsed_ms = elapsed.as_millis() as u64,
            "CID resolved"
        ),
        PollResult::TimedOut => tracing::warn!(
            %bucket,
            %key,
            attempts = attempt,
            elapsed_ms = elapsed.as_millis() as u64,
            "Gave up waiting for CID"
        ),
        PollResult::Cancelled => tracing::info!(
            %bucket,
            %key,
            attempts = attempt,
            elapsed_ms = elapsed.as_millis() as u64,
            "CID polling cancelled"
        ),
    }

    result
}
