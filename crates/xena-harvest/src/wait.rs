// Copyright 2026 Cortex Contributors
// SPDX-License-Identifier: Apache-2.0

//! Bounded, condition-based waiting.
//!
//! Pages on the Xena browser render client-side, so every lookup is a poll:
//! probe, sleep, probe again, until the probe yields a value or the policy's
//! timeout runs out. The poll interval grows geometrically up to a cap.

use crate::error::HarvestError;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// How long and how often to poll.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaitPolicy {
    pub timeout: Duration,
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub backoff_factor: f64,
}

impl WaitPolicy {
    /// Policy with the given timeout and the default 250ms→2s backoff.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            initial_interval: Duration::from_millis(250),
            max_interval: Duration::from_secs(2),
            backoff_factor: 1.5,
        }
    }

    /// Interval to use after `current`.
    fn next_interval(&self, current: Duration) -> Duration {
        current
            .mul_f64(self.backoff_factor.max(1.0))
            .min(self.max_interval)
    }
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self::with_timeout(Duration::from_secs(20))
    }
}

/// Poll `probe` until it returns `Some`, or fail with
/// [`HarvestError::NavigationTimeout`] once `policy.timeout` has elapsed.
///
/// The probe always runs at least once. Probe errors are returned as-is
/// without further polling.
pub async fn wait_for<T, F, Fut>(
    policy: &WaitPolicy,
    waiting_for: &str,
    mut probe: F,
) -> Result<T, HarvestError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, HarvestError>>,
{
    let deadline = Instant::now() + policy.timeout;
    let mut interval = policy.initial_interval;
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        if let Some(value) = probe().await? {
            tracing::debug!("{waiting_for}: satisfied after {attempts} poll(s)");
            return Ok(value);
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(HarvestError::NavigationTimeout {
                waiting_for: waiting_for.to_string(),
                timeout_ms: policy.timeout.as_millis() as u64,
            });
        }

        tokio::time::sleep(interval.min(deadline - now)).await;
        interval = policy.next_interval(interval);
    }
}
