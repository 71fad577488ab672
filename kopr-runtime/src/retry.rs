//! Per-event retry policies for failed dispatches
//!
//! A policy is a plain value attached to each [`Event`](crate::Event), so
//! different event sources can apply different schedules to the same
//! controller. The execution side implements [`Backoff`] and is consumed by
//! whatever drives the dispatcher (see [`Runner`](crate::Runner)).

use backoff::backoff::Backoff;
use std::time::Duration;

const DEFAULT_INITIAL_INTERVAL: Duration = Duration::from_secs(2);
const DEFAULT_MULTIPLIER: f64 = 1.5;
const DEFAULT_MAX_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// A bounded exponential retry policy
///
/// Produces delays of `initial_interval * multiplier^n`, capped at
/// `max_interval`, for re-delivery `n = 0, 1, ...`. An optional
/// `max_attempts` bounds the total number of deliveries (the first delivery
/// counts as attempt one, so `max_attempts(1)` disables retry entirely).
#[derive(Debug, Clone, PartialEq)]
pub struct GenericRetry {
    initial_interval: Duration,
    multiplier: f64,
    max_interval: Duration,
    max_attempts: Option<u32>,
}

impl Default for GenericRetry {
    fn default() -> Self {
        Self {
            initial_interval: DEFAULT_INITIAL_INTERVAL,
            multiplier: DEFAULT_MULTIPLIER,
            max_interval: DEFAULT_MAX_INTERVAL,
            max_attempts: None,
        }
    }
}

impl GenericRetry {
    /// The default schedule with a bounded number of attempts
    #[must_use]
    pub fn default_limited_exponential() -> Self {
        Self::default().max_attempts(DEFAULT_MAX_ATTEMPTS)
    }

    /// A policy that never re-delivers
    #[must_use]
    pub fn none() -> Self {
        Self::default().max_attempts(1)
    }

    /// Set the delay before the first re-delivery
    #[must_use]
    pub fn initial_interval(mut self, interval: Duration) -> Self {
        self.initial_interval = interval;
        self
    }

    /// Set the factor applied to the delay on every further re-delivery
    #[must_use]
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Cap the delay between re-deliveries
    #[must_use]
    pub fn max_interval(mut self, max_interval: Duration) -> Self {
        self.max_interval = max_interval;
        self
    }

    /// Bound the total number of deliveries, the initial one included
    #[must_use]
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Start a fresh execution of this policy
    #[must_use]
    pub fn execution(&self) -> RetryExecution {
        RetryExecution {
            policy: self.clone(),
            delivered: 0,
        }
    }
}

/// The stateful side of a [`GenericRetry`] policy
///
/// One execution tracks the re-delivery schedule of a single event.
#[derive(Debug, Clone)]
pub struct RetryExecution {
    policy: GenericRetry,
    delivered: u32,
}

impl Backoff for RetryExecution {
    fn next_backoff(&mut self) -> Option<Duration> {
        if let Some(max) = self.policy.max_attempts {
            // the initial delivery already happened before the first call
            if self.delivered + 1 >= max {
                return None;
            }
        }
        let factor = self.policy.multiplier.powi(self.delivered as i32);
        let delay = self.policy.initial_interval.mul_f64(factor);
        self.delivered += 1;
        Some(delay.min(self.policy.max_interval))
    }

    fn reset(&mut self) {
        self.delivered = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::GenericRetry;
    use backoff::backoff::Backoff;
    use std::time::Duration;

    #[test]
    fn delays_grow_exponentially() {
        let mut execution = GenericRetry::default()
            .initial_interval(Duration::from_secs(2))
            .multiplier(2.0)
            .execution();
        assert_eq!(execution.next_backoff(), Some(Duration::from_secs(2)));
        assert_eq!(execution.next_backoff(), Some(Duration::from_secs(4)));
        assert_eq!(execution.next_backoff(), Some(Duration::from_secs(8)));
    }

    #[test]
    fn delays_are_capped_at_max_interval() {
        let mut execution = GenericRetry::default()
            .initial_interval(Duration::from_secs(10))
            .multiplier(3.0)
            .max_interval(Duration::from_secs(25))
            .execution();
        assert_eq!(execution.next_backoff(), Some(Duration::from_secs(10)));
        assert_eq!(execution.next_backoff(), Some(Duration::from_secs(25)));
        assert_eq!(execution.next_backoff(), Some(Duration::from_secs(25)));
    }

    #[test]
    fn attempts_are_bounded() {
        let mut execution = GenericRetry::default().max_attempts(3).execution();
        assert!(execution.next_backoff().is_some());
        assert!(execution.next_backoff().is_some());
        assert_eq!(execution.next_backoff(), None);
        assert_eq!(execution.next_backoff(), None);
    }

    #[test]
    fn single_attempt_disables_retry() {
        let mut execution = GenericRetry::none().execution();
        assert_eq!(execution.next_backoff(), None);
    }

    #[test]
    fn reset_restarts_the_schedule() {
        let mut execution = GenericRetry::default()
            .initial_interval(Duration::from_secs(1))
            .multiplier(2.0)
            .max_attempts(2)
            .execution();
        assert_eq!(execution.next_backoff(), Some(Duration::from_secs(1)));
        assert_eq!(execution.next_backoff(), None);
        execution.reset();
        assert_eq!(execution.next_backoff(), Some(Duration::from_secs(1)));
    }
}
