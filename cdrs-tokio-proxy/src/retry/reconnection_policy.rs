use derive_more::Constructor;
#[cfg(test)]
use mockall::automock;
use rand::{rng, Rng};
use std::time::Duration;

const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(60);

/// Determines the time for the next attempt when trying to bring the proxy host back up.
pub trait ReconnectionSchedule {
    /// Returns next reconnect delay or `None` if no further attempt should be made.
    fn next_delay(&mut self) -> Option<Duration>;
}

/// Creates reconnection schedules when the proxy host is reported down.
#[cfg_attr(test, automock)]
pub trait ReconnectionPolicy {
    /// Creates new schedule for a single down period of the host.
    fn new_host_schedule(&self) -> Box<dyn ReconnectionSchedule + Send + Sync>;
}

/// Schedules reconnection at constant interval, optionally giving up after a number of attempts.
#[derive(Copy, Clone, Constructor, Debug, Ord, PartialOrd, Eq, PartialEq, Hash)]
pub struct ConstantReconnectionPolicy {
    base_delay: Duration,
    max_attempts: Option<usize>,
}

impl Default for ConstantReconnectionPolicy {
    fn default() -> Self {
        ConstantReconnectionPolicy::new(DEFAULT_BASE_DELAY, None)
    }
}

impl ReconnectionPolicy for ConstantReconnectionPolicy {
    fn new_host_schedule(&self) -> Box<dyn ReconnectionSchedule + Send + Sync> {
        Box::new(ConstantReconnectionSchedule {
            base_delay: self.base_delay,
            remaining: self.max_attempts,
        })
    }
}

struct ConstantReconnectionSchedule {
    base_delay: Duration,
    remaining: Option<usize>,
}

impl ReconnectionSchedule for ConstantReconnectionSchedule {
    fn next_delay(&mut self) -> Option<Duration> {
        match self.remaining.as_mut() {
            Some(0) => None,
            Some(remaining) => {
                *remaining -= 1;
                Some(self.base_delay)
            }
            None => Some(self.base_delay),
        }
    }
}

/// Never schedules reconnections - a host reported down stays forced down.
#[derive(Default, Copy, Clone, Debug, PartialEq, Ord, PartialOrd, Eq, Hash)]
pub struct NeverReconnectionPolicy;

impl ReconnectionPolicy for NeverReconnectionPolicy {
    fn new_host_schedule(&self) -> Box<dyn ReconnectionSchedule + Send + Sync> {
        Box::new(NeverReconnectionSchedule)
    }
}

struct NeverReconnectionSchedule;

impl ReconnectionSchedule for NeverReconnectionSchedule {
    fn next_delay(&mut self) -> Option<Duration> {
        None
    }
}

/// A reconnection policy that waits exponentially longer between each reconnection attempt (but
/// keeps a constant delay once a maximum delay is reached). The delay will increase exponentially,
/// with an added jitter of 85% to 115%.
#[derive(Copy, Clone, Constructor, Debug, Ord, PartialOrd, Eq, PartialEq, Hash)]
pub struct ExponentialReconnectionPolicy {
    base_delay: Duration,
    max_delay: Duration,
    max_attempts: usize,
}

impl ReconnectionPolicy for ExponentialReconnectionPolicy {
    fn new_host_schedule(&self) -> Box<dyn ReconnectionSchedule + Send + Sync> {
        Box::new(ExponentialReconnectionSchedule::new(
            self.base_delay,
            self.max_delay,
            self.max_attempts,
        ))
    }
}

impl Default for ExponentialReconnectionPolicy {
    fn default() -> Self {
        let base_delay = DEFAULT_BASE_DELAY.as_millis() as i64;
        let ceil = u32::from((base_delay & (base_delay - 1)) != 0);

        ExponentialReconnectionPolicy::new(
            DEFAULT_BASE_DELAY,
            DEFAULT_MAX_DELAY,
            (64 - (i64::MAX / base_delay).leading_zeros() - ceil) as usize,
        )
    }
}

struct ExponentialReconnectionSchedule {
    base_delay: Duration,
    max_delay: Duration,
    max_attempts: usize,
    attempt: usize,
}

impl ReconnectionSchedule for ExponentialReconnectionSchedule {
    fn next_delay(&mut self) -> Option<Duration> {
        if self.attempt >= self.max_attempts {
            return Some(self.max_delay);
        }

        self.attempt += 1;

        let delay = self
            .base_delay
            .saturating_mul(1u32.checked_shl(self.attempt as u32).unwrap_or(u32::MAX))
            .min(self.max_delay);

        let jitter = rng().random_range(85..116);

        Some(
            (delay / 100)
                .saturating_mul(jitter)
                .clamp(self.base_delay, self.max_delay),
        )
    }
}

impl ExponentialReconnectionSchedule {
    fn new(base_delay: Duration, max_delay: Duration, max_attempts: usize) -> Self {
        ExponentialReconnectionSchedule {
            base_delay,
            max_delay,
            max_attempts,
            attempt: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::retry::reconnection_policy::ExponentialReconnectionSchedule;
    use crate::retry::{
        ConstantReconnectionPolicy, NeverReconnectionPolicy, ReconnectionPolicy,
        ReconnectionSchedule,
    };

    #[test]
    fn should_reach_max_exponential_delay_without_panic() {
        let mut schedule = ExponentialReconnectionSchedule {
            base_delay: Default::default(),
            max_delay: Default::default(),
            max_attempts: usize::MAX,
            attempt: usize::MAX - 1,
        };

        schedule.next_delay();
    }

    #[test]
    fn should_keep_exponential_delay_within_bounds() {
        let base_delay = Duration::from_millis(100);
        let max_delay = Duration::from_secs(2);
        let mut schedule = ExponentialReconnectionSchedule::new(base_delay, max_delay, 10);

        for _ in 0..20 {
            let delay = schedule.next_delay().unwrap();
            assert!(delay >= base_delay);
            assert!(delay <= max_delay);
        }
    }

    #[test]
    fn should_stop_constant_schedule_after_max_attempts() {
        let delay = Duration::from_millis(5);
        let mut schedule = ConstantReconnectionPolicy::new(delay, Some(2)).new_host_schedule();

        assert_eq!(schedule.next_delay(), Some(delay));
        assert_eq!(schedule.next_delay(), Some(delay));
        assert_eq!(schedule.next_delay(), None);
    }

    #[test]
    fn should_never_schedule() {
        let mut schedule = NeverReconnectionPolicy.new_host_schedule();
        assert_eq!(schedule.next_delay(), None);
    }
}
