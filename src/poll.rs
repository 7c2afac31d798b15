//! Fixed-interval polling used to wait for remote verification.
//!
//! [`poll_until()`] calls a predicate until it returns `true` or the attempt budget of a [`PollPolicy`] runs out.
//! Waiting between attempts goes through a [`Sleeper`], so callers (and tests) control how time passes.

use std::time::Duration;

use log::trace;
#[cfg(test)]
use mockall::automock;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_POLL_ATTEMPTS: u32 = 10;

/// How often and how long to poll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PollPolicy {
    /// Time to wait between two attempts
    pub interval: Duration,
    /// Maximum number of times the predicate is evaluated
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        PollPolicy {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: DEFAULT_POLL_ATTEMPTS,
        }
    }
}

/// Something that can suspend the current thread
#[cfg_attr(test, automock)]
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// Blocks the calling thread with [`std::thread::sleep`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PollOutcome {
    /// The predicate returned `true` on the given attempt
    Satisfied { attempts: u32 },
    /// The predicate never returned `true`
    Exhausted { attempts: u32 },
}

impl PollOutcome {
    pub fn is_satisfied(&self) -> bool {
        matches!(self, PollOutcome::Satisfied { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            PollOutcome::Satisfied { attempts } | PollOutcome::Exhausted { attempts } => *attempts,
        }
    }
}

/// Evaluate `predicate` until it returns `true`, at most `policy.max_attempts` times.
///
/// The predicate receives the 1-based number of the current attempt.
/// The sleeper is invoked between two attempts only, never after the last one.
pub fn poll_until<F>(policy: &PollPolicy, sleeper: &dyn Sleeper, mut predicate: F) -> PollOutcome
where
    F: FnMut(u32) -> bool,
{
    let mut attempt = 0;
    while attempt < policy.max_attempts {
        attempt += 1;
        if predicate(attempt) {
            return PollOutcome::Satisfied { attempts: attempt };
        }
        if attempt < policy.max_attempts {
            trace!(
                "Attempt {}/{} failed, waiting {:?}",
                attempt,
                policy.max_attempts,
                policy.interval
            );
            sleeper.sleep(policy.interval);
        }
    }
    PollOutcome::Exhausted { attempts: attempt }
}
